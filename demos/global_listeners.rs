//! Runtime-wide listeners and the store resolver

use std::any::{Any, TypeId};
use std::error::Error;
use std::sync::Arc;

use statecan::{
    async_trait, get_resolved, listener, ManagedStore, StoreRuntime, Store,
};

struct SessionStore {
    store: Store<String, Option<String>>,
}

#[async_trait]
impl ManagedStore for SessionStore {
    type Error = String;
    type State = Option<String>;

    fn store(&self) -> &Store<String, Option<String>> {
        &self.store
    }

    async fn destroy(&self) {
        self.store.release().await;
    }
}

struct CartStore {
    store: Store<String, Vec<String>>,
}

#[async_trait]
impl ManagedStore for CartStore {
    type Error = String;
    type State = Vec<String>;

    fn store(&self) -> &Store<String, Vec<String>> {
        &self.store
    }

    async fn destroy(&self) {
        self.store.release().await;
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt().init();

    println!("=== Global Listeners & Resolver ===\n");

    let runtime = StoreRuntime::current();

    println!("1. Registering a runtime-wide listener");
    let audit = listener(|change| {
        println!(
            "   [audit] {} #{} -> {:?}",
            change.source(),
            change.store_id(),
            change.event()
        );
    });
    runtime.add_triple_listener(Arc::clone(&audit));

    println!("\n2. Wiring stores through the resolver");
    let session = Arc::new(SessionStore {
        store: Store::builder(None).tagged::<SessionStore>().build(),
    });
    let cart = Arc::new(CartStore {
        store: Store::builder(Vec::new()).tagged::<CartStore>().build(),
    });
    {
        let session = Arc::clone(&session);
        let cart = Arc::clone(&cart);
        runtime.set_resolver(move |id| {
            if id == TypeId::of::<SessionStore>() {
                Some(Arc::clone(&session) as Arc<dyn Any + Send + Sync>)
            } else if id == TypeId::of::<CartStore>() {
                Some(Arc::clone(&cart) as Arc<dyn Any + Send + Sync>)
            } else {
                None
            }
        });
    }

    println!("\n3. Mutating resolved stores");
    get_resolved::<SessionStore>()?
        .store()
        .update(Some("ada".to_string()), false);
    get_resolved::<CartStore>()?
        .store()
        .update(vec!["tea".to_string()], false);

    println!("\n4. Removing the listener");
    runtime.remove_triple_listener(&audit);
    cart.store().update(vec![], false);

    session.destroy().await;
    cart.destroy().await;
    runtime.reset();

    println!("\n✓ Example complete!");
    Ok(())
}
