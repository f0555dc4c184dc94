//! Domain store wrapping a Store: counter with history and middleware

use std::error::Error;

use statecan::{async_trait, ManagedStore, Observer, Store, StoreHooks, Triple};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Debug, PartialEq)]
struct CounterState {
    count: i32,
    step: i32,
    history: Vec<i32>,
}

impl CounterState {
    fn new() -> Self {
        Self {
            count: 0,
            step: 1,
            history: vec![0],
        }
    }

    fn stepped(&self, by: i32) -> Self {
        let mut next = self.clone();
        next.count += by;
        next.history.push(next.count);
        next
    }
}

/// Clamps negative counts to zero.
struct NonNegative;

impl StoreHooks<String, CounterState> for NonNegative {
    fn middleware(&self, candidate: Triple<String, CounterState>) -> Triple<String, CounterState> {
        if candidate.state().count >= 0 {
            return candidate;
        }
        let mut clamped = candidate.state().clone();
        clamped.count = 0;
        if let Some(last) = clamped.history.last_mut() {
            *last = 0;
        }
        candidate.with_state(clamped)
    }

    fn init_store(&self, store: &Store<String, CounterState>) {
        println!("   [init] counter store #{} ready", store.id());
    }
}

struct CounterStore {
    store: Store<String, CounterState>,
}

impl CounterStore {
    fn new() -> Self {
        Self {
            store: Store::builder(CounterState::new())
                .hooks(NonNegative)
                .tagged::<CounterStore>()
                .build(),
        }
    }

    fn increment(&self) {
        let next = self.store.state().stepped(self.store.state().step);
        self.store.update(next, false);
    }

    fn decrement(&self) {
        let next = self.store.state().stepped(-self.store.state().step);
        self.store.update(next, false);
    }
}

#[async_trait]
impl ManagedStore for CounterStore {
    type Error = String;
    type State = CounterState;

    fn store(&self) -> &Store<String, CounterState> {
        &self.store
    }

    async fn destroy(&self) {
        self.store.release().await;
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("statecan=debug".parse()?))
        .init();

    println!("=== Counter Store ===\n");

    println!("1. Creating store");
    let counter = CounterStore::new();

    println!("\n2. Observing changes");
    let disposer = counter.store().observer(
        Observer::new()
            .on_state(|state: &CounterState| println!("   [state] count = {}", state.count))
            .on_error(|error: Option<&String>| {
                println!("   [error] {}", error.map_or("cleared", String::as_str))
            }),
    );

    println!("\n3. Incrementing twice");
    counter.increment();
    counter.increment();

    println!("\n4. Decrementing below zero (clamped)");
    counter.decrement();
    counter.decrement();
    counter.decrement();

    println!("\n5. Reporting a failure");
    counter
        .store()
        .set_error("sync with server failed".to_string(), false);

    println!("\n6. Rendering with when()");
    let label = counter
        .store()
        .when(|state| format!("count is {}", state.count))
        .error(|error| format!("problem: {error}"))
        .resolve();
    println!("   {label}");

    println!("\n7. Last stable snapshot");
    println!("   history = {:?}", counter.store().last_stable().state().history);

    disposer.dispose().await;
    counter.destroy().await;

    println!("\n✓ Example complete!");
    Ok(())
}
