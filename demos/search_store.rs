//! Debounced async search: only the last query of a burst lands in the store

use std::error::Error;
use std::time::Duration;

use statecan::{Either, Observer, Store, StoreConfig};
use tracing_subscriber::EnvFilter;

async fn search(query: &'static str) -> Result<Vec<String>, String> {
    tokio::time::sleep(Duration::from_millis(80)).await;
    if query.is_empty() {
        return Err("empty query".to_string());
    }
    Ok((1..=3).map(|i| format!("{query} result {i}")).collect())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("statecan=debug".parse()?))
        .init();

    println!("=== Search Store ===\n");

    let config = StoreConfig::from_env()?;
    println!("1. Debounce window: {:?}", config.debounce);
    let store: Store<String, Vec<String>> = Store::builder(Vec::new()).config(config).build();

    let _disposer = store.observer(
        Observer::new()
            .on_state(|results: &Vec<String>| println!("   [results] {results:?}"))
            .on_loading(|loading| println!("   [loading] {loading}"))
            .on_error(|error: Option<&String>| println!("   [error] {error:?}")),
    );

    println!("\n2. Typing \"r\", \"ru\", \"rust\" in quick succession");
    let handles = ["r", "ru", "rust"].map(|query| store.execute(move || search(query)));
    for (query, handle) in ["r", "ru", "rust"].iter().zip(handles) {
        println!("   {query:>5} -> {:?}", handle.join().await?);
    }

    println!("\n3. Two-branch producer reporting a failure");
    let handle = store.execute_two_branch(|| async {
        let result = search("").await;
        Either::from(result)
    });
    println!("   outcome: {:?}", handle.join().await?);

    println!("\n4. Streaming live results");
    let live = futures::stream::iter(vec![
        Ok(vec!["live 1".to_string()]),
        Ok(vec!["live 1".to_string(), "live 2".to_string()]),
    ]);
    store.execute_stream::<_, String>(live).finished().await;

    store.release().await;
    println!("\n✓ Example complete!");
    Ok(())
}
