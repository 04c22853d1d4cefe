//! Manual wire-up demo: memory store + signal bus + bootstrap in demo mode.
//!
//! Run with `RUST_LOG=info cargo run --bin hearth-demo`.

use std::sync::Arc;

use hearth::config::{Config, FEATURE_DEMO};
use hearth::store::{MemoryStore, NUDGES_TABLE};
use hearth::{ProactiveBootstrap, SignalBus, Store};

#[tokio::main]
async fn main() {
    env_logger::init();

    let memory = Arc::new(MemoryStore::new());
    let store: Arc<dyn Store> = memory.clone();
    let bus = SignalBus::with_store(store.clone());

    let mut config = Config::default();
    config.features.insert(FEATURE_DEMO.to_string(), true);

    let bootstrap = ProactiveBootstrap::new(bus.clone(), store, config);
    bootstrap.on_family_ready("demo-family").await;

    let rows = memory.rows(NUDGES_TABLE);
    println!("{} nudge(s) created:", rows.len());
    for row in rows {
        println!("  {}", row);
    }

    bootstrap.shutdown();
}
