//! Walk a few rides through matching, location updates and completion with
//! the offline city table, then print the rides and engine counters.
//!
//! Run with: RUST_LOG=ride_core=debug cargo run -p ride_core --example ride_lifecycle

use std::time::Duration;

use ride_core::config::EngineConfig;
use ride_core::model::{RideStatus, Role};
use ride_core::spatial::GeoPoint;
use ride_core::RideEngine;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ride_core=info")),
        )
        .init();

    let (engine, registry) = RideEngine::in_memory(&EngineConfig::default())?;
    let worker = engine.start_geocoding();

    let alice = registry.register("alice", "alice@example.com", Role::Rider)?.id;
    let bob = registry.register("bob", "bob@example.com", Role::Rider)?.id;
    for name in ["dora", "dmitri"] {
        let driver = registry.register(name, &format!("{name}@example.com"), Role::Driver)?;
        engine.sync_user(driver.id)?;
    }

    let first = engine.create_ride(alice, "Alexanderplatz", "Tempelhofer Feld")?;
    let driver = engine.match_ride(first.id)?;
    engine.update_location(first.id, GeoPoint::new(13.4132, 52.5219)?, driver)?;
    engine.transition(first.id, RideStatus::InProgress, driver)?;
    engine.update_location(first.id, GeoPoint::new(13.4017, 52.4731)?, alice)?;
    engine.transition(first.id, RideStatus::Completed, driver)?;

    let second = engine.create_ride(bob, "Louvre", "Gare du Nord")?;
    let (_, other) = engine.match_for_rider(bob)?;
    engine.update_location(second.id, GeoPoint::new(2.3376, 48.8606)?, other)?;
    engine.cancel(second.id, bob)?;

    // Give the worker a moment to record cities.
    tokio::time::sleep(Duration::from_millis(200)).await;

    for ride in engine.list_rides() {
        println!("{}", serde_json::to_string_pretty(&ride)?);
    }
    println!("{}", serde_json::to_string_pretty(&engine.telemetry())?);

    if let Some(worker) = worker {
        worker.abort();
    }
    Ok(())
}
