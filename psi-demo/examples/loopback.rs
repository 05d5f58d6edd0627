//! Runs both sides of a PSI-Analytics session against each other over
//! loopback TCP, as two threads in one process.
//!
//! The [`circuit::LocalEqualityCircuit`] stand-in reconciles both
//! parties' inputs through a shared [`circuit::CircuitHub`], so unlike
//! a deployment against a real 2PC collaborator, both roles have to
//! live in the same process here.
//!
//! ```text
//! RUST_LOG=psi_analytics=debug cargo run --example loopback
//! ```

use std::thread;

use circuit::{CircuitHub, LocalEqualityCircuit, Role};
use psi_analytics::{testutil, AnalyticsType, Context};

const ADDRESS: &str = "127.0.0.1";
const PORT: u16 = 7777;
const NELES: usize = 4096;
const THRESHOLD: u64 = 50;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let server_elements = testutil::pseudorandom_elements(NELES, 32, 1);
    let client_elements = testutil::pseudorandom_elements(NELES, 32, 1);
    let plain_intersection = testutil::plain_intersection_size(&server_elements, &client_elements);
    tracing::info!(plain_intersection, "plaintext oracle computed for comparison only");

    let hub = CircuitHub::new();

    let server_hub = hub.clone();
    let server_handle = thread::spawn(move || {
        let ctx = Context::new(ADDRESS, PORT, Role::Server, NELES, THRESHOLD, AnalyticsType::SumIfGtThreshold)
            .expect("demo session configuration should be valid");
        let mut circuit = LocalEqualityCircuit::new(Role::Server, server_hub);
        psi_analytics::run_psi_analytics(&ctx, &server_elements, &mut circuit).expect("server run failed")
    });

    let client_handle = thread::spawn(move || {
        let ctx = Context::new(ADDRESS, PORT, Role::Client, NELES, THRESHOLD, AnalyticsType::SumIfGtThreshold)
            .expect("demo session configuration should be valid");
        let mut circuit = LocalEqualityCircuit::new(Role::Client, hub);
        psi_analytics::run_psi_analytics(&ctx, &client_elements, &mut circuit).expect("client run failed")
    });

    let server_result = server_handle.join().expect("server thread panicked");
    let client_result = client_handle.join().expect("client thread panicked");

    println!("plaintext intersection size (oracle): {plain_intersection}");
    println!("server-revealed analytics result: {server_result}");
    println!("client-revealed analytics result: {client_result}");
}
