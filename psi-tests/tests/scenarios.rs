//! Concrete end-to-end scenarios exercising bucketing, the OPRF
//! exchange, the OPPRF polynomial transmission, and every analytics
//! gate sequence, against the [`circuit::LocalEqualityCircuit`] stand-in.

use std::thread;

use circuit::{CircuitHub, LocalEqualityCircuit, Role};
use psi_analytics::{testutil, AnalyticsType, Context};

/// Runs one full session for both roles, each on its own thread, and
/// returns `(server_result, client_result)`.
fn run_session(
    port: u16,
    neles: usize,
    threshold: u64,
    analytics_type: AnalyticsType,
    server_elements: Vec<u64>,
    client_elements: Vec<u64>,
) -> (u64, u64) {
    let hub = CircuitHub::new();
    let server_hub = hub.clone();

    let server_handle = thread::spawn(move || {
        let ctx = Context::new("127.0.0.1", port, Role::Server, neles, threshold, analytics_type).unwrap();
        let mut circuit = LocalEqualityCircuit::new(Role::Server, server_hub);
        psi_analytics::run_psi_analytics(&ctx, &server_elements, &mut circuit).unwrap()
    });

    let client_handle = thread::spawn(move || {
        let ctx = Context::new("127.0.0.1", port, Role::Client, neles, threshold, analytics_type).unwrap();
        let mut circuit = LocalEqualityCircuit::new(Role::Client, hub);
        psi_analytics::run_psi_analytics(&ctx, &client_elements, &mut circuit).unwrap()
    });

    let server_result = server_handle.join().unwrap();
    let client_result = client_handle.join().unwrap();
    (server_result, client_result)
}

/// `n` elements shared between both sides, plus enough disjoint
/// padding on each side to reach `neles` total — so the intersection
/// size is exactly `n`, known ahead of time.
fn sets_with_known_intersection(neles: usize, n: usize, elem_bitlen: u32, seed: u64) -> (Vec<u64>, Vec<u64>) {
    assert!(n <= neles);
    let shared = testutil::pseudorandom_elements(n, elem_bitlen, seed);
    let mut server_only = testutil::pseudorandom_elements(neles - n, elem_bitlen, seed + 1_000_000);
    let mut client_only = testutil::pseudorandom_elements(neles - n, elem_bitlen, seed + 2_000_000);

    // padding must not accidentally collide with the shared elements or
    // with each other.
    let shared_set: std::collections::HashSet<u64> = shared.iter().copied().collect();
    server_only.retain(|x| !shared_set.contains(x));
    client_only.retain(|x| !shared_set.contains(x) && !server_only.contains(x));

    let mut server = shared.clone();
    server.extend(server_only);
    let mut client = shared;
    client.extend(client_only);
    (server, client)
}

#[test]
fn s1_random_inputs_sum_matches_plain_intersection() {
    let neles = 1 << 12;
    let (server_elements, client_elements) = sets_with_known_intersection(neles, neles / 2, 15, 1);
    let expected = testutil::plain_intersection_size(&server_elements, &client_elements) as u64;

    let (server_result, client_result) =
        run_session(31101, neles, 0, AnalyticsType::Sum, server_elements, client_elements);

    assert_eq!(server_result, expected);
    assert_eq!(client_result, expected);
}

#[test]
fn s2_identical_sequential_inputs_sum_is_full_set_size() {
    let neles = 1 << 12;
    let elements = testutil::sequential_elements(neles);

    let (server_result, client_result) =
        run_session(31102, neles, 0, AnalyticsType::Sum, elements.clone(), elements);

    assert_eq!(server_result, neles as u64);
    assert_eq!(client_result, neles as u64);
}

#[test]
fn s3_threshold_straddles_the_intersection_size() {
    let neles = 1 << 12;
    let intersection = 100;
    let (server_elements, client_elements) = sets_with_known_intersection(neles, intersection, 61, 2);

    let (server_below, client_below) = run_session(
        31103,
        neles,
        intersection as u64 - 1,
        AnalyticsType::Threshold,
        server_elements.clone(),
        client_elements.clone(),
    );
    assert_eq!(server_below, 1);
    assert_eq!(client_below, 1);

    let (server_above, client_above) = run_session(
        31104,
        neles,
        intersection as u64 + 1,
        AnalyticsType::Threshold,
        server_elements,
        client_elements,
    );
    assert_eq!(server_above, 0);
    assert_eq!(client_above, 0);
}

#[test]
fn s4_sum_if_gt_threshold_straddles_the_intersection_size() {
    let neles = 1 << 12;
    let intersection = 100;
    let (server_elements, client_elements) = sets_with_known_intersection(neles, intersection, 61, 3);

    let (server_below, client_below) = run_session(
        31105,
        neles,
        intersection as u64 - 1,
        AnalyticsType::SumIfGtThreshold,
        server_elements.clone(),
        client_elements.clone(),
    );
    assert_eq!(server_below, intersection as u64);
    assert_eq!(client_below, intersection as u64);

    let (server_above, client_above) = run_session(
        31106,
        neles,
        intersection as u64 + 1,
        AnalyticsType::SumIfGtThreshold,
        server_elements,
        client_elements,
    );
    assert_eq!(server_above, 0);
    assert_eq!(client_above, 0);
}

#[test]
fn s5_disjoint_inputs_sum_is_zero() {
    let neles = 1 << 16;
    let server_elements = testutil::pseudorandom_elements(neles, 61, 4);
    let client_elements = testutil::pseudorandom_elements(neles, 61, 5);
    assert_eq!(testutil::plain_intersection_size(&server_elements, &client_elements), 0);

    let (server_result, client_result) =
        run_session(31107, neles, 0, AnalyticsType::Sum, server_elements, client_elements);

    assert_eq!(server_result, 0);
    assert_eq!(client_result, 0);
}

#[test]
#[ignore = "2^20-element run is expensive; run explicitly with --ignored"]
fn s6_large_identical_sets_sum_is_full_set_size() {
    let neles = 1 << 20;
    let elements = testutil::sequential_elements(neles);

    let (server_result, client_result) =
        run_session(31108, neles, 0, AnalyticsType::Sum, elements.clone(), elements);

    assert_eq!(server_result, neles as u64);
    assert_eq!(client_result, neles as u64);
}
