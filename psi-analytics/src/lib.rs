//! Orchestrates the whole PSI-Analytics protocol run: bucketing, the
//! oblivious PRF exchange, the OPPRF polynomial transmission, and the
//! hand-off to a 2PC boolean-circuit collaborator for the analytics
//! function on top of the intersection.

mod calibration;
mod context;
mod error;
pub mod testutil;

pub use calibration::calibrate;
pub use context::{ceil_divide, AnalyticsType, Context, MAXBITLEN, NFUNS};
pub use error::PsiError;

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use circuit::{CircuitEngine, Role};
use hashing::{CuckooTable, SimpleTable};
use mersenne::Fp61;
use rand::rngs::OsRng;
use rand::Rng;
use rayon::prelude::*;

/// Connects to `(address, port)`, retrying briefly if the peer hasn't
/// started listening yet — the two parties' processes (or, in a
/// demo, threads) are not guaranteed to reach their respective bind
/// and connect calls in lockstep.
fn connect_with_retry(address: &str, port: u16) -> Result<TcpStream, PsiError> {
    let mut last_err = None;
    for _ in 0..50 {
        match TcpStream::connect((address, port)) {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                last_err = Some(e);
                thread::sleep(Duration::from_millis(20));
            }
        }
    }
    Err(PsiError::Network(last_err.expect("at least one connection attempt was made")))
}

/// A thin rendezvous: whoever calls this first as the server listens,
/// whoever calls it as the client connects, and the socket is then
/// dropped — this only confirms both processes are alive and agree on
/// `address`/`port` before the protocol proper starts.
fn rendezvous(ctx: &Context) -> Result<(), PsiError> {
    let span = tracing::debug_span!("rendezvous", role = ?ctx.role, port = ctx.port);
    let _enter = span.enter();
    match ctx.role {
        Role::Server => {
            let listener = TcpListener::bind((ctx.address.as_str(), ctx.port))?;
            let (_stream, _) = listener.accept()?;
        }
        Role::Client => {
            let _stream = connect_with_retry(&ctx.address, ctx.port)?;
        }
    }
    Ok(())
}

/// Buckets `elements` with a cuckoo table (one candidate bin per
/// element) and returns the bin contents as raw slot values plus
/// whether every element found a bin.
fn bucket_client(ctx: &Context, elements: &[u64]) -> Result<Vec<u64>, PsiError> {
    let mut table = CuckooTable::new(ctx.nbins, NFUNS);
    table.insert_all(elements);
    if !table.is_stash_empty() {
        tracing::warn!(stash_size = table.stash_size(), "cuckoo stash is non-empty, aborting run");
        return Err(PsiError::Bucketing(format!(
            "cuckoo stash is non-empty after inserting {} elements into {} bins",
            elements.len(),
            ctx.nbins
        )));
    }
    Ok(table.as_raw_vector())
}

/// Buckets `elements` with a simple table (every candidate bin per
/// element), returning each bin's candidates. Errors if any bin's
/// candidate count has grown far past what `nbins` was sized for — the
/// server-side analogue of the client's cuckoo stash overflow.
fn bucket_server(ctx: &Context, elements: &[u64]) -> Result<Vec<Vec<u64>>, PsiError> {
    let mut table = SimpleTable::new(ctx.nbins, NFUNS);
    table.insert_all(elements);

    let expected = (NFUNS as usize * elements.len()) / ctx.nbins.max(1);
    let overflow_bound = (expected * 8).max(NFUNS as usize * 4);
    let observed = table.max_bin_size();
    if observed > overflow_bound {
        tracing::warn!(observed, overflow_bound, "simple-table bin overcrowded, aborting run");
        return Err(PsiError::Bucketing(format!(
            "simple-table bin holds {observed} candidates, far beyond the {overflow_bound} expected for {} elements across {} bins — nbins is too small",
            elements.len(),
            ctx.nbins
        )));
    }
    Ok(table.as_raw_2d_vector())
}

/// Splits `nbins` bins into `nmegabins` contiguous groups of roughly
/// `nbinsinmegabin` bins each, the last group absorbing any remainder.
fn megabin_ranges(ctx: &Context) -> Vec<(usize, usize)> {
    let per = ctx.nbinsinmegabin();
    (0..ctx.nmegabins)
        .map(|m| {
            let start = m * per;
            let end = (start + per).min(ctx.nbins);
            (start, end)
        })
        .collect()
}

/// Pads `real_xs`/`real_ys` up to exactly `polynomialsize` points with
/// uniform random dummy `(X, Y)` pairs — X distinct from every real and
/// previously drawn dummy X, so interpolation never divides by zero —
/// and interpolates the full set. Every megabin's polynomial therefore
/// has the same fixed degree regardless of how many real candidates it
/// actually held.
fn interpolate_megabin(mut xs: Vec<Fp61>, mut ys: Vec<Fp61>, polynomialsize: usize) -> Vec<Fp61> {
    let mut seen: std::collections::HashSet<u64> = xs.iter().map(|x| x.to_u64()).collect();
    let mut rng = OsRng;
    while xs.len() < polynomialsize {
        let x_raw = rng.gen::<u64>() & ((1u64 << 61) - 1);
        if !seen.insert(x_raw) {
            continue;
        }
        xs.push(Fp61::from_u64(x_raw));
        ys.push(Fp61::from_u64(rng.gen::<u64>() & ((1u64 << 61) - 1)));
    }

    let coeffs = poly::interpolate(&xs, &ys);
    poly::pad_to(coeffs, polynomialsize)
}

/// The server's share of the protocol: draws one fresh random tag
/// `r_b` per bin, interpolates one OPPRF polynomial per megabin over
/// `(server_tag, server_tag XOR r_b)` points, sends the padded
/// coefficient buffers, and hands `r` off to the circuit.
fn run_server<C: CircuitEngine>(ctx: &Context, elements: &[u64], circuit: &mut C) -> Result<u64, PsiError> {
    let bins = bucket_server(ctx, elements)?;

    let oprf_inputs: Vec<Vec<u64>> = bins
        .iter()
        .map(|candidates| candidates.iter().map(|&v| v & ((1u64 << 61) - 1)).collect())
        .collect();
    let tags = ot::ot_sender(&oprf_inputs, &ctx.address, ctx.aux_port())?;

    let mut rng = OsRng;
    let r: Vec<u64> = (0..ctx.nbins).map(|_| rng.gen::<u64>() & ((1u64 << 61) - 1)).collect();
    debug_assert_eq!(
        r.iter().collect::<std::collections::HashSet<_>>().len(),
        r.len(),
        "server's per-bin random tags must be pairwise distinct"
    );

    let ranges = megabin_ranges(ctx);
    let buffers: Vec<Vec<Fp61>> = ranges
        .par_iter()
        .map(|&(start, end)| {
            let mut xs = Vec::new();
            let mut ys = Vec::new();
            for bin in start..end {
                for (&candidate, &tag) in bins[bin].iter().zip(tags[bin].iter()) {
                    xs.push(Fp61::from_u64(candidate));
                    ys.push(Fp61::from_u64(tag ^ r[bin]));
                }
            }
            interpolate_megabin(xs, ys, ctx.polynomialsize)
        })
        .collect();

    {
        let span = tracing::debug_span!("polynomial_transmission", role = "server", port = ctx.port);
        let _enter = span.enter();
        let listener = TcpListener::bind((ctx.address.as_str(), ctx.port))?;
        let (mut stream, _) = listener.accept()?;
        for buffer in &buffers {
            for coeff in buffer {
                stream.write_all(&coeff.to_le_bytes())?;
            }
        }
        stream.flush()?;
    }

    run_analytics(ctx, Role::Server, &r, circuit)
}

/// The client's share of the protocol: buckets with a cuckoo table,
/// learns its OPRF tag per occupied bin, receives and evaluates each
/// megabin's polynomial, and hands the resulting `y` vector off to the
/// circuit.
fn run_client<C: CircuitEngine>(ctx: &Context, elements: &[u64], circuit: &mut C) -> Result<u64, PsiError> {
    let slots = bucket_client(ctx, elements)?;

    let oprf_inputs: Vec<u64> = slots.iter().map(|&v| v & ((1u64 << 61) - 1)).collect();
    let tags = ot::ot_receiver(&oprf_inputs, &ctx.address, ctx.aux_port())?;

    let ranges = megabin_ranges(ctx);
    let buffer = {
        let span = tracing::debug_span!("polynomial_transmission", role = "client", port = ctx.port);
        let _enter = span.enter();
        let mut stream = connect_with_retry(&ctx.address, ctx.port)?;
        let total_coeffs = ctx.nmegabins * ctx.polynomialsize;
        let mut raw = vec![0u8; total_coeffs * 8];
        stream.read_exact(&mut raw)?;
        raw
    };

    let mut polynomials: Vec<Vec<Fp61>> = Vec::with_capacity(ctx.nmegabins);
    for chunk in buffer.chunks_exact(ctx.polynomialsize * 8) {
        let coeffs: Vec<Fp61> = chunk
            .chunks_exact(8)
            .map(|b| Fp61::from_le_bytes(b.try_into().unwrap()))
            .collect();
        polynomials.push(coeffs);
    }

    let mut y = Vec::with_capacity(ctx.nbins);
    for (megabin, &(start, end)) in ranges.iter().enumerate() {
        for bin in start..end {
            let x = Fp61::from_u64(oprf_inputs[bin]);
            let p_eval = poly::eval(&polynomials[megabin], x);
            y.push(p_eval.to_u64() ^ tags[bin]);
        }
    }

    run_analytics(ctx, Role::Client, &y, circuit)
}

/// Feeds the per-bin values into the analytics gate sequence
/// `ctx.analytics_type` selects, and reveals the final scalar result.
fn run_analytics<C: CircuitEngine>(
    ctx: &Context,
    own_role: Role,
    own_values: &[u64],
    circuit: &mut C,
) -> Result<u64, PsiError> {
    let bitlen = 61;
    let (server_share, client_share) = match own_role {
        Role::Server => (
            circuit.put_simd_input(Role::Server, own_values, bitlen),
            circuit.put_dummy_simd_input(ctx.nbins, bitlen),
        ),
        Role::Client => (
            circuit.put_dummy_simd_input(ctx.nbins, bitlen),
            circuit.put_simd_input(Role::Client, own_values, bitlen),
        ),
    };

    let eq = circuit.put_eq(&server_share, &client_share);
    let weight = circuit.put_hamming_weight(&eq);

    let out = match ctx.analytics_type {
        AnalyticsType::None => {
            let zero = circuit.put_const(0, 64);
            circuit.put_out(&zero)
        }
        AnalyticsType::Sum => circuit.put_out(&weight),
        AnalyticsType::Threshold => {
            let threshold = circuit.put_const(ctx.threshold, 64);
            let gt = circuit.put_gt(&weight, &threshold);
            circuit.put_out(&gt)
        }
        AnalyticsType::SumIfGtThreshold => {
            let threshold = circuit.put_const(ctx.threshold, 64);
            let zero = circuit.put_const(0, 64);
            let gt = circuit.put_gt(&weight, &threshold);
            let mux = circuit.put_mux(&weight, &zero, &gt);
            circuit.put_out(&mux)
        }
    };

    circuit.exec()?;
    Ok(circuit.get_clear_value(&out))
}

/// Runs one party's side of a full PSI-Analytics session: bucketing,
/// the OPRF on the auxiliary channel, the OPPRF polynomial exchange on
/// the primary channel, and the hand-off to `circuit` for the
/// analytics function `ctx.analytics_type` names.
///
/// `elements` is this party's raw (un-hashed) input set. Both parties
/// must agree on `ctx` (apart from `ctx.role`) and run this
/// concurrently — each blocks on the other's network messages.
pub fn run_psi_analytics<C: CircuitEngine>(
    ctx: &Context,
    elements: &[u64],
    circuit: &mut C,
) -> Result<u64, PsiError> {
    let span = tracing::info_span!("psi_analytics", role = ?ctx.role, neles = ctx.neles, nbins = ctx.nbins);
    let _enter = span.enter();

    rendezvous(ctx)?;

    match ctx.role {
        Role::Server => run_server(ctx, elements, circuit),
        Role::Client => run_client(ctx, elements, circuit),
    }
}
