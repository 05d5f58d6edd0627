//! The N-choose-one oblivious PRF transport: the client learns `T_b(x)`
//! for exactly one input `x` per index, the server can evaluate `T_b`
//! for any number of its own candidates at that index, and the server
//! never learns which candidate (if any) the client queried.
//!
//! Realised as a 2HashDH oblivious PRF — the same construction the
//! OPAQUE PAKE uses for its password OPRF — rather than a literal
//! OT-extension binding: a fresh secret scalar per index is the PRF
//! key, `hash_from_bytes` maps an input onto the Ristretto group, and
//! the client blinds/unblinds its one query through a dedicated TCP
//! channel while the server evaluates its own candidates locally
//! without any network round at all.

use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use curve25519_dalek::ristretto::{CompressedRistretto, RistrettoPoint};
use curve25519_dalek::scalar::Scalar;
use hkdf::Hkdf;
use rand_core::OsRng;
use sha2::Sha512;

/// Mask applied to every PRF output so it fits the Mersenne61 domain
/// the polynomial layer operates over.
const VALUE_MASK: u64 = (1u64 << 61) - 1;

#[derive(Debug, thiserror::Error)]
pub enum OtError {
    #[error("network I/O failure during OPRF exchange: {0}")]
    Io(#[from] io::Error),
    #[error("malformed OPRF protocol message: {0}")]
    Protocol(String),
}

fn hash_to_point(input: u64) -> RistrettoPoint {
    RistrettoPoint::hash_from_bytes::<Sha512>(&input.to_le_bytes())
}

fn derive_output(point: &RistrettoPoint, input: u64) -> u64 {
    let mut ikm = Vec::with_capacity(40);
    ikm.extend_from_slice(point.compress().as_bytes());
    ikm.extend_from_slice(&input.to_le_bytes());
    let (prk, _) = Hkdf::<Sha512>::extract(None, &ikm);
    let mut out = [0u8; 8];
    out.copy_from_slice(&prk[0..8]);
    u64::from_le_bytes(out) & VALUE_MASK
}

/// Connects to the sender, retrying briefly if it hasn't bound its
/// listener yet — the two parties reach this point on their own
/// schedules, not in lockstep.
fn connect_with_retry(address: &str, port: u16) -> Result<TcpStream, OtError> {
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
    Err(OtError::Io(last_err.expect("at least one connection attempt was made")))
}

fn read_exact_vec(stream: &mut TcpStream, len: usize) -> Result<Vec<u8>, OtError> {
    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf)?;
    Ok(buf)
}

fn decompress(bytes: &[u8]) -> Result<RistrettoPoint, OtError> {
    let arr: [u8; 32] = bytes
        .try_into()
        .map_err(|_| OtError::Protocol("point encoding is not 32 bytes".into()))?;
    CompressedRistretto(arr)
        .decompress()
        .ok_or_else(|| OtError::Protocol("received an invalid curve point".into()))
}

/// Client side (the receiver): learns `T_b(inputs[k])` for each index
/// `k`, one input per index, without revealing any `inputs[k]` to the
/// server.
pub fn ot_receiver(inputs: &[u64], address: &str, port: u16) -> Result<Vec<u64>, OtError> {
    let span = tracing::debug_span!("oprf_receiver", n = inputs.len(), port);
    let _enter = span.enter();

    let mut stream = connect_with_retry(address, port)?;
    let n = inputs.len() as u64;
    stream.write_all(&n.to_le_bytes())?;

    let blinds: Vec<Scalar> = (0..inputs.len()).map(|_| Scalar::random(&mut OsRng)).collect();

    let mut alpha_bytes = Vec::with_capacity(inputs.len() * 32);
    for (&x, r) in inputs.iter().zip(blinds.iter()) {
        let alpha = hash_to_point(x) * r;
        alpha_bytes.extend_from_slice(alpha.compress().as_bytes());
    }
    stream.write_all(&alpha_bytes)?;
    stream.flush()?;

    let beta_bytes = read_exact_vec(&mut stream, inputs.len() * 32)?;

    let mut outputs = Vec::with_capacity(inputs.len());
    for ((chunk, &x), r) in beta_bytes.chunks_exact(32).zip(inputs.iter()).zip(blinds.iter()) {
        let beta = decompress(chunk)?;
        let unblinded = beta * r.invert();
        outputs.push(derive_output(&unblinded, x));
    }

    tracing::debug!("oprf receiver done");
    Ok(outputs)
}

/// Server side (the sender): evaluates `T_b` on every one of its own
/// candidates at each index locally (it holds the key, so this needs
/// no network round at all), and services the client's interactive
/// blind/unblind exchange for the index the client is querying.
pub fn ot_sender(inputs: &[Vec<u64>], address: &str, port: u16) -> Result<Vec<Vec<u64>>, OtError> {
    let span = tracing::debug_span!("oprf_sender", n = inputs.len(), port);
    let _enter = span.enter();

    let listener = TcpListener::bind((address, port))?;
    let (mut stream, _) = listener.accept()?;

    let keys: Vec<Scalar> = (0..inputs.len()).map(|_| Scalar::random(&mut OsRng)).collect();

    let mut n_bytes = [0u8; 8];
    stream.read_exact(&mut n_bytes)?;
    let n = u64::from_le_bytes(n_bytes) as usize;
    if n != inputs.len() {
        return Err(OtError::Protocol(format!(
            "index count mismatch: receiver announced {n}, sender has {}",
            inputs.len()
        )));
    }

    let alpha_bytes = read_exact_vec(&mut stream, n * 32)?;
    let mut beta_bytes = Vec::with_capacity(n * 32);
    for (chunk, key) in alpha_bytes.chunks_exact(32).zip(keys.iter()) {
        let alpha = decompress(chunk)?;
        let beta = alpha * key;
        beta_bytes.extend_from_slice(beta.compress().as_bytes());
    }
    stream.write_all(&beta_bytes)?;
    stream.flush()?;

    let outputs = inputs
        .iter()
        .zip(keys.iter())
        .map(|(candidates, key)| {
            candidates
                .iter()
                .map(|&candidate| {
                    let point = hash_to_point(candidate) * key;
                    derive_output(&point, candidate)
                })
                .collect()
        })
        .collect();

    tracing::debug!("oprf sender done");
    Ok(outputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn matching_candidate_yields_equal_output() {
        let port = 51411;
        let server_inputs = vec![vec![10u64, 20, 30], vec![40], vec![]];
        let client_inputs = vec![20u64, 99, 0];

        let server_handle = {
            let server_inputs = server_inputs.clone();
            thread::spawn(move || ot_sender(&server_inputs, "127.0.0.1", port).unwrap())
        };
        // give the listener a moment to bind before the client connects
        thread::sleep(std::time::Duration::from_millis(50));
        let client_outputs = ot_receiver(&client_inputs, "127.0.0.1", port).unwrap();
        let server_outputs = server_handle.join().unwrap();

        // index 0: client queried 20, which is among the server's candidates
        assert!(server_outputs[0].contains(&client_outputs[0]));
        // index 1: client queried 99, server only has 40 - no match expected
        assert!(!server_outputs[1].contains(&client_outputs[1]));
    }

    #[test]
    fn distinct_indices_use_independent_keys() {
        let port = 51412;
        let server_inputs = vec![vec![5u64], vec![5u64]];
        let client_inputs = vec![5u64, 5u64];

        let server_handle = {
            let server_inputs = server_inputs.clone();
            thread::spawn(move || ot_sender(&server_inputs, "127.0.0.1", port).unwrap())
        };
        thread::sleep(std::time::Duration::from_millis(50));
        let client_outputs = ot_receiver(&client_inputs, "127.0.0.1", port).unwrap();
        let server_outputs = server_handle.join().unwrap();

        // same raw value 5 at two different indices should almost never
        // produce the same PRF output, since each index has its own key.
        assert_ne!(server_outputs[0][0], server_outputs[1][0]);
        assert_eq!(client_outputs[0], server_outputs[0][0]);
        assert_eq!(client_outputs[1], server_outputs[1][0]);
    }
}
