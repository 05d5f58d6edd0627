//! The 2PC boolean-circuit collaborator contract.
//!
//! The two parties' raw per-bin OPRF-masked values are never compared
//! in the clear — that comparison, and the downstream analytics
//! (threshold / sum / sum-if-gt-threshold), happen inside a real
//! boolean-sharing MPC engine the two parties run together. [`CircuitEngine`]
//! is the narrow interface this crate exposes to that engine; a genuine
//! production collaborator (a boolean-sharing MPC engine) implements it
//! by driving its own gate graph and network rounds. [`LocalEqualityCircuit`]
//! is an in-process stand-in satisfying the same trait, so the rest of
//! the workspace can be exercised end to end without that external engine.

use std::sync::{Arc, Condvar, Mutex};

use serde::{Deserialize, Serialize};

/// Which of the two parties supplied a given real input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Server,
    Client,
}

impl Role {
    pub fn other(self) -> Role {
        match self {
            Role::Server => Role::Client,
            Role::Client => Role::Server,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CircuitError {
    #[error("circuit execution failed: {0}")]
    Execution(String),
}

/// The operations the orchestrator needs from its 2PC collaborator.
/// `Share` is an opaque handle to a wire in the collaborator's circuit —
/// callers never see cleartext until [`CircuitEngine::get_clear_value`]
/// after [`CircuitEngine::exec`].
pub trait CircuitEngine {
    type Share: Clone;

    /// Shares this party's own `values` into the circuit as a SIMD
    /// input gate, `bitlen` bits wide per lane.
    fn put_simd_input(&mut self, role: Role, values: &[u64], bitlen: usize) -> Self::Share;

    /// The placeholder a party puts in for the *other* party's SIMD
    /// input — the other party supplies the real values on their own
    /// handle; the collaborator reconciles the two during `exec`.
    fn put_dummy_simd_input(&mut self, n: usize, bitlen: usize) -> Self::Share;

    /// A public constant, known to both parties before circuit
    /// evaluation.
    fn put_const(&mut self, value: u64, bitlen: usize) -> Self::Share;

    /// Elementwise equality between two same-length SIMD shares.
    fn put_eq(&mut self, a: &Self::Share, b: &Self::Share) -> Self::Share;

    /// The number of `1` lanes in a SIMD boolean share, as a scalar.
    fn put_hamming_weight(&mut self, a: &Self::Share) -> Self::Share;

    /// `a > b`, as a single-bit scalar share.
    fn put_gt(&mut self, a: &Self::Share, b: &Self::Share) -> Self::Share;

    /// `if sel != 0 { on_true } else { on_false }`.
    fn put_mux(&mut self, on_true: &Self::Share, on_false: &Self::Share, sel: &Self::Share) -> Self::Share;

    /// Marks a share for the final reveal.
    fn put_out(&mut self, a: &Self::Share) -> Self::Share;

    /// Runs the circuit; must be called by both parties before either
    /// calls [`CircuitEngine::get_clear_value`].
    fn exec(&mut self) -> Result<(), CircuitError>;

    /// Reads a revealed share's cleartext value. Only meaningful on a
    /// share reached via [`CircuitEngine::put_out`] after `exec`.
    fn get_clear_value(&self, share: &Self::Share) -> u64;
}

#[derive(Debug, Clone)]
pub enum LocalShare {
    RealInput(Vec<u64>),
    DummyInput { for_role: Role, len: usize },
    Const(u64),
    Eq(Box<LocalShare>, Box<LocalShare>),
    HammingWeight(Box<LocalShare>),
    Gt(Box<LocalShare>, Box<LocalShare>),
    Mux {
        on_true: Box<LocalShare>,
        on_false: Box<LocalShare>,
        sel: Box<LocalShare>,
    },
    Out(Box<LocalShare>),
}

#[derive(Default)]
struct HubState {
    server_input: Option<Vec<u64>>,
    client_input: Option<Vec<u64>>,
}

/// Rendezvous point the two [`LocalEqualityCircuit`] handles (one per
/// role) share, so each side's `exec` can block until both parties
/// have published their real SIMD input.
pub struct CircuitHub {
    state: Mutex<HubState>,
    cond: Condvar,
}

impl CircuitHub {
    pub fn new() -> Arc<Self> {
        Arc::new(CircuitHub {
            state: Mutex::new(HubState::default()),
            cond: Condvar::new(),
        })
    }

    fn publish(&self, role: Role, values: Vec<u64>) {
        let mut state = self.state.lock().unwrap();
        match role {
            Role::Server => state.server_input = Some(values),
            Role::Client => state.client_input = Some(values),
        }
        self.cond.notify_all();
    }

    fn wait_for_both(&self) -> (Vec<u64>, Vec<u64>) {
        let mut state = self.state.lock().unwrap();
        while state.server_input.is_none() || state.client_input.is_none() {
            state = self.cond.wait(state).unwrap();
        }
        (
            state.server_input.clone().unwrap(),
            state.client_input.clone().unwrap(),
        )
    }
}

/// An in-process stand-in for a real 2PC boolean-circuit engine: it
/// evaluates the same gate graph a genuine collaborator would, but in
/// the clear, reconciling both parties' real inputs through a shared
/// [`CircuitHub`] instead of a secret-sharing protocol. Only fit for
/// tests and demos — it gives each party's process direct access to
/// the other's plaintext input.
pub struct LocalEqualityCircuit {
    own_role: Role,
    hub: Arc<CircuitHub>,
    resolved: Option<(Vec<u64>, Vec<u64>)>,
}

impl LocalEqualityCircuit {
    pub fn new(own_role: Role, hub: Arc<CircuitHub>) -> Self {
        LocalEqualityCircuit {
            own_role,
            hub,
            resolved: None,
        }
    }

    fn input_for(&self, role: Role) -> &[u64] {
        let (server, client) = self
            .resolved
            .as_ref()
            .expect("exec() must run before reading circuit values");
        match role {
            Role::Server => server,
            Role::Client => client,
        }
    }

    fn eval(&self, share: &LocalShare) -> Vec<u64> {
        match share {
            LocalShare::RealInput(values) => values.clone(),
            LocalShare::DummyInput { for_role, len } => {
                let values = self.input_for(*for_role);
                debug_assert_eq!(values.len(), *len, "dummy input length disagrees with its real counterpart");
                values.to_vec()
            }
            LocalShare::Const(value) => vec![*value],
            LocalShare::Eq(a, b) => {
                let a = self.eval(a);
                let b = self.eval(b);
                debug_assert_eq!(a.len(), b.len(), "PutEQGate operands must have equal SIMD width");
                a.iter().zip(b.iter()).map(|(x, y)| (x == y) as u64).collect()
            }
            LocalShare::HammingWeight(a) => {
                let a = self.eval(a);
                vec![a.iter().filter(|&&bit| bit != 0).count() as u64]
            }
            LocalShare::Gt(a, b) => {
                let a = self.eval(a)[0];
                let b = self.eval(b)[0];
                vec![(a > b) as u64]
            }
            LocalShare::Mux { on_true, on_false, sel } => {
                let sel = self.eval(sel)[0];
                if sel != 0 {
                    vec![self.eval(on_true)[0]]
                } else {
                    vec![self.eval(on_false)[0]]
                }
            }
            LocalShare::Out(a) => self.eval(a),
        }
    }
}

impl CircuitEngine for LocalEqualityCircuit {
    type Share = LocalShare;

    fn put_simd_input(&mut self, role: Role, values: &[u64], _bitlen: usize) -> Self::Share {
        debug_assert_eq!(role, self.own_role, "a party may only supply its own real input");
        self.hub.publish(role, values.to_vec());
        LocalShare::RealInput(values.to_vec())
    }

    fn put_dummy_simd_input(&mut self, n: usize, _bitlen: usize) -> Self::Share {
        LocalShare::DummyInput {
            for_role: self.own_role.other(),
            len: n,
        }
    }

    fn put_const(&mut self, value: u64, _bitlen: usize) -> Self::Share {
        LocalShare::Const(value)
    }

    fn put_eq(&mut self, a: &Self::Share, b: &Self::Share) -> Self::Share {
        LocalShare::Eq(Box::new(a.clone()), Box::new(b.clone()))
    }

    fn put_hamming_weight(&mut self, a: &Self::Share) -> Self::Share {
        LocalShare::HammingWeight(Box::new(a.clone()))
    }

    fn put_gt(&mut self, a: &Self::Share, b: &Self::Share) -> Self::Share {
        LocalShare::Gt(Box::new(a.clone()), Box::new(b.clone()))
    }

    fn put_mux(&mut self, on_true: &Self::Share, on_false: &Self::Share, sel: &Self::Share) -> Self::Share {
        LocalShare::Mux {
            on_true: Box::new(on_true.clone()),
            on_false: Box::new(on_false.clone()),
            sel: Box::new(sel.clone()),
        }
    }

    fn put_out(&mut self, a: &Self::Share) -> Self::Share {
        LocalShare::Out(Box::new(a.clone()))
    }

    fn exec(&mut self) -> Result<(), CircuitError> {
        tracing::debug!(role = ?self.own_role, "circuit exec: waiting for both parties' input");
        self.resolved = Some(self.hub.wait_for_both());
        Ok(())
    }

    fn get_clear_value(&self, share: &Self::Share) -> u64 {
        self.eval(share)[0]
    }
}
