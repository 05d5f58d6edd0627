use std::io;

/// Every failure mode `run_psi_analytics` can surface. No retries, no
/// partial results — a failed run always returns one of these instead
/// of a partially-computed aggregate.
#[derive(Debug, thiserror::Error)]
pub enum PsiError {
    #[error("invalid session configuration: {0}")]
    Configuration(String),

    #[error("bucketing failed: {0}")]
    Bucketing(String),

    #[error("network failure: {0}")]
    Network(#[from] io::Error),

    #[error("OPRF transport failure: {0}")]
    Oprf(#[from] ot::OtError),

    #[error("2PC circuit failure: {0}")]
    Circuit(#[from] circuit::CircuitError),
}
