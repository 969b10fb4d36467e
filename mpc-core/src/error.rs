//! Error types shared by every primitive in this crate.

/// Errors that can arise from the field, Shamir, OT, and MPC-session layers.
///
/// Callers at the service boundary map these onto the wider error taxonomy
/// (see `mpc-service`'s API error module) that also has to account for
/// peer-transport failures, which do not originate here.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CoreError {
    /// Malformed input: out-of-range x-coordinate, duplicate share, bad hex, etc.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Fewer than the threshold number of shares were supplied to a reconstruction.
    #[error("insufficient shares: need {needed}, got {got}")]
    InsufficientShares {
        /// Shares required for reconstruction.
        needed: usize,
        /// Shares actually supplied.
        got: usize,
    },

    /// Two or more shares carried the same x-coordinate.
    #[error("duplicate share x-coordinate: {0}")]
    DuplicateShare(u16),

    /// A field operation hit a mathematically undefined case (e.g. inverse of zero).
    ///
    /// This indicates a programming error upstream, never adversarial input -
    /// legitimate field elements are never zero where this is raised.
    #[error("field error: {0}")]
    FieldError(String),

    /// A SPDZ MAC check failed: either the committed and revealed values
    /// disagreed, or the reconstructed linear combination of sigmas was
    /// nonzero. Security-relevant; never retried.
    #[error("mac check failed at gate {gate_idx}")]
    MacFailure {
        /// Index of the gate whose opening failed the MAC check.
        gate_idx: usize,
    },

    /// A gate was driven out of the expected sequence for a participant's state.
    #[error("gate {got} arrived out of order, expected {expected}")]
    OutOfOrderGate {
        /// The gate index the participant state expected next.
        expected: usize,
        /// The gate index actually supplied.
        got: usize,
    },

    /// An operation that requires simulation mode was invoked without it.
    #[error("operation `{0}` requires ALLOW_SIMULATION_MODE")]
    SimulationModeRequired(&'static str),

    /// The >2-party trusted-dealer triple fallback was invoked without
    /// `ALLOW_DEALER_FALLBACK` set.
    #[error("dealer fallback requires ALLOW_DEALER_FALLBACK")]
    DealerFallbackNotAllowed,
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, CoreError>;
