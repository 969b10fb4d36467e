//! Small helpers shared by the OT wire handlers and the coordinator's own
//! drive of the two-party OT protocol.

use num_bigint::BigUint;

use crate::error::CoordinatorError;

/// Encodes a DH group element as `0x`-prefixed hex.
pub fn biguint_to_hex(value: &BigUint) -> String {
    format!("0x{}", value.to_str_radix(16))
}

/// Decodes a `0x`-prefixed (or bare) hex string into a DH group element.
pub fn biguint_from_hex(value: &str) -> Result<BigUint, CoordinatorError> {
    let trimmed = value.strip_prefix("0x").unwrap_or(value);
    BigUint::parse_bytes(trimmed.as_bytes(), 16)
        .ok_or_else(|| CoordinatorError::InvalidInput(format!("malformed hex group element: {value}")))
}

/// Encodes a fixed 32-byte value (a MAC-check commitment or nonce) as hex.
pub fn bytes32_to_hex(value: &[u8; 32]) -> String {
    hex::encode(value)
}

/// Decodes a 32-byte hex string back into its fixed-width form.
pub fn bytes32_from_hex(value: &str) -> Result<[u8; 32], CoordinatorError> {
    let bytes =
        hex::decode(value).map_err(|err| CoordinatorError::InvalidInput(format!("malformed hex bytes: {err}")))?;
    bytes
        .try_into()
        .map_err(|_| CoordinatorError::InvalidInput("expected 32 bytes".into()))
}

/// Validates a session id against `^[A-Za-z0-9_-]{1,256}$`.
pub fn validate_session_id(session_id: &str) -> Result<(), CoordinatorError> {
    let valid = !session_id.is_empty()
        && session_id.len() <= 256
        && session_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(CoordinatorError::InvalidInput(format!("invalid session id `{session_id}`")))
    }
}
