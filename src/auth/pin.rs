//! E-signature PIN checks.
//!
//! Stored PINs are either plain digits or bcrypt hashes. Supplied PINs are
//! trimmed once at the request boundary and compared exactly afterwards.

use bcrypt::verify;
use subtle::ConstantTimeEq;

pub const MIN_PIN_LEN: usize = 4;
pub const MAX_PIN_LEN: usize = 10;

fn is_bcrypt_hash(stored: &str) -> bool {
    stored.starts_with("$2a$") || stored.starts_with("$2b$") || stored.starts_with("$2y$")
}

/// Compare a supplied PIN against the technician's stored credential.
pub fn verify_pin(stored: &str, supplied: &str) -> bool {
    if is_bcrypt_hash(stored) {
        return verify(supplied, stored).unwrap_or(false);
    }
    bool::from(stored.as_bytes().ct_eq(supplied.as_bytes()))
}

/// Length check applied to the trimmed PIN before any lookup.
pub fn pin_length_ok(pin: &str) -> bool {
    (MIN_PIN_LEN..=MAX_PIN_LEN).contains(&pin.chars().count())
}
