//! Client nonce generation for SCRAM.
//!
//! Nonces only need to be unique per session. They are drawn from the
//! thread-local general purpose RNG, not a dedicated CSPRNG.

use rand::distributions::Alphanumeric;
use rand::Rng;

/// Length of generated client nonces.
pub const NONCE_LEN: usize = 32;

/// Generate a 32-character `[A-Za-z0-9]` nonce.
pub fn generate_nonce() -> String {
    generate_nonce_with(&mut rand::thread_rng())
}

/// Generate a nonce from the given RNG.
pub fn generate_nonce_with<R: Rng + ?Sized>(rng: &mut R) -> String {
    rng.sample_iter(&Alphanumeric)
        .take(NONCE_LEN)
        .map(char::from)
        .collect()
}
