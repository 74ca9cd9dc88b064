//! Validator identifier generation.
//!
//! Identifiers are random printable strings, not key material. Each call to
//! [`RandomKeyGenerator::generate`] seeds its own pseudorandom generator from
//! the OS, so concurrent callers share no generator state.

use crate::{Error, Result};
use rand::{Rng, SeedableRng, rngs::StdRng};

/// Symbols an identifier is drawn from.
pub const ALPHABET: &[u8; 62] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Identifier length used unless configured otherwise.
pub const DEFAULT_KEY_LENGTH: usize = 32;

/// A source of validator identifiers.
///
/// This abstraction allows the pipeline to run against the real generator or
/// a mocked one in tests.
///
/// # Example
/// ```
/// use provisioner_core::{KeyGenerator, Result};
///
/// struct FixedKey;
/// impl KeyGenerator for FixedKey {
///     fn generate(&self, length: usize) -> Result<String> {
///         Ok("k".repeat(length))
///     }
/// }
///
/// assert_eq!(FixedKey.generate(3).unwrap(), "kkk");
/// ```
pub trait KeyGenerator: Send + Sync {
    /// Returns an identifier of exactly `length` characters.
    fn generate(&self, length: usize) -> Result<String>;
}

/// Uniformly samples identifiers from [`ALPHABET`] using a freshly seeded
/// [`StdRng`] per call.
#[derive(Default, Clone, Copy, Debug)]
pub struct RandomKeyGenerator;

impl KeyGenerator for RandomKeyGenerator {
    fn generate(&self, length: usize) -> Result<String> {
        let mut rng = StdRng::try_from_os_rng()
            .map_err(|e| Error::generation(format!("failed to seed generator: {e}")))?;

        Ok((0..length)
            .map(|_| char::from(ALPHABET[rng.random_range(0..ALPHABET.len())]))
            .collect())
    }
}

/// Returns `true` if every character of `key` is in [`ALPHABET`].
pub fn is_alphabet_key(key: &str) -> bool {
    key.bytes().all(|b| ALPHABET.contains(&b))
}
