//! Deterministic symmetric encryption for anonymized identifiers
//!
//! Anonymized identifiers must stay joinable across records and datasets, so
//! the same plaintext encrypted under the same secret always yields the same
//! ciphertext. There is no random IV anywhere in this crate.
//!
//! # Example
//!
//! ```
//! use anonymizer_crypto::{AesEcbCipher, SymmetricCipher};
//!
//! let cipher = AesEcbCipher::new("123");
//! let token = cipher.encrypt("test").unwrap();
//! assert_eq!(token, "KfrlmeI/MCzm5GUeRFz0ag==");
//! assert_eq!(cipher.decrypt(&token).unwrap(), "test");
//! ```

mod aes_ecb;
mod error;

pub use aes_ecb::AesEcbCipher;
pub use error::CryptoError;

/// A symmetric cipher usable by the anonymization engine.
///
/// Implementations must be deterministic for a fixed secret and safe to share
/// between threads; the engine issues no locking around calls.
pub trait SymmetricCipher: Send + Sync {
    /// Encrypt `plaintext`, returning a printable token.
    fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError>;

    /// Reverse [`SymmetricCipher::encrypt`].
    fn decrypt(&self, ciphertext: &str) -> Result<String, CryptoError>;
}
