//! Crypto error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Ciphertext is not valid base64: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("Ciphertext length {length} is not a positive multiple of the block size")]
    InvalidLength { length: usize },

    #[error("Invalid PKCS#7 padding")]
    InvalidPadding,

    #[error("Decrypted bytes are not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}
