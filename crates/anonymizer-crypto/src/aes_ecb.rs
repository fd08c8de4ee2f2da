//! AES-256-ECB cipher with a SHA-256 derived key
//!
//! Every block is encrypted independently with no IV, so tokens are
//! reproducible for a given secret.

use std::fmt;

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, Key, KeyInit};
use aes::Aes256;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use sha2::{Digest, Sha256};

use crate::{CryptoError, SymmetricCipher};

type Aes256EcbEnc = ecb::Encryptor<Aes256>;
type Aes256EcbDec = ecb::Decryptor<Aes256>;

const BLOCK_SIZE: usize = 16;

/// AES-256 in ECB mode, PKCS#7 padded, base64 encoded.
#[derive(Clone)]
pub struct AesEcbCipher {
    key: Key<Aes256>,
}

impl AesEcbCipher {
    /// Derive the 256-bit key as SHA-256 of `secret`.
    pub fn new(secret: &str) -> Self {
        Self {
            key: Sha256::digest(secret.as_bytes()),
        }
    }
}

impl fmt::Debug for AesEcbCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AesEcbCipher").finish_non_exhaustive()
    }
}

impl SymmetricCipher for AesEcbCipher {
    fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let buffer =
            Aes256EcbEnc::new(&self.key).encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());
        Ok(STANDARD.encode(buffer))
    }

    fn decrypt(&self, ciphertext: &str) -> Result<String, CryptoError> {
        let buffer = STANDARD.decode(ciphertext.trim())?;
        if buffer.is_empty() || buffer.len() % BLOCK_SIZE != 0 {
            return Err(CryptoError::InvalidLength {
                length: buffer.len(),
            });
        }
        let plaintext = Aes256EcbDec::new(&self.key)
            .decrypt_padded_vec_mut::<Pkcs7>(&buffer)
            .map_err(|_| CryptoError::InvalidPadding)?;
        Ok(String::from_utf8(plaintext)?)
    }
}
