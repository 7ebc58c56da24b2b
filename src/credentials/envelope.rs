//! Envelope encryption of credential bundles.
//!
//! The data key is a freshly generated age X25519 identity. The bundle is
//! encrypted to that identity's recipient and the identity itself is handed
//! to the key management service for wrapping.

use super::CredentialError;
use age::secrecy::ExposeSecret;
use age::x25519;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use zeroize::Zeroizing;

const RECORD_VERSION: &str = "alert-relay-credentials-v1";

/// A bundle encrypted under a new data key that has not been wrapped yet.
pub(crate) struct Sealed {
    pub data_key: Zeroizing<String>,
    pub ciphertext: String,
}

/// Generates a data key and encrypts `plaintext` with it.
pub(crate) fn seal(plaintext: &[u8]) -> Result<Sealed, CredentialError> {
    let identity = x25519::Identity::generate();
    let ciphertext = encrypt(&identity.to_public(), plaintext)?;
    let ciphertext = String::from_utf8(ciphertext)
        .map_err(|e| CredentialError::Encryption(format!("UTF-8 error: {}", e)))?;
    Ok(Sealed {
        data_key: Zeroizing::new(identity.to_string().expose_secret().to_string()),
        ciphertext,
    })
}

/// Decrypts a ciphertext produced by [`seal`] with the unwrapped data key.
pub(crate) fn open(data_key: &[u8], ciphertext: &str) -> Result<Zeroizing<Vec<u8>>, CredentialError> {
    let data_key = std::str::from_utf8(data_key)
        .map_err(|_| CredentialError::Corrupt("data key is not valid UTF-8".to_string()))?;
    let identity: x25519::Identity = data_key
        .trim()
        .parse()
        .map_err(|e: &str| CredentialError::Corrupt(format!("invalid data key: {}", e)))?;
    decrypt(&identity, ciphertext.as_bytes())
}

/// Encrypts to a single recipient with ASCII armor.
pub(crate) fn encrypt(recipient: &x25519::Recipient, plaintext: &[u8]) -> Result<Vec<u8>, CredentialError> {
    let encryptor = age::Encryptor::with_recipients(std::iter::once(recipient as &dyn age::Recipient))
        .map_err(|e| CredentialError::Encryption(e.to_string()))?;

    let mut encrypted = Vec::new();
    let armored = age::armor::ArmoredWriter::wrap_output(&mut encrypted, age::armor::Format::AsciiArmor)
        .map_err(|e| CredentialError::Encryption(e.to_string()))?;
    let mut writer = encryptor
        .wrap_output(armored)
        .map_err(|e| CredentialError::Encryption(e.to_string()))?;
    writer
        .write_all(plaintext)
        .map_err(|e| CredentialError::Encryption(e.to_string()))?;
    writer
        .finish()
        .and_then(|armored| armored.finish())
        .map_err(|e| CredentialError::Encryption(e.to_string()))?;

    Ok(encrypted)
}

/// Decrypts an armored age payload. Any failure is an integrity failure.
pub(crate) fn decrypt(identity: &x25519::Identity, ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>, CredentialError> {
    let reader = age::armor::ArmoredReader::new(ciphertext);
    let decryptor =
        age::Decryptor::new(reader).map_err(|e| CredentialError::Corrupt(e.to_string()))?;
    let mut reader = decryptor
        .decrypt(std::iter::once(identity as &dyn age::Identity))
        .map_err(|e| CredentialError::Corrupt(e.to_string()))?;

    let mut decrypted = Zeroizing::new(Vec::new());
    reader
        .read_to_end(&mut decrypted)
        .map_err(|e| CredentialError::Corrupt(e.to_string()))?;
    Ok(decrypted)
}

/// The at-rest form of a credential bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncryptedCredentialRecord {
    version: String,
    /// Data key wrapped by the KMS, base64 encoded
    wrapped_key: String,
    /// Armored age ciphertext of the JSON bundle
    ciphertext: String,
}

impl EncryptedCredentialRecord {
    pub(crate) fn new(wrapped_key: &[u8], ciphertext: String) -> Self {
        Self {
            version: RECORD_VERSION.to_string(),
            wrapped_key: base64::engine::general_purpose::STANDARD.encode(wrapped_key),
            ciphertext,
        }
    }

    pub(crate) fn wrapped_key(&self) -> Result<Vec<u8>, CredentialError> {
        base64::engine::general_purpose::STANDARD
            .decode(&self.wrapped_key)
            .map_err(|e| CredentialError::Corrupt(format!("invalid wrapped key: {}", e)))
    }

    pub(crate) fn ciphertext(&self) -> &str {
        &self.ciphertext
    }

    pub(crate) fn to_bytes(&self) -> Result<Vec<u8>, CredentialError> {
        serde_json::to_vec(self).map_err(|e| CredentialError::Encryption(e.to_string()))
    }

    pub(crate) fn from_bytes(bytes: &[u8]) -> Result<Self, CredentialError> {
        let record: Self = serde_json::from_slice(bytes)
            .map_err(|e| CredentialError::Corrupt(format!("unreadable record: {}", e)))?;
        if record.version != RECORD_VERSION {
            return Err(CredentialError::Corrupt(format!(
                "unsupported record version '{}'",
                record.version
            )));
        }
        Ok(record)
    }
}
