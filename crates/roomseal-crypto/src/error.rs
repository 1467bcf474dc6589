use thiserror::Error;

pub type CryptoResult<T> = Result<T, CryptoError>;

#[derive(Debug, Error)]
pub enum CryptoError {
    /// Malformed room code or salt. The caller should re-prompt for input.
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// AEAD tag mismatch on an envelope or chunk.
    #[error("cannot decrypt: authentication failed")]
    Authentication,

    /// Malformed base64, framing, or plaintext encoding.
    #[error("malformed encrypted data: {0}")]
    Encoding(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CryptoError {
    /// True for every failure a caller should surface as "failed to decrypt".
    /// Encoding and authentication failures are not distinguished.
    pub fn is_decrypt_failure(&self) -> bool {
        matches!(self, CryptoError::Authentication | CryptoError::Encoding(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decrypt_failure_classification() {
        assert!(CryptoError::Authentication.is_decrypt_failure());
        assert!(CryptoError::Encoding("bad base64".into()).is_decrypt_failure());
        assert!(!CryptoError::KeyDerivation("empty".into()).is_decrypt_failure());
    }

    #[test]
    fn test_authentication_message_is_generic() {
        let msg = CryptoError::Authentication.to_string();
        assert_eq!(msg, "cannot decrypt: authentication failed");
    }
}
