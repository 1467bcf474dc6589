//! Room code verifier
//!
//! The verifier is a public SHA-256 digest over an HKDF subkey of the room
//! key (domain "roomseal-verifier-v1"). It lets a joining client reject a
//! wrong room code before attempting to decrypt anything, and gives an
//! observer nothing beyond what re-deriving a candidate key already gives.

use secrecy::SecretString;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::envelope::{base64_decode, base64_encode};
use crate::error::{CryptoError, CryptoResult};
use crate::kdf::{derive_room_key_with, hkdf_derive, KdfParams, RoomKey};

const VERIFIER_INFO: &[u8] = b"roomseal-verifier-v1";

/// Size of a verifier digest
pub const VERIFIER_SIZE: usize = 32;

/// Public verifier digest. Equality is constant-time.
#[derive(Debug, Clone, Copy)]
pub struct VerifierHash([u8; VERIFIER_SIZE]);

impl VerifierHash {
    pub fn from_bytes(bytes: [u8; VERIFIER_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; VERIFIER_SIZE] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        base64_encode(&self.0)
    }

    pub fn from_base64(s: &str) -> CryptoResult<Self> {
        let bytes = base64_decode(s)?;
        let arr: [u8; VERIFIER_SIZE] = bytes.as_slice().try_into().map_err(|_| {
            CryptoError::Encoding(format!(
                "verifier must be {VERIFIER_SIZE} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(arr))
    }
}

impl PartialEq for VerifierHash {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl Eq for VerifierHash {}

/// Commit to the room key. The key bytes themselves are never hashed.
pub fn compute_verifier(key: &RoomKey) -> CryptoResult<VerifierHash> {
    let subkey = hkdf_derive(key.as_bytes(), VERIFIER_INFO)?;
    let digest = Sha256::digest(&subkey[..]);
    Ok(VerifierHash(digest.into()))
}

/// Check a room code against a stored verifier using the default KDF params.
pub fn verify_room_code(room_code: &SecretString, salt: &[u8], expected: &VerifierHash) -> bool {
    verify_room_code_with(room_code, salt, expected, &KdfParams::default())
}

/// Check a room code against a stored verifier.
///
/// A wrong room code is an expected input, so every failure, including a
/// malformed salt or empty code, is reported as `false`.
pub fn verify_room_code_with(
    room_code: &SecretString,
    salt: &[u8],
    expected: &VerifierHash,
    params: &KdfParams,
) -> bool {
    let candidate = derive_room_key_with(room_code, salt, params)
        .and_then(|key| compute_verifier(&key));
    match candidate {
        Ok(actual) => actual == *expected,
        Err(e) => {
            tracing::debug!(error = %e, "verifier check failed");
            false
        }
    }
}
