//! Key derivation: PBKDF2-HMAC-SHA256 room code → room key

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use hkdf::Hkdf;
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, Zeroizing};

use crate::error::{CryptoError, CryptoResult};
use crate::rng::{NonceSource, OsRandom};
use crate::{KEY_SIZE, NONCE_SIZE, PBKDF2_ITERATIONS, SALT_SIZE};

/// The public, per-room salt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Salt([u8; SALT_SIZE]);

impl Salt {
    pub fn from_bytes(bytes: [u8; SALT_SIZE]) -> Self {
        Self(bytes)
    }

    /// Fails with `KeyDerivation` unless `bytes` is exactly 16 bytes long.
    pub fn from_slice(bytes: &[u8]) -> CryptoResult<Self> {
        let arr: [u8; SALT_SIZE] = bytes.try_into().map_err(|_| {
            CryptoError::KeyDerivation(format!(
                "salt must be {SALT_SIZE} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; SALT_SIZE] {
        &self.0
    }
}

/// A 256-bit room key.
///
/// Opaque: the raw bytes never leave this crate. The key can be used for
/// AEAD operations and to commit to a verifier, nothing else.
/// Zeroized on drop.
#[derive(Clone)]
pub struct RoomKey {
    bytes: [u8; KEY_SIZE],
}

impl RoomKey {
    /// Import raw key material (e.g. a fixed key in tests or benches).
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub(crate) fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    /// AES-256-GCM encrypt. Output is ciphertext with the 16-byte tag appended.
    pub(crate) fn seal(
        &self,
        nonce: &[u8; NONCE_SIZE],
        msg: &[u8],
        aad: &[u8],
    ) -> CryptoResult<Vec<u8>> {
        let cipher = Aes256Gcm::new((&self.bytes).into());
        cipher
            .encrypt(Nonce::from_slice(nonce), Payload { msg, aad })
            .map_err(|e| CryptoError::Encoding(format!("AES-256-GCM encryption failed: {e}")))
    }

    /// AES-256-GCM decrypt. Any tag mismatch is `Authentication`.
    pub(crate) fn open(
        &self,
        nonce: &[u8; NONCE_SIZE],
        ciphertext: &[u8],
        aad: &[u8],
    ) -> CryptoResult<Vec<u8>> {
        let cipher = Aes256Gcm::new((&self.bytes).into());
        cipher
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: ciphertext,
                    aad,
                },
            )
            .map_err(|_| CryptoError::Authentication)
    }
}

impl PartialEq for RoomKey {
    fn eq(&self, other: &Self) -> bool {
        self.bytes.ct_eq(&other.bytes).into()
    }
}

impl Eq for RoomKey {}

impl Drop for RoomKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for RoomKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// PBKDF2 parameters
#[derive(Debug, Clone)]
pub struct KdfParams {
    /// HMAC-SHA256 iterations (default: 200,000)
    pub iterations: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            iterations: PBKDF2_ITERATIONS,
        }
    }
}

/// Generate a fresh random 16-byte room salt.
pub fn generate_salt() -> Salt {
    generate_salt_with(&OsRandom)
}

pub fn generate_salt_with<S: NonceSource + ?Sized>(rng: &S) -> Salt {
    let mut bytes = [0u8; SALT_SIZE];
    rng.fill(&mut bytes);
    Salt(bytes)
}

/// Derive the room key from a room code and the room's salt with the default
/// iteration count.
pub fn derive_room_key(room_code: &SecretString, salt: &[u8]) -> CryptoResult<RoomKey> {
    derive_room_key_with(room_code, salt, &KdfParams::default())
}

/// Derive the room key with explicit parameters.
///
/// Deterministic: the same room code, salt and params always produce the same key.
pub fn derive_room_key_with(
    room_code: &SecretString,
    salt: &[u8],
    params: &KdfParams,
) -> CryptoResult<RoomKey> {
    let code = room_code.expose_secret();
    if code.is_empty() {
        return Err(CryptoError::KeyDerivation("room code is empty".into()));
    }
    let salt = Salt::from_slice(salt)?;
    if params.iterations == 0 {
        return Err(CryptoError::KeyDerivation(
            "PBKDF2 iteration count must be non-zero".into(),
        ));
    }
    if params.iterations < PBKDF2_ITERATIONS {
        tracing::warn!(
            iterations = params.iterations,
            recommended = PBKDF2_ITERATIONS,
            "deriving room key with reduced PBKDF2 iteration count"
        );
    }

    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    pbkdf2::pbkdf2_hmac::<Sha256>(
        code.as_bytes(),
        salt.as_bytes(),
        params.iterations,
        &mut key[..],
    );

    Ok(RoomKey::from_bytes(*key))
}

/// HKDF-SHA256 subkey derivation with a domain-specific info string.
pub(crate) fn hkdf_derive(
    ikm: &[u8; KEY_SIZE],
    info: &[u8],
) -> CryptoResult<Zeroizing<[u8; KEY_SIZE]>> {
    let hkdf = Hkdf::<Sha256>::new(None, ikm);
    let mut okm = Zeroizing::new([0u8; KEY_SIZE]);
    hkdf.expand(info, &mut okm[..])
        .map_err(|e| CryptoError::KeyDerivation(format!("HKDF expand failed: {e}")))?;
    Ok(okm)
}
