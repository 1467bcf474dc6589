//! Single-shot AES-256-GCM encryption of short text
//!
//! Every call draws a fresh random 96-bit nonce; associated data is empty.

use crate::envelope::EncryptedEnvelope;
use crate::error::{CryptoError, CryptoResult};
use crate::kdf::RoomKey;
use crate::rng::{NonceSource, OsRandom};
use crate::NONCE_SIZE;

/// Encrypt a UTF-8 message under the room key.
pub fn encrypt_message(key: &RoomKey, plaintext: &str) -> CryptoResult<EncryptedEnvelope> {
    encrypt_message_with(key, plaintext, &OsRandom)
}

/// Encrypt with an injected nonce source.
pub fn encrypt_message_with<S: NonceSource + ?Sized>(
    key: &RoomKey,
    plaintext: &str,
    rng: &S,
) -> CryptoResult<EncryptedEnvelope> {
    let mut nonce = [0u8; NONCE_SIZE];
    rng.fill(&mut nonce);

    let ciphertext = key.seal(&nonce, plaintext.as_bytes(), &[])?;
    Ok(EncryptedEnvelope::from_parts(&ciphertext, &nonce))
}

/// Decrypt an envelope produced by [`encrypt_message`].
///
/// Fails with `Authentication` on a wrong key, wrong nonce, or tampered
/// ciphertext. No plaintext is returned on failure.
pub fn decrypt_message(key: &RoomKey, envelope: &EncryptedEnvelope) -> CryptoResult<String> {
    let (ciphertext, nonce) = envelope.decode()?;
    let plaintext = key.open(&nonce, &ciphertext, &[])?;
    String::from_utf8(plaintext)
        .map_err(|_| CryptoError::Encoding("decrypted message is not UTF-8".into()))
}
