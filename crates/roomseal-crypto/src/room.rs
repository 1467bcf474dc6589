//! Room creation and join flow

use secrecy::SecretString;

use crate::envelope::RoomMetadata;
use crate::error::{CryptoError, CryptoResult};
use crate::kdf::{derive_room_key_with, generate_salt_with, KdfParams, RoomKey};
use crate::rng::{NonceSource, OsRandom};
use crate::verifier::compute_verifier;

/// Create a new room: fresh salt, derived key, and the public verifier.
///
/// The returned metadata is what the transport stores; the key stays in memory.
pub fn create_room(room_code: &SecretString) -> CryptoResult<(RoomMetadata, RoomKey)> {
    create_room_with(room_code, &KdfParams::default(), &OsRandom)
}

pub fn create_room_with<S: NonceSource + ?Sized>(
    room_code: &SecretString,
    params: &KdfParams,
    rng: &S,
) -> CryptoResult<(RoomMetadata, RoomKey)> {
    let salt = generate_salt_with(rng);
    let key = derive_room_key_with(room_code, salt.as_bytes(), params)?;
    let verifier = compute_verifier(&key)?;

    tracing::debug!("created room metadata");
    Ok((RoomMetadata::new(&salt, Some(&verifier)), key))
}

/// Join an existing room.
///
/// When the room carries a verifier, a wrong room code is rejected here with
/// `Authentication` instead of surfacing later as undecryptable messages.
pub fn join_room(room_code: &SecretString, meta: &RoomMetadata) -> CryptoResult<RoomKey> {
    join_room_with(room_code, meta, &KdfParams::default())
}

pub fn join_room_with(
    room_code: &SecretString,
    meta: &RoomMetadata,
    params: &KdfParams,
) -> CryptoResult<RoomKey> {
    let salt = meta.salt()?;
    let key = derive_room_key_with(room_code, salt.as_bytes(), params)?;

    match meta.verifier()? {
        Some(expected) => {
            if compute_verifier(&key)? != expected {
                tracing::debug!("room code rejected by verifier");
                return Err(CryptoError::Authentication);
            }
        }
        None => tracing::debug!("room has no verifier, skipping room code check"),
    }

    Ok(key)
}
