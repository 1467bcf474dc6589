//! Encryption of the small fields that accompany a binary payload
//!
//! File name and MIME type are each sealed with the message cipher under
//! their own fresh nonce, independent of each other and of the payload's
//! stream nonce. The file size stays in the clear.

use crate::envelope::MediaMeta;
use crate::error::CryptoResult;
use crate::kdf::RoomKey;
use crate::message::{decrypt_message, encrypt_message_with};
use crate::rng::{NonceSource, OsRandom};
use crate::stream::StreamHeader;

/// Plaintext description of a media payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaDescriptor {
    pub file_name: String,
    pub mime_type: String,
    pub file_size: u64,
}

pub fn seal_media_meta(
    key: &RoomKey,
    storage_path: &str,
    descriptor: &MediaDescriptor,
    header: &StreamHeader,
) -> CryptoResult<MediaMeta> {
    seal_media_meta_with(key, storage_path, descriptor, header, &OsRandom)
}

pub fn seal_media_meta_with<S: NonceSource + ?Sized>(
    key: &RoomKey,
    storage_path: &str,
    descriptor: &MediaDescriptor,
    header: &StreamHeader,
    rng: &S,
) -> CryptoResult<MediaMeta> {
    Ok(MediaMeta {
        storage_path: storage_path.to_string(),
        file_name: encrypt_message_with(key, &descriptor.file_name, rng)?,
        mime_type: encrypt_message_with(key, &descriptor.mime_type, rng)?,
        file_size: descriptor.file_size,
        stream_nonce: header.nonce_base64(),
        chunk_size: header.chunk_size,
        chunk_count: header.chunk_count,
    })
}

/// Decrypt the metadata fields and recover the stream header.
pub fn open_media_meta(
    key: &RoomKey,
    meta: &MediaMeta,
) -> CryptoResult<(MediaDescriptor, StreamHeader)> {
    let descriptor = MediaDescriptor {
        file_name: decrypt_message(key, &meta.file_name)?,
        mime_type: decrypt_message(key, &meta.mime_type)?,
        file_size: meta.file_size,
    };
    let header = StreamHeader::from_wire(&meta.stream_nonce, meta.chunk_size, meta.chunk_count)?;
    Ok((descriptor, header))
}
