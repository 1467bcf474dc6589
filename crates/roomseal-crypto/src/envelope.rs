//! Wire records stored by the transport
//!
//! Every user-controlled field reaches the transport as ciphertext. Binary
//! values are standard base64 so records embed cleanly in JSON documents:
//!
//! ```text
//! RoomMetadata  { salt, verifierHash? }
//! MessageRecord { ciphertext, nonce, contentType, mediaMeta? }
//! MediaMeta     { storagePath, fileName{ciphertext,nonce}, mimeType{ciphertext,nonce},
//!                 fileSize, streamNonce, chunkSize, chunkCount }
//! ```

use roomseal_core::types::ContentType;
use serde::{Deserialize, Serialize};

use crate::error::{CryptoError, CryptoResult};
use crate::kdf::{RoomKey, Salt};
use crate::message::{decrypt_message, encrypt_message_with};
use crate::metadata::{open_media_meta, seal_media_meta_with, MediaDescriptor};
use crate::rng::{NonceSource, OsRandom};
use crate::stream::StreamHeader;
use crate::verifier::VerifierHash;
use crate::NONCE_SIZE;

/// One AEAD output: ciphertext (with tag appended) and its nonce, both base64.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedEnvelope {
    pub ciphertext: String,
    pub nonce: String,
}

impl EncryptedEnvelope {
    pub(crate) fn from_parts(ciphertext: &[u8], nonce: &[u8; NONCE_SIZE]) -> Self {
        Self {
            ciphertext: base64_encode(ciphertext),
            nonce: base64_encode(nonce),
        }
    }

    /// Decode both fields. Malformed input is an `Encoding` error.
    pub fn decode(&self) -> CryptoResult<(Vec<u8>, [u8; NONCE_SIZE])> {
        let ciphertext = base64_decode(&self.ciphertext)?;
        let nonce = decode_nonce(&self.nonce)?;
        Ok((ciphertext, nonce))
    }
}

/// Public per-room values, created once at room creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomMetadata {
    pub salt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verifier_hash: Option<String>,
}

impl RoomMetadata {
    pub fn new(salt: &Salt, verifier: Option<&VerifierHash>) -> Self {
        Self {
            salt: base64_encode(salt.as_bytes()),
            verifier_hash: verifier.map(VerifierHash::to_base64),
        }
    }

    /// Decode the salt. A wrong length is a `KeyDerivation` error.
    pub fn salt(&self) -> CryptoResult<Salt> {
        Salt::from_slice(&base64_decode(&self.salt)?)
    }

    pub fn verifier(&self) -> CryptoResult<Option<VerifierHash>> {
        self.verifier_hash
            .as_deref()
            .map(VerifierHash::from_base64)
            .transpose()
    }
}

/// Encrypted fields accompanying a binary payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaMeta {
    /// Where the transport stored the encrypted blob
    pub storage_path: String,
    pub file_name: EncryptedEnvelope,
    pub mime_type: EncryptedEnvelope,
    /// Plaintext size in bytes (kept in the clear for progress display)
    pub file_size: u64,
    /// Base nonce of the chunked stream (base64)
    pub stream_nonce: String,
    pub chunk_size: u32,
    pub chunk_count: u64,
}

/// A single message as persisted by the transport.
///
/// For media messages the body carries the encrypted caption (possibly empty).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    #[serde(flatten)]
    pub body: EncryptedEnvelope,
    pub content_type: ContentType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_meta: Option<MediaMeta>,
}

/// A decrypted message record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenedMessage {
    Text(String),
    Media {
        kind: ContentType,
        caption: String,
        storage_path: String,
        descriptor: MediaDescriptor,
        header: StreamHeader,
    },
}

impl MessageRecord {
    pub fn seal_text(key: &RoomKey, text: &str) -> CryptoResult<Self> {
        Self::seal_text_with(key, text, &OsRandom)
    }

    pub fn seal_text_with<S: NonceSource + ?Sized>(
        key: &RoomKey,
        text: &str,
        rng: &S,
    ) -> CryptoResult<Self> {
        Ok(Self {
            body: encrypt_message_with(key, text, rng)?,
            content_type: ContentType::Text,
            media_meta: None,
        })
    }

    /// Build a media record. The content type is classified from the MIME type,
    /// so a media record is never tagged as text.
    pub fn seal_media(
        key: &RoomKey,
        caption: &str,
        storage_path: &str,
        descriptor: &MediaDescriptor,
        header: &StreamHeader,
    ) -> CryptoResult<Self> {
        Self::seal_media_with(key, caption, storage_path, descriptor, header, &OsRandom)
    }

    pub fn seal_media_with<S: NonceSource + ?Sized>(
        key: &RoomKey,
        caption: &str,
        storage_path: &str,
        descriptor: &MediaDescriptor,
        header: &StreamHeader,
        rng: &S,
    ) -> CryptoResult<Self> {
        Ok(Self {
            body: encrypt_message_with(key, caption, rng)?,
            content_type: ContentType::from_mime(&descriptor.mime_type),
            media_meta: Some(seal_media_meta_with(
                key,
                storage_path,
                descriptor,
                header,
                rng,
            )?),
        })
    }

    pub fn open(&self, key: &RoomKey) -> CryptoResult<OpenedMessage> {
        match (self.content_type, &self.media_meta) {
            (kind, None) if !kind.is_media() => {
                Ok(OpenedMessage::Text(decrypt_message(key, &self.body)?))
            }
            (kind, Some(_)) if !kind.is_media() => Err(CryptoError::Encoding(
                "text record must not carry media metadata".into(),
            )),
            (kind, Some(meta)) => {
                let caption = decrypt_message(key, &self.body)?;
                let (descriptor, header) = open_media_meta(key, meta)?;
                Ok(OpenedMessage::Media {
                    kind,
                    caption,
                    storage_path: meta.storage_path.clone(),
                    descriptor,
                    header,
                })
            }
            (kind, None) => Err(CryptoError::Encoding(format!(
                "{kind} record is missing media metadata"
            ))),
        }
    }

    pub fn to_json(&self) -> CryptoResult<String> {
        serde_json::to_string(self)
            .map_err(|e| CryptoError::Encoding(format!("record serialization: {e}")))
    }

    pub fn from_json(data: &str) -> CryptoResult<Self> {
        serde_json::from_str(data)
            .map_err(|e| CryptoError::Encoding(format!("record deserialization: {e}")))
    }
}

pub(crate) fn base64_encode(data: &[u8]) -> String {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    STANDARD.encode(data)
}

pub(crate) fn base64_decode(s: &str) -> CryptoResult<Vec<u8>> {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    STANDARD
        .decode(s)
        .map_err(|e| CryptoError::Encoding(format!("base64 decode: {e}")))
}

pub(crate) fn decode_nonce(s: &str) -> CryptoResult<[u8; NONCE_SIZE]> {
    let bytes = base64_decode(s)?;
    bytes.as_slice().try_into().map_err(|_| {
        CryptoError::Encoding(format!(
            "nonce must be {NONCE_SIZE} bytes, got {}",
            bytes.len()
        ))
    })
}
