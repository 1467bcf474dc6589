//! roomseal-crypto: client-side encryption for shared-secret rooms
//!
//! Two parties who know the same room code derive the same room key and
//! exchange opaque envelopes through an untrusted transport.
//!
//! Key hierarchy:
//! ```text
//! Room Key (256-bit, PBKDF2-HMAC-SHA256 from room code + 16-byte salt, 200k iterations)
//!   ├── Message AEAD: AES-256-GCM (nonce=random_96bit, AAD=empty)
//!   ├── Metadata AEAD: same as messages, one nonce per field
//!   ├── Stream AEAD: AES-256-GCM (nonce=base_nonce XOR chunk_idx, AAD=chunk_idx||final)
//!   └── Verifier: SHA-256(HKDF(room key, "roomseal-verifier-v1"))
//! ```

pub mod envelope;
pub mod error;
pub mod kdf;
pub mod message;
pub mod metadata;
pub mod pipeline;
pub mod rng;
pub mod room;
pub mod stream;
pub mod verifier;

pub use envelope::{EncryptedEnvelope, MediaMeta, MessageRecord, OpenedMessage, RoomMetadata};
pub use error::{CryptoError, CryptoResult};
pub use kdf::{derive_room_key, derive_room_key_with, generate_salt, KdfParams, RoomKey, Salt};
pub use message::{decrypt_message, encrypt_message};
pub use metadata::{open_media_meta, seal_media_meta, MediaDescriptor};
pub use pipeline::{spawn_decrypt, spawn_encrypt, EncryptPipeline};
pub use rng::{CounterSource, NonceSource, OsRandom};
pub use room::{create_room, create_room_with, join_room, join_room_with};
pub use stream::{
    decrypt_stream, decrypt_stream_to, encrypt_stream, ChunkedEnvelope, StreamDecryptor,
    StreamEncryptor, StreamHeader,
};
pub use verifier::{compute_verifier, verify_room_code, verify_room_code_with, VerifierHash};

/// Size of a room key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of an AES-GCM nonce (96-bit)
pub const NONCE_SIZE: usize = 12;

/// Size of a GCM authentication tag
pub const TAG_SIZE: usize = 16;

/// Size of a room salt
pub const SALT_SIZE: usize = 16;

/// PBKDF2 iteration count. Versioned with the wire format; never lower it.
pub const PBKDF2_ITERATIONS: u32 = 200_000;

/// Plaintext bytes per stream chunk (2 MiB)
pub const DEFAULT_CHUNK_SIZE: usize = 2 * 1024 * 1024;

/// Largest chunk size accepted from a stream header (64 MiB)
pub use roomseal_core::config::MAX_CHUNK_SIZE;
