//! Async producer/consumer wrappers around the stream cipher
//!
//! The chunk iterators run on the blocking pool and hand results through a
//! bounded channel, so an uploader can send chunk 0 while chunk 1 is still
//! being read and encrypted. Memory stays bounded by `depth` chunks.
//! Dropping the receiving stream stops the worker at the next chunk.

use std::io::Read;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;

use crate::error::CryptoResult;
use crate::kdf::RoomKey;
use crate::rng::OsRandom;
use crate::stream::{StreamDecryptor, StreamEncryptor, StreamHeader};
use crate::NONCE_SIZE;

/// A running encryption.
pub struct EncryptPipeline {
    /// Base nonce of the stream, available before the first chunk
    pub base_nonce: [u8; NONCE_SIZE],
    /// Encrypted chunks, in order. Ends after the final chunk or the first error.
    pub chunks: ReceiverStream<CryptoResult<Vec<u8>>>,
    /// Resolves to the completed header, or `None` if the stream was aborted
    /// (an error was delivered through `chunks`, or the receiver was dropped).
    pub header: JoinHandle<Option<StreamHeader>>,
}

/// Start encrypting `reader` on the blocking pool.
pub fn spawn_encrypt<R>(
    reader: R,
    key: &RoomKey,
    chunk_size: usize,
    depth: usize,
) -> CryptoResult<EncryptPipeline>
where
    R: Read + Send + 'static,
{
    let mut encryptor = StreamEncryptor::with_options(reader, key, chunk_size, &OsRandom)?;
    let base_nonce = *encryptor.base_nonce();
    let (tx, rx) = mpsc::channel(depth.max(1));

    let header = tokio::task::spawn_blocking(move || {
        for item in encryptor.by_ref() {
            let failed = item.is_err();
            if tx.blocking_send(item).is_err() {
                tracing::debug!("encrypt pipeline receiver dropped, stopping");
                return None;
            }
            if failed {
                return None;
            }
        }
        let header = encryptor.header();
        if let Some(h) = &header {
            tracing::debug!(chunks = h.chunk_count, "encrypt pipeline finished");
        }
        header
    });

    Ok(EncryptPipeline {
        base_nonce,
        chunks: ReceiverStream::new(rx),
        header,
    })
}

/// Start decrypting `reader` on the blocking pool.
///
/// Yields verified plaintext chunks in order; the stream ends after the
/// final chunk or after the first error.
pub fn spawn_decrypt<R>(
    reader: R,
    key: &RoomKey,
    header: &StreamHeader,
    depth: usize,
) -> CryptoResult<ReceiverStream<CryptoResult<Vec<u8>>>>
where
    R: Read + Send + 'static,
{
    let decryptor = StreamDecryptor::new(reader, key, header)?;
    let (tx, rx) = mpsc::channel(depth.max(1));

    tokio::task::spawn_blocking(move || {
        for item in decryptor {
            if tx.blocking_send(item).is_err() {
                tracing::debug!("decrypt pipeline receiver dropped, stopping");
                return;
            }
        }
    });

    Ok(ReceiverStream::new(rx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CryptoError;
    use crate::stream::{decrypt_stream, ChunkedEnvelope};
    use crate::{KEY_SIZE, TAG_SIZE};
    use std::io::Cursor;
    use tokio_stream::StreamExt;

    fn test_key() -> RoomKey {
        RoomKey::from_bytes([0x21u8; KEY_SIZE])
    }

    #[tokio::test]
    async fn test_encrypt_pipeline_roundtrip() {
        let key = test_key();
        let data: Vec<u8> = (0..1000u32).map(|i| i as u8).collect();

        let mut pipeline = spawn_encrypt(Cursor::new(data.clone()), &key, 128, 2).unwrap();
        let mut blob = Vec::new();
        while let Some(chunk) = pipeline.chunks.next().await {
            blob.extend_from_slice(&chunk.unwrap());
        }
        let header = pipeline.header.await.unwrap().unwrap();

        assert_eq!(header.nonce, pipeline.base_nonce);
        assert_eq!(header.chunk_count, 8);
        assert_eq!(blob.len(), 1000 + 8 * TAG_SIZE);

        let envelope = ChunkedEnvelope { header, blob };
        assert_eq!(decrypt_stream(&envelope, &key).unwrap(), data);
    }

    #[tokio::test]
    async fn test_decrypt_pipeline_roundtrip() {
        let key = test_key();
        let data: Vec<u8> = (0..777u32).map(|i| (i * 3) as u8).collect();

        let mut pipeline = spawn_encrypt(Cursor::new(data.clone()), &key, 100, 4).unwrap();
        let mut blob = Vec::new();
        while let Some(chunk) = pipeline.chunks.next().await {
            blob.extend_from_slice(&chunk.unwrap());
        }
        let header = pipeline.header.await.unwrap().unwrap();

        let mut plain = spawn_decrypt(Cursor::new(blob), &key, &header, 1).unwrap();
        let mut out = Vec::new();
        while let Some(chunk) = plain.next().await {
            out.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(out, data);
    }

    #[tokio::test]
    async fn test_decrypt_pipeline_stops_on_tamper() {
        let key = test_key();
        let data = vec![0xEEu8; 300];

        let mut pipeline = spawn_encrypt(Cursor::new(data), &key, 100, 4).unwrap();
        let mut blob = Vec::new();
        while let Some(chunk) = pipeline.chunks.next().await {
            blob.extend_from_slice(&chunk.unwrap());
        }
        let header = pipeline.header.await.unwrap().unwrap();
        blob[TAG_SIZE + 100 + 5] ^= 0x80;

        let results: Vec<_> = spawn_decrypt(Cursor::new(blob), &key, &header, 4)
            .unwrap()
            .collect()
            .await;
        assert_eq!(results.len(), 2, "stream ends at the failing chunk");
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(CryptoError::Authentication)));
    }

    #[tokio::test]
    async fn test_dropping_receiver_aborts_encrypt() {
        let key = test_key();
        let data = vec![1u8; 10_000];

        let pipeline = spawn_encrypt(Cursor::new(data), &key, 10, 1).unwrap();
        drop(pipeline.chunks);

        assert!(pipeline.header.await.unwrap().is_none());
    }
}
