//! Chunked AES-256-GCM encryption for large binary payloads
//!
//! Encrypted blob format (binary):
//! ```text
//! [chunk 0: ciphertext + 16-byte tag][chunk 1: ...]...[chunk n-1: ...]
//! nonce(i) = base_nonce XOR (i as u32 BE in the low 4 bytes)
//! AAD(i)   = chunk_index (8 bytes, big-endian) || final flag (1 byte)
//! ```
//!
//! Every chunk but the last holds exactly `chunk_size` plaintext bytes. An
//! empty payload is encoded as a single empty final chunk.
//!
//! The nonce makes every chunk of every stream unique under the room key.
//! The AAD binds each chunk to its position and marks the end of the stream,
//! so reordering, replaying at another index, or truncating the chunk list
//! fails authentication.

use std::io::{ErrorKind, Read, Write};

use crate::envelope::{base64_encode, decode_nonce};
use crate::error::{CryptoError, CryptoResult};
use crate::kdf::RoomKey;
use crate::rng::{NonceSource, OsRandom};
use crate::{DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE, NONCE_SIZE, TAG_SIZE};

/// Framing parameters the receiver needs to decrypt a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamHeader {
    /// Random base nonce, generated once per stream
    pub nonce: [u8; NONCE_SIZE],
    /// Plaintext bytes per chunk
    pub chunk_size: u32,
    /// Number of chunks in the blob (always >= 1)
    pub chunk_count: u64,
}

impl StreamHeader {
    pub fn nonce_base64(&self) -> String {
        base64_encode(&self.nonce)
    }

    pub fn from_wire(nonce_b64: &str, chunk_size: u32, chunk_count: u64) -> CryptoResult<Self> {
        Ok(Self {
            nonce: decode_nonce(nonce_b64)?,
            chunk_size,
            chunk_count,
        })
    }

    /// Size of the encrypted blob this header describes, given the plaintext size.
    pub fn encrypted_len(&self, plaintext_len: u64) -> u64 {
        plaintext_len + self.chunk_count * TAG_SIZE as u64
    }
}

/// A fully materialized chunked stream: header plus the concatenated chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedEnvelope {
    pub header: StreamHeader,
    pub blob: Vec<u8>,
}

/// Pull-based encryptor: yields one encrypted chunk per `next()`.
///
/// Holds at most two plaintext chunks in memory (the current one and a
/// one-chunk lookahead used to detect the final chunk). Not restartable:
/// after the final chunk or the first error it yields `None`.
pub struct StreamEncryptor<R> {
    key: RoomKey,
    reader: R,
    base_nonce: [u8; NONCE_SIZE],
    chunk_size: usize,
    index: u64,
    lookahead: Option<Vec<u8>>,
    done: bool,
    finished: bool,
}

impl<R: Read> StreamEncryptor<R> {
    /// Encryptor with the default 2 MiB chunk size and OS randomness.
    pub fn new(reader: R, key: &RoomKey) -> Self {
        let mut base_nonce = [0u8; NONCE_SIZE];
        OsRandom.fill(&mut base_nonce);
        Self::from_parts(reader, key, base_nonce, DEFAULT_CHUNK_SIZE)
    }

    /// Encryptor with an explicit chunk size and nonce source.
    pub fn with_options<S: NonceSource + ?Sized>(
        reader: R,
        key: &RoomKey,
        chunk_size: usize,
        rng: &S,
    ) -> CryptoResult<Self> {
        check_chunk_size(chunk_size)?;
        let mut base_nonce = [0u8; NONCE_SIZE];
        rng.fill(&mut base_nonce);
        Ok(Self::from_parts(reader, key, base_nonce, chunk_size))
    }

    fn from_parts(reader: R, key: &RoomKey, base_nonce: [u8; NONCE_SIZE], chunk_size: usize) -> Self {
        Self {
            key: key.clone(),
            reader,
            base_nonce,
            chunk_size,
            index: 0,
            lookahead: None,
            done: false,
            finished: false,
        }
    }

    /// The stream's base nonce, known before any chunk is produced.
    pub fn base_nonce(&self) -> &[u8; NONCE_SIZE] {
        &self.base_nonce
    }

    /// The completed header. `None` until the final chunk has been yielded.
    pub fn header(&self) -> Option<StreamHeader> {
        self.finished.then(|| StreamHeader {
            nonce: self.base_nonce,
            chunk_size: self.chunk_size as u32,
            chunk_count: self.index,
        })
    }

    fn next_chunk(&mut self) -> CryptoResult<Vec<u8>> {
        let current = match self.lookahead.take() {
            Some(chunk) => chunk,
            None => read_up_to(&mut self.reader, self.chunk_size)?,
        };

        // A short read means the source is exhausted; a full one needs a
        // lookahead to know whether more data follows.
        let next = if current.len() < self.chunk_size {
            None
        } else {
            let chunk = read_up_to(&mut self.reader, self.chunk_size)?;
            (!chunk.is_empty()).then_some(chunk)
        };
        let is_final = next.is_none();

        let nonce = chunk_nonce(&self.base_nonce, self.index)?;
        let aad = build_aad(self.index, is_final);
        let ciphertext = self.key.seal(&nonce, &current, &aad)?;

        tracing::trace!(index = self.index, len = current.len(), is_final, "encrypted chunk");

        self.index += 1;
        self.lookahead = next;
        if is_final {
            self.finished = true;
            self.done = true;
        }
        Ok(ciphertext)
    }
}

impl<R: Read> Iterator for StreamEncryptor<R> {
    type Item = CryptoResult<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let result = self.next_chunk();
        if result.is_err() {
            self.done = true;
        }
        Some(result)
    }
}

/// Pull-based decryptor: yields one verified plaintext chunk per `next()`.
///
/// Stops permanently at the first chunk that fails to verify. A blob that
/// ends early or carries bytes past the final chunk fails as `Authentication`.
pub struct StreamDecryptor<R> {
    key: RoomKey,
    reader: R,
    header: StreamHeader,
    index: u64,
    done: bool,
}

impl<R: Read> StreamDecryptor<R> {
    pub fn new(reader: R, key: &RoomKey, header: &StreamHeader) -> CryptoResult<Self> {
        check_chunk_size(header.chunk_size as usize)?;
        if header.chunk_count == 0 {
            return Err(CryptoError::Encoding("stream has no chunks".into()));
        }
        if header.chunk_count > u64::from(u32::MAX) + 1 {
            return Err(CryptoError::Encoding(format!(
                "stream chunk count {} exceeds limit",
                header.chunk_count
            )));
        }
        Ok(Self {
            key: key.clone(),
            reader,
            header: *header,
            index: 0,
            done: false,
        })
    }

    fn next_chunk(&mut self) -> CryptoResult<Vec<u8>> {
        let is_final = self.index + 1 == self.header.chunk_count;
        let frame_len = self.header.chunk_size as usize + TAG_SIZE;

        let frame = read_up_to(&mut self.reader, frame_len)?;
        if frame.len() < TAG_SIZE || (!is_final && frame.len() < frame_len) {
            tracing::debug!(index = self.index, len = frame.len(), "stream truncated");
            return Err(CryptoError::Authentication);
        }
        if is_final && !read_up_to(&mut self.reader, 1)?.is_empty() {
            tracing::debug!(index = self.index, "trailing data after final chunk");
            return Err(CryptoError::Authentication);
        }

        let nonce = chunk_nonce(&self.header.nonce, self.index)?;
        let aad = build_aad(self.index, is_final);
        let plaintext = self.key.open(&nonce, &frame, &aad).inspect_err(|_| {
            tracing::debug!(index = self.index, "chunk failed authentication");
        })?;

        self.index += 1;
        if is_final {
            self.done = true;
        }
        Ok(plaintext)
    }
}

impl<R: Read> Iterator for StreamDecryptor<R> {
    type Item = CryptoResult<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let result = self.next_chunk();
        if result.is_err() {
            self.done = true;
        }
        Some(result)
    }
}

/// Encrypt an entire source into an in-memory [`ChunkedEnvelope`].
pub fn encrypt_stream<R: Read>(source: R, key: &RoomKey) -> CryptoResult<ChunkedEnvelope> {
    let mut encryptor = StreamEncryptor::new(source, key);
    let mut blob = Vec::new();
    for chunk in encryptor.by_ref() {
        blob.extend_from_slice(&chunk?);
    }
    let header = encryptor
        .header()
        .ok_or_else(|| CryptoError::Encoding("stream ended without a final chunk".into()))?;
    Ok(ChunkedEnvelope { header, blob })
}

/// Decrypt an in-memory [`ChunkedEnvelope`]. Returns nothing unless every chunk verifies.
pub fn decrypt_stream(envelope: &ChunkedEnvelope, key: &RoomKey) -> CryptoResult<Vec<u8>> {
    let decryptor = StreamDecryptor::new(envelope.blob.as_slice(), key, &envelope.header)?;
    let mut plaintext = Vec::with_capacity(envelope.blob.len());
    for chunk in decryptor {
        plaintext.extend_from_slice(&chunk?);
    }
    Ok(plaintext)
}

/// Decrypt from a reader into a writer, one verified chunk at a time.
///
/// Returns the number of plaintext bytes written. Only authenticated chunks
/// reach `sink`; on failure the caller should discard what was written.
pub fn decrypt_stream_to<R: Read, W: Write>(
    source: R,
    header: &StreamHeader,
    key: &RoomKey,
    mut sink: W,
) -> CryptoResult<u64> {
    let mut written = 0u64;
    for chunk in StreamDecryptor::new(source, key, header)? {
        let chunk = chunk?;
        sink.write_all(&chunk)?;
        written += chunk.len() as u64;
    }
    sink.flush()?;
    Ok(written)
}

/// Chunk sizes come from untrusted headers and size every read buffer.
fn check_chunk_size(chunk_size: usize) -> CryptoResult<()> {
    if chunk_size == 0 || chunk_size > MAX_CHUNK_SIZE {
        return Err(CryptoError::Encoding(format!(
            "invalid chunk size: {chunk_size} (must be between 1 and {MAX_CHUNK_SIZE})"
        )));
    }
    Ok(())
}

/// Fold the chunk index into the low 32 bits of the base nonce.
fn chunk_nonce(base: &[u8; NONCE_SIZE], index: u64) -> CryptoResult<[u8; NONCE_SIZE]> {
    let counter = u32::try_from(index)
        .map_err(|_| CryptoError::Encoding(format!("chunk index {index} exceeds stream limit")))?;
    let mut nonce = *base;
    for (n, c) in nonce[NONCE_SIZE - 4..].iter_mut().zip(counter.to_be_bytes()) {
        *n ^= c;
    }
    Ok(nonce)
}

/// Build AAD: chunk_index (8 bytes BE) || final flag (1 byte)
fn build_aad(index: u64, is_final: bool) -> [u8; 9] {
    let mut aad = [0u8; 9];
    aad[..8].copy_from_slice(&index.to_be_bytes());
    aad[8] = u8::from(is_final);
    aad
}

/// Read until `limit` bytes are buffered or the reader hits EOF.
fn read_up_to<R: Read>(reader: &mut R, limit: usize) -> CryptoResult<Vec<u8>> {
    let mut buf = vec![0u8; limit];
    let mut filled = 0;
    while filled < limit {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    buf.truncate(filled);
    Ok(buf)
}
