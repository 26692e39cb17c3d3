//! Length-prefixed packing of several photos into one stored blob.
//!
//! Layout, all integers little-endian `u32`:
//!
//! ```text
//! count | len_0 | bytes_0 | len_1 | bytes_1 | ...
//! ```
//!
//! The layout is frozen: existing rows are decoded with exactly this framing,
//! so any change must bump [`PHOTO_BLOB_FORMAT`].

use thiserror::Error;

/// On-disk format version of the photo blob layout.
pub const PHOTO_BLOB_FORMAT: u32 = 1;

const HEADER_LEN: usize = 4;

/// Errors raised while packing or unpacking a photo blob.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The buffer is too short to hold the photo count.
    #[error("photo blob truncated: {len} bytes, need at least 4 for the count")]
    MissingCount {
        /// Length of the rejected buffer.
        len: usize,
    },
    /// A length header for entry `index` is cut off.
    #[error("photo blob truncated in length header of entry {index} at offset {offset}")]
    TruncatedLength {
        /// Zero-based entry index.
        index: usize,
        /// Byte offset where the header starts.
        offset: usize,
    },
    /// Entry `index` declares more bytes than remain.
    #[error("photo entry {index} declares {declared} bytes but only {available} remain")]
    Overrun {
        /// Zero-based entry index.
        index: usize,
        /// Declared payload length.
        declared: usize,
        /// Bytes left in the buffer.
        available: usize,
    },
    /// Bytes remain after the last declared entry (strict decoding only).
    #[error("{extra} trailing bytes after the last photo entry")]
    TrailingBytes {
        /// Number of unread bytes.
        extra: usize,
    },
    /// A count or length does not fit the 32-bit header.
    #[error("photo blob field exceeds u32: {0}")]
    TooLarge(usize),
}

/// Packs `buffers` into one blob.
pub fn encode<B: AsRef<[u8]>>(buffers: &[B]) -> Result<Vec<u8>, CodecError> {
    let count = u32::try_from(buffers.len()).map_err(|_| CodecError::TooLarge(buffers.len()))?;
    let payload: usize = buffers.iter().map(|b| HEADER_LEN + b.as_ref().len()).sum();

    let mut out = Vec::with_capacity(HEADER_LEN + payload);
    out.extend_from_slice(&count.to_le_bytes());
    for buf in buffers {
        let bytes = buf.as_ref();
        let len = u32::try_from(bytes.len()).map_err(|_| CodecError::TooLarge(bytes.len()))?;
        out.extend_from_slice(&len.to_le_bytes());
        out.extend_from_slice(bytes);
    }
    Ok(out)
}

/// Unpacks a blob, ignoring any bytes after the last declared entry.
pub fn decode(blob: &[u8]) -> Result<Vec<Vec<u8>>, CodecError> {
    decode_entries(blob).map(|(photos, _)| photos)
}

/// Unpacks a blob and rejects trailing bytes.
pub fn decode_exact(blob: &[u8]) -> Result<Vec<Vec<u8>>, CodecError> {
    let (photos, consumed) = decode_entries(blob)?;
    if consumed != blob.len() {
        return Err(CodecError::TrailingBytes {
            extra: blob.len() - consumed,
        });
    }
    Ok(photos)
}

/// Reads only the count header.
pub fn photo_count(blob: &[u8]) -> Result<usize, CodecError> {
    read_u32(blob, 0)
        .map(|c| c as usize)
        .ok_or(CodecError::MissingCount { len: blob.len() })
}

fn decode_entries(blob: &[u8]) -> Result<(Vec<Vec<u8>>, usize), CodecError> {
    let count = photo_count(blob)?;
    let mut cursor = HEADER_LEN;

    // Every entry needs at least a 4-byte header.
    let mut photos = Vec::with_capacity(count.min((blob.len() - cursor) / HEADER_LEN));
    for index in 0..count {
        let declared = read_u32(blob, cursor).ok_or(CodecError::TruncatedLength {
            index,
            offset: cursor,
        })? as usize;
        cursor += HEADER_LEN;

        let available = blob.len() - cursor;
        if declared > available {
            return Err(CodecError::Overrun {
                index,
                declared,
                available,
            });
        }
        photos.push(blob[cursor..cursor + declared].to_vec());
        cursor += declared;
    }
    Ok((photos, cursor))
}

fn read_u32(blob: &[u8], offset: usize) -> Option<u32> {
    let end = offset.checked_add(HEADER_LEN)?;
    let bytes: [u8; 4] = blob.get(offset..end)?.try_into().ok()?;
    Some(u32::from_le_bytes(bytes))
}

/// Encoded photo set attached to a check-in. Opaque to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoBlob {
    /// Raw encoded bytes, exactly as persisted.
    pub bytes: Vec<u8>,
}

impl PhotoBlob {
    /// Encodes `photos` into a new blob.
    pub fn encode<B: AsRef<[u8]>>(photos: &[B]) -> Result<Self, CodecError> {
        encode(photos).map(|bytes| Self { bytes })
    }

    /// Wraps bytes loaded from storage without validating them.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Decodes the contained photos.
    pub fn decode(&self) -> Result<Vec<Vec<u8>>, CodecError> {
        decode(&self.bytes)
    }

    /// Number of photos declared in the header.
    pub fn photo_count(&self) -> Result<usize, CodecError> {
        photo_count(&self.bytes)
    }

    /// Encoded size in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True when the blob holds no bytes at all (not even a count).
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
