//! Native `.symt` framing: a fixed header, then the payload bytes.
//!
//! | Offset | Size | Field                                   |
//! |--------|------|-----------------------------------------|
//! | 0      | 4    | magic `SYMT`                            |
//! | 4      | 1    | format major version                    |
//! | 5      | 1    | format minor version                    |
//! | 6      | 1    | [`ModelKind`]                           |
//! | 8      | 2    | [`FormatFlags`]                         |
//! | 12     | 4    | payload length as stored                |
//! | 16     | 4    | CRC32 of the stored payload             |
//! | 20     | 4    | numeric feature count                   |
//! | 24     | 4    | categorical feature count               |
//! | 28     | 4    | output count                            |
//!
//! Bytes 7, 10 and 11 are reserved and written as zero. Integers are
//! little-endian. A reader rejects foreign magic, a newer major version, a
//! short read and a checksum mismatch before decoding any payload byte.

use std::io::{Read, Write};

use thiserror::Error;

/// First four bytes of every model file.
pub const MAGIC: &[u8; 4] = b"SYMT";

pub const CURRENT_VERSION_MAJOR: u8 = 1;
pub const CURRENT_VERSION_MINOR: u8 = 0;

/// Header length in bytes.
pub const HEADER_SIZE: usize = 32;

/// Payloads at least this large are zstd-compressed when compression is on.
#[cfg(feature = "compression")]
pub const COMPRESSION_THRESHOLD: usize = 32 * 1024;

/// Default limit on a decompressed payload.
#[cfg(feature = "compression")]
pub const MAX_DECOMPRESSED_SIZE: usize = 256 * 1024 * 1024;

const OFFSET_FLAGS: usize = 8;
const OFFSET_PAYLOAD_SIZE: usize = 12;
const OFFSET_CHECKSUM: usize = 16;
const OFFSET_NUM_NUMERIC: usize = 20;
const OFFSET_NUM_CATEGORICAL: usize = 24;
const OFFSET_NUM_OUTPUTS: usize = 28;

// ============================================================================
// Kind & flags
// ============================================================================

/// What the payload encodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ModelKind {
    /// Ensemble of symmetric (oblivious) trees.
    Oblivious = 0,
}

impl ModelKind {
    pub fn from_u8(value: u8) -> Option<Self> {
        (value == Self::Oblivious as u8).then_some(Self::Oblivious)
    }
}

/// Header flag bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FormatFlags(u16);

impl FormatFlags {
    /// Stored payload is zstd-compressed.
    pub const COMPRESSED: u16 = 0b001;
    /// At least one tree has a categorical split.
    pub const HAS_CATEGORICAL: u16 = 0b010;
    /// The ensemble has more than one output lane.
    pub const MULTI_OUTPUT: u16 = 0b100;

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    #[inline]
    pub const fn bits(self) -> u16 {
        self.0
    }

    #[inline]
    pub const fn contains(self, flag: u16) -> bool {
        self.0 & flag == flag
    }

    pub fn set(&mut self, flag: u16) {
        self.0 |= flag;
    }

    pub fn clear(&mut self, flag: u16) {
        self.0 &= !flag;
    }

    fn assign(&mut self, flag: u16, on: bool) {
        if on {
            self.set(flag);
        } else {
            self.clear(flag);
        }
    }
}

// ============================================================================
// Header
// ============================================================================

/// Decoded file header. See the module docs for the byte layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatHeader {
    pub version_major: u8,
    pub version_minor: u8,
    pub model_kind: ModelKind,
    pub flags: FormatFlags,
    /// Stored (possibly compressed) payload length.
    pub payload_size: u32,
    /// CRC32 of the stored payload.
    pub checksum: u32,
    pub num_numeric_features: u32,
    pub num_categorical_features: u32,
    pub num_outputs: u32,
}

impl FormatHeader {
    /// Header at the current version. Size and checksum are set when written.
    pub fn new(
        model_kind: ModelKind,
        num_numeric_features: u32,
        num_categorical_features: u32,
        num_outputs: u32,
    ) -> Self {
        Self {
            version_major: CURRENT_VERSION_MAJOR,
            version_minor: CURRENT_VERSION_MINOR,
            model_kind,
            flags: FormatFlags::empty(),
            payload_size: 0,
            checksum: 0,
            num_numeric_features,
            num_categorical_features,
            num_outputs,
        }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[..MAGIC.len()].copy_from_slice(MAGIC);
        out[4] = self.version_major;
        out[5] = self.version_minor;
        out[6] = self.model_kind as u8;
        out[OFFSET_FLAGS..OFFSET_FLAGS + 2].copy_from_slice(&self.flags.bits().to_le_bytes());

        for (offset, value) in [
            (OFFSET_PAYLOAD_SIZE, self.payload_size),
            (OFFSET_CHECKSUM, self.checksum),
            (OFFSET_NUM_NUMERIC, self.num_numeric_features),
            (OFFSET_NUM_CATEGORICAL, self.num_categorical_features),
            (OFFSET_NUM_OUTPUTS, self.num_outputs),
        ] {
            out[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
        }
        out
    }

    pub fn from_bytes(raw: &[u8; HEADER_SIZE]) -> Result<Self, DeserializeError> {
        if !raw.starts_with(MAGIC) {
            return Err(DeserializeError::NotAModel);
        }

        let (major, minor) = (raw[4], raw[5]);
        if major > CURRENT_VERSION_MAJOR {
            return Err(DeserializeError::UnsupportedVersion { major, minor });
        }

        let model_kind = ModelKind::from_u8(raw[6]).ok_or_else(|| {
            DeserializeError::CorruptPayload(format!("unknown model kind {}", raw[6]))
        })?;

        let word = |offset: usize| {
            let mut bytes = [0u8; 4];
            bytes.copy_from_slice(&raw[offset..offset + 4]);
            u32::from_le_bytes(bytes)
        };

        Ok(Self {
            version_major: major,
            version_minor: minor,
            model_kind,
            flags: FormatFlags::from_bits(u16::from_le_bytes([
                raw[OFFSET_FLAGS],
                raw[OFFSET_FLAGS + 1],
            ])),
            payload_size: word(OFFSET_PAYLOAD_SIZE),
            checksum: word(OFFSET_CHECKSUM),
            num_numeric_features: word(OFFSET_NUM_NUMERIC),
            num_categorical_features: word(OFFSET_NUM_CATEGORICAL),
            num_outputs: word(OFFSET_NUM_OUTPUTS),
        })
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum SerializeError {
    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("payload encoding failed: {0}")]
    Encoding(#[from] postcard::Error),

    #[error("payload of {0} bytes does not fit the header size field")]
    PayloadTooLarge(usize),

    #[cfg(feature = "compression")]
    #[error("zstd compression failed: {0}")]
    Compression(std::io::Error),
}

#[derive(Debug, Error)]
pub enum DeserializeError {
    /// Magic bytes do not match.
    #[error("not a symtree model file")]
    NotAModel,

    #[error("model format {major}.{minor} is newer than supported")]
    UnsupportedVersion { major: u8, minor: u8 },

    #[error("payload checksum {actual:#010x} does not match header {expected:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("truncated input: needed {expected} bytes, found {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("corrupt payload: {0}")]
    CorruptPayload(String),

    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("payload decoding failed: {0}")]
    Decoding(#[from] postcard::Error),

    #[cfg(feature = "compression")]
    #[error("zstd decompression failed: {0}")]
    Decompression(std::io::Error),
}

/// CRC32 used for the header checksum field.
#[inline]
pub fn compute_checksum(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

/// Fill `buf` from `reader`, stopping early only at end of input.
fn read_up_to<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

// ============================================================================
// Codec
// ============================================================================

/// Frames payload bytes with a [`FormatHeader`].
#[derive(Debug, Clone)]
pub struct NativeCodec {
    /// zstd level for large payloads, `None` to always store raw bytes.
    #[cfg(feature = "compression")]
    compression_level: Option<i32>,
    #[cfg(feature = "compression")]
    max_decompressed_size: usize,
}

impl Default for NativeCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeCodec {
    /// Codec with default settings (zstd level 3 when compression is enabled).
    pub fn new() -> Self {
        Self {
            #[cfg(feature = "compression")]
            compression_level: Some(3),
            #[cfg(feature = "compression")]
            max_decompressed_size: MAX_DECOMPRESSED_SIZE,
        }
    }

    #[cfg(feature = "compression")]
    pub fn without_compression() -> Self {
        Self {
            compression_level: None,
            ..Self::new()
        }
    }

    /// Compression level, clamped to zstd's `1..=22`.
    #[cfg(feature = "compression")]
    pub fn with_compression_level(mut self, level: i32) -> Self {
        self.compression_level = Some(level.clamp(1, 22));
        self
    }

    /// Reject compressed payloads that expand past `limit` bytes.
    #[cfg(feature = "compression")]
    pub fn with_max_decompressed_size(mut self, limit: usize) -> Self {
        self.max_decompressed_size = limit;
        self
    }

    /// Bytes to store for `payload`, and whether they are compressed.
    fn pack(&self, payload: &[u8]) -> Result<(Vec<u8>, bool), SerializeError> {
        #[cfg(feature = "compression")]
        if let Some(level) = self.compression_level {
            if payload.len() >= COMPRESSION_THRESHOLD {
                let packed = zstd::encode_all(payload, level).map_err(SerializeError::Compression)?;
                return Ok((packed, true));
            }
        }
        Ok((payload.to_vec(), false))
    }

    /// Undo [`pack`](Self::pack) for a checksum-verified payload.
    fn unpack(&self, header: &FormatHeader, stored: Vec<u8>) -> Result<Vec<u8>, DeserializeError> {
        if !header.flags.contains(FormatFlags::COMPRESSED) {
            return Ok(stored);
        }
        #[cfg(feature = "compression")]
        {
            let limit = self.max_decompressed_size;
            let decoder = zstd::stream::read::Decoder::new(stored.as_slice())
                .map_err(DeserializeError::Decompression)?;
            // one byte past the limit tells an exact fit from an overflow
            let mut out = Vec::new();
            decoder
                .take(limit as u64 + 1)
                .read_to_end(&mut out)
                .map_err(DeserializeError::Decompression)?;
            if out.len() > limit {
                return Err(DeserializeError::CorruptPayload(format!(
                    "decompressed payload exceeds {limit} bytes"
                )));
            }
            Ok(out)
        }
        #[cfg(not(feature = "compression"))]
        {
            drop(stored);
            Err(DeserializeError::CorruptPayload(
                "payload is zstd-compressed but the `compression` feature is disabled".into(),
            ))
        }
    }

    /// Write `header` and `payload`.
    ///
    /// The header's size, checksum and `COMPRESSED` flag are filled in here.
    pub fn write_to<W: Write>(
        &self,
        writer: &mut W,
        header: &mut FormatHeader,
        payload: &[u8],
    ) -> Result<(), SerializeError> {
        let (stored, compressed) = self.pack(payload)?;
        header.payload_size =
            u32::try_from(stored.len()).map_err(|_| SerializeError::PayloadTooLarge(stored.len()))?;
        header.checksum = compute_checksum(&stored);
        header.flags.assign(FormatFlags::COMPRESSED, compressed);

        writer.write_all(&header.to_bytes())?;
        writer.write_all(&stored)?;
        Ok(())
    }

    /// Read a header and its payload, verified and decompressed.
    ///
    /// Input past the declared payload length is left unread.
    pub fn read_from<R: Read>(
        &self,
        reader: &mut R,
    ) -> Result<(FormatHeader, Vec<u8>), DeserializeError> {
        let mut raw = [0u8; HEADER_SIZE];
        let got = read_up_to(reader, &mut raw)?;
        if got != HEADER_SIZE {
            return Err(DeserializeError::Truncated {
                expected: HEADER_SIZE,
                actual: got,
            });
        }
        let header = FormatHeader::from_bytes(&raw)?;

        // `take` bounds the allocation by the actual input, not the size field.
        let mut stored = Vec::new();
        reader
            .take(u64::from(header.payload_size))
            .read_to_end(&mut stored)?;
        if stored.len() != header.payload_size as usize {
            return Err(DeserializeError::Truncated {
                expected: header.payload_size as usize,
                actual: stored.len(),
            });
        }

        let actual = compute_checksum(&stored);
        if actual != header.checksum {
            return Err(DeserializeError::ChecksumMismatch {
                expected: header.checksum,
                actual,
            });
        }

        Ok((header, self.unpack(&header, stored)?))
    }

    /// Postcard-encode `payload` and frame it.
    pub fn serialize<T: serde::Serialize>(
        &self,
        mut header: FormatHeader,
        payload: &T,
    ) -> Result<Vec<u8>, SerializeError> {
        let encoded = postcard::to_allocvec(payload)?;
        let mut out = Vec::with_capacity(HEADER_SIZE + encoded.len());
        self.write_to(&mut out, &mut header, &encoded)?;
        Ok(out)
    }

    /// Read a frame and postcard-decode its payload. The payload must be
    /// consumed exactly.
    pub fn deserialize<T, R>(&self, reader: &mut R) -> Result<(FormatHeader, T), DeserializeError>
    where
        T: for<'de> serde::Deserialize<'de>,
        R: Read,
    {
        let (header, bytes) = self.read_from(reader)?;
        let (value, rest) = postcard::take_from_bytes(&bytes)?;
        if !rest.is_empty() {
            return Err(DeserializeError::CorruptPayload(format!(
                "{} bytes left after the payload",
                rest.len()
            )));
        }
        Ok((header, value))
    }
}
