//! Minimal RIFF/WAVE codec for 8-bit unsigned mono PCM.
//!
//! Layout written by the encoder (all integers little-endian):
//!
//! ```text
//! offset  size  field
//!      0     4  "RIFF"
//!      4     4  36 + data_size
//!      8     4  "WAVE"
//!     12     4  "fmt "
//!     16     4  16
//!     20     2  audio_format = 1 (PCM)
//!     22     2  channels = 1
//!     24     4  sample_rate
//!     28     4  byte_rate = sample_rate
//!     32     2  block_align = 1
//!     34     2  bits_per_sample = 8
//!     36     4  "data"
//!     40     4  data_size
//!     44     …  samples
//! ```
//!
//! The decoder accepts extra chunks between `fmt ` and `data` and skips
//! them by their declared size. Anything that is not PCM, mono, 8-bit is
//! rejected, never converted.

#[cfg(feature = "std")]
use std::path::Path;

/// Size of the header written by [`header`].
pub const HEADER_LEN: usize = 44;

/// `audio_format` value for uncompressed PCM.
pub const FORMAT_PCM: u16 = 1;

const FMT_CHUNK_LEN: u32 = 16;

/// Largest data chunk whose RIFF size (`36 + len`) still fits in 32 bits.
pub const MAX_DATA_LEN: usize = (u32::MAX - 36) as usize;

/// Malformed or unsupported container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WavError {
    /// First four bytes are not `RIFF`
    BadRiffMagic,
    /// RIFF form type is not `WAVE`
    BadWaveMagic,
    /// `fmt ` chunk does not follow the RIFF header
    MissingFmt,
    /// `fmt ` chunk is shorter than the 16-byte PCM record
    FmtTooShort(u32),
    /// audio_format is not 1
    NotPcm(u16),
    /// channels is not 1
    NotMono(u16),
    /// bits_per_sample is not 8
    Not8Bit(u16),
    /// Stream ended before a `data` chunk
    MissingData,
    /// A header field or the data chunk is cut short
    Truncated,
    /// Sample buffer too large for a RIFF container
    TooLarge,
    /// Output buffer cannot hold header plus samples
    BufferTooSmall { needed: usize },
}

impl core::fmt::Display for WavError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::BadRiffMagic => f.write_str("not a RIFF file"),
            Self::BadWaveMagic => f.write_str("not a WAVE file"),
            Self::MissingFmt => f.write_str("fmt chunk missing"),
            Self::FmtTooShort(len) => write!(f, "fmt chunk too short ({} bytes)", len),
            Self::NotPcm(format) => write!(f, "not PCM (audio format {})", format),
            Self::NotMono(ch) => write!(f, "expected mono, found {} channels", ch),
            Self::Not8Bit(bits) => write!(f, "expected 8-bit PCM, found {} bits", bits),
            Self::MissingData => f.write_str("data chunk missing"),
            Self::Truncated => f.write_str("file truncated"),
            Self::TooLarge => f.write_str("sample data too large for WAV"),
            Self::BufferTooSmall { needed } => write!(f, "output buffer needs {} bytes", needed),
        }
    }
}

/// Validated stream parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavDescriptor {
    pub sample_rate: u32,
    pub sample_count: u32,
}

impl WavDescriptor {
    pub const CHANNELS: u16 = 1;
    pub const BITS_PER_SAMPLE: u16 = 8;
    pub const AUDIO_FORMAT: u16 = FORMAT_PCM;

    /// Playing time in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        self.sample_count as u64 * 1000 / self.sample_rate as u64
    }
}

/// A decoded file borrowing its samples from the input bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wav<'a> {
    pub descriptor: WavDescriptor,
    pub samples: &'a [u8],
}

/// Sequential little-endian reader over the container bytes.
struct ChunkReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ChunkReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(len)?;
        let out = self.bytes.get(self.pos..end)?;
        self.pos = end;
        Some(out)
    }

    fn tag(&mut self) -> Option<[u8; 4]> {
        self.take(4).map(|b| [b[0], b[1], b[2], b[3]])
    }

    fn u32_le(&mut self) -> Option<u32> {
        self.take(4).map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn skip(&mut self, len: u32) -> Option<()> {
        self.take(len as usize).map(|_| ())
    }
}

fn u16_at(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

fn u32_at(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]])
}

/// Decode a complete file held in memory.
pub fn decode(bytes: &[u8]) -> Result<Wav<'_>, WavError> {
    let mut r = ChunkReader::new(bytes);

    if r.tag() != Some(*b"RIFF") {
        return Err(WavError::BadRiffMagic);
    }
    // Overall size: read, not trusted.
    r.u32_le().ok_or(WavError::Truncated)?;
    if r.tag() != Some(*b"WAVE") {
        return Err(WavError::BadWaveMagic);
    }
    if r.tag() != Some(*b"fmt ") {
        return Err(WavError::MissingFmt);
    }

    let fmt_len = r.u32_le().ok_or(WavError::Truncated)?;
    if fmt_len < FMT_CHUNK_LEN {
        return Err(WavError::FmtTooShort(fmt_len));
    }
    let fmt = r.take(fmt_len as usize).ok_or(WavError::Truncated)?;

    let audio_format = u16_at(fmt, 0);
    let channels = u16_at(fmt, 2);
    let sample_rate = u32_at(fmt, 4);
    // byte_rate (8..12) and block_align (12..14) are derived values; ignored.
    let bits = u16_at(fmt, 14);

    if audio_format != FORMAT_PCM {
        return Err(WavError::NotPcm(audio_format));
    }
    if channels != WavDescriptor::CHANNELS {
        return Err(WavError::NotMono(channels));
    }
    if bits != WavDescriptor::BITS_PER_SAMPLE {
        return Err(WavError::Not8Bit(bits));
    }

    loop {
        match r.tag() {
            Some(tag) if &tag == b"data" => break,
            Some(_) => {
                let skip = r.u32_le().ok_or(WavError::MissingData)?;
                r.skip(skip).ok_or(WavError::MissingData)?;
            }
            None => return Err(WavError::MissingData),
        }
    }

    let data_len = r.u32_le().ok_or(WavError::Truncated)?;
    let samples = r.take(data_len as usize).ok_or(WavError::Truncated)?;

    Ok(Wav {
        descriptor: WavDescriptor {
            sample_rate,
            sample_count: data_len,
        },
        samples,
    })
}

/// Canonical 44-byte header for `data_len` samples at `sample_rate`.
///
/// `data_len` must not exceed [`MAX_DATA_LEN`].
pub fn header(data_len: u32, sample_rate: u32) -> [u8; HEADER_LEN] {
    let mut h = [0u8; HEADER_LEN];
    let byte_rate = sample_rate; // 1 channel × 1 byte per sample
    let block_align: u16 = 1;

    h[0..4].copy_from_slice(b"RIFF");
    h[4..8].copy_from_slice(&(36 + data_len).to_le_bytes());
    h[8..12].copy_from_slice(b"WAVE");
    h[12..16].copy_from_slice(b"fmt ");
    h[16..20].copy_from_slice(&FMT_CHUNK_LEN.to_le_bytes());
    h[20..22].copy_from_slice(&FORMAT_PCM.to_le_bytes());
    h[22..24].copy_from_slice(&WavDescriptor::CHANNELS.to_le_bytes());
    h[24..28].copy_from_slice(&sample_rate.to_le_bytes());
    h[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    h[32..34].copy_from_slice(&block_align.to_le_bytes());
    h[34..36].copy_from_slice(&WavDescriptor::BITS_PER_SAMPLE.to_le_bytes());
    h[36..40].copy_from_slice(b"data");
    h[40..44].copy_from_slice(&data_len.to_le_bytes());
    h
}

fn data_len(samples: &[u8]) -> Result<u32, WavError> {
    if samples.len() > MAX_DATA_LEN {
        return Err(WavError::TooLarge);
    }
    Ok(samples.len() as u32)
}

/// Encode into `out` without allocating. Returns the bytes written.
pub fn encode_into(samples: &[u8], sample_rate: u32, out: &mut [u8]) -> Result<usize, WavError> {
    let len = data_len(samples)?;
    let needed = HEADER_LEN + samples.len();
    if out.len() < needed {
        return Err(WavError::BufferTooSmall { needed });
    }
    out[..HEADER_LEN].copy_from_slice(&header(len, sample_rate));
    out[HEADER_LEN..needed].copy_from_slice(samples);
    Ok(needed)
}

/// Encode into a new byte vector.
#[cfg(feature = "std")]
pub fn encode(samples: &[u8], sample_rate: u32) -> Result<Vec<u8>, WavError> {
    let len = data_len(samples)?;
    let mut out = Vec::with_capacity(HEADER_LEN + samples.len());
    out.extend_from_slice(&header(len, sample_rate));
    out.extend_from_slice(samples);
    Ok(out)
}

/// Load a whole file and decode it. Returns the samples and sample rate.
#[cfg(feature = "std")]
pub fn read_wav(path: impl AsRef<Path>) -> Result<(Vec<u8>, u32), crate::AudioError> {
    let bytes = std::fs::read(path)?;
    let wav = decode(&bytes)?;
    Ok((wav.samples.to_vec(), wav.descriptor.sample_rate))
}

/// Write `samples` as a complete file, replacing any existing one.
///
/// Returns the file size in bytes.
#[cfg(feature = "std")]
pub fn write_wav(
    path: impl AsRef<Path>,
    samples: &[u8],
    sample_rate: u32,
) -> Result<u64, crate::AudioError> {
    use std::io::Write;

    let len = data_len(samples)?;
    let mut file = std::fs::File::create(path)?;
    file.write_all(&header(len, sample_rate))?;
    file.write_all(samples)?;
    file.flush()?;
    Ok(file.metadata()?.len())
}
