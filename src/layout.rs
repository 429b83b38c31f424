//! Sample layout conversion between the host library and the codec.
//!
//! The host library hands out and expects pixel-interleaved samples
//! (`RGBRGB...`). A codec configured for [`InterleaveMode::None`] reads and
//! writes one plane per component instead (`RR..GG..BB..`). Line and sample
//! interleaved scans are reordered by the codec itself, so samples pass
//! through unchanged for them.

use crate::InterleaveMode;
use crate::error::JpeglsError;
use crate::header::bits_class;

/// Samples of an image at their native element width.
///
/// Whether the samples are pixel-interleaved or planar is up to the
/// caller to track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PixelBuffer {
    Eight(Vec<u8>),
    Sixteen(Vec<u16>),
}

impl PixelBuffer {
    pub fn len(&self) -> usize {
        match self {
            Self::Eight(samples) => samples.len(),
            Self::Sixteen(samples) => samples.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Converts to the element width for `bits_per_sample`.
    ///
    /// Values are copied as they are; narrowing keeps the low byte.
    pub fn with_bits_per_sample(self, bits_per_sample: u8) -> Self {
        match (self, bits_class(bits_per_sample)) {
            (Self::Sixteen(samples), 8) => Self::Eight(samples.into_iter().map(|s| s as u8).collect()),
            (Self::Eight(samples), 16) => Self::Sixteen(samples.into_iter().map(u16::from).collect()),
            (buffer, _) => buffer,
        }
    }

    /// Reads a codec buffer; 16-bit samples are stored in native byte order.
    pub fn from_codec_bytes(bytes: &[u8], bits_per_sample: u8) -> Self {
        if bits_class(bits_per_sample) == 8 {
            Self::Eight(bytes.to_vec())
        } else {
            Self::Sixteen(
                bytes
                    .chunks_exact(2)
                    .map(|pair| u16::from_ne_bytes([pair[0], pair[1]]))
                    .collect(),
            )
        }
    }

    /// The byte buffer a codec reads these samples from.
    pub fn to_codec_bytes(&self) -> Vec<u8> {
        match self {
            Self::Eight(samples) => samples.clone(),
            Self::Sixteen(samples) => samples.iter().flat_map(|s| s.to_ne_bytes()).collect(),
        }
    }

    fn transposed(&self, row_length: usize) -> Self {
        match self {
            Self::Eight(samples) => Self::Eight(transpose(samples, row_length)),
            Self::Sixteen(samples) => Self::Sixteen(transpose(samples, row_length)),
        }
    }
}

/// Reads `samples` as consecutive rows of `row_length` samples and returns
/// the column-major reading of that matrix.
///
/// # Panics
/// If `row_length` is zero or does not divide the number of samples.
pub fn transpose<T: Copy>(samples: &[T], row_length: usize) -> Vec<T> {
    assert!(
        row_length != 0 && samples.len() % row_length == 0,
        "row length {} does not divide {} samples",
        row_length,
        samples.len()
    );
    let rows = samples.len() / row_length;
    let mut transposed = Vec::with_capacity(samples.len());
    for column in 0..row_length {
        transposed.extend((0..rows).map(|row| samples[row * row_length + column]));
    }
    transposed
}

// A partial last pixel is reported against the nearest whole-pixel length above it.
fn check_component_count(buffer: &PixelBuffer, component_count: usize) -> Result<(), JpeglsError> {
    if component_count == 0 {
        return Err(JpeglsError::Geometry("zero component count"));
    }
    if buffer.len() % component_count != 0 {
        return Err(JpeglsError::BufferSize {
            expected: buffer.len().div_ceil(component_count) * component_count,
            actual: buffer.len(),
        });
    }
    Ok(())
}

/// Rearranges pixel-interleaved samples into the layout the codec reads for `mode`.
pub fn to_codec_layout(
    buffer: &PixelBuffer,
    component_count: usize,
    mode: InterleaveMode,
) -> Result<PixelBuffer, JpeglsError> {
    check_component_count(buffer, component_count)?;
    if component_count == 1 || mode != InterleaveMode::None || buffer.is_empty() {
        return Ok(buffer.clone());
    }
    Ok(buffer.transposed(component_count))
}

/// Rearranges samples written by the codec for `mode` into pixel-interleaved order.
pub fn to_host_layout(
    buffer: &PixelBuffer,
    component_count: usize,
    mode: InterleaveMode,
) -> Result<PixelBuffer, JpeglsError> {
    check_component_count(buffer, component_count)?;
    if component_count == 1 || mode != InterleaveMode::None || buffer.is_empty() {
        return Ok(buffer.clone());
    }
    Ok(buffer.transposed(buffer.len() / component_count))
}
