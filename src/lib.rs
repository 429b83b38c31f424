//! JPEG-LS support for the `image` crate.
//!
//! The JPEG-LS entropy coder itself lives in a native codec library
//! (CharLS). This crate provides everything around it:
//!
//! - [`header`]: recognizing the SPIFF or bare-marker container prefix and
//!   recovering image geometry from it.
//! - [`layout`]: converting between the pixel-interleaved samples the host
//!   library uses and the planar buffers the codec reads and writes.
//! - [`session`]: driving one encode or decode through the codec's
//!   create, configure, execute, release protocol.
//! - [`codec`]: the capability surface a codec backend provides, and the
//!   CharLS backend loaded at run time.
//! - [`image_codec`]: `image::ImageDecoder` / `image::ImageEncoder`
//!   implementations.
//!
//! ```no_run
//! use jpegls_image::codec::charls::{CharlsLibrary, LibraryConfig};
//! use jpegls_image::session;
//!
//! let charls = CharlsLibrary::load(&LibraryConfig::from_env())?;
//! let decoded = session::decode(&charls, &std::fs::read("image.jls")?)?;
//! println!("{}x{}", decoded.metadata.width, decoded.metadata.height);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod codec;
pub mod constants;
pub mod error;
pub mod header;
pub mod image_codec;
pub mod layout;
pub mod session;

pub use error::{CodecErrorKind, CodecStatus, JpeglsError};
pub use header::{ImageMetadata, PixelMode, SpiffHeader, parse_header};
pub use layout::PixelBuffer;
pub use session::{DecodedImage, EncodeOptions, SourceImage, decode, encode};

use std::str::FromStr;

use num_enum::TryFromPrimitive;

fn unknown_profile(_: u8) -> JpeglsError {
    JpeglsError::Format("unknown SPIFF profile")
}

fn unknown_color_space(_: u8) -> JpeglsError {
    JpeglsError::Format("unknown SPIFF color space")
}

fn unknown_compression_type(_: u8) -> JpeglsError {
    JpeglsError::Format("unknown SPIFF compression type")
}

fn unknown_resolution_units(_: u8) -> JpeglsError {
    JpeglsError::Format("unknown SPIFF resolution units")
}

/// Interleave mode for multi-component scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InterleaveMode {
    /// One plane per component.
    #[default]
    None = 0,
    /// Interleaved by line.
    Line = 1,
    /// Interleaved by sample.
    Sample = 2,
}

impl TryFrom<i32> for InterleaveMode {
    type Error = JpeglsError;
    fn try_from(v: i32) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Self::None),
            1 => Ok(Self::Line),
            2 => Ok(Self::Sample),
            _ => Err(JpeglsError::Codec(CodecErrorKind::InvalidParameterInterleaveMode)),
        }
    }
}

impl FromStr for InterleaveMode {
    type Err = JpeglsError;

    /// Parses the option spelling: `none`, `line` or `sample`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "line" => Ok(Self::Line),
            "sample" => Ok(Self::Sample),
            _ => Err(JpeglsError::Codec(CodecErrorKind::InvalidArgumentInterleaveMode)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[num_enum(error_type(name = JpeglsError, constructor = unknown_profile))]
#[repr(u8)]
pub enum SpiffProfileId {
    None = 0,
    ContinuousToneBase = 1,
    ContinuousToneProgressive = 2,
    BiLevelFacsimile = 3,
    ContinuousToneFacsimile = 4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[num_enum(error_type(name = JpeglsError, constructor = unknown_color_space))]
#[repr(u8)]
pub enum SpiffColorSpace {
    BiLevelBlack = 0,
    YCbCrItuBt709Video = 1,
    None = 2,
    YCbCrItuBt6011Rgb = 3,
    YCbCrItuBt6011Video = 4,
    Grayscale = 8,
    PhotoYcc = 9,
    Rgb = 10,
    Cmy = 11,
    Cmyk = 12,
    Ycck = 13,
    CieLab = 14,
    BiLevelWhite = 15,
}

impl SpiffColorSpace {
    /// The color space a standard SPIFF header declares for `component_count` components.
    pub fn for_component_count(component_count: u8) -> Self {
        match component_count {
            1 => Self::Grayscale,
            3 => Self::Rgb,
            4 => Self::Cmyk,
            _ => Self::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[num_enum(error_type(name = JpeglsError, constructor = unknown_compression_type))]
#[repr(u8)]
pub enum SpiffCompressionType {
    Uncompressed = 0,
    ModifiedHuffman = 1,
    ModifiedRead = 2,
    ModifiedModifiedRead = 3,
    Jbig = 4,
    Jpeg = 5,
    JpegLs = 6,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[num_enum(error_type(name = JpeglsError, constructor = unknown_resolution_units))]
#[repr(u8)]
pub enum SpiffResolutionUnits {
    AspectRatio = 0,
    DotsPerInch = 1,
    DotsPerCentimeter = 2,
}

/// Image geometry as exchanged with the native codec (`charls_frame_info`).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameInfo {
    pub width: u32,
    pub height: u32,
    pub bits_per_sample: i32,
    pub component_count: i32,
}

impl FrameInfo {
    /// Number of samples in a pixel-interleaved buffer of this frame;
    /// `None` when it does not fit in `usize`.
    pub fn sample_count(&self) -> Option<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)?
            .checked_mul(self.component_count.max(0) as usize)
    }
}
