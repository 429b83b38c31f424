//! `image` crate integration.
//!
//! [`JpeglsDecoder`] and [`JpeglsEncoder`] plug JPEG-LS into the `image`
//! crate's decoder and encoder traits, so JPEG-LS files can be turned into a
//! [`DynamicImage`] and back. Both borrow an already loaded codec.

use std::ffi::OsString;
use std::io::{Cursor, Read, Write};

use image::error::{
    DecodingError, EncodingError, ImageFormatHint, ParameterError, ParameterErrorKind,
    UnsupportedError, UnsupportedErrorKind,
};
use image::hooks::{self, DecodingHook};
use image::{ColorType, DynamicImage, ExtendedColorType, ImageDecoder, ImageEncoder, ImageError, ImageResult};

use crate::codec::JpeglsCodec;
use crate::constants::{JPEGLS_MARKER_MAGIC, SPIFF_MAGIC};
use crate::error::JpeglsError;
use crate::header::{ImageMetadata, PixelMode, parse_header};
use crate::layout::PixelBuffer;
use crate::session::{self, EncodeOptions, SourceImage};

pub use crate::header::is_jpegls;

pub const FORMAT_NAME: &str = "JPEG-LS";
pub const EXTENSION: &str = "jls";

fn format_hint() -> ImageFormatHint {
    ImageFormatHint::Name(FORMAT_NAME.to_string())
}

impl From<PixelMode> for ColorType {
    fn from(mode: PixelMode) -> Self {
        match mode {
            PixelMode::L8 => ColorType::L8,
            PixelMode::Rgb8 => ColorType::Rgb8,
            PixelMode::L16 => ColorType::L16,
            PixelMode::Rgb16 => ColorType::Rgb16,
        }
    }
}

/// The pixel mode for a host color type, if JPEG-LS can store it.
pub fn pixel_mode_for(color_type: ExtendedColorType) -> ImageResult<PixelMode> {
    match color_type {
        ExtendedColorType::L8 => Ok(PixelMode::L8),
        ExtendedColorType::Rgb8 => Ok(PixelMode::Rgb8),
        ExtendedColorType::L16 => Ok(PixelMode::L16),
        ExtendedColorType::Rgb16 => Ok(PixelMode::Rgb16),
        other => Err(ImageError::Unsupported(UnsupportedError::from_format_and_kind(
            format_hint(),
            UnsupportedErrorKind::Color(other),
        ))),
    }
}

impl From<JpeglsError> for ImageError {
    fn from(err: JpeglsError) -> Self {
        match err {
            JpeglsError::UnsupportedMode { .. } => ImageError::Unsupported(
                UnsupportedError::from_format_and_kind(
                    format_hint(),
                    UnsupportedErrorKind::GenericFeature(err.to_string()),
                ),
            ),
            JpeglsError::Resource { .. } => ImageError::IoError(std::io::Error::other(err)),
            JpeglsError::BufferSize { .. } => {
                ImageError::Parameter(ParameterError::from_kind(ParameterErrorKind::DimensionMismatch))
            }
            JpeglsError::Geometry(_) => ImageError::Parameter(ParameterError::from_kind(
                ParameterErrorKind::Generic(err.to_string()),
            )),
            JpeglsError::Format(_) | JpeglsError::Codec(_) => {
                ImageError::Decoding(DecodingError::new(format_hint(), err))
            }
        }
    }
}

fn encoding_error(err: JpeglsError) -> ImageError {
    match err {
        JpeglsError::Format(_) | JpeglsError::Codec(_) => {
            ImageError::Encoding(EncodingError::new(format_hint(), err))
        }
        other => other.into(),
    }
}

/// Decoder for a JPEG-LS stream.
///
/// Creating the decoder reads the stream and checks its container header;
/// the codec only runs in [`ImageDecoder::read_image`].
pub struct JpeglsDecoder<'a, C: JpeglsCodec> {
    codec: &'a C,
    data: Vec<u8>,
    metadata: ImageMetadata,
    mode: PixelMode,
}

impl<'a, C: JpeglsCodec> JpeglsDecoder<'a, C> {
    pub fn new<R: Read>(mut reader: R, codec: &'a C) -> ImageResult<Self> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        let metadata = parse_header(&data)?;
        let mode = metadata.pixel_mode()?;
        Ok(Self {
            codec,
            data,
            metadata,
            mode,
        })
    }

    /// Metadata from the container header.
    pub fn metadata(&self) -> &ImageMetadata {
        &self.metadata
    }
}

impl<C: JpeglsCodec> ImageDecoder for JpeglsDecoder<'_, C> {
    fn dimensions(&self) -> (u32, u32) {
        (self.metadata.width, self.metadata.height)
    }

    fn color_type(&self) -> ColorType {
        self.mode.into()
    }

    fn read_image(self, buf: &mut [u8]) -> ImageResult<()> {
        if buf.len() as u64 != self.total_bytes() {
            return Err(ImageError::Parameter(ParameterError::from_kind(
                ParameterErrorKind::DimensionMismatch,
            )));
        }

        let decoded = session::decode(self.codec, &self.data)?;
        let geometry = (decoded.metadata.width, decoded.metadata.height);
        if geometry != self.dimensions() || decoded.metadata.pixel_mode()? != self.mode {
            return Err(ImageError::Decoding(DecodingError::new(
                format_hint(),
                "codestream frame does not match the container header",
            )));
        }

        match decoded.pixels {
            PixelBuffer::Eight(samples) => buf.copy_from_slice(&samples),
            PixelBuffer::Sixteen(samples) => {
                for (bytes, sample) in buf.chunks_exact_mut(2).zip(samples) {
                    bytes.copy_from_slice(&sample.to_ne_bytes());
                }
            }
        }
        Ok(())
    }

    fn read_image_boxed(self: Box<Self>, buf: &mut [u8]) -> ImageResult<()> {
        (*self).read_image(buf)
    }
}

/// Encoder writing a JPEG-LS stream.
pub struct JpeglsEncoder<'a, W: Write, C: JpeglsCodec> {
    writer: W,
    codec: &'a C,
    options: EncodeOptions,
}

impl<'a, W: Write, C: JpeglsCodec> JpeglsEncoder<'a, W, C> {
    pub fn new(writer: W, codec: &'a C) -> Self {
        Self {
            writer,
            codec,
            options: EncodeOptions::default(),
        }
    }

    pub fn with_options(mut self, options: EncodeOptions) -> Self {
        self.options = options;
        self
    }
}

impl<W: Write, C: JpeglsCodec> ImageEncoder for JpeglsEncoder<'_, W, C> {
    fn write_image(
        mut self,
        buf: &[u8],
        width: u32,
        height: u32,
        color_type: ExtendedColorType,
    ) -> ImageResult<()> {
        let mode = pixel_mode_for(color_type)?;
        let pixels = if mode.bits_per_sample() == 8 {
            PixelBuffer::Eight(buf.to_vec())
        } else {
            PixelBuffer::Sixteen(
                buf.chunks_exact(2)
                    .map(|pair| u16::from_ne_bytes([pair[0], pair[1]]))
                    .collect(),
            )
        };
        let image = SourceImage::new(width, height, mode, pixels).map_err(encoding_error)?;
        let encoded = session::encode(self.codec, &image, &self.options).map_err(encoding_error)?;
        self.writer.write_all(&encoded)?;
        Ok(())
    }
}

/// Decodes a JPEG-LS stream into a [`DynamicImage`].
pub fn load<C: JpeglsCodec>(codec: &C, data: &[u8]) -> ImageResult<DynamicImage> {
    DynamicImage::from_decoder(JpeglsDecoder::new(Cursor::new(data), codec)?)
}

/// Encodes `image` as JPEG-LS into `writer`.
pub fn save<W: Write, C: JpeglsCodec>(
    image: &DynamicImage,
    writer: W,
    codec: &C,
    options: EncodeOptions,
) -> ImageResult<()> {
    image.write_with_encoder(JpeglsEncoder::new(writer, codec).with_options(options))
}

/// Makes `codec` the `image` crate's decoder for JPEG-LS.
///
/// Afterwards `image::open`, `ImageReader` and `load_from_memory` read
/// `.jls` files, and streams starting with either JPEG-LS magic number once
/// the format is guessed. Registration is process wide; it returns `false`
/// and changes nothing when a `jls` decoder is already registered.
pub fn register<C>(codec: &'static C) -> bool
where
    C: JpeglsCodec + Sync + 'static,
{
    let hook: DecodingHook = Box::new(move |reader| Ok(Box::new(JpeglsDecoder::new(reader, codec)?)));
    if !hooks::register_decoding_hook(OsString::from(EXTENSION), hook) {
        return false;
    }
    let magics: [&'static [u8]; 2] = [&SPIFF_MAGIC, &JPEGLS_MARKER_MAGIC];
    for magic in magics {
        hooks::register_format_detection_hook(OsString::from(EXTENSION), magic, None);
    }
    log::debug!("registered {} decoder for .{}", FORMAT_NAME, EXTENSION);
    true
}
