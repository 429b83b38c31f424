//! Single encode and decode operations against a native codec.
//!
//! A session owns one codec handle and walks it through the codec's
//! protocol one step at a time. Steps called out of order fail with
//! [`CodecErrorKind::InvalidOperation`]. The first failing step releases the
//! handle and closes the session; it cannot be resumed.
//!
//! [`decode`] and [`encode`] run a complete session.

use crate::codec::{DecoderHandle, EncoderHandle, JpeglsCodec};
use crate::error::{CodecErrorKind, CodecStatus, JpeglsError};
use crate::header::{ImageMetadata, PixelMode, parse_header};
use crate::layout::{PixelBuffer, to_codec_layout, to_host_layout};
use crate::{FrameInfo, InterleaveMode, SpiffColorSpace, SpiffResolutionUnits};

/// Caller options for encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    /// Overrides the bit depth implied by the source pixel mode.
    pub bits_per_component: Option<u8>,
    /// Scan layout for multi-component images, `Sample` when unset.
    /// Ignored for single-component images.
    pub interleave_mode: Option<InterleaveMode>,
    /// Write a standard SPIFF header in front of the JPEG-LS stream.
    pub spiff: bool,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            bits_per_component: None,
            interleave_mode: None,
            spiff: true,
        }
    }
}

impl EncodeOptions {
    pub fn with_bits_per_component(mut self, bits_per_component: u8) -> Self {
        self.bits_per_component = Some(bits_per_component);
        self
    }

    pub fn with_interleave_mode(mut self, interleave_mode: InterleaveMode) -> Self {
        self.interleave_mode = Some(interleave_mode);
        self
    }

    pub fn with_spiff(mut self, spiff: bool) -> Self {
        self.spiff = spiff;
        self
    }
}

/// Pixel-interleaved samples to encode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    pub width: u32,
    pub height: u32,
    pub mode: PixelMode,
    pub pixels: PixelBuffer,
}

impl SourceImage {
    pub fn new(width: u32, height: u32, mode: PixelMode, pixels: PixelBuffer) -> Result<Self, JpeglsError> {
        let frame_info = FrameInfo {
            width,
            height,
            bits_per_sample: mode.bits_per_sample() as i32,
            component_count: mode.component_count() as i32,
        };
        let expected = frame_info
            .sample_count()
            .ok_or(JpeglsError::Geometry("sample count overflows usize"))?;
        if pixels.len() != expected {
            return Err(JpeglsError::BufferSize {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            mode,
            pixels,
        })
    }
}

/// A decoded image with pixel-interleaved samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub metadata: ImageMetadata,
    pub pixels: PixelBuffer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeState {
    Created,
    SourceBufferSet,
    HeaderRead,
    SizeQueried,
    Decoded,
    Closed,
}

/// One decode: `Created → SourceBufferSet → HeaderRead → SizeQueried → Decoded → Closed`.
pub struct DecodeSession<'a, C: JpeglsCodec + 'a> {
    handle: Option<C::Decoder<'a>>,
    state: DecodeState,
    metadata: Option<ImageMetadata>,
    destination_size: usize,
}

impl<'a, C: JpeglsCodec + 'a> DecodeSession<'a, C> {
    pub fn new(codec: &'a C) -> Result<Self, JpeglsError> {
        let handle = codec.create_decoder()?;
        log::trace!("decode session created");
        Ok(Self {
            handle: Some(handle),
            state: DecodeState::Created,
            metadata: None,
            destination_size: 0,
        })
    }

    pub fn state(&self) -> DecodeState {
        self.state
    }

    fn step<T>(
        &mut self,
        from: DecodeState,
        to: DecodeState,
        op: impl FnOnce(&mut C::Decoder<'a>) -> Result<T, CodecStatus>,
    ) -> Result<T, JpeglsError> {
        let result = match self.handle.as_mut() {
            Some(handle) if self.state == from => op(handle),
            _ => Err(CodecStatus::from(CodecErrorKind::InvalidOperation)),
        };
        match result {
            Ok(value) => {
                log::trace!("decode session {:?} -> {:?}", self.state, to);
                self.state = to;
                Ok(value)
            }
            Err(status) => {
                log::trace!("decode session failed in {:?}: {:?}", self.state, status);
                self.close();
                Err(status.into())
            }
        }
    }

    fn close(&mut self) {
        self.handle = None;
        self.state = DecodeState::Closed;
    }

    /// Hands the whole compressed stream to the decoder.
    pub fn set_source_buffer(&mut self, source: &'a [u8]) -> Result<(), JpeglsError> {
        self.step(DecodeState::Created, DecodeState::SourceBufferSet, |handle| {
            handle.set_source_buffer(source)
        })
    }

    /// Reads the stream's headers and returns the frame they describe.
    ///
    /// Fails with [`JpeglsError::UnsupportedMode`] for frames no pixel mode
    /// can represent.
    pub fn read_header(&mut self) -> Result<ImageMetadata, JpeglsError> {
        let (frame_info, interleave_mode) =
            self.step(DecodeState::SourceBufferSet, DecodeState::HeaderRead, |handle| {
                handle.read_header()?;
                Ok((handle.frame_info()?, handle.interleave_mode()?))
            })?;
        match ImageMetadata::from_frame_info(&frame_info, interleave_mode) {
            Ok(metadata) => {
                self.metadata = Some(metadata);
                Ok(metadata)
            }
            Err(err) => {
                self.close();
                Err(err)
            }
        }
    }

    /// Exact size in bytes of the decoded samples.
    pub fn destination_size(&mut self) -> Result<usize, JpeglsError> {
        let size = self.step(DecodeState::HeaderRead, DecodeState::SizeQueried, |handle| {
            handle.destination_size()
        })?;
        self.destination_size = size;
        Ok(size)
    }

    /// Decodes, releases the codec handle and returns pixel-interleaved samples.
    pub fn decode_to_buffer(mut self) -> Result<DecodedImage, JpeglsError> {
        let mut destination = vec![0u8; self.destination_size];
        self.step(DecodeState::SizeQueried, DecodeState::Decoded, |handle| {
            handle.decode_to_buffer(&mut destination)
        })?;
        self.close();

        let metadata = self
            .metadata
            .ok_or(JpeglsError::Codec(CodecErrorKind::InvalidOperation))?;
        let native = PixelBuffer::from_codec_bytes(&destination, metadata.bits_per_sample);
        let expected = metadata
            .sample_count()
            .ok_or(JpeglsError::Format("image too large"))?;
        if native.len() != expected {
            return Err(JpeglsError::BufferSize {
                expected,
                actual: native.len(),
            });
        }
        let pixels = to_host_layout(
            &native,
            metadata.component_count as usize,
            metadata.interleave_mode,
        )?;
        log::debug!(
            "decoded {}x{} image, {} components, {} bits, {:?} interleave",
            metadata.width,
            metadata.height,
            metadata.component_count,
            metadata.bits_per_sample,
            metadata.interleave_mode
        );
        Ok(DecodedImage { metadata, pixels })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeState {
    Created,
    FrameInfoSet,
    InterleaveModeSet,
    DestinationSized,
    SpiffWritten,
    Encoded,
    Closed,
}

/// One encode: `Created → FrameInfoSet → InterleaveModeSet (optional) →
/// DestinationSized → SpiffWritten (optional) → Encoded → Closed`.
pub struct EncodeSession<'a, C: JpeglsCodec + 'a> {
    handle: Option<C::Encoder<'a>>,
    state: EncodeState,
    destination_len: usize,
}

impl<'a, C: JpeglsCodec + 'a> EncodeSession<'a, C> {
    pub fn new(codec: &'a C) -> Result<Self, JpeglsError> {
        let handle = codec.create_encoder()?;
        log::trace!("encode session created");
        Ok(Self {
            handle: Some(handle),
            state: EncodeState::Created,
            destination_len: 0,
        })
    }

    pub fn state(&self) -> EncodeState {
        self.state
    }

    fn step<T>(
        &mut self,
        from: &[EncodeState],
        to: EncodeState,
        op: impl FnOnce(&mut C::Encoder<'a>) -> Result<T, CodecStatus>,
    ) -> Result<T, JpeglsError> {
        let result = match self.handle.as_mut() {
            Some(handle) if from.contains(&self.state) => op(handle),
            _ => Err(CodecStatus::from(CodecErrorKind::InvalidOperation)),
        };
        match result {
            Ok(value) => {
                log::trace!("encode session {:?} -> {:?}", self.state, to);
                self.state = to;
                Ok(value)
            }
            Err(status) => {
                log::trace!("encode session failed in {:?}: {:?}", self.state, status);
                self.close();
                Err(status.into())
            }
        }
    }

    fn close(&mut self) {
        self.handle = None;
        self.state = EncodeState::Closed;
    }

    pub fn set_frame_info(&mut self, frame_info: &FrameInfo) -> Result<(), JpeglsError> {
        self.step(&[EncodeState::Created], EncodeState::FrameInfoSet, |handle| {
            handle.set_frame_info(frame_info)
        })
    }

    /// Selects the scan layout of a multi-component image.
    pub fn set_interleave_mode(&mut self, interleave_mode: InterleaveMode) -> Result<(), JpeglsError> {
        self.step(&[EncodeState::FrameInfoSet], EncodeState::InterleaveModeSet, |handle| {
            handle.set_interleave_mode(interleave_mode)
        })
    }

    /// Upper bound of the encoded size.
    pub fn estimated_destination_size(&mut self) -> Result<usize, JpeglsError> {
        let state = self.state;
        self.step(
            &[EncodeState::FrameInfoSet, EncodeState::InterleaveModeSet],
            state,
            |handle| handle.estimated_destination_size(),
        )
    }

    pub fn set_destination_buffer(&mut self, destination: &'a mut [u8]) -> Result<(), JpeglsError> {
        let len = destination.len();
        self.step(
            &[EncodeState::FrameInfoSet, EncodeState::InterleaveModeSet],
            EncodeState::DestinationSized,
            move |handle| handle.set_destination_buffer(destination),
        )?;
        self.destination_len = len;
        Ok(())
    }

    pub fn write_standard_spiff_header(
        &mut self,
        color_space: SpiffColorSpace,
        resolution_units: SpiffResolutionUnits,
        vertical_resolution: u32,
        horizontal_resolution: u32,
    ) -> Result<(), JpeglsError> {
        self.step(&[EncodeState::DestinationSized], EncodeState::SpiffWritten, |handle| {
            handle.write_standard_spiff_header(
                color_space,
                resolution_units,
                vertical_resolution,
                horizontal_resolution,
            )
        })
    }

    /// Encodes samples already arranged for the configured interleave mode.
    pub fn encode_from_buffer(&mut self, source: &[u8]) -> Result<(), JpeglsError> {
        self.step(
            &[EncodeState::DestinationSized, EncodeState::SpiffWritten],
            EncodeState::Encoded,
            |handle| handle.encode_from_buffer(source),
        )
    }

    /// Returns the number of bytes written and releases the codec handle.
    pub fn bytes_written(mut self) -> Result<usize, JpeglsError> {
        let written = self.step(&[EncodeState::Encoded], EncodeState::Closed, |handle| {
            handle.bytes_written()
        })?;
        self.close();
        if written > self.destination_len {
            return Err(JpeglsError::Codec(CodecErrorKind::DestinationBufferTooSmall));
        }
        Ok(written)
    }
}

/// Decodes a complete JPEG-LS stream into pixel-interleaved samples.
///
/// The container prefix is checked first, so streams that are not JPEG-LS
/// never reach the codec. Geometry comes from the codec's own header read;
/// SPIFF color space and resolution are taken from the prefix.
pub fn decode<C: JpeglsCodec>(codec: &C, source: &[u8]) -> Result<DecodedImage, JpeglsError> {
    let prefix = parse_header(source)?;

    let mut session = DecodeSession::new(codec)?;
    session.set_source_buffer(source)?;
    session.read_header()?;
    session.destination_size()?;
    let mut decoded = session.decode_to_buffer()?;

    if !prefix.same_geometry(&decoded.metadata) {
        log::warn!(
            "container header describes {:?}, codec decoded {:?}",
            prefix.frame_info(),
            decoded.metadata.frame_info()
        );
    }
    decoded.metadata.color_space_id = prefix.color_space_id;
    decoded.metadata.resolution_units = prefix.resolution_units;
    decoded.metadata.vertical_resolution = prefix.vertical_resolution;
    Ok(decoded)
}

/// Encodes pixel-interleaved samples into a JPEG-LS stream.
///
/// The result holds exactly the bytes the codec wrote.
pub fn encode<C: JpeglsCodec>(
    codec: &C,
    image: &SourceImage,
    options: &EncodeOptions,
) -> Result<Vec<u8>, JpeglsError> {
    let metadata = ImageMetadata::for_encode(image.width, image.height, image.mode, options)?;
    let samples = image.pixels.clone().with_bits_per_sample(metadata.bits_per_sample);
    let source = to_codec_layout(
        &samples,
        metadata.component_count as usize,
        metadata.interleave_mode,
    )?
    .to_codec_bytes();

    let mut destination = Vec::new();
    let mut session = EncodeSession::new(codec)?;
    session.set_frame_info(&metadata.frame_info())?;
    if metadata.component_count > 1 {
        session.set_interleave_mode(metadata.interleave_mode)?;
    }
    let estimated_size = session.estimated_destination_size()?;
    destination.resize(estimated_size, 0);
    session.set_destination_buffer(&mut destination)?;
    if let Some(spiff) = metadata.implied_spiff_header() {
        session.write_standard_spiff_header(
            spiff.color_space()?,
            spiff.resolution_units()?,
            spiff.vertical_resolution,
            spiff.horizontal_resolution.unwrap_or(spiff.vertical_resolution),
        )?;
    }
    session.encode_from_buffer(&source)?;
    let written = session.bytes_written()?;

    destination.truncate(written);
    log::debug!(
        "encoded {}x{} image into {} bytes (estimated {})",
        metadata.width,
        metadata.height,
        written,
        estimated_size
    );
    Ok(destination)
}
