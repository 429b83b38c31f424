// In-memory stand-in for the native codec.
//
// The loopback codec stores samples uncompressed behind the same container
// prefix a real encoder writes (an optional SPIFF header, then the JPEG-LS
// start of frame segment), so streams it produces pass header parsing and
// decode back to exactly what was encoded. Every step can be made to fail,
// and handle creation and release are counted.

#![allow(dead_code)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use jpegls_image::codec::{DecoderHandle, EncoderHandle, JpeglsCodec};
use jpegls_image::constants::{SPIFF_HEADER_SIZE_IN_BYTES, SPIFF_MAGIC, SPIFF_SEGMENT_LENGTH};
use jpegls_image::{
    CodecErrorKind, CodecStatus, FrameInfo, InterleaveMode, SpiffColorSpace, SpiffCompressionType,
    SpiffHeader, SpiffProfileId, SpiffResolutionUnits,
};

const START_OF_IMAGE: [u8; 2] = [0xFF, 0xD8];
const START_OF_FRAME_JPEGLS: [u8; 2] = [0xFF, 0xF7];
const ESTIMATE_SLACK: usize = 64;

/// A codec protocol call the loopback codec can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    CreateDecoder,
    SetSourceBuffer,
    ReadHeader,
    FrameInfo,
    InterleaveMode,
    DestinationSize,
    DecodeToBuffer,
    CreateEncoder,
    SetFrameInfo,
    SetInterleaveMode,
    EstimatedDestinationSize,
    SetDestinationBuffer,
    WriteSpiffHeader,
    EncodeFromBuffer,
    BytesWritten,
}

pub const DECODE_STEPS: [Step; 7] = [
    Step::CreateDecoder,
    Step::SetSourceBuffer,
    Step::ReadHeader,
    Step::FrameInfo,
    Step::InterleaveMode,
    Step::DestinationSize,
    Step::DecodeToBuffer,
];

pub const ENCODE_STEPS: [Step; 8] = [
    Step::CreateEncoder,
    Step::SetFrameInfo,
    Step::SetInterleaveMode,
    Step::EstimatedDestinationSize,
    Step::SetDestinationBuffer,
    Step::WriteSpiffHeader,
    Step::EncodeFromBuffer,
    Step::BytesWritten,
];

#[derive(Default)]
pub struct LoopbackCodec {
    fail_at: Option<(Step, i32)>,
    over_report: usize,
    created: AtomicUsize,
    destroyed: AtomicUsize,
    calls: Mutex<Vec<Step>>,
    encoder_input: Mutex<Vec<u8>>,
    encoder_interleave_mode: Mutex<Option<InterleaveMode>>,
    estimated_size: AtomicUsize,
}

impl LoopbackCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `step` fail with `kind`.
    pub fn failing_at(step: Step, kind: CodecErrorKind) -> Self {
        Self::failing_with_status(step, kind.into())
    }

    /// Makes `step` fail with an arbitrary raw status value.
    pub fn failing_with_status(step: Step, status: i32) -> Self {
        Self {
            fail_at: Some((step, status)),
            ..Self::default()
        }
    }

    /// Makes `bytes_written` report `extra` more bytes than were written.
    pub fn over_reporting(extra: usize) -> Self {
        Self {
            over_report: extra,
            ..Self::default()
        }
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn destroyed(&self) -> usize {
        self.destroyed.load(Ordering::SeqCst)
    }

    /// Protocol calls made so far, in order.
    pub fn calls(&self) -> Vec<Step> {
        self.calls.lock().unwrap().clone()
    }

    /// The source buffer of the last `encode_from_buffer` call.
    pub fn encoder_input(&self) -> Vec<u8> {
        self.encoder_input.lock().unwrap().clone()
    }

    /// The interleave mode the last encoder was configured with, if any.
    pub fn encoder_interleave_mode(&self) -> Option<InterleaveMode> {
        *self.encoder_interleave_mode.lock().unwrap()
    }

    /// The last size returned by `estimated_destination_size`.
    pub fn estimated_size(&self) -> usize {
        self.estimated_size.load(Ordering::SeqCst)
    }

    fn enter(&self, step: Step) -> Result<(), CodecStatus> {
        self.calls.lock().unwrap().push(step);
        match self.fail_at {
            Some((failing, status)) if failing == step => Err(CodecStatus(status)),
            _ => Ok(()),
        }
    }
}

impl JpeglsCodec for LoopbackCodec {
    type Decoder<'a> = LoopbackDecoder<'a>;
    type Encoder<'a> = LoopbackEncoder<'a>;

    fn create_decoder(&self) -> Result<LoopbackDecoder<'_>, CodecStatus> {
        self.enter(Step::CreateDecoder)?;
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(LoopbackDecoder {
            codec: self,
            source: None,
            frame: None,
        })
    }

    fn create_encoder(&self) -> Result<LoopbackEncoder<'_>, CodecStatus> {
        self.enter(Step::CreateEncoder)?;
        self.created.fetch_add(1, Ordering::SeqCst);
        *self.encoder_interleave_mode.lock().unwrap() = None;
        Ok(LoopbackEncoder {
            codec: self,
            frame_info: None,
            interleave_mode: InterleaveMode::None,
            destination: None,
            position: 0,
        })
    }
}

fn bytes_per_sample(frame_info: &FrameInfo) -> usize {
    if frame_info.bits_per_sample <= 8 { 1 } else { 2 }
}

fn image_size(frame_info: &FrameInfo) -> usize {
    frame_info.sample_count().expect("frame fits in memory") * bytes_per_sample(frame_info)
}

fn frame_segment(frame_info: &FrameInfo) -> Vec<u8> {
    let component_count = frame_info.component_count as u8;
    let length = 8 + 3 * u16::from(component_count);
    let mut segment = START_OF_FRAME_JPEGLS.to_vec();
    segment.extend_from_slice(&length.to_be_bytes());
    segment.push(frame_info.bits_per_sample as u8);
    segment.extend_from_slice(&(frame_info.height as u16).to_be_bytes());
    segment.extend_from_slice(&(frame_info.width as u16).to_be_bytes());
    segment.push(component_count);
    for id in 1..=component_count {
        segment.extend_from_slice(&[id, 0x11, 0]);
    }
    segment
}

struct StoredFrame {
    frame_info: FrameInfo,
    interleave_mode: InterleaveMode,
    samples_offset: usize,
}

pub struct LoopbackDecoder<'a> {
    codec: &'a LoopbackCodec,
    source: Option<&'a [u8]>,
    frame: Option<StoredFrame>,
}

impl Drop for LoopbackDecoder<'_> {
    fn drop(&mut self) {
        self.codec.destroyed.fetch_add(1, Ordering::SeqCst);
    }
}

impl LoopbackDecoder<'_> {
    fn stored_frame(&self) -> Result<&StoredFrame, CodecStatus> {
        self.frame
            .as_ref()
            .ok_or(CodecStatus::from(CodecErrorKind::InvalidOperation))
    }
}

impl<'a> DecoderHandle<'a> for LoopbackDecoder<'a> {
    fn set_source_buffer(&mut self, source: &'a [u8]) -> Result<(), CodecStatus> {
        self.codec.enter(Step::SetSourceBuffer)?;
        self.source = Some(source);
        Ok(())
    }

    fn read_header(&mut self) -> Result<(), CodecStatus> {
        self.codec.enter(Step::ReadHeader)?;
        let source = self.source.ok_or(CodecStatus::from(CodecErrorKind::InvalidOperation))?;
        let offset = if source.starts_with(&SPIFF_MAGIC) {
            SPIFF_HEADER_SIZE_IN_BYTES
        } else if source.starts_with(&START_OF_IMAGE) {
            START_OF_IMAGE.len()
        } else {
            return Err(CodecErrorKind::StartOfImageMarkerNotFound.into());
        };

        let segment = source
            .get(offset..offset + 10)
            .filter(|segment| segment.starts_with(&START_OF_FRAME_JPEGLS))
            .ok_or(CodecStatus::from(CodecErrorKind::StartOfFrameMarkerNotFound))?;
        let length = u16::from_be_bytes([segment[2], segment[3]]) as usize;
        let frame_info = FrameInfo {
            bits_per_sample: segment[4] as i32,
            height: u16::from_be_bytes([segment[5], segment[6]]) as u32,
            width: u16::from_be_bytes([segment[7], segment[8]]) as u32,
            component_count: segment[9] as i32,
        };
        let mode_offset = offset + 2 + length;
        let interleave_mode = source
            .get(mode_offset)
            .and_then(|&mode| InterleaveMode::try_from(i32::from(mode)).ok())
            .ok_or(CodecStatus::from(CodecErrorKind::InvalidEncodedData))?;

        self.frame = Some(StoredFrame {
            frame_info,
            interleave_mode,
            samples_offset: mode_offset + 1,
        });
        Ok(())
    }

    fn frame_info(&self) -> Result<FrameInfo, CodecStatus> {
        self.codec.enter(Step::FrameInfo)?;
        Ok(self.stored_frame()?.frame_info)
    }

    fn interleave_mode(&self) -> Result<InterleaveMode, CodecStatus> {
        self.codec.enter(Step::InterleaveMode)?;
        Ok(self.stored_frame()?.interleave_mode)
    }

    fn destination_size(&self) -> Result<usize, CodecStatus> {
        self.codec.enter(Step::DestinationSize)?;
        Ok(image_size(&self.stored_frame()?.frame_info))
    }

    fn decode_to_buffer(&mut self, destination: &mut [u8]) -> Result<(), CodecStatus> {
        self.codec.enter(Step::DecodeToBuffer)?;
        let frame = self.stored_frame()?;
        let size = image_size(&frame.frame_info);
        if destination.len() < size {
            return Err(CodecErrorKind::DestinationBufferTooSmall.into());
        }
        let source = self.source.ok_or(CodecStatus::from(CodecErrorKind::InvalidOperation))?;
        let samples = source
            .get(frame.samples_offset..frame.samples_offset + size)
            .ok_or(CodecStatus::from(CodecErrorKind::SourceBufferTooSmall))?;
        destination[..size].copy_from_slice(samples);
        Ok(())
    }
}

pub struct LoopbackEncoder<'a> {
    codec: &'a LoopbackCodec,
    frame_info: Option<FrameInfo>,
    interleave_mode: InterleaveMode,
    destination: Option<&'a mut [u8]>,
    position: usize,
}

impl Drop for LoopbackEncoder<'_> {
    fn drop(&mut self) {
        self.codec.destroyed.fetch_add(1, Ordering::SeqCst);
    }
}

impl LoopbackEncoder<'_> {
    fn configured_frame(&self) -> Result<FrameInfo, CodecStatus> {
        self.frame_info
            .ok_or(CodecStatus::from(CodecErrorKind::InvalidOperation))
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), CodecStatus> {
        let destination = self
            .destination
            .as_deref_mut()
            .ok_or(CodecStatus::from(CodecErrorKind::InvalidOperation))?;
        let end = self.position + bytes.len();
        if end > destination.len() {
            return Err(CodecErrorKind::DestinationBufferTooSmall.into());
        }
        destination[self.position..end].copy_from_slice(bytes);
        self.position = end;
        Ok(())
    }
}

impl<'a> EncoderHandle<'a> for LoopbackEncoder<'a> {
    fn set_frame_info(&mut self, frame_info: &FrameInfo) -> Result<(), CodecStatus> {
        self.codec.enter(Step::SetFrameInfo)?;
        if frame_info.width == 0 || frame_info.width > u32::from(u16::MAX) {
            return Err(CodecErrorKind::InvalidArgumentWidth.into());
        }
        if frame_info.height == 0 || frame_info.height > u32::from(u16::MAX) {
            return Err(CodecErrorKind::InvalidArgumentHeight.into());
        }
        if !(2..=16).contains(&frame_info.bits_per_sample) {
            return Err(CodecErrorKind::InvalidArgumentBitsPerSample.into());
        }
        if !(1..=255).contains(&frame_info.component_count) {
            return Err(CodecErrorKind::InvalidArgumentComponentCount.into());
        }
        self.frame_info = Some(*frame_info);
        Ok(())
    }

    fn set_interleave_mode(&mut self, interleave_mode: InterleaveMode) -> Result<(), CodecStatus> {
        self.codec.enter(Step::SetInterleaveMode)?;
        self.interleave_mode = interleave_mode;
        *self.codec.encoder_interleave_mode.lock().unwrap() = Some(interleave_mode);
        Ok(())
    }

    fn estimated_destination_size(&self) -> Result<usize, CodecStatus> {
        self.codec.enter(Step::EstimatedDestinationSize)?;
        let frame_info = self.configured_frame()?;
        let size = SPIFF_HEADER_SIZE_IN_BYTES
            + frame_segment(&frame_info).len()
            + 1
            + image_size(&frame_info)
            + ESTIMATE_SLACK;
        self.codec.estimated_size.store(size, Ordering::SeqCst);
        Ok(size)
    }

    fn set_destination_buffer(&mut self, destination: &'a mut [u8]) -> Result<(), CodecStatus> {
        self.codec.enter(Step::SetDestinationBuffer)?;
        self.configured_frame()?;
        self.destination = Some(destination);
        self.position = 0;
        Ok(())
    }

    fn write_standard_spiff_header(
        &mut self,
        color_space: SpiffColorSpace,
        resolution_units: SpiffResolutionUnits,
        vertical_resolution: u32,
        horizontal_resolution: u32,
    ) -> Result<(), CodecStatus> {
        self.codec.enter(Step::WriteSpiffHeader)?;
        let frame_info = self.configured_frame()?;
        if self.position != 0 {
            return Err(CodecErrorKind::InvalidOperation.into());
        }
        let header = SpiffHeader {
            header_length: SPIFF_SEGMENT_LENGTH,
            version: (2, 0),
            profile_id: SpiffProfileId::None as u8,
            component_count: frame_info.component_count as u8,
            height: frame_info.height,
            width: frame_info.width,
            color_space: color_space as u8,
            bits_per_sample: frame_info.bits_per_sample as u8,
            compression_type: SpiffCompressionType::JpegLs as u8,
            resolution_units: resolution_units as u8,
            vertical_resolution,
            horizontal_resolution: Some(horizontal_resolution),
        };
        self.write(&header.to_bytes())
    }

    fn encode_from_buffer(&mut self, source: &[u8]) -> Result<(), CodecStatus> {
        self.codec.enter(Step::EncodeFromBuffer)?;
        let frame_info = self.configured_frame()?;
        *self.codec.encoder_input.lock().unwrap() = source.to_vec();
        if source.len() != image_size(&frame_info) {
            return Err(CodecErrorKind::InvalidArgument.into());
        }
        if self.position == 0 {
            self.write(&START_OF_IMAGE)?;
        }
        self.write(&frame_segment(&frame_info))?;
        self.write(&[self.interleave_mode as u8])?;
        self.write(source)
    }

    fn bytes_written(&self) -> Result<usize, CodecStatus> {
        self.codec.enter(Step::BytesWritten)?;
        Ok(self.position + self.codec.over_report)
    }
}
