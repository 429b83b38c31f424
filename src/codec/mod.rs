//! The capability surface of a native JPEG-LS codec.
//!
//! A codec hands out decoder and encoder handles. Each handle is one native
//! instance: it is owned by exactly one session, driven strictly in
//! sequence, and released when it is dropped. Buffers given to a handle are
//! borrowed for the handle's whole lifetime `'a`, since the native side keeps
//! pointers to them between calls.
//!
//! Every call reports failure as the raw [`CodecStatus`] the codec returned;
//! sessions translate it into a [`JpeglsError`](crate::JpeglsError).

pub mod charls;

use crate::error::CodecStatus;
use crate::{FrameInfo, InterleaveMode, SpiffColorSpace, SpiffResolutionUnits};

/// A loaded codec able to create decoder and encoder instances.
pub trait JpeglsCodec {
    type Decoder<'a>: DecoderHandle<'a>
    where
        Self: 'a;
    type Encoder<'a>: EncoderHandle<'a>
    where
        Self: 'a;

    fn create_decoder(&self) -> Result<Self::Decoder<'_>, CodecStatus>;
    fn create_encoder(&self) -> Result<Self::Encoder<'_>, CodecStatus>;
}

/// One native decoder instance. Dropping it destroys the instance.
pub trait DecoderHandle<'a> {
    fn set_source_buffer(&mut self, source: &'a [u8]) -> Result<(), CodecStatus>;
    fn read_header(&mut self) -> Result<(), CodecStatus>;
    fn frame_info(&self) -> Result<FrameInfo, CodecStatus>;
    fn interleave_mode(&self) -> Result<InterleaveMode, CodecStatus>;
    /// Exact size in bytes of the decoded image with tightly packed rows.
    fn destination_size(&self) -> Result<usize, CodecStatus>;
    fn decode_to_buffer(&mut self, destination: &mut [u8]) -> Result<(), CodecStatus>;
}

/// One native encoder instance. Dropping it destroys the instance.
pub trait EncoderHandle<'a> {
    fn set_frame_info(&mut self, frame_info: &FrameInfo) -> Result<(), CodecStatus>;
    fn set_interleave_mode(&mut self, interleave_mode: InterleaveMode) -> Result<(), CodecStatus>;
    /// Upper bound of the encoded size; the actual output may be smaller.
    fn estimated_destination_size(&self) -> Result<usize, CodecStatus>;
    fn set_destination_buffer(&mut self, destination: &'a mut [u8]) -> Result<(), CodecStatus>;
    fn write_standard_spiff_header(
        &mut self,
        color_space: SpiffColorSpace,
        resolution_units: SpiffResolutionUnits,
        vertical_resolution: u32,
        horizontal_resolution: u32,
    ) -> Result<(), CodecStatus>;
    fn encode_from_buffer(&mut self, source: &[u8]) -> Result<(), CodecStatus>;
    fn bytes_written(&self) -> Result<usize, CodecStatus>;
}
