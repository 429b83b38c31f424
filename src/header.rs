//! Container prefix parsing.
//!
//! A JPEG-LS file starts either with a SPIFF header (start of image followed
//! by an APP8 segment) or directly with the JPEG-LS start of frame segment.
//! Both carry enough of the frame geometry in their first 32 bytes to decide
//! whether, and as which pixel mode, the image can be represented.

use crate::constants::{
    DEFAULT_RESOLUTION_DPI, HEADER_PREFIX_SIZE, JPEGLS_MARKER_MAGIC, MAXIMUM_BITS_PER_SAMPLE,
    MINIMUM_BITS_PER_SAMPLE, SPIFF_HEADER_SIZE_IN_BYTES, SPIFF_IDENTIFIER, SPIFF_MAGIC,
    SPIFF_MAJOR_REVISION_NUMBER, SPIFF_MINOR_REVISION_NUMBER, SPIFF_SEGMENT_LENGTH,
};
use crate::error::JpeglsError;
use crate::session::EncodeOptions;
use crate::{
    FrameInfo, InterleaveMode, SpiffColorSpace, SpiffCompressionType, SpiffProfileId,
    SpiffResolutionUnits,
};

/// Element width class of a bit depth: 8 for depths up to 8 bits, 16 otherwise.
pub fn bits_class(bits_per_sample: u8) -> u8 {
    if bits_per_sample <= 8 { 8 } else { 16 }
}

/// The pixel layouts a JPEG-LS image can be represented as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelMode {
    L8,
    Rgb8,
    L16,
    Rgb16,
}

impl PixelMode {
    /// Looks up the mode for a component count and bit depth.
    pub fn from_components(component_count: u32, bits_per_sample: u32) -> Result<Self, JpeglsError> {
        let unsupported = JpeglsError::UnsupportedMode {
            component_count,
            bits_per_sample,
        };
        if !(MINIMUM_BITS_PER_SAMPLE as u32..=MAXIMUM_BITS_PER_SAMPLE as u32).contains(&bits_per_sample) {
            return Err(unsupported);
        }
        match (component_count, bits_class(bits_per_sample as u8)) {
            (1, 8) => Ok(Self::L8),
            (3, 8) => Ok(Self::Rgb8),
            (1, 16) => Ok(Self::L16),
            (3, 16) => Ok(Self::Rgb16),
            _ => Err(unsupported),
        }
    }

    pub fn component_count(self) -> u8 {
        match self {
            Self::L8 | Self::L16 => 1,
            Self::Rgb8 | Self::Rgb16 => 3,
        }
    }

    /// Bit depth implied by the mode when no override is given.
    pub fn bits_per_sample(self) -> u8 {
        match self {
            Self::L8 | Self::Rgb8 => 8,
            Self::L16 | Self::Rgb16 => 16,
        }
    }
}

/// The fields of a SPIFF header found in the container prefix.
///
/// Enumerated fields are kept as their raw byte values; use the accessor
/// methods to interpret them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpiffHeader {
    pub header_length: u16,
    pub version: (u8, u8),
    pub profile_id: u8,
    pub component_count: u8,
    pub height: u32,
    pub width: u32,
    pub color_space: u8,
    pub bits_per_sample: u8,
    pub compression_type: u8,
    pub resolution_units: u8,
    pub vertical_resolution: u32,
    /// Lies past the 32-byte prefix; `None` when the input ends before it.
    pub horizontal_resolution: Option<u32>,
}

impl SpiffHeader {
    /// The header a codec writes for `metadata` when asked for a standard SPIFF header.
    pub fn standard(
        metadata: &ImageMetadata,
        color_space: SpiffColorSpace,
        resolution_units: SpiffResolutionUnits,
        vertical_resolution: u32,
        horizontal_resolution: u32,
    ) -> Self {
        Self {
            header_length: SPIFF_SEGMENT_LENGTH,
            version: (SPIFF_MAJOR_REVISION_NUMBER, SPIFF_MINOR_REVISION_NUMBER),
            profile_id: SpiffProfileId::None as u8,
            component_count: metadata.component_count,
            height: metadata.height,
            width: metadata.width,
            color_space: color_space as u8,
            bits_per_sample: metadata.bits_per_sample,
            compression_type: SpiffCompressionType::JpegLs as u8,
            resolution_units: resolution_units as u8,
            vertical_resolution,
            horizontal_resolution: Some(horizontal_resolution),
        }
    }

    pub fn profile_id(&self) -> Result<SpiffProfileId, JpeglsError> {
        SpiffProfileId::try_from(self.profile_id)
    }

    pub fn color_space(&self) -> Result<SpiffColorSpace, JpeglsError> {
        SpiffColorSpace::try_from(self.color_space)
    }

    pub fn compression_type(&self) -> Result<SpiffCompressionType, JpeglsError> {
        SpiffCompressionType::try_from(self.compression_type)
    }

    pub fn resolution_units(&self) -> Result<SpiffResolutionUnits, JpeglsError> {
        SpiffResolutionUnits::try_from(self.resolution_units)
    }

    /// Serializes the start of image marker and the SPIFF APP8 segment.
    pub fn to_bytes(&self) -> [u8; SPIFF_HEADER_SIZE_IN_BYTES] {
        let mut bytes = [0u8; SPIFF_HEADER_SIZE_IN_BYTES];
        bytes[0..4].copy_from_slice(&SPIFF_MAGIC);
        bytes[4..6].copy_from_slice(&self.header_length.to_be_bytes());
        bytes[6..12].copy_from_slice(&SPIFF_IDENTIFIER);
        bytes[12] = self.version.0;
        bytes[13] = self.version.1;
        bytes[14] = self.profile_id;
        bytes[15] = self.component_count;
        bytes[16..20].copy_from_slice(&self.height.to_be_bytes());
        bytes[20..24].copy_from_slice(&self.width.to_be_bytes());
        bytes[24] = self.color_space;
        bytes[25] = self.bits_per_sample;
        bytes[26] = self.compression_type;
        bytes[27] = self.resolution_units;
        bytes[28..32].copy_from_slice(&self.vertical_resolution.to_be_bytes());
        let horizontal = self.horizontal_resolution.unwrap_or(self.vertical_resolution);
        bytes[32..36].copy_from_slice(&horizontal.to_be_bytes());
        bytes
    }
}

/// Geometry and color information of one JPEG-LS image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    pub bits_per_sample: u8,
    pub component_count: u8,
    /// Not carried by the container prefix; parsed metadata reports
    /// `InterleaveMode::None` until a codec has read the scan header.
    pub interleave_mode: InterleaveMode,
    pub color_space_id: Option<u8>,
    pub resolution_units: Option<u8>,
    pub vertical_resolution: Option<u32>,
}

impl ImageMetadata {
    /// Validates geometry reported by a codec and wraps it.
    pub fn from_frame_info(
        frame_info: &FrameInfo,
        interleave_mode: InterleaveMode,
    ) -> Result<Self, JpeglsError> {
        let component_count = u8::try_from(frame_info.component_count).unwrap_or(0);
        let bits_per_sample = u8::try_from(frame_info.bits_per_sample).unwrap_or(0);
        PixelMode::from_components(
            frame_info.component_count.max(0) as u32,
            frame_info.bits_per_sample.max(0) as u32,
        )?;
        if frame_info.width == 0 || frame_info.height == 0 {
            return Err(JpeglsError::Format("zero image dimension"));
        }
        if frame_info.sample_count().is_none() {
            return Err(JpeglsError::Format("image too large"));
        }
        Ok(Self {
            width: frame_info.width,
            height: frame_info.height,
            bits_per_sample,
            component_count,
            interleave_mode,
            color_space_id: None,
            resolution_units: None,
            vertical_resolution: None,
        })
    }

    fn from_spiff(spiff: &SpiffHeader) -> Result<Self, JpeglsError> {
        let frame_info = FrameInfo {
            width: spiff.width,
            height: spiff.height,
            bits_per_sample: spiff.bits_per_sample as i32,
            component_count: spiff.component_count as i32,
        };
        let mut metadata = Self::from_frame_info(&frame_info, InterleaveMode::None)?;
        metadata.color_space_id = Some(spiff.color_space);
        metadata.resolution_units = Some(spiff.resolution_units);
        metadata.vertical_resolution = Some(spiff.vertical_resolution);
        Ok(metadata)
    }

    /// Metadata for encoding an image of `mode`, applying the caller's options.
    pub fn for_encode(
        width: u32,
        height: u32,
        mode: PixelMode,
        options: &EncodeOptions,
    ) -> Result<Self, JpeglsError> {
        let component_count = mode.component_count();
        let bits_per_sample = options
            .bits_per_component
            .unwrap_or_else(|| mode.bits_per_sample());
        let frame_info = FrameInfo {
            width,
            height,
            bits_per_sample: bits_per_sample as i32,
            component_count: component_count as i32,
        };
        let interleave_mode = if component_count > 1 {
            options.interleave_mode.unwrap_or(InterleaveMode::Sample)
        } else {
            InterleaveMode::None
        };
        let mut metadata = Self::from_frame_info(&frame_info, interleave_mode)?;
        if options.spiff {
            metadata.color_space_id =
                Some(SpiffColorSpace::for_component_count(component_count) as u8);
            metadata.resolution_units = Some(SpiffResolutionUnits::DotsPerInch as u8);
            metadata.vertical_resolution = Some(DEFAULT_RESOLUTION_DPI);
        }
        Ok(metadata)
    }

    pub fn pixel_mode(&self) -> Result<PixelMode, JpeglsError> {
        PixelMode::from_components(self.component_count as u32, self.bits_per_sample as u32)
    }

    pub fn sample_count(&self) -> Option<usize> {
        self.frame_info().sample_count()
    }

    pub fn frame_info(&self) -> FrameInfo {
        FrameInfo {
            width: self.width,
            height: self.height,
            bits_per_sample: self.bits_per_sample as i32,
            component_count: self.component_count as i32,
        }
    }

    /// The SPIFF header a `spiff = true` encode of this image produces, if any.
    pub fn implied_spiff_header(&self) -> Option<SpiffHeader> {
        let color_space = SpiffColorSpace::try_from(self.color_space_id?).ok()?;
        let units = SpiffResolutionUnits::try_from(self.resolution_units?).ok()?;
        let resolution = self.vertical_resolution?;
        Some(SpiffHeader::standard(self, color_space, units, resolution, resolution))
    }

    /// Whether two descriptions agree on the geometry a decoder produces.
    pub fn same_geometry(&self, other: &ImageMetadata) -> bool {
        self.frame_info() == other.frame_info()
    }
}

/// Accepts streams starting with either JPEG-LS magic number.
pub fn is_jpegls(header: &[u8]) -> bool {
    header.starts_with(&SPIFF_MAGIC) || header.starts_with(&JPEGLS_MARKER_MAGIC)
}

/// Reads a SPIFF header declaring JPEG-LS compression; `None` otherwise.
pub fn spiff_header(header: &[u8]) -> Option<SpiffHeader> {
    if !header.starts_with(&SPIFF_MAGIC) || header.len() < HEADER_PREFIX_SIZE {
        return None;
    }
    if header[26] != SpiffCompressionType::JpegLs as u8 {
        return None;
    }

    Some(SpiffHeader {
        header_length: read_u16(header, 4),
        version: (header[12], header[13]),
        profile_id: header[14],
        component_count: header[15],
        height: read_u32(header, 16),
        width: read_u32(header, 20),
        color_space: header[24],
        bits_per_sample: header[25],
        compression_type: header[26],
        resolution_units: header[27],
        vertical_resolution: read_u32(header, 28),
        horizontal_resolution: header
            .get(32..36)
            .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]])),
    })
}

/// Reads the frame geometry of a stream starting directly with the JPEG-LS
/// start of frame segment; `None` otherwise.
pub fn frame_marker(header: &[u8]) -> Option<FrameInfo> {
    if !header.starts_with(&JPEGLS_MARKER_MAGIC) || header.len() < 12 {
        return None;
    }

    Some(FrameInfo {
        bits_per_sample: header[6] as i32,
        height: read_u16(header, 7) as u32,
        width: read_u16(header, 9) as u32,
        component_count: header[11] as i32,
    })
}

/// Parses the container prefix of a JPEG-LS stream.
pub fn parse_header(header: &[u8]) -> Result<ImageMetadata, JpeglsError> {
    if let Some(spiff) = spiff_header(header) {
        return ImageMetadata::from_spiff(&spiff);
    }
    if let Some(frame_info) = frame_marker(header) {
        return ImageMetadata::from_frame_info(&frame_info, InterleaveMode::None);
    }

    Err(JpeglsError::Format(if header.starts_with(&SPIFF_MAGIC) {
        if header.len() < HEADER_PREFIX_SIZE {
            "truncated SPIFF header"
        } else {
            "SPIFF compression type is not JPEG-LS"
        }
    } else if header.starts_with(&JPEGLS_MARKER_MAGIC) {
        "truncated start of frame segment"
    } else {
        "unrecognized magic number"
    }))
}

fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([bytes[offset], bytes[offset + 1]])
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}
