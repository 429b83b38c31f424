use num_enum::{IntoPrimitive, TryFromPrimitive};
use thiserror::Error;

/// Errors surfaced to callers of this crate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JpeglsError {
    /// The stream does not start with a recognized JPEG-LS container prefix.
    #[error("Not a JPEG-LS file: {0}")]
    Format(&'static str),

    /// The component count / bit depth combination has no pixel mode.
    #[error(
        "Mode not supported (number of components: {component_count}, bits per sample: {bits_per_sample})"
    )]
    UnsupportedMode {
        component_count: u32,
        bits_per_sample: u32,
    },

    /// The native codec reported a failure.
    #[error("Codec error: {0}")]
    Codec(#[from] CodecErrorKind),

    /// The native codec library could not be loaded or is incomplete.
    #[error("Couldn't load the CharLS library `{library}`: {reason}")]
    Resource { library: String, reason: String },

    /// A pixel buffer does not hold the number of samples its geometry requires.
    #[error("Pixel buffer holds {actual} samples, expected {expected}")]
    BufferSize { expected: usize, actual: usize },

    /// Caller-supplied geometry no buffer can hold.
    #[error("Invalid image geometry: {0}")]
    Geometry(&'static str),
}

/// Failure kinds reported by the native codec, with their CharLS status values.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(i32)]
pub enum CodecErrorKind {
    #[error("Invalid argument")]
    InvalidArgument = 1,
    #[error("Parameter value not supported")]
    ParameterValueNotSupported = 2,
    #[error("Destination buffer too small")]
    DestinationBufferTooSmall = 3,
    #[error("Source buffer too small")]
    SourceBufferTooSmall = 4,
    #[error("Invalid encoded data")]
    InvalidEncodedData = 5,
    #[error("Too much encoded data")]
    TooMuchEncodedData = 6,
    #[error("Invalid operation")]
    InvalidOperation = 7,
    #[error("Bit depth for transform not supported")]
    BitDepthForTransformNotSupported = 8,
    #[error("Color transform not supported")]
    ColorTransformNotSupported = 9,
    #[error("Encoding not supported")]
    EncodingNotSupported = 10,
    #[error("Unknown JPEG marker found")]
    UnknownJpegMarkerFound = 11,
    #[error("JPEG marker start byte not found")]
    JpegMarkerStartByteNotFound = 12,
    #[error("Not enough memory")]
    NotEnoughMemory = 13,
    #[error("Unexpected failure")]
    UnexpectedFailure = 14,
    #[error("Start of image marker not found")]
    StartOfImageMarkerNotFound = 15,
    #[error("Start of frame marker not found")]
    StartOfFrameMarkerNotFound = 16,
    #[error("Invalid marker segment size")]
    InvalidMarkerSegmentSize = 17,
    #[error("Duplicate start of image marker")]
    DuplicateStartOfImageMarker = 18,
    #[error("Duplicate start of frame marker")]
    DuplicateStartOfFrameMarker = 19,
    #[error("Duplicate component ID in SOF segment")]
    DuplicateComponentIdInSofSegment = 20,
    #[error("Unexpected end of image marker")]
    UnexpectedEndOfImageMarker = 21,
    #[error("Invalid JPEG-LS preset parameter type")]
    InvalidJpeglsPresetParameterType = 22,
    #[error("JPEG-LS preset extended parameter type not supported")]
    JpeglsPresetExtendedParameterTypeNotSupported = 23,
    #[error("Missing end of SPIFF directory")]
    MissingEndOfSpiffDirectory = 24,

    // Argument errors
    #[error("Invalid argument width")]
    InvalidArgumentWidth = 100,
    #[error("Invalid argument height")]
    InvalidArgumentHeight = 101,
    #[error("Invalid argument component count")]
    InvalidArgumentComponentCount = 102,
    #[error("Invalid argument bits per sample")]
    InvalidArgumentBitsPerSample = 103,
    #[error("Invalid argument interleave mode")]
    InvalidArgumentInterleaveMode = 104,
    #[error("Invalid argument near lossless")]
    InvalidArgumentNearLossless = 105,
    #[error("Invalid argument JPEG-LS PC parameters")]
    InvalidArgumentPcParameters = 106,
    #[error("Invalid argument SPIFF entry size")]
    InvalidArgumentSpiffEntrySize = 110,
    #[error("Invalid argument color transformation")]
    InvalidArgumentColorTransformation = 111,

    // Parameter errors found in encoded data
    #[error("Invalid parameter width")]
    InvalidParameterWidth = 200,
    #[error("Invalid parameter height")]
    InvalidParameterHeight = 201,
    #[error("Invalid parameter component count")]
    InvalidParameterComponentCount = 202,
    #[error("Invalid parameter bits per sample")]
    InvalidParameterBitsPerSample = 203,
    #[error("Invalid parameter interleave mode")]
    InvalidParameterInterleaveMode = 204,
}

/// Raw result of a call into the native codec. Zero is success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecStatus(pub i32);

impl CodecStatus {
    pub const SUCCESS: i32 = 0;

    /// Turns a raw return value into a `Result`.
    pub fn check(code: i32) -> Result<(), CodecStatus> {
        if code == Self::SUCCESS {
            Ok(())
        } else {
            Err(CodecStatus(code))
        }
    }

    /// The named failure for this status.
    ///
    /// Values outside the published CharLS set are reported as
    /// [`CodecErrorKind::UnexpectedFailure`].
    pub fn kind(self) -> CodecErrorKind {
        CodecErrorKind::try_from(self.0).unwrap_or_else(|_| {
            log::warn!("unrecognized codec status {}", self.0);
            CodecErrorKind::UnexpectedFailure
        })
    }
}

impl From<CodecErrorKind> for CodecStatus {
    fn from(kind: CodecErrorKind) -> Self {
        CodecStatus(kind.into())
    }
}

impl From<CodecStatus> for JpeglsError {
    fn from(status: CodecStatus) -> Self {
        JpeglsError::Codec(status.kind())
    }
}
