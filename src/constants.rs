// Number of leading bytes inspected to recognize a JPEG-LS stream.
pub const HEADER_PREFIX_SIZE: usize = 32;

// Start of image followed by an APP8 marker: a SPIFF header.
pub const SPIFF_MAGIC: [u8; 4] = [0xFF, 0xD8, 0xFF, 0xE8];

// Start of image followed by a start of frame (JPEG-LS) marker.
pub const JPEGLS_MARKER_MAGIC: [u8; 4] = [0xFF, 0xD8, 0xFF, 0xF7];

pub const SPIFF_IDENTIFIER: [u8; 6] = *b"SPIFF\0";

// ISO/IEC 14495-1, section 4.8.1 defines the SPIFF version numbers to be used for the SPIFF header in combination with
// JPEG-LS.
pub const SPIFF_MAJOR_REVISION_NUMBER: u8 = 2;
pub const SPIFF_MINOR_REVISION_NUMBER: u8 = 0;

// The size of a SPIFF header when serialized to a JPEG byte stream, start of image marker included.
pub const SPIFF_HEADER_SIZE_IN_BYTES: usize = 36;

// Value of the APP8 segment length field of a SPIFF header.
pub const SPIFF_SEGMENT_LENGTH: u16 = 32;

pub const MINIMUM_BITS_PER_SAMPLE: u8 = 1;
pub const MAXIMUM_BITS_PER_SAMPLE: u8 = 16;

// Resolution written into standard SPIFF headers.
pub const DEFAULT_RESOLUTION_DPI: u32 = 72;

// Environment variable naming the CharLS shared library to load.
pub const CHARLS_LIBRARY_ENV: &str = "CHARLS_LIBRARY";

// Stride value telling CharLS that rows are tightly packed.
pub const AUTO_CALCULATE_STRIDE: u32 = 0;
