//! CharLS backend, bound at run time through `libloading`.
//!
//! The shared library is resolved once, from an explicit [`LibraryConfig`],
//! and the loaded [`CharlsLibrary`] is then passed by reference to every
//! session. It binds the CharLS 2.x C API (`charls_jpegls_decoder_*` and
//! `charls_jpegls_encoder_*`).

use std::ffi::{OsString, c_void};
use std::marker::PhantomData;
use std::path::PathBuf;
use std::ptr::NonNull;

use libloading::Library;

use crate::codec::{DecoderHandle, EncoderHandle, JpeglsCodec};
use crate::constants::{AUTO_CALCULATE_STRIDE, CHARLS_LIBRARY_ENV};
use crate::error::{CodecErrorKind, CodecStatus, JpeglsError};
use crate::{FrameInfo, InterleaveMode, SpiffColorSpace, SpiffResolutionUnits};

/// Where to find the CharLS shared library.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LibraryConfig {
    /// Explicit library path. When unset the platform default name is
    /// handed to the system loader.
    pub path: Option<PathBuf>,
}

impl LibraryConfig {
    /// Reads the override path from the `CHARLS_LIBRARY` environment variable.
    pub fn from_env() -> Self {
        Self {
            path: std::env::var_os(CHARLS_LIBRARY_ENV).map(PathBuf::from),
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// The name or path passed to the system loader.
    pub fn library_name(&self) -> OsString {
        match &self.path {
            Some(path) => path.clone().into_os_string(),
            None => default_library_name().into(),
        }
    }
}

/// File name of the CharLS 2.x shared library on this platform.
pub fn default_library_name() -> &'static str {
    if cfg!(all(windows, target_pointer_width = "64")) {
        "charls-2-x64.dll"
    } else if cfg!(windows) {
        "charls-2-x86.dll"
    } else if cfg!(target_os = "macos") {
        "libcharls.dylib"
    } else {
        "libcharls.so"
    }
}

type Handle = *mut c_void;

struct Api {
    decoder_create: unsafe extern "C" fn() -> Handle,
    decoder_destroy: unsafe extern "C" fn(Handle),
    decoder_set_source_buffer: unsafe extern "C" fn(Handle, *const c_void, usize) -> i32,
    decoder_read_header: unsafe extern "C" fn(Handle) -> i32,
    decoder_get_frame_info: unsafe extern "C" fn(Handle, *mut FrameInfo) -> i32,
    decoder_get_interleave_mode: unsafe extern "C" fn(Handle, *mut i32) -> i32,
    decoder_get_destination_size: unsafe extern "C" fn(Handle, u32, *mut usize) -> i32,
    decoder_decode_to_buffer: unsafe extern "C" fn(Handle, *mut c_void, usize, u32) -> i32,
    encoder_create: unsafe extern "C" fn() -> Handle,
    encoder_destroy: unsafe extern "C" fn(Handle),
    encoder_set_frame_info: unsafe extern "C" fn(Handle, *const FrameInfo) -> i32,
    encoder_set_interleave_mode: unsafe extern "C" fn(Handle, i32) -> i32,
    encoder_get_estimated_destination_size: unsafe extern "C" fn(Handle, *mut usize) -> i32,
    encoder_set_destination_buffer: unsafe extern "C" fn(Handle, *mut c_void, usize) -> i32,
    encoder_write_standard_spiff_header: unsafe extern "C" fn(Handle, i32, i32, u32, u32) -> i32,
    encoder_encode_from_buffer: unsafe extern "C" fn(Handle, *const c_void, usize, u32) -> i32,
    encoder_get_bytes_written: unsafe extern "C" fn(Handle, *mut usize) -> i32,
}

/// A loaded CharLS shared library.
///
/// Loading happens once; the value can be shared between threads, each of
/// which creates its own decoder and encoder instances.
pub struct CharlsLibrary {
    api: Api,
    name: String,
    // Keeps the function pointers in `api` valid.
    _library: Library,
}

impl std::fmt::Debug for CharlsLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CharlsLibrary").field("name", &self.name).finish()
    }
}

impl CharlsLibrary {
    /// Loads the library named by `config` and resolves every CharLS entry point.
    pub fn load(config: &LibraryConfig) -> Result<Self, JpeglsError> {
        let file_name = config.library_name();
        let name = file_name.to_string_lossy().into_owned();
        // SAFETY: loading CharLS runs no initialization code with preconditions.
        let library = unsafe { Library::new(&file_name) }.map_err(|e| JpeglsError::Resource {
            library: name.clone(),
            reason: format!(
                "{e}. Ensure it is on the library search path or set {CHARLS_LIBRARY_ENV} to its full path"
            ),
        })?;

        // SAFETY: each symbol is looked up with the signature of its CharLS 2.x declaration.
        let api = unsafe {
            Api {
                decoder_create: symbol(&library, &name, b"charls_jpegls_decoder_create\0")?,
                decoder_destroy: symbol(&library, &name, b"charls_jpegls_decoder_destroy\0")?,
                decoder_set_source_buffer: symbol(&library, &name, b"charls_jpegls_decoder_set_source_buffer\0")?,
                decoder_read_header: symbol(&library, &name, b"charls_jpegls_decoder_read_header\0")?,
                decoder_get_frame_info: symbol(&library, &name, b"charls_jpegls_decoder_get_frame_info\0")?,
                decoder_get_interleave_mode: symbol(&library, &name, b"charls_jpegls_decoder_get_interleave_mode\0")?,
                decoder_get_destination_size: symbol(&library, &name, b"charls_jpegls_decoder_get_destination_size\0")?,
                decoder_decode_to_buffer: symbol(&library, &name, b"charls_jpegls_decoder_decode_to_buffer\0")?,
                encoder_create: symbol(&library, &name, b"charls_jpegls_encoder_create\0")?,
                encoder_destroy: symbol(&library, &name, b"charls_jpegls_encoder_destroy\0")?,
                encoder_set_frame_info: symbol(&library, &name, b"charls_jpegls_encoder_set_frame_info\0")?,
                encoder_set_interleave_mode: symbol(&library, &name, b"charls_jpegls_encoder_set_interleave_mode\0")?,
                encoder_get_estimated_destination_size: symbol(&library, &name, b"charls_jpegls_encoder_get_estimated_destination_size\0")?,
                encoder_set_destination_buffer: symbol(&library, &name, b"charls_jpegls_encoder_set_destination_buffer\0")?,
                encoder_write_standard_spiff_header: symbol(&library, &name, b"charls_jpegls_encoder_write_standard_spiff_header\0")?,
                encoder_encode_from_buffer: symbol(&library, &name, b"charls_jpegls_encoder_encode_from_buffer\0")?,
                encoder_get_bytes_written: symbol(&library, &name, b"charls_jpegls_encoder_get_bytes_written\0")?,
            }
        };
        log::debug!("loaded CharLS from {name}");

        Ok(Self {
            api,
            name,
            _library: library,
        })
    }

    /// The name or path the library was loaded from.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// # Safety
/// `T` must be the function pointer type matching the C declaration of `name`.
unsafe fn symbol<T: Copy>(library: &Library, library_name: &str, name: &[u8]) -> Result<T, JpeglsError> {
    let symbol = unsafe { library.get::<T>(name) }.map_err(|e| JpeglsError::Resource {
        library: library_name.to_string(),
        reason: e.to_string(),
    })?;
    Ok(*symbol)
}

impl JpeglsCodec for CharlsLibrary {
    type Decoder<'a> = CharlsDecoder<'a>;
    type Encoder<'a> = CharlsEncoder<'a>;

    fn create_decoder(&self) -> Result<CharlsDecoder<'_>, CodecStatus> {
        // SAFETY: takes no arguments; a null result means allocation failed.
        let raw = unsafe { (self.api.decoder_create)() };
        let raw = NonNull::new(raw).ok_or(CodecStatus::from(CodecErrorKind::NotEnoughMemory))?;
        Ok(CharlsDecoder {
            api: &self.api,
            raw,
            _source: PhantomData,
        })
    }

    fn create_encoder(&self) -> Result<CharlsEncoder<'_>, CodecStatus> {
        // SAFETY: takes no arguments; a null result means allocation failed.
        let raw = unsafe { (self.api.encoder_create)() };
        let raw = NonNull::new(raw).ok_or(CodecStatus::from(CodecErrorKind::NotEnoughMemory))?;
        Ok(CharlsEncoder {
            api: &self.api,
            raw,
            _destination: PhantomData,
        })
    }
}

/// A `charls_jpegls_decoder` instance.
pub struct CharlsDecoder<'a> {
    api: &'a Api,
    raw: NonNull<c_void>,
    _source: PhantomData<&'a [u8]>,
}

impl Drop for CharlsDecoder<'_> {
    fn drop(&mut self) {
        // SAFETY: `raw` came from `charls_jpegls_decoder_create` and is destroyed only here.
        unsafe { (self.api.decoder_destroy)(self.raw.as_ptr()) };
    }
}

// SAFETY (all calls below): `raw` is a live decoder owned by `self`, out
// pointers reference locals, and the source buffer outlives `self` through `'a`.
impl<'a> DecoderHandle<'a> for CharlsDecoder<'a> {
    fn set_source_buffer(&mut self, source: &'a [u8]) -> Result<(), CodecStatus> {
        CodecStatus::check(unsafe {
            (self.api.decoder_set_source_buffer)(self.raw.as_ptr(), source.as_ptr().cast(), source.len())
        })
    }

    fn read_header(&mut self) -> Result<(), CodecStatus> {
        CodecStatus::check(unsafe { (self.api.decoder_read_header)(self.raw.as_ptr()) })
    }

    fn frame_info(&self) -> Result<FrameInfo, CodecStatus> {
        let mut frame_info = FrameInfo::default();
        CodecStatus::check(unsafe { (self.api.decoder_get_frame_info)(self.raw.as_ptr(), &mut frame_info) })?;
        Ok(frame_info)
    }

    fn interleave_mode(&self) -> Result<InterleaveMode, CodecStatus> {
        let mut mode = 0i32;
        CodecStatus::check(unsafe { (self.api.decoder_get_interleave_mode)(self.raw.as_ptr(), &mut mode) })?;
        InterleaveMode::try_from(mode)
            .map_err(|_| CodecStatus::from(CodecErrorKind::InvalidParameterInterleaveMode))
    }

    fn destination_size(&self) -> Result<usize, CodecStatus> {
        let mut size = 0usize;
        CodecStatus::check(unsafe {
            (self.api.decoder_get_destination_size)(self.raw.as_ptr(), AUTO_CALCULATE_STRIDE, &mut size)
        })?;
        Ok(size)
    }

    fn decode_to_buffer(&mut self, destination: &mut [u8]) -> Result<(), CodecStatus> {
        CodecStatus::check(unsafe {
            (self.api.decoder_decode_to_buffer)(
                self.raw.as_ptr(),
                destination.as_mut_ptr().cast(),
                destination.len(),
                AUTO_CALCULATE_STRIDE,
            )
        })
    }
}

/// A `charls_jpegls_encoder` instance.
pub struct CharlsEncoder<'a> {
    api: &'a Api,
    raw: NonNull<c_void>,
    _destination: PhantomData<&'a mut [u8]>,
}

impl Drop for CharlsEncoder<'_> {
    fn drop(&mut self) {
        // SAFETY: `raw` came from `charls_jpegls_encoder_create` and is destroyed only here.
        unsafe { (self.api.encoder_destroy)(self.raw.as_ptr()) };
    }
}

// SAFETY (all calls below): `raw` is a live encoder owned by `self`, out
// pointers reference locals, and the destination outlives `self` through `'a`.
impl<'a> EncoderHandle<'a> for CharlsEncoder<'a> {
    fn set_frame_info(&mut self, frame_info: &FrameInfo) -> Result<(), CodecStatus> {
        CodecStatus::check(unsafe { (self.api.encoder_set_frame_info)(self.raw.as_ptr(), frame_info) })
    }

    fn set_interleave_mode(&mut self, interleave_mode: InterleaveMode) -> Result<(), CodecStatus> {
        CodecStatus::check(unsafe {
            (self.api.encoder_set_interleave_mode)(self.raw.as_ptr(), interleave_mode as i32)
        })
    }

    fn estimated_destination_size(&self) -> Result<usize, CodecStatus> {
        let mut size = 0usize;
        CodecStatus::check(unsafe {
            (self.api.encoder_get_estimated_destination_size)(self.raw.as_ptr(), &mut size)
        })?;
        Ok(size)
    }

    fn set_destination_buffer(&mut self, destination: &'a mut [u8]) -> Result<(), CodecStatus> {
        CodecStatus::check(unsafe {
            (self.api.encoder_set_destination_buffer)(
                self.raw.as_ptr(),
                destination.as_mut_ptr().cast(),
                destination.len(),
            )
        })
    }

    fn write_standard_spiff_header(
        &mut self,
        color_space: SpiffColorSpace,
        resolution_units: SpiffResolutionUnits,
        vertical_resolution: u32,
        horizontal_resolution: u32,
    ) -> Result<(), CodecStatus> {
        CodecStatus::check(unsafe {
            (self.api.encoder_write_standard_spiff_header)(
                self.raw.as_ptr(),
                color_space as i32,
                resolution_units as i32,
                vertical_resolution,
                horizontal_resolution,
            )
        })
    }

    fn encode_from_buffer(&mut self, source: &[u8]) -> Result<(), CodecStatus> {
        CodecStatus::check(unsafe {
            (self.api.encoder_encode_from_buffer)(
                self.raw.as_ptr(),
                source.as_ptr().cast(),
                source.len(),
                AUTO_CALCULATE_STRIDE,
            )
        })
    }

    fn bytes_written(&self) -> Result<usize, CodecStatus> {
        let mut size = 0usize;
        CodecStatus::check(unsafe { (self.api.encoder_get_bytes_written)(self.raw.as_ptr(), &mut size) })?;
        Ok(size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_path_wins() {
        let config = LibraryConfig::default().with_path("/opt/charls/lib/libcharls.so.2");
        assert_eq!(config.library_name(), OsString::from("/opt/charls/lib/libcharls.so.2"));
    }

    #[test]
    fn falls_back_to_platform_name() {
        let config = LibraryConfig::default();
        assert_eq!(config.library_name(), OsString::from(default_library_name()));
        if cfg!(target_os = "linux") {
            assert_eq!(default_library_name(), "libcharls.so");
        }
    }

    #[test]
    fn missing_library_is_a_resource_error() {
        let config = LibraryConfig::default().with_path("/nonexistent/libcharls-missing.so");
        match CharlsLibrary::load(&config) {
            Err(JpeglsError::Resource { library, .. }) => {
                assert_eq!(library, "/nonexistent/libcharls-missing.so")
            }
            other => panic!("expected a resource error, got {other:?}"),
        }
    }
}
