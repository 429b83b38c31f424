//! jplsimage CLI - JPEG-LS encoding and decoding through CharLS.
//!
//! Converts between JPEG-LS and raw pixels or the formats of the `image`
//! crate (PNG, PNM), and inspects JPEG-LS container headers.

use clap::{Parser, Subcommand, ValueEnum};
use image::ImageReader;
use std::fs;
use std::io::{BufWriter, Cursor};
use std::path::{Path, PathBuf};

use jpegls_image::codec::charls::{CharlsLibrary, LibraryConfig};
use jpegls_image::image_codec;
use jpegls_image::{
    EncodeOptions, InterleaveMode, PixelBuffer, PixelMode, SourceImage, SpiffColorSpace,
    SpiffResolutionUnits, parse_header, session,
};

/// JPEG-LS encoder and decoder driving the CharLS library
#[derive(Parser)]
#[command(name = "jplsimage")]
#[command(version)]
#[command(about = "Encode and decode JPEG-LS images with CharLS", long_about = None)]
#[command(after_help = "EXAMPLES:
    jplsimage decode -i image.jls -o image.png -f image
    jplsimage encode -i image.ppm -o image.jls --interleave none
    jplsimage encode -i pixels.raw -o image.jls -w 512 -H 512 --bits 12 --no-spiff
    jplsimage info -i image.jls

The CharLS library is looked up under its platform name unless
--charls-library or the CHARLS_LIBRARY environment variable names it.")]
struct Cli {
    /// Path of the CharLS shared library (overrides CHARLS_LIBRARY)
    #[arg(long, global = true)]
    charls_library: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a JPEG-LS image to raw pixels or a standard image format
    #[command(visible_alias = "d")]
    Decode {
        /// Input JPEG-LS file
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path for decoded pixels
        #[arg(short, long)]
        output: PathBuf,

        /// Output format: raw (pixel-interleaved samples, 16-bit little endian) or
        /// image (format chosen from the output extension)
        #[arg(short, long, default_value = "raw", value_enum)]
        format: OutputFormat,
    },

    /// Encode raw pixels or a PNG/PNM image to JPEG-LS
    #[command(visible_alias = "e")]
    Encode {
        /// Input file: raw pixels (.raw) or any image the image crate reads
        #[arg(short, long)]
        input: PathBuf,

        /// Output JPEG-LS file
        #[arg(short, long)]
        output: PathBuf,

        /// Image width in pixels (raw input only)
        #[arg(short, long)]
        width: Option<u32>,

        /// Image height in pixels (raw input only)
        #[arg(short = 'H', long)]
        height: Option<u32>,

        /// Number of color components, 1 or 3 (raw input only)
        #[arg(short = 'n', long, default_value = "1")]
        components: u32,

        /// Bits per sample of the raw input; above 8 samples are 16-bit little endian
        #[arg(long, default_value = "8")]
        bits: u32,

        /// Bits per component written to the JPEG-LS stream
        #[arg(long)]
        bits_per_component: Option<u8>,

        /// Scan interleave mode for multi-component images
        #[arg(long, value_enum)]
        interleave: Option<Interleave>,

        /// Omit the SPIFF header
        #[arg(long)]
        no_spiff: bool,
    },

    /// Display the container header of a JPEG-LS file
    #[command(visible_alias = "i")]
    Info {
        /// Input file path
        #[arg(short, long)]
        input: PathBuf,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Raw binary pixel data
    Raw,
    /// Any format the image crate writes, chosen by extension
    Image,
}

#[derive(Clone, Copy, ValueEnum)]
enum Interleave {
    None,
    Line,
    Sample,
}

impl From<Interleave> for InterleaveMode {
    fn from(value: Interleave) -> Self {
        match value {
            Interleave::None => InterleaveMode::None,
            Interleave::Line => InterleaveMode::Line,
            Interleave::Sample => InterleaveMode::Sample,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let mut config = LibraryConfig::from_env();
    if let Some(path) = cli.charls_library {
        config = config.with_path(path);
    }

    let result = match cli.command {
        Commands::Decode {
            input,
            output,
            format,
        } => decode_image(&config, &input, &output, &format),
        Commands::Encode {
            input,
            output,
            width,
            height,
            components,
            bits,
            bits_per_component,
            interleave,
            no_spiff,
        } => {
            let options = EncodeOptions {
                bits_per_component,
                interleave_mode: interleave.map(InterleaveMode::from),
                spiff: !no_spiff,
            };
            let raw = RawGeometry {
                width,
                height,
                components,
                bits,
            };
            encode_image(&config, &input, &output, &raw, &options)
        }
        Commands::Info { input } => show_info(&input),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn decode_image(
    config: &LibraryConfig,
    input: &Path,
    output: &Path,
    format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = fs::read(input)?;
    // Registered decoders must outlive every later image read.
    let charls: &'static CharlsLibrary = Box::leak(Box::new(CharlsLibrary::load(config)?));

    let (width, height, components) = match format {
        OutputFormat::Raw => {
            let decoded = session::decode(charls, &data)?;
            let bytes = match &decoded.pixels {
                PixelBuffer::Eight(samples) => samples.clone(),
                PixelBuffer::Sixteen(samples) => samples.iter().flat_map(|s| s.to_le_bytes()).collect(),
            };
            fs::write(output, bytes)?;
            let metadata = decoded.metadata;
            (metadata.width, metadata.height, metadata.component_count)
        }
        OutputFormat::Image => {
            image_codec::register(charls);
            let image = ImageReader::new(Cursor::new(&data))
                .with_guessed_format()?
                .decode()?;
            image.save(output)?;
            (image.width(), image.height(), image.color().channel_count())
        }
    };

    println!(
        "✓ Decoded {}x{} image ({} components) to {:?}",
        width, height, components, output
    );
    Ok(())
}

struct RawGeometry {
    width: Option<u32>,
    height: Option<u32>,
    components: u32,
    bits: u32,
}

fn read_raw(input: &Path, raw: &RawGeometry) -> Result<SourceImage, Box<dyn std::error::Error>> {
    let (Some(width), Some(height)) = (raw.width, raw.height) else {
        return Err("raw input needs --width and --height".into());
    };
    let mode = PixelMode::from_components(raw.components, raw.bits)?;
    let bytes = fs::read(input)?;
    let pixels = if mode.bits_per_sample() == 8 {
        PixelBuffer::Eight(bytes)
    } else {
        PixelBuffer::Sixteen(
            bytes
                .chunks_exact(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                .collect(),
        )
    };
    Ok(SourceImage::new(width, height, mode, pixels)?)
}

fn encode_image(
    config: &LibraryConfig,
    input: &Path,
    output: &Path,
    raw: &RawGeometry,
    options: &EncodeOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let is_raw = input
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("raw"));
    let charls = CharlsLibrary::load(config)?;

    let (width, height) = if is_raw {
        let image = read_raw(input, raw)?;
        let options = EncodeOptions {
            bits_per_component: options.bits_per_component.or(Some(raw.bits as u8)),
            ..*options
        };
        let encoded = session::encode(&charls, &image, &options)?;
        fs::write(output, encoded)?;
        (image.width, image.height)
    } else {
        let image = image::open(input)?;
        let writer = BufWriter::new(fs::File::create(output)?);
        image_codec::save(&image, writer, &charls, *options)?;
        (image.width(), image.height())
    };

    println!(
        "✓ Encoded {}x{} image to {:?} with CharLS ({})",
        width,
        height,
        output,
        charls.name()
    );
    Ok(())
}

fn show_info(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let data = fs::read(input)?;

    println!("File: {:?}", input);
    println!("Size: {} bytes", data.len());
    println!();

    let metadata = parse_header(&data)?;
    match jpegls_image::header::spiff_header(&data) {
        Some(spiff) => {
            println!("Container: SPIFF {}.{}", spiff.version.0, spiff.version.1);
            match spiff.color_space() {
                Ok(color_space) => println!("Color space: {:?}", color_space),
                Err(_) => println!("Color space: unknown ({})", spiff.color_space),
            }
            if let Ok(units) = spiff.resolution_units() {
                let unit = match units {
                    SpiffResolutionUnits::AspectRatio => "aspect ratio",
                    SpiffResolutionUnits::DotsPerInch => "dpi",
                    SpiffResolutionUnits::DotsPerCentimeter => "dots/cm",
                };
                println!("Vertical resolution: {} {}", spiff.vertical_resolution, unit);
            }
        }
        None => println!("Container: JPEG-LS frame (no SPIFF header)"),
    }
    println!("Dimensions: {}x{}", metadata.width, metadata.height);
    println!("Bits per sample: {}", metadata.bits_per_sample);
    println!("Components: {}", metadata.component_count);
    println!("Pixel mode: {:?}", metadata.pixel_mode()?);
    if metadata.color_space_id == Some(SpiffColorSpace::Rgb as u8) && metadata.component_count != 3 {
        println!("Warning: RGB color space declared for {} components", metadata.component_count);
    }
    Ok(())
}
