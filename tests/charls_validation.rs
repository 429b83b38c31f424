// Round trips through a real CharLS library.
//
// These tests need CharLS 2.x: point CHARLS_LIBRARY at the shared library
// (or install it under its platform name) and run with `--ignored`.

#[cfg(test)]
mod charls_round_trip {
    use jpegls_image::codec::charls::{CharlsLibrary, LibraryConfig};
    use jpegls_image::constants::{JPEGLS_MARKER_MAGIC, SPIFF_MAGIC};
    use jpegls_image::{
        EncodeOptions, InterleaveMode, PixelBuffer, PixelMode, SourceImage, SpiffColorSpace, decode,
        encode, parse_header,
    };

    fn charls() -> CharlsLibrary {
        CharlsLibrary::load(&LibraryConfig::from_env())
            .unwrap_or_else(|e| panic!("CharLS is required for this test: {}", e))
    }

    fn gradient(width: u32, height: u32, mode: PixelMode) -> SourceImage {
        let components = mode.component_count() as u32;
        let count = (width * height * components) as usize;
        let pixels = if mode.bits_per_sample() == 8 {
            PixelBuffer::Eight((0..count).map(|i| (i * 3 % 251) as u8).collect())
        } else {
            PixelBuffer::Sixteen((0..count).map(|i| (i * 97 % 4096) as u16).collect())
        };
        SourceImage::new(width, height, mode, pixels).unwrap()
    }

    fn round_trip(name: &str, image: &SourceImage, options: &EncodeOptions) {
        let charls = charls();
        let encoded = encode(&charls, image, options)
            .unwrap_or_else(|e| panic!("Failed to encode {}: {}", name, e));

        let magic = if options.spiff { SPIFF_MAGIC } else { JPEGLS_MARKER_MAGIC };
        assert!(encoded.starts_with(&magic), "Unexpected prefix for {}", name);
        let header = parse_header(&encoded).unwrap();
        assert_eq!((header.width, header.height), (image.width, image.height), "{}", name);

        let decoded = decode(&charls, &encoded)
            .unwrap_or_else(|e| panic!("Failed to decode {}: {}", name, e));
        let expected_bits = options.bits_per_component.unwrap_or(image.mode.bits_per_sample());
        assert_eq!(decoded.metadata.bits_per_sample, expected_bits, "{}", name);
        assert_eq!(decoded.pixels, image.pixels, "Pixel data mismatch for {}", name);
        println!("✓ {}: {} bytes", name, encoded.len());
    }

    #[test]
    #[ignore] // needs CharLS
    fn test_gray8_without_spiff() {
        round_trip(
            "gray8",
            &gradient(4, 3, PixelMode::L8),
            &EncodeOptions::default().with_spiff(false),
        );
    }

    #[test]
    #[ignore] // needs CharLS
    fn test_gray12() {
        round_trip(
            "gray12",
            &gradient(32, 16, PixelMode::L16),
            &EncodeOptions::default().with_bits_per_component(12),
        );
    }

    #[test]
    #[ignore] // needs CharLS
    fn test_rgb8_every_interleave_mode() {
        for mode in [InterleaveMode::None, InterleaveMode::Line, InterleaveMode::Sample] {
            round_trip(
                &format!("rgb8 {:?}", mode),
                &gradient(16, 16, PixelMode::Rgb8),
                &EncodeOptions::default().with_interleave_mode(mode),
            );
        }
    }

    #[test]
    #[ignore] // needs CharLS
    fn test_rgb16_planar() {
        round_trip(
            "rgb16 planar",
            &gradient(8, 8, PixelMode::Rgb16),
            &EncodeOptions::default()
                .with_interleave_mode(InterleaveMode::None)
                .with_bits_per_component(12),
        );
    }

    #[test]
    #[ignore] // needs CharLS
    fn test_spiff_color_space() {
        let charls = charls();
        let encoded = encode(&charls, &gradient(8, 8, PixelMode::Rgb8), &EncodeOptions::default()).unwrap();
        let decoded = decode(&charls, &encoded).unwrap();
        assert_eq!(decoded.metadata.color_space_id, Some(SpiffColorSpace::Rgb as u8));
        assert_eq!(decoded.metadata.vertical_resolution, Some(72));
    }
}
