pub mod image_helper {
    use crate::error::ExportError;
    use image::codecs::png::PngEncoder;
    use image::codecs::pnm::{PnmEncoder, PnmSubtype, SampleEncoding};
    use image::{ExtendedColorType, ImageEncoder};
    use std::io::{BufWriter, Write};
    use std::path::Path;

    const RGBA_CHANNELS: usize = 4;

    /// The two raster encodings a grid can be written as.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub enum RasterFormat {
        /// Compressed true-color PNG with an opaque alpha channel.
        #[default]
        Png,
        /// Binary PPM (P6): a short text header followed by packed RGB triples.
        Ppm,
    }

    impl RasterFormat {
        pub fn extension(&self) -> &'static str {
            match self {
                RasterFormat::Png => "png",
                RasterFormat::Ppm => "ppm",
            }
        }
    }

    /// Writes a row-major RGBA8 buffer to `path` in the given format.
    pub fn save(
        path: &Path,
        width: u32,
        height: u32,
        rgba: &[u8],
        format: RasterFormat,
    ) -> Result<(), ExportError> {
        let output = std::fs::File::create(path)?;
        let mut output = BufWriter::new(output);
        encode(&mut output, width, height, rgba, format)?;
        output.flush()?;
        Ok(())
    }

    /// Encodes a row-major RGBA8 buffer into any writer.
    pub fn encode<W: Write>(
        writer: &mut W,
        width: u32,
        height: u32,
        rgba: &[u8],
        format: RasterFormat,
    ) -> Result<(), ExportError> {
        let expected = width as usize * height as usize * RGBA_CHANNELS;
        if rgba.len() != expected {
            return Err(ExportError::BufferSize {
                expected,
                actual: rgba.len(),
            });
        }

        match format {
            RasterFormat::Png => {
                let encoder = PngEncoder::new(writer);
                encoder.write_image(rgba, width, height, ExtendedColorType::Rgba8)?;
            }
            RasterFormat::Ppm => {
                // PPM has no alpha channel.
                let rgb: Vec<u8> = rgba
                    .chunks_exact(RGBA_CHANNELS)
                    .flat_map(|pixel| [pixel[0], pixel[1], pixel[2]])
                    .collect();
                let encoder = PnmEncoder::new(writer)
                    .with_subtype(PnmSubtype::Pixmap(SampleEncoding::Binary));
                encoder.write_image(&rgb, width, height, ExtendedColorType::Rgb8)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::image_helper::*;
    use crate::core_modules::utils::scratch_dir;
    use crate::error::ExportError;

    #[test]
    fn save_white_file() {
        let dir = scratch_dir("white");
        let height = 50u32;
        let width = 50u32;
        let buffer = vec![255u8; (width * height * 4) as usize];
        let path = dir.join("white_file.png");

        save(&path, width, height, &buffer, RasterFormat::Png)
            .expect("Error Saving File.");

        let decoded = image::open(&path).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (width, height));
        assert!(decoded.pixels().all(|p| p.0 == [255, 255, 255, 255]));
    }

    #[test]
    fn save_gradient_file_as_ppm() {
        let dir = scratch_dir("gradient");
        let height = 16u32;
        let width = 16u32;
        let mut buffer = vec![255u8; (width * height * 4) as usize];
        let mut intensity = 0u8;

        for i in buffer.chunks_mut(4) {
            i[0] = intensity;
            i[1] = intensity / 2;
            i[2] = 255 - intensity;
            intensity = intensity.wrapping_add(1);
        }

        let path = dir.join("gradient_file.ppm");
        save(&path, width, height, &buffer, RasterFormat::Ppm)
            .expect("Error Saving File.");

        let raw = std::fs::read(&path).unwrap();
        assert!(raw.starts_with(b"P6"));
        // Header plus exactly one RGB triple per pixel.
        assert!(raw.len() > (width * height * 3) as usize);

        let decoded = image::open(&path).unwrap().to_rgb8();
        assert_eq!(decoded.get_pixel(5, 0).0, [5, 2, 250]);
        assert_eq!(decoded.get_pixel(0, 1).0, [16, 8, 239]);
    }

    #[test]
    fn rejects_short_buffer() {
        let mut sink = Vec::new();
        let err = encode(&mut sink, 4, 4, &[0u8; 10], RasterFormat::Png)
            .unwrap_err();
        assert!(matches!(
            err,
            ExportError::BufferSize {
                expected: 64,
                actual: 10
            }
        ));
        assert!(sink.is_empty());
    }

    #[test]
    fn extensions_match_formats() {
        assert_eq!(RasterFormat::Png.extension(), "png");
        assert_eq!(RasterFormat::Ppm.extension(), "ppm");
        assert_eq!(RasterFormat::default(), RasterFormat::Png);
    }
}
