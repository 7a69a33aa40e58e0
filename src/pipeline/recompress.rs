//! In-place JPEG re-encoding.
//!
//! The compressor decodes an image, flattens any alpha channel onto white and
//! writes a fresh JPEG at the requested quality. The replacement is written to
//! a sibling temp file and renamed over the original, so a failed encode never
//! leaves a truncated image behind.

use crate::error::CompressError;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GrayImage, ImageResult, LumaA, Rgb, RgbImage, Rgba};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;

/// Re-encodes an image file in place.
pub trait ImageCompressor: Send + Sync {
    /// Replace the file at `image` with a JPEG encoded at `quality` (1–100).
    ///
    /// `optimize` asks for optimized entropy tables where the backend
    /// supports them. The pipeline always requests it.
    fn recompress(&self, image: &Path, quality: u8, optimize: bool) -> Result<(), CompressError>;
}

/// [`ImageCompressor`] backed by the `image` crate's JPEG codec.
///
/// The codec has a single encoding path, so the `optimize` flag is ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct JpegRecompressor;

impl ImageCompressor for JpegRecompressor {
    fn recompress(&self, image: &Path, quality: u8, _optimize: bool) -> Result<(), CompressError> {
        let fail = |detail: String| CompressError::ImageCompressionFailed {
            path: image.to_path_buf(),
            detail,
        };

        let decoded = image::ImageReader::open(image)
            .map_err(|e| fail(e.to_string()))?
            .with_guessed_format()
            .map_err(|e| fail(e.to_string()))?
            .decode()
            .map_err(|e| fail(e.to_string()))?;

        let dir = image.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| fail(e.to_string()))?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            encode_jpeg(&decoded, quality, &mut writer).map_err(|e| fail(e.to_string()))?;
            writer.flush().map_err(|e| fail(e.to_string()))?;
        }
        tmp.persist(image).map_err(|e| fail(e.error.to_string()))?;

        debug!(
            "Recompressed {} at q={} ({}x{})",
            image.display(),
            quality,
            decoded.width(),
            decoded.height()
        );
        Ok(())
    }
}

/// Encode `img` as a baseline JPEG, compositing transparency onto white.
///
/// Grayscale sources stay single-channel; everything else becomes RGB.
pub fn encode_jpeg<W: Write>(img: &DynamicImage, quality: u8, writer: W) -> ImageResult<()> {
    let mut encoder = JpegEncoder::new_with_quality(writer, quality.clamp(1, 100));
    let color = img.color();

    if color.has_color() {
        let rgb = if color.has_alpha() {
            flatten_rgba(img)
        } else {
            img.to_rgb8()
        };
        encoder.encode_image(&rgb)
    } else {
        let luma = if color.has_alpha() {
            flatten_luma_alpha(img)
        } else {
            img.to_luma8()
        };
        encoder.encode_image(&luma)
    }
}

fn over_white(channel: u8, alpha: u8) -> u8 {
    let c = channel as u32;
    let a = alpha as u32;
    ((c * a + 255 * (255 - a) + 127) / 255) as u8
}

fn flatten_rgba(img: &DynamicImage) -> RgbImage {
    let rgba = img.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let Rgba([r, g, b, a]) = *rgba.get_pixel(x, y);
        Rgb([over_white(r, a), over_white(g, a), over_white(b, a)])
    })
}

fn flatten_luma_alpha(img: &DynamicImage) -> GrayImage {
    let la = img.to_luma_alpha8();
    GrayImage::from_fn(la.width(), la.height(), |x, y| {
        let LumaA([l, a]) = *la.get_pixel(x, y);
        image::Luma([over_white(l, a)])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    fn noisy_rgb(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(w, h, |x, y| {
            Rgb([
                ((x * 37 + y * 11) % 256) as u8,
                ((x * 5 + y * 91) % 256) as u8,
                ((x ^ y) % 256) as u8,
            ])
        }))
    }

    #[test]
    fn transparent_pixels_become_white() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 0])));
        let flat = flatten_rgba(&img);
        assert_eq!(*flat.get_pixel(0, 0), Rgb([255, 255, 255]));
    }

    #[test]
    fn opaque_pixels_keep_their_colour() {
        assert_eq!(over_white(12, 255), 12);
        assert_eq!(over_white(0, 0), 255);
    }

    #[test]
    fn recompress_replaces_file_with_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page_0.jpg");
        let mut buf = Vec::new();
        encode_jpeg(&noisy_rgb(64, 48), 95, &mut buf).unwrap();
        std::fs::write(&path, &buf).unwrap();

        JpegRecompressor.recompress(&path, 15, true).expect("recompress");

        let after = std::fs::read(&path).unwrap();
        assert_eq!(&after[..2], &[0xFF, 0xD8], "output must be a JPEG");
        assert!(after.len() < buf.len(), "q15 should shrink a q95 image");

        let reloaded = image::load_from_memory(&after).unwrap();
        assert_eq!((reloaded.width(), reloaded.height()), (64, 48));
    }

    #[test]
    fn grayscale_stays_single_channel() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gray.jpg");
        let gray = DynamicImage::ImageLuma8(GrayImage::from_pixel(8, 8, image::Luma([90])));
        let mut buf = Vec::new();
        encode_jpeg(&gray, 80, &mut buf).unwrap();
        std::fs::write(&path, &buf).unwrap();

        JpegRecompressor.recompress(&path, 50, true).unwrap();

        let reloaded = image::open(&path).unwrap();
        assert!(!reloaded.color().has_color());
    }

    #[test]
    fn undecodable_file_is_left_intact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"not an image at all").unwrap();

        let err = JpegRecompressor.recompress(&path, 50, false).unwrap_err();
        assert!(matches!(err, CompressError::ImageCompressionFailed { .. }));
        assert_eq!(std::fs::read(&path).unwrap(), b"not an image at all");
    }
}
