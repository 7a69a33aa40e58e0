//! Reassembly: pack an ordered list of JPEG files into a single PDF.
//!
//! JPEG bytes are embedded unchanged as `DCTDecode` image XObjects, so the
//! size of the output tracks the size of the intermediate images directly.
//! Each image becomes one page whose MediaBox equals the image's pixel
//! dimensions in points.

use crate::error::CompressError;
use image::codecs::jpeg::JpegDecoder;
use image::{ColorType, ImageDecoder};
use lopdf::{dictionary, Document, Object, Stream};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Writes an ordered list of images to `output` as one PDF document.
pub trait DocumentAssembler: Send + Sync {
    /// Pack `images` (in order, one page each) into `output`, replacing it.
    fn assemble(&self, images: &[PathBuf], output: &Path) -> Result<(), CompressError>;
}

/// [`DocumentAssembler`] building the PDF with `lopdf`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JpegPdfAssembler;

impl DocumentAssembler for JpegPdfAssembler {
    fn assemble(&self, images: &[PathBuf], output: &Path) -> Result<(), CompressError> {
        let bytes = pack_jpegs(images)?;
        write_atomic(output, &bytes)?;
        info!(
            "Assembled {} pages → {} ({} bytes)",
            images.len(),
            output.display(),
            bytes.len()
        );
        Ok(())
    }
}

/// Dimensions and PDF colour space of an encoded JPEG.
fn probe_jpeg(path: &Path, bytes: &[u8]) -> Result<(u32, u32, &'static str), CompressError> {
    let fail = |detail: String| CompressError::AssemblyFailed {
        detail: format!("{}: {detail}", path.display()),
    };
    let decoder = JpegDecoder::new(Cursor::new(bytes)).map_err(|e| fail(e.to_string()))?;
    let (width, height) = decoder.dimensions();
    let colour_space = match decoder.color_type() {
        ColorType::L8 | ColorType::L16 => "DeviceGray",
        _ => "DeviceRGB",
    };
    Ok((width, height, colour_space))
}

/// Build the PDF bytes for `images`.
pub fn pack_jpegs(images: &[PathBuf]) -> Result<Vec<u8>, CompressError> {
    if images.is_empty() {
        return Err(CompressError::NoImagesProduced);
    }

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids = Vec::with_capacity(images.len());

    for path in images {
        let bytes = std::fs::read(path).map_err(|e| CompressError::AssemblyFailed {
            detail: format!("{}: {e}", path.display()),
        })?;
        if bytes.is_empty() {
            return Err(CompressError::AssemblyFailed {
                detail: format!("{} is empty", path.display()),
            });
        }

        let (width, height, colour_space) = probe_jpeg(path, &bytes)?;
        debug!("Packing {} ({}x{}, {})", path.display(), width, height, colour_space);

        let image_id = doc.add_object(Object::Stream(
            Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => width as i64,
                    "Height" => height as i64,
                    "ColorSpace" => colour_space,
                    "BitsPerComponent" => 8i64,
                    "Filter" => "DCTDecode",
                },
                bytes,
            )
            .with_compression(false),
        ));

        let content = format!("q\n{width} 0 0 {height} 0 0 cm\n/Im0 Do\nQ\n");
        let content_id = doc.add_object(Object::Stream(Stream::new(
            lopdf::Dictionary::new(),
            content.into_bytes(),
        )));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(width as i64),
                Object::Integer(height as i64),
            ],
            "Contents" => content_id,
            "Resources" => Object::Dictionary(dictionary! {
                "XObject" => Object::Dictionary(dictionary! {
                    "Im0" => image_id,
                }),
            }),
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buf = Vec::new();
    doc.save_to(&mut buf)
        .map_err(|e| CompressError::AssemblyFailed {
            detail: e.to_string(),
        })?;
    Ok(buf)
}

/// Write `bytes` to `path` via a sibling `.tmp` file and rename.
///
/// A new file gets the process's default mode; an existing file keeps its own.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), CompressError> {
    let write_failed = |source: std::io::Error| CompressError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(write_failed)?;
    }

    let tmp_path = path.with_extension("pdf.tmp");
    std::fs::write(&tmp_path, bytes).map_err(write_failed)?;

    let finish = || -> std::io::Result<()> {
        if let Ok(existing) = std::fs::metadata(path) {
            std::fs::set_permissions(&tmp_path, existing.permissions())?;
        }
        std::fs::rename(&tmp_path, path)
    };
    finish().map_err(|e| {
        let _ = std::fs::remove_file(&tmp_path);
        write_failed(e)
    })
}
