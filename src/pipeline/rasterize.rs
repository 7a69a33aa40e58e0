//! Page rasterization through ImageMagick.
//!
//! Each page is rendered by a separate `magick` invocation that writes one
//! JPEG into the run's workspace, with transparency composited onto white.
//! The freshly written file is then passed once through the
//! [`ImageCompressor`] at the same quality before it is returned.
//!
//! Rasterization is not per-page recoverable: the first failing
//! invocation aborts the whole range with the page index in the error.

use crate::error::CompressError;
use crate::pipeline::recompress::ImageCompressor;
use crate::workspace::page_image_path;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// A page rendered to a JPEG file inside the workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    pub path: PathBuf,
    /// 0-based index of the source page.
    pub page: usize,
    /// Quality of the most recent encode.
    pub quality: u8,
}

/// Renders single PDF pages to JPEG files.
pub trait PageRasterizer: Send + Sync {
    /// Check that the tool is usable; returns its version banner.
    fn probe(&self) -> Result<String, CompressError>;

    /// Number of pages in `document`.
    fn page_count(&self, document: &Path) -> Result<usize, CompressError>;

    /// Render page `page` (0-based) of `document` to `output` as a JPEG.
    ///
    /// Returning `Ok` does not guarantee `output` exists; callers check.
    fn render_page(
        &self,
        document: &Path,
        page: usize,
        dpi: u32,
        quality: u8,
        output: &Path,
    ) -> Result<(), CompressError>;
}

/// [`PageRasterizer`] that shells out to ImageMagick 7.
#[derive(Debug, Clone)]
pub struct MagickRasterizer {
    binary: PathBuf,
    timeout: Option<Duration>,
}

impl MagickRasterizer {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            timeout: None,
        }
    }

    /// Kill any single invocation that runs longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn tool_name(&self) -> String {
        self.binary.display().to_string()
    }

    /// Argument list for one page, in ImageMagick's positional order.
    fn page_args(document: &Path, page: usize, dpi: u32, quality: u8, output: &Path) -> Vec<String> {
        vec![
            "-density".into(),
            dpi.to_string(),
            "-quality".into(),
            quality.to_string(),
            "-compress".into(),
            "JPEG".into(),
            format!("{}[{}]", document.display(), page),
            "-background".into(),
            "white".into(),
            "-alpha".into(),
            "remove".into(),
            "-alpha".into(),
            "off".into(),
            output.display().to_string(),
        ]
    }

    /// Run `cmd` to completion, enforcing the timeout if one is set.
    fn run(&self, mut cmd: Command, page: usize) -> Result<Output, CompressError> {
        let spawn_failed = |e: std::io::Error| CompressError::RasterisationFailed {
            page,
            detail: format!("failed to execute {}: {e}", self.tool_name()),
        };

        let Some(timeout) = self.timeout else {
            return cmd.output().map_err(spawn_failed);
        };

        let mut child = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_failed)?;

        // Drain stderr concurrently so a chatty child cannot block on a full pipe.
        let stderr_reader = child.stderr.take().map(|mut pipe| {
            std::thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = pipe.read_to_end(&mut buf);
                buf
            })
        });

        let started = Instant::now();
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if started.elapsed() >= timeout => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(CompressError::ToolTimedOut {
                        tool: self.tool_name(),
                        page,
                        secs: timeout.as_secs(),
                    });
                }
                Ok(None) => std::thread::sleep(Duration::from_millis(25)),
                Err(e) => {
                    return Err(CompressError::RasterisationFailed {
                        page,
                        detail: e.to_string(),
                    })
                }
            }
        };

        let stderr = stderr_reader
            .and_then(|h| h.join().ok())
            .unwrap_or_default();
        Ok(Output {
            status,
            stdout: Vec::new(),
            stderr,
        })
    }
}

impl Default for MagickRasterizer {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_MAGICK_BINARY)
    }
}

impl PageRasterizer for MagickRasterizer {
    fn probe(&self) -> Result<String, CompressError> {
        let missing = |detail: String| CompressError::MissingDependency {
            tool: self.tool_name(),
            detail,
        };

        let output = Command::new(&self.binary)
            .arg("--version")
            .output()
            .map_err(|e| missing(e.to_string()))?;

        if !output.status.success() {
            return Err(missing(format!(
                "'--version' exited with {}",
                output.status
            )));
        }

        let banner = String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .unwrap_or_default()
            .trim()
            .to_string();
        Ok(banner)
    }

    fn page_count(&self, document: &Path) -> Result<usize, CompressError> {
        count_pages(document)
    }

    fn render_page(
        &self,
        document: &Path,
        page: usize,
        dpi: u32,
        quality: u8,
        output: &Path,
    ) -> Result<(), CompressError> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(Self::page_args(document, page, dpi, quality, output));

        let result = self.run(cmd, page)?;
        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(CompressError::RasterisationFailed {
                page,
                detail: format!("{} exited with {}: {}", self.tool_name(), result.status, stderr.trim()),
            });
        }
        Ok(())
    }
}

/// Count the pages of a PDF by parsing its page tree.
pub fn count_pages(document: &Path) -> Result<usize, CompressError> {
    let doc = lopdf::Document::load(document).map_err(|e| CompressError::CorruptPdf {
        path: document.to_path_buf(),
        detail: e.to_string(),
    })?;
    Ok(doc.get_pages().len())
}

/// Parameters for rasterising one half-open page range.
#[derive(Debug, Clone)]
pub struct RasterJob<'a> {
    pub document: &'a Path,
    pub output_dir: &'a Path,
    /// First page (0-based, inclusive).
    pub start_page: usize,
    /// One past the last page; `None` means the end of the document.
    pub end_page: Option<usize>,
    pub dpi: u32,
    pub quality: u8,
}

/// Rasterize `[start_page, end_page)` and recompress every produced image.
///
/// Pages whose output file is missing after a successful invocation are
/// skipped with a warning, so the result may be shorter than the range.
/// `on_page` is called with each page index that produced an image.
pub fn rasterize(
    rasterizer: &dyn PageRasterizer,
    compressor: &dyn ImageCompressor,
    job: &RasterJob<'_>,
    mut on_page: impl FnMut(usize),
) -> Result<Vec<RasterImage>, CompressError> {
    let end = match job.end_page {
        Some(end) => end,
        None => rasterizer.page_count(job.document)?,
    };
    let pages = job.start_page..end.max(job.start_page);
    info!(
        "Rasterising pages {}..{} at {} DPI, q={}",
        pages.start, pages.end, job.dpi, job.quality
    );

    let mut images = Vec::with_capacity(pages.len());
    for page in pages {
        let output = page_image_path(job.output_dir, page);
        rasterizer.render_page(job.document, page, job.dpi, job.quality, &output)?;

        if !output.exists() {
            warn!("Page {} produced no image at {}", page, output.display());
            continue;
        }

        compressor.recompress(&output, job.quality, true)?;
        debug!("Page {} → {}", page, output.display());
        on_page(page);
        images.push(RasterImage {
            path: output,
            page,
            quality: job.quality,
        });
    }

    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Writes a placeholder file for every page except those in `skip`.
    struct StubRasterizer {
        pages: usize,
        skip: Vec<usize>,
        fail_on: Option<usize>,
        rendered: Mutex<Vec<(usize, u32, u8)>>,
    }

    impl StubRasterizer {
        fn new(pages: usize) -> Self {
            Self {
                pages,
                skip: Vec::new(),
                fail_on: None,
                rendered: Mutex::new(Vec::new()),
            }
        }
    }

    impl PageRasterizer for StubRasterizer {
        fn probe(&self) -> Result<String, CompressError> {
            Ok("stub 1.0".into())
        }

        fn page_count(&self, _document: &Path) -> Result<usize, CompressError> {
            Ok(self.pages)
        }

        fn render_page(
            &self,
            _document: &Path,
            page: usize,
            dpi: u32,
            quality: u8,
            output: &Path,
        ) -> Result<(), CompressError> {
            if self.fail_on == Some(page) {
                return Err(CompressError::RasterisationFailed {
                    page,
                    detail: "boom".into(),
                });
            }
            self.rendered.lock().unwrap().push((page, dpi, quality));
            if !self.skip.contains(&page) {
                std::fs::write(output, b"jpeg").unwrap();
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingCompressor {
        calls: Mutex<Vec<(PathBuf, u8)>>,
    }

    impl ImageCompressor for RecordingCompressor {
        fn recompress(&self, image: &Path, quality: u8, _optimize: bool) -> Result<(), CompressError> {
            self.calls.lock().unwrap().push((image.to_path_buf(), quality));
            Ok(())
        }
    }

    fn job<'a>(dir: &'a Path, start: usize, end: Option<usize>) -> RasterJob<'a> {
        RasterJob {
            document: Path::new("in.pdf"),
            output_dir: dir,
            start_page: start,
            end_page: end,
            dpi: 200,
            quality: 85,
        }
    }

    #[test]
    fn open_ended_range_uses_page_count() {
        let dir = tempfile::tempdir().unwrap();
        let r = StubRasterizer::new(4);
        let c = RecordingCompressor::default();

        let images = rasterize(&r, &c, &job(dir.path(), 1, None), |_| {}).unwrap();

        let pages: Vec<usize> = images.iter().map(|i| i.page).collect();
        assert_eq!(pages, vec![1, 2, 3]);
        assert!(images[0].path.ends_with("page_1.jpg"));
    }

    #[test]
    fn each_image_recompressed_once_at_tier_quality() {
        let dir = tempfile::tempdir().unwrap();
        let r = StubRasterizer::new(3);
        let c = RecordingCompressor::default();

        rasterize(&r, &c, &job(dir.path(), 0, Some(3)), |_| {}).unwrap();

        let calls = c.calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        assert!(calls.iter().all(|(_, q)| *q == 85));
        assert!(r.rendered.lock().unwrap().iter().all(|&(_, dpi, q)| dpi == 200 && q == 85));
    }

    #[test]
    fn missing_output_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut r = StubRasterizer::new(3);
        r.skip = vec![1];
        let c = RecordingCompressor::default();
        let mut seen = Vec::new();

        let images = rasterize(&r, &c, &job(dir.path(), 0, Some(3)), |p| seen.push(p)).unwrap();

        assert_eq!(images.iter().map(|i| i.page).collect::<Vec<_>>(), vec![0, 2]);
        assert_eq!(seen, vec![0, 2]);
        assert_eq!(c.calls.lock().unwrap().len(), 2);
    }

    #[test]
    fn single_page_failure_aborts_range() {
        let dir = tempfile::tempdir().unwrap();
        let mut r = StubRasterizer::new(5);
        r.fail_on = Some(2);
        let c = RecordingCompressor::default();

        let err = rasterize(&r, &c, &job(dir.path(), 0, Some(5)), |_| {}).unwrap_err();
        match err {
            CompressError::RasterisationFailed { page, .. } => assert_eq!(page, 2),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(r.rendered.lock().unwrap().len(), 2);
    }

    #[test]
    fn empty_range_renders_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let r = StubRasterizer::new(3);
        let c = RecordingCompressor::default();

        let images = rasterize(&r, &c, &job(dir.path(), 5, Some(3)), |_| {}).unwrap();
        assert!(images.is_empty());
        assert!(r.rendered.lock().unwrap().is_empty());
    }

    #[test]
    fn magick_args_flatten_alpha_onto_white() {
        let args = MagickRasterizer::page_args(
            Path::new("/tmp/in.pdf"),
            4,
            35,
            25,
            Path::new("/tmp/ws/page_4.jpg"),
        );
        assert_eq!(
            args,
            vec![
                "-density", "35", "-quality", "25", "-compress", "JPEG", "/tmp/in.pdf[4]",
                "-background", "white", "-alpha", "remove", "-alpha", "off",
                "/tmp/ws/page_4.jpg",
            ]
        );
    }

    #[test]
    fn probe_of_missing_binary_is_missing_dependency() {
        let r = MagickRasterizer::new("/definitely/not/installed/magick");
        let err = r.probe().unwrap_err();
        assert!(matches!(err, CompressError::MissingDependency { .. }), "got: {err}");
    }

    #[test]
    fn render_with_missing_binary_names_page() {
        let dir = tempfile::tempdir().unwrap();
        let r = MagickRasterizer::new("/definitely/not/installed/magick")
            .with_timeout(Duration::from_secs(5));
        let err = r
            .render_page(Path::new("in.pdf"), 3, 72, 50, &dir.path().join("page_3.jpg"))
            .unwrap_err();
        match err {
            CompressError::RasterisationFailed { page, .. } => assert_eq!(page, 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn hung_tool_is_killed_after_timeout() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("slow-magick");
        std::fs::write(&script, "#!/bin/sh\nsleep 5\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let r = MagickRasterizer::new(&script).with_timeout(Duration::from_secs(1));
        let started = Instant::now();
        let err = r
            .render_page(Path::new("in.pdf"), 7, 72, 50, &dir.path().join("page_7.jpg"))
            .unwrap_err();
        let elapsed = started.elapsed();

        match err {
            CompressError::ToolTimedOut { page, secs, .. } => {
                assert_eq!(page, 7);
                assert_eq!(secs, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(elapsed < Duration::from_secs(4), "took {elapsed:?}");
    }

    #[test]
    fn count_pages_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.pdf");
        std::fs::write(&path, b"%PDF-1.4 garbage").unwrap();
        assert!(matches!(
            count_pages(&path).unwrap_err(),
            CompressError::CorruptPdf { .. }
        ));
    }
}
