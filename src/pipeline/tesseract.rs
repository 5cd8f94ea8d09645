//! [`OcrBackend`] that drives the `tesseract` command-line tool.
//!
//! The binary is located once in [`TesseractCli::detect`]. When it is missing
//! every call fails fast with [`OcrError::Unavailable`] instead of spawning a
//! process per page. Recognition output is requested as TSV so word
//! confidences come back alongside the text.

use crate::error::OcrError;
use crate::pipeline::ocr::{OcrBackend, RecognitionConfig, RecognizedText};
use image::{DynamicImage, ImageFormat};
use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_PROGRAM: &str = "tesseract";
/// How often a running recognition checks whether it was abandoned.
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(20);
/// TSV `level` of a single word.
const WORD_LEVEL: u32 = 5;

/// Tesseract invoked as an external process.
#[derive(Debug, Clone)]
pub struct TesseractCli {
    program: PathBuf,
    version: Option<String>,
}

impl TesseractCli {
    /// Locate tesseract (`path`, or `tesseract` on `PATH`) and record its
    /// version. Never fails; availability is reported by
    /// [`OcrBackend::is_available`].
    pub fn detect(path: Option<PathBuf>) -> Self {
        let program = path.unwrap_or_else(|| PathBuf::from(DEFAULT_PROGRAM));

        let version = match Command::new(&program).arg("--version").output() {
            Ok(out) if out.status.success() => {
                // Older releases print the banner on stderr.
                let banner = if out.stdout.is_empty() {
                    String::from_utf8_lossy(&out.stderr).into_owned()
                } else {
                    String::from_utf8_lossy(&out.stdout).into_owned()
                };
                let first = banner.lines().next().unwrap_or("tesseract").trim().to_string();
                debug!("Found {} at {}", first, program.display());
                Some(first)
            }
            Ok(out) => {
                warn!(
                    "{} --version exited with {}; OCR disabled",
                    program.display(),
                    out.status
                );
                None
            }
            Err(e) => {
                warn!(
                    "tesseract not found at {} ({}); install tesseract-ocr for OCR support",
                    program.display(),
                    e
                );
                None
            }
        };

        Self { program, version }
    }

    fn unavailable(&self) -> OcrError {
        OcrError::Unavailable(format!(
            "tesseract is not installed or not executable at {}",
            self.program.display()
        ))
    }
}

impl OcrBackend for TesseractCli {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn version(&self) -> Option<String> {
        self.version.clone()
    }

    fn is_available(&self) -> bool {
        self.version.is_some()
    }

    fn recognize(
        &self,
        image: &DynamicImage,
        config: &RecognitionConfig,
    ) -> Result<RecognizedText, OcrError> {
        if self.version.is_none() {
            return Err(self.unavailable());
        }

        // Removed when dropped, on every exit path.
        let png = tempfile::Builder::new()
            .prefix("pdf2text-")
            .suffix(".png")
            .tempfile()
            .map_err(|e| OcrError::Failed(format!("cannot create temp image: {}", e)))?;
        image
            .save_with_format(png.path(), ImageFormat::Png)
            .map_err(|e| OcrError::Failed(format!("cannot write temp image: {}", e)))?;

        // Output goes to temp files rather than pipes so the child never
        // blocks on a full pipe while we poll it.
        let capture = || {
            tempfile::tempfile()
                .map_err(|e| OcrError::Failed(format!("cannot create output file: {}", e)))
        };
        let (stdout, stderr) = (capture()?, capture()?);
        let child_handle = |f: &File| {
            f.try_clone()
                .map(Stdio::from)
                .map_err(|e| OcrError::Failed(format!("cannot share output file: {}", e)))
        };

        let mut child = Command::new(&self.program)
            .arg(png.path())
            .arg("stdout")
            .arg("-l")
            .arg(config.languages.join("+"))
            .arg("--oem")
            .arg("3")
            .arg("--psm")
            .arg(config.segmentation_mode.to_string())
            .arg("tsv")
            // Documents already run in parallel; one OpenMP thread per process.
            .env("OMP_THREAD_LIMIT", "1")
            .stdin(Stdio::null())
            .stdout(child_handle(&stdout)?)
            .stderr(child_handle(&stderr)?)
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound | ErrorKind::PermissionDenied => self.unavailable(),
                _ => OcrError::Failed(format!("failed to run tesseract: {}", e)),
            })?;

        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if config.abort.is_cancelled() => {
                    debug!(
                        "Killing tesseract (psm {}): result no longer wanted",
                        config.segmentation_mode
                    );
                    reap(&mut child);
                    return Err(OcrError::Aborted);
                }
                Ok(None) => std::thread::sleep(WAIT_POLL_INTERVAL),
                Err(e) => {
                    reap(&mut child);
                    return Err(OcrError::Failed(format!("failed to wait for tesseract: {}", e)));
                }
            }
        };

        if !status.success() {
            let stderr = read_capture(stderr).unwrap_or_default();
            return Err(OcrError::Failed(format!(
                "tesseract exited with {}: {}",
                status,
                stderr.trim()
            )));
        }

        let tsv = read_capture(stdout)
            .map_err(|e| OcrError::Failed(format!("cannot read tesseract output: {}", e)))?;
        Ok(parse_tsv(&tsv))
    }
}

/// Kill a child we no longer want and collect its exit status.
fn reap(child: &mut Child) {
    if let Err(e) = child.kill() {
        debug!("tesseract already exited: {}", e);
    }
    child.wait().ok();
}

/// Everything the child wrote to `file`, which shares its offset with the
/// child's handle.
fn read_capture(mut file: File) -> std::io::Result<String> {
    file.seek(SeekFrom::Start(0))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Rebuild text and mean confidence from tesseract TSV output.
///
/// Words on the same line are joined by a space, lines by a newline, and a
/// blank line separates paragraphs and blocks. Rows that are not words,
/// empty words, and malformed rows are skipped. Words with a negative
/// confidence count toward the text but not the mean.
pub fn parse_tsv(tsv: &str) -> RecognizedText {
    let mut text = String::new();
    let mut word_count = 0usize;
    let mut conf_sum = 0.0_f64;
    let mut conf_n = 0usize;
    let mut last: Option<(u32, u32, u32)> = None;

    for row in tsv.lines() {
        let cols: Vec<&str> = row.split('\t').collect();
        if cols.len() < 12 {
            continue;
        }
        let Ok(level) = cols[0].parse::<u32>() else {
            continue; // header
        };
        if level != WORD_LEVEL {
            continue;
        }
        let word = cols[11].trim();
        if word.is_empty() {
            continue;
        }
        let (Ok(block), Ok(par), Ok(line)) = (
            cols[2].parse::<u32>(),
            cols[3].parse::<u32>(),
            cols[4].parse::<u32>(),
        ) else {
            continue;
        };

        match last {
            None => {}
            Some((b, p, _)) if (b, p) != (block, par) => text.push_str("\n\n"),
            Some((_, _, l)) if l != line => text.push('\n'),
            Some(_) => text.push(' '),
        }
        last = Some((block, par, line));
        text.push_str(word);
        word_count += 1;

        if let Ok(conf) = cols[10].parse::<f64>() {
            if conf >= 0.0 {
                conf_sum += conf;
                conf_n += 1;
            }
        }
    }

    let confidence = if conf_n == 0 {
        0.0
    } else {
        ((conf_sum / conf_n as f64) / 100.0).clamp(0.0, 1.0) as f32
    };

    RecognizedText {
        text,
        confidence,
        word_count,
    }
}
