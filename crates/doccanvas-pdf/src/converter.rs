//! External converter process
//!
//! Runs an office suite in headless mode inside a private temporary
//! directory. The directory doubles as the converter's `HOME`, so profile
//! locks from concurrent conversions never collide, and it is removed when
//! the conversion returns, whatever the outcome.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tempfile::TempDir;

use crate::error::{PdfError, Result};

/// Converter program used when none is configured
pub const DEFAULT_PROGRAM: &str = "soffice";

/// Upper bound on a single conversion when none is configured
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const INPUT_NAME: &str = "input.docx";
const OUTPUT_NAME: &str = "input.pdf";

/// DOCX to PDF converter backed by an external process
#[derive(Debug, Clone)]
pub struct PdfConverter {
    program: OsString,
    /// Arguments placed before the conversion arguments
    leading_args: Vec<OsString>,
    timeout: Duration,
    work_root: Option<PathBuf>,
}

impl Default for PdfConverter {
    fn default() -> Self {
        Self {
            program: DEFAULT_PROGRAM.into(),
            leading_args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
            work_root: None,
        }
    }
}

impl PdfConverter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different converter executable
    pub fn with_program(mut self, program: impl Into<OsString>) -> Self {
        self.program = program.into();
        self
    }

    /// Arguments inserted before `--headless`, e.g. a flatpak app id
    pub fn with_leading_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.leading_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Create work directories under `root` instead of the system temp dir
    pub fn with_work_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.work_root = Some(root.into());
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Convert a DOCX buffer to PDF bytes
    pub fn convert(&self, docx: &[u8]) -> Result<Vec<u8>> {
        let workdir = self.work_dir()?;
        let input = workdir.path().join(INPUT_NAME);
        fs::write(&input, docx)?;

        log::debug!(
            "converting {} bytes with {:?} in {}",
            docx.len(),
            self.program,
            workdir.path().display()
        );
        self.run(workdir.path(), &input)?;

        let output = workdir.path().join(OUTPUT_NAME);
        if !output.is_file() {
            return Err(PdfError::MissingOutput);
        }
        let pdf = fs::read(&output)?;
        log::debug!("converter produced {} bytes", pdf.len());
        Ok(pdf)
    }

    fn work_dir(&self) -> Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("doccanvas-pdf-");
        let dir = match &self.work_root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };
        Ok(dir)
    }

    fn run(&self, workdir: &Path, input: &Path) -> Result<()> {
        let mut child = Command::new(&self.program)
            .args(&self.leading_args)
            .arg("--headless")
            .arg("--convert-to")
            .arg("pdf")
            .arg("--outdir")
            .arg(workdir)
            .arg(input)
            .env("HOME", workdir)
            .current_dir(workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if Instant::now() >= deadline {
                log::warn!(
                    "converter {:?} exceeded {:?}, killing pid {}",
                    self.program,
                    self.timeout,
                    child.id()
                );
                let _ = child.kill();
                let _ = child.wait();
                return Err(PdfError::Timeout(self.timeout));
            }
            thread::sleep(POLL_INTERVAL);
        };

        if status.success() {
            Ok(())
        } else {
            Err(PdfError::ConverterFailed(status.to_string()))
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    /// Converter that runs a shell script, receiving the usual arguments
    fn script_converter(root: &Path, script: &str) -> PdfConverter {
        let path = root.join("fake-soffice.sh");
        fs::write(&path, script).unwrap();
        let work = root.join("work");
        fs::create_dir_all(&work).unwrap();
        PdfConverter::new()
            .with_program("/bin/sh")
            .with_leading_args([path])
            .with_work_root(work)
    }

    fn work_entries(root: &Path) -> usize {
        fs::read_dir(root.join("work")).unwrap().count()
    }

    #[test]
    fn test_successful_conversion() {
        let root = tempfile::tempdir().unwrap();
        let converter = script_converter(
            root.path(),
            "test \"$1\" = --headless || exit 3\nprintf '%%PDF-1.7 fake' > \"$5/input.pdf\"\n",
        );

        let pdf = converter.convert(b"PK fake docx").unwrap();
        assert!(pdf.starts_with(b"%PDF"));
        assert_eq!(work_entries(root.path()), 0);
    }

    #[test]
    fn test_input_is_written_for_converter() {
        let root = tempfile::tempdir().unwrap();
        let converter = script_converter(root.path(), "cp \"$6\" \"$5/input.pdf\"\n");

        let pdf = converter.convert(b"document bytes").unwrap();
        assert_eq!(pdf, b"document bytes");
    }

    #[test]
    fn test_failed_conversion() {
        let root = tempfile::tempdir().unwrap();
        let converter = script_converter(root.path(), "exit 7\n");

        let err = converter.convert(b"x").unwrap_err();
        assert!(matches!(err, PdfError::ConverterFailed(_)));
        assert_eq!(work_entries(root.path()), 0);
    }

    #[test]
    fn test_missing_output() {
        let root = tempfile::tempdir().unwrap();
        let converter = script_converter(root.path(), "exit 0\n");

        assert!(matches!(converter.convert(b"x"), Err(PdfError::MissingOutput)));
        assert_eq!(work_entries(root.path()), 0);
    }

    #[test]
    fn test_timeout_kills_converter() {
        let root = tempfile::tempdir().unwrap();
        let converter = script_converter(root.path(), "exec sleep 10\n")
            .with_timeout(Duration::from_millis(200));

        let started = Instant::now();
        let err = converter.convert(b"x").unwrap_err();
        assert!(matches!(err, PdfError::Timeout(_)));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(work_entries(root.path()), 0);
    }

    #[test]
    fn test_missing_program() {
        let root = tempfile::tempdir().unwrap();
        let converter = PdfConverter::new()
            .with_program(root.path().join("no-such-converter"))
            .with_work_root(root.path());

        assert!(matches!(converter.convert(b"x"), Err(PdfError::Io(_))));
        assert_eq!(fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_defaults() {
        let converter = PdfConverter::default();
        assert_eq!(converter.program, OsString::from(DEFAULT_PROGRAM));
        assert_eq!(converter.timeout(), DEFAULT_TIMEOUT);
    }
}
