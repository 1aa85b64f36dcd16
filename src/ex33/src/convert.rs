//! Binary save <-> structured document conversion.
//!
//! The actual conversion is done by an external program (by default
//! `uesave`), run as a blocking child process with an input and an output
//! path. Only its exit status and output file matter here.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("Failed to launch converter {program}: {source}")]
    Launch {
        program: PathBuf,
        source: std::io::Error,
    },

    #[error("Converter {program} failed ({status}): {stderr}")]
    Failed {
        program: PathBuf,
        status: String,
        stderr: String,
    },

    #[error("Converter {program} timed out after {timeout:?}")]
    Timeout { program: PathBuf, timeout: Duration },

    #[error("Invalid converter output {path}: {reason}")]
    InvalidOutput { path: PathBuf, reason: String },

    #[error("Operation aborted before any file was touched")]
    Aborted,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Which way a conversion goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Binary save to structured document
    ToDocument,
    /// Structured document to binary save
    ToBinary,
}

/// Something that converts between a binary save and its structured document
pub trait Converter {
    /// Convert `input` into `output`. Blocks until done.
    fn convert(&self, direction: Direction, input: &Path, output: &Path)
        -> Result<(), ConversionError>;
}

/// Placeholder replaced by the input path in argument templates
pub const INPUT_PLACEHOLDER: &str = "{input}";
/// Placeholder replaced by the output path in argument templates
pub const OUTPUT_PLACEHOLDER: &str = "{output}";

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Converter backed by an external program
#[derive(Debug, Clone)]
pub struct ExternalConverter {
    program: PathBuf,
    to_document_args: Vec<String>,
    to_binary_args: Vec<String>,
    timeout: Option<Duration>,
}

impl ExternalConverter {
    /// Converter invoking `uesave to-json` / `uesave from-json`
    pub fn uesave(program: impl Into<PathBuf>) -> Self {
        let args = |verb: &str| {
            [verb, "-i", INPUT_PLACEHOLDER, "-o", OUTPUT_PLACEHOLDER]
                .iter()
                .map(|s| s.to_string())
                .collect()
        };
        ExternalConverter {
            program: program.into(),
            to_document_args: args("to-json"),
            to_binary_args: args("from-json"),
            timeout: None,
        }
    }

    /// Converter with custom argument templates
    pub fn with_args(
        program: impl Into<PathBuf>,
        to_document_args: Vec<String>,
        to_binary_args: Vec<String>,
    ) -> Self {
        ExternalConverter {
            program: program.into(),
            to_document_args,
            to_binary_args,
            timeout: None,
        }
    }

    /// Kill the converter and fail if it runs longer than `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn arguments(&self, direction: Direction, input: &Path, output: &Path) -> Vec<String> {
        let template = match direction {
            Direction::ToDocument => &self.to_document_args,
            Direction::ToBinary => &self.to_binary_args,
        };
        let input = input.to_string_lossy();
        let output = output.to_string_lossy();
        template
            .iter()
            .map(|arg| {
                arg.replace(INPUT_PLACEHOLDER, &input)
                    .replace(OUTPUT_PLACEHOLDER, &output)
            })
            .collect()
    }

    fn wait(&self, child: &mut std::process::Child) -> Result<ExitStatus, ConversionError> {
        let Some(timeout) = self.timeout else {
            return Ok(child.wait()?);
        };
        let started = Instant::now();
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }
            if started.elapsed() >= timeout {
                // The child may exit between try_wait and kill
                let _ = child.kill();
                let _ = child.wait();
                warn!(program = %self.program.display(), ?timeout, "Converter timed out");
                return Err(ConversionError::Timeout {
                    program: self.program.clone(),
                    timeout,
                });
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

impl Converter for ExternalConverter {
    fn convert(
        &self,
        direction: Direction,
        input: &Path,
        output: &Path,
    ) -> Result<(), ConversionError> {
        let args = self.arguments(direction, input, output);
        debug!(program = %self.program.display(), ?args, "Running converter");

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ConversionError::Launch {
                program: self.program.clone(),
                source,
            })?;

        // Drain stderr on its own thread so a chatty converter cannot block on a full pipe
        let stderr_reader = child.stderr.take().map(|mut pipe| {
            thread::spawn(move || {
                let mut text = String::new();
                let _ = pipe.read_to_string(&mut text);
                text
            })
        });

        // On timeout the reader thread is left detached; a grandchild may still hold the pipe
        let status = self.wait(&mut child)?;
        let stderr = stderr_reader
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        if !status.success() {
            warn!(program = %self.program.display(), %status, "Converter failed");
            return Err(ConversionError::Failed {
                program: self.program.clone(),
                status: status.to_string(),
                stderr: stderr.trim().to_string(),
            });
        }
        Ok(())
    }
}
