//! Session options and configuration
//!
//! This module contains the immutable [`SessionConfig`], its builder, and the
//! JSON config file format accepted by the driver.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Result, SessionError};
use crate::output::Markers;

/// Environment variable naming the directory that holds the binary and model files
pub const GEMMA_DIR_ENV: &str = "GEMMA_DIR";

/// Default binary name, resolved against the session directory
pub const DEFAULT_BINARY: &str = "gemma";

/// Default time allowed for the binary to print its first prompt marker
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(100);

/// Default time allowed for one response to complete
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(100);

/// Default bound on chunks buffered for a slow stream consumer
pub const DEFAULT_STREAM_BUFFER: usize = 32;

/// Default time the child gets to exit after stdin is closed
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

// ============================================================================
// Session Config
// ============================================================================

/// Immutable configuration of one session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    directory: PathBuf,
    binary: String,
    model: String,
    compressed_weights: PathBuf,
    tokenizer: PathBuf,
    markers: Markers,
    ready_timeout: Duration,
    response_timeout: Duration,
    stream_buffer: usize,
    transcript: Option<PathBuf>,
    shutdown_grace: Duration,
}

impl SessionConfig {
    /// Create a new builder for `SessionConfig`
    #[must_use]
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::default()
    }

    /// Load a config from a JSON file
    ///
    /// # Errors
    /// Returns error if the file cannot be read, parsed, or fails validation
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        SessionConfigBuilder::from_json_file(path)?.build()
    }

    /// Directory the binary and relative model files are resolved against
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Model identifier passed as `--model`
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Absolute path of the inference binary
    #[must_use]
    pub fn binary_path(&self) -> PathBuf {
        self.resolve(Path::new(&self.binary))
    }

    /// Absolute path of the compressed weights file
    #[must_use]
    pub fn weights_path(&self) -> PathBuf {
        self.resolve(&self.compressed_weights)
    }

    /// Absolute path of the tokenizer file
    #[must_use]
    pub fn tokenizer_path(&self) -> PathBuf {
        self.resolve(&self.tokenizer)
    }

    /// Output markers used to classify stdout
    #[must_use]
    pub const fn markers(&self) -> &Markers {
        &self.markers
    }

    /// Deadline for the first prompt marker
    #[must_use]
    pub const fn ready_timeout(&self) -> Duration {
        self.ready_timeout
    }

    /// Deadline for a buffered response
    #[must_use]
    pub const fn response_timeout(&self) -> Duration {
        self.response_timeout
    }

    /// Bound on chunks queued for a stream consumer
    #[must_use]
    pub const fn stream_buffer(&self) -> usize {
        self.stream_buffer
    }

    /// Transcript file, if transcription is enabled
    #[must_use]
    pub fn transcript(&self) -> Option<&Path> {
        self.transcript.as_deref()
    }

    /// Grace period between closing stdin and killing the child
    #[must_use]
    pub const fn shutdown_grace(&self) -> Duration {
        self.shutdown_grace
    }

    fn resolve(&self, file: &Path) -> PathBuf {
        if file.is_absolute() {
            file.to_path_buf()
        } else {
            self.directory.join(file)
        }
    }
}

// ============================================================================
// Builder for SessionConfig
// ============================================================================

/// Builder for `SessionConfig`
#[derive(Debug, Clone)]
pub struct SessionConfigBuilder {
    directory: Option<PathBuf>,
    binary: String,
    model: Option<String>,
    compressed_weights: Option<PathBuf>,
    tokenizer: Option<PathBuf>,
    markers: Markers,
    ready_timeout: Duration,
    response_timeout: Duration,
    stream_buffer: usize,
    transcript: Option<PathBuf>,
    shutdown_grace: Duration,
}

impl Default for SessionConfigBuilder {
    fn default() -> Self {
        Self {
            directory: None,
            binary: DEFAULT_BINARY.to_string(),
            model: None,
            compressed_weights: None,
            tokenizer: None,
            markers: Markers::default(),
            ready_timeout: DEFAULT_READY_TIMEOUT,
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            stream_buffer: DEFAULT_STREAM_BUFFER,
            transcript: None,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

impl SessionConfigBuilder {
    /// Start from a JSON config file; unset keys keep their defaults
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    /// Start from a JSON document; unset keys keep their defaults
    ///
    /// # Errors
    /// Returns error if the document does not match the config schema
    pub fn from_json_str(text: &str) -> Result<Self> {
        let file: ConfigFile = serde_json::from_str(text)?;
        Ok(file.apply(Self::default()))
    }

    /// Set the directory holding the binary and model files
    #[must_use]
    pub fn directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.directory = Some(dir.into());
        self
    }

    /// Set the binary name (default `gemma`)
    #[must_use]
    pub fn binary(mut self, name: impl Into<String>) -> Self {
        self.binary = name.into();
        self
    }

    /// Set the model identifier
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the compressed weights file
    #[must_use]
    pub fn compressed_weights(mut self, file: impl Into<PathBuf>) -> Self {
        self.compressed_weights = Some(file.into());
        self
    }

    /// Set the tokenizer file
    #[must_use]
    pub fn tokenizer(mut self, file: impl Into<PathBuf>) -> Self {
        self.tokenizer = Some(file.into());
        self
    }

    /// Override the output markers
    #[must_use]
    pub fn markers(mut self, markers: Markers) -> Self {
        self.markers = markers;
        self
    }

    /// Set the readiness deadline used by `Session::connect`
    #[must_use]
    pub const fn ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    /// Set the buffered response deadline
    #[must_use]
    pub const fn response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    /// Set the stream backpressure bound
    #[must_use]
    pub const fn stream_buffer(mut self, chunks: usize) -> Self {
        self.stream_buffer = chunks;
        self
    }

    /// Enable the transcript log at `path`
    #[must_use]
    pub fn transcript(mut self, path: impl Into<PathBuf>) -> Self {
        self.transcript = Some(path.into());
        self
    }

    /// Set the shutdown grace period
    #[must_use]
    pub const fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Validate and build the config
    ///
    /// # Errors
    /// Returns error if a required field is missing, no directory can be
    /// resolved, or the markers are unusable
    pub fn build(self) -> Result<SessionConfig> {
        let model = required(self.model, "model")?;
        let compressed_weights = required_path(self.compressed_weights, "compressed_weights")?;
        let tokenizer = required_path(self.tokenizer, "tokenizer")?;

        if self.binary.trim().is_empty() {
            return Err(SessionError::invalid_config("binary name is empty"));
        }
        if self.stream_buffer == 0 {
            return Err(SessionError::invalid_config("stream_buffer must be at least 1"));
        }
        self.markers.validate()?;

        let directory = resolve_directory(self.directory, &self.binary)?;

        Ok(SessionConfig {
            directory,
            binary: self.binary,
            model,
            compressed_weights,
            tokenizer,
            markers: self.markers,
            ready_timeout: self.ready_timeout,
            response_timeout: self.response_timeout,
            stream_buffer: self.stream_buffer,
            transcript: self.transcript,
            shutdown_grace: self.shutdown_grace,
        })
    }
}

fn required(value: Option<String>, name: &str) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(SessionError::invalid_config(format!("{name} is required"))),
    }
}

fn required_path(value: Option<PathBuf>, name: &str) -> Result<PathBuf> {
    match value {
        Some(p) if !p.as_os_str().is_empty() => Ok(p),
        _ => Err(SessionError::invalid_config(format!("{name} is required"))),
    }
}

/// Explicit directory, then `GEMMA_DIR`, then the binary's location on `PATH`
fn resolve_directory(explicit: Option<PathBuf>, binary: &str) -> Result<PathBuf> {
    if let Some(dir) = explicit {
        return Ok(dir);
    }

    if let Some(dir) = env::var_os(GEMMA_DIR_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }

    if let Ok(found) = which::which(binary)
        && let Some(parent) = found.parent()
    {
        log::debug!("Resolved {binary} on PATH at {}", found.display());
        return Ok(parent.to_path_buf());
    }

    Err(SessionError::invalid_config(format!(
        "no directory given, {GEMMA_DIR_ENV} is unset and `{binary}` is not on PATH"
    )))
}

// ============================================================================
// JSON config file
// ============================================================================

/// On-disk config schema; every key is optional
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    directory: Option<PathBuf>,
    binary: Option<String>,
    model: Option<String>,
    compressed_weights: Option<PathBuf>,
    tokenizer: Option<PathBuf>,
    markers: Option<Markers>,
    ready_timeout_ms: Option<u64>,
    response_timeout_ms: Option<u64>,
    stream_buffer: Option<usize>,
    transcript: Option<PathBuf>,
    shutdown_grace_ms: Option<u64>,
}

impl ConfigFile {
    fn apply(self, mut builder: SessionConfigBuilder) -> SessionConfigBuilder {
        if let Some(v) = self.directory {
            builder.directory = Some(v);
        }
        if let Some(v) = self.binary {
            builder.binary = v;
        }
        if let Some(v) = self.model {
            builder.model = Some(v);
        }
        if let Some(v) = self.compressed_weights {
            builder.compressed_weights = Some(v);
        }
        if let Some(v) = self.tokenizer {
            builder.tokenizer = Some(v);
        }
        if let Some(v) = self.markers {
            builder.markers = v;
        }
        if let Some(ms) = self.ready_timeout_ms {
            builder.ready_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.response_timeout_ms {
            builder.response_timeout = Duration::from_millis(ms);
        }
        if let Some(v) = self.stream_buffer {
            builder.stream_buffer = v;
        }
        if let Some(v) = self.transcript {
            builder.transcript = Some(v);
        }
        if let Some(ms) = self.shutdown_grace_ms {
            builder.shutdown_grace = Duration::from_millis(ms);
        }
        builder
    }
}
