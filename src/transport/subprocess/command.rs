//! CLI command building logic for subprocess transport

use std::ffi::OsString;

use tokio::process::Command;

use crate::types::options::SessionConfig;

/// Command builder for the gemma CLI
///
/// Every flag and value is a separate argument; no shell is involved, so
/// paths with spaces or quotes reach the binary unchanged.
pub struct CommandBuilder<'a> {
    config: &'a SessionConfig,
}

impl<'a> CommandBuilder<'a> {
    /// Create a new command builder
    #[must_use]
    pub const fn new(config: &'a SessionConfig) -> Self {
        Self { config }
    }

    /// Ordered argument list: `--model`, `--compressed_weights`, `--tokenizer`
    #[must_use]
    pub fn args(&self) -> Vec<OsString> {
        vec![
            "--model".into(),
            self.config.model().into(),
            "--compressed_weights".into(),
            self.config.weights_path().into_os_string(),
            "--tokenizer".into(),
            self.config.tokenizer_path().into_os_string(),
        ]
    }

    /// Argument list rendered for logs and the transcript
    #[must_use]
    pub fn describe(&self) -> String {
        self.args()
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Build the command with all arguments
    #[must_use]
    pub fn build(&self) -> Command {
        let mut cmd = Command::new(self.config.binary_path());
        cmd.args(self.args());
        cmd
    }
}
