// Driver for gemma_session: start the binary, send prompts, print responses.

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use futures::StreamExt;
use gemma_session::{Session, SessionConfig, SessionConfigBuilder};

const DEFAULT_MODEL: &str = "2b-it";
const DEFAULT_WEIGHTS: &str = "2b-it-sfp.sbs";
const DEFAULT_TOKENIZER: &str = "tokenizer.spm";
const DEFAULT_TRANSCRIPT: &str = "output.txt";
const DEFAULT_PROMPTS: [&str; 2] = ["hello world", "Can you help with math?"];

#[derive(Parser)]
#[command(name = "gemma-session")]
#[command(about = "Run prompts through the gemma CLI and print the responses", long_about = None)]
struct Cli {
    /// Prompts to send, one exchange each
    prompts: Vec<String>,

    /// JSON config file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding the gemma binary and model files
    #[arg(long, env = "GEMMA_DIR")]
    dir: Option<PathBuf>,

    /// Binary name inside the directory
    #[arg(long)]
    binary: Option<String>,

    /// Model identifier
    #[arg(long)]
    model: Option<String>,

    /// Compressed weights file
    #[arg(long)]
    weights: Option<PathBuf>,

    /// Tokenizer file
    #[arg(long)]
    tokenizer: Option<PathBuf>,

    /// Transcript log file
    #[arg(long)]
    transcript: Option<PathBuf>,

    /// Milliseconds to wait for the first prompt marker
    #[arg(long)]
    ready_timeout_ms: Option<u64>,

    /// Print response chunks as they arrive
    #[arg(long, default_value_t = false)]
    stream: bool,

    /// Enable debug logging
    #[arg(short, long, default_value_t = false)]
    debug: bool,
}

impl Cli {
    fn session_config(&self) -> Result<SessionConfig> {
        let mut builder = match &self.config {
            Some(path) => SessionConfigBuilder::from_json_file(path)
                .with_context(|| format!("reading {}", path.display()))?,
            None => SessionConfig::builder()
                .model(DEFAULT_MODEL)
                .compressed_weights(DEFAULT_WEIGHTS)
                .tokenizer(DEFAULT_TOKENIZER)
                .transcript(DEFAULT_TRANSCRIPT),
        };

        if let Some(dir) = &self.dir {
            builder = builder.directory(dir);
        }
        if let Some(binary) = &self.binary {
            builder = builder.binary(binary);
        }
        if let Some(model) = &self.model {
            builder = builder.model(model);
        }
        if let Some(weights) = &self.weights {
            builder = builder.compressed_weights(weights);
        }
        if let Some(tokenizer) = &self.tokenizer {
            builder = builder.tokenizer(tokenizer);
        }
        if let Some(transcript) = &self.transcript {
            builder = builder.transcript(transcript);
        }
        if let Some(ms) = self.ready_timeout_ms {
            builder = builder.ready_timeout(Duration::from_millis(ms));
        }

        Ok(builder.build()?)
    }

    fn prompts(&self) -> Vec<String> {
        let prompts = if self.prompts.is_empty() {
            DEFAULT_PROMPTS.iter().map(ToString::to_string).collect()
        } else {
            self.prompts.clone()
        };
        // The binary reads one line per exchange
        prompts
            .into_iter()
            .map(|p| p.replace(['\n', '\r'], " ").trim().to_string())
            .filter(|p| !p.is_empty())
            .collect()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let config = cli.session_config()?;
    log::info!("Starting gemma from {}", config.directory().display());

    let session = Session::connect(config)
        .await
        .context("gemma did not become ready")?;
    log::info!("gemma started");

    let result = run_prompts(&session, &cli.prompts(), cli.stream).await;

    if let Some(status) = session.shutdown().await? {
        log::info!("gemma exited with {status}");
    }
    result
}

async fn run_prompts(session: &Session, prompts: &[String], stream: bool) -> Result<()> {
    let mut stdout = std::io::stdout();

    for prompt in prompts {
        log::info!("Sending input to gemma: {prompt}");
        if stream {
            let mut chunks = session.send_request_stream(prompt).await?;
            while let Some(chunk) = chunks.next().await {
                stdout.write_all(chunk?.as_bytes())?;
                stdout.flush()?;
            }
        } else {
            let chunks = session.send_request_await_response(prompt).await?;
            stdout.write_all(chunks.concat().as_bytes())?;
        }
        writeln!(stdout)?;
    }
    Ok(())
}
