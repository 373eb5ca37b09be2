//! taskpipe CLI: echo each input value back, numbered, through a worker pool.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use taskpipe::config::{Config, Tokenizer, parse_duration};
use taskpipe::echo::EchoFactory;
use taskpipe::pipeline::{RunConfig, run_with_timeout};
use taskpipe::source::{Lines, Words};
use taskpipe::telemetry::{TelemetryConfig, init_telemetry};

#[derive(Parser)]
#[command(
    name = "taskpipe",
    about = "Echo input values through a bounded pool of concurrent workers"
)]
struct Cli {
    /// Timeout for total execution (e.g. 500ms, 3s, 1m)
    #[arg(short = 't', long, value_parser = parse_duration)]
    timeout: Option<Duration>,
    /// Number of concurrent workers (values below 1 mean 1)
    #[arg(short, long, allow_negative_numbers = true)]
    workers: Option<isize>,
    /// Capacity of the work queues
    #[arg(long)]
    queue_capacity: Option<usize>,
    /// Split stdin into whitespace-separated words
    #[arg(long, conflicts_with = "lines")]
    words: bool,
    /// Split stdin into lines
    #[arg(long)]
    lines: bool,
    /// TOML config file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Input values; stdin is read when none are given
    inputs: Vec<String>,
}

impl Cli {
    /// Config file and environment, then flags on top.
    fn resolve_config(&self) -> anyhow::Result<Config> {
        let mut config = Config::load(self.config.as_deref()).context("loading configuration")?;
        if let Some(timeout) = self.timeout {
            config.timeout = timeout;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(capacity) = self.queue_capacity {
            config.queue_capacity = capacity.max(1);
        }
        if self.words {
            config.tokenizer = Tokenizer::Words;
        } else if self.lines {
            config.tokenizer = Tokenizer::Lines;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = cli.resolve_config()?;

    let guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "taskpipe".to_string(),
        log_level: config.log_level.clone(),
    })?;

    let run_config = RunConfig::new()
        .args(cli.inputs)
        .queue_capacity(config.queue_capacity);
    let run_config = match config.tokenizer {
        Tokenizer::Lines => run_config.token_source(Lines::stdin()),
        Tokenizer::Words => run_config.token_source(Words::stdin()),
    };

    if let Err(e) =
        run_with_timeout(config.timeout, EchoFactory::new(), config.workers, run_config).await
    {
        eprintln!("{e}");
        guard.force_flush();
        // A stdin read may still be parked on the blocking pool and would
        // hold up runtime shutdown.
        std::process::exit(1);
    }

    Ok(())
}
