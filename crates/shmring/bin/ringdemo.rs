//! ringdemo - producer/consumer demonstration over a shared ring.
//!
//! # Usage
//!
//! ```bash
//! ringdemo host --mode process --count 50
//! ringdemo host --mode thread --wait park --metrics
//! RUST_LOG=shmring=debug ringdemo host
//! ```
//!
//! `consume` is the child role started by `host --mode process`; it is not
//! meant to be run by hand.

use clap::{Parser, Subcommand, ValueEnum};
use shmring::{Config, HostReport, ThreadHost, WaitStrategy, DEMO_COUNT, LEGACY_CONFIG};
use std::error::Error;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ringdemo")]
#[command(about = "SPSC ring buffer demonstration across threads or processes")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the ring, start a consumer and produce `0..count` plus the sentinel.
    Host {
        /// Where the consumer runs.
        #[arg(long, value_enum, default_value_t = Mode::Process)]
        mode: Mode,

        /// Values produced before the sentinel.
        #[arg(long, default_value_t = DEMO_COUNT, value_parser = clap::value_parser!(i32).range(0..))]
        count: i32,

        /// How a side waits when the ring is full or empty.
        #[arg(long, value_enum, default_value_t = Wait::Poll)]
        wait: Wait,

        /// Producer sleep between attempts when polling.
        #[arg(long, default_value_t = LEGACY_CONFIG.producer_backoff.as_millis() as u64)]
        producer_backoff_ms: u64,

        /// Consumer sleep between attempts when polling.
        #[arg(long, default_value_t = LEGACY_CONFIG.consumer_backoff.as_millis() as u64)]
        consumer_backoff_ms: u64,

        /// Collect and log per-side metrics.
        #[arg(long)]
        metrics: bool,
    },

    /// Child role: attach to an inherited region and consume until the sentinel.
    #[command(hide = true)]
    Consume {
        /// Inherited descriptor of the shared region.
        #[arg(long, allow_negative_numbers = true)]
        shm_fd: i32,

        /// Sleep between attempts, in microseconds.
        #[arg(long, default_value_t = LEGACY_CONFIG.consumer_backoff.as_micros() as u64)]
        consumer_backoff_us: u64,

        /// Collect and log metrics.
        #[arg(long)]
        metrics: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Mode {
    Thread,
    Process,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Wait {
    Poll,
    Park,
}

impl From<Wait> for WaitStrategy {
    fn from(wait: Wait) -> Self {
        match wait {
            Wait::Poll => WaitStrategy::Poll,
            Wait::Park => WaitStrategy::Park,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "ringdemo failed");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> Result<(), Box<dyn Error>> {
    match command {
        Command::Host {
            mode,
            count,
            wait,
            producer_backoff_ms,
            consumer_backoff_ms,
            metrics,
        } => {
            let config = Config::default()
                .with_wait(wait.into())
                .with_producer_backoff(Duration::from_millis(producer_backoff_ms))
                .with_consumer_backoff(Duration::from_millis(consumer_backoff_ms))
                .with_metrics(metrics);

            let report = match mode {
                Mode::Thread => ThreadHost::new(config).run(count)?,
                Mode::Process => run_process_host(config, count)?,
            };
            log_report(&report, config.enable_metrics);
            match &report.consumer {
                Some(consumer) if !consumer.is_contiguous_from_zero() => {
                    Err("consumer saw a gap or reordering".into())
                }
                _ => Ok(()),
            }
        }
        Command::Consume {
            shm_fd,
            consumer_backoff_us,
            metrics,
        } => {
            let config = Config::default()
                .with_consumer_backoff(Duration::from_micros(consumer_backoff_us))
                .with_metrics(metrics);
            run_consume(shm_fd, &config)
        }
    }
}

#[cfg(target_os = "linux")]
fn run_process_host(config: Config, count: i32) -> Result<HostReport, Box<dyn Error>> {
    let program = std::env::current_exe()?;
    Ok(shmring::ProcessHost::new(program, config).run(count)?)
}

#[cfg(not(target_os = "linux"))]
fn run_process_host(_config: Config, _count: i32) -> Result<HostReport, Box<dyn Error>> {
    Err("process mode needs memfd shared memory (Linux only)".into())
}

#[cfg(target_os = "linux")]
fn run_consume(fd: i32, config: &Config) -> Result<(), Box<dyn Error>> {
    // SAFETY: the descriptor was created and handed over by the host process,
    // which attaches no other consumer.
    let report = unsafe { shmring::run_consumer_process(fd, config) }?;

    for value in &report.values {
        info!(value, "consumed");
    }
    if !report.is_contiguous_from_zero() {
        return Err(format!(
            "consumer saw a gap or reordering in {} values",
            report.values.len()
        )
        .into());
    }
    if config.enable_metrics {
        info!(metrics = ?report.metrics, "consumer metrics");
    }
    info!(consumed = report.values.len(), "consumer done");
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn run_consume(_fd: i32, _config: &Config) -> Result<(), Box<dyn Error>> {
    Err("process mode needs memfd shared memory (Linux only)".into())
}

fn log_report(report: &HostReport, enable_metrics: bool) {
    info!(produced = report.produced, "producer done");
    if let Some(consumer) = &report.consumer {
        info!(
            consumed = consumer.values.len(),
            in_order = consumer.is_contiguous_from_zero(),
            "consumer done"
        );
        if enable_metrics {
            info!(metrics = ?consumer.metrics, "consumer metrics");
        }
    }
    if enable_metrics {
        info!(metrics = ?report.producer_metrics, "producer metrics");
    }
}
