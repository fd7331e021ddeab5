use crate::app::Args;
use anyhow::{anyhow, Result};
use clap::Parser;
use pixtex_core::config::Config;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;

/// Log files beyond this size are wiped at startup.
const MAX_LOG_SIZE: u64 = 8 * 1024 * 1024;

/// Starts the RPC service over stdio.
#[derive(Parser, Debug, Clone)]
pub struct Rpc;

impl Rpc {
    pub async fn run(&self, args: Args) -> Result<()> {
        let (config, config_err) =
            pixtex_core::config::load_config_on_startup(args.config_file.clone());

        if let Some(log_path) = resolve_log_path(args.log, config) {
            let _guard = init_file_logging(&log_path, config)?;
            pixtex_core::stdio_server::start(config_err).await;
        } else {
            pixtex_core::stdio_server::start(config_err).await;
        }

        Ok(())
    }
}

/// The explicit flag wins, then the environment, then the config file.
fn resolve_log_path(flag: Option<PathBuf>, config: &Config) -> Option<PathBuf> {
    flag.or_else(|| std::env::var("PIXTEX_LOG_PATH").map(PathBuf::from).ok())
        .or_else(|| config.log.log_file.as_ref().map(PathBuf::from))
}

/// Routes all tracing output into `log_path`.
///
/// Nothing may be logged to stdout, that stream carries the RPC messages.
/// The returned guard must stay alive for the buffered writer to flush.
fn init_file_logging(log_path: &Path, config: &Config) -> Result<WorkerGuard> {
    if let Ok(metadata) = std::fs::metadata(log_path) {
        if log_path.is_file() && metadata.len() > MAX_LOG_SIZE {
            std::fs::remove_file(log_path)?;
        }
    }

    let file_name = log_path
        .file_name()
        .ok_or_else(|| anyhow!("no file name in {log_path:?}"))?;

    let directory = log_path
        .parent()
        .ok_or_else(|| anyhow!("{log_path:?} has no parent"))?;

    let file_appender = tracing_appender::rolling::never(directory, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let max_level: tracing::Level = config
        .log
        .max_level
        .parse()
        .unwrap_or(tracing::Level::DEBUG);

    // `max-level` caps everything, `log-target` refines individual targets,
    // e.g. `pixtex_core::stdio_server=trace`.
    let mut directives = max_level.to_string();
    if !config.log.log_target.is_empty() {
        directives.push(',');
        directives.push_str(&config.log.log_target);
    }

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(directives))
        .with_line_number(true)
        .with_writer(non_blocking)
        .with_ansi(std::io::stdout().is_terminal())
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    Ok(guard)
}
