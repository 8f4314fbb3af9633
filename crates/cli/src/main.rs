//! CLI entrypoint: flags, logging, config resolution, and mode dispatch.

mod commands;
mod config;
mod model_catalog;
mod oneshot;
#[cfg(test)]
mod test_support;
mod tui;

use std::path::PathBuf;
use std::sync::Arc;

use agent::{AnthropicProvider, LlmProvider, OpenAiProvider};
use clap::Parser;
use config::{CliOverrides, ProviderKind, SessionConfig};

#[cfg(not(test))]
use anyhow::Context;
#[cfg(not(test))]
use config::Config;
#[cfg(not(test))]
use tracing::info;
#[cfg(not(test))]
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Top-level command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "ai")]
#[command(about = "Streaming terminal chat client", version)]
struct Cli {
    /// Path to config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Enable debug logging to ~/.ai/logs/debug.log
    #[arg(long, default_value_t = false)]
    debug: bool,

    /// Chat API to talk to
    #[arg(long, value_enum)]
    provider: Option<ProviderKind>,

    /// API key (overrides AI_API_KEY, the vendor key variable and the config file)
    #[arg(short = 'k', long)]
    api_key: Option<String>,

    /// Model to use
    #[arg(short, long)]
    model: Option<String>,

    /// System prompt for the conversation
    #[arg(short = 'p', long)]
    system_prompt: Option<String>,

    /// Send a single prompt and print the reply instead of starting the TUI
    #[arg(short, long, value_name = "PROMPT")]
    single: Option<String>,

    /// Wait for the whole reply instead of streaming it (single mode)
    #[arg(long, default_value_t = false)]
    no_stream: bool,

    /// Echo user input and log at debug level
    #[arg(short, long, default_value_t = false)]
    verbose: bool,

    /// Hide role prefixes and notices
    #[arg(short, long, default_value_t = false)]
    quiet: bool,

    /// Disable colours
    #[arg(short, long, default_value_t = false)]
    no_color: bool,
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            provider: self.provider,
            api_key: self.api_key.clone(),
            model: self.model.clone(),
            system_prompt: self.system_prompt.clone(),
            verbose: self.verbose,
            quiet: self.quiet,
            no_color: self.no_color,
        }
    }

    /// Console filter directive; `--verbose` raises the default to debug.
    fn console_level(&self) -> &str {
        if self.verbose && self.log_level == "info" {
            "debug"
        } else {
            &self.log_level
        }
    }
}

#[cfg(not(test))]
#[tokio::main]
/// Program entrypoint.
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let is_tui = cli.single.is_none();

    // Suppress console output in TUI mode to avoid corrupting the display.
    // With --debug, also write debug-level logs to ~/.ai/logs/debug.log.YYYY-MM-DD.
    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.console_level()));

    // WorkerGuard must outlive main() so buffered file writes are flushed on exit.
    let _file_guard: Option<tracing_appender::non_blocking::WorkerGuard>;

    let debug_writer = if cli.debug {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        let log_dir = PathBuf::from(home).join(".ai").join("logs");
        std::fs::create_dir_all(&log_dir).ok();
        let appender = tracing_appender::rolling::daily(&log_dir, "debug.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        _file_guard = Some(guard);
        Some(writer)
    } else {
        _file_guard = None;
        None
    };

    // Generic over the subscriber so the same layer fits both console stacks below.
    fn make_file_layer<S>(
        writer: tracing_appender::non_blocking::NonBlocking,
    ) -> impl tracing_subscriber::Layer<S>
    where
        S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    {
        fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_ansi(false)
            .with_filter(EnvFilter::new("debug,hyper_util=info,rustls=info,reqwest=info"))
    }

    if is_tui {
        let console = fmt::layer()
            .with_writer(std::io::sink)
            .with_target(false)
            .with_filter(console_filter);
        tracing_subscriber::registry()
            .with(console)
            .with(debug_writer.map(make_file_layer))
            .init();
    } else {
        let console = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_ansi(!cli.no_color)
            .with_filter(console_filter);
        tracing_subscriber::registry()
            .with(console)
            .with(debug_writer.map(make_file_layer))
            .init();
    }

    if cli.debug {
        info!(
            version = env!("CARGO_PKG_VERSION"),
            mode = if is_tui { "tui" } else { "single" },
            log_level = %cli.log_level,
            "========== ai session start =========="
        );
    }

    let config = Config::load(cli.config.as_deref()).context("failed to load config")?;
    let session_config = config
        .resolve(&cli.overrides())
        .context("invalid configuration")?;
    let provider = build_provider(&session_config);

    match cli.single {
        Some(prompt) => {
            let piped = oneshot::read_piped_stdin()?;
            let prompt = oneshot::compose_prompt(&prompt, piped.as_deref());
            let mut stdout = std::io::stdout();
            oneshot::run(
                &session_config,
                provider,
                &prompt,
                !cli.no_stream,
                &mut stdout,
            )
            .await
        }
        None => tui::run_tui(session_config, provider).await,
    }
}

/// Builds the transport for the resolved settings.
fn build_provider(config: &SessionConfig) -> Arc<dyn LlmProvider> {
    let key = config.api_key.as_str();
    match (config.provider, config.base_url.as_deref()) {
        (ProviderKind::OpenAi, Some(url)) => Arc::new(OpenAiProvider::with_base_url(key, url)),
        (ProviderKind::OpenAi, None) => Arc::new(OpenAiProvider::new(key)),
        (ProviderKind::Anthropic, Some(url)) => {
            Arc::new(AnthropicProvider::with_base_url(key, url))
        }
        (ProviderKind::Anthropic, None) => Arc::new(AnthropicProvider::new(key)),
    }
}
