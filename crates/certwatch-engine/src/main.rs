use anyhow::{Context, Result};
use serde::Serialize;
use std::io::Read;
use std::path::Path;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use certwatch_engine::cert::scheduler::RefreshScheduler;
use certwatch_engine::{CertWatchApp, CertWatchConfig};

const DEFAULT_CONFIG_PATH: &str = "config/certwatch.toml";

#[allow(clippy::print_stderr)]
fn print_usage() {
    eprintln!("Usage: certwatch [--config <path>] <command> [args]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  check <domain>                          Probe one domain and record it in history");
    eprintln!("  batch <file|->                          Probe newline-separated domains concurrently");
    eprintln!("  history [limit]                         Show recent checks, newest first");
    eprintln!("  clear-history                           Delete all history records");
    eprintln!("  watch-add <domain> [nickname]           Add a domain to the watchlist");
    eprintln!("  watch-list                              List watched domains with live status");
    eprintln!("  watch-remove <id>                       Remove a watched domain");
    eprintln!("  watch-rename <id> <nickname>            Change a watched domain's nickname");
    eprintln!("  watch-refresh <domain>                  Probe one watched domain without recording history");
    eprintln!("  notify <id> <on|off> <threshold>        Update notify settings (threshold 1-365 days)");
    eprintln!("  manual <id> <expire> [start]            Declare certificate dates manually");
    eprintln!("  manual-off <id>                         Return to live probing");
    eprintln!("  notifications                           List domains within their notify threshold");
    eprintln!("  import <file|->                         Import domain[,nickname] lines");
    eprintln!("  run                                     Run the refresh scheduler until Ctrl-C");
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("certwatch=info".parse()?))
        .init();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let config = load_config(&mut args)?;

    let command = match args.first().map(String::as_str) {
        None | Some("--help") | Some("-h") | Some("help") => {
            print_usage();
            return Ok(());
        }
        Some(command) => command.to_string(),
    };

    let app = CertWatchApp::from_config(&config)?;
    tracing::info!(db = %app.store().db_path().display(), "certwatch ready");

    match command.as_str() {
        "check" => emit(&app.check_certificate(arg(&args, 1, "check requires <domain>")?).await),
        "batch" => {
            let text = read_input(arg(&args, 1, "batch requires <file|->")?)?;
            emit(&app.batch_check_certificates(&text).await)
        }
        "history" => {
            let limit = match args.get(1) {
                Some(raw) => parse_number(raw, "limit")?,
                None => 0,
            };
            emit(&app.get_history(limit))
        }
        "clear-history" => emit(&app.clear_history()),
        "watch-add" => {
            let domain = arg(&args, 1, "watch-add requires <domain>")?;
            emit(&app.add_watched_domain(domain, args.get(2).map(String::as_str)))
        }
        "watch-list" => emit(&app.get_watched_domains().await),
        "watch-remove" => {
            let id = parse_number(arg(&args, 1, "watch-remove requires <id>")?, "id")?;
            emit(&app.remove_watched_domain(id))
        }
        "watch-rename" => {
            let id = parse_number(arg(&args, 1, "watch-rename requires <id> <nickname>")?, "id")?;
            let nickname = arg(&args, 2, "watch-rename requires <nickname>")?;
            emit(&app.update_watched_domain_nickname(id, nickname))
        }
        "watch-refresh" => {
            let domain = arg(&args, 1, "watch-refresh requires <domain>")?;
            emit(&app.refresh_watched_domain(domain).await)
        }
        "notify" => {
            let raw_id = arg(&args, 1, "notify requires <id> <on|off> <threshold>")?;
            let id = parse_number(raw_id, "id")?;
            let enabled = match arg(&args, 2, "notify requires <on|off>")? {
                "on" => true,
                "off" => false,
                other => anyhow::bail!("expected 'on' or 'off', got '{other}'"),
            };
            let raw_threshold = arg(&args, 3, "notify requires <threshold>")?;
            let threshold = parse_number(raw_threshold, "threshold")?;
            emit(&app.update_notify_settings(id, enabled, threshold))
        }
        "manual" => {
            let id = parse_number(arg(&args, 1, "manual requires <id> <expire> [start]")?, "id")?;
            let expire = arg(&args, 2, "manual requires <expire>")?;
            let start = args.get(3).map(String::as_str).unwrap_or_default();
            emit(&app.update_manual_cert_info(id, start, expire))
        }
        "manual-off" => {
            let id = parse_number(arg(&args, 1, "manual-off requires <id>")?, "id")?;
            emit(&app.disable_manual_mode(id))
        }
        "notifications" => emit(&app.check_notifications().await),
        "import" => {
            let text = read_input(arg(&args, 1, "import requires <file|->")?)?;
            emit(&app.import_domains_from_text(&text))
        }
        "run" => run_scheduler(&app, &config).await,
        other => {
            print_usage();
            anyhow::bail!("unknown command '{other}'")
        }
    }
}

/// Removes `--config <path>` from `args` and loads the selected file, falling
/// back to the default path and then to built-in defaults.
fn load_config(args: &mut Vec<String>) -> Result<CertWatchConfig> {
    if let Some(pos) = args.iter().position(|a| a == "--config") {
        let path = args
            .get(pos + 1)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("--config requires a path"))?;
        args.drain(pos..=pos + 1);
        return CertWatchConfig::load(&path)
            .with_context(|| format!("failed to load config from {path}"));
    }

    if Path::new(DEFAULT_CONFIG_PATH).exists() {
        return CertWatchConfig::load(DEFAULT_CONFIG_PATH)
            .with_context(|| format!("failed to load config from {DEFAULT_CONFIG_PATH}"));
    }

    tracing::debug!("No config file found, using defaults");
    Ok(CertWatchConfig::default())
}

async fn run_scheduler(app: &CertWatchApp, config: &CertWatchConfig) -> Result<()> {
    if !config.refresh.enabled {
        anyhow::bail!("refresh scheduler is disabled; set [refresh] enabled = true");
    }

    let scheduler = RefreshScheduler::new(app.watchlist().clone(), config.refresh_interval());
    let handle = tokio::spawn(async move {
        scheduler.run().await;
    });

    signal::ctrl_c().await?;
    tracing::info!("Shutting down gracefully");
    handle.abort();
    Ok(())
}

fn arg<'a>(args: &'a [String], index: usize, usage: &str) -> Result<&'a str> {
    args.get(index).map(String::as_str).ok_or_else(|| {
        print_usage();
        anyhow::anyhow!("{usage}")
    })
}

fn parse_number(raw: &str, what: &str) -> Result<i64> {
    raw.trim()
        .parse()
        .with_context(|| format!("invalid {what} '{raw}'"))
}

fn read_input(source: &str) -> Result<String> {
    if source == "-" {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        return Ok(text);
    }
    std::fs::read_to_string(source).with_context(|| format!("failed to read {source}"))
}

#[allow(clippy::print_stdout)]
fn emit<T: Serialize>(result: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(result)?);
    Ok(())
}
