//! hintpilot: keyboard-driven hint, grid and scroll navigation.
//!
//! `run` drives the mode router from stdin. Lines starting with `:` are
//! commands (`:hints [action]`, `:grid [action]`, `:rgrid [action]`, `:scroll`, `:action`,
//! `:exit`, `:activate <bundle>`, `:screen`, `:reload`, `:health`, `:quit`);
//! any other line is a whitespace-separated list of keys.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use hintpilot::a11y::fake::FakeDesktop;
use hintpilot::integration::{AppEvent, EnhancedAccessibility, LifecycleHandler};
use hintpilot::overlay::{Renderer, ThreadedOverlay, TracingRenderer};
use hintpilot::{
    ActionKind, AxClient, Config, Coordinator, InfoCache, LabelGenerator, ModeRequest, Navigator, RouterEvent,
};

#[derive(Debug, Parser)]
#[command(name = "hintpilot", version, about = "Keyboard-driven accessibility navigation")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the mode router, reading commands and keys from stdin
    Run {
        #[arg(long)]
        config: Option<PathBuf>,
        /// Use the in-memory demo desktop instead of the host
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the hint labels generated for COUNT elements
    Labels {
        #[arg(long, default_value = "asdfghjkl")]
        alphabet: String,
        #[arg(long)]
        count: usize,
    },
    /// Validate a configuration file and print the effective settings
    CheckConfig {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn init_tracing(default_level: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run { config, dry_run } => run(config, dry_run).await,
        Command::Labels { alphabet, count } => {
            init_tracing("warn");
            let generator = LabelGenerator::new(&alphabet).context("Invalid alphabet")?;
            for label in generator.labels(count).context("Label generation failed")? {
                println!("{}", label);
            }
            Ok(())
        }
        Command::CheckConfig { config } => {
            init_tracing("warn");
            let loaded = Config::load(config.as_deref()).context("Configuration is invalid")?;
            if let Some(path) = config.or_else(Config::default_path) {
                println!("# {}", path.display());
            }
            println!("{}", serde_json::to_string_pretty(&loaded)?);
            Ok(())
        }
    }
}

fn host_client(dry_run: bool) -> Result<Arc<dyn AxClient>> {
    if dry_run {
        info!("[Main] Dry run on the demo desktop");
        return Ok(Arc::new(FakeDesktop::demo()));
    }
    #[cfg(target_os = "macos")]
    {
        let client = hintpilot::a11y::macos::MacAxClient::new().context("Failed to open accessibility client")?;
        Ok(Arc::new(client))
    }
    #[cfg(not(target_os = "macos"))]
    {
        bail!("this platform has no accessibility backend; use --dry-run")
    }
}

async fn run(config_path: Option<PathBuf>, dry_run: bool) -> Result<()> {
    let config = Config::load(config_path.as_deref()).context("Failed to load configuration")?;
    init_tracing(&config.general.log_level);
    info!("[Main] hintpilot {} starting", env!("CARGO_PKG_VERSION"));

    let client = host_client(dry_run)?;
    if !client.check_permissions() {
        warn!("[Main] Accessibility permission missing; modes will fail until it is granted");
    }

    let frame_client = client.clone();
    let overlay = Arc::new(
        ThreadedOverlay::new(move || {
            Ok(Box::new(TracingRenderer::new(frame_client.active_screen_bounds())) as Box<dyn Renderer>)
        })
        .context("Failed to start overlay")?,
    );

    let cache = Arc::new(InfoCache::default());
    let enhanced = Arc::new(EnhancedAccessibility::new(client.clone(), &config.hints.enhanced_bundles));
    let navigator = Arc::new(
        Navigator::new(config, client, overlay, cache.clone()).context("Failed to create navigator")?,
    );
    let coordinator = Coordinator::spawn(navigator.clone(), LifecycleHandler::new(cache, enhanced))
        .context("Failed to start coordinator")?;

    info!("[Main] Ready; reading commands from stdin");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(command) = line.strip_prefix(':') {
            match parse_command(command, config_path.as_deref()) {
                Ok(Some(Input::Event(event))) => coordinator.send(event)?,
                Ok(Some(Input::Health)) => {
                    println!("{}", serde_json::to_string(&navigator.health())?);
                }
                Ok(None) => break,
                Err(e) => warn!("[Main] {:#}", e),
            }
            continue;
        }
        for raw in line.split_whitespace() {
            match hintpilot::input::Key::normalize(raw) {
                Some(key) => coordinator.send(RouterEvent::Key(key))?,
                None => warn!("[Main] Unrecognized key '{}'", raw),
            }
        }
    }

    coordinator.shutdown().await?;
    for flow in navigator.metrics().summary() {
        info!(
            flow = flow.flow,
            total = flow.total,
            failed = flow.failed,
            avg_ms = flow.avg_duration_ms,
            "[Main] Flow summary"
        );
    }
    info!("[Main] Stopped");
    Ok(())
}

enum Input {
    Event(RouterEvent),
    Health,
}

fn parse_action(arg: Option<&str>) -> Result<ActionKind> {
    match arg {
        None => Ok(ActionKind::LeftClick),
        Some(raw) => raw.parse::<ActionKind>().map_err(anyhow::Error::from),
    }
}

/// Parses a `:command`. `Ok(None)` means quit.
fn parse_command(command: &str, config_path: Option<&std::path::Path>) -> Result<Option<Input>> {
    let mut parts = command.split_whitespace();
    let name = parts.next().unwrap_or_default();
    let arg = parts.next();
    let event = match name {
        "hints" => RouterEvent::Enter(ModeRequest::Hints(parse_action(arg)?)),
        "grid" => RouterEvent::Enter(ModeRequest::Grid(parse_action(arg)?)),
        "rgrid" => {
            let action = match arg {
                None => ActionKind::MoveMouse,
                Some(_) => parse_action(arg)?,
            };
            RouterEvent::Enter(ModeRequest::RecursiveGrid(action))
        }
        "scroll" => RouterEvent::Enter(ModeRequest::Scroll),
        "action" => RouterEvent::Enter(ModeRequest::Action),
        "exit" => RouterEvent::Exit,
        "activate" => {
            let bundle_id = arg.context("usage: :activate <bundle-id>")?.to_string();
            RouterEvent::App(AppEvent::Activated {
                name: bundle_id.clone(),
                bundle_id,
            })
        }
        "screen" => RouterEvent::App(AppEvent::ScreenParametersChanged),
        "reload" => {
            let config = Config::load(config_path).context("Reload failed")?;
            RouterEvent::ConfigReloaded(Box::new(config))
        }
        "health" => return Ok(Some(Input::Health)),
        "quit" | "q" => return Ok(None),
        other => bail!("unknown command ':{}'", other),
    };
    Ok(Some(Input::Event(event)))
}
