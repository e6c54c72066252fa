use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use pipewatch::config::Settings;
use pipewatch::data::duration::{format_execution_time, parse_duration};
use pipewatch::data::unassigned_fields;
use pipewatch::query::QueryGateway;
use pipewatch::ui::{self, Theme};
use pipewatch::{events, App, ConnectionManager, LinkStatus, PipelineSnapshot, WsConnector};

/// Filter used when `RUST_LOG` is not set.
const DEFAULT_LOG_FILTER: &str = "pipewatch=info";

/// How long to wait for the link to wind down on exit.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[derive(Parser, Debug)]
#[command(name = "pipewatch")]
#[command(about = "Live status client for multi-stage processing pipelines")]
struct Args {
    /// Config file (TOML, YAML or JSON, picked by extension)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Streaming channel address (e.g., "ws://localhost:8765")
    #[arg(short, long)]
    url: Option<String>,

    /// Query API base address (e.g., "http://localhost:8000")
    #[arg(short, long)]
    api: Option<String>,

    /// Pipeline to subscribe to
    #[arg(short, long)]
    pipeline: Option<String>,

    /// Connect timeout (e.g., "5s", "500ms")
    #[arg(long)]
    connect_timeout: Option<String>,

    /// Delay before reconnecting after a drop (e.g., "3s")
    #[arg(long)]
    reconnect_delay: Option<String>,

    /// Submit a single query, print the JSON response and exit
    #[arg(short, long, conflicts_with = "headless")]
    query: Option<String>,

    /// Print snapshot and link changes as lines instead of running the TUI
    #[arg(long)]
    headless: bool,

    /// Write logs to this file (the TUI logs nowhere otherwise)
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let settings = resolve_settings(&args)?;

    let interactive = args.query.is_none() && !args.headless;
    init_logging(args.log_file.as_deref(), !interactive)?;

    if let Some(ref query) = args.query {
        return run_query(&settings, query);
    }

    if args.headless {
        return run_headless(&settings);
    }

    run_tui(&settings)
}

/// Layer command-line overrides on top of file and environment settings.
fn resolve_settings(args: &Args) -> Result<Settings> {
    let mut settings = Settings::load(args.config.as_deref())?;

    if let Some(ref url) = args.url {
        settings.stream_url = url.clone();
    }
    if let Some(ref api) = args.api {
        settings.api_base = api.clone();
    }
    if let Some(ref pipeline) = args.pipeline {
        settings.pipeline_id = pipeline.clone();
    }
    if let Some(ref timeout) = args.connect_timeout {
        settings.connect_timeout_ms = parse_millis(timeout)
            .with_context(|| format!("Invalid --connect-timeout '{}'", timeout))?;
    }
    if let Some(ref delay) = args.reconnect_delay {
        settings.reconnect_delay_ms = parse_millis(delay)
            .with_context(|| format!("Invalid --reconnect-delay '{}'", delay))?;
    }

    settings.validate()?;
    Ok(settings)
}

fn parse_millis(s: &str) -> Result<u64> {
    Ok(parse_duration(s)?.as_millis() as u64)
}

/// Install the global subscriber.
///
/// Logs go to `log_file` when given, else to stderr for the line-oriented
/// modes. The TUI owns the terminal, so without a file it logs nowhere.
fn init_logging(log_file: Option<&Path>, to_stderr: bool) -> Result<()> {
    let filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
    };

    if let Some(path) = log_file {
        let file = File::create(path)
            .with_context(|| format!("Failed to create log file {}", path.display()))?;
        tracing_subscriber::registry()
            .with(filter())
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
            .init();
    } else if to_stderr {
        tracing_subscriber::registry()
            .with(filter())
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .init();
    }
    Ok(())
}

fn build_gateway(settings: &Settings) -> Result<QueryGateway> {
    Ok(QueryGateway::builder()
        .endpoint(&settings.api_base)
        .timeout(settings.query_timeout())
        .build()?)
}

/// Submit one query and print the response
fn run_query(settings: &Settings, query: &str) -> Result<()> {
    let gateway = build_gateway(settings)?;
    let rt = tokio::runtime::Runtime::new()?;

    info!(endpoint = %gateway.url(), "Submitting query");
    let response = rt
        .block_on(gateway.submit(query))
        .with_context(|| format!("Query to {} failed", gateway.url()))?;

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

/// Follow the pipeline without a terminal UI until Ctrl-C
fn run_headless(settings: &Settings) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;

    rt.block_on(async {
        let manager =
            ConnectionManager::spawn(Arc::new(WsConnector::new()), settings.link_options());
        let mut snapshot = manager.snapshot();
        let mut status = manager.status();

        info!(url = %settings.stream_url, pipeline = %settings.pipeline_id, "Following pipeline");
        manager.open();

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                result = &mut shutdown => {
                    if let Err(e) = result {
                        warn!(error = %e, "Failed to listen for Ctrl-C");
                    }
                    break;
                }
                changed = status.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    println!("{}", describe_status(&status.borrow_and_update()));
                }
                changed = snapshot.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    println!("{}", describe_snapshot(&snapshot.borrow_and_update()));
                }
            }
        }

        info!("Shutting down");
        manager.close();
        if tokio::time::timeout(SHUTDOWN_GRACE, manager.join()).await.is_err() {
            warn!("Status link did not stop in time");
        }
        Ok(())
    })
}

fn describe_status(status: &LinkStatus) -> String {
    let mut line = format!(
        "[link] {} pipeline={} generation={} attempt={}",
        status.state.label(),
        status.subscription,
        status.generation,
        status.attempt
    );
    if let Some(ref err) = status.last_error {
        line.push_str(&format!(" error=\"{}\"", err));
    }
    line
}

fn describe_snapshot(snapshot: &PipelineSnapshot) -> String {
    let components: Vec<String> = snapshot
        .ordered_components()
        .iter()
        .map(|c| {
            format!(
                "{}#{}({})",
                c.name,
                c.order,
                format_execution_time(c.execution_time)
            )
        })
        .collect();

    format!(
        "[pipeline] id={} status={} components=[{}] fields={} unassigned={}",
        snapshot.pipeline_id.as_deref().unwrap_or("-"),
        snapshot.status,
        components.join(", "),
        snapshot.data.len(),
        unassigned_fields(snapshot).len()
    )
}

/// Run the TUI against a live link
fn run_tui(settings: &Settings) -> Result<()> {
    let gateway = build_gateway(settings)?;

    // The link and query tasks run on this runtime while the UI owns the main thread
    let rt = tokio::runtime::Runtime::new()?;
    let manager = {
        let _guard = rt.enter();
        ConnectionManager::spawn(Arc::new(WsConnector::new()), settings.link_options())
    };
    manager.open();
    info!(url = %settings.stream_url, pipeline = %settings.pipeline_id, "Starting TUI");

    // Detect the terminal background before entering raw mode
    let theme = Theme::auto_detect();

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Setup panic hook to restore terminal
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture);
        original_hook(panic);
    }));

    let mut app = App::new(manager, gateway, rt.handle().clone(), theme);

    // Run the main loop
    let result = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    let link = app.into_link();
    link.close();
    rt.block_on(async {
        if tokio::time::timeout(SHUTDOWN_GRACE, link.join()).await.is_err() {
            warn!("Status link did not stop in time");
        }
    });

    result
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    while app.running {
        app.refresh();

        terminal.draw(|frame| ui::draw(frame, app))?;

        // Poll for events with a short timeout
        if let Some(event) = events::poll_event(Duration::from_millis(100))? {
            match event {
                Event::Key(key) => events::handle_key_event(app, key),
                Event::Mouse(mouse) => {
                    events::handle_mouse_event(app, mouse, ui::CONTENT_START_ROW);
                }
                Event::Resize(_, _) => {
                    // Terminal will redraw on next iteration
                }
                _ => {}
            }
        }
    }

    Ok(())
}
