mod app;
mod cache;
mod config;
mod constants;
mod error;
mod export;
mod gemini;
mod history;
mod input;
mod prompt;
mod session;
mod storage;
mod theme;
mod ui;

use anyhow::{Context, Result};
use clap::Parser;
use ratatui::{
  DefaultTerminal,
  crossterm::event::{self, Event, KeyEventKind},
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use app::App;
use cache::{Activation, CacheController, CacheStore, HttpTransport};
use config::Config;
use history::{HistoryEntry, HistoryStore};
use prompt::Mode;
use session::Session;

// --- CLI ---

#[derive(Parser, Debug)]
#[command(author, version = env!("CARGO_PKG_VERSION"), about, long_about = None)]
struct Args {
  /// Generate one script for this topic, print it to stdout, and exit.
  #[arg(short, long)]
  topic: Option<String>,

  /// Script length: 'short' or 'long'.
  #[arg(short, long)]
  mode: Option<String>,

  /// Gemini API key (falls back to $GEMINI_API_KEY, then the saved config).
  #[arg(short = 'k', long)]
  api_key: Option<String>,

  /// Delete the offline cache and exit.
  #[arg(long)]
  clear_cache: bool,

  /// Log filter, e.g. 'info' or 'ysw=debug' (falls back to $RUST_LOG).
  #[arg(short, long)]
  log_level: Option<String>,
}

fn resolve_api_key(args: &Args, config: &Config) -> Option<String> {
  if let Some(ref key) = args.api_key {
    return Some(key.clone());
  }
  if let Ok(key) = std::env::var("GEMINI_API_KEY")
    && !key.is_empty()
  {
    return Some(key);
  }
  config.api_key.clone()
}

// --- Logging ---

fn log_filter(args: &Args) -> Result<EnvFilter> {
  match &args.log_level {
    Some(level) => EnvFilter::try_new(level).context("invalid --log-level"),
    None => Ok(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))),
  }
}

/// Interactive mode logs to a file under the data dir; stdout and stderr
/// belong to the terminal UI. The guard must stay alive for the duration
/// of the program or buffered lines are lost.
fn init_file_logging(args: &Args) -> Result<tracing_appender::non_blocking::WorkerGuard> {
  let log_dir = storage::log_dir()?;
  std::fs::create_dir_all(&log_dir).with_context(|| format!("failed to create {}", log_dir.display()))?;
  let file = tracing_appender::rolling::never(&log_dir, "ysw.log");
  let (writer, guard) = tracing_appender::non_blocking(file);
  tracing_subscriber::registry()
    .with(log_filter(args)?)
    .with(tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(false))
    .init();
  Ok(guard)
}

/// One-shot mode keeps stdout clean for the script itself; logs go to stderr.
fn init_stderr_logging(args: &Args) -> Result<()> {
  tracing_subscriber::registry()
    .with(log_filter(args)?)
    .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
    .init();
  Ok(())
}

// --- Main ---

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();

  if args.clear_cache {
    let store = CacheStore::new(storage::cache_root()?, &constants::constants().cache_generation);
    store.clear()?;
    println!("Offline cache cleared.");
    return Ok(());
  }

  if let Some(ref topic) = args.topic {
    init_stderr_logging(&args)?;
    return generate_to_stdout(&args, topic).await;
  }

  let _guard = init_file_logging(&args)?;

  let default_hook = std::panic::take_hook();
  std::panic::set_hook(Box::new(move |info| {
    ratatui::restore();
    default_hook(info);
  }));

  let mut terminal = ratatui::init();
  let result = run(&mut terminal, &args).await;
  ratatui::restore();
  result
}

async fn generate_to_stdout(args: &Args, topic: &str) -> Result<()> {
  let config = Config::load();
  let api_key = resolve_api_key(args, &config).unwrap_or_default();
  let mode = Mode::from_config(args.mode.as_deref().unwrap_or("short"));

  let cache = CacheController::spawn(storage::cache_root()?, Arc::new(HttpTransport::new()), Activation::Immediate);
  let result = session::generate_once(&cache, &api_key, topic, mode).await?;

  let mut history = HistoryStore::open(storage::history_path()?);
  if let Err(e) = history.add(HistoryEntry::new(result.topic.clone(), result.mode, result.script_text.clone())) {
    eprintln!("warning: {}", e);
  }

  println!("{}", result.script_text);
  Ok(())
}

async fn run(terminal: &mut DefaultTerminal, args: &Args) -> Result<()> {
  let config = Config::load();
  let api_key = resolve_api_key(args, &config);
  let mode =
    args.mode.as_deref().or(config.default_mode.as_deref()).map(Mode::from_config).unwrap_or(Mode::Short);

  let cache = CacheController::spawn(storage::cache_root()?, Arc::new(HttpTransport::new()), Activation::Immediate);
  let history = HistoryStore::open(storage::history_path()?);
  let session = Session::new(history, api_key, mode);
  let mut app = App::new(session, cache, &config);

  info!(version = env!("CARGO_PKG_VERSION"), "ysw started");

  loop {
    app.check_pending();
    app.expire_error();

    terminal.draw(|frame| ui::ui(frame, &mut app))?;

    if event::poll(Duration::from_millis(100))? {
      match event::read()? {
        Event::Key(key) if key.kind == KeyEventKind::Press => {
          input::handle_key_event(&mut app, key);
        }
        _ => {}
      }
    }

    if app.should_quit {
      break;
    }
  }

  Ok(())
}
