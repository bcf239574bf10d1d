mod app;
mod edit_command;
mod ui;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use std::{
    io::{Stdout, stdout},
    path::PathBuf,
    sync::Arc,
    time::Duration,
};
use textmerge_config::Config;
use textmerge_engine::{EditMode, MergeSession, WordBoundaries};

use app::{App, Exit};
use edit_command::CommandEditService;

#[derive(Parser, Debug)]
#[command(name = "textmerge")]
#[command(version)]
#[command(about = "Interactively merge a revised text back into its original", long_about = None)]
struct Args {
    /// Original text file
    source: PathBuf,

    /// Revised text file
    target: PathBuf,

    /// Write the merged text here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Shell command that rewrites a selected range (text on stdin, result on stdout)
    #[arg(short, long)]
    edit_command: Option<String>,

    /// Edit mode passed to the edit command (improve, proofread, shorten, expand)
    #[arg(short, long)]
    mode: Option<String>,

    /// Config file to use instead of the default location
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.log_file.as_ref())?;
    log::info!("textmerge starting up!");

    let config = match &args.config {
        Some(path) => Config::load_from_path(path)?,
        None => {
            log::info!("Config path: {}", Config::config_path().display());
            Config::load()?
        }
    }
    .unwrap_or_default();

    let mode = match args.mode.as_deref().or(config.edit_mode.as_deref()) {
        Some(mode) => mode.parse::<EditMode>()?,
        None => EditMode::default(),
    };

    let source = std::fs::read_to_string(&args.source)
        .with_context(|| format!("failed to read {}", args.source.display()))?;
    let target = std::fs::read_to_string(&args.target)
        .with_context(|| format!("failed to read {}", args.target.display()))?;

    let mut session = MergeSession::new().with_history_limit(config.history_limit);
    if let Some(punctuation) = &config.boundary_characters {
        session = session.with_boundaries(WordBoundaries::from_punctuation(punctuation));
    }
    session.run_diff(&source, &target)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    let mut app = App::new(session, source, mode);
    if let Some(command) = args.edit_command {
        log::info!("Range edits run through '{command}'");
        app = app.with_editor(
            Arc::new(CommandEditService::new(command)),
            runtime.handle().clone(),
        );
    }

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    res?;

    if app.exit == Some(Exit::Write) {
        let merged = app.preview();
        match &args.output {
            Some(path) => {
                std::fs::write(path, merged)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                log::info!("Wrote merged text to {}", path.display());
            }
            None => print!("{merged}"),
        }
    }

    Ok(())
}

/// Logs go to `log_file` at info level. Without a file they stay off unless `RUST_LOG`
/// is set, as stderr is the UI's terminal.
fn init_logging(log_file: Option<&PathBuf>) -> Result<()> {
    let mut builder = env_logger::Builder::new();
    match log_file {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("failed to create log file {}", path.display()))?;
            builder
                .filter_level(log::LevelFilter::Info)
                .target(env_logger::Target::Pipe(Box::new(file)));
        }
        None => {
            builder.filter_level(log::LevelFilter::Off);
        }
    }
    builder.parse_default_env().init();
    Ok(())
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut App) -> Result<()> {
    while app.exit.is_none() {
        terminal.draw(|f| ui::draw(f, app))?;

        if event::poll(Duration::from_millis(100))?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            app.handle_key(key);
        }
        app.poll_range_edit();
    }
    Ok(())
}
