mod app;
mod calendar;
mod cli;
mod config;
mod daemon;
mod error;
mod llm;
mod nlp;
mod planner;
mod ui;

use crate::app::InputMode;
use crate::calendar::{CalendarOverview, QueryResponse};
use crate::cli::{Cli, Commands};
use crate::config::Config;
use crate::daemon::{DaemonRequest, DaemonResponse};
use crate::llm::ProviderChain;
use crate::planner::QueryOrchestrator;
use crate::ui::ui;
use anyhow::{Context, Result};
use app::App;
use clap::Parser;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::{Backend, CrosstermBackend},
};
use std::io;
use std::sync::Arc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env("ALMANAC_LOG").unwrap_or_else(|_| EnvFilter::new("almanac=info"))
}

// One-shot commands own stderr
fn init_stderr_logging() {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_writer(io::stderr))
        .init();
}

// The TUI owns the terminal and the daemon runs detached, so both log to a file
fn init_file_logging(config: &Config, name: &str) -> Result<WorkerGuard> {
    let dir = config.log_dir();
    std::fs::create_dir_all(&dir).context(format!("Failed to create log dir: {:?}", dir))?;

    let appender = tracing_appender::rolling::daily(&dir, format!("{}.log", name));
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .init();

    Ok(guard)
}

async fn build_orchestrator(config: &Config, with_providers: bool) -> Result<Arc<QueryOrchestrator>> {
    let store = config
        .build_store()
        .await
        .context("Failed to open calendar store")?;
    let providers = if with_providers {
        config.build_providers().await
    } else {
        ProviderChain::empty()
    };
    let settings = config.settings()?;

    Ok(Arc::new(QueryOrchestrator::new(store, providers, settings)))
}

fn print_response(response: &QueryResponse) {
    println!("{}", response.answer);
    if let Some(error) = response.error.as_deref().filter(|_| !response.success) {
        eprintln!("✗ {}", error);
    }
}

fn print_overview(overview: &CalendarOverview) {
    println!("Today ({} events):", overview.today_count);
    for event in &overview.today {
        println!("  {}", event.display_line());
    }
    println!("Upcoming ({} events):", overview.upcoming_count);
    for event in &overview.upcoming {
        println!("  {}", event.display_line());
    }
    if let Some(next) = &overview.next_event {
        println!("Next: {}", next.display_line());
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref(), cli.env_file.as_deref())
        .context("Failed to load configuration")?;
    let socket = config.socket_path();

    match cli.command {
        None => {
            let _guard = init_file_logging(&config, "tui")?;
            let orchestrator = build_orchestrator(&config, true).await?;
            run_tui(orchestrator).await
        }

        Some(Commands::Daemon) => {
            let _guard = init_file_logging(&config, "daemon")?;
            let orchestrator = build_orchestrator(&config, true).await?;
            eprintln!("✓ Daemon listening on {}", socket.display());
            daemon::start_daemon(socket, orchestrator).await
        }

        Some(Commands::Stop) => {
            init_stderr_logging();
            daemon::stop_daemon(&socket).await
        }

        Some(Commands::Status) => {
            init_stderr_logging();
            if daemon::is_daemon_running(&socket).await {
                println!("✓ Daemon running at {}", socket.display());
            } else {
                println!("✗ Daemon not running");
            }
            Ok(())
        }

        Some(Commands::Overview) => {
            init_stderr_logging();
            match daemon::send_to_daemon(&socket, DaemonRequest::Overview).await? {
                DaemonResponse::Overview(overview) => print_overview(&overview),
                DaemonResponse::Error(e) => anyhow::bail!("Daemon error: {}", e),
                other => anyhow::bail!("Unexpected daemon response: {:?}", other),
            }
            Ok(())
        }

        Some(Commands::Query { text, remote }) => {
            init_stderr_logging();
            let question = text.join(" ");

            if remote {
                let request = DaemonRequest::Query { question };
                match daemon::send_to_daemon(&socket, request).await? {
                    DaemonResponse::Answer(response) => print_response(&response),
                    DaemonResponse::Error(e) => anyhow::bail!("Daemon error: {}", e),
                    other => anyhow::bail!("Unexpected daemon response: {:?}", other),
                }
            } else {
                let orchestrator = build_orchestrator(&config, true).await?;
                print_response(&orchestrator.handle_query(&question).await);
            }
            Ok(())
        }

        Some(Commands::Batch { questions }) => {
            init_stderr_logging();
            let orchestrator = build_orchestrator(&config, true).await?;
            let responses = orchestrator.handle_batch(&questions).await;

            for (question, response) in questions.iter().zip(&responses) {
                println!("> {}", question);
                print_response(response);
                println!();
            }
            info!(count = responses.len(), "batch finished");
            Ok(())
        }

        Some(Commands::Search { keyword, days }) => {
            init_stderr_logging();
            let orchestrator = build_orchestrator(&config, false).await?;
            print_response(&orchestrator.search(&keyword, days).await);
            Ok(())
        }

        Some(Commands::Stats) => {
            init_stderr_logging();
            let orchestrator = build_orchestrator(&config, false).await?;
            print_response(&orchestrator.stats().await);
            Ok(())
        }
    }
}

async fn run_tui(orchestrator: Arc<QueryOrchestrator>) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(orchestrator);
    app.refresh().await;
    let result = run_app(&mut terminal, app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result.context("Terminal UI failed")
}

async fn run_app<B: Backend>(terminal: &mut Terminal<B>, mut app: App) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, &app))?;

        if let Event::Key(key) = event::read()? {
            match app.input_mode {
                InputMode::Normal => match key.code {
                    KeyCode::Char('q') => return Ok(()),
                    KeyCode::Char('i') | KeyCode::Char('a') => {
                        app.input_mode = InputMode::Editing;
                        app.input_buffer.clear();
                    }
                    KeyCode::Char('r') => app.refresh().await,
                    KeyCode::Char('c') => app.clear_history(),
                    KeyCode::Char('k') => app.select_previous(),
                    KeyCode::Char('j') => app.select_next(),
                    _ => {}
                },

                InputMode::Editing => match key.code {
                    KeyCode::Enter => app.submit().await,
                    KeyCode::Char(c) => app.input_buffer.push(c),
                    KeyCode::Backspace => {
                        app.input_buffer.pop();
                    }
                    KeyCode::Esc => app.input_mode = InputMode::Normal,
                    _ => {}
                },
            }
        }
    }
}
