//! Signage kiosk in the terminal
//!
//! ## Screens
//!
//! - Slides / List: the public slideshow, rotating on the slider timer
//! - Settings: every slide, most recent first
//! - Item, cover, order and timer editors
//!
//! Settings and the editors return on their own after the home or back
//! timer runs out without input.
//!
//! ## Keys
//!
//! - ←/→: Previous / next slide
//! - v: Toggle slide and list view
//! - s: Settings
//! - Esc: Back (twice on a public view to exit)
//! - Ctrl-S: Save the current editor
//! - Ctrl-C: Quit

mod app;
mod ui;

use std::fs::File;
use std::io::stdout;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind, MouseEventKind,
    },
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::prelude::*;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use signage_core::images::ImageStorage;
use signage_core::slider::{Slide, SlideCounter, SlideRenderer, SlideText};
use signage_core::storage::KvBackend;
use signage_core::{ActivityKind, Config, Kiosk};

use app::App;

/// Run the kiosk until the user exits
pub async fn run(config: Config) -> Result<()> {
    // File-based, only if SIGNAGE_LOG is set
    init_kiosk_logging(&config);

    let mut kiosk = Kiosk::open(config, Instant::now())?;
    kiosk.set_renderer(Box::new(LogRenderer));
    info!(screen = %kiosk.screen(), "kiosk started");

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    stdout().execute(EnableMouseCapture)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let mut app = App::new(kiosk);
    let result = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(DisableMouseCapture)?;
    stdout().execute(LeaveAlternateScreen)?;

    result
}

async fn run_app<T: Backend, B: KvBackend, S: ImageStorage>(
    terminal: &mut Terminal<T>,
    app: &mut App<B, S>,
) -> Result<()> {
    loop {
        app.check_status_timeout();
        app.tick(Instant::now());

        let now = Instant::now();
        terminal.draw(|frame| ui::draw(frame, app, now))?;

        if app.should_quit {
            info!("kiosk exited");
            return Ok(());
        }

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                return Ok(());
            }

            _ = tokio::time::sleep(Duration::from_millis(50)) => {
                // Drain every pending terminal event (non-blocking)
                while event::poll(Duration::from_millis(0))? {
                    let now = Instant::now();
                    match event::read()? {
                        // Only handle key press events (not release)
                        Event::Key(key) if key.kind == KeyEventKind::Press => {
                            app.handle_key(key.code, key.modifiers, now);
                        }
                        Event::Mouse(mouse) => match mouse.kind {
                            MouseEventKind::Moved => app.pointer(ActivityKind::PointerMove, now),
                            MouseEventKind::Down(_) => app.pointer(ActivityKind::Click, now),
                            _ => {}
                        },
                        _ => {}
                    }
                }
            }
        }
    }
}

/// Writes each slide change to the kiosk log
struct LogRenderer;

impl SlideRenderer for LogRenderer {
    fn render(&mut self, slide: &Slide, counter: SlideCounter) {
        let text = SlideText::from(slide);
        debug!(title = %text.title, %counter, "slide shown");
    }

    fn render_empty(&mut self) {
        debug!("no slides to show");
    }
}

/// Initialize file-based logging for the kiosk
///
/// Logging is only enabled when SIGNAGE_LOG is set (e.g. SIGNAGE_LOG=debug).
/// Logs go to the configured log_file, or {data_dir}/debug.log.
fn init_kiosk_logging(config: &Config) {
    // Only log if SIGNAGE_LOG is set
    let Ok(log_level) = std::env::var("SIGNAGE_LOG") else {
        return;
    };

    let log_path = config.log_path();

    // Create log file
    let log_file = match File::create(&log_path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Warning: Could not create log file {:?}: {}", log_path, e);
            return;
        }
    };

    let env_filter = EnvFilter::new(format!(
        "signage_core={},signage_cli={}",
        log_level, log_level
    ));

    // Initialize file-based logging (ignore error if already initialized)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(log_file)
        .try_init();
}
