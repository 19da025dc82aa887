pub mod app;
pub mod ui;

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::prelude::*;
use std::io;
use std::time::{Duration, Instant};

use crate::shutdown::ShutdownFlag;
use app::App;

/// How long to wait for a key press before re-checking the refresh schedule
const INPUT_POLL: Duration = Duration::from_millis(100);

pub async fn run(mut app: App, shutdown: ShutdownFlag) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the main loop
    let res = run_app(&mut terminal, &mut app, &shutdown).await;

    // Restore terminal: every step runs even if an earlier one fails
    let restore = [
        disable_raw_mode(),
        execute!(terminal.backend_mut(), LeaveAlternateScreen),
        terminal.show_cursor(),
    ];

    finish(res, restore)
}

/// The loop's own error takes precedence over a failed restore step.
fn finish<const N: usize>(res: Result<()>, restore: [io::Result<()>; N]) -> Result<()> {
    res?;
    for step in restore {
        step?;
    }
    Ok(())
}

async fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    shutdown: &ShutdownFlag,
) -> Result<()> {
    loop {
        if shutdown.is_requested() {
            tracing::info!("Shutdown requested, leaving dashboard");
            return Ok(());
        }

        // Draw UI
        terminal.draw(|f| ui::draw(f, app))?;

        if app.refresh_due(Instant::now()) {
            // a slow or hung source must not keep us from quitting
            tokio::select! {
                biased;

                _ = shutdown.wait() => {
                    tracing::info!("Shutdown requested during fetch, leaving dashboard");
                    return Ok(());
                }
                res = wait_for_quit_key() => {
                    res?;
                    return Ok(());
                }
                _ = app.tick(Instant::now()) => {}
            }
            continue;
        }

        // Handle input with timeout for refresh
        if event::poll(INPUT_POLL)?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            if is_quit(&key) {
                return Ok(());
            }
            match key.code {
                KeyCode::Char('r') => app.request_refresh(),
                KeyCode::Char('p') => app.toggle_pause(),
                KeyCode::Char('a') => app.toggle_show_all(),
                KeyCode::Char('s') => app.toggle_sort(),
                KeyCode::Char('S') => app.toggle_sort_direction(),
                KeyCode::Up | KeyCode::Char('k') => app.select_previous(),
                KeyCode::Down | KeyCode::Char('j') => app.select_next(),
                KeyCode::Enter => app.toggle_detail(),
                KeyCode::Esc => {
                    if app.show_detail {
                        app.close_detail();
                    } else {
                        return Ok(());
                    }
                }
                _ => {}
            }
        }
    }
}

fn is_quit(key: &KeyEvent) -> bool {
    match key.code {
        KeyCode::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
        KeyCode::Char('q') => true,
        _ => false,
    }
}

/// Resolves when `q` or Ctrl+C is pressed. Other keys are dropped while a
/// fetch is running.
async fn wait_for_quit_key() -> io::Result<()> {
    loop {
        while event::poll(Duration::ZERO)? {
            if let Event::Key(key) = event::read()?
                && key.kind == KeyEventKind::Press
                && is_quit(&key)
            {
                return Ok(());
            }
        }
        tokio::time::sleep(INPUT_POLL).await;
    }
}
