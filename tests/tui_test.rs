//! TUI integration tests
//!
//! These tests verify that the dashboard App drives the monitor on schedule
//! and that the UI renders job data properly.

use async_trait::async_trait;
use ratatui::{Terminal, backend::TestBackend};
use smtop::jobs::{Job, JobState, WorkflowId};
use smtop::monitor::Monitor;
use smtop::source::{JobSource, SourceError};
use smtop::tui::app::{App, SortColumn};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Serves whatever job list (or error) the test last put in
#[derive(Clone)]
struct StaticSource {
    jobs: Arc<Mutex<Result<Vec<Job>, String>>>,
    fetches: Arc<Mutex<usize>>,
}

impl StaticSource {
    fn with_jobs(jobs: Vec<Job>) -> Self {
        Self {
            jobs: Arc::new(Mutex::new(Ok(jobs))),
            fetches: Arc::new(Mutex::new(0)),
        }
    }

    fn set(&self, jobs: Result<Vec<Job>, String>) {
        *self.jobs.lock().unwrap() = jobs;
    }

    fn fetches(&self) -> usize {
        *self.fetches.lock().unwrap()
    }
}

#[async_trait]
impl JobSource for StaticSource {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn fetch(&self, _workflow: Option<&WorkflowId>) -> Result<Vec<Job>, SourceError> {
        *self.fetches.lock().unwrap() += 1;
        self.jobs
            .lock()
            .unwrap()
            .clone()
            .map_err(SourceError::Unavailable)
    }
}

fn make_job(id: &str, state: JobState, elapsed: &str) -> Job {
    let mut job = Job::new(id, format!("job{}", id), state).with_workflow("run-1");
    job.rule = Some(format!("rule{}", id));
    job.elapsed = Some(elapsed.to_string());
    job.max_rss = Some(256 << 20);
    job.cpus = Some(2);
    job
}

fn sample_jobs() -> Vec<Job> {
    vec![
        make_job("103", JobState::Running, "00:30:00"),
        make_job("101", JobState::Pending, "00:00:00"),
        make_job("102", JobState::Running, "01:00:00"),
        make_job("104", JobState::Completed, "00:05:00"),
        make_job("105", JobState::Failed, "00:01:00"),
    ]
}

fn make_app(source: StaticSource, show_all: bool) -> App {
    App::new(Monitor::new(source, None), Duration::from_secs(10), show_all)
}

fn render(app: &App, width: u16, height: u16) -> String {
    let backend = TestBackend::new(width, height);
    let mut terminal = Terminal::new(backend).unwrap();
    terminal.draw(|f| smtop::tui::ui::draw(f, app)).unwrap();
    let buffer = terminal.backend().buffer();
    buffer.content.iter().map(|cell| cell.symbol()).collect()
}

// =============================================================================
// App state
// =============================================================================

#[test]
fn test_app_creation() {
    let app = make_app(StaticSource::with_jobs(vec![]), false);

    assert!(app.snapshot().jobs.is_empty());
    assert!(app.last_refresh.is_none());
    assert_eq!(app.selected_index, 0);
    assert_eq!(app.sort_by, SortColumn::JobId);
    assert!(!app.paused);
    assert!(!app.show_detail);
    assert_eq!(app.source_label(), "static");
}

/// The first tick fetches immediately, then only once the interval has passed
#[tokio::test]
async fn test_app_refresh_schedule() {
    let source = StaticSource::with_jobs(sample_jobs());
    let mut app = make_app(source.clone(), false);
    let start = Instant::now();

    assert!(app.tick(start).await);
    assert_eq!(source.fetches(), 1);

    assert!(!app.tick(start + Duration::from_secs(9)).await);
    assert_eq!(app.seconds_until_refresh(start + Duration::from_secs(4)), Some(6));

    assert!(app.tick(start + Duration::from_secs(10)).await);
    assert_eq!(source.fetches(), 2);
}

#[tokio::test]
async fn test_app_pause_stops_fetching() {
    let source = StaticSource::with_jobs(sample_jobs());
    let mut app = make_app(source.clone(), false);
    let start = Instant::now();
    app.tick(start).await;

    app.toggle_pause();
    assert!(app.paused);
    assert!(!app.tick(start + Duration::from_secs(60)).await);
    assert_eq!(app.seconds_until_refresh(start), None);
    assert_eq!(source.fetches(), 1);

    // manual refresh still works while paused
    app.request_refresh();
    assert!(app.refresh_due(start + Duration::from_secs(61)));
    assert!(app.tick(start + Duration::from_secs(61)).await);
    assert_eq!(source.fetches(), 2);
    assert!(!app.refresh_requested);
    assert!(!app.tick(start + Duration::from_secs(62)).await);

    app.toggle_pause();
    assert!(app.tick(start + Duration::from_secs(120)).await);
}

#[tokio::test]
async fn test_app_shows_active_jobs_by_default() {
    let mut app = make_app(StaticSource::with_jobs(sample_jobs()), false);
    app.tick(Instant::now()).await;

    let ids: Vec<&str> = app.visible_jobs().iter().map(|j| j.job_id.as_str()).collect();
    assert_eq!(ids, vec!["101", "102", "103"]);

    app.toggle_show_all();
    assert_eq!(app.visible_jobs().len(), 5);
}

#[tokio::test]
async fn test_app_sorting() {
    let mut app = make_app(StaticSource::with_jobs(sample_jobs()), true);
    app.tick(Instant::now()).await;

    app.toggle_sort(); // State
    assert_eq!(app.sort_by, SortColumn::State);
    let states: Vec<JobState> = app.visible_jobs().iter().map(|j| j.state.clone()).collect();
    assert_eq!(states[0], JobState::Pending);
    assert_eq!(states[4], JobState::Failed);

    app.toggle_sort(); // Elapsed
    let ids: Vec<&str> = app.visible_jobs().iter().map(|j| j.job_id.as_str()).collect();
    assert_eq!(ids, vec!["101", "105", "104", "103", "102"]);

    app.toggle_sort_direction();
    assert_eq!(app.visible_jobs()[0].job_id, "102");

    app.toggle_sort(); // Name
    app.toggle_sort(); // back to JobId
    assert_eq!(app.sort_by, SortColumn::JobId);
}

#[tokio::test]
async fn test_app_navigation() {
    let mut app = make_app(StaticSource::with_jobs(sample_jobs()), false);
    app.tick(Instant::now()).await;

    assert_eq!(app.selected_index, 0);
    app.select_next();
    app.select_next();
    assert_eq!(app.selected_index, 2);

    // Wraps around
    app.select_next();
    assert_eq!(app.selected_index, 0);

    app.select_previous();
    assert_eq!(app.selected_index, 2);
    assert_eq!(app.selected_job().unwrap().job_id, "103");
}

/// Selection is clamped when the job list shrinks
#[tokio::test]
async fn test_app_selection_clamped_on_refresh() {
    let source = StaticSource::with_jobs(sample_jobs());
    let mut app = make_app(source.clone(), false);
    app.tick(Instant::now()).await;
    app.select_previous();
    assert_eq!(app.selected_index, 2);

    source.set(Ok(vec![make_job("101", JobState::Running, "00:01:00")]));
    app.request_refresh();
    app.tick(Instant::now()).await;
    assert_eq!(app.selected_index, 0);
}

#[tokio::test]
async fn test_app_keeps_jobs_on_source_failure() {
    let source = StaticSource::with_jobs(sample_jobs());
    let mut app = make_app(source.clone(), false);
    let start = Instant::now();
    app.tick(start).await;

    source.set(Err("sacct: error: slurmdbd connection refused".to_string()));
    assert!(app.tick(start + Duration::from_secs(10)).await);

    assert!(app.snapshot().is_stale());
    assert_eq!(app.visible_jobs().len(), 3);

    source.set(Ok(sample_jobs()));
    assert!(app.tick(start + Duration::from_secs(20)).await);
    assert!(!app.snapshot().is_stale());
}

// =============================================================================
// UI Rendering Tests
// =============================================================================

/// Test that UI can render with empty data without crashing
#[test]
fn test_ui_renders_empty_state() {
    let app = make_app(StaticSource::with_jobs(vec![]), false);
    let content = render(&app, 80, 24);

    assert!(content.contains("smtop"));
    assert!(content.contains("never"));
    assert!(content.contains("Active Jobs (0)"));
}

#[tokio::test]
async fn test_ui_renders_with_data() {
    let source = StaticSource::with_jobs(sample_jobs());
    let mut app = App::new(
        Monitor::new(source, Some(WorkflowId::new("run-1").unwrap())),
        Duration::from_secs(10),
        false,
    );
    app.tick(Instant::now()).await;

    let content = render(&app, 140, 30);

    assert!(content.contains("smtop"), "Should show app name");
    assert!(content.contains("run-1"), "Should show workflow id");
    assert!(content.contains("Job Statistics"), "Should show stats");
    assert!(content.contains("RUNNING: 2"), "Should count running jobs");
    assert!(content.contains("Active Jobs (3)"), "Should title the table");
    assert!(content.contains("102"), "Should show running job");
    assert!(content.contains("rule101"), "Should show rule");
    assert!(content.contains("256M"), "Should show memory");
    assert!(!content.contains("rule104"), "Completed jobs hidden by default");
}

#[tokio::test]
async fn test_ui_renders_error_line() {
    let source = StaticSource::with_jobs(vec![]);
    source.set(Err("connection refused".to_string()));
    let mut app = make_app(source, false);
    app.tick(Instant::now()).await;

    let content = render(&app, 120, 24);
    assert!(content.contains("Status source unavailable"));
    assert!(content.contains("connection refused"));
}

#[tokio::test]
async fn test_ui_renders_detail_popup() {
    let mut app = make_app(StaticSource::with_jobs(sample_jobs()), false);
    app.tick(Instant::now()).await;
    app.toggle_detail();

    let content = render(&app, 100, 30);

    assert!(content.contains("Details"), "Should show details title");
    assert!(content.contains("Workflow"));
    assert!(content.contains("Max RSS"));
    assert!(content.contains("Press ESC"));
}

/// Test UI with small terminal size
#[tokio::test]
async fn test_ui_renders_small_terminal() {
    let mut app = make_app(StaticSource::with_jobs(sample_jobs()), true);
    app.tick(Instant::now()).await;

    // Should not panic even on small terminal
    render(&app, 40, 12);
}
