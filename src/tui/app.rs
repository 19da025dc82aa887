use std::cmp::Ordering;
use std::time::{Duration, Instant};

use crate::jobs::{Job, WorkflowId};
use crate::monitor::{Monitor, Snapshot, visible_jobs};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortColumn {
    JobId,
    State,
    Elapsed,
    Name,
}

impl SortColumn {
    pub fn label(&self) -> &'static str {
        match self {
            SortColumn::JobId => "JobID",
            SortColumn::State => "State",
            SortColumn::Elapsed => "Elapsed",
            SortColumn::Name => "Name",
        }
    }
}

pub struct App {
    monitor: Monitor,
    source_label: String,
    pub refresh_interval: Duration,
    pub last_refresh: Option<Instant>,
    pub selected_index: usize,
    pub sort_by: SortColumn,
    pub sort_ascending: bool,
    pub paused: bool,
    pub show_all: bool,
    pub show_detail: bool,
    /// Set by `r`; the next tick fetches regardless of schedule or pause
    pub refresh_requested: bool,
}

impl App {
    pub fn new(monitor: Monitor, refresh_interval: Duration, show_all: bool) -> Self {
        let source_label = monitor.source_description();
        Self {
            monitor,
            source_label,
            refresh_interval,
            last_refresh: None,
            selected_index: 0,
            sort_by: SortColumn::JobId,
            sort_ascending: true,
            paused: false,
            show_all,
            show_detail: false,
            refresh_requested: false,
        }
    }

    pub fn snapshot(&self) -> &Snapshot {
        self.monitor.snapshot()
    }

    pub fn workflow_filter(&self) -> Option<&WorkflowId> {
        self.monitor.filter()
    }

    pub fn source_label(&self) -> &str {
        &self.source_label
    }

    /// True when a refresh was requested, or the interval has elapsed since
    /// the last fetch (or none happened yet)
    pub fn refresh_due(&self, now: Instant) -> bool {
        if self.refresh_requested {
            return true;
        }
        if self.paused {
            return false;
        }
        match self.last_refresh {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.refresh_interval,
        }
    }

    /// Fetch if due. Returns whether a fetch happened.
    pub async fn tick(&mut self, now: Instant) -> bool {
        if !self.refresh_due(now) {
            return false;
        }
        self.monitor.tick().await;
        self.last_refresh = Some(now);
        self.refresh_requested = false;
        self.clamp_selection();
        true
    }

    /// Fetch on the next tick, regardless of the schedule
    pub fn request_refresh(&mut self) {
        self.refresh_requested = true;
    }

    /// Whole seconds until the next scheduled fetch
    pub fn seconds_until_refresh(&self, now: Instant) -> Option<u64> {
        if self.paused {
            return None;
        }
        let last = self.last_refresh?;
        let due = last + self.refresh_interval;
        Some(due.saturating_duration_since(now).as_secs())
    }

    /// Jobs shown in the table, in display order
    pub fn visible_jobs(&self) -> Vec<&Job> {
        let mut jobs = visible_jobs(self.monitor.snapshot(), self.show_all);
        let ascending = self.sort_ascending;
        // job id is the secondary key everywhere for a stable order
        jobs.sort_by(|a, b| {
            let primary = match self.sort_by {
                SortColumn::JobId => Ordering::Equal,
                SortColumn::State => a.state.cmp(&b.state),
                SortColumn::Elapsed => a.elapsed_secs().cmp(&b.elapsed_secs()),
                SortColumn::Name => a.name.cmp(&b.name),
            };
            let ordering = primary.then_with(|| job_id_key(&a.job_id).cmp(&job_id_key(&b.job_id)));
            if ascending { ordering } else { ordering.reverse() }
        });
        jobs
    }

    pub fn selected_job(&self) -> Option<&Job> {
        self.visible_jobs().get(self.selected_index).copied()
    }

    pub fn toggle_sort(&mut self) {
        self.sort_by = match self.sort_by {
            SortColumn::JobId => SortColumn::State,
            SortColumn::State => SortColumn::Elapsed,
            SortColumn::Elapsed => SortColumn::Name,
            SortColumn::Name => SortColumn::JobId,
        };
    }

    pub fn toggle_sort_direction(&mut self) {
        self.sort_ascending = !self.sort_ascending;
    }

    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
    }

    pub fn toggle_show_all(&mut self) {
        self.show_all = !self.show_all;
        self.clamp_selection();
    }

    pub fn toggle_detail(&mut self) {
        self.show_detail = !self.show_detail;
    }

    pub fn close_detail(&mut self) {
        self.show_detail = false;
    }

    pub fn select_next(&mut self) {
        let len = self.visible_jobs().len();
        if len > 0 {
            self.selected_index = (self.selected_index + 1) % len;
        }
    }

    pub fn select_previous(&mut self) {
        let len = self.visible_jobs().len();
        if len > 0 {
            self.selected_index = if self.selected_index == 0 {
                len - 1
            } else {
                self.selected_index - 1
            };
        }
    }

    fn clamp_selection(&mut self) {
        let len = self.visible_jobs().len();
        if len == 0 {
            self.selected_index = 0;
        } else if self.selected_index >= len {
            self.selected_index = len - 1;
        }
    }
}

/// Numeric job ids sort numerically; array ids like `123_4` by their parts
fn job_id_key(id: &str) -> (u64, u64, &str) {
    let (main, task) = id.split_once('_').unwrap_or((id, ""));
    (
        main.parse().unwrap_or(u64::MAX),
        task.parse().unwrap_or(0),
        id,
    )
}
