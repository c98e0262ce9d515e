use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::graph::StepInterceptor;
use crate::state::RunState;

/// JSONL trace of every run, one file per run id.
///
/// Hooks only enqueue entries; a background task owns the files and writes
/// one JSON object per line, flushing after each so a crash leaves every
/// earlier line intact. A run's file is closed on its `run_finished` entry,
/// or once it has been idle for a while, which covers runs dropped mid-way.
/// The writer task ends once every `TraceLog` clone has been dropped.
#[derive(Clone)]
pub struct TraceLog {
    tx: mpsc::UnboundedSender<TraceEntry>,
}

#[derive(Debug, Serialize)]
struct TraceEntry {
    timestamp: String,
    run_id: String,
    event: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    step: Option<String>,
    attempt: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    elapsed_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<serde_json::Value>,
}

impl TraceEntry {
    fn new(event: &'static str, state: &RunState) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            run_id: state.run_id().to_string(),
            event,
            step: None,
            attempt: state.attempts(),
            elapsed_ms: None,
            detail: None,
        }
    }
}

impl TraceLog {
    /// Start the writer task. Files land in `{dir}/{run_id}.jsonl`.
    ///
    /// Must be called from inside a tokio runtime. Await the handle after
    /// dropping every clone to be sure the last lines are on disk.
    pub fn spawn(dir: impl Into<PathBuf>) -> (Self, JoinHandle<()>) {
        Self::spawn_with_idle(dir, DEFAULT_IDLE_CLOSE)
    }

    /// Like [`TraceLog::spawn`], closing files of runs that have been silent
    /// for `idle`. A later entry for such a run reopens its file in append mode.
    pub fn spawn_with_idle(dir: impl Into<PathBuf>, idle: Duration) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(write_loop(dir.into(), rx, idle));
        (Self { tx }, handle)
    }

    fn send(&self, entry: TraceEntry) {
        if self.tx.send(entry).is_err() {
            debug!("Trace writer gone, dropping entry");
        }
    }
}

/// How long a run may go without entries before its file is closed.
pub const DEFAULT_IDLE_CLOSE: Duration = Duration::from_secs(300);

/// Runs whose last entry is older than `idle`.
fn idle_runs(last_seen: &HashMap<String, Instant>, now: Instant, idle: Duration) -> Vec<String> {
    last_seen
        .iter()
        .filter(|(_, seen)| now.saturating_duration_since(**seen) >= idle)
        .map(|(run_id, _)| run_id.clone())
        .collect()
}

async fn open(dir: &std::path::Path, run_id: &str) -> std::io::Result<tokio::io::BufWriter<tokio::fs::File>> {
    let path = dir.join(format!("{}.jsonl", run_id));
    let file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .await?;
    debug!(path = %path.display(), "Opened trace file");
    Ok(tokio::io::BufWriter::new(file))
}

async fn write_loop(dir: PathBuf, mut rx: mpsc::UnboundedReceiver<TraceEntry>, idle: Duration) {
    if let Err(e) = tokio::fs::create_dir_all(&dir).await {
        error!(error = %e, dir = %dir.display(), "Failed to create trace directory");
        return;
    }
    info!(dir = %dir.display(), "Trace log started");

    let mut files: HashMap<String, tokio::io::BufWriter<tokio::fs::File>> = HashMap::new();
    let mut last_seen: HashMap<String, Instant> = HashMap::new();
    let mut sweep = tokio::time::interval(idle.max(Duration::from_millis(10)));
    sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let entry = tokio::select! {
            received = rx.recv() => match received {
                Some(entry) => entry,
                None => break,
            },
            _ = sweep.tick() => {
                for run_id in idle_runs(&last_seen, Instant::now(), idle) {
                    last_seen.remove(&run_id);
                    if let Some(mut writer) = files.remove(&run_id) {
                        writer.flush().await.ok();
                        debug!(run_id = %run_id, "Closed idle trace file");
                    }
                }
                continue;
            }
        };
        let finished = entry.event == "run_finished";

        if !files.contains_key(&entry.run_id) {
            match open(&dir, &entry.run_id).await {
                Ok(writer) => {
                    files.insert(entry.run_id.clone(), writer);
                }
                Err(e) => {
                    error!(error = %e, run_id = %entry.run_id, "Failed to open trace file");
                    continue;
                }
            }
        }
        let Some(writer) = files.get_mut(&entry.run_id) else {
            continue;
        };

        if let Ok(json) = serde_json::to_string(&entry) {
            let line = format!("{}\n", json);
            if let Err(e) = writer.write_all(line.as_bytes()).await {
                error!(error = %e, "Failed to write trace entry");
            } else if let Err(e) = writer.flush().await {
                error!(error = %e, "Failed to flush trace");
            }
        }

        if finished {
            files.remove(&entry.run_id);
            last_seen.remove(&entry.run_id);
        } else {
            last_seen.insert(entry.run_id, Instant::now());
        }
    }

    for (_, mut writer) in files {
        writer.flush().await.ok();
    }
    debug!("Trace log finished");
}

impl StepInterceptor for TraceLog {
    fn run_started(&self, state: &RunState) {
        let mut entry = TraceEntry::new("run_started", state);
        entry.detail = Some(serde_json::json!({
            "goal": state.goal(),
            "max_attempts": state.max_attempts(),
        }));
        self.send(entry);
    }

    fn before(&self, step: &str, state: &RunState) {
        let mut entry = TraceEntry::new("step_started", state);
        entry.step = Some(step.to_string());
        self.send(entry);
    }

    fn after(&self, step: &str, state: &RunState, elapsed: Duration) {
        let mut entry = TraceEntry::new("step_finished", state);
        entry.step = Some(step.to_string());
        entry.elapsed_ms = Some(elapsed.as_millis() as u64);
        entry.detail = Some(serde_json::json!({
            "tool": state.selected_tool,
            "has_result": state.result.is_some(),
            "errors": state.errors().len(),
            "accepted": state.accepted(),
        }));
        self.send(entry);
    }

    fn run_finished(&self, state: &RunState) {
        let mut entry = TraceEntry::new("run_finished", state);
        entry.detail = Some(serde_json::json!({
            "accepted": state.accepted(),
            "tool": state.selected_tool,
            "errors": state.errors(),
        }));
        self.send(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ErrorKind;

    #[tokio::test]
    async fn writes_one_line_per_event() {
        let dir = tempfile::tempdir().unwrap();
        let (log, handle) = TraceLog::spawn(dir.path());

        let mut state = RunState::new("2+2", 2);
        log.run_started(&state);
        log.before("plan", &state);
        log.after("plan", &state, Duration::from_millis(3));
        state.push_error(ErrorKind::Handler, "boom");
        log.run_finished(&state);
        drop(log);
        handle.await.unwrap();

        let path = dir.path().join(format!("{}.jsonl", state.run_id()));
        let content = std::fs::read_to_string(path).unwrap();
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();

        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0]["event"], "run_started");
        assert_eq!(lines[0]["detail"]["goal"], "2+2");
        assert_eq!(lines[1]["step"], "plan");
        assert_eq!(lines[2]["elapsed_ms"], 3);
        assert_eq!(lines[3]["event"], "run_finished");
        assert_eq!(lines[3]["detail"]["errors"][0]["message"], "boom");
    }

    #[test]
    fn idle_runs_are_picked_by_age() {
        let start = Instant::now();
        let now = start + Duration::from_secs(600);
        let mut last_seen = HashMap::new();
        last_seen.insert("stale".to_string(), start);
        last_seen.insert("fresh".to_string(), start + Duration::from_secs(595));

        let idle = idle_runs(&last_seen, now, Duration::from_secs(300));
        assert_eq!(idle, vec!["stale".to_string()]);
        assert!(idle_runs(&last_seen, now, Duration::from_secs(3600)).is_empty());
    }

    #[tokio::test]
    async fn abandoned_run_is_closed_and_reopened_for_append() {
        let dir = tempfile::tempdir().unwrap();
        let (log, handle) = TraceLog::spawn_with_idle(dir.path(), Duration::from_millis(20));

        // A run whose future was dropped never sends run_finished.
        let state = RunState::new("2+2", 1);
        log.run_started(&state);
        log.before("plan", &state);
        tokio::time::sleep(Duration::from_millis(120)).await;
        log.after("plan", &state, Duration::from_millis(1));
        drop(log);
        handle.await.unwrap();

        let path = dir.path().join(format!("{}.jsonl", state.run_id()));
        let content = std::fs::read_to_string(path).unwrap();
        let events: Vec<serde_json::Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0]["event"], "run_started");
        assert_eq!(events[2]["event"], "step_finished");
    }

    #[tokio::test]
    async fn separate_runs_get_separate_files() {
        let dir = tempfile::tempdir().unwrap();
        let (log, handle) = TraceLog::spawn(dir.path());

        let a = RunState::new("a", 1);
        let b = RunState::new("b", 1);
        log.run_started(&a);
        log.run_started(&b);
        log.run_finished(&a);
        log.run_finished(&b);
        drop(log);
        handle.await.unwrap();

        assert!(dir.path().join(format!("{}.jsonl", a.run_id())).exists());
        assert!(dir.path().join(format!("{}.jsonl", b.run_id())).exists());
    }
}
