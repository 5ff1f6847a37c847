//! Append-only JSONL deployment report sink, plus a pub-sub event bus with
//! pluggable subscribers (`spec.md` §4.I, §6 "Report format").
//!
//! The scheduler in `reconciler-core` publishes one [`ReportRecord`] per
//! coordinate transition (started -> deployed|failed|skipped). [`ReportBus`]
//! fans each record out to every subscriber without blocking the deployment
//! path beyond the subscriber's own call; [`SharedReportSink`] is the bus's file
//! sink, safe to share across the scheduler's worker threads the same way the
//! teacher's `EventLog` is shared via `Arc<Mutex<_>>`.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use reconciler_types::{Coordinate, DeployState, ReportRecord, ReportSubscriber};

pub use reconciler_types::report::{DEFAULT_REPORT_FILENAME, DEPLOYMENT_REPORT_FILENAME_ENV};

/// Resolve the report file path: `DEPLOYMENT_REPORT_FILENAME` if set, else
/// `<dir>/deployment-report.jsonl`.
pub fn report_path(dir: &Path) -> PathBuf {
    match std::env::var(DEPLOYMENT_REPORT_FILENAME_ENV) {
        Ok(name) if !name.is_empty() => PathBuf::from(name),
        _ => dir.join(DEFAULT_REPORT_FILENAME),
    }
}

/// An in-memory, append-only collection of report records with file
/// persistence. Mirrors the teacher's `EventLog`: `write_to_file` appends
/// rather than truncates, so repeated calls across a long-running process
/// accumulate one growing JSONL file.
#[derive(Debug, Default)]
pub struct ReportSink {
    records: Vec<ReportRecord>,
}

impl ReportSink {
    pub fn new() -> Self {
        Self { records: Vec::new() }
    }

    pub fn record(&mut self, record: ReportRecord) {
        self.records.push(record);
    }

    /// Append all recorded records to `path` in JSONL format.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create report dir {}", parent.display()))?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open report file {}", path.display()))?;

        let mut writer = std::io::BufWriter::new(file);
        for record in &self.records {
            let line = record
                .to_json_line()
                .context("failed to serialize report record to JSON")?;
            writeln!(writer, "{line}").context("failed to write report line")?;
        }
        writer.flush().context("failed to flush report file")?;
        Ok(())
    }

    pub fn read_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let file =
            File::open(path).with_context(|| format!("failed to open report file {}", path.display()))?;
        let reader = BufReader::new(file);
        let mut records = Vec::new();
        for line in reader.lines() {
            let line = line
                .with_context(|| format!("failed to read line from report file {}", path.display()))?;
            if line.trim().is_empty() {
                continue;
            }
            let record: ReportRecord = serde_json::from_str(&line)
                .with_context(|| format!("failed to parse report JSON from line: {line}"))?;
            records.push(record);
        }
        Ok(Self { records })
    }

    pub fn records_for_coordinate(&self, coordinate: &Coordinate) -> Vec<&ReportRecord> {
        self.records
            .iter()
            .filter(|r| {
                r.config.project == coordinate.project
                    && r.config.kind == coordinate.kind
                    && r.config.config_id == coordinate.config_id
            })
            .collect()
    }

    pub fn records_with_state(&self, state: DeployState) -> Vec<&ReportRecord> {
        self.records.iter().filter(|r| r.state == state).collect()
    }

    pub fn all_records(&self) -> &[ReportRecord] {
        &self.records
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// A [`ReportSink`] shared across scheduler worker threads, itself a
/// [`ReportSubscriber`].
#[derive(Debug, Clone)]
pub struct SharedReportSink(pub Arc<Mutex<ReportSink>>);

impl SharedReportSink {
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(ReportSink::new())))
    }

    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let sink = self.0.lock().expect("report sink mutex poisoned");
        sink.write_to_file(path)
    }
}

impl Default for SharedReportSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportSubscriber for SharedReportSink {
    fn on_record(&self, record: &ReportRecord) {
        let mut sink = self.0.lock().expect("report sink mutex poisoned");
        sink.record(record.clone());
    }
}

/// Pub-sub bus: fans each published record out to every subscriber, in
/// subscription order. A subscriber that panics poisons nothing else — each
/// call is independent.
#[derive(Clone, Default)]
pub struct ReportBus {
    subscribers: Vec<Arc<dyn ReportSubscriber>>,
}

impl ReportBus {
    pub fn new() -> Self {
        Self { subscribers: Vec::new() }
    }

    pub fn subscribe(&mut self, subscriber: Arc<dyn ReportSubscriber>) {
        self.subscribers.push(subscriber);
    }

    pub fn publish(&self, record: ReportRecord) {
        for subscriber in &self.subscribers {
            subscriber.on_record(&record);
        }
    }
}
