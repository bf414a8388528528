//! Process-wide diagnostic log file.
//!
//! A last-resort append target for things that must leave a trace even when the database is the
//! thing that failed. Writes are best-effort: an I/O error is reported through `tracing` and
//! swallowed. The file is bounded: once it grows past `max_bytes`, the oldest `trim_lines` lines
//! are dropped before the next append.
//!
//! The sync writers do blocking file I/O. Async callers use [`DiagnosticSink::record_info`] and
//! [`DiagnosticSink::record_error`], which run the write on the blocking pool.

use crate::config::DiagnosticsConfig;
use chrono::Utc;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    Info,
    Error,
}

impl Level {
    fn tag(self) -> &'static str {
        match self {
            Level::Info => "[INFO]",
            Level::Error => "[ERROR]",
        }
    }
}

#[derive(Debug)]
pub struct DiagnosticSink {
    path: PathBuf,
    max_bytes: u64,
    trim_lines: usize,
    lock: Mutex<()>,
}

impl DiagnosticSink {
    pub fn new(path: impl Into<PathBuf>, max_bytes: u64, trim_lines: usize) -> Self {
        Self {
            path: path.into(),
            max_bytes,
            trim_lines,
            lock: Mutex::new(()),
        }
    }

    pub fn from_config(config: &DiagnosticsConfig) -> Self {
        Self::new(&config.path, config.max_bytes, config.trim_lines)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write_info(&self, message: &str) {
        self.write(Level::Info, message);
    }

    pub fn write_error(&self, message: &str) {
        self.write(Level::Error, message);
    }

    pub async fn record_info(self: &Arc<Self>, message: String) {
        self.record(Level::Info, message).await;
    }

    pub async fn record_error(self: &Arc<Self>, message: String) {
        self.record(Level::Error, message).await;
    }

    async fn record(self: &Arc<Self>, level: Level, message: String) {
        let sink = Arc::clone(self);
        if let Err(e) = tokio::task::spawn_blocking(move || sink.write(level, &message)).await {
            tracing::warn!(path = %self.path.display(), error = %e, "Diagnostic log writer task failed");
        }
    }

    fn write(&self, level: Level, message: &str) {
        // A poisoned lock only means another writer panicked mid-append
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Err(e) = self.append(level, message) {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to write diagnostic log");
        }
    }

    fn append(&self, level: Level, message: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        self.trim()?;

        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(
            file,
            "{}\t{}\t{}",
            Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            level.tag(),
            single_line(message)
        )
    }

    /// Drop the oldest `trim_lines` lines, repeatedly, until the file is back under `max_bytes`.
    fn trim(&self) -> io::Result<()> {
        let size = match fs::metadata(&self.path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        };
        if size <= self.max_bytes {
            return Ok(());
        }

        let contents = fs::read_to_string(&self.path)?;
        let mut lines: Vec<&str> = contents.lines().collect();
        let step = self.trim_lines.max(1);

        loop {
            let remaining = lines.iter().map(|l| l.len() as u64 + 1).sum::<u64>();
            if remaining <= self.max_bytes || lines.is_empty() {
                break;
            }
            lines.drain(..step.min(lines.len()));
        }

        let mut trimmed = lines.join("\n");
        if !trimmed.is_empty() {
            trimmed.push('\n');
        }
        fs::write(&self.path, trimmed)
    }
}

/// Entries are one per line; embedded line breaks would split an entry across trims.
fn single_line(message: &str) -> String {
    message.replace("\r\n", " ").replace(['\r', '\n'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_lines(sink: &DiagnosticSink) -> Vec<String> {
        fs::read_to_string(sink.path())
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_lines_are_tab_separated_with_level() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DiagnosticSink::new(dir.path().join("logs").join("fleetctl.log"), 1024 * 1024, 10);

        sink.write_info("started");
        sink.write_error("smtp unreachable");

        let lines = read_lines(&sink);
        assert_eq!(lines.len(), 2);

        let fields: Vec<_> = lines[0].split('\t').collect();
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[1], "[INFO]");
        assert_eq!(fields[2], "started");
        assert!(lines[1].contains("\t[ERROR]\tsmtp unreachable"));
    }

    #[test]
    fn test_oldest_lines_are_trimmed_past_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DiagnosticSink::new(dir.path().join("fleetctl.log"), 200, 2);

        for i in 0..20 {
            sink.write_info(&format!("entry {i:02}"));
        }

        let size = fs::metadata(sink.path()).unwrap().len();
        let lines = read_lines(&sink);

        // One line may land on top of a file that was just trimmed under the threshold
        assert!(size <= 200 + lines.last().unwrap().len() as u64 + 1);
        assert!(lines.last().unwrap().ends_with("entry 19"));
        assert!(!lines.iter().any(|l| l.ends_with("entry 00")));
    }

    #[test]
    fn test_multi_line_message_stays_one_entry() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DiagnosticSink::new(dir.path().join("fleetctl.log"), 1024 * 1024, 10);

        sink.write_error("error returned from database:\r\nrelation \"event_logs\" does not exist\nHINT: run migrations\r");
        sink.write_info("after");

        let lines = read_lines(&sink);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("error returned from database: relation \"event_logs\" does not exist HINT: run migrations "));
        assert_eq!(lines[0].split('\t').count(), 3);
        assert!(lines[1].ends_with("\t[INFO]\tafter"));
    }

    #[tokio::test]
    async fn test_async_writes_land_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(DiagnosticSink::new(dir.path().join("fleetctl.log"), 1024 * 1024, 10));

        sink.record_info("sweep started".to_string()).await;
        sink.record_error("sweep failed".to_string()).await;

        let lines = read_lines(&sink);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("\t[INFO]\tsweep started"));
        assert!(lines[1].ends_with("\t[ERROR]\tsweep failed"));
    }

    #[test]
    fn test_unwritable_path_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be opened for appending
        let sink = DiagnosticSink::new(dir.path(), 1024, 10);

        sink.write_error("this goes nowhere");
    }
}
