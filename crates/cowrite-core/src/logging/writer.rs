//! Append-only JSONL file per relay instance.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use super::entry::JsonLogEntry;

/// Appends entries to `<logs_dir>/<YYYY-MM-DD>_<instance>.jsonl`
pub struct InstanceLogWriter {
    instance: String,
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl InstanceLogWriter {
    /// Open (or create) today's file for `instance`, creating `logs_dir` if needed
    pub fn new(logs_dir: impl AsRef<Path>, instance: impl Into<String>) -> io::Result<Self> {
        let instance = instance.into();
        let logs_dir = logs_dir.as_ref();
        fs::create_dir_all(logs_dir)?;

        let date = chrono::Local::now().format("%Y-%m-%d");
        let path = logs_dir.join(format!("{}_{}.jsonl", date, instance));

        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            instance,
            writer: Mutex::new(BufWriter::new(file)),
            path,
        })
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write one entry as a single line and flush
    pub fn write(&self, entry: &JsonLogEntry) -> io::Result<()> {
        let line = entry
            .to_json_line()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let mut writer = self.writer.lock();
        writeln!(writer, "{}", line)?;
        writer.flush()
    }

    pub fn flush(&self) -> io::Result<()> {
        self.writer.lock().flush()
    }
}

impl Drop for InstanceLogWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

/// Read every parseable entry from a JSONL file, skipping malformed lines
pub fn read_entries(path: impl AsRef<Path>) -> io::Result<Vec<JsonLogEntry>> {
    let file = File::open(path)?;
    let mut entries = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        if let Ok(entry) = JsonLogEntry::from_json_line(&line) {
            entries.push(entry);
        }
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_writer_appends_lines() {
        let temp = TempDir::new().unwrap();
        let writer = InstanceLogWriter::new(temp.path().join("logs"), "relay-test").unwrap();

        assert!(writer
            .path()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .ends_with("_relay-test.jsonl"));

        writer
            .write(&JsonLogEntry::new("info", "relay-test", "t", "first"))
            .unwrap();
        writer
            .write(&JsonLogEntry::new("warn", "relay-test", "t", "second"))
            .unwrap();

        let entries = read_entries(writer.path()).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].level, "warn");
    }

    #[test]
    fn test_read_entries_skips_garbage() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("mixed.jsonl");
        let good = JsonLogEntry::new("info", "r", "t", "ok").to_json_line().unwrap();
        fs::write(&path, format!("{}\nnot json\n\n{}\n", good, good)).unwrap();

        assert_eq!(read_entries(&path).unwrap().len(), 2);
    }
}
