//! Append-only durable event log.
//!
//! Layout under the event data directory:
//! - `events.jsonl`: one serialized [`EventRecord`] per line
//! - `cursor`: decimal byte offset of the first unconsumed line
//!
//! Appends are fsynced before they return. A single consumer reads lines in
//! append order through a [`LogReader`] and commits past each one once it
//! reached a terminal outcome. When the cursor catches up with the end of the
//! file the log is truncated, so disk usage only grows with the backlog.

use crate::{OutboxError, OutboxResult};
use beacon_core::EventRecord;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

/// Log file name inside the event data directory.
pub const LOG_FILE_NAME: &str = "events.jsonl";

/// Cursor file name inside the event data directory.
pub const CURSOR_FILE_NAME: &str = "cursor";

/// One line of the log, decoded.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredRecord {
    Valid(EventRecord),
    /// The line could not be decoded. The consumer skips it.
    Invalid { reason: String },
}

impl StoredRecord {
    /// Decode one line. Never fails; garbage becomes [`StoredRecord::Invalid`].
    pub fn decode(line: &[u8]) -> Self {
        let text = match std::str::from_utf8(line) {
            Ok(text) => text,
            Err(e) => {
                return StoredRecord::Invalid {
                    reason: e.to_string(),
                }
            }
        };

        match EventRecord::from_json_line(text) {
            Ok(record) => StoredRecord::Valid(record),
            Err(e) => StoredRecord::Invalid {
                reason: e.to_string(),
            },
        }
    }
}

/// A decoded line and the offset just past it.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub record: StoredRecord,
    pub next_offset: u64,
}

struct LogState {
    file: File,
    cursor: u64,
    /// The cursor file lags `cursor` after a failed write.
    cursor_stale: bool,
}

/// The durable queue.
pub struct EventLog {
    log_path: PathBuf,
    cursor_path: PathBuf,
    state: Mutex<LogState>,
    /// Lines at or after the cursor.
    pending: AtomicUsize,
    appended: Notify,
}

impl EventLog {
    /// Open (or create) the log in `dir`.
    ///
    /// A trailing line without a newline, left by a crash mid-append, is
    /// sealed so it reads back as one corrupt record.
    pub fn open(dir: impl AsRef<Path>) -> OutboxResult<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let log_path = dir.join(LOG_FILE_NAME);
        let cursor_path = dir.join(CURSOR_FILE_NAME);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(&log_path)?;
        let len = seal_torn_tail(&mut file)?;

        let mut cursor = match read_cursor(&cursor_path) {
            Ok(cursor) => cursor,
            Err(OutboxError::CorruptCursor(raw)) => {
                warn!(cursor = %raw, "Unreadable cursor, replaying log from the start");
                0
            }
            Err(e) => return Err(e),
        };
        if cursor > len {
            warn!(cursor, len, "Cursor past end of log, replaying log from the start");
            cursor = 0;
        }

        let pending = count_lines_from(&log_path, cursor)?;

        info!(
            path = %log_path.display(),
            cursor,
            pending,
            "Durable event log opened"
        );

        Ok(Self {
            log_path,
            cursor_path,
            state: Mutex::new(LogState {
                file,
                cursor,
                cursor_stale: false,
            }),
            pending: AtomicUsize::new(pending),
            appended: Notify::new(),
        })
    }

    /// Append one record and fsync it.
    pub fn append(&self, record: &EventRecord) -> OutboxResult<()> {
        let mut line = record.to_json_line()?;
        line.push('\n');

        {
            let mut state = self.state.lock();
            if state.cursor_stale {
                self.persist_cursor(&mut state);
            }
            state.file.write_all(line.as_bytes())?;
            state.file.sync_data()?;
            self.pending.fetch_add(1, Ordering::SeqCst);
        }

        self.appended.notify_one();
        Ok(())
    }

    /// Move the cursor past a consumed line.
    ///
    /// Returns `true` when this drained the log and it was truncated; the
    /// caller must [`rewind`](LogReader::rewind) its reader.
    pub fn commit(&self, next_offset: u64) -> OutboxResult<bool> {
        let mut state = self.state.lock();
        let _ = self
            .pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                Some(n.saturating_sub(1))
            });

        let len = state.file.metadata()?.len();
        if next_offset < len {
            state.cursor = next_offset;
            state.cursor_stale = true;
            write_cursor(&self.cursor_path, next_offset)?;
            state.cursor_stale = false;
            return Ok(false);
        }

        // Truncate before resetting the cursor: a crash in between leaves
        // a cursor past EOF, which `open` treats as an empty backlog.
        state.file.set_len(0)?;
        state.cursor = 0;
        state.cursor_stale = true;
        self.pending.store(0, Ordering::SeqCst);

        if let Err(e) = state.file.sync_all() {
            warn!(error = %e, "Failed to sync compacted durable log");
        }
        self.persist_cursor(&mut state);
        debug!("Durable log drained and compacted");
        Ok(true)
    }

    /// Write the in-memory cursor out. Failures are logged and retried on
    /// the next append, before new lines can pass the stale offset.
    fn persist_cursor(&self, state: &mut LogState) {
        match write_cursor(&self.cursor_path, state.cursor) {
            Ok(()) => state.cursor_stale = false,
            Err(e) => warn!(
                cursor = state.cursor,
                error = %e,
                "Failed to persist durable log cursor"
            ),
        }
    }

    /// Reader positioned at the committed cursor.
    pub fn reader(&self) -> OutboxResult<LogReader> {
        let cursor = self.state.lock().cursor;
        LogReader::open(&self.log_path, cursor)
    }

    /// Every unconsumed line, without consuming it.
    pub fn snapshot(&self) -> OutboxResult<Vec<StoredRecord>> {
        let mut reader = self.reader()?;
        let mut records = Vec::new();
        while let Some(entry) = reader.next_entry()? {
            records.push(entry.record);
        }
        Ok(records)
    }

    /// Number of unconsumed lines, including the one being delivered.
    pub fn backlog(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Committed byte offset.
    pub fn cursor(&self) -> u64 {
        self.state.lock().cursor
    }

    pub fn path(&self) -> &Path {
        &self.log_path
    }

    /// Resolves after the next append.
    pub async fn wait_for_append(&self) {
        self.appended.notified().await;
    }
}

/// Sequential reader over the log. Owned by the consumer.
pub struct LogReader {
    reader: BufReader<File>,
    offset: u64,
}

impl LogReader {
    fn open(path: &Path, offset: u64) -> OutboxResult<Self> {
        let mut file = File::open(path)?;
        file.seek(SeekFrom::Start(offset))?;
        Ok(Self {
            reader: BufReader::new(file),
            offset,
        })
    }

    /// Next complete line, or `None` at the end of the log.
    pub fn next_entry(&mut self) -> OutboxResult<Option<LogEntry>> {
        let len = self.reader.get_ref().metadata()?.len();
        if len < self.offset {
            warn!(offset = self.offset, len, "Durable log shrank under reader, rewinding");
            self.rewind()?;
        }

        let mut line = Vec::new();
        let read = self.reader.read_until(b'\n', &mut line)?;
        if read == 0 {
            return Ok(None);
        }

        if line.last() != Some(&b'\n') {
            // An append is in flight; retry from the same offset later.
            self.reader.seek(SeekFrom::Start(self.offset))?;
            return Ok(None);
        }

        self.offset += read as u64;
        Ok(Some(LogEntry {
            record: StoredRecord::decode(&line),
            next_offset: self.offset,
        }))
    }

    /// Restart from the beginning after compaction.
    pub fn rewind(&mut self) -> OutboxResult<()> {
        self.reader.seek(SeekFrom::Start(0))?;
        self.offset = 0;
        Ok(())
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }
}

fn seal_torn_tail(file: &mut File) -> io::Result<u64> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(0);
    }

    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    if last[0] == b'\n' {
        return Ok(len);
    }

    warn!(len, "Sealing torn record at end of durable log");
    file.write_all(b"\n")?;
    file.sync_data()?;
    Ok(len + 1)
}

fn count_lines_from(path: &Path, offset: u64) -> io::Result<usize> {
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(offset))?;

    let mut reader = BufReader::new(file);
    let mut count = 0;
    loop {
        let buf = reader.fill_buf()?;
        if buf.is_empty() {
            break;
        }
        count += buf.iter().filter(|b| **b == b'\n').count();
        let consumed = buf.len();
        reader.consume(consumed);
    }
    Ok(count)
}

fn read_cursor(path: &Path) -> OutboxResult<u64> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };

    let raw = raw.trim();
    raw.parse()
        .map_err(|_| OutboxError::CorruptCursor(raw.to_string()))
}

/// Replace the cursor file atomically: tmp file, fsync, rename, fsync dir.
fn write_cursor(path: &Path, offset: u64) -> io::Result<()> {
    let tmp_path = path.with_extension("tmp");

    let result = (|| -> io::Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)?;
        file.write_all(offset.to_string().as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)?;

        if let Some(dir) = path.parent() {
            if let Ok(dir) = File::open(dir) {
                let _ = dir.sync_all();
            }
        }
        Ok(())
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}
