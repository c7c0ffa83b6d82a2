use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use tidelog_types::LogEntry;

use crate::error::{StreamError, StreamResult};

/// When appended records are forced to stable storage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// `fsync` after every append.
    EveryWrite,
    /// Flush to the OS after every append and let the page cache decide.
    #[default]
    OsDefault,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalConfig {
    pub sync_mode: SyncMode,
}

/// Record prefix: payload length then payload CRC32, both little-endian u32.
const FRAME_PREFIX: u64 = 8;

struct Tail {
    writer: BufWriter<File>,
    /// End of the last record written or recovered.
    end: u64,
}

/// Append-only file of [`LogEntry`] records, each framed as
/// `[len u32 LE][crc32 u32 LE][bincode LogEntry]`.
///
/// Opening the log scans it once. Only the final record can be incomplete
/// (a write interrupted by a crash); it is cut off so the next append starts
/// right after the last intact record. A bad record anywhere else fails the
/// open with [`StreamError::Corrupt`].
pub struct WriteAheadLog {
    path: PathBuf,
    tail: Mutex<Tail>,
    config: WalConfig,
}

impl WriteAheadLog {
    /// Open or create the log at `path`, returning it with every intact entry
    /// in write order.
    pub fn open(path: &Path, config: WalConfig) -> StreamResult<(Self, Vec<LogEntry>)> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(path)?;

        let file_len = file.metadata()?.len();
        let (entries, end) = scan(&file, file_len)?;
        if end < file_len {
            info!(path = %path.display(), end, dropped = file_len - end, "cutting torn WAL tail");
            file.set_len(end)?;
            file.sync_all()?;
        }
        file.seek(SeekFrom::Start(end))?;

        debug!(path = %path.display(), records = entries.len(), end, "WAL opened");
        let wal = Self {
            path: path.to_path_buf(),
            tail: Mutex::new(Tail {
                writer: BufWriter::new(file),
                end,
            }),
            config,
        };
        Ok((wal, entries))
    }

    /// Append one entry. Returns the offset its record starts at.
    pub fn append(&self, entry: &LogEntry) -> StreamResult<u64> {
        let payload =
            bincode::serialize(entry).map_err(|e| StreamError::Serialization(e.to_string()))?;
        let len = u32::try_from(payload.len())
            .map_err(|_| StreamError::Serialization(format!("record of {} bytes", payload.len())))?;

        let mut frame = Vec::with_capacity(FRAME_PREFIX as usize + payload.len());
        frame.extend_from_slice(&len.to_le_bytes());
        frame.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
        frame.extend_from_slice(&payload);

        let mut tail = self.tail.lock().expect("WAL mutex poisoned");
        let start = tail.end;
        tail.writer.write_all(&frame)?;
        tail.writer.flush()?;
        if self.config.sync_mode == SyncMode::EveryWrite {
            tail.writer.get_ref().sync_data()?;
        }
        tail.end += frame.len() as u64;

        debug!(offset = start, len, seq = %entry.sequence, "WAL append");
        Ok(start)
    }

    /// End of the last record.
    pub fn offset(&self) -> u64 {
        self.tail.lock().expect("WAL mutex poisoned").end
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Read records from the start of `file`. Returns the decoded entries and the
/// offset just past the last intact record.
fn scan(file: &File, file_len: u64) -> StreamResult<(Vec<LogEntry>, u64)> {
    let mut reader = BufReader::new(file);
    let mut entries = Vec::new();
    let mut at = 0u64;

    while at < file_len {
        if file_len - at < FRAME_PREFIX {
            warn!(offset = at, "WAL ends inside a record prefix");
            break;
        }
        let mut prefix = [0u8; FRAME_PREFIX as usize];
        reader.read_exact(&mut prefix)?;
        let [l0, l1, l2, l3, c0, c1, c2, c3] = prefix;
        let len = u32::from_le_bytes([l0, l1, l2, l3]);
        let crc = u32::from_le_bytes([c0, c1, c2, c3]);

        let next = at + FRAME_PREFIX + u64::from(len);
        if next > file_len {
            warn!(offset = at, len, file_len, "WAL ends inside a record payload");
            break;
        }
        let mut payload = vec![0u8; len as usize];
        reader.read_exact(&mut payload)?;

        if len == 0 || crc32fast::hash(&payload) != crc {
            if next == file_len {
                warn!(offset = at, "last WAL record fails its checksum");
                break;
            }
            return Err(StreamError::Corrupt {
                offset: at,
                reason: "checksum mismatch".into(),
            });
        }
        let entry = bincode::deserialize::<LogEntry>(&payload).map_err(|e| StreamError::Corrupt {
            offset: at,
            reason: e.to_string(),
        })?;
        entries.push(entry);
        at = next;
    }

    Ok((entries, at))
}
