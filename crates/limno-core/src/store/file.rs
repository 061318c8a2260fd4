//! Append-only reading log on disk
//!
//! The log is a sequence of postcard [`LogFrame`]s, each COBS-framed and
//! terminated by a `0x00` sentinel, so it can be replayed frame by frame:
//!
//! ```text
//! [cobs(frame)] 00 [cobs(frame)] 00 ...
//! ```
//!
//! Opening the store replays the log into memory. Inserts append the whole
//! batch with a single write and cut the file back to its previous length if
//! that write fails. Deletes rewrite the log through a temporary file that is
//! renamed over the live log; the rewritten log starts with a
//! [`LogFrame::NextId`] frame so ids of deleted readings are never handed out
//! again.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::DateTime;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use super::index::ReadingIndex;
use super::{PageRequest, ReadingFilter, ReadingStore, StorageError, StorageResult};
use crate::reading::{ParameterId, Reading, ReadingId, SensorId, StoredReading};

/// COBS frame terminator
const FRAME_SENTINEL: u8 = 0x00;

/// On-disk form of one reading.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ReadingRecord {
    id: u64,
    sensor: String,
    parameter: String,
    value: f64,
    /// Microseconds since the Unix epoch, UTC
    collected_at_us: i64,
}

impl ReadingRecord {
    fn from_stored(row: &StoredReading) -> Self {
        Self {
            id: row.id.0,
            sensor: row.reading.sensor.as_str().to_owned(),
            parameter: row.reading.parameter.as_str().to_owned(),
            value: row.reading.value,
            collected_at_us: row.reading.collected_at.timestamp_micros(),
        }
    }

    fn into_stored(self, offset: usize) -> StorageResult<StoredReading> {
        let collected_at =
            DateTime::from_timestamp_micros(self.collected_at_us).ok_or_else(|| {
                StorageError::Corrupt {
                    offset,
                    reason: format!("timestamp {}us out of range", self.collected_at_us),
                }
            })?;

        Ok(StoredReading::new(
            ReadingId(self.id),
            Reading::new(
                SensorId::new(self.sensor),
                ParameterId::new(self.parameter),
                self.value,
                collected_at,
            ),
        ))
    }
}

/// One entry of the log.
#[derive(Debug, Clone, Serialize, Deserialize)]
enum LogFrame {
    Reading(ReadingRecord),
    /// Lowest id the store may assign next
    NextId(u64),
}

/// Everything recovered from a log file.
struct Replay {
    rows: Vec<StoredReading>,
    next_id_floor: u64,
    /// Length of the prefix made of complete frames
    valid_len: usize,
}

struct LogState {
    index: ReadingIndex,
    file: File,
}

/// Durable store backed by a single append-only log file.
pub struct FileStore {
    path: PathBuf,
    state: RwLock<LogState>,
}

impl FileStore {
    /// Open (or create) the log at `path` and replay it.
    ///
    /// A torn frame at the end of the file (an interrupted append) is
    /// dropped and truncated away; a bad frame anywhere else is an error.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&path)?;

        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;

        let replay = decode_log(&mut bytes)?;
        if replay.valid_len < bytes.len() {
            warn!(
                "Dropping {} bytes of torn record at the end of {}",
                bytes.len() - replay.valid_len,
                path.display()
            );
            file.set_len(replay.valid_len as u64)?;
        }

        info!("Opened {} with {} readings", path.display(), replay.rows.len());

        Ok(Self {
            path,
            state: RwLock::new(LogState {
                index: ReadingIndex::from_rows(replay.rows, replay.next_id_floor),
                file,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Total number of stored readings across all sensors
    pub fn len(&self) -> StorageResult<usize> {
        Ok(self.read()?.index.len())
    }

    pub fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.len()? == 0)
    }

    fn read(&self) -> StorageResult<RwLockReadGuard<'_, LogState>> {
        self.state.read().map_err(|_| StorageError::Poisoned)
    }

    fn write(&self) -> StorageResult<RwLockWriteGuard<'_, LogState>> {
        self.state.write().map_err(|_| StorageError::Poisoned)
    }

    /// Write `rows` to a sibling temp file, then atomically replace the log.
    ///
    /// The append handle for the new log is opened before the rename, so a
    /// failure at any step leaves `state` on the old, still-linked log.
    fn rewrite(
        &self,
        state: &mut LogState,
        rows: &[StoredReading],
        next_id: u64,
    ) -> StorageResult<()> {
        let tmp_path = self.path.with_extension("tmp");
        let mut bytes = postcard::to_allocvec_cobs(&LogFrame::NextId(next_id))?;
        bytes.extend(encode_rows(rows)?);

        {
            let mut tmp = File::create(&tmp_path)?;
            tmp.write_all(&bytes)?;
            tmp.sync_all()?;
        }
        let file = OpenOptions::new().read(true).append(true).open(&tmp_path)?;
        fs::rename(&tmp_path, &self.path)?;

        state.file = file;
        Ok(())
    }
}

impl ReadingStore for FileStore {
    fn insert_readings(&self, batch: &[Reading]) -> StorageResult<Vec<StoredReading>> {
        let mut state = self.write()?;
        let staged = state.index.stage(batch);

        // Encode everything before touching the file so an encoding failure
        // leaves both the log and the index untouched.
        let bytes = encode_rows(&staged)?;
        let appended = append_or_rollback(&mut state.file, |file| {
            file.write_all(&bytes)?;
            file.sync_data()
        });
        if let Err(e) = appended {
            error!("Failed to append {} readings to {}: {}", staged.len(), self.path.display(), e);
            return Err(e.into());
        }

        state.index.commit(&staged);
        debug!("Appended {} readings to {}", staged.len(), self.path.display());
        Ok(staged)
    }

    fn query_readings(
        &self,
        filter: &ReadingFilter,
        page: PageRequest,
    ) -> StorageResult<Vec<StoredReading>> {
        Ok(self.read()?.index.query(filter, page))
    }

    fn count_readings(&self, filter: &ReadingFilter) -> StorageResult<usize> {
        Ok(self.read()?.index.count(filter))
    }

    fn delete_reading(&self, id: ReadingId) -> StorageResult<bool> {
        let mut state = self.write()?;
        if !state.index.rows().iter().any(|row| row.id == id) {
            return Ok(false);
        }

        let remaining: Vec<StoredReading> = state
            .index
            .rows()
            .iter()
            .filter(|row| row.id != id)
            .cloned()
            .collect();
        let next_id = state.index.next_id();
        self.rewrite(&mut state, &remaining, next_id)?;
        state.index.remove(id);

        info!("Deleted reading {} from {}", id, self.path.display());
        Ok(true)
    }

    fn scan_readings(
        &self,
        filter: &ReadingFilter,
        visit: &mut dyn FnMut(&StoredReading),
    ) -> StorageResult<()> {
        let state = self.read()?;
        for row in state.index.matching(filter) {
            visit(row);
        }
        Ok(())
    }
}

/// Run `write` against the end of `file`. If it fails, cut the file back to
/// the length it had before so no partial batch survives.
fn append_or_rollback<F>(file: &mut File, write: F) -> io::Result<()>
where
    F: FnOnce(&mut File) -> io::Result<()>,
{
    let len = file.metadata()?.len();
    if let Err(e) = write(file) {
        if let Err(rollback) = file.set_len(len).and_then(|_| file.sync_data()) {
            error!("Failed to roll back partial append to {} bytes: {}", len, rollback);
        }
        return Err(e);
    }
    Ok(())
}

fn encode_rows(rows: &[StoredReading]) -> StorageResult<Vec<u8>> {
    let mut bytes = Vec::new();
    for row in rows {
        // `to_allocvec_cobs` appends the 0x00 sentinel
        let frame = LogFrame::Reading(ReadingRecord::from_stored(row));
        bytes.extend(postcard::to_allocvec_cobs(&frame)?);
    }
    Ok(bytes)
}

/// Decode every complete frame.
fn decode_log(bytes: &mut [u8]) -> StorageResult<Replay> {
    let mut rows = Vec::new();
    let mut next_id_floor = 1;
    let mut offset = 0;

    for frame in bytes.split_inclusive_mut(|b| *b == FRAME_SENTINEL) {
        if frame.last() != Some(&FRAME_SENTINEL) {
            // Torn tail; everything before it is intact.
            break;
        }

        let frame_len = frame.len();
        let entry: LogFrame =
            postcard::from_bytes_cobs(frame).map_err(|e| StorageError::Corrupt {
                offset,
                reason: e.to_string(),
            })?;
        match entry {
            LogFrame::Reading(record) => rows.push(record.into_stored(offset)?),
            LogFrame::NextId(next_id) => next_id_floor = next_id_floor.max(next_id),
        }
        offset += frame_len;
    }

    Ok(Replay {
        rows,
        next_id_floor,
        valid_len: offset,
    })
}
