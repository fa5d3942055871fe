//! The append-only record log.
//!
//! Records are stored back to back in a single `log` file and addressed by
//! `(offset, length)`. Appends go through one writer handle under a lock
//! and are fsynced before the offset is handed out, so a returned offset
//! always resolves to an intact record after a crash. Reads are positioned
//! and lock-free against a separate read-only handle.

use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use crate::error::{DbError, Result};

#[cfg(unix)]
use std::os::unix::fs::FileExt;

pub const LOG_FILE_NAME: &str = "log";

struct LogWriter {
    file: File,
    end: u64,
}

/// The on-disk record log.
pub struct RecordLog {
    writer: Mutex<LogWriter>,
    reader: File,
}

impl RecordLog {
    /// Open (or create) the log file inside `dir`.
    pub fn open(dir: &Path) -> Result<Self> {
        let path = dir.join(LOG_FILE_NAME);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        let end = file.metadata()?.len();
        let reader = File::open(&path)?;
        tracing::debug!(path = %path.display(), size = end, "opened record log");
        Ok(Self {
            writer: Mutex::new(LogWriter { file, end }),
            reader,
        })
    }

    /// Append a serialized record, returning its `(offset, length)`.
    ///
    /// Durable on return: the write is flushed to the device before the
    /// offset escapes.
    pub fn append(&self, bytes: &[u8]) -> Result<(u64, u32)> {
        let mut w = self.writer.lock();
        let offset = w.end;
        w.file.write_all(bytes)?;
        w.file.sync_data()?;
        w.end += bytes.len() as u64;
        Ok((offset, bytes.len() as u32))
    }

    /// Current end-of-log offset.
    pub fn len(&self) -> u64 {
        self.writer.lock().end
    }

    /// True when no records have been appended.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read `length` bytes at `offset`.
    pub fn read(&self, offset: u64, length: u32) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; length as usize];
        self.read_into(offset, &mut buf)?;
        Ok(buf)
    }

    /// Read into a caller-provided buffer.
    pub fn read_into(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        #[cfg(unix)]
        {
            self.reader
                .read_exact_at(buf, offset)
                .map_err(|_| DbError::CorruptStored { offset })?;
        }
        #[cfg(not(unix))]
        {
            use std::io::{Read, Seek, SeekFrom};
            let mut f = self.reader.try_clone()?;
            f.seek(SeekFrom::Start(offset))?;
            f.read_exact(buf)
                .map_err(|_| DbError::CorruptStored { offset })?;
        }
        Ok(())
    }

    /// Read the entire log; used to rebuild the in-memory graph on open.
    pub fn read_all(&self) -> Result<Vec<u8>> {
        let end = self.len() as usize;
        let mut buf = vec![0u8; end];
        if end > 0 {
            self.read_into(0, &mut buf)?;
        }
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let log = RecordLog::open(dir.path()).unwrap();
        assert!(log.is_empty());

        let (o1, l1) = log.append(b"first record").unwrap();
        let (o2, l2) = log.append(b"second").unwrap();
        assert_eq!(o1, 0);
        assert_eq!(o2, l1 as u64);

        assert_eq!(log.read(o1, l1).unwrap(), b"first record");
        assert_eq!(log.read(o2, l2).unwrap(), b"second");
    }

    #[test]
    fn test_offsets_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let (o, l);
        {
            let log = RecordLog::open(dir.path()).unwrap();
            (o, l) = log.append(b"durable bytes").unwrap();
        }
        let log = RecordLog::open(dir.path()).unwrap();
        assert_eq!(log.read(o, l).unwrap(), b"durable bytes");
        let (o2, _) = log.append(b"more").unwrap();
        assert_eq!(o2, l as u64);
    }

    #[test]
    fn test_read_past_end_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let log = RecordLog::open(dir.path()).unwrap();
        log.append(b"abc").unwrap();
        assert!(log.read(0, 64).is_err());
    }
}
