//! Per-document spool of fetched bodies
//!
//! A body is written to a temp file as it is read, while its length and a
//! rolling checksum are computed. The entry lives until the document has
//! been processed and is then deleted.

use dashmap::DashMap;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use super::errors::{ConnectorError, ConnectorResult};
use crate::activities::Activities;
use crate::fetch::{FetchError, ThrottledBody};
use crate::utils::{DATA_FAIL_AFTER_MS, DATA_RETRY_MS, READ_CHUNK_LENGTH, now_millis};

const CACHE_FILE_PREFIX: &str = "_rsscache_";

/// Fold one byte into a running checksum.
///
/// The byte is taken as signed, and `>>` keeps the sign.
#[must_use]
pub fn checksum_step(checksum: i64, byte: u8) -> i64 {
    let value = i64::from(byte as i8);
    (checksum << 5) ^ (checksum >> 3) ^ (value << 2) ^ (value >> 3)
}

#[derive(Debug)]
struct CacheEntry {
    file: NamedTempFile,
    length: u64,
    content_type: Option<String>,
}

/// A body being written to disk
struct Spool {
    writer: BufWriter<NamedTempFile>,
    length: u64,
    checksum: i64,
}

impl Spool {
    fn create(dir: Option<&Path>) -> std::io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(CACHE_FILE_PREFIX).suffix("tmp");
        let file = match dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        Ok(Self {
            writer: BufWriter::new(file),
            length: 0,
            checksum: 0,
        })
    }

    fn write(&mut self, chunk: &[u8]) -> std::io::Result<()> {
        self.writer.write_all(chunk)?;
        self.length += chunk.len() as u64;
        self.checksum = chunk.iter().fold(self.checksum, |cs, b| checksum_step(cs, *b));
        Ok(())
    }

    fn finish(self) -> std::io::Result<(NamedTempFile, u64, i64)> {
        let file = self.writer.into_inner().map_err(|e| e.into_error())?;
        Ok((file, self.length, self.checksum))
    }
}

fn read_failure(document_id: &str, detail: &str) -> ConnectorError {
    let now = now_millis();
    ConnectorError::ServiceInterruption {
        message: format!("Failed to read data for '{document_id}': {detail}"),
        retry_at_ms: now + DATA_RETRY_MS,
        fail_at_ms: Some(now + DATA_FAIL_AFTER_MS),
    }
}

/// Spooled bodies keyed by document identifier
#[derive(Debug, Default)]
pub struct DataCache {
    dir: Option<PathBuf>,
    entries: DashMap<String, CacheEntry>,
}

impl DataCache {
    /// # Arguments
    /// * `dir` - Spool directory; the system temp directory when `None`
    #[must_use]
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self {
            dir,
            entries: DashMap::new(),
        }
    }

    /// Spool a fetched body.
    ///
    /// # Returns
    /// The body checksum.
    ///
    /// # Errors
    /// `Interrupted` if the job stops while reading; a read or write
    /// failure is a service interruption retried in five minutes.
    pub async fn add_body(
        &self,
        document_id: &str,
        content_type: Option<String>,
        body: &mut ThrottledBody,
        activities: &dyn Activities,
    ) -> ConnectorResult<i64> {
        let mut spool =
            Spool::create(self.dir.as_deref()).map_err(|e| read_failure(document_id, &e.to_string()))?;
        loop {
            if !activities.check_job_still_active() {
                return Err(ConnectorError::Interrupted);
            }
            let chunk = match body.next_chunk().await {
                Ok(Some(chunk)) => chunk,
                Ok(None) => break,
                Err(FetchError::Interrupted) => return Err(ConnectorError::Interrupted),
                Err(error @ FetchError::ServiceInterruption { .. }) => return Err(error.into()),
                Err(error) => return Err(read_failure(document_id, &error.to_string())),
            };
            spool
                .write(&chunk)
                .map_err(|e| read_failure(document_id, &e.to_string()))?;
        }
        self.store(document_id, content_type, spool)
    }

    /// Spool a carried-down body.
    ///
    /// # Errors
    /// See [`DataCache::add_body`].
    pub fn add_reader(
        &self,
        document_id: &str,
        content_type: Option<String>,
        mut reader: impl Read,
        activities: &dyn Activities,
    ) -> ConnectorResult<i64> {
        let mut spool =
            Spool::create(self.dir.as_deref()).map_err(|e| read_failure(document_id, &e.to_string()))?;
        let mut buffer = vec![0u8; READ_CHUNK_LENGTH];
        loop {
            if !activities.check_job_still_active() {
                return Err(ConnectorError::Interrupted);
            }
            let count = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(count) => count,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(read_failure(document_id, &e.to_string())),
            };
            spool
                .write(&buffer[..count])
                .map_err(|e| read_failure(document_id, &e.to_string()))?;
        }
        self.store(document_id, content_type, spool)
    }

    fn store(
        &self,
        document_id: &str,
        content_type: Option<String>,
        spool: Spool,
    ) -> ConnectorResult<i64> {
        let (file, length, checksum) = spool
            .finish()
            .map_err(|e| read_failure(document_id, &e.to_string()))?;
        self.entries.insert(
            document_id.to_string(),
            CacheEntry {
                file,
                length,
                content_type,
            },
        );
        Ok(checksum)
    }

    #[must_use]
    pub fn length(&self, document_id: &str) -> Option<u64> {
        self.entries.get(document_id).map(|entry| entry.length)
    }

    #[must_use]
    pub fn content_type(&self, document_id: &str) -> Option<String> {
        self.entries
            .get(document_id)
            .and_then(|entry| entry.content_type.clone())
    }

    /// Open the spooled body for reading, if there is one.
    ///
    /// # Errors
    /// Returns an error if the spool file cannot be reopened.
    pub fn open(&self, document_id: &str) -> std::io::Result<Option<File>> {
        self.entries
            .get(document_id)
            .map(|entry| entry.file.reopen())
            .transpose()
    }

    /// Remove the entry and its file.
    pub fn delete(&self, document_id: &str) {
        if self.entries.remove(document_id).is_some() {
            log::debug!("Removed cached data for '{document_id}'");
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
