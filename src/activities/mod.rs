//! Interface to the hosting crawl-job framework
//!
//! The framework owns document state, version strings, carry-down storage,
//! scheduling and indexing. This crate only talks to it through the
//! [`Activities`] trait, passing plain data values.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use tempfile::NamedTempFile;

/// Dechromed body handed over with a reference
#[derive(Debug)]
pub enum ContentPayload {
    /// A content-bearing reference with nothing in it
    Empty,
    /// Body spooled to a temporary file; deleted when dropped
    File(NamedTempFile),
}

impl ContentPayload {
    /// Open the payload for reading.
    ///
    /// # Errors
    /// Returns an error if the spooled file cannot be reopened.
    pub fn reader(&self) -> std::io::Result<Box<dyn Read + Send>> {
        match self {
            Self::Empty => Ok(Box::new(std::io::empty())),
            Self::File(file) => Ok(Box::new(file.reopen()?)),
        }
    }
}

/// One named carry-down field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarryDown {
    pub name: String,
    pub values: Vec<String>,
}

impl CarryDown {
    pub fn new(name: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

/// A link discovered in a feed
#[derive(Debug)]
pub struct DocumentReference {
    /// Canonical identifier of the linked document
    pub target: String,
    /// Identifier of the feed the link was found in
    pub source: String,
    pub carry_down: Vec<CarryDown>,
    /// Inline body, carried down under the name `data`
    pub content: Option<ContentPayload>,
    /// Publication time in epoch milliseconds
    pub origination_time: Option<i64>,
}

impl DocumentReference {
    /// Values carried down under `name`, if any
    #[must_use]
    pub fn carried(&self, name: &str) -> Option<&[String]> {
        self.carry_down
            .iter()
            .find(|field| field.name == name)
            .map(|field| field.values.as_slice())
    }
}

/// History entry for one fetch, parse or processing step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityRecord {
    pub start_time_ms: i64,
    pub activity: String,
    pub byte_count: Option<u64>,
    pub entity: String,
    pub result_code: String,
    pub result_description: Option<String>,
}

/// Schedule bounds for a document's next rescan, all in epoch milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScheduleBounds {
    pub min_rescan_at: Option<i64>,
    pub max_rescan_at: Option<i64>,
    pub min_expire_at: Option<i64>,
    pub max_expire_at: Option<i64>,
}

/// A document ready for indexing
#[derive(Debug)]
pub struct RepositoryDocument {
    pub fields: BTreeMap<String, Vec<String>>,
    pub acls: Vec<String>,
    pub deny_acls: Vec<String>,
    pub mime_type: Option<String>,
    pub length: u64,
    pub origination_time: Option<i64>,
    pub body: File,
}

impl RepositoryDocument {
    pub fn add_field(&mut self, name: &str, values: Vec<String>) {
        if !values.is_empty() {
            self.fields.entry(name.to_string()).or_default().extend(values);
        }
    }
}

/// Callbacks into the crawl-job framework
///
/// Implementations must be usable from many tasks at once.
pub trait Activities: Send + Sync {
    /// `false` once the job has been stopped; long reads poll this.
    fn check_job_still_active(&self) -> bool;

    fn retrieve_parent_data(&self, document_id: &str, name: &str) -> Vec<String>;

    /// Carried-down payloads stored under `name`, one reader per parent.
    ///
    /// # Errors
    /// Returns an error if stored payloads cannot be opened.
    fn retrieve_parent_data_as_files(
        &self,
        document_id: &str,
        name: &str,
    ) -> anyhow::Result<Vec<Box<dyn Read + Send>>>;

    /// # Errors
    /// Returns an error if the framework cannot queue the reference.
    fn add_document_reference(&self, reference: DocumentReference) -> anyhow::Result<()>;

    fn set_document_schedule_bounds(&self, document_id: &str, bounds: ScheduleBounds);

    fn record_activity(&self, record: ActivityRecord);

    fn check_mime_type_indexable(&self, mime_type: &str) -> bool;

    fn check_length_indexable(&self, length: u64) -> bool;

    fn check_url_indexable(&self, url: &str) -> bool;

    fn check_document_needs_reindexing(&self, document_id: &str, version: &str) -> bool;

    /// # Errors
    /// Returns an error if the document cannot be handed to the index.
    fn ingest_document(
        &self,
        document_id: &str,
        version: &str,
        url: &str,
        document: RepositoryDocument,
    ) -> anyhow::Result<()>;

    /// Record that `document_id` exists at `version` but produces no index entry.
    ///
    /// # Errors
    /// Returns an error if the framework rejects the update.
    fn no_document(&self, document_id: &str, version: &str) -> anyhow::Result<()>;

    /// Record `version` for a document that is tracked but never indexed.
    ///
    /// # Errors
    /// Returns an error if the framework rejects the update.
    fn record_document(&self, document_id: &str, version: &str) -> anyhow::Result<()>;

    /// # Errors
    /// Returns an error if the framework rejects the deletion.
    fn delete_document(&self, document_id: &str) -> anyhow::Result<()>;
}

#[cfg(test)]
pub(crate) mod recording {
    //! In-memory [`Activities`] used by unit tests.

    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    pub(crate) struct RecordingActivities {
        pub references: Mutex<Vec<DocumentReference>>,
        pub bounds: Mutex<Vec<(String, ScheduleBounds)>>,
        pub records: Mutex<Vec<ActivityRecord>>,
    }

    impl Activities for RecordingActivities {
        fn check_job_still_active(&self) -> bool {
            true
        }

        fn retrieve_parent_data(&self, _document_id: &str, _name: &str) -> Vec<String> {
            Vec::new()
        }

        fn retrieve_parent_data_as_files(
            &self,
            _document_id: &str,
            _name: &str,
        ) -> anyhow::Result<Vec<Box<dyn Read + Send>>> {
            Ok(Vec::new())
        }

        fn add_document_reference(&self, reference: DocumentReference) -> anyhow::Result<()> {
            self.references.lock().push(reference);
            Ok(())
        }

        fn set_document_schedule_bounds(&self, document_id: &str, bounds: ScheduleBounds) {
            self.bounds.lock().push((document_id.to_string(), bounds));
        }

        fn record_activity(&self, record: ActivityRecord) {
            self.records.lock().push(record);
        }

        fn check_mime_type_indexable(&self, _mime_type: &str) -> bool {
            true
        }

        fn check_length_indexable(&self, _length: u64) -> bool {
            true
        }

        fn check_url_indexable(&self, _url: &str) -> bool {
            true
        }

        fn check_document_needs_reindexing(&self, _document_id: &str, _version: &str) -> bool {
            true
        }

        fn ingest_document(
            &self,
            _document_id: &str,
            _version: &str,
            _url: &str,
            _document: RepositoryDocument,
        ) -> anyhow::Result<()> {
            Ok(())
        }

        fn no_document(&self, _document_id: &str, _version: &str) -> anyhow::Result<()> {
            Ok(())
        }

        fn record_document(&self, _document_id: &str, _version: &str) -> anyhow::Result<()> {
            Ok(())
        }

        fn delete_document(&self, _document_id: &str) -> anyhow::Result<()> {
            Ok(())
        }
    }
}
