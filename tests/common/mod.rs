//! Test utilities shared by the feedscrape integration tests

use futures::future::BoxFuture;
use kodegen_tools_feedscrape::activities::{
    Activities, ActivityRecord, DocumentReference, RepositoryDocument, ScheduleBounds,
};
use kodegen_tools_feedscrape::fetch::{
    Transport, TransportError, TransportErrorKind, TransportRequest, TransportResponse,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::Read;
use std::sync::{Arc, Once};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

static INIT: Once = Once::new();

/// Route `log` and `tracing` output to the test harness.
#[allow(dead_code)]
pub fn init_logging() {
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// A document handed to `ingest_document`, with its body read back
#[allow(dead_code)]
#[derive(Debug)]
pub struct Ingested {
    pub document_id: String,
    pub version: String,
    pub url: String,
    pub body: String,
    pub document: RepositoryDocument,
}

/// In-memory crawl-job framework
#[allow(dead_code)]
#[derive(Default)]
pub struct TestActivities {
    pub parent_data: Mutex<HashMap<(String, String), Vec<String>>>,
    pub parent_files: Mutex<HashMap<String, Vec<Vec<u8>>>>,
    pub references: Mutex<Vec<DocumentReference>>,
    pub bounds: Mutex<Vec<(String, ScheduleBounds)>>,
    pub records: Mutex<Vec<ActivityRecord>>,
    pub ingested: Mutex<Vec<Ingested>>,
    pub recorded: Mutex<Vec<(String, String)>>,
    pub no_documents: Mutex<Vec<String>>,
    pub deleted: Mutex<Vec<String>>,
    pub max_length: Option<u64>,
    pub stopped: bool,
    pub refuse_references: bool,
}

#[allow(dead_code)]
impl TestActivities {
    pub fn with_parent_data(self, document_id: &str, name: &str, values: &[&str]) -> Self {
        self.parent_data.lock().insert(
            (document_id.to_string(), name.to_string()),
            values.iter().map(|v| (*v).to_string()).collect(),
        );
        self
    }

    pub fn with_parent_file(self, document_id: &str, body: &str) -> Self {
        self.parent_files
            .lock()
            .entry(document_id.to_string())
            .or_default()
            .push(body.as_bytes().to_vec());
        self
    }

    pub fn targets(&self) -> Vec<String> {
        self.references
            .lock()
            .iter()
            .map(|reference| reference.target.clone())
            .collect()
    }

    pub fn result_codes(&self, activity: &str) -> Vec<String> {
        self.records
            .lock()
            .iter()
            .filter(|record| record.activity == activity)
            .map(|record| record.result_code.clone())
            .collect()
    }
}

impl Activities for TestActivities {
    fn check_job_still_active(&self) -> bool {
        !self.stopped
    }

    fn retrieve_parent_data(&self, document_id: &str, name: &str) -> Vec<String> {
        self.parent_data
            .lock()
            .get(&(document_id.to_string(), name.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    fn retrieve_parent_data_as_files(
        &self,
        document_id: &str,
        _name: &str,
    ) -> anyhow::Result<Vec<Box<dyn Read + Send>>> {
        Ok(self
            .parent_files
            .lock()
            .get(document_id)
            .map(|bodies| {
                bodies
                    .iter()
                    .map(|body| Box::new(std::io::Cursor::new(body.clone())) as Box<dyn Read + Send>)
                    .collect()
            })
            .unwrap_or_default())
    }

    fn add_document_reference(&self, reference: DocumentReference) -> anyhow::Result<()> {
        if self.refuse_references {
            anyhow::bail!("reference to '{}' refused", reference.target);
        }
        self.references.lock().push(reference);
        Ok(())
    }

    fn set_document_schedule_bounds(&self, document_id: &str, bounds: ScheduleBounds) {
        self.bounds.lock().push((document_id.to_string(), bounds));
    }

    fn record_activity(&self, record: ActivityRecord) {
        self.records.lock().push(record);
    }

    fn check_mime_type_indexable(&self, mime_type: &str) -> bool {
        mime_type.starts_with("text/")
    }

    fn check_length_indexable(&self, length: u64) -> bool {
        self.max_length.is_none_or(|max| length <= max)
    }

    fn check_url_indexable(&self, _url: &str) -> bool {
        true
    }

    fn check_document_needs_reindexing(&self, _document_id: &str, _version: &str) -> bool {
        true
    }

    fn ingest_document(
        &self,
        document_id: &str,
        version: &str,
        url: &str,
        mut document: RepositoryDocument,
    ) -> anyhow::Result<()> {
        let mut body = String::new();
        document.body.read_to_string(&mut body)?;
        self.ingested.lock().push(Ingested {
            document_id: document_id.to_string(),
            version: version.to_string(),
            url: url.to_string(),
            body,
            document,
        });
        Ok(())
    }

    fn no_document(&self, document_id: &str, _version: &str) -> anyhow::Result<()> {
        self.no_documents.lock().push(document_id.to_string());
        Ok(())
    }

    fn record_document(&self, document_id: &str, version: &str) -> anyhow::Result<()> {
        self.recorded
            .lock()
            .push((document_id.to_string(), version.to_string()));
        Ok(())
    }

    fn delete_document(&self, document_id: &str) -> anyhow::Result<()> {
        self.deleted.lock().push(document_id.to_string());
        Ok(())
    }
}

/// A canned response
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct Scripted {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub delay: Duration,
}

#[allow(dead_code)]
impl Scripted {
    pub fn ok(content_type: &str, body: &str) -> Self {
        Self {
            status: 200,
            headers: vec![("content-type".to_string(), content_type.to_string())],
            body: body.as_bytes().to_vec(),
            delay: Duration::ZERO,
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// [`Transport`] answering from a URL table; unknown URLs get a 404.
///
/// Clones share their routes and counters.
#[allow(dead_code)]
#[derive(Debug, Default, Clone)]
pub struct ScriptedTransport {
    pub routes: Arc<Mutex<HashMap<String, Scripted>>>,
    pub requests: Arc<Mutex<Vec<String>>>,
    pub in_flight: Arc<AtomicUsize>,
    pub peak_in_flight: Arc<AtomicUsize>,
}

#[allow(dead_code)]
impl ScriptedTransport {
    pub fn route(self, url: &str, response: Scripted) -> Self {
        self.routes.lock().insert(url.to_string(), response);
        self
    }

    pub fn count(&self, url: &str) -> usize {
        self.requests.lock().iter().filter(|u| *u == url).count()
    }
}

impl Transport for ScriptedTransport {
    fn execute(
        &self,
        request: TransportRequest,
    ) -> BoxFuture<'static, Result<TransportResponse, TransportError>> {
        let this = self.clone();
        Box::pin(async move {
            this.requests.lock().push(request.url.clone());
            let response = this
                .routes
                .lock()
                .get(&request.url)
                .cloned()
                .unwrap_or_else(|| Scripted::status(404));

            let now = this.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            this.peak_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(response.delay).await;
            this.in_flight.fetch_sub(1, Ordering::SeqCst);

            if response.status == 0 {
                return Err(TransportError::new(
                    TransportErrorKind::Other,
                    "scripted failure",
                ));
            }
            let chunks: Vec<Result<Vec<u8>, TransportError>> = response
                .body
                .chunks(1024)
                .map(|chunk| Ok(chunk.to_vec()))
                .collect();
            Ok(TransportResponse {
                status: response.status,
                headers: response.headers,
                body: Box::pin(futures::stream::iter(chunks)),
            })
        })
    }
}
