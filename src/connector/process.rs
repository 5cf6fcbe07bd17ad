//! Document processing: decide a version, then index or parse
//!
//! A document is either a feed (a seed served as XML) or a page linked
//! from one. Pages get a `+` version and are ingested; feeds get a `-`
//! version and are parsed for more links.

use std::io::BufReader;
use std::time::Duration;
use url::{Position, Url};

use super::content_type::{effective_content_type, is_xml_content_type};
use super::core::{ExistingVersions, FeedConnector};
use super::errors::{ConnectorError, ConnectorResult};
use super::version::{CarriedMetadata, document_version, feed_version};
use crate::activities::{Activities, ActivityRecord, RepositoryDocument};
use crate::config::RobotsUsage;
use crate::feed::FeedParser;
use crate::feed::dates::format_iso_minutes;
use crate::fetch::{FETCH_ROBOTS_EXCLUSION, FetchConnection, FetchStatus};
use crate::filter::{ChromedMode, FilterSpec, Specification};
use crate::utils::{
    ACTIVITY_FETCH, ACTIVITY_PROCESS, CARRY_DOWN_DATA, DEFAULT_AUTHORITY_DENY_TOKEN,
    FETCH_TYPE_DATA, RESULT_EXCLUDED_LENGTH, RESULT_EXCLUDED_MIMETYPE, RESULT_EXCLUDED_URL,
    RESULT_INGEST_ERROR, RESULT_OK, now_millis,
};

/// Content type assumed for bodies carried down from a feed
const CARRIED_CONTENT_TYPE: &str = "text/html";

/// What a document turned out to be once its version is known
enum Role {
    Feed,
    Document {
        ingest_url: String,
        metadata: CarriedMetadata,
    },
}

struct Versioned {
    version: String,
    role: Role,
}

impl Versioned {
    fn feed(version: String) -> Self {
        Self {
            version,
            role: Role::Feed,
        }
    }
}

fn carried_metadata(activities: &dyn Activities, document_id: &str) -> CarriedMetadata {
    let get = |name: &str| activities.retrieve_parent_data(document_id, name);
    let metadata = CarriedMetadata {
        pub_dates: get("pubdate"),
        titles: get("title"),
        sources: get("source"),
        categories: get("category"),
        descriptions: get("description"),
        author_names: get("authorname"),
        author_emails: get("authoremail"),
    };
    if metadata.sources.is_empty() {
        log::debug!("Document '{document_id}' has no carried-down source");
    }
    metadata.sorted()
}

impl FeedConnector {
    /// Process a batch of documents.
    ///
    /// Every document is versioned, compared against what the framework
    /// holds, and then either parsed as a feed or ingested. Documents that
    /// cannot or may not be fetched are deleted.
    ///
    /// # Errors
    /// A transient failure or a stopped job ends the batch early; the
    /// cached body of the document in progress is still removed.
    pub async fn process_documents(
        &self,
        document_ids: &[String],
        spec: &Specification,
        statuses: &dyn ExistingVersions,
        activities: &dyn Activities,
    ) -> ConnectorResult<()> {
        let filter = FilterSpec::from_specification(spec, false)?;
        let acls = filter.acls();
        log::debug!("Processing {} documents", document_ids.len());

        for document_id in document_ids {
            let result = self
                .process_document(document_id, &filter, &acls, statuses, activities)
                .await;
            self.cache.delete(document_id);
            result?;
        }
        Ok(())
    }

    async fn process_document(
        &self,
        document_id: &str,
        filter: &FilterSpec,
        acls: &[String],
        statuses: &dyn ExistingVersions,
        activities: &dyn Activities,
    ) -> ConnectorResult<()> {
        let carried = activities
            .retrieve_parent_data_as_files(document_id, CARRY_DOWN_DATA)?
            .into_iter()
            .next();

        let versioned = if let Some(reader) = carried {
            let Some(ingest_url) = filter.map_document_url(document_id) else {
                log::debug!("Carried-down document '{document_id}' has no ingest URL; skipping");
                return Ok(());
            };
            let checksum = self.cache.add_reader(
                document_id,
                Some(CARRIED_CONTENT_TYPE.to_string()),
                reader,
                activities,
            )?;
            let metadata = carried_metadata(activities, document_id);
            Versioned {
                version: document_version(acls, &ingest_url, &metadata, checksum),
                role: Role::Document {
                    ingest_url,
                    metadata,
                },
            }
        } else {
            match self
                .fetch_version(document_id, filter, acls, statuses, activities)
                .await?
            {
                Some(versioned) => versioned,
                None => {
                    log::debug!("Removing document '{document_id}'");
                    activities.delete_document(document_id)?;
                    return Ok(());
                }
            }
        };

        if !versioned.version.is_empty()
            && !activities.check_document_needs_reindexing(document_id, &versioned.version)
        {
            log::debug!("Document '{document_id}' is unchanged");
            return Ok(());
        }

        match versioned.role {
            Role::Feed => {
                if versioned.version.is_empty() {
                    log::debug!("Nothing fetched for '{document_id}'");
                } else {
                    self.parse_feed(document_id, filter, activities)?;
                }
                activities.record_document(document_id, &versioned.version)?;
                Ok(())
            }
            Role::Document {
                ingest_url,
                metadata,
            } => self.ingest(
                document_id,
                &versioned.version,
                &ingest_url,
                metadata,
                acls,
                activities,
            ),
        }
    }

    /// Fetch `document_id` and derive its version.
    ///
    /// `None` means the document should be deleted.
    async fn fetch_version(
        &self,
        document_id: &str,
        filter: &FilterSpec,
        acls: &[String],
        statuses: &dyn ExistingVersions,
        activities: &dyn Activities,
    ) -> ConnectorResult<Option<Versioned>> {
        let url = match Url::parse(document_id) {
            Ok(url) if url.host_str().is_some() => url,
            _ => {
                log::debug!("Document identifier '{document_id}' is not a valid URL");
                return Ok(None);
            }
        };

        if self.config.robots_usage() >= RobotsUsage::Data
            && !self
                .lease
                .robots()
                .is_fetch_allowed(&url, &self.context, activities)
                .await?
        {
            activities.record_activity(ActivityRecord {
                start_time_ms: now_millis(),
                activity: ACTIVITY_FETCH.to_string(),
                byte_count: None,
                entity: document_id.to_string(),
                result_code: FETCH_ROBOTS_EXCLUSION.to_string(),
                result_description: Some("Robots exclusion".to_string()),
            });
            log::debug!("Skipping '{document_id}' because of robots.txt");
            return Ok(None);
        }

        let mut connection = self
            .lease
            .fetcher()
            .create_connection(
                &url,
                &self.context,
                Duration::from_millis(filter.feed_timeout_ms()),
            )
            .await?;
        connection.begin_fetch(FETCH_TYPE_DATA).await;
        let outcome = self
            .read_response(&mut connection, document_id, &url, filter, acls, statuses, activities)
            .await;
        connection.done_fetch(activities);
        connection.close();
        outcome
    }

    async fn read_response(
        &self,
        connection: &mut FetchConnection,
        document_id: &str,
        url: &Url,
        filter: &FilterSpec,
        acls: &[String],
        statuses: &dyn ExistingVersions,
        activities: &dyn Activities,
    ) -> ConnectorResult<Option<Versioned>> {
        let path = &url[Position::BeforePath..Position::AfterQuery];
        // Feeds are always fetched in full: the rescan interval can only be
        // learned from the body.
        let status = connection
            .execute_fetch(path, &self.context.user_agent, &self.context.from, None, None)
            .await?;

        match status {
            FetchStatus::NoChange => Ok(statuses.indexed_version(document_id).map(Versioned::feed)),
            FetchStatus::SiteError | FetchStatus::PageError => {
                log::debug!("Fetch of '{document_id}' failed with code {}", connection.response_code());
                Ok(Some(Versioned::feed(String::new())))
            }
            FetchStatus::Ok => {
                let content_type = effective_content_type(connection.response_header("Content-Type"));
                let ingest_url = if is_xml_content_type(content_type.as_deref()) {
                    if !filter.is_seed(document_id) {
                        log::debug!("'{document_id}' is a feed but not a seed; removing");
                        return Ok(None);
                    }
                    None
                } else {
                    if filter.chromed_mode() == ChromedMode::Skip {
                        log::debug!("Chromed content is skipped; removing '{document_id}'");
                        return Ok(None);
                    }
                    if !activities.check_mime_type_indexable(content_type.as_deref().unwrap_or("")) {
                        log::debug!(
                            "'{document_id}' has unindexable content type {content_type:?}; removing"
                        );
                        return Ok(None);
                    }
                    filter.map_document_url(document_id)
                };

                let mut body = connection.response_body()?;
                let checksum = self
                    .cache
                    .add_body(document_id, content_type, &mut body, activities)
                    .await?;

                Ok(Some(match ingest_url {
                    Some(ingest_url) => {
                        let metadata = carried_metadata(activities, document_id);
                        Versioned {
                            version: document_version(acls, &ingest_url, &metadata, checksum),
                            role: Role::Document {
                                ingest_url,
                                metadata,
                            },
                        }
                    }
                    None => Versioned::feed(feed_version(
                        connection.response_header("ETag"),
                        connection.response_header("Last-Modified"),
                        checksum,
                    )),
                }))
            }
        }
    }

    fn parse_feed(
        &self,
        document_id: &str,
        filter: &FilterSpec,
        activities: &dyn Activities,
    ) -> ConnectorResult<()> {
        let Some(file) = self.cache.open(document_id)? else {
            log::error!("Document '{document_id}' should be in cache but isn't");
            return Ok(());
        };
        let summary = FeedParser::new(document_id, filter, activities)
            .spool_dir(self.config.spool_dir())
            .parse(BufReader::new(file))?;
        log::debug!(
            "Feed '{document_id}' ({:?}) yielded {} references",
            summary.kind.map(|kind| kind.to_string()),
            summary.references
        );
        Ok(())
    }

    fn ingest(
        &self,
        document_id: &str,
        version: &str,
        ingest_url: &str,
        metadata: CarriedMetadata,
        acls: &[String],
        activities: &dyn Activities,
    ) -> ConnectorResult<()> {
        let start_time_ms = now_millis();
        let record = |code: &str, description: Option<String>, bytes: Option<u64>| {
            activities.record_activity(ActivityRecord {
                start_time_ms,
                activity: ACTIVITY_PROCESS.to_string(),
                byte_count: bytes,
                entity: document_id.to_string(),
                result_code: code.to_string(),
                result_description: description,
            });
        };

        let length = self.cache.length(document_id).unwrap_or(0);
        if !activities.check_length_indexable(length) {
            activities.no_document(document_id, version)?;
            record(
                RESULT_EXCLUDED_LENGTH,
                Some(format!("Document rejected because of length ({length})")),
                None,
            );
            return Ok(());
        }

        if !activities.check_url_indexable(document_id) {
            activities.no_document(document_id, version)?;
            record(
                RESULT_EXCLUDED_URL,
                Some(format!("Document rejected because of URL ('{document_id}')")),
                None,
            );
            return Ok(());
        }

        let content_type = effective_content_type(self.cache.content_type(document_id).as_deref());
        if !activities.check_mime_type_indexable(content_type.as_deref().unwrap_or("")) {
            activities.no_document(document_id, version)?;
            record(
                RESULT_EXCLUDED_MIMETYPE,
                Some(format!(
                    "Document rejected because of mime type ({})",
                    content_type.as_deref().unwrap_or("null")
                )),
                None,
            );
            return Ok(());
        }

        let Some(body) = self.cache.open(document_id)? else {
            log::error!("Document '{document_id}' should be in cache but isn't");
            return Ok(());
        };

        let (acls, deny_acls) = if acls.is_empty() {
            (Vec::new(), Vec::new())
        } else {
            (acls.to_vec(), vec![DEFAULT_AUTHORITY_DENY_TOKEN.to_string()])
        };

        let mut origination_time: Option<i64> = None;
        let pub_dates_iso: Vec<String> = metadata
            .pub_dates
            .iter()
            .map(|value| match value.parse::<i64>() {
                Ok(ms) => {
                    origination_time = Some(origination_time.map_or(ms, |min| min.min(ms)));
                    format_iso_minutes(ms).unwrap_or_default()
                }
                Err(_) => String::new(),
            })
            .collect();

        let mut document = RepositoryDocument {
            fields: Default::default(),
            acls,
            deny_acls,
            mime_type: content_type,
            length,
            origination_time,
            body,
        };
        document.add_field("title", metadata.titles);
        document.add_field("authorname", metadata.author_names);
        document.add_field("authoremail", metadata.author_emails);
        document.add_field("summary", metadata.descriptions);
        document.add_field("source", metadata.sources);
        document.add_field("category", metadata.categories);
        if !metadata.pub_dates.is_empty() {
            document.add_field("pubdate", metadata.pub_dates);
            document.add_field("pubdateiso", pub_dates_iso);
        }

        match activities.ingest_document(document_id, version, ingest_url, document) {
            Ok(()) => {
                record(RESULT_OK, None, Some(length));
                Ok(())
            }
            Err(error) => {
                record(RESULT_INGEST_ERROR, Some(error.to_string()), None);
                Err(ConnectorError::Other(error))
            }
        }
    }
}
