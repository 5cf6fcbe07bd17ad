pub mod activities;
pub mod config;
pub mod connector;
pub mod feed;
pub mod fetch;
pub mod filter;
pub mod robots;
pub mod throttle;
pub mod utils;

pub use activities::{
    Activities, ActivityRecord, CarryDown, ContentPayload, DocumentReference, RepositoryDocument,
    ScheduleBounds,
};
pub use config::{ConnectorConfig, RobotsUsage};
pub use connector::{ConnectorError, ConnectorResult, ExistingVersions, FeedConnector};
pub use feed::{FeedKind, FeedParser, FeedSummary};
pub use fetch::{
    FetchConnection, FetchContext, FetchError, FetchStatus, ProxySettings, ReqwestTransport,
    ThrottledFetcher, Transport,
};
pub use filter::{ChromedMode, DechromedMode, FilterSpec, Specification, SpecificationNode};
pub use robots::RobotsCache;
pub use throttle::{ThrottleGroupLease, ThrottleRegistry, ThrottleSpec};
pub use utils::canonicalize;

/// Process a batch of documents with a connector built for this call.
///
/// # Errors
/// See [`FeedConnector::process_documents`].
pub async fn process(
    config: ConnectorConfig,
    registry: &ThrottleRegistry,
    document_ids: &[String],
    spec: &Specification,
    statuses: &dyn ExistingVersions,
    activities: &dyn Activities,
) -> ConnectorResult<()> {
    let connector = FeedConnector::connect(config, registry)?;
    let result = connector
        .process_documents(document_ids, spec, statuses, activities)
        .await;
    connector.disconnect();
    result
}
