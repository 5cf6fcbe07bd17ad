//! Streaming feed parser
//!
//! One pass over the XML events with a stack of [`Frame`]s, one per open
//! element. What a child element opens is looked up in [`RULES`] by the
//! scope of its parent frame and its lower-cased local name; anything not
//! in the table opens a [`Frame::Skip`] whose subtree is ignored.
//!
//! Completed items are turned into document references as soon as they
//! close. Completed channels (and RDF, Atom and sitemap roots) report the
//! feed's rescan bounds. The bounds are reported exactly once per parse:
//! if no channel ever closes, a fallback bound is reported at the end.

use std::fmt;
use std::io::{BufRead, BufWriter, Write};
use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tempfile::NamedTempFile;

use super::dates::{parse_iso8601, parse_rss_date};
use super::errors::{FeedError, FeedResult};
use crate::activities::{Activities, CarryDown, ContentPayload, DocumentReference, ScheduleBounds};
use crate::filter::{ChromedMode, DechromedMode, FilterSpec};
use crate::utils::{MINUTE_MS, canonicalize, now_millis};

/// Prefix of temp files holding dechromed content
pub const CONTENT_FILE_PREFIX: &str = "_rssdata_";

/// Root shape of a feed document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedKind {
    Rss,
    Rdf,
    Atom,
    Sitemap,
}

impl fmt::Display for FeedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Rss => "RSS",
            Self::Rdf => "RDF",
            Self::Atom => "Atom",
            Self::Sitemap => "SiteMap",
        })
    }
}

/// What a parse found
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSummary {
    /// `None` when the root element was not a known feed shape
    pub kind: Option<FeedKind>,
    /// Document references handed to the activities collaborator
    pub references: usize,
    /// The rescan time that was reported, epoch milliseconds
    pub rescan_at: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Document,
    Rss,
    Container(FeedKind),
    Item(FeedKind),
    Author,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Ttl,
    Link,
    Guid,
    PubDate,
    Title,
    Category,
    AuthorEmail,
    AuthorName,
    Description,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Open {
    Rss,
    Container(FeedKind),
    Item,
    Author,
    Text(Slot),
    /// `link@href`, recorded on the enclosing item
    Href,
    /// `category@term`, recorded on the enclosing item
    Term,
    /// Text into the slot, or streamed to a file in description mode
    Summary(Slot),
    /// Streamed to a file in content mode, ignored otherwise
    Content,
}

use FeedKind::{Atom, Rdf, Rss, Sitemap};

static RULES: &[(Scope, &str, Open)] = &[
    (Scope::Document, "rss", Open::Rss),
    (Scope::Document, "rdf", Open::Container(Rdf)),
    (Scope::Document, "feed", Open::Container(Atom)),
    (Scope::Document, "urlset", Open::Container(Sitemap)),
    (Scope::Document, "sitemapindex", Open::Container(Sitemap)),
    (Scope::Rss, "channel", Open::Container(Rss)),
    (Scope::Container(Rss), "ttl", Open::Text(Slot::Ttl)),
    (Scope::Container(Rss), "item", Open::Item),
    (Scope::Container(Rdf), "ttl", Open::Text(Slot::Ttl)),
    (Scope::Container(Rdf), "item", Open::Item),
    (Scope::Container(Atom), "ttl", Open::Text(Slot::Ttl)),
    (Scope::Container(Atom), "entry", Open::Item),
    (Scope::Container(Sitemap), "url", Open::Item),
    (Scope::Container(Sitemap), "sitemap", Open::Item),
    (Scope::Item(Rss), "link", Open::Text(Slot::Link)),
    (Scope::Item(Rss), "guid", Open::Text(Slot::Guid)),
    (Scope::Item(Rss), "pubdate", Open::Text(Slot::PubDate)),
    (Scope::Item(Rss), "title", Open::Text(Slot::Title)),
    (Scope::Item(Rss), "category", Open::Text(Slot::Category)),
    (Scope::Item(Rss), "author", Open::Text(Slot::AuthorEmail)),
    (Scope::Item(Rss), "creator", Open::Text(Slot::AuthorName)),
    (Scope::Item(Rss), "description", Open::Summary(Slot::Description)),
    (Scope::Item(Rss), "content", Open::Content),
    (Scope::Item(Rss), "encoded", Open::Content),
    (Scope::Item(Rdf), "link", Open::Text(Slot::Link)),
    (Scope::Item(Rdf), "date", Open::Text(Slot::PubDate)),
    (Scope::Item(Rdf), "title", Open::Text(Slot::Title)),
    (Scope::Item(Rdf), "creator", Open::Text(Slot::AuthorName)),
    (Scope::Item(Rdf), "description", Open::Summary(Slot::Description)),
    (Scope::Item(Rdf), "content", Open::Content),
    (Scope::Item(Rdf), "encoded", Open::Content),
    (Scope::Item(Atom), "link", Open::Href),
    (Scope::Item(Atom), "published", Open::Text(Slot::PubDate)),
    (Scope::Item(Atom), "updated", Open::Text(Slot::PubDate)),
    (Scope::Item(Atom), "title", Open::Text(Slot::Title)),
    (Scope::Item(Atom), "author", Open::Author),
    (Scope::Item(Atom), "category", Open::Term),
    (Scope::Item(Atom), "subtitle", Open::Summary(Slot::Title)),
    (Scope::Item(Atom), "content", Open::Content),
    (Scope::Item(Sitemap), "loc", Open::Text(Slot::Link)),
    (Scope::Item(Sitemap), "lastmod", Open::Text(Slot::PubDate)),
    (Scope::Author, "name", Open::Text(Slot::AuthorName)),
    (Scope::Author, "email", Open::Text(Slot::AuthorEmail)),
];

fn lookup(scope: Scope, tag: &str) -> Option<Open> {
    RULES
        .iter()
        .find(|(s, t, _)| *s == scope && *t == tag)
        .map(|(_, _, open)| *open)
}

#[derive(Debug)]
struct Item {
    kind: FeedKind,
    links: Vec<String>,
    guid: Option<String>,
    pubdate: Option<String>,
    title: Option<String>,
    author_email: Option<String>,
    author_name: Option<String>,
    categories: Vec<String>,
    description: Option<String>,
    content: Option<NamedTempFile>,
}

impl Item {
    fn new(kind: FeedKind) -> Self {
        Self {
            kind,
            links: Vec::new(),
            guid: None,
            pubdate: None,
            title: None,
            author_email: None,
            author_name: None,
            categories: Vec::new(),
            description: None,
            content: None,
        }
    }

    fn store(&mut self, slot: Slot, value: String) {
        match slot {
            Slot::Link => self.links = vec![value],
            Slot::Guid => self.guid = Some(value),
            Slot::PubDate => self.pubdate = Some(value),
            Slot::Title => self.title = Some(value),
            Slot::Category => self.categories.push(value),
            Slot::AuthorEmail => self.author_email = Some(value),
            Slot::AuthorName => self.author_name = Some(value),
            Slot::Description => self.description = Some(value),
            Slot::Ttl => {}
        }
    }
}

#[derive(Debug)]
enum Sink {
    Text(String),
    File(BufWriter<NamedTempFile>),
}

#[derive(Debug)]
struct Capture {
    slot: Slot,
    sink: Sink,
    /// Open child elements inside the captured one
    nested: usize,
}

impl Capture {
    fn append(&mut self, text: &str) -> FeedResult<()> {
        match &mut self.sink {
            Sink::Text(value) if self.nested == 0 => value.push_str(text),
            Sink::Text(_) => {}
            Sink::File(writer) => writer.write_all(text.as_bytes())?,
        }
        Ok(())
    }
}

#[derive(Debug)]
enum Frame {
    Document,
    Skip,
    Rss,
    Container { kind: FeedKind, ttl: Option<String> },
    Item(Box<Item>),
    Author { name: Option<String>, email: Option<String> },
    Field(Capture),
}

impl Frame {
    fn scope(&self) -> Option<Scope> {
        match self {
            Self::Document => Some(Scope::Document),
            Self::Rss => Some(Scope::Rss),
            Self::Container { kind, .. } => Some(Scope::Container(*kind)),
            Self::Item(item) => Some(Scope::Item(item.kind)),
            Self::Author { .. } => Some(Scope::Author),
            Self::Skip | Self::Field(_) => None,
        }
    }

    fn text(slot: Slot) -> Self {
        Self::Field(Capture {
            slot,
            sink: Sink::Text(String::new()),
            nested: 0,
        })
    }
}

fn attribute(start: &BytesStart<'_>, reader_decoder: quick_xml::Decoder, name: &str) -> Option<String> {
    start
        .attributes()
        .flatten()
        .find(|attr| attr.key.local_name().as_ref().eq_ignore_ascii_case(name.as_bytes()))
        .and_then(|attr| attr.decode_and_unescape_value(reader_decoder).ok())
        .map(|value| value.into_owned())
}

/// Parses one feed document and reports what it finds
pub struct FeedParser<'a> {
    document_id: &'a str,
    filter: &'a FilterSpec,
    activities: &'a dyn Activities,
    spool_dir: Option<&'a Path>,
    kind: Option<FeedKind>,
    bounds_reported: bool,
    rescan_at: Option<i64>,
    references: usize,
}

impl<'a> FeedParser<'a> {
    /// # Arguments
    /// * `document_id` - Canonical identifier of the feed; links resolve against it
    /// * `filter` - Job filter deciding which links are kept and how content is captured
    /// * `activities` - Receives references and the feed's schedule bounds
    #[must_use]
    pub fn new(document_id: &'a str, filter: &'a FilterSpec, activities: &'a dyn Activities) -> Self {
        Self {
            document_id,
            filter,
            activities,
            spool_dir: None,
            kind: None,
            bounds_reported: false,
            rescan_at: None,
            references: 0,
        }
    }

    /// Directory for content temp files; the system temp dir when unset
    #[must_use]
    pub fn spool_dir(mut self, dir: Option<&'a Path>) -> Self {
        self.spool_dir = dir;
        self
    }

    /// Parse `source` to the end, or until the XML becomes unreadable.
    ///
    /// # Errors
    /// Returns `FeedError::Io` if a content field cannot be spooled and
    /// `FeedError::Reference` if the framework refuses a reference. Every
    /// temp file created so far is deleted either way.
    pub fn parse<R: BufRead>(mut self, source: R) -> FeedResult<FeedSummary> {
        let outcome = self.read_events(source);

        if self.kind.is_none() {
            log::debug!(
                "Document '{}' does not look like a feed; no links extracted",
                self.document_id
            );
        }
        if !self.bounds_reported {
            let now = now_millis();
            let rescan = self
                .filter
                .bad_feed_rescan_time(now)
                .or_else(|| self.filter.default_rescan_time(now));
            self.report_bounds(rescan);
        }
        outcome?;

        Ok(FeedSummary {
            kind: self.kind,
            references: self.references,
            rescan_at: self.rescan_at,
        })
    }

    /// Drive the frame stack over every event in `source`.
    ///
    /// Frames still open when this returns are dropped with their temp files.
    fn read_events<R: BufRead>(&mut self, source: R) -> FeedResult<()> {
        let mut reader = Reader::from_reader(source);
        let config = reader.config_mut();
        config.expand_empty_elements = true;
        config.check_end_names = false;

        let mut frames = vec![Frame::Document];
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(start)) => {
                    let tag = String::from_utf8_lossy(start.local_name().as_ref()).to_lowercase();
                    let Some(top) = frames.last_mut() else {
                        break;
                    };
                    if let Frame::Field(capture) = top {
                        capture.nested += 1;
                        continue;
                    }
                    let frame = self.open(top, &tag, &start, reader.decoder())?;
                    frames.push(frame);
                }
                Ok(Event::End(_)) => {
                    if let Some(Frame::Field(capture)) = frames.last_mut() {
                        if capture.nested > 0 {
                            capture.nested -= 1;
                            continue;
                        }
                    }
                    if frames.len() <= 1 {
                        continue;
                    }
                    if let (Some(frame), Some(parent)) = (frames.pop(), frames.last_mut()) {
                        self.close(parent, frame)?;
                    }
                }
                Ok(Event::Text(text)) => {
                    if let Some(Frame::Field(capture)) = frames.last_mut() {
                        let value = text.unescape().map_or_else(
                            |_| String::from_utf8_lossy(&text).into_owned(),
                            std::borrow::Cow::into_owned,
                        );
                        capture.append(&value)?;
                    }
                }
                Ok(Event::CData(data)) => {
                    if let Some(Frame::Field(capture)) = frames.last_mut() {
                        let value = reader.decoder().decode(&data).map_or_else(
                            |_| String::from_utf8_lossy(&data).into_owned(),
                            std::borrow::Cow::into_owned,
                        );
                        capture.append(&value)?;
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    log::debug!(
                        "Feed '{}' is not well-formed at byte {}: {e}; stopping parse",
                        self.document_id,
                        reader.buffer_position()
                    );
                    break;
                }
            }
        }
        Ok(())
    }

    fn open(
        &mut self,
        parent: &mut Frame,
        tag: &str,
        start: &BytesStart<'_>,
        decoder: quick_xml::Decoder,
    ) -> FeedResult<Frame> {
        let Some(scope) = parent.scope() else {
            return Ok(Frame::Skip);
        };
        let Some(open) = lookup(scope, tag) else {
            return Ok(Frame::Skip);
        };

        let frame = match open {
            Open::Rss => {
                self.note_root(Rss);
                Frame::Rss
            }
            Open::Container(kind) => {
                if scope == Scope::Document {
                    self.note_root(kind);
                }
                Frame::Container { kind, ttl: None }
            }
            Open::Item => match scope {
                Scope::Container(kind) => Frame::Item(Box::new(Item::new(kind))),
                _ => Frame::Skip,
            },
            Open::Author => Frame::Author {
                name: None,
                email: None,
            },
            Open::Text(slot) => Frame::text(slot),
            Open::Href => {
                if let (Frame::Item(item), Some(href)) = (parent, attribute(start, decoder, "href")) {
                    if !href.is_empty() {
                        item.links.push(href);
                    }
                }
                Frame::Skip
            }
            Open::Term => {
                if let (Frame::Item(item), Some(term)) = (parent, attribute(start, decoder, "term")) {
                    if !term.is_empty() {
                        item.categories.push(term);
                    }
                }
                Frame::Skip
            }
            Open::Summary(slot) => {
                if self.filter.dechromed_mode() == DechromedMode::Description {
                    self.stream(slot)?
                } else {
                    Frame::text(slot)
                }
            }
            Open::Content => {
                if self.filter.dechromed_mode() == DechromedMode::Content {
                    self.stream(Slot::Description)?
                } else {
                    Frame::Skip
                }
            }
        };
        Ok(frame)
    }

    fn stream(&self, slot: Slot) -> FeedResult<Frame> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(CONTENT_FILE_PREFIX).suffix("tmp");
        let file = match self.spool_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        Ok(Frame::Field(Capture {
            slot,
            sink: Sink::File(BufWriter::new(file)),
            nested: 0,
        }))
    }

    fn close(&mut self, parent: &mut Frame, frame: Frame) -> FeedResult<()> {
        match frame {
            Frame::Field(capture) => match capture.sink {
                Sink::Text(value) => match parent {
                    Frame::Container { ttl, .. } if capture.slot == Slot::Ttl => *ttl = Some(value),
                    Frame::Item(item) => item.store(capture.slot, value),
                    Frame::Author { name, email } => match capture.slot {
                        Slot::AuthorName => *name = Some(value),
                        Slot::AuthorEmail => *email = Some(value),
                        _ => {}
                    },
                    _ => {}
                },
                Sink::File(writer) => {
                    let file = writer.into_inner().map_err(|e| FeedError::Io(e.into_error()))?;
                    if let Frame::Item(item) = parent {
                        if item.content.replace(file).is_some() {
                            log::debug!(
                                "Feed '{}' has an item with more than one content field; keeping the last",
                                self.document_id
                            );
                        }
                    }
                }
            },
            Frame::Author { name, email } => {
                if let Frame::Item(item) = parent {
                    item.author_name = name;
                    item.author_email = email;
                }
            }
            Frame::Item(item) => self.emit(*item)?,
            Frame::Container { kind, ttl } => self.container_closed(kind, ttl.as_deref()),
            Frame::Document | Frame::Rss | Frame::Skip => {}
        }
        Ok(())
    }

    fn note_root(&mut self, kind: FeedKind) {
        if self.kind.is_none() {
            self.kind = Some(kind);
        }
    }

    fn container_closed(&mut self, kind: FeedKind, ttl: Option<&str>) {
        if self.bounds_reported {
            log::debug!(
                "{kind} document '{}' has more than one channel; keeping the first rescan time",
                self.document_id
            );
            return;
        }

        let now = now_millis();
        let mut rescan = self.filter.default_rescan_time(now);
        if let Some(ttl) = ttl {
            let from_ttl = ttl
                .trim()
                .parse::<i64>()
                .ok()
                .and_then(|minutes| minutes.checked_mul(MINUTE_MS))
                .and_then(|ms| ms.checked_add(now));
            match from_ttl {
                Some(at) => {
                    log::debug!(
                        "{kind} document '{}' has a ttl of {ttl}; setting refetch time accordingly",
                        self.document_id
                    );
                    rescan = Some(at);
                }
                None => log::warn!(
                    "{kind} document '{}' has illegal ttl value '{ttl}'",
                    self.document_id
                ),
            }
        }
        if let (Some(at), Some(floor)) = (rescan, self.filter.minimum_rescan_time(now)) {
            if at < floor {
                rescan = Some(floor);
            }
        }
        self.report_bounds(rescan);
    }

    fn report_bounds(&mut self, rescan: Option<i64>) {
        log::debug!(
            "Feed '{}' rescan time set to {}",
            self.document_id,
            rescan.map_or_else(|| "none".to_string(), |at| at.to_string())
        );
        self.activities.set_document_schedule_bounds(
            self.document_id,
            ScheduleBounds {
                min_rescan_at: rescan,
                max_rescan_at: rescan,
                ..ScheduleBounds::default()
            },
        );
        self.bounds_reported = true;
        self.rescan_at = rescan;
    }

    fn emit(&mut self, mut item: Item) -> FeedResult<()> {
        let kind = item.kind;
        let links = if item.links.iter().all(|link| link.trim().is_empty()) {
            item.guid.take().into_iter().collect()
        } else {
            std::mem::take(&mut item.links)
        };

        let origination = item
            .pubdate
            .as_deref()
            .filter(|date| !date.trim().is_empty())
            .and_then(|date| match kind {
                Rss => parse_rss_date(date),
                Rdf | Atom | Sitemap => parse_iso8601(date),
            });

        for value in &links {
            for raw in value.split(", ") {
                let raw = raw.trim();
                let Some(target) =
                    canonicalize(self.filter.canonicalization_policies(), Some(self.document_id), raw)
                else {
                    log::debug!(
                        "In {kind} document '{}', found an unincluded URL '{raw}'",
                        self.document_id
                    );
                    continue;
                };
                log::debug!(
                    "In {kind} document '{}', found a link to '{target}', which has origination date {}",
                    self.document_id,
                    origination.map_or_else(|| "null".to_string(), |at| at.to_string())
                );
                if !self.filter.is_legal_url(&target) {
                    log::debug!("Identifier '{target}' is excluded");
                    continue;
                }

                let content_bearing = kind != Sitemap
                    && (item.content.is_some() || self.filter.chromed_mode() == ChromedMode::MetadataOnly);
                let content = content_bearing
                    .then(|| item.content.take().map_or(ContentPayload::Empty, ContentPayload::File));

                let reference = DocumentReference {
                    target,
                    source: self.document_id.to_string(),
                    carry_down: self.carry_down(&item, origination),
                    content,
                    origination_time: origination,
                };
                self.activities
                    .add_document_reference(reference)
                    .map_err(FeedError::Reference)?;
                self.references += 1;
            }
        }
        Ok(())
    }

    fn carry_down(&self, item: &Item, origination: Option<i64>) -> Vec<CarryDown> {
        let single = |value: &Option<String>| value.iter().cloned().collect::<Vec<_>>();
        let mut fields = vec![
            CarryDown::new("pubdate", origination.iter().map(i64::to_string).collect()),
            CarryDown::new("source", vec![self.document_id.to_string()]),
        ];
        if item.kind != Sitemap {
            fields.extend([
                CarryDown::new("title", single(&item.title)),
                CarryDown::new("authoremail", single(&item.author_email)),
                CarryDown::new("authorname", single(&item.author_name)),
                CarryDown::new("category", item.categories.clone()),
                CarryDown::new("description", single(&item.description)),
            ]);
        }
        fields.retain(|field| !field.values.is_empty());
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activities::recording::RecordingActivities;
    use std::io::Read;

    fn parse(xml: &str, filter: &FilterSpec) -> (FeedSummary, RecordingActivities) {
        let activities = RecordingActivities::default();
        let summary = FeedParser::new("http://example.com/feed.xml", filter, &activities)
            .parse(xml.as_bytes())
            .unwrap();
        (summary, activities)
    }

    #[test]
    fn rss_item_with_guid_fallback_and_categories() {
        let xml = r#"<?xml version="1.0"?>
            <rss version="2.0"><channel>
              <item>
                <guid>/relative/page</guid>
                <title>Hello</title>
                <category>a</category><category>b</category>
                <pubDate>Tue, 02 Jan 2024 03:04:05 GMT</pubDate>
              </item>
            </channel></rss>"#;
        let (summary, activities) = parse(xml, &FilterSpec::builder().build());
        assert_eq!(summary.kind, Some(Rss));
        let references = activities.references.lock();
        assert_eq!(references.len(), 1);
        let reference = &references[0];
        assert_eq!(reference.target, "http://example.com/relative/page");
        assert_eq!(reference.origination_time, Some(1_704_164_645_000));
        assert_eq!(reference.carried("category"), Some(&["a".to_string(), "b".to_string()][..]));
        assert_eq!(reference.carried("title"), Some(&["Hello".to_string()][..]));
        assert_eq!(
            reference.carried("source"),
            Some(&["http://example.com/feed.xml".to_string()][..])
        );
        assert!(reference.content.is_none());
    }

    #[test]
    fn comma_separated_links_each_produce_a_reference() {
        let xml = "<rss><channel><item><link>http://x/a, http://x/b</link></item></channel></rss>";
        let (summary, activities) = parse(xml, &FilterSpec::builder().build());
        assert_eq!(summary.references, 2);
        let targets: Vec<_> = activities
            .references
            .lock()
            .iter()
            .map(|r| r.target.clone())
            .collect();
        assert_eq!(targets, vec!["http://x/a", "http://x/b"]);
    }

    #[test]
    fn atom_entry_uses_href_terms_and_author() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom">
            <entry>
              <link href="http://example.com/one"/>
              <category term="rust"/>
              <updated>2024-01-02T03:04:05Z</updated>
              <author><name>Ann</name><email>ann@example.com</email></author>
            </entry></feed>"#;
        let (summary, activities) = parse(xml, &FilterSpec::builder().build());
        assert_eq!(summary.kind, Some(Atom));
        let references = activities.references.lock();
        assert_eq!(references[0].target, "http://example.com/one");
        assert_eq!(references[0].carried("category"), Some(&["rust".to_string()][..]));
        assert_eq!(references[0].carried("authorname"), Some(&["Ann".to_string()][..]));
        assert_eq!(references[0].origination_time, Some(1_704_164_645_000));
    }

    #[test]
    fn rdf_root_is_case_insensitive() {
        let xml = r#"<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
            <item><link>http://x/rdf</link><dc:date>2024-01-02T03:04:05Z</dc:date></item>
            </rdf:RDF>"#;
        let (summary, activities) = parse(xml, &FilterSpec::builder().build());
        assert_eq!(summary.kind, Some(Rdf));
        assert_eq!(activities.references.lock()[0].origination_time, Some(1_704_164_645_000));
    }

    #[test]
    fn sitemap_carries_only_pubdate_and_source() {
        let xml = "<urlset><url><loc>http://x/s</loc><lastmod>2024-01-02T03:04:05Z</lastmod></url></urlset>";
        let filter = FilterSpec::builder().chromed_mode(ChromedMode::MetadataOnly).build();
        let (_, activities) = parse(xml, &filter);
        let references = activities.references.lock();
        let names: Vec<_> = references[0].carry_down.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["pubdate", "source"]);
        assert!(references[0].content.is_none());
    }

    #[test]
    fn metadata_only_without_content_carries_an_empty_body() {
        let xml = "<rss><channel><item><link>http://x/m</link></item></channel></rss>";
        let filter = FilterSpec::builder().chromed_mode(ChromedMode::MetadataOnly).build();
        let (_, activities) = parse(xml, &filter);
        assert!(matches!(
            activities.references.lock()[0].content,
            Some(ContentPayload::Empty)
        ));
    }

    #[test]
    fn description_mode_streams_the_description() {
        let xml = "<rss><channel><item><link>http://x/d</link>\
                   <description><![CDATA[<p>body</p>]]></description></item></channel></rss>";
        let filter = FilterSpec::builder().dechromed_mode(DechromedMode::Description).build();
        let (_, activities) = parse(xml, &filter);
        let references = activities.references.lock();
        let mut body = String::new();
        references[0]
            .content
            .as_ref()
            .unwrap()
            .reader()
            .unwrap()
            .read_to_string(&mut body)
            .unwrap();
        assert_eq!(body, "<p>body</p>");
        assert!(references[0].carried("description").is_none());
    }

    #[test]
    fn ttl_sets_rescan_and_unknown_root_uses_bad_feed_interval() {
        let filter = FilterSpec::builder()
            .default_rescan_minutes(60)
            .bad_feed_rescan_minutes(5)
            .build();
        let before = now_millis();
        let (summary, activities) =
            parse("<rss><channel><ttl>10</ttl></channel></rss>", &filter);
        let at = summary.rescan_at.unwrap();
        assert!(at >= before + 10 * MINUTE_MS && at <= now_millis() + 10 * MINUTE_MS);
        assert_eq!(activities.bounds.lock().len(), 1);

        let (summary, activities) = parse("<html><body/></html>", &filter);
        assert_eq!(summary.kind, None);
        let at = summary.rescan_at.unwrap();
        assert!(at <= now_millis() + 5 * MINUTE_MS && at >= before + 5 * MINUTE_MS);
        assert_eq!(activities.bounds.lock().len(), 1);
    }

    #[test]
    fn malformed_xml_still_reports_bounds_once() {
        let filter = FilterSpec::builder().default_rescan_minutes(60).build();
        let (summary, activities) =
            parse("<rss><channel><item><link>http://x/a</link></item><item></oops", &filter);
        assert_eq!(summary.references, 1);
        assert_eq!(activities.bounds.lock().len(), 1);
    }

    #[test]
    fn illegal_links_are_skipped() {
        let filter = FilterSpec::builder().excludes("private").unwrap().build();
        let xml = "<rss><channel><item><link>http://x/private/a</link></item>\
                   <item><link>mailto:someone@x</link></item></channel></rss>";
        let (summary, _) = parse(xml, &filter);
        assert_eq!(summary.references, 0);
    }
}
