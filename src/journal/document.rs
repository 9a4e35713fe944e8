//! The merged document produced by one collection cycle.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

use crate::document::{Document, Fragment};

use super::{SCHEMA_KEY, SCHEMA_VERSION};

const TIME_FORMAT: &str = "%c %Z";

/// The instant a cycle started, in three renderings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureTime {
    /// Seconds since the Unix epoch.
    pub epoch: i64,
    /// Rendered in UTC.
    pub utc_text: String,
    /// Rendered in the local time zone.
    pub local_text: String,
}

impl CaptureTime {
    /// Capture the current instant.
    #[must_use]
    pub fn now() -> Self {
        Self::at(Utc::now())
    }

    /// Capture `instant`.
    #[must_use]
    pub fn at(instant: DateTime<Utc>) -> Self {
        Self {
            epoch: instant.timestamp(),
            utc_text: instant.format(TIME_FORMAT).to_string(),
            local_text: instant.with_timezone(&Local).format(TIME_FORMAT).to_string(),
        }
    }
}

/// Contents of the `schema` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaMetadata {
    /// Journal schema version.
    pub version: String,
    /// When the cycle started.
    pub time: CaptureTime,
}

impl SchemaMetadata {
    /// Metadata for the current schema version captured at `time`.
    #[must_use]
    pub fn current(time: CaptureTime) -> Self {
        Self {
            version: SCHEMA_VERSION.to_string(),
            time,
        }
    }

    /// Read the `schema` section back from a persisted document.
    #[must_use]
    pub fn from_document(document: &Document) -> Option<Self> {
        let section = document.get(SCHEMA_KEY)?.clone();
        serde_json::from_value(section).ok()
    }

    /// A document holding only the `schema` section.
    #[must_use]
    pub fn to_document(&self) -> Document {
        let mut doc = Document::new();
        doc.put("schema.version", self.version.as_str());
        doc.put("schema.time.epoch", self.time.epoch);
        doc.put("schema.time.utc_text", self.time.utc_text.as_str());
        doc.put("schema.time.local_text", self.time.local_text.as_str());
        doc
    }
}

/// Schema metadata plus the merged fragments of one cycle.
///
/// Rebuilt from scratch on every cycle; nothing carries over from the
/// previous one.
#[derive(Debug, Clone, PartialEq)]
pub struct JournalDocument {
    metadata: SchemaMetadata,
    document: Document,
    contributors: usize,
}

impl JournalDocument {
    /// Fold `fragments` in order over fresh metadata.
    ///
    /// Collisions follow [`Document::merge`]: the later fragment wins a leaf,
    /// nested documents are merged recursively.
    pub fn assemble<I>(metadata: SchemaMetadata, fragments: I) -> Self
    where
        I: IntoIterator<Item = Fragment>,
    {
        let mut document = metadata.to_document();
        let mut contributors = 0;
        for fragment in fragments {
            document.merge(fragment);
            contributors += 1;
        }
        Self {
            metadata,
            document,
            contributors,
        }
    }

    /// The `schema` section.
    #[must_use]
    pub const fn metadata(&self) -> &SchemaMetadata {
        &self.metadata
    }

    /// Full document, `schema` section included.
    #[must_use]
    pub const fn document(&self) -> &Document {
        &self.document
    }

    /// Full document, consuming the journal.
    #[must_use]
    pub fn into_document(self) -> Document {
        self.document
    }

    /// The merged fragments without the `schema` section.
    #[must_use]
    pub fn body(&self) -> Document {
        self.document
            .iter()
            .filter(|(key, _)| *key != SCHEMA_KEY)
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect()
    }

    /// Number of fragments folded in, empty ones included.
    #[must_use]
    pub const fn contributors(&self) -> usize {
        self.contributors
    }

    /// True when no fragment contributed any key.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.document.keys().all(|key| key == SCHEMA_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn fragment(value: serde_json::Value) -> Fragment {
        Document::from_value(value).unwrap()
    }

    fn fixed_time() -> CaptureTime {
        CaptureTime::at(Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap())
    }

    #[test]
    fn test_capture_time_renderings() {
        let t = fixed_time();
        assert_eq!(t.epoch, 1_709_296_200);
        assert!(t.utc_text.contains("2024"));
        assert!(t.utc_text.ends_with("UTC"));
        assert!(!t.local_text.is_empty());
    }

    #[test]
    fn test_schema_section_shape() {
        let meta = SchemaMetadata::current(fixed_time());
        let doc = meta.to_document();
        assert_eq!(doc.keys().collect::<Vec<_>>(), vec!["schema"]);
        assert_eq!(doc.get("schema.version"), Some(&json!("0.1.0")));
        assert_eq!(doc.get("schema.time.epoch"), Some(&json!(1_709_296_200)));
        assert_eq!(SchemaMetadata::from_document(&doc), Some(meta));
    }

    #[test]
    fn test_assemble_in_order() {
        let journal = JournalDocument::assemble(
            SchemaMetadata::current(fixed_time()),
            vec![
                fragment(json!({"mesh": {"n": 100}})),
                fragment(json!({"solver": {"iters": 12}})),
            ],
        );
        assert_eq!(journal.contributors(), 2);
        assert_eq!(
            journal.document().keys().collect::<Vec<_>>(),
            vec!["schema", "mesh", "solver"]
        );
        assert_eq!(
            journal.body().into_value(),
            json!({"mesh": {"n": 100}, "solver": {"iters": 12}})
        );
    }

    #[test]
    fn test_later_fragment_wins_leaf() {
        let journal = JournalDocument::assemble(
            SchemaMetadata::current(fixed_time()),
            vec![
                fragment(json!({"mesh": {"n": 1, "name": "a"}})),
                fragment(json!({"mesh": {"n": 2}})),
            ],
        );
        assert_eq!(journal.body().into_value(), json!({"mesh": {"n": 2, "name": "a"}}));
    }

    #[test]
    fn test_empty_cycle() {
        let none = JournalDocument::assemble(SchemaMetadata::current(fixed_time()), Vec::new());
        assert!(none.is_empty());
        assert_eq!(none.contributors(), 0);

        let blank = JournalDocument::assemble(
            SchemaMetadata::current(fixed_time()),
            vec![Document::new(), Document::new()],
        );
        assert!(blank.is_empty());
        assert_eq!(blank.contributors(), 2);
        assert!(blank.body().is_empty());
    }
}
