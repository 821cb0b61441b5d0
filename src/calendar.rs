//! Calendar API event model and field normalization.
//!
//! The upstream API has shipped several shapes for the tag, media, and
//! reference fields over time: a JSON list of strings, a JSON-array-encoded
//! string, a single bare value, or nothing at all. [`RawList`] decodes any of
//! them and [`RawList::normalize`] flattens the result into clean entries.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};

/// One historical-date record as returned by the calendar API.
///
/// Field names follow the upstream wire format.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceEvent {
    #[serde(rename = "ID")]
    pub id: u64,
    /// Calendar date of the event. The API sends either a bare date or a full
    /// timestamp; only the date part is meaningful.
    #[serde(rename = "Date", deserialize_with = "date_or_datetime")]
    pub date: NaiveDate,
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Description")]
    pub description: String,
    /// Free-form topic tags.
    #[serde(rename = "Tags", default)]
    pub tags: RawList,
    /// Candidate media URLs.
    #[serde(rename = "Media", default)]
    pub media: RawList,
    /// Reference URLs.
    #[serde(rename = "References", default)]
    pub references: RawList,
    /// Upstream curation flag, carried through but not interpreted here.
    #[serde(default)]
    pub olas: bool,
}

/// Response envelope for the events endpoint. Pagination metadata is ignored.
#[derive(Debug, Deserialize)]
pub struct EventsResponse {
    pub events: Vec<SourceEvent>,
}

/// A field that may arrive as a structured list or as a single string.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RawList {
    List(Vec<String>),
    Text(String),
}

impl Default for RawList {
    fn default() -> Self {
        RawList::Text(String::new())
    }
}

impl RawList {
    /// Flatten the raw field into clean entries.
    ///
    /// An empty string or the `[]` sentinel yields no entries. A string is
    /// first tried as a JSON list; if that fails the whole value is kept as a
    /// single entry rather than dropped. Every entry is cleaned and empty or
    /// whitespace-only entries are removed.
    pub fn normalize(&self) -> Vec<String> {
        let entries = match self {
            RawList::List(items) => items.clone(),
            RawList::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() || trimmed == "[]" {
                    return Vec::new();
                }
                match serde_json::from_str::<Vec<String>>(trimmed) {
                    Ok(items) => items,
                    Err(_) => vec![s.clone()],
                }
            }
        };
        entries
            .iter()
            .map(|e| clean_entry(e))
            .filter(|e| !e.is_empty())
            .collect()
    }
}

/// Strip residual formatting from one entry: JSON-array wrapping left over
/// from double-encoded fields, a leading `- ` list marker, and surrounding
/// whitespace.
pub fn clean_entry(raw: &str) -> String {
    let mut cleaned = raw.trim();
    cleaned = cleaned.strip_prefix("[\"").unwrap_or(cleaned);
    cleaned = cleaned.strip_suffix("\"]").unwrap_or(cleaned);
    cleaned = cleaned.strip_prefix("- ").unwrap_or(cleaned);
    cleaned.trim().to_string()
}

/// Accept either `YYYY-MM-DD` or an RFC 3339 timestamp, truncated to the date.
fn date_or_datetime<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(date) = NaiveDate::parse_from_str(&raw, "%Y-%m-%d") {
        return Ok(date);
    }
    chrono::DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.date_naive())
        .map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_sentinel_fields_yield_nothing() {
        assert!(RawList::Text(String::new()).normalize().is_empty());
        assert!(RawList::Text("  ".into()).normalize().is_empty());
        assert!(RawList::Text("[]".into()).normalize().is_empty());
        assert!(RawList::List(vec![]).normalize().is_empty());
    }

    #[test]
    fn array_encoded_string_is_parsed() {
        let raw = RawList::Text(r#"["btc","history"]"#.into());
        assert_eq!(raw.normalize(), vec!["btc", "history"]);
    }

    #[test]
    fn unparseable_string_degrades_to_single_entry() {
        let raw = RawList::Text("just a bare tag".into());
        assert_eq!(raw.normalize(), vec!["just a bare tag"]);
    }

    #[test]
    fn structured_list_is_cleaned_in_place() {
        let raw = RawList::List(vec![
            " https://a.example/x.png ".into(),
            "- https://b.example/y".into(),
            "[\"https://c.example/z\"]".into(),
            "   ".into(),
            String::new(),
        ]);
        assert_eq!(
            raw.normalize(),
            vec![
                "https://a.example/x.png",
                "https://b.example/y",
                "https://c.example/z",
            ]
        );
    }

    #[test]
    fn no_output_entry_is_ever_blank() {
        let inputs = [
            RawList::Text(String::new()),
            RawList::Text("[]".into()),
            RawList::Text(r#"[""," ","x"]"#.into()),
            RawList::Text("bare".into()),
            RawList::List(vec!["".into(), " ".into(), "ok".into()]),
        ];
        for raw in inputs {
            for entry in raw.normalize() {
                assert!(!entry.trim().is_empty());
            }
        }
    }

    #[test]
    fn clean_entry_strips_artifacts() {
        assert_eq!(clean_entry("[\"https://x/y.jpg\"]"), "https://x/y.jpg");
        assert_eq!(clean_entry("- https://x/y"), "https://x/y");
        assert_eq!(clean_entry("  plain  "), "plain");
    }

    #[test]
    fn deserializes_both_field_shapes() {
        let scalar = serde_json::json!({
            "ID": 7,
            "Date": "2009-01-03T00:00:00Z",
            "Title": "Genesis Block",
            "Description": "Bitcoin launched",
            "Tags": "[\"btc\",\"history\"]",
            "Media": "https://x/a.jpg",
            "References": "[]",
            "olas": true
        });
        let ev: SourceEvent = serde_json::from_value(scalar).unwrap();
        assert_eq!(ev.date, NaiveDate::from_ymd_opt(2009, 1, 3).unwrap());
        assert_eq!(ev.tags.normalize(), vec!["btc", "history"]);
        assert_eq!(ev.media.normalize(), vec!["https://x/a.jpg"]);
        assert!(ev.references.normalize().is_empty());
        assert!(ev.olas);

        let structured = serde_json::json!({
            "ID": 8,
            "Date": "2010-05-22",
            "Title": "Pizza Day",
            "Description": "10,000 BTC for two pizzas",
            "Tags": ["pizza"],
            "Media": ["https://x/a.png", "https://x/b.gif"],
            "References": ["https://x/ref"]
        });
        let ev: SourceEvent = serde_json::from_value(structured).unwrap();
        assert_eq!(ev.date, NaiveDate::from_ymd_opt(2010, 5, 22).unwrap());
        assert_eq!(ev.media.normalize().len(), 2);
        assert!(!ev.olas);
    }

    #[test]
    fn same_input_normalizes_identically() {
        let raw = RawList::Text(r#"[" a","b "]"#.into());
        assert_eq!(raw.normalize(), raw.normalize());
    }
}
