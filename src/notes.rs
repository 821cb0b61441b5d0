//! Builders for the two outgoing note kinds.
//!
//! Both builders are pure data transformations: they never sign and never
//! touch the network. Only the `created_at` field is taken from the clock;
//! content and tags depend solely on the inputs.

use chrono::Utc;
use sha2::{Digest, Sha256};

use crate::calendar::SourceEvent;
use crate::event::{EventDraft, Tag, KIND_PICTURE, KIND_TEXT_NOTE};
use crate::media::Picture;

/// Topical tags applied to every outgoing note regardless of source content.
pub const BASELINE_TAGS: [&str; 5] = ["bitcoin", "history", "onthisday", "calendar", "btc"];

/// Build the plain text note (kind 1) for a calendar event.
///
/// Content is title, description, then the media URLs and reference URLs as
/// their own line-separated blocks when present. Tags are the baseline topics,
/// the normalized source tags lowercased, and a `d` tag with the event date.
pub fn text_note(
    event: &SourceEvent,
    tags: &[String],
    media: &[String],
    references: &[String],
) -> EventDraft {
    let mut content = String::new();
    content.push_str(&event.title);
    content.push_str("\n\n");
    content.push_str(&event.description);
    for block in [media, references] {
        if !block.is_empty() {
            content.push_str("\n\n");
            content.push_str(&block.join("\n"));
        }
    }

    let mut all = Vec::new();
    push_topic_tags(&mut all, tags);
    all.push(date_tag(event));

    EventDraft {
        created_at: now(),
        kind: KIND_TEXT_NOTE,
        tags: all,
        content,
    }
}

/// Build the picture note (kind 20) for a calendar event and a qualifying
/// image. Qualification is decided by the caller via
/// [`crate::media::select_picture`]; an event without one simply has no
/// picture note.
///
/// Tag order: `title`, the two `imeta` entries (URL and its SHA-256 digest,
/// the protocol's duplicate-detection convention), `summary` when the
/// description is nonempty, `m`, topic tags, `r` references, and the `d` date.
pub fn picture_note(
    event: &SourceEvent,
    tags: &[String],
    references: &[String],
    picture: &Picture,
) -> EventDraft {
    let url_digest = hex::encode(Sha256::digest(picture.url.as_bytes()));
    let mut all = vec![
        Tag(vec!["title".into(), event.title.clone()]),
        Tag(vec!["imeta".into(), format!("url {}", picture.url)]),
        Tag(vec!["imeta".into(), format!("x {url_digest}")]),
    ];
    if !event.description.is_empty() {
        all.push(Tag(vec!["summary".into(), event.description.clone()]));
    }
    all.push(Tag(vec!["m".into(), picture.media_type.to_string()]));
    push_topic_tags(&mut all, tags);
    for reference in references {
        if !reference.is_empty() {
            all.push(Tag(vec!["r".into(), reference.clone()]));
        }
    }
    all.push(date_tag(event));

    EventDraft {
        created_at: now(),
        kind: KIND_PICTURE,
        tags: all,
        content: format!("{}\n\n{}", event.title, event.description),
    }
}

/// Append the baseline topics followed by the normalized source tags, all
/// lowercased, skipping empties.
fn push_topic_tags(out: &mut Vec<Tag>, tags: &[String]) {
    for topic in BASELINE_TAGS {
        out.push(Tag(vec!["t".into(), topic.to_string()]));
    }
    for tag in tags {
        if !tag.is_empty() {
            out.push(Tag(vec!["t".into(), tag.to_lowercase()]));
        }
    }
}

fn date_tag(event: &SourceEvent) -> Tag {
    Tag(vec!["d".into(), event.date.format("%Y-%m-%d").to_string()])
}

fn now() -> u64 {
    Utc::now().timestamp().max(0) as u64
}
