//! XML persistence for error rules.
//!
//! ```text
//!   save:  InjectionService ──next_record──► writer ──► <DESTConfig>…</DESTConfig>
//!   load:  file ──► tokenizer ──start/chardata/end──► RuleLoader ──► validator ──► service
//! ```
//!
//! Documents are flat lists of `<ErrorRule>` elements, one child tag per
//! persisted field.  Both directions stream: the writer emits one record at a
//! time and the loader never holds more than the record being parsed.

use std::path::PathBuf;
use thiserror::Error;

use crate::service::ServiceError;

mod reader;
mod tokenizer;
mod writer;

pub use reader::{load_from_path, load_rules, RuleLoader};
pub use tokenizer::{tokenize, SaxHandler};
pub use writer::{save_to_path, write_rule, write_rules};

/// Root element of a configuration document.
pub const DOCUMENT_TAG: &str = "DESTConfig";
/// Element wrapping one rule.
pub const RECORD_TAG: &str = "ErrorRule";
pub const HEADER: &str = "<?xml version=\"1.0\"?>\n<DESTConfig>\n";
pub const FOOTER: &str = "</DESTConfig>\n";
/// Capacity of the per-tag text buffer.
pub const MAX_TAG_TEXT: usize = 256;

/// Child tags of a record, in the order they are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Drive,
    LbaStart,
    LbaEnd,
    Opcode,
    ErrorType,
    Error,
    ScsiStatus,
    ValidLba,
    Deferred,
    NumInsert,
    Frequency,
    RandomFrequency,
    ReactGapType,
    ReactGapMsecs,
    ReactGapIoCount,
    RandomGap,
    MaxRandMsecs,
    MaxRandIoCount,
    NumReactivate,
    RandomReactivate,
    DelayMsec,
    GlitchTime,
    InjectOnSend,
}

pub static TAGS: &[(&str, Tag)] = &[
    ("Drive", Tag::Drive),
    ("LbaStart", Tag::LbaStart),
    ("LbaEnd", Tag::LbaEnd),
    ("Opcode", Tag::Opcode),
    ("ErrorType", Tag::ErrorType),
    ("Error", Tag::Error),
    ("ScsiStatus", Tag::ScsiStatus),
    ("ValidLba", Tag::ValidLba),
    ("Deferred", Tag::Deferred),
    ("NumInsert", Tag::NumInsert),
    ("Frequency", Tag::Frequency),
    ("RandomFrequency", Tag::RandomFrequency),
    ("ReactGapType", Tag::ReactGapType),
    ("ReactGapMsecs", Tag::ReactGapMsecs),
    ("ReactGapIoCount", Tag::ReactGapIoCount),
    ("RandomGap", Tag::RandomGap),
    ("MaxRandMsecs", Tag::MaxRandMsecs),
    ("MaxRandIoCount", Tag::MaxRandIoCount),
    ("NumReactivate", Tag::NumReactivate),
    ("RandomReactivate", Tag::RandomReactivate),
    ("DelayMsec", Tag::DelayMsec),
    ("GlitchTime", Tag::GlitchTime),
    ("InjectOnSend", Tag::InjectOnSend),
];

impl Tag {
    pub fn name(self) -> &'static str {
        TAGS.iter()
            .find(|(_, t)| *t == self)
            .map_or("", |(name, _)| name)
    }
}

pub fn lookup_tag(name: &str) -> Option<Tag> {
    TAGS.iter().find(|(n, _)| *n == name).map(|(_, t)| *t)
}

/// Escape text for element content.
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Errors that abort a load.  Rules submitted before the error stay in place.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("could not read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed XML at line {line}: {message}")]
    Malformed { line: usize, message: String },

    #[error(transparent)]
    Service(#[from] ServiceError),
}

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("could not write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Service(#[from] ServiceError),
}

/// Counts from one load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Records accepted by the service.
    pub loaded: usize,
    /// Records dropped for validation, topology or duplicate errors.
    pub skipped: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_table_round_trip() {
        for (name, tag) in TAGS {
            assert_eq!(lookup_tag(name), Some(*tag));
            assert_eq!(tag.name(), *name);
        }
        assert_eq!(lookup_tag("errorrule"), None);
        assert_eq!(lookup_tag(RECORD_TAG), None);
    }

    #[test]
    fn escaping() {
        assert_eq!(escape_text("a<b>&c"), "a&lt;b&gt;&amp;c");
        assert_eq!(escape_text("0_0_5"), "0_0_5");
    }
}
