//! Document identifiers.
//!
//! The document service addresses documents by a 128-bit id that appears
//! in two spellings: dashed (`2131b10c-ebf6-4938-a127-7089ff02dbe4`) and
//! compact (`2131b10cebf64938a1277089ff02dbe4`). [`DocumentId`] stores the
//! compact lowercase form so ids compare equal regardless of the spelling
//! they arrived in.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Length of a compact document id in hex characters.
const ID_LEN: usize = 32;

/// Normalized document identifier (32 lowercase hex characters).
///
/// Construct via [`FromStr`], which accepts both the dashed and the
/// compact spelling. Serializes as a plain string.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentId(String);

/// Error returned when a string is not a valid document id.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("invalid document id: '{0}'")]
pub struct ParseIdError(String);

impl DocumentId {
    /// View the id as its compact lowercase hex form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for DocumentId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let compact: String = s
            .chars()
            .filter(|c| *c != '-')
            .map(|c| c.to_ascii_lowercase())
            .collect();
        if compact.len() == ID_LEN && compact.chars().all(|c| c.is_ascii_hexdigit()) {
            Ok(Self(compact))
        } else {
            Err(ParseIdError(s.to_owned()))
        }
    }
}

impl TryFrom<String> for DocumentId {
    type Error = ParseIdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<DocumentId> for String {
    fn from(id: DocumentId) -> Self {
        id.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Extract a document id from a service URL.
///
/// Document URLs end in a slug whose final segment is the id, e.g.
/// `https://docs.example.com/Advanced-spidering-ea07db1b9bff415ab180b0525f3898f6`.
/// Returns `None` when the URL does not end in a valid id, which is how
/// callers distinguish cross-document links from external ones.
#[must_use]
pub fn extract_id_from_url(url: &str) -> Option<DocumentId> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let segment = path.trim_end_matches('/').rsplit('/').next()?;
    // The id is the trailing run of the slug, after the last dash in the
    // dashed-title spelling, or the whole segment for bare ids.
    let tail = segment.rsplit('-').next().unwrap_or(segment);
    if tail.len() == ID_LEN {
        tail.parse().ok()
    } else {
        segment.parse().ok()
    }
}
