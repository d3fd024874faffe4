//! Self-describing cache records and their log serialization.
//!
//! A record is a kind tag plus ordered, named fields. Records are stored
//! in a plain-text, append-only log:
//!
//! ```text
//! @rec <kind> <field-count>
//! <field-name>:<value-len>
//! <value bytes>
//! ```
//!
//! Every value is length-prefixed, so payloads may contain newlines or
//! arbitrary text (program output frequently does). Field names are
//! explicit rather than positional so old logs keep loading when fields
//! are added.

use std::io::{BufRead, Read, Write};

use crate::CacheError;

/// Header marker for the start of a record.
const REC_MARKER: &str = "@rec";

/// One record in the cache log: a kind tag plus named fields in order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Record {
    pub kind: String,
    pub fields: Vec<(String, String)>,
}

impl Record {
    /// Create a record with the given kind and no fields yet.
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            fields: Vec::new(),
        }
    }

    /// Append a named field.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    /// Value of the first field with the given name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Like [`get`](Self::get) but a missing or empty field is a
    /// [`CacheError::Malformed`] naming the record kind.
    pub fn get_required(&self, name: &str) -> Result<&str, CacheError> {
        match self.get(name) {
            Some(v) if !v.is_empty() => Ok(v),
            _ => Err(CacheError::Malformed(format!(
                "record '{}' is missing required field '{name}'",
                self.kind
            ))),
        }
    }

    /// Serialize this record to the log format.
    pub fn write_to(&self, w: &mut impl Write) -> std::io::Result<()> {
        writeln!(w, "{REC_MARKER} {} {}", self.kind, self.fields.len())?;
        for (name, value) in &self.fields {
            writeln!(w, "{name}:{}", value.len())?;
            w.write_all(value.as_bytes())?;
            w.write_all(b"\n")?;
        }
        Ok(())
    }

    /// Read the next record from the log, or `None` at end of input.
    pub fn read_from(r: &mut impl BufRead) -> Result<Option<Self>, CacheError> {
        let mut header = String::new();
        if r.read_line(&mut header)? == 0 {
            return Ok(None);
        }
        let header = header.trim_end_matches('\n');
        let mut parts = header.splitn(3, ' ');
        let (marker, kind, count) = (parts.next(), parts.next(), parts.next());
        if marker != Some(REC_MARKER) {
            return Err(CacheError::Malformed(format!(
                "expected record header, got '{header}'"
            )));
        }
        let kind = kind
            .filter(|k| !k.is_empty())
            .ok_or_else(|| CacheError::Malformed(format!("header '{header}' has no kind")))?;
        let count: usize = count
            .and_then(|c| c.parse().ok())
            .ok_or_else(|| CacheError::Malformed(format!("header '{header}' has no field count")))?;

        let mut fields = Vec::with_capacity(count);
        for _ in 0..count {
            let mut name_line = String::new();
            if r.read_line(&mut name_line)? == 0 {
                return Err(CacheError::Malformed(format!(
                    "record '{kind}' truncated in field header"
                )));
            }
            let name_line = name_line.trim_end_matches('\n');
            let (name, len) = name_line.rsplit_once(':').ok_or_else(|| {
                CacheError::Malformed(format!("bad field header '{name_line}' in '{kind}'"))
            })?;
            let len: usize = len.parse().map_err(|_| {
                CacheError::Malformed(format!("bad field length in '{name_line}'"))
            })?;

            let mut value = vec![0u8; len];
            r.read_exact(&mut value).map_err(|_| {
                CacheError::Malformed(format!("record '{kind}' truncated in field '{name}'"))
            })?;
            let value = String::from_utf8(value).map_err(|_| {
                CacheError::Malformed(format!("field '{name}' in '{kind}' is not UTF-8"))
            })?;
            // consume the newline terminating the value
            let mut nl = [0u8; 1];
            r.read_exact(&mut nl).map_err(|_| {
                CacheError::Malformed(format!("record '{kind}' truncated after field '{name}'"))
            })?;
            if nl != *b"\n" {
                return Err(CacheError::Malformed(format!(
                    "field '{name}' in '{kind}' has a bad length prefix"
                )));
            }
            fields.push((name.to_owned(), value));
        }
        Ok(Some(Self {
            kind: kind.to_owned(),
            fields,
        }))
    }
}
