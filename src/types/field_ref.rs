use crate::error::Error;
use itertools::Itertools;
use std::{fmt, str::FromStr};

/// A parsed field reference.
///
/// Either a sequence of bracketed segments (`[a][b]`) or a bare name (`foo`),
/// which is sugar for a single segment. Bare names are taken literally, so
/// `event.created` addresses one top-level key.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct FieldRef {
    segments: Vec<String>,
}

impl FieldRef {
    pub fn parse(reference: &str) -> Result<Self, Error> {
        if reference.is_empty() {
            return Err(Error::invalid_ref(reference));
        }

        if !reference.starts_with('[') {
            if reference.contains(['[', ']']) {
                return Err(Error::invalid_ref(reference));
            }
            return Ok(Self {
                segments: vec![reference.to_owned()],
            });
        }

        let mut segments = Vec::new();
        let mut rest = reference;
        while !rest.is_empty() {
            let inner = rest
                .strip_prefix('[')
                .ok_or_else(|| Error::invalid_ref(reference))?;
            let end = inner.find(']').ok_or_else(|| Error::invalid_ref(reference))?;
            let segment = &inner[..end];
            if segment.is_empty() || segment.contains('[') {
                return Err(Error::invalid_ref(reference));
            }
            segments.push(segment.to_owned());
            rest = &inner[end + 1..];
        }

        Ok(Self { segments })
    }

    /// Never empty.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn root(&self) -> &str {
        self.segments.first().map(String::as_str).unwrap_or_default()
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.iter().map(|s| format!("[{s}]")).join(""))
    }
}

impl FromStr for FieldRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
