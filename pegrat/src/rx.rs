//! Compiled regular expressions with the two operations the runtime needs:
//! an anchored match at a byte offset and a windowed forward search.

use std::fmt;

use regex_automata::meta::Regex;
use regex_automata::{Anchored, Input};

use crate::error::GrammarError;

#[derive(Debug, Clone)]
pub struct Rx {
    pattern: String,
    re: Regex,
}

impl Rx {
    pub fn new(pattern: &str) -> Result<Self, GrammarError> {
        let re = Regex::new(pattern).map_err(|err| GrammarError::BadRegex {
            pattern: pattern.to_string(),
            reason: err.to_string(),
        })?;
        Ok(Self {
            pattern: pattern.to_string(),
            re,
        })
    }

    /// A regex that matches nowhere. `\b\B` demands a position that both is
    /// and is not a word boundary.
    pub fn never() -> Self {
        match Self::new(r"\b\B") {
            Ok(rx) => rx,
            Err(_) => panic!("internal error: never-match regex failed to compile"),
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Length of a match starting exactly at `start`, confined to
    /// `hay[..end]`. `Some(0)` is a valid empty match.
    pub fn match_len_at(&self, hay: &str, start: usize, end: usize) -> Option<usize> {
        let input = Input::new(hay).range(start..end).anchored(Anchored::Yes);
        self.re.find(input).map(|m| m.len())
    }

    /// First match within `hay[start..end]`, unanchored. Returns absolute
    /// byte offsets.
    pub fn find_in(&self, hay: &str, start: usize, end: usize) -> Option<(usize, usize)> {
        let input = Input::new(hay).range(start..end);
        self.re.find(input).map(|m| (m.start(), m.end()))
    }
}

impl PartialEq for Rx {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
    }
}

impl Eq for Rx {}

impl fmt::Display for Rx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/", self.pattern)
    }
}
