//! Sorted, non-overlapping rune-range collections with set algebra.

use std::fmt;
use std::ops::{BitAnd, BitOr, Not, Sub};

use regex_syntax::hir::{Class, HirKind};

use crate::error::GrammarError;

const MAX_RUNE: u32 = 0x10FFFF;
const SURROGATE_LO: u32 = 0xD800;
const SURROGATE_HI: u32 = 0xDFFF;

/// A set of runes stored as sorted, non-overlapping, non-adjacent inclusive
/// ranges, with a bitmap fast path for ASCII membership tests.
#[derive(Clone, PartialEq, Eq)]
pub struct RuneSet {
    ranges: Vec<(u32, u32)>,
    ascii: [u64; 2],
}

impl RuneSet {
    pub fn new<I: IntoIterator<Item = (char, char)>>(ranges: I) -> Self {
        let raw = ranges
            .into_iter()
            .map(|(lo, hi)| (lo as u32, hi as u32))
            .collect();
        Self::from_raw(raw)
    }

    /// Parses a regex character class such as `[a-zA-Z_]` or `[^0-9]`.
    pub fn from_class(pattern: &str) -> Result<Self, GrammarError> {
        let bad = |reason: &str| GrammarError::BadCharClass {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        };
        let hir = regex_syntax::parse(pattern).map_err(|err| GrammarError::BadCharClass {
            pattern: pattern.to_string(),
            reason: err.to_string(),
        })?;
        match hir.kind() {
            HirKind::Class(Class::Unicode(cls)) => Ok(Self::from_raw(
                cls.ranges()
                    .iter()
                    .map(|r| (r.start() as u32, r.end() as u32))
                    .collect(),
            )),
            HirKind::Class(Class::Bytes(cls)) => Ok(Self::from_raw(
                cls.ranges()
                    .iter()
                    .map(|r| (r.start() as u32, r.end() as u32))
                    .collect(),
            )),
            HirKind::Literal(lit) => {
                let text = std::str::from_utf8(&lit.0)
                    .map_err(|_| bad("not a character class"))?;
                let mut chars = text.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(Self::new([(c, c)])),
                    _ => Err(bad("not a character class")),
                }
            }
            _ => Err(bad("not a character class")),
        }
    }

    fn from_raw(mut raw: Vec<(u32, u32)>) -> Self {
        raw.retain(|&(lo, hi)| lo <= hi);
        raw.sort_unstable();
        let mut ranges: Vec<(u32, u32)> = Vec::with_capacity(raw.len());
        for (lo, hi) in raw {
            match ranges.last_mut() {
                Some(last) if lo <= last.1.saturating_add(1) => last.1 = last.1.max(hi),
                _ => ranges.push((lo, hi)),
            }
        }
        let mut ascii = [0u64; 2];
        for &(lo, hi) in &ranges {
            let mut c = lo;
            while c <= hi && c < 128 {
                ascii[(c / 64) as usize] |= 1 << (c % 64);
                c += 1;
            }
        }
        Self { ranges, ascii }
    }

    pub fn contains(&self, c: char) -> bool {
        let c = c as u32;
        if c < 128 {
            return self.ascii[(c / 64) as usize] & (1 << (c % 64)) != 0;
        }
        self.ranges
            .binary_search_by(|&(lo, hi)| {
                if c < lo {
                    std::cmp::Ordering::Greater
                } else if c > hi {
                    std::cmp::Ordering::Less
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .is_ok()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Number of runes in the set.
    pub fn count(&self) -> u64 {
        self.ranges
            .iter()
            .map(|&(lo, hi)| (hi - lo + 1) as u64)
            .sum()
    }

    pub fn ranges(&self) -> impl Iterator<Item = (char, char)> + '_ {
        self.ranges.iter().filter_map(|&(lo, hi)| {
            Some((char::from_u32(lo)?, char::from_u32(hi)?))
        })
    }

    pub fn union(&self, other: &RuneSet) -> RuneSet {
        let mut raw = self.ranges.clone();
        raw.extend_from_slice(&other.ranges);
        Self::from_raw(raw)
    }

    pub fn intersection(&self, other: &RuneSet) -> RuneSet {
        let mut raw = Vec::new();
        let (mut i, mut j) = (0, 0);
        while i < self.ranges.len() && j < other.ranges.len() {
            let (alo, ahi) = self.ranges[i];
            let (blo, bhi) = other.ranges[j];
            let lo = alo.max(blo);
            let hi = ahi.min(bhi);
            if lo <= hi {
                raw.push((lo, hi));
            }
            if ahi < bhi {
                i += 1;
            } else {
                j += 1;
            }
        }
        Self::from_raw(raw)
    }

    pub fn difference(&self, other: &RuneSet) -> RuneSet {
        self.intersection(&other.negated())
    }

    /// Complement over the valid Unicode scalar values.
    pub fn negated(&self) -> RuneSet {
        let mut raw = Vec::with_capacity(self.ranges.len() + 1);
        let mut next = 0u32;
        for &(lo, hi) in &self.ranges {
            if next < lo {
                raw.push((next, lo - 1));
            }
            next = hi.saturating_add(1);
        }
        if next <= MAX_RUNE {
            raw.push((next, MAX_RUNE));
        }
        // drop the surrogate gap
        let no_surrogates = raw
            .into_iter()
            .flat_map(|(lo, hi)| {
                if hi < SURROGATE_LO || lo > SURROGATE_HI {
                    vec![(lo, hi)]
                } else {
                    let mut parts = Vec::new();
                    if lo < SURROGATE_LO {
                        parts.push((lo, SURROGATE_LO - 1));
                    }
                    if hi > SURROGATE_HI {
                        parts.push((SURROGATE_HI + 1, hi));
                    }
                    parts
                }
            })
            .collect();
        Self::from_raw(no_surrogates)
    }
}

impl BitOr for &RuneSet {
    type Output = RuneSet;
    fn bitor(self, rhs: &RuneSet) -> RuneSet {
        self.union(rhs)
    }
}

impl BitAnd for &RuneSet {
    type Output = RuneSet;
    fn bitand(self, rhs: &RuneSet) -> RuneSet {
        self.intersection(rhs)
    }
}

impl Sub for &RuneSet {
    type Output = RuneSet;
    fn sub(self, rhs: &RuneSet) -> RuneSet {
        self.difference(rhs)
    }
}

impl Not for &RuneSet {
    type Output = RuneSet;
    fn not(self) -> RuneSet {
        self.negated()
    }
}

impl fmt::Debug for RuneSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for &(lo, hi) in &self.ranges {
            match (char::from_u32(lo), char::from_u32(hi)) {
                (Some(a), Some(_)) if lo == hi => write!(f, "{a:?}")?,
                (Some(a), Some(b)) => write!(f, "{a:?}-{b:?}")?,
                _ => write!(f, "\\u{{{lo:x}}}-\\u{{{hi:x}}}")?,
            }
        }
        write!(f, "]")
    }
}
