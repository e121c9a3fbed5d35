//! Zero-copy views over a shared, immutable document buffer.

use std::fmt;
use std::rc::Rc;

use crate::rx::Rx;

/// A `(buffer, start, stop)` view with inclusive-exclusive byte offsets.
///
/// Slices compare by content, not by buffer identity, and all regex
/// operations run on the underlying buffer without copying.
#[derive(Clone)]
pub struct StringSlice {
    buf: Rc<str>,
    start: usize,
    stop: usize,
}

impl StringSlice {
    pub fn new(buf: Rc<str>) -> Self {
        let stop = buf.len();
        Self { buf, start: 0, stop }
    }

    pub fn as_str(&self) -> &str {
        &self.buf[self.start..self.stop]
    }

    pub fn len(&self) -> usize {
        self.stop - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.stop
    }

    /// A sub-view; `start` and `stop` are relative to this slice.
    pub fn sub(&self, start: usize, stop: usize) -> Self {
        assert!(
            start <= stop && self.start + stop <= self.stop,
            "internal error: slice bounds {start}..{stop} out of range"
        );
        Self {
            buf: self.buf.clone(),
            start: self.start + start,
            stop: self.start + stop,
        }
    }

    /// Concatenation that stays zero-copy when `other` directly follows
    /// `self` in the same buffer.
    pub fn concat(&self, other: &StringSlice) -> StringSlice {
        if Rc::ptr_eq(&self.buf, &other.buf) && self.stop == other.start {
            StringSlice {
                buf: self.buf.clone(),
                start: self.start,
                stop: other.stop,
            }
        } else {
            let mut owned = String::with_capacity(self.len() + other.len());
            owned.push_str(self.as_str());
            owned.push_str(other.as_str());
            StringSlice::from(owned.as_str())
        }
    }

    /// Length of a match of `rx` starting exactly at `pos` (relative to this
    /// slice), confined to the slice.
    pub fn match_len_at(&self, rx: &Rx, pos: usize) -> Option<usize> {
        rx.match_len_at(&self.buf, self.start + pos, self.stop)
    }

    /// First match of `rx` within `[pos, pos + window)` of this slice.
    /// Offsets in the result are relative to the slice.
    pub fn find_from(&self, rx: &Rx, pos: usize, window: usize) -> Option<(usize, usize)> {
        let from = self.start + pos;
        let to = self.stop.min(from.saturating_add(window));
        rx.find_in(&self.buf, from, to)
            .map(|(s, e)| (s - self.start, e - self.start))
    }

    /// First occurrence of the literal `needle` within `[pos, pos + window)`.
    pub fn find_str_from(&self, needle: &str, pos: usize, window: usize) -> Option<usize> {
        let text = self.as_str();
        let mut to = self.len().min(pos.saturating_add(window));
        // the window edge may fall inside a multi-byte rune
        while to > pos && !text.is_char_boundary(to) {
            to -= 1;
        }
        text[pos..to].find(needle).map(|i| pos + i)
    }

    /// 1-based line and rune column of a byte offset.
    pub fn line_col(&self, pos: usize) -> (u32, u32) {
        let text = &self.as_str()[..pos.min(self.len())];
        let line = text.bytes().filter(|&b| b == b'\n').count() as u32 + 1;
        let line_start = text.rfind('\n').map(|i| i + 1).unwrap_or(0);
        let column = text[line_start..].chars().count() as u32 + 1;
        (line, column)
    }
}

impl From<&str> for StringSlice {
    fn from(text: &str) -> Self {
        Self::new(Rc::from(text))
    }
}

impl PartialEq for StringSlice {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for StringSlice {}

impl PartialEq<&str> for StringSlice {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl fmt::Display for StringSlice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for StringSlice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}[{}..{}]", self.as_str(), self.start, self.stop)
    }
}
