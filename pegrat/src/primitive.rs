//! Leaf parsers: plain text, case-insensitive text, rune ranges, regular
//! expressions and insignificant whitespace.

use crate::context::Context;
use crate::error::GrammarError;
use crate::node::{Node, COMMENT};
use crate::parser::{Body, Parser, Parsing};
use crate::runeset::RuneSet;
use crate::rx::Rx;

/// Matches the literal `text` exactly.
pub fn text(literal: impl Into<String>) -> Parser {
    Parser::build(Body::Text {
        literal: literal.into(),
    })
}

/// Matches `text` without regard to case. The comparison strategy (ASCII or
/// full Unicode folding) is chosen at construction.
pub fn ignore_case(literal: impl Into<String>) -> Parser {
    let literal = literal.into();
    let ascii = literal.is_ascii();
    let folded = if ascii {
        literal.to_ascii_lowercase()
    } else {
        literal.to_lowercase()
    };
    Parser::build(Body::IgnoreCase {
        literal,
        folded,
        ascii,
    })
}

/// Greedily matches between `min` and `max` runes from `set`.
pub fn char_range(set: RuneSet, min: usize, max: usize) -> Parser {
    Parser::build(Body::CharRange { set, min, max })
}

/// Matches the regex anchored at the current location.
pub fn regexp(pattern: &str) -> Result<Parser, GrammarError> {
    Ok(Parser::build(Body::RegExp {
        rx: Rx::new(pattern)?,
    }))
}

/// Always matches (possibly empty), consuming `(ws (comment ws)*)?`.
///
/// At most one distinct non-empty comment regex may exist per grammar; the
/// conflict is detected when the grammar is bound. With `keep_comments`,
/// spans that contain a comment yield a `comment__` node instead of being
/// dropped.
pub fn whitespace(
    ws: &str,
    comment: &str,
    keep_comments: bool,
) -> Result<Parser, GrammarError> {
    let (pattern, comment_rx) = if comment.is_empty() {
        (format!("(?:{ws})?"), None)
    } else {
        (
            format!("(?:(?:{ws})(?:(?:{comment})(?:{ws}))*)?"),
            Some(Rx::new(comment)?),
        )
    };
    Ok(Parser::build(Body::Whitespace {
        rx: Rx::new(&pattern)?,
        comment: comment_rx,
        keep_comments,
    }))
}

pub(crate) fn parse_text(
    parser: &Parser,
    ctx: &Context,
    location: usize,
    literal: &str,
) -> Parsing {
    let doc = ctx.document();
    if doc.as_str()[location..].starts_with(literal) {
        let stop = location + literal.len();
        let node = if parser.drop_content() {
            Node::empty()
        } else {
            Node::leaf(parser.node_name(), doc.sub(location, stop))
        };
        Ok((Some(node), stop))
    } else {
        Ok((None, location))
    }
}

pub(crate) fn parse_ignore_case(
    parser: &Parser,
    ctx: &Context,
    location: usize,
    folded: &str,
    ascii: bool,
) -> Parsing {
    let doc = ctx.document();
    let rest = &doc.as_str()[location..];
    // byte-wise comparison; `folded.len()` need not be a char boundary of
    // `rest` when the text starts with a multi-byte rune
    let consumed = if ascii {
        (rest.len() >= folded.len()
            && rest.as_bytes()[..folded.len()].eq_ignore_ascii_case(folded.as_bytes()))
        .then_some(folded.len())
    } else {
        match_folded(rest, folded)
    };
    match consumed {
        Some(len) => {
            let stop = location + len;
            let node = if parser.drop_content() {
                Node::empty()
            } else {
                Node::leaf(parser.node_name(), doc.sub(location, stop))
            };
            Ok((Some(node), stop))
        }
        None => Ok((None, location)),
    }
}

/// Compares `rest` against the pre-lowercased `folded`, rune by rune, and
/// returns the number of source bytes consumed on success.
fn match_folded(rest: &str, folded: &str) -> Option<usize> {
    let mut expected = folded.chars().peekable();
    let mut consumed = 0;
    for c in rest.chars() {
        if expected.peek().is_none() {
            break;
        }
        for low in c.to_lowercase() {
            if expected.next() != Some(low) {
                return None;
            }
        }
        consumed += c.len_utf8();
    }
    expected.peek().is_none().then_some(consumed)
}

pub(crate) fn parse_char_range(
    parser: &Parser,
    ctx: &Context,
    location: usize,
    set: &RuneSet,
    min: usize,
    max: usize,
) -> Parsing {
    let doc = ctx.document();
    let mut consumed = 0;
    let mut count = 0;
    for c in doc.as_str()[location..].chars() {
        if count >= max || !set.contains(c) {
            break;
        }
        consumed += c.len_utf8();
        count += 1;
    }
    if count < min {
        return Ok((None, location));
    }
    let stop = location + consumed;
    let node = leaf_or_empty(parser, ctx, location, stop);
    Ok((Some(node), stop))
}

pub(crate) fn parse_regexp(parser: &Parser, ctx: &Context, location: usize, rx: &Rx) -> Parsing {
    let doc = ctx.document();
    match doc.match_len_at(rx, location) {
        Some(len) => {
            let stop = location + len;
            let node = leaf_or_empty(parser, ctx, location, stop);
            Ok((Some(node), stop))
        }
        None => Ok((None, location)),
    }
}

fn leaf_or_empty(parser: &Parser, ctx: &Context, start: usize, stop: usize) -> Node {
    if parser.drop_content() || (start == stop && parser.is_disposable()) {
        Node::empty()
    } else {
        Node::leaf(parser.node_name(), ctx.document().sub(start, stop))
    }
}

pub(crate) fn parse_whitespace(
    parser: &Parser,
    ctx: &Context,
    location: usize,
    rx: &Rx,
    comment: Option<&Rx>,
    keep_comments: bool,
) -> Parsing {
    let doc = ctx.document();
    let len = doc.match_len_at(rx, location).unwrap_or(0);
    let stop = location + len;
    if keep_comments && len > 0 {
        if let Some(comment_rx) = comment {
            let contains_comment = doc
                .find_from(comment_rx, location, len)
                .is_some_and(|(start, _)| start < stop);
            if contains_comment {
                let node = Node::leaf(COMMENT, doc.sub(location, stop));
                return Ok((Some(node), stop));
            }
        }
    }
    let node = if parser.drop_content() || parser.is_disposable() {
        Node::empty()
    } else {
        Node::leaf(parser.node_name(), doc.sub(location, stop))
    };
    Ok((Some(node), stop))
}
