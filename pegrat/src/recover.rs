//! Syntax-error catching: reentry-point search, error-message selection and
//! the propagation protocol that rewrites partial trees while unwinding.

use std::fmt;

use crate::context::Context;
use crate::error::{
    Error, GrammarError, ERROR_WHILE_RECOVERING, MANDATORY_CONTINUATION,
    MANDATORY_CONTINUATION_AT_EOF,
};
use crate::node::Node;
use crate::parser::{Parser, Parsing};
use crate::rx::Rx;
use crate::slice::StringSlice;

/// How far a found-snippet in an error message may run, in runes.
const SNIPPET_RUNES: usize = 20;

/// A way of finding (or producing) the position where parsing continues
/// after a syntax error.
///
/// Regex, string and procedure matchers are *locators*: they search forward
/// for the next position where their pattern matches, and parsing reenters
/// at the start of that match. Parser matchers are *consumers*: they are
/// applied at the failure offset and parsing reenters behind what they
/// consumed.
#[derive(Clone)]
pub enum Matcher {
    Rx(Rx),
    Str(String),
    Func(fn(&str) -> Option<usize>),
    Parser(Parser),
}

/// Locator for the next match of a regex.
pub fn at_rx(pattern: &str) -> Result<Matcher, GrammarError> {
    Ok(Matcher::Rx(Rx::new(pattern)?))
}

/// Locator for the next occurrence of a literal string.
pub fn at_str(literal: impl Into<String>) -> Matcher {
    Matcher::Str(literal.into())
}

/// Locator driven by a procedure. The procedure receives the text from the
/// search position onwards and answers with a relative offset.
pub fn at_func(f: fn(&str) -> Option<usize>) -> Matcher {
    Matcher::Func(f)
}

/// Consumer: applies `parser` at the failure offset and reenters behind its
/// match.
pub fn passage(parser: Parser) -> Matcher {
    Matcher::Parser(parser)
}

/// Consumer: reenters behind what `parser` absorbed. Same mechanics as
/// [`passage`]; the name reads better for delimiter parsers.
pub fn after(parser: Parser) -> Matcher {
    passage(parser)
}

/// Sentinel consumer that absorbs nothing: parsing reenters exactly at the
/// failure offset.
pub fn any_passage() -> Matcher {
    Matcher::Func(|_| Some(0))
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Rx(rx) => write!(f, "at({rx})"),
            Matcher::Str(s) => write!(f, "at({s:?})"),
            Matcher::Func(_) => write!(f, "at(<proc>)"),
            Matcher::Parser(p) => write!(f, "passage({p})"),
        }
    }
}

/// Skip, resume and error-message lists attached to a parser.
#[derive(Clone, Default)]
pub(crate) struct RecoverySpec {
    pub(crate) skip: Vec<Matcher>,
    pub(crate) resume: Vec<Matcher>,
    pub(crate) errors: Vec<(Matcher, String)>,
}

/// The recoverable parse interrupt: a syntax error unwinding towards an
/// ancestor with a resume list (or the root).
#[derive(Debug)]
pub(crate) struct Recovery {
    /// The partially built tree of the failed region.
    pub(crate) node: Node,
    /// Bytes of text covered by `node`.
    pub(crate) node_len: usize,
    /// Offset at which the original failure occurred.
    pub(crate) fail_loc: usize,
    pub(crate) error: Error,
    pub(crate) first_throw: bool,
}

impl Recovery {
    fn start(&self) -> usize {
        self.fail_loc - self.node_len
    }
}

/// Binds `(matcher, message)` pairs to the single active error-catching
/// parser beneath `parser`. A leading `"<code>:"` on a message overrides
/// the error code; `{0}` and `{1}` expand to the expected parser and the
/// found snippet.
pub fn set_errors(parser: &Parser, pairs: Vec<(Matcher, String)>) -> Result<(), GrammarError> {
    single_catcher(parser)?.set_error_messages(pairs);
    Ok(())
}

/// Binds skip locators to the single active error-catching parser beneath
/// `parser`: after a mandatory violation, the series continues behind the
/// closest match.
pub fn skip_until(parser: &Parser, matchers: Vec<Matcher>) -> Result<(), GrammarError> {
    single_catcher(parser)?.set_skip(matchers);
    Ok(())
}

/// Attaches resume locators to `parser` itself: when a descendant raises a
/// syntax error, `parser` repairs the tree and continues behind the closest
/// match.
pub fn resume(parser: &Parser, matchers: Vec<Matcher>) {
    parser.set_resume(matchers);
}

fn single_catcher(parser: &Parser) -> Result<Parser, GrammarError> {
    let mut catchers = parser.find_error_catchers();
    match catchers.len() {
        0 => Err(GrammarError::NoErrorCatcher(parser.to_string())),
        1 => Ok(catchers.remove(0)),
        _ => Err(GrammarError::AmbiguousErrorCatcher(parser.to_string())),
    }
}

/// Finds the closest reentry point for `matchers` at or behind `fail`,
/// within the grammar's search window. Locator matches inside comments are
/// skipped.
pub(crate) fn reentry_point(ctx: &Context, matchers: &[Matcher], fail: usize) -> Option<usize> {
    let doc = ctx.document();
    let window = ctx.search_window();
    let mut closest: Option<usize> = None;
    for matcher in matchers {
        let candidate = match matcher {
            Matcher::Rx(rx) => locate_outside_comments(ctx, &doc, fail, window, |from, win| {
                doc.find_from(rx, from, win).map(|(start, _)| start)
            }),
            Matcher::Str(literal) => {
                locate_outside_comments(ctx, &doc, fail, window, |from, win| {
                    doc.find_str_from(literal, from, win)
                })
            }
            Matcher::Func(f) => f(&doc.as_str()[fail..]).map(|offset| fail + offset),
            Matcher::Parser(consumer) => match consumer.call(ctx, fail) {
                Ok((Some(_), next)) => Some(next),
                _ => None,
            },
        };
        if let Some(pos) = candidate {
            if closest.is_none_or(|best| pos < best) {
                closest = Some(pos);
            }
        }
    }
    closest
}

/// Runs `find` repeatedly, skipping results that lie inside a comment.
fn locate_outside_comments(
    ctx: &Context,
    doc: &StringSlice,
    fail: usize,
    window: usize,
    find: impl Fn(usize, usize) -> Option<usize>,
) -> Option<usize> {
    let comment_rx = ctx.comment_rx();
    let mut from = fail;
    loop {
        let budget = window.checked_sub(from - fail)?;
        let pos = find(from, budget)?;
        match enclosing_comment(doc, &comment_rx, fail, pos) {
            Some(comment_end) if comment_end > from => from = comment_end,
            Some(_) => return None,
            None => return Some(pos),
        }
    }
}

/// The comment that covers `pos`, if any, scanning forward from `scan`.
fn enclosing_comment(
    doc: &StringSlice,
    comment_rx: &Rx,
    scan: usize,
    pos: usize,
) -> Option<usize> {
    let mut at = scan;
    while at <= pos {
        // comments may extend past `pos`, so search to the end of the text
        let (start, end) = doc.find_from(comment_rx, at, doc.len() - at)?;
        if start > pos {
            return None;
        }
        if pos < end {
            return Some(end);
        }
        at = end.max(at + 1);
    }
    None
}

/// Selects the message for a mandatory violation, records the error and
/// returns it.
pub(crate) fn violation_error(
    ctx: &Context,
    catcher: &Parser,
    expected: &Parser,
    fail: usize,
    was_lookahead: bool,
    reentry: Option<usize>,
) -> Error {
    let doc = ctx.document();
    let template = catcher
        .recovery()
        .errors
        .into_iter()
        .find(|(matcher, _)| matcher_hits(ctx, matcher, fail))
        .map(|(_, message)| message);
    let mut code = if ctx.recovering() {
        ERROR_WHILE_RECOVERING
    } else if was_lookahead && fail >= doc.len() {
        MANDATORY_CONTINUATION_AT_EOF
    } else {
        MANDATORY_CONTINUATION
    };
    let mut message =
        template.unwrap_or_else(|| "{0} expected, but \u{bb}{1}\u{ab} found".to_string());
    if let Some(colon) = message.find(':') {
        let prefix = &message[..colon];
        if !prefix.is_empty() && prefix.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(custom) = prefix.parse::<u16>() {
                code = custom;
                message = message[colon + 1..].to_string();
            }
        }
    }
    let message = message
        .replace("{0}", &expected.to_string())
        .replace("{1}", &snippet(&doc, fail));
    let length = reentry
        .map(|re| re.saturating_sub(fail))
        .filter(|&len| len > 0)
        .unwrap_or(1);
    let error = Error::new(code, message, fail).with_length(length);
    ctx.report(error.clone());
    error
}

/// Whether a matcher matches directly at `pos` (used for error-message
/// selection, not for searching).
fn matcher_hits(ctx: &Context, matcher: &Matcher, pos: usize) -> bool {
    let doc = ctx.document();
    match matcher {
        Matcher::Rx(rx) => doc.match_len_at(rx, pos).is_some(),
        Matcher::Str(literal) => doc.as_str()[pos..].starts_with(literal.as_str()),
        Matcher::Func(f) => f(&doc.as_str()[pos..]) == Some(0),
        Matcher::Parser(parser) => matches!(parser.call(ctx, pos), Ok((Some(_), _))),
    }
}

fn snippet(doc: &StringSlice, pos: usize) -> String {
    let rest = &doc.as_str()[pos.min(doc.len())..];
    if rest.is_empty() {
        return "end of file".to_string();
    }
    let mut out = String::new();
    for c in rest.chars().take(SNIPPET_RUNES) {
        if c == '\n' {
            break;
        }
        out.push(c);
    }
    out
}

/// The catch half of the protocol, run by the call wrapper of every parser
/// a [`Recovery`] unwinds through.
pub(crate) fn handle(
    catcher: &Parser,
    ctx: &Context,
    location: usize,
    interrupt: Recovery,
) -> Parsing {
    let resume_list = catcher.recovery().resume;
    let is_root = ctx.is_root(catcher);
    if !resume_list.is_empty() || is_root {
        ctx.enter_recovery();
        let found = reentry_point(ctx, &resume_list, interrupt.fail_loc);
        ctx.exit_recovery();
        // the root always resumes, at EOF if nowhere else
        let reentry = match found {
            Some(pos) => Some(pos),
            None if is_root => Some(ctx.document().len()),
            None => None,
        };
        if let Some(reentry) = reentry {
            return Ok(resume_at(catcher, ctx, location, interrupt, reentry));
        }
    }
    if interrupt.first_throw {
        // hand the unmodified partial tree to the next enclosing parser
        return Err(Recovery {
            first_throw: false,
            ..interrupt
        });
    }
    let doc = ctx.document();
    let gap = interrupt.start() - location;
    let mut children = Vec::new();
    if gap > 0 {
        children.push(Node::zombie(doc.sub(location, interrupt.start())).with_pos(location));
    }
    let node_len = interrupt.node_len + gap;
    children.push(interrupt.node);
    Err(Recovery {
        node: Node::branch(catcher.node_name(), children),
        node_len,
        fail_loc: interrupt.fail_loc,
        error: interrupt.error,
        first_throw: false,
    })
}

/// Builds the repaired tree at a resumption point: the skipped span becomes
/// a zombie leaf, and unless the raising parser itself resumes, the partial
/// tree (plus any gap) is wrapped under the resumer's node name.
fn resume_at(
    catcher: &Parser,
    ctx: &Context,
    location: usize,
    interrupt: Recovery,
    reentry: usize,
) -> (Option<Node>, usize) {
    let doc = ctx.document();
    let skip = doc.sub(interrupt.fail_loc, reentry);
    if interrupt.first_throw {
        let mut node = interrupt.node;
        if !skip.is_empty() {
            node.push_child(Node::zombie(skip).with_pos(interrupt.fail_loc));
        }
        (Some(node), reentry)
    } else {
        let mut children = Vec::new();
        if interrupt.start() > location {
            children.push(Node::zombie(doc.sub(location, interrupt.start())).with_pos(location));
        }
        let fail_loc = interrupt.fail_loc;
        children.push(interrupt.node);
        if !skip.is_empty() {
            children.push(Node::zombie(skip).with_pos(fail_loc));
        }
        (Some(Node::branch(catcher.node_name(), children)), reentry)
    }
}
