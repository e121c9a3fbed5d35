#![doc = include_str!("../../README.md")]

mod context;

pub mod combinator;
pub mod error;
pub mod node;
pub mod parser;
pub mod primitive;
pub mod recover;
pub mod recursive;
pub mod reduce;
pub mod runeset;
pub mod rx;
pub mod slice;

use std::rc::Rc;

pub use crate::combinator::{
    alternative, capture, interleave, lookahead, negative_lookahead, one_or_more, option, pop,
    repeat, required, retrieve, series, synonym, zero_or_more,
};
pub use crate::error::{Error, GrammarError};
pub use crate::node::Node;
pub use crate::parser::{assign, Parser};
pub use crate::primitive::{char_range, ignore_case, regexp, text, whitespace};
pub use crate::recover::{
    after, any_passage, at_func, at_rx, at_str, passage, resume, set_errors, skip_until, Matcher,
};
pub use crate::recursive::forward;
pub use crate::reduce::Reduction;
pub use crate::runeset::RuneSet;
pub use crate::slice::StringSlice;

use crate::context::Context;
use crate::error::PARSER_STOPPED_BEFORE_END;
use crate::parser::Body;

/// A parser graph bound to the per-run state it needs for evaluation.
///
/// Binding walks the graph once: forward declarations must be defined, the
/// grammar-wide comment regex is collected from the whitespace parsers, and
/// anonymous parsers learn which named symbol owns them. One grammar parses
/// one document at a time; binding the same graph twice shares the parsers'
/// memo tables, so use separate graphs for independent concurrent parses.
pub struct Grammar {
    root: Parser,
    ctx: Rc<Context>,
    parsers: Vec<Parser>,
}

impl Grammar {
    pub fn new(root: Parser) -> Result<Self, GrammarError> {
        let parsers = root.descendants();
        let ctx = Rc::new(Context::new());
        let mut comment: Option<rx::Rx> = None;
        for parser in &parsers {
            parser.with_body(|body| match body {
                Body::Forward(state) if state.inner().is_none() => {
                    Err(GrammarError::UndefinedForward(parser.to_string()))
                }
                Body::Whitespace {
                    comment: Some(rx), ..
                } => match &comment {
                    Some(first) if first.pattern() != rx.pattern() => {
                        Err(GrammarError::CommentConflict {
                            first: first.pattern().to_string(),
                            second: rx.pattern().to_string(),
                        })
                    }
                    Some(_) => Ok(()),
                    None => {
                        comment = Some(rx.clone());
                        Ok(())
                    }
                },
                _ => Ok(()),
            })?;
        }
        if let Some(rx) = comment {
            ctx.set_comment_rx(rx);
        }
        bind_symbols(&parsers);
        Ok(Self {
            root,
            ctx,
            parsers,
        })
    }

    /// Parses `document` from the beginning.
    pub fn parse(&self, document: &str) -> (Option<Node>, Vec<Error>) {
        self.parse_at(document, 0)
    }

    /// Parses `document` from byte offset `start`. Returns the root node
    /// (or `None` on a failed match) and the errors in detection order.
    pub fn parse_at(&self, document: &str, start: usize) -> (Option<Node>, Vec<Error>) {
        self.clean_up();
        self.ctx.set_document(StringSlice::from(document));
        self.ctx.set_root(&effective_root(&self.root));
        let start = start.min(document.len());
        let (node, next) = match self.root.call(&self.ctx, start) {
            Ok(result) => result,
            // the root resumes every interrupt; this arm is precautionary
            Err(interrupt) => (Some(interrupt.node), interrupt.fail_loc),
        };
        if node.is_some() {
            if next < document.len() {
                self.ctx.report(
                    Error::new(
                        PARSER_STOPPED_BEFORE_END,
                        format!("parser stopped before the end of the document, at offset {next}"),
                        next,
                    )
                    .with_length(document.len() - next),
                );
            }
        } else {
            let (position, message) = match self.ctx.farthest_failure() {
                Some((pos, parser)) => {
                    let owner = parser
                        .symbol()
                        .map(|symbol| format!(" in `{}`", symbol.name()))
                        .unwrap_or_default();
                    (pos, format!("parser {parser}{owner} did not match"))
                }
                None => (start, "parser did not match".to_string()),
            };
            self.ctx
                .report(Error::new(PARSER_STOPPED_BEFORE_END, message, position));
        }
        (node, self.ctx.errors())
    }

    /// Chooses the reduction strategy applied as parsers return.
    pub fn set_reduction(&self, reduction: Reduction) {
        self.ctx.set_reduction(reduction);
    }

    /// Turns the left-recursion driver off (or back on). With the driver
    /// off, forward parsers delegate directly and left-recursive grammars
    /// do not terminate.
    pub fn set_left_recursion(&self, on: bool) {
        self.ctx.set_left_recursion(on);
    }

    /// Width of the reentry search window in bytes.
    pub fn set_search_window(&self, bytes: usize) {
        self.ctx.set_search_window(bytes);
    }

    fn clean_up(&self) {
        self.ctx.clean_up();
        for parser in &self.parsers {
            parser.clear_memo();
        }
    }
}

/// The parser whose call wrapper acts as the implicit resumer of last
/// resort. Forward indirections delegate without catching, so the root
/// role falls through them to their body.
fn effective_root(root: &Parser) -> Parser {
    let mut current = root.clone();
    let mut hops = 0;
    while current.is_forward() {
        let inner = current.with_body(|body| match body {
            Body::Forward(state) => state.inner(),
            _ => None,
        });
        match inner {
            Some(inner) if hops < 64 => {
                current = inner;
                hops += 1;
            }
            _ => break,
        }
    }
    current
}

/// Gives every anonymous parser a back-reference to the outermost named
/// symbol it belongs to. Named parsers are barriers; the first owner wins.
fn bind_symbols(parsers: &[Parser]) {
    for parser in parsers {
        if parser.name().is_empty() {
            continue;
        }
        let mut queue: Vec<Parser> = vec![parser.clone()];
        while let Some(current) = queue.pop() {
            for child in current.descend_one_level() {
                if child.name().is_empty() && child.symbol().is_none() {
                    child.set_symbol(parser);
                    queue.push(child);
                }
            }
        }
    }
}

#[cfg(test)]
mod grammar_tests;
#[cfg(test)]
mod node_tests;
#[cfg(test)]
mod recover_tests;
#[cfg(test)]
mod slice_tests;
