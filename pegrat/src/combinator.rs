//! Combinators over the parser algebra, and the operator algebra that
//! merges unnamed series and alternatives.

use std::ops::{BitAnd, BitOr};

use crate::context::Context;
use crate::node::Node;
use crate::parser::{Body, Parser, Parsing};
use crate::recover::{self, Recovery};
use crate::reduce;

/// Matches `child` between `min` and `max` times.
pub fn repeat(child: Parser, min: usize, max: usize) -> Parser {
    Parser::build(Body::Repeat { child, min, max })
}

pub fn option(child: Parser) -> Parser {
    repeat(child, 0, 1)
}

pub fn zero_or_more(child: Parser) -> Parser {
    repeat(child, 0, usize::MAX)
}

pub fn one_or_more(child: Parser) -> Parser {
    repeat(child, 1, usize::MAX)
}

/// Ordered choice: tries the children left to right, commits to the first
/// match.
pub fn alternative(children: Vec<Parser>) -> Parser {
    Parser::build(Body::Alternative { children })
}

/// Matches the children in order. A failure at index `i < mandatory` is a
/// plain non-match; at `i >= mandatory` it is a syntax error that triggers
/// the recovery protocol.
pub fn series(children: Vec<Parser>, mandatory: Option<usize>) -> Parser {
    Parser::build(Body::Series {
        children,
        mandatory,
    })
}

/// Matches the children in any order, each between its `(min, max)` bounds.
pub fn interleave(children: Vec<(Parser, (usize, usize))>, mandatory: Option<usize>) -> Parser {
    let (children, bounds) = children.into_iter().unzip();
    Parser::build(Body::Interleave {
        children,
        bounds,
        mandatory,
    })
}

/// Zero-width assertion that `child` matches here.
pub fn lookahead(child: Parser) -> Parser {
    Parser::build(Body::Lookahead {
        child,
        positive: true,
    })
}

/// Zero-width assertion that `child` does not match here.
pub fn negative_lookahead(child: Parser) -> Parser {
    Parser::build(Body::Lookahead {
        child,
        positive: false,
    })
}

/// Transparently delegates to `child`; exists to give a parse tree a name
/// without cloning subtrees.
pub fn synonym(child: Parser) -> Parser {
    Parser::build(Body::Synonym { child })
}

/// Matches `child` and pushes its text onto the variable stack `symbol`.
/// The push is undone when the parser backtracks across this location.
pub fn capture(symbol: impl Into<String>, child: Parser) -> Parser {
    Parser::build(Body::Capture {
        child,
        symbol: symbol.into(),
    })
}

/// Matches the top of the variable stack `symbol` as literal text.
pub fn retrieve(symbol: impl Into<String>) -> Parser {
    Parser::build(Body::Retrieve {
        symbol: symbol.into(),
    })
}

/// Matches the top of the variable stack `symbol` and pops it; the pop is
/// undone when the parser backtracks across this location.
pub fn pop(symbol: impl Into<String>) -> Parser {
    Parser::build(Body::Pop {
        symbol: symbol.into(),
    })
}

/// The `§` of the grammar notation: everything from here on is mandatory.
/// Fuses with an unnamed series by setting its mandatory index to 0.
pub fn required(parser: Parser) -> Parser {
    if parser.name().is_empty() {
        let fused = parser.with_body(|body| match body {
            Body::Series { children, .. } => Some(series(children.clone(), Some(0))),
            _ => None,
        });
        if let Some(fused) = fused {
            return fused;
        }
    }
    series(vec![parser], Some(0))
}

fn decompose_series(parser: &Parser) -> (Vec<Parser>, Option<usize>) {
    if parser.name().is_empty() {
        let parts = parser.with_body(|body| match body {
            Body::Series {
                children,
                mandatory,
            } => Some((children.clone(), *mandatory)),
            _ => None,
        });
        if let Some(parts) = parts {
            return parts;
        }
    }
    (vec![parser.clone()], None)
}

fn decompose_alternative(parser: &Parser) -> Vec<Parser> {
    if parser.name().is_empty() {
        let parts = parser.with_body(|body| match body {
            Body::Alternative { children } => Some(children.clone()),
            _ => None,
        });
        if let Some(parts) = parts {
            return parts;
        }
    }
    vec![parser.clone()]
}

/// `p & q`: a series, merging unnamed series operands. Names are barriers.
impl BitAnd for Parser {
    type Output = Parser;

    fn bitand(self, rhs: Parser) -> Parser {
        let (mut children, mandatory) = decompose_series(&self);
        let offset = children.len();
        let (rhs_children, rhs_mandatory) = decompose_series(&rhs);
        children.extend(rhs_children);
        let mandatory = mandatory.or(rhs_mandatory.map(|m| m + offset));
        series(children, mandatory)
    }
}

/// `p | q`: an ordered choice, merging unnamed alternative operands.
impl BitOr for Parser {
    type Output = Parser;

    fn bitor(self, rhs: Parser) -> Parser {
        let mut children = decompose_alternative(&self);
        children.extend(decompose_alternative(&rhs));
        alternative(children)
    }
}

pub(crate) fn parse_repeat(
    parser: &Parser,
    ctx: &Context,
    location: usize,
    child: &Parser,
    min: usize,
    max: usize,
) -> Parsing {
    let mut collected = Vec::new();
    let mut loc = location;
    let mut count = 0;
    while count < max {
        let (node, next) = child.call(ctx, loc)?;
        match node {
            None => break,
            Some(nd) => {
                let advanced = next > loc;
                reduce::collect(&mut collected, nd);
                loc = next;
                count += 1;
                // a match that does not advance would repeat forever
                if !advanced {
                    break;
                }
            }
        }
    }
    if count < min {
        return Ok((None, location));
    }
    Ok((Some(reduce::return_seq(parser, ctx, collected)), loc))
}

pub(crate) fn parse_alternative(
    parser: &Parser,
    ctx: &Context,
    location: usize,
    children: &[Parser],
) -> Parsing {
    for child in children {
        let (node, next) = child.call(ctx, location)?;
        if let Some(nd) = node {
            return Ok((Some(reduce::return_item(parser, nd)), next));
        }
    }
    Ok((None, location))
}

pub(crate) fn parse_series(
    parser: &Parser,
    ctx: &Context,
    location: usize,
    children: &[Parser],
    mandatory: Option<usize>,
) -> Parsing {
    let mut collected = Vec::new();
    let mut loc = location;
    for (i, child) in children.iter().enumerate() {
        let (node, next) = child.call(ctx, loc)?;
        match node {
            Some(nd) => {
                reduce::collect(&mut collected, nd);
                loc = next;
            }
            None => {
                if mandatory.is_none_or(|m| i < m) {
                    // non-destructive failure, the caller's offset stands
                    return Ok((None, location));
                }
                let reentry = recover::reentry_point(ctx, &parser.recovery().skip, loc);
                let error = recover::violation_error(ctx, parser, child, loc, false, reentry);
                match reentry {
                    Some(re) => {
                        // skip ahead, record the gap, continue the series
                        let doc = ctx.document();
                        collected.push(Node::zombie(doc.sub(loc, re)).with_pos(loc));
                        loc = re;
                    }
                    None => {
                        let partial = Node::branch(parser.node_name(), collected);
                        return Err(Recovery {
                            node: partial,
                            node_len: loc - location,
                            fail_loc: loc,
                            error,
                            first_throw: true,
                        });
                    }
                }
            }
        }
    }
    Ok((Some(reduce::return_seq(parser, ctx, collected)), loc))
}

pub(crate) fn parse_interleave(
    parser: &Parser,
    ctx: &Context,
    location: usize,
    children: &[Parser],
    bounds: &[(usize, usize)],
    mandatory: Option<usize>,
) -> Parsing {
    let mut counts = vec![0usize; children.len()];
    let mut collected = Vec::new();
    let mut loc = location;
    loop {
        loop {
            let mut matched = false;
            for (i, child) in children.iter().enumerate() {
                if counts[i] >= bounds[i].1 {
                    continue;
                }
                let (node, next) = child.call(ctx, loc)?;
                if let Some(nd) = node {
                    if next == loc {
                        // zero-width match: exhaust this child to guarantee progress
                        counts[i] = bounds[i].1;
                    } else {
                        counts[i] += 1;
                    }
                    reduce::collect(&mut collected, nd);
                    loc = next;
                    matched = true;
                    break;
                }
            }
            if !matched {
                break;
            }
        }
        let unsatisfied = (0..children.len()).find(|&i| counts[i] < bounds[i].0);
        let Some(i) = unsatisfied else { break };
        if mandatory.is_none_or(|m| i < m) {
            return Ok((None, location));
        }
        let reentry = recover::reentry_point(ctx, &parser.recovery().skip, loc);
        let error = recover::violation_error(ctx, parser, &children[i], loc, false, reentry);
        match reentry {
            Some(re) => {
                let doc = ctx.document();
                collected.push(Node::zombie(doc.sub(loc, re)).with_pos(loc));
                loc = re;
                counts[i] = bounds[i].0;
            }
            None => {
                let partial = Node::branch(parser.node_name(), collected);
                return Err(Recovery {
                    node: partial,
                    node_len: loc - location,
                    fail_loc: loc,
                    error,
                    first_throw: true,
                });
            }
        }
    }
    Ok((Some(reduce::return_seq(parser, ctx, collected)), loc))
}

pub(crate) fn parse_lookahead(
    parser: &Parser,
    ctx: &Context,
    location: usize,
    child: &Parser,
    positive: bool,
) -> Parsing {
    let (node, _) = child.call(ctx, location)?;
    if positive == node.is_some() {
        let nd = if parser.is_disposable() {
            Node::empty()
        } else {
            let doc = ctx.document();
            Node::leaf(parser.node_name(), doc.sub(location, location))
        };
        Ok((Some(nd), location))
    } else {
        Ok((None, location))
    }
}

pub(crate) fn parse_synonym(
    parser: &Parser,
    ctx: &Context,
    location: usize,
    child: &Parser,
) -> Parsing {
    let (node, next) = child.call(ctx, location)?;
    match node {
        Some(nd) => Ok((Some(reduce::return_item(parser, nd)), next)),
        None => Ok((None, location)),
    }
}

pub(crate) fn parse_capture(
    parser: &Parser,
    ctx: &Context,
    location: usize,
    child: &Parser,
    symbol: &str,
) -> Parsing {
    let (node, next) = child.call(ctx, location)?;
    match node {
        Some(nd) => {
            ctx.push_variable(symbol, nd.flat_text());
            let stacks = ctx.variable_stacks();
            let sym = symbol.to_string();
            ctx.push_rollback(location, move || {
                if let Some(stack) = stacks.borrow_mut().get_mut(&sym) {
                    stack.pop();
                }
            });
            Ok((Some(reduce::return_item(parser, nd)), next))
        }
        None => Ok((None, location)),
    }
}

pub(crate) fn parse_retrieve(
    parser: &Parser,
    ctx: &Context,
    location: usize,
    symbol: &str,
) -> Parsing {
    ctx.suspend_memoization();
    match ctx.peek_variable(symbol) {
        Some(value) => match_variable(parser, ctx, location, &value),
        None => Ok((None, location)),
    }
}

pub(crate) fn parse_pop(
    parser: &Parser,
    ctx: &Context,
    location: usize,
    symbol: &str,
) -> Parsing {
    ctx.suspend_memoization();
    let Some(value) = ctx.peek_variable(symbol) else {
        return Ok((None, location));
    };
    let result = match_variable(parser, ctx, location, &value)?;
    if result.0.is_some() {
        ctx.pop_variable(symbol);
        let stacks = ctx.variable_stacks();
        let sym = symbol.to_string();
        ctx.push_rollback(location, move || {
            stacks.borrow_mut().entry(sym).or_default().push(value);
        });
    }
    Ok(result)
}

fn match_variable(parser: &Parser, ctx: &Context, location: usize, value: &str) -> Parsing {
    let doc = ctx.document();
    if doc.as_str()[location..].starts_with(value) {
        let stop = location + value.len();
        Ok((
            Some(Node::leaf(parser.node_name(), doc.sub(location, stop))),
            stop,
        ))
    } else {
        Ok((None, location))
    }
}
