//! Forward declarations and the seed-growing driver that makes
//! left-recursive rules terminate.
//!
//! Every recursive cycle in a grammar graph passes through a forward
//! parser, so handling left recursion here covers the direct and the
//! indirect case alike. The algorithm is the usual one: plant a failing
//! seed, evaluate the body, and keep re-evaluating while the match grows.
//! A re-entrant call at the same location answers with the current seed
//! instead of recursing.

use std::cell::RefCell;

use rustc_hash::FxHashMap;

use crate::context::Context;
use crate::node::Node;
use crate::parser::{Body, Parser, Parsing};

type Seed = (Option<Node>, usize);

#[derive(Default)]
pub(crate) struct ForwardState {
    inner: RefCell<Option<Parser>>,
    seeds: RefCell<FxHashMap<usize, Seed>>,
}

impl ForwardState {
    pub(crate) fn inner(&self) -> Option<Parser> {
        self.inner.borrow().clone()
    }

    pub(crate) fn define(&self, parser: Parser) {
        let mut slot = self.inner.borrow_mut();
        if slot.is_some() {
            panic!("internal error: forward parser already defined");
        }
        *slot = Some(parser);
    }

    fn seed(&self, location: usize) -> Option<Seed> {
        self.seeds.borrow().get(&location).cloned()
    }

    fn plant(&self, location: usize, seed: Seed) {
        self.seeds.borrow_mut().insert(location, seed);
    }

    fn uproot(&self, location: usize) {
        self.seeds.borrow_mut().remove(&location);
    }

    pub(crate) fn clear(&self) {
        self.seeds.borrow_mut().clear();
    }
}

/// Declares a parser whose body is supplied later via [`Parser::define`].
pub fn forward() -> Parser {
    Parser::build(Body::Forward(ForwardState::default()))
}

impl Parser {
    /// Supplies the body of a forward declaration. Double definition and
    /// definition of a non-forward parser are programming errors.
    pub fn define(&self, body: Parser) {
        self.with_body(|b| match b {
            Body::Forward(state) => state.define(body.clone()),
            _ => panic!("internal error: define called on a non-forward parser"),
        });
    }
}

fn with_state<T>(parser: &Parser, f: impl FnOnce(&ForwardState) -> T) -> T {
    parser.with_body(|body| match body {
        Body::Forward(state) => f(state),
        _ => panic!("internal error: forward driver on a non-forward parser"),
    })
}

/// The alternative call wrapper for forward parsers.
pub(crate) fn call_forward(parser: &Parser, ctx: &Context, location: usize) -> Parsing {
    let inner = with_state(parser, ForwardState::inner)
        .expect("internal error: forward parser was never defined");
    if !ctx.left_recursion() {
        return inner.call(ctx, location);
    }
    if let Some(finished) = parser.memo_get(location) {
        return Ok(finished);
    }
    if let Some(seed) = with_state(parser, |s| s.seed(location)) {
        // recursive re-entry terminates by answering with the seed
        return Ok(seed);
    }
    with_state(parser, |s| s.plant(location, (None, location)));
    ctx.enter_growth();
    let grown = grow(parser, &inner, ctx, location);
    ctx.exit_growth();
    with_state(parser, |s| s.uproot(location));
    let result = grown?;
    if ctx.frame_may_store() {
        parser.memo_insert(location, result.clone());
    }
    Ok(result)
}

fn grow(parser: &Parser, inner: &Parser, ctx: &Context, location: usize) -> Parsing {
    let base = ctx.errors_len();
    let (mut node, mut next) = inner.call(ctx, location)?;
    loop {
        with_state(parser, |s| s.plant(location, (node.clone(), next)));
        let rollback_depth = ctx.rollback_depth();
        let reported = ctx.errors_len();
        let (candidate, candidate_next) = inner.call(ctx, location)?;
        if candidate_next > next {
            node = candidate;
            next = candidate_next;
            // the pass that produced the previous seed is superseded,
            // and so are the errors it reported
            ctx.drain_errors(base, reported);
        } else {
            // the seed stopped growing: undo side effects and error
            // reports of the rejected pass
            ctx.truncate_errors(reported);
            ctx.rollback_to_depth(rollback_depth);
            break;
        }
    }
    Ok((node, next))
}
