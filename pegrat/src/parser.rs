//! The parser graph and the call protocol every parser goes through.
//!
//! A [`Parser`] is a cheap handle onto reference-counted parser data; the
//! grammar graph is built by sharing and may be cyclic through `Forward`
//! indirections. Dispatch is over the [`Body`] tagged union, not trait
//! objects, so the whole algebra is visible in one place.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use rustc_hash::{FxHashMap, FxHashSet};

use crate::combinator;
use crate::context::Context;
use crate::node::Node;
use crate::primitive;
use crate::recover::{self, Matcher, Recovery, RecoverySpec};
use crate::recursive::{self, ForwardState};
use crate::runeset::RuneSet;
use crate::rx::Rx;

/// Reserved type tags. Anonymous parsers propagate their tag as the node
/// name, which is what marks the produced nodes as anonymous.
pub mod tag {
    pub const TEXT: &str = ":Text";
    pub const IGNORE_CASE: &str = ":IgnoreCase";
    pub const CHAR_RANGE: &str = ":CharRange";
    pub const REG_EXP: &str = ":RegExp";
    pub const WHITESPACE: &str = ":Whitespace";
    pub const REPEAT: &str = ":Repeat";
    pub const OPTION: &str = ":Option";
    pub const ZERO_OR_MORE: &str = ":ZeroOrMore";
    pub const ONE_OR_MORE: &str = ":OneOrMore";
    pub const ALTERNATIVE: &str = ":Alternative";
    pub const SERIES: &str = ":Series";
    pub const INTERLEAVE: &str = ":Interleave";
    pub const LOOKAHEAD: &str = ":Lookahead";
    pub const LOOKBEHIND: &str = ":Lookbehind";
    pub const CAPTURE: &str = ":Capture";
    pub const RETRIEVE: &str = ":Retrieve";
    pub const POP: &str = ":Pop";
    pub const SYNONYM: &str = ":Synonym";
    pub const FORWARD: &str = ":Forward";
    pub const TRACE: &str = ":Trace";
}

/// The parse protocol: `Ok((None, loc))` is a local non-match,
/// `Ok((Some(node), next))` a match, and `Err` a recoverable syntax error
/// unwinding towards a resuming ancestor.
pub(crate) type Parsing = Result<(Option<Node>, usize), Recovery>;

pub(crate) enum Body {
    Text {
        literal: String,
    },
    IgnoreCase {
        literal: String,
        folded: String,
        ascii: bool,
    },
    CharRange {
        set: RuneSet,
        min: usize,
        max: usize,
    },
    RegExp {
        rx: Rx,
    },
    Whitespace {
        rx: Rx,
        comment: Option<Rx>,
        keep_comments: bool,
    },
    Repeat {
        child: Parser,
        min: usize,
        max: usize,
    },
    Alternative {
        children: Vec<Parser>,
    },
    Series {
        children: Vec<Parser>,
        mandatory: Option<usize>,
    },
    Interleave {
        children: Vec<Parser>,
        bounds: Vec<(usize, usize)>,
        mandatory: Option<usize>,
    },
    Lookahead {
        child: Parser,
        positive: bool,
    },
    Synonym {
        child: Parser,
    },
    Capture {
        child: Parser,
        symbol: String,
    },
    Retrieve {
        symbol: String,
    },
    Pop {
        symbol: String,
    },
    Forward(ForwardState),
}

impl Body {
    pub(crate) fn tag(&self) -> &'static str {
        match self {
            Body::Text { .. } => tag::TEXT,
            Body::IgnoreCase { .. } => tag::IGNORE_CASE,
            Body::CharRange { .. } => tag::CHAR_RANGE,
            Body::RegExp { .. } => tag::REG_EXP,
            Body::Whitespace { .. } => tag::WHITESPACE,
            Body::Repeat { min, max, .. } => match (*min, *max) {
                (0, 1) => tag::OPTION,
                (0, usize::MAX) => tag::ZERO_OR_MORE,
                (1, usize::MAX) => tag::ONE_OR_MORE,
                _ => tag::REPEAT,
            },
            Body::Alternative { .. } => tag::ALTERNATIVE,
            Body::Series { .. } => tag::SERIES,
            Body::Interleave { .. } => tag::INTERLEAVE,
            Body::Lookahead { .. } => tag::LOOKAHEAD,
            Body::Synonym { .. } => tag::SYNONYM,
            Body::Capture { .. } => tag::CAPTURE,
            Body::Retrieve { .. } => tag::RETRIEVE,
            Body::Pop { .. } => tag::POP,
            Body::Forward(_) => tag::FORWARD,
        }
    }

    pub(crate) fn child_parsers(&self) -> Vec<Parser> {
        match self {
            Body::Repeat { child, .. }
            | Body::Lookahead { child, .. }
            | Body::Synonym { child }
            | Body::Capture { child, .. } => vec![child.clone()],
            Body::Alternative { children }
            | Body::Series { children, .. }
            | Body::Interleave { children, .. } => children.clone(),
            Body::Forward(state) => state.inner().into_iter().collect(),
            _ => Vec::new(),
        }
    }
}

pub(crate) struct ParserData {
    body: RefCell<Body>,
    name: RefCell<Rc<str>>,
    node_name: RefCell<Rc<str>>,
    disposable: Cell<bool>,
    drop_content: Cell<bool>,
    no_memoization: Cell<bool>,
    trace: Cell<bool>,
    memo: RefCell<FxHashMap<usize, (Option<Node>, usize)>>,
    recovery: RefCell<RecoverySpec>,
    symbol: RefCell<Option<Weak<ParserData>>>,
}

/// A handle onto one node of the parser graph.
#[derive(Clone)]
pub struct Parser(pub(crate) Rc<ParserData>);

impl Parser {
    pub(crate) fn build(body: Body) -> Self {
        let no_memoization = matches!(
            body,
            Body::Text { .. }
                | Body::IgnoreCase { .. }
                | Body::RegExp { .. }
                | Body::Whitespace { .. }
                | Body::Capture { .. }
                | Body::Retrieve { .. }
                | Body::Pop { .. }
        );
        let drop_content = matches!(body, Body::Whitespace { .. });
        let node_name: Rc<str> = Rc::from(body.tag());
        Parser(Rc::new(ParserData {
            body: RefCell::new(body),
            name: RefCell::new(Rc::from("")),
            node_name: RefCell::new(node_name),
            disposable: Cell::new(true),
            drop_content: Cell::new(drop_content),
            no_memoization: Cell::new(no_memoization),
            trace: Cell::new(false),
            memo: RefCell::new(FxHashMap::default()),
            recovery: RefCell::new(RecoverySpec::default()),
            symbol: RefCell::new(None),
        }))
    }

    /// Stable identity of this parser within its graph.
    pub fn id(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    pub fn name(&self) -> Rc<str> {
        self.0.name.borrow().clone()
    }

    pub fn node_name(&self) -> Rc<str> {
        self.0.node_name.borrow().clone()
    }

    pub fn is_disposable(&self) -> bool {
        self.0.disposable.get()
    }

    pub fn drop_content(&self) -> bool {
        self.0.drop_content.get()
    }

    pub fn no_memoization(&self) -> bool {
        self.0.no_memoization.get()
    }

    /// Routes this parser's calls through `tracing::trace!` events.
    pub fn set_trace(&self, on: bool) {
        self.0.trace.set(on);
    }

    pub fn is_leaf(&self) -> bool {
        matches!(
            &*self.0.body.borrow(),
            Body::Text { .. }
                | Body::IgnoreCase { .. }
                | Body::CharRange { .. }
                | Body::RegExp { .. }
                | Body::Whitespace { .. }
                | Body::Retrieve { .. }
                | Body::Pop { .. }
        )
    }

    pub fn is_nary(&self) -> bool {
        matches!(
            &*self.0.body.borrow(),
            Body::Alternative { .. } | Body::Series { .. } | Body::Interleave { .. }
        )
    }

    pub fn is_flow(&self) -> bool {
        matches!(&*self.0.body.borrow(), Body::Lookahead { .. })
    }

    pub fn is_forward(&self) -> bool {
        matches!(&*self.0.body.borrow(), Body::Forward(_))
    }

    /// A series or interleave with a mandatory threshold.
    pub fn is_error_catching(&self) -> bool {
        matches!(
            &*self.0.body.borrow(),
            Body::Series {
                mandatory: Some(_),
                ..
            } | Body::Interleave {
                mandatory: Some(_),
                ..
            }
        )
    }

    pub(crate) fn with_body<T>(&self, f: impl FnOnce(&Body) -> T) -> T {
        f(&self.0.body.borrow())
    }

    pub(crate) fn set_disposable(&self, on: bool) {
        self.0.disposable.set(on);
    }

    pub(crate) fn set_drop_content(&self, on: bool) {
        self.0.drop_content.set(on);
    }

    pub(crate) fn set_name(&self, name: &str, node_name: &str) {
        *self.0.name.borrow_mut() = Rc::from(name);
        *self.0.node_name.borrow_mut() = Rc::from(node_name);
    }

    pub(crate) fn set_symbol(&self, owner: &Parser) {
        *self.0.symbol.borrow_mut() = Some(Rc::downgrade(&owner.0));
    }

    /// The outermost named symbol this parser belongs to, if any.
    pub fn symbol(&self) -> Option<Parser> {
        self.0
            .symbol
            .borrow()
            .as_ref()
            .and_then(Weak::upgrade)
            .map(Parser)
    }

    pub(crate) fn recovery(&self) -> RecoverySpec {
        self.0.recovery.borrow().clone()
    }

    pub(crate) fn set_skip(&self, matchers: Vec<Matcher>) {
        self.0.recovery.borrow_mut().skip = matchers;
    }

    pub(crate) fn set_resume(&self, matchers: Vec<Matcher>) {
        self.0.recovery.borrow_mut().resume = matchers;
    }

    pub(crate) fn set_error_messages(&self, pairs: Vec<(Matcher, String)>) {
        self.0.recovery.borrow_mut().errors = pairs;
    }

    pub(crate) fn memo_len(&self) -> usize {
        self.0.memo.borrow().len()
    }

    pub(crate) fn clear_memo(&self) {
        self.0.memo.borrow_mut().clear();
        if let Body::Forward(state) = &*self.0.body.borrow() {
            state.clear();
        }
    }

    pub(crate) fn memo_insert(&self, location: usize, result: (Option<Node>, usize)) {
        self.0.memo.borrow_mut().insert(location, result);
    }

    pub(crate) fn memo_get(&self, location: usize) -> Option<(Option<Node>, usize)> {
        self.0.memo.borrow().get(&location).cloned()
    }

    /// The direct child parsers of this parser.
    pub(crate) fn descend_one_level(&self) -> Vec<Parser> {
        self.with_body(Body::child_parsers)
    }

    /// All parsers reachable from this one, in breadth-first order,
    /// including this parser itself. Cycle-safe.
    pub(crate) fn descendants(&self) -> Vec<Parser> {
        let mut seen: FxHashSet<usize> = FxHashSet::default();
        let mut queue = vec![self.clone()];
        let mut out = Vec::new();
        while let Some(parser) = queue.pop() {
            if !seen.insert(parser.id()) {
                continue;
            }
            queue.extend(parser.with_body(Body::child_parsers));
            out.push(parser);
        }
        out
    }

    /// Error-catching parsers reachable from this one through unnamed
    /// subparsers only (named parsers are barriers).
    pub(crate) fn find_error_catchers(&self) -> Vec<Parser> {
        let mut seen: FxHashSet<usize> = FxHashSet::default();
        let mut queue = vec![self.clone()];
        let mut out = Vec::new();
        while let Some(parser) = queue.pop() {
            if !seen.insert(parser.id()) {
                continue;
            }
            if parser.is_error_catching() {
                out.push(parser.clone());
            }
            for child in parser.with_body(Body::child_parsers) {
                if child.name().is_empty() {
                    queue.push(child);
                }
            }
        }
        out
    }

    /// The user-visible entry point of the parse protocol: rollback check,
    /// memo lookup, dispatch, error recovery, farthest-failure tracking,
    /// source-position assignment, memo store.
    pub(crate) fn call(&self, ctx: &Context, location: usize) -> Parsing {
        if ctx.needs_rollback(location) {
            ctx.rollback_to(location);
        }
        if self.is_forward() {
            return recursive::call_forward(self, ctx, location);
        }
        if !self.no_memoization() {
            if let Some(cached) = self.memo_get(location) {
                return Ok(cached);
            }
        }
        let saved = ctx.frame_enter();
        if self.0.trace.get() {
            tracing::trace!(parser = %self, location, "enter");
        }
        let (mut node, next) = match self.parse_body(ctx, location) {
            Ok(result) => result,
            Err(interrupt) => recover::handle(self, ctx, location, interrupt)?,
        };
        match node.as_mut() {
            None => ctx.register_failure(self, location),
            Some(n) => {
                if !n.is_empty_sentinel() {
                    n.assign_pos(location);
                }
            }
        }
        if self.0.trace.get() {
            tracing::trace!(parser = %self, location, matched = node.is_some(), next, "leave");
        }
        if ctx.frame_may_store() {
            if !self.no_memoization() {
                self.memo_insert(location, (node.clone(), next));
            }
            ctx.frame_restore(saved);
        }
        Ok((node, next))
    }

    fn parse_body(&self, ctx: &Context, location: usize) -> Parsing {
        let body = self.0.body.borrow();
        match &*body {
            Body::Text { literal } => primitive::parse_text(self, ctx, location, literal),
            Body::IgnoreCase { folded, ascii, .. } => {
                primitive::parse_ignore_case(self, ctx, location, folded, *ascii)
            }
            Body::CharRange { set, min, max } => {
                primitive::parse_char_range(self, ctx, location, set, *min, *max)
            }
            Body::RegExp { rx } => primitive::parse_regexp(self, ctx, location, rx),
            Body::Whitespace {
                rx,
                comment,
                keep_comments,
            } => primitive::parse_whitespace(self, ctx, location, rx, comment.as_ref(), *keep_comments),
            Body::Repeat { child, min, max } => {
                combinator::parse_repeat(self, ctx, location, child, *min, *max)
            }
            Body::Alternative { children } => {
                combinator::parse_alternative(self, ctx, location, children)
            }
            Body::Series {
                children,
                mandatory,
            } => combinator::parse_series(self, ctx, location, children, *mandatory),
            Body::Interleave {
                children,
                bounds,
                mandatory,
            } => combinator::parse_interleave(self, ctx, location, children, bounds, *mandatory),
            Body::Lookahead { child, positive } => {
                combinator::parse_lookahead(self, ctx, location, child, *positive)
            }
            Body::Synonym { child } => combinator::parse_synonym(self, ctx, location, child),
            Body::Capture { child, symbol } => {
                combinator::parse_capture(self, ctx, location, child, symbol)
            }
            Body::Retrieve { symbol } => combinator::parse_retrieve(self, ctx, location, symbol),
            Body::Pop { symbol } => combinator::parse_pop(self, ctx, location, symbol),
            Body::Forward(_) => {
                panic!("internal error: forward parser dispatched outside its driver")
            }
        }
    }
}

/// Fixes a parser's symbol name.
///
/// A leading `:` makes the produced nodes anonymous (candidates for
/// flattening); a `HIDE:` prefix sets the disposable flag while keeping the
/// plain name in the output; a `DROP:` prefix additionally replaces the
/// content with the empty sentinel. Any other name is kept verbatim and
/// never flattened.
pub fn assign(name: &str, parser: Parser) -> Parser {
    if let Some(rest) = name.strip_prefix("DROP:") {
        parser.set_name(rest, rest);
        parser.set_disposable(true);
        parser.set_drop_content(true);
    } else if let Some(rest) = name.strip_prefix("HIDE:") {
        parser.set_name(rest, rest);
        parser.set_disposable(true);
    } else if name.starts_with(':') {
        parser.set_name(name, name);
        parser.set_disposable(true);
    } else {
        parser.set_name(name, name);
        parser.set_disposable(false);
    }
    parser
}

impl fmt::Display for Parser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.name();
        if !name.is_empty() {
            return f.write_str(&name);
        }
        let body = self.0.body.borrow();
        match &*body {
            Body::Text { literal } => write!(f, "\"{literal}\""),
            Body::IgnoreCase { literal, .. } => write!(f, "\"{literal}\"i"),
            Body::CharRange { set, min, max } => {
                write!(f, "{set:?}")?;
                write_bounds(f, *min, *max)
            }
            Body::RegExp { rx } => write!(f, "{rx}"),
            Body::Whitespace { .. } => f.write_str("~"),
            Body::Repeat { child, min, max } => {
                write!(f, "({child})")?;
                write_bounds(f, *min, *max)
            }
            Body::Alternative { children } => write_joined(f, children, " | "),
            Body::Series {
                children,
                mandatory,
            } => {
                write!(f, "(")?;
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    if *mandatory == Some(i) {
                        write!(f, "\u{a7}")?;
                    }
                    write!(f, "{child}")?;
                }
                write!(f, ")")
            }
            Body::Interleave { children, .. } => write_joined(f, children, " \u{b0} "),
            Body::Lookahead { child, positive } => {
                write!(f, "{}{child}", if *positive { "&" } else { "!" })
            }
            Body::Synonym { child } => write!(f, "{child}"),
            Body::Capture { child, symbol } => write!(f, "{symbol}<-{child}"),
            Body::Retrieve { symbol } => write!(f, ":{symbol}"),
            Body::Pop { symbol } => write!(f, "::{symbol}"),
            Body::Forward(state) => match state.inner() {
                Some(inner) if !inner.name().is_empty() => f.write_str(&inner.name()),
                _ => f.write_str("..."),
            },
        }
    }
}

fn write_bounds(f: &mut fmt::Formatter<'_>, min: usize, max: usize) -> fmt::Result {
    match (min, max) {
        (0, 1) => write!(f, "?"),
        (0, usize::MAX) => write!(f, "*"),
        (1, usize::MAX) => write!(f, "+"),
        (_, usize::MAX) => write!(f, "{{{min},}}"),
        _ => write!(f, "{{{min},{max}}}"),
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, children: &[Parser], sep: &str) -> fmt::Result {
    write!(f, "(")?;
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{child}")?;
    }
    write!(f, ")")
}

impl fmt::Debug for Parser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}<{}>", self.0.body.borrow().tag(), self)
    }
}
