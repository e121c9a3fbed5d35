//! Per-run mutable state shared by all parsers of one grammar.
//!
//! The context is threaded through every parse call by reference; all
//! mutation goes through interior mutability. One context supports one
//! parse at a time; [`Context::clean_up`] resets the transient fields
//! between runs.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::error::Error;
use crate::parser::Parser;
use crate::reduce::Reduction;
use crate::rx::Rx;
use crate::slice::StringSlice;

/// Default width of the reentry search window in bytes.
pub const DEFAULT_SEARCH_WINDOW: usize = 10_000;

type VarStacks = Rc<RefCell<FxHashMap<String, Vec<String>>>>;

pub struct Context {
    document: RefCell<StringSlice>,
    comment_rx: RefCell<Rx>,
    /// Memoization permission for the current frame; cleared by
    /// side-effecting parsers and left cleared for all enclosing frames.
    memoization: Cell<bool>,
    /// Nesting depth of active left-recursion seed growth; memoization is
    /// suspended entirely while nonzero.
    growth: Cell<u32>,
    left_recursion: Cell<bool>,
    rollback: RefCell<Vec<(usize, Box<dyn FnOnce()>)>>,
    rollback_location: Cell<Option<usize>>,
    errors: RefCell<Vec<Error>>,
    farthest_fail: Cell<Option<usize>>,
    farthest_parser: RefCell<Option<Parser>>,
    root_id: Cell<usize>,
    recovery_depth: Cell<u32>,
    reduction: Cell<Reduction>,
    search_window: Cell<usize>,
    variables: VarStacks,
}

impl Context {
    pub(crate) fn new() -> Self {
        Self {
            document: RefCell::new(StringSlice::from("")),
            comment_rx: RefCell::new(Rx::never()),
            memoization: Cell::new(true),
            growth: Cell::new(0),
            left_recursion: Cell::new(true),
            rollback: RefCell::new(Vec::new()),
            rollback_location: Cell::new(None),
            errors: RefCell::new(Vec::new()),
            farthest_fail: Cell::new(None),
            farthest_parser: RefCell::new(None),
            root_id: Cell::new(0),
            recovery_depth: Cell::new(0),
            reduction: Cell::new(Reduction::Flatten),
            search_window: Cell::new(DEFAULT_SEARCH_WINDOW),
            variables: Rc::new(RefCell::new(FxHashMap::default())),
        }
    }

    /// Resets everything a previous run may have left behind.
    pub(crate) fn clean_up(&self) {
        self.memoization.set(true);
        self.growth.set(0);
        self.rollback.borrow_mut().clear();
        self.rollback_location.set(None);
        self.errors.borrow_mut().clear();
        self.farthest_fail.set(None);
        *self.farthest_parser.borrow_mut() = None;
        self.recovery_depth.set(0);
        self.variables.borrow_mut().clear();
    }

    pub(crate) fn set_document(&self, document: StringSlice) {
        *self.document.borrow_mut() = document;
    }

    pub(crate) fn document(&self) -> StringSlice {
        self.document.borrow().clone()
    }

    pub(crate) fn set_comment_rx(&self, rx: Rx) {
        *self.comment_rx.borrow_mut() = rx;
    }

    pub(crate) fn comment_rx(&self) -> Rx {
        self.comment_rx.borrow().clone()
    }

    pub(crate) fn set_root(&self, parser: &Parser) {
        self.root_id.set(parser.id());
    }

    pub(crate) fn is_root(&self, parser: &Parser) -> bool {
        self.root_id.get() == parser.id()
    }

    // --- memoization flag -------------------------------------------------

    /// Called at frame entry: remembers the caller's flag and grants the new
    /// frame memoization permission, unless seed growth is under way.
    pub(crate) fn frame_enter(&self) -> bool {
        let saved = self.memoization.get();
        if self.growth.get() == 0 {
            self.memoization.set(true);
        }
        saved
    }

    /// Whether the frame that is about to return may store its result.
    pub(crate) fn frame_may_store(&self) -> bool {
        self.memoization.get() && self.growth.get() == 0
    }

    pub(crate) fn frame_restore(&self, saved: bool) {
        self.memoization.set(saved);
    }

    /// Marks the current result as dependent on mutable state. The flag
    /// stays cleared for every enclosing frame until a rollback undoes the
    /// side effects.
    pub(crate) fn suspend_memoization(&self) {
        self.memoization.set(false);
    }

    pub(crate) fn enter_growth(&self) {
        self.growth.set(self.growth.get() + 1);
    }

    pub(crate) fn exit_growth(&self) {
        self.growth.set(self.growth.get() - 1);
    }

    pub(crate) fn left_recursion(&self) -> bool {
        self.left_recursion.get()
    }

    pub(crate) fn set_left_recursion(&self, on: bool) {
        self.left_recursion.set(on);
    }

    // --- rollback stack ---------------------------------------------------

    pub(crate) fn push_rollback(&self, location: usize, undo: impl FnOnce() + 'static) {
        self.rollback.borrow_mut().push((location, Box::new(undo)));
        self.rollback_location.set(Some(location));
        self.suspend_memoization();
    }

    pub(crate) fn needs_rollback(&self, location: usize) -> bool {
        self.rollback_location
            .get()
            .is_some_and(|top| location <= top)
    }

    /// Pops and runs undo closures for all entries at or past `location`.
    /// Memoization is re-enabled only once the stack is empty again.
    pub(crate) fn rollback_to(&self, location: usize) {
        loop {
            let entry = {
                let mut stack = self.rollback.borrow_mut();
                let due = matches!(stack.last(), Some(&(loc, _)) if loc >= location);
                if due {
                    stack.pop()
                } else {
                    None
                }
            };
            match entry {
                Some((_, undo)) => undo(),
                None => break,
            }
        }
        let stack = self.rollback.borrow();
        self.rollback_location.set(stack.last().map(|&(loc, _)| loc));
        if stack.is_empty() {
            self.memoization.set(true);
        }
    }

    pub(crate) fn rollback_depth(&self) -> usize {
        self.rollback.borrow().len()
    }

    /// Pops (and undoes) entries pushed after `depth` was recorded,
    /// regardless of their location.
    pub(crate) fn rollback_to_depth(&self, depth: usize) {
        loop {
            let entry = {
                let mut stack = self.rollback.borrow_mut();
                if stack.len() > depth {
                    stack.pop()
                } else {
                    None
                }
            };
            match entry {
                Some((_, undo)) => undo(),
                None => break,
            }
        }
        let stack = self.rollback.borrow();
        self.rollback_location.set(stack.last().map(|&(loc, _)| loc));
    }

    // --- variable stacks for capture/retrieve/pop -------------------------

    pub(crate) fn push_variable(&self, symbol: &str, value: String) {
        self.variables
            .borrow_mut()
            .entry(symbol.to_string())
            .or_default()
            .push(value);
    }

    pub(crate) fn peek_variable(&self, symbol: &str) -> Option<String> {
        self.variables.borrow().get(symbol)?.last().cloned()
    }

    pub(crate) fn pop_variable(&self, symbol: &str) -> Option<String> {
        self.variables.borrow_mut().get_mut(symbol)?.pop()
    }

    /// Shared handle for rollback closures.
    pub(crate) fn variable_stacks(&self) -> VarStacks {
        self.variables.clone()
    }

    // --- error report -----------------------------------------------------

    /// Records an error, filling in its line and column from the document.
    pub(crate) fn report(&self, mut error: Error) {
        let (line, column) = self.document.borrow().line_col(error.position);
        error.line = line;
        error.column = column;
        self.errors.borrow_mut().push(error);
    }

    pub(crate) fn errors(&self) -> Vec<Error> {
        self.errors.borrow().clone()
    }

    pub(crate) fn errors_len(&self) -> usize {
        self.errors.borrow().len()
    }

    /// Drops the errors recorded by a rejected parsing pass.
    pub(crate) fn truncate_errors(&self, len: usize) {
        self.errors.borrow_mut().truncate(len);
    }

    /// Drops the errors of a superseded pass (`[from, to)`), keeping the
    /// ones its replacement recorded after `to`.
    pub(crate) fn drain_errors(&self, from: usize, to: usize) {
        self.errors.borrow_mut().drain(from..to);
    }

    pub(crate) fn register_failure(&self, parser: &Parser, location: usize) {
        if self.farthest_fail.get().is_none_or(|f| location > f) {
            self.farthest_fail.set(Some(location));
            *self.farthest_parser.borrow_mut() = Some(parser.clone());
        }
    }

    pub(crate) fn farthest_failure(&self) -> Option<(usize, Parser)> {
        let pos = self.farthest_fail.get()?;
        let parser = self.farthest_parser.borrow().clone()?;
        Some((pos, parser))
    }

    // --- recovery ---------------------------------------------------------

    pub(crate) fn enter_recovery(&self) {
        self.recovery_depth.set(self.recovery_depth.get() + 1);
    }

    pub(crate) fn exit_recovery(&self) {
        self.recovery_depth.set(self.recovery_depth.get() - 1);
    }

    pub(crate) fn recovering(&self) -> bool {
        self.recovery_depth.get() > 0
    }

    pub(crate) fn reduction(&self) -> Reduction {
        self.reduction.get()
    }

    pub(crate) fn set_reduction(&self, reduction: Reduction) {
        self.reduction.set(reduction);
    }

    pub(crate) fn search_window(&self) -> usize {
        self.search_window.get()
    }

    pub(crate) fn set_search_window(&self, bytes: usize) {
        self.search_window.set(bytes);
    }
}
