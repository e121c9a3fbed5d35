//! Concrete-syntax-tree nodes.
//!
//! A node is either a branch (ordered children) or a leaf (a text slice),
//! never both. Nodes are handles around reference-counted data; cloning is
//! cheap and mutation goes through copy-on-write, so results stored in memo
//! tables stay immutable.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::slice::StringSlice;

/// Name of the shared empty-result sentinel.
pub const EMPTY: &str = ":EMPTY";
/// Name of the error-recovery placeholder covering skipped text.
pub const ZOMBIE: &str = "__ZOMBIE";
/// Name given to comment text preserved by a whitespace parser.
pub const COMMENT: &str = "comment__";

/// Width in runes at which the S-expression serialization wraps.
const SXPR_WRAP: usize = 60;

#[derive(Clone)]
enum Content {
    Leaf(StringSlice),
    Branch(Vec<Node>),
}

#[derive(Clone)]
struct NodeData {
    name: Rc<str>,
    content: Content,
    attrs: Option<IndexMap<String, String>>,
    pos: Option<usize>,
}

#[derive(Clone)]
pub struct Node(Rc<NodeData>);

thread_local! {
    static EMPTY_NODE: RefCell<Option<Node>> = const { RefCell::new(None) };
}

impl Node {
    pub fn leaf(name: impl Into<Rc<str>>, text: StringSlice) -> Self {
        Node(Rc::new(NodeData {
            name: name.into(),
            content: Content::Leaf(text),
            attrs: None,
            pos: None,
        }))
    }

    pub fn branch(name: impl Into<Rc<str>>, children: Vec<Node>) -> Self {
        Node(Rc::new(NodeData {
            name: name.into(),
            content: Content::Branch(children),
            attrs: None,
            pos: None,
        }))
    }

    /// The shared `:EMPTY` sentinel. All copies point at one allocation per
    /// thread; the call wrapper never assigns it a source position.
    pub fn empty() -> Self {
        EMPTY_NODE.with(|cell| {
            cell.borrow_mut()
                .get_or_insert_with(|| Node::leaf(EMPTY, StringSlice::from("")))
                .clone()
        })
    }

    pub fn zombie(text: StringSlice) -> Self {
        Node::leaf(ZOMBIE, text)
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Nodes whose name starts with `:` are anonymous and candidates for
    /// flattening during reduction.
    pub fn is_anonymous(&self) -> bool {
        self.0.name.starts_with(':')
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.0.content, Content::Leaf(_))
    }

    pub fn is_branch(&self) -> bool {
        matches!(self.0.content, Content::Branch(_))
    }

    /// No children and no text.
    pub fn is_empty_value(&self) -> bool {
        match &self.0.content {
            Content::Leaf(text) => text.is_empty(),
            Content::Branch(children) => children.is_empty(),
        }
    }

    pub fn is_empty_sentinel(&self) -> bool {
        self.name() == EMPTY && self.is_empty_value()
    }

    pub fn children(&self) -> &[Node] {
        match &self.0.content {
            Content::Branch(children) => children,
            Content::Leaf(_) => &[],
        }
    }

    pub fn text(&self) -> &str {
        match &self.0.content {
            Content::Leaf(text) => text.as_str(),
            Content::Branch(_) => "",
        }
    }

    pub(crate) fn leaf_slice(&self) -> Option<&StringSlice> {
        match &self.0.content {
            Content::Leaf(text) => Some(text),
            Content::Branch(_) => None,
        }
    }

    /// Concatenated text of all leaves beneath this node.
    pub fn flat_text(&self) -> String {
        match &self.0.content {
            Content::Leaf(text) => text.as_str().to_string(),
            Content::Branch(children) => children.iter().map(Node::flat_text).collect(),
        }
    }

    /// Number of document bytes this node covers.
    pub fn span_len(&self) -> usize {
        match &self.0.content {
            Content::Leaf(text) => text.len(),
            Content::Branch(children) => children.iter().map(Node::span_len).sum(),
        }
    }

    pub fn pos(&self) -> Option<usize> {
        self.0.pos
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.0.attrs.as_ref()?.get(key).map(String::as_str)
    }

    pub fn attrs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .attrs
            .iter()
            .flat_map(|map| map.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let data = Rc::make_mut(&mut self.0);
        data.attrs
            .get_or_insert_with(IndexMap::new)
            .insert(key.into(), value.into());
    }

    /// A copy of this node under a different name, sharing content.
    pub fn renamed(&self, name: impl Into<Rc<str>>) -> Node {
        let mut data = (*self.0).clone();
        data.name = name.into();
        Node(Rc::new(data))
    }

    pub(crate) fn push_child(&mut self, child: Node) {
        let data = Rc::make_mut(&mut self.0);
        match &mut data.content {
            Content::Branch(children) => children.push(child),
            Content::Leaf(_) => panic!("internal error: cannot add a child to a leaf node"),
        }
    }

    /// Assigns the source position, recursively distributing contiguous
    /// positions to children whose position is still unassigned. Assigning a
    /// different position to a node that already has one is a fatality.
    pub fn assign_pos(&mut self, pos: usize) {
        if let Some(prev) = self.0.pos {
            if prev != pos {
                panic!("internal error: source position re-assigned ({prev} -> {pos})");
            }
            return;
        }
        let data = Rc::make_mut(&mut self.0);
        data.pos = Some(pos);
        if let Content::Branch(children) = &mut data.content {
            let mut offset = pos;
            for child in children {
                if child.pos().is_none() {
                    child.assign_pos(offset);
                }
                offset = child.pos().unwrap_or(offset) + child.span_len();
            }
        }
    }

    pub fn with_pos(mut self, pos: usize) -> Node {
        self.assign_pos(pos);
        self
    }

    /// Canonical S-expression form, wrapped at 60 runes.
    pub fn as_sexpr(&self) -> String {
        let flat = self.sexpr_flat();
        if flat.chars().count() <= SXPR_WRAP {
            flat
        } else {
            self.sexpr_indented(0)
        }
    }

    fn sexpr_head(&self) -> String {
        let mut head = format!("({}", self.name());
        for (key, value) in self.attrs() {
            head.push_str(&format!(" `({} \"{}\")", key, escape(value)));
        }
        head
    }

    fn sexpr_flat(&self) -> String {
        let mut out = self.sexpr_head();
        match &self.0.content {
            Content::Leaf(text) if text.is_empty() => {}
            Content::Leaf(text) => out.push_str(&format!(" \"{}\"", escape(text.as_str()))),
            Content::Branch(children) => {
                for child in children {
                    out.push(' ');
                    out.push_str(&child.sexpr_flat());
                }
            }
        }
        out.push(')');
        out
    }

    fn sexpr_indented(&self, indent: usize) -> String {
        let pad = "  ".repeat(indent);
        let flat = self.sexpr_flat();
        if flat.chars().count() + pad.len() <= SXPR_WRAP {
            return format!("{pad}{flat}");
        }
        let mut out = format!("{pad}{}", self.sexpr_head());
        match &self.0.content {
            Content::Leaf(text) if text.is_empty() => {}
            Content::Leaf(text) => out.push_str(&format!(" \"{}\"", escape(text.as_str()))),
            Content::Branch(children) => {
                for child in children {
                    out.push('\n');
                    out.push_str(&child.sexpr_indented(indent + 1));
                }
            }
        }
        out.push(')');
        out
    }

    /// Pseudo-XML form for external tools. Reserved node names appear
    /// unchanged as tag names.
    pub fn as_xml(&self) -> String {
        let mut out = format!("<{}", self.name());
        for (key, value) in self.attrs() {
            out.push_str(&format!(" {}=\"{}\"", key, escape_xml(value)));
        }
        if self.is_empty_value() {
            out.push_str("/>");
            return out;
        }
        out.push('>');
        match &self.0.content {
            Content::Leaf(text) => out.push_str(&escape_xml(text.as_str())),
            Content::Branch(children) => {
                for child in children {
                    out.push_str(&child.as_xml());
                }
            }
        }
        out.push_str(&format!("</{}>", self.name()));
        out
    }
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Equality compares names, content and attributes; source positions are
/// ignored so expected trees can be written by hand.
impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        if Rc::ptr_eq(&self.0, &other.0) {
            return true;
        }
        if self.name() != other.name() {
            return false;
        }
        let attrs_eq = match (&self.0.attrs, &other.0.attrs) {
            (None, None) => true,
            (Some(a), Some(b)) => a == b,
            (Some(a), None) => a.is_empty(),
            (None, Some(b)) => b.is_empty(),
        };
        if !attrs_eq {
            return false;
        }
        match (&self.0.content, &other.0.content) {
            (Content::Leaf(a), Content::Leaf(b)) => a == b,
            (Content::Branch(a), Content::Branch(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Node {}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_sexpr())
    }
}
