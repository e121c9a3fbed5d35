//! Early tree reduction, applied by every combinator as it returns.

use crate::context::Context;
use crate::node::Node;
use crate::parser::Parser;

/// The reduction strategy a grammar applies to collected child nodes.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Reduction {
    /// Splice anonymous branch children into their parent.
    #[default]
    Flatten,
    /// Flatten, then merge runs of adjacent anonymous leaves into one leaf.
    MergeTreetops,
}

/// Collection filter: empty anonymous results (including the `:EMPTY`
/// sentinel) are not kept as children.
pub(crate) fn collect(children: &mut Vec<Node>, node: Node) {
    if !node.is_empty_value() || !node.is_anonymous() {
        children.push(node);
    }
}

/// Reduction of a single child result.
pub(crate) fn return_item(parser: &Parser, node: Node) -> Node {
    if parser.drop_content() {
        return Node::empty();
    }
    if parser.is_disposable() {
        return node;
    }
    if node.is_anonymous() {
        node.renamed(parser.node_name())
    } else {
        Node::branch(parser.node_name(), vec![node])
    }
}

/// Reduction of a sequence of collected children.
pub(crate) fn return_seq(parser: &Parser, ctx: &Context, mut children: Vec<Node>) -> Node {
    if parser.drop_content() {
        return Node::empty();
    }
    match children.len() {
        0 => {
            if parser.is_disposable() {
                Node::empty()
            } else {
                Node::branch(parser.node_name(), Vec::new())
            }
        }
        1 => {
            let only = children
                .pop()
                .expect("internal error: child vanished during reduction");
            return_item(parser, only)
        }
        _ => {
            let mut spliced = Vec::with_capacity(children.len());
            for child in children {
                if child.is_anonymous() && child.is_branch() {
                    spliced.extend_from_slice(child.children());
                } else if child.is_anonymous() && child.is_empty_value() {
                    // dropped
                } else {
                    spliced.push(child);
                }
            }
            if ctx.reduction() == Reduction::MergeTreetops {
                spliced = merge_treetops(spliced);
            }
            Node::branch(parser.node_name(), spliced)
        }
    }
}

/// Merges every maximal run of two or more adjacent anonymous leaves into a
/// single leaf carrying the concatenated text. Branches and named leaves
/// break runs and stay in place.
fn merge_treetops(children: Vec<Node>) -> Vec<Node> {
    let mut merged: Vec<Node> = Vec::with_capacity(children.len());
    let mut run: Vec<Node> = Vec::new();
    for child in children {
        if child.is_anonymous() && child.is_leaf() {
            run.push(child);
        } else {
            flush_run(&mut merged, &mut run);
            merged.push(child);
        }
    }
    flush_run(&mut merged, &mut run);
    merged
}

fn flush_run(merged: &mut Vec<Node>, run: &mut Vec<Node>) {
    match run.len() {
        0 => {}
        1 => merged.push(run.remove(0)),
        _ => {
            let first = run.remove(0);
            let mut slice = match first.leaf_slice() {
                Some(text) => text.clone(),
                None => panic!("internal error: non-leaf in treetop run"),
            };
            for node in run.drain(..) {
                match node.leaf_slice() {
                    Some(text) => slice = slice.concat(text),
                    None => panic!("internal error: non-leaf in treetop run"),
                }
            }
            let mut leaf = Node::leaf(first.name().to_string(), slice);
            if let Some(pos) = first.pos() {
                leaf.assign_pos(pos);
            }
            merged.push(leaf);
        }
    }
}
