use indoc::indoc;

use crate::node::Node;
use crate::slice::StringSlice;

fn leaf(name: &str, text: &str) -> Node {
    Node::leaf(name.to_string(), StringSlice::from(text))
}

#[test]
fn branch_xor_leaf() {
    let l = leaf("word", "abc");
    assert!(l.is_leaf());
    assert_eq!(l.text(), "abc");
    assert!(l.children().is_empty());

    let b = Node::branch("pair", vec![leaf(":a", "x"), leaf(":b", "y")]);
    assert!(b.is_branch());
    assert_eq!(b.text(), "");
    assert_eq!(b.children().len(), 2);
    assert_eq!(b.flat_text(), "xy");
    assert_eq!(b.span_len(), 2);
}

#[test]
fn empty_sentinel_is_shared_and_anonymous() {
    let a = Node::empty();
    let b = Node::empty();
    assert_eq!(a, b);
    assert!(a.is_empty_sentinel());
    assert!(a.is_anonymous());
    assert_eq!(a.span_len(), 0);
    assert_eq!(a.as_sexpr(), "(:EMPTY)");
}

#[test]
fn zombie_and_comment_names_are_kept() {
    let z = Node::zombie(StringSlice::from("junk"));
    assert_eq!(z.name(), "__ZOMBIE");
    assert!(!z.is_anonymous());
}

#[test]
fn position_assignment_recurses_contiguously() {
    let mut tree = Node::branch(
        "sum",
        vec![leaf("n", "12"), leaf(":op", "+"), leaf("n", "345")],
    );
    tree.assign_pos(10);
    assert_eq!(tree.pos(), Some(10));
    assert_eq!(tree.children()[0].pos(), Some(10));
    assert_eq!(tree.children()[1].pos(), Some(12));
    assert_eq!(tree.children()[2].pos(), Some(13));
}

#[test]
fn position_assignment_is_idempotent_and_respects_preset_children() {
    let preset = leaf("n", "45").with_pos(7);
    let mut tree = Node::branch("sum", vec![leaf("n", "12"), preset]);
    tree.assign_pos(4);
    // the preset child keeps its position, later offsets follow it
    assert_eq!(tree.children()[0].pos(), Some(4));
    assert_eq!(tree.children()[1].pos(), Some(7));
    tree.assign_pos(4);
}

#[test]
#[should_panic(expected = "source position re-assigned")]
fn reassigning_a_different_position_is_a_fatality() {
    let mut node = leaf("n", "1").with_pos(3);
    node.assign_pos(4);
}

#[test]
fn equality_ignores_positions() {
    let a = leaf("n", "1").with_pos(5);
    let b = leaf("n", "1");
    assert_eq!(a, b);
    assert_ne!(leaf("n", "1"), leaf("n", "2"));
    assert_ne!(leaf("n", "1"), leaf("m", "1"));
}

#[test]
fn attributes_keep_insertion_order() {
    let mut node = leaf("item", "x");
    node.set_attr("z", "1");
    node.set_attr("a", "2");
    let attrs: Vec<_> = node.attrs().collect();
    assert_eq!(attrs, vec![("z", "1"), ("a", "2")]);
    assert_eq!(node.attr("a"), Some("2"));
    assert_eq!(node.attr("missing"), None);
}

#[test]
fn copy_on_write_leaves_clones_untouched() {
    let original = leaf("item", "x");
    let mut copy = original.clone();
    copy.set_attr("k", "v");
    assert_eq!(original.attr("k"), None);
    assert_eq!(copy.attr("k"), Some("v"));
}

#[test]
fn short_sexpr_stays_flat() {
    let tree = Node::branch("expr", vec![leaf("a", "1"), leaf("b", "2")]);
    assert_eq!(tree.as_sexpr(), r#"(expr (a "1") (b "2"))"#);
}

#[test]
fn attributes_render_in_the_head() {
    let mut tree = Node::branch("expr", vec![leaf("a", "1")]);
    tree.set_attr("kind", "x");
    assert_eq!(tree.as_sexpr(), r#"(expr `(kind "x") (a "1"))"#);
}

#[test]
fn long_sexpr_wraps_at_sixty_runes() {
    let tree = Node::branch(
        "root",
        vec![
            leaf("a", "aaaaaaaaaaaaaaaaaaaa"),
            leaf("b", "bbbbbbbbbbbbbbbbbbbb"),
            leaf("c", "cccccccccccccccccccc"),
        ],
    );
    let expected = indoc! {r#"
        (root
          (a "aaaaaaaaaaaaaaaaaaaa")
          (b "bbbbbbbbbbbbbbbbbbbb")
          (c "cccccccccccccccccccc"))"#};
    assert_eq!(tree.as_sexpr(), expected);
}

#[test]
fn sexpr_escapes_quotes_and_backslashes() {
    let node = leaf("s", r#"say "hi" \ bye"#);
    assert_eq!(node.as_sexpr(), r#"(s "say \"hi\" \\ bye")"#);
}

#[test]
fn xml_form() {
    let mut tree = Node::branch("expr", vec![leaf("a", "1 < 2")]);
    tree.set_attr("kind", "cmp");
    assert_eq!(tree.as_xml(), r#"<expr kind="cmp"><a>1 &lt; 2</a></expr>"#);
    assert_eq!(Node::empty().as_xml(), "<:EMPTY/>");
    assert_eq!(
        Node::zombie(StringSlice::from("!?")).as_xml(),
        "<__ZOMBIE>!?</__ZOMBIE>"
    );
}
