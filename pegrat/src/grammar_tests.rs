use crate::combinator::{
    alternative, capture, interleave, lookahead, negative_lookahead, one_or_more, option, pop,
    required, retrieve, series, synonym, zero_or_more,
};
use crate::error::{MANDATORY_CONTINUATION, PARSER_STOPPED_BEFORE_END};
use crate::node::Node;
use crate::parser::{assign, Parser};
use crate::primitive::{regexp, text, whitespace};
use crate::recover::{at_str, resume, skip_until};
use crate::recursive::forward;
use crate::slice::StringSlice;
use crate::Grammar;

fn leaf(name: &str, text: &str) -> Node {
    Node::leaf(name.to_string(), StringSlice::from(text))
}

fn ws() -> Parser {
    whitespace(r"\s+", "", false).unwrap()
}

// --- the literal end-to-end scenarios ----------------------------------

#[test]
fn text_parser_end_to_end() {
    let grammar = Grammar::new(text("A")).unwrap();
    let (node, errors) = grammar.parse("A");
    assert!(errors.is_empty());
    let node = node.unwrap();
    assert_eq!(node.as_sexpr(), r#"(:Text "A")"#);
    assert_eq!(node.pos(), Some(0));
}

#[test]
fn regexp_parser_end_to_end() {
    let grammar = Grammar::new(regexp(r"\w+").unwrap()).unwrap();
    let (node, errors) = grammar.parse("ABC");
    assert!(errors.is_empty());
    assert_eq!(node.unwrap().as_sexpr(), r#"(:RegExp "ABC")"#);
}

#[test]
fn series_collects_three_leaves() {
    let grammar =
        Grammar::new(series(vec![text("A"), text("B"), text("C")], Some(1))).unwrap();
    let (node, errors) = grammar.parse("ABC");
    assert!(errors.is_empty());
    assert_eq!(
        node.unwrap().as_sexpr(),
        r#"(:Series (:Text "A") (:Text "B") (:Text "C"))"#
    );
}

#[test]
fn mandatory_violation_is_caught_at_the_root() {
    let grammar =
        Grammar::new(series(vec![text("A"), text("B"), text("C")], Some(1))).unwrap();
    let (node, errors) = grammar.parse("ABX");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code, MANDATORY_CONTINUATION);
    assert_eq!(errors[0].position, 2);
    assert_eq!(
        node.unwrap().as_sexpr(),
        r#"(:Series (:Text "A") (:Text "B") (__ZOMBIE "X"))"#
    );
}

/// The arithmetic grammar used by the resume and left-recursion scenarios.
fn arithmetic() -> Grammar {
    let expr = forward();
    let number = assign("number", regexp("[0-9]+").unwrap());
    let group = text("(") & ws() & required(expr.clone()) & ws() & text(")");
    let factor = alternative(vec![number, assign("group", group)]);
    let mulop = regexp(r"[*/]").unwrap();
    let term = assign(
        "term",
        factor.clone() & zero_or_more(ws() & mulop & ws() & required(factor)),
    );
    let addop = regexp(r"[+\-]").unwrap();
    let expression = assign(
        "expression",
        term.clone() & zero_or_more(ws() & addop & ws() & required(term)),
    );
    resume(&expression, vec![at_str(")")]);
    expr.define(expression);
    Grammar::new(expr).unwrap()
}

#[test]
fn resume_lists_repair_the_tree_with_one_error() {
    let grammar = arithmetic();
    let (node, errors) = grammar.parse("(3 + ) * 2");
    let node = node.unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code, MANDATORY_CONTINUATION);
    // the error points at the closing parenthesis
    assert_eq!(errors[0].position, 5);
    assert!(node.as_sexpr().contains("__ZOMBIE"));
}

#[test]
fn intact_arithmetic_input_has_no_errors() {
    let grammar = arithmetic();
    let (node, errors) = grammar.parse("(3 + 4) * 2");
    assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    assert_eq!(node.unwrap().flat_text(), "(3+4)*2");
}

#[test]
fn left_recursive_expression_grammar() {
    let expr = forward();
    let term = assign("term", regexp("[0-9]+").unwrap());
    let expression = assign(
        "expression",
        (expr.clone() & ws() & text("+") & ws() & term.clone()) | term,
    );
    expr.define(expression);
    let grammar = Grammar::new(expr).unwrap();

    let (node, errors) = grammar.parse("1 + 1");
    assert!(errors.is_empty());
    let expected = Node::branch(
        "expression",
        vec![
            Node::branch("expression", vec![leaf("term", "1")]),
            leaf(":Text", "+"),
            leaf("term", "1"),
        ],
    );
    assert_eq!(node.unwrap(), expected);
}

// --- quantified invariants ---------------------------------------------

#[test]
fn left_recursion_terminates_left_associatively() {
    let e = forward();
    let t = assign("T", text("a"));
    let body = assign("E", (e.clone() & text("+") & t.clone()) | t);
    e.define(body);
    let grammar = Grammar::new(e).unwrap();

    let (node, errors) = grammar.parse("a+a+a");
    assert!(errors.is_empty());
    let ta = || leaf("T", "a");
    let plus = || leaf(":Text", "+");
    let depth1 = Node::branch("E", vec![ta()]);
    let depth2 = Node::branch("E", vec![depth1, plus(), ta()]);
    let depth3 = Node::branch("E", vec![depth2, plus(), ta()]);
    assert_eq!(node.unwrap(), depth3);
}

#[test]
fn packrat_idempotence() {
    let grammar = arithmetic();
    let first = grammar.parse("(3 + ) * 2");
    let second = grammar.parse("(3 + ) * 2");
    assert_eq!(first.0, second.0);
    assert_eq!(first.1, second.1);

    let clean_first = grammar.parse("(1 + 2) * 3");
    let clean_second = grammar.parse("(1 + 2) * 3");
    assert_eq!(clean_first.0, clean_second.0);
    assert_eq!(clean_first.1, clean_second.1);
}

#[test]
fn ordered_choice_consults_only_the_first_matching_branch() {
    let a = series(vec![text("A")], None);
    let b = series(vec![text("B")], None);
    let grammar = Grammar::new(alternative(vec![a.clone(), b.clone()])).unwrap();
    let (node, errors) = grammar.parse("A");
    assert!(errors.is_empty());
    assert_eq!(node.unwrap().text(), "A");
    assert_eq!(a.memo_len(), 1);
    assert_eq!(b.memo_len(), 0);
}

#[test]
fn failure_before_the_mandatory_index_never_raises() {
    let grammar =
        Grammar::new(series(vec![text("A"), text("B"), text("C")], Some(1))).unwrap();
    let (node, errors) = grammar.parse("XBC");
    assert!(node.is_none());
    assert!(errors.iter().all(|e| e.code != MANDATORY_CONTINUATION));
}

#[test]
fn failure_at_the_mandatory_index_yields_a_repaired_tree() {
    let grammar =
        Grammar::new(series(vec![text("A"), text("B"), text("C")], Some(1))).unwrap();
    let (node, errors) = grammar.parse("AXC");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code, MANDATORY_CONTINUATION);
    assert_eq!(errors[0].position, 1);
    assert_eq!(
        node.unwrap().as_sexpr(),
        r#"(:Series (:Text "A") (__ZOMBIE "XC"))"#
    );
}

// --- evaluation entry --------------------------------------------------

#[test]
fn stopping_before_the_end_is_reported() {
    let grammar = Grammar::new(text("A")).unwrap();
    let (node, errors) = grammar.parse("AB");
    assert!(node.is_some());
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code, PARSER_STOPPED_BEFORE_END);
    assert_eq!(errors[0].position, 1);
}

#[test]
fn a_failed_root_reports_the_farthest_failure() {
    let grammar = Grammar::new(series(vec![text("A"), text("B")], None)).unwrap();
    let (node, errors) = grammar.parse("AX");
    assert!(node.is_none());
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code, PARSER_STOPPED_BEFORE_END);
    assert_eq!(errors[0].position, 1);
    assert!(errors[0].message.contains("did not match"));
}

#[test]
fn parse_at_starts_mid_document() {
    let grammar = Grammar::new(text("B")).unwrap();
    let (node, errors) = grammar.parse_at("AB", 1);
    assert!(errors.is_empty());
    let node = node.unwrap();
    assert_eq!(node.text(), "B");
    assert_eq!(node.pos(), Some(1));
}

// --- local skip recovery -----------------------------------------------

#[test]
fn skip_list_lets_a_series_continue_in_place() {
    let stmt = assign(
        "stmt",
        series(
            vec![
                regexp("[a-z]+").unwrap(),
                text("="),
                regexp("[0-9]+").unwrap(),
                text(";"),
            ],
            Some(1),
        ),
    );
    skip_until(&stmt, vec![at_str(";")]).unwrap();
    let grammar = Grammar::new(stmt).unwrap();

    let (node, errors) = grammar.parse("x=?;");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code, MANDATORY_CONTINUATION);
    assert_eq!(errors[0].position, 2);
    assert_eq!(errors[0].length, 1);
    assert_eq!(
        node.unwrap().as_sexpr(),
        r#"(stmt (:RegExp "x") (:Text "=") (__ZOMBIE "?") (:Text ";"))"#
    );
}

// --- lookahead ----------------------------------------------------------

#[test]
fn lookaheads_are_zero_width() {
    let grammar = Grammar::new(series(
        vec![lookahead(text("A")), regexp("[A-Z]+").unwrap()],
        None,
    ))
    .unwrap();
    let (node, errors) = grammar.parse("ABC");
    assert!(errors.is_empty());
    assert_eq!(node.unwrap().as_sexpr(), r#"(:RegExp "ABC")"#);

    let negative = Grammar::new(series(
        vec![negative_lookahead(text("B")), regexp("[A-Z]+").unwrap()],
        None,
    ))
    .unwrap();
    assert!(negative.parse("ABC").0.is_some());
    assert!(negative.parse("BBC").0.is_none());
}

// --- capture, retrieve, pop and the rollback stack ----------------------

#[test]
fn capture_and_pop_match_the_same_text() {
    let grammar = Grammar::new(series(
        vec![
            capture("tag", regexp("[a-z]+").unwrap()),
            text(":"),
            pop("tag"),
        ],
        None,
    ))
    .unwrap();

    let (node, errors) = grammar.parse("ab:ab");
    assert!(errors.is_empty());
    assert_eq!(
        node.unwrap().as_sexpr(),
        r#"(:Series (:RegExp "ab") (:Text ":") (:Pop "ab"))"#
    );

    assert!(grammar.parse("ab:cd").0.is_none());
}

#[test]
fn retrieve_matches_the_most_recent_capture() {
    let letter = || regexp("[a-z]").unwrap();
    let grammar = Grammar::new(series(
        vec![
            capture("v", letter()),
            capture("v", letter()),
            retrieve("v"),
        ],
        None,
    ))
    .unwrap();
    assert!(grammar.parse("abb").0.is_some());
    assert!(grammar.parse("aba").0.is_none());
}

#[test]
fn backtracking_rolls_captured_variables_back() {
    // branch one captures "ab" and fails afterwards; if the capture were
    // not rolled back, the trailing pop would match the stale entry
    let branch_one = series(vec![capture("v", regexp("[a-z]+").unwrap()), text("!")], None);
    let branch_two = series(
        vec![capture("v", text("ab")), text(":"), pop("v")],
        None,
    );
    let root = series(
        vec![alternative(vec![branch_one, branch_two]), pop("v")],
        None,
    );
    let grammar = Grammar::new(root).unwrap();

    let (node, errors) = grammar.parse("ab:abab");
    assert!(node.is_none());
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code, PARSER_STOPPED_BEFORE_END);
}

// --- interleave ---------------------------------------------------------

#[test]
fn interleave_accepts_any_order_within_bounds() {
    let grammar = Grammar::new(interleave(
        vec![(text("a"), (1, 1)), (text("b"), (1, 2))],
        None,
    ))
    .unwrap();

    let (node, errors) = grammar.parse("bab");
    assert!(errors.is_empty());
    assert_eq!(
        node.unwrap().as_sexpr(),
        r#"(:Interleave (:Text "b") (:Text "a") (:Text "b"))"#
    );

    assert!(grammar.parse("aa").0.is_none());
}

#[test]
fn interleave_honors_its_mandatory_threshold() {
    let grammar = Grammar::new(interleave(
        vec![(text("a"), (1, 1)), (text("b"), (1, 1))],
        Some(0),
    ))
    .unwrap();
    let (node, errors) = grammar.parse("a");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code, MANDATORY_CONTINUATION);
    assert_eq!(errors[0].position, 1);
    assert_eq!(node.unwrap().as_sexpr(), r#"(:Interleave (:Text "a"))"#);
}

// --- grammar binding ----------------------------------------------------

#[test]
fn conflicting_comment_regexes_are_rejected_at_binding() {
    let w1 = whitespace(r"\s+", "#[^\n]*", false).unwrap();
    let w2 = whitespace(r"\s+", "//[^\n]*", false).unwrap();
    assert!(Grammar::new(series(vec![w1, w2], None)).is_err());

    let w3 = whitespace(r"\s+", "#[^\n]*", false).unwrap();
    let w4 = whitespace(r"\s+", "#[^\n]*", false).unwrap();
    assert!(Grammar::new(series(vec![w3, w4], None)).is_ok());
}

#[test]
fn undefined_forwards_are_rejected_at_binding() {
    let dangling = forward();
    assert!(matches!(
        Grammar::new(dangling),
        Err(crate::GrammarError::UndefinedForward(_))
    ));
}

#[test]
fn forwards_delegate_plainly_without_left_recursion() {
    let fwd = forward();
    fwd.define(assign("word", regexp("[a-z]+").unwrap()));
    let grammar = Grammar::new(fwd).unwrap();
    grammar.set_left_recursion(false);
    let (node, errors) = grammar.parse("hello");
    assert!(errors.is_empty());
    assert_eq!(node.unwrap(), leaf("word", "hello"));
}

// --- repetition specializations and synonym -----------------------------

#[test]
fn repetition_specializations() {
    let some = Grammar::new(one_or_more(text("a"))).unwrap();
    let (node, errors) = some.parse("aaa");
    assert!(errors.is_empty());
    assert_eq!(
        node.unwrap().as_sexpr(),
        r#"(:OneOrMore (:Text "a") (:Text "a") (:Text "a"))"#
    );
    assert!(some.parse("").0.is_none());

    let maybe = Grammar::new(option(text("a"))).unwrap();
    let (node, errors) = maybe.parse("");
    assert!(errors.is_empty());
    assert!(node.unwrap().is_empty_sentinel());
}

#[test]
fn synonym_names_a_tree_without_restructuring_it() {
    let grammar = Grammar::new(assign("alias", synonym(text("A")))).unwrap();
    let (node, errors) = grammar.parse("A");
    assert!(errors.is_empty());
    assert_eq!(node.unwrap(), leaf("alias", "A"));
}

// --- reduction strategy selection ---------------------------------------

#[test]
fn merge_treetops_reduction_applies_during_the_parse() {
    let grammar = Grammar::new(series(vec![text("a"), text("b")], None)).unwrap();
    grammar.set_reduction(crate::Reduction::MergeTreetops);
    let (node, errors) = grammar.parse("ab");
    assert!(errors.is_empty());
    let node = node.unwrap();
    assert_eq!(node.as_sexpr(), r#"(:Series (:Text "ab"))"#);
}

// --- operator algebra ----------------------------------------------------

#[test]
fn series_operands_merge_unless_named() {
    use crate::parser::Body;

    let merged = text("a") & text("b") & text("c");
    let (len, mandatory) = merged.with_body(|body| match body {
        Body::Series {
            children,
            mandatory,
        } => (children.len(), *mandatory),
        _ => (0, None),
    });
    assert_eq!(len, 3);
    assert_eq!(mandatory, None);

    let committed = text("a") & required(text("b") & text("c"));
    let (len, mandatory) = committed.with_body(|body| match body {
        Body::Series {
            children,
            mandatory,
        } => (children.len(), *mandatory),
        _ => (0, None),
    });
    assert_eq!(len, 3);
    assert_eq!(mandatory, Some(1));

    // a name is a barrier against merging
    let barrier = assign("pair", text("a") & text("b")) & text("c");
    let len = barrier.with_body(|body| match body {
        Body::Series { children, .. } => children.len(),
        _ => 0,
    });
    assert_eq!(len, 2);
}

#[test]
fn alternative_operands_merge() {
    use crate::parser::Body;

    let merged = text("a") | text("b") | text("c");
    let len = merged.with_body(|body| match body {
        Body::Alternative { children } => children.len(),
        _ => 0,
    });
    assert_eq!(len, 3);
}

#[test]
fn commit_point_from_the_operator_algebra() {
    let grammar = Grammar::new(text("a") & required(text("b"))).unwrap();
    let (node, errors) = grammar.parse("ax");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code, MANDATORY_CONTINUATION);
    assert_eq!(errors[0].position, 1);
    assert!(node.unwrap().as_sexpr().contains("__ZOMBIE"));
}

#[test]
fn symbols_are_bound_to_their_anonymous_parts() {
    let inner = text("A");
    let rule = assign("rule", series(vec![inner.clone(), text("B")], None));
    let _grammar = Grammar::new(rule.clone()).unwrap();
    assert_eq!(inner.symbol().unwrap().name(), rule.name());
}
