use crate::combinator::series;
use crate::context::Context;
use crate::error::{
    ERROR_WHILE_RECOVERING, MANDATORY_CONTINUATION, MANDATORY_CONTINUATION_AT_EOF,
};
use crate::parser::assign;
use crate::primitive::text;
use crate::recover::{
    after, any_passage, at_rx, at_str, reentry_point, set_errors, skip_until, violation_error,
};
use crate::rx::Rx;
use crate::slice::StringSlice;

fn ctx_for(document: &str) -> Context {
    let ctx = Context::new();
    ctx.set_document(StringSlice::from(document));
    ctx
}

#[test]
fn string_locator_finds_the_match_start() {
    let ctx = ctx_for("abc ; def");
    assert_eq!(reentry_point(&ctx, &[at_str(";")], 0), Some(4));
    assert_eq!(reentry_point(&ctx, &[at_str(";")], 5), None);
}

#[test]
fn regex_locator_and_closest_match_wins() {
    let ctx = ctx_for("abc ; def , ghi");
    let semicolon = at_rx(";").unwrap();
    let comma = at_rx(",").unwrap();
    assert_eq!(reentry_point(&ctx, &[comma.clone(), semicolon], 0), Some(4));
    assert_eq!(reentry_point(&ctx, &[comma], 0), Some(10));
}

#[test]
fn locators_skip_matches_inside_comments() {
    let ctx = ctx_for("a /* ; */ ; b");
    ctx.set_comment_rx(Rx::new(r"/\*.*?\*/").unwrap());
    assert_eq!(reentry_point(&ctx, &[at_str(";")], 0), Some(10));
}

#[test]
fn search_respects_the_window() {
    let ctx = ctx_for("aaaaaaaaaa;");
    ctx.set_search_window(5);
    assert_eq!(reentry_point(&ctx, &[at_str(";")], 0), None);
    ctx.set_search_window(20);
    assert_eq!(reentry_point(&ctx, &[at_str(";")], 0), Some(10));
}

#[test]
fn consumers_absorb_text() {
    let ctx = ctx_for("abX rest");
    assert_eq!(reentry_point(&ctx, &[after(text("ab"))], 0), Some(2));
    assert_eq!(reentry_point(&ctx, &[after(text("zz"))], 0), None);
    assert_eq!(reentry_point(&ctx, &[any_passage()], 3), Some(3));
}

#[test]
fn violation_selects_the_default_message() {
    let ctx = ctx_for("abc");
    let catcher = series(vec![text("a")], Some(0));
    let expected = text("x");
    let error = violation_error(&ctx, &catcher, &expected, 1, false, None);
    assert_eq!(error.code, MANDATORY_CONTINUATION);
    assert_eq!(error.position, 1);
    assert_eq!(error.message, "\"x\" expected, but \u{bb}bc\u{ab} found");
    assert_eq!(ctx.errors().len(), 1);
    assert_eq!(ctx.errors()[0].line, 1);
    assert_eq!(ctx.errors()[0].column, 2);
}

#[test]
fn violation_message_selection_and_code_override() {
    let ctx = ctx_for("abc");
    let catcher = series(vec![text("a")], Some(0));
    catcher.set_error_messages(vec![
        (at_str("z"), "never".to_string()),
        (at_str("b"), "2001:missing delimiter before {1}".to_string()),
    ]);
    let error = violation_error(&ctx, &catcher, &text("x"), 1, false, None);
    assert_eq!(error.code, 2001);
    assert_eq!(error.message, "missing delimiter before bc");
}

#[test]
fn violation_at_eof_upgrades_for_lookaheads() {
    let ctx = ctx_for("ab");
    let catcher = series(vec![text("a")], Some(0));
    let error = violation_error(&ctx, &catcher, &text("x"), 2, true, None);
    assert_eq!(error.code, MANDATORY_CONTINUATION_AT_EOF);
    // the only caller in a series passes `false`, which never upgrades
    let error = violation_error(&ctx, &catcher, &text("x"), 2, false, None);
    assert_eq!(error.code, MANDATORY_CONTINUATION);
}

#[test]
fn violation_during_recovery_gets_its_own_code() {
    let ctx = ctx_for("abc");
    let catcher = series(vec![text("a")], Some(0));
    ctx.enter_recovery();
    let error = violation_error(&ctx, &catcher, &text("x"), 1, false, None);
    ctx.exit_recovery();
    assert_eq!(error.code, ERROR_WHILE_RECOVERING);
}

#[test]
fn violation_length_covers_the_skipped_span() {
    let ctx = ctx_for("abcdef");
    let catcher = series(vec![text("a")], Some(0));
    let error = violation_error(&ctx, &catcher, &text("x"), 1, false, Some(4));
    assert_eq!(error.length, 3);
    let error = violation_error(&ctx, &catcher, &text("x"), 1, false, None);
    assert_eq!(error.length, 1);
}

#[test]
fn attachment_needs_exactly_one_catcher() {
    // the named parser itself is the catcher
    let rule = assign("rule", series(vec![text("a"), text("b")], Some(1)));
    assert!(skip_until(&rule, vec![at_str(";")]).is_ok());
    assert!(set_errors(&rule, vec![(at_str("b"), "oops".to_string())]).is_ok());

    // no catcher beneath the name
    let plain = assign("plain", series(vec![text("a")], None));
    assert!(skip_until(&plain, vec![at_str(";")]).is_err());

    // two catchers reachable through anonymous parsers
    let ambiguous = assign(
        "ambiguous",
        series(
            vec![
                series(vec![text("a")], Some(0)),
                series(vec![text("b")], Some(0)),
            ],
            None,
        ),
    );
    assert!(set_errors(&ambiguous, vec![(at_str("a"), "x".to_string())]).is_err());
}
