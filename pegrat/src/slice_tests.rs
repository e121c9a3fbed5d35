use crate::rx::Rx;
use crate::slice::StringSlice;

#[test]
fn sub_views_share_the_buffer_and_compare_by_content() {
    let s = StringSlice::from("hello world");
    assert_eq!(s.len(), 11);
    let hello = s.sub(0, 5);
    let world = s.sub(6, 11);
    assert_eq!(hello, "hello");
    assert_eq!(world.as_str(), "world");
    assert_eq!(hello, StringSlice::from("hello"));
    assert_ne!(hello, world);
    assert!(s.sub(5, 5).is_empty());
}

#[test]
fn concat_of_adjacent_views_stays_in_the_buffer() {
    let s = StringSlice::from("abcdef");
    let left = s.sub(0, 3);
    let right = s.sub(3, 6);
    assert_eq!(left.concat(&right), "abcdef");
    // non-adjacent views fall back to an owned buffer
    let gap = s.sub(0, 2).concat(&s.sub(4, 6));
    assert_eq!(gap.as_str(), "abef");
}

#[test]
fn anchored_match_at_offset() {
    let rx = Rx::new(r"\d+").unwrap();
    let s = StringSlice::from("ab 123 cd 45");
    assert_eq!(s.match_len_at(&rx, 0), None);
    assert_eq!(s.match_len_at(&rx, 3), Some(3));
    assert_eq!(s.match_len_at(&rx, 4), Some(2));
}

#[test]
fn empty_match_is_a_match() {
    let rx = Rx::new("a*").unwrap();
    let s = StringSlice::from("bbb");
    assert_eq!(s.match_len_at(&rx, 0), Some(0));
}

#[test]
fn windowed_search() {
    let rx = Rx::new(r"\d+").unwrap();
    let s = StringSlice::from("ab 123 cd 45");
    assert_eq!(s.find_from(&rx, 0, 100), Some((3, 6)));
    assert_eq!(s.find_from(&rx, 6, 100), Some((10, 12)));
    assert_eq!(s.find_from(&rx, 6, 2), None);
    assert_eq!(s.find_str_from("cd", 0, 100), Some(7));
    assert_eq!(s.find_str_from("cd", 8, 100), None);
}

#[test]
fn string_search_window_may_end_inside_a_rune() {
    let s = StringSlice::from("aa€;");
    // the 4-byte window ends inside the three-byte `€`
    assert_eq!(s.find_str_from(";", 0, 4), None);
    assert_eq!(s.find_str_from(";", 0, 10), Some(5));
}

#[test]
fn line_and_column_are_one_based() {
    let s = StringSlice::from("ab\ncde\nf");
    assert_eq!(s.line_col(0), (1, 1));
    assert_eq!(s.line_col(1), (1, 2));
    assert_eq!(s.line_col(3), (2, 1));
    assert_eq!(s.line_col(6), (2, 4));
    assert_eq!(s.line_col(7), (3, 1));
}

#[test]
fn never_matching_regex_never_matches() {
    let rx = Rx::never();
    let s = StringSlice::from("anything at all");
    assert_eq!(s.find_from(&rx, 0, 100), None);
    assert_eq!(s.match_len_at(&rx, 0), None);
}
