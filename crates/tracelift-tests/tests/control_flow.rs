//! Conditionals: value-producing branches and exceptions.

use tracelift_tests::{branch_select, guard};

#[test]
fn test_branch_select() {
    assert_eq!(branch_select::forward(true, 2, 3), 5);
    assert_eq!(branch_select::forward(false, 2, 3), -3);
}

#[test]
fn test_guard_passes_through() {
    assert_eq!(guard::forward(4), 4);
    assert_eq!(guard::forward(0), 0);
}

#[test]
#[should_panic(expected = "negative input")]
fn test_guard_raises() {
    guard::forward(-1);
}
