//! Counted loops: carried values, the induction variable and values read
//! from enclosing scopes.

use tracelift_tests::{accumulate_orig, loop_accumulate, nested_guard};

#[test]
fn test_accumulate() {
    assert_eq!(loop_accumulate::forward(5, 0), 10);
    assert_eq!(loop_accumulate::forward(5, 7), 17);
    assert_eq!(loop_accumulate::forward(100, 0), 4950);
}

#[test]
fn test_accumulate_zero_trips() {
    assert_eq!(loop_accumulate::forward(0, 42), 42);
    // A negative bound yields an empty range
    assert_eq!(loop_accumulate::forward(-3, 42), 42);
}

#[test]
fn test_accumulate_matches_plain_rust() {
    for n in 0..50 {
        assert_eq!(loop_accumulate::forward(n, 3), accumulate_orig(n, 3));
    }
}

#[test]
fn test_conditional_inside_loop() {
    // Sums the indices below the limit
    assert_eq!(nested_guard::forward(5, 3, 0), 3);
    assert_eq!(nested_guard::forward(5, 10, 100), 110);
    assert_eq!(nested_guard::forward(5, 0, 9), 9);
}
