//! Tuples and lists.

use tracelift_tests::{list_ops, tuple_swap};

#[test]
fn test_tuple_swap() {
    assert_eq!(tuple_swap::forward(1, 2), (2, 1));
    assert_eq!(tuple_swap::forward(-5, 5), (5, -5));
}

#[test]
fn test_list_append_len_index() {
    // [a, b] + [c] -> last element plus length
    assert_eq!(list_ops::forward(1, 2, 7), 10);
    assert_eq!(list_ops::forward(0, 0, -3), 0);
}
