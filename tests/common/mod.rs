//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;
pub mod recording;

use arrayflow::store::{ArrayPath, Registry};
use arrayflow::types::Element;

/// Parse a `container|matrix|array` path, panicking on malformed input.
pub fn path(text: &str) -> ArrayPath {
    text.parse().expect("valid path")
}

/// Copy the values of a dense array out of the registry.
pub fn values<T: Element>(registry: &Registry, text: &str) -> Vec<T> {
    let shared = registry.array(&path(text)).expect("array exists");
    let array = shared.read();
    array.view::<T>().expect("matching element type").as_slice().to_vec()
}

/// Assert two floats are approximately equal
pub fn assert_float_eq(a: f64, b: f64, epsilon: f64) {
    assert!(
        (a - b).abs() < epsilon,
        "Expected {} to be approximately equal to {} (epsilon: {})",
        a,
        b,
        epsilon
    );
}
