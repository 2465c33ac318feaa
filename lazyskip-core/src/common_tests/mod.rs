//! Test suites shared between guard implementations.
//!
//! Public so that crates providing their own [`Guard`](crate::Guard) can run
//! the same checks against it.
