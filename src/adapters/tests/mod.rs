//! Tests for the platform clients, driven through the mock HTTP client

pub mod test_helpers;
