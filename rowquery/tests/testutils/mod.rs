//! Test utilities for RowQuery integration tests
//!
//! `TestFixture` owns an in-memory engine configured with small pages and
//! short lock waits, and declares the tables the tests share.

#![allow(dead_code)]

pub mod test_fixture;
