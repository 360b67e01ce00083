//! Integration test suite for the gateway workspace. The tests live under
//! `tests/`; this crate exports nothing of its own.
