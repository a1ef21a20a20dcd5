//! Krishi CLI library — command implementations shared by the `krishi`
//! binary and its integration tests.

pub mod commands;
