//! Deterministic, pure logic shared by the tool surface.
//!
//! Core modules must be free of I/O side effects. They build argument vectors,
//! inspect diff text, and define the value types results travel in.

pub mod commands;
pub mod diff_gate;
pub mod types;
