//! Channel layer for prompt matching over an interactive shell.
//!
//! This module handles the shell session I/O, including tail-anchored
//! prompt detection and ANSI stripping.

mod buffer;
mod pty;

pub use buffer::PatternBuffer;
pub use pty::PtyChannel;
