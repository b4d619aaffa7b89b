//! Utilities
//!
//! Cross-cutting helpers for output capture and generated Python source.

pub mod output;
pub mod py_literal;
