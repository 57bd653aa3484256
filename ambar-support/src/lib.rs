//! # Ambar Support
//!
//! Shared helpers for the Ambar DI crates.
//!
//! This crate provides:
//! - Rendering of resolution chains and type names for error messages
//! - Similarity heuristics for "did you mean?" hints

pub mod rendering;
