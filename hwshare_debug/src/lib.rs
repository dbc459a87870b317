// Copyright 2026 the Hwshare Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Recording, pretty-printing, and JSON-lines export for hwshare lifecycle
//! traces.
//!
//! This crate provides [`TraceSink`](hwshare_core::trace::TraceSink)
//! implementations for development and post-mortem analysis:
//!
//! - [`pretty::PrettyPrintSink`]: human-readable one-line-per-event output.
//! - [`recorder::RecorderSink`]: in-memory, ordered event recording.
//! - [`json::to_json_lines`]: writes recorded events as JSON lines.

pub mod json;
pub mod pretty;
pub mod recorder;
