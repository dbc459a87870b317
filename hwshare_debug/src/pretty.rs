// Copyright 2026 the Hwshare Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`TraceSink`] and writes one line per event
//! to a [`Write`](std::io::Write) destination (default: stderr).

use std::io::Write;

use hwshare_core::binder::BindState;
use hwshare_core::trace::{
    BindStateEvent, CreationPath, SurfaceCreatedEvent, TeardownEvent, TeardownStep, TraceSink,
    TransportEvent,
};

/// Writes human-readable trace lines to a [`Write`](std::io::Write) destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write>> {
    writer: W,
}

impl<W: Write> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink").finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self {
            writer: Box::new(std::io::stderr()),
        }
    }

    /// Creates a sink that writes to a boxed writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write>) -> Self {
        Self { writer }
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W) -> Self {
        Self { writer }
    }

    /// Consumes the sink and returns its writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

pub(crate) fn path_name(path: CreationPath) -> &'static str {
    match path {
        CreationPath::Native => "native",
        CreationPath::Imported => "imported",
        CreationPath::Fallback => "fallback",
    }
}

pub(crate) fn state_name(state: BindState) -> &'static str {
    match state {
        BindState::Unbound => "unbound",
        BindState::Importing => "importing",
        BindState::Bound => "bound",
        BindState::Failed => "failed",
    }
}

pub(crate) fn step_name(step: TeardownStep) -> &'static str {
    match step {
        TeardownStep::TransportBuffer => "transport",
        TeardownStep::GpuImage => "gpu-image",
        TeardownStep::NativeBuffer => "native-buffer",
        TeardownStep::Generic => "generic",
    }
}

impl<W: Write> TraceSink for PrettyPrintSink<W> {
    fn on_surface_created(&mut self, e: &SurfaceCreatedEvent<'_>) {
        let _ = write!(
            self.writer,
            "[surface] {:?} {}x{} depth={} path={}",
            e.surface,
            e.width,
            e.height,
            e.depth,
            path_name(e.path),
        );
        let _ = match e.fallback {
            Some(reason) => writeln!(self.writer, " reason=\"{reason}\""),
            None => writeln!(self.writer),
        };
    }

    fn on_bind_state(&mut self, e: &BindStateEvent) {
        let _ = writeln!(
            self.writer,
            "[bind] {:?} {} -> {}",
            e.buffer,
            state_name(e.from),
            state_name(e.to),
        );
    }

    fn on_transport(&mut self, e: &TransportEvent) {
        let how = if e.created { "created" } else { "reused" };
        let _ = writeln!(
            self.writer,
            "[transport] {:?} buffer={} {how}",
            e.surface, e.buffer.0,
        );
    }

    fn on_teardown(&mut self, e: &TeardownEvent) {
        let _ = writeln!(
            self.writer,
            "[teardown] {:?} {}",
            e.surface,
            step_name(e.step),
        );
    }
}
