// Copyright 2026 the Hwshare Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! In-memory event recording.
//!
//! [`RecorderSink`] implements [`TraceSink`] and keeps every event, in
//! arrival order, as an owned [`RecordedEvent`]. Fallback reasons are kept as
//! their display text.

use hwshare_core::surface::SurfaceId;
use hwshare_core::trace::{
    BindStateEvent, CreationPath, SurfaceCreatedEvent, TeardownEvent, TraceSink, TransportEvent,
};

/// An owned copy of one trace event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordedEvent {
    /// A [`SurfaceCreatedEvent`].
    SurfaceCreated {
        /// New surface handle.
        surface: SurfaceId,
        /// Width in pixels.
        width: u32,
        /// Height in pixels.
        height: u32,
        /// Drawable depth.
        depth: u8,
        /// Which path produced the storage.
        path: CreationPath,
        /// Fallback reason, rendered.
        fallback: Option<String>,
    },
    /// A [`BindStateEvent`].
    BindState(BindStateEvent),
    /// A [`TransportEvent`].
    Transport(TransportEvent),
    /// A [`TeardownEvent`].
    Teardown(TeardownEvent),
}

impl RecordedEvent {
    /// Surface the event belongs to. Bind transitions carry only a buffer.
    #[must_use]
    pub fn surface(&self) -> Option<SurfaceId> {
        match self {
            Self::SurfaceCreated { surface, .. } => Some(*surface),
            Self::Transport(e) => Some(e.surface),
            Self::Teardown(e) => Some(e.surface),
            Self::BindState(_) => None,
        }
    }
}

/// A [`TraceSink`] that records events in memory.
#[derive(Debug, Default)]
pub struct RecorderSink {
    events: Vec<RecordedEvent>,
}

impl RecorderSink {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded events, oldest first.
    #[must_use]
    pub fn events(&self) -> &[RecordedEvent] {
        &self.events
    }

    /// Consumes the recorder and returns its events.
    #[must_use]
    pub fn into_events(self) -> Vec<RecordedEvent> {
        self.events
    }

    /// Forgets every recorded event.
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Events that belong to `surface`, oldest first.
    pub fn for_surface(&self, surface: SurfaceId) -> impl Iterator<Item = &RecordedEvent> + '_ {
        self.events
            .iter()
            .filter(move |e| e.surface() == Some(surface))
    }
}

impl TraceSink for RecorderSink {
    fn on_surface_created(&mut self, e: &SurfaceCreatedEvent<'_>) {
        self.events.push(RecordedEvent::SurfaceCreated {
            surface: e.surface,
            width: e.width,
            height: e.height,
            depth: e.depth,
            path: e.path,
            fallback: e.fallback.map(ToString::to_string),
        });
    }

    fn on_bind_state(&mut self, e: &BindStateEvent) {
        self.events.push(RecordedEvent::BindState(*e));
    }

    fn on_transport(&mut self, e: &TransportEvent) {
        self.events.push(RecordedEvent::Transport(*e));
    }

    fn on_teardown(&mut self, e: &TeardownEvent) {
        self.events.push(RecordedEvent::Teardown(*e));
    }
}
