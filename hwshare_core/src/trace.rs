// Copyright 2026 the Hwshare Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Lifecycle tracing hooks.
//!
//! The [`SurfaceManager`](crate::manager::SurfaceManager) and the
//! [`Binder`](crate::binder::Binder) report every lifecycle step to a
//! [`TraceSink`]. All methods default to no-ops, so implementing only the
//! events you care about is fine. `hwshare_debug` provides printing and
//! recording sinks.

use crate::binder::BindState;
use crate::buffer::RawBuffer;
use crate::error::FallbackReason;
use crate::registry::TransportBuffer;
use crate::surface::SurfaceId;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// How a surface got its storage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CreationPath {
    /// A freshly allocated native buffer.
    Native,
    /// A native buffer reconstructed from a remote descriptor.
    Imported,
    /// Generic host storage, no native buffer.
    Fallback,
}

/// One step of surface teardown, in the order they happen.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TeardownStep {
    /// The remote-visible transport buffer was destroyed.
    TransportBuffer,
    /// The texture and then the image were destroyed.
    GpuImage,
    /// The native buffer was released.
    NativeBuffer,
    /// The generic slot was freed.
    Generic,
}

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Emitted when a surface is created.
#[derive(Clone, Copy, Debug)]
pub struct SurfaceCreatedEvent<'a> {
    /// New surface handle.
    pub surface: SurfaceId,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Drawable depth.
    pub depth: u8,
    /// Which path produced the storage.
    pub path: CreationPath,
    /// Why the native path was not taken, for [`CreationPath::Fallback`].
    pub fallback: Option<&'a FallbackReason>,
}

/// Emitted on every binder state transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BindStateEvent {
    /// Buffer being bound.
    pub buffer: RawBuffer,
    /// Previous state.
    pub from: BindState,
    /// New state.
    pub to: BindState,
}

/// Emitted when a transport handle is requested successfully.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransportEvent {
    /// Surface whose handle was requested.
    pub surface: SurfaceId,
    /// The transport buffer.
    pub buffer: TransportBuffer,
    /// `true` if a remote construction request was made.
    pub created: bool,
}

/// Emitted for each teardown step of a surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TeardownEvent {
    /// Surface being destroyed.
    pub surface: SurfaceId,
    /// Which resource was released.
    pub step: TeardownStep,
}

// ---------------------------------------------------------------------------
// TraceSink trait
// ---------------------------------------------------------------------------

/// Receives lifecycle events.
pub trait TraceSink {
    /// Called after a surface is created.
    fn on_surface_created(&mut self, e: &SurfaceCreatedEvent<'_>) {
        _ = e;
    }

    /// Called on every binder state transition.
    fn on_bind_state(&mut self, e: &BindStateEvent) {
        _ = e;
    }

    /// Called when a transport handle is returned.
    fn on_transport(&mut self, e: &TransportEvent) {
        _ = e;
    }

    /// Called for each teardown step.
    fn on_teardown(&mut self, e: &TeardownEvent) {
        _ = e;
    }
}

// ---------------------------------------------------------------------------
// NoopSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}
