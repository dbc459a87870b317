// Copyright 2026 the Hwshare Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error taxonomy.
//!
//! Allocation, import and bind failures on the surface-creation path are
//! recovered locally: the manager records a [`FallbackReason`] and creates a
//! generic surface instead. Transport failures ([`TransportError`]) have no
//! fallback and are returned to the caller.

use std::io;

use thiserror::Error;

use crate::buffer::PixelFormat;

/// The platform allocator refused a buffer request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AllocationError {
    /// Zero or oversized dimensions; the platform was not called.
    #[error("invalid buffer dimensions {width}x{height}")]
    InvalidDimensions {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },
    /// The format is not known to this backend.
    #[error("unsupported pixel format {0:?}")]
    UnsupportedFormat(PixelFormat),
    /// The platform entry point reported failure.
    #[error("platform allocator failed: {0}")]
    Platform(String),
}

/// The GPU rejected a native buffer as an image source.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("native buffer import rejected (error {code:#x})")]
pub struct ImportError {
    /// Platform error code (`EGL_BAD_*` on EGL).
    pub code: u32,
}

/// Texture creation, attachment or verification failed after import.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BindError {
    /// No texture name could be allocated.
    #[error("texture allocation failed: {0}")]
    TextureAllocation(String),
    /// The GPU recorded an error after attaching the image.
    #[error("image attach failed (error {0:#x})")]
    Attach(u32),
    /// Clearing the freshly bound texture failed.
    #[error("texture clear failed (error {0:#x})")]
    Clear(u32),
    /// Reading back texture contents failed.
    #[error("texture read-back failed (error {0:#x})")]
    ReadBack(u32),
    /// The context the texture lives on could not be made current.
    #[error(transparent)]
    Context(#[from] ContextError),
}

/// The GPU context could not be made current.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("failed to make GPU context current: {0}")]
pub struct ContextError(pub String);

/// Describing or serializing a native buffer's handle failed.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The platform did not report a handle layout for the buffer.
    #[error("native buffer has no handle layout")]
    NoLayout,
    /// The platform's serialization call failed.
    #[error("native buffer serialization failed")]
    SerializeFailed,
    /// Descriptor lengths disagree with the reported layout.
    #[error(
        "descriptor has {ints} ints and {fds} fds, layout expects {expected_ints} and {expected_fds}"
    )]
    LayoutMismatch {
        /// Integers present.
        ints: usize,
        /// File descriptors present.
        fds: usize,
        /// Integers expected.
        expected_ints: usize,
        /// File descriptors expected.
        expected_fds: usize,
    },
    /// Duplicating a handle file descriptor failed.
    #[error("failed to duplicate handle fd: {0}")]
    Dup(#[from] io::Error),
}

/// The remote buffer-allocation protocol has not been bound.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("remote buffer-allocation protocol is not available")]
pub struct ProtocolUnavailable;

/// A remote buffer-construction request failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A request argument does not fit the wire type.
    #[error("request argument {name} out of range")]
    ArgumentRange {
        /// Argument name.
        name: &'static str,
    },
    /// The connection to the display process is gone.
    #[error("display connection lost")]
    ConnectionLost,
}

/// Failure of [`SurfaceManager::get_transport_handle`] and
/// [`SurfaceManager::buffer_from_pixmap`].
///
/// [`SurfaceManager::get_transport_handle`]: crate::manager::SurfaceManager::get_transport_handle
/// [`SurfaceManager::buffer_from_pixmap`]: crate::manager::SurfaceManager::buffer_from_pixmap
#[derive(Debug, Error)]
pub enum TransportError {
    /// The surface has generic storage and no native buffer to share.
    #[error("surface has no native buffer")]
    NoNativeBuffer,
    /// The surface handle is stale or was never issued.
    #[error("unknown surface")]
    UnknownSurface,
    /// The remote protocol has not been bound.
    #[error(transparent)]
    ProtocolUnavailable(#[from] ProtocolUnavailable),
    /// The descriptor could not be produced.
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// The remote construction request failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Why a surface request took the generic path.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    /// The request itself is not eligible for native backing.
    #[error("request not eligible: {0}")]
    Ineligible(&'static str),
    /// The remote protocol was not bound when the surface was requested.
    #[error(transparent)]
    ProtocolUnavailable(#[from] ProtocolUnavailable),
    /// The GPU context could not be made current.
    #[error(transparent)]
    Context(#[from] ContextError),
    /// The platform allocator refused the buffer.
    #[error(transparent)]
    Allocation(#[from] AllocationError),
    /// The GPU refused the buffer as an image.
    #[error(transparent)]
    Import(#[from] ImportError),
    /// Texture binding or clearing failed.
    #[error(transparent)]
    Bind(#[from] BindError),
}

/// Why [`SurfaceManager::pixmap_from_buffer`] refused a remote buffer.
///
/// [`SurfaceManager::pixmap_from_buffer`]: crate::manager::SurfaceManager::pixmap_from_buffer
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ImportRejected {
    /// Only 32 bpp buffers of depth 24 or 32 with non-zero size are accepted.
    #[error("unsupported geometry {width}x{height} depth {depth} bpp {bpp}")]
    Geometry {
        /// Width in pixels.
        width: u32,
        /// Height in pixels.
        height: u32,
        /// Drawable depth.
        depth: u8,
        /// Bits per pixel.
        bpp: u8,
    },
    /// The GPU context could not be made current.
    #[error(transparent)]
    Context(#[from] ContextError),
    /// The platform could not reconstruct the buffer.
    #[error(transparent)]
    Allocation(#[from] AllocationError),
    /// The GPU refused the buffer as an image.
    #[error(transparent)]
    Import(#[from] ImportError),
    /// Texture binding failed.
    #[error(transparent)]
    Bind(#[from] BindError),
}

/// Backend initialization failed; the host should pick another backend.
#[derive(Debug, Error)]
pub enum InitError {
    /// The platform library could not be loaded.
    #[error("failed to load platform library: {0}")]
    Load(String),
    /// Display or context setup failed.
    #[error("EGL setup failed at {stage}: {message}")]
    Egl {
        /// Which setup call failed.
        stage: &'static str,
        /// Platform error text.
        message: String,
    },
    /// A required entry point is missing.
    #[error("missing entry point {0}")]
    MissingEntryPoint(&'static str),
    /// A required GL extension is missing.
    #[error("missing GL extension {0}")]
    MissingExtension(&'static str),
}
