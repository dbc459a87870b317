// Copyright 2026 the Hwshare Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Backend configuration.

use crate::buffer::{BufferUsage, PixelFormat};

/// Interface name of the remote buffer-allocation protocol.
pub const ANDROID_WLEGL: &str = "android_wlegl";

/// Configuration for the [`SurfaceManager`](crate::manager::SurfaceManager).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackendConfig {
    /// Each window has its own composited backing store. Window backing
    /// stores are cleared before first use in this mode.
    pub rootless: bool,
    /// Format of buffers allocated for surfaces.
    pub format: PixelFormat,
    /// Usage of buffers allocated for surfaces.
    pub render_usage: BufferUsage,
    /// Usage of buffers reconstructed from client descriptors.
    pub import_usage: BufferUsage,
    /// Minimum drawable depth eligible for native backing.
    pub min_depth: u8,
    /// Largest width or height passed to the platform allocator.
    pub max_dimension: u32,
    /// Registry interface name of the remote allocation protocol.
    pub protocol_name: &'static str,
}

impl BackendConfig {
    /// Rootless mode: one composited backing store per window.
    #[must_use]
    pub const fn rootless() -> Self {
        Self {
            rootless: true,
            format: PixelFormat::RGBA_8888,
            render_usage: BufferUsage::HW_RENDER,
            import_usage: BufferUsage::HW_TEXTURE,
            min_depth: 15,
            max_dimension: 8192,
            protocol_name: ANDROID_WLEGL,
        }
    }

    /// Rooted mode: windows share the root framebuffer.
    #[must_use]
    pub const fn rooted() -> Self {
        Self {
            rootless: false,
            ..Self::rootless()
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::rootless()
    }
}
