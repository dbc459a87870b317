// Copyright 2026 the Hwshare Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Surface data model.
//!
//! A *surface* is a drawable's backing store. Each surface has:
//!
//! - An identity ([`SurfaceId`]) — a generational handle that becomes stale
//!   when the surface is destroyed, so a dangling reference is rejected
//!   instead of touching a recycled slot.
//! - A reference count held by the [`SurfaceStore`]; only the final release
//!   returns the surface for teardown.
//! - A [`Storage`]: either [`Storage::Generic`] host storage, or
//!   [`Storage::External`] native-buffer storage holding the
//!   [`NativeBuffer`], its [`BoundImage`] and the lazily created
//!   [`TransportBuffer`].

mod id;
mod store;

pub use id::SurfaceId;
pub use store::{Release, SurfaceStore};

use crate::binder::BoundImage;
use crate::buffer::{NativeBuffer, PixelFormat};
use crate::registry::TransportBuffer;

/// Host allocation hint (`CREATE_PIXMAP_USAGE_*`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum UsageHint {
    /// No particular use.
    #[default]
    Default,
    /// Short-lived scratch storage.
    Scratch,
    /// A window's backing store.
    BackingStore,
    /// Glyph cache storage.
    Glyph,
    /// Storage shared with another client.
    Shared,
}

impl UsageHint {
    /// Maps the host's numeric hint. Unknown values return `None`.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::Default),
            1 => Some(Self::Scratch),
            2 => Some(Self::BackingStore),
            3 => Some(Self::Glyph),
            4 => Some(Self::Shared),
            _ => None,
        }
    }

    /// Whether surfaces with this hint may be backed by a native buffer.
    #[must_use]
    pub const fn allows_native(self) -> bool {
        matches!(self, Self::Default | Self::BackingStore | Self::Shared)
    }
}

/// A request for a new surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SurfaceRequest {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Drawable depth in bits.
    pub depth: u8,
    /// Allocation hint.
    pub hint: UsageHint,
}

/// Which kind of storage backs a surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StorageClass {
    /// Host-owned storage.
    Generic,
    /// A foreign GPU texture over a native buffer.
    External,
}

/// Native-buffer storage of a surface.
#[derive(Debug)]
pub struct ExternalStorage {
    pub(crate) buffer: NativeBuffer,
    pub(crate) bound: BoundImage,
    pub(crate) transport: Option<TransportBuffer>,
}

impl ExternalStorage {
    /// The backing native buffer.
    #[must_use]
    pub fn buffer(&self) -> &NativeBuffer {
        &self.buffer
    }

    /// The image and texture over the buffer.
    #[must_use]
    pub fn bound(&self) -> &BoundImage {
        &self.bound
    }

    /// The cached transport buffer, if one has been created.
    #[must_use]
    pub fn transport(&self) -> Option<TransportBuffer> {
        self.transport
    }

    /// Row stride in pixels.
    #[must_use]
    pub fn stride(&self) -> u32 {
        self.buffer.stride()
    }

    /// Pixel format.
    #[must_use]
    pub fn format(&self) -> PixelFormat {
        self.buffer.format()
    }
}

/// Storage behind a surface.
#[derive(Debug)]
pub enum Storage {
    /// Host storage without a native buffer.
    Generic,
    /// Native-buffer storage.
    External(ExternalStorage),
}

/// A drawable's backing store.
#[derive(Debug)]
pub struct Surface {
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) depth: u8,
    pub(crate) hint: UsageHint,
    pub(crate) storage: Storage,
}

impl Surface {
    pub(crate) const fn generic(request: &SurfaceRequest) -> Self {
        Self {
            width: request.width,
            height: request.height,
            depth: request.depth,
            hint: request.hint,
            storage: Storage::Generic,
        }
    }

    pub(crate) fn with_external(request: &SurfaceRequest, storage: ExternalStorage) -> Self {
        Self {
            width: request.width,
            height: request.height,
            depth: request.depth,
            hint: request.hint,
            storage: Storage::External(storage),
        }
    }

    /// Width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Drawable depth.
    #[must_use]
    pub const fn depth(&self) -> u8 {
        self.depth
    }

    /// Allocation hint the surface was created with.
    #[must_use]
    pub const fn hint(&self) -> UsageHint {
        self.hint
    }

    /// The surface's storage.
    #[must_use]
    pub const fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Native-buffer storage, if any.
    #[must_use]
    pub const fn external(&self) -> Option<&ExternalStorage> {
        match &self.storage {
            Storage::External(external) => Some(external),
            Storage::Generic => None,
        }
    }

    /// Storage class seen by rendering code.
    #[must_use]
    pub const fn storage_class(&self) -> StorageClass {
        match self.storage {
            Storage::Generic => StorageClass::Generic,
            Storage::External(_) => StorageClass::External,
        }
    }
}
