// Copyright 2026 the Hwshare Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! GPU image import and texture binding.
//!
//! Binding follows a small state machine:
//!
//! ```text
//!   Unbound ──► Importing ──► Bound
//!                   │
//!                   ▼
//!                 Failed ──► Unbound   (rollback)
//! ```
//!
//! A [`BoundImage`] always holds both the image and the texture, so a
//! surface can never see one without the other. Any failure after the image
//! exists destroys it (and the texture, if one was created) before
//! returning.
//!
//! The GPU context must be current before any [`Binder`] call; the
//! [`SurfaceManager`](crate::manager::SurfaceManager) takes care of that.

use core::fmt;
use core::num::{NonZeroU32, NonZeroUsize};

use thiserror::Error;

use crate::buffer::{NativeBuffer, RawBuffer};
use crate::error::{BindError, ContextError, FallbackReason, ImportError, ImportRejected};
use crate::trace::{BindStateEvent, TraceSink};

/// GPU image object (an `EGLImageKHR` on EGL).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct GpuImage(pub NonZeroUsize);

impl fmt::Debug for GpuImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GpuImage({:#x})", self.0)
    }
}

/// GPU texture name.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct GpuTexture(pub NonZeroU32);

impl fmt::Debug for GpuTexture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GpuTexture({})", self.0)
    }
}

/// GPU entry points used by the binder.
///
/// On EGL/GLES2 these map to `eglMakeCurrent`, `eglCreateImageKHR` with
/// `EGL_NATIVE_BUFFER_HYBRIS`, `glGenTextures`, `glTexParameteri`,
/// `glEGLImageTargetTexture2DOES` and `eglGetError`.
pub trait GpuApi {
    /// Makes the backend's context current on this thread.
    fn make_current(&mut self) -> Result<(), ContextError>;

    /// Imports a native buffer as an image.
    fn create_image(&mut self, raw: RawBuffer) -> Result<GpuImage, ImportError>;

    /// Destroys an image created by [`create_image`](Self::create_image).
    fn destroy_image(&mut self, image: GpuImage);

    /// Allocates a texture name.
    fn create_texture(&mut self) -> Result<GpuTexture, BindError>;

    /// Sets nearest-neighbour min and mag filtering.
    fn set_nearest_filtering(&mut self, texture: GpuTexture);

    /// Attaches `image` as `texture`'s storage.
    fn attach_image(&mut self, texture: GpuTexture, image: GpuImage);

    /// Returns and clears the pending error recorded since the last call.
    fn take_error(&mut self) -> Option<u32>;

    /// Deletes a texture name.
    fn delete_texture(&mut self, texture: GpuTexture);

    /// Clears the texture's contents to transparent black.
    fn clear_texture(
        &mut self,
        texture: GpuTexture,
        width: u32,
        height: u32,
    ) -> Result<(), BindError>;

    /// Reads back the texture as tightly packed RGBA bytes.
    fn read_texture(
        &mut self,
        texture: GpuTexture,
        width: u32,
        height: u32,
    ) -> Result<Vec<u8>, BindError>;
}

/// Binding progress for one native buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BindState {
    /// No image or texture exists.
    Unbound,
    /// The image is being imported and attached.
    Importing,
    /// Image and texture are both live.
    Bound,
    /// Import or attach failed; rollback in progress.
    Failed,
}

/// A native buffer's image and texture, always created and destroyed
/// together.
#[derive(Debug, PartialEq, Eq)]
pub struct BoundImage {
    image: GpuImage,
    texture: GpuTexture,
}

impl BoundImage {
    /// The imported image.
    #[must_use]
    pub const fn image(&self) -> GpuImage {
        self.image
    }

    /// The texture backed by the image.
    #[must_use]
    pub const fn texture(&self) -> GpuTexture {
        self.texture
    }
}

/// Why [`Binder::bind`] failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BindFailure {
    /// The image import was rejected.
    #[error(transparent)]
    Import(#[from] ImportError),
    /// The texture could not be created or attached.
    #[error(transparent)]
    Bind(#[from] BindError),
}

impl From<BindFailure> for FallbackReason {
    fn from(failure: BindFailure) -> Self {
        match failure {
            BindFailure::Import(err) => Self::Import(err),
            BindFailure::Bind(err) => Self::Bind(err),
        }
    }
}

impl From<BindFailure> for ImportRejected {
    fn from(failure: BindFailure) -> Self {
        match failure {
            BindFailure::Import(err) => Self::Import(err),
            BindFailure::Bind(err) => Self::Bind(err),
        }
    }
}

/// Imports native buffers and binds them to textures.
pub struct Binder<'a> {
    gpu: &'a mut dyn GpuApi,
    sink: &'a mut dyn TraceSink,
}

impl fmt::Debug for Binder<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binder").finish_non_exhaustive()
    }
}

impl<'a> Binder<'a> {
    /// Creates a binder over a current GPU context.
    #[must_use]
    pub fn new(gpu: &'a mut dyn GpuApi, sink: &'a mut dyn TraceSink) -> Self {
        Self { gpu, sink }
    }

    fn transition(&mut self, buffer: RawBuffer, from: BindState, to: BindState) {
        let event = BindStateEvent { buffer, from, to };
        self.sink.on_bind_state(&event);
    }

    /// Imports `buffer` and binds it to a new texture.
    ///
    /// # Errors
    ///
    /// Returns [`BindFailure::Import`] if the image import is rejected and
    /// [`BindFailure::Bind`] if the texture cannot be created or the GPU
    /// reports an error after attaching. Nothing is left allocated on error.
    pub fn bind(&mut self, buffer: &NativeBuffer) -> Result<BoundImage, BindFailure> {
        let raw = buffer.raw();
        self.transition(raw, BindState::Unbound, BindState::Importing);

        // Drop any error left over from unrelated calls.
        let _ = self.gpu.take_error();

        let image = match self.gpu.create_image(raw) {
            Ok(image) => image,
            Err(err) => {
                log::warn!("image import of {raw:?} rejected: {err}");
                self.rollback(raw, None, None);
                return Err(err.into());
            }
        };

        let texture = match self.gpu.create_texture() {
            Ok(texture) => texture,
            Err(err) => {
                log::warn!("texture allocation for {raw:?} failed: {err}");
                self.rollback(raw, Some(image), None);
                return Err(err.into());
            }
        };

        self.gpu.set_nearest_filtering(texture);
        self.gpu.attach_image(texture, image);
        if let Some(code) = self.gpu.take_error() {
            log::warn!("attaching {image:?} to {texture:?} failed with {code:#x}");
            self.rollback(raw, Some(image), Some(texture));
            return Err(BindError::Attach(code).into());
        }

        self.transition(raw, BindState::Importing, BindState::Bound);
        log::debug!("bound {raw:?} as {image:?} / {texture:?}");
        Ok(BoundImage { image, texture })
    }

    fn rollback(&mut self, raw: RawBuffer, image: Option<GpuImage>, texture: Option<GpuTexture>) {
        self.transition(raw, BindState::Importing, BindState::Failed);
        if let Some(texture) = texture {
            self.gpu.delete_texture(texture);
        }
        if let Some(image) = image {
            self.gpu.destroy_image(image);
        }
        self.transition(raw, BindState::Failed, BindState::Unbound);
    }

    /// Clears a freshly bound texture to transparent black.
    ///
    /// Import does not zero the buffer, so surfaces that must start blank
    /// need this before first use.
    ///
    /// # Errors
    ///
    /// Returns [`BindError::Clear`] if the GPU reports an error.
    pub fn clear(&mut self, bound: &BoundImage, width: u32, height: u32) -> Result<(), BindError> {
        self.gpu.clear_texture(bound.texture, width, height)
    }

    /// Deletes the texture, then destroys the image.
    pub fn unbind(&mut self, raw: RawBuffer, bound: BoundImage) {
        self.gpu.delete_texture(bound.texture);
        self.gpu.destroy_image(bound.image);
        self.transition(raw, BindState::Bound, BindState::Unbound);
    }
}
