// Copyright 2026 the Hwshare Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Native buffer allocation and release.
//!
//! [`NativeBufferApi`] is the capability a platform backend provides (on
//! libhybris: the `eglHybris*` entry points resolved once at startup).
//! [`Allocator`] wraps it with request validation and move-only ownership of
//! the resulting [`NativeBuffer`]s.

use core::fmt;
use std::os::fd::OwnedFd;

use crate::buffer::{BufferDesc, NativeBuffer, RawBuffer};
use crate::codec::{BufferDescriptor, HandleLayout};
use crate::error::{AllocationError, CodecError};

/// Platform native-buffer entry points.
///
/// Implementations are plain foreign-call wrappers; the ownership rules live
/// in [`Allocator`] and [`codec`](crate::codec).
pub trait NativeBufferApi {
    /// Allocates fresh GPU memory. Returns the buffer token and its row
    /// stride in pixels.
    fn create_native_buffer(
        &mut self,
        desc: &BufferDesc,
    ) -> Result<(RawBuffer, u32), AllocationError>;

    /// Reconstructs a buffer from a serialized descriptor.
    ///
    /// On success the platform owns `fds` and closes them when the buffer is
    /// released. On failure the implementation must let them drop.
    fn create_remote_buffer(
        &mut self,
        desc: &BufferDesc,
        stride: u32,
        ints: &[i32],
        fds: Vec<OwnedFd>,
    ) -> Result<RawBuffer, AllocationError>;

    /// Releases a buffer. Called exactly once per token.
    fn release_native_buffer(&mut self, raw: RawBuffer);

    /// Number of integers and file descriptors in the buffer's handle.
    fn handle_layout(&self, raw: RawBuffer) -> Option<HandleLayout>;

    /// Writes the handle integers into `ints` and pushes caller-owned
    /// duplicates of the handle fds onto `fds`.
    fn serialize_native_buffer(
        &self,
        raw: RawBuffer,
        ints: &mut [i32],
        fds: &mut Vec<OwnedFd>,
    ) -> Result<(), CodecError>;
}

/// Validating front end over a [`NativeBufferApi`].
pub struct Allocator<'a> {
    api: &'a mut dyn NativeBufferApi,
    max_dimension: u32,
}

impl fmt::Debug for Allocator<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Allocator")
            .field("max_dimension", &self.max_dimension)
            .finish_non_exhaustive()
    }
}

impl<'a> Allocator<'a> {
    /// Wraps `api`, rejecting requests wider or taller than `max_dimension`.
    #[must_use]
    pub fn new(api: &'a mut dyn NativeBufferApi, max_dimension: u32) -> Self {
        Self { api, max_dimension }
    }

    fn validate(&self, desc: &BufferDesc) -> Result<(), AllocationError> {
        if desc.width == 0
            || desc.height == 0
            || desc.width > self.max_dimension
            || desc.height > self.max_dimension
        {
            return Err(AllocationError::InvalidDimensions {
                width: desc.width,
                height: desc.height,
            });
        }
        if desc.format.bytes_per_pixel().is_none() {
            return Err(AllocationError::UnsupportedFormat(desc.format));
        }
        Ok(())
    }

    /// Allocates a new native buffer.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError`] for invalid requests (without calling the
    /// platform) or when the platform refuses.
    pub fn allocate(&mut self, desc: BufferDesc) -> Result<NativeBuffer, AllocationError> {
        self.validate(&desc)?;
        let (raw, stride) = self.api.create_native_buffer(&desc)?;
        log::debug!(
            "allocated native buffer {raw:?} {}x{} stride {stride}",
            desc.width,
            desc.height
        );
        Ok(NativeBuffer::new(raw, desc, stride))
    }

    /// Reconstructs a buffer that another process serialized.
    ///
    /// The descriptor's file descriptors move into the platform on success
    /// and are closed on failure.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError`] for invalid requests or when the platform
    /// cannot import the handle.
    pub fn create_remote(
        &mut self,
        desc: BufferDesc,
        stride: u32,
        descriptor: BufferDescriptor,
    ) -> Result<NativeBuffer, AllocationError> {
        self.validate(&desc)?;
        let BufferDescriptor { ints, fds } = descriptor;
        let raw = self.api.create_remote_buffer(&desc, stride, &ints, fds)?;
        log::debug!(
            "reconstructed remote buffer {raw:?} {}x{} stride {stride}",
            desc.width,
            desc.height
        );
        Ok(NativeBuffer::new(raw, desc, stride))
    }

    /// Releases a buffer. Consuming it makes a second release impossible.
    pub fn release(&mut self, buffer: NativeBuffer) {
        let raw = buffer.into_raw();
        log::debug!("releasing native buffer {raw:?}");
        self.api.release_native_buffer(raw);
    }
}
