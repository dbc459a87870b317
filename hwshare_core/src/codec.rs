// Copyright 2026 the Hwshare Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Cross-process buffer handle descriptors.
//!
//! A native buffer handle is a small array of integers (driver metadata)
//! plus a small array of file descriptors. Sizes vary by driver, so the
//! platform is asked for the [`HandleLayout`] before serializing.
//!
//! [`serialize`] returns duplicates of the handle fds wrapped in
//! [`OwnedFd`]; the native buffer keeps its own copies. Whoever holds the
//! [`BufferDescriptor`] closes the duplicates by dropping it, or hands them
//! to the IPC layer, which takes ownership once the message is sent.

use std::os::fd::OwnedFd;

use crate::allocator::NativeBufferApi;
use crate::buffer::NativeBuffer;
use crate::error::CodecError;

/// Number of integers and file descriptors in a handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct HandleLayout {
    /// Integer count.
    pub num_ints: usize,
    /// File descriptor count.
    pub num_fds: usize,
}

/// Serialized handle of a native buffer.
#[derive(Debug)]
pub struct BufferDescriptor {
    /// Driver metadata integers.
    pub ints: Vec<i32>,
    /// Handle file descriptors, owned by this descriptor.
    pub fds: Vec<OwnedFd>,
}

impl BufferDescriptor {
    /// Builds a descriptor from parts received over IPC.
    #[must_use]
    pub fn new(ints: Vec<i32>, fds: Vec<OwnedFd>) -> Self {
        Self { ints, fds }
    }

    /// Layout implied by the lengths of this descriptor.
    #[must_use]
    pub fn layout(&self) -> HandleLayout {
        HandleLayout {
            num_ints: self.ints.len(),
            num_fds: self.fds.len(),
        }
    }
}

/// Size, format and usage sent alongside a descriptor to build a remote
/// buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RemoteBufferParams {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Row stride in pixels.
    pub stride: u32,
    /// Platform pixel format code.
    pub format: i32,
    /// Platform usage bits.
    pub usage: i32,
}

impl RemoteBufferParams {
    /// Parameters describing `buffer` as the remote side should see it.
    #[must_use]
    pub fn for_buffer(buffer: &NativeBuffer) -> Self {
        Self {
            width: buffer.width(),
            height: buffer.height(),
            stride: buffer.stride(),
            format: buffer.format().0,
            usage: buffer.usage().as_i32(),
        }
    }
}

/// Reports how many integers and fds `buffer`'s handle needs.
///
/// # Errors
///
/// Returns [`CodecError::NoLayout`] if the platform does not recognise the
/// buffer.
pub fn describe(
    api: &dyn NativeBufferApi,
    buffer: &NativeBuffer,
) -> Result<HandleLayout, CodecError> {
    api.handle_layout(buffer.raw()).ok_or(CodecError::NoLayout)
}

/// Serializes `buffer`'s handle.
///
/// Nothing is returned on failure; fds duplicated before the failure are
/// closed.
///
/// # Errors
///
/// Returns [`CodecError`] if the layout is unknown, the platform call fails,
/// or the platform produced a different number of fds than it announced.
pub fn serialize(
    api: &dyn NativeBufferApi,
    buffer: &NativeBuffer,
) -> Result<BufferDescriptor, CodecError> {
    let layout = describe(api, buffer)?;
    let mut ints = vec![0_i32; layout.num_ints];
    let mut fds = Vec::with_capacity(layout.num_fds);
    let raw = buffer.raw();
    api.serialize_native_buffer(raw, &mut ints, &mut fds)?;
    let descriptor = BufferDescriptor { ints, fds };
    check_layout(&descriptor, layout)?;
    Ok(descriptor)
}

/// Verifies that `descriptor` matches `expected`.
///
/// # Errors
///
/// Returns [`CodecError::LayoutMismatch`] on disagreement.
pub fn check_layout(
    descriptor: &BufferDescriptor,
    expected: HandleLayout,
) -> Result<(), CodecError> {
    let actual = descriptor.layout();
    if actual == expected {
        Ok(())
    } else {
        Err(CodecError::LayoutMismatch {
            ints: actual.num_ints,
            fds: actual.num_fds,
            expected_ints: expected.num_ints,
            expected_fds: expected.num_fds,
        })
    }
}
