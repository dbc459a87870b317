// Copyright 2026 the Hwshare Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! [`RemoteAllocator`] over a bound `android_wlegl` global.

use core::fmt;
use std::collections::HashMap;
use std::os::fd::AsFd;

use hwshare_core::codec::{BufferDescriptor, RemoteBufferParams};
use hwshare_core::error::ProtocolError;
use hwshare_core::registry::{RemoteAllocator, TransportBuffer};
use wayland_client::protocol::wl_buffer::WlBuffer;
use wayland_client::{Dispatch, Proxy, QueueHandle};

use crate::protocol::android_wlegl::AndroidWlegl;
use crate::protocol::android_wlegl_handle::AndroidWleglHandle;

/// User data of `wl_buffer`s created through `android_wlegl`.
///
/// Keeps their release events apart from the host's other buffers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WleglBuffer;

/// `create_buffer` arguments in wire types.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct WireParams {
    width: i32,
    height: i32,
    stride: i32,
    format: i32,
    usage: i32,
}

fn wire_int(value: u32, name: &'static str) -> Result<i32, ProtocolError> {
    i32::try_from(value)
        .map_err(|_| ProtocolError::ArgumentRange { name })
}

impl WireParams {
    fn new(params: &RemoteBufferParams) -> Result<Self, ProtocolError> {
        Ok(Self {
            width: wire_int(params.width, "width")?,
            height: wire_int(params.height, "height")?,
            stride: wire_int(params.stride, "stride")?,
            format: params.format,
            usage: params.usage,
        })
    }
}

/// `num_fds` is a signed `int` on the wire.
fn fd_count(len: usize) -> Result<i32, ProtocolError> {
    i32::try_from(len)
        .map_err(|_| ProtocolError::ArgumentRange { name: "num_fds" })
}

/// Handle integers as the bytes of a `wl_array`, in host byte order.
fn ints_to_wire(ints: &[i32]) -> Vec<u8> {
    bytemuck::cast_slice(ints).to_vec()
}

/// Builds `wl_buffer`s from serialized native buffer handles.
///
/// Owns every buffer it creates until [`destroy_buffer`] is called for it;
/// buffers still alive when the allocator drops are destroyed then.
///
/// [`destroy_buffer`]: RemoteAllocator::destroy_buffer
pub struct WleglAllocator<D> {
    wlegl: AndroidWlegl,
    queue: QueueHandle<D>,
    buffers: HashMap<TransportBuffer, WlBuffer>,
}

impl<D> fmt::Debug for WleglAllocator<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WleglAllocator")
            .field("wlegl", &self.wlegl.id())
            .field("buffers", &self.buffers.len())
            .finish_non_exhaustive()
    }
}

impl<D> WleglAllocator<D> {
    pub(crate) fn new(wlegl: AndroidWlegl, queue: QueueHandle<D>) -> Self {
        Self {
            wlegl,
            queue,
            buffers: HashMap::new(),
        }
    }

    /// Number of buffers created and not yet destroyed.
    #[must_use]
    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }
}

impl<D> RemoteAllocator for WleglAllocator<D>
where
    D: Dispatch<AndroidWleglHandle, ()> + Dispatch<WlBuffer, WleglBuffer> + 'static,
{
    fn create_buffer(
        &mut self,
        params: &RemoteBufferParams,
        descriptor: BufferDescriptor,
    ) -> Result<TransportBuffer, ProtocolError> {
        if !self.wlegl.is_alive() {
            return Err(ProtocolError::ConnectionLost);
        }
        let wire = WireParams::new(params)?;
        let num_fds = fd_count(descriptor.fds.len())?;

        let ints = ints_to_wire(&descriptor.ints);
        let handle = self.wlegl.create_handle(num_fds, ints, &self.queue, ());
        for fd in &descriptor.fds {
            handle.add_fd(fd.as_fd());
        }
        let buffer = self.wlegl.create_buffer(
            wire.width,
            wire.height,
            wire.stride,
            wire.format,
            wire.usage,
            &handle,
            &self.queue,
            WleglBuffer,
        );
        handle.destroy();

        let id = TransportBuffer(buffer.id().protocol_id());
        log::debug!(
            "created {id:?} ({}x{} stride {}, {} ints, {} fds)",
            params.width,
            params.height,
            params.stride,
            descriptor.ints.len(),
            descriptor.fds.len()
        );
        self.buffers.insert(id, buffer);
        Ok(id)
    }

    fn destroy_buffer(&mut self, buffer: TransportBuffer) {
        match self.buffers.remove(&buffer) {
            Some(proxy) => {
                proxy.destroy();
                log::debug!("destroyed {buffer:?}");
            }
            None => log::warn!("destroy of unknown {buffer:?}"),
        }
    }
}

impl<D> Drop for WleglAllocator<D> {
    fn drop(&mut self) {
        if !self.buffers.is_empty() {
            log::debug!(
                "destroying {} leftover transport buffers",
                self.buffers.len()
            );
        }
        for (_, buffer) in self.buffers.drain() {
            buffer.destroy();
        }
    }
}
