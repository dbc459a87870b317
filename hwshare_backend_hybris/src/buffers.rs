// Copyright 2026 the Hwshare Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! [`NativeBufferApi`] over the `eglHybris*` entry points.

use core::ffi::{c_int, c_void};
use std::io;
use std::os::fd::{AsRawFd, BorrowedFd, IntoRawFd, OwnedFd};
use std::rc::Rc;

use hwshare_core::allocator::NativeBufferApi;
use hwshare_core::buffer::{BufferDesc, RawBuffer};
use hwshare_core::codec::HandleLayout;
use hwshare_core::error::{AllocationError, CodecError};

use crate::procs::EglClientBuffer;
use crate::session::EglSession;

pub(crate) fn client_buffer(raw: RawBuffer) -> EglClientBuffer {
    core::ptr::with_exposed_provenance_mut::<c_void>(raw.addr())
}

fn raw_buffer(buffer: EglClientBuffer) -> Option<RawBuffer> {
    RawBuffer::new(buffer.expose_provenance())
}

fn dimension(value: u32) -> Result<c_int, AllocationError> {
    c_int::try_from(value)
        .map_err(|_| AllocationError::Platform(format!("dimension {value} out of range")))
}

/// Duplicates each fd in `raw`, leaving the originals with their owner.
///
/// # Safety
///
/// Every non-negative entry of `raw` must be an open fd for the duration of
/// the call.
unsafe fn dup_all(raw: &[c_int]) -> Result<Vec<OwnedFd>, CodecError> {
    let mut owned = Vec::with_capacity(raw.len());
    for &fd in raw {
        if fd < 0 {
            return Err(CodecError::SerializeFailed);
        }
        // SAFETY: the caller guarantees `fd` is open.
        let borrowed = unsafe { BorrowedFd::borrow_raw(fd) };
        let fd = rustix::io::dup(borrowed).map_err(io::Error::from)?;
        owned.push(fd);
    }
    Ok(owned)
}

/// Native buffers allocated through libhybris' gralloc bridge.
#[derive(Debug)]
pub struct HybrisBuffers {
    session: Rc<EglSession>,
}

impl HybrisBuffers {
    pub(crate) fn new(session: Rc<EglSession>) -> Self {
        Self { session }
    }
}

impl NativeBufferApi for HybrisBuffers {
    fn create_native_buffer(
        &mut self,
        desc: &BufferDesc,
    ) -> Result<(RawBuffer, u32), AllocationError> {
        let mut stride: c_int = 0;
        let mut buffer: EglClientBuffer = core::ptr::null_mut();
        // SAFETY: both out-pointers are valid for writes.
        let ok = unsafe {
            (self.session.procs.create_native_buffer)(
                dimension(desc.width)?,
                dimension(desc.height)?,
                desc.usage.as_i32(),
                desc.format.0,
                &mut stride,
                &mut buffer,
            )
        };
        let Some(raw) = raw_buffer(buffer).filter(|_| ok != 0) else {
            let msg = "eglHybrisCreateNativeBuffer failed";
            return Err(AllocationError::Platform(msg.into()));
        };
        let stride = u32::try_from(stride)
            .map_err(|_| AllocationError::Platform(format!("negative stride {stride}")))?;
        Ok((raw, stride))
    }

    fn create_remote_buffer(
        &mut self,
        desc: &BufferDesc,
        stride: u32,
        ints: &[i32],
        fds: Vec<OwnedFd>,
    ) -> Result<RawBuffer, AllocationError> {
        let mut ints = ints.to_vec();
        let mut raw_fds: Vec<c_int> = fds.iter().map(AsRawFd::as_raw_fd).collect();
        let num_ints = c_int::try_from(ints.len())
            .map_err(|_| AllocationError::Platform("too many handle ints".into()))?;
        let num_fds = c_int::try_from(raw_fds.len())
            .map_err(|_| AllocationError::Platform("too many handle fds".into()))?;
        let mut buffer: EglClientBuffer = core::ptr::null_mut();
        // SAFETY: `ints` and `raw_fds` hold `num_ints` and `num_fds` entries,
        // the fds are open (owned by `fds`) and `buffer` is a valid
        // out-pointer.
        let ok = unsafe {
            (self.session.procs.create_remote_buffer)(
                dimension(desc.width)?,
                dimension(desc.height)?,
                desc.usage.as_i32(),
                desc.format.0,
                dimension(stride)?,
                num_ints,
                ints.as_mut_ptr(),
                num_fds,
                raw_fds.as_mut_ptr(),
                &mut buffer,
            )
        };
        match raw_buffer(buffer).filter(|_| ok != 0) {
            Some(raw) => {
                // The handle now owns the fds and closes them on release.
                for fd in fds {
                    let _ = fd.into_raw_fd();
                }
                Ok(raw)
            }
            None => Err(AllocationError::Platform(
                "eglHybrisCreateRemoteBuffer failed".into(),
            )),
        }
    }

    fn release_native_buffer(&mut self, raw: RawBuffer) {
        // SAFETY: `raw` came from one of the create calls and is released
        // exactly once.
        let ok = unsafe { (self.session.procs.release_native_buffer)(client_buffer(raw)) };
        if ok == 0 {
            log::warn!("eglHybrisReleaseNativeBuffer failed for {raw:?}");
        }
    }

    fn handle_layout(&self, raw: RawBuffer) -> Option<HandleLayout> {
        let mut num_ints: c_int = -1;
        let mut num_fds: c_int = -1;
        // SAFETY: `raw` is a live native buffer; both out-pointers are valid.
        unsafe {
            (self.session.procs.get_native_buffer_info)(
                client_buffer(raw),
                &mut num_ints,
                &mut num_fds,
            );
        }
        Some(HandleLayout {
            num_ints: usize::try_from(num_ints).ok()?,
            num_fds: usize::try_from(num_fds).ok()?,
        })
    }

    fn serialize_native_buffer(
        &self,
        raw: RawBuffer,
        ints: &mut [i32],
        fds: &mut Vec<OwnedFd>,
    ) -> Result<(), CodecError> {
        let layout = self.handle_layout(raw).ok_or(CodecError::NoLayout)?;
        if ints.len() != layout.num_ints {
            return Err(CodecError::LayoutMismatch {
                ints: ints.len(),
                fds: layout.num_fds,
                expected_ints: layout.num_ints,
                expected_fds: layout.num_fds,
            });
        }
        let mut raw_fds: Vec<c_int> = vec![-1; layout.num_fds];
        // SAFETY: both arrays are sized from the buffer's own layout.
        unsafe {
            (self.session.procs.serialize_native_buffer)(
                client_buffer(raw),
                ints.as_mut_ptr(),
                raw_fds.as_mut_ptr(),
            );
        }
        // SAFETY: the fds belong to the live native buffer `raw`.
        fds.extend(unsafe { dup_all(&raw_fds) }?);
        Ok(())
    }
}
