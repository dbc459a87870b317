// Copyright 2026 the Hwshare Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Test doubles shared by the unit tests.
//!
//! Every fake appends to one [`CallLog`], so a test can assert the exact
//! order of platform, GPU and protocol calls across components.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::os::fd::OwnedFd;
use std::rc::Rc;

use crate::allocator::NativeBufferApi;
use crate::binder::{BindState, GpuApi, GpuImage, GpuTexture};
use crate::buffer::{BufferDesc, RawBuffer};
use crate::codec::{BufferDescriptor, HandleLayout, RemoteBufferParams};
use crate::error::{
    AllocationError, BindError, CodecError, ContextError, FallbackReason, ImportError,
    ProtocolError,
};
use crate::registry::{RemoteAllocator, TransportBuffer};
use crate::surface::SurfaceId;
use crate::trace::{
    BindStateEvent, CreationPath, SurfaceCreatedEvent, TeardownEvent, TeardownStep, TraceSink,
    TransportEvent,
};

/// A platform call observed by a fake.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Call {
    CreateNative(RawBuffer),
    CreateRemote(RawBuffer),
    ReleaseNative(RawBuffer),
    Serialize(RawBuffer),
    MakeCurrent,
    CreateImage(GpuImage),
    DestroyImage(GpuImage),
    CreateTexture(GpuTexture),
    AttachImage(GpuTexture, GpuImage),
    DeleteTexture(GpuTexture),
    ClearTexture(GpuTexture),
    ReadTexture(GpuTexture),
    CreateTransport(TransportBuffer),
    DestroyTransport(TransportBuffer),
}

/// Ordered call log shared between fakes.
#[derive(Clone, Debug, Default)]
pub(crate) struct CallLog(Rc<RefCell<Vec<Call>>>);

impl CallLog {
    pub(crate) fn push(&self, call: Call) {
        self.0.borrow_mut().push(call);
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.0.borrow().clone()
    }

    pub(crate) fn clear(&self) {
        self.0.borrow_mut().clear();
    }

    /// Number of logged calls matching `pred`.
    pub(crate) fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.0.borrow().iter().filter(|c| pred(*c)).count()
    }
}

/// An fd that is safe to open, dup and close in tests.
pub(crate) fn test_fd() -> OwnedFd {
    OwnedFd::from(File::open("/dev/null").unwrap())
}

// ---------------------------------------------------------------------------
// Native buffers
// ---------------------------------------------------------------------------

/// In-memory native-buffer platform. Stride equals width.
#[derive(Debug)]
pub(crate) struct FakeBuffers {
    log: CallLog,
    next: usize,
    live: HashSet<RawBuffer>,
    remote_fds: HashMap<RawBuffer, Vec<OwnedFd>>,
    pub(crate) fail_allocation: bool,
    pub(crate) fail_remote: bool,
    pub(crate) layout: HandleLayout,
    pub(crate) short_fds: bool,
}

impl FakeBuffers {
    pub(crate) fn new(log: &CallLog) -> Self {
        Self {
            log: log.clone(),
            next: 0x1000,
            live: HashSet::new(),
            remote_fds: HashMap::new(),
            fail_allocation: false,
            fail_remote: false,
            layout: HandleLayout {
                num_ints: 4,
                num_fds: 1,
            },
            short_fds: false,
        }
    }

    fn mint(&mut self) -> RawBuffer {
        let raw = RawBuffer::new(self.next).unwrap();
        self.next += 0x100;
        self.live.insert(raw);
        raw
    }

    /// Fds currently held by reconstructed buffers.
    pub(crate) fn open_remote_fds(&self) -> usize {
        self.remote_fds.values().map(Vec::len).sum()
    }

    /// Makes the platform stop recognising `raw`.
    pub(crate) fn forget(&mut self, raw: RawBuffer) {
        self.live.remove(&raw);
    }
}

impl NativeBufferApi for FakeBuffers {
    fn create_native_buffer(
        &mut self,
        desc: &BufferDesc,
    ) -> Result<(RawBuffer, u32), AllocationError> {
        if self.fail_allocation {
            return Err(AllocationError::Platform("out of memory".into()));
        }
        let raw = self.mint();
        self.log.push(Call::CreateNative(raw));
        Ok((raw, desc.width))
    }

    fn create_remote_buffer(
        &mut self,
        _desc: &BufferDesc,
        _stride: u32,
        _ints: &[i32],
        fds: Vec<OwnedFd>,
    ) -> Result<RawBuffer, AllocationError> {
        if self.fail_remote {
            return Err(AllocationError::Platform("bad handle".into()));
        }
        let raw = self.mint();
        self.remote_fds.insert(raw, fds);
        self.log.push(Call::CreateRemote(raw));
        Ok(raw)
    }

    fn release_native_buffer(&mut self, raw: RawBuffer) {
        assert!(self.live.remove(&raw), "release of unknown {raw:?}");
        self.remote_fds.remove(&raw);
        self.log.push(Call::ReleaseNative(raw));
    }

    fn handle_layout(&self, raw: RawBuffer) -> Option<HandleLayout> {
        self.live.contains(&raw).then_some(self.layout)
    }

    fn serialize_native_buffer(
        &self,
        raw: RawBuffer,
        ints: &mut [i32],
        fds: &mut Vec<OwnedFd>,
    ) -> Result<(), CodecError> {
        if !self.live.contains(&raw) {
            return Err(CodecError::SerializeFailed);
        }
        self.log.push(Call::Serialize(raw));
        for (i, slot) in ints.iter_mut().enumerate() {
            *slot = if i == 0 {
                i32::try_from(raw.addr()).unwrap()
            } else {
                i32::try_from(i).unwrap()
            };
        }
        let count = if self.short_fds {
            self.layout.num_fds.saturating_sub(1)
        } else {
            self.layout.num_fds
        };
        fds.extend((0..count).map(|_| test_fd()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// GPU
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct FakeTexture {
    nearest: bool,
    image: Option<GpuImage>,
    cleared: bool,
}

/// In-memory GPU. Attached textures read back as `0xAB` until cleared.
#[derive(Debug)]
pub(crate) struct FakeGpu {
    log: CallLog,
    next_image: usize,
    next_texture: u32,
    images: HashSet<GpuImage>,
    textures: HashMap<GpuTexture, FakeTexture>,
    pub(crate) reject_import: bool,
    pub(crate) fail_attach: Option<u32>,
    pub(crate) fail_clear: Option<u32>,
    /// Shared so tests can lose the context after setup.
    pub(crate) fail_current: Rc<Cell<bool>>,
    pub(crate) pending_error: Option<u32>,
}

impl FakeGpu {
    pub(crate) fn new(log: &CallLog) -> Self {
        Self {
            log: log.clone(),
            next_image: 0x10,
            next_texture: 1,
            images: HashSet::new(),
            textures: HashMap::new(),
            reject_import: false,
            fail_attach: None,
            fail_clear: None,
            fail_current: Rc::default(),
            pending_error: None,
        }
    }

    pub(crate) fn live_images(&self) -> usize {
        self.images.len()
    }

    pub(crate) fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub(crate) fn texture_is_nearest(&self, texture: GpuTexture) -> bool {
        self.textures.get(&texture).is_some_and(|t| t.nearest)
    }
}

impl GpuApi for FakeGpu {
    fn make_current(&mut self) -> Result<(), ContextError> {
        if self.fail_current.get() {
            return Err(ContextError("context lost".into()));
        }
        self.log.push(Call::MakeCurrent);
        Ok(())
    }

    fn create_image(&mut self, _raw: RawBuffer) -> Result<GpuImage, ImportError> {
        if self.reject_import {
            return Err(ImportError { code: 0x300c });
        }
        let image = GpuImage(core::num::NonZeroUsize::new(self.next_image).unwrap());
        self.next_image += 0x10;
        self.images.insert(image);
        self.log.push(Call::CreateImage(image));
        Ok(image)
    }

    fn destroy_image(&mut self, image: GpuImage) {
        assert!(self.images.remove(&image), "destroy of unknown {image:?}");
        self.log.push(Call::DestroyImage(image));
    }

    fn create_texture(&mut self) -> Result<GpuTexture, BindError> {
        let texture = GpuTexture(core::num::NonZeroU32::new(self.next_texture).unwrap());
        self.next_texture += 1;
        self.textures.insert(
            texture,
            FakeTexture {
                nearest: false,
                image: None,
                cleared: false,
            },
        );
        self.log.push(Call::CreateTexture(texture));
        Ok(texture)
    }

    fn set_nearest_filtering(&mut self, texture: GpuTexture) {
        if let Some(t) = self.textures.get_mut(&texture) {
            t.nearest = true;
        }
    }

    fn attach_image(&mut self, texture: GpuTexture, image: GpuImage) {
        if let Some(code) = self.fail_attach {
            self.pending_error = Some(code);
        }
        if let Some(t) = self.textures.get_mut(&texture) {
            t.image = Some(image);
        }
        self.log.push(Call::AttachImage(texture, image));
    }

    fn take_error(&mut self) -> Option<u32> {
        self.pending_error.take()
    }

    fn delete_texture(&mut self, texture: GpuTexture) {
        assert!(
            self.textures.remove(&texture).is_some(),
            "delete of unknown {texture:?}"
        );
        self.log.push(Call::DeleteTexture(texture));
    }

    fn clear_texture(
        &mut self,
        texture: GpuTexture,
        _width: u32,
        _height: u32,
    ) -> Result<(), BindError> {
        if let Some(code) = self.fail_clear {
            return Err(BindError::Clear(code));
        }
        let t = self
            .textures
            .get_mut(&texture)
            .ok_or(BindError::Clear(0x501))?;
        t.cleared = true;
        self.log.push(Call::ClearTexture(texture));
        Ok(())
    }

    fn read_texture(
        &mut self,
        texture: GpuTexture,
        width: u32,
        height: u32,
    ) -> Result<Vec<u8>, BindError> {
        let t = self
            .textures
            .get(&texture)
            .ok_or(BindError::ReadBack(0x501))?;
        if t.image.is_none() {
            return Err(BindError::ReadBack(0x506));
        }
        self.log.push(Call::ReadTexture(texture));
        let fill = if t.cleared { 0 } else { 0xAB };
        Ok(vec![fill; width as usize * height as usize * 4])
    }
}

// ---------------------------------------------------------------------------
// Remote allocator
// ---------------------------------------------------------------------------

/// Parameters and layouts the fake remote received, in order.
pub(crate) type Sent = Rc<RefCell<Vec<(RemoteBufferParams, HandleLayout)>>>;

/// Remote allocator handing out sequential ids starting at 1.
#[derive(Debug)]
pub(crate) struct FakeRemote {
    log: CallLog,
    next: u32,
    sent: Sent,
    pub(crate) fail: bool,
}

impl FakeRemote {
    pub(crate) fn new(log: &CallLog) -> Self {
        Self {
            log: log.clone(),
            next: 1,
            sent: Sent::default(),
            fail: false,
        }
    }

    pub(crate) fn sent(&self) -> Sent {
        self.sent.clone()
    }
}

impl RemoteAllocator for FakeRemote {
    fn create_buffer(
        &mut self,
        params: &RemoteBufferParams,
        descriptor: BufferDescriptor,
    ) -> Result<TransportBuffer, ProtocolError> {
        if self.fail {
            return Err(ProtocolError::ConnectionLost);
        }
        self.sent.borrow_mut().push((*params, descriptor.layout()));
        let buffer = TransportBuffer(self.next);
        self.next += 1;
        self.log.push(Call::CreateTransport(buffer));
        Ok(buffer)
    }

    fn destroy_buffer(&mut self, buffer: TransportBuffer) {
        self.log.push(Call::DestroyTransport(buffer));
    }
}

// ---------------------------------------------------------------------------
// Trace sink
// ---------------------------------------------------------------------------

/// An owned copy of a trace event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Event {
    Created {
        surface: SurfaceId,
        path: CreationPath,
        fallback: Option<FallbackReason>,
    },
    Bind(BindState, BindState),
    Transport(TransportEvent),
    Teardown(TeardownEvent),
}

/// Records events; clones share storage.
#[derive(Clone, Debug, Default)]
pub(crate) struct RecordingSink(Rc<RefCell<Vec<Event>>>);

impl RecordingSink {
    pub(crate) fn events(&self) -> Vec<Event> {
        self.0.borrow().clone()
    }

    pub(crate) fn bind_states(&self) -> Vec<(BindState, BindState)> {
        self.0
            .borrow()
            .iter()
            .filter_map(|e| match e {
                Event::Bind(from, to) => Some((*from, *to)),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn teardown_steps(&self, surface: SurfaceId) -> Vec<TeardownStep> {
        self.0
            .borrow()
            .iter()
            .filter_map(|e| match e {
                Event::Teardown(t) if t.surface == surface => Some(t.step),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn creation(
        &self,
        surface: SurfaceId,
    ) -> Option<(CreationPath, Option<FallbackReason>)> {
        self.0.borrow().iter().find_map(|e| match e {
            Event::Created {
                surface: s,
                path,
                fallback,
            } if *s == surface => Some((*path, fallback.clone())),
            _ => None,
        })
    }
}

impl TraceSink for RecordingSink {
    fn on_surface_created(&mut self, e: &SurfaceCreatedEvent<'_>) {
        self.0.borrow_mut().push(Event::Created {
            surface: e.surface,
            path: e.path,
            fallback: e.fallback.cloned(),
        });
    }

    fn on_bind_state(&mut self, e: &BindStateEvent) {
        self.0.borrow_mut().push(Event::Bind(e.from, e.to));
    }

    fn on_transport(&mut self, e: &TransportEvent) {
        self.0.borrow_mut().push(Event::Transport(*e));
    }

    fn on_teardown(&mut self, e: &TeardownEvent) {
        self.0.borrow_mut().push(Event::Teardown(*e));
    }
}
