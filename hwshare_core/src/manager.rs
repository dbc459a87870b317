// Copyright 2026 the Hwshare Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Buffer-to-surface lifecycle manager.
//!
//! The [`SurfaceManager`] owns the [`BackendContext`] and every surface. It
//! decides, per request, whether a surface gets a native buffer or generic
//! host storage, lazily builds the remote-visible transport buffer, and
//! tears resources down in dependency order:
//!
//! ```text
//!   TransportBuffer → GpuTexture → GpuImage → NativeBuffer → slot
//! ```
//!
//! Surface creation never fails. The native path is modelled as
//! `Result<ExternalStorage, FallbackReason>`; any error rolls back what was
//! created so far and the surface gets [`Storage::Generic`] instead. The
//! reason is reported to the [`TraceSink`].

use core::fmt;

use crate::allocator::Allocator;
use crate::binder::Binder;
use crate::buffer::BufferDesc;
use crate::codec::{self, BufferDescriptor, RemoteBufferParams};
use crate::context::BackendContext;
use crate::error::{
    BindError, FallbackReason, ImportRejected, ProtocolUnavailable, TransportError,
};
use crate::registry::{RegistryBinding, TransportBuffer};
use crate::surface::{
    ExternalStorage, Release, Storage, Surface, SurfaceId, SurfaceRequest, SurfaceStore, UsageHint,
};
use crate::trace::{
    CreationPath, NoopSink, SurfaceCreatedEvent, TeardownEvent, TeardownStep, TraceSink,
    TransportEvent,
};

/// Result of [`SurfaceManager::get_transport_handle`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TransportHandle {
    /// The surface's transport buffer.
    pub buffer: TransportBuffer,
    /// `true` if this call made the remote construction request.
    pub created: bool,
}

/// A buffer another client wants to share as a pixmap.
#[derive(Debug)]
pub struct ImportRequest {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Row stride in pixels.
    pub stride: u32,
    /// Drawable depth.
    pub depth: u8,
    /// Bits per pixel.
    pub bpp: u8,
    /// Serialized native-buffer handle. Closed if the import is rejected.
    pub descriptor: BufferDescriptor,
}

/// A surface's native buffer, serialized for another client.
#[derive(Debug)]
pub struct ExportedBuffer {
    /// Row stride in pixels.
    pub stride: u32,
    /// Handle integers and caller-owned fd duplicates.
    pub descriptor: BufferDescriptor,
}

/// Owns surfaces and their GPU, native-buffer and transport resources.
pub struct SurfaceManager {
    context: BackendContext,
    store: SurfaceStore,
    sink: Box<dyn TraceSink>,
}

impl fmt::Debug for SurfaceManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SurfaceManager")
            .field("context", &self.context)
            .field("surfaces", &self.store.len())
            .finish_non_exhaustive()
    }
}

impl SurfaceManager {
    /// Creates a manager with no surfaces and a [`NoopSink`].
    #[must_use]
    pub fn new(context: BackendContext) -> Self {
        Self {
            context,
            store: SurfaceStore::new(),
            sink: Box::new(NoopSink),
        }
    }

    /// Replaces the trace sink, returning the previous one.
    pub fn set_trace_sink(&mut self, sink: Box<dyn TraceSink>) -> Box<dyn TraceSink> {
        core::mem::replace(&mut self.sink, sink)
    }

    /// The backend context.
    #[must_use]
    pub const fn context(&self) -> &BackendContext {
        &self.context
    }

    /// The remote-protocol binding, for registry glue to bind into.
    pub fn registry_mut(&mut self) -> &mut RegistryBinding {
        self.context.registry_mut()
    }

    /// Looks up a live surface.
    #[must_use]
    pub fn surface(&self, id: SurfaceId) -> Option<&Surface> {
        self.store.get(id)
    }

    /// Number of live surfaces.
    #[must_use]
    pub fn surface_count(&self) -> usize {
        self.store.len()
    }

    // -----------------------------------------------------------------------
    // Creation
    // -----------------------------------------------------------------------

    /// Creates a surface, backed by a native buffer when possible.
    ///
    /// Never fails: requests that are ineligible, or whose native path
    /// fails at any step, get generic storage.
    pub fn create_surface(&mut self, request: SurfaceRequest) -> SurfaceId {
        match self.create_external(&request) {
            Ok(external) => {
                let surface = Surface::with_external(&request, external);
                let id = self.store.insert(surface);
                log::debug!(
                    "created {id:?} {}x{} depth {} on a native buffer",
                    request.width,
                    request.height,
                    request.depth
                );
                self.sink.on_surface_created(&SurfaceCreatedEvent {
                    surface: id,
                    width: request.width,
                    height: request.height,
                    depth: request.depth,
                    path: CreationPath::Native,
                    fallback: None,
                });
                id
            }
            Err(reason) => {
                let id = self.store.insert(Surface::generic(&request));
                match reason {
                    FallbackReason::Ineligible(_) | FallbackReason::ProtocolUnavailable(_) => {
                        log::debug!("created {id:?} with generic storage: {reason}");
                    }
                    _ => log::warn!("native path failed for {id:?}, falling back: {reason}"),
                }
                self.sink.on_surface_created(&SurfaceCreatedEvent {
                    surface: id,
                    width: request.width,
                    height: request.height,
                    depth: request.depth,
                    path: CreationPath::Fallback,
                    fallback: Some(&reason),
                });
                id
            }
        }
    }

    fn check_eligible(&self, request: &SurfaceRequest) -> Result<(), FallbackReason> {
        if request.width == 0 || request.height == 0 {
            return Err(FallbackReason::Ineligible("zero-sized surface"));
        }
        if request.depth < self.context.config.min_depth {
            return Err(FallbackReason::Ineligible("depth below minimum"));
        }
        if !request.hint.allows_native() {
            return Err(FallbackReason::Ineligible("hint excludes native buffers"));
        }
        Ok(())
    }

    fn create_external(
        &mut self,
        request: &SurfaceRequest,
    ) -> Result<ExternalStorage, FallbackReason> {
        self.check_eligible(request)?;
        if !self.context.registry.is_available() {
            return Err(ProtocolUnavailable.into());
        }

        let config = self.context.config;
        self.context.gpu.make_current()?;

        let mut allocator = Allocator::new(self.context.buffers.as_mut(), config.max_dimension);
        let buffer = allocator.allocate(BufferDesc {
            width: request.width,
            height: request.height,
            format: config.format,
            usage: config.render_usage,
        })?;

        let mut binder = Binder::new(self.context.gpu.as_mut(), self.sink.as_mut());
        let bound = match binder.bind(&buffer) {
            Ok(bound) => bound,
            Err(failure) => {
                allocator.release(buffer);
                return Err(failure.into());
            }
        };

        if config.rootless && request.hint == UsageHint::BackingStore {
            if let Err(err) = binder.clear(&bound, request.width, request.height) {
                binder.unbind(buffer.raw(), bound);
                allocator.release(buffer);
                return Err(err.into());
            }
        }

        Ok(ExternalStorage {
            buffer,
            bound,
            transport: None,
        })
    }

    // -----------------------------------------------------------------------
    // Sharing
    // -----------------------------------------------------------------------

    /// Returns the surface's transport buffer, creating it on first use.
    ///
    /// # Errors
    ///
    /// - [`TransportError::UnknownSurface`] for a stale handle.
    /// - [`TransportError::NoNativeBuffer`] for a generic surface.
    /// - [`TransportError::ProtocolUnavailable`] if the protocol was unbound.
    /// - [`TransportError::Codec`] or [`TransportError::Protocol`] if
    ///   serialization or the remote request fails. Nothing is cached then,
    ///   so a later call retries.
    pub fn get_transport_handle(
        &mut self,
        id: SurfaceId,
    ) -> Result<TransportHandle, TransportError> {
        let Some(surface) = self.store.get_mut(id) else {
            return Err(TransportError::UnknownSurface);
        };
        let Storage::External(external) = &mut surface.storage else {
            return Err(TransportError::NoNativeBuffer);
        };

        if let Some(buffer) = external.transport {
            self.sink.on_transport(&TransportEvent {
                surface: id,
                buffer,
                created: false,
            });
            return Ok(TransportHandle {
                buffer,
                created: false,
            });
        }

        let remote = self.context.registry.remote()?;
        let descriptor = codec::serialize(self.context.buffers.as_ref(), &external.buffer)?;
        let params = RemoteBufferParams::for_buffer(&external.buffer);
        let buffer = remote.create_buffer(&params, descriptor)?;
        external.transport = Some(buffer);
        log::debug!("created {buffer:?} for {id:?}");

        self.sink.on_transport(&TransportEvent {
            surface: id,
            buffer,
            created: true,
        });
        Ok(TransportHandle {
            buffer,
            created: true,
        })
    }

    /// Reconstructs a buffer another client serialized and wraps it in a new
    /// surface.
    ///
    /// # Errors
    ///
    /// Returns [`ImportRejected`] for unsupported geometry or when the
    /// buffer cannot be reconstructed or bound. The descriptor's fds are
    /// closed and nothing stays allocated.
    pub fn pixmap_from_buffer(
        &mut self,
        request: ImportRequest,
    ) -> Result<SurfaceId, ImportRejected> {
        let ImportRequest {
            width,
            height,
            stride,
            depth,
            bpp,
            descriptor,
        } = request;
        if bpp != 32 || !matches!(depth, 24 | 32) || width == 0 || height == 0 {
            log::debug!("rejecting import {width}x{height} depth {depth} bpp {bpp}");
            return Err(ImportRejected::Geometry {
                width,
                height,
                depth,
                bpp,
            });
        }

        let config = self.context.config;
        self.context.gpu.make_current()?;

        let mut allocator = Allocator::new(self.context.buffers.as_mut(), config.max_dimension);
        let buffer = allocator.create_remote(
            BufferDesc {
                width,
                height,
                format: config.format,
                usage: config.import_usage,
            },
            stride,
            descriptor,
        )?;

        let mut binder = Binder::new(self.context.gpu.as_mut(), self.sink.as_mut());
        let bound = match binder.bind(&buffer) {
            Ok(bound) => bound,
            Err(failure) => {
                allocator.release(buffer);
                return Err(failure.into());
            }
        };

        let request = SurfaceRequest {
            width,
            height,
            depth,
            hint: UsageHint::Shared,
        };
        let id = self.store.insert(Surface::with_external(
            &request,
            ExternalStorage {
                buffer,
                bound,
                transport: None,
            },
        ));
        log::debug!("imported {id:?} {width}x{height} stride {stride}");
        self.sink.on_surface_created(&SurfaceCreatedEvent {
            surface: id,
            width,
            height,
            depth,
            path: CreationPath::Imported,
            fallback: None,
        });
        Ok(id)
    }

    /// Serializes the surface's native buffer for another client.
    ///
    /// # Errors
    ///
    /// [`TransportError::UnknownSurface`], [`TransportError::NoNativeBuffer`]
    /// or [`TransportError::Codec`].
    pub fn buffer_from_pixmap(&self, id: SurfaceId) -> Result<ExportedBuffer, TransportError> {
        let surface = self.store.get(id).ok_or(TransportError::UnknownSurface)?;
        let external = surface.external().ok_or(TransportError::NoNativeBuffer)?;
        let descriptor = codec::serialize(self.context.buffers.as_ref(), external.buffer())?;
        Ok(ExportedBuffer {
            stride: external.stride(),
            descriptor,
        })
    }

    /// Reads back a native surface's texture as RGBA bytes.
    ///
    /// Returns `None` for stale handles and generic surfaces, and
    /// [`BindError::Context`] when the GPU context cannot be made current.
    pub fn read_back(&mut self, id: SurfaceId) -> Option<Result<Vec<u8>, BindError>> {
        let surface = self.store.get(id)?;
        let external = surface.external()?;
        let gpu = &mut self.context.gpu;
        if let Err(err) = gpu.make_current() {
            return Some(Err(err.into()));
        }
        let texture = external.bound.texture();
        Some(gpu.read_texture(texture, surface.width, surface.height))
    }

    // -----------------------------------------------------------------------
    // Reference counting and teardown
    // -----------------------------------------------------------------------

    /// Adds a reference. Returns the new count, or `None` for a stale handle.
    pub fn retain(&mut self, id: SurfaceId) -> Option<u32> {
        self.store.retain(id)
    }

    /// Drops a reference, tearing the surface down on the last one.
    ///
    /// Returns `true` if the surface was destroyed.
    pub fn destroy_surface(&mut self, id: SurfaceId) -> bool {
        match self.store.release(id) {
            Release::Stale => {
                log::warn!("destroy of stale {id:?}");
                false
            }
            Release::Retained(remaining) => {
                log::debug!("{id:?} still has {remaining} references");
                false
            }
            Release::Last(surface) => {
                self.teardown(id, surface);
                true
            }
        }
    }

    fn teardown(&mut self, id: SurfaceId, surface: Surface) {
        if let Storage::External(ExternalStorage {
            buffer,
            bound,
            transport,
        }) = surface.storage
        {
            if let Some(transport) = transport {
                match self.context.registry.remote() {
                    Ok(remote) => remote.destroy_buffer(transport),
                    Err(_) => log::debug!("{transport:?} went away with the protocol binding"),
                }
                self.step(id, TeardownStep::TransportBuffer);
            }

            if let Err(err) = self.context.gpu.make_current() {
                log::warn!("tearing down {id:?} without a current context: {err}");
            }
            let mut binder = Binder::new(self.context.gpu.as_mut(), self.sink.as_mut());
            binder.unbind(buffer.raw(), bound);
            self.step(id, TeardownStep::GpuImage);

            let max_dimension = self.context.config.max_dimension;
            let mut allocator = Allocator::new(self.context.buffers.as_mut(), max_dimension);
            allocator.release(buffer);
            self.step(id, TeardownStep::NativeBuffer);
        }
        self.step(id, TeardownStep::Generic);
        log::debug!("destroyed {id:?}");
    }

    fn step(&mut self, surface: SurfaceId, step: TeardownStep) {
        self.sink.on_teardown(&TeardownEvent { surface, step });
    }

    /// Tears down every live surface regardless of reference counts, then
    /// drops the protocol binding and the context.
    pub fn shutdown(mut self) {
        let surfaces = self.store.drain();
        if !surfaces.is_empty() {
            log::debug!("shutdown: destroying {} live surfaces", surfaces.len());
        }
        for (id, surface) in surfaces {
            self.teardown(id, surface);
        }
        self.context.registry.unbind();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::{ImportRequest, SurfaceManager, TransportHandle};
    use crate::binder::GpuTexture;
    use crate::codec::{BufferDescriptor, HandleLayout};
    use crate::config::BackendConfig;
    use crate::context::{BackendContext, Capabilities};
    use crate::error::{
        AllocationError, BindError, FallbackReason, ImportRejected, ProtocolError,
        ProtocolUnavailable, TransportError,
    };
    use crate::registry::TransportBuffer;
    use crate::surface::{StorageClass, SurfaceRequest, UsageHint};
    use crate::test_support::{
        Call, CallLog, Event, FakeBuffers, FakeGpu, FakeRemote, RecordingSink, Sent, test_fd,
    };
    use crate::trace::{CreationPath, TeardownStep};

    struct Harness {
        log: CallLog,
        sink: RecordingSink,
        sent: Sent,
        manager: SurfaceManager,
    }

    fn harness_with(
        config: BackendConfig,
        tweak: impl FnOnce(&mut FakeBuffers, &mut FakeGpu, &mut FakeRemote),
        bind_protocol: bool,
    ) -> Harness {
        let _ = env_logger::builder().is_test(true).try_init();
        let log = CallLog::default();
        let mut buffers = FakeBuffers::new(&log);
        let mut gpu = FakeGpu::new(&log);
        let mut remote = FakeRemote::new(&log);
        tweak(&mut buffers, &mut gpu, &mut remote);
        let sent = remote.sent();

        let context = BackendContext::new(
            config,
            Capabilities {
                buffers: Box::new(buffers),
                gpu: Box::new(gpu),
            },
        );
        let mut manager = SurfaceManager::new(context);
        if bind_protocol {
            assert!(manager.registry_mut().bind(Box::new(remote)));
        }
        let sink = RecordingSink::default();
        manager.set_trace_sink(Box::new(sink.clone()));
        Harness {
            log,
            sink,
            sent,
            manager,
        }
    }

    fn harness() -> Harness {
        harness_with(BackendConfig::rootless(), |_, _, _| {}, true)
    }

    fn request(width: u32, height: u32) -> SurfaceRequest {
        SurfaceRequest {
            width,
            height,
            depth: 24,
            hint: UsageHint::Default,
        }
    }

    fn count(log: &CallLog, f: fn(&Call) -> bool) -> usize {
        log.count(f)
    }

    #[test]
    fn valid_requests_get_image_and_texture_together() {
        let mut h = harness();
        for (w, h_) in [(1, 1), (64, 32), (800, 600), (8192, 1)] {
            let id = h.manager.create_surface(request(w, h_));
            let surface = h.manager.surface(id).unwrap();
            assert_eq!(surface.storage_class(), StorageClass::External);
            let external = surface.external().unwrap();
            assert_eq!(external.stride(), w);
            assert!(external.transport().is_none());
        }
        assert_eq!(
            count(&h.log, |c| matches!(c, Call::CreateImage(_))),
            count(&h.log, |c| matches!(c, Call::CreateTexture(_)))
        );
        assert_eq!(count(&h.log, |c| matches!(c, Call::CreateImage(_))), 4);
    }

    #[test]
    fn zero_width_never_reaches_allocator() {
        let mut h = harness();
        let id = h.manager.create_surface(request(0, 600));
        let surface = h.manager.surface(id).unwrap();
        assert_eq!(surface.storage_class(), StorageClass::Generic);
        assert!(h.log.calls().is_empty(), "no platform call expected");
        assert_eq!(
            h.sink.creation(id),
            Some((
                CreationPath::Fallback,
                Some(FallbackReason::Ineligible("zero-sized surface"))
            ))
        );
    }

    #[test]
    fn ineligible_depth_and_hints_fall_back() {
        let mut h = harness();
        let shallow = h.manager.create_surface(SurfaceRequest {
            depth: 8,
            ..request(16, 16)
        });
        let glyph = h.manager.create_surface(SurfaceRequest {
            hint: UsageHint::Glyph,
            ..request(16, 16)
        });
        let scratch = h.manager.create_surface(SurfaceRequest {
            hint: UsageHint::Scratch,
            ..request(16, 16)
        });
        for id in [shallow, glyph, scratch] {
            assert_eq!(
                h.manager.surface(id).unwrap().storage_class(),
                StorageClass::Generic
            );
        }
        assert!(h.log.calls().is_empty());

        let min = h.manager.create_surface(SurfaceRequest {
            depth: 15,
            ..request(16, 16)
        });
        assert_eq!(
            h.manager.surface(min).unwrap().storage_class(),
            StorageClass::External
        );
    }

    #[test]
    fn unbound_protocol_means_every_surface_is_generic() {
        let mut h = harness_with(BackendConfig::rootless(), |_, _, _| {}, false);
        let ids: Vec<_> = (1..=5)
            .map(|i| h.manager.create_surface(request(i * 10, i * 10)))
            .collect();
        for &id in &ids {
            assert_eq!(
                h.manager.surface(id).unwrap().storage_class(),
                StorageClass::Generic
            );
            assert_eq!(
                h.sink.creation(id),
                Some((
                    CreationPath::Fallback,
                    Some(FallbackReason::ProtocolUnavailable(ProtocolUnavailable))
                ))
            );
            assert!(matches!(
                h.manager.get_transport_handle(id),
                Err(TransportError::NoNativeBuffer)
            ));
        }
        assert!(h.log.calls().is_empty());
    }

    #[test]
    fn late_binding_does_not_upgrade_existing_surfaces() {
        let log = CallLog::default();
        let mut h = harness_with(BackendConfig::rootless(), |_, _, _| {}, false);
        let early = h.manager.create_surface(request(32, 32));
        let remote = Box::new(FakeRemote::new(&log));
        assert!(h.manager.registry_mut().bind(remote));
        let late = h.manager.create_surface(request(32, 32));
        assert_eq!(
            h.manager.surface(early).unwrap().storage_class(),
            StorageClass::Generic
        );
        assert_eq!(
            h.manager.surface(late).unwrap().storage_class(),
            StorageClass::External
        );
    }

    #[test]
    fn allocation_failure_falls_back_without_gpu_work() {
        let mut h = harness_with(
            BackendConfig::rootless(),
            |buffers, _, _| buffers.fail_allocation = true,
            true,
        );
        let id = h.manager.create_surface(request(64, 64));
        assert_eq!(
            h.manager.surface(id).unwrap().storage_class(),
            StorageClass::Generic
        );
        assert_eq!(h.log.calls(), vec![Call::MakeCurrent]);
        assert!(matches!(
            h.sink.creation(id),
            Some((
                CreationPath::Fallback,
                Some(FallbackReason::Allocation(AllocationError::Platform(_)))
            ))
        ));
    }

    #[test]
    fn import_rejection_releases_the_buffer() {
        let mut h = harness_with(
            BackendConfig::rootless(),
            |_, gpu, _| gpu.reject_import = true,
            true,
        );
        let id = h.manager.create_surface(request(64, 64));
        assert_eq!(
            h.manager.surface(id).unwrap().storage_class(),
            StorageClass::Generic
        );
        let calls = h.log.calls();
        let Call::CreateNative(raw) = calls[1] else {
            panic!("expected allocation, got {calls:?}");
        };
        assert_eq!(calls.last(), Some(&Call::ReleaseNative(raw)));
    }

    #[test]
    fn attach_failure_rolls_back_everything() {
        let mut h = harness_with(
            BackendConfig::rootless(),
            |_, gpu, _| gpu.fail_attach = Some(0x502),
            true,
        );
        let id = h.manager.create_surface(request(64, 64));
        assert_eq!(
            h.manager.surface(id).unwrap().storage_class(),
            StorageClass::Generic
        );
        assert_eq!(count(&h.log, |c| matches!(c, Call::CreateImage(_))), 1);
        assert_eq!(count(&h.log, |c| matches!(c, Call::DestroyImage(_))), 1);
        assert_eq!(count(&h.log, |c| matches!(c, Call::DeleteTexture(_))), 1);
        assert_eq!(count(&h.log, |c| matches!(c, Call::ReleaseNative(_))), 1);
        assert_eq!(
            h.sink.creation(id),
            Some((
                CreationPath::Fallback,
                Some(FallbackReason::Bind(BindError::Attach(0x502)))
            ))
        );
    }

    #[test]
    fn lost_context_falls_back() {
        let mut h = harness_with(
            BackendConfig::rootless(),
            |_, gpu, _| gpu.fail_current.set(true),
            true,
        );
        let id = h.manager.create_surface(request(64, 64));
        assert!(matches!(
            h.sink.creation(id),
            Some((CreationPath::Fallback, Some(FallbackReason::Context(_))))
        ));
        assert!(h.log.calls().is_empty());
    }

    #[test]
    fn rootless_backing_store_reads_back_all_zero() {
        let mut h = harness();
        let id = h.manager.create_surface(SurfaceRequest {
            width: 800,
            height: 600,
            depth: 24,
            hint: UsageHint::BackingStore,
        });
        let pixels = h.manager.read_back(id).unwrap().unwrap();
        assert_eq!(pixels.len(), 800 * 600 * 4);
        assert!(pixels.iter().all(|&b| b == 0));
    }

    #[test]
    fn other_surfaces_are_not_cleared() {
        let mut h = harness();
        let default = h.manager.create_surface(request(8, 8));
        let mut rooted = harness_with(BackendConfig::rooted(), |_, _, _| {}, true);
        let backing = rooted.manager.create_surface(SurfaceRequest {
            hint: UsageHint::BackingStore,
            ..request(8, 8)
        });

        assert_eq!(count(&h.log, |c| matches!(c, Call::ClearTexture(_))), 0);
        let rooted_clears = count(&rooted.log, |c| matches!(c, Call::ClearTexture(_)));
        assert_eq!(rooted_clears, 0);
        let pixels = h.manager.read_back(default).unwrap().unwrap();
        assert!(pixels.iter().all(|&b| b == 0xAB));
        let pixels = rooted.manager.read_back(backing).unwrap().unwrap();
        assert!(pixels.iter().all(|&b| b == 0xAB));
    }

    #[test]
    fn read_back_needs_a_current_context() {
        let lost = Rc::new(Cell::new(false));
        let mut h = harness_with(
            BackendConfig::rootless(),
            |_, gpu, _| gpu.fail_current = Rc::clone(&lost),
            true,
        );
        let id = h.manager.create_surface(request(8, 8));
        assert!(h.manager.read_back(id).unwrap().is_ok());
        h.log.clear();
        lost.set(true);

        let err = h.manager.read_back(id).unwrap().unwrap_err();
        assert!(matches!(err, BindError::Context(_)), "{err}");
        assert_eq!(count(&h.log, |c| matches!(c, Call::ReadTexture(_))), 0);
    }

    #[test]
    fn clear_failure_rolls_back_to_generic() {
        let mut h = harness_with(
            BackendConfig::rootless(),
            |_, gpu, _| gpu.fail_clear = Some(0x505),
            true,
        );
        let id = h.manager.create_surface(SurfaceRequest {
            hint: UsageHint::BackingStore,
            ..request(16, 16)
        });
        assert_eq!(
            h.manager.surface(id).unwrap().storage_class(),
            StorageClass::Generic
        );
        assert_eq!(count(&h.log, |c| matches!(c, Call::DestroyImage(_))), 1);
        assert_eq!(count(&h.log, |c| matches!(c, Call::ReleaseNative(_))), 1);
        assert!(h.manager.read_back(id).is_none());
    }

    #[test]
    fn transport_handle_is_created_once() {
        let mut h = harness();
        let id = h.manager.create_surface(request(128, 64));

        let first = h.manager.get_transport_handle(id).unwrap();
        let second = h.manager.get_transport_handle(id).unwrap();
        assert_eq!(
            first,
            TransportHandle {
                buffer: TransportBuffer(1),
                created: true
            }
        );
        assert_eq!(second.buffer, first.buffer);
        assert!(!second.created);
        assert_eq!(count(&h.log, |c| matches!(c, Call::CreateTransport(_))), 1);
        assert_eq!(count(&h.log, |c| matches!(c, Call::Serialize(_))), 1);
        let created: Vec<_> = h
            .sink
            .events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Transport(t) => Some(t.created),
                _ => None,
            })
            .collect();
        assert_eq!(created, vec![true, false]);

        let sent = h.sent.borrow();
        let (params, layout) = &sent[0];
        assert_eq!((params.width, params.height, params.stride), (128, 64, 128));
        assert_eq!(params.format, 1);
        assert_eq!(params.usage, 0x200);
        assert_eq!(
            *layout,
            HandleLayout {
                num_ints: 4,
                num_fds: 1
            }
        );
    }

    #[test]
    fn transport_errors_are_surfaced_and_not_cached() {
        let mut h = harness_with(
            BackendConfig::rootless(),
            |_, _, remote| remote.fail = true,
            true,
        );
        let id = h.manager.create_surface(request(16, 16));
        assert!(matches!(
            h.manager.get_transport_handle(id),
            Err(TransportError::Protocol(ProtocolError::ConnectionLost))
        ));
        let external = h.manager.surface(id).unwrap().external().unwrap();
        assert!(external.transport().is_none());

        assert!(h.manager.destroy_surface(id));
        assert!(matches!(
            h.manager.get_transport_handle(id),
            Err(TransportError::UnknownSurface)
        ));
    }

    #[test]
    fn codec_mismatch_is_surfaced() {
        let mut h = harness_with(
            BackendConfig::rootless(),
            |buffers, _, _| buffers.short_fds = true,
            true,
        );
        let id = h.manager.create_surface(request(16, 16));
        assert!(matches!(
            h.manager.get_transport_handle(id),
            Err(TransportError::Codec(_))
        ));
        assert_eq!(count(&h.log, |c| matches!(c, Call::CreateTransport(_))), 0);
    }

    #[test]
    fn destroy_releases_in_dependency_order() {
        let mut h = harness();
        let id = h.manager.create_surface(request(32, 32));
        let transport = h.manager.get_transport_handle(id).unwrap().buffer;
        h.log.clear();

        assert!(h.manager.destroy_surface(id));
        let calls = h.log.calls();
        let pos = |f: fn(&Call) -> bool| calls.iter().position(|c| f(c)).unwrap();
        let t = pos(|c| matches!(c, Call::DestroyTransport(_)));
        let tex = pos(|c| matches!(c, Call::DeleteTexture(_)));
        let img = pos(|c| matches!(c, Call::DestroyImage(_)));
        let native = pos(|c| matches!(c, Call::ReleaseNative(_)));
        assert!(t < tex && tex < img && img < native, "{calls:?}");
        assert_eq!(calls[t], Call::DestroyTransport(transport));
        assert_eq!(count(&h.log, |c| matches!(c, Call::ReleaseNative(_))), 1);
        assert_eq!(count(&h.log, |c| matches!(c, Call::DestroyImage(_))), 1);
        assert_eq!(count(&h.log, |c| matches!(c, Call::DestroyTransport(_))), 1);

        assert_eq!(
            h.sink.teardown_steps(id),
            vec![
                TeardownStep::TransportBuffer,
                TeardownStep::GpuImage,
                TeardownStep::NativeBuffer,
                TeardownStep::Generic,
            ]
        );
    }

    #[test]
    fn destroy_without_transport_skips_that_step() {
        let mut h = harness();
        let id = h.manager.create_surface(request(32, 32));
        assert!(h.manager.destroy_surface(id));
        assert_eq!(
            h.sink.teardown_steps(id),
            vec![
                TeardownStep::GpuImage,
                TeardownStep::NativeBuffer,
                TeardownStep::Generic
            ]
        );
        assert_eq!(count(&h.log, |c| matches!(c, Call::DestroyTransport(_))), 0);
    }

    #[test]
    fn only_last_reference_tears_down() {
        let mut h = harness();
        let id = h.manager.create_surface(request(32, 32));
        assert_eq!(h.manager.retain(id), Some(2));

        assert!(!h.manager.destroy_surface(id));
        assert!(h.manager.surface(id).is_some());
        assert_eq!(count(&h.log, |c| matches!(c, Call::ReleaseNative(_))), 0);

        assert!(h.manager.destroy_surface(id));
        assert!(!h.manager.destroy_surface(id), "stale handle is a no-op");
        assert_eq!(count(&h.log, |c| matches!(c, Call::ReleaseNative(_))), 1);
        assert_eq!(h.manager.retain(id), None);
    }

    #[test]
    fn generic_surface_teardown_is_one_step() {
        let mut h = harness();
        let id = h.manager.create_surface(request(0, 0));
        assert!(h.manager.destroy_surface(id));
        assert_eq!(h.sink.teardown_steps(id), vec![TeardownStep::Generic]);
        assert!(h.log.calls().is_empty());
    }

    #[test]
    fn exported_buffer_round_trips_through_import() {
        let mut h = harness();
        let source = h.manager.create_surface(request(256, 128));
        let exported = h.manager.buffer_from_pixmap(source).unwrap();
        assert_eq!(exported.stride, 256);
        assert_eq!(exported.descriptor.fds.len(), 1);

        let imported = h
            .manager
            .pixmap_from_buffer(ImportRequest {
                width: 256,
                height: 128,
                stride: exported.stride,
                depth: 24,
                bpp: 32,
                descriptor: exported.descriptor,
            })
            .unwrap();
        let surface = h.manager.surface(imported).unwrap();
        assert_eq!(surface.storage_class(), StorageClass::External);
        assert_eq!(surface.hint(), UsageHint::Shared);
        assert_eq!(surface.external().unwrap().buffer().usage().0, 0x100);
        assert_eq!(count(&h.log, |c| matches!(c, Call::CreateRemote(_))), 1);
        assert_eq!(
            h.sink.creation(imported).map(|(path, _)| path),
            Some(CreationPath::Imported)
        );

        assert!(h.manager.destroy_surface(imported));
        assert!(h.manager.surface(source).is_some());
    }

    #[test]
    fn import_rejects_unsupported_geometry() {
        let mut h = harness();
        for (depth, bpp, width) in [(24, 16, 8), (16, 32, 8), (24, 32, 0)] {
            let err = h
                .manager
                .pixmap_from_buffer(ImportRequest {
                    width,
                    height: 8,
                    stride: 8,
                    depth,
                    bpp,
                    descriptor: BufferDescriptor::new(vec![1], vec![test_fd()]),
                })
                .unwrap_err();
            assert!(matches!(err, ImportRejected::Geometry { .. }));
        }
        assert!(h.log.calls().is_empty());
        assert_eq!(h.manager.surface_count(), 0);
    }

    #[test]
    fn failed_import_leaves_nothing_allocated() {
        let mut h = harness_with(
            BackendConfig::rootless(),
            |_, gpu, _| gpu.reject_import = true,
            true,
        );
        let err = h
            .manager
            .pixmap_from_buffer(ImportRequest {
                width: 8,
                height: 8,
                stride: 8,
                depth: 32,
                bpp: 32,
                descriptor: BufferDescriptor::new(vec![1], vec![test_fd()]),
            })
            .unwrap_err();
        assert!(matches!(err, ImportRejected::Import(_)));
        assert_eq!(count(&h.log, |c| matches!(c, Call::CreateRemote(_))), 1);
        assert_eq!(count(&h.log, |c| matches!(c, Call::ReleaseNative(_))), 1);
        assert_eq!(h.manager.surface_count(), 0);
    }

    #[test]
    fn export_of_generic_surface_fails() {
        let mut h = harness_with(BackendConfig::rootless(), |_, _, _| {}, false);
        let id = h.manager.create_surface(request(8, 8));
        assert!(matches!(
            h.manager.buffer_from_pixmap(id),
            Err(TransportError::NoNativeBuffer)
        ));
    }

    #[test]
    fn shutdown_tears_down_everything() {
        let mut h = harness();
        let a = h.manager.create_surface(request(8, 8));
        let b = h.manager.create_surface(request(8, 8));
        h.manager.retain(b);
        h.manager.get_transport_handle(b).unwrap();
        let _ = h.manager.create_surface(request(0, 8));

        h.manager.shutdown();
        assert_eq!(
            count(&h.log, |c| matches!(c, Call::CreateNative(_))),
            count(&h.log, |c| matches!(c, Call::ReleaseNative(_)))
        );
        assert_eq!(
            count(&h.log, |c| matches!(c, Call::CreateImage(_))),
            count(&h.log, |c| matches!(c, Call::DestroyImage(_)))
        );
        assert_eq!(count(&h.log, |c| matches!(c, Call::DestroyTransport(_))), 1);
        assert_eq!(
            h.sink.teardown_steps(a).last(),
            Some(&TeardownStep::Generic)
        );
        assert_eq!(
            h.sink.teardown_steps(b).first(),
            Some(&TeardownStep::TransportBuffer)
        );
    }

    #[test]
    fn textures_are_distinct_per_surface() {
        let mut h = harness();
        let a = h.manager.create_surface(request(8, 8));
        let b = h.manager.create_surface(request(8, 8));
        let tex = |id| -> GpuTexture {
            let surface = h.manager.surface(id).unwrap();
            surface.external().unwrap().bound().texture()
        };
        assert_ne!(tex(a), tex(b));
    }
}
