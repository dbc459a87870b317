// Copyright 2026 the Hwshare Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Native GPU buffer lifecycle and cross-process buffer sharing.
//!
//! `hwshare_core` owns the data model and the lifecycle rules for surfaces
//! that are backed by platform native buffers (gralloc-style handles exposed
//! through libhybris). It is platform-free: every GPU and allocator call goes
//! through a capability trait that a backend crate implements once at
//! startup.
//!
//! # Architecture
//!
//! ```text
//!   SurfaceRequest
//!       │
//!       ▼
//!   SurfaceManager::create_surface()
//!       │  Allocator::allocate() ──► NativeBuffer
//!       │  Binder::bind()        ──► BoundImage (GpuImage + GpuTexture)
//!       ▼
//!   SurfaceStore (SurfaceId, refcount, Storage::External | Storage::Generic)
//!       │
//!       ▼
//!   SurfaceManager::get_transport_handle()
//!       │  codec::serialize()          ──► BufferDescriptor (ints + fds)
//!       │  RemoteAllocator::create_buffer() ──► TransportBuffer (cached)
//!       ▼
//!   SurfaceManager::destroy_surface()
//!          TransportBuffer → GpuTexture → GpuImage → NativeBuffer
//! ```
//!
//! **[`buffer`]**: Native buffer handles, pixel formats and usage flags.
//!
//! **[`allocator`]**: Creates, reconstructs and releases native buffers.
//!
//! **[`codec`]**: Describes and serializes a native buffer's cross-process
//! descriptor.
//!
//! **[`binder`]**: Imports a native buffer as a GPU image and binds it to a
//! texture, with rollback on failure.
//!
//! **[`surface`]**: Generational surface store with per-slot reference
//! counts.
//!
//! **[`manager`]**: The lifecycle manager tying the pieces together, plus
//! the host capability pair (`pixmap_from_buffer` / `buffer_from_pixmap`).
//!
//! **[`registry`]**: Binding to the remote buffer-allocation protocol.
//!
//! **[`context`]**: The backend context created at init and torn down at
//! shutdown.
//!
//! **[`trace`]**: [`TraceSink`](trace::TraceSink) hooks for lifecycle
//! instrumentation.

pub mod allocator;
pub mod binder;
pub mod buffer;
pub mod codec;
pub mod config;
pub mod context;
pub mod error;
pub mod manager;
pub mod registry;
pub mod surface;
pub mod trace;

#[cfg(test)]
pub(crate) mod test_support;
