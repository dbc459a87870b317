// Copyright 2026 the Hwshare Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! libhybris backend for hwshare.
//!
//! Loads `libEGL` at runtime, sets up a surfaceless GLES2 context on the
//! default display and resolves the `eglHybris*` native-buffer entry points.
//! The result is a [`Capabilities`] pair for
//! [`BackendContext`](hwshare_core::context::BackendContext):
//!
//! - [`HybrisBuffers`]: gralloc allocation, remote reconstruction and handle
//!   serialization
//! - [`HybrisGpu`]: `EGLImage` import with `EGL_NATIVE_BUFFER_HYBRIS` and
//!   texture binding through `GL_OES_EGL_image`
//!
//! ```no_run
//! use hwshare_core::config::BackendConfig;
//! use hwshare_core::context::BackendContext;
//!
//! let context = BackendContext::init(BackendConfig::rootless(), hwshare_backend_hybris::load)?;
//! # Ok::<(), hwshare_core::error::InitError>(())
//! ```
//!
//! Both capabilities share one EGL session; it is torn down when the last
//! of them is dropped.

#![expect(unsafe_code, reason = "libhybris and EGL are C APIs")]

mod buffers;
mod gpu;
mod procs;
mod session;

use std::ffi::OsStr;
use std::rc::Rc;

use hwshare_core::config::BackendConfig;
use hwshare_core::context::Capabilities;
use hwshare_core::error::InitError;

pub use buffers::HybrisBuffers;
pub use gpu::HybrisGpu;
pub use procs::EGL_NATIVE_BUFFER_HYBRIS;

use session::EglSession;

fn capabilities(session: EglSession) -> Capabilities {
    let session = Rc::new(session);
    Capabilities {
        buffers: Box::new(HybrisBuffers::new(Rc::clone(&session))),
        gpu: Box::new(HybrisGpu::new(session)),
    }
}

/// Loads `libEGL` from the default search path and resolves capabilities.
///
/// Matches the loader signature of
/// [`BackendContext::init`](hwshare_core::context::BackendContext::init).
///
/// # Errors
///
/// Returns [`InitError`] when the library, the display, the context, the
/// `GL_OES_EGL_image` extension or any hybris entry point is unavailable.
/// Everything created up to the failure is destroyed first.
pub fn load(config: &BackendConfig) -> Result<Capabilities, InitError> {
    log::debug!("loading hybris backend (rootless: {})", config.rootless);
    EglSession::open(None).map(capabilities)
}

/// Like [`load`], but loads `libEGL` from `library`.
///
/// # Errors
///
/// See [`load`].
pub fn load_from(library: &OsStr) -> Result<Capabilities, InitError> {
    log::debug!("loading hybris backend from {}", library.display());
    EglSession::open(Some(library)).map(capabilities)
}
