// Copyright 2026 the Hwshare Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! EGL display and GLES2 context setup.

use core::ffi::c_void;
use core::fmt;
use std::ffi::OsStr;

use glow::HasContext;
use hwshare_core::error::InitError;
use khronos_egl as egl;

use crate::procs::{self, HybrisProcs};

/// The dynamically loaded EGL 1.4 instance.
pub(crate) type Egl = egl::DynamicInstance<egl::EGL1_4>;

/// GL extension required to attach an `EGLImage` to a texture.
const OES_EGL_IMAGE: &str = "GL_OES_EGL_image";

const CONFIG_ATTRIBS: [egl::Int; 15] = [
    egl::RED_SIZE,
    8,
    egl::GREEN_SIZE,
    8,
    egl::BLUE_SIZE,
    8,
    egl::ALPHA_SIZE,
    8,
    egl::DEPTH_SIZE,
    24,
    egl::STENCIL_SIZE,
    8,
    egl::RENDERABLE_TYPE,
    egl::OPENGL_ES2_BIT,
    egl::NONE,
];

const CONTEXT_ATTRIBS: [egl::Int; 3] = [egl::CONTEXT_CLIENT_VERSION, 2, egl::NONE];

/// Display, context and entry points shared by the buffer and GPU
/// capabilities.
///
/// Dropping the last reference destroys the context and terminates the
/// display.
pub(crate) struct EglSession {
    pub(crate) egl: Egl,
    pub(crate) display: egl::Display,
    pub(crate) context: egl::Context,
    pub(crate) gl: glow::Context,
    pub(crate) procs: HybrisProcs,
}

impl fmt::Debug for EglSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EglSession")
            .field("display", &self.display.as_ptr())
            .field("context", &self.context.as_ptr())
            .finish_non_exhaustive()
    }
}

fn egl_failure(egl: &Egl, stage: &'static str) -> InitError {
    InitError::Egl {
        stage,
        message: format!("error {:#x}", procs::error_code(egl.get_error())),
    }
}

impl EglSession {
    /// Loads `libEGL` (from `library`, or the default search path) and sets
    /// up a surfaceless GLES2 context on the default display.
    pub(crate) fn open(library: Option<&OsStr>) -> Result<Self, InitError> {
        // SAFETY: loading libEGL runs its initializers; libhybris' EGL has no
        // requirements on the loading thread.
        let loaded = unsafe {
            match library {
                Some(path) => Egl::load_required_from_filename(path),
                None => Egl::load_required(),
            }
        };
        let egl = loaded.map_err(|err| InitError::Load(err.to_string()))?;

        // SAFETY: `DEFAULT_DISPLAY` is always a valid native display id.
        let display = unsafe { egl.get_display(egl::DEFAULT_DISPLAY) }
            .ok_or_else(|| egl_failure(&egl, "eglGetDisplay"))?;
        let (major, minor) = egl
            .initialize(display)
            .map_err(|_| egl_failure(&egl, "eglInitialize"))?;
        log::debug!("EGL {major}.{minor} initialized");

        match Self::create_context(egl, display) {
            Ok(session) => Ok(session),
            Err((egl, err)) => {
                if egl.terminate(display).is_err() {
                    log::warn!("eglTerminate failed during init cleanup");
                }
                Err(err)
            }
        }
    }

    fn create_context(egl: Egl, display: egl::Display) -> Result<Self, (Egl, InitError)> {
        if egl.bind_api(egl::OPENGL_ES_API).is_err() {
            let err = egl_failure(&egl, "eglBindAPI");
            return Err((egl, err));
        }
        let config = match egl.choose_first_config(display, &CONFIG_ATTRIBS) {
            Ok(Some(config)) => config,
            Ok(None) => {
                let err = InitError::Egl {
                    stage: "eglChooseConfig",
                    message: "no matching config".into(),
                };
                return Err((egl, err));
            }
            Err(_) => {
                let err = egl_failure(&egl, "eglChooseConfig");
                return Err((egl, err));
            }
        };
        let context = match egl.create_context(display, config, None, &CONTEXT_ATTRIBS) {
            Ok(context) => context,
            Err(_) => {
                let err = egl_failure(&egl, "eglCreateContext");
                return Err((egl, err));
            }
        };

        match Self::finish(&egl, display, context) {
            Ok((gl, procs)) => Ok(Self {
                egl,
                display,
                context,
                gl,
                procs,
            }),
            Err(err) => {
                let _ = egl.make_current(display, None, None, None);
                if egl.destroy_context(display, context).is_err() {
                    log::warn!("eglDestroyContext failed during init cleanup");
                }
                Err((egl, err))
            }
        }
    }

    fn finish(
        egl: &Egl,
        display: egl::Display,
        context: egl::Context,
    ) -> Result<(glow::Context, HybrisProcs), InitError> {
        egl.make_current(display, None, None, Some(context))
            .map_err(|_| egl_failure(egl, "eglMakeCurrent"))?;

        // SAFETY: the context is current, and the loader returns either null
        // or a GLES2 entry point for it.
        let gl = unsafe {
            glow::Context::from_loader_function(|name| {
                egl.get_proc_address(name)
                    .map_or(core::ptr::null(), |proc| proc as *const c_void)
            })
        };
        if !gl.supported_extensions().contains(OES_EGL_IMAGE) {
            return Err(InitError::MissingExtension(OES_EGL_IMAGE));
        }

        let procs = HybrisProcs::resolve(egl)?;
        Ok((gl, procs))
    }

    /// Makes the context current without a surface.
    pub(crate) fn make_current(&self) -> Result<(), egl::Error> {
        self.egl
            .make_current(self.display, None, None, Some(self.context))
    }

    /// Takes the pending EGL error, if any.
    pub(crate) fn take_egl_error(&self) -> Option<u32> {
        match procs::error_code(self.egl.get_error()) {
            0 => None,
            code => Some(code),
        }
    }
}

impl Drop for EglSession {
    fn drop(&mut self) {
        if self.egl.get_current_context() == Some(self.context) {
            let released = self.egl.make_current(self.display, None, None, None);
            if released.is_err() {
                log::warn!("failed to release EGL context");
            }
        }
        let destroyed = self.egl.destroy_context(self.display, self.context);
        if destroyed.is_err() {
            log::warn!("failed to destroy EGL context");
        }
        if self.egl.terminate(self.display).is_err() {
            log::warn!("failed to terminate EGL display");
        }
        log::debug!("EGL session closed");
    }
}
