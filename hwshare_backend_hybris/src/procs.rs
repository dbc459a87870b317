// Copyright 2026 the Hwshare Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Extension entry points resolved through `eglGetProcAddress`.

use core::ffi::{c_int, c_void};
use core::fmt;

use hwshare_core::error::InitError;
use khronos_egl as egl;

use crate::session::Egl;

/// `EGL_NATIVE_BUFFER_HYBRIS`: image target for libhybris native buffers.
pub const EGL_NATIVE_BUFFER_HYBRIS: egl::Enum = 0x3140;

pub(crate) type EglBoolean = egl::Boolean;
pub(crate) type EglClientBuffer = *mut c_void;
pub(crate) type EglImage = *mut c_void;

pub(crate) type CreateNativeBufferFn = unsafe extern "C" fn(
    width: egl::Int,
    height: egl::Int,
    usage: egl::Int,
    format: egl::Int,
    stride: *mut egl::Int,
    buffer: *mut EglClientBuffer,
) -> EglBoolean;

pub(crate) type CreateRemoteBufferFn = unsafe extern "C" fn(
    width: egl::Int,
    height: egl::Int,
    usage: egl::Int,
    format: egl::Int,
    stride: egl::Int,
    num_ints: c_int,
    ints: *mut c_int,
    num_fds: c_int,
    fds: *mut c_int,
    buffer: *mut EglClientBuffer,
) -> EglBoolean;

pub(crate) type ReleaseNativeBufferFn = unsafe extern "C" fn(buffer: EglClientBuffer) -> EglBoolean;

pub(crate) type GetNativeBufferInfoFn =
    unsafe extern "C" fn(buffer: EglClientBuffer, num_ints: *mut c_int, num_fds: *mut c_int);

pub(crate) type SerializeNativeBufferFn =
    unsafe extern "C" fn(buffer: EglClientBuffer, ints: *mut c_int, fds: *mut c_int);

pub(crate) type CreateImageKhrFn = unsafe extern "C" fn(
    display: *mut c_void,
    context: *mut c_void,
    target: egl::Enum,
    buffer: EglClientBuffer,
    attribs: *const egl::Int,
) -> EglImage;

pub(crate) type DestroyImageKhrFn =
    unsafe extern "C" fn(display: *mut c_void, image: EglImage) -> EglBoolean;

pub(crate) type ImageTargetTexture2dFn = unsafe extern "C" fn(target: u32, image: EglImage);

/// Resolves one entry point, failing init if it is missing.
macro_rules! resolve {
    ($egl:expr, $name:literal as $ty:ty) => {{
        let proc = $egl
            .get_proc_address($name)
            .ok_or(InitError::MissingEntryPoint($name))?;
        // SAFETY: the symbol named `$name` has the C signature `$ty`, as
        // declared by libhybris and the EGL/GLES extension registry.
        unsafe { core::mem::transmute::<extern "system" fn(), $ty>(proc) }
    }};
}

/// Extension entry points, resolved once at startup.
#[derive(Clone, Copy)]
pub(crate) struct HybrisProcs {
    pub(crate) create_native_buffer: CreateNativeBufferFn,
    pub(crate) create_remote_buffer: CreateRemoteBufferFn,
    pub(crate) release_native_buffer: ReleaseNativeBufferFn,
    pub(crate) get_native_buffer_info: GetNativeBufferInfoFn,
    pub(crate) serialize_native_buffer: SerializeNativeBufferFn,
    pub(crate) create_image: CreateImageKhrFn,
    pub(crate) destroy_image: DestroyImageKhrFn,
    pub(crate) image_target_texture_2d: ImageTargetTexture2dFn,
}

impl fmt::Debug for HybrisProcs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HybrisProcs").finish_non_exhaustive()
    }
}

impl HybrisProcs {
    pub(crate) fn resolve(egl: &Egl) -> Result<Self, InitError> {
        Ok(Self {
            create_native_buffer: resolve!(
                egl,
                "eglHybrisCreateNativeBuffer" as CreateNativeBufferFn
            ),
            create_remote_buffer: resolve!(
                egl,
                "eglHybrisCreateRemoteBuffer" as CreateRemoteBufferFn
            ),
            release_native_buffer: resolve!(
                egl,
                "eglHybrisReleaseNativeBuffer" as ReleaseNativeBufferFn
            ),
            get_native_buffer_info: resolve!(
                egl,
                "eglHybrisGetNativeBufferInfo" as GetNativeBufferInfoFn
            ),
            serialize_native_buffer: resolve!(
                egl,
                "eglHybrisSerializeNativeBuffer" as SerializeNativeBufferFn
            ),
            create_image: resolve!(egl, "eglCreateImageKHR" as CreateImageKhrFn),
            destroy_image: resolve!(egl, "eglDestroyImageKHR" as DestroyImageKhrFn),
            image_target_texture_2d: resolve!(
                egl,
                "glEGLImageTargetTexture2DOES" as ImageTargetTexture2dFn
            ),
        })
    }
}

/// Error code of an EGL error, or 0 when there is none.
pub(crate) fn error_code(err: Option<egl::Error>) -> u32 {
    err.map_or(0, |err| err.native().cast_unsigned())
}
