// Copyright 2026 the Hwshare Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! [`GpuApi`] over EGL images and GLES2 textures.

use core::ffi::c_void;
use core::num::NonZeroUsize;
use std::rc::Rc;

use glow::HasContext;
use hwshare_core::binder::{GpuApi, GpuImage, GpuTexture};
use hwshare_core::buffer::RawBuffer;
use hwshare_core::error::{BindError, ContextError, ImportError};

use crate::buffers::client_buffer;
use crate::procs::{self, EGL_NATIVE_BUFFER_HYBRIS, EglImage};
use crate::session::EglSession;

/// Error code reported when a scratch framebuffer is incomplete.
const FRAMEBUFFER_INCOMPLETE: u32 = glow::INVALID_FRAMEBUFFER_OPERATION;

fn egl_image(image: GpuImage) -> EglImage {
    core::ptr::with_exposed_provenance_mut::<c_void>(image.0.get())
}

fn texture_name(texture: GpuTexture) -> glow::NativeTexture {
    glow::NativeTexture(texture.0)
}

fn extent(width: u32, height: u32) -> Option<(i32, i32)> {
    Some((i32::try_from(width).ok()?, i32::try_from(height).ok()?))
}

/// Images and textures on the session's GLES2 context.
#[derive(Debug)]
pub struct HybrisGpu {
    session: Rc<EglSession>,
}

impl HybrisGpu {
    pub(crate) fn new(session: Rc<EglSession>) -> Self {
        Self { session }
    }

    fn gl(&self) -> &glow::Context {
        &self.session.gl
    }

    /// Runs `f` with `texture` attached to a scratch framebuffer, then
    /// restores the default framebuffer. Returns the GL error raised along
    /// the way, if any.
    fn with_framebuffer<T>(
        &self,
        texture: GpuTexture,
        f: impl FnOnce(&glow::Context) -> T,
    ) -> Result<T, u32> {
        let gl = self.gl();
        // SAFETY: the session's context is current; the framebuffer is
        // created, used and deleted within this call.
        unsafe {
            let Ok(framebuffer) = gl.create_framebuffer() else {
                return Err(FRAMEBUFFER_INCOMPLETE);
            };
            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(framebuffer));
            gl.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0,
                glow::TEXTURE_2D,
                Some(texture_name(texture)),
                0,
            );
            let status = gl.check_framebuffer_status(glow::FRAMEBUFFER);
            let result = if status == glow::FRAMEBUFFER_COMPLETE {
                let value = f(gl);
                match gl.get_error() {
                    glow::NO_ERROR => Ok(value),
                    code => Err(code),
                }
            } else {
                Err(FRAMEBUFFER_INCOMPLETE)
            };
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);
            gl.delete_framebuffer(framebuffer);
            result
        }
    }
}

impl GpuApi for HybrisGpu {
    fn make_current(&mut self) -> Result<(), ContextError> {
        self.session
            .make_current()
            .map_err(|err| ContextError(err.to_string()))
    }

    fn create_image(&mut self, raw: RawBuffer) -> Result<GpuImage, ImportError> {
        // SAFETY: the display is initialized and `raw` is a live native
        // buffer; a null attribute list is allowed.
        let image = unsafe {
            (self.session.procs.create_image)(
                self.session.display.as_ptr(),
                core::ptr::null_mut(),
                EGL_NATIVE_BUFFER_HYBRIS,
                client_buffer(raw),
                core::ptr::null(),
            )
        };
        NonZeroUsize::new(image.expose_provenance())
            .map(GpuImage)
            .ok_or_else(|| ImportError {
                code: procs::error_code(self.session.egl.get_error()),
            })
    }

    fn destroy_image(&mut self, image: GpuImage) {
        // SAFETY: `image` was created on this display and is destroyed once.
        let ok = unsafe {
            (self.session.procs.destroy_image)(self.session.display.as_ptr(), egl_image(image))
        };
        if ok == 0 {
            log::warn!("eglDestroyImageKHR failed for {image:?}");
        }
    }

    fn create_texture(&mut self) -> Result<GpuTexture, BindError> {
        // SAFETY: the session's context is current.
        let texture = unsafe { self.gl().create_texture() };
        let texture = texture.map_err(BindError::TextureAllocation)?;
        Ok(GpuTexture(texture.0))
    }

    fn set_nearest_filtering(&mut self, texture: GpuTexture) {
        let gl = self.gl();
        let nearest = glow::NEAREST as i32;
        // SAFETY: `texture` is a live texture name on the current context.
        unsafe {
            gl.bind_texture(glow::TEXTURE_2D, Some(texture_name(texture)));
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, nearest);
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, nearest);
        }
    }

    fn attach_image(&mut self, texture: GpuTexture, image: GpuImage) {
        // SAFETY: `texture` is bound-able on the current context and `image`
        // is a live image on the same display.
        unsafe {
            self.gl()
                .bind_texture(glow::TEXTURE_2D, Some(texture_name(texture)));
            (self.session.procs.image_target_texture_2d)(glow::TEXTURE_2D, egl_image(image));
        }
    }

    fn take_error(&mut self) -> Option<u32> {
        if let Some(code) = self.session.take_egl_error() {
            return Some(code);
        }
        // SAFETY: the session's context is current.
        match unsafe { self.gl().get_error() } {
            glow::NO_ERROR => None,
            code => Some(code),
        }
    }

    fn delete_texture(&mut self, texture: GpuTexture) {
        // SAFETY: `texture` is a live texture name, deleted once.
        unsafe { self.gl().delete_texture(texture_name(texture)) };
    }

    fn clear_texture(
        &mut self,
        texture: GpuTexture,
        width: u32,
        height: u32,
    ) -> Result<(), BindError> {
        let Some((width, height)) = extent(width, height) else {
            return Err(BindError::Clear(glow::INVALID_VALUE));
        };
        self.with_framebuffer(texture, |gl| {
            // SAFETY: a complete framebuffer is bound on the current context.
            unsafe {
                gl.viewport(0, 0, width, height);
                gl.clear_color(0.0, 0.0, 0.0, 0.0);
                gl.clear(glow::COLOR_BUFFER_BIT);
            }
        })
        .map_err(BindError::Clear)
    }

    fn read_texture(
        &mut self,
        texture: GpuTexture,
        width: u32,
        height: u32,
    ) -> Result<Vec<u8>, BindError> {
        let Some((w, h)) = extent(width, height) else {
            return Err(BindError::ReadBack(glow::INVALID_VALUE));
        };
        let len = usize::try_from(u64::from(width) * u64::from(height) * 4)
            .map_err(|_| BindError::ReadBack(glow::OUT_OF_MEMORY))?;
        let mut pixels = vec![0_u8; len];
        self.with_framebuffer(texture, |gl| {
            // SAFETY: `pixels` holds exactly `w * h` RGBA texels.
            unsafe {
                gl.pixel_store_i32(glow::PACK_ALIGNMENT, 1);
                gl.read_pixels(
                    0,
                    0,
                    w,
                    h,
                    glow::RGBA,
                    glow::UNSIGNED_BYTE,
                    glow::PixelPackData::Slice(Some(&mut pixels)),
                );
            }
        })
        .map_err(BindError::ReadBack)?;
        Ok(pixels)
    }
}
