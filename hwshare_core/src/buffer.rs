// Copyright 2026 the Hwshare Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Native buffer handles, pixel formats and usage flags.
//!
//! A [`NativeBuffer`] is the Rust-side owner of one platform allocation. It
//! is move-only: the only way to get rid of one is
//! [`Allocator::release`](crate::allocator::Allocator::release), which
//! consumes it, so a buffer cannot be released twice.

use core::fmt;
use core::num::NonZeroUsize;
use core::ops::BitOr;

/// Platform pixel format code (`HAL_PIXEL_FORMAT_*` values).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelFormat(pub i32);

impl PixelFormat {
    /// 32-bit RGBA, 8 bits per channel.
    pub const RGBA_8888: Self = Self(1);
    /// 32-bit RGB with an unused alpha byte.
    pub const RGBX_8888: Self = Self(2);
    /// 24-bit packed RGB.
    pub const RGB_888: Self = Self(3);
    /// 16-bit RGB 5:6:5.
    pub const RGB_565: Self = Self(4);
    /// 32-bit BGRA, 8 bits per channel.
    pub const BGRA_8888: Self = Self(5);

    /// Bytes per pixel for the formats this crate knows about.
    #[must_use]
    pub const fn bytes_per_pixel(self) -> Option<u32> {
        match self.0 {
            1 | 2 | 5 => Some(4),
            3 => Some(3),
            4 => Some(2),
            _ => None,
        }
    }
}

impl fmt::Debug for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::RGBA_8888 => f.write_str("RGBA_8888"),
            Self::RGBX_8888 => f.write_str("RGBX_8888"),
            Self::RGB_888 => f.write_str("RGB_888"),
            Self::RGB_565 => f.write_str("RGB_565"),
            Self::BGRA_8888 => f.write_str("BGRA_8888"),
            Self(other) => write!(f, "PixelFormat({other})"),
        }
    }
}

/// Platform usage bits (`GRALLOC_USAGE_*` values).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BufferUsage(pub u32);

impl BufferUsage {
    /// CPU reads the buffer often.
    pub const SW_READ_OFTEN: Self = Self(0x0000_0003);
    /// CPU writes the buffer often.
    pub const SW_WRITE_OFTEN: Self = Self(0x0000_0030);
    /// Buffer is sampled as a GPU texture.
    pub const HW_TEXTURE: Self = Self(0x0000_0100);
    /// Buffer is a GPU render target.
    pub const HW_RENDER: Self = Self(0x0000_0200);
    /// Buffer is handed to the hardware composer.
    pub const HW_COMPOSER: Self = Self(0x0000_0800);

    /// Returns `true` if every bit of `other` is set in `self`.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Raw bits as the signed integer most platform entry points take.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0.cast_signed()
    }
}

impl BitOr for BufferUsage {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Debug for BufferUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BufferUsage({:#x})", self.0)
    }
}

/// Size, format and usage of a native buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferDesc {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel format.
    pub format: PixelFormat,
    /// Usage bits.
    pub usage: BufferUsage,
}

/// Opaque platform token for a native buffer (an `EGLClientBuffer` pointer
/// on libhybris).
///
/// Non-null by construction; core code never dereferences it.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawBuffer(pub NonZeroUsize);

impl RawBuffer {
    /// Wraps a raw address, returning `None` for null.
    #[must_use]
    pub const fn new(addr: usize) -> Option<Self> {
        match NonZeroUsize::new(addr) {
            Some(addr) => Some(Self(addr)),
            None => None,
        }
    }

    /// Returns the raw address.
    #[must_use]
    pub const fn addr(self) -> usize {
        self.0.get()
    }
}

impl fmt::Debug for RawBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawBuffer({:#x})", self.0)
    }
}

/// An owned native buffer.
///
/// Created by [`Allocator::allocate`](crate::allocator::Allocator::allocate)
/// or [`Allocator::create_remote`](crate::allocator::Allocator::create_remote)
/// and released by [`Allocator::release`](crate::allocator::Allocator::release).
/// Dropping a `NativeBuffer` without releasing it leaks the platform
/// allocation.
#[derive(Debug, PartialEq, Eq)]
pub struct NativeBuffer {
    raw: RawBuffer,
    desc: BufferDesc,
    stride: u32,
}

impl NativeBuffer {
    pub(crate) const fn new(raw: RawBuffer, desc: BufferDesc, stride: u32) -> Self {
        Self { raw, desc, stride }
    }

    /// Platform token.
    #[must_use]
    pub const fn raw(&self) -> RawBuffer {
        self.raw
    }

    /// Size, format and usage.
    #[must_use]
    pub const fn desc(&self) -> &BufferDesc {
        &self.desc
    }

    /// Row stride in pixels, as reported by the platform allocator.
    #[must_use]
    pub const fn stride(&self) -> u32 {
        self.stride
    }

    /// Width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.desc.width
    }

    /// Height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.desc.height
    }

    /// Pixel format.
    #[must_use]
    pub const fn format(&self) -> PixelFormat {
        self.desc.format
    }

    /// Usage bits.
    #[must_use]
    pub const fn usage(&self) -> BufferUsage {
        self.desc.usage
    }

    pub(crate) fn into_raw(self) -> RawBuffer {
        self.raw
    }
}
