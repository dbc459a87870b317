// Copyright 2026 the Hwshare Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Wayland transport for hwshare.
//!
//! Binds the `android_wlegl` global and implements
//! [`RemoteAllocator`](hwshare_core::registry::RemoteAllocator) on top of it:
//! a serialized native buffer handle becomes an `android_wlegl_handle`
//! (integers plus one `add_fd` per descriptor), which in turn becomes a
//! `wl_buffer` the compositor can attach to surfaces.
//!
//! ```no_run
//! # use hwshare_core::config::BackendConfig;
//! # use hwshare_core::registry::RegistryBinding;
//! use hwshare_backend_wayland::OwnedQueueMode;
//! use wayland_client::Connection;
//!
//! let config = BackendConfig::rootless();
//! let connection = Connection::connect_to_env()?;
//! let mut wayland = OwnedQueueMode::new(&connection, &config);
//! wayland.roundtrip()?;
//!
//! let mut binding = RegistryBinding::new(config.protocol_name);
//! if !wayland.attach(&mut binding) {
//!     // Surfaces fall back to generic storage.
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! `wl_buffer.release` events for buffers created here are collected in a
//! bounded [`BufferEventQueue`]. Hosts that own the event queue forward the
//! backend's dispatch through [`delegate_wlegl!`] and use
//! [`EmbeddedStateMode`].

mod allocator;
mod event_loop;
mod events;
pub mod protocol;
#[cfg(test)]
mod test_server;

pub use allocator::{WleglAllocator, WleglBuffer};
pub use event_loop::{EmbeddedStateMode, OwnedQueueMode, WaylandState};
pub use events::{BufferEvent, BufferEventQueue};

#[doc(hidden)]
pub mod __private {
    pub use wayland_client::protocol::{wl_buffer, wl_registry};
    pub use wayland_client::{Connection, Dispatch, QueueHandle};
}
