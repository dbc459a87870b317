// Copyright 2026 the Hwshare Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Registry binding and event-loop ownership for the Wayland transport.
//!
//! Two integration modes are supported:
//!
//! - [`OwnedQueueMode`]: backend-owned `EventQueue<WaylandState>`
//! - [`EmbeddedStateMode`]: host-owned `EventQueue<HostState>`, with the
//!   backend's `Dispatch` impls delegated from host state
//!
//! # Queue ownership wiring
//!
//! ```text
//! Owned queue mode
//! ----------------
//! backend owns:
//!   EventQueue<WaylandState> + WaylandState
//!     -> wl_registry, android_wlegl, handles and wl_buffers all use
//!        QueueHandle<WaylandState>
//! backend dispatches via OwnedQueueMode::roundtrip() or
//! OwnedQueueMode::dispatch_pending()
//!
//! Embedded-state mode
//! -------------------
//! host owns:
//!   EventQueue<HostState> + HostState { wayland: WaylandState, ... }
//!     -> HostState: AsMut<WaylandState>
//! host creates wl_registry with QueueHandle<HostState> and user data ()
//! host forwards with hwshare_backend_wayland::delegate_wlegl!(HostState):
//!   wl_registry::WlRegistry: ()  -> WaylandState::handle_registry_event
//!   AndroidWlegl: ()             -> no events
//!   AndroidWleglHandle: ()       -> no events
//!   wl_buffer::WlBuffer: WleglBuffer -> WaylandState::handle_buffer_event
//! ```
//!
//! `WaylandState` implements `Dispatch` for itself only, so it cannot be the
//! target of `wayland_client::delegate_dispatch!`. Hosts that already
//! dispatch `wl_registry` with their own user data call
//! [`WaylandState::handle_registry_event`] from that handler instead of
//! using the macro for the registry.
//!
//! The global is bound the first time a registry advertises an interface
//! whose name equals the configured protocol name exactly. Nothing is queued
//! or retried: surfaces created before the bind fall back to generic
//! storage.

use wayland_client::protocol::{wl_buffer, wl_registry};
use wayland_client::{
    Connection, Dispatch, DispatchError, EventQueue, Proxy, QueueHandle,
    backend::{ReadEventsGuard, WaylandError},
};

use hwshare_core::config::BackendConfig;
use hwshare_core::registry::{RegistryBinding, TransportBuffer};

use crate::allocator::{WleglAllocator, WleglBuffer};
use crate::events::{BufferEvent, BufferEventQueue};
use crate::protocol::android_wlegl::{self, AndroidWlegl};
use crate::protocol::android_wlegl_handle::{self, AndroidWleglHandle};

/// Highest `android_wlegl` version this crate speaks.
const WLEGL_VERSION: u32 = 1;

/// Backend state for `android_wlegl` protocol handling.
#[derive(Debug)]
pub struct WaylandState {
    interface: &'static str,
    /// Registry name and proxy of the bound global.
    global: Option<(u32, AndroidWlegl)>,
    attached: bool,
    events: BufferEventQueue,
}

impl WaylandState {
    /// Creates state that binds the global named `config.protocol_name`.
    #[must_use]
    pub fn new(config: &BackendConfig) -> Self {
        Self {
            interface: config.protocol_name,
            global: None,
            attached: false,
            events: BufferEventQueue::default(),
        }
    }

    /// Interface name this state binds.
    #[must_use]
    pub const fn interface(&self) -> &'static str {
        self.interface
    }

    /// Whether the global has been bound.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.global.is_some()
    }

    /// Hands a [`WleglAllocator`] for the bound global to `binding`.
    ///
    /// Returns `false` when the global has not been advertised yet, when it
    /// was already attached, or when `binding` refuses it.
    pub fn attach<D>(&mut self, queue: &QueueHandle<D>, binding: &mut RegistryBinding) -> bool
    where
        D: Dispatch<AndroidWleglHandle, ()> + Dispatch<wl_buffer::WlBuffer, WleglBuffer> + 'static,
    {
        let Some((_, wlegl)) = &self.global else {
            return false;
        };
        if self.attached || !binding.matches(self.interface) {
            return false;
        }
        let allocator = WleglAllocator::new(wlegl.clone(), queue.clone());
        self.attached = binding.bind(Box::new(allocator));
        self.attached
    }

    /// Pending buffer events.
    pub fn events_mut(&mut self) -> &mut BufferEventQueue {
        &mut self.events
    }

    /// Handles a `wl_registry` event, binding the global on an exact
    /// name match.
    ///
    /// The global is bound on `queue`; embedded hosts pass their own handle.
    pub fn handle_registry_event<D>(
        &mut self,
        registry: &wl_registry::WlRegistry,
        event: wl_registry::Event,
        queue: &QueueHandle<D>,
    ) where
        D: Dispatch<AndroidWlegl, ()> + 'static,
    {
        match event {
            wl_registry::Event::Global {
                name,
                interface,
                version,
            } => {
                if self.on_global(name, &interface, version) {
                    let wlegl = registry.bind::<AndroidWlegl, _, _>(
                        name,
                        version.min(WLEGL_VERSION),
                        queue,
                        (),
                    );
                    self.global = Some((name, wlegl));
                }
            }
            wl_registry::Event::GlobalRemove { name } => self.on_global_remove(name),
            _ => {}
        }
    }

    /// Records `wl_buffer.release` for a buffer created by [`WleglAllocator`].
    pub fn handle_buffer_event(
        &mut self,
        buffer: &wl_buffer::WlBuffer,
        event: wl_buffer::Event,
    ) {
        if let wl_buffer::Event::Release = event {
            let id = TransportBuffer(buffer.id().protocol_id());
            self.events.push(BufferEvent::Released(id));
        }
    }

    fn on_global(&mut self, name: u32, interface: &str, version: u32) -> bool {
        if interface != self.interface {
            return false;
        }
        if self.global.is_some() {
            log::debug!("ignoring second {interface} global (name {name})");
            return false;
        }
        log::debug!("{interface} v{version} advertised as global {name}");
        true
    }

    fn on_global_remove(&mut self, name: u32) {
        if matches!(&self.global, Some((bound, _)) if *bound == name) {
            log::warn!("{} global removed", self.interface);
            self.global = None;
            self.attached = false;
            self.events.push(BufferEvent::ProtocolRemoved);
        }
    }
}

impl AsMut<Self> for WaylandState {
    fn as_mut(&mut self) -> &mut Self {
        self
    }
}

impl Dispatch<wl_registry::WlRegistry, ()> for WaylandState {
    fn event(
        state: &mut Self,
        registry: &wl_registry::WlRegistry,
        event: wl_registry::Event,
        _: &(),
        _: &Connection,
        queue: &QueueHandle<Self>,
    ) {
        state.handle_registry_event(registry, event, queue);
    }
}

impl Dispatch<AndroidWlegl, ()> for WaylandState {
    fn event(
        _: &mut Self,
        _: &AndroidWlegl,
        _: android_wlegl::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<AndroidWleglHandle, ()> for WaylandState {
    fn event(
        _: &mut Self,
        _: &AndroidWleglHandle,
        _: android_wlegl_handle::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<wl_buffer::WlBuffer, WleglBuffer> for WaylandState {
    fn event(
        state: &mut Self,
        buffer: &wl_buffer::WlBuffer,
        event: wl_buffer::Event,
        _: &WleglBuffer,
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        state.handle_buffer_event(buffer, event);
    }
}

/// Forwards the backend's `Dispatch` impls from a host state type.
///
/// The host type must implement `AsMut<WaylandState>`. The registry is
/// expected to carry `()` as user data.
///
/// ```no_run
/// use hwshare_backend_wayland::WaylandState;
///
/// struct Host {
///     wayland: WaylandState,
/// }
///
/// impl AsMut<WaylandState> for Host {
///     fn as_mut(&mut self) -> &mut WaylandState {
///         &mut self.wayland
///     }
/// }
///
/// hwshare_backend_wayland::delegate_wlegl!(Host);
/// ```
#[macro_export]
macro_rules! delegate_wlegl {
    ($host:ty) => {
        impl $crate::__private::Dispatch<$crate::__private::wl_registry::WlRegistry, ()>
            for $host
        {
            fn event(
                state: &mut Self,
                registry: &$crate::__private::wl_registry::WlRegistry,
                event: $crate::__private::wl_registry::Event,
                _: &(),
                _: &$crate::__private::Connection,
                queue: &$crate::__private::QueueHandle<Self>,
            ) {
                <Self as ::core::convert::AsMut<$crate::WaylandState>>::as_mut(state)
                    .handle_registry_event(registry, event, queue);
            }
        }

        impl $crate::__private::Dispatch<$crate::protocol::android_wlegl::AndroidWlegl, ()>
            for $host
        {
            fn event(
                _: &mut Self,
                _: &$crate::protocol::android_wlegl::AndroidWlegl,
                _: $crate::protocol::android_wlegl::Event,
                _: &(),
                _: &$crate::__private::Connection,
                _: &$crate::__private::QueueHandle<Self>,
            ) {
            }
        }

        impl
            $crate::__private::Dispatch<
                $crate::protocol::android_wlegl_handle::AndroidWleglHandle,
                (),
            > for $host
        {
            fn event(
                _: &mut Self,
                _: &$crate::protocol::android_wlegl_handle::AndroidWleglHandle,
                _: $crate::protocol::android_wlegl_handle::Event,
                _: &(),
                _: &$crate::__private::Connection,
                _: &$crate::__private::QueueHandle<Self>,
            ) {
            }
        }

        impl
            $crate::__private::Dispatch<
                $crate::__private::wl_buffer::WlBuffer,
                $crate::WleglBuffer,
            > for $host
        {
            fn event(
                state: &mut Self,
                buffer: &$crate::__private::wl_buffer::WlBuffer,
                event: $crate::__private::wl_buffer::Event,
                _: &$crate::WleglBuffer,
                _: &$crate::__private::Connection,
                _: &$crate::__private::QueueHandle<Self>,
            ) {
                <Self as ::core::convert::AsMut<$crate::WaylandState>>::as_mut(state)
                    .handle_buffer_event(buffer, event);
            }
        }
    };
}

/// Owned-queue integration mode.
///
/// Keeps queue ownership inside the backend and exposes explicit dispatch
/// and queue-handle accessors.
#[derive(Debug)]
pub struct OwnedQueueMode {
    event_queue: EventQueue<WaylandState>,
    state: WaylandState,
    _registry: wl_registry::WlRegistry,
}

impl OwnedQueueMode {
    /// Creates the queue and requests the registry on `connection`.
    ///
    /// Globals arrive with the next dispatch; call [`Self::roundtrip`] before
    /// [`Self::attach`].
    #[must_use]
    pub fn new(connection: &Connection, config: &BackendConfig) -> Self {
        let event_queue = connection.new_event_queue();
        let registry = connection.display().get_registry(&event_queue.handle(), ());
        Self {
            event_queue,
            state: WaylandState::new(config),
            _registry: registry,
        }
    }

    /// Queue handle used for every backend object in this mode.
    #[must_use]
    pub fn queue_handle(&self) -> QueueHandle<WaylandState> {
        self.event_queue.handle()
    }

    /// Blocks until the display has processed every request sent so far,
    /// dispatching the events it produced.
    pub fn roundtrip(&mut self) -> Result<usize, DispatchError> {
        self.event_queue.roundtrip(&mut self.state)
    }

    /// Dispatches already-queued events without blocking or socket I/O.
    pub fn dispatch_pending(&mut self) -> Result<usize, DispatchError> {
        self.event_queue.dispatch_pending(&mut self.state)
    }

    /// Flushes requests, blocks for new events when needed, and dispatches.
    pub fn blocking_dispatch(&mut self) -> Result<usize, DispatchError> {
        self.event_queue.blocking_dispatch(&mut self.state)
    }

    /// Flushes pending outgoing requests to the socket.
    pub fn flush(&self) -> Result<(), WaylandError> {
        self.event_queue.flush()
    }

    /// Starts a synchronized socket read for poll-based loops.
    ///
    /// If this returns [`None`], dispatch queued events before trying again.
    #[must_use]
    pub fn prepare_read(&self) -> Option<ReadEventsGuard> {
        self.event_queue.prepare_read()
    }

    /// Hands the bound global to `binding`. See [`WaylandState::attach`].
    pub fn attach(&mut self, binding: &mut RegistryBinding) -> bool {
        let queue = self.event_queue.handle();
        self.state.attach(&queue, binding)
    }

    /// Backend state.
    #[must_use]
    pub fn state(&self) -> &WaylandState {
        &self.state
    }

    /// Backend state, mutably (for draining buffer events).
    pub fn state_mut(&mut self) -> &mut WaylandState {
        &mut self.state
    }
}

/// Embedded-state integration mode.
///
/// The host owns the event queue and dispatch loop; the backend keeps the
/// host queue handle for the objects it creates.
#[derive(Debug, Clone)]
pub struct EmbeddedStateMode<HostState> {
    queue_handle: QueueHandle<HostState>,
}

impl<HostState> EmbeddedStateMode<HostState>
where
    HostState: Dispatch<AndroidWleglHandle, ()>
        + Dispatch<wl_buffer::WlBuffer, WleglBuffer>
        + AsMut<WaylandState>
        + 'static,
{
    /// Wraps a host-owned queue handle.
    #[must_use]
    pub fn new(queue_handle: QueueHandle<HostState>) -> Self {
        Self { queue_handle }
    }

    /// Queue handle used for every backend object in this mode.
    #[must_use]
    pub fn queue_handle(&self) -> QueueHandle<HostState> {
        self.queue_handle.clone()
    }

    /// Hands the global bound in `host`'s state to `binding`.
    pub fn attach(&self, host: &mut HostState, binding: &mut RegistryBinding) -> bool {
        host.as_mut().attach(&self.queue_handle, binding)
    }
}
