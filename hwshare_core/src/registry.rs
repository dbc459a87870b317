// Copyright 2026 the Hwshare Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Binding to the remote buffer-allocation protocol.
//!
//! The display process advertises the protocol (`android_wlegl` on
//! Wayland) during registry enumeration. The host asks
//! [`RegistryBinding::matches`] for each advertised interface and, on a
//! match, binds it and hands the result to [`RegistryBinding::bind`].
//!
//! Capability negotiation is one-shot: surfaces requested before the binding
//! exists use the generic path and are never upgraded later.

use core::fmt;

use crate::codec::{BufferDescriptor, RemoteBufferParams};
use crate::error::{ProtocolError, ProtocolUnavailable};

/// Identity of a remote-visible buffer object (its protocol object id).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransportBuffer(pub u32);

impl fmt::Debug for TransportBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransportBuffer({})", self.0)
    }
}

/// Remote buffer construction, as exposed by the bound protocol object.
pub trait RemoteAllocator {
    /// Builds a remote-visible buffer from `params` and a serialized handle.
    ///
    /// Takes ownership of the descriptor's fds; they are closed once sent.
    fn create_buffer(
        &mut self,
        params: &RemoteBufferParams,
        descriptor: BufferDescriptor,
    ) -> Result<TransportBuffer, ProtocolError>;

    /// Destroys a buffer returned by [`create_buffer`](Self::create_buffer),
    /// telling the display process to drop its reference.
    fn destroy_buffer(&mut self, buffer: TransportBuffer);
}

/// Holds the remote-allocation binding once the protocol has been found.
pub struct RegistryBinding {
    interface: &'static str,
    remote: Option<Box<dyn RemoteAllocator>>,
}

impl fmt::Debug for RegistryBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryBinding")
            .field("interface", &self.interface)
            .field("bound", &self.remote.is_some())
            .finish()
    }
}

impl RegistryBinding {
    /// Creates an unbound binding for the protocol named `interface`.
    #[must_use]
    pub const fn new(interface: &'static str) -> Self {
        Self {
            interface,
            remote: None,
        }
    }

    /// Protocol interface name this binding looks for.
    #[must_use]
    pub const fn interface(&self) -> &'static str {
        self.interface
    }

    /// Returns `true` if an advertised interface is the one to bind.
    ///
    /// Always `false` once bound, so a second advertisement is ignored.
    #[must_use]
    pub fn matches(&self, advertised: &str) -> bool {
        self.remote.is_none() && advertised == self.interface
    }

    /// Stores the bound protocol object.
    ///
    /// Returns `false` and drops `remote` if a binding already exists.
    pub fn bind(&mut self, remote: Box<dyn RemoteAllocator>) -> bool {
        if self.remote.is_some() {
            log::warn!("{} advertised twice, keeping first binding", self.interface);
            return false;
        }
        log::debug!("bound remote allocator {}", self.interface);
        self.remote = Some(remote);
        true
    }

    /// Whether the protocol has been bound.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.remote.is_some()
    }

    /// The bound remote allocator.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolUnavailable`] before [`bind`](Self::bind).
    pub fn remote(&mut self) -> Result<&mut dyn RemoteAllocator, ProtocolUnavailable> {
        match &mut self.remote {
            Some(remote) => Ok(remote.as_mut()),
            None => Err(ProtocolUnavailable),
        }
    }

    /// Drops the binding.
    pub fn unbind(&mut self) {
        self.remote = None;
    }
}
