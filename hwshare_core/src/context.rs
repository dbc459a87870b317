// Copyright 2026 the Hwshare Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Backend context.
//!
//! A [`BackendContext`] holds everything shared by the allocator, codec and
//! binder: the platform capabilities, the remote-protocol binding and the
//! configuration. It is created once when the backend initializes and
//! dropped by [`SurfaceManager::shutdown`](crate::manager::SurfaceManager::shutdown).

use core::fmt;

use crate::allocator::NativeBufferApi;
use crate::binder::GpuApi;
use crate::config::BackendConfig;
use crate::error::InitError;
use crate::registry::RegistryBinding;

/// Platform capabilities resolved once at startup.
pub struct Capabilities {
    /// Native-buffer entry points.
    pub buffers: Box<dyn NativeBufferApi>,
    /// GPU entry points over a context owned by the implementation.
    pub gpu: Box<dyn GpuApi>,
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capabilities").finish_non_exhaustive()
    }
}

/// Shared state of one backend instance.
pub struct BackendContext {
    pub(crate) buffers: Box<dyn NativeBufferApi>,
    pub(crate) gpu: Box<dyn GpuApi>,
    pub(crate) registry: RegistryBinding,
    pub(crate) config: BackendConfig,
}

impl fmt::Debug for BackendContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendContext")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl BackendContext {
    /// Creates a context from already resolved capabilities.
    ///
    /// The registry binding starts unbound and looks for
    /// `config.protocol_name`.
    #[must_use]
    pub fn new(config: BackendConfig, capabilities: Capabilities) -> Self {
        let Capabilities { buffers, gpu } = capabilities;
        Self {
            buffers,
            gpu,
            registry: RegistryBinding::new(config.protocol_name),
            config,
        }
    }

    /// Resolves capabilities with `load` and creates the context.
    ///
    /// # Errors
    ///
    /// Returns the loader's [`InitError`]. The host should treat the backend
    /// as unavailable and use another one.
    pub fn init<F>(config: BackendConfig, load: F) -> Result<Self, InitError>
    where
        F: FnOnce(&BackendConfig) -> Result<Capabilities, InitError>,
    {
        match load(&config) {
            Ok(capabilities) => {
                log::debug!("backend initialized ({config:?})");
                Ok(Self::new(config, capabilities))
            }
            Err(err) => {
                log::error!("backend initialization failed: {err}");
                Err(err)
            }
        }
    }

    /// Configuration the context was created with.
    #[must_use]
    pub const fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// The remote-protocol binding.
    #[must_use]
    pub const fn registry(&self) -> &RegistryBinding {
        &self.registry
    }

    /// The remote-protocol binding, for registry glue to bind into.
    pub fn registry_mut(&mut self) -> &mut RegistryBinding {
        &mut self.registry
    }
}
