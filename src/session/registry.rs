use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use super::{DISCARD_BACKEND, DiscardSession, Session, SessionFactory};
use crate::config::ClientSection;
use crate::gateway::GatewayHandle;
use crate::net::ClientStream;

// -----------------------------------------------------------------------------
// ----- SessionBackendRegistry ------------------------------------------------

/// Named session backends. Filled once at process start, then shared
/// read-only with the gateway.
#[derive(Default)]
pub struct SessionBackendRegistry {
    backends: HashMap<String, Arc<dyn SessionFactory>>,
}

// -----------------------------------------------------------------------------
// ----- SessionBackendRegistry: Static ----------------------------------------

impl SessionBackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the backends that ship with the gateway.
    pub fn with_builtin_backends() -> Self {
        let mut registry = Self::new();
        registry.backends.insert(
            DISCARD_BACKEND.to_string(),
            Arc::new(DiscardSession::factory),
        );
        registry
    }
}

// -----------------------------------------------------------------------------
// ----- SessionBackendRegistry: Public ----------------------------------------

impl SessionBackendRegistry {
    pub fn register(
        &mut self,
        name: impl Into<String>,
        factory: impl SessionFactory,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        if self.backends.contains_key(&name) {
            return Err(RegistryError::DuplicateBackend { name });
        }

        self.backends.insert(name, Arc::new(factory));
        Ok(())
    }

    pub fn has_backend(&self, name: &str) -> bool {
        self.backends.contains_key(name)
    }

    pub fn backend_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.backends.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn instantiate(
        &self,
        name: &str,
        config: Arc<ClientSection>,
        gateway: GatewayHandle,
        stream: ClientStream,
    ) -> Result<Box<dyn Session>, RegistryError> {
        let factory = self
            .backends
            .get(name)
            .ok_or_else(|| RegistryError::UnknownBackend {
                name: name.to_string(),
            })?;

        Ok(factory.instantiate(config, gateway, stream))
    }
}

impl fmt::Debug for SessionBackendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionBackendRegistry")
            .field("backends", &self.backend_names())
            .finish()
    }
}

// -----------------------------------------------------------------------------
// ----- Errors ----------------------------------------------------------------

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("a client handler named '{name}' is already registered")]
    DuplicateBackend { name: String },

    #[error("no client handler exists for client type '{name}'")]
    UnknownBackend { name: String },
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
