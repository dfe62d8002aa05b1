//! Process-wide service registry.
//!
//! Services are registered once at startup through a [`ContainerBuilder`];
//! the frozen [`Container`] is shared by `Arc` with every request and only
//! offers lookups. Request-time code cannot register or replace services.
//!
//! # Example
//!
//! ```
//! use trellis_core::di::Container;
//! use std::sync::Arc;
//!
//! struct ChatService {
//!     model: String,
//! }
//!
//! let container = Container::builder()
//!     .register(Arc::new(ChatService { model: "mock".to_string() }))
//!     .build();
//!
//! let chat: Arc<ChatService> = container.resolve().unwrap();
//! assert_eq!(chat.model, "mock");
//! ```

use crate::PipelineError;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// A service lookup failed.
#[derive(Debug, Clone, Error)]
#[error("failed to resolve {type_name}: service not registered")]
pub struct InjectionError {
    /// The type name that could not be resolved.
    pub type_name: &'static str,
}

impl InjectionError {
    /// Creates an error for an unregistered service type.
    #[must_use]
    pub fn not_registered<T>() -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
        }
    }
}

impl From<InjectionError> for PipelineError {
    fn from(err: InjectionError) -> Self {
        Self::internal_with_source("dependency resolution failed", err)
    }
}

/// Accumulates services before the container is frozen.
#[derive(Default)]
pub struct ContainerBuilder {
    services: HashMap<TypeId, (&'static str, Arc<dyn Any + Send + Sync>)>,
}

impl ContainerBuilder {
    /// Registers a service, replacing any earlier registration of the same type.
    #[must_use]
    pub fn register<T: Send + Sync + 'static>(mut self, service: Arc<T>) -> Self {
        let previous = self
            .services
            .insert(TypeId::of::<T>(), (std::any::type_name::<T>(), service));
        if previous.is_some() {
            tracing::debug!(service = std::any::type_name::<T>(), "replacing registered service");
        }
        self
    }

    /// Freezes the registry.
    #[must_use]
    pub fn build(self) -> Arc<Container> {
        Arc::new(Container {
            services: self.services,
        })
    }
}

/// A frozen, read-only service registry.
///
/// The container is `Send + Sync` and is shared across concurrent requests.
pub struct Container {
    services: HashMap<TypeId, (&'static str, Arc<dyn Any + Send + Sync>)>,
}

impl Container {
    /// Starts building a container.
    #[must_use]
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::default()
    }

    /// Returns an empty container.
    #[must_use]
    pub fn empty() -> Arc<Self> {
        ContainerBuilder::default().build()
    }

    /// Resolves a service by type.
    #[must_use]
    pub fn resolve<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.services
            .get(&TypeId::of::<T>())
            .and_then(|(_, service)| Arc::clone(service).downcast::<T>().ok())
    }

    /// Resolves a service or reports which type was missing.
    pub fn resolve_required<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, InjectionError> {
        self.resolve().ok_or_else(InjectionError::not_registered::<T>)
    }

    /// Checks if a service is registered.
    #[must_use]
    pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
        self.services.contains_key(&TypeId::of::<T>())
    }

    /// Returns the number of registered services.
    #[must_use]
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Returns `true` if no services are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.services.values().map(|(name, _)| *name).collect();
        names.sort_unstable();
        f.debug_struct("Container").field("services", &names).finish()
    }
}
