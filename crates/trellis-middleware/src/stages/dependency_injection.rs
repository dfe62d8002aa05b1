//! Dependency injection middleware.
//!
//! Attaches the process-wide service [`Container`] to every context. The
//! container is built once at startup; requests only read from it.

use crate::context::Context;
use crate::middleware::{HookResult, HookSet, Middleware};
use std::sync::Arc;
use trellis_core::di::Container;
use trellis_core::BoxFuture;

/// Attaches a shared [`Container`] to `ctx.container`.
///
/// Register it before any middleware or handler that calls
/// [`Context::resolve`].
#[derive(Debug, Clone)]
pub struct DependencyInjectionMiddleware {
    container: Arc<Container>,
}

impl DependencyInjectionMiddleware {
    /// Creates the middleware around a built container.
    #[must_use]
    pub fn new(container: Arc<Container>) -> Self {
        Self { container }
    }
}

impl Middleware for DependencyInjectionMiddleware {
    fn name(&self) -> &'static str {
        "dependency_injection"
    }

    fn hooks(&self) -> HookSet {
        HookSet::BEFORE
    }

    fn before<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, HookResult> {
        Box::pin(async move {
            ctx.set_container(Arc::clone(&self.container));
            Ok(())
        })
    }
}
