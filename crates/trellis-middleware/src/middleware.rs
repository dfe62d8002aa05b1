//! Core middleware trait and types.
//!
//! A [`Middleware`] is a named bundle of up to three lifecycle hooks:
//!
//! | Hook | Runs | Order |
//! |------|------|-------|
//! | `before` | before the terminal handler | registration order |
//! | `after` | after a successful handler | registration order |
//! | `on_error` | after any failure | registration order, until one writes a response |
//!
//! Every hook is optional. A middleware declares which ones it implements
//! through [`Middleware::hooks`], and the executor never calls a hook that is
//! not declared.
//!
//! Middlewares are built once and shared by every request a pipeline serves,
//! so they hold configuration only. Per-request state lives in the
//! [`Context`].
//!
//! # Example
//!
//! ```
//! use trellis_middleware::{BoxFuture, Context, HookResult, HookSet, Middleware};
//! use serde_json::json;
//!
//! struct Channel(&'static str);
//!
//! impl Middleware for Channel {
//!     fn name(&self) -> &'static str {
//!         "channel"
//!     }
//!
//!     fn hooks(&self) -> HookSet {
//!         HookSet::BEFORE
//!     }
//!
//!     fn before<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, HookResult> {
//!         Box::pin(async move {
//!             ctx.business_data.insert("channel".to_string(), json!(self.0));
//!             Ok(())
//!         })
//!     }
//! }
//! ```

use crate::context::Context;
use std::fmt;
use std::ops::BitOr;
use std::sync::Arc;
use trellis_core::{BoxFuture, PipelineError, PipelineResult};

/// What a hook or terminal handler returns.
pub type HookResult = PipelineResult<()>;

/// The set of hooks a middleware implements.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct HookSet(u8);

impl HookSet {
    /// No hooks.
    pub const NONE: Self = Self(0);
    /// The `before` hook.
    pub const BEFORE: Self = Self(1);
    /// The `after` hook.
    pub const AFTER: Self = Self(1 << 1);
    /// The `on_error` hook.
    pub const ON_ERROR: Self = Self(1 << 2);
    /// All three hooks.
    pub const ALL: Self = Self(0b111);

    /// Returns `true` if every hook in `other` is in `self`.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `true` if no hook is present.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns the union of both sets.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl BitOr for HookSet {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl fmt::Debug for HookSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut set = f.debug_set();
        if self.contains(Self::BEFORE) {
            set.entry(&"before");
        }
        if self.contains(Self::AFTER) {
            set.entry(&"after");
        }
        if self.contains(Self::ON_ERROR) {
            set.entry(&"on_error");
        }
        set.finish()
    }
}

/// The middleware contract.
///
/// Implement [`hooks`](Self::hooks) and the hooks it declares; the others
/// keep their no-op defaults.
///
/// # Invariants
///
/// - Hooks MUST NOT keep per-request state in `self`
/// - `on_error` SHOULD write a response through `ctx.response.send` or
///   return an error so the next handler (or the fallback) can
pub trait Middleware: Send + Sync + 'static {
    /// Returns the name of this middleware, used in logs and reports.
    fn name(&self) -> &'static str;

    /// Returns the hooks this middleware implements.
    fn hooks(&self) -> HookSet;

    /// Runs before the terminal handler. An error skips every remaining
    /// `before` hook and the handler.
    fn before<'a>(&'a self, _ctx: &'a mut Context) -> BoxFuture<'a, HookResult> {
        Box::pin(async { Ok(()) })
    }

    /// Runs after the terminal handler succeeded.
    fn after<'a>(&'a self, _ctx: &'a mut Context) -> BoxFuture<'a, HookResult> {
        Box::pin(async { Ok(()) })
    }

    /// Runs when any earlier phase failed.
    fn on_error<'a>(
        &'a self,
        _error: &'a PipelineError,
        _ctx: &'a mut Context,
    ) -> BoxFuture<'a, HookResult> {
        Box::pin(async { Ok(()) })
    }
}

type ContextHook = Arc<dyn for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HookResult> + Send + Sync>;

type ErrorHook = Arc<
    dyn for<'a> Fn(&'a PipelineError, &'a mut Context) -> BoxFuture<'a, HookResult> + Send + Sync,
>;

/// A middleware assembled from closures.
///
/// Only the hooks that were supplied are declared, so a table with just a
/// `before` closure is a before-only middleware.
///
/// # Example
///
/// ```
/// use trellis_middleware::{HookSet, HookTable, Middleware};
///
/// let table = HookTable::new("mark").before(|ctx| {
///     Box::pin(async move {
///         ctx.business_data.insert("marked".to_string(), true.into());
///         Ok(())
///     })
/// });
///
/// assert_eq!(table.hooks(), HookSet::BEFORE);
/// ```
#[derive(Clone)]
pub struct HookTable {
    name: &'static str,
    before: Option<ContextHook>,
    after: Option<ContextHook>,
    on_error: Option<ErrorHook>,
}

impl HookTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            before: None,
            after: None,
            on_error: None,
        }
    }

    /// Sets the `before` hook.
    #[must_use]
    pub fn before<F>(mut self, hook: F) -> Self
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HookResult> + Send + Sync + 'static,
    {
        self.before = Some(Arc::new(hook));
        self
    }

    /// Sets the `after` hook.
    #[must_use]
    pub fn after<F>(mut self, hook: F) -> Self
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HookResult> + Send + Sync + 'static,
    {
        self.after = Some(Arc::new(hook));
        self
    }

    /// Sets the `on_error` hook.
    #[must_use]
    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: for<'a> Fn(&'a PipelineError, &'a mut Context) -> BoxFuture<'a, HookResult>
            + Send
            + Sync
            + 'static,
    {
        self.on_error = Some(Arc::new(hook));
        self
    }
}

impl fmt::Debug for HookTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookTable")
            .field("name", &self.name)
            .field("hooks", &self.hooks())
            .finish()
    }
}

impl Middleware for HookTable {
    fn name(&self) -> &'static str {
        self.name
    }

    fn hooks(&self) -> HookSet {
        let mut hooks = HookSet::NONE;
        if self.before.is_some() {
            hooks = hooks | HookSet::BEFORE;
        }
        if self.after.is_some() {
            hooks = hooks | HookSet::AFTER;
        }
        if self.on_error.is_some() {
            hooks = hooks | HookSet::ON_ERROR;
        }
        hooks
    }

    fn before<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, HookResult> {
        match &self.before {
            Some(hook) => hook(ctx),
            None => Box::pin(async { Ok(()) }),
        }
    }

    fn after<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, HookResult> {
        match &self.after {
            Some(hook) => hook(ctx),
            None => Box::pin(async { Ok(()) }),
        }
    }

    fn on_error<'a>(
        &'a self,
        error: &'a PipelineError,
        ctx: &'a mut Context,
    ) -> BoxFuture<'a, HookResult> {
        match &self.on_error {
            Some(hook) => hook(error, ctx),
            None => Box::pin(async { Ok(()) }),
        }
    }
}
