//! Presence validators for headers, path parameters and query parameters.
//!
//! Names are fixed at construction. Header and query checks report the first
//! missing name; the path check reports every missing name at once.

use crate::context::Context;
use crate::middleware::{HookResult, HookSet, Middleware};
use serde_json::Value;
use trellis_core::{BoxFuture, PipelineError};

fn names<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    names.into_iter().map(Into::into).collect()
}

/// Requires every listed header to be present and non-empty.
#[derive(Debug, Clone)]
pub struct RequiredHeadersMiddleware {
    headers: Vec<String>,
}

impl RequiredHeadersMiddleware {
    /// Creates the validator. Header names are case-insensitive.
    #[must_use]
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            headers: names(headers),
        }
    }
}

impl Middleware for RequiredHeadersMiddleware {
    fn name(&self) -> &'static str {
        "required_headers"
    }

    fn hooks(&self) -> HookSet {
        HookSet::BEFORE
    }

    fn before<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, HookResult> {
        Box::pin(async move {
            let missing = self.headers.iter().find(|name| {
                ctx.request
                    .header(&name.to_ascii_lowercase())
                    .map_or(true, str::is_empty)
            });
            match missing {
                Some(name) => Err(PipelineError::validation(format!(
                    "Missing required header: {name}"
                ))),
                None => Ok(()),
            }
        })
    }
}

/// Requires every listed path parameter.
#[derive(Debug, Clone)]
pub struct RequiredPathParamsMiddleware {
    params: Vec<String>,
}

impl RequiredPathParamsMiddleware {
    /// Creates the validator.
    #[must_use]
    pub fn new<I, S>(params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            params: names(params),
        }
    }
}

impl Middleware for RequiredPathParamsMiddleware {
    fn name(&self) -> &'static str {
        "required_path_params"
    }

    fn hooks(&self) -> HookSet {
        HookSet::BEFORE
    }

    fn before<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, HookResult> {
        Box::pin(async move {
            let missing: Vec<&str> = self
                .params
                .iter()
                .filter(|name| ctx.request.param(name).map_or(true, str::is_empty))
                .map(String::as_str)
                .collect();
            if missing.is_empty() {
                Ok(())
            } else {
                Err(PipelineError::validation(format!(
                    "Missing path parameters: {}",
                    missing.join(", ")
                )))
            }
        })
    }
}

/// Requires every listed query parameter.
#[derive(Debug, Clone)]
pub struct RequiredQueryParamsMiddleware {
    params: Vec<String>,
}

impl RequiredQueryParamsMiddleware {
    /// Creates the validator.
    #[must_use]
    pub fn new<I, S>(params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            params: names(params),
        }
    }
}

impl Middleware for RequiredQueryParamsMiddleware {
    fn name(&self) -> &'static str {
        "required_query_params"
    }

    fn hooks(&self) -> HookSet {
        HookSet::BEFORE
    }

    fn before<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, HookResult> {
        Box::pin(async move {
            let missing = self.params.iter().find(|name| {
                match ctx.request.query.get(name.as_str()) {
                    None | Some(Value::Null) => true,
                    Some(Value::String(value)) => value.is_empty(),
                    Some(_) => false,
                }
            });
            match missing {
                Some(name) => Err(PipelineError::validation(format!(
                    "Missing required query parameter: {name}"
                ))),
                None => Ok(()),
            }
        })
    }
}
