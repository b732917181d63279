//! Pluggable extension points of the render pipeline.
//!
//! Interceptors are registered once at startup against one or more hooks and
//! then shared read-only by every render. A hook runs its applicable
//! interceptors one after another; each receives the context produced by the
//! previous one. Failures are contained: a failing interceptor is logged and
//! skipped, and the chain continues with the last good context.

use std::{
    any::Any,
    collections::{BTreeSet, HashMap},
    fmt,
    panic::AssertUnwindSafe,
    sync::Arc,
};

use async_trait::async_trait;
use futures::FutureExt;
use metrics::counter;
use thiserror::Error;
use tracing::{debug, warn};

use super::{hooks::HookName, types::RenderContext};

pub const METRIC_INTERCEPTOR_FAILURES: &str = "pagemark_interceptor_failures_total";

#[derive(Debug, Clone, Error)]
pub enum InterceptorError {
    #[error("interceptor failed: {message}")]
    Failed { message: String },
    #[error("interceptor panicked: {message}")]
    Panicked { message: String },
}

impl InterceptorError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}

/// A unit of logic attached to one or more hooks.
#[async_trait]
pub trait Interceptor: Send + Sync {
    /// Label used in logs and metrics.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Whether this interceptor should run for `hook` given the incoming context.
    fn is_applicable(&self, _hook: HookName, _context: &RenderContext) -> bool {
        true
    }

    async fn process(
        &self,
        hook: HookName,
        context: RenderContext,
    ) -> Result<RenderContext, InterceptorError>;
}

/// Interceptors grouped by hook, in registration order.
#[derive(Default, Clone)]
pub struct InterceptorRegistry {
    hooks: HashMap<HookName, Vec<Arc<dyn Interceptor>>>,
}

impl fmt::Debug for InterceptorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for hook in HookName::ALL {
            let names: Vec<&str> = self.interceptors(hook).iter().map(|i| i.name()).collect();
            if !names.is_empty() {
                map.entry(&hook.as_str(), &names);
            }
        }
        map.finish()
    }
}

impl InterceptorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `interceptor` to each of `hooks`. Repeated hook names in one call
    /// register it once.
    pub fn register(
        &mut self,
        interceptor: Arc<dyn Interceptor>,
        hooks: impl IntoIterator<Item = HookName>,
    ) -> &mut Self {
        let hooks: BTreeSet<HookName> = hooks.into_iter().collect();
        for hook in hooks {
            debug!(
                target = "application::render::interceptor",
                hook = %hook,
                interceptor = interceptor.name(),
                "interceptor registered"
            );
            self.hooks
                .entry(hook)
                .or_default()
                .push(Arc::clone(&interceptor));
        }
        self
    }

    pub fn interceptors(&self, hook: HookName) -> &[Arc<dyn Interceptor>] {
        self.hooks.get(&hook).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.values().all(Vec::is_empty)
    }

    /// Run every interceptor registered for `hook` that reports itself
    /// applicable to the incoming context.
    pub async fn run(&self, hook: HookName, context: RenderContext) -> RenderContext {
        let applicable: Vec<&Arc<dyn Interceptor>> = self
            .interceptors(hook)
            .iter()
            .filter(|interceptor| interceptor.is_applicable(hook, &context))
            .collect();

        let mut current = context;
        for interceptor in applicable {
            let attempt = AssertUnwindSafe(interceptor.process(hook, current.clone()))
                .catch_unwind()
                .await;

            match attempt {
                Ok(Ok(next)) => current = next,
                Ok(Err(error)) => record_failure(hook, interceptor.name(), &current, &error),
                Err(payload) => {
                    let error = InterceptorError::Panicked {
                        message: panic_message(payload.as_ref()),
                    };
                    record_failure(hook, interceptor.name(), &current, &error);
                }
            }
        }

        current
    }
}

fn record_failure(hook: HookName, name: &str, context: &RenderContext, error: &InterceptorError) {
    warn!(
        target = "application::render::interceptor",
        hook = %hook,
        interceptor = name,
        page_path = %context.page_path,
        error = %error,
        "interceptor failed; continuing with previous context"
    );
    counter!(
        METRIC_INTERCEPTOR_FAILURES,
        "hook" => hook.as_str(),
        "interceptor" => name.to_string()
    )
    .increment(1);
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
