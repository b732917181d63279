//! Interceptable markdown rendering.
//!
//! A [`RenderPipeline`] moves a [`RenderContext`] through the renderer's
//! three transforms, calling registered [`Interceptor`]s at seven named
//! hooks in between. Sanitisation runs inside the renderer's post-process
//! transform; keyword highlighting runs right after it.

mod highlight;
mod hooks;
mod interceptor;
mod interceptors;
mod pipeline;
mod runtime;
mod sanitize;
mod service;
mod types;

pub use highlight::{DEFAULT_HIGHLIGHT_CLASS, HighlightError, KeywordHighlighter};
pub use hooks::{HookName, UnknownHook};
pub use interceptor::{Interceptor, InterceptorError, InterceptorRegistry};
pub use interceptors::HookTrace;
pub use pipeline::{RenderPipeline, register_default_interceptors};
pub use runtime::{RenderGenerations, RenderTicket};
pub use sanitize::{
    DEFAULT_CLEAN_CONTENT_TAGS, GENERIC_ATTRIBUTES_KEY, PolicyError, SanitizationPolicy, Sanitizer,
};
pub use service::ComrakRenderer;
pub use types::{DomAnchor, RenderContext, RenderError, Renderer};

/// Metric names emitted by the render pipeline.
pub mod metric_names {
    pub use super::interceptor::METRIC_INTERCEPTOR_FAILURES as INTERCEPTOR_FAILURES;
    pub use super::pipeline::{
        METRIC_HIGHLIGHT_FAILURES as HIGHLIGHT_FAILURES, METRIC_RENDER_MS as RENDER_MS,
    };
}
