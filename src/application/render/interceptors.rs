//! Interceptors shipped with the crate.

use async_trait::async_trait;
use tracing::debug;

use super::{
    hooks::HookName,
    interceptor::{Interceptor, InterceptorError},
    types::RenderContext,
};

/// Emits a debug event for every hook it is attached to.
#[derive(Debug, Default, Clone, Copy)]
pub struct HookTrace;

#[async_trait]
impl Interceptor for HookTrace {
    fn name(&self) -> &str {
        "hook-trace"
    }

    async fn process(
        &self,
        hook: HookName,
        context: RenderContext,
    ) -> Result<RenderContext, InterceptorError> {
        debug!(
            target = "application::render::hooks",
            hook = %hook,
            page_path = %context.page_path,
            markdown_bytes = context.markdown.len(),
            html_bytes = context.parsed_html().len(),
            "hook reached"
        );
        Ok(context)
    }
}
