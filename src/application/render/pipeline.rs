//! One render pass: hooks interleaved with the renderer's transforms.
//!
//! Stages run strictly one after another; the context is moved from each
//! stage into the next. Renderer failures abort the pass, while interceptor
//! and highlighter failures are logged and skipped.

use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    sync::Arc,
    time::Instant,
};

use metrics::{counter, histogram};
use tracing::{instrument, warn};

use crate::config::Settings;

use super::{
    highlight::{HighlightError, KeywordHighlighter},
    hooks::HookName,
    interceptor::InterceptorRegistry,
    interceptors::HookTrace,
    sanitize::{SanitizationPolicy, Sanitizer},
    service::ComrakRenderer,
    types::{RenderContext, RenderError, Renderer},
};

pub const METRIC_HIGHLIGHT_FAILURES: &str = "pagemark_highlight_failures_total";
pub const METRIC_RENDER_MS: &str = "pagemark_render_ms";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Hook(HookName),
    PreProcess,
    Process,
    PostProcess,
    Highlight,
    Publish,
}

const STAGES: [Stage; 12] = [
    Stage::Hook(HookName::PreRender),
    Stage::Hook(HookName::PrePreProcess),
    Stage::PreProcess,
    Stage::Hook(HookName::PostPreProcess),
    Stage::Process,
    Stage::Hook(HookName::PrePostProcess),
    Stage::PostProcess,
    Stage::Highlight,
    Stage::Hook(HookName::PostPostProcess),
    Stage::Hook(HookName::PreRenderHtml),
    Stage::Publish,
    Stage::Hook(HookName::PostRenderHtml),
];

/// Drives a render pass. Cheap to clone and safe to share between tasks;
/// every render owns its own [`RenderContext`].
#[derive(Clone)]
pub struct RenderPipeline {
    renderer: Arc<dyn Renderer>,
    interceptors: Arc<InterceptorRegistry>,
    highlighter: KeywordHighlighter,
}

impl RenderPipeline {
    pub fn new(
        renderer: Arc<dyn Renderer>,
        interceptors: Arc<InterceptorRegistry>,
        highlighter: KeywordHighlighter,
    ) -> Self {
        Self {
            renderer,
            interceptors,
            highlighter,
        }
    }

    /// Assemble the Comrak renderer, sanitiser, and built-in interceptors
    /// described by `settings`.
    pub fn from_settings(settings: &Settings) -> Self {
        let policy = Arc::new(SanitizationPolicy::from_settings(&settings.xss));
        let renderer = ComrakRenderer::new(Sanitizer::new(policy))
            .with_page_links(settings.render.page_links);

        let mut interceptors = InterceptorRegistry::new();
        register_default_interceptors(&mut interceptors, settings.render.trace_hooks);

        Self::new(
            Arc::new(renderer),
            Arc::new(interceptors),
            KeywordHighlighter::new(&settings.render.highlight_class),
        )
    }

    pub fn renderer(&self) -> &dyn Renderer {
        self.renderer.as_ref()
    }

    pub fn interceptors(&self) -> &InterceptorRegistry {
        &self.interceptors
    }

    /// Render without observing the publish point.
    pub async fn render(&self, context: RenderContext) -> Result<RenderContext, RenderError> {
        self.render_with(context, |_| {}).await
    }

    /// Render `context`, calling `publish` once the final HTML is ready and
    /// before the terminal `postRenderHtml` hook runs. Returns the context as
    /// it was published.
    #[instrument(skip_all, fields(page_path = %context.page_path))]
    pub async fn render_with<F>(
        &self,
        context: RenderContext,
        publish: F,
    ) -> Result<RenderContext, RenderError>
    where
        F: FnOnce(&RenderContext) + Send,
    {
        let started_at = Instant::now();
        let mut publish = Some(publish);
        let mut published = None;
        let mut context = context;

        for stage in STAGES {
            context = match stage {
                Stage::Hook(hook) => self.interceptors.run(hook, context).await,
                Stage::PreProcess => self.pre_process_stage(context)?,
                Stage::Process => self.process_stage(context)?,
                Stage::PostProcess => self.post_process_stage(context)?,
                Stage::Highlight => self.highlight_stage(context),
                Stage::Publish => {
                    if let Some(publish) = publish.take() {
                        publish(&context);
                    }
                    published = Some(context.clone());
                    context
                }
            };
        }

        histogram!(METRIC_RENDER_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);

        Ok(published.unwrap_or(context))
    }

    fn pre_process_stage(&self, mut context: RenderContext) -> Result<RenderContext, RenderError> {
        context.markdown = self
            .renderer
            .pre_process(&context.markdown)
            .inspect_err(|err| log_transform_failure("preProcess", &context, err))?;
        Ok(context)
    }

    fn process_stage(&self, mut context: RenderContext) -> Result<RenderContext, RenderError> {
        let html = self
            .renderer
            .process(&context.markdown)
            .inspect_err(|err| log_transform_failure("process", &context, err))?;
        context.parsed_html = Some(html);
        Ok(context)
    }

    fn post_process_stage(&self, mut context: RenderContext) -> Result<RenderContext, RenderError> {
        let html = self
            .renderer
            .post_process(context.parsed_html(), context.dom_anchor.as_ref())
            .inspect_err(|err| log_transform_failure("postProcess", &context, err))?;
        context.parsed_html = Some(html);
        Ok(context)
    }

    fn highlight_stage(&self, mut context: RenderContext) -> RenderContext {
        let Some(query) = context
            .highlight_query
            .as_deref()
            .filter(|query| !query.trim().is_empty())
        else {
            return context;
        };

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            self.highlighter.highlight(context.parsed_html(), query)
        }))
        .unwrap_or_else(|_| {
            Err(HighlightError::Matcher {
                keyword: query.to_string(),
                message: "highlighter panicked".to_string(),
            })
        });

        match outcome {
            Ok(html) => context.parsed_html = Some(html),
            Err(error) => {
                warn!(
                    target = "application::render::highlight",
                    page_path = %context.page_path,
                    error = %error,
                    "highlighting skipped"
                );
                counter!(METRIC_HIGHLIGHT_FAILURES).increment(1);
            }
        }
        context
    }
}

/// Register the built-in interceptors the settings turn on.
pub fn register_default_interceptors(registry: &mut InterceptorRegistry, trace_hooks: bool) {
    if trace_hooks {
        registry.register(Arc::new(HookTrace), HookName::ALL);
    }
}

fn log_transform_failure(stage: &'static str, context: &RenderContext, error: &RenderError) {
    warn!(
        target = "application::render::pipeline",
        stage,
        page_path = %context.page_path,
        error = %error,
        "renderer transform failed"
    );
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::application::render::{
        interceptor::{Interceptor, InterceptorError},
        types::DomAnchor,
    };

    /// Renderer that records transform calls and wraps text predictably.
    #[derive(Default)]
    struct EchoRenderer {
        calls: Mutex<Vec<&'static str>>,
        fail_process: bool,
    }

    impl Renderer for EchoRenderer {
        fn pre_process(&self, markdown: &str) -> Result<String, RenderError> {
            self.calls.lock().unwrap().push("preProcess");
            Ok(markdown.trim().to_string())
        }

        fn process(&self, markdown: &str) -> Result<String, RenderError> {
            self.calls.lock().unwrap().push("process");
            if self.fail_process {
                return Err(RenderError::markdown("broken"));
            }
            Ok(format!("<p>{markdown}</p>"))
        }

        fn post_process(
            &self,
            html: &str,
            anchor: Option<&DomAnchor>,
        ) -> Result<String, RenderError> {
            self.calls.lock().unwrap().push("postProcess");
            Ok(match anchor {
                Some(anchor) => format!("<div id=\"{anchor}\">{html}</div>"),
                None => html.to_string(),
            })
        }
    }

    struct Recorder {
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Interceptor for Recorder {
        async fn process(
            &self,
            hook: HookName,
            context: RenderContext,
        ) -> Result<RenderContext, InterceptorError> {
            self.log.lock().unwrap().push(hook.to_string());
            Ok(context)
        }
    }

    struct Suffix;

    #[async_trait]
    impl Interceptor for Suffix {
        async fn process(
            &self,
            hook: HookName,
            mut context: RenderContext,
        ) -> Result<RenderContext, InterceptorError> {
            match hook {
                HookName::PrePreProcess => context.markdown.push_str(" pre"),
                HookName::PostPostProcess | HookName::PostRenderHtml => {
                    let html = format!("{}<!--{hook}-->", context.parsed_html());
                    context.parsed_html = Some(html);
                }
                _ => {}
            }
            Ok(context)
        }
    }

    fn pipeline(renderer: EchoRenderer, registry: InterceptorRegistry) -> RenderPipeline {
        RenderPipeline::new(
            Arc::new(renderer),
            Arc::new(registry),
            KeywordHighlighter::default(),
        )
    }

    #[tokio::test]
    async fn hooks_run_in_declared_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = InterceptorRegistry::new();
        registry.register(Arc::new(Recorder { log: log.clone() }), HookName::ALL);

        pipeline(EchoRenderer::default(), registry)
            .render(RenderContext::new("/p", "text"))
            .await
            .expect("render succeeds");

        assert_eq!(
            log.lock().unwrap().as_slice(),
            [
                "preRender",
                "prePreProcess",
                "postPreProcess",
                "prePostProcess",
                "postPostProcess",
                "preRenderHtml",
                "postRenderHtml",
            ]
        );
    }

    #[tokio::test]
    async fn transforms_run_once_each_in_order() {
        let renderer = Arc::new(EchoRenderer::default());
        let pipeline = RenderPipeline::new(
            renderer.clone(),
            Arc::new(InterceptorRegistry::new()),
            KeywordHighlighter::default(),
        );

        let context = RenderContext::new("/p", "  hello  ").with_dom_anchor(DomAnchor::new("body"));
        let rendered = pipeline.render(context).await.expect("render succeeds");

        assert_eq!(rendered.parsed_html(), "<div id=\"body\"><p>hello</p></div>");
        assert_eq!(
            renderer.calls.lock().unwrap().as_slice(),
            ["preProcess", "process", "postProcess"]
        );
    }

    #[tokio::test]
    async fn publish_sees_final_html_and_terminal_hook_is_discarded() {
        let mut registry = InterceptorRegistry::new();
        registry.register(
            Arc::new(Suffix),
            [
                HookName::PrePreProcess,
                HookName::PostPostProcess,
                HookName::PostRenderHtml,
            ],
        );

        let published = Mutex::new(None);
        let rendered = pipeline(EchoRenderer::default(), registry)
            .render_with(RenderContext::new("/p", "text"), |context| {
                *published.lock().unwrap() = Some(context.parsed_html().to_string());
            })
            .await
            .expect("render succeeds");

        let expected = "<p>text pre</p><!--postPostProcess-->";
        assert_eq!(published.lock().unwrap().as_deref(), Some(expected));
        assert_eq!(rendered.parsed_html(), expected);
    }

    #[tokio::test]
    async fn highlight_runs_after_post_process() {
        let context = RenderContext::new("/p", "hello world").with_highlight_query("world");
        let rendered = pipeline(EchoRenderer::default(), InterceptorRegistry::new())
            .render(context)
            .await
            .expect("render succeeds");

        assert_eq!(
            rendered.parsed_html(),
            "<p>hello <em class=\"highlighted\">world</em></p>"
        );
    }

    #[tokio::test]
    async fn transform_failure_reaches_the_caller() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = InterceptorRegistry::new();
        registry.register(Arc::new(Recorder { log: log.clone() }), HookName::ALL);
        let renderer = EchoRenderer {
            fail_process: true,
            ..EchoRenderer::default()
        };

        let result = pipeline(renderer, registry)
            .render(RenderContext::new("/p", "text"))
            .await;

        assert!(matches!(result, Err(RenderError::Markdown { .. })));
        assert_eq!(
            log.lock().unwrap().as_slice(),
            ["preRender", "prePreProcess", "postPreProcess"]
        );
    }

    #[tokio::test]
    async fn traced_pipeline_links_pages_but_not_code() {
        let mut registry = InterceptorRegistry::new();
        register_default_interceptors(&mut registry, true);
        let policy = Arc::new(SanitizationPolicy::recommended());
        let pipeline = RenderPipeline::new(
            Arc::new(ComrakRenderer::new(Sanitizer::new(policy))),
            Arc::new(registry),
            KeywordHighlighter::default(),
        );

        let rendered = pipeline
            .render(RenderContext::new("/p", "see [/docs] and `[/code]`"))
            .await
            .expect("render succeeds");

        assert!(rendered.parsed_html().contains("href=\"/docs\""));
        assert!(rendered.parsed_html().contains("<code>[/code]</code>"));
        assert!(rendered.extensions.is_empty());
    }
}
