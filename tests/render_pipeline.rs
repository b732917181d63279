use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pagemark::application::render::{
    ComrakRenderer, DomAnchor, HookName, Interceptor, InterceptorError, InterceptorRegistry,
    KeywordHighlighter, RenderContext, RenderGenerations, RenderPipeline, SanitizationPolicy,
    Sanitizer, register_default_interceptors,
};
use pagemark::config::{Settings, XssPreset, XssSettings};

fn default_pipeline() -> RenderPipeline {
    RenderPipeline::from_settings(&Settings::default())
}

fn pipeline_with(extra: impl FnOnce(&mut InterceptorRegistry)) -> RenderPipeline {
    let mut registry = InterceptorRegistry::new();
    register_default_interceptors(&mut registry, false);
    extra(&mut registry);

    let sanitizer = Sanitizer::new(Arc::new(SanitizationPolicy::recommended()));
    RenderPipeline::new(
        Arc::new(ComrakRenderer::new(sanitizer)),
        Arc::new(registry),
        KeywordHighlighter::default(),
    )
}

async fn render(pipeline: &RenderPipeline, markdown: &str) -> String {
    pipeline
        .render(RenderContext::new("/test", markdown))
        .await
        .expect("render succeeds")
        .parsed_html()
        .to_string()
}

struct AppendParagraph;

#[async_trait]
impl Interceptor for AppendParagraph {
    async fn process(
        &self,
        _hook: HookName,
        mut context: RenderContext,
    ) -> Result<RenderContext, InterceptorError> {
        context.markdown.push_str("\n\nappended by interceptor");
        Ok(context)
    }
}

struct Broken;

#[async_trait]
impl Interceptor for Broken {
    async fn process(
        &self,
        _hook: HookName,
        mut context: RenderContext,
    ) -> Result<RenderContext, InterceptorError> {
        context.markdown = "garbage".to_string();
        Err(InterceptorError::failed("gave up halfway"))
    }
}

#[tokio::test]
async fn renders_markdown_to_html() {
    let html = render(&default_pipeline(), "Hello **world**\n\n> quoted").await;

    assert!(html.contains("<strong>world</strong>"));
    assert!(html.contains("<blockquote>"));
}

#[tokio::test]
async fn script_and_javascript_links_are_removed() {
    let markdown = "text\n\n<script>alert(1)</script>\n\n[click](javascript:alert(1))\n\n\
                    <p onclick=\"steal()\">para</p>";
    let html = render(&default_pipeline(), markdown).await;

    assert!(!html.contains("<script"));
    assert!(!html.contains("alert(1)</script>"));
    assert!(!html.to_ascii_lowercase().contains("javascript:"));
    assert!(!html.contains("onclick"));
    assert!(html.contains("click"));
    assert!(html.contains("para"));
}

#[tokio::test]
async fn disabled_sanitisation_keeps_raw_html() {
    let settings = Settings {
        xss: XssSettings {
            enabled: false,
            ..XssSettings::default()
        },
        ..Settings::default()
    };
    let pipeline = RenderPipeline::from_settings(&settings);
    let html = render(&pipeline, "<span onclick=\"x()\">raw</span>").await;

    assert!(html.contains("onclick=\"x()\""));
}

#[tokio::test]
async fn ignore_all_tags_preset_yields_text() {
    let settings = Settings {
        xss: XssSettings {
            preset: XssPreset::IgnoreAllTags,
            ..XssSettings::default()
        },
        ..Settings::default()
    };
    let pipeline = RenderPipeline::from_settings(&settings);
    let html = render(&pipeline, "Some *emphasis* here").await;

    assert!(!html.contains('<'));
    assert!(html.contains("Some emphasis here"));
}

#[tokio::test]
async fn page_links_expand_outside_code() {
    let html = render(
        &default_pipeline(),
        "See [/wiki/home] and `[/not/a/link]`.\n\n```\n[/also/not]\n```",
    )
    .await;

    assert!(html.contains("href=\"/wiki/home\""));
    assert!(!html.contains("href=\"/not/a/link\""));
    assert!(!html.contains("href=\"/also/not\""));
    assert!(html.contains("[/also/not]"));
}

#[tokio::test]
async fn page_links_skip_indented_and_nested_code() {
    let html = render(
        &default_pipeline(),
        "para [/wiki/home]\n\n    see [/a/b] here\n\n- item\n\n      ```\n      [/c]\n      ```\n",
    )
    .await;

    assert!(html.contains("href=\"/wiki/home\""));
    assert!(html.contains("see [/a/b] here"));
    assert!(html.contains("[/c]"));
    assert!(!html.contains("href=\"/a/b\""));
    assert!(!html.contains("href=\"/c\""));
}

#[tokio::test]
async fn private_use_text_is_rendered_verbatim() {
    let html = render(
        &default_pipeline(),
        "\u{e000}pagemark-code-0\u{e001} before `code` after",
    )
    .await;

    assert_eq!(
        html.trim_end(),
        "<p>\u{e000}pagemark-code-0\u{e001} before <code>code</code> after</p>"
    );
}

#[tokio::test]
async fn underline_survives_recommended_policy() {
    let html = render(&default_pipeline(), "__under__ and ^sup^").await;

    assert!(html.contains("<u>under</u>"));
    assert!(html.contains("<sup>sup</sup>"));
}

#[tokio::test]
async fn highlight_query_marks_keywords() {
    let context = RenderContext::new("/test", "alpha beta gamma").with_highlight_query("beta");
    let rendered = default_pipeline()
        .render(context)
        .await
        .expect("render succeeds");

    assert!(
        rendered
            .parsed_html()
            .contains("<em class=\"highlighted\">beta</em>")
    );
}

#[tokio::test]
async fn dom_anchor_scopes_heading_ids() {
    let context = RenderContext::new("/test", "# Intro\n\n[jump](#intro)")
        .with_dom_anchor(DomAnchor::new("doc"));
    let rendered = default_pipeline()
        .render(context)
        .await
        .expect("render succeeds");
    let html = rendered.parsed_html();

    assert!(html.contains("id=\"doc-intro\""));
    assert!(html.contains("href=\"#doc-intro\""));
}

#[tokio::test]
async fn interceptor_changes_reach_the_renderer() {
    let pipeline = pipeline_with(|registry| {
        registry.register(Arc::new(AppendParagraph), [HookName::PostPreProcess]);
    });
    let html = render(&pipeline, "body").await;

    assert!(html.contains("<p>appended by interceptor</p>"));
}

#[tokio::test]
async fn failing_interceptor_does_not_change_output() {
    let pipeline = pipeline_with(|registry| {
        registry.register(Arc::new(Broken), HookName::ALL);
    });
    let markdown = "# Title\n\nsome *text*";

    let expected = render(&default_pipeline(), markdown).await;
    assert_eq!(render(&pipeline, markdown).await, expected);
}

#[tokio::test]
async fn repeated_renders_are_identical() {
    let pipeline = default_pipeline();
    let markdown = "| a | b |\n|---|---|\n| 1 | 2 |\n\n- [x] done\n- [ ] todo\n\n~~gone~~";

    let first = render(&pipeline, markdown).await;
    for _ in 0..3 {
        assert_eq!(render(&pipeline, markdown).await, first);
    }
}

#[tokio::test]
async fn concurrent_renders_stay_isolated() {
    let pipeline = default_pipeline();
    let documents: Vec<String> = (0..12).map(|i| format!("document **{i}**")).collect();

    let mut expected = Vec::new();
    for document in &documents {
        expected.push(render(&pipeline, document).await);
    }

    let mut handles = Vec::new();
    for document in documents {
        let pipeline = pipeline.clone();
        handles.push(tokio::spawn(async move {
            pipeline
                .render(RenderContext::new("/concurrent", document))
                .await
                .expect("render succeeds")
                .parsed_html()
                .to_string()
        }));
    }

    for (handle, expected) in handles.into_iter().zip(expected) {
        assert_eq!(handle.await.expect("task completes"), expected);
    }
}

#[tokio::test]
async fn stale_render_is_not_published() {
    let pipeline = default_pipeline();
    let generations = RenderGenerations::new();
    let shown = Mutex::new(Vec::new());

    let stale = generations.begin("/page");
    let fresh = generations.begin("/page");

    for (ticket, markdown) in [(&fresh, "new text"), (&stale, "old text")] {
        pipeline
            .render_with(RenderContext::new("/page", markdown), |context| {
                if ticket.is_current() {
                    shown.lock().unwrap().push(context.parsed_html().to_string());
                }
            })
            .await
            .expect("render succeeds");
    }

    let shown = shown.into_inner().unwrap();
    assert_eq!(shown.len(), 1);
    assert!(shown[0].contains("new text"));
}
