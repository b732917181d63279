use std::{process, sync::Arc};

use pagemark::{
    application::{
        error::AppError,
        render::{
            DomAnchor, KeywordHighlighter, RenderContext, RenderPipeline, SanitizationPolicy,
            Sanitizer,
        },
    },
    config::{self, HighlightArgs, InputArgs, RenderArgs, Settings},
    infra::{input, telemetry},
};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(error.exit_code());
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_max_level(Level::ERROR)
        .with_writer(std::io::stderr)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    telemetry::init(&settings.logging)?;

    match cli_args.command {
        config::Command::Render(args) => run_render(&settings, args).await,
        config::Command::Sanitize(args) => run_sanitize(&settings, args).await,
        config::Command::Highlight(args) => run_highlight(&settings, args).await,
    }
}

async fn run_render(settings: &Settings, args: RenderArgs) -> Result<(), AppError> {
    let markdown = input::read_document(&args.input.input).await?;

    let mut context = RenderContext::new(args.page_path, markdown);
    if let Some(anchor) = args.dom_anchor {
        context = context.with_dom_anchor(DomAnchor::new(anchor));
    }
    if let Some(query) = args.highlight {
        context = context.with_highlight_query(query);
    }

    let pipeline = RenderPipeline::from_settings(settings);
    let rendered = pipeline
        .render_with(context, |published| {
            info!(
                target = "pagemark::render",
                page_path = %published.page_path,
                html_bytes = published.parsed_html().len(),
                "render published"
            );
        })
        .await?;

    input::write_document(rendered.parsed_html()).await?;
    Ok(())
}

async fn run_sanitize(settings: &Settings, args: InputArgs) -> Result<(), AppError> {
    let html = input::read_document(&args.input).await?;
    let policy = SanitizationPolicy::from_settings(&settings.xss);
    let sanitized = Sanitizer::new(Arc::new(policy)).process(&html);

    input::write_document(&sanitized).await?;
    Ok(())
}

async fn run_highlight(settings: &Settings, args: HighlightArgs) -> Result<(), AppError> {
    if args.query.trim().is_empty() {
        return Err(AppError::validation("highlight requires a non-empty --query"));
    }

    let html = input::read_document(&args.input.input).await?;
    let highlighted = KeywordHighlighter::new(&settings.render.highlight_class)
        .highlight(&html, &args.query)?;

    input::write_document(&highlighted).await?;
    Ok(())
}
