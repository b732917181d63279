use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Opaque handle naming the element a rendered document is mounted into.
///
/// The pipeline never inspects it; only [`Renderer::post_process`] reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomAnchor(String);

impl DomAnchor {
    pub fn new(anchor: impl Into<String>) -> Self {
        Self(anchor.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DomAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-render record threaded through every hook and transform stage.
///
/// A context is created for exactly one render call and moved from stage to
/// stage; it is never shared between concurrent renders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderContext {
    /// Source markdown; rewritten in place by the pre-process transform.
    pub markdown: String,
    /// Mount point handed to the post-process transform untouched.
    pub dom_anchor: Option<DomAnchor>,
    /// Path of the document being rendered.
    pub page_path: String,
    /// Rendered markup, absent until the process transform has run.
    pub parsed_html: Option<String>,
    /// Raw search phrase(s) supplied by the caller.
    pub highlight_query: Option<String>,
    /// Ad-hoc values attached by interceptors.
    #[serde(default)]
    pub extensions: BTreeMap<String, serde_json::Value>,
}

impl RenderContext {
    pub fn new(page_path: impl Into<String>, markdown: impl Into<String>) -> Self {
        Self {
            markdown: markdown.into(),
            dom_anchor: None,
            page_path: page_path.into(),
            parsed_html: None,
            highlight_query: None,
            extensions: BTreeMap::new(),
        }
    }

    pub fn with_dom_anchor(mut self, anchor: DomAnchor) -> Self {
        self.dom_anchor = Some(anchor);
        self
    }

    /// Attach a search query; blank queries are stored as `None`.
    pub fn with_highlight_query(mut self, query: impl Into<String>) -> Self {
        let query = query.into();
        self.highlight_query = (!query.trim().is_empty()).then_some(query);
        self
    }

    pub fn parsed_html(&self) -> &str {
        self.parsed_html.as_deref().unwrap_or_default()
    }

    pub fn extension(&self, key: &str) -> Option<&serde_json::Value> {
        self.extensions.get(key)
    }

    pub fn set_extension(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.extensions.insert(key.into(), value);
    }

    pub fn take_extension(&mut self, key: &str) -> Option<serde_json::Value> {
        self.extensions.remove(key)
    }
}

/// Structured errors surfaced by renderer transforms. These abort the render
/// and reach the caller unchanged.
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    #[error("markdown pre-processing failed: {message}")]
    PreProcess { message: String },
    #[error("markdown parsing failed: {message}")]
    Markdown { message: String },
    #[error("html post-processing failed: {message}")]
    PostProcess { message: String },
}

impl RenderError {
    pub fn pre_process(message: impl Into<String>) -> Self {
        Self::PreProcess {
            message: message.into(),
        }
    }

    pub fn markdown(message: impl Into<String>) -> Self {
        Self::Markdown {
            message: message.into(),
        }
    }

    pub fn post_process(message: impl Into<String>) -> Self {
        Self::PostProcess {
            message: message.into(),
        }
    }
}

/// The three markdown transforms driven by the pipeline. Implementations must
/// be pure and deterministic: the same input yields the same output or error.
pub trait Renderer: Send + Sync {
    /// Markdown-to-markdown rewrite applied before parsing.
    fn pre_process(&self, markdown: &str) -> Result<String, RenderError>;

    /// Convert markdown to raw HTML.
    fn process(&self, markdown: &str) -> Result<String, RenderError>;

    /// HTML-to-HTML rewrite applied after parsing.
    fn post_process(&self, html: &str, anchor: Option<&DomAnchor>) -> Result<String, RenderError>;
}
