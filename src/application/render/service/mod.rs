mod anchors;
mod links;
mod options;

use comrak::{Arena, format_html, parse_document};

use crate::application::render::{
    sanitize::Sanitizer,
    types::{DomAnchor, RenderError, Renderer},
};

use anchors::scope_fragment_ids;
use links::expand_page_links;
use options::default_options;

/// Comrak-based renderer with Ammonia sanitisation in the post-process stage.
pub struct ComrakRenderer {
    options: comrak::Options<'static>,
    sanitizer: Sanitizer,
    page_links: bool,
}

impl ComrakRenderer {
    pub fn new(sanitizer: Sanitizer) -> Self {
        Self {
            options: default_options(),
            sanitizer,
            page_links: true,
        }
    }

    /// Toggle expansion of bare `[/page/path]` references.
    pub fn with_page_links(mut self, enabled: bool) -> Self {
        self.page_links = enabled;
        self
    }

    pub fn sanitizer(&self) -> &Sanitizer {
        &self.sanitizer
    }
}

impl Renderer for ComrakRenderer {
    fn pre_process(&self, markdown: &str) -> Result<String, RenderError> {
        let markdown = markdown.strip_prefix('\u{feff}').unwrap_or(markdown);
        Ok(normalize_line_endings(markdown))
    }

    fn process(&self, markdown: &str) -> Result<String, RenderError> {
        let arena = Arena::new();
        let root = parse_document(&arena, markdown, &self.options);
        if self.page_links {
            expand_page_links(root);
        }

        let mut html = String::new();
        format_html(root, &self.options, &mut html)
            .map_err(|err| RenderError::markdown(err.to_string()))?;
        Ok(html)
    }

    fn post_process(&self, html: &str, anchor: Option<&DomAnchor>) -> Result<String, RenderError> {
        let sanitized = self.sanitizer.process(html);
        match anchor {
            Some(anchor) => scope_fragment_ids(&sanitized, anchor),
            None => Ok(sanitized),
        }
    }
}

fn normalize_line_endings(markdown: &str) -> String {
    if markdown.contains('\r') {
        markdown.replace("\r\n", "\n").replace('\r', "\n")
    } else {
        markdown.to_string()
    }
}
