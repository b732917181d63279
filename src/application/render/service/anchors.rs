use lol_html::{RewriteStrSettings, element, rewrite_str};

use crate::application::render::types::{DomAnchor, RenderError};

/// Prefix fragment identifiers with the mount point so several documents can
/// live on one page without colliding heading anchors.
pub(crate) fn scope_fragment_ids(html: &str, anchor: &DomAnchor) -> Result<String, RenderError> {
    let prefix = anchor_prefix(anchor);
    if prefix.is_empty() {
        return Ok(html.to_string());
    }

    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!("[id]", |el| {
                    if let Some(id) = el.get_attribute("id")
                        && !id.is_empty()
                    {
                        el.set_attribute("id", &format!("{prefix}-{id}"))?;
                    }
                    Ok(())
                }),
                element!("a[href^='#']", |el| {
                    if let Some(href) = el.get_attribute("href")
                        && let Some(fragment) = href.strip_prefix('#')
                        && !fragment.is_empty()
                    {
                        el.set_attribute("href", &format!("#{prefix}-{fragment}"))?;
                    }
                    Ok(())
                }),
            ],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|err| RenderError::post_process(err.to_string()))
}

fn anchor_prefix(anchor: &DomAnchor) -> String {
    anchor
        .as_str()
        .trim()
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_') {
                ch
            } else {
                '-'
            }
        })
        .collect()
}
