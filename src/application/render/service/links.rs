use comrak::nodes::{AstNode, NodeValue};
use once_cell::sync::Lazy;
use regex::Regex;

static PAGE_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[(/[^\[\]()\s]*)\]").expect("page link pattern must be valid"));

/// Expand bare page references such as `[/team/handbook]` in document text
/// into links pointing at the same path.
///
/// Only `Text` nodes are rewritten, so code spans, code blocks (fenced,
/// indented or nested in lists) and raw HTML keep their literal content.
/// Labels of existing links and images are skipped as well.
pub(crate) fn expand_page_links<'a>(node: &'a AstNode<'a>) {
    if matches!(
        node.data.borrow().value,
        NodeValue::Link(_) | NodeValue::Image(_)
    ) {
        return;
    }

    let mut child = node.first_child();
    while let Some(current) = child {
        if matches!(current.data.borrow().value, NodeValue::Text(_)) {
            child = rewrite_text_run(current).next_sibling();
        } else {
            expand_page_links(current);
            child = current.next_sibling();
        }
    }
}

/// Comrak splits unmatched brackets into their own text nodes, so a run of
/// adjacent text siblings is joined before matching. Returns the last node
/// of the run that remains attached.
fn rewrite_text_run<'a>(first: &'a AstNode<'a>) -> &'a AstNode<'a> {
    let mut run = Vec::new();
    let mut text = String::new();
    let mut cursor = Some(first);
    while let Some(node) = cursor {
        {
            let data = node.data.borrow();
            match &data.value {
                NodeValue::Text(value) => text.push_str(value),
                _ => break,
            }
        }
        run.push(node);
        cursor = node.next_sibling();
    }

    let Some(html) = link_page_references(&text) else {
        return run.last().copied().unwrap_or(first);
    };

    first.data.borrow_mut().value = NodeValue::HtmlInline(html);
    for node in run.iter().skip(1) {
        node.detach();
    }
    first
}

/// Render `text` as inline HTML with page references turned into anchors.
/// `None` when the text holds no reference to expand.
fn link_page_references(text: &str) -> Option<String> {
    let mut html = String::with_capacity(text.len() + 32);
    let mut copied = 0;

    for captures in PAGE_LINK.captures_iter(text) {
        let (Some(whole), Some(path)) = (captures.get(0), captures.get(1)) else {
            continue;
        };

        let follows = text[whole.end()..].chars().next();
        if matches!(follows, Some('(' | '[' | ':')) {
            continue;
        }
        if text[..whole.start()].ends_with(['[', '!']) {
            continue;
        }

        push_escaped(&mut html, &text[copied..whole.start()]);
        html.push_str("<a href=\"");
        push_escaped(&mut html, path.as_str());
        html.push_str("\">");
        push_escaped(&mut html, path.as_str());
        html.push_str("</a>");
        copied = whole.end();
    }

    if copied == 0 {
        return None;
    }
    push_escaped(&mut html, &text[copied..]);
    Some(html)
}

fn push_escaped(html: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => html.push_str("&amp;"),
            '<' => html.push_str("&lt;"),
            '>' => html.push_str("&gt;"),
            '"' => html.push_str("&quot;"),
            _ => html.push(ch),
        }
    }
}
