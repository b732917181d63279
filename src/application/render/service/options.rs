use comrak::options::{ListStyleType, Options};

/// Comrak options for wiki documents: GitHub-flavoured extensions, heading
/// anchors, and raw HTML passed through to the sanitiser.
pub(crate) fn default_options() -> Options<'static> {
    let mut options = Options::default();
    configure_extensions(&mut options);
    options
}

fn configure_extensions(options: &mut Options<'static>) {
    let ext = &mut options.extension;
    ext.strikethrough = true;
    ext.tagfilter = false;
    ext.table = true;
    ext.autolink = true;
    ext.tasklist = true;
    ext.superscript = true;
    ext.footnotes = true;
    ext.description_lists = true;
    ext.header_ids = Some(String::new());
    ext.front_matter_delimiter = Some("---".to_string());
    ext.underline = true;
    ext.subscript = true;

    let render = &mut options.render;
    render.github_pre_lang = true;
    render.tasklist_classes = true;
    render.list_style = ListStyleType::Dash;
    render.r#unsafe = true;
    render.sourcepos = false;
}
