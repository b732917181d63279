use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the pagemark binary.
#[derive(Debug, Parser)]
#[command(name = "pagemark", version, about = "Interceptable markdown renderer")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "PAGEMARK_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: GlobalOverrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Render markdown to sanitised HTML.
    Render(RenderArgs),
    /// Sanitise an HTML fragment with the configured policy.
    Sanitize(InputArgs),
    /// Highlight search keywords inside an HTML fragment.
    Highlight(HighlightArgs),
}

#[derive(Debug, Args, Clone)]
pub struct InputArgs {
    /// Input file; `-` reads standard input.
    #[arg(value_name = "FILE", default_value = "-", value_hint = ValueHint::FilePath)]
    pub input: PathBuf,
}

#[derive(Debug, Args, Clone)]
pub struct RenderArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Page path carried through the render context.
    #[arg(long = "page-path", value_name = "PATH", default_value = "/")]
    pub page_path: String,

    /// Search query whose keywords are highlighted in the output.
    #[arg(long = "highlight", value_name = "QUERY")]
    pub highlight: Option<String>,

    /// Prefix element ids and fragment links with this anchor.
    #[arg(long = "dom-anchor", value_name = "ANCHOR")]
    pub dom_anchor: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct HighlightArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Search query; double quotes are ignored.
    #[arg(long = "query", short = 'q', value_name = "QUERY")]
    pub query: String,
}

#[derive(Debug, Args, Default, Clone)]
pub struct GlobalOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,

    /// Enable or disable HTML sanitisation.
    #[arg(
        long = "xss-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub xss_enabled: Option<bool>,

    /// Override the sanitisation preset (ignore-all-tags|recommended|custom).
    #[arg(long = "xss-preset", value_name = "PRESET", global = true)]
    pub xss_preset: Option<String>,

    /// Override the CSS class used for highlighted keywords.
    #[arg(long = "highlight-class", value_name = "CLASS", global = true)]
    pub highlight_class: Option<String>,

    /// Toggle expansion of `[/page/path]` references.
    #[arg(
        long = "page-links",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub page_links: Option<bool>,

    /// Log every hook reached during a render.
    #[arg(
        long = "trace-hooks",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub trace_hooks: Option<bool>,
}
