use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;
use tracing::warn;

use crate::config::{XssPreset, XssSettings, XssWhitelist};

/// Attribute-map key whose attributes apply to every allowed tag.
pub const GENERIC_ATTRIBUTES_KEY: &str = "*";

const ALWAYS_DENIED_SCHEMES: [&str; 1] = ["javascript"];

/// Attributes Ammonia manages itself on links; allowing them would conflict
/// with the enforced `rel="noopener noreferrer"`.
const RESERVED_ATTRIBUTES: [&str; 1] = ["rel"];

const RECOMMENDED_TAGS: [&str; 51] = [
    "a",
    "abbr",
    "b",
    "blockquote",
    "br",
    "caption",
    "code",
    "dd",
    "del",
    "details",
    "div",
    "dl",
    "dt",
    "em",
    "figcaption",
    "figure",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "hr",
    "i",
    "img",
    "input",
    "ins",
    "kbd",
    "li",
    "mark",
    "ol",
    "p",
    "pre",
    "q",
    "s",
    "samp",
    "section",
    "span",
    "strong",
    "sub",
    "summary",
    "sup",
    "table",
    "tbody",
    "td",
    "tfoot",
    "th",
    "thead",
    "tr",
    "u",
    "ul",
];

const RECOMMENDED_GENERIC_ATTRIBUTES: [&str; 8] = [
    "class",
    "id",
    "title",
    "lang",
    "dir",
    "aria-hidden",
    "aria-label",
    "role",
];

const RECOMMENDED_TAG_ATTRIBUTES: [(&str, &[&str]); 10] = [
    ("a", &["href", "name", "target"]),
    ("img", &["src", "alt", "title", "width", "height", "loading"]),
    ("th", &["align", "colspan", "rowspan", "scope"]),
    ("td", &["align", "colspan", "rowspan"]),
    ("input", &["type", "checked", "disabled"]),
    ("ol", &["start", "type"]),
    ("blockquote", &["cite"]),
    ("q", &["cite"]),
    ("del", &["cite", "datetime"]),
    ("details", &["open"]),
];

const RECOMMENDED_SCHEMES: [&str; 4] = ["http", "https", "mailto", "tel"];

pub const DEFAULT_CLEAN_CONTENT_TAGS: [&str; 2] = ["script", "style"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("invalid tag name `{0}`")]
    InvalidTag(String),
    #[error("invalid attribute name `{attribute}` for `{tag}`")]
    InvalidAttribute { tag: String, attribute: String },
    #[error("attributes configured for tag `{0}` which is not allowed")]
    AttributesForUnknownTag(String),
    #[error("invalid url scheme `{0}`")]
    InvalidScheme(String),
}

/// Allow-list governing markup sanitisation. Immutable once built and safe
/// to share between concurrent renders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizationPolicy {
    enabled: bool,
    allowed_tags: BTreeSet<String>,
    allowed_attributes: BTreeMap<String, BTreeSet<String>>,
    allowed_url_schemes: BTreeSet<String>,
    clean_content_tags: BTreeSet<String>,
}

impl SanitizationPolicy {
    /// Policy that leaves markup untouched.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::ignore_all_tags()
        }
    }

    /// Strip every tag, keeping only text.
    pub fn ignore_all_tags() -> Self {
        Self {
            enabled: true,
            allowed_tags: BTreeSet::new(),
            allowed_attributes: BTreeMap::new(),
            allowed_url_schemes: BTreeSet::new(),
            clean_content_tags: owned_set(DEFAULT_CLEAN_CONTENT_TAGS),
        }
    }

    /// Built-in allow-list suited to rendered markdown documents.
    pub fn recommended() -> Self {
        let mut allowed_attributes = BTreeMap::new();
        allowed_attributes.insert(
            GENERIC_ATTRIBUTES_KEY.to_string(),
            owned_set(RECOMMENDED_GENERIC_ATTRIBUTES),
        );
        for (tag, attributes) in RECOMMENDED_TAG_ATTRIBUTES {
            allowed_attributes.insert(tag.to_string(), owned_set(attributes.iter().copied()));
        }

        Self {
            enabled: true,
            allowed_tags: owned_set(RECOMMENDED_TAGS),
            allowed_attributes,
            allowed_url_schemes: owned_set(RECOMMENDED_SCHEMES),
            clean_content_tags: owned_set(DEFAULT_CLEAN_CONTENT_TAGS),
        }
    }

    /// Build a policy from an explicit whitelist. Names are normalised to
    /// lowercase; `javascript` is removed from the schemes whatever the input.
    pub fn custom(
        whitelist: &XssWhitelist,
        clean_content_tags: &[String],
    ) -> Result<Self, PolicyError> {
        let clean_content_tags = clean_content_tags
            .iter()
            .map(|tag| normalize_tag(tag))
            .collect::<Result<BTreeSet<_>, _>>()?;

        let mut allowed_tags = BTreeSet::new();
        for tag in &whitelist.tags {
            let tag = normalize_tag(tag)?;
            if clean_content_tags.contains(&tag) {
                warn!(
                    target = "application::render::sanitize",
                    tag = %tag,
                    "tag is removed with its content and cannot be allowed"
                );
                continue;
            }
            allowed_tags.insert(tag);
        }

        let mut allowed_attributes: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (tag, attributes) in &whitelist.attributes {
            let tag = if tag.trim() == GENERIC_ATTRIBUTES_KEY {
                GENERIC_ATTRIBUTES_KEY.to_string()
            } else {
                normalize_tag(tag)?
            };
            if tag != GENERIC_ATTRIBUTES_KEY && !allowed_tags.contains(&tag) {
                if clean_content_tags.contains(&tag) {
                    continue;
                }
                return Err(PolicyError::AttributesForUnknownTag(tag));
            }

            let entry = allowed_attributes.entry(tag.clone()).or_default();
            for attribute in attributes {
                let attribute = normalize_attribute(&tag, attribute)?;
                if RESERVED_ATTRIBUTES.contains(&attribute.as_str()) {
                    continue;
                }
                entry.insert(attribute);
            }
        }

        let mut allowed_url_schemes = BTreeSet::new();
        for scheme in &whitelist.schemes {
            let scheme = normalize_scheme(scheme)?;
            if ALWAYS_DENIED_SCHEMES.contains(&scheme.as_str()) {
                warn!(
                    target = "application::render::sanitize",
                    scheme = %scheme,
                    "url scheme is always denied"
                );
                continue;
            }
            allowed_url_schemes.insert(scheme);
        }

        Ok(Self {
            enabled: true,
            allowed_tags,
            allowed_attributes,
            allowed_url_schemes,
            clean_content_tags,
        })
    }

    /// Replace the tags removed together with their content. Any of them
    /// that were allowed stop being allowed.
    pub fn with_clean_content_tags(mut self, tags: &[String]) -> Result<Self, PolicyError> {
        let clean_content_tags = tags
            .iter()
            .map(|tag| normalize_tag(tag))
            .collect::<Result<BTreeSet<_>, _>>()?;

        for tag in &clean_content_tags {
            if self.allowed_tags.remove(tag) {
                warn!(
                    target = "application::render::sanitize",
                    tag = %tag,
                    "tag is removed with its content and cannot be allowed"
                );
            }
            self.allowed_attributes.remove(tag);
        }

        self.clean_content_tags = clean_content_tags;
        Ok(self)
    }

    /// Derive the policy from configuration. Malformed settings fail closed
    /// to [`SanitizationPolicy::ignore_all_tags`].
    pub fn from_settings(settings: &XssSettings) -> Self {
        if !settings.enabled {
            return Self::disabled();
        }

        let clean_content_tags = &settings.clean_content_tags;
        let policy = match settings.preset {
            XssPreset::IgnoreAllTags => {
                Self::ignore_all_tags().with_clean_content_tags(clean_content_tags)
            }
            XssPreset::Recommended => {
                Self::recommended().with_clean_content_tags(clean_content_tags)
            }
            XssPreset::Custom => Self::custom(&settings.whitelist, clean_content_tags),
        };

        match policy {
            Ok(policy) => policy,
            Err(error) => {
                warn!(
                    target = "application::render::sanitize",
                    error = %error,
                    "invalid xss settings; stripping all tags"
                );
                Self::ignore_all_tags()
            }
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn allowed_tags(&self) -> &BTreeSet<String> {
        &self.allowed_tags
    }

    /// Attributes allowed on `tag`, excluding the generic ones.
    pub fn attributes_for(&self, tag: &str) -> Option<&BTreeSet<String>> {
        self.allowed_attributes.get(tag)
    }

    pub fn generic_attributes(&self) -> Option<&BTreeSet<String>> {
        self.allowed_attributes.get(GENERIC_ATTRIBUTES_KEY)
    }

    pub(crate) fn tag_attributes(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.allowed_attributes
            .iter()
            .filter(|(tag, _)| tag.as_str() != GENERIC_ATTRIBUTES_KEY)
            .map(|(tag, attributes)| (tag.as_str(), attributes))
    }

    pub fn allowed_url_schemes(&self) -> &BTreeSet<String> {
        &self.allowed_url_schemes
    }

    pub fn clean_content_tags(&self) -> &BTreeSet<String> {
        &self.clean_content_tags
    }
}

fn owned_set<'a>(values: impl IntoIterator<Item = &'a str>) -> BTreeSet<String> {
    values.into_iter().map(str::to_string).collect()
}

fn is_markup_name(value: &str) -> bool {
    let mut chars = value.chars();
    chars.next().is_some_and(|ch| ch.is_ascii_alphabetic())
        && chars.all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | ':'))
}

fn normalize_tag(tag: &str) -> Result<String, PolicyError> {
    let normalized = tag.trim().to_ascii_lowercase();
    if !is_markup_name(&normalized) {
        return Err(PolicyError::InvalidTag(tag.to_string()));
    }
    Ok(normalized)
}

fn normalize_attribute(tag: &str, attribute: &str) -> Result<String, PolicyError> {
    let normalized = attribute.trim().to_ascii_lowercase();
    if !is_markup_name(&normalized) {
        return Err(PolicyError::InvalidAttribute {
            tag: tag.to_string(),
            attribute: attribute.to_string(),
        });
    }
    Ok(normalized)
}

fn normalize_scheme(scheme: &str) -> Result<String, PolicyError> {
    let normalized = scheme.trim().trim_end_matches(':').to_ascii_lowercase();
    let mut chars = normalized.chars();
    let valid = chars.next().is_some_and(|ch| ch.is_ascii_alphabetic())
        && chars.all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '+' | '-' | '.'));
    if !valid {
        return Err(PolicyError::InvalidScheme(scheme.to_string()));
    }
    Ok(normalized)
}
