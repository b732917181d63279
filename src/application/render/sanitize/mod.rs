//! Allow-list sanitisation backed by Ammonia.

mod policy;

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use ammonia::{Builder as AmmoniaBuilder, UrlRelative};

pub use policy::{
    DEFAULT_CLEAN_CONTENT_TAGS, GENERIC_ATTRIBUTES_KEY, PolicyError, SanitizationPolicy,
};

/// Applies a [`SanitizationPolicy`] to markup.
#[derive(Debug, Clone)]
pub struct Sanitizer {
    policy: Arc<SanitizationPolicy>,
}

impl Sanitizer {
    pub fn new(policy: Arc<SanitizationPolicy>) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &SanitizationPolicy {
        &self.policy
    }

    pub fn process(&self, markup: &str) -> String {
        if !self.policy.enabled() {
            // Sanitisation switched off in configuration.
            return markup.to_string();
        }

        self.builder().clean(markup).to_string()
    }

    fn builder(&self) -> AmmoniaBuilder<'_> {
        let policy = self.policy.as_ref();
        let mut builder = AmmoniaBuilder::default();

        let tags: HashSet<&str> = policy.allowed_tags().iter().map(String::as_str).collect();
        let clean_content: HashSet<&str> = policy
            .clean_content_tags()
            .iter()
            .map(String::as_str)
            .collect();
        let generic: HashSet<&str> = policy
            .generic_attributes()
            .map(|attributes| attributes.iter().map(String::as_str).collect())
            .unwrap_or_default();
        let tag_attributes: HashMap<&str, HashSet<&str>> = policy
            .tag_attributes()
            .map(|(tag, attributes)| (tag, attributes.iter().map(String::as_str).collect()))
            .collect();
        let schemes: HashSet<&str> = policy
            .allowed_url_schemes()
            .iter()
            .map(String::as_str)
            .collect();

        builder
            .tags(tags)
            .clean_content_tags(clean_content)
            .generic_attributes(generic)
            .tag_attributes(tag_attributes)
            .url_schemes(schemes)
            .url_relative(UrlRelative::PassThrough)
            .strip_comments(true);

        builder
    }
}
