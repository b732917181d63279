use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Extension points of a render pass, declared in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HookName {
    PreRender,
    PrePreProcess,
    PostPreProcess,
    PrePostProcess,
    PostPostProcess,
    PreRenderHtml,
    PostRenderHtml,
}

impl HookName {
    pub const ALL: [HookName; 7] = [
        HookName::PreRender,
        HookName::PrePreProcess,
        HookName::PostPreProcess,
        HookName::PrePostProcess,
        HookName::PostPostProcess,
        HookName::PreRenderHtml,
        HookName::PostRenderHtml,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            HookName::PreRender => "preRender",
            HookName::PrePreProcess => "prePreProcess",
            HookName::PostPreProcess => "postPreProcess",
            HookName::PrePostProcess => "prePostProcess",
            HookName::PostPostProcess => "postPostProcess",
            HookName::PreRenderHtml => "preRenderHtml",
            HookName::PostRenderHtml => "postRenderHtml",
        }
    }
}

impl fmt::Display for HookName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown hook `{0}`")]
pub struct UnknownHook(String);

impl FromStr for HookName {
    type Err = UnknownHook;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        HookName::ALL
            .into_iter()
            .find(|hook| hook.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| UnknownHook(value.to_string()))
    }
}
