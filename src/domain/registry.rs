//! Renderer registry: logical renderer name → target page and access policy.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("renderer registry is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("renderer `{name}` has an invalid url `{url}`: {reason}")]
    InvalidUrl {
        name: String,
        url: String,
        reason: String,
    },
    #[error("renderer names must not be empty")]
    EmptyName,
    #[error("renderer `{name}` lists an empty api key")]
    EmptyKey { name: String },
}

/// Who may invoke a renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessPolicy {
    /// No credentials required.
    Open,
    Keys(Vec<String>),
}

impl AccessPolicy {
    /// Match a presented key against the allowed set without short-circuiting on content.
    pub fn authorize(&self, presented: &str) -> bool {
        match self {
            AccessPolicy::Open => true,
            AccessPolicy::Keys(keys) => keys.iter().fold(false, |matched, key| {
                matched | bool::from(presented.as_bytes().ct_eq(key.as_bytes()))
            }),
        }
    }

    pub fn requires_key(&self) -> bool {
        matches!(self, AccessPolicy::Keys(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RendererBinding {
    pub url: Url,
    pub access: AccessPolicy,
}

#[derive(Debug, Deserialize)]
struct RawBinding {
    url: String,
    #[serde(default)]
    keys: Option<Vec<String>>,
}

/// Redacted view of a binding, safe to expose on diagnostics endpoints.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BindingSummary {
    pub url: String,
    pub requires_key: bool,
    pub key_count: usize,
}

#[derive(Debug, Clone, Default)]
pub struct RendererRegistry {
    bindings: HashMap<String, RendererBinding>,
}

impl RendererRegistry {
    pub fn new(bindings: HashMap<String, RendererBinding>) -> Self {
        Self { bindings }
    }

    /// Parse the `{ name: { url, keys } }` document format.
    pub fn from_json_str(raw: &str) -> Result<Self, RegistryError> {
        let parsed: HashMap<String, RawBinding> = serde_json::from_str(raw)?;
        let mut bindings = HashMap::with_capacity(parsed.len());

        for (name, binding) in parsed {
            if name.trim().is_empty() {
                return Err(RegistryError::EmptyName);
            }

            let url = Url::parse(&binding.url).map_err(|err| RegistryError::InvalidUrl {
                name: name.clone(),
                url: binding.url.clone(),
                reason: err.to_string(),
            })?;

            let access = match binding.keys {
                None => AccessPolicy::Open,
                Some(keys) => {
                    if keys.iter().any(|key| key.is_empty()) {
                        return Err(RegistryError::EmptyKey { name });
                    }
                    AccessPolicy::Keys(keys)
                }
            };

            bindings.insert(name, RendererBinding { url, access });
        }

        Ok(Self { bindings })
    }

    pub fn lookup(&self, name: &str) -> Option<&RendererBinding> {
        self.bindings.get(name)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Renderer names in stable order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.bindings.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn summary(&self) -> BTreeMap<String, BindingSummary> {
        self.bindings
            .iter()
            .map(|(name, binding)| {
                let key_count = match &binding.access {
                    AccessPolicy::Open => 0,
                    AccessPolicy::Keys(keys) => keys.len(),
                };
                (
                    name.clone(),
                    BindingSummary {
                        url: binding.url.to_string(),
                        requires_key: binding.access.requires_key(),
                        key_count,
                    },
                )
            })
            .collect()
    }
}
