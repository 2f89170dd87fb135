// SPDX-License-Identifier: MIT
//! Site adapter registry — resolves which adapter handles the current page.
//!
//! Adapters register with URL patterns (plain substrings or regexes). At
//! startup the embedder calls [`AdapterRegistry::resolve`] once with the
//! page URL; the first matching adapter becomes the active handle passed to
//! the guard context.

use std::sync::Arc;
use tracing::{debug, warn};

use super::SiteAdapter;

/// A URL match rule.
pub enum UrlPattern {
    /// Matches when the URL contains this substring.
    Substring(String),
    Regex(regex::Regex),
}

impl UrlPattern {
    fn matches(&self, url: &str) -> bool {
        match self {
            UrlPattern::Substring(s) => url.contains(s.as_str()),
            UrlPattern::Regex(re) => re.is_match(url),
        }
    }
}

impl From<&str> for UrlPattern {
    fn from(s: &str) -> Self {
        UrlPattern::Substring(s.to_string())
    }
}

struct Entry {
    patterns: Vec<UrlPattern>,
    adapter: Arc<dyn SiteAdapter>,
}

/// Registry of all known site adapters.
#[derive(Default)]
pub struct AdapterRegistry {
    entries: Vec<Entry>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter for the given URL patterns. Duplicate names are
    /// rejected with a warning, keeping the first registration.
    pub fn register(&mut self, patterns: Vec<UrlPattern>, adapter: Arc<dyn SiteAdapter>) {
        if self.entries.iter().any(|e| e.adapter.name() == adapter.name()) {
            warn!(adapter = adapter.name(), "adapter already registered — ignoring");
            return;
        }
        debug!(adapter = adapter.name(), "registered site adapter");
        self.entries.push(Entry { patterns, adapter });
    }

    /// Pick the adapter for `url` — first registration whose patterns match.
    pub fn resolve(&self, url: &str) -> Option<Arc<dyn SiteAdapter>> {
        for entry in &self.entries {
            if entry.patterns.iter().any(|p| p.matches(url)) {
                debug!(adapter = entry.adapter.name(), url, "resolved site adapter");
                return Some(entry.adapter.clone());
            }
        }
        warn!(url, "no site adapter matches this page");
        None
    }

    /// Whether any adapter matches `url`.
    pub fn is_supported(&self, url: &str) -> bool {
        self.entries
            .iter()
            .any(|e| e.patterns.iter().any(|p| p.matches(url)))
    }

    /// Names of all registered adapters.
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.adapter.name()).collect()
    }
}
