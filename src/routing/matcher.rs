//! Module matching logic.
//!
//! # Responsibilities
//! - Match the module's domain (exact or `*.` wildcard, case-insensitive)
//! - Match an address prefix on whole path segments (case-sensitive)
//! - Combine patterns with OR semantics
//!
//! # Design Decisions
//! - Domains compare case-insensitively, like host names
//! - Address prefixes compare case-sensitively, like module addresses
//! - No regex to keep matching linear

use crate::module::ModuleIdentity;

/// Trait for matching modules against a condition.
pub trait ModuleMatcher: Send + Sync + std::fmt::Debug {
    /// Returns true if the module matches this condition.
    fn matches(&self, module: &ModuleIdentity) -> bool;
}

/// Matches the module's domain.
#[derive(Debug, Clone)]
pub struct DomainMatcher {
    domain: String,
    wildcard: bool,
}

impl DomainMatcher {
    /// `example.com` matches exactly; `*.example.com` matches any subdomain.
    pub fn new(pattern: impl Into<String>) -> Self {
        let pattern = pattern.into().to_lowercase();
        match pattern.strip_prefix("*.") {
            Some(rest) => Self {
                domain: rest.to_string(),
                wildcard: true,
            },
            None => Self {
                domain: pattern,
                wildcard: false,
            },
        }
    }
}

impl ModuleMatcher for DomainMatcher {
    fn matches(&self, module: &ModuleIdentity) -> bool {
        let domain = module.domain().to_lowercase();
        if !self.wildcard {
            return domain == self.domain;
        }
        domain
            .strip_suffix(&self.domain)
            .is_some_and(|head| head.ends_with('.') && head.len() > 1)
    }
}

/// Matches an address prefix on segment boundaries.
#[derive(Debug, Clone)]
pub struct AddressPrefixMatcher {
    prefix: String,
}

impl AddressPrefixMatcher {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into().trim_matches('/').to_string(),
        }
    }
}

impl ModuleMatcher for AddressPrefixMatcher {
    fn matches(&self, module: &ModuleIdentity) -> bool {
        match module.address().strip_prefix(&self.prefix) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }
}

/// Combines multiple matchers with OR semantics.
#[derive(Debug, Default)]
pub struct AnyMatcher {
    matchers: Vec<Box<dyn ModuleMatcher>>,
}

impl AnyMatcher {
    pub fn new(matchers: Vec<Box<dyn ModuleMatcher>>) -> Self {
        Self { matchers }
    }

    /// Compile configured patterns. Patterns containing `/` are address
    /// prefixes; all others are domains.
    pub fn from_patterns<S: AsRef<str>>(patterns: &[S]) -> Self {
        let matchers = patterns
            .iter()
            .map(|p| p.as_ref().trim())
            .filter(|p| !p.is_empty())
            .map(|p| -> Box<dyn ModuleMatcher> {
                if p.trim_matches('/').contains('/') {
                    Box::new(AddressPrefixMatcher::new(p))
                } else {
                    Box::new(DomainMatcher::new(p))
                }
            })
            .collect();
        Self { matchers }
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }
}

impl ModuleMatcher for AnyMatcher {
    fn matches(&self, module: &ModuleIdentity) -> bool {
        self.matchers.iter().any(|m| m.matches(module))
    }
}
