//! Table alias allocation
//!
//! Every model (and every many-to-many join table) is referenced in generated
//! SQL through a short alias `TA_<n>`. Once assigned, an alias never changes for
//! the lifetime of the allocator, so repeated and nested joins against the same
//! model land on the same alias. Subqueries get their own `SQ<n>_` prefix which
//! is spliced in front of every alias they contain.

use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::backends::StorageEngine;

static ALIAS_PATTERN: Lazy<Regex> = Lazy::new(|| {
    // The alias is only matched on a word boundary, so an already rewritten
    // `SQ0_TA_1` is left alone when it gets nested into another subquery.
    Regex::new(r"\bTA_(\d+)\b").expect("alias pattern is a valid regex")
});

/// Placeholder in subquery SQL replaced by the outer query's alias
pub const PARENT_PLACEHOLDER: &str = "${parent}";

/// Process-wide (per engine) alias table
#[derive(Debug, Default)]
pub struct AliasAllocator {
    aliases: DashMap<String, String>,
    next_alias: AtomicUsize,
    next_subquery: AtomicUsize,
}

impl AliasAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Alias for a model or join table name, allocated on first use
    pub fn alias_for(&self, name: &str) -> String {
        if let Some(alias) = self.aliases.get(name) {
            return alias.clone();
        }

        // the entry guard holds the shard lock, so two threads asking for the
        // same name cannot both allocate
        self.aliases
            .entry(name.to_string())
            .or_insert_with(|| {
                let alias = format!("TA_{}", self.next_alias.fetch_add(1, Ordering::SeqCst));
                tracing::debug!(name, alias = %alias, "allocated table alias");
                alias
            })
            .clone()
    }

    /// Alias quoted in the storage engine's identifier convention
    pub fn protected_alias_for(&self, name: &str, storage: &dyn StorageEngine) -> String {
        storage.quote_identifier(&self.alias_for(name))
    }

    /// A fresh `SQ<n>_` prefix
    pub fn new_subquery_prefix(&self) -> String {
        format!("SQ{}_", self.next_subquery.fetch_add(1, Ordering::SeqCst))
    }

    /// Make the aliases inside a compiled subquery unique and resolve the
    /// `${parent}` placeholder to `parent_alias`
    pub fn rewrite_subquery(&self, sql: &str, parent_alias: &str) -> String {
        let prefix = self.new_subquery_prefix();
        let replacement = format!("{}TA_$1", prefix);
        let rewritten = ALIAS_PATTERN.replace_all(sql, replacement.as_str());
        rewritten.replace(PARENT_PLACEHOLDER, parent_alias)
    }

    /// Number of aliases handed out so far
    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}
