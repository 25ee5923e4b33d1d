//! Tool documentation lookup
//!
//! Workers consult a ranked-snippet index before running external tools.
//! The index itself is an external collaborator; the trait keeps the
//! backing implementation (keyword table here, vector store elsewhere)
//! swappable without touching the workers.

use serde::{Deserialize, Serialize};

/// One documentation entry in the index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocEntry {
    /// Tool or topic name
    pub title: String,
    /// Documentation text
    pub body: String,
    /// Scope tag matched against a role's docs scope (empty = global)
    #[serde(default)]
    pub scope: String,
}

/// A ranked snippet returned from a query
#[derive(Debug, Clone)]
pub struct DocSnippet {
    pub title: String,
    pub body: String,
    pub score: u32,
}

/// Ranked documentation lookup
pub trait DocIndex: Send + Sync {
    /// Return up to `limit` snippets relevant to `query`, best first
    fn query(&self, query: &str, limit: usize) -> Vec<DocSnippet>;
}

/// Keyword-overlap index over a static set of entries
pub struct StaticDocIndex {
    entries: Vec<DocEntry>,
}

impl StaticDocIndex {
    pub fn new(entries: Vec<DocEntry>) -> Self {
        Self { entries }
    }

    /// Restrict the index to entries visible in `scope` (global entries
    /// are always visible)
    pub fn scoped(&self, scope: &str) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .filter(|e| e.scope.is_empty() || e.scope == scope)
                .cloned()
                .collect(),
        }
    }

    fn score(query_words: &[String], entry: &DocEntry) -> u32 {
        let haystack = format!("{} {}", entry.title, entry.body).to_lowercase();
        query_words
            .iter()
            .filter(|w| haystack.contains(w.as_str()))
            .count() as u32
    }
}

impl DocIndex for StaticDocIndex {
    fn query(&self, query: &str, limit: usize) -> Vec<DocSnippet> {
        let words: Vec<String> = query
            .to_lowercase()
            .split_whitespace()
            .map(String::from)
            .collect();

        let mut scored: Vec<DocSnippet> = self
            .entries
            .iter()
            .map(|e| DocSnippet {
                title: e.title.clone(),
                body: e.body.clone(),
                score: Self::score(&words, e),
            })
            .filter(|s| s.score > 0)
            .collect();

        scored.sort_by(|a, b| b.score.cmp(&a.score));
        scored.truncate(limit);
        scored
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn index() -> StaticDocIndex {
        StaticDocIndex::new(vec![
            DocEntry {
                title: "nmap".to_string(),
                body: "Network scanner. nmap -sV -p 80,443 host".to_string(),
                scope: "scan_enum".to_string(),
            },
            DocEntry {
                title: "subfinder".to_string(),
                body: "Passive subdomain discovery. subfinder -d example.com".to_string(),
                scope: "recon".to_string(),
            },
            DocEntry {
                title: "curl".to_string(),
                body: "HTTP client for quick probes".to_string(),
                scope: String::new(),
            },
        ])
    }

    #[test]
    fn test_query_ranks_by_overlap() {
        let results = index().query("scan ports with nmap", 5);
        assert!(!results.is_empty());
        assert_eq!(results[0].title, "nmap");
    }

    #[test]
    fn test_query_respects_limit() {
        let results = index().query("nmap subfinder curl", 1);
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_no_match_returns_empty() {
        assert!(index().query("zzzz", 5).is_empty());
    }

    #[test]
    fn test_scoped_keeps_global_entries() {
        let scoped = index().scoped("recon");
        let results = scoped.query("subfinder curl nmap", 10);
        let titles: Vec<_> = results.iter().map(|s| s.title.as_str()).collect();
        assert!(titles.contains(&"subfinder"));
        assert!(titles.contains(&"curl"));
        assert!(!titles.contains(&"nmap"));
    }
}
