//! Composable three-valued path filters.
//!
//! A filter is a pure function `(prior decision, path) → decision` over
//! immutable pattern lists. Individual filters only ever tighten or flip the
//! running decision for paths their patterns apply to; everything else
//! passes the prior decision through unchanged. Composition is a left fold,
//! which is what gives later `.gitignore` lines their override power.

use std::{io::BufRead, sync::Arc};

use crate::{errors::GitError, internal::ignore::glob::is_match};

/// Outcome of evaluating a filter chain against one path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterDecision {
    /// Some pattern excluded the path.
    Exclude,
    /// A negation pattern explicitly re-included the path.
    Include,
    /// No pattern applied. At the end of a chain Git treats this as
    /// included.
    Neutral,
}

/// A shareable filter closure.
pub type PathFilter = Arc<dyn Fn(FilterDecision, &str) -> FilterDecision + Send + Sync>;

/// The identity filter.
pub fn neutral() -> PathFilter {
    Arc::new(|prior, _| prior)
}

/// Excludes every path matching any of `patterns`.
pub fn exclude(patterns: Vec<String>) -> PathFilter {
    Arc::new(move |prior, path| {
        if patterns.iter().any(|p| is_match(path, p)) {
            FilterDecision::Exclude
        } else {
            prior
        }
    })
}

/// Explicitly includes every path matching any of `patterns`.
pub fn include(patterns: Vec<String>) -> PathFilter {
    Arc::new(move |prior, path| {
        if patterns.iter().any(|p| is_match(path, p)) {
            FilterDecision::Include
        } else {
            prior
        }
    })
}

/// Left-fold composition: each filter sees the running decision.
pub fn combine(filters: Vec<PathFilter>) -> PathFilter {
    Arc::new(move |prior, path| {
        filters
            .iter()
            .fold(prior, |decision, filter| filter(decision, path))
    })
}

/// Build a filter from `.gitignore` lines: ordinary patterns exclude,
/// `!`-prefixed ones re-include, later lines override earlier ones.
pub fn from_gitignore_lines(lines: impl IntoIterator<Item = String>) -> PathFilter {
    let parsed: Vec<(String, bool)> = lines
        .into_iter()
        .map(|line| line.trim_end().to_string())
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| match line.strip_prefix('!') {
            Some(rest) => (rest.to_string(), true),
            None => (line, false),
        })
        .collect();

    Arc::new(move |prior, path| {
        parsed.iter().fold(prior, |decision, (pattern, negated)| {
            if is_match(path, pattern) {
                if *negated {
                    FilterDecision::Include
                } else {
                    FilterDecision::Exclude
                }
            } else {
                decision
            }
        })
    })
}

/// Read a `.gitignore` stream into a filter.
pub fn from_gitignore_stream(reader: impl BufRead) -> Result<PathFilter, GitError> {
    let lines = reader.lines().collect::<Result<Vec<_>, _>>()?;
    Ok(from_gitignore_lines(lines))
}

/// Re-root `inner` under `prefix`: the wrapped filter sees paths relative
/// to its own directory, paths outside the prefix pass through untouched.
/// This is how a subdirectory `.gitignore` participates in a chain of
/// repository-root-relative paths.
pub fn scoped(prefix: &str, inner: PathFilter) -> PathFilter {
    let prefix = format!("{}/", prefix.trim_end_matches('/'));
    Arc::new(move |prior, path| match path.strip_prefix(prefix.as_str()) {
        Some(relative) => inner(prior, relative),
        None => prior,
    })
}

/// Default exclusions for build products, editor droppings and OS noise.
pub fn common_ignores() -> PathFilter {
    let patterns = [
        "bin/",
        "obj/",
        "build/",
        "out/",
        "target/",
        "dist/",
        "node_modules/",
        "packages/",
        "vendor/",
        "*.log",
        "logs/",
        "*.tmp",
        "*.temp",
        "*.swp",
        "*.bak",
        "*~",
        ".vs/",
        ".vscode/",
        ".idea/",
        "*.suo",
        "*.user",
        ".DS_Store",
        "Thumbs.db",
        "Desktop.ini",
    ];
    exclude(patterns.iter().map(|s| s.to_string()).collect())
}
