//! Minimal reader for the INI-style `config` file.
//!
//! Only the subset the traversal APIs need: section/subsection headers,
//! `key = value` lines, comments. Values keep their verbatim spelling;
//! section and key names are case-folded as Git does.

use std::{collections::HashMap, io, path::Path};

use crate::errors::GitError;

/// Parsed `config`, keyed `section.key` or `section.subsection.key`.
#[derive(Debug, Clone, Default)]
pub struct GitConfig {
    values: HashMap<String, String>,
}

/// One configured remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remote {
    pub name: String,
    pub url: Option<String>,
}

impl GitConfig {
    /// Read `<git-dir>/config`; an absent file parses as empty.
    pub fn read(git_dir: &Path) -> Result<GitConfig, GitError> {
        let text = match std::fs::read_to_string(git_dir.join("config")) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(GitError::IOError(e)),
        };
        Ok(Self::parse(&text))
    }

    pub fn parse(text: &str) -> GitConfig {
        let mut values = HashMap::new();
        let mut section = String::new();

        for raw_line in text.lines() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if let Some(header) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                section = match header.split_once(' ') {
                    Some((name, sub)) => {
                        let sub = sub.trim().trim_matches('"');
                        format!("{}.{sub}", name.to_ascii_lowercase())
                    }
                    None => header.to_ascii_lowercase(),
                };
                continue;
            }
            let (key, value) = match line.split_once('=') {
                Some((k, v)) => (k.trim().to_ascii_lowercase(), v.trim().to_string()),
                // Valueless keys are boolean true.
                None => (line.to_ascii_lowercase(), "true".to_string()),
            };
            if !section.is_empty() {
                values.insert(format!("{section}.{key}"), value);
            }
        }
        GitConfig { values }
    }

    /// Look up `section.key` / `section.subsection.key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|v| v.as_str())
    }

    /// All configured remotes with their fetch URLs.
    pub fn remotes(&self) -> Vec<Remote> {
        let mut names: Vec<String> = self
            .values
            .keys()
            .filter_map(|k| {
                k.strip_prefix("remote.")
                    .and_then(|rest| rest.rsplit_once('.'))
                    .map(|(name, _)| name.to_string())
            })
            .collect();
        names.sort();
        names.dedup();
        names
            .into_iter()
            .map(|name| {
                let url = self.get(&format!("remote.{name}.url")).map(|s| s.to_string());
                Remote { name, url }
            })
            .collect()
    }

    /// The upstream remote/merge pair for a branch, when configured.
    pub fn branch_upstream(&self, branch: &str) -> Option<(String, String)> {
        let remote = self.get(&format!("branch.{branch}.remote"))?;
        let merge = self.get(&format!("branch.{branch}.merge"))?;
        Some((remote.to_string(), merge.to_string()))
    }
}
