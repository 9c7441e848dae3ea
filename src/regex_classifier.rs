//! First-pass, pattern based classification.
//!
//! Rules are kept in priority order and compiled into a single `RegexSet`;
//! the lowest-index matching rule decides the label.

use crate::error::{ClassifierError, Result};
use rayon::prelude::*;
use regex::{Regex, RegexSet, RegexSetBuilder};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegexRule {
    pub pattern: String,
    pub label: String,
}

impl RegexRule {
    pub fn new(pattern: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            label: label.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RuleFile {
    rules: Vec<RegexRule>,
}

#[derive(Debug, Clone)]
pub struct RegexRuleSet {
    rules: Vec<RegexRule>,
    set: RegexSet,
}

impl RegexRuleSet {
    /// Compile rules in the given priority order. Patterns are matched
    /// case-insensitively anywhere in the message.
    pub fn new(rules: Vec<RegexRule>) -> Result<Self> {
        for rule in &rules {
            if let Err(e) = Regex::new(&rule.pattern) {
                tracing::error!(component = "RegexRuleSet", pattern = %rule.pattern, "invalid rule pattern");
                return Err(ClassifierError::Configuration(format!(
                    "invalid regex rule '{}' for label '{}': {}",
                    rule.pattern, rule.label, e
                )));
            }
            if rule.label.trim().is_empty() {
                return Err(ClassifierError::Configuration(format!(
                    "regex rule '{}' has an empty label",
                    rule.pattern
                )));
            }
        }

        let set = RegexSetBuilder::new(rules.iter().map(|r| r.pattern.as_str()))
            .case_insensitive(true)
            .build()
            .map_err(|e| ClassifierError::Configuration(format!("failed to build rule set: {e}")))?;

        tracing::debug!(component = "RegexRuleSet", rules = rules.len(), "compiled regex rules");
        Ok(Self { rules, set })
    }

    /// The built-in rules for the synthetic CRM/billing/analytics corpus.
    pub fn default_rules() -> Result<Self> {
        Self::new(vec![
            RegexRule::new(r"User User\d+ logged (in|out)\.", "User Action"),
            RegexRule::new(r"Backup (started|ended) at .*", "System Notification"),
            RegexRule::new(r"Backup completed successfully\.", "System Notification"),
            RegexRule::new(r"System updated to version .*", "System Notification"),
            RegexRule::new(r"File .* uploaded successfully by user .*", "System Notification"),
            RegexRule::new(r"Disk cleanup completed successfully\.", "System Notification"),
            RegexRule::new(r"System reboot initiated by user .*", "System Notification"),
            RegexRule::new(r"Account with ID .* created by .*", "User Action"),
        ])
    }

    /// Load rules from a YAML file of the form `rules: [{pattern, label}, ...]`.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ClassifierError::Configuration(format!(
                "rule file not found: {}",
                path.display()
            )));
        }
        let content = fs::read_to_string(path)?;
        let file: RuleFile = serde_yaml::from_str(&content)?;
        tracing::info!(component = "RegexRuleSet", path = %path.display(), rules = file.rules.len(), "loaded rule file");
        Self::new(file.rules)
    }

    /// Load from `path` when given, otherwise the built-in rules.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_yaml_file(p),
            None => Self::default_rules(),
        }
    }

    /// Label of the first matching rule, or `None` when nothing matches.
    pub fn match_message(&self, message: &str) -> Option<&str> {
        self.set
            .matches(message)
            .iter()
            .next()
            .map(|idx| self.rules[idx].label.as_str())
    }

    pub fn match_batch<'a>(&'a self, messages: &[&str]) -> Vec<Option<&'a str>> {
        messages
            .par_iter()
            .map(|message| self.match_message(message))
            .collect()
    }

    pub fn rules(&self) -> &[RegexRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
