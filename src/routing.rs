/// Source-based routing for the classification cascade
///
/// Some sources emit too few messages, with labels unseen in the bulk corpus,
/// for the statistical tier to learn them. Those sources go straight to the
/// oracle. Everything else takes the regex tier first and falls back to the
/// statistical classifier.
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Source known to need the oracle out of the box.
pub const LEGACY_CRM_SOURCE: &str = "LegacyCRM";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    /// Regex rules, then the statistical classifier
    RegexThenStatistical,
    /// Bypass the local tiers and ask the oracle
    Oracle,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingPolicy {
    pub default_route: Route,
    pub overrides: FxHashMap<String, Route>,
}

impl Default for RoutingPolicy {
    fn default() -> Self {
        Self::with_oracle_sources([LEGACY_CRM_SOURCE])
    }
}

impl RoutingPolicy {
    /// Route every source through regex/statistical except the ones listed.
    pub fn with_oracle_sources<I, S>(sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let overrides = sources
            .into_iter()
            .map(|s| (s.into(), Route::Oracle))
            .collect();
        Self {
            default_route: Route::RegexThenStatistical,
            overrides,
        }
    }

    /// Parse a comma separated source list such as `LegacyCRM,OldBilling`.
    pub fn from_source_list(list: &str) -> Self {
        Self::with_oracle_sources(
            list.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        )
    }

    /// Route for a source; matching is exact and case-sensitive.
    pub fn route(&self, source: &str) -> Route {
        self.overrides.get(source).copied().unwrap_or(self.default_route)
    }

    pub fn is_oracle_routed(&self, source: &str) -> bool {
        self.route(source) == Route::Oracle
    }

    /// Sources with an explicit oracle override, sorted for stable logging.
    pub fn oracle_sources(&self) -> Vec<&str> {
        let mut sources: Vec<&str> = self
            .overrides
            .iter()
            .filter(|(_, route)| **route == Route::Oracle)
            .map(|(source, _)| source.as_str())
            .collect();
        sources.sort_unstable();
        sources
    }
}
