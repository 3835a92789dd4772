//! Exclusion patterns merged from configuration and the settings table.

use regex::{Regex, RegexBuilder};
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::config::parse_pattern_list;
use crate::error::StoreError;
use crate::models::app_setting::EXCLUSION_PATTERNS_KEY;
use crate::store::EventStore;

/// Ordered, deduplicated set of compiled exclusion regexes.
#[derive(Debug, Clone, Default)]
pub struct ExclusionRules {
    patterns: Vec<Regex>,
}

impl ExclusionRules {
    /// Compile patterns in order, skipping duplicates and invalid expressions.
    pub fn new<I, S>(sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut patterns: Vec<Regex> = Vec::new();

        for source in sources {
            let source = source.as_ref().trim();
            if source.is_empty() || patterns.iter().any(|p| p.as_str() == source) {
                continue;
            }

            match RegexBuilder::new(source).case_insensitive(true).build() {
                Ok(regex) => patterns.push(regex),
                Err(err) => warn!(pattern = source, error = %err, "Ignoring invalid exclusion pattern"),
            }
        }

        Self { patterns }
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Source of the first pattern matching `summary + "\n" + description`, lower-cased.
    pub fn first_match(&self, summary: Option<&str>, description: Option<&str>) -> Option<&str> {
        if self.patterns.is_empty() {
            return None;
        }

        let text = format!(
            "{}\n{}",
            summary.unwrap_or_default(),
            description.unwrap_or_default()
        )
        .to_lowercase();

        self.patterns
            .iter()
            .find(|pattern| pattern.is_match(&text))
            .map(Regex::as_str)
    }
}

/// Patterns stored under the exclusion settings key, as a JSON array or a
/// newline-separated string.
pub fn patterns_from_setting(value: &JsonValue) -> Vec<String> {
    match value {
        JsonValue::Array(items) => items
            .iter()
            .filter_map(JsonValue::as_str)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        JsonValue::String(text) => parse_pattern_list(text),
        JsonValue::Null => Vec::new(),
        other => {
            warn!(value = %other, "Unexpected exclusion setting format; ignoring");
            Vec::new()
        }
    }
}

/// Build the rules for a run: configured patterns first, then the ones from settings.
pub async fn load_exclusions(
    store: &dyn EventStore,
    configured: &[String],
) -> Result<ExclusionRules, StoreError> {
    let dynamic = store
        .get_setting(EXCLUSION_PATTERNS_KEY)
        .await?
        .map(|value| patterns_from_setting(&value))
        .unwrap_or_default();

    let rules = ExclusionRules::new(configured.iter().chain(dynamic.iter()));
    debug!(
        configured = configured.len(),
        from_settings = dynamic.len(),
        active = rules.len(),
        "Loaded exclusion patterns"
    );
    Ok(rules)
}
