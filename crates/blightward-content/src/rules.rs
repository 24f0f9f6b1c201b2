//! The loaded content bundle.

use std::path::Path;

use blightward_core::error::DomainError;
use sha2::{Digest, Sha256};

use crate::config::TraumaEconomyConfig;
use crate::panic::PanicTable;
use crate::traumas::TraumaCatalog;

const DEFAULT_TRAUMAS: &str = include_str!("../data/traumas.yaml");
const DEFAULT_PANIC_TABLE: &str = include_str!("../data/panic_table.yaml");

/// Path to a rules YAML overriding the balance defaults.
pub const RULES_PATH_VAR: &str = "BLIGHTWARD_RULES_PATH";

/// Path to a trauma catalog YAML replacing the built-in one.
pub const TRAUMAS_PATH_VAR: &str = "BLIGHTWARD_TRAUMAS_PATH";

/// Path to a panic table YAML replacing the built-in one.
pub const PANIC_TABLE_PATH_VAR: &str = "BLIGHTWARD_PANIC_TABLE_PATH";

/// Everything the trauma economy reads but never writes.
#[derive(Debug, Clone)]
pub struct RulesContent {
    /// Balance values.
    pub config: TraumaEconomyConfig,
    /// Trauma definitions.
    pub traumas: TraumaCatalog,
    /// CPS panic table.
    pub panic_table: PanicTable,
    fingerprint: String,
}

impl RulesContent {
    /// Builds a bundle from parsed parts. The fingerprint covers the parts'
    /// debug rendering, so equal content always fingerprints the same.
    #[must_use]
    pub fn new(config: TraumaEconomyConfig, traumas: TraumaCatalog, panic_table: PanicTable) -> Self {
        let rendered = [
            format!("{config:?}"),
            format!("{traumas:?}"),
            format!("{panic_table:?}"),
        ];
        let fingerprint = fingerprint_of(&rendered.each_ref().map(String::as_str));
        Self {
            config,
            traumas,
            panic_table,
            fingerprint,
        }
    }

    /// Parses a bundle from YAML sources. `rules_yaml` may be omitted to use
    /// the balance defaults.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Configuration` if any source fails to parse or
    /// the result fails [`RulesContent::validate_configuration`].
    pub fn from_yaml_sources(
        rules_yaml: Option<&str>,
        traumas_yaml: &str,
        panic_yaml: &str,
    ) -> Result<Self, DomainError> {
        let config = match rules_yaml {
            Some(yaml) => TraumaEconomyConfig::from_yaml_str(yaml)?,
            None => TraumaEconomyConfig::default(),
        };
        let traumas = TraumaCatalog::from_yaml_str(traumas_yaml)?;
        let panic_table = PanicTable::from_yaml_str(panic_yaml)?;

        let mut content = Self::new(config, traumas, panic_table);
        content.fingerprint = fingerprint_of(&[
            rules_yaml.unwrap_or_default(),
            traumas_yaml,
            panic_yaml,
        ]);
        content.validate_configuration()?;
        Ok(content)
    }

    /// The built-in catalog, panic table and balance defaults.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Configuration` if the embedded content is
    /// invalid.
    pub fn load_default() -> Result<Self, DomainError> {
        Self::from_yaml_sources(None, DEFAULT_TRAUMAS, DEFAULT_PANIC_TABLE)
    }

    /// Loads content, replacing each built-in source whose path variable
    /// is set.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Configuration` if a configured file cannot be
    /// read or the content is invalid.
    pub fn from_env() -> Result<Self, DomainError> {
        let rules = read_env_file(RULES_PATH_VAR)?;
        let traumas = read_env_file(TRAUMAS_PATH_VAR)?;
        let panic = read_env_file(PANIC_TABLE_PATH_VAR)?;

        tracing::info!(
            rules_overridden = rules.is_some(),
            traumas_overridden = traumas.is_some(),
            panic_table_overridden = panic.is_some(),
            "loading trauma economy content"
        );

        Self::from_yaml_sources(
            rules.as_deref(),
            traumas.as_deref().unwrap_or(DEFAULT_TRAUMAS),
            panic.as_deref().unwrap_or(DEFAULT_PANIC_TABLE),
        )
    }

    /// Checks the bundle is complete: every trauma category has at least
    /// one definition, the panic table covers its die without gaps, and
    /// every balance value is in range.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Configuration` listing every problem found.
    pub fn validate_configuration(&self) -> Result<(), DomainError> {
        let mut problems = self.config.problems();
        problems.extend(self.traumas.problems());
        problems.extend(self.panic_table.problems());
        if problems.is_empty() {
            Ok(())
        } else {
            for problem in &problems {
                tracing::warn!(problem = %problem, "invalid trauma economy content");
            }
            Err(DomainError::Configuration(problems.join("; ")))
        }
    }

    /// Boolean form of [`RulesContent::validate_configuration`].
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.validate_configuration().is_ok()
    }

    /// SHA-256 of the content sources, hex-encoded.
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

fn fingerprint_of(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}

fn read_env_file(var: &str) -> Result<Option<String>, DomainError> {
    match std::env::var(var) {
        Ok(path) => read_file(Path::new(&path)).map(Some),
        Err(_) => Ok(None),
    }
}

fn read_file(path: &Path) -> Result<String, DomainError> {
    std::fs::read_to_string(path).map_err(|e| {
        DomainError::Configuration(format!("cannot read {}: {e}", path.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::panic::PanicEffect;
    use crate::traumas::{RetirementRule, TraumaCategory};

    #[test]
    fn test_default_content_is_valid() {
        let content = RulesContent::load_default().unwrap();
        assert!(content.is_valid());
        assert_eq!(content.panic_table.die_sides(), 10);
        for category in TraumaCategory::ALL {
            assert!(!content.traumas.in_category(category).is_empty());
        }
    }

    #[test]
    fn test_default_panic_table_matches_published_rows() {
        let content = RulesContent::load_default().unwrap();
        let table = &content.panic_table;
        assert_eq!(table.entry_for(1).unwrap().effect, PanicEffect::Frozen);
        assert_eq!(table.entry_for(7).unwrap().name, "Paradox Fury");
        assert_eq!(table.entry_for(10).unwrap().effect, PanicEffect::Composure);
    }

    #[test]
    fn test_default_catalog_has_immediate_and_stacking_retirement() {
        let content = RulesContent::load_default().unwrap();
        assert!(
            content
                .traumas
                .iter()
                .any(|d| d.retirement == RetirementRule::Immediate)
        );
        assert!(
            content
                .traumas
                .iter()
                .any(|d| matches!(d.retirement, RetirementRule::AtStack { .. }))
        );
    }

    #[test]
    fn test_fingerprint_is_stable_and_content_sensitive() {
        let a = RulesContent::load_default().unwrap();
        let b = RulesContent::load_default().unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);

        let c = RulesContent::from_yaml_sources(
            Some("trauma:\n  check_dc: 3\n"),
            DEFAULT_TRAUMAS,
            DEFAULT_PANIC_TABLE,
        )
        .unwrap();
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn test_incomplete_catalog_fails_validation() {
        let traumas = "traumas:\n  - { id: a, name: A, category: Social, description: x }\n";
        match RulesContent::from_yaml_sources(None, traumas, DEFAULT_PANIC_TABLE).unwrap_err() {
            DomainError::Configuration(msg) => {
                assert!(msg.contains("no traumas in category Cognitive"));
            }
            other => panic!("expected Configuration, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_file_is_configuration_error() {
        assert!(matches!(
            read_file(Path::new("/nonexistent/blightward/rules.yaml")),
            Err(DomainError::Configuration(_))
        ));
    }
}
