//! Shared content fixtures.

use std::sync::Arc;

use blightward_content::RulesContent;

/// The shipped rules content.
///
/// # Panics
///
/// Panics if the embedded default content fails to load.
#[must_use]
pub fn default_content() -> Arc<RulesContent> {
    Arc::new(RulesContent::load_default().expect("embedded rules content must load"))
}
