//! Blightward: content and balance configuration.
//!
//! Read-only definition records consumed by the trauma economy: the trauma
//! catalog, the CPS panic table, and the tunable balance rules. Defaults
//! ship embedded as YAML; hosts can point at their own files through the
//! environment.

pub mod config;
pub mod panic;
pub mod rules;
pub mod traumas;

pub use config::TraumaEconomyConfig;
pub use panic::{ForcedAction, PanicEffect, PanicEntry, PanicTable, StatusEffect};
pub use rules::RulesContent;
pub use traumas::{
    RetirementRule, TraumaCatalog, TraumaCategory, TraumaDefinition, TraumaEffect,
    TraumaEffectType,
};
