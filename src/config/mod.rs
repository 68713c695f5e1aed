// Re-export all items from the submodules
mod default_configs;
mod target_types;
mod triage_config;

pub use target_types::TargetCategory;

pub use triage_config::{
    load_or_create_config,
    Target,
    TriageConfig,
    TriageOptions,
};
