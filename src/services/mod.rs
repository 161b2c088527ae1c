pub mod classifier_service;
pub mod domain_service;
pub mod grouping_service;
pub mod incremental_service;
pub mod metadata_cache;
pub mod prompt_service;
pub mod settings_service;
