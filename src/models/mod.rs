pub mod grouping;
pub mod settings;
pub mod tab;
