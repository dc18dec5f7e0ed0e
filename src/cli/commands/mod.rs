//! CLI command implementations

pub mod utils;

pub mod asset;
pub mod bootstrap;
pub mod migrate;
pub mod part;
pub mod reset;
pub mod status;
