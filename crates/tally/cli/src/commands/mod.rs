//! CLI commands

pub mod derive;
pub mod run;
