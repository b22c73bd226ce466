//! Build orchestrator for a packaged-source ecosystem: drives a resolved
//! build plan to a relocatable installation tree under a chosen execution
//! strategy (bounded-parallel, strictly sequential, or script emission).

pub mod cli;
pub mod compiler;
pub mod config;
pub mod destdir;
pub mod dummy;
pub mod error;
pub mod executor;
pub mod fetch;
pub mod pkgdb;
pub mod plan;
pub mod process;
pub mod script;
pub mod semaphore;
pub mod setup_tag;
pub mod sort;
pub mod tempdir;
pub mod types;
