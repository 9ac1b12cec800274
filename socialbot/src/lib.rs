// Library interface for socialbot modules
// This allows tests and other binaries to import modules

pub mod assistant;
pub mod error;
pub mod feeds;
pub mod google;
pub mod interactions;
pub mod llm;
pub mod prompts;
