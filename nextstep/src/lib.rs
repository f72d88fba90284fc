// Library interface for nextstep modules
// This allows tests and the binaries to import modules

pub mod assistant;
pub mod chat;
pub mod llm;
pub mod news;
pub mod resources;
pub mod server;
