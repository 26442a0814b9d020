pub mod allocation;
pub mod prompt;
pub mod session;
pub mod snapshot;
