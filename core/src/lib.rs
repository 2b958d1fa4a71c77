pub mod error;
pub mod evaluation;
pub mod scoring;
pub mod session;
