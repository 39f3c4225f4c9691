//! Worker Lambda handler and the broadcast core

pub mod broadcast;
pub mod handler;

// Re-export the main handler for convenience
pub use handler::handler;
