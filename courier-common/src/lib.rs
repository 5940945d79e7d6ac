//! Shared types for the courier email routing service.

pub mod logging;
pub mod request;

pub use request::EmailRequest;

/// Signal broadcast to long-running tasks during shutdown.
#[derive(Debug, Clone, Copy)]
pub enum Signal {
    Shutdown,
}
