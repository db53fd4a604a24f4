//! # Physics Error Types
//!
//! Failures that can occur while building the physics world or creating
//! objects inside it.

use thiserror::Error;

/// Errors that can occur in the physics layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PhysicsError {
    /// Configuration value out of range.
    #[error("invalid physics configuration: {0}")]
    InvalidConfig(String),

    /// The per-step scratch allocator could not be created.
    #[error("scratch allocator rejected a budget of {bytes} bytes")]
    ScratchAllocator {
        /// Requested budget.
        bytes: usize,
    },

    /// The worker pool could not be built.
    #[error("job scheduler failed to start: {0}")]
    JobScheduler(String),

    /// The world already holds its configured maximum number of bodies.
    #[error("body limit reached: {max}")]
    BodyLimit {
        /// Configured maximum.
        max: u32,
    },

    /// Shape dimensions are not finite and strictly positive.
    #[error("invalid shape: {0}")]
    InvalidShape(String),

    /// The handle does not refer to a live body.
    #[error("unknown body handle")]
    UnknownBody,

    /// The constraint could not be built between the given bodies.
    #[error("invalid constraint: {0}")]
    InvalidConstraint(String),

    /// Static bodies can never change motion type.
    #[error("motion type change from {from} to {to} is not allowed")]
    MotionChange {
        /// Current motion type.
        from: &'static str,
        /// Requested motion type.
        to: &'static str,
    },
}

/// Result type for physics operations.
pub type PhysicsResult<T> = Result<T, PhysicsError>;
