//! Discord command implementations organized by category.

#![allow(clippy::too_long_first_doc_paragraph)]

/// Owner-only administration commands
pub mod admin;

/// Battle commands
pub mod battle;

/// General utility commands
pub mod general;

// Export commands
pub use admin::*;
pub use battle::*;
pub use general::*;
