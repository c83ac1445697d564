//! Discord interaction handlers
//!
//! This module provides handlers for Discord interactions such as autocomplete,
//! button clicks, and modal submissions.

/// Autocomplete handlers for owned units, roster units and species names
pub mod autocomplete;
/// Button and modal handlers driving running battles
pub mod interactions;
