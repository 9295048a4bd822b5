//! Core traits for the feature pipeline.
//!
//! This module defines the TextCleaner trait, the seam where callers plug in
//! their own document preprocessing before TF-IDF vectorization.

/// Normalizes a raw document before vectorization.
///
/// ## Design Note
/// - `Send + Sync` lets user and item extraction share one cleaner while
///   running in parallel
/// - Cleaning is a pure string transform: the same input must always give the
///   same output
pub trait TextCleaner: Send + Sync {
    /// Returns the name of this cleaner (for logging/debugging)
    fn name(&self) -> &str;

    /// Clean one document. Empty input yields an empty string.
    fn clean(&self, raw: &str) -> String;
}
