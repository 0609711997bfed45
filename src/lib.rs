//! Synchronization core for registered container images: reconciles stored
//! containers with an image registry, fetches their descriptor files from
//! source control, and manages the OAuth tokens both need.

pub mod auth;
pub mod db;
pub mod error;
pub mod fetcher;
pub mod registry;
pub mod settings;
pub mod source_control;
pub mod state;
pub mod sync;

#[cfg(test)]
mod testing;
