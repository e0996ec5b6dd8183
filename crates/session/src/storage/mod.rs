//! Storage abstractions for the session layer
//!
//! Contains the file-backed JSON map that the token store persists into.

pub mod json_map_store;
