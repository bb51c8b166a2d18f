//! The timeline service.
//!
//! This crate hosts everything between the raw timeline file and the
//! renderer: the timeline data model and its JSON decoding, text entity
//! extraction for mentions and links, and the avatar service that fetches
//! remote avatar images through a deduplicating in-memory cache.

pub mod avatars;
pub mod config;
pub mod entities;
pub mod logging;
pub mod timeline;
