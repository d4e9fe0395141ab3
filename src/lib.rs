//! Offline snapshot service library.
//!
//! Captures JavaScript-rendered pages with a headless browser, follows
//! same-origin links to a bounded depth, stores every page and asset in a
//! content-addressed directory and rewrites references so the result browses
//! offline.

// Allow raw string hashes for safety - they're harmless and prevent issues if content changes
#![allow(clippy::needless_raw_string_hashes)]

pub mod capture;
pub mod config;
pub mod constants;
pub mod crawl;
pub mod fs_utils;
pub mod normalize;
pub mod rewrite;
pub mod snapshot;
pub mod store;
pub mod web;
