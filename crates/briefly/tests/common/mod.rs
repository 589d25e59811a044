//! Shared test utilities for briefly integration tests.
//!
//! - `TestHarness` wires a `Briefly` service over an in-memory database, a
//!   `MemoryObjectStore` and counting stage doubles.
//! - `doubles` holds the doubles themselves, each one configurable to fail,
//!   stall or panic.

#![allow(dead_code)]

pub mod doubles;
pub mod harness;

pub use harness::TestHarness;

/// Watch URL for a synthetic 11-character video id.
pub fn video_link(n: usize) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id(n))
}

pub fn video_id(n: usize) -> String {
    format!("vid{:08}", n)
}

pub const PLAYLIST_LINK: &str = "https://www.youtube.com/playlist?list=PLbriefly0001";
