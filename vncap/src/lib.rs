//! # vncap — framebuffer session recorder
//!
//! Drives a [`vncap_core`] capture against a session and writes the
//! resulting timeline as an animated GIF.
//!
//! ## Sources
//!
//! - **Demo**: a built-in synthetic server (`demo`) that animates a
//!   moving square, used when no protocol client is wired in.

pub mod config;
pub mod demo;
pub mod signal;
