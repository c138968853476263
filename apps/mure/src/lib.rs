//! # mure
//!
//! Command-line front end for `mure-core`: argument parsing, configuration
//! layering and the command implementations. `main.rs` only sets up logging
//! and calls [`cli::execute`].

pub mod cli;
pub mod config;
