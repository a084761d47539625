//! # CLI Command Implementations
//!
//! This module contains the implementation for each subcommand of the
//! `workshopctl` command-line tool. Each subcommand lives in its own file
//! to keep the logic separated and maintainable.
//!
//! ## Structure
//!
//! Each command module contains:
//! - An `Args` struct defining the command-specific arguments and options,
//!   derived using `clap`.
//! - An `execute` function that takes the parsed `Args` and performs the
//!   command's logic, calling into the `workshopctl` library.

pub mod provision;
pub mod teardown;
pub mod validate;
