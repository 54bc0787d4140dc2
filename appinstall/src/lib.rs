//! appinstall - build and install self-contained application bundles.
//!
//! A bundle is this program's own executable with a payload appended: a
//! manifest plus the packaged artifacts (a tar of stream files, library save
//! files, an optional bootstrap program and install hooks). Running a bundle
//! switches the program into install mode.
//!
//! # Build
//!
//! [`builder::BundleBuilder`] collects components, captures them into a
//! staging directory and writes the bundle.
//!
//! # Install
//!
//! [`installer::Installer`] extracts the artifacts, derives the command plan
//! with [`inference::infer_commands`], gates it through
//! [`confirm::gate`] and runs it with [`executor::CommandExecutor`].

pub mod builder;
pub mod cl;
pub mod cli;
pub mod command_runner;
pub mod components;
pub mod config;
pub mod confirm;
pub mod error;
pub mod executor;
pub mod inference;
pub mod installer;
pub mod output;
pub mod plan;
pub mod qsh;
pub mod remote;
pub mod testing;

pub use cli::{BuildCli, InstallCli};
pub use error::{InstallError, Result};
