//! groovylint-ci - build, test and publish the groovylint image
//!
//! ## Commands
//!
//! - `groovylint-ci run` - Run Setup, Build, Test and Deploy
//! - `groovylint-ci config` - Print the effective configuration
//! - `groovylint-ci branch` - Check whether a branch deploys
//! - `groovylint-ci completions` - Generate shell completions
//!
//! ## Quick Start
//!
//! ```bash
//! # Show what a master build would do
//! groovylint-ci run --branch origin/master --dry-run
//!
//! # Run in CI, taking the branch from $BRANCH_NAME
//! groovylint-ci run --format json
//! ```

use std::process::ExitCode;

mod cli;

fn main() -> ExitCode {
    match cli::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            if std::env::var("GROOVYLINT_CI_VERBOSE").is_ok() {
                eprintln!("{e:?}");
            }
            ExitCode::FAILURE
        }
    }
}
