// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! The main routine of `pta`.
//!
//! Loads a program description, runs the selected pointer analysis on it
//! and dumps the requested results.

use anyhow::{anyhow, Context};
use log::*;
use std::env;

use cspta::ir::loader::load_program_from_file;
use cspta::pta::run_pointer_analysis;
use cspta::util::options::AnalysisOptions;

fn run() -> anyhow::Result<()> {
    // Get any options specified via the PTA_FLAGS environment variable
    let mut options = AnalysisOptions::default();
    let pta_flags = env::var("PTA_FLAGS").unwrap_or_default();
    if !pta_flags.is_empty() {
        let pta_args: Vec<String> =
            serde_json::from_str(&pta_flags).context("PTA_FLAGS must be a JSON array of strings")?;
        options.parse_from_args(&pta_args)?;
    }

    // Let arguments supplied on the command line override the environment variable.
    let args = env::args().skip(1).collect::<Vec<_>>();
    options.parse_from_args(&args)?;
    info!("PTA Options: {:?}", options);

    let input = options
        .input
        .clone()
        .ok_or_else(|| anyhow!("No input program given"))?;
    let mut program =
        load_program_from_file(&input).with_context(|| format!("Failed to load program from {}", input))?;

    if let Some(entry) = &options.entry_func {
        let method = program
            .find_method(entry)
            .ok_or_else(|| anyhow!("Entry method {} not found", entry))?;
        program.set_entry_methods(vec![method]);
    }

    run_pointer_analysis(&program, &options)
}

fn main() {
    // Initialize loggers.
    if env::var("PTA_LOG").is_ok() {
        let e = env_logger::Env::new()
            .filter("PTA_LOG")
            .write_style("PTA_LOG_STYLE");
        env_logger::init_from_env(e);
    }

    if let Err(e) = run() {
        // Help and version requests surface as clap errors.
        if let Some(clap_err) = e.downcast_ref::<clap::Error>() {
            clap_err.exit();
        }
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}
