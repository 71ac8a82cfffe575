// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Analysis options.

use clap::{Arg, Command};

use crate::pta::{HeapModelType, PTAType};

const PTA_USAGE: &str = r#"pta [OPTIONS] INPUT"#;

/// Creates the clap::Command metadata for argument parsing.
/// No option carries a clap default so that options parsed from `PTA_FLAGS`
/// survive a later parse of the command line.
fn make_options_parser() -> Command<'static> {
    Command::new("pta")
        .no_binary_name(true)
        .override_usage(PTA_USAGE)
        .version(env!("CARGO_PKG_VERSION"))
        .arg(Arg::new("entry-func-name")
            .long("entry-func")
            .takes_value(true)
            .help("The `Type.method` name of the entry method from which the pointer analysis begins.")
            .long_help("Overrides the entry methods declared in the input program."))
        .arg(Arg::new("pta-type")
            .long("pta-type")
            .takes_value(true)
            .value_parser(["andersen", "ander", "ci", "callsite-sensitive", "cs", "object-sensitive", "obj"])
            .help("The type of pointer analysis [default: callsite-sensitive].")
            .long_help("Context-insensitive (andersen), callsite-sensitive and object-sensitive analyses are supported."))
        .arg(Arg::new("context-depth")
            .long("context-depth")
            .takes_value(true)
            .value_parser(clap::value_parser!(u32))
            .help("The context depth limit for a context-sensitive pointer analysis [default: 1]."))
        .arg(Arg::new("heap-model")
            .long("heap-model")
            .takes_value(true)
            .value_parser(["alloc-site", "type"])
            .help("How allocation sites are abstracted [default: alloc-site]."))
        .arg(Arg::new("dump-stats")
            .long("dump-stats")
            .takes_value(false)
            .help("Dump the statistics of the analysis results."))
        .arg(Arg::new("call-graph-output")
            .long("dump-call-graph")
            .takes_value(true)
            .help("Dump the call graph in DOT format to the output file."))
        .arg(Arg::new("pts-output")
            .long("dump-pts")
            .takes_value(true)
            .help("Dump points-to results to the output file, or `stdout`."))
        .arg(Arg::new("pfg-output")
            .long("dump-pfg")
            .takes_value(true)
            .help("Dump the pointer flow graph in DOT format to the output file."))
        .arg(Arg::new("INPUT")
            .help("The JSON description of the program to be analyzed."))
}

#[derive(Clone, Debug)]
pub struct AnalysisOptions {
    pub entry_func: Option<String>,
    pub pta_type: PTAType,
    // options for context-sensitive analysis
    pub context_depth: u32,
    pub heap_model: HeapModelType,

    pub dump_stats: bool,
    pub call_graph_output: Option<String>,
    pub pts_output: Option<String>,
    pub pfg_output: Option<String>,
    pub input: Option<String>,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            entry_func: None,
            pta_type: PTAType::CallSiteSensitive,
            context_depth: 1,
            heap_model: HeapModelType::AllocSite,
            dump_stats: false,
            call_graph_output: None,
            pts_output: None,
            pfg_output: None,
            input: None,
        }
    }
}

impl AnalysisOptions {
    /// Parses options from a list of strings. Options that are not given
    /// keep their current values.
    pub fn parse_from_args(&mut self, args: &[String]) -> Result<(), clap::Error> {
        let matches = make_options_parser().try_get_matches_from(args.iter())?;

        if let Some(s) = matches.get_one::<String>("entry-func-name") {
            self.entry_func = Some(s.clone());
        }

        if let Some(pta_type) = matches.get_one::<String>("pta-type") {
            self.pta_type = match pta_type.as_str() {
                "andersen" | "ander" | "ci" => PTAType::Andersen,
                "callsite-sensitive" | "cs" => PTAType::CallSiteSensitive,
                "object-sensitive" | "obj" => PTAType::ObjectSensitive,
                _ => unreachable!(),
            }
        }

        if let Some(depth) = matches.get_one::<u32>("context-depth") {
            self.context_depth = *depth;
        }

        if let Some(heap_model) = matches.get_one::<String>("heap-model") {
            self.heap_model = match heap_model.as_str() {
                "alloc-site" => HeapModelType::AllocSite,
                "type" => HeapModelType::TypeBased,
                _ => unreachable!(),
            }
        }

        if matches.contains_id("dump-stats") {
            self.dump_stats = true;
        }
        if let Some(output) = matches.get_one::<String>("call-graph-output") {
            self.call_graph_output = Some(output.clone());
        }
        if let Some(output) = matches.get_one::<String>("pts-output") {
            self.pts_output = Some(output.clone());
        }
        if let Some(output) = matches.get_one::<String>("pfg-output") {
            self.pfg_output = Some(output.clone());
        }
        if let Some(input) = matches.get_one::<String>("INPUT") {
            self.input = Some(input.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parse_all_options() {
        let mut options = AnalysisOptions::default();
        options
            .parse_from_args(&args(&[
                "--pta-type",
                "obj",
                "--context-depth",
                "2",
                "--heap-model",
                "type",
                "--entry-func",
                "Main.main",
                "--dump-stats",
                "--dump-pts",
                "stdout",
                "--dump-call-graph",
                "cg.dot",
                "--dump-pfg",
                "pfg.dot",
                "prog.json",
            ]))
            .unwrap();
        assert_eq!(options.pta_type, PTAType::ObjectSensitive);
        assert_eq!(options.context_depth, 2);
        assert_eq!(options.heap_model, HeapModelType::TypeBased);
        assert_eq!(options.entry_func.as_deref(), Some("Main.main"));
        assert!(options.dump_stats);
        assert_eq!(options.pts_output.as_deref(), Some("stdout"));
        assert_eq!(options.call_graph_output.as_deref(), Some("cg.dot"));
        assert_eq!(options.pfg_output.as_deref(), Some("pfg.dot"));
        assert_eq!(options.input.as_deref(), Some("prog.json"));
    }

    #[test]
    fn later_parses_override_only_given_options() {
        let mut options = AnalysisOptions::default();
        options.parse_from_args(&args(&["--pta-type", "ci", "--context-depth", "3"])).unwrap();
        options.parse_from_args(&args(&["--context-depth", "2", "in.json"])).unwrap();
        assert_eq!(options.pta_type, PTAType::Andersen);
        assert_eq!(options.context_depth, 2);
        assert_eq!(options.input.as_deref(), Some("in.json"));
    }

    #[test]
    fn reject_unknown_values() {
        let mut options = AnalysisOptions::default();
        assert!(options.parse_from_args(&args(&["--pta-type", "flow"])).is_err());
        assert!(options.parse_from_args(&args(&["--context-depth", "deep"])).is_err());
        assert!(options.parse_from_args(&args(&["--no-such-flag"])).is_err());
    }
}
