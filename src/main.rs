//! profilegen CLI
//!
//! Entry point for the `profilegen` command-line tool.

use std::path::PathBuf;
use std::process;

use clap::{CommandFactory, Parser};

use profilegen::feeds::SystemRunner;
use profilegen::profile::ProfileStore;
use profilegen::{pipeline, reset};

#[derive(Parser)]
#[command(name = "profilegen")]
#[command(about = "Compose a build tree configuration from named profiles", version)]
#[command(after_help = "Keywords (recognized anywhere in the profile list):\n  \
    list            List available profiles\n  \
    clean           Clean up feeds related parts in the tree and exit\n  \
    help            Print this help")]
struct Cli {
    /// Profile names to merge, in order; later profiles take precedence
    /// for feed definitions
    #[arg(value_name = "PROFILE")]
    names: Vec<String>,

    /// Build tree to operate on
    #[arg(long, default_value = ".", value_name = "DIR")]
    root: PathBuf,

    /// Directory containing profile documents (default: $PROFILES, then
    /// <root>/profiles)
    #[arg(long, value_name = "DIR")]
    profiles: Option<PathBuf>,

    /// Output the profile listing as JSON
    #[arg(long)]
    json: bool,
}

fn main() {
    let cli = Cli::parse();
    let store = ProfileStore::resolve(cli.profiles.clone(), &cli.root);

    // The listing and help keywords short-circuit without side effects.
    if cli.names.iter().any(|n| n == "list") {
        run_list(&store, cli.json);
        return;
    }

    if cli.names.iter().any(|n| n == "help") {
        print_usage();
        return;
    }

    if cli.names.is_empty() {
        print_usage();
        process::exit(1);
    }

    if cli.names.iter().any(|n| n == "clean") {
        if let Err(e) = reset::reset_tree(&cli.root) {
            eprintln!("{e}");
            process::exit(1);
        }
        println!("Tree is now clean");
        return;
    }

    let mut runner = SystemRunner::new(cli.root.clone());
    if let Err(e) = pipeline::run(&cli.root, &store, &cli.names, &mut runner) {
        eprintln!("{e}");
        process::exit(1);
    }
}

fn run_list(store: &ProfileStore, json: bool) {
    let names = match store.list() {
        Ok(names) => names,
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    };

    if json {
        match serde_json::to_string_pretty(&names) {
            Ok(out) => println!("{out}"),
            Err(e) => {
                eprintln!("Error serializing output: {e}");
                process::exit(1);
            }
        }
    } else {
        println!("Profiles in {}", store.dir().display());
        for name in names {
            println!("{name}");
        }
    }
}

fn print_usage() {
    let mut cmd = Cli::command();
    let _ = cmd.print_help();
}
