// intercut-cli/src/main.rs
//
// Entry point of the `intercut` binary: parses the command line, installs
// console logging for the quick commands, runs the selected command and maps
// its result onto the exit status.

use clap::Parser;
use console::style;
use intercut_cli::logging::init_logging;
use intercut_cli::{Cli, Commands, run_cut, run_encoders, run_info, run_preview};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let (json, verbose) = (cli.json, cli.verbose);
    let result = match cli.command {
        // `cut` installs its own logger once it knows the log directory.
        Commands::Cut(args) => run_cut(args, json, verbose),
        Commands::Info(args) => init_logging(verbose, None).and_then(|_| run_info(args, json)),
        Commands::Encoders(args) => {
            init_logging(verbose, None).and_then(|_| run_encoders(args, json))
        }
        Commands::Preview(args) => {
            init_logging(verbose, None).and_then(|_| run_preview(args, json))
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {e:#}", style("Error:").red().bold());
            ExitCode::FAILURE
        }
    }
}
