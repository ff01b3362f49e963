// MarkFE binary: headless batch watermarking. All logic lives in the library;
// this only wires the session log and argument parsing together.

use std::process::ExitCode;

use clap::Parser;
use markfe::{cli, logger};

fn main() -> ExitCode {
    logger::init();
    let args = cli::CliArgs::parse();
    logger::set_echo(args.verbose);
    cli::run(args)
}
