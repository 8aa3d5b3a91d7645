//! Binary entrypoint for the `sizeledger` CLI.

use std::process::ExitCode;

fn main() -> ExitCode {
    match sizeledger::run(std::env::args()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
