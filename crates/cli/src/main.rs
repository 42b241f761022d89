use std::process::ExitCode;

fn main() -> ExitCode {
    acadia_cli::run()
}
