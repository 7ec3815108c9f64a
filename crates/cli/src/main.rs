use std::process::ExitCode;

fn main() -> ExitCode {
    chairside_cli::run()
}
