use std::process::ExitCode;

fn main() -> ExitCode {
    askforce_cli::run()
}
