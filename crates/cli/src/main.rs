use std::process::ExitCode;

fn main() -> ExitCode {
    courier_cli::run()
}
