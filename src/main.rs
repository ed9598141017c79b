use std::process::ExitCode;

fn main() -> ExitCode {
    match inspektline::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}
