use std::process::ExitCode;

use contagion::runner::run;

fn main() -> ExitCode {
    match run() {
        Ok(_) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("contagion: {error}");
            ExitCode::FAILURE
        }
    }
}
