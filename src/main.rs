//! azqr - command-line entry point

use std::process::ExitCode;

use azqr::cli::CliApp;

#[tokio::main]
async fn main() -> ExitCode {
    let result = match CliApp::new() {
        Ok(app) => app.run().await,
        Err(err) => Err(err),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::from(azqr::cli::exit_codes::ERROR)
        }
    }
}
