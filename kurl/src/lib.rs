pub mod credential_cache;
pub mod hostname;
pub mod profile;
pub mod request;
pub mod spnego;
pub mod ticket;
pub mod transport;

use std::process::ExitCode;

/// Renders a fatal error in the tool's `ERROR:` style and picks the
/// process exit code. Every fatal path ends here; there is no retry.
pub fn error_prefixed_exit_code(progname: &str, result: anyhow::Result<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("ERROR: {}: {:#}", progname, err);
            ExitCode::FAILURE
        }
    }
}
