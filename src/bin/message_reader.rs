//! Print the current message of a channel of a slot.
//!
//! ```bash
//! message_reader /dev/msgslot1 5
//! ```
//!
//! The message bytes are written to stdout exactly, without a trailing
//! newline. Exits 0 on success, 1 with a diagnostic on stderr otherwise.

use std::process::ExitCode;

use message_slot::cli::{self, CliCommand};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("off")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let stdout = std::io::stdout();
    match cli::reader_main(&args, stdout.lock()).await {
        Ok(read) => {
            log::debug!("read {} bytes", read);
            ExitCode::SUCCESS
        }
        Err(e) => {
            cli::report_failure(CliCommand::Read, &e);
            ExitCode::FAILURE
        }
    }
}
