//! Write one message to a channel of a slot.
//!
//! ```bash
//! message_sender /dev/msgslot1 5 hello
//! ```
//!
//! Exits 0 on success, 1 with a diagnostic on stderr otherwise.

use std::process::ExitCode;

use message_slot::cli::{self, CliCommand};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("off")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match cli::sender_main(&args).await {
        Ok(written) => {
            log::debug!("wrote {} bytes", written);
            ExitCode::SUCCESS
        }
        Err(e) => {
            cli::report_failure(CliCommand::Send, &e);
            ExitCode::FAILURE
        }
    }
}
