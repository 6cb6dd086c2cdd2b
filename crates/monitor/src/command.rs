//! Command channel
//!
//! Reads control lines on a dedicated thread and runs each eject request
//! to completion before reading the next line. Unrecognized lines are
//! ignored and end of input stops the thread.

use crate::usb::backend::EjectBackend;
use crate::usb::eject::EjectOrchestrator;
use protocol::Command;
use std::io::{self, BufRead};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, error, info, warn};

/// Process control lines until end of input
///
/// Returns the number of commands executed.
pub fn run_command_reader<R, B>(mut reader: R, orchestrator: &EjectOrchestrator<B>) -> usize
where
    R: BufRead,
    B: EjectBackend,
{
    let mut buffer = Vec::new();
    let mut handled = 0;

    loop {
        buffer.clear();
        match reader.read_until(b'\n', &mut buffer) {
            Ok(0) => {
                info!("Command input closed");
                break;
            }
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                error!("Failed to read command input: {}", e);
                break;
            }
        }

        let line = String::from_utf8_lossy(&buffer);
        match Command::parse(&line) {
            Some(command) => {
                handle_command(orchestrator, command);
                handled += 1;
            }
            None => debug!("Ignoring control line: {:?}", line.trim_end()),
        }
    }

    handled
}

fn handle_command<B: EjectBackend>(orchestrator: &EjectOrchestrator<B>, command: Command) {
    // A panic in one request must not stop the reader
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| match command {
        Command::SafeEject { target } => {
            info!("Received safe eject command for: {}", target);
            orchestrator.safe_eject(&target)
        }
    }));

    if let Err(e) = result {
        error!("Panic in command handler: {:?}", e);
    }
}

/// Spawn the command reader thread
pub fn spawn_command_reader<R, B>(
    reader: R,
    orchestrator: Arc<EjectOrchestrator<B>>,
) -> io::Result<JoinHandle<usize>>
where
    R: BufRead + Send + 'static,
    B: EjectBackend + 'static,
{
    std::thread::Builder::new()
        .name("command-reader".to_string())
        .spawn(move || {
            let handled = run_command_reader(reader, &*orchestrator);
            warn!("Command reader stopped after {} command(s)", handled);
            handled
        })
}
