// Host transport - JSON lines on stdin
//
// The dashboard side writes one command object per line. Lines that fail to
// decode are logged and skipped; EOF closes the command channel.

use std::io::{self, BufRead};
use std::thread::{self, JoinHandle};

use log::{debug, info, warn};

use crate::messaging::channels::CommandSender;
use crate::messaging::command::Command;

/// Forward every decodable line to `commands`.
/// Returns the number of commands forwarded once the reader is exhausted or the
/// player has gone away.
pub fn forward_commands<R: BufRead>(reader: R, commands: &CommandSender) -> usize {
    let mut forwarded = 0;

    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("Failed to read host message: {}", e);
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match Command::from_json(line) {
            Ok(command) => {
                debug!("Host message decoded: {}", command);
                if commands.send(command).is_err() {
                    debug!("Player gone, dropping remaining host messages");
                    break;
                }
                forwarded += 1;
            }
            Err(e) => warn!("Ignoring host message {:?}: {}", line, e),
        }
    }

    forwarded
}

/// Read host messages from stdin on a background thread
pub fn spawn_stdin_reader(commands: CommandSender) -> io::Result<JoinHandle<usize>> {
    thread::Builder::new()
        .name("host-messages".to_string())
        .spawn(move || {
            let forwarded = forward_commands(io::stdin().lock(), &commands);
            info!("Host input closed after {} command(s)", forwarded);
            forwarded
        })
}
