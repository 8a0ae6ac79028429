//! kansync-store-local - file-backed store provider for kansync
//!
//! This binary implements the kansync store protocol, communicating
//! with the kansync CLI via JSON over stdin/stdout. Documents live in a
//! single JSON file (the `path` entry of the request's store config, or
//! the platform data directory by default).

mod store;

use std::io::{self, BufRead, Write};

use kansync_core::remote::protocol::{Request, ResponseLine};

use store::LocalStore;

#[tokio::main]
async fn main() {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut store = LocalStore::new();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                eprintln!("Failed to read stdin: {}", e);
                break;
            }
        };

        // Skip empty lines
        if line.trim().is_empty() {
            continue;
        }

        let request: Request = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(e) => {
                // No seq to echo; u64::MAX never collides with a real call.
                let response =
                    ResponseLine::error(u64::MAX, &format!("Failed to parse request: {}", e), None);
                if writeln!(stdout, "{}", response).and_then(|()| stdout.flush()).is_err() {
                    break;
                }
                continue;
            }
        };

        let mut closed = false;
        for out in store.handle(request).await {
            if writeln!(stdout, "{}", out).is_err() {
                closed = true;
                break;
            }
        }
        if closed || stdout.flush().is_err() {
            break;
        }
    }
}
