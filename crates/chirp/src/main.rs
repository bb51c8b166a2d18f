//! Chirp.
//!
//! Chirp renders a locally stored tweet timeline to the terminal. It decodes
//! the timeline from a JSON file, downloads the avatars it references (each
//! one exactly once, however often it appears), and prints the tweets with
//! their mentions and links highlighted.

#![warn(missing_docs, missing_debug_implementations, clippy::all)]

mod cli;
mod logging;
mod output;

fn main() {
    match cli::execute() {
        Ok(()) => std::process::exit(0),
        Err(error) => {
            logging::ensure_log_error(&error);
            std::process::exit(1);
        }
    }
}
