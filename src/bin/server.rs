//! Glossy Chat server binary.
//! Run with: cargo run --bin glossy-server

use std::process::ExitCode;

use glossy_chat::start_glossy_chat;

fn main() -> ExitCode {
    start_glossy_chat::run()
}
