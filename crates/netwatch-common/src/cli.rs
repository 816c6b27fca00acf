//! CLI parsing that honors the process exit-code policy.
//!
//! `clap::Parser::parse()` exits the process itself on a bad argument or
//! missing required env var, with clap's own exit code (2). That collides
//! with this platform's convention that a configuration error is exit code
//! 1 and a bind failure is exit code 2 — so every binary parses through
//! [`parse_or_exit`] instead of calling `Parser::parse()` directly.

use std::process::ExitCode;

use clap::Parser;

/// Parse CLI args/env vars, printing clap's usage message and returning
/// exit code 1 on failure instead of letting clap exit with its own code.
pub fn parse_or_exit<T: Parser>() -> Result<T, ExitCode> {
    match T::try_parse() {
        Ok(cli) => Ok(cli),
        Err(e) => {
            let _ = e.print();
            Err(ExitCode::from(1))
        }
    }
}
