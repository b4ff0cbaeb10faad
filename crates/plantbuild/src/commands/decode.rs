//! `plantbuild decode` command implementation.

use clap::Args;
use plantbuild_diagrams::decode_token;

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the decode command.
#[derive(Args)]
pub(crate) struct DecodeArgs {
    /// Server token, or a server URL ending in one.
    token: String,
}

impl DecodeArgs {
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let source = decode_token(token_of(&self.token))?;
        Output::new().data(source.trim_end())?;
        Ok(())
    }
}

/// The token part of a diagram URL (`.../<format>/<token>`), or the input.
fn token_of(input: &str) -> &str {
    let input = input.trim().trim_end_matches('/');
    if input.contains("://") {
        input.rsplit('/').next().unwrap_or(input)
    } else {
        input
    }
}
