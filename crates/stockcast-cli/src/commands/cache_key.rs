use stockcast_core::key_for;

use crate::cli::RangeArgs;
use crate::error::CliError;

use super::CommandOutput;

pub fn run(args: &RangeArgs) -> Result<CommandOutput, CliError> {
    let request = super::history_request(args)?;
    Ok(CommandOutput::CacheKey(key_for(&request)))
}
