//! Command dispatch and handlers.

pub mod update;
pub mod validate;

use crate::cli::Command;
use crate::context::ServiceContext;

/// Dispatch a parsed command to its handler.
///
/// # Errors
///
/// Returns an error string if the selected command handler fails.
pub fn dispatch(command: &Command) -> Result<(), String> {
    let ctx = ServiceContext::live();
    dispatch_with_context(command, &ctx)
}

/// Dispatch a command with the given service context.
fn dispatch_with_context(command: &Command, ctx: &ServiceContext) -> Result<(), String> {
    match command {
        Command::Update { input, output, root, accept_master } => {
            update::run(ctx, input, output, root, accept_master.as_deref())
                .map_err(|e| format!("Error: {e}"))
        }
        Command::Validate { path } => {
            validate::run(ctx, path).map_err(|e| format!("Error: {e}"))
        }
    }
}
