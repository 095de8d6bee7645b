use std::any::Any;
use std::path::PathBuf;
use std::process::ExitCode;

use crate::cli::{Commands, OutputMode};
use crate::errors::AppResult;

pub trait CommandHandler: Send + Sync {
    fn execute(&self, mode: OutputMode, verbose: bool) -> AppResult<ExitCode>;
    fn as_any(&self) -> &dyn Any;
}

mod enroll;
mod session;
mod verify;

pub use enroll::EnrollHandler;
pub use session::{SessionCommand, SessionHandler, SessionHandlerDeps};
pub use verify::VerifyHandler;

/// Build the handler for `command`, reading configuration from
/// `config_path` before the system locations.
pub fn handler_for(command: Commands, config_path: Option<PathBuf>) -> Box<dyn CommandHandler> {
    match command {
        Commands::Login(_) => Box::new(SessionHandler::new(SessionCommand::Login, config_path)),
        Commands::Exchange(args) => Box::new(SessionHandler::new(
            SessionCommand::Exchange(args),
            config_path,
        )),
        Commands::Logout(_) => Box::new(SessionHandler::new(SessionCommand::Logout, config_path)),
        Commands::Status(_) => Box::new(SessionHandler::new(SessionCommand::Status, config_path)),
        Commands::Enroll(args) => Box::new(EnrollHandler::new(args, config_path)),
        Commands::Verify(args) => Box::new(VerifyHandler::new(args, config_path)),
    }
}

impl From<Commands> for Box<dyn CommandHandler> {
    fn from(command: Commands) -> Self {
        handler_for(command, None)
    }
}
