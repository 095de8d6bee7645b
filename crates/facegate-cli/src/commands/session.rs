use std::any::Any;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::cli::{ExchangeArgs, OutputMode};
use crate::commands::CommandHandler;
use crate::errors::AppResult;
use crate::output::render_session;
use crate::session::{self, SessionOutcome};

#[derive(Debug, Clone)]
pub enum SessionCommand {
    Login,
    Exchange(ExchangeArgs),
    Logout,
    Status,
}

type SessionRun = Box<dyn Fn(Option<&Path>) -> AppResult<SessionOutcome> + Send + Sync>;

pub struct SessionHandler {
    command: SessionCommand,
    config_path: Option<PathBuf>,
    deps: SessionHandlerDeps,
}

pub struct SessionHandlerDeps {
    pub login: SessionRun,
    pub exchange:
        Box<dyn Fn(Option<&Path>, &ExchangeArgs) -> AppResult<SessionOutcome> + Send + Sync>,
    pub logout: SessionRun,
    pub status: SessionRun,
    pub render: Box<dyn Fn(&SessionOutcome, OutputMode) -> AppResult<()> + Send + Sync>,
}

impl SessionHandlerDeps {
    pub fn new(
        login: impl Fn(Option<&Path>) -> AppResult<SessionOutcome> + Send + Sync + 'static,
        exchange: impl Fn(Option<&Path>, &ExchangeArgs) -> AppResult<SessionOutcome>
            + Send
            + Sync
            + 'static,
        logout: impl Fn(Option<&Path>) -> AppResult<SessionOutcome> + Send + Sync + 'static,
        status: impl Fn(Option<&Path>) -> AppResult<SessionOutcome> + Send + Sync + 'static,
        render: impl Fn(&SessionOutcome, OutputMode) -> AppResult<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            login: Box::new(login),
            exchange: Box::new(exchange),
            logout: Box::new(logout),
            status: Box::new(status),
            render: Box::new(render),
        }
    }
}

impl Default for SessionHandlerDeps {
    fn default() -> Self {
        Self::new(
            session::run_login,
            session::run_exchange,
            session::run_logout,
            session::run_status,
            render_session,
        )
    }
}

impl SessionHandler {
    pub fn new(command: SessionCommand, config_path: Option<PathBuf>) -> Self {
        Self::with_dependencies(command, config_path, SessionHandlerDeps::default())
    }

    pub fn with_dependencies(
        command: SessionCommand,
        config_path: Option<PathBuf>,
        deps: SessionHandlerDeps,
    ) -> Self {
        Self {
            command,
            config_path,
            deps,
        }
    }

    pub fn command(&self) -> &SessionCommand {
        &self.command
    }
}

impl CommandHandler for SessionHandler {
    fn execute(&self, mode: OutputMode, _verbose: bool) -> AppResult<ExitCode> {
        let config_path = self.config_path.as_deref();
        let outcome = match self.command() {
            SessionCommand::Login => (self.deps.login)(config_path)?,
            SessionCommand::Exchange(args) => (self.deps.exchange)(config_path, args)?,
            SessionCommand::Logout => (self.deps.logout)(config_path)?,
            SessionCommand::Status => (self.deps.status)(config_path)?,
        };
        (self.deps.render)(&outcome, mode)?;
        Ok(outcome.exit_code())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
