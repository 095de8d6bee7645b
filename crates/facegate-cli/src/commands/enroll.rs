use std::any::Any;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::cli::{EnrollArgs, OutputMode};
use crate::commands::CommandHandler;
use crate::errors::AppResult;
use crate::flows::{self, RunSummary};
use crate::output::render_run;

pub struct EnrollHandler {
    args: EnrollArgs,
    config_path: Option<PathBuf>,
    run: Box<dyn Fn(Option<&Path>, &EnrollArgs) -> AppResult<RunSummary> + Send + Sync>,
    render: Box<dyn Fn(&RunSummary, OutputMode, bool) -> AppResult<()> + Send + Sync>,
}

impl EnrollHandler {
    pub fn new(args: EnrollArgs, config_path: Option<PathBuf>) -> Self {
        Self::with_dependencies(args, config_path, flows::run_enroll, render_run)
    }

    pub fn with_dependencies(
        args: EnrollArgs,
        config_path: Option<PathBuf>,
        run: impl Fn(Option<&Path>, &EnrollArgs) -> AppResult<RunSummary> + Send + Sync + 'static,
        render: impl Fn(&RunSummary, OutputMode, bool) -> AppResult<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            args,
            config_path,
            run: Box::new(run),
            render: Box::new(render),
        }
    }
}

impl CommandHandler for EnrollHandler {
    fn execute(&self, mode: OutputMode, verbose: bool) -> AppResult<ExitCode> {
        let summary = (self.run)(self.config_path.as_deref(), &self.args)?;
        (self.render)(&summary, mode, verbose)?;
        Ok(summary.exit_code())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
