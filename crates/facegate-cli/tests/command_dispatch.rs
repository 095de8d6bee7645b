use std::path::PathBuf;

use facegate_cli::cli::{
    Commands, EnrollArgs, ExchangeArgs, LoginArgs, LogoutArgs, StatusArgs, VerifyArgs,
};
use facegate_cli::commands::{
    handler_for, CommandHandler, EnrollHandler, SessionCommand, SessionHandler, VerifyHandler,
};

fn sample_enroll_args() -> EnrollArgs {
    EnrollArgs {
        employee_id: "E123".into(),
        image: PathBuf::from("face.jpg"),
        preview: None,
    }
}

fn sample_verify_args() -> VerifyArgs {
    VerifyArgs {
        image: None,
        camera: true,
        device: Some("/dev/video2".into()),
        preview: None,
    }
}

fn assert_dispatch<T: 'static>(command: Commands)
where
    T: CommandHandler,
{
    let handler: Box<dyn CommandHandler> = command.into();
    assert!(handler.as_any().is::<T>());
}

fn session_command(command: Commands) -> SessionCommand {
    let handler = handler_for(command, Some(PathBuf::from("/tmp/facegate.toml")));
    handler
        .as_any()
        .downcast_ref::<SessionHandler>()
        .expect("session handler")
        .command()
        .clone()
}

#[test]
fn enroll_command_dispatches_enroll_handler() {
    assert_dispatch::<EnrollHandler>(Commands::Enroll(sample_enroll_args()));
}

#[test]
fn verify_command_dispatches_verify_handler() {
    assert_dispatch::<VerifyHandler>(Commands::Verify(sample_verify_args()));
}

#[test]
fn session_commands_share_the_session_handler() {
    assert!(matches!(
        session_command(Commands::Login(LoginArgs {})),
        SessionCommand::Login
    ));
    assert!(matches!(
        session_command(Commands::Logout(LogoutArgs {})),
        SessionCommand::Logout
    ));
    assert!(matches!(
        session_command(Commands::Status(StatusArgs {})),
        SessionCommand::Status
    ));
    match session_command(Commands::Exchange(ExchangeArgs {
        code: "abc".into(),
    })) {
        SessionCommand::Exchange(args) => assert_eq!(args.code, "abc"),
        other => panic!("unexpected command: {other:?}"),
    }
}
