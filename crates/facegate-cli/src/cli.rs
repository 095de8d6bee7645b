use std::path::PathBuf;

use clap::{ArgGroup, Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "facegate",
    about = "Enroll faces and verify identity through presigned uploads",
    version
)]
pub struct Cli {
    /// Emit structured JSON to stdout instead of human-readable output
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase verbosity (may be used multiple times)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Configuration file checked before the system locations
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print the hosted sign-in URL
    Login(LoginArgs),
    /// Exchange an authorization code for a session token
    Exchange(ExchangeArgs),
    /// Forget the session token and print the sign-out URL
    Logout(LogoutArgs),
    /// Show whether a session token is stored
    Status(StatusArgs),
    /// Upload a reference image and enroll it under an employee id
    Enroll(EnrollArgs),
    /// Upload a capture and ask the gate for an identity decision
    Verify(VerifyArgs),
}

#[derive(Debug, Clone, Args, Default)]
pub struct LoginArgs {}

#[derive(Debug, Clone, Args)]
pub struct ExchangeArgs {
    /// Authorization code from the sign-in redirect
    #[arg(long)]
    pub code: String,
}

#[derive(Debug, Clone, Args, Default)]
pub struct LogoutArgs {}

#[derive(Debug, Clone, Args, Default)]
pub struct StatusArgs {}

#[derive(Debug, Clone, Args)]
pub struct EnrollArgs {
    /// Identifier the face is enrolled under
    #[arg(long)]
    pub employee_id: String,

    /// Reference image (jpg, png, webp, gif, bmp or tiff)
    #[arg(long)]
    pub image: PathBuf,

    /// Also write the uploaded image to this path
    #[arg(long)]
    pub preview: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
#[command(group(ArgGroup::new("source").required(true).multiple(false).args(["image", "camera"])))]
pub struct VerifyArgs {
    /// Image file to verify
    #[arg(long)]
    pub image: Option<PathBuf>,

    /// Grab a frame from the camera instead of reading a file
    #[arg(long)]
    pub camera: bool,

    /// Video device path (e.g. /dev/video2) or index (e.g. 0); camera only
    #[arg(long)]
    pub device: Option<String>,

    /// Also write the uploaded image to this path
    #[arg(long)]
    pub preview: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

impl From<bool> for OutputMode {
    fn from(json: bool) -> Self {
        if json {
            OutputMode::Json
        } else {
            OutputMode::Human
        }
    }
}

impl Cli {
    pub fn output_mode(&self) -> OutputMode {
        OutputMode::from(self.json)
    }
}
