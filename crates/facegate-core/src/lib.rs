//! Client side of the facegate upload-and-verify flow.
//!
//! Images never go to the decision service directly: they are written to
//! object storage through a presigned grant, and only the object key is
//! handed to `/enroll` or `/verify`.

pub mod capture;
pub mod credentials;
pub mod decision;
pub mod errors;
mod http;
pub mod identity;
pub mod object;
pub mod projector;
pub mod transfer;
pub mod workflow;

pub use errors::{AppError, AppResult};
pub use http::build_client;
