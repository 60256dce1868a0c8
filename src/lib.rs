// Library surface for the binary, headless tests and reuse.
// Nothing here depends on the terminal front end in main.rs.
pub mod app_dirs;
pub mod clock;
pub mod commands;
pub mod config;
pub mod controller;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod recorder;
pub mod runtime;
pub mod session;
pub mod ticker;
pub mod util;

pub use commands::Command;
pub use controller::{Dispatch, SessionController, SessionEvent, Snapshot};
pub use error::RecordError;
pub use session::{Category, Phase, SessionState};
