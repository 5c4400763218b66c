pub mod error;
pub mod runner;
pub mod ytdlp;

pub use error::ProcessError;
pub use runner::{CommandSpec, OutputLine, ProcessHandle, ProcessOutcome, ProcessRunner, StreamKind};
pub use ytdlp::{PlaylistEntry, YtDlp};
