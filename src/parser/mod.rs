pub mod detector;
pub mod progress;

pub use detector::{SourceKind, detect_source_kind};
pub use progress::{ParsedLine, ProgressParser};
