pub mod args;
pub mod logger;

pub use args::{parse, Args, LogLevel, OperationKind, RampMode};
pub use logger::init_logging;
