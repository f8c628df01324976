//! Custom command plug-ins.
//!
//! A plug-in is selected by the file stem of `--custom-command-file` and
//! resolved against a static registry of compiled-in implementations. The
//! core passes `--custom-command-args` through unchanged; parsing it is the
//! plug-in's concern.

mod hmget;
mod ping;

pub use hmget::Hmget;
pub use ping::Ping;

use async_trait::async_trait;

use crate::client::KvClient;
use crate::errors::{ConfigError, Error};

/// The two-method plug-in capability: construction with an optional args
/// string, and one execution per operation. Each worker loads its own
/// instance once and retains it for the run.
#[async_trait]
pub trait CustomCommand: Send {
    async fn execute(&mut self, client: &mut KvClient) -> Result<(), Error>;
}

pub fn is_registered(name: &str) -> bool {
    matches!(name, "hmget" | "ping")
}

pub fn load(name: &str, args: Option<&str>) -> Result<Box<dyn CustomCommand>, Error> {
    match name {
        "hmget" => Ok(Box::new(Hmget::new(args))),
        "ping" => Ok(Box::new(Ping)),
        _ => Err(ConfigError::UnknownCustomCommand(name.to_string()).into()),
    }
}
