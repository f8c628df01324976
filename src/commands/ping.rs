use async_trait::async_trait;

use super::CustomCommand;
use crate::client::KvClient;
use crate::errors::Error;

/// Round-trip probe without any payload.
pub struct Ping;

#[async_trait]
impl CustomCommand for Ping {
    async fn execute(&mut self, client: &mut KvClient) -> Result<(), Error> {
        client.command(&redis::cmd("PING")).await.map(|_| ())
    }
}
