use async_trait::async_trait;

use super::CustomCommand;
use crate::client::KvClient;
use crate::errors::Error;

const DEFAULT_KEY: &str = "key:hash";
const DEFAULT_FIELDS: [&str; 2] = ["f0", "f1"];

/// HMGET against a fixed hash.
///
/// Args format: `<key> [field ...]`, e.g. `user:1 name email`.
pub struct Hmget {
    key: String,
    fields: Vec<String>,
}

impl Hmget {
    pub fn new(args: Option<&str>) -> Hmget {
        let mut tokens = args.unwrap_or("").split_whitespace();
        let key = tokens
            .next()
            .map(str::to_string)
            .unwrap_or_else(|| DEFAULT_KEY.to_string());
        let mut fields: Vec<String> = tokens.map(str::to_string).collect();
        if fields.is_empty() {
            fields = DEFAULT_FIELDS.iter().map(|f| f.to_string()).collect();
        }
        Hmget { key, fields }
    }
}

#[async_trait]
impl CustomCommand for Hmget {
    async fn execute(&mut self, client: &mut KvClient) -> Result<(), Error> {
        let mut cmd = redis::cmd("HMGET");
        cmd.arg(&self.key);
        for field in &self.fields {
            cmd.arg(field);
        }
        client.command(&cmd).await.map(|_| ())
    }
}
