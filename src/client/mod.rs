//! Thin seam over the datastore client library.
//!
//! The core never touches the wire protocol; everything goes through the
//! `redis` crate. Standalone connections are multiplexed, cluster
//! connections are routed by the library. Both timeouts of the run config
//! are enforced here so callers see a single error surface.

use std::time::Duration;

use log::warn;
use redis::aio::MultiplexedConnection;
use redis::cluster::ClusterClientBuilder;
use redis::cluster_async::ClusterConnection;
use redis::{FromRedisValue, RedisError, Value};

use crate::config::RunConfig;
use crate::errors::Error;

enum Conn {
    Standalone(MultiplexedConnection),
    Cluster(ClusterConnection),
}

/// One live connection to the server, exclusively lent to a single
/// in-flight call at a time by the pool.
pub struct KvClient {
    conn: Conn,
    request_timeout: Option<Duration>,
}

impl KvClient {
    pub async fn connect(config: &RunConfig) -> Result<KvClient, Error> {
        if config.read_from_replica && !config.cluster {
            warn!("--read-from-replica has no effect without --cluster");
        }
        let url = connection_url(config);
        let connect = async {
            if config.cluster {
                let mut builder = ClusterClientBuilder::new(vec![url.clone()]);
                if config.read_from_replica {
                    builder = builder.read_from_replicas();
                }
                let conn = builder.build()?.get_async_connection().await?;
                Ok::<Conn, RedisError>(Conn::Cluster(conn))
            } else {
                let client = redis::Client::open(url.as_str())?;
                Ok(Conn::Standalone(
                    client.get_multiplexed_async_connection().await?,
                ))
            }
        };
        let conn = match config.connection_timeout {
            Some(limit) => tokio::time::timeout(limit, connect)
                .await
                .map_err(|_| Error::ConnectTimeout(config.address()))?,
            None => connect.await,
        }
        .map_err(|source| Error::ConnectFailed {
            addr: config.address(),
            source,
        })?;

        Ok(KvClient {
            conn,
            request_timeout: config.request_timeout,
        })
    }

    pub async fn set(&mut self, key: &str, value: &[u8]) -> Result<(), Error> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        self.execute::<()>(&cmd).await
    }

    pub async fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>, Error> {
        let mut cmd = redis::cmd("GET");
        cmd.arg(key);
        self.execute(&cmd).await
    }

    /// Run an arbitrary command; custom command plug-ins go through here.
    pub async fn command(&mut self, cmd: &redis::Cmd) -> Result<Value, Error> {
        self.execute(cmd).await
    }

    async fn execute<T: FromRedisValue>(&mut self, cmd: &redis::Cmd) -> Result<T, Error> {
        let query = async {
            match &mut self.conn {
                Conn::Standalone(conn) => cmd.query_async(conn).await,
                Conn::Cluster(conn) => cmd.query_async(conn).await,
            }
        };
        match self.request_timeout {
            Some(limit) => match tokio::time::timeout(limit, query).await {
                Ok(result) => result.map_err(Error::Request),
                Err(_) => Err(Error::RequestTimeout),
            },
            None => query.await.map_err(Error::Request),
        }
    }
}

fn connection_url(config: &RunConfig) -> String {
    let scheme = if config.tls { "rediss" } else { "redis" };
    format!("{scheme}://{}:{}", config.host, config.port)
}
