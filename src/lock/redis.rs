//! Redis lease backend: `SET key token NX EX ttl` to acquire, `DEL` to release.

use std::time::Duration;

use ::redis::aio::ConnectionManager;

use super::LockBackend;
use crate::error::Result;

/// Redis connection shared by all lock invocations of a process.
#[derive(Clone)]
pub struct RedisBackend {
    conn: ConnectionManager,
}

impl RedisBackend {
    /// Open a managed connection. Reconnects are handled by the manager.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = ::redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self { conn })
    }

    /// Remaining lifetime of `key` in whole seconds, `None` if absent.
    pub async fn ttl(&self, key: &str) -> Result<Option<u64>> {
        let mut conn = self.conn.clone();
        let secs: i64 = ::redis::cmd("TTL").arg(key).query_async(&mut conn).await?;
        // -2: no key, -1: no expiry
        Ok(u64::try_from(secs).ok())
    }
}

impl LockBackend for RedisBackend {
    async fn try_acquire(&self, key: &str, token: &str, ttl: Duration) -> Result<bool> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = ::redis::cmd("SET")
            .arg(key)
            .arg(token)
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn release(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _deleted: i64 = ::redis::cmd("DEL").arg(key).query_async(&mut conn).await?;
        Ok(())
    }

    async fn holder(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        let token: Option<String> = ::redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(token)
    }
}
