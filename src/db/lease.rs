//! Lease rows in `single_instance_locks`.
//!
//! Acquisition is one statement: insert the row, or overwrite it only if
//! the existing lease has expired. The primary key makes concurrent
//! inserters serialize on the row, so at most one of them gets a row back.

use std::time::Duration;

use crate::error::Result;
use crate::lock::LockBackend;

impl super::Db {
    /// Delete every expired lease. Returns how many rows went away.
    ///
    /// Expired rows never block acquisition; this only keeps the table small.
    pub async fn purge_expired_leases(&self) -> Result<u64> {
        let purged = sqlx::query("DELETE FROM single_instance_locks WHERE expires_at <= now()")
            .execute(self.pool())
            .await?
            .rows_affected();
        Ok(purged)
    }
}

impl LockBackend for super::Db {
    async fn try_acquire(&self, key: &str, token: &str, ttl: Duration) -> Result<bool> {
        let row: Option<(String,)> = sqlx::query_as(
            "INSERT INTO single_instance_locks (lock_key, token, acquired_at, expires_at)
             VALUES ($1, $2, now(), now() + make_interval(secs => $3))
             ON CONFLICT (lock_key) DO UPDATE
                 SET token = EXCLUDED.token,
                     acquired_at = EXCLUDED.acquired_at,
                     expires_at = EXCLUDED.expires_at
                 WHERE single_instance_locks.expires_at <= now()
             RETURNING lock_key",
        )
        .bind(key)
        .bind(token)
        .bind(ttl.as_secs_f64())
        .fetch_optional(self.pool())
        .await?;
        Ok(row.is_some())
    }

    async fn release(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM single_instance_locks WHERE lock_key = $1")
            .bind(key)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    async fn holder(&self, key: &str) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT token FROM single_instance_locks WHERE lock_key = $1 AND expires_at > now()",
        )
        .bind(key)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(|(token,)| token))
    }
}
