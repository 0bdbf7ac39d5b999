//! PostgreSQL ledger, role registry and result log.
#![allow(clippy::needless_raw_string_hashes)]

use super::{Ledger, LedgerError, LedgerResult, ResultLog, RoleRegistry, models::RoleRecord};
use crate::battle::{BattleRecord, ResourceAmount, ResourceKind, RoleId};
use crate::db::Database;
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Row, Transaction, types::Json};
use std::{future::Future, time::Duration};

/// Collaborator implementation over a PostgreSQL pool
#[derive(Clone)]
pub struct PgLedger {
    pool: PgPool,
    query_timeout: Duration,
    begin_timeout: Duration,
}

impl PgLedger {
    /// Ledger sharing a [`Database`] pool and its configured deadlines
    pub fn from_database(database: &Database) -> Self {
        Self {
            pool: database.pool().clone(),
            query_timeout: database.query_timeout(),
            begin_timeout: database.begin_timeout(),
        }
    }

    async fn begin(&self) -> LedgerResult<Transaction<'static, Postgres>> {
        bounded(self.begin_timeout, self.pool.begin()).await
    }

    /// Apply one signed adjustment inside an open transaction
    ///
    /// # Returns
    ///
    /// * `LedgerResult<i64>` - Balance after the adjustment, or the recorded
    ///   balance when the idempotency key was already used
    async fn apply(
        tx: &mut Transaction<'_, Postgres>,
        owner: RoleId,
        delta: ResourceAmount,
        idempotency_key: &str,
        description: &str,
    ) -> LedgerResult<i64> {
        if delta.quantity == 0 {
            return Err(LedgerError::InvalidAmount(0));
        }

        let existing =
            sqlx::query("SELECT balance_after FROM resource_entries WHERE idempotency_key = $1")
                .bind(idempotency_key)
                .fetch_optional(&mut **tx)
                .await?;

        if let Some(row) = existing {
            return Ok(row.get("balance_after"));
        }

        let kind = delta.kind.to_string();
        let new_balance: i64 = if delta.quantity < 0 {
            let amount = -delta.quantity;

            // Check and debit in one statement so concurrent debits cannot overdraw
            let debited = sqlx::query(
                "UPDATE role_resources
                 SET balance = balance - $1, updated_at = NOW()
                 WHERE owner_id = $2 AND kind = $3 AND resource_id = $4 AND balance >= $1
                 RETURNING balance",
            )
            .bind(amount)
            .bind(owner)
            .bind(&kind)
            .bind(delta.resource_id)
            .fetch_optional(&mut **tx)
            .await?;

            match debited {
                Some(row) => row.get("balance"),
                None => {
                    let available = sqlx::query(
                        "SELECT balance FROM role_resources
                         WHERE owner_id = $1 AND kind = $2 AND resource_id = $3",
                    )
                    .bind(owner)
                    .bind(&kind)
                    .bind(delta.resource_id)
                    .fetch_optional(&mut **tx)
                    .await?
                    .map(|row| row.get::<i64, _>("balance"))
                    .unwrap_or(0);

                    return Err(LedgerError::InsufficientBalance {
                        owner,
                        resource_id: delta.resource_id,
                        available,
                        required: amount,
                    });
                }
            }
        } else {
            let row = sqlx::query(
                "INSERT INTO role_resources (owner_id, kind, resource_id, balance, updated_at)
                 VALUES ($1, $2, $3, $4, NOW())
                 ON CONFLICT (owner_id, kind, resource_id)
                 DO UPDATE SET
                    balance = role_resources.balance + EXCLUDED.balance,
                    updated_at = NOW()
                 RETURNING balance",
            )
            .bind(owner)
            .bind(&kind)
            .bind(delta.resource_id)
            .bind(delta.quantity)
            .fetch_one(&mut **tx)
            .await?;
            row.get("balance")
        };

        sqlx::query(
            r#"
            INSERT INTO resource_entries (owner_id, kind, resource_id, amount, balance_after, idempotency_key, description)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(owner)
        .bind(&kind)
        .bind(delta.resource_id)
        .bind(delta.quantity)
        .bind(new_balance)
        .bind(idempotency_key)
        .bind(description)
        .execute(&mut **tx)
        .await?;

        Ok(new_balance)
    }

    /// Lock the role row, creating it first if needed, and return its enrollment flag
    async fn lock_role(
        tx: &mut Transaction<'_, Postgres>,
        role_id: RoleId,
    ) -> LedgerResult<Option<String>> {
        sqlx::query("INSERT INTO battle_roles (role_id) VALUES ($1) ON CONFLICT (role_id) DO NOTHING")
            .bind(role_id)
            .execute(&mut **tx)
            .await?;

        let row = sqlx::query("SELECT enrolled_desk FROM battle_roles WHERE role_id = $1 FOR UPDATE")
            .bind(role_id)
            .fetch_one(&mut **tx)
            .await?;

        Ok(row.get("enrolled_desk"))
    }
}

#[async_trait]
impl Ledger for PgLedger {
    async fn balance(
        &self,
        owner: RoleId,
        kind: ResourceKind,
        resource_id: i32,
    ) -> LedgerResult<i64> {
        let row = bounded(
            self.query_timeout,
            sqlx::query(
                "SELECT balance FROM role_resources WHERE owner_id = $1 AND kind = $2 AND resource_id = $3",
            )
            .bind(owner)
            .bind(kind.to_string())
            .bind(resource_id)
            .fetch_optional(&self.pool),
        )
        .await?;

        Ok(row.map(|row| row.get("balance")).unwrap_or(0))
    }

    async fn adjust_balance(
        &self,
        owner: RoleId,
        delta: ResourceAmount,
        idempotency_key: &str,
    ) -> LedgerResult<i64> {
        let mut tx = self.begin().await?;
        let balance = Self::apply(&mut tx, owner, delta, idempotency_key, "Balance adjustment").await?;
        tx.commit().await?;
        Ok(balance)
    }
}

#[async_trait]
impl RoleRegistry for PgLedger {
    async fn role(&self, role_id: RoleId) -> LedgerResult<RoleRecord> {
        let row = bounded(
            self.query_timeout,
            sqlx::query(
                "SELECT role_id, enrolled_desk, battle_count, tutorial_done
                 FROM battle_roles
                 WHERE role_id = $1",
            )
            .bind(role_id)
            .fetch_optional(&self.pool),
        )
        .await?;

        Ok(match row {
            Some(row) => RoleRecord {
                role_id: row.get("role_id"),
                enrolled_desk: row.get("enrolled_desk"),
                battle_count: row.get("battle_count"),
                tutorial_done: row.get("tutorial_done"),
            },
            None => RoleRecord::fresh(role_id),
        })
    }

    async fn enroll(
        &self,
        role_id: RoleId,
        desk_id: &str,
        entry: ResourceAmount,
        idempotency_key: &str,
    ) -> LedgerResult<()> {
        let mut tx = self.begin().await?;

        if let Some(enrolled) = Self::lock_role(&mut tx, role_id)
            .await?
            .filter(|enrolled| enrolled != desk_id)
        {
            return Err(LedgerError::AlreadyEnrolled {
                role_id,
                desk_id: enrolled,
            });
        }

        if entry.quantity > 0 {
            Self::apply(
                &mut tx,
                role_id,
                entry.scaled(-1),
                idempotency_key,
                &format!("Entry fee for battle {desk_id}"),
            )
            .await?;
        }

        sqlx::query(
            "UPDATE battle_roles
             SET enrolled_desk = $2, battle_count = battle_count + 1, updated_at = NOW()
             WHERE role_id = $1",
        )
        .bind(role_id)
        .bind(desk_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn withdraw(
        &self,
        role_id: RoleId,
        desk_id: &str,
        refund: ResourceAmount,
        idempotency_key: &str,
    ) -> LedgerResult<bool> {
        let mut tx = self.begin().await?;

        if Self::lock_role(&mut tx, role_id).await?.as_deref() != Some(desk_id) {
            return Ok(false);
        }

        if refund.quantity > 0 {
            Self::apply(
                &mut tx,
                role_id,
                refund,
                idempotency_key,
                &format!("Entry refund for battle {desk_id}"),
            )
            .await?;
        }

        sqlx::query(
            "UPDATE battle_roles
             SET enrolled_desk = NULL, battle_count = GREATEST(battle_count - 1, 0), updated_at = NOW()
             WHERE role_id = $1",
        )
        .bind(role_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn collect(
        &self,
        role_id: RoleId,
        desk_id: &str,
        rewards: &[ResourceAmount],
    ) -> LedgerResult<bool> {
        let mut tx = self.begin().await?;

        if Self::lock_role(&mut tx, role_id).await?.as_deref() != Some(desk_id) {
            return Ok(false);
        }

        let description = format!("Reward for battle {desk_id}");
        for (index, reward) in rewards.iter().enumerate() {
            if reward.quantity > 0 {
                let key = super::models::reward_key(role_id, desk_id, index);
                Self::apply(&mut tx, role_id, *reward, &key, &description).await?;
            }
        }

        sqlx::query(
            "UPDATE battle_roles SET enrolled_desk = NULL, updated_at = NOW() WHERE role_id = $1",
        )
        .bind(role_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn complete_tutorial(&self, role_id: RoleId) -> LedgerResult<bool> {
        let row = bounded(
            self.query_timeout,
            sqlx::query(
                "INSERT INTO battle_roles (role_id, tutorial_done) VALUES ($1, TRUE)
                 ON CONFLICT (role_id)
                 DO UPDATE SET tutorial_done = TRUE, updated_at = NOW()
                 WHERE battle_roles.tutorial_done = FALSE
                 RETURNING role_id",
            )
            .bind(role_id)
            .fetch_optional(&self.pool),
        )
        .await?;

        Ok(row.is_some())
    }
}

#[async_trait]
impl ResultLog for PgLedger {
    async fn record(&self, record: &BattleRecord) -> LedgerResult<()> {
        bounded(
            self.query_timeout,
            sqlx::query(
                "INSERT INTO battle_results (desk_id, template_id, payload)
                 VALUES ($1, $2, $3)
                 ON CONFLICT (desk_id)
                 DO UPDATE SET payload = EXCLUDED.payload, recorded_at = NOW()",
            )
            .bind(&record.desk_id)
            .bind(record.template_id)
            .bind(Json(record))
            .execute(&self.pool),
        )
        .await?;

        Ok(())
    }

    async fn find(&self, desk_id: &str) -> LedgerResult<Option<BattleRecord>> {
        let row = bounded(
            self.query_timeout,
            sqlx::query("SELECT payload FROM battle_results WHERE desk_id = $1")
                .bind(desk_id)
                .fetch_optional(&self.pool),
        )
        .await?;

        match row {
            Some(row) => {
                let Json(record) = row.try_get::<Json<BattleRecord>, _>("payload")?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }
}

/// Await a database future, failing with [`LedgerError::Timeout`] after `limit`
async fn bounded<T, F>(limit: Duration, work: F) -> LedgerResult<T>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match tokio::time::timeout(limit, work).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(LedgerError::Timeout(limit)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_slow_statement_times_out() {
        let slow = async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok::<_, sqlx::Error>(1)
        };
        let result = bounded(Duration::from_millis(10), slow).await;
        assert!(matches!(result, Err(LedgerError::Timeout(limit)) if limit == Duration::from_millis(10)));
    }

    #[tokio::test]
    async fn test_database_error_passes_through() {
        let failing = async { Err::<i64, _>(sqlx::Error::RowNotFound) };
        let result = bounded(Duration::from_secs(1), failing).await;
        assert!(matches!(result, Err(LedgerError::Database(sqlx::Error::RowNotFound))));
    }
}
