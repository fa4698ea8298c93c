//! # Identity Resolution
//!
//! Get-or-create of canonical entities by natural key. Uniqueness is owned
//! by the unique indexes on each table: a resolver first looks the key up,
//! then inserts inside a savepoint, and when the insert loses a race to a
//! concurrent writer it rolls the savepoint back and reads the winner's row.

use std::fmt;

use async_trait::async_trait;
use sea_orm::{DatabaseTransaction, DbErr, TransactionTrait};
use thiserror::Error;

use crate::db::is_unique_violation;

/// Upper bound on find/insert rounds before giving up on a contended key.
pub const MAX_ATTEMPTS: u32 = 3;

/// Entity families resolved by natural key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    System,
    Vendor,
    Distro,
    Package,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::System => "system",
            Self::Vendor => "vendor",
            Self::Distro => "distro",
            Self::Package => "package",
        };
        f.write_str(name)
    }
}

/// A natural key that can be looked up and, when absent, materialized.
///
/// `insert` records the creation-time attributes carried by the key; it is
/// never used to update an existing row.
#[async_trait]
pub trait NaturalKey: Send + Sync {
    type Model: Send;

    fn kind(&self) -> EntityKind;

    async fn find(&self, txn: &DatabaseTransaction) -> Result<Option<Self::Model>, DbErr>;

    async fn insert(&self, txn: &DatabaseTransaction) -> Result<Self::Model, DbErr>;
}

/// Outcome of a successful resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved<M> {
    pub model: M,
    /// True when this call created the row
    pub created: bool,
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("storage error: {0}")]
    Storage(#[from] DbErr),
    #[error("{kind} key still contended after {attempts} attempts")]
    Contended { kind: EntityKind, attempts: u32 },
}

enum Attempt<M> {
    Found(M),
    Created(M),
    ConflictThenRetry,
}

/// Resolve `key` to its canonical row inside `txn`, creating it on first
/// sight.
pub async fn resolve<K: NaturalKey>(
    txn: &DatabaseTransaction,
    key: &K,
) -> Result<Resolved<K::Model>, ResolveError> {
    for attempt in 1..=MAX_ATTEMPTS {
        match attempt_once(txn, key).await? {
            Attempt::Found(model) => {
                return Ok(Resolved {
                    model,
                    created: false,
                });
            }
            Attempt::Created(model) => {
                return Ok(Resolved {
                    model,
                    created: true,
                });
            }
            Attempt::ConflictThenRetry => {
                tracing::debug!(
                    kind = %key.kind(),
                    attempt,
                    "Natural key insert lost a race; re-reading"
                );
            }
        }
    }

    tracing::warn!(kind = %key.kind(), attempts = MAX_ATTEMPTS, "Natural key resolution exhausted retries");
    Err(ResolveError::Contended {
        kind: key.kind(),
        attempts: MAX_ATTEMPTS,
    })
}

async fn attempt_once<K: NaturalKey>(
    txn: &DatabaseTransaction,
    key: &K,
) -> Result<Attempt<K::Model>, DbErr> {
    if let Some(model) = key.find(txn).await? {
        return Ok(Attempt::Found(model));
    }

    let savepoint = txn.begin().await?;
    match key.insert(&savepoint).await {
        Ok(model) => {
            savepoint.commit().await?;
            Ok(Attempt::Created(model))
        }
        Err(err) if is_unique_violation(&err) => {
            savepoint.rollback().await?;
            Ok(Attempt::ConflictThenRetry)
        }
        Err(err) => {
            if let Err(rollback_err) = savepoint.rollback().await {
                tracing::warn!(error = %rollback_err, "Failed to roll back savepoint");
            }
            Err(err)
        }
    }
}
