// Redis connection pool and registration key-space operations

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use futures::future::join_all;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use tracing::{info, warn};

use crate::api::{FullRecordStore, ReceiptStore, RegistrationStore};
use crate::core::errors::AppError;
use crate::core::models::{FullRegistration, PaymentStatus, Registration};
use crate::core::receipt::ReceiptBlob;

/// Key-space layout: one hash per registration, one global index, one
/// string per full record, one string per receipt blob.
const REGS_INDEX_KEY: &str = "camp:regs";
const REG_PREFIX: &str = "camp:reg:";
const FULL_PREFIX: &str = "camp:full:";
const RECEIPT_PREFIX: &str = "camp:receipt:";

/// Bounded retention for full records and receipt blobs (one year).
const RETENTION_SECS: u64 = 60 * 60 * 24 * 365;

/// Redis-backed implementation of the registration, full-record and
/// receipt store seams.
pub struct RedisStore {
    connection_manager: ConnectionManager,
    op_timeout: Duration,
}

impl RedisStore {
    /// Create a new RedisStore with connection manager
    ///
    /// Retries with linear backoff (3 attempts) and verifies the
    /// connection with PING before handing it out.
    pub async fn new(
        redis_url: &str,
        connection_timeout_secs: u64,
        operation_timeout_secs: u64,
    ) -> Result<Self, AppError> {
        const MAX_RETRIES: u32 = 3;
        const INITIAL_DELAY_MS: u64 = 1000;

        let mut connection_errors = Vec::new();

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let delay_ms = INITIAL_DELAY_MS * attempt as u64; // Linear backoff: 1s, 2s
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }

            match Self::try_create_connection(
                redis_url,
                connection_timeout_secs,
                operation_timeout_secs,
            )
            .await
            {
                Ok(store) => match store.ping_store().await {
                    Ok(_) => {
                        if attempt > 0 {
                            info!("Redis connection succeeded on attempt {}", attempt + 1);
                        }
                        return Ok(store);
                    }
                    Err(e) => {
                        connection_errors.push(format!("Connection created but ping failed: {}", e));
                        continue;
                    }
                },
                Err(e) => {
                    connection_errors.push(format!("Attempt {} failed: {}", attempt + 1, e));
                    if attempt < MAX_RETRIES - 1 {
                        warn!(
                            attempt = attempt + 1,
                            max_attempts = MAX_RETRIES,
                            error = %e,
                            "Redis connection attempt failed, retrying..."
                        );
                    }
                    continue;
                }
            }
        }

        Err(AppError::Storage(format!(
            "Failed to create Redis connection after {} attempts: {}",
            MAX_RETRIES,
            connection_errors.join("; ")
        )))
    }

    /// Try to create a Redis connection (internal helper)
    async fn try_create_connection(
        redis_url: &str,
        connection_timeout_secs: u64,
        operation_timeout_secs: u64,
    ) -> Result<Self, AppError> {
        let client = Client::open(redis_url).map_err(|e| {
            AppError::Storage(format!("Invalid Redis URL format '{}': {}", redis_url, e))
        })?;

        let connection_manager = tokio::time::timeout(
            Duration::from_secs(connection_timeout_secs),
            ConnectionManager::new(client),
        )
        .await
        .map_err(|_| {
            AppError::Storage(format!(
                "Redis ConnectionManager creation timed out after {} seconds",
                connection_timeout_secs
            ))
        })?
        .map_err(|e| AppError::Storage(format!("Failed to create Redis ConnectionManager: {}", e)))?;

        Ok(Self {
            connection_manager,
            op_timeout: Duration::from_secs(operation_timeout_secs),
        })
    }

    /// Run one store round-trip with the bounded operation timeout.
    /// Timeouts and backend errors both classify as storage failures.
    async fn timed<T, F>(&self, op: &'static str, fut: F) -> Result<T, AppError>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(AppError::Storage(format!("{} failed: {}", op, e))),
            Err(_) => Err(AppError::Storage(format!(
                "{} timed out after {:?}",
                op, self.op_timeout
            ))),
        }
    }

    /// Persist a summary record, then append its id to the index.
    ///
    /// The order matters: a reader following the index must never
    /// dereference a missing record, and the reverse does not hold. The
    /// index append is the secondary write; on failure the record is
    /// still durable and the id surfaces as "not yet visible" in
    /// listings.
    async fn create_registration(&self, registration: &Registration) -> Result<(), AppError> {
        let key = format!("{}{}", REG_PREFIX, registration.id);
        let fields = registration.to_hash();
        let mut conn = self.connection_manager.clone();
        self.timed("hset", async move {
            conn.hset_multiple::<_, _, _, ()>(&key, &fields).await
        })
        .await?;

        let score = registration.created_at_millis();
        let id = registration.id.clone();
        let mut conn = self.connection_manager.clone();
        if let Err(e) = self
            .timed("zadd", async move {
                conn.zadd::<_, _, _, ()>(REGS_INDEX_KEY, &id, score).await
            })
            .await
        {
            warn!(
                error = %e,
                id = %registration.id,
                "Index append failed after record write"
            );
        }

        Ok(())
    }

    async fn get_registration(&self, id: &str) -> Result<Option<Registration>, AppError> {
        let key = format!("{}{}", REG_PREFIX, id);
        let mut conn = self.connection_manager.clone();
        let fields: HashMap<String, String> = self
            .timed("hgetall", async move { conn.hgetall(&key).await })
            .await?;

        Ok(Registration::from_hash(id, &fields).map(|mut reg| {
            reg.resolve_receipt_indirection();
            reg
        }))
    }

    /// Read the full index. The sorted set is the committed
    /// representation; an empty or type-mismatched read falls back to a
    /// legacy list before concluding the index is empty.
    async fn all_registration_ids(&self) -> Result<Vec<String>, AppError> {
        let mut conn = self.connection_manager.clone();
        let as_zset: Result<Vec<String>, AppError> = self
            .timed("zrange", async move {
                conn.zrange(REGS_INDEX_KEY, 0, -1).await
            })
            .await;

        match as_zset {
            Ok(ids) if !ids.is_empty() => return Ok(ids),
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "Index read as sorted set failed; trying list");
            }
        }

        let mut conn = self.connection_manager.clone();
        self.timed("lrange", async move {
            conn.lrange(REGS_INDEX_KEY, 0, -1).await
        })
        .await
    }

    async fn list_registrations(&self) -> Result<Vec<Registration>, AppError> {
        let ids = self.all_registration_ids().await?;
        let resolved = join_all(ids.iter().map(|id| self.get_registration(id))).await;

        let mut registrations = Vec::with_capacity(ids.len());
        for (id, result) in ids.iter().zip(resolved) {
            match result {
                Ok(Some(reg)) => registrations.push(reg),
                Ok(None) => {
                    warn!(id = %id, "Indexed id has no record; skipping");
                }
                Err(e) => {
                    warn!(error = %e, id = %id, "Failed to resolve indexed id; skipping");
                }
            }
        }

        // Newest first, regardless of the physical order the index returned
        registrations.sort_by_key(|reg| std::cmp::Reverse(reg.created_at_millis()));
        Ok(registrations)
    }

    async fn update_payment_status(&self, id: &str, status: PaymentStatus) -> bool {
        let key = format!("{}{}", REG_PREFIX, id);
        let mut conn = self.connection_manager.clone();
        let result = self
            .timed("hset", async move {
                conn.hset::<_, _, _, ()>(&key, "paymentStatus", status.as_str())
                    .await
            })
            .await;

        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, id = %id, "Failed to update payment status");
                false
            }
        }
    }

    async fn set_receipt_reference(&self, id: &str, receipt_url: &str) -> Result<(), AppError> {
        let key = format!("{}{}", REG_PREFIX, id);
        let url = receipt_url.to_string();
        let mut conn = self.connection_manager.clone();
        self.timed("hset", async move {
            conn.hset::<_, _, _, ()>(&key, "receiptUrl", url).await
        })
        .await
    }

    async fn put_full_record(&self, record: &FullRegistration) -> Result<(), AppError> {
        let key = format!("{}{}", FULL_PREFIX, record.id);
        let json = serde_json::to_string(record)
            .map_err(|e| AppError::Storage(format!("serialize full record: {}", e)))?;
        let mut conn = self.connection_manager.clone();
        self.timed("set_ex", async move {
            conn.set_ex::<_, _, ()>(&key, json, RETENTION_SECS).await
        })
        .await
    }

    async fn get_full_record(&self, id: &str) -> Result<Option<FullRegistration>, AppError> {
        let key = format!("{}{}", FULL_PREFIX, id);
        let mut conn = self.connection_manager.clone();
        let raw: Option<String> = self.timed("get", async move { conn.get(&key).await }).await?;

        match raw {
            None => Ok(None),
            Some(json) => serde_json::from_str(&json).map(Some).map_err(|e| {
                AppError::Storage(format!("stored full record for {} is corrupt: {}", id, e))
            }),
        }
    }

    async fn put_receipt(&self, id: &str, blob: &ReceiptBlob) -> Result<(), AppError> {
        let key = format!("{}{}", RECEIPT_PREFIX, id);
        let data_url = blob.to_data_url();
        let mut conn = self.connection_manager.clone();
        self.timed("set_ex", async move {
            conn.set_ex::<_, _, ()>(&key, data_url, RETENTION_SECS).await
        })
        .await
    }

    async fn get_receipt(&self, id: &str) -> Result<Option<ReceiptBlob>, AppError> {
        let key = format!("{}{}", RECEIPT_PREFIX, id);
        let mut conn = self.connection_manager.clone();
        let raw: Option<String> = self.timed("get", async move { conn.get(&key).await }).await?;

        match raw {
            None => Ok(None),
            Some(data_url) => ReceiptBlob::from_data_url(&data_url).map(Some).ok_or_else(|| {
                AppError::Storage(format!("stored receipt for {} is not a valid data URL", id))
            }),
        }
    }

    /// Ping Redis to check connectivity
    async fn ping_store(&self) -> Result<(), AppError> {
        let mut conn = self.connection_manager.clone();
        let result: String = self
            .timed("ping", async move {
                redis::cmd("PING").query_async(&mut conn).await
            })
            .await?;

        if result == "PONG" {
            Ok(())
        } else {
            Err(AppError::Storage(format!(
                "Redis ping returned unexpected response: {}",
                result
            )))
        }
    }
}

#[async_trait::async_trait]
impl RegistrationStore for RedisStore {
    async fn create(&self, registration: &Registration) -> Result<(), AppError> {
        self.create_registration(registration).await
    }

    async fn get(&self, id: &str) -> Result<Option<Registration>, AppError> {
        self.get_registration(id).await
    }

    async fn list_all(&self) -> Result<Vec<Registration>, AppError> {
        self.list_registrations().await
    }

    async fn update_status(&self, id: &str, status: PaymentStatus) -> bool {
        self.update_payment_status(id, status).await
    }

    async fn set_receipt_ref(&self, id: &str, receipt_url: &str) -> Result<(), AppError> {
        self.set_receipt_reference(id, receipt_url).await
    }

    async fn ping(&self) -> Result<(), AppError> {
        self.ping_store().await
    }
}

#[async_trait::async_trait]
impl FullRecordStore for RedisStore {
    async fn put(&self, record: &FullRegistration) -> Result<(), AppError> {
        self.put_full_record(record).await
    }

    async fn get(&self, id: &str) -> Result<Option<FullRegistration>, AppError> {
        self.get_full_record(id).await
    }
}

#[async_trait::async_trait]
impl ReceiptStore for RedisStore {
    async fn put(&self, id: &str, blob: &ReceiptBlob) -> Result<(), AppError> {
        self.put_receipt(id, blob).await
    }

    async fn get(&self, id: &str) -> Result<Option<ReceiptBlob>, AppError> {
        self.get_receipt(id).await
    }
}
