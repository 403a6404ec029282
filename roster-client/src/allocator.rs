//! Sequential member identifier allocation
//!
//! Identifiers are `prefix + zero-padded(counter)`, e.g. `UR0008`. The
//! counter document is the only shared mutable value with several writers;
//! [`AllocationStrategy::Conditional`] advances it with a version-checked
//! write so concurrent callers never observe the same value.

use std::sync::Arc;

use serde_json::{Value, json};

use crate::config::{AllocationStrategy, DirectoryConfig};
use crate::error::{AllocationError, StoreError};
use crate::store::{DocumentStore, Fields, Precondition};

const CURRENT_FIELD: &str = "current";

/// Hands out member identifiers from the shared counter
#[derive(Clone)]
pub struct IdentifierAllocator {
    store: Arc<dyn DocumentStore>,
    counter_path: String,
    prefix: String,
    width: usize,
    strategy: AllocationStrategy,
    max_attempts: u32,
}

impl IdentifierAllocator {
    pub fn new(store: Arc<dyn DocumentStore>, config: &DirectoryConfig) -> Self {
        Self {
            store,
            counter_path: config.counter_path.clone(),
            prefix: config.identifier_prefix.clone(),
            width: config.identifier_width,
            strategy: config.allocation_strategy,
            max_attempts: config.max_allocation_attempts.max(1),
        }
    }

    /// Render a counter value as an identifier
    pub fn format(&self, value: u64) -> String {
        format!("{}{:0width$}", self.prefix, value, width = self.width)
    }

    /// Allocate the next identifier.
    ///
    /// A missing counter is created at 1. On any store failure no
    /// identifier is returned and the caller must not create the member.
    pub async fn next(&self) -> Result<String, AllocationError> {
        let value = match self.strategy {
            AllocationStrategy::Conditional => self.next_conditional().await?,
            AllocationStrategy::Unconditional => self.next_unconditional().await?,
        };

        let identifier = self.format(value);
        tracing::debug!(identifier = %identifier, "Identifier allocated");
        Ok(identifier)
    }

    async fn next_conditional(&self) -> Result<u64, AllocationError> {
        for attempt in 1..=self.max_attempts {
            let snapshot = self.store.get(&self.counter_path).await?;
            let (current, precondition) = match &snapshot {
                Some(doc) => (read_current(&doc.fields)?, Precondition::Version(doc.version)),
                None => (0, Precondition::Absent),
            };
            let next = advance(current)?;

            match self
                .store
                .put(&self.counter_path, counter_fields(next), precondition)
                .await
            {
                Ok(_) => {
                    if snapshot.is_none() {
                        tracing::info!(path = %self.counter_path, "Sequence counter created");
                    }
                    return Ok(next);
                }
                Err(StoreError::PreconditionFailed { .. }) => {
                    tracing::debug!(attempt, current, "Counter moved underneath us, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::warn!(attempts = self.max_attempts, "Giving up on contended counter");
        Err(AllocationError::Contention {
            attempts: self.max_attempts,
        })
    }

    async fn next_unconditional(&self) -> Result<u64, AllocationError> {
        let snapshot = self.store.get(&self.counter_path).await?;
        let current = match &snapshot {
            Some(doc) => read_current(&doc.fields)?,
            None => 0,
        };
        let next = advance(current)?;
        self.store
            .put(&self.counter_path, counter_fields(next), Precondition::Overwrite)
            .await?;
        Ok(next)
    }
}

/// 2^64, the first float past `u64::MAX`
const U64_LIMIT: f64 = 18_446_744_073_709_551_616.0;

/// Non-numeric or negative values restart the sequence; values beyond
/// `u64` are rejected rather than saturated
fn read_current(fields: &Fields) -> Result<u64, AllocationError> {
    let Some(Value::Number(n)) = fields.get(CURRENT_FIELD) else {
        return Ok(0);
    };
    if let Some(value) = n.as_u64() {
        return Ok(value);
    }
    match n.as_f64() {
        Some(f) if f.is_finite() && (0.0..U64_LIMIT).contains(&f) => Ok(f as u64),
        Some(f) if f < 0.0 => Ok(0),
        _ => Err(AllocationError::CounterOverflow {
            value: n.to_string(),
        }),
    }
}

fn advance(current: u64) -> Result<u64, AllocationError> {
    current
        .checked_add(1)
        .ok_or_else(|| AllocationError::CounterOverflow {
            value: current.to_string(),
        })
}

fn counter_fields(value: u64) -> Fields {
    let mut fields = Fields::new();
    fields.insert(CURRENT_FIELD.into(), json!(value));
    fields
}
