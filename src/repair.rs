//! Repair Orchestrator
//!
//! Bounded retry around the validator. A candidate that fails validation gets
//! exactly one repair attempt; a repaired candidate that fails again is final.

use crate::capability::{RepairRequest, SqlRepairer};
use crate::error::{QueryError, Result, ValidationError};
use crate::schema::catalog::Schema;
use crate::validator::validate;
use tracing::{info, warn};

/// Where a request's SQL currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepairState {
    /// Just produced, not yet validated.
    Candidate(String),
    /// Output of the single repair call, with the error that triggered it.
    Repaired { sql: String, initial: ValidationError },
}

/// SQL that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedSql {
    pub sql: String,
    pub repaired: bool,
}

pub struct RepairOrchestrator<'a> {
    schema: &'a Schema,
    repairer: &'a dyn SqlRepairer,
}

impl<'a> RepairOrchestrator<'a> {
    pub fn new(schema: &'a Schema, repairer: &'a dyn SqlRepairer) -> Self {
        Self { schema, repairer }
    }

    /// Drive `candidate` to a validated statement or a terminal error.
    ///
    /// Fails with [`QueryError::RepairFailed`] when the repair call itself
    /// errors, and with [`QueryError::RepairExhausted`] when the repaired SQL
    /// is still invalid.
    pub async fn finalize(&self, candidate: String, question: &str) -> Result<ValidatedSql> {
        let mut state = RepairState::Candidate(candidate);
        loop {
            state = match state {
                RepairState::Candidate(sql) => match validate(&sql, self.schema) {
                    Ok(()) => return Ok(ValidatedSql { sql, repaired: false }),
                    Err(initial) => {
                        info!("Candidate rejected with {}, requesting repair", initial.kind());
                        let repaired = self.request_repair(&sql, &initial, question).await?;
                        RepairState::Repaired { sql: repaired, initial }
                    }
                },
                RepairState::Repaired { sql, initial } => {
                    return match validate(&sql, self.schema) {
                        Ok(()) => {
                            info!("Repaired SQL accepted");
                            Ok(ValidatedSql { sql, repaired: true })
                        }
                        Err(repair) => {
                            warn!("Repaired SQL still invalid: {}", repair);
                            Err(QueryError::RepairExhausted {
                                initial,
                                repair,
                                candidate_sql: sql,
                            })
                        }
                    };
                }
            };
        }
    }

    async fn request_repair(&self, sql: &str, error: &ValidationError, question: &str) -> Result<String> {
        let request = RepairRequest {
            invalid_sql: sql,
            error,
            schema: self.schema,
            question,
        };
        self.repairer.repair_sql(&request).await.map_err(|err| match err {
            QueryError::RepairFailed(_) => err,
            other => QueryError::RepairFailed(other.to_string()),
        })
    }
}
