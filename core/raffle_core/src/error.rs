//! Domain error types.

use thiserror::Error;

use crate::types::{PaymentStatus, RaffleStatus};
use crate::validation::FieldErrors;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RaffleError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("validation failed: {0}")]
    Validation(FieldErrors),

    #[error("numbers already taken in raffle {raffle_id}: {numbers:?}")]
    NumbersTaken { raffle_id: String, numbers: Vec<u32> },

    #[error("raffle {raffle_id} is not on sale (status: {status})")]
    NotOnSale {
        raffle_id: String,
        status: RaffleStatus,
    },

    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition { from: RaffleStatus, to: RaffleStatus },

    #[error("invalid payment status transition from {from} to {to}")]
    InvalidPaymentTransition {
        from: PaymentStatus,
        to: PaymentStatus,
    },

    #[error("raffle {raffle_id} has participants and cannot be deleted")]
    HasParticipants { raffle_id: String },
}

impl RaffleError {
    pub fn raffle_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: "raffle",
            id: id.into(),
        }
    }

    pub fn participant_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: "participant",
            id: id.into(),
        }
    }
}

impl From<FieldErrors> for RaffleError {
    fn from(errors: FieldErrors) -> Self {
        Self::Validation(errors)
    }
}

pub type Result<T> = std::result::Result<T, RaffleError>;
