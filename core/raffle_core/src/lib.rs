//! # Raffle Core
//!
//! Catalog and ticket inventory model for the cooperative's raffle
//! storefront. Storage and transport live elsewhere; everything here is a
//! pure function over raffle and participant snapshots.
//!
//! | Concern            | Module                                   |
//! |--------------------|------------------------------------------|
//! | Records & money    | [`types`]                                |
//! | Availability       | [`availability`]                         |
//! | Picking numbers    | [`selection`]                            |
//! | Form validation    | [`validation`]                           |
//! | Status by date     | [`lifecycle`]                            |
//! | Admin reports      | [`reports`], [`export`]                  |
//! | Seed catalog       | [`sample`]                               |
//!
//! ## Allocation model
//!
//! A raffle owns the pool `1..=total_numbers`. A number is *taken* once any
//! participant of that raffle holds it, whatever the payment outcome; the
//! rest are *available*. Claiming numbers is the store's job: it must check
//! [`availability::check_claim`] and record the purchase in one atomic step.

pub mod availability;
pub mod error;
pub mod export;
pub mod lifecycle;
pub mod reports;
pub mod sample;
pub mod selection;
pub mod types;
pub mod validation;

#[cfg(any(test, feature = "testutils"))]
pub mod invariants;

#[cfg(test)]
mod test_properties;

pub use error::{RaffleError, Result};
pub use selection::{TicketSelection, MAX_SELECTION};
pub use types::{
    Money, Participant, PaymentStatus, PurchaseOrder, Raffle, RaffleDraft, RaffleStatus,
};
pub use validation::{Field, FieldErrors, PurchaseRequest, RaffleForm, MAX_TOTAL_NUMBERS};
