//! Ticket availability: which numbers of a raffle's pool nobody holds yet.
//!
//! Everything here is a pure function over a snapshot of one raffle and the
//! participants recorded against it. Participants belonging to other raffles
//! are ignored, so callers may pass an unfiltered list.

use std::collections::HashSet;

use serde::Serialize;

use crate::error::{RaffleError, Result};
use crate::types::{Participant, Raffle, RaffleStatus};

/// Union of every number held by the raffle's participants, whatever their
/// payment status.
pub fn taken_numbers<'a, I>(raffle_id: &str, participants: I) -> HashSet<u32>
where
    I: IntoIterator<Item = &'a Participant>,
{
    participants
        .into_iter()
        .filter(|p| p.raffle_id == raffle_id)
        .flat_map(|p| p.numbers.iter().copied())
        .collect()
}

/// Ascending numbers in `1..=raffle.total_numbers` that no participant holds.
pub fn available_numbers<'a, I>(raffle: &Raffle, participants: I) -> Vec<u32>
where
    I: IntoIterator<Item = &'a Participant>,
{
    let taken = taken_numbers(&raffle.id, participants);
    (1..=raffle.total_numbers)
        .filter(|n| !taken.contains(n))
        .collect()
}

/// Numbers held by participants whose payment has not failed.
pub fn sold_count<'a, I>(raffle_id: &str, participants: I) -> u32
where
    I: IntoIterator<Item = &'a Participant>,
{
    participants
        .into_iter()
        .filter(|p| p.raffle_id == raffle_id && p.counts_as_sold())
        .map(|p| p.numbers.len() as u32)
        .sum()
}

/// Check that `numbers` can be claimed in `raffle` right now.
///
/// The raffle must be on sale and none of the numbers may already be taken.
/// Every conflicting number is reported, ascending.
pub fn check_claim(raffle: &Raffle, numbers: &[u32], taken: &HashSet<u32>) -> Result<()> {
    if raffle.status != RaffleStatus::Active {
        return Err(RaffleError::NotOnSale {
            raffle_id: raffle.id.clone(),
            status: raffle.status,
        });
    }
    let mut conflicts: Vec<u32> = numbers
        .iter()
        .copied()
        .filter(|n| taken.contains(n) || !raffle.contains_number(*n))
        .collect();
    if conflicts.is_empty() {
        return Ok(());
    }
    conflicts.sort_unstable();
    conflicts.dedup();
    Err(RaffleError::NumbersTaken {
        raffle_id: raffle.id.clone(),
        numbers: conflicts,
    })
}

/// Recorded versus derived sold count for one raffle.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Reconciliation {
    pub raffle_id: String,
    pub total_numbers: u32,
    /// `sold_numbers` as stored on the raffle.
    pub recorded_sold: u32,
    /// Numbers held by non-failed participants.
    pub actual_sold: u32,
    /// Numbers held by anyone, failed payments included.
    pub taken: u32,
    pub available: u32,
    /// `recorded_sold - actual_sold`.
    pub drift: i64,
}

impl Reconciliation {
    pub fn is_consistent(&self) -> bool {
        self.drift == 0
    }
}

pub fn reconcile(raffle: &Raffle, participants: &[Participant]) -> Reconciliation {
    let taken = taken_numbers(&raffle.id, participants);
    let taken_in_pool = taken.iter().filter(|n| raffle.contains_number(**n)).count() as u32;
    let actual_sold = sold_count(&raffle.id, participants);
    Reconciliation {
        raffle_id: raffle.id.clone(),
        total_numbers: raffle.total_numbers,
        recorded_sold: raffle.sold_numbers,
        actual_sold,
        taken: taken.len() as u32,
        available: raffle.total_numbers - taken_in_pool,
        drift: i64::from(raffle.sold_numbers) - i64::from(actual_sold),
    }
}
