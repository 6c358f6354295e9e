//! Assertion helpers for the catalog invariants.
//!
//! Compiled for this crate's tests and, behind the `testutils` feature, for
//! downstream crates that want to check a store's contents.

use std::collections::HashMap;

use crate::availability::{available_numbers, sold_count};
use crate::types::{Participant, Raffle};

/// INV-1: every purchased number lies in `1..=total_numbers`.
pub fn assert_numbers_in_range(raffle: &Raffle, participants: &[Participant]) {
    for p in participants.iter().filter(|p| p.raffle_id == raffle.id) {
        for n in &p.numbers {
            assert!(
                raffle.contains_number(*n),
                "INV-1 violated: participant {} holds {} outside 1..={} of raffle {}",
                p.id,
                n,
                raffle.total_numbers,
                raffle.id
            );
        }
    }
}

/// INV-2: a ticket number belongs to at most one participant per raffle.
pub fn assert_no_double_booking(participants: &[Participant]) {
    let mut owners: HashMap<(&str, u32), &str> = HashMap::new();
    for p in participants {
        for n in &p.numbers {
            if let Some(previous) = owners.insert((p.raffle_id.as_str(), *n), p.id.as_str()) {
                panic!(
                    "INV-2 violated: number {} of raffle {} held by both {} and {}",
                    n, p.raffle_id, previous, p.id
                );
            }
        }
    }
}

/// INV-3: `start_date < end_date < draw_date`.
pub fn assert_dates_ordered(raffle: &Raffle) {
    assert!(
        raffle.start_date < raffle.end_date,
        "INV-3 violated: raffle {} sales end {} not after start {}",
        raffle.id,
        raffle.end_date,
        raffle.start_date
    );
    assert!(
        raffle.end_date < raffle.draw_date,
        "INV-3 violated: raffle {} draws {} not after sales end {}",
        raffle.id,
        raffle.draw_date,
        raffle.end_date
    );
}

/// INV-4: the recorded sold count matches the non-failed purchases.
pub fn assert_sold_count_consistent(raffle: &Raffle, participants: &[Participant]) {
    let actual = sold_count(&raffle.id, participants);
    assert_eq!(
        raffle.sold_numbers, actual,
        "INV-4 violated: raffle {} records {} sold, participants hold {}",
        raffle.id, raffle.sold_numbers, actual
    );
}

/// INV-5: available numbers plus sold numbers cover the pool exactly.
/// Holds when no purchase for the raffle has failed.
pub fn assert_availability_complement(raffle: &Raffle, participants: &[Participant]) {
    let available = available_numbers(raffle, participants).len() as u32;
    let sold = sold_count(&raffle.id, participants);
    assert_eq!(
        available + sold,
        raffle.total_numbers,
        "INV-5 violated: raffle {} has {} available + {} sold != {} total",
        raffle.id,
        available,
        sold,
        raffle.total_numbers
    );
}

/// INV-6: each purchase paid exactly price × count.
pub fn assert_totals_match_price(raffle: &Raffle, participants: &[Participant]) {
    for p in participants.iter().filter(|p| p.raffle_id == raffle.id) {
        assert_eq!(
            p.total_paid,
            raffle.price.times(p.numbers.len()),
            "INV-6 violated: participant {} paid {} for {} numbers at {}",
            p.id,
            p.total_paid,
            p.numbers.len(),
            raffle.price
        );
    }
}

/// Run every invariant that must hold for data written through the store.
pub fn assert_all_raffle_invariants(raffle: &Raffle, participants: &[Participant]) {
    assert_numbers_in_range(raffle, participants);
    assert_no_double_booking(participants);
    assert_dates_ordered(raffle);
    assert_sold_count_consistent(raffle, participants);
    assert_totals_match_price(raffle, participants);
}
