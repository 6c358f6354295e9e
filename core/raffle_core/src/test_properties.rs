use std::collections::HashSet;

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::availability::{available_numbers, check_claim, taken_numbers};
use crate::invariants::{
    assert_all_raffle_invariants, assert_availability_complement, assert_no_double_booking,
};
use crate::selection::{TicketSelection, Toggle};
use crate::validation::{validate_edit, validate_new, validate_purchase};
use crate::{
    Field, Money, Participant, PurchaseRequest, Raffle, RaffleError, RaffleForm, RaffleStatus,
};

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn raffle(total: u32, sold: u32) -> Raffle {
    Raffle {
        id: "7".to_string(),
        title: "Grill set".to_string(),
        description: "Stainless grill with tools".to_string(),
        prize: "Grill".to_string(),
        price: Money::from_units(10),
        total_numbers: total,
        sold_numbers: sold,
        start_date: day(2025, 5, 1),
        end_date: day(2025, 6, 1),
        draw_date: day(2025, 6, 10),
        status: RaffleStatus::Active,
        image: None,
        qr_code: Some("QR007".to_string()),
    }
}

/// Mimics the store: validate, check availability, record, bump sold count.
fn claim(
    raffle: &mut Raffle,
    participants: &mut Vec<Participant>,
    numbers: &[u32],
) -> Result<(), RaffleError> {
    let order = validate_purchase(
        raffle,
        &PurchaseRequest {
            name: "Buyer".to_string(),
            email: "buyer@email.com".to_string(),
            phone: "+54 11 4444-4444".to_string(),
            numbers: numbers.to_vec(),
        },
        raffle.start_date,
    )?;
    check_claim(raffle, &order.numbers, &taken_numbers(&raffle.id, participants.iter()))?;
    raffle.sold_numbers += order.numbers.len() as u32;
    let id = (participants.len() + 1).to_string();
    participants.push(order.into_participant(id));
    Ok(())
}

#[test]
fn availability_is_exact_complement_of_claims() {
    let mut r = raffle(30, 0);
    let mut participants = Vec::new();
    claim(&mut r, &mut participants, &[1, 2, 3]).unwrap();
    claim(&mut r, &mut participants, &[10, 20, 30]).unwrap();
    claim(&mut r, &mut participants, &[15]).unwrap();

    let available = available_numbers(&r, &participants);
    let held: HashSet<u32> = participants.iter().flat_map(|p| p.numbers.clone()).collect();
    let expected: Vec<u32> = (1..=30).filter(|n| !held.contains(n)).collect();
    assert_eq!(available, expected);
    assert_eq!(available.len() as u32 + r.sold_numbers, r.total_numbers);

    assert_availability_complement(&r, &participants);
    assert_all_raffle_invariants(&r, &participants);
}

#[test]
fn double_claim_is_rejected_and_nothing_recorded() {
    let mut r = raffle(10, 0);
    let mut participants = Vec::new();
    claim(&mut r, &mut participants, &[4, 5]).unwrap();

    let err = claim(&mut r, &mut participants, &[5, 6]).unwrap_err();
    assert_eq!(
        err,
        RaffleError::NumbersTaken {
            raffle_id: r.id.clone(),
            numbers: vec![5],
        }
    );
    assert_eq!(participants.len(), 1);
    assert_eq!(r.sold_numbers, 2);
    assert_no_double_booking(&participants);
}

#[test]
fn selecting_twice_is_net_deselection() {
    let mut sel = TicketSelection::new((1..=50).collect());
    sel.toggle(12);
    sel.toggle(30);
    assert_eq!(sel.toggle(12), Toggle::Removed);
    assert_eq!(sel.selected(), &[30]);
}

#[test]
fn random_five_with_three_left_selects_three() {
    let mut r = raffle(10, 0);
    let mut participants = Vec::new();
    claim(&mut r, &mut participants, &[1, 2, 3, 4, 5, 6, 7]).unwrap();

    let available = available_numbers(&r, &participants);
    assert_eq!(available, vec![8, 9, 10]);

    let mut rng = StdRng::seed_from_u64(42);
    let mut sel = TicketSelection::new(available);
    assert_eq!(sel.pick_random(5, &mut rng).len(), 3);
    assert_eq!(sel.sorted(), vec![8, 9, 10]);
}

#[test]
fn edit_with_sales_cannot_shrink_pool() {
    let original = raffle(100, 10);
    let form = RaffleForm {
        total_numbers: "90".to_string(),
        ..RaffleForm::from_raffle(&original)
    };
    match validate_edit(&form, &original) {
        Err(RaffleError::Validation(errors)) => {
            assert!(errors.contains(Field::TotalNumbers));
            assert!(!errors.contains(Field::Price));
        }
        other => panic!("expected validation errors, got {other:?}"),
    }

    let grow = RaffleForm {
        total_numbers: "150".to_string(),
        ..RaffleForm::from_raffle(&original)
    };
    assert_eq!(validate_edit(&grow, &original).unwrap().total_numbers, 150);
}

#[test]
fn edit_with_sales_cannot_change_price() {
    let original = raffle(100, 10);
    let form = RaffleForm {
        price: "12".to_string(),
        ..RaffleForm::from_raffle(&original)
    };
    match validate_edit(&form, &original) {
        Err(RaffleError::Validation(errors)) => assert!(errors.contains(Field::Price)),
        other => panic!("expected validation errors, got {other:?}"),
    }

    let same_amount = RaffleForm {
        price: "10.00".to_string(),
        ..RaffleForm::from_raffle(&original)
    };
    assert!(validate_edit(&same_amount, &original).is_ok());
}

#[test]
fn create_requires_strictly_increasing_dates() {
    let base = RaffleForm::from_raffle(&raffle(100, 0));

    let same_start_end = RaffleForm {
        end_date: base.start_date.clone(),
        ..base.clone()
    };
    match validate_new(&same_start_end) {
        Err(RaffleError::Validation(errors)) => assert!(errors.contains(Field::EndDate)),
        other => panic!("expected end_date error, got {other:?}"),
    }

    let same_end_draw = RaffleForm {
        draw_date: base.end_date.clone(),
        ..base
    };
    match validate_new(&same_end_draw) {
        Err(RaffleError::Validation(errors)) => {
            assert!(errors.contains(Field::DrawDate));
            assert!(!errors.contains(Field::EndDate));
        }
        other => panic!("expected draw_date error, got {other:?}"),
    }
}
