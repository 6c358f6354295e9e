//! # Types
//!
//! Shared data structures used across the catalog and inventory model.
//!
//! ## Design decisions
//!
//! ### Money as integer cents
//!
//! Ticket prices and amounts paid are held as [`Money`], a count of cents.
//! Totals are products of a price and a ticket count, so keeping them integral
//! makes "total paid equals price × numbers" an exact comparison.
//!
//! ### Status as a Finite-State Machine
//!
//! [`RaffleStatus`] enforces a forward-only lifecycle:
//!
//! ```text
//! Upcoming ──► Active ──► Completed
//!     └──────────┴──────► Cancelled
//! ```
//!
//! `Completed` and `Cancelled` are terminal. See [`RaffleStatus::transition`].

use std::fmt;
use std::iter::Sum;
use std::ops::Add;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::RaffleError;

// ── Money ────────────────────────────────────────────────────────────

/// An amount of currency, in cents.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    pub const fn from_units(units: i64) -> Self {
        Money(units * 100)
    }

    pub const fn cents(self) -> i64 {
        self.0
    }

    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Price of `count` tickets at this unit price.
    pub fn times(self, count: usize) -> Money {
        Money(self.0.saturating_mul(count as i64))
    }

    /// Parse a decimal amount such as `"50"`, `"12.5"` or `"0.99"`.
    ///
    /// At most two fractional digits are accepted. Signs, exponents and
    /// thousands separators are rejected.
    pub fn parse(raw: &str) -> Option<Money> {
        let raw = raw.trim();
        let (whole, fraction) = match raw.split_once('.') {
            Some((w, f)) => (w, f),
            None => (raw, ""),
        };
        if whole.is_empty() && fraction.is_empty() {
            return None;
        }
        if !whole.chars().all(|c| c.is_ascii_digit())
            || !fraction.chars().all(|c| c.is_ascii_digit())
            || fraction.len() > 2
        {
            return None;
        }
        let units: i64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
        let cents: i64 = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<i64>().ok()? * 10,
            _ => fraction.parse().ok()?,
        };
        units.checked_mul(100)?.checked_add(cents).map(Money)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        if abs % 100 == 0 {
            write!(f, "{sign}{}", abs / 100)
        } else {
            write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
        }
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.0 as f64 / 100.0)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        Ok(Money((value * 100.0).round() as i64))
    }
}

// ── Status enums ─────────────────────────────────────────────────────

/// Lifecycle status of a raffle.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RaffleStatus {
    /// Announced; sales have not opened.
    Upcoming,
    /// Tickets on sale.
    Active,
    /// Drawn.
    Completed,
    /// Withdrawn before the draw.
    Cancelled,
}

impl RaffleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upcoming => "upcoming",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Whether moving from `self` to `to` is a legal lifecycle step.
    /// Staying in the same status is always allowed.
    pub fn can_transition_to(&self, to: RaffleStatus) -> bool {
        *self == to
            || matches!(
                (self, to),
                (Self::Upcoming, Self::Active)
                    | (Self::Upcoming, Self::Cancelled)
                    | (Self::Active, Self::Completed)
                    | (Self::Active, Self::Cancelled)
            )
    }

    pub fn transition(self, to: RaffleStatus) -> Result<RaffleStatus, RaffleError> {
        if self.can_transition_to(to) {
            Ok(to)
        } else {
            Err(RaffleError::InvalidTransition { from: self, to })
        }
    }
}

impl fmt::Display for RaffleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RaffleStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upcoming" => Ok(Self::Upcoming),
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown raffle status: {other}")),
        }
    }
}

/// Payment state of a purchase.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Pending payments settle once, to either outcome.
    pub fn transition(self, to: PaymentStatus) -> Result<PaymentStatus, RaffleError> {
        match (self, to) {
            (from, to) if from == to => Ok(to),
            (Self::Pending, Self::Completed) | (Self::Pending, Self::Failed) => Ok(to),
            (from, to) => Err(RaffleError::InvalidPaymentTransition { from, to }),
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown payment status: {other}")),
        }
    }
}

// ── Records ──────────────────────────────────────────────────────────

/// A prize drawing with a fixed pool of numbered tickets.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Raffle {
    pub id: String,
    pub title: String,
    pub description: String,
    /// What the winner receives.
    pub prize: String,
    /// Price of a single ticket number.
    pub price: Money,
    /// Size of the number pool; tickets are `1..=total_numbers`.
    pub total_numbers: u32,
    /// Numbers sold to participants whose payment has not failed.
    pub sold_numbers: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub draw_date: NaiveDate,
    pub status: RaffleStatus,
    pub image: Option<String>,
    pub qr_code: Option<String>,
}

impl Raffle {
    /// Share of the pool sold, in percent.
    pub fn progress_percent(&self) -> f64 {
        if self.total_numbers == 0 {
            return 0.0;
        }
        f64::from(self.sold_numbers) / f64::from(self.total_numbers) * 100.0
    }

    /// Revenue if every number sells.
    pub fn potential_revenue(&self) -> Money {
        self.price.times(self.total_numbers as usize)
    }

    pub fn contains_number(&self, number: u32) -> bool {
        (1..=self.total_numbers).contains(&number)
    }

    /// Overwrite the editable fields with a validated draft.
    pub fn apply_draft(&mut self, draft: RaffleDraft) {
        self.title = draft.title;
        self.description = draft.description;
        self.prize = draft.prize;
        self.price = draft.price;
        self.total_numbers = draft.total_numbers;
        self.start_date = draft.start_date;
        self.end_date = draft.end_date;
        self.draw_date = draft.draw_date;
        self.status = draft.status;
        self.image = draft.image;
    }
}

/// A purchase record linking a buyer to ticket numbers of one raffle.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    pub raffle_id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    /// Purchased ticket numbers, ascending.
    pub numbers: Vec<u32>,
    pub total_paid: Money,
    pub payment_status: PaymentStatus,
    pub purchase_date: NaiveDate,
}

impl Participant {
    /// Whether this purchase still counts toward the raffle's sold total.
    pub fn counts_as_sold(&self) -> bool {
        self.payment_status != PaymentStatus::Failed
    }
}

/// Validated raffle fields, ready to be created or applied to an existing raffle.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RaffleDraft {
    pub title: String,
    pub description: String,
    pub prize: String,
    pub price: Money,
    pub total_numbers: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub draw_date: NaiveDate,
    pub status: RaffleStatus,
    pub image: Option<String>,
}

/// A validated purchase, ready to be claimed against the store.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PurchaseOrder {
    pub raffle_id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    /// Distinct, ascending, within the raffle's pool.
    pub numbers: Vec<u32>,
    pub total_paid: Money,
    pub purchase_date: NaiveDate,
}

impl PurchaseOrder {
    /// Materialise the participant record under the id the store assigned.
    pub fn into_participant(self, id: String) -> Participant {
        Participant {
            id,
            raffle_id: self.raffle_id,
            name: self.name,
            email: self.email,
            phone: self.phone,
            numbers: self.numbers,
            total_paid: self.total_paid,
            payment_status: PaymentStatus::Pending,
            purchase_date: self.purchase_date,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn money_parse_accepts_plain_decimals() {
        assert_eq!(Money::parse("50"), Some(Money::from_units(50)));
        assert_eq!(Money::parse(" 12.5 "), Some(Money::from_cents(1250)));
        assert_eq!(Money::parse("0.99"), Some(Money::from_cents(99)));
        assert_eq!(Money::parse(".5"), Some(Money::from_cents(50)));
    }

    #[test]
    fn money_parse_rejects_garbage() {
        assert_eq!(Money::parse(""), None);
        assert_eq!(Money::parse("."), None);
        assert_eq!(Money::parse("-5"), None);
        assert_eq!(Money::parse("1.234"), None);
        assert_eq!(Money::parse("1e3"), None);
        assert_eq!(Money::parse("abc"), None);
    }

    #[test]
    fn money_display() {
        assert_eq!(Money::from_units(150).to_string(), "150");
        assert_eq!(Money::from_cents(1205).to_string(), "12.05");
        assert_eq!(Money::from_units(25).times(4).to_string(), "100");
    }

    #[test]
    fn money_serializes_as_number() {
        let json = serde_json::to_string(&Money::from_cents(1250)).unwrap();
        assert_eq!(json, "12.5");
        let back: Money = serde_json::from_str("12.5").unwrap();
        assert_eq!(back, Money::from_cents(1250));
    }

    #[test]
    fn raffle_status_transitions() {
        use RaffleStatus::*;
        assert!(Upcoming.can_transition_to(Active));
        assert!(Upcoming.can_transition_to(Cancelled));
        assert!(Active.can_transition_to(Completed));
        assert!(Active.can_transition_to(Active));
        assert!(!Active.can_transition_to(Upcoming));
        assert!(!Upcoming.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Cancelled));
        assert!(matches!(
            Cancelled.transition(Active),
            Err(RaffleError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn payment_status_settles_once() {
        use PaymentStatus::*;
        assert_eq!(Pending.transition(Completed).unwrap(), Completed);
        assert_eq!(Pending.transition(Failed).unwrap(), Failed);
        assert_eq!(Failed.transition(Failed).unwrap(), Failed);
        assert!(Completed.transition(Pending).is_err());
        assert!(Failed.transition(Completed).is_err());
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            RaffleStatus::Upcoming,
            RaffleStatus::Active,
            RaffleStatus::Completed,
            RaffleStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<RaffleStatus>().unwrap(), status);
        }
        assert!("archived".parse::<RaffleStatus>().is_err());
    }
}
