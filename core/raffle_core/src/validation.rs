//! Form validation for raffle administration and storefront purchases.
//!
//! Validators never fail fast: every rule runs and each violation is recorded
//! against its [`Field`]. A non-empty [`FieldErrors`] blocks submission.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{RaffleError, Result};
use crate::selection::MAX_SELECTION;
use crate::types::{Money, PurchaseOrder, Raffle, RaffleDraft, RaffleStatus};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Largest number pool a raffle may offer.
pub const MAX_TOTAL_NUMBERS: u32 = 100_000;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Title,
    Description,
    Prize,
    Price,
    TotalNumbers,
    StartDate,
    EndDate,
    DrawDate,
    Status,
    Name,
    Email,
    Phone,
    Numbers,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Description => "description",
            Self::Prize => "prize",
            Self::Price => "price",
            Self::TotalNumbers => "total_numbers",
            Self::StartDate => "start_date",
            Self::EndDate => "end_date",
            Self::DrawDate => "draw_date",
            Self::Status => "status",
            Self::Name => "name",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Numbers => "numbers",
        }
    }
}

/// Per-field error messages. A later error on the same field replaces the
/// earlier one.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<Field, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: Field, message: impl Into<String>) {
        self.0.insert(field, message.into());
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.0.get(&field).map(String::as_str)
    }

    pub fn contains(&self, field: Field) -> bool {
        self.0.contains_key(&field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &str)> {
        self.0.iter().map(|(f, m)| (*f, m.as_str()))
    }

    fn into_result<T>(self, value: impl FnOnce() -> T) -> Result<T> {
        if self.is_empty() {
            Ok(value())
        } else {
            Err(RaffleError::Validation(self))
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, message) in self.iter() {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{}: {message}", field.as_str())?;
            first = false;
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────
// Raffle form
// ─────────────────────────────────────────────────────────

/// Raffle fields exactly as typed into the admin form.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct RaffleForm {
    pub title: String,
    pub description: String,
    pub prize: String,
    pub price: String,
    pub total_numbers: String,
    pub start_date: String,
    pub end_date: String,
    pub draw_date: String,
    pub status: Option<RaffleStatus>,
    pub image: Option<String>,
}

impl RaffleForm {
    /// Pre-fill the form from an existing raffle, as the edit screen does.
    pub fn from_raffle(raffle: &Raffle) -> Self {
        Self {
            title: raffle.title.clone(),
            description: raffle.description.clone(),
            prize: raffle.prize.clone(),
            price: raffle.price.to_string(),
            total_numbers: raffle.total_numbers.to_string(),
            start_date: raffle.start_date.format(DATE_FORMAT).to_string(),
            end_date: raffle.end_date.format(DATE_FORMAT).to_string(),
            draw_date: raffle.draw_date.format(DATE_FORMAT).to_string(),
            status: Some(raffle.status),
            image: raffle.image.clone(),
        }
    }
}

/// Fields parsed from a form; `None` where parsing failed.
struct Parsed {
    price: Option<Money>,
    total_numbers: Option<u32>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    draw_date: Option<NaiveDate>,
}

fn require_text(errors: &mut FieldErrors, field: Field, value: &str, message: &str) {
    if value.trim().is_empty() {
        errors.insert(field, message);
    }
}

fn parse_date(
    errors: &mut FieldErrors,
    field: Field,
    value: &str,
    label: &str,
) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        errors.insert(field, format!("{label} is required"));
        return None;
    }
    match NaiveDate::parse_from_str(value, DATE_FORMAT) {
        Ok(date) => Some(date),
        Err(_) => {
            errors.insert(field, format!("{label} must be a date in YYYY-MM-DD format"));
            None
        }
    }
}

/// Rules shared by create and edit.
fn check_common(form: &RaffleForm, errors: &mut FieldErrors) -> Parsed {
    require_text(errors, Field::Title, &form.title, "title is required");
    require_text(errors, Field::Description, &form.description, "description is required");
    require_text(errors, Field::Prize, &form.prize, "prize is required");

    let price = Money::parse(&form.price).filter(|p| p.is_positive());
    if price.is_none() {
        errors.insert(Field::Price, "price must be greater than 0");
    }

    let total_numbers = form.total_numbers.trim().parse::<u32>().ok();
    let total_numbers = match total_numbers {
        Some(n) if n > MAX_TOTAL_NUMBERS => {
            errors.insert(
                Field::TotalNumbers,
                format!("there can be at most {MAX_TOTAL_NUMBERS} numbers"),
            );
            None
        }
        Some(n) if n > 0 => Some(n),
        _ => {
            errors.insert(Field::TotalNumbers, "there must be at least 1 number");
            None
        }
    };

    let start_date = parse_date(errors, Field::StartDate, &form.start_date, "start date");
    let end_date = parse_date(errors, Field::EndDate, &form.end_date, "end date");
    let draw_date = parse_date(errors, Field::DrawDate, &form.draw_date, "draw date");

    if let (Some(start), Some(end)) = (start_date, end_date) {
        if start >= end {
            errors.insert(Field::EndDate, "end date must be after the start date");
        }
    }
    if let (Some(end), Some(draw)) = (end_date, draw_date) {
        if end >= draw {
            errors.insert(Field::DrawDate, "draw date must be after the end of sales");
        }
    }

    Parsed {
        price,
        total_numbers,
        start_date,
        end_date,
        draw_date,
    }
}

fn build_draft(form: &RaffleForm, parsed: Parsed, status: RaffleStatus) -> Option<RaffleDraft> {
    Some(RaffleDraft {
        title: form.title.trim().to_string(),
        description: form.description.trim().to_string(),
        prize: form.prize.trim().to_string(),
        price: parsed.price?,
        total_numbers: parsed.total_numbers?,
        start_date: parsed.start_date?,
        end_date: parsed.end_date?,
        draw_date: parsed.draw_date?,
        status,
        image: form
            .image
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
    })
}

/// Validate the "new raffle" form.
pub fn validate_new(form: &RaffleForm) -> Result<RaffleDraft> {
    let mut errors = FieldErrors::new();
    let parsed = check_common(form, &mut errors);

    let status = form.status.unwrap_or(RaffleStatus::Upcoming);
    if status.is_terminal() {
        errors.insert(Field::Status, "a new raffle must be upcoming or active");
    }

    if !errors.is_empty() {
        return Err(RaffleError::Validation(errors));
    }
    build_draft(form, parsed, status).ok_or_else(|| RaffleError::Validation(FieldErrors::new()))
}

/// Validate the "edit raffle" form against the raffle being edited.
///
/// Once any number has sold, the pool may only grow and the price is frozen.
pub fn validate_edit(form: &RaffleForm, original: &Raffle) -> Result<RaffleDraft> {
    let mut errors = FieldErrors::new();
    let parsed = check_common(form, &mut errors);

    if original.sold_numbers > 0 {
        let total = form.total_numbers.trim().parse::<u32>().ok();
        if total.is_some_and(|t| t < original.total_numbers) {
            errors.insert(
                Field::TotalNumbers,
                "total numbers cannot be reduced once sales have started",
            );
        }
        if Money::parse(&form.price) != Some(original.price) {
            errors.insert(Field::Price, "price cannot change once sales have started");
        }
    }

    let status = form.status.unwrap_or(original.status);
    if !original.status.can_transition_to(status) {
        errors.insert(
            Field::Status,
            format!("status cannot change from {} to {}", original.status, status),
        );
    }

    if !errors.is_empty() {
        return Err(RaffleError::Validation(errors));
    }
    build_draft(form, parsed, status).ok_or_else(|| RaffleError::Validation(FieldErrors::new()))
}

// ─────────────────────────────────────────────────────────
// Purchase form
// ─────────────────────────────────────────────────────────

/// Buyer details and chosen numbers as submitted from the storefront.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct PurchaseRequest {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub numbers: Vec<u32>,
}

/// Validate a purchase against the raffle it targets.
///
/// Availability is not checked here; the store does that atomically when the
/// numbers are claimed.
pub fn validate_purchase(
    raffle: &Raffle,
    request: &PurchaseRequest,
    today: NaiveDate,
) -> Result<PurchaseOrder> {
    if raffle.status != RaffleStatus::Active {
        return Err(RaffleError::NotOnSale {
            raffle_id: raffle.id.clone(),
            status: raffle.status,
        });
    }

    let mut errors = FieldErrors::new();
    require_text(&mut errors, Field::Name, &request.name, "name is required");
    require_text(&mut errors, Field::Email, &request.email, "email is required");
    require_text(&mut errors, Field::Phone, &request.phone, "phone is required");

    let mut seen = HashSet::new();
    if request.numbers.is_empty() {
        errors.insert(Field::Numbers, "select at least one number");
    } else if request.numbers.len() > MAX_SELECTION {
        errors.insert(
            Field::Numbers,
            format!("at most {MAX_SELECTION} numbers per purchase"),
        );
    } else if !request.numbers.iter().all(|n| seen.insert(*n)) {
        errors.insert(Field::Numbers, "numbers must not repeat");
    } else if let Some(out) = request.numbers.iter().find(|n| !raffle.contains_number(**n)) {
        errors.insert(
            Field::Numbers,
            format!("number {out} is outside 1..={}", raffle.total_numbers),
        );
    }

    let mut numbers = request.numbers.clone();
    numbers.sort_unstable();
    errors.into_result(|| PurchaseOrder {
        raffle_id: raffle.id.clone(),
        name: request.name.trim().to_string(),
        email: request.email.trim().to_string(),
        phone: request.phone.trim().to_string(),
        total_paid: raffle.price.times(numbers.len()),
        numbers,
        purchase_date: today,
    })
}
