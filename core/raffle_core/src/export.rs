//! CSV report exports.
//!
//! Every export is a fixed header line followed by one line per record,
//! joined with `\n`. Fields are quoted per RFC 4180 when they contain a
//! comma, a double quote or a line break. Ticket numbers are joined with `;`.

use chrono::NaiveDate;

use crate::reports::{MonthlyTrend, RafflePerformance, Summary};
use crate::types::{Participant, Raffle};

pub const RAFFLE_PARTICIPANTS_HEADER: &str =
    "Name,Email,Phone,Numbers,Total Paid,Payment Status,Purchase Date";
pub const PARTICIPANTS_HEADER: &str =
    "Name,Email,Phone,Raffle,Numbers,Total Paid,Payment Status,Purchase Date";
pub const GENERAL_HEADER: &str = "Metric,Value";
pub const RAFFLES_HEADER: &str =
    "Raffle,Status,Participants,Numbers Sold,Total Numbers,Progress %,Revenue,Pending,Potential";
pub const MONTHLY_HEADER: &str = "Month,Raffles,Participants,Revenue";

/// Label used when a participant references a raffle that no longer exists.
pub const UNKNOWN_RAFFLE: &str = "Unknown raffle";

/// Quote `field` if it would otherwise break the row.
pub fn escape(field: &str) -> String {
    if field.contains(&[',', '"', '\n', '\r'][..]) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn row<I, S>(fields: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    fields
        .into_iter()
        .map(|f| escape(f.as_ref()))
        .collect::<Vec<_>>()
        .join(",")
}

fn table(header: &str, rows: impl IntoIterator<Item = String>) -> String {
    std::iter::once(header.to_string())
        .chain(rows)
        .collect::<Vec<_>>()
        .join("\n")
}

fn joined_numbers(numbers: &[u32]) -> String {
    numbers
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(";")
}

/// `<prefix>-<YYYY-MM-DD>.csv`
pub fn filename(prefix: &str, date: NaiveDate) -> String {
    format!("{prefix}-{}.csv", date.format("%Y-%m-%d"))
}

/// Participants of a single raffle.
pub fn raffle_participants_csv(participants: &[Participant]) -> String {
    table(
        RAFFLE_PARTICIPANTS_HEADER,
        participants.iter().map(|p| {
            row([
                p.name.clone(),
                p.email.clone(),
                p.phone.clone(),
                joined_numbers(&p.numbers),
                p.total_paid.to_string(),
                p.payment_status.to_string(),
                p.purchase_date.to_string(),
            ])
        }),
    )
}

/// Participants across raffles, each labelled with its raffle title.
pub fn participants_csv(participants: &[Participant], raffles: &[Raffle]) -> String {
    table(
        PARTICIPANTS_HEADER,
        participants.iter().map(|p| {
            let title = raffles
                .iter()
                .find(|r| r.id == p.raffle_id)
                .map_or(UNKNOWN_RAFFLE, |r| r.title.as_str());
            row([
                p.name.clone(),
                p.email.clone(),
                p.phone.clone(),
                title.to_string(),
                joined_numbers(&p.numbers),
                p.total_paid.to_string(),
                p.payment_status.to_string(),
                p.purchase_date.to_string(),
            ])
        }),
    )
}

pub fn general_csv(summary: &Summary) -> String {
    let metrics = [
        ("Total Raffles", summary.total_raffles.to_string()),
        ("Active Raffles", summary.active_raffles.to_string()),
        ("Completed Raffles", summary.completed_raffles.to_string()),
        ("Total Participants", summary.total_participants.to_string()),
        ("Total Revenue", summary.total_revenue.to_string()),
        ("Pending Revenue", summary.pending_revenue.to_string()),
    ];
    table(
        GENERAL_HEADER,
        metrics
            .iter()
            .map(|(name, value)| row([name.to_string(), value.clone()])),
    )
}

pub fn raffles_csv(performance: &[RafflePerformance]) -> String {
    table(
        RAFFLES_HEADER,
        performance.iter().map(|r| {
            row([
                r.title.clone(),
                r.status.to_string(),
                r.participant_count.to_string(),
                r.sold_numbers.to_string(),
                r.total_numbers.to_string(),
                format!("{:.1}", r.progress_percent),
                r.revenue.to_string(),
                r.pending.to_string(),
                r.potential_revenue.to_string(),
            ])
        }),
    )
}

pub fn monthly_csv(trend: &[MonthlyTrend]) -> String {
    table(
        MONTHLY_HEADER,
        trend.iter().map(|m| {
            row([
                m.month.clone(),
                m.raffles.to_string(),
                m.participants.to_string(),
                m.revenue.to_string(),
            ])
        }),
    )
}
