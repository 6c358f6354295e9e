//! Admin reporting: KPIs, per-raffle performance, monthly trend and
//! participant filtering.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::types::{Money, Participant, PaymentStatus, Raffle, RaffleStatus};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Summary {
    pub total_raffles: usize,
    pub active_raffles: usize,
    pub completed_raffles: usize,
    pub total_participants: usize,
    /// Sum paid by participants whose payment completed.
    pub total_revenue: Money,
    pub pending_revenue: Money,
}

fn paid_with(participants: &[&Participant], status: PaymentStatus) -> Money {
    participants
        .iter()
        .filter(|p| p.payment_status == status)
        .map(|p| p.total_paid)
        .sum()
}

pub fn summary(raffles: &[Raffle], participants: &[Participant]) -> Summary {
    let all: Vec<&Participant> = participants.iter().collect();
    Summary {
        total_raffles: raffles.len(),
        active_raffles: raffles.iter().filter(|r| r.status == RaffleStatus::Active).count(),
        completed_raffles: raffles
            .iter()
            .filter(|r| r.status == RaffleStatus::Completed)
            .count(),
        total_participants: participants.len(),
        total_revenue: paid_with(&all, PaymentStatus::Completed),
        pending_revenue: paid_with(&all, PaymentStatus::Pending),
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RafflePerformance {
    pub raffle_id: String,
    pub title: String,
    pub status: RaffleStatus,
    pub participant_count: usize,
    pub sold_numbers: u32,
    pub total_numbers: u32,
    pub progress_percent: f64,
    pub revenue: Money,
    pub pending: Money,
    pub potential_revenue: Money,
}

pub fn raffle_performance(
    raffles: &[Raffle],
    participants: &[Participant],
) -> Vec<RafflePerformance> {
    raffles
        .iter()
        .map(|raffle| {
            let own: Vec<&Participant> = participants
                .iter()
                .filter(|p| p.raffle_id == raffle.id)
                .collect();
            RafflePerformance {
                raffle_id: raffle.id.clone(),
                title: raffle.title.clone(),
                status: raffle.status,
                participant_count: own.len(),
                sold_numbers: raffle.sold_numbers,
                total_numbers: raffle.total_numbers,
                progress_percent: raffle.progress_percent(),
                revenue: paid_with(&own, PaymentStatus::Completed),
                pending: paid_with(&own, PaymentStatus::Pending),
                potential_revenue: raffle.potential_revenue(),
            }
        })
        .collect()
}

/// The `n` best raffles by completed revenue. Ties keep catalog order.
pub fn top_raffles(performance: &[RafflePerformance], n: usize) -> Vec<RafflePerformance> {
    let mut ranked = performance.to_vec();
    ranked.sort_by(|a, b| b.revenue.cmp(&a.revenue));
    ranked.truncate(n);
    ranked
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MonthlyTrend {
    /// `YYYY-MM`.
    pub month: String,
    /// Raffles whose sales opened this month.
    pub raffles: usize,
    /// Purchases made this month.
    pub participants: usize,
    /// Completed payments for purchases made this month.
    pub revenue: Money,
}

/// Activity per calendar month, oldest first. Months with no raffle opening
/// and no purchase are omitted.
pub fn monthly_trend(raffles: &[Raffle], participants: &[Participant]) -> Vec<MonthlyTrend> {
    let mut months: BTreeMap<(i32, u32), MonthlyTrend> = BTreeMap::new();
    for raffle in raffles {
        month_of(&mut months, raffle.start_date).raffles += 1;
    }
    for participant in participants {
        let row = month_of(&mut months, participant.purchase_date);
        row.participants += 1;
        if participant.payment_status == PaymentStatus::Completed {
            row.revenue = row.revenue + participant.total_paid;
        }
    }
    months.into_values().collect()
}

fn month_of(months: &mut BTreeMap<(i32, u32), MonthlyTrend>, date: NaiveDate) -> &mut MonthlyTrend {
    let (year, month) = (date.year(), date.month());
    months.entry((year, month)).or_insert_with(|| MonthlyTrend {
        month: format!("{year:04}-{month:02}"),
        raffles: 0,
        participants: 0,
        revenue: Money::ZERO,
    })
}

/// Participant list filters from the admin participants screen.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ParticipantFilter {
    /// Case-insensitive match on name or email; plain substring on phone.
    pub search: Option<String>,
    pub status: Option<PaymentStatus>,
    pub raffle_id: Option<String>,
}

impl ParticipantFilter {
    pub fn matches(&self, participant: &Participant) -> bool {
        if let Some(term) = self.search.as_deref().filter(|t| !t.is_empty()) {
            let needle = term.to_lowercase();
            let hit = participant.name.to_lowercase().contains(&needle)
                || participant.email.to_lowercase().contains(&needle)
                || participant.phone.contains(term);
            if !hit {
                return false;
            }
        }
        if self.status.is_some_and(|s| s != participant.payment_status) {
            return false;
        }
        if let Some(raffle_id) = self.raffle_id.as_deref() {
            if participant.raffle_id != raffle_id {
                return false;
            }
        }
        true
    }

    pub fn apply(&self, participants: Vec<Participant>) -> Vec<Participant> {
        participants.into_iter().filter(|p| self.matches(p)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample;

    #[test]
    fn summary_over_sample_catalog() {
        let s = summary(&sample::raffles(), &sample::participants());
        assert_eq!(s.total_raffles, 3);
        assert_eq!(s.active_raffles, 2);
        assert_eq!(s.completed_raffles, 0);
        assert_eq!(s.total_participants, 3);
        assert_eq!(s.total_revenue, Money::from_units(250));
        assert_eq!(s.pending_revenue, Money::from_units(100));
    }

    #[test]
    fn performance_and_top_raffles() {
        let perf = raffle_performance(&sample::raffles(), &sample::participants());
        assert_eq!(perf.len(), 3);
        assert_eq!(perf[0].participant_count, 2);
        assert_eq!(perf[0].revenue, Money::from_units(250));
        assert_eq!(perf[1].pending, Money::from_units(100));
        assert_eq!(perf[1].potential_revenue, Money::from_units(12_500));
        assert!((perf[0].progress_percent - 84.7).abs() < 1e-9);

        let top = top_raffles(&perf, 2);
        assert_eq!(top[0].raffle_id, "1");
        assert_eq!(top.len(), 2);
    }

    #[test]
    fn monthly_trend_groups_by_month() {
        let trend = monthly_trend(&sample::raffles(), &sample::participants());
        assert_eq!(trend.len(), 1);
        assert_eq!(trend[0].month, "2024-01");
        assert_eq!(trend[0].raffles, 3);
        assert_eq!(trend[0].participants, 3);
        assert_eq!(trend[0].revenue, Money::from_units(250));
    }

    #[test]
    fn filter_by_search_status_and_raffle() {
        let all = sample::participants();
        let by_name = ParticipantFilter {
            search: Some("MARÍA".to_string()),
            ..Default::default()
        };
        assert_eq!(by_name.apply(all.clone()).len(), 1);

        let by_phone = ParticipantFilter {
            search: Some("5555".to_string()),
            ..Default::default()
        };
        assert_eq!(by_phone.apply(all.clone())[0].name, "Carlos López");

        let pending_in_one = ParticipantFilter {
            status: Some(PaymentStatus::Pending),
            raffle_id: Some("1".to_string()),
            ..Default::default()
        };
        assert!(pending_in_one.apply(all.clone()).is_empty());

        assert_eq!(ParticipantFilter::default().apply(all).len(), 3);
    }
}
