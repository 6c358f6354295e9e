//! Date-driven status advancement.

use chrono::NaiveDate;

use crate::types::{Raffle, RaffleStatus};

/// The next status `raffle` is due for on `today`, if any.
///
/// Only one step is returned: an upcoming raffle whose draw date has also
/// passed becomes active first and completed on the following call.
pub fn scheduled_status(raffle: &Raffle, today: NaiveDate) -> Option<RaffleStatus> {
    match raffle.status {
        RaffleStatus::Upcoming if today >= raffle.start_date => Some(RaffleStatus::Active),
        RaffleStatus::Active if today >= raffle.draw_date => Some(RaffleStatus::Completed),
        _ => None,
    }
}
