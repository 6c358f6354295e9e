//! Storefront ticket picking.
//!
//! A [`TicketSelection`] is built over an availability snapshot and holds at
//! most [`MAX_SELECTION`] distinct numbers from it.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::types::Money;

/// Most numbers a single purchase may include.
pub const MAX_SELECTION: usize = 10;

/// Outcome of [`TicketSelection::toggle`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Toggle {
    Added,
    Removed,
    /// At capacity, or the number is not available.
    Ignored,
}

#[derive(Clone, Debug)]
pub struct TicketSelection {
    available: Vec<u32>,
    selected: Vec<u32>,
    cap: usize,
}

impl TicketSelection {
    pub fn new(available: Vec<u32>) -> Self {
        Self::with_cap(available, MAX_SELECTION)
    }

    pub fn with_cap(available: Vec<u32>, cap: usize) -> Self {
        Self {
            available,
            selected: Vec::new(),
            cap,
        }
    }

    /// Select `number`, or deselect it if already selected.
    pub fn toggle(&mut self, number: u32) -> Toggle {
        if let Some(pos) = self.selected.iter().position(|n| *n == number) {
            self.selected.remove(pos);
            return Toggle::Removed;
        }
        if self.is_full() || !self.available.contains(&number) {
            return Toggle::Ignored;
        }
        self.selected.push(number);
        Toggle::Added
    }

    /// Replace the selection with `count` numbers drawn uniformly without
    /// replacement from the available set.
    ///
    /// Fewer are picked when fewer are available or `count` exceeds the cap.
    pub fn pick_random<R: Rng + ?Sized>(&mut self, count: usize, rng: &mut R) -> &[u32] {
        let mut pool = self.available.clone();
        pool.shuffle(rng);
        pool.truncate(count.min(self.cap));
        self.selected = pool;
        &self.selected
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    /// Selected numbers in the order they were picked.
    pub fn selected(&self) -> &[u32] {
        &self.selected
    }

    pub fn sorted(&self) -> Vec<u32> {
        let mut numbers = self.selected.clone();
        numbers.sort_unstable();
        numbers
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.selected.len() >= self.cap
    }

    pub fn total_price(&self, price: Money) -> Money {
        price.times(self.selected.len())
    }
}
