//! Repository interface over raffles and their participants, plus the
//! in-memory implementation.
//!
//! Implementations must make [`RaffleStore::claim_numbers`] atomic: the
//! availability check, the participant insert and the sold-count bump either
//! all happen or none do.

use std::collections::HashMap;

use async_trait::async_trait;
use raffle_core::availability::{self, check_claim, taken_numbers};
use raffle_core::validation::validate_edit;
use raffle_core::{
    Participant, PaymentStatus, PurchaseOrder, Raffle, RaffleDraft, RaffleError, RaffleForm,
    RaffleStatus,
};
use tokio::sync::RwLock;
use tracing::debug;

use crate::errors::Result;

#[async_trait]
pub trait RaffleStore: Send + Sync {
    /// All raffles, ordered by id.
    async fn list_raffles(&self) -> Result<Vec<Raffle>>;

    async fn find_raffle(&self, id: &str) -> Result<Option<Raffle>>;

    /// Insert a new raffle with the next sequential id and no sales.
    async fn create_raffle(&self, draft: RaffleDraft) -> Result<Raffle>;

    /// Validate `form` against the stored raffle and replace its editable
    /// fields, as one atomic step.
    async fn update_raffle(&self, id: &str, form: &RaffleForm) -> Result<Raffle>;

    /// Move a raffle along its lifecycle.
    async fn set_raffle_status(&self, id: &str, status: RaffleStatus) -> Result<Raffle>;

    /// Remove a raffle that nobody has bought into.
    async fn delete_raffle(&self, id: &str) -> Result<()>;

    /// All participants, ordered by id.
    async fn list_participants(&self) -> Result<Vec<Participant>>;

    /// Participants of one raffle, ordered by id.
    async fn list_by_raffle(&self, raffle_id: &str) -> Result<Vec<Participant>>;

    async fn find_participant(&self, id: &str) -> Result<Option<Participant>>;

    /// Atomically claim the order's numbers and record the purchase.
    async fn claim_numbers(&self, order: PurchaseOrder) -> Result<Participant>;

    /// Settle a payment; failing it releases the numbers from the sold count.
    async fn set_payment_status(&self, id: &str, status: PaymentStatus) -> Result<Participant>;

    /// Load records verbatim, keeping their ids and recorded sold counts.
    async fn import(&self, raffles: Vec<Raffle>, participants: Vec<Participant>) -> Result<()>;
}

/// Available numbers of `raffle_id`; empty when the raffle does not exist.
pub async fn available_numbers(store: &dyn RaffleStore, raffle_id: &str) -> Result<Vec<u32>> {
    let Some(raffle) = store.find_raffle(raffle_id).await? else {
        return Ok(Vec::new());
    };
    let participants = store.list_by_raffle(raffle_id).await?;
    Ok(availability::available_numbers(&raffle, &participants))
}

/// Next id after the largest numeric id in `ids`.
pub(crate) fn next_id<'a>(ids: impl Iterator<Item = &'a String>) -> String {
    let max = ids.filter_map(|id| id.parse::<u64>().ok()).max().unwrap_or(0);
    (max + 1).to_string()
}

pub(crate) fn qr_code_for(id: &str) -> String {
    format!("QR{id:0>3}")
}

fn sort_by_numeric_id<T>(items: &mut [T], id: impl Fn(&T) -> &str) {
    items.sort_by_key(|item| {
        let id = id(item);
        (id.parse::<u64>().unwrap_or(u64::MAX), id.to_string())
    });
}

// ─────────────────────────────────────────────────────────
// In-memory store
// ─────────────────────────────────────────────────────────

#[derive(Default)]
struct Inner {
    raffles: HashMap<String, Raffle>,
    participants: HashMap<String, Participant>,
}

/// Process-local store. One lock guards both collections, so every write
/// observes and produces a consistent snapshot.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RaffleStore for MemoryStore {
    async fn list_raffles(&self) -> Result<Vec<Raffle>> {
        let inner = self.inner.read().await;
        let mut raffles: Vec<Raffle> = inner.raffles.values().cloned().collect();
        sort_by_numeric_id(&mut raffles, |r| r.id.as_str());
        Ok(raffles)
    }

    async fn find_raffle(&self, id: &str) -> Result<Option<Raffle>> {
        Ok(self.inner.read().await.raffles.get(id).cloned())
    }

    async fn create_raffle(&self, draft: RaffleDraft) -> Result<Raffle> {
        let mut inner = self.inner.write().await;
        let id = next_id(inner.raffles.keys());
        let raffle = Raffle {
            qr_code: Some(qr_code_for(&id)),
            id: id.clone(),
            title: draft.title,
            description: draft.description,
            prize: draft.prize,
            price: draft.price,
            total_numbers: draft.total_numbers,
            sold_numbers: 0,
            start_date: draft.start_date,
            end_date: draft.end_date,
            draw_date: draft.draw_date,
            status: draft.status,
            image: draft.image,
        };
        inner.raffles.insert(id, raffle.clone());
        debug!("memory store: created raffle {}", raffle.id);
        Ok(raffle)
    }

    async fn update_raffle(&self, id: &str, form: &RaffleForm) -> Result<Raffle> {
        let mut inner = self.inner.write().await;
        let raffle = inner
            .raffles
            .get_mut(id)
            .ok_or_else(|| RaffleError::raffle_not_found(id))?;
        let draft = validate_edit(form, raffle)?;
        raffle.apply_draft(draft);
        Ok(raffle.clone())
    }

    async fn set_raffle_status(&self, id: &str, status: RaffleStatus) -> Result<Raffle> {
        let mut inner = self.inner.write().await;
        let raffle = inner
            .raffles
            .get_mut(id)
            .ok_or_else(|| RaffleError::raffle_not_found(id))?;
        raffle.status = raffle.status.transition(status)?;
        Ok(raffle.clone())
    }

    async fn delete_raffle(&self, id: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        if !inner.raffles.contains_key(id) {
            return Err(RaffleError::raffle_not_found(id).into());
        }
        if inner.participants.values().any(|p| p.raffle_id == id) {
            return Err(RaffleError::HasParticipants {
                raffle_id: id.to_string(),
            }
            .into());
        }
        inner.raffles.remove(id);
        Ok(())
    }

    async fn list_participants(&self) -> Result<Vec<Participant>> {
        let inner = self.inner.read().await;
        let mut participants: Vec<Participant> = inner.participants.values().cloned().collect();
        sort_by_numeric_id(&mut participants, |p| p.id.as_str());
        Ok(participants)
    }

    async fn list_by_raffle(&self, raffle_id: &str) -> Result<Vec<Participant>> {
        let inner = self.inner.read().await;
        let mut participants: Vec<Participant> = inner
            .participants
            .values()
            .filter(|p| p.raffle_id == raffle_id)
            .cloned()
            .collect();
        sort_by_numeric_id(&mut participants, |p| p.id.as_str());
        Ok(participants)
    }

    async fn find_participant(&self, id: &str) -> Result<Option<Participant>> {
        Ok(self.inner.read().await.participants.get(id).cloned())
    }

    async fn claim_numbers(&self, order: PurchaseOrder) -> Result<Participant> {
        let mut inner = self.inner.write().await;
        let raffle = inner
            .raffles
            .get(&order.raffle_id)
            .ok_or_else(|| RaffleError::raffle_not_found(&order.raffle_id))?;

        let taken = taken_numbers(&raffle.id, inner.participants.values());
        check_claim(raffle, &order.numbers, &taken)?;

        let count = order.numbers.len() as u32;
        let id = next_id(inner.participants.keys());
        let participant = order.into_participant(id.clone());
        if let Some(raffle) = inner.raffles.get_mut(&participant.raffle_id) {
            raffle.sold_numbers += count;
        }
        inner.participants.insert(id, participant.clone());
        debug!(
            "memory store: participant {} claimed {:?} in raffle {}",
            participant.id, participant.numbers, participant.raffle_id
        );
        Ok(participant)
    }

    async fn set_payment_status(&self, id: &str, status: PaymentStatus) -> Result<Participant> {
        let mut inner = self.inner.write().await;
        let participant = inner
            .participants
            .get_mut(id)
            .ok_or_else(|| RaffleError::participant_not_found(id))?;
        let previous = participant.payment_status;
        participant.payment_status = previous.transition(status)?;
        let updated = participant.clone();

        if previous != PaymentStatus::Failed && status == PaymentStatus::Failed {
            if let Some(raffle) = inner.raffles.get_mut(&updated.raffle_id) {
                let released = updated.numbers.len() as u32;
                raffle.sold_numbers = raffle.sold_numbers.saturating_sub(released);
            }
        }
        Ok(updated)
    }

    async fn import(&self, raffles: Vec<Raffle>, participants: Vec<Participant>) -> Result<()> {
        let mut inner = self.inner.write().await;
        for raffle in raffles {
            inner.raffles.insert(raffle.id.clone(), raffle);
        }
        for mut participant in participants {
            participant.numbers.sort_unstable();
            inner.participants.insert(participant.id.clone(), participant);
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::NaiveDate;
    use raffle_core::invariants::{assert_no_double_booking, assert_sold_count_consistent};
    use raffle_core::{sample, Field, FieldErrors, Money};

    use crate::errors::ServerError;

    pub(crate) fn draft() -> RaffleDraft {
        RaffleDraft {
            title: "Espresso machine".to_string(),
            description: "Dual boiler".to_string(),
            prize: "Espresso machine".to_string(),
            price: Money::from_units(20),
            total_numbers: 50,
            start_date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(),
            draw_date: NaiveDate::from_ymd_opt(2025, 4, 5).unwrap(),
            status: RaffleStatus::Active,
            image: None,
        }
    }

    pub(crate) fn order(raffle: &Raffle, numbers: &[u32]) -> PurchaseOrder {
        PurchaseOrder {
            raffle_id: raffle.id.clone(),
            name: "Lucía".to_string(),
            email: "lucia@email.com".to_string(),
            phone: "+54 11 2222-3333".to_string(),
            numbers: numbers.to_vec(),
            total_paid: raffle.price.times(numbers.len()),
            purchase_date: raffle.start_date,
        }
    }

    /// Behaviour every store implementation must share.
    pub(crate) async fn exercise_store(store: &dyn RaffleStore) {
        store
            .import(sample::raffles(), sample::participants())
            .await
            .unwrap();
        assert_eq!(store.list_raffles().await.unwrap().len(), 3);
        assert_eq!(store.list_by_raffle("1").await.unwrap().len(), 2);

        // creation picks the next sequential id and qr code
        let created = store.create_raffle(draft()).await.unwrap();
        assert_eq!(created.id, "4");
        assert_eq!(created.qr_code.as_deref(), Some("QR004"));
        assert_eq!(created.sold_numbers, 0);

        // claim, then conflicting claim
        let first = store.claim_numbers(order(&created, &[1, 2, 3])).await.unwrap();
        assert_eq!(first.id, "4");
        assert_eq!(first.payment_status, PaymentStatus::Pending);

        let err = store
            .claim_numbers(order(&created, &[3, 4]))
            .await
            .unwrap_err();
        match err {
            ServerError::Domain(RaffleError::NumbersTaken { numbers, .. }) => {
                assert_eq!(numbers, vec![3])
            }
            other => panic!("expected NumbersTaken, got {other:?}"),
        }

        let raffle = store.find_raffle(&created.id).await.unwrap().unwrap();
        let participants = store.list_by_raffle(&created.id).await.unwrap();
        assert_eq!(participants.len(), 1);
        assert_eq!(raffle.sold_numbers, 3);
        assert_sold_count_consistent(&raffle, &participants);
        assert_no_double_booking(&store.list_participants().await.unwrap());
        assert_eq!(available_numbers(store, &created.id).await.unwrap().len(), 47);

        // failing the payment keeps the numbers held but drops them from sold
        let failed = store
            .set_payment_status(&first.id, PaymentStatus::Failed)
            .await
            .unwrap();
        assert_eq!(failed.payment_status, PaymentStatus::Failed);
        let raffle = store.find_raffle(&created.id).await.unwrap().unwrap();
        assert_eq!(raffle.sold_numbers, 0);
        assert_eq!(available_numbers(store, &created.id).await.unwrap().len(), 47);
        assert!(store
            .set_payment_status(&first.id, PaymentStatus::Completed)
            .await
            .is_err());

        // raffles with participants cannot be deleted; empty ones can
        assert!(store.delete_raffle(&created.id).await.is_err());
        let spare = store.create_raffle(draft()).await.unwrap();
        store.delete_raffle(&spare.id).await.unwrap();
        assert!(store.find_raffle(&spare.id).await.unwrap().is_none());

        // lifecycle moves forward only
        let completed = store
            .set_raffle_status(&created.id, RaffleStatus::Completed)
            .await
            .unwrap();
        assert_eq!(completed.status, RaffleStatus::Completed);
        assert!(store
            .set_raffle_status(&created.id, RaffleStatus::Active)
            .await
            .is_err());

        // a closed raffle no longer sells
        assert!(matches!(
            store.claim_numbers(order(&completed, &[10])).await,
            Err(ServerError::Domain(RaffleError::NotOnSale { .. }))
        ));

        // unknown ids
        assert!(available_numbers(store, "999").await.unwrap().is_empty());
        let form = RaffleForm::from_raffle(&created);
        assert!(store.update_raffle("999", &form).await.is_err());
    }

    fn validation_errors(result: Result<Raffle>) -> FieldErrors {
        match result {
            Err(ServerError::Domain(RaffleError::Validation(errors))) => errors,
            other => panic!("expected validation errors, got {other:?}"),
        }
    }

    /// Edits are checked against the raffle as stored, not as it was when
    /// the form was filled in.
    pub(crate) async fn exercise_guarded_update(store: &dyn RaffleStore) {
        let created = store.create_raffle(draft()).await.unwrap();

        // repriced on a form opened before the first sale
        let repriced = RaffleForm {
            price: "35".to_string(),
            ..RaffleForm::from_raffle(&created)
        };
        store.claim_numbers(order(&created, &[1])).await.unwrap();
        let errors = validation_errors(store.update_raffle(&created.id, &repriced).await);
        assert_eq!(
            errors.get(Field::Price),
            Some("price cannot change once sales have started")
        );
        let stored = store.find_raffle(&created.id).await.unwrap().unwrap();
        assert_eq!(stored.price, Money::from_units(20));

        // form still says active after the raffle completed
        let stale = RaffleForm::from_raffle(&stored);
        store
            .set_raffle_status(&created.id, RaffleStatus::Completed)
            .await
            .unwrap();
        let errors = validation_errors(store.update_raffle(&created.id, &stale).await);
        assert!(errors.contains(Field::Status));
        let stored = store.find_raffle(&created.id).await.unwrap().unwrap();
        assert_eq!(stored.status, RaffleStatus::Completed);
    }

    /// Disjoint claims all land; of the buyers racing for the same numbers
    /// exactly one wins and the rest see `NumbersTaken`.
    pub(crate) async fn exercise_concurrent_claims(store: Arc<dyn RaffleStore>) {
        let raffle = store.create_raffle(draft()).await.unwrap();

        let mut disjoint = Vec::new();
        for number in 1..=20 {
            let store = store.clone();
            let purchase = order(&raffle, &[number]);
            disjoint.push(tokio::spawn(async move { store.claim_numbers(purchase).await }));
        }
        let mut contested = Vec::new();
        for _ in 0..10 {
            let store = store.clone();
            let purchase = order(&raffle, &[21, 22]);
            contested.push(tokio::spawn(async move { store.claim_numbers(purchase).await }));
        }
        let mut readers = Vec::new();
        for _ in 0..5 {
            let store = store.clone();
            let id = raffle.id.clone();
            readers.push(tokio::spawn(async move {
                available_numbers(store.as_ref(), &id).await
            }));
        }

        for handle in disjoint {
            handle.await.unwrap().unwrap();
        }
        let mut winners = 0;
        for handle in contested {
            match handle.await.unwrap() {
                Ok(_) => winners += 1,
                Err(ServerError::Domain(RaffleError::NumbersTaken { numbers, .. })) => {
                    assert!(!numbers.is_empty());
                }
                Err(other) => panic!("expected NumbersTaken, got {other:?}"),
            }
        }
        assert_eq!(winners, 1);
        for handle in readers {
            handle.await.unwrap().unwrap();
        }

        let raffle = store.find_raffle(&raffle.id).await.unwrap().unwrap();
        let participants = store.list_by_raffle(&raffle.id).await.unwrap();
        assert_eq!(participants.len(), 21);
        assert_eq!(raffle.sold_numbers, 22);
        assert_sold_count_consistent(&raffle, &participants);
        assert_no_double_booking(&participants);
        assert_eq!(available_numbers(store.as_ref(), &raffle.id).await.unwrap().len(), 28);
    }

    #[tokio::test]
    async fn memory_store_behaves() {
        exercise_store(&MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn memory_store_guards_updates() {
        exercise_guarded_update(&MemoryStore::new()).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn memory_store_concurrent_claims() {
        exercise_concurrent_claims(Arc::new(MemoryStore::new())).await;
    }

    #[tokio::test]
    async fn memory_store_update_keeps_sales() {
        let store = MemoryStore::new();
        store.import(sample::raffles(), vec![]).await.unwrap();
        let edit = RaffleForm {
            total_numbers: "1200".to_string(),
            ..RaffleForm::from_raffle(&sample::raffles()[0])
        };
        let updated = store.update_raffle("1", &edit).await.unwrap();
        assert_eq!(updated.total_numbers, 1200);
        assert_eq!(updated.sold_numbers, 847);
        assert_eq!(updated.qr_code.as_deref(), Some("QR001"));
    }

    #[test]
    fn ids_and_qr_codes() {
        let ids = ["1".to_string(), "9".to_string(), "x".to_string()];
        assert_eq!(next_id(ids.iter()), "10");
        assert_eq!(next_id(std::iter::empty()), "1");
        assert_eq!(qr_code_for("7"), "QR007");
        assert_eq!(qr_code_for("1234"), "QR1234");
    }
}
