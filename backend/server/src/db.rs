//! Database layer: migrations, row mapping and the SQLite-backed store.

use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use raffle_core::availability::check_claim;
use raffle_core::validation::{validate_edit, RaffleForm};
use raffle_core::{
    Money, Participant, PaymentStatus, PurchaseOrder, Raffle, RaffleDraft, RaffleError,
    RaffleStatus,
};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::errors::{Result, ServerError};
use crate::store::{qr_code_for, RaffleStore};

/// How long a connection waits on a locked database before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Establish a SQLite connection pool and run pending migrations.
///
/// File databases are created on first use and run in WAL mode so readers
/// never block the single writer.
pub async fn init_pool(database_url: &str, max_connections: u32) -> Result<SqlitePool> {
    let url = if database_url.starts_with("sqlite:") {
        database_url.to_string()
    } else {
        format!("sqlite:{database_url}")
    };

    let mut options = SqliteConnectOptions::from_str(&url)?
        .create_if_missing(true)
        .busy_timeout(BUSY_TIMEOUT);
    if !url.contains(":memory:") {
        options = options.journal_mode(SqliteJournalMode::Wal);
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database migrations applied successfully");
    Ok(pool)
}

// ─────────────────────────────────────────────────────────
// Row shapes
// ─────────────────────────────────────────────────────────

#[derive(Debug, sqlx::FromRow)]
struct RaffleRow {
    id: String,
    title: String,
    description: String,
    prize: String,
    price_cents: i64,
    total_numbers: i64,
    sold_numbers: i64,
    start_date: NaiveDate,
    end_date: NaiveDate,
    draw_date: NaiveDate,
    status: String,
    image: Option<String>,
    qr_code: Option<String>,
}

impl TryFrom<RaffleRow> for Raffle {
    type Error = ServerError;

    fn try_from(row: RaffleRow) -> Result<Self> {
        Ok(Raffle {
            total_numbers: to_u32(row.total_numbers, "raffles.total_numbers")?,
            sold_numbers: to_u32(row.sold_numbers, "raffles.sold_numbers")?,
            status: row.status.parse().map_err(ServerError::CorruptRow)?,
            price: Money::from_cents(row.price_cents),
            id: row.id,
            title: row.title,
            description: row.description,
            prize: row.prize,
            start_date: row.start_date,
            end_date: row.end_date,
            draw_date: row.draw_date,
            image: row.image,
            qr_code: row.qr_code,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ParticipantRow {
    id: String,
    raffle_id: String,
    name: String,
    email: String,
    phone: String,
    total_paid_cents: i64,
    payment_status: String,
    purchase_date: NaiveDate,
}

impl ParticipantRow {
    fn into_participant(self, numbers: Vec<u32>) -> Result<Participant> {
        Ok(Participant {
            payment_status: self.payment_status.parse().map_err(ServerError::CorruptRow)?,
            total_paid: Money::from_cents(self.total_paid_cents),
            id: self.id,
            raffle_id: self.raffle_id,
            name: self.name,
            email: self.email,
            phone: self.phone,
            numbers,
            purchase_date: self.purchase_date,
        })
    }
}

fn to_u32(value: i64, column: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| ServerError::CorruptRow(format!("{column} = {value}")))
}

const RAFFLE_COLUMNS: &str = r#"
    id, title, description, prize, price_cents, total_numbers, sold_numbers,
    start_date, end_date, draw_date, status, image, qr_code
"#;

const PARTICIPANT_COLUMNS: &str = r#"
    id, raffle_id, name, email, phone, total_paid_cents, payment_status, purchase_date
"#;

// ─────────────────────────────────────────────────────────
// Query helpers shared by pool and transaction paths
// ─────────────────────────────────────────────────────────

async fn fetch_raffle(conn: &mut SqliteConnection, id: &str) -> Result<Option<Raffle>> {
    let row = sqlx::query_as::<_, RaffleRow>(&format!(
        "SELECT {RAFFLE_COLUMNS} FROM raffles WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    row.map(Raffle::try_from).transpose()
}

async fn require_raffle(conn: &mut SqliteConnection, id: &str) -> Result<Raffle> {
    fetch_raffle(conn, id)
        .await?
        .ok_or_else(|| RaffleError::raffle_not_found(id).into())
}

async fn fetch_participant(conn: &mut SqliteConnection, id: &str) -> Result<Option<Participant>> {
    let row = sqlx::query_as::<_, ParticipantRow>(&format!(
        "SELECT {PARTICIPANT_COLUMNS} FROM participants WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    let Some(row) = row else {
        return Ok(None);
    };
    let numbers: Vec<(i64,)> =
        sqlx::query_as("SELECT number FROM tickets WHERE participant_id = ?1 ORDER BY number ASC")
            .bind(id)
            .fetch_all(&mut *conn)
            .await?;
    let numbers = numbers
        .into_iter()
        .map(|(n,)| to_u32(n, "tickets.number"))
        .collect::<Result<Vec<_>>>()?;
    row.into_participant(numbers).map(Some)
}

/// Next sequential id for `table` (whose ids are decimal strings).
async fn next_id(conn: &mut SqliteConnection, table: &str) -> Result<String> {
    let (max,): (i64,) = sqlx::query_as(&format!(
        "SELECT COALESCE(MAX(CAST(id AS INTEGER)), 0) FROM {table}"
    ))
    .fetch_one(&mut *conn)
    .await?;
    Ok((max + 1).to_string())
}

async fn insert_tickets(
    tx: &mut Transaction<'_, Sqlite>,
    raffle_id: &str,
    participant_id: &str,
    numbers: &[u32],
) -> Result<()> {
    for number in numbers {
        let inserted = sqlx::query(
            "INSERT INTO tickets (raffle_id, number, participant_id) VALUES (?1, ?2, ?3)",
        )
        .bind(raffle_id)
        .bind(i64::from(*number))
        .bind(participant_id)
        .execute(&mut **tx)
        .await;

        match inserted {
            Ok(_) => {}
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                return Err(RaffleError::NumbersTaken {
                    raffle_id: raffle_id.to_string(),
                    numbers: vec![*number],
                }
                .into());
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

async fn insert_participant(
    tx: &mut Transaction<'_, Sqlite>,
    participant: &Participant,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO participants
            (id, raffle_id, name, email, phone, total_paid_cents, payment_status, purchase_date)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&participant.id)
    .bind(&participant.raffle_id)
    .bind(&participant.name)
    .bind(&participant.email)
    .bind(&participant.phone)
    .bind(participant.total_paid.cents())
    .bind(participant.payment_status.as_str())
    .bind(participant.purchase_date)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn insert_raffle(tx: &mut Transaction<'_, Sqlite>, raffle: &Raffle) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO raffles
            (id, title, description, prize, price_cents, total_numbers, sold_numbers,
             start_date, end_date, draw_date, status, image, qr_code)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
        "#,
    )
    .bind(&raffle.id)
    .bind(&raffle.title)
    .bind(&raffle.description)
    .bind(&raffle.prize)
    .bind(raffle.price.cents())
    .bind(i64::from(raffle.total_numbers))
    .bind(i64::from(raffle.sold_numbers))
    .bind(raffle.start_date)
    .bind(raffle.end_date)
    .bind(raffle.draw_date)
    .bind(raffle.status.as_str())
    .bind(&raffle.image)
    .bind(&raffle.qr_code)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Attach ticket numbers to participant rows.
async fn with_numbers(
    pool: &SqlitePool,
    rows: Vec<ParticipantRow>,
    raffle_id: Option<&str>,
) -> Result<Vec<Participant>> {
    let tickets: Vec<(String, i64)> = match raffle_id {
        Some(raffle_id) => {
            sqlx::query_as(
                r#"
                SELECT participant_id, number
                FROM   tickets
                WHERE  raffle_id = ?1
                ORDER  BY number ASC
                "#,
            )
            .bind(raffle_id)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as("SELECT participant_id, number FROM tickets ORDER BY number ASC")
                .fetch_all(pool)
                .await?
        }
    };

    let mut by_participant: HashMap<String, Vec<u32>> = HashMap::new();
    for (participant_id, number) in tickets {
        by_participant
            .entry(participant_id)
            .or_default()
            .push(to_u32(number, "tickets.number")?);
    }

    rows.into_iter()
        .map(|row| {
            let numbers = by_participant.remove(&row.id).unwrap_or_default();
            row.into_participant(numbers)
        })
        .collect()
}

// ─────────────────────────────────────────────────────────
// Store
// ─────────────────────────────────────────────────────────

/// SQLite-backed [`RaffleStore`].
///
/// Write transactions are serialised through `write_gate`: a deferred
/// SQLite transaction that reads before it writes can fail to upgrade its
/// lock without waiting, so only one writer is let in at a time.
pub struct SqliteStore {
    pool: SqlitePool,
    write_gate: Mutex<()>,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            write_gate: Mutex::new(()),
        }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        Ok(Self::new(init_pool(database_url, max_connections).await?))
    }
}

#[async_trait]
impl RaffleStore for SqliteStore {
    async fn list_raffles(&self) -> Result<Vec<Raffle>> {
        let rows = sqlx::query_as::<_, RaffleRow>(&format!(
            "SELECT {RAFFLE_COLUMNS} FROM raffles ORDER BY CAST(id AS INTEGER) ASC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Raffle::try_from).collect()
    }

    async fn find_raffle(&self, id: &str) -> Result<Option<Raffle>> {
        let mut conn = self.pool.acquire().await?;
        fetch_raffle(&mut conn, id).await
    }

    async fn create_raffle(&self, draft: RaffleDraft) -> Result<Raffle> {
        let _writer = self.write_gate.lock().await;
        let mut tx = self.pool.begin().await?;
        let id = next_id(&mut tx, "raffles").await?;
        let raffle = Raffle {
            qr_code: Some(qr_code_for(&id)),
            id,
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
        insert_raffle(&mut tx, &raffle).await?;
        tx.commit().await?;
        debug!("sqlite store: created raffle {}", raffle.id);
        Ok(raffle)
    }

    async fn update_raffle(&self, id: &str, form: &RaffleForm) -> Result<Raffle> {
        let _writer = self.write_gate.lock().await;
        let mut tx = self.pool.begin().await?;
        let mut raffle = require_raffle(&mut tx, id).await?;
        let draft = validate_edit(form, &raffle)?;
        raffle.apply_draft(draft);
        sqlx::query(
            r#"
            UPDATE raffles
            SET    title = ?2, description = ?3, prize = ?4, price_cents = ?5,
                   total_numbers = ?6, start_date = ?7, end_date = ?8, draw_date = ?9,
                   status = ?10, image = ?11
            WHERE  id = ?1
            "#,
        )
        .bind(&raffle.id)
        .bind(&raffle.title)
        .bind(&raffle.description)
        .bind(&raffle.prize)
        .bind(raffle.price.cents())
        .bind(i64::from(raffle.total_numbers))
        .bind(raffle.start_date)
        .bind(raffle.end_date)
        .bind(raffle.draw_date)
        .bind(raffle.status.as_str())
        .bind(&raffle.image)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(raffle)
    }

    async fn set_raffle_status(&self, id: &str, status: RaffleStatus) -> Result<Raffle> {
        let _writer = self.write_gate.lock().await;
        let mut tx = self.pool.begin().await?;
        let mut raffle = require_raffle(&mut tx, id).await?;
        raffle.status = raffle.status.transition(status)?;
        sqlx::query("UPDATE raffles SET status = ?2 WHERE id = ?1")
            .bind(id)
            .bind(raffle.status.as_str())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(raffle)
    }

    async fn delete_raffle(&self, id: &str) -> Result<()> {
        let _writer = self.write_gate.lock().await;
        let mut tx = self.pool.begin().await?;
        require_raffle(&mut tx, id).await?;
        let (participants,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM participants WHERE raffle_id = ?1")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
        if participants > 0 {
            return Err(RaffleError::HasParticipants {
                raffle_id: id.to_string(),
            }
            .into());
        }
        sqlx::query("DELETE FROM raffles WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn list_participants(&self) -> Result<Vec<Participant>> {
        let rows = sqlx::query_as::<_, ParticipantRow>(&format!(
            r#"
            SELECT {PARTICIPANT_COLUMNS}
            FROM   participants
            ORDER  BY CAST(id AS INTEGER) ASC, id ASC
            "#
        ))
        .fetch_all(&self.pool)
        .await?;
        with_numbers(&self.pool, rows, None).await
    }

    async fn list_by_raffle(&self, raffle_id: &str) -> Result<Vec<Participant>> {
        let rows = sqlx::query_as::<_, ParticipantRow>(&format!(
            r#"
            SELECT {PARTICIPANT_COLUMNS}
            FROM   participants
            WHERE  raffle_id = ?1
            ORDER  BY CAST(id AS INTEGER) ASC, id ASC
            "#
        ))
        .bind(raffle_id)
        .fetch_all(&self.pool)
        .await?;
        with_numbers(&self.pool, rows, Some(raffle_id)).await
    }

    async fn find_participant(&self, id: &str) -> Result<Option<Participant>> {
        let mut conn = self.pool.acquire().await?;
        fetch_participant(&mut conn, id).await
    }

    async fn claim_numbers(&self, order: PurchaseOrder) -> Result<Participant> {
        let _writer = self.write_gate.lock().await;
        let mut tx = self.pool.begin().await?;
        let raffle = require_raffle(&mut tx, &order.raffle_id).await?;

        let mut taken = HashSet::new();
        for number in &order.numbers {
            let held: Option<(i64,)> =
                sqlx::query_as("SELECT number FROM tickets WHERE raffle_id = ?1 AND number = ?2")
                    .bind(&raffle.id)
                    .bind(i64::from(*number))
                    .fetch_optional(&mut *tx)
                    .await?;
            if held.is_some() {
                taken.insert(*number);
            }
        }
        check_claim(&raffle, &order.numbers, &taken)?;

        let id = next_id(&mut tx, "participants").await?;
        let count = order.numbers.len() as i64;
        let participant = order.into_participant(id);

        insert_participant(&mut tx, &participant).await?;
        insert_tickets(&mut tx, &raffle.id, &participant.id, &participant.numbers).await?;
        sqlx::query("UPDATE raffles SET sold_numbers = sold_numbers + ?2 WHERE id = ?1")
            .bind(&raffle.id)
            .bind(count)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        debug!(
            "sqlite store: participant {} claimed {:?} in raffle {}",
            participant.id, participant.numbers, participant.raffle_id
        );
        Ok(participant)
    }

    async fn set_payment_status(&self, id: &str, status: PaymentStatus) -> Result<Participant> {
        let _writer = self.write_gate.lock().await;
        let mut tx = self.pool.begin().await?;
        let mut participant = fetch_participant(&mut tx, id)
            .await?
            .ok_or_else(|| RaffleError::participant_not_found(id))?;
        let previous = participant.payment_status;
        participant.payment_status = previous.transition(status)?;

        sqlx::query("UPDATE participants SET payment_status = ?2 WHERE id = ?1")
            .bind(id)
            .bind(participant.payment_status.as_str())
            .execute(&mut *tx)
            .await?;

        if previous != PaymentStatus::Failed && status == PaymentStatus::Failed {
            sqlx::query(
                "UPDATE raffles SET sold_numbers = MAX(sold_numbers - ?2, 0) WHERE id = ?1",
            )
            .bind(&participant.raffle_id)
            .bind(participant.numbers.len() as i64)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(participant)
    }

    async fn import(&self, raffles: Vec<Raffle>, participants: Vec<Participant>) -> Result<()> {
        let _writer = self.write_gate.lock().await;
        let mut tx = self.pool.begin().await?;
        for raffle in &raffles {
            insert_raffle(&mut tx, raffle).await?;
        }
        for participant in &participants {
            insert_participant(&mut tx, participant).await?;
            insert_tickets(&mut tx, &participant.raffle_id, &participant.id, &participant.numbers)
                .await?;
        }
        tx.commit().await?;
        info!(
            "Imported {} raffles and {} participants",
            raffles.len(),
            participants.len()
        );
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────
