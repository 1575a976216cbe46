use std::collections::HashMap;
use std::str::FromStr;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{Row, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::domain::{
    Expense, ExpenseCategory, ExpenseId, InvitationStatus, Participant, ParticipantId, PointId,
    Role, RoutePoint, Trip, TripId, TripStatus, Vote, VotingSession, VotingState,
};

use super::{MIGRATION_001_INITIAL, TripRepository};

const TRIP_COLUMNS: &str =
    "id, title, description, start_date, end_date, status, currency, created_at";
const PARTICIPANT_COLUMNS: &str = "id, trip_id, name, email, role, status, created_at";
const POINT_COLUMNS: &str =
    "id, trip_id, name, latitude, longitude, description, sort_order, created_at";
const EXPENSE_COLUMNS: &str =
    "id, trip_id, category, description, amount, paid_by, expense_date, created_at";

/// SQLite-backed repository for trips and everything attached to them.
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given URL.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        debug!(database_url, "Database initialized");
        Ok(repo)
    }

    fn row_to_trip(row: &sqlx::sqlite::SqliteRow) -> Result<Trip> {
        let id_str: String = row.get("id");
        let status_str: String = row.get("status");
        let start_str: String = row.get("start_date");
        let end_str: String = row.get("end_date");
        let created_at_str: String = row.get("created_at");

        Ok(Trip {
            id: Uuid::parse_str(&id_str).context("Invalid trip ID")?,
            title: row.get("title"),
            description: row.get("description"),
            start_date: NaiveDate::from_str(&start_str).context("Invalid start_date")?,
            end_date: NaiveDate::from_str(&end_str).context("Invalid end_date")?,
            status: TripStatus::from_str(&status_str).map_err(anyhow::Error::msg)?,
            currency: row.get("currency"),
            created_at: parse_timestamp(&created_at_str)?,
        })
    }

    fn row_to_participant(row: &sqlx::sqlite::SqliteRow) -> Result<Participant> {
        let id_str: String = row.get("id");
        let trip_str: String = row.get("trip_id");
        let role_str: String = row.get("role");
        let status_str: String = row.get("status");
        let created_at_str: String = row.get("created_at");

        Ok(Participant {
            id: Uuid::parse_str(&id_str).context("Invalid participant ID")?,
            trip_id: Uuid::parse_str(&trip_str).context("Invalid trip ID")?,
            name: row.get("name"),
            email: row.get("email"),
            role: Role::from_str(&role_str).map_err(anyhow::Error::msg)?,
            status: InvitationStatus::from_str(&status_str).map_err(anyhow::Error::msg)?,
            created_at: parse_timestamp(&created_at_str)?,
        })
    }

    fn row_to_point(row: &sqlx::sqlite::SqliteRow) -> Result<RoutePoint> {
        let id_str: String = row.get("id");
        let trip_str: String = row.get("trip_id");
        let created_at_str: String = row.get("created_at");

        Ok(RoutePoint {
            id: Uuid::parse_str(&id_str).context("Invalid point ID")?,
            trip_id: Uuid::parse_str(&trip_str).context("Invalid trip ID")?,
            name: row.get("name"),
            latitude: row.get("latitude"),
            longitude: row.get("longitude"),
            description: row.get("description"),
            order: row.get("sort_order"),
            created_at: parse_timestamp(&created_at_str)?,
        })
    }

    fn row_to_expense(
        row: &sqlx::sqlite::SqliteRow,
        split_between: Vec<ParticipantId>,
    ) -> Result<Expense> {
        let id_str: String = row.get("id");
        let trip_str: String = row.get("trip_id");
        let category_str: String = row.get("category");
        let amount_str: String = row.get("amount");
        let paid_by_str: String = row.get("paid_by");
        let date_str: Option<String> = row.get("expense_date");
        let created_at_str: String = row.get("created_at");

        Ok(Expense {
            id: Uuid::parse_str(&id_str).context("Invalid expense ID")?,
            trip_id: Uuid::parse_str(&trip_str).context("Invalid trip ID")?,
            category: ExpenseCategory::from_str(&category_str).map_err(anyhow::Error::msg)?,
            description: row.get("description"),
            amount: Decimal::from_str(&amount_str).context("Invalid expense amount")?,
            paid_by: Uuid::parse_str(&paid_by_str).context("Invalid paid_by ID")?,
            split_between,
            date: date_str
                .map(|s| NaiveDate::from_str(&s))
                .transpose()
                .context("Invalid expense date")?,
            created_at: parse_timestamp(&created_at_str)?,
        })
    }

    fn row_to_vote(row: &sqlx::sqlite::SqliteRow) -> Result<Vote> {
        let trip_str: String = row.get("trip_id");
        let voter_str: String = row.get("voter_id");
        let point_str: String = row.get("point_id");
        let value: i64 = row.get("value");
        let updated_at_str: String = row.get("updated_at");

        Ok(Vote {
            trip_id: Uuid::parse_str(&trip_str).context("Invalid trip ID")?,
            voter: Uuid::parse_str(&voter_str).context("Invalid voter ID")?,
            point_id: Uuid::parse_str(&point_str).context("Invalid point ID")?,
            value: u8::try_from(value).context("Invalid vote value")?,
            comment: row.get("comment"),
            updated_at: parse_timestamp(&updated_at_str)?,
        })
    }

    async fn splits_for_expense(&self, expense_id: ExpenseId) -> Result<Vec<ParticipantId>> {
        let rows = sqlx::query(
            "SELECT participant_id FROM expense_splits WHERE expense_id = ? ORDER BY position",
        )
        .bind(expense_id.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch expense splits")?;

        rows.iter()
            .map(|row| {
                let id: String = row.get("participant_id");
                Uuid::parse_str(&id).context("Invalid split participant ID")
            })
            .collect()
    }

    async fn write_splits(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        expense: &Expense,
    ) -> Result<()> {
        sqlx::query("DELETE FROM expense_splits WHERE expense_id = ?")
            .bind(expense.id.to_string())
            .execute(&mut **tx)
            .await
            .context("Failed to clear expense splits")?;

        for (position, participant_id) in expense.split_between.iter().enumerate() {
            sqlx::query(
                "INSERT INTO expense_splits (expense_id, participant_id, position) VALUES (?, ?, ?)",
            )
            .bind(expense.id.to_string())
            .bind(participant_id.to_string())
            .bind(position as i64)
            .execute(&mut **tx)
            .await
            .context("Failed to save expense split")?;
        }
        Ok(())
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)
        .context("Invalid timestamp")?
        .with_timezone(&Utc))
}

#[async_trait]
impl TripRepository for SqliteRepository {
    // ========================
    // Trip operations
    // ========================

    async fn save_trip(&self, trip: &Trip) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO trips (id, title, description, start_date, end_date, status, currency, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(trip.id.to_string())
        .bind(&trip.title)
        .bind(&trip.description)
        .bind(trip.start_date.to_string())
        .bind(trip.end_date.to_string())
        .bind(trip.status.as_str())
        .bind(&trip.currency)
        .bind(trip.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save trip")?;
        Ok(())
    }

    async fn update_trip(&self, trip: &Trip) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE trips
            SET title = ?, description = ?, start_date = ?, end_date = ?, status = ?, currency = ?
            WHERE id = ?
            "#,
        )
        .bind(&trip.title)
        .bind(&trip.description)
        .bind(trip.start_date.to_string())
        .bind(trip.end_date.to_string())
        .bind(trip.status.as_str())
        .bind(&trip.currency)
        .bind(trip.id.to_string())
        .execute(&self.pool)
        .await
        .context("Failed to update trip")?;
        Ok(())
    }

    async fn get_trip(&self, id: TripId) -> Result<Option<Trip>> {
        let row = sqlx::query(&format!("SELECT {TRIP_COLUMNS} FROM trips WHERE id = ?"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch trip")?;

        row.as_ref().map(Self::row_to_trip).transpose()
    }

    async fn get_trip_by_title(&self, title: &str) -> Result<Option<Trip>> {
        let row = sqlx::query(&format!("SELECT {TRIP_COLUMNS} FROM trips WHERE title = ?"))
            .bind(title)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch trip by title")?;

        row.as_ref().map(Self::row_to_trip).transpose()
    }

    async fn list_trips(&self) -> Result<Vec<Trip>> {
        let rows = sqlx::query(&format!(
            "SELECT {TRIP_COLUMNS} FROM trips ORDER BY start_date, title"
        ))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list trips")?;

        rows.iter().map(Self::row_to_trip).collect()
    }

    async fn delete_trip(&self, id: TripId) -> Result<()> {
        let id = id.to_string();
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        for statement in [
            "DELETE FROM votes WHERE trip_id = ?",
            "DELETE FROM expense_splits WHERE expense_id IN (SELECT id FROM expenses WHERE trip_id = ?)",
            "DELETE FROM expenses WHERE trip_id = ?",
            "DELETE FROM route_points WHERE trip_id = ?",
            "DELETE FROM participants WHERE trip_id = ?",
            "DELETE FROM voting_sessions WHERE trip_id = ?",
            "DELETE FROM trips WHERE id = ?",
        ] {
            sqlx::query(statement)
                .bind(&id)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("Failed to delete trip data: {}", statement))?;
        }

        tx.commit().await.context("Failed to commit trip deletion")?;
        Ok(())
    }

    // ========================
    // Participant operations
    // ========================

    async fn save_participant(&self, participant: &Participant) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO participants (id, trip_id, name, email, role, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(participant.id.to_string())
        .bind(participant.trip_id.to_string())
        .bind(&participant.name)
        .bind(&participant.email)
        .bind(participant.role.as_str())
        .bind(participant.status.as_str())
        .bind(participant.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save participant")?;
        Ok(())
    }

    async fn update_participant(&self, participant: &Participant) -> Result<()> {
        sqlx::query("UPDATE participants SET name = ?, email = ?, role = ?, status = ? WHERE id = ?")
            .bind(&participant.name)
            .bind(&participant.email)
            .bind(participant.role.as_str())
            .bind(participant.status.as_str())
            .bind(participant.id.to_string())
            .execute(&self.pool)
            .await
            .context("Failed to update participant")?;
        Ok(())
    }

    async fn list_participants(&self, trip_id: TripId) -> Result<Vec<Participant>> {
        let rows = sqlx::query(&format!(
            "SELECT {PARTICIPANT_COLUMNS} FROM participants WHERE trip_id = ? ORDER BY created_at, rowid"
        ))
        .bind(trip_id.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list participants")?;

        rows.iter().map(Self::row_to_participant).collect()
    }

    async fn delete_participant(&self, id: ParticipantId) -> Result<()> {
        sqlx::query("DELETE FROM participants WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .context("Failed to delete participant")?;
        Ok(())
    }

    // ========================
    // Route point operations
    // ========================

    async fn save_point(&self, point: &RoutePoint) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO route_points (id, trip_id, name, latitude, longitude, description, sort_order, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(point.id.to_string())
        .bind(point.trip_id.to_string())
        .bind(&point.name)
        .bind(point.latitude)
        .bind(point.longitude)
        .bind(&point.description)
        .bind(point.order)
        .bind(point.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save route point")?;
        Ok(())
    }

    async fn update_point(&self, point: &RoutePoint) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE route_points
            SET name = ?, latitude = ?, longitude = ?, description = ?, sort_order = ?
            WHERE id = ?
            "#,
        )
        .bind(&point.name)
        .bind(point.latitude)
        .bind(point.longitude)
        .bind(&point.description)
        .bind(point.order)
        .bind(point.id.to_string())
        .execute(&self.pool)
        .await
        .context("Failed to update route point")?;
        Ok(())
    }

    async fn list_points(&self, trip_id: TripId) -> Result<Vec<RoutePoint>> {
        let rows = sqlx::query(&format!(
            "SELECT {POINT_COLUMNS} FROM route_points WHERE trip_id = ? ORDER BY sort_order, created_at"
        ))
        .bind(trip_id.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list route points")?;

        rows.iter().map(Self::row_to_point).collect()
    }

    async fn delete_point(&self, id: PointId) -> Result<()> {
        let id = id.to_string();
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        sqlx::query("DELETE FROM votes WHERE point_id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete votes for route point")?;
        sqlx::query("DELETE FROM route_points WHERE id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete route point")?;

        tx.commit().await.context("Failed to commit route point deletion")?;
        Ok(())
    }

    // ========================
    // Expense operations
    // ========================

    async fn save_expense(&self, expense: &Expense) -> Result<()> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        sqlx::query(
            r#"
            INSERT INTO expenses (id, trip_id, category, description, amount, paid_by, expense_date, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(expense.id.to_string())
        .bind(expense.trip_id.to_string())
        .bind(expense.category.as_str())
        .bind(&expense.description)
        .bind(expense.amount.to_string())
        .bind(expense.paid_by.to_string())
        .bind(expense.date.map(|d| d.to_string()))
        .bind(expense.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .context("Failed to save expense")?;

        Self::write_splits(&mut tx, expense).await?;
        tx.commit().await.context("Failed to commit expense")?;
        Ok(())
    }

    async fn update_expense(&self, expense: &Expense) -> Result<()> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        sqlx::query(
            r#"
            UPDATE expenses
            SET category = ?, description = ?, amount = ?, paid_by = ?, expense_date = ?
            WHERE id = ?
            "#,
        )
        .bind(expense.category.as_str())
        .bind(&expense.description)
        .bind(expense.amount.to_string())
        .bind(expense.paid_by.to_string())
        .bind(expense.date.map(|d| d.to_string()))
        .bind(expense.id.to_string())
        .execute(&mut *tx)
        .await
        .context("Failed to update expense")?;

        Self::write_splits(&mut tx, expense).await?;
        tx.commit().await.context("Failed to commit expense update")?;
        Ok(())
    }

    async fn get_expense(&self, id: ExpenseId) -> Result<Option<Expense>> {
        let row = sqlx::query(&format!("SELECT {EXPENSE_COLUMNS} FROM expenses WHERE id = ?"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch expense")?;

        match row {
            Some(row) => {
                let splits = self.splits_for_expense(id).await?;
                Ok(Some(Self::row_to_expense(&row, splits)?))
            }
            None => Ok(None),
        }
    }

    async fn list_expenses(&self, trip_id: TripId) -> Result<Vec<Expense>> {
        let trip = trip_id.to_string();

        let split_rows = sqlx::query(
            r#"
            SELECT s.expense_id, s.participant_id
            FROM expense_splits s
            JOIN expenses e ON e.id = s.expense_id
            WHERE e.trip_id = ?
            ORDER BY s.expense_id, s.position
            "#,
        )
        .bind(&trip)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list expense splits")?;

        let mut splits: HashMap<ExpenseId, Vec<ParticipantId>> = HashMap::new();
        for row in split_rows {
            let expense_id: String = row.get("expense_id");
            let participant_id: String = row.get("participant_id");
            splits
                .entry(Uuid::parse_str(&expense_id).context("Invalid expense ID")?)
                .or_default()
                .push(Uuid::parse_str(&participant_id).context("Invalid split participant ID")?);
        }

        let rows = sqlx::query(&format!(
            "SELECT {EXPENSE_COLUMNS} FROM expenses WHERE trip_id = ? ORDER BY created_at, rowid"
        ))
        .bind(&trip)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list expenses")?;

        rows.iter()
            .map(|row| {
                let id_str: String = row.get("id");
                let id = Uuid::parse_str(&id_str).context("Invalid expense ID")?;
                Self::row_to_expense(row, splits.remove(&id).unwrap_or_default())
            })
            .collect()
    }

    async fn delete_expense(&self, id: ExpenseId) -> Result<()> {
        let id = id.to_string();
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        sqlx::query("DELETE FROM expense_splits WHERE expense_id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete expense splits")?;
        sqlx::query("DELETE FROM expenses WHERE id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete expense")?;

        tx.commit().await.context("Failed to commit expense deletion")?;
        Ok(())
    }

    // ========================
    // Vote operations
    // ========================

    async fn upsert_vote(&self, vote: &Vote) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO votes (trip_id, voter_id, point_id, value, comment, updated_at, seq)
            VALUES (?, ?, ?, ?, ?, ?, (SELECT COALESCE(MAX(seq), 0) + 1 FROM votes))
            ON CONFLICT (voter_id, point_id) DO UPDATE SET
                value = excluded.value,
                comment = COALESCE(excluded.comment, votes.comment),
                updated_at = excluded.updated_at
            "#,
        )
        .bind(vote.trip_id.to_string())
        .bind(vote.voter.to_string())
        .bind(vote.point_id.to_string())
        .bind(i64::from(vote.value))
        .bind(&vote.comment)
        .bind(vote.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save vote")?;
        Ok(())
    }

    async fn list_votes(&self, trip_id: TripId) -> Result<Vec<Vote>> {
        let rows = sqlx::query(
            r#"
            SELECT trip_id, voter_id, point_id, value, comment, updated_at
            FROM votes
            WHERE trip_id = ?
            ORDER BY seq
            "#,
        )
        .bind(trip_id.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list votes")?;

        rows.iter().map(Self::row_to_vote).collect()
    }

    // ========================
    // Voting session operations
    // ========================

    async fn get_voting_session(&self, trip_id: TripId) -> Result<Option<VotingSession>> {
        let row = sqlx::query(
            "SELECT trip_id, state, started_at, started_by FROM voting_sessions WHERE trip_id = ?",
        )
        .bind(trip_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch voting session")?;

        let Some(row) = row else {
            return Ok(None);
        };

        let state_str: String = row.get("state");
        let started_at_str: Option<String> = row.get("started_at");
        let started_by_str: Option<String> = row.get("started_by");

        Ok(Some(VotingSession {
            trip_id,
            state: VotingState::from_str(&state_str).map_err(anyhow::Error::msg)?,
            started_at: started_at_str.as_deref().map(parse_timestamp).transpose()?,
            started_by: started_by_str
                .map(|s| Uuid::parse_str(&s))
                .transpose()
                .context("Invalid started_by ID")?,
        }))
    }

    async fn save_voting_session(&self, session: &VotingSession) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO voting_sessions (trip_id, state, started_at, started_by)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (trip_id) DO UPDATE SET
                state = excluded.state,
                started_at = excluded.started_at,
                started_by = excluded.started_by
            "#,
        )
        .bind(session.trip_id.to_string())
        .bind(session.state.as_str())
        .bind(session.started_at.map(|dt| dt.to_rfc3339()))
        .bind(session.started_by.map(|id| id.to_string()))
        .execute(&self.pool)
        .await
        .context("Failed to save voting session")?;
        Ok(())
    }
}
