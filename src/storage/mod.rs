mod memory;
mod repository;

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::{
    Expense, ExpenseId, Participant, ParticipantId, PointId, RoutePoint, Trip, TripId, Vote,
    VotingSession,
};

pub use memory::*;
pub use repository::*;

/// SQL migration for initial schema
pub const MIGRATION_001_INITIAL: &str = include_str!("migrations/001_initial.sql");

/// Persistence capability handed to the application service.
///
/// Implementations hold no business rules: they store what they are given
/// and return snapshots. Concurrent writers resolve as last write wins.
#[async_trait]
pub trait TripRepository: Send + Sync {
    // Trips
    async fn save_trip(&self, trip: &Trip) -> Result<()>;
    async fn update_trip(&self, trip: &Trip) -> Result<()>;
    async fn get_trip(&self, id: TripId) -> Result<Option<Trip>>;
    async fn get_trip_by_title(&self, title: &str) -> Result<Option<Trip>>;
    async fn list_trips(&self) -> Result<Vec<Trip>>;
    /// Removes the trip and everything attached to it.
    async fn delete_trip(&self, id: TripId) -> Result<()>;

    // Participants
    async fn save_participant(&self, participant: &Participant) -> Result<()>;
    async fn update_participant(&self, participant: &Participant) -> Result<()>;
    /// In joining order.
    async fn list_participants(&self, trip_id: TripId) -> Result<Vec<Participant>>;
    /// Removes the membership only; expenses and votes keep the id.
    async fn delete_participant(&self, id: ParticipantId) -> Result<()>;

    // Route points
    async fn save_point(&self, point: &RoutePoint) -> Result<()>;
    async fn update_point(&self, point: &RoutePoint) -> Result<()>;
    /// Sorted by order index.
    async fn list_points(&self, trip_id: TripId) -> Result<Vec<RoutePoint>>;
    /// Removes the point and the votes cast for it.
    async fn delete_point(&self, id: PointId) -> Result<()>;

    // Expenses
    async fn save_expense(&self, expense: &Expense) -> Result<()>;
    async fn update_expense(&self, expense: &Expense) -> Result<()>;
    async fn get_expense(&self, id: ExpenseId) -> Result<Option<Expense>>;
    /// In recording order.
    async fn list_expenses(&self, trip_id: TripId) -> Result<Vec<Expense>>;
    async fn delete_expense(&self, id: ExpenseId) -> Result<()>;

    // Votes
    /// Insert, or overwrite the existing vote of the same voter for the same
    /// point (comment kept unless a new one is given).
    async fn upsert_vote(&self, vote: &Vote) -> Result<()>;
    /// In first-submission order.
    async fn list_votes(&self, trip_id: TripId) -> Result<Vec<Vote>>;

    // Voting sessions
    async fn get_voting_session(&self, trip_id: TripId) -> Result<Option<VotingSession>>;
    async fn save_voting_session(&self, session: &VotingSession) -> Result<()>;
}
