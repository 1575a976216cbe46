use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{
    Expense, ExpenseId, Participant, ParticipantId, PointId, RoutePoint, Trip, TripId, Vote,
    VotingSession,
};

use super::TripRepository;

#[derive(Default)]
struct State {
    trips: Vec<Trip>,
    participants: Vec<Participant>,
    points: Vec<RoutePoint>,
    expenses: Vec<Expense>,
    votes: Vec<Vote>,
    sessions: HashMap<TripId, VotingSession>,
}

/// Process-local repository. Nothing survives the process; used by tests
/// and throwaway runs.
#[derive(Default)]
pub struct MemoryRepository {
    state: RwLock<State>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn replace<T>(items: &mut [T], item: &T, same: impl Fn(&T) -> bool)
where
    T: Clone,
{
    if let Some(slot) = items.iter_mut().find(|existing| same(existing)) {
        *slot = item.clone();
    }
}

#[async_trait]
impl TripRepository for MemoryRepository {
    async fn save_trip(&self, trip: &Trip) -> Result<()> {
        self.state.write().await.trips.push(trip.clone());
        Ok(())
    }

    async fn update_trip(&self, trip: &Trip) -> Result<()> {
        let mut state = self.state.write().await;
        replace(&mut state.trips, trip, |t| t.id == trip.id);
        Ok(())
    }

    async fn get_trip(&self, id: TripId) -> Result<Option<Trip>> {
        let state = self.state.read().await;
        Ok(state.trips.iter().find(|t| t.id == id).cloned())
    }

    async fn get_trip_by_title(&self, title: &str) -> Result<Option<Trip>> {
        let state = self.state.read().await;
        Ok(state.trips.iter().find(|t| t.title == title).cloned())
    }

    async fn list_trips(&self) -> Result<Vec<Trip>> {
        let mut trips = self.state.read().await.trips.clone();
        trips.sort_by(|a, b| {
            a.start_date
                .cmp(&b.start_date)
                .then_with(|| a.title.cmp(&b.title))
        });
        Ok(trips)
    }

    async fn delete_trip(&self, id: TripId) -> Result<()> {
        let mut state = self.state.write().await;
        state.votes.retain(|v| v.trip_id != id);
        state.expenses.retain(|e| e.trip_id != id);
        state.points.retain(|p| p.trip_id != id);
        state.participants.retain(|p| p.trip_id != id);
        state.sessions.remove(&id);
        state.trips.retain(|t| t.id != id);
        Ok(())
    }

    async fn save_participant(&self, participant: &Participant) -> Result<()> {
        self.state
            .write()
            .await
            .participants
            .push(participant.clone());
        Ok(())
    }

    async fn update_participant(&self, participant: &Participant) -> Result<()> {
        let mut state = self.state.write().await;
        replace(&mut state.participants, participant, |p| {
            p.id == participant.id
        });
        Ok(())
    }

    async fn list_participants(&self, trip_id: TripId) -> Result<Vec<Participant>> {
        let state = self.state.read().await;
        Ok(state
            .participants
            .iter()
            .filter(|p| p.trip_id == trip_id)
            .cloned()
            .collect())
    }

    async fn delete_participant(&self, id: ParticipantId) -> Result<()> {
        self.state.write().await.participants.retain(|p| p.id != id);
        Ok(())
    }

    async fn save_point(&self, point: &RoutePoint) -> Result<()> {
        self.state.write().await.points.push(point.clone());
        Ok(())
    }

    async fn update_point(&self, point: &RoutePoint) -> Result<()> {
        let mut state = self.state.write().await;
        replace(&mut state.points, point, |p| p.id == point.id);
        Ok(())
    }

    async fn list_points(&self, trip_id: TripId) -> Result<Vec<RoutePoint>> {
        let state = self.state.read().await;
        let mut points: Vec<RoutePoint> = state
            .points
            .iter()
            .filter(|p| p.trip_id == trip_id)
            .cloned()
            .collect();
        points.sort_by(|a, b| {
            a.order
                .cmp(&b.order)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        Ok(points)
    }

    async fn delete_point(&self, id: PointId) -> Result<()> {
        let mut state = self.state.write().await;
        state.votes.retain(|v| v.point_id != id);
        state.points.retain(|p| p.id != id);
        Ok(())
    }

    async fn save_expense(&self, expense: &Expense) -> Result<()> {
        self.state.write().await.expenses.push(expense.clone());
        Ok(())
    }

    async fn update_expense(&self, expense: &Expense) -> Result<()> {
        let mut state = self.state.write().await;
        replace(&mut state.expenses, expense, |e| e.id == expense.id);
        Ok(())
    }

    async fn get_expense(&self, id: ExpenseId) -> Result<Option<Expense>> {
        let state = self.state.read().await;
        Ok(state.expenses.iter().find(|e| e.id == id).cloned())
    }

    async fn list_expenses(&self, trip_id: TripId) -> Result<Vec<Expense>> {
        let state = self.state.read().await;
        Ok(state
            .expenses
            .iter()
            .filter(|e| e.trip_id == trip_id)
            .cloned()
            .collect())
    }

    async fn delete_expense(&self, id: ExpenseId) -> Result<()> {
        self.state.write().await.expenses.retain(|e| e.id != id);
        Ok(())
    }

    async fn upsert_vote(&self, vote: &Vote) -> Result<()> {
        let mut state = self.state.write().await;
        match state
            .votes
            .iter_mut()
            .find(|v| v.voter == vote.voter && v.point_id == vote.point_id)
        {
            Some(existing) => existing.overwrite_with(vote.clone()),
            None => state.votes.push(vote.clone()),
        }
        Ok(())
    }

    async fn list_votes(&self, trip_id: TripId) -> Result<Vec<Vote>> {
        let state = self.state.read().await;
        Ok(state
            .votes
            .iter()
            .filter(|v| v.trip_id == trip_id)
            .cloned()
            .collect())
    }

    async fn get_voting_session(&self, trip_id: TripId) -> Result<Option<VotingSession>> {
        Ok(self.state.read().await.sessions.get(&trip_id).cloned())
    }

    async fn save_voting_session(&self, session: &VotingSession) -> Result<()> {
        self.state
            .write()
            .await
            .sessions
            .insert(session.trip_id, session.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use uuid::Uuid;

    use super::*;

    #[tokio::test]
    async fn test_upsert_vote_overwrites_in_place() {
        let repo = MemoryRepository::new();
        let trip = Uuid::new_v4();
        let (voter, other) = (Uuid::new_v4(), Uuid::new_v4());
        let point = Uuid::new_v4();

        repo.upsert_vote(&Vote::new(trip, voter, point, 2).unwrap().with_comment("first"))
            .await
            .unwrap();
        repo.upsert_vote(&Vote::new(trip, other, point, 4).unwrap())
            .await
            .unwrap();
        repo.upsert_vote(&Vote::new(trip, voter, point, 5).unwrap())
            .await
            .unwrap();

        let votes = repo.list_votes(trip).await.unwrap();
        assert_eq!(votes.len(), 2);
        assert_eq!(votes[0].voter, voter);
        assert_eq!(votes[0].value, 5);
        assert_eq!(votes[0].comment.as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn test_delete_trip_removes_children() {
        let repo = MemoryRepository::new();
        let day = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let trip = Trip::new("Alps", day, day, "EUR");
        let owner = Participant::owner(trip.id, "Owner");

        repo.save_trip(&trip).await.unwrap();
        repo.save_participant(&owner).await.unwrap();
        repo.save_voting_session(&VotingSession::new(trip.id))
            .await
            .unwrap();

        repo.delete_trip(trip.id).await.unwrap();

        assert!(repo.get_trip(trip.id).await.unwrap().is_none());
        assert!(repo.list_participants(trip.id).await.unwrap().is_empty());
        assert!(repo.get_voting_session(trip.id).await.unwrap().is_none());
    }
}
