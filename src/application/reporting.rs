use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    Amount, Expense, ExpenseCategory, Participant, ParticipantId, PointResult, RoutePoint, Trip,
    Vote, VotingState,
};

/// Net position of one participant over the whole trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceLine {
    pub participant_id: ParticipantId,
    pub name: String,
    pub paid: Amount,
    pub share: Amount,
    pub balance: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementLine {
    pub from: String,
    pub to: String,
    pub amount: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceReport {
    pub trip_title: String,
    pub currency: String,
    /// Every recorded expense, including those left out of the balances
    pub total_spent: Amount,
    /// Shares owed by split participants who are no longer current members,
    /// whether removed from the trip or having declined the invitation
    pub unresolved: Amount,
    pub skipped_expenses: usize,
    pub lines: Vec<BalanceLine>,
    pub settlements: Vec<SettlementLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryReport {
    pub trip_title: String,
    pub currency: String,
    pub categories: Vec<CategorySummary>,
    pub total: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorySummary {
    pub category: ExpenseCategory,
    pub total: Amount,
    pub count: i64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VotingReport {
    pub trip_title: String,
    pub state: VotingState,
    pub started_at: Option<DateTime<Utc>>,
    /// Ranked best first
    pub results: Vec<PointResult>,
    pub voter_names: HashMap<ParticipantId, String>,
}

impl VotingReport {
    /// Display name of a voter; participants who left keep their votes but
    /// lose their name.
    pub fn voter_name(&self, voter: &ParticipantId) -> &str {
        self.voter_names
            .get(voter)
            .map(String::as_str)
            .unwrap_or("(former participant)")
    }
}

/// Everything stored for one trip, as written by the JSON export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripSnapshot {
    pub version: String,
    pub trip: Trip,
    pub participants: Vec<Participant>,
    pub points: Vec<RoutePoint>,
    pub expenses: Vec<Expense>,
    pub votes: Vec<Vote>,
    pub voting_state: VotingState,
    pub exported_at: DateTime<Utc>,
}

/// Trip header with counts, for `trip show`.
pub struct TripInfo {
    pub trip: Trip,
    pub owner: Option<Participant>,
    pub participant_count: usize,
    pub point_count: usize,
    pub expense_count: usize,
    pub total_spent: Amount,
    pub voting_state: VotingState,
}
