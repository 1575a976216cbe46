use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::{
    Amount, Expense, ExpenseCategory, ExpenseId, InvitationStatus, Participant, ParticipantId,
    RoutePoint, Role, Trip, TripId, TripStatus, Vote, VotingSession, aggregate_votes,
    balance_sheet, next_order, suggest_settlements, total_spent,
};
use crate::storage::{SqliteRepository, TripRepository};

use super::{
    AppError, BalanceLine, BalanceReport, CategoryReport, CategorySummary, SettlementLine,
    TripInfo, TripSnapshot, VotingReport,
};

/// Application service providing high-level operations on trips.
/// This is the primary interface for any client (CLI, API, TUI, etc.).
///
/// Every call that touches a trip names the acting participant; the service
/// resolves names to ids, checks the actor's role and hands a snapshot of the
/// trip to the domain functions.
pub struct TripService<R: TripRepository> {
    repo: R,
}

/// Input for recording an expense. Participants are given by name.
pub struct NewExpense {
    pub amount: Amount,
    pub paid_by: String,
    /// Empty means everyone on the trip
    pub split_between: Vec<String>,
    pub category: ExpenseCategory,
    pub description: String,
    pub date: Option<NaiveDate>,
}

/// Fields to change on an expense. `None` keeps the current value.
#[derive(Default)]
pub struct ExpenseUpdate {
    pub amount: Option<Amount>,
    pub paid_by: Option<String>,
    pub split_between: Option<Vec<String>>,
    pub category: Option<ExpenseCategory>,
    pub description: Option<String>,
    pub date: Option<NaiveDate>,
}

/// Fields to change on a route point. `None` keeps the current value.
#[derive(Default)]
pub struct PointUpdate {
    pub name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub description: Option<String>,
    pub order: Option<i64>,
}

#[derive(Debug, Clone, Copy)]
enum Access {
    /// Any participant, whatever the invitation status
    Member,
    /// Accepted participants
    Read,
    /// Accepted owners and editors
    Edit,
    /// The trip owner
    Own,
}

/// A trip, its participants and the one acting on it.
struct TripScope {
    trip: Trip,
    participants: Vec<Participant>,
    actor: Participant,
}

impl TripScope {
    /// Participants who count for balances and expense validation.
    fn members(&self) -> Vec<Participant> {
        self.participants
            .iter()
            .filter(|p| p.status != InvitationStatus::Declined)
            .cloned()
            .collect()
    }
}

fn find_participant<'a>(
    participants: &'a [Participant],
    name: &str,
) -> Result<&'a Participant, AppError> {
    participants
        .iter()
        .find(|p| p.name == name)
        .ok_or_else(|| AppError::ParticipantNotFound(name.to_string()))
}

/// Look a point up by id, falling back to its name.
fn find_point<'a>(points: &'a [RoutePoint], key: &str) -> Result<&'a RoutePoint, AppError> {
    let by_id = Uuid::parse_str(key).ok();
    points
        .iter()
        .find(|p| Some(p.id) == by_id)
        .or_else(|| points.iter().find(|p| p.name == key))
        .ok_or_else(|| AppError::PointNotFound(key.to_string()))
}

fn name_of(participants: &[Participant], id: ParticipantId) -> String {
    participants
        .iter()
        .find(|p| p.id == id)
        .map(|p| p.name.clone())
        .unwrap_or_else(|| id.to_string())
}

fn resolve_names(
    participants: &[Participant],
    names: &[String],
) -> Result<Vec<ParticipantId>, AppError> {
    names
        .iter()
        .map(|name| find_participant(participants, name).map(|p| p.id))
        .collect()
}

impl TripService<SqliteRepository> {
    /// Initialize a new database at the given path.
    pub async fn init(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = SqliteRepository::init(&db_url).await?;
        Ok(Self::new(repo))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = SqliteRepository::connect(&db_url).await?;
        Ok(Self::new(repo))
    }
}

impl<R: TripRepository> TripService<R> {
    /// Create a new trip service with the given repository.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    async fn load_trip(&self, title: &str) -> Result<Trip, AppError> {
        self.repo
            .get_trip_by_title(title)
            .await?
            .ok_or_else(|| AppError::TripNotFound(title.to_string()))
    }

    async fn scope(
        &self,
        title: &str,
        actor: &str,
        access: Access,
        action: &'static str,
    ) -> Result<TripScope, AppError> {
        let trip = self.load_trip(title).await?;
        let participants = self.repo.list_participants(trip.id).await?;
        let actor = find_participant(&participants, actor)?.clone();

        let allowed = match access {
            Access::Member => true,
            Access::Read => actor.is_accepted(),
            Access::Edit => actor.can_edit(),
            Access::Own => actor.is_owner(),
        };
        if !allowed {
            debug!(actor = %actor.name, ?access, action, "Access denied");
            return Err(AppError::Forbidden {
                actor: actor.name,
                action,
            });
        }

        Ok(TripScope {
            trip,
            participants,
            actor,
        })
    }

    async fn voting_session(&self, trip_id: TripId) -> Result<VotingSession, AppError> {
        Ok(self
            .repo
            .get_voting_session(trip_id)
            .await?
            .unwrap_or_else(|| VotingSession::new(trip_id)))
    }

    // ========================
    // Trip operations
    // ========================

    /// Create a trip. The creator joins as its owner, already accepted.
    pub async fn create_trip(
        &self,
        title: String,
        start_date: NaiveDate,
        end_date: NaiveDate,
        currency: String,
        description: Option<String>,
        owner_name: String,
    ) -> Result<(Trip, Participant), AppError> {
        if self.repo.get_trip_by_title(&title).await?.is_some() {
            return Err(AppError::TripAlreadyExists(title));
        }

        let mut trip = Trip::new(title, start_date, end_date, currency);
        if !trip.has_valid_dates() {
            return Err(AppError::InvalidTripDates {
                start_date,
                end_date,
            });
        }
        if let Some(desc) = description {
            trip = trip.with_description(desc);
        }

        let owner = Participant::owner(trip.id, owner_name);
        self.repo.save_trip(&trip).await?;
        self.repo.save_participant(&owner).await?;
        self.repo
            .save_voting_session(&VotingSession::new(trip.id))
            .await?;

        info!(trip = %trip.title, owner = %owner.name, "Trip created");
        Ok((trip, owner))
    }

    /// Get a trip by title.
    pub async fn get_trip(&self, title: &str) -> Result<Trip, AppError> {
        self.load_trip(title).await
    }

    /// Get a trip with its owner and counts.
    pub async fn get_trip_info(&self, title: &str, actor: &str) -> Result<TripInfo, AppError> {
        let scope = self.scope(title, actor, Access::Read, "view the trip").await?;
        let points = self.repo.list_points(scope.trip.id).await?;
        let expenses = self.repo.list_expenses(scope.trip.id).await?;
        let session = self.voting_session(scope.trip.id).await?;

        Ok(TripInfo {
            owner: scope.participants.iter().find(|p| p.is_owner()).cloned(),
            participant_count: scope.participants.len(),
            point_count: points.len(),
            expense_count: expenses.len(),
            total_spent: total_spent(&expenses),
            voting_state: session.state,
            trip: scope.trip,
        })
    }

    /// List all trips, earliest first.
    pub async fn list_trips(&self) -> Result<Vec<Trip>, AppError> {
        Ok(self.repo.list_trips().await?)
    }

    /// Change the display status of a trip. Independent of voting.
    pub async fn update_trip_status(
        &self,
        title: &str,
        actor: &str,
        status: TripStatus,
    ) -> Result<Trip, AppError> {
        let scope = self.scope(title, actor, Access::Own, "change the trip").await?;
        let trip = scope.trip.with_status(status);
        self.repo.update_trip(&trip).await?;

        info!(trip = %trip.title, %status, "Trip status updated");
        Ok(trip)
    }

    /// Delete a trip with its participants, points, expenses and votes.
    pub async fn delete_trip(&self, title: &str, actor: &str) -> Result<Trip, AppError> {
        let scope = self.scope(title, actor, Access::Own, "delete the trip").await?;
        self.repo.delete_trip(scope.trip.id).await?;

        info!(trip = %scope.trip.title, "Trip deleted");
        Ok(scope.trip)
    }

    // ========================
    // Participant operations
    // ========================

    /// Invite someone to the trip. The invitation starts out pending.
    pub async fn invite_participant(
        &self,
        title: &str,
        actor: &str,
        name: String,
        email: Option<String>,
        role: Role,
    ) -> Result<Participant, AppError> {
        let scope = self
            .scope(title, actor, Access::Own, "manage participants")
            .await?;

        if role == Role::Owner {
            return Err(AppError::OwnerRoleReserved(name));
        }
        if scope.participants.iter().any(|p| p.name == name) {
            return Err(AppError::ParticipantAlreadyExists(name));
        }
        if let Some(email) = &email {
            let taken = scope.participants.iter().any(|p| {
                p.email
                    .as_deref()
                    .is_some_and(|existing| existing.eq_ignore_ascii_case(email))
            });
            if taken {
                return Err(AppError::ParticipantAlreadyExists(email.clone()));
            }
        }

        let mut participant = Participant::new(scope.trip.id, name).with_role(role);
        if let Some(email) = email {
            participant = participant.with_email(email);
        }
        self.repo.save_participant(&participant).await?;

        info!(trip = %scope.trip.title, participant = %participant.name, %role, "Participant invited");
        Ok(participant)
    }

    /// Accept or decline one's own pending invitation.
    pub async fn respond_to_invitation(
        &self,
        title: &str,
        name: &str,
        accept: bool,
    ) -> Result<Participant, AppError> {
        let scope = self
            .scope(title, name, Access::Member, "answer the invitation")
            .await?;

        if scope.actor.status != InvitationStatus::Pending {
            return Err(AppError::InvitationAlreadyAnswered(scope.actor.name));
        }

        let status = if accept {
            InvitationStatus::Accepted
        } else {
            InvitationStatus::Declined
        };
        let participant = scope.actor.with_status(status);
        self.repo.update_participant(&participant).await?;

        info!(trip = %scope.trip.title, participant = %participant.name, %status, "Invitation answered");
        Ok(participant)
    }

    /// Change a participant's role. Ownership cannot be given away.
    pub async fn set_role(
        &self,
        title: &str,
        actor: &str,
        name: &str,
        role: Role,
    ) -> Result<Participant, AppError> {
        let scope = self
            .scope(title, actor, Access::Own, "manage participants")
            .await?;
        let target = find_participant(&scope.participants, name)?;

        if target.is_owner() {
            return Err(AppError::OwnerIsPermanent(target.name.clone()));
        }
        if role == Role::Owner {
            return Err(AppError::OwnerRoleReserved(target.name.clone()));
        }

        let participant = target.clone().with_role(role);
        self.repo.update_participant(&participant).await?;

        info!(trip = %scope.trip.title, participant = %participant.name, %role, "Role changed");
        Ok(participant)
    }

    /// Remove a participant from the trip. Their expenses and votes stay on
    /// record; balances ignore the dangling references.
    pub async fn remove_participant(
        &self,
        title: &str,
        actor: &str,
        name: &str,
    ) -> Result<Participant, AppError> {
        let scope = self
            .scope(title, actor, Access::Own, "manage participants")
            .await?;
        let target = find_participant(&scope.participants, name)?.clone();

        if target.is_owner() {
            return Err(AppError::OwnerIsPermanent(target.name));
        }

        self.repo.delete_participant(target.id).await?;

        info!(trip = %scope.trip.title, participant = %target.name, "Participant removed");
        Ok(target)
    }

    /// List participants in joining order.
    pub async fn list_participants(
        &self,
        title: &str,
        actor: &str,
    ) -> Result<Vec<Participant>, AppError> {
        let scope = self.scope(title, actor, Access::Read, "view the trip").await?;
        Ok(scope.participants)
    }

    // ========================
    // Route point operations
    // ========================

    /// Append a route point to the itinerary.
    pub async fn add_point(
        &self,
        title: &str,
        actor: &str,
        name: String,
        latitude: f64,
        longitude: f64,
        description: Option<String>,
    ) -> Result<RoutePoint, AppError> {
        let scope = self.scope(title, actor, Access::Edit, "edit points").await?;
        let points = self.repo.list_points(scope.trip.id).await?;

        let mut point =
            RoutePoint::new(scope.trip.id, name, latitude, longitude, next_order(&points)?)?;
        if let Some(desc) = description {
            point = point.with_description(desc);
        }
        self.repo.save_point(&point).await?;

        info!(trip = %scope.trip.title, point = %point.name, order = point.order, "Route point added");
        Ok(point)
    }

    /// Change a route point, given by id or name.
    pub async fn update_point(
        &self,
        title: &str,
        actor: &str,
        point_key: &str,
        update: PointUpdate,
    ) -> Result<RoutePoint, AppError> {
        let scope = self.scope(title, actor, Access::Edit, "edit points").await?;
        let points = self.repo.list_points(scope.trip.id).await?;
        let mut point = find_point(&points, point_key)?.clone();

        let latitude = update.latitude.unwrap_or(point.latitude);
        let longitude = update.longitude.unwrap_or(point.longitude);
        point.move_to(latitude, longitude)?;

        if let Some(name) = update.name {
            point.name = name;
        }
        if let Some(desc) = update.description {
            point.description = Some(desc);
        }
        if let Some(order) = update.order {
            point.reorder(order)?;
        }
        self.repo.update_point(&point).await?;

        debug!(trip = %scope.trip.title, point = %point.name, "Route point updated");
        Ok(point)
    }

    /// Remove a route point together with the votes cast for it.
    pub async fn remove_point(
        &self,
        title: &str,
        actor: &str,
        point_key: &str,
    ) -> Result<RoutePoint, AppError> {
        let scope = self.scope(title, actor, Access::Edit, "edit points").await?;
        let points = self.repo.list_points(scope.trip.id).await?;
        let point = find_point(&points, point_key)?.clone();

        self.repo.delete_point(point.id).await?;

        info!(trip = %scope.trip.title, point = %point.name, "Route point removed");
        Ok(point)
    }

    /// List route points in itinerary order.
    pub async fn list_points(&self, title: &str, actor: &str) -> Result<Vec<RoutePoint>, AppError> {
        let scope = self.scope(title, actor, Access::Read, "view the trip").await?;
        Ok(self.repo.list_points(scope.trip.id).await?)
    }

    // ========================
    // Expense operations
    // ========================

    /// Record an expense. Payer and split participants must be on the trip.
    pub async fn record_expense(
        &self,
        title: &str,
        actor: &str,
        input: NewExpense,
    ) -> Result<Expense, AppError> {
        let scope = self
            .scope(title, actor, Access::Edit, "edit expenses")
            .await?;
        let members = scope.members();

        let paid_by = find_participant(&members, &input.paid_by)?.id;
        let split = resolve_names(&members, &input.split_between)?;

        let mut expense = Expense::new(scope.trip.id, input.amount, paid_by)
            .with_category(input.category)
            .with_description(input.description)
            .with_split(split);
        if let Some(date) = input.date {
            expense = expense.with_date(date);
        }
        expense.validate(&members)?;

        self.repo.save_expense(&expense).await?;

        info!(
            trip = %scope.trip.title,
            expense_id = %expense.id,
            amount = %expense.amount,
            paid_by = %input.paid_by,
            "Expense recorded"
        );
        Ok(expense)
    }

    async fn load_expense(&self, trip: &Trip, id: ExpenseId) -> Result<Expense, AppError> {
        self.repo
            .get_expense(id)
            .await?
            .filter(|e| e.trip_id == trip.id)
            .ok_or_else(|| AppError::ExpenseNotFound(id.to_string()))
    }

    /// Change an expense. The result is validated against the current
    /// participants like a new expense.
    pub async fn update_expense(
        &self,
        title: &str,
        actor: &str,
        id: ExpenseId,
        update: ExpenseUpdate,
    ) -> Result<Expense, AppError> {
        let scope = self
            .scope(title, actor, Access::Edit, "edit expenses")
            .await?;
        let members = scope.members();
        let mut expense = self.load_expense(&scope.trip, id).await?;

        if let Some(amount) = update.amount {
            expense.amount = amount;
        }
        if let Some(paid_by) = update.paid_by {
            expense.paid_by = find_participant(&members, &paid_by)?.id;
        }
        if let Some(names) = update.split_between {
            expense = expense.with_split(resolve_names(&members, &names)?);
        }
        if let Some(category) = update.category {
            expense.category = category;
        }
        if let Some(description) = update.description {
            expense.description = description;
        }
        if let Some(date) = update.date {
            expense.date = Some(date);
        }
        expense.validate(&members)?;

        self.repo.update_expense(&expense).await?;

        info!(trip = %scope.trip.title, expense_id = %expense.id, "Expense updated");
        Ok(expense)
    }

    pub async fn delete_expense(
        &self,
        title: &str,
        actor: &str,
        id: ExpenseId,
    ) -> Result<Expense, AppError> {
        let scope = self
            .scope(title, actor, Access::Edit, "edit expenses")
            .await?;
        let expense = self.load_expense(&scope.trip, id).await?;
        self.repo.delete_expense(expense.id).await?;

        info!(trip = %scope.trip.title, expense_id = %expense.id, "Expense deleted");
        Ok(expense)
    }

    pub async fn get_expense(
        &self,
        title: &str,
        actor: &str,
        id: ExpenseId,
    ) -> Result<Expense, AppError> {
        let scope = self.scope(title, actor, Access::Read, "view the trip").await?;
        self.load_expense(&scope.trip, id).await
    }

    /// List expenses in recording order.
    pub async fn list_expenses(&self, title: &str, actor: &str) -> Result<Vec<Expense>, AppError> {
        let scope = self.scope(title, actor, Access::Read, "view the trip").await?;
        Ok(self.repo.list_expenses(scope.trip.id).await?)
    }

    /// Map participant ids to names, for display of expenses.
    pub async fn get_participant_names(
        &self,
        title: &str,
        actor: &str,
    ) -> Result<HashMap<ParticipantId, String>, AppError> {
        let scope = self.scope(title, actor, Access::Read, "view the trip").await?;
        Ok(scope
            .participants
            .into_iter()
            .map(|p| (p.id, p.name))
            .collect())
    }

    // ========================
    // Reports
    // ========================

    /// Who paid what, who owes what, and how to settle up.
    pub async fn balance_report(&self, title: &str, actor: &str) -> Result<BalanceReport, AppError> {
        let scope = self.scope(title, actor, Access::Read, "view the trip").await?;
        let members = scope.members();
        let expenses = self.repo.list_expenses(scope.trip.id).await?;

        let sheet = balance_sheet(&members, &expenses);
        let lines = members
            .iter()
            .map(|p| {
                let entry = sheet.entries.get(&p.id).copied().unwrap_or_default();
                BalanceLine {
                    participant_id: p.id,
                    name: p.name.clone(),
                    paid: entry.paid,
                    share: entry.share,
                    balance: entry.balance(),
                }
            })
            .collect();

        let settlements = suggest_settlements(&members, &sheet.balances())
            .into_iter()
            .map(|s| SettlementLine {
                from: name_of(&members, s.from),
                to: name_of(&members, s.to),
                amount: s.amount,
            })
            .collect();

        Ok(BalanceReport {
            trip_title: scope.trip.title,
            currency: scope.trip.currency,
            total_spent: total_spent(&expenses),
            unresolved: sheet.unresolved,
            skipped_expenses: sheet.skipped.len(),
            lines,
            settlements,
        })
    }

    /// Spending per category, largest first.
    pub async fn category_report(
        &self,
        title: &str,
        actor: &str,
    ) -> Result<CategoryReport, AppError> {
        let scope = self.scope(title, actor, Access::Read, "view the trip").await?;
        let expenses = self.repo.list_expenses(scope.trip.id).await?;
        let total = total_spent(&expenses);

        let mut categories: Vec<CategorySummary> = ExpenseCategory::ALL
            .iter()
            .filter_map(|category| {
                let matching: Vec<&Expense> =
                    expenses.iter().filter(|e| e.category == *category).collect();
                if matching.is_empty() {
                    return None;
                }
                let sum: Amount = matching.iter().map(|e| e.amount).sum();
                let percentage = if total.is_zero() {
                    0.0
                } else {
                    (sum * Decimal::ONE_HUNDRED / total).to_f64().unwrap_or(0.0)
                };
                Some(CategorySummary {
                    category: *category,
                    total: sum,
                    count: matching.len() as i64,
                    percentage,
                })
            })
            .collect();
        categories.sort_by(|a, b| b.total.cmp(&a.total));

        Ok(CategoryReport {
            trip_title: scope.trip.title,
            currency: scope.trip.currency,
            categories,
            total,
        })
    }

    // ========================
    // Voting operations
    // ========================

    /// Open voting on the trip's route points. Owner only.
    pub async fn start_voting(&self, title: &str, actor: &str) -> Result<VotingSession, AppError> {
        let scope = self
            .scope(title, actor, Access::Member, "start voting")
            .await?;
        let points = self.repo.list_points(scope.trip.id).await?;
        let mut session = self.voting_session(scope.trip.id).await?;

        session.start(&scope.actor, points.len(), Utc::now())?;
        self.repo.save_voting_session(&session).await?;

        info!(trip = %scope.trip.title, candidates = points.len(), "Voting started");
        Ok(session)
    }

    /// Rate a route point. Voting again on the same point replaces the vote.
    pub async fn cast_vote(
        &self,
        title: &str,
        actor: &str,
        point_key: &str,
        value: u8,
        comment: Option<String>,
    ) -> Result<Vote, AppError> {
        let scope = self.scope(title, actor, Access::Member, "vote").await?;
        let session = self.voting_session(scope.trip.id).await?;
        let points = self.repo.list_points(scope.trip.id).await?;
        let point = find_point(&points, point_key)?;

        let vote = session.cast(&scope.actor, point, value, comment)?;
        self.repo.upsert_vote(&vote).await?;

        info!(trip = %scope.trip.title, voter = %scope.actor.name, point = %point.name, value, "Vote cast");
        Ok(vote)
    }

    /// Ranked voting results with voter names resolved.
    pub async fn voting_report(&self, title: &str, actor: &str) -> Result<VotingReport, AppError> {
        let scope = self.scope(title, actor, Access::Read, "view the trip").await?;
        let session = self.voting_session(scope.trip.id).await?;
        let points = self.repo.list_points(scope.trip.id).await?;
        let votes = self.repo.list_votes(scope.trip.id).await?;

        let results = aggregate_votes(&points, &votes);
        debug!(trip = %scope.trip.title, points = points.len(), votes = votes.len(), "Aggregated votes");

        Ok(VotingReport {
            trip_title: scope.trip.title,
            state: session.state,
            started_at: session.started_at,
            results,
            voter_names: scope
                .participants
                .into_iter()
                .map(|p| (p.id, p.name))
                .collect(),
        })
    }

    // ========================
    // Export
    // ========================

    /// Everything stored for a trip.
    pub async fn trip_snapshot(&self, title: &str, actor: &str) -> Result<TripSnapshot, AppError> {
        let scope = self.scope(title, actor, Access::Read, "view the trip").await?;
        let trip_id = scope.trip.id;

        Ok(TripSnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            points: self.repo.list_points(trip_id).await?,
            expenses: self.repo.list_expenses(trip_id).await?,
            votes: self.repo.list_votes(trip_id).await?,
            voting_state: self.voting_session(trip_id).await?.state,
            exported_at: Utc::now(),
            participants: scope.participants,
            trip: scope.trip,
        })
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::domain::VotingError;
    use crate::storage::MemoryRepository;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 7, day).unwrap()
    }

    async fn service_with_trip() -> TripService<MemoryRepository> {
        let service = TripService::new(MemoryRepository::new());
        service
            .create_trip(
                "Coast".to_string(),
                date(1),
                date(10),
                "EUR".to_string(),
                None,
                "Ann".to_string(),
            )
            .await
            .unwrap();
        service
    }

    async fn join(service: &TripService<MemoryRepository>, name: &str, role: Role) {
        service
            .invite_participant("Coast", "Ann", name.to_string(), None, role)
            .await
            .unwrap();
        service
            .respond_to_invitation("Coast", name, true)
            .await
            .unwrap();
    }

    fn expense(amount: Amount, paid_by: &str, split: &[&str]) -> NewExpense {
        NewExpense {
            amount,
            paid_by: paid_by.to_string(),
            split_between: split.iter().map(|s| s.to_string()).collect(),
            category: ExpenseCategory::Food,
            description: String::new(),
            date: None,
        }
    }

    #[tokio::test]
    async fn test_create_trip_makes_accepted_owner() {
        let service = service_with_trip().await;
        let participants = service.list_participants("Coast", "Ann").await.unwrap();

        assert_eq!(participants.len(), 1);
        assert!(participants[0].is_owner());
        assert!(participants[0].is_accepted());
    }

    #[tokio::test]
    async fn test_duplicate_trip_title_rejected() {
        let service = service_with_trip().await;
        let result = service
            .create_trip(
                "Coast".to_string(),
                date(1),
                date(2),
                "EUR".to_string(),
                None,
                "Bob".to_string(),
            )
            .await;
        assert!(matches!(result, Err(AppError::TripAlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_trip_dates_must_be_ordered() {
        let service = TripService::new(MemoryRepository::new());
        let result = service
            .create_trip(
                "Backwards".to_string(),
                date(5),
                date(1),
                "EUR".to_string(),
                None,
                "Ann".to_string(),
            )
            .await;
        assert!(matches!(result, Err(AppError::InvalidTripDates { .. })));
    }

    #[tokio::test]
    async fn test_pending_participant_cannot_read() {
        let service = service_with_trip().await;
        service
            .invite_participant("Coast", "Ann", "Bob".to_string(), None, Role::Viewer)
            .await
            .unwrap();

        let result = service.balance_report("Coast", "Bob").await;
        assert!(matches!(result, Err(AppError::Forbidden { .. })));
    }

    #[tokio::test]
    async fn test_viewer_cannot_record_expense() {
        let service = service_with_trip().await;
        join(&service, "Bob", Role::Viewer).await;

        let result = service
            .record_expense("Coast", "Bob", expense(dec!(10), "Bob", &[]))
            .await;
        assert!(matches!(result, Err(AppError::Forbidden { .. })));
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let service = service_with_trip().await;
        service
            .invite_participant(
                "Coast",
                "Ann",
                "Bob".to_string(),
                Some("bob@example.com".to_string()),
                Role::Viewer,
            )
            .await
            .unwrap();

        let result = service
            .invite_participant(
                "Coast",
                "Ann",
                "Robert".to_string(),
                Some("BOB@example.com".to_string()),
                Role::Viewer,
            )
            .await;
        assert!(matches!(result, Err(AppError::ParticipantAlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_owner_cannot_be_removed() {
        let service = service_with_trip().await;
        let result = service.remove_participant("Coast", "Ann", "Ann").await;
        assert!(matches!(result, Err(AppError::OwnerIsPermanent(_))));
    }

    #[tokio::test]
    async fn test_balance_report_with_settlements() {
        let service = service_with_trip().await;
        join(&service, "Bob", Role::Editor).await;
        join(&service, "Cid", Role::Viewer).await;

        service
            .record_expense("Coast", "Bob", expense(dec!(300), "Ann", &[]))
            .await
            .unwrap();

        let report = service.balance_report("Coast", "Cid").await.unwrap();
        let balances: Vec<(&str, Amount)> = report
            .lines
            .iter()
            .map(|l| (l.name.as_str(), l.balance))
            .collect();
        assert_eq!(
            balances,
            vec![("Ann", dec!(200)), ("Bob", dec!(-100)), ("Cid", dec!(-100))]
        );
        assert_eq!(report.total_spent, dec!(300));
        assert_eq!(report.settlements.len(), 2);
        assert!(report.settlements.iter().all(|s| s.to == "Ann"));
    }

    #[tokio::test]
    async fn test_removed_participant_leaves_unresolved_share() {
        let service = service_with_trip().await;
        join(&service, "Bob", Role::Viewer).await;
        service
            .record_expense("Coast", "Ann", expense(dec!(40), "Ann", &["Ann", "Bob"]))
            .await
            .unwrap();

        service
            .remove_participant("Coast", "Ann", "Bob")
            .await
            .unwrap();

        let report = service.balance_report("Coast", "Ann").await.unwrap();
        assert_eq!(report.lines.len(), 1);
        assert_eq!(report.lines[0].balance, dec!(20));
        assert_eq!(report.unresolved, dec!(20));
    }

    #[tokio::test]
    async fn test_expense_with_unknown_payer_rejected() {
        let service = service_with_trip().await;
        let result = service
            .record_expense("Coast", "Ann", expense(dec!(10), "Zed", &[]))
            .await;
        assert!(matches!(result, Err(AppError::ParticipantNotFound(_))));
    }

    #[tokio::test]
    async fn test_category_report_percentages() {
        let service = service_with_trip().await;
        let mut taxi = expense(dec!(25), "Ann", &[]);
        taxi.category = ExpenseCategory::Transport;
        service.record_expense("Coast", "Ann", taxi).await.unwrap();
        service
            .record_expense("Coast", "Ann", expense(dec!(75), "Ann", &[]))
            .await
            .unwrap();

        let report = service.category_report("Coast", "Ann").await.unwrap();
        assert_eq!(report.total, dec!(100));
        assert_eq!(report.categories[0].category, ExpenseCategory::Food);
        assert_eq!(report.categories[0].percentage, 75.0);
        assert_eq!(report.categories[1].category, ExpenseCategory::Transport);
    }

    #[tokio::test]
    async fn test_start_voting_is_owner_only() {
        let service = service_with_trip().await;
        join(&service, "Bob", Role::Editor).await;
        for name in ["Harbour", "Lighthouse"] {
            service
                .add_point("Coast", "Bob", name.to_string(), 43.0, 5.0, None)
                .await
                .unwrap();
        }

        let result = service.start_voting("Coast", "Bob").await;
        assert!(matches!(
            result,
            Err(AppError::Voting(VotingError::NotOwner(_)))
        ));

        let session = service.start_voting("Coast", "Ann").await.unwrap();
        assert!(session.is_active());
    }

    #[tokio::test]
    async fn test_vote_again_overwrites() {
        let service = service_with_trip().await;
        for name in ["Harbour", "Lighthouse"] {
            service
                .add_point("Coast", "Ann", name.to_string(), 43.0, 5.0, None)
                .await
                .unwrap();
        }
        service.start_voting("Coast", "Ann").await.unwrap();

        service
            .cast_vote("Coast", "Ann", "Harbour", 2, Some("windy".to_string()))
            .await
            .unwrap();
        service
            .cast_vote("Coast", "Ann", "Harbour", 5, None)
            .await
            .unwrap();

        let report = service.voting_report("Coast", "Ann").await.unwrap();
        let harbour = &report.results[0];
        assert_eq!(harbour.name, "Harbour");
        assert_eq!(harbour.total_votes, 1);
        assert_eq!(harbour.votes[0].value, 5);
        assert_eq!(harbour.votes[0].comment.as_deref(), Some("windy"));
        assert_eq!(report.voter_name(&harbour.votes[0].voter), "Ann");
    }

    #[tokio::test]
    async fn test_points_append_in_order() {
        let service = service_with_trip().await;
        let first = service
            .add_point("Coast", "Ann", "Start".to_string(), 0.0, 0.0, None)
            .await
            .unwrap();
        let second = service
            .add_point("Coast", "Ann", "End".to_string(), 1.0, 1.0, None)
            .await
            .unwrap();

        assert_eq!(first.order, 0);
        assert_eq!(second.order, 1);

        let result = service
            .add_point("Coast", "Ann", "Nowhere".to_string(), 91.0, 0.0, None)
            .await;
        assert!(matches!(result, Err(AppError::InvalidPoint(_))));
    }
}
