use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::{ExpenseError, ParseAmountError, PointError, VotingError};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Trip not found: {0}")]
    TripNotFound(String),

    #[error("Trip already exists: {0}")]
    TripAlreadyExists(String),

    #[error("Trip ends before it starts: {start_date} > {end_date}")]
    InvalidTripDates {
        start_date: NaiveDate,
        end_date: NaiveDate,
    },

    #[error("Participant not found: {0}")]
    ParticipantNotFound(String),

    #[error("Participant already exists: {0}")]
    ParticipantAlreadyExists(String),

    #[error("Participant '{actor}' is not allowed to {action}")]
    Forbidden { actor: String, action: &'static str },

    #[error("The trip owner cannot be removed or demoted: {0}")]
    OwnerIsPermanent(String),

    #[error("A trip has exactly one owner; '{0}' cannot become owner")]
    OwnerRoleReserved(String),

    #[error("Invitation for '{0}' has already been answered")]
    InvitationAlreadyAnswered(String),

    #[error("Route point not found: {0}")]
    PointNotFound(String),

    #[error("Invalid route point: {0}")]
    InvalidPoint(#[from] PointError),

    #[error("Expense not found: {0}")]
    ExpenseNotFound(String),

    #[error("Invalid expense: {0}")]
    InvalidExpense(#[from] ExpenseError),

    #[error("Invalid amount: {0}")]
    InvalidAmount(#[from] ParseAmountError),

    #[error("Voting: {0}")]
    Voting(#[from] VotingError),

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}
