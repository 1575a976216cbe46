use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Amount, MAX_AMOUNT, Participant, ParticipantId, TripId};

pub type ExpenseId = Uuid;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ExpenseCategory {
    Transport,
    Accommodation,
    Food,
    Activities,
    #[default]
    Other,
}

impl ExpenseCategory {
    pub const ALL: [ExpenseCategory; 5] = [
        ExpenseCategory::Transport,
        ExpenseCategory::Accommodation,
        ExpenseCategory::Food,
        ExpenseCategory::Activities,
        ExpenseCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExpenseCategory::Transport => "transport",
            ExpenseCategory::Accommodation => "accommodation",
            ExpenseCategory::Food => "food",
            ExpenseCategory::Activities => "activities",
            ExpenseCategory::Other => "other",
        }
    }
}

impl FromStr for ExpenseCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "transport" => Ok(ExpenseCategory::Transport),
            "accommodation" => Ok(ExpenseCategory::Accommodation),
            "food" => Ok(ExpenseCategory::Food),
            "activities" => Ok(ExpenseCategory::Activities),
            "other" => Ok(ExpenseCategory::Other),
            other => Err(format!("unknown expense category '{}'", other)),
        }
    }
}

impl std::fmt::Display for ExpenseCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// A single shared cost, paid by one participant and split equally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expense {
    pub id: ExpenseId,
    pub trip_id: TripId,
    pub category: ExpenseCategory,
    pub description: String,
    /// Non-negative, two fractional digits
    pub amount: Amount,
    pub paid_by: ParticipantId,
    /// Participants sharing the cost. Empty means every current participant,
    /// resolved when balances are computed.
    pub split_between: Vec<ParticipantId>,
    /// When the cost was incurred, if known
    pub date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl Expense {
    pub fn new(trip_id: TripId, amount: Amount, paid_by: ParticipantId) -> Self {
        Self {
            id: Uuid::new_v4(),
            trip_id,
            category: ExpenseCategory::Other,
            description: String::new(),
            amount,
            paid_by,
            split_between: Vec::new(),
            date: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_category(mut self, category: ExpenseCategory) -> Self {
        self.category = category;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Duplicate ids are collapsed, first occurrence wins.
    pub fn with_split(mut self, split_between: Vec<ParticipantId>) -> Self {
        let mut unique = Vec::with_capacity(split_between.len());
        for id in split_between {
            if !unique.contains(&id) {
                unique.push(id);
            }
        }
        self.split_between = unique;
        self
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    pub fn is_split_between_everyone(&self) -> bool {
        self.split_between.is_empty()
    }

    /// The participant ids sharing this expense, given the current members.
    pub fn resolved_split(&self, participant_ids: &[ParticipantId]) -> Vec<ParticipantId> {
        if self.split_between.is_empty() {
            participant_ids.to_vec()
        } else {
            self.split_between.clone()
        }
    }

    /// Checks done when an expense is written: amount and references must be
    /// valid against the trip's current participants.
    pub fn validate(&self, participants: &[Participant]) -> Result<(), ExpenseError> {
        if self.amount.is_sign_negative() && !self.amount.is_zero() {
            return Err(ExpenseError::NegativeAmount(self.amount));
        }
        if self.amount > MAX_AMOUNT {
            return Err(ExpenseError::AmountTooLarge(self.amount));
        }

        let known = |id: &ParticipantId| participants.iter().any(|p| p.id == *id);

        if !known(&self.paid_by) {
            return Err(ExpenseError::UnknownPayer(self.paid_by));
        }
        if let Some(missing) = self.split_between.iter().find(|id| !known(id)) {
            return Err(ExpenseError::UnknownSplitParticipant(*missing));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpenseError {
    NegativeAmount(Amount),
    AmountTooLarge(Amount),
    UnknownPayer(ParticipantId),
    UnknownSplitParticipant(ParticipantId),
}

impl std::fmt::Display for ExpenseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExpenseError::NegativeAmount(amount) => {
                write!(f, "expense amount must not be negative (got {})", amount)
            }
            ExpenseError::AmountTooLarge(amount) => {
                write!(f, "expense amount {} exceeds the limit of {}", amount, MAX_AMOUNT)
            }
            ExpenseError::UnknownPayer(id) => {
                write!(f, "payer {} is not a participant of this trip", id)
            }
            ExpenseError::UnknownSplitParticipant(id) => {
                write!(f, "split participant {} is not a participant of this trip", id)
            }
        }
    }
}

impl std::error::Error for ExpenseError {}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn members(trip_id: TripId) -> Vec<Participant> {
        vec![
            Participant::owner(trip_id, "Anna"),
            Participant::new(trip_id, "Boris"),
        ]
    }

    #[test]
    fn test_category_roundtrip() {
        for category in ExpenseCategory::ALL {
            assert_eq!(category.as_str().parse::<ExpenseCategory>(), Ok(category));
        }
        assert!("fuel".parse::<ExpenseCategory>().is_err());
        assert_eq!(ExpenseCategory::default(), ExpenseCategory::Other);
    }

    #[test]
    fn test_create_expense() {
        let trip = Uuid::new_v4();
        let payer = Uuid::new_v4();
        let expense = Expense::new(trip, dec!(120.50), payer)
            .with_category(ExpenseCategory::Food)
            .with_description("Dinner");

        assert_eq!(expense.amount, dec!(120.50));
        assert_eq!(expense.paid_by, payer);
        assert_eq!(expense.category, ExpenseCategory::Food);
        assert!(expense.is_split_between_everyone());
    }

    #[test]
    fn test_with_split_removes_duplicates() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let expense = Expense::new(Uuid::new_v4(), dec!(10), a).with_split(vec![a, b, a]);
        assert_eq!(expense.split_between, vec![a, b]);
    }

    #[test]
    fn test_resolved_split_defaults_to_everyone() {
        let ids = vec![Uuid::new_v4(), Uuid::new_v4()];
        let expense = Expense::new(Uuid::new_v4(), dec!(10), ids[0]);
        assert_eq!(expense.resolved_split(&ids), ids);

        let only_first = expense.with_split(vec![ids[0]]);
        assert_eq!(only_first.resolved_split(&ids), vec![ids[0]]);
    }

    #[test]
    fn test_validate_accepts_known_references() {
        let trip = Uuid::new_v4();
        let people = members(trip);
        let expense = Expense::new(trip, dec!(30), people[0].id).with_split(vec![people[1].id]);
        assert_eq!(expense.validate(&people), Ok(()));
    }

    #[test]
    fn test_validate_rejects_negative_amount() {
        let trip = Uuid::new_v4();
        let people = members(trip);
        let expense = Expense::new(trip, dec!(-1), people[0].id);
        assert_eq!(
            expense.validate(&people),
            Err(ExpenseError::NegativeAmount(dec!(-1)))
        );
    }

    #[test]
    fn test_validate_rejects_oversized_amount() {
        let trip = Uuid::new_v4();
        let people = members(trip);
        let huge = dec!(50000000000000000000000000000);
        let expense = Expense::new(trip, huge, people[0].id);
        assert_eq!(
            expense.validate(&people),
            Err(ExpenseError::AmountTooLarge(huge))
        );

        let at_limit = Expense::new(trip, MAX_AMOUNT, people[0].id);
        assert!(at_limit.validate(&people).is_ok());
    }

    #[test]
    fn test_validate_rejects_unknown_references() {
        let trip = Uuid::new_v4();
        let people = members(trip);
        let stranger = Uuid::new_v4();

        let bad_payer = Expense::new(trip, dec!(5), stranger);
        assert_eq!(
            bad_payer.validate(&people),
            Err(ExpenseError::UnknownPayer(stranger))
        );

        let bad_split = Expense::new(trip, dec!(5), people[0].id).with_split(vec![stranger]);
        assert_eq!(
            bad_split.validate(&people),
            Err(ExpenseError::UnknownSplitParticipant(stranger))
        );
    }

    #[test]
    fn test_zero_amount_is_allowed() {
        let trip = Uuid::new_v4();
        let people = members(trip);
        let expense = Expense::new(trip, dec!(0), people[0].id);
        assert!(expense.validate(&people).is_ok());
    }
}
