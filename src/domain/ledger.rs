use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, warn};

use super::{Amount, Expense, ExpenseId, Participant, ParticipantId, is_settled};

/// What one participant put in and what they consumed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ParticipantBalance {
    /// Sum of the expenses this participant paid
    pub paid: Amount,
    /// Sum of this participant's equal shares of the expenses they are split into
    pub share: Amount,
}

impl ParticipantBalance {
    /// Positive: owed money. Negative: owes money.
    pub fn balance(&self) -> Amount {
        self.paid - self.share
    }
}

/// Result of running every expense through the balance engine.
#[derive(Debug, Clone, Default)]
pub struct BalanceSheet {
    pub entries: HashMap<ParticipantId, ParticipantBalance>,
    /// Shares attributed to split ids that are no longer participants.
    /// Credited to the payer but charged to nobody.
    pub unresolved: Amount,
    /// Expenses that contributed nothing (unknown payer or empty split)
    pub skipped: Vec<ExpenseId>,
}

impl BalanceSheet {
    pub fn balance_of(&self, participant: ParticipantId) -> Amount {
        self.entries
            .get(&participant)
            .map(ParticipantBalance::balance)
            .unwrap_or(Decimal::ZERO)
    }

    pub fn balances(&self) -> HashMap<ParticipantId, Amount> {
        self.entries
            .iter()
            .map(|(id, entry)| (*id, entry.balance()))
            .collect()
    }

    /// Sum of all balances. Equals `unresolved` up to division residue.
    pub fn total(&self) -> Amount {
        self.entries.values().map(ParticipantBalance::balance).sum()
    }

    /// True when balances net out once unresolved shares are accounted for.
    pub fn is_balanced(&self) -> bool {
        is_settled(self.total() - self.unresolved)
    }
}

/// An expense with its payer known and its split set fixed for this run.
struct Resolved<'a> {
    expense: &'a Expense,
    split: Vec<ParticipantId>,
}

impl Resolved<'_> {
    fn share(&self) -> Amount {
        self.expense.amount / Decimal::from(self.split.len())
    }
}

/// Payer must be a current participant and the split must not be empty,
/// otherwise the expense is left out entirely.
fn resolve<'a>(expense: &'a Expense, participant_ids: &[ParticipantId]) -> Option<Resolved<'a>> {
    if !participant_ids.contains(&expense.paid_by) {
        return None;
    }
    let split = expense.resolved_split(participant_ids);
    if split.is_empty() {
        return None;
    }
    Some(Resolved { expense, split })
}

fn ids_of(participants: &[Participant]) -> Vec<ParticipantId> {
    participants.iter().map(|p| p.id).collect()
}

/// Run every expense through the engine and keep the paid/share breakdown.
pub fn balance_sheet(participants: &[Participant], expenses: &[Expense]) -> BalanceSheet {
    let participant_ids = ids_of(participants);
    let mut sheet = BalanceSheet {
        entries: participant_ids
            .iter()
            .map(|id| (*id, ParticipantBalance::default()))
            .collect(),
        ..BalanceSheet::default()
    };

    for expense in expenses {
        let Some(resolved) = resolve(expense, &participant_ids) else {
            warn!(
                expense_id = %expense.id,
                paid_by = %expense.paid_by,
                "Expense skipped in balance computation: payer is not a participant or split is empty"
            );
            sheet.skipped.push(expense.id);
            continue;
        };

        let share = resolved.share();
        if let Some(payer) = sheet.entries.get_mut(&expense.paid_by) {
            payer.paid += expense.amount;
        }

        for member in &resolved.split {
            match sheet.entries.get_mut(member) {
                Some(entry) => entry.share += share,
                None => {
                    warn!(
                        expense_id = %expense.id,
                        participant_id = %member,
                        "Split participant no longer in trip; share left unassigned"
                    );
                    sheet.unresolved += share;
                }
            }
        }
    }

    debug!(
        participants = participants.len(),
        expenses = expenses.len(),
        skipped = sheet.skipped.len(),
        "Computed balance sheet"
    );
    sheet
}

/// Net balance per current participant: amount paid minus amount owed.
pub fn compute_balances(
    participants: &[Participant],
    expenses: &[Expense],
) -> HashMap<ParticipantId, Amount> {
    balance_sheet(participants, expenses).balances()
}

/// Sum of the expenses `participant` paid for.
pub fn paid_total(
    participant: ParticipantId,
    participants: &[Participant],
    expenses: &[Expense],
) -> Amount {
    let participant_ids = ids_of(participants);
    expenses
        .iter()
        .filter_map(|e| resolve(e, &participant_ids))
        .filter(|r| r.expense.paid_by == participant)
        .fold(Decimal::ZERO, |total, r| total + r.expense.amount)
}

/// Sum of `participant`'s equal shares across the expenses they are split into.
pub fn share_total(
    participant: ParticipantId,
    participants: &[Participant],
    expenses: &[Expense],
) -> Amount {
    let participant_ids = ids_of(participants);
    if !participant_ids.contains(&participant) {
        return Decimal::ZERO;
    }
    expenses
        .iter()
        .filter_map(|e| resolve(e, &participant_ids))
        .filter(|r| r.split.contains(&participant))
        .fold(Decimal::ZERO, |total, r| total + r.share())
}

/// Total cost of the trip: every recorded expense, resolved or not.
pub fn total_spent(expenses: &[Expense]) -> Amount {
    expenses.iter().map(|e| e.amount).sum()
}
