use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Amount, Participant, ParticipantId, round_to_minor};

/// A suggested payment that moves balances towards zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub from: ParticipantId,
    pub to: ParticipantId,
    pub amount: Amount,
}

/// Greedy min-transaction matching: the largest debtor pays the largest
/// creditor until one side runs out. Balances are rounded to the minor unit
/// first, so a few cents of rounding residue may stay unmatched.
///
/// Ties are broken by the order of `participants`.
pub fn suggest_settlements(
    participants: &[Participant],
    balances: &HashMap<ParticipantId, Amount>,
) -> Vec<Settlement> {
    let mut creditors: Vec<(ParticipantId, Amount)> = Vec::new();
    let mut debtors: Vec<(ParticipantId, Amount)> = Vec::new();

    for participant in participants {
        let Some(balance) = balances.get(&participant.id) else {
            continue;
        };
        let rounded = round_to_minor(*balance);
        if rounded > Decimal::ZERO {
            creditors.push((participant.id, rounded));
        } else if rounded < Decimal::ZERO {
            debtors.push((participant.id, -rounded));
        }
    }

    let mut settlements = Vec::new();

    while let (Some(ci), Some(di)) = (largest(&creditors), largest(&debtors)) {
        let amount = creditors[ci].1.min(debtors[di].1);
        settlements.push(Settlement {
            from: debtors[di].0,
            to: creditors[ci].0,
            amount,
        });

        creditors[ci].1 -= amount;
        debtors[di].1 -= amount;
        if creditors[ci].1.is_zero() {
            creditors.remove(ci);
        }
        if debtors[di].1.is_zero() {
            debtors.remove(di);
        }
    }

    settlements
}

/// Index of the largest amount; the earliest entry wins a tie.
fn largest(entries: &[(ParticipantId, Amount)]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, (_, amount)) in entries.iter().enumerate() {
        match best {
            Some(b) if entries[b].1 >= *amount => {}
            _ => best = Some(i),
        }
    }
    best
}
