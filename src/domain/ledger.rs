use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{Cents, EntryId, StatementEntry, UserId};

/// A folded balance that does not fit in `Cents`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Balance of user {owner_id} is outside the representable range")]
pub struct BalanceOverflow {
    pub owner_id: UserId,
}

/// Compute the balance for a single owner from a list of entries.
/// Balance = credits (deposits, incoming transfers) - debits (withdrawals, outgoing transfers).
/// Entries owned by someone else are ignored.
///
/// The sum is taken in 128 bits, so only the final balance has to fit.
pub fn compute_balance(
    owner_id: UserId,
    entries: &[StatementEntry],
) -> Result<Cents, BalanceOverflow> {
    let total: i128 = entries
        .iter()
        .filter(|entry| entry.owner_id == owner_id)
        .map(|entry| i128::from(entry.signed_amount()))
        .sum();
    Cents::try_from(total).map_err(|_| BalanceOverflow { owner_id })
}

/// Compute balances for every owner that appears in `entries`.
pub fn compute_all_balances(
    entries: &[StatementEntry],
) -> Result<HashMap<UserId, Cents>, BalanceOverflow> {
    wide_balances(entries)
        .into_iter()
        .map(|(owner_id, total)| {
            Cents::try_from(total)
                .map(|balance| (owner_id, balance))
                .map_err(|_| BalanceOverflow { owner_id })
        })
        .collect()
}

fn wide_balances(entries: &[StatementEntry]) -> HashMap<UserId, i128> {
    let mut balances: HashMap<UserId, i128> = HashMap::new();
    for entry in entries {
        *balances.entry(entry.owner_id).or_insert(0) += i128::from(entry.signed_amount());
    }
    balances
}

/// Find transfer legs that have no opposite leg.
///
/// Legs are matched as a multiset: two identical transfers produce two debits
/// and two credits, and each debit consumes one credit. Whatever is left over
/// is reported in creation order.
pub fn find_unpaired_legs(entries: &[StatementEntry]) -> Vec<EntryId> {
    // (initiator, receiver, amount, description) -> (debits, credits)
    type LegKey<'a> = (UserId, UserId, Cents, &'a str);
    let mut legs: HashMap<LegKey<'_>, (Vec<EntryId>, Vec<EntryId>)> = HashMap::new();
    let mut unpaired = HashSet::new();

    for entry in entries.iter().filter(|e| e.kind.is_transfer_leg()) {
        let Some(counterparty) = entry.counterparty_id else {
            unpaired.insert(entry.id);
            continue;
        };
        let (key, is_debit) = if entry.kind.is_debit() {
            ((entry.owner_id, counterparty, entry.amount, entry.description.as_str()), true)
        } else {
            ((counterparty, entry.owner_id, entry.amount, entry.description.as_str()), false)
        };
        let slot = legs.entry(key).or_default();
        if is_debit {
            slot.0.push(entry.id);
        } else {
            slot.1.push(entry.id);
        }
    }

    for (debits, credits) in legs.into_values() {
        let matched = debits.len().min(credits.len());
        unpaired.extend(debits.into_iter().skip(matched));
        unpaired.extend(credits.into_iter().skip(matched));
    }

    entries
        .iter()
        .filter(|e| unpaired.contains(&e.id))
        .map(|e| e.id)
        .collect()
}

/// Result of verifying the whole ledger.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub entry_count: usize,
    pub owner_count: usize,
    /// Entries whose amount is zero or negative
    pub invalid_amounts: Vec<EntryId>,
    /// Transfer legs with no matching opposite leg
    pub unpaired_legs: Vec<EntryId>,
    /// Owners whose folded balance is below zero
    pub negative_balances: Vec<(UserId, Cents)>,
    /// Owners whose folded balance does not fit in `Cents`
    pub overflowed_balances: Vec<UserId>,
    /// Owners the user directory does not know about
    pub unknown_owners: Vec<UserId>,
}

impl IntegrityReport {
    pub fn is_healthy(&self) -> bool {
        self.invalid_amounts.is_empty()
            && self.unpaired_legs.is_empty()
            && self.negative_balances.is_empty()
            && self.overflowed_balances.is_empty()
            && self.unknown_owners.is_empty()
    }
}

/// Build an integrity report from all entries and the set of owners the
/// directory could resolve.
pub fn build_integrity_report(
    entries: &[StatementEntry],
    known_owners: &HashSet<UserId>,
) -> IntegrityReport {
    let balances = wide_balances(entries);

    let mut negative_balances = Vec::new();
    let mut overflowed_balances = Vec::new();
    for (owner, total) in &balances {
        match Cents::try_from(*total) {
            Ok(balance) if balance < 0 => negative_balances.push((*owner, balance)),
            Ok(_) => {}
            Err(_) => overflowed_balances.push(*owner),
        }
    }
    negative_balances.sort();
    overflowed_balances.sort();

    let mut unknown_owners: Vec<UserId> = balances
        .keys()
        .filter(|owner| !known_owners.contains(owner))
        .copied()
        .collect();
    unknown_owners.sort();

    IntegrityReport {
        entry_count: entries.len(),
        owner_count: balances.len(),
        invalid_amounts: entries
            .iter()
            .filter(|e| e.amount <= 0)
            .map(|e| e.id)
            .collect(),
        unpaired_legs: find_unpaired_legs(entries),
        negative_balances,
        overflowed_balances,
        unknown_owners,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;
    use crate::domain::{EntryKind, NewEntry};

    fn entry(owner: UserId, kind: EntryKind, amount: Cents) -> StatementEntry {
        NewEntry::new(owner, kind, amount, "test").stamp(Utc::now())
    }

    fn transfer(from: UserId, to: UserId, amount: Cents) -> Vec<StatementEntry> {
        let now = Utc::now();
        NewEntry::transfer_legs(from, to, amount, "transfer")
            .into_iter()
            .map(|leg| leg.stamp(now))
            .collect()
    }

    #[test]
    fn test_compute_balance_empty() {
        assert_eq!(compute_balance(Uuid::new_v4(), &[]), Ok(0));
    }

    #[test]
    fn test_compute_balance_deposits_and_withdrawals() {
        let alice = Uuid::new_v4();
        let entries = vec![
            entry(alice, EntryKind::Deposit, 50000),
            entry(alice, EntryKind::Withdraw, 5000),
            entry(alice, EntryKind::Deposit, 1000),
            entry(alice, EntryKind::Withdraw, 2500),
        ];

        assert_eq!(compute_balance(alice, &entries), Ok(50000 + 1000 - 5000 - 2500));
    }

    #[test]
    fn test_compute_balance_ignores_other_owners() {
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let mut entries = vec![entry(alice, EntryKind::Deposit, 50000)];
        entries.extend(transfer(alice, bob, 20000));

        assert_eq!(compute_balance(alice, &entries), Ok(30000));
        assert_eq!(compute_balance(bob, &entries), Ok(20000));
    }

    #[test]
    fn test_compute_balance_overflow_is_an_error() {
        let alice = Uuid::new_v4();
        let entries = vec![
            entry(alice, EntryKind::Deposit, Cents::MAX),
            entry(alice, EntryKind::Deposit, 1),
        ];

        assert_eq!(
            compute_balance(alice, &entries),
            Err(BalanceOverflow { owner_id: alice })
        );
        assert!(compute_all_balances(&entries).is_err());
    }

    #[test]
    fn test_compute_balance_tolerates_intermediate_overflow() {
        let alice = Uuid::new_v4();
        let entries = vec![
            entry(alice, EntryKind::Deposit, Cents::MAX),
            entry(alice, EntryKind::Deposit, 10),
            entry(alice, EntryKind::Withdraw, 20),
        ];

        assert_eq!(compute_balance(alice, &entries), Ok(Cents::MAX - 10));
    }

    #[test]
    fn test_transfers_preserve_total() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();

        let mut entries = vec![entry(a, EntryKind::Deposit, 1000)];
        entries.extend(transfer(a, b, 600));
        entries.extend(transfer(b, c, 250));
        entries.extend(transfer(c, a, 100));

        let balances = compute_all_balances(&entries).unwrap();
        let total: Cents = balances.values().sum();

        assert_eq!(total, 1000, "Transfers must not create or destroy money");
        assert_eq!(balances.get(&a), Some(&500));
        assert_eq!(balances.get(&b), Some(&350));
        assert_eq!(balances.get(&c), Some(&150));
    }

    #[test]
    fn test_find_unpaired_legs_all_paired() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut entries = transfer(a, b, 100);
        // A second identical transfer must pair independently.
        entries.extend(transfer(a, b, 100));

        assert!(find_unpaired_legs(&entries).is_empty());
    }

    #[test]
    fn test_find_unpaired_legs_detects_orphan() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut entries = transfer(a, b, 100);
        let orphan = NewEntry::new(a, EntryKind::TransferDebit, 100, "transfer")
            .with_counterparty(b)
            .stamp(Utc::now());
        entries.push(orphan.clone());

        assert_eq!(find_unpaired_legs(&entries), vec![orphan.id]);
    }

    #[test]
    fn test_find_unpaired_legs_without_counterparty() {
        let a = Uuid::new_v4();
        let leg = entry(a, EntryKind::TransferCredit, 100);

        assert_eq!(find_unpaired_legs(&[leg.clone()]), vec![leg.id]);
    }

    #[test]
    fn test_integrity_report() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let stranger = Uuid::new_v4();

        let mut entries = vec![entry(a, EntryKind::Deposit, 500)];
        entries.extend(transfer(a, b, 200));
        let healthy = build_integrity_report(&entries, &HashSet::from([a, b]));
        assert!(healthy.is_healthy());
        assert_eq!(healthy.entry_count, 3);
        assert_eq!(healthy.owner_count, 2);

        entries.push(entry(stranger, EntryKind::Withdraw, 50));
        let report = build_integrity_report(&entries, &HashSet::from([a, b]));
        assert!(!report.is_healthy());
        assert_eq!(report.negative_balances, vec![(stranger, -50)]);
        assert_eq!(report.unknown_owners, vec![stranger]);
    }

    #[test]
    fn test_integrity_report_flags_overflowed_balance() {
        let a = Uuid::new_v4();
        let entries = vec![
            entry(a, EntryKind::Deposit, Cents::MAX),
            entry(a, EntryKind::Deposit, Cents::MAX),
        ];

        let report = build_integrity_report(&entries, &HashSet::from([a]));
        assert!(!report.is_healthy());
        assert_eq!(report.overflowed_balances, vec![a]);
        assert!(report.negative_balances.is_empty());
    }
}
