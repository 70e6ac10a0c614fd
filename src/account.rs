// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 The leadmarket-rs authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Provider accounts: credit balance, auto-top-up configuration, stats
//! counters and the account's slice of the ledger history.
//!
//! All mutation goes through the [`Ledger`](crate::Ledger); the account's
//! interior mutex serializes balance changes, which makes per-account
//! operations linearizable without a global lock.
//!
//! # Invariants
//!
//! - `balance >= 0` at all times; a debit that would overdraw fails before
//!   any state changes.
//! - The sum of completed entries' amounts equals the stored balance.
//! - Entry amounts match their kind: `Spend < 0`, `Purchase`/`Bonus`/
//!   `Refund` > 0, `Adjustment` unconstrained.

use crate::base::{AccountId, EntryId, PaymentRef, RequestId};
use crate::error::CoreError;
use crate::payments::PaymentPurpose;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// What a balance-affecting event was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Purchase,
    Spend,
    Refund,
    Bonus,
    Adjustment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

/// One immutable record of a balance-affecting event.
///
/// Only `status`, `balance_after`, `completed_at` and `failure_reason` change
/// after creation, and only along the pending settlement path
/// (`Pending -> Completed | Failed | Cancelled`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub account_id: AccountId,
    pub kind: EntryKind,
    /// Signed credit amount; negative for spends.
    pub amount: i64,
    /// Payment-processor reference; unique across all entries when present.
    pub payment_ref: Option<PaymentRef>,
    pub lead_id: Option<RequestId>,
    /// Why the money moved, for pending purchases.
    pub purpose: Option<PaymentPurpose>,
    pub status: EntryStatus,
    /// Balance snapshot after this entry applied (creation-time balance for
    /// entries that never complete).
    pub balance_after: i64,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
}

/// Off-session top-up configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AutoTopUp {
    pub enabled: bool,
    /// Sweep triggers when `balance <= threshold`.
    pub threshold: i64,
    pub package: Option<CreditPackage>,
    /// Stored payment method reference at the processor.
    pub payment_method: Option<String>,
}

/// A purchasable credit bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditPackage {
    pub credits: u32,
    /// Price in minor currency units (e.g. pence).
    pub price_minor: i64,
}

/// Lifetime counters kept alongside the balance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountStats {
    pub leads_contacted: u64,
    pub credits_spent: u64,
    pub credits_purchased: u64,
}

#[derive(Debug)]
pub(crate) struct AccountData {
    pub(crate) id: AccountId,
    pub(crate) balance: i64,
    pub(crate) auto_top_up: AutoTopUp,
    pub(crate) stats: AccountStats,
    pub(crate) entries: Vec<LedgerEntry>,
}

impl AccountData {
    fn new(id: AccountId) -> Self {
        Self {
            id,
            balance: 0,
            auto_top_up: AutoTopUp::default(),
            stats: AccountStats::default(),
            entries: Vec::new(),
        }
    }

    fn assert_invariants(&self) {
        debug_assert!(
            self.balance >= 0,
            "Invariant violated: credit balance went negative: {}",
            self.balance
        );
    }

    pub(crate) fn entry(&self, id: EntryId) -> Option<&LedgerEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    fn entry_mut(&mut self, id: EntryId) -> Option<&mut LedgerEntry> {
        self.entries.iter_mut().find(|e| e.id == id)
    }

    /// Sum of completed entries, the reconciliation counterpart of `balance`.
    pub(crate) fn completed_sum(&self) -> i64 {
        self.entries
            .iter()
            .filter(|e| e.status == EntryStatus::Completed)
            .map(|e| e.amount)
            .sum()
    }

    pub(crate) fn debit(
        &mut self,
        entry_id: EntryId,
        amount: u32,
        lead_id: Option<RequestId>,
        now: DateTime<Utc>,
    ) -> Result<i64, CoreError> {
        if amount == 0 {
            return Err(CoreError::InvalidAmount);
        }
        let amount = amount as i64;
        if self.balance < amount {
            return Err(CoreError::InsufficientCredits);
        }
        self.balance -= amount;
        self.stats.credits_spent += amount as u64;
        self.entries.push(LedgerEntry {
            id: entry_id,
            account_id: self.id,
            kind: EntryKind::Spend,
            amount: -amount,
            payment_ref: None,
            lead_id,
            purpose: None,
            status: EntryStatus::Completed,
            balance_after: self.balance,
            created_at: now,
            completed_at: Some(now),
            failure_reason: None,
        });
        self.assert_invariants();
        Ok(self.balance)
    }

    pub(crate) fn credit(
        &mut self,
        entry_id: EntryId,
        amount: u32,
        kind: EntryKind,
        payment_ref: Option<PaymentRef>,
        now: DateTime<Utc>,
    ) -> Result<i64, CoreError> {
        if amount == 0 {
            return Err(CoreError::InvalidAmount);
        }
        self.balance += amount as i64;
        if kind == EntryKind::Purchase {
            self.stats.credits_purchased += amount as u64;
        }
        self.entries.push(LedgerEntry {
            id: entry_id,
            account_id: self.id,
            kind,
            amount: amount as i64,
            payment_ref,
            lead_id: None,
            purpose: None,
            status: EntryStatus::Completed,
            balance_after: self.balance,
            created_at: now,
            completed_at: Some(now),
            failure_reason: None,
        });
        self.assert_invariants();
        Ok(self.balance)
    }

    /// Zero-amount audit record for a free lead contact.
    pub(crate) fn record_free_contact(
        &mut self,
        entry_id: EntryId,
        lead_id: RequestId,
        now: DateTime<Utc>,
    ) {
        self.entries.push(LedgerEntry {
            id: entry_id,
            account_id: self.id,
            kind: EntryKind::Adjustment,
            amount: 0,
            payment_ref: None,
            lead_id: Some(lead_id),
            purpose: None,
            status: EntryStatus::Completed,
            balance_after: self.balance,
            created_at: now,
            completed_at: Some(now),
            failure_reason: None,
        });
    }

    /// Pending purchase awaiting the processor's verdict. No balance effect.
    pub(crate) fn open_pending_purchase(
        &mut self,
        entry_id: EntryId,
        credits: u32,
        payment_ref: PaymentRef,
        purpose: PaymentPurpose,
        now: DateTime<Utc>,
    ) {
        self.entries.push(LedgerEntry {
            id: entry_id,
            account_id: self.id,
            kind: EntryKind::Purchase,
            amount: credits as i64,
            payment_ref: Some(payment_ref),
            lead_id: None,
            purpose: Some(purpose),
            status: EntryStatus::Pending,
            balance_after: self.balance,
            created_at: now,
            completed_at: None,
            failure_reason: None,
        });
    }

    /// Settles a pending purchase as completed, applying its amount.
    ///
    /// Returns `(balance_after, replayed)`: a replay of an already-completed
    /// entry reports the original outcome and mutates nothing.
    pub(crate) fn settle_pending(
        &mut self,
        entry_id: EntryId,
        now: DateTime<Utc>,
    ) -> Result<(i64, bool), CoreError> {
        let balance = self.balance;
        let entry = self
            .entry_mut(entry_id)
            .ok_or(CoreError::PaymentRefNotFound)?;
        match entry.status {
            EntryStatus::Completed => Ok((entry.balance_after, true)),
            // A success event is authoritative: it settles pending entries
            // and revives ones an earlier (out-of-order) failure marked.
            EntryStatus::Pending | EntryStatus::Failed | EntryStatus::Cancelled => {
                entry.status = EntryStatus::Completed;
                entry.completed_at = Some(now);
                entry.failure_reason = None;
                let amount = entry.amount;
                let kind = entry.kind;
                entry.balance_after = balance + amount;
                self.balance += amount;
                if kind == EntryKind::Purchase {
                    self.stats.credits_purchased += amount as u64;
                }
                self.assert_invariants();
                Ok((self.balance, false))
            }
        }
    }

    /// Marks a pending purchase failed. A failure arriving after the success
    /// settled the entry is ignored (success wins).
    pub(crate) fn fail_pending(
        &mut self,
        entry_id: EntryId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, CoreError> {
        let entry = self
            .entry_mut(entry_id)
            .ok_or(CoreError::PaymentRefNotFound)?;
        match entry.status {
            EntryStatus::Completed => Ok(false),
            _ => {
                entry.status = EntryStatus::Failed;
                entry.completed_at = Some(now);
                entry.failure_reason = Some(reason.to_string());
                Ok(true)
            }
        }
    }

    /// Cancels a pending purchase whose charge never reached the processor.
    pub(crate) fn cancel_pending(&mut self, entry_id: EntryId) -> Result<(), CoreError> {
        let entry = self
            .entry_mut(entry_id)
            .ok_or(CoreError::PaymentRefNotFound)?;
        if entry.status == EntryStatus::Pending {
            entry.status = EntryStatus::Cancelled;
        }
        Ok(())
    }

    /// Whether any purchase entry with `purpose` is still pending.
    pub(crate) fn has_pending_purchase(&self, purpose: PaymentPurpose) -> bool {
        self.entries
            .iter()
            .any(|e| e.status == EntryStatus::Pending && e.purpose == Some(purpose))
    }
}

/// A provider account. Thin lock wrapper around [`AccountData`], mirroring
/// the request board's per-request mutex.
#[derive(Debug)]
pub struct Account {
    pub(crate) inner: Mutex<AccountData>,
}

impl Account {
    pub fn new(id: AccountId) -> Self {
        Self {
            inner: Mutex::new(AccountData::new(id)),
        }
    }

    pub fn id(&self) -> AccountId {
        self.inner.lock().id
    }

    pub fn balance(&self) -> i64 {
        self.inner.lock().balance
    }

    pub fn stats(&self) -> AccountStats {
        self.inner.lock().stats
    }

    pub fn auto_top_up(&self) -> AutoTopUp {
        self.inner.lock().auto_top_up.clone()
    }

    /// Snapshot of the account's ledger history.
    pub fn entries(&self) -> Vec<LedgerEntry> {
        self.inner.lock().entries.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> AccountData {
        AccountData::new(AccountId(1))
    }

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn credit_then_debit() {
        let mut data = data();
        data.credit(EntryId(1), 100, EntryKind::Purchase, None, now())
            .unwrap();
        let balance = data.debit(EntryId(2), 30, None, now()).unwrap();
        assert_eq!(balance, 70);
        assert_eq!(data.stats.credits_purchased, 100);
        assert_eq!(data.stats.credits_spent, 30);
    }

    #[test]
    fn debit_beyond_balance_is_rejected_without_mutation() {
        let mut data = data();
        data.credit(EntryId(1), 10, EntryKind::Purchase, None, now())
            .unwrap();
        let result = data.debit(EntryId(2), 11, None, now());
        assert_eq!(result, Err(CoreError::InsufficientCredits));
        assert_eq!(data.balance, 10);
        assert_eq!(data.entries.len(), 1);
    }

    #[test]
    fn zero_amounts_are_invalid() {
        let mut data = data();
        assert_eq!(
            data.debit(EntryId(1), 0, None, now()),
            Err(CoreError::InvalidAmount)
        );
        assert_eq!(
            data.credit(EntryId(1), 0, EntryKind::Bonus, None, now()),
            Err(CoreError::InvalidAmount)
        );
    }

    #[test]
    fn spend_entries_carry_negative_amounts() {
        let mut data = data();
        data.credit(EntryId(1), 50, EntryKind::Purchase, None, now())
            .unwrap();
        data.debit(EntryId(2), 20, Some(RequestId(7)), now()).unwrap();

        let spend = data.entry(EntryId(2)).unwrap();
        assert_eq!(spend.kind, EntryKind::Spend);
        assert_eq!(spend.amount, -20);
        assert_eq!(spend.balance_after, 30);
        assert_eq!(spend.lead_id, Some(RequestId(7)));
    }

    #[test]
    fn pending_purchase_has_no_balance_effect_until_settled() {
        let mut data = data();
        data.open_pending_purchase(
            EntryId(1),
            280,
            PaymentRef::from("pi_123"),
            PaymentPurpose::CreditPurchase,
            now(),
        );
        assert_eq!(data.balance, 0);
        assert_eq!(data.completed_sum(), 0);

        let (balance, replayed) = data.settle_pending(EntryId(1), now()).unwrap();
        assert_eq!(balance, 280);
        assert!(!replayed);
        assert_eq!(data.stats.credits_purchased, 280);
    }

    #[test]
    fn settling_twice_reports_replay() {
        let mut data = data();
        data.open_pending_purchase(
            EntryId(1),
            280,
            PaymentRef::from("pi_123"),
            PaymentPurpose::CreditPurchase,
            now(),
        );
        data.settle_pending(EntryId(1), now()).unwrap();
        let (balance, replayed) = data.settle_pending(EntryId(1), now()).unwrap();
        assert_eq!(balance, 280);
        assert!(replayed);
        assert_eq!(data.balance, 280);
        assert_eq!(data.stats.credits_purchased, 280);
    }

    #[test]
    fn failure_after_success_is_ignored() {
        let mut data = data();
        data.open_pending_purchase(
            EntryId(1),
            100,
            PaymentRef::from("pi_9"),
            PaymentPurpose::AutoTopUp,
            now(),
        );
        data.settle_pending(EntryId(1), now()).unwrap();
        let marked = data.fail_pending(EntryId(1), "card_declined", now()).unwrap();
        assert!(!marked);
        assert_eq!(data.balance, 100);
    }

    #[test]
    fn success_after_failure_still_credits() {
        let mut data = data();
        data.open_pending_purchase(
            EntryId(1),
            100,
            PaymentRef::from("pi_9"),
            PaymentPurpose::CreditPurchase,
            now(),
        );
        data.fail_pending(EntryId(1), "network blip", now()).unwrap();
        let (balance, replayed) = data.settle_pending(EntryId(1), now()).unwrap();
        assert_eq!(balance, 100);
        assert!(!replayed);
        let entry = data.entry(EntryId(1)).unwrap();
        assert_eq!(entry.status, EntryStatus::Completed);
        assert_eq!(entry.failure_reason, None);
    }

    #[test]
    fn cancel_only_touches_pending_entries() {
        let mut data = data();
        data.open_pending_purchase(
            EntryId(1),
            100,
            PaymentRef::from("pi_1"),
            PaymentPurpose::AutoTopUp,
            now(),
        );
        data.cancel_pending(EntryId(1)).unwrap();
        assert_eq!(data.entry(EntryId(1)).unwrap().status, EntryStatus::Cancelled);
        assert!(!data.has_pending_purchase(PaymentPurpose::AutoTopUp));

        // cancelling again is a no-op
        data.cancel_pending(EntryId(1)).unwrap();
        assert_eq!(data.entry(EntryId(1)).unwrap().status, EntryStatus::Cancelled);
    }

    #[test]
    fn pending_lookup_is_purpose_scoped() {
        let mut data = data();
        data.open_pending_purchase(
            EntryId(1),
            100,
            PaymentRef::from("pi_1"),
            PaymentPurpose::CreditPurchase,
            now(),
        );
        assert!(data.has_pending_purchase(PaymentPurpose::CreditPurchase));
        assert!(!data.has_pending_purchase(PaymentPurpose::AutoTopUp));
    }

    #[test]
    fn free_contact_record_keeps_balance_and_reconciles() {
        let mut data = data();
        data.credit(EntryId(1), 10, EntryKind::Purchase, None, now())
            .unwrap();
        data.record_free_contact(EntryId(2), RequestId(3), now());
        assert_eq!(data.balance, 10);
        assert_eq!(data.completed_sum(), data.balance);
        let entry = data.entry(EntryId(2)).unwrap();
        assert_eq!(entry.kind, EntryKind::Adjustment);
        assert_eq!(entry.amount, 0);
    }
}
