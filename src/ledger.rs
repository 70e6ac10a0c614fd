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

//! The credit ledger: single source of truth for balances.
//!
//! All balance mutation goes through this component. Each account carries
//! its own mutex, so per-account operations are linearizable while accounts
//! stay independent of each other ([`DashMap`] gives concurrent access
//! across accounts).
//!
//! Payment-reference idempotency uses the dashmap entry API for an atomic
//! check-and-claim: the first caller to present a reference claims it and
//! the entry id it maps to; every later caller is routed to the claimed
//! entry and observes the original outcome instead of crediting again.
//!
//! # Lock order
//!
//! Paths that touch both maps take the payment-ref index before the account
//! mutex, never the reverse.

use crate::account::{Account, AccountStats, AutoTopUp, CreditPackage, EntryKind, LedgerEntry};
use crate::base::{AccountId, EntryId, PaymentRef, RequestId};
use crate::error::CoreError;
use crate::payments::PaymentPurpose;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::atomic::{AtomicU64, Ordering};

/// Result of a credit: the balance it produced and whether the call was an
/// idempotent replay of an earlier delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreditOutcome {
    pub new_balance: i64,
    pub replayed: bool,
}

/// Result of marking a purchase failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureOutcome {
    pub account_id: AccountId,
    /// False when a success had already settled the entry (success wins).
    pub marked: bool,
}

/// An account eligible for an off-session top-up charge.
#[derive(Debug, Clone, PartialEq)]
pub struct TopUpCandidate {
    pub account_id: AccountId,
    pub package: CreditPackage,
    pub payment_method: String,
}

/// Central ledger holding all provider accounts and their entry history.
#[derive(Debug)]
pub struct Ledger {
    /// Provider accounts indexed by account id.
    accounts: DashMap<AccountId, Account>,
    /// Claimed payment references, for exactly-once credit application.
    payment_refs: DashMap<PaymentRef, (AccountId, EntryId)>,
    /// Process-wide entry id allocator.
    next_entry_id: AtomicU64,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
            payment_refs: DashMap::new(),
            next_entry_id: AtomicU64::new(1),
        }
    }

    fn allocate_entry_id(&self) -> EntryId {
        EntryId(self.next_entry_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Creates the account if it does not exist yet. Returns whether a new
    /// account was created.
    pub fn open_account(&self, account_id: AccountId) -> bool {
        match self.accounts.entry(account_id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(Account::new(account_id));
                true
            }
        }
    }

    pub fn contains(&self, account_id: AccountId) -> bool {
        self.accounts.contains_key(&account_id)
    }

    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    pub fn balance(&self, account_id: AccountId) -> Result<i64, CoreError> {
        Ok(self.account(account_id)?.balance())
    }

    pub fn stats(&self, account_id: AccountId) -> Result<AccountStats, CoreError> {
        Ok(self.account(account_id)?.stats())
    }

    pub fn auto_top_up(&self, account_id: AccountId) -> Result<AutoTopUp, CoreError> {
        Ok(self.account(account_id)?.auto_top_up())
    }

    /// Stores the auto-top-up configuration. Enabling requires both a credit
    /// package and a stored payment method.
    pub fn set_auto_top_up(
        &self,
        account_id: AccountId,
        config: AutoTopUp,
    ) -> Result<(), CoreError> {
        if config.enabled && (config.package.is_none() || config.payment_method.is_none()) {
            return Err(CoreError::AutoTopUpNotConfigured);
        }
        let account = self.account(account_id)?;
        account.inner.lock().auto_top_up = config;
        Ok(())
    }

    /// Turns auto-top-up off; returns whether it was on.
    pub fn disable_auto_top_up(&self, account_id: AccountId) -> Result<bool, CoreError> {
        let account = self.account(account_id)?;
        let mut data = account.inner.lock();
        let was_enabled = data.auto_top_up.enabled;
        data.auto_top_up.enabled = false;
        Ok(was_enabled)
    }

    pub fn record_lead_contacted(&self, account_id: AccountId) -> Result<u64, CoreError> {
        let account = self.account(account_id)?;
        let mut data = account.inner.lock();
        data.stats.leads_contacted += 1;
        Ok(data.stats.leads_contacted)
    }

    /// Removes `amount` credits from the account, appending a completed
    /// `Spend` entry.
    ///
    /// Fails atomically with [`CoreError::InsufficientCredits`] when the
    /// balance cannot cover the amount; concurrent debits on one account are
    /// serialized by its mutex, so two debits can never jointly overdraw.
    pub fn debit(
        &self,
        account_id: AccountId,
        amount: u32,
        lead_id: Option<RequestId>,
    ) -> Result<i64, CoreError> {
        let account = self.account(account_id)?;
        let entry_id = self.allocate_entry_id();
        account.inner.lock().debit(entry_id, amount, lead_id, Utc::now())
    }

    /// Adds `amount` credits to the account.
    ///
    /// With a payment reference the call is idempotent: the first delivery
    /// claims the reference (settling a pending purchase if one holds it,
    /// appending a completed entry otherwise) and replays report the
    /// original resulting balance without crediting again.
    pub fn credit(
        &self,
        account_id: AccountId,
        amount: u32,
        kind: EntryKind,
        payment_ref: Option<PaymentRef>,
    ) -> Result<CreditOutcome, CoreError> {
        // Spends only enter through `debit`, which records them negative.
        if amount == 0 || kind == EntryKind::Spend {
            return Err(CoreError::InvalidAmount);
        }

        let Some(reference) = payment_ref else {
            let account = self.account(account_id)?;
            let entry_id = self.allocate_entry_id();
            let new_balance =
                account
                    .inner
                    .lock()
                    .credit(entry_id, amount, kind, None, Utc::now())?;
            return Ok(CreditOutcome {
                new_balance,
                replayed: false,
            });
        };

        if !self.accounts.contains_key(&account_id) {
            return Err(CoreError::AccountNotFound);
        }

        // The claim must not become visible before the entry it points at
        // exists, or a concurrent replay could race past it. The entry guard
        // is held across the account mutation; lock order stays
        // payment_refs -> account.
        let (claimed_account, entry_id) = match self.payment_refs.entry(reference.clone()) {
            Entry::Occupied(occupied) => *occupied.get(),
            Entry::Vacant(vacant) => {
                let entry_id = self.allocate_entry_id();
                let account = self
                    .accounts
                    .get(&account_id)
                    .ok_or(CoreError::AccountNotFound)?;
                let new_balance = account.inner.lock().credit(
                    entry_id,
                    amount,
                    kind,
                    Some(reference.clone()),
                    Utc::now(),
                )?;
                vacant.insert((account_id, entry_id));
                return Ok(CreditOutcome {
                    new_balance,
                    replayed: false,
                });
            }
        };

        let account = self.account(claimed_account)?;
        let (new_balance, replayed) = account.inner.lock().settle_pending(entry_id, Utc::now())?;
        Ok(CreditOutcome {
            new_balance,
            replayed,
        })
    }

    /// Opens a pending purchase entry, claiming the payment reference before
    /// the charge is sent to the processor. No balance effect until the
    /// success event settles it.
    ///
    /// An account holds at most one pending purchase per purpose: a second
    /// `begin_purchase` under a fresh reference while one is outstanding is
    /// rejected with [`CoreError::PurchaseAlreadyPending`].
    pub fn begin_purchase(
        &self,
        account_id: AccountId,
        credits: u32,
        reference: PaymentRef,
        purpose: PaymentPurpose,
    ) -> Result<EntryId, CoreError> {
        if credits == 0 {
            return Err(CoreError::InvalidAmount);
        }
        if !self.accounts.contains_key(&account_id) {
            return Err(CoreError::AccountNotFound);
        }

        // Same ordering as `credit`: the pending entry is created before the
        // claim becomes visible. The one-pending-per-purpose check runs
        // under the account mutex, so it cannot race a concurrent open.
        match self.payment_refs.entry(reference.clone()) {
            Entry::Occupied(_) => Err(CoreError::PaymentRefInUse),
            Entry::Vacant(vacant) => {
                let account = self
                    .accounts
                    .get(&account_id)
                    .ok_or(CoreError::AccountNotFound)?;
                let mut data = account.inner.lock();
                if data.has_pending_purchase(purpose) {
                    return Err(CoreError::PurchaseAlreadyPending);
                }
                let entry_id = self.allocate_entry_id();
                data.open_pending_purchase(entry_id, credits, reference, purpose, Utc::now());
                vacant.insert((account_id, entry_id));
                Ok(entry_id)
            }
        }
    }

    /// Marks the purchase holding `reference` as failed with the processor's
    /// reason. A failure delivered after the success settled the entry is
    /// reported but ignored.
    pub fn fail_purchase(
        &self,
        reference: &PaymentRef,
        reason: &str,
    ) -> Result<FailureOutcome, CoreError> {
        let (account_id, entry_id) = self.claimed_entry(reference)?;
        let account = self.account(account_id)?;
        let marked = account
            .inner
            .lock()
            .fail_pending(entry_id, reason, Utc::now())?;
        Ok(FailureOutcome { account_id, marked })
    }

    /// Cancels a pending purchase whose charge never reached the processor,
    /// freeing the account for future top-up attempts.
    pub fn cancel_purchase(&self, reference: &PaymentRef) -> Result<(), CoreError> {
        let (account_id, entry_id) = self.claimed_entry(reference)?;
        let account = self.account(account_id)?;
        account.inner.lock().cancel_pending(entry_id)
    }

    /// Zero-amount audit entry for a free lead contact.
    pub fn record_free_contact(
        &self,
        account_id: AccountId,
        lead_id: RequestId,
    ) -> Result<(), CoreError> {
        let account = self.account(account_id)?;
        let entry_id = self.allocate_entry_id();
        account
            .inner
            .lock()
            .record_free_contact(entry_id, lead_id, Utc::now());
        Ok(())
    }

    pub fn has_pending_purchase(
        &self,
        account_id: AccountId,
        purpose: PaymentPurpose,
    ) -> Result<bool, CoreError> {
        let account = self.account(account_id)?;
        let data = account.inner.lock();
        Ok(data.has_pending_purchase(purpose))
    }

    /// Accounts currently eligible for an off-session top-up charge:
    /// enabled, payment method and package on file, balance at or below the
    /// threshold, and no top-up already in flight.
    pub fn top_up_candidates(&self) -> Vec<TopUpCandidate> {
        let mut candidates = Vec::new();
        for entry in self.accounts.iter() {
            let data = entry.value().inner.lock();
            let config = &data.auto_top_up;
            if !config.enabled {
                continue;
            }
            let (Some(package), Some(method)) = (config.package, config.payment_method.as_ref())
            else {
                continue;
            };
            if data.balance > config.threshold {
                continue;
            }
            if data.has_pending_purchase(PaymentPurpose::AutoTopUp) {
                continue;
            }
            candidates.push(TopUpCandidate {
                account_id: data.id,
                package,
                payment_method: method.clone(),
            });
        }
        candidates.sort_by_key(|c| c.account_id);
        candidates
    }

    /// Recomputes the balance from completed entries and checks it against
    /// the stored balance.
    ///
    /// A mismatch is a [`CoreError::LedgerInconsistency`]: it should never
    /// occur and is surfaced, not corrected.
    pub fn reconcile(&self, account_id: AccountId) -> Result<i64, CoreError> {
        let account = self.account(account_id)?;
        let data = account.inner.lock();
        let expected = data.completed_sum();
        if expected != data.balance {
            return Err(CoreError::LedgerInconsistency {
                expected,
                actual: data.balance,
            });
        }
        Ok(data.balance)
    }

    /// Audits every account; returns the accounts that failed to reconcile.
    pub fn reconcile_all(&self) -> Vec<(AccountId, CoreError)> {
        let ids: Vec<AccountId> = self.accounts.iter().map(|e| *e.key()).collect();
        ids.into_iter()
            .filter_map(|id| self.reconcile(id).err().map(|err| (id, err)))
            .collect()
    }

    /// Snapshot of one account's entries, oldest first.
    pub fn entries(&self, account_id: AccountId) -> Result<Vec<LedgerEntry>, CoreError> {
        Ok(self.account(account_id)?.entries())
    }

    /// Looks up the entry claimed by a payment reference.
    pub fn entry_by_ref(&self, reference: &PaymentRef) -> Option<LedgerEntry> {
        let (account_id, entry_id) = self.claimed_entry(reference).ok()?;
        let account = self.accounts.get(&account_id)?;
        let data = account.inner.lock();
        data.entry(entry_id).cloned()
    }

    pub fn account_ids(&self) -> Vec<AccountId> {
        let mut ids: Vec<AccountId> = self.accounts.iter().map(|e| *e.key()).collect();
        ids.sort();
        ids
    }

    fn account(
        &self,
        account_id: AccountId,
    ) -> Result<dashmap::mapref::one::Ref<'_, AccountId, Account>, CoreError> {
        self.accounts
            .get(&account_id)
            .ok_or(CoreError::AccountNotFound)
    }

    fn claimed_entry(&self, reference: &PaymentRef) -> Result<(AccountId, EntryId), CoreError> {
        self.payment_refs
            .get(reference)
            .map(|claim| *claim.value())
            .ok_or(CoreError::PaymentRefNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::EntryStatus;

    const ACCOUNT: AccountId = AccountId(1);

    fn ledger_with_balance(balance: u32) -> Ledger {
        let ledger = Ledger::new();
        ledger.open_account(ACCOUNT);
        if balance > 0 {
            ledger
                .credit(ACCOUNT, balance, EntryKind::Purchase, None)
                .unwrap();
        }
        ledger
    }

    #[test]
    fn open_account_is_idempotent() {
        let ledger = Ledger::new();
        assert!(ledger.open_account(ACCOUNT));
        assert!(!ledger.open_account(ACCOUNT));
        assert_eq!(ledger.account_count(), 1);
    }

    #[test]
    fn unknown_account_is_an_error() {
        let ledger = Ledger::new();
        assert_eq!(ledger.balance(AccountId(404)), Err(CoreError::AccountNotFound));
        assert_eq!(
            ledger.debit(AccountId(404), 5, None),
            Err(CoreError::AccountNotFound)
        );
    }

    #[test]
    fn debit_appends_completed_spend_entry() {
        let ledger = ledger_with_balance(10);
        let balance = ledger.debit(ACCOUNT, 5, Some(RequestId(42))).unwrap();
        assert_eq!(balance, 5);

        let entries = ledger.entries(ACCOUNT).unwrap();
        let spend = entries.last().unwrap();
        assert_eq!(spend.kind, EntryKind::Spend);
        assert_eq!(spend.amount, -5);
        assert_eq!(spend.status, EntryStatus::Completed);
        assert_eq!(spend.balance_after, 5);
    }

    #[test]
    fn overdraw_rejected_balance_untouched() {
        let ledger = ledger_with_balance(3);
        assert_eq!(
            ledger.debit(ACCOUNT, 5, None),
            Err(CoreError::InsufficientCredits)
        );
        assert_eq!(ledger.balance(ACCOUNT).unwrap(), 3);
        assert_eq!(ledger.entries(ACCOUNT).unwrap().len(), 1);
    }

    #[test]
    fn credit_with_ref_is_idempotent() {
        let ledger = ledger_with_balance(0);
        let reference = PaymentRef::from("pi_123");

        let first = ledger
            .credit(ACCOUNT, 280, EntryKind::Purchase, Some(reference.clone()))
            .unwrap();
        assert_eq!(first.new_balance, 280);
        assert!(!first.replayed);

        let second = ledger
            .credit(ACCOUNT, 280, EntryKind::Purchase, Some(reference.clone()))
            .unwrap();
        assert_eq!(second.new_balance, 280);
        assert!(second.replayed);

        assert_eq!(ledger.balance(ACCOUNT).unwrap(), 280);
        let with_ref: Vec<_> = ledger
            .entries(ACCOUNT)
            .unwrap()
            .into_iter()
            .filter(|e| e.payment_ref.as_ref() == Some(&reference))
            .collect();
        assert_eq!(with_ref.len(), 1);
    }

    #[test]
    fn pending_purchase_settles_through_credit() {
        let ledger = ledger_with_balance(0);
        let reference = PaymentRef::from("pi_55");
        ledger
            .begin_purchase(ACCOUNT, 120, reference.clone(), PaymentPurpose::CreditPurchase)
            .unwrap();
        assert_eq!(ledger.balance(ACCOUNT).unwrap(), 0);

        let outcome = ledger
            .credit(ACCOUNT, 120, EntryKind::Purchase, Some(reference.clone()))
            .unwrap();
        assert_eq!(outcome.new_balance, 120);
        assert!(!outcome.replayed);

        let entry = ledger.entry_by_ref(&reference).unwrap();
        assert_eq!(entry.status, EntryStatus::Completed);
        assert!(entry.completed_at.is_some());
    }

    #[test]
    fn default_allocates_ids_from_one() {
        let ledger = Ledger::default();
        ledger.open_account(ACCOUNT);
        let entry_id = ledger
            .begin_purchase(
                ACCOUNT,
                100,
                PaymentRef::from("pi_first"),
                PaymentPurpose::CreditPurchase,
            )
            .unwrap();
        assert_eq!(entry_id, EntryId(1));
    }

    #[test]
    fn credit_rejects_the_spend_kind() {
        let ledger = ledger_with_balance(0);
        assert_eq!(
            ledger.credit(ACCOUNT, 5, EntryKind::Spend, None),
            Err(CoreError::InvalidAmount)
        );
        assert!(ledger.entries(ACCOUNT).unwrap().is_empty());
    }

    #[test]
    fn one_pending_purchase_per_purpose() {
        let ledger = ledger_with_balance(0);
        ledger
            .begin_purchase(
                ACCOUNT,
                280,
                PaymentRef::from("pi_a"),
                PaymentPurpose::AutoTopUp,
            )
            .unwrap();

        // a fresh reference does not get around the outstanding purchase
        assert_eq!(
            ledger.begin_purchase(
                ACCOUNT,
                280,
                PaymentRef::from("pi_b"),
                PaymentPurpose::AutoTopUp,
            ),
            Err(CoreError::PurchaseAlreadyPending)
        );
        assert!(ledger.entry_by_ref(&PaymentRef::from("pi_b")).is_none());

        // a different purpose is independent
        ledger
            .begin_purchase(
                ACCOUNT,
                100,
                PaymentRef::from("pi_c"),
                PaymentPurpose::CreditPurchase,
            )
            .unwrap();

        // settling the outstanding purchase frees the purpose again
        ledger.cancel_purchase(&PaymentRef::from("pi_a")).unwrap();
        ledger
            .begin_purchase(
                ACCOUNT,
                280,
                PaymentRef::from("pi_d"),
                PaymentPurpose::AutoTopUp,
            )
            .unwrap();
    }

    #[test]
    fn begin_purchase_rejects_claimed_ref() {
        let ledger = ledger_with_balance(0);
        let reference = PaymentRef::from("pi_dup");
        ledger
            .begin_purchase(ACCOUNT, 100, reference.clone(), PaymentPurpose::AutoTopUp)
            .unwrap();
        assert_eq!(
            ledger.begin_purchase(ACCOUNT, 100, reference, PaymentPurpose::AutoTopUp),
            Err(CoreError::PaymentRefInUse)
        );
    }

    #[test]
    fn failed_purchase_keeps_balance_and_reason() {
        let ledger = ledger_with_balance(0);
        let reference = PaymentRef::from("pi_bad");
        ledger
            .begin_purchase(ACCOUNT, 100, reference.clone(), PaymentPurpose::AutoTopUp)
            .unwrap();

        let outcome = ledger.fail_purchase(&reference, "card_declined").unwrap();
        assert!(outcome.marked);
        assert_eq!(outcome.account_id, ACCOUNT);
        assert_eq!(ledger.balance(ACCOUNT).unwrap(), 0);

        let entry = ledger.entry_by_ref(&reference).unwrap();
        assert_eq!(entry.status, EntryStatus::Failed);
        assert_eq!(entry.failure_reason.as_deref(), Some("card_declined"));
    }

    #[test]
    fn cancelled_purchase_frees_the_account_for_new_top_ups() {
        let ledger = ledger_with_balance(0);
        let reference = PaymentRef::from("pi_never_sent");
        ledger
            .begin_purchase(ACCOUNT, 100, reference.clone(), PaymentPurpose::AutoTopUp)
            .unwrap();
        assert!(ledger
            .has_pending_purchase(ACCOUNT, PaymentPurpose::AutoTopUp)
            .unwrap());

        ledger.cancel_purchase(&reference).unwrap();
        assert!(!ledger
            .has_pending_purchase(ACCOUNT, PaymentPurpose::AutoTopUp)
            .unwrap());
    }

    #[test]
    fn reconcile_matches_after_mixed_history() {
        let ledger = ledger_with_balance(50);
        ledger.debit(ACCOUNT, 20, None).unwrap();
        ledger
            .credit(ACCOUNT, 5, EntryKind::Bonus, None)
            .unwrap();
        ledger.record_free_contact(ACCOUNT, RequestId(9)).unwrap();
        // a pending entry must not count toward the reconciled sum
        ledger
            .begin_purchase(
                ACCOUNT,
                100,
                PaymentRef::from("pi_pending"),
                PaymentPurpose::AutoTopUp,
            )
            .unwrap();

        assert_eq!(ledger.reconcile(ACCOUNT).unwrap(), 35);
        assert!(ledger.reconcile_all().is_empty());
    }

    #[test]
    fn top_up_candidates_respect_threshold_and_pending() {
        let ledger = Ledger::new();
        let low = AccountId(1);
        let high = AccountId(2);
        let pending = AccountId(3);
        let disabled = AccountId(4);
        for id in [low, high, pending, disabled] {
            ledger.open_account(id);
        }

        let config = AutoTopUp {
            enabled: true,
            threshold: 10,
            package: Some(CreditPackage {
                credits: 280,
                price_minor: 2500,
            }),
            payment_method: Some("pm_1".to_string()),
        };
        ledger.set_auto_top_up(low, config.clone()).unwrap();
        ledger.set_auto_top_up(high, config.clone()).unwrap();
        ledger.set_auto_top_up(pending, config.clone()).unwrap();
        ledger
            .set_auto_top_up(
                disabled,
                AutoTopUp {
                    enabled: false,
                    ..config.clone()
                },
            )
            .unwrap();

        ledger
            .credit(high, 50, EntryKind::Purchase, None)
            .unwrap();
        ledger
            .begin_purchase(
                pending,
                280,
                PaymentRef::from("pi_inflight"),
                PaymentPurpose::AutoTopUp,
            )
            .unwrap();

        let candidates = ledger.top_up_candidates();
        let ids: Vec<AccountId> = candidates.iter().map(|c| c.account_id).collect();
        assert_eq!(ids, vec![low]);
    }

    #[test]
    fn disable_auto_top_up_reports_previous_state() {
        let ledger = ledger_with_balance(0);
        ledger
            .set_auto_top_up(
                ACCOUNT,
                AutoTopUp {
                    enabled: true,
                    threshold: 5,
                    package: Some(CreditPackage {
                        credits: 100,
                        price_minor: 1000,
                    }),
                    payment_method: Some("pm_1".to_string()),
                },
            )
            .unwrap();
        assert!(ledger.disable_auto_top_up(ACCOUNT).unwrap());
        assert!(!ledger.disable_auto_top_up(ACCOUNT).unwrap());
    }

    #[test]
    fn enabling_auto_top_up_requires_full_configuration() {
        let ledger = ledger_with_balance(0);
        assert_eq!(
            ledger.set_auto_top_up(
                ACCOUNT,
                AutoTopUp {
                    enabled: true,
                    threshold: 5,
                    package: None,
                    payment_method: Some("pm_1".to_string()),
                },
            ),
            Err(CoreError::AutoTopUpNotConfigured)
        );
        // a disabled config may be partial
        ledger
            .set_auto_top_up(
                ACCOUNT,
                AutoTopUp {
                    enabled: false,
                    threshold: 5,
                    package: None,
                    payment_method: None,
                },
            )
            .unwrap();
    }
}
