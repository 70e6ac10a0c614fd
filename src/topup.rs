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

//! Auto top-up sweep: charges stored payment methods for accounts that
//! dropped to or below their configured threshold.
//!
//! The sweep only raises charges; credits land later, when the processor's
//! success event reaches the [`PaymentReconciler`](crate::PaymentReconciler).
//! Overlapping sweeps cannot double-charge an account: an in-flight claim
//! inside the sweeper deduplicates within a process, the pending purchase
//! entry excludes the account from [`Ledger::top_up_candidates`], and the
//! ledger rejects a second pending top-up outright even when a stale
//! candidate slips past both.

use crate::base::{AccountId, PaymentRef};
use crate::error::CoreError;
use crate::events::{CoreEvent, EventQueue, NotificationKind};
use crate::ledger::{Ledger, TopUpCandidate};
use crate::payments::{ChargeRequest, GatewayError, PaymentGateway, PaymentPurpose};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::future::join_all;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Retry policy for gateway charges.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Attempts per charge, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles per attempt.
    pub retry_base_delay: Duration,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_base_delay: Duration::from_millis(200),
        }
    }
}

/// What one sweep run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Accounts the ledger reported eligible.
    pub eligible: usize,
    /// Charges the processor accepted.
    pub charged: usize,
    /// Charges rejected permanently or abandoned after retries.
    pub failed: usize,
    /// Accounts already claimed by a concurrent sweep.
    pub skipped: usize,
}

enum ChargeResult {
    Charged,
    Failed,
    Skipped,
}

pub struct AutoTopUpSweeper {
    ledger: Arc<Ledger>,
    gateway: Arc<dyn PaymentGateway>,
    events: Arc<EventQueue>,
    config: SweepConfig,
    /// Accounts with a charge in flight in this process.
    in_flight: DashMap<AccountId, ()>,
    charge_seq: AtomicU64,
}

impl AutoTopUpSweeper {
    pub fn new(
        ledger: Arc<Ledger>,
        gateway: Arc<dyn PaymentGateway>,
        events: Arc<EventQueue>,
        config: SweepConfig,
    ) -> Self {
        Self {
            ledger,
            gateway,
            events,
            config,
            in_flight: DashMap::new(),
            charge_seq: AtomicU64::new(1),
        }
    }

    /// Finds eligible accounts and charges each at most once. Individual
    /// failures never abort the sweep; every candidate is attempted and the
    /// report aggregates the outcomes.
    pub async fn run_sweep(&self) -> SweepReport {
        let candidates = self.ledger.top_up_candidates();
        let mut report = SweepReport {
            eligible: candidates.len(),
            ..SweepReport::default()
        };
        if candidates.is_empty() {
            return report;
        }

        tracing::info!(eligible = candidates.len(), "auto top-up sweep started");

        let results = join_all(
            candidates
                .into_iter()
                .map(|candidate| self.charge_candidate(candidate)),
        )
        .await;

        for result in results {
            match result {
                ChargeResult::Charged => report.charged += 1,
                ChargeResult::Failed => report.failed += 1,
                ChargeResult::Skipped => report.skipped += 1,
            }
        }

        tracing::info!(
            eligible = report.eligible,
            charged = report.charged,
            failed = report.failed,
            skipped = report.skipped,
            "auto top-up sweep finished"
        );
        report
    }

    async fn charge_candidate(&self, candidate: TopUpCandidate) -> ChargeResult {
        let account_id = candidate.account_id;

        // Claim the account for this sweep; a concurrent run backs off.
        match self.in_flight.entry(account_id) {
            Entry::Occupied(_) => return ChargeResult::Skipped,
            Entry::Vacant(slot) => {
                slot.insert(());
            }
        }
        let result = self.charge_claimed(&candidate).await;
        self.in_flight.remove(&account_id);
        result
    }

    async fn charge_claimed(&self, candidate: &TopUpCandidate) -> ChargeResult {
        let account_id = candidate.account_id;
        let reference = PaymentRef::new(format!(
            "topup_{}_{}",
            account_id,
            self.charge_seq.fetch_add(1, Ordering::Relaxed)
        ));

        match self.ledger.begin_purchase(
            account_id,
            candidate.package.credits,
            reference.clone(),
            PaymentPurpose::AutoTopUp,
        ) {
            Ok(_) => {}
            // Another path opened a purchase first; nothing to do.
            Err(CoreError::PaymentRefInUse | CoreError::PurchaseAlreadyPending) => {
                return ChargeResult::Skipped;
            }
            Err(err) => {
                tracing::warn!(%account_id, error = %err, "could not open top-up purchase");
                return ChargeResult::Failed;
            }
        }

        let request = ChargeRequest {
            reference: reference.clone(),
            account_id,
            amount_minor: candidate.package.price_minor,
            payment_method: candidate.payment_method.clone(),
        };

        let mut attempt = 0;
        loop {
            match self.gateway.charge(&request).await {
                Ok(()) => {
                    tracing::info!(
                        %account_id,
                        reference = reference.as_str(),
                        credits = candidate.package.credits,
                        "top-up charge accepted"
                    );
                    return ChargeResult::Charged;
                }
                Err(GatewayError::Permanent(reason)) => {
                    tracing::warn!(
                        %account_id,
                        reference = reference.as_str(),
                        reason,
                        "top-up charge permanently rejected"
                    );
                    return self.abandon(account_id, &reference, &reason);
                }
                Err(GatewayError::Transient(reason)) => {
                    attempt += 1;
                    if attempt >= self.config.max_attempts {
                        tracing::warn!(
                            %account_id,
                            reference = reference.as_str(),
                            attempts = attempt,
                            reason,
                            "top-up charge abandoned after retries"
                        );
                        // The charge never got through; release the account
                        // so the next sweep can try again.
                        if let Err(err) = self.ledger.cancel_purchase(&reference) {
                            tracing::error!(
                                %account_id,
                                reference = reference.as_str(),
                                error = %err,
                                "could not cancel abandoned top-up purchase"
                            );
                        }
                        return ChargeResult::Failed;
                    }
                    let delay = self.config.retry_base_delay * 2u32.pow(attempt - 1);
                    tracing::debug!(
                        %account_id,
                        reference = reference.as_str(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        reason,
                        "transient gateway error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Permanent rejection: record the failure, switch the flag off and tell
    /// the provider to update their payment method.
    fn abandon(
        &self,
        account_id: AccountId,
        reference: &PaymentRef,
        reason: &str,
    ) -> ChargeResult {
        if let Err(err) = self.ledger.fail_purchase(reference, reason) {
            tracing::error!(
                %account_id,
                reference = reference.as_str(),
                error = %err,
                "could not record top-up failure"
            );
            return ChargeResult::Failed;
        }
        match self.ledger.disable_auto_top_up(account_id) {
            Ok(true) => {
                self.events.emit(CoreEvent::NotificationRequested {
                    account_id,
                    kind: NotificationKind::AutoTopUpDisabled,
                    request_id: None,
                });
            }
            Ok(false) => {}
            Err(err) => {
                tracing::error!(%account_id, error = %err, "could not disable auto top-up");
            }
        }
        ChargeResult::Failed
    }
}
