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

//! Payment-processor integration: the event shape delivered by webhooks,
//! the gateway trait the top-up sweeper charges through, and the
//! reconciler that folds processor events into the ledger.
//!
//! The processor may deliver any event more than once and in any order.
//! [`PaymentReconciler::apply`] absorbs both: replays are reported as
//! success without a second credit, and a success arriving after a failure
//! still credits (the processor's success is authoritative).

use crate::account::EntryKind;
use crate::base::{AccountId, PaymentRef};
use crate::error::CoreError;
use crate::events::{CoreEvent, EventQueue, NotificationKind};
use crate::ledger::Ledger;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Why a charge was raised. Stored on pending entries so in-flight top-ups
/// can be distinguished from checkout purchases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentPurpose {
    /// Provider bought a credit package at checkout.
    CreditPurchase,
    /// Off-session charge raised by the auto-top-up sweep.
    AutoTopUp,
}

/// A payment event as delivered by the processor's webhook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PaymentEvent {
    Succeeded {
        reference: PaymentRef,
        account_id: AccountId,
        credits: u32,
        amount_minor: i64,
        purpose: PaymentPurpose,
    },
    Failed {
        reference: PaymentRef,
        account_id: AccountId,
        reason: String,
        purpose: PaymentPurpose,
    },
}

impl PaymentEvent {
    pub fn reference(&self) -> &PaymentRef {
        match self {
            Self::Succeeded { reference, .. } | Self::Failed { reference, .. } => reference,
        }
    }

    pub fn account_id(&self) -> AccountId {
        match self {
            Self::Succeeded { account_id, .. } | Self::Failed { account_id, .. } => *account_id,
        }
    }
}

/// Errors surfaced by a payment gateway.
///
/// The split drives retry policy: transient failures are retried with
/// backoff, permanent ones are not.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Worth retrying (timeouts, rate limits, processor hiccups)
    #[error("transient gateway error: {0}")]
    Transient(String),

    /// Retrying cannot help (declined card, revoked payment method)
    #[error("permanent gateway error: {0}")]
    Permanent(String),
}

/// An off-session charge against a stored payment method.
#[derive(Debug, Clone, PartialEq)]
pub struct ChargeRequest {
    pub reference: PaymentRef,
    pub account_id: AccountId,
    pub amount_minor: i64,
    pub payment_method: String,
}

/// Boundary to the payment processor. The real implementation lives in the
/// hosting application; tests and demos substitute mocks.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Raises a charge. `Ok` means the processor accepted it; the final
    /// verdict still arrives as a [`PaymentEvent`].
    async fn charge(&self, request: &ChargeRequest) -> Result<(), GatewayError>;

    /// Authenticates a raw webhook payload and decodes it into an event.
    fn verify_webhook_signature(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<PaymentEvent, GatewayError>;
}

/// What applying a payment event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Credits applied for the first time.
    Credited { account_id: AccountId, new_balance: i64 },
    /// Duplicate success delivery; nothing changed.
    Replayed { account_id: AccountId, balance: i64 },
    /// Failure recorded against the pending purchase.
    FailureRecorded {
        account_id: AccountId,
        auto_top_up_disabled: bool,
    },
    /// Failure arrived after the success had settled the entry.
    FailureIgnored { account_id: AccountId },
}

/// Folds processor webhook events into the ledger.
pub struct PaymentReconciler {
    ledger: Arc<Ledger>,
    events: Arc<EventQueue>,
}

impl PaymentReconciler {
    pub fn new(ledger: Arc<Ledger>, events: Arc<EventQueue>) -> Self {
        Self { ledger, events }
    }

    /// Applies one payment event.
    ///
    /// Success: credits the account through the idempotent ledger path, so a
    /// replayed delivery reports the original balance without crediting
    /// again. Failure: marks the pending purchase failed; if the charge was
    /// an auto-top-up, the flag is switched off and a notification is
    /// queued so the provider can update their card.
    pub fn apply(&self, event: PaymentEvent) -> Result<ReconcileOutcome, CoreError> {
        match event {
            PaymentEvent::Succeeded {
                reference,
                account_id,
                credits,
                purpose,
                ..
            } => {
                let outcome = self.ledger.credit(
                    account_id,
                    credits,
                    EntryKind::Purchase,
                    Some(reference.clone()),
                )?;
                if outcome.replayed {
                    tracing::info!(
                        %account_id,
                        reference = reference.as_str(),
                        balance = outcome.new_balance,
                        "duplicate payment success ignored"
                    );
                    return Ok(ReconcileOutcome::Replayed {
                        account_id,
                        balance: outcome.new_balance,
                    });
                }
                tracing::info!(
                    %account_id,
                    reference = reference.as_str(),
                    credits,
                    ?purpose,
                    new_balance = outcome.new_balance,
                    "payment success credited"
                );
                // Checkout purchases get a receipt notification; top-up
                // successes are silent.
                if purpose == PaymentPurpose::CreditPurchase {
                    self.events.emit(CoreEvent::NotificationRequested {
                        account_id,
                        kind: NotificationKind::CreditsApplied,
                        request_id: None,
                    });
                }
                Ok(ReconcileOutcome::Credited {
                    account_id,
                    new_balance: outcome.new_balance,
                })
            }
            PaymentEvent::Failed {
                reference,
                account_id,
                reason,
                purpose,
            } => {
                let outcome = self.ledger.fail_purchase(&reference, &reason)?;
                if outcome.account_id != account_id {
                    tracing::warn!(
                        reference = reference.as_str(),
                        claimed = %outcome.account_id,
                        event = %account_id,
                        "payment event account does not match the claimed entry"
                    );
                }
                if !outcome.marked {
                    // Out-of-order delivery: the success already settled it.
                    tracing::info!(
                        account_id = %outcome.account_id,
                        reference = reference.as_str(),
                        "failure after success ignored"
                    );
                    return Ok(ReconcileOutcome::FailureIgnored {
                        account_id: outcome.account_id,
                    });
                }
                tracing::warn!(
                    account_id = %outcome.account_id,
                    reference = reference.as_str(),
                    reason,
                    ?purpose,
                    "payment failure recorded"
                );
                let mut disabled = false;
                if purpose == PaymentPurpose::AutoTopUp {
                    disabled = self.ledger.disable_auto_top_up(outcome.account_id)?;
                    if disabled {
                        self.events.emit(CoreEvent::NotificationRequested {
                            account_id: outcome.account_id,
                            kind: NotificationKind::AutoTopUpDisabled,
                            request_id: None,
                        });
                    }
                }
                Ok(ReconcileOutcome::FailureRecorded {
                    account_id: outcome.account_id,
                    auto_top_up_disabled: disabled,
                })
            }
        }
    }
}
