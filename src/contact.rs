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

//! The lead contact workflow: a provider pays credits to unlock a
//! customer's contact details.
//!
//! [`ContactWorkflow::commit_contact`] holds the request mutex across
//! revalidation, pricing, the debit and the contact record, so two
//! providers racing for the same request serialize and each is priced and
//! charged exactly once. Failures leave no partial state: the debit is the
//! only balance effect and it happens after every check has passed.
//!
//! # Lock order
//!
//! Request mutex before account mutex, matching the rest of the crate.

use crate::base::{AccountId, RequestId};
use crate::error::CoreError;
use crate::events::{CoreEvent, EmailTemplate, EventQueue, NotificationKind};
use crate::ledger::Ledger;
use crate::pricing::{self, PricingConfig};
use crate::request::{ContactRecord, RequestBoard};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Price preview for a (provider, request) pair. Advisory only: the
/// authoritative price is computed again inside [`ContactWorkflow::commit_contact`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContactQuote {
    /// Credits that would be charged (0 for free leads).
    pub cost: u32,
    pub free: bool,
    pub balance: i64,
    pub affordable: bool,
}

/// A committed contact purchase.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactReceipt {
    pub request_id: RequestId,
    pub provider_id: AccountId,
    /// Credits actually charged (0 for free leads).
    pub cost: u32,
    pub free: bool,
    pub new_balance: i64,
    pub contacted_at: DateTime<Utc>,
}

pub struct ContactWorkflow {
    ledger: Arc<Ledger>,
    board: Arc<RequestBoard>,
    pricing: PricingConfig,
    events: Arc<EventQueue>,
}

impl ContactWorkflow {
    pub fn new(
        ledger: Arc<Ledger>,
        board: Arc<RequestBoard>,
        pricing: PricingConfig,
        events: Arc<EventQueue>,
    ) -> Self {
        Self {
            ledger,
            board,
            pricing,
            events,
        }
    }

    pub fn pricing(&self) -> &PricingConfig {
        &self.pricing
    }

    /// Prices the contact without committing anything.
    pub fn check_contact(
        &self,
        provider_id: AccountId,
        request_id: RequestId,
        now: DateTime<Utc>,
    ) -> Result<ContactQuote, CoreError> {
        let balance = self.ledger.balance(provider_id)?;
        let leads_contacted = self.ledger.stats(provider_id)?.leads_contacted;

        self.board
            .with_request(request_id, |request| {
                if !request.is_active(now) {
                    return Err(CoreError::RequestExpiredOrInactive);
                }
                if request.has_contact_from(provider_id) {
                    return Err(CoreError::DuplicateContact);
                }
                let cost = pricing::lead_cost(&self.pricing, request, leads_contacted);
                let free = pricing::is_free_lead(&self.pricing, request, cost);
                Ok(ContactQuote {
                    cost: if free { 0 } else { cost },
                    free,
                    balance,
                    affordable: free || balance >= cost as i64,
                })
            })
            .ok_or(CoreError::RequestNotFound)?
    }

    /// Purchases contact with the request, debiting the provider unless the
    /// lead is free.
    ///
    /// Revalidation, pricing, debit and the contact record all happen under
    /// the request mutex. Free leads skip the debit and leave a zero-amount
    /// audit entry instead.
    pub fn commit_contact(
        &self,
        provider_id: AccountId,
        request_id: RequestId,
        message: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<ContactReceipt, CoreError> {
        if !self.ledger.contains(provider_id) {
            return Err(CoreError::AccountNotFound);
        }

        let (receipt, customer_id) = self
            .board
            .with_request_mut(request_id, |request| {
                if !request.is_active(now) {
                    return Err(CoreError::RequestExpiredOrInactive);
                }
                if request.has_contact_from(provider_id) {
                    return Err(CoreError::DuplicateContact);
                }

                let leads_contacted = self.ledger.stats(provider_id)?.leads_contacted;
                let cost = pricing::lead_cost(&self.pricing, request, leads_contacted);
                let free = pricing::is_free_lead(&self.pricing, request, cost);

                let (charged, new_balance) = if free {
                    self.ledger.record_free_contact(provider_id, request_id)?;
                    (0, self.ledger.balance(provider_id)?)
                } else {
                    let balance = self.ledger.debit(provider_id, cost, Some(request_id))?;
                    (cost, balance)
                };

                request.record_contact(ContactRecord {
                    provider_id,
                    cost: charged,
                    message,
                    contacted_at: now,
                });

                Ok((
                    ContactReceipt {
                        request_id,
                        provider_id,
                        cost: charged,
                        free,
                        new_balance,
                        contacted_at: now,
                    },
                    request.customer_id,
                ))
            })
            .ok_or(CoreError::RequestNotFound)??;

        self.ledger.record_lead_contacted(provider_id)?;

        tracing::info!(
            %provider_id,
            %request_id,
            cost = receipt.cost,
            free = receipt.free,
            new_balance = receipt.new_balance,
            "lead contact committed"
        );

        self.events.emit(CoreEvent::NotificationRequested {
            account_id: customer_id,
            kind: NotificationKind::LeadContacted,
            request_id: Some(request_id),
        });
        self.events.emit(CoreEvent::EmailRequested {
            template: EmailTemplate::LeadContactedCustomer,
            account_id: customer_id,
            request_id: Some(request_id),
        });
        self.events.emit(CoreEvent::EmailRequested {
            template: EmailTemplate::ContactDetailsProvider,
            account_id: provider_id,
            request_id: Some(request_id),
        });

        Ok(receipt)
    }
}
