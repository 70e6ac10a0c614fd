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

//! # Lead Marketplace Core
//!
//! Backend core for a services marketplace: customers publish service
//! requests, providers spend credits to unlock customer contact details.
//!
//! ## Core Components
//!
//! - [`Ledger`]: Credit ledger, the single source of truth for balances
//! - [`ContactWorkflow`]: Atomic price-check-debit-record contact purchase
//! - [`PaymentReconciler`]: Folds payment-processor events into the ledger
//! - [`AutoTopUpSweeper`]: Off-session charges for low-balance accounts
//! - [`Scheduler`]: Interval runner for background jobs
//! - [`match_score`](scoring::match_score) / [`lead_cost`](pricing::lead_cost):
//!   pure scoring and pricing functions
//!
//! ## Example
//!
//! ```
//! use leadmarket_rs::{AccountId, EntryKind, Ledger};
//!
//! let ledger = Ledger::new();
//! ledger.open_account(AccountId(1));
//!
//! // Provider buys credits, then spends some on a lead
//! ledger.credit(AccountId(1), 100, EntryKind::Purchase, None).unwrap();
//! let balance = ledger.debit(AccountId(1), 30, None).unwrap();
//! assert_eq!(balance, 70);
//! ```
//!
//! ## Thread Safety
//!
//! Accounts and requests each carry their own mutex inside concurrent maps,
//! so operations on different accounts and different requests proceed in
//! parallel while operations on one are linearizable.

pub mod account;
mod base;
pub mod contact;
pub mod error;
pub mod events;
pub mod geo;
mod ledger;
pub mod payments;
pub mod pricing;
pub mod request;
pub mod scheduler;
pub mod scoring;
pub mod topup;

pub use account::{
    Account, AccountStats, AutoTopUp, CreditPackage, EntryKind, EntryStatus, LedgerEntry,
};
pub use base::{AccountId, EntryId, PaymentRef, RequestId};
pub use contact::{ContactQuote, ContactReceipt, ContactWorkflow};
pub use error::CoreError;
pub use events::{CoreEvent, EventQueue};
pub use geo::GeoPoint;
pub use ledger::{CreditOutcome, FailureOutcome, Ledger, TopUpCandidate};
pub use payments::{
    ChargeRequest, GatewayError, PaymentEvent, PaymentGateway, PaymentPurpose, PaymentReconciler,
    ReconcileOutcome,
};
pub use pricing::PricingConfig;
pub use request::{LeadRequest, RequestBoard, RequestStatus, Urgency};
pub use scheduler::{AutoTopUpJob, Job, Scheduler};
pub use scoring::{ProviderProfile, ScoringWeights};
pub use topup::{AutoTopUpSweeper, SweepConfig, SweepReport};
