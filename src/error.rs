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

//! Error types for the marketplace core.
//!
//! Everything except [`CoreError::LedgerInconsistency`] is a recoverable,
//! caller-visible condition. A duplicate payment reference is deliberately
//! absent from this enum: replayed payment events are reported as success
//! (see [`CreditOutcome::replayed`](crate::ledger::CreditOutcome)).

use thiserror::Error;

/// Errors raised by the ledger and the contact workflow.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Amount is zero or otherwise outside the valid range for its kind
    #[error("invalid amount (must be positive)")]
    InvalidAmount,

    /// Debit would push the credit balance below zero
    #[error("insufficient credits")]
    InsufficientCredits,

    /// Referenced account does not exist
    #[error("account not found")]
    AccountNotFound,

    /// Referenced request does not exist
    #[error("request not found")]
    RequestNotFound,

    /// Request has expired or left the active status set
    #[error("request expired or no longer accepting contacts")]
    RequestExpiredOrInactive,

    /// Provider has already purchased contact with this request
    #[error("provider already contacted this request")]
    DuplicateContact,

    /// No ledger entry carries the referenced payment reference
    #[error("payment reference not found")]
    PaymentRefNotFound,

    /// A pending purchase already claimed this payment reference
    #[error("payment reference already in use")]
    PaymentRefInUse,

    /// The account already has a pending purchase for this purpose
    #[error("a purchase for this purpose is already pending")]
    PurchaseAlreadyPending,

    /// Auto top-up is enabled but has no stored payment method or package
    #[error("auto top-up is not fully configured")]
    AutoTopUpNotConfigured,

    /// Stored balance disagrees with the sum of completed ledger entries.
    ///
    /// Should never occur under correct operation; callers surface it to an
    /// operator channel rather than correcting it silently.
    #[error("ledger inconsistency: completed entries sum to {expected}, stored balance is {actual}")]
    LedgerInconsistency { expected: i64, actual: i64 },
}
