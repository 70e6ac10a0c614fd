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

//! Service requests (leads) and the board that holds them.
//!
//! A request is created in [`RequestStatus::Published`] with a 30-day expiry.
//! It accepts provider contacts only while its status is in the active set
//! {Published, ReceivingQuotes, QuotesReceived} and `expires_at` has not
//! passed. Contact records are per (provider, request) pair and created at
//! most once.

use crate::base::{AccountId, RequestId};
use crate::geo::GeoPoint;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Days a request stays contactable after publication.
pub const REQUEST_TTL_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Published,
    ReceivingQuotes,
    QuotesReceived,
    ProviderSelected,
    Completed,
    Expired,
    Cancelled,
}

impl RequestStatus {
    /// Statuses in which a request still accepts new provider contacts.
    pub fn accepts_contacts(self) -> bool {
        matches!(
            self,
            Self::Published | Self::ReceivingQuotes | Self::QuotesReceived
        )
    }
}

/// Customer-declared timeline for the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Urgent,
    ThisWeek,
    ThisMonth,
    Flexible,
}

/// One purchased contact: at most one per (provider, request) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactRecord {
    pub provider_id: AccountId,
    /// Credits actually charged (0 for free leads).
    pub cost: u32,
    pub message: Option<String>,
    pub contacted_at: DateTime<Utc>,
}

/// A customer's service request as seen by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadRequest {
    pub id: RequestId,
    pub customer_id: AccountId,
    /// Category slug, e.g. `"plumbing"` or `"legal"`.
    pub category: String,
    pub city: Option<String>,
    pub location: Option<GeoPoint>,
    /// Total budget in whole currency units, when the customer gave one.
    pub budget: Option<i64>,
    pub urgency: Urgency,
    /// Promotional requests are free to contact.
    pub promotional: bool,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    contacts: HashMap<AccountId, ContactRecord>,
    pub quote_count: u32,
}

impl LeadRequest {
    /// Creates a freshly published request expiring [`REQUEST_TTL_DAYS`] from
    /// `created_at`.
    pub fn new(
        id: RequestId,
        customer_id: AccountId,
        category: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            customer_id,
            category: category.into(),
            city: None,
            location: None,
            budget: None,
            urgency: Urgency::Flexible,
            promotional: false,
            status: RequestStatus::Published,
            created_at,
            expires_at: created_at + Duration::days(REQUEST_TTL_DAYS),
            contacts: HashMap::new(),
            quote_count: 0,
        }
    }

    /// Whether the request still accepts contacts at `now`.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.status.accepts_contacts() && now < self.expires_at
    }

    pub fn has_contact_from(&self, provider_id: AccountId) -> bool {
        self.contacts.contains_key(&provider_id)
    }

    pub fn contact_from(&self, provider_id: AccountId) -> Option<&ContactRecord> {
        self.contacts.get(&provider_id)
    }

    pub fn contact_count(&self) -> usize {
        self.contacts.len()
    }

    /// Appends a contact record and bumps the quote counter.
    ///
    /// Callers must have verified `has_contact_from` first; inserting twice
    /// for the same provider is a logic error and panics in debug builds.
    pub(crate) fn record_contact(&mut self, record: ContactRecord) {
        let previous = self.contacts.insert(record.provider_id, record);
        debug_assert!(previous.is_none(), "duplicate contact record inserted");
        self.quote_count += 1;
    }
}

/// Concurrent store of open requests, one mutex per request.
///
/// Mirrors the account map in the [`Ledger`](crate::Ledger): `DashMap` for
/// lookup, a per-request `Mutex` to serialize contact commits.
#[derive(Debug, Default)]
pub struct RequestBoard {
    requests: DashMap<RequestId, Mutex<LeadRequest>>,
}

impl RequestBoard {
    pub fn new() -> Self {
        Self {
            requests: DashMap::new(),
        }
    }

    pub fn publish(&self, request: LeadRequest) {
        self.requests.insert(request.id, Mutex::new(request));
    }

    pub fn contains(&self, id: RequestId) -> bool {
        self.requests.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Runs `f` with shared access to the request.
    pub fn with_request<T>(
        &self,
        id: RequestId,
        f: impl FnOnce(&LeadRequest) -> T,
    ) -> Option<T> {
        self.requests.get(&id).map(|entry| f(&entry.lock()))
    }

    /// Runs `f` with exclusive access to the request.
    ///
    /// The request mutex is held for the duration of `f`; the contact
    /// workflow relies on this to make revalidate-debit-record atomic with
    /// respect to other commits on the same request.
    pub fn with_request_mut<T>(
        &self,
        id: RequestId,
        f: impl FnOnce(&mut LeadRequest) -> T,
    ) -> Option<T> {
        self.requests.get(&id).map(|entry| f(&mut entry.lock()))
    }

    /// Snapshot of all requests, for scoring/ranking passes.
    pub fn snapshot(&self) -> Vec<LeadRequest> {
        self.requests
            .iter()
            .map(|entry| entry.value().lock().clone())
            .collect()
    }
}
