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

//! Outbound events for the excluded notification/email collaborators.
//!
//! The core never sends anything itself: it pushes typed events onto a
//! lock-free queue and the hosting application drains them. [`SegQueue`]
//! keeps emission wait-free from inside workflows that hold account or
//! request locks.

use crate::base::{AccountId, RequestId};
use crossbeam::queue::SegQueue;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Customer: a provider purchased contact with their request.
    LeadContacted,
    /// Provider: a credit purchase was applied to their balance.
    CreditsApplied,
    /// Provider: auto-top-up was disabled after a failed off-session charge.
    AutoTopUpDisabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailTemplate {
    LeadContactedCustomer,
    ContactDetailsProvider,
    AutoTopUpDisabled,
}

/// Events the core emits for out-of-scope collaborators. One variant per
/// consumer contract, each carrying only the fields it needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CoreEvent {
    NotificationRequested {
        account_id: AccountId,
        kind: NotificationKind,
        request_id: Option<RequestId>,
    },
    EmailRequested {
        template: EmailTemplate,
        account_id: AccountId,
        request_id: Option<RequestId>,
    },
}

/// Wait-free multi-producer queue of outbound events.
#[derive(Debug, Default)]
pub struct EventQueue {
    queue: SegQueue<CoreEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self {
            queue: SegQueue::new(),
        }
    }

    pub fn emit(&self, event: CoreEvent) {
        self.queue.push(event);
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Removes and returns all queued events in emission order.
    pub fn drain(&self) -> Vec<CoreEvent> {
        let mut events = Vec::with_capacity(self.queue.len());
        while let Some(event) = self.queue.pop() {
            events.push(event);
        }
        events
    }
}
