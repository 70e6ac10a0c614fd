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

//! Property-based tests for the ledger, pricing and scoring.
//!
//! These tests verify invariants that should hold for any sequence of
//! valid operations.

use chrono::Utc;
use leadmarket_rs::pricing::{self, PricingConfig};
use leadmarket_rs::scoring::{self, ScoringWeights};
use leadmarket_rs::{
    AccountId, EntryKind, GeoPoint, LeadRequest, Ledger, PaymentRef, ProviderProfile, RequestId,
    Urgency,
};
use proptest::prelude::*;

// =============================================================================
// Arbitrary Strategies
// =============================================================================

/// A single ledger operation: credit or debit of a bounded amount.
#[derive(Debug, Clone)]
enum Op {
    Credit(u32),
    Debit(u32),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1u32..500).prop_map(Op::Credit),
        (1u32..500).prop_map(Op::Debit),
    ]
}

fn arb_urgency() -> impl Strategy<Value = Urgency> {
    prop_oneof![
        Just(Urgency::Urgent),
        Just(Urgency::ThisWeek),
        Just(Urgency::ThisMonth),
        Just(Urgency::Flexible),
    ]
}

fn arb_category() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("plumbing".to_string()),
        Just("legal".to_string()),
        Just("financial".to_string()),
        Just("cleaning".to_string()),
        Just("medical".to_string()),
    ]
}

fn arb_city() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        Just(None),
        Just(Some("London".to_string())),
        Just(Some("Leeds".to_string())),
        Just(Some("Edinburgh".to_string())),
    ]
}

prop_compose! {
    fn arb_request()(
        budget in prop::option::of(0i64..20_000),
        urgency in arb_urgency(),
        category in arb_category(),
        city in arb_city(),
        promotional in any::<bool>(),
    ) -> LeadRequest {
        let mut request = LeadRequest::new(RequestId(1), AccountId(1), category, Utc::now());
        request.budget = budget;
        request.urgency = urgency;
        request.city = city;
        request.promotional = promotional;
        request
    }
}

prop_compose! {
    fn arb_profile()(
        nationwide in any::<bool>(),
        has_location in any::<bool>(),
        lon in -1.0f64..1.0,
        lat in 50.0f64..55.0,
        min_rate in prop::option::of(10i64..200),
        rating in 0.0f64..5.0,
        rating_count in 0u32..100,
        years in 0u32..30,
        verified in any::<bool>(),
        background in any::<bool>(),
        email in any::<bool>(),
        response in prop::option::of(1u32..3000),
    ) -> ProviderProfile {
        let mut profile = ProviderProfile::new(AccountId(2));
        profile.categories.insert("plumbing".to_string());
        profile.nationwide = nationwide;
        profile.location = if has_location { GeoPoint::new(lon, lat) } else { None };
        profile.min_hourly_rate = min_rate;
        profile.rating_avg = rating;
        profile.rating_count = rating_count;
        profile.years_experience = years;
        profile.verified = verified;
        profile.background_checked = background;
        profile.email_verified = email;
        profile.avg_response_minutes = response;
        profile
    }
}

// =============================================================================
// Ledger Invariant Tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// The balance never goes negative, whatever the operation order.
    #[test]
    fn balance_never_negative(ops in prop::collection::vec(arb_op(), 1..50)) {
        let account = AccountId(1);
        let ledger = Ledger::new();
        ledger.open_account(account);

        for op in ops {
            match op {
                Op::Credit(amount) => {
                    ledger.credit(account, amount, EntryKind::Purchase, None).unwrap();
                }
                Op::Debit(amount) => {
                    // may be rejected; rejection must not change the balance
                    let before = ledger.balance(account).unwrap();
                    if ledger.debit(account, amount, None).is_err() {
                        prop_assert_eq!(ledger.balance(account).unwrap(), before);
                    }
                }
            }
            prop_assert!(ledger.balance(account).unwrap() >= 0);
        }
    }

    /// The stored balance always reconciles against completed entries.
    #[test]
    fn balance_reconciles_after_any_history(ops in prop::collection::vec(arb_op(), 1..50)) {
        let account = AccountId(1);
        let ledger = Ledger::new();
        ledger.open_account(account);

        for op in ops {
            match op {
                Op::Credit(amount) => {
                    let _ = ledger.credit(account, amount, EntryKind::Purchase, None);
                }
                Op::Debit(amount) => {
                    let _ = ledger.debit(account, amount, None);
                }
            }
        }

        let balance = ledger.balance(account).unwrap();
        prop_assert_eq!(ledger.reconcile(account).unwrap(), balance);
    }

    /// Crediting the same payment reference any number of times applies once.
    #[test]
    fn referenced_credit_is_idempotent(
        amount in 1u32..1000,
        deliveries in 1usize..10,
    ) {
        let account = AccountId(1);
        let ledger = Ledger::new();
        ledger.open_account(account);
        let reference = PaymentRef::from("pi_prop");

        for _ in 0..deliveries {
            let outcome = ledger
                .credit(account, amount, EntryKind::Purchase, Some(reference.clone()))
                .unwrap();
            prop_assert_eq!(outcome.new_balance, amount as i64);
        }

        prop_assert_eq!(ledger.balance(account).unwrap(), amount as i64);
        prop_assert_eq!(ledger.stats(account).unwrap().credits_purchased, amount as u64);
    }
}

// =============================================================================
// Pricing Property Tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    /// Cost stays within [1, max_cost] for every input.
    #[test]
    fn lead_cost_is_bounded(
        request in arb_request(),
        leads_contacted in 0u64..1000,
    ) {
        let config = PricingConfig::default();
        let cost = pricing::lead_cost(&config, &request, leads_contacted);
        prop_assert!(cost >= 1);
        prop_assert!(cost <= config.max_cost);
    }

    /// The same inputs always price the same.
    #[test]
    fn lead_cost_is_deterministic(
        request in arb_request(),
        leads_contacted in 0u64..1000,
    ) {
        let config = PricingConfig::default();
        let first = pricing::lead_cost(&config, &request, leads_contacted);
        for _ in 0..5 {
            prop_assert_eq!(pricing::lead_cost(&config, &request, leads_contacted), first);
        }
    }

    /// A provider inside the discount window never pays more than an
    /// established provider for the same request.
    #[test]
    fn new_provider_never_pays_more(request in arb_request()) {
        let config = PricingConfig::default();
        let newcomer = pricing::lead_cost(&config, &request, 0);
        let veteran = pricing::lead_cost(&config, &request, 100);
        prop_assert!(newcomer <= veteran);
    }

    /// Promotional requests are always classified free.
    #[test]
    fn promotional_requests_are_free(
        mut request in arb_request(),
        leads_contacted in 0u64..1000,
    ) {
        let config = PricingConfig::default();
        request.promotional = true;
        let cost = pricing::lead_cost(&config, &request, leads_contacted);
        prop_assert!(pricing::is_free_lead(&config, &request, cost));
    }
}

// =============================================================================
// Scoring Property Tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    /// Scores always land in [0, 100].
    #[test]
    fn match_score_is_bounded(
        request in arb_request(),
        profile in arb_profile(),
    ) {
        let weights = ScoringWeights::default();
        let score = scoring::match_score(&weights, &request, &profile);
        prop_assert!(score <= 100);
    }

    /// Scoring is deterministic for the same pair.
    #[test]
    fn match_score_is_deterministic(
        request in arb_request(),
        profile in arb_profile(),
    ) {
        let weights = ScoringWeights::default();
        let first = scoring::match_score(&weights, &request, &profile);
        for _ in 0..5 {
            prop_assert_eq!(scoring::match_score(&weights, &request, &profile), first);
        }
    }
}
