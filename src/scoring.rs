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

//! Request/provider match scoring.
//!
//! [`match_score`] is a pure weighted sum over capped components, clamped to
//! [0, 100]. Missing or malformed inputs zero out the affected component
//! rather than excluding the candidate. Ranking functions break score ties
//! by ascending id so sort output is reproducible.

use crate::base::{AccountId, RequestId};
use crate::geo::{self, GeoPoint};
use crate::request::LeadRequest;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A provider as the scorer sees them: plain data, no behavior attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderProfile {
    pub id: AccountId,
    /// Category slugs the provider serves.
    pub categories: HashSet<String>,
    pub location: Option<GeoPoint>,
    /// Provider covers the whole country; proximity gets a flat partial
    /// bonus instead of the distance tiers.
    pub nationwide: bool,
    /// Minimum hourly rate in whole currency units.
    pub min_hourly_rate: Option<i64>,
    pub rating_avg: f64,
    pub rating_count: u32,
    pub years_experience: u32,
    pub verified: bool,
    pub background_checked: bool,
    pub email_verified: bool,
    /// Average time to first response, when known.
    pub avg_response_minutes: Option<u32>,
}

impl ProviderProfile {
    pub fn new(id: AccountId) -> Self {
        Self {
            id,
            categories: HashSet::new(),
            location: None,
            nationwide: false,
            min_hourly_rate: None,
            rating_avg: 0.0,
            rating_count: 0,
            years_experience: 0,
            verified: false,
            background_checked: false,
            email_verified: false,
            avg_response_minutes: None,
        }
    }
}

/// Component weights and tier boundaries for [`match_score`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringWeights {
    /// Bonus when the provider serves the request's category. Largest single
    /// component.
    pub category: u32,
    /// Distance band upper bounds (km) paired with bonuses, closest first.
    pub proximity_tiers: Vec<(f64, u32)>,
    /// Flat proximity bonus for nationwide providers.
    pub nationwide_bonus: u32,
    pub budget_compat: u32,
    /// Hours assumed per job when deriving an hourly budget from the total.
    pub assumed_job_hours: i64,
    /// (min rating avg, bonus), best first; gated on `min_rating_count`.
    pub quality_tiers: Vec<(f64, u32)>,
    pub min_rating_count: u32,
    /// (min years, bonus), most experienced first.
    pub experience_tiers: Vec<(u32, u32)>,
    pub verified_bonus: u32,
    pub background_checked_bonus: u32,
    pub email_verified_bonus: u32,
    /// (max avg response minutes, bonus), fastest first.
    pub responsiveness_tiers: Vec<(u32, u32)>,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            category: 30,
            proximity_tiers: vec![(10.0, 25), (25.0, 20), (50.0, 12), (100.0, 6)],
            nationwide_bonus: 12,
            budget_compat: 10,
            assumed_job_hours: 10,
            quality_tiers: vec![(4.8, 10), (4.5, 8), (4.0, 5), (3.5, 3)],
            min_rating_count: 3,
            experience_tiers: vec![(10, 8), (5, 6), (2, 3)],
            verified_bonus: 3,
            background_checked_bonus: 2,
            email_verified_bonus: 1,
            responsiveness_tiers: vec![(60, 6), (360, 4), (1440, 2)],
        }
    }
}

/// Relevance of `request` to `provider`, in [0, 100].
pub fn match_score(
    weights: &ScoringWeights,
    request: &LeadRequest,
    provider: &ProviderProfile,
) -> u32 {
    let mut score = 0u32;

    if provider.categories.contains(&request.category) {
        score += weights.category;
    }

    score += proximity_bonus(weights, request.location, provider);
    score += budget_bonus(weights, request.budget, provider.min_hourly_rate);
    score += quality_bonus(weights, provider.rating_avg, provider.rating_count);
    score += tier_at_least(&weights.experience_tiers, provider.years_experience);

    if provider.verified {
        score += weights.verified_bonus;
    }
    if provider.background_checked {
        score += weights.background_checked_bonus;
    }
    if provider.email_verified {
        score += weights.email_verified_bonus;
    }

    if let Some(minutes) = provider.avg_response_minutes {
        score += tier_at_most(&weights.responsiveness_tiers, minutes);
    }

    score.min(100)
}

fn proximity_bonus(
    weights: &ScoringWeights,
    request_location: Option<GeoPoint>,
    provider: &ProviderProfile,
) -> u32 {
    let distance = geo::distance_or_default(request_location, provider.location);
    let tiered = weights
        .proximity_tiers
        .iter()
        .find(|(cutoff, _)| distance <= *cutoff)
        .map(|(_, bonus)| *bonus)
        .unwrap_or(0);

    if provider.nationwide {
        // A nationwide provider never scores below the flat bonus, but a
        // nearby one keeps its distance tier.
        tiered.max(weights.nationwide_bonus)
    } else {
        tiered
    }
}

fn budget_bonus(weights: &ScoringWeights, budget: Option<i64>, min_rate: Option<i64>) -> u32 {
    let (Some(budget), Some(min_rate)) = (budget, min_rate) else {
        return 0;
    };
    if weights.assumed_job_hours <= 0 || budget <= 0 {
        return 0;
    }
    let implied_hourly = budget / weights.assumed_job_hours;
    if min_rate <= implied_hourly {
        weights.budget_compat
    } else {
        0
    }
}

fn quality_bonus(weights: &ScoringWeights, rating_avg: f64, rating_count: u32) -> u32 {
    if rating_count < weights.min_rating_count || !rating_avg.is_finite() {
        return 0;
    }
    weights
        .quality_tiers
        .iter()
        .find(|(min_avg, _)| rating_avg >= *min_avg)
        .map(|(_, bonus)| *bonus)
        .unwrap_or(0)
}

fn tier_at_least(tiers: &[(u32, u32)], value: u32) -> u32 {
    tiers
        .iter()
        .find(|(min, _)| value >= *min)
        .map(|(_, bonus)| *bonus)
        .unwrap_or(0)
}

fn tier_at_most(tiers: &[(u32, u32)], value: u32) -> u32 {
    tiers
        .iter()
        .find(|(max, _)| value <= *max)
        .map(|(_, bonus)| *bonus)
        .unwrap_or(0)
}

/// A provider with their score for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedProvider {
    pub provider_id: AccountId,
    pub score: u32,
}

/// A lead with its score for one provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedLead {
    pub request_id: RequestId,
    pub score: u32,
}

/// Ranks candidate providers for a request: score descending, then provider
/// id ascending.
pub fn rank_providers(
    weights: &ScoringWeights,
    request: &LeadRequest,
    providers: &[ProviderProfile],
) -> Vec<RankedProvider> {
    let mut ranked: Vec<RankedProvider> = providers
        .iter()
        .map(|provider| RankedProvider {
            provider_id: provider.id,
            score: match_score(weights, request, provider),
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then(a.provider_id.cmp(&b.provider_id))
    });
    ranked
}

/// Ranks open leads for a provider: score descending, then request id
/// ascending.
pub fn rank_leads(
    weights: &ScoringWeights,
    provider: &ProviderProfile,
    requests: &[LeadRequest],
) -> Vec<RankedLead> {
    let mut ranked: Vec<RankedLead> = requests
        .iter()
        .map(|request| RankedLead {
            request_id: request.id,
            score: match_score(weights, request, provider),
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then(a.request_id.cmp(&b.request_id))
    });
    ranked
}
