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

//! Lead pricing.
//!
//! [`lead_cost`] is a pure, deterministic function of the request and the
//! provider's contact history. The subtotal is clamped to
//! `[min_cost, max_cost]` before discounts, so a discounted price can sit
//! below `min_cost` but never below 1 credit.
//!
//! "Free" is a derived classification ([`is_free_lead`]), never stored, so
//! it cannot drift from the cost formula.

use crate::request::{LeadRequest, Urgency};
use serde::{Deserialize, Serialize};

/// Constants of the lead pricing formula.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    pub base_cost: u32,
    /// (min budget, increment), highest threshold first.
    pub budget_tiers: Vec<(i64, u32)>,
    pub urgent_increment: u32,
    /// Category slugs priced as complex work.
    pub complex_categories: Vec<String>,
    pub complex_increment: u32,
    /// Premium cities, matched case-insensitively.
    pub premium_cities: Vec<String>,
    pub premium_city_increment: u32,
    pub min_cost: u32,
    pub max_cost: u32,
    /// Providers with fewer contacted leads than this get the discount.
    pub new_provider_max_leads: u64,
    /// Applied as `floor(cost * multiplier)`, minimum 1.
    pub new_provider_multiplier: f64,
    pub promotional_multiplier: f64,
    /// Costs at or below this are classified free.
    pub free_threshold: u32,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            base_cost: 5,
            budget_tiers: vec![(5000, 10), (2000, 8), (1000, 6), (500, 4), (250, 2)],
            urgent_increment: 4,
            complex_categories: vec![
                "legal".to_string(),
                "financial".to_string(),
                "medical".to_string(),
            ],
            complex_increment: 3,
            premium_cities: vec![
                "london".to_string(),
                "manchester".to_string(),
                "edinburgh".to_string(),
            ],
            premium_city_increment: 2,
            min_cost: 1,
            max_cost: 20,
            new_provider_max_leads: 5,
            new_provider_multiplier: 0.7,
            promotional_multiplier: 0.5,
            free_threshold: 3,
        }
    }
}

/// Credit cost of contacting `request` for a provider who has contacted
/// `provider_leads_contacted` leads so far.
pub fn lead_cost(config: &PricingConfig, request: &LeadRequest, provider_leads_contacted: u64) -> u32 {
    let mut cost = config.base_cost;

    if let Some(budget) = request.budget {
        cost += config
            .budget_tiers
            .iter()
            .find(|(threshold, _)| budget >= *threshold)
            .map(|(_, increment)| *increment)
            .unwrap_or(0);
    }

    if request.urgency == Urgency::Urgent {
        cost += config.urgent_increment;
    }

    if config
        .complex_categories
        .iter()
        .any(|c| c.eq_ignore_ascii_case(&request.category))
    {
        cost += config.complex_increment;
    }

    if let Some(city) = &request.city {
        if config
            .premium_cities
            .iter()
            .any(|c| c.eq_ignore_ascii_case(city))
        {
            cost += config.premium_city_increment;
        }
    }

    cost = cost.clamp(config.min_cost, config.max_cost);

    if provider_leads_contacted < config.new_provider_max_leads {
        cost = discount(cost, config.new_provider_multiplier);
    }
    if request.promotional {
        cost = discount(cost, config.promotional_multiplier);
    }

    cost
}

/// Whether the lead is offered for free: promotional requests, and anything
/// priced at or below the free threshold.
pub fn is_free_lead(config: &PricingConfig, request: &LeadRequest, cost: u32) -> bool {
    request.promotional || cost <= config.free_threshold
}

fn discount(cost: u32, multiplier: f64) -> u32 {
    ((cost as f64 * multiplier).floor() as u32).max(1)
}
