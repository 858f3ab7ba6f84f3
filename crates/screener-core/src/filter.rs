//! Filter parameters for the upstream stock scan endpoint.
//!
//! A request is either a named scenario, which the scan service expands
//! itself, or a set of advanced filters. Scenario requests carry only the
//! parameters that scenario understands, so leftover advanced values never
//! double-filter the preset.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub const DEFAULT_SORT_FIELD: &str = "Momentum Score";
pub const DEFAULT_LIMIT: u32 = 50;
pub const SCORE_CEILING: f64 = 100.0;
pub const DRAWDOWN_CEILING: f64 = 50.0;

/// Named presets understood by the scan service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    PerfectMomentum,
    HighScore,
    Consolidation,
    OptimalDrawdown,
    Breakout,
}

impl Scenario {
    pub const ALL: [Scenario; 5] = [
        Scenario::PerfectMomentum,
        Scenario::HighScore,
        Scenario::Consolidation,
        Scenario::OptimalDrawdown,
        Scenario::Breakout,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scenario::PerfectMomentum => "perfect_momentum",
            Scenario::HighScore => "high_score",
            Scenario::Consolidation => "consolidation",
            Scenario::OptimalDrawdown => "optimal_drawdown",
            Scenario::Breakout => "breakout",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Scenario::PerfectMomentum => "Perfect Momentum",
            Scenario::HighScore => "High Score Stocks",
            Scenario::Consolidation => "Consolidation Candidates",
            Scenario::OptimalDrawdown => "Optimal Drawdown",
            Scenario::Breakout => "Breakout Candidates",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Scenario::PerfectMomentum => "Stocks meeting ALL momentum criteria (best candidates)",
            Scenario::HighScore => "Top scoring opportunities",
            Scenario::Consolidation => "Range-bound stocks ready for potential breakout",
            Scenario::OptimalDrawdown => "Stocks 10-40% down from 52W high (buying opportunities)",
            Scenario::Breakout => "High volume activity stocks (>1.5x volume ratio)",
        }
    }

    /// The preset filter the dashboard sends for this scenario.
    pub fn preset(&self) -> FilterParams {
        let mut params = FilterParams {
            scenario: Some(self.as_str().to_string()),
            ..Default::default()
        };
        match self {
            Scenario::PerfectMomentum => params.limit = Some(20),
            Scenario::HighScore => {
                params.min_score = Some(70.0);
                params.limit = Some(15);
            }
            Scenario::Consolidation => params.limit = Some(25),
            Scenario::OptimalDrawdown => params.limit = Some(30),
            Scenario::Breakout => {
                params.min_volume = Some(2.0);
                params.limit = Some(20);
            }
        }
        params
    }
}

impl std::fmt::Display for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scenario {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|scenario| scenario.as_str() == s)
            .ok_or_else(|| format!("unknown scenario: {s}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketCap {
    Large,
    Mid,
    Small,
}

impl MarketCap {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketCap::Large => "large",
            MarketCap::Mid => "mid",
            MarketCap::Small => "small",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// Filter state as the dashboard holds it.
///
/// When `scenario` is set the advanced fields are ignored entirely.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_drawdown: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_drawdown: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<MarketCap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_volume: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<SortOrder>,
}

impl FilterParams {
    /// Advanced-filter defaults: the full score and drawdown range, sorted by momentum.
    pub fn advanced_defaults() -> Self {
        Self {
            min_score: Some(0.0),
            max_score: Some(SCORE_CEILING),
            min_drawdown: Some(0.0),
            max_drawdown: Some(DRAWDOWN_CEILING),
            min_volume: Some(1.0),
            sort_by: Some(DEFAULT_SORT_FIELD.to_string()),
            sort_order: Some(SortOrder::Desc),
            limit: Some(DEFAULT_LIMIT),
            ..Default::default()
        }
    }

    /// Everything the scan has, best momentum first.
    pub fn view_all() -> Self {
        Self {
            limit: Some(DEFAULT_LIMIT),
            sort_by: Some(DEFAULT_SORT_FIELD.to_string()),
            sort_order: Some(SortOrder::Desc),
            ..Default::default()
        }
    }

    pub fn is_scenario(&self) -> bool {
        self.scenario.is_some()
    }

    /// Name shown to the user for the result set.
    pub fn display_name(&self) -> String {
        match &self.scenario {
            Some(name) => match name.parse::<Scenario>() {
                Ok(scenario) => scenario.label().to_string(),
                Err(_) => name.replacen('_', " ", 1),
            },
            None => "Custom Filter".to_string(),
        }
    }

    /// Query parameters for `GET /api/stocks/scan`.
    ///
    /// Advanced values equal to their unconstrained default are left out so the
    /// scan service does not apply a redundant bound.
    pub fn to_query_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();

        if let Some(scenario) = &self.scenario {
            params.push(("scenario", scenario.clone()));
            if let Some(limit) = self.limit.filter(|l| *l > 0) {
                params.push(("limit", limit.to_string()));
            }
            let known = scenario.parse::<Scenario>().ok();
            if known == Some(Scenario::HighScore) {
                if let Some(min_score) = self.min_score.filter(|v| *v != 0.0) {
                    params.push(("min_score", min_score.to_string()));
                }
            }
            if known == Some(Scenario::Breakout) {
                if let Some(min_volume) = self.min_volume.filter(|v| *v != 0.0) {
                    params.push(("min_volume", min_volume.to_string()));
                }
            }
            return params;
        }

        if let Some(limit) = self.limit.filter(|l| *l > 0) {
            params.push(("limit", limit.to_string()));
        }
        if let Some(offset) = self.offset.filter(|o| *o > 0) {
            params.push(("offset", offset.to_string()));
        }
        if let Some(min_score) = self.min_score {
            params.push(("min_score", min_score.to_string()));
        }
        if let Some(max_score) = self.max_score.filter(|v| *v < SCORE_CEILING) {
            params.push(("max_score", max_score.to_string()));
        }
        if let Some(min_drawdown) = self.min_drawdown.filter(|v| *v > 0.0) {
            params.push(("min_drawdown", min_drawdown.to_string()));
        }
        if let Some(max_drawdown) = self.max_drawdown.filter(|v| *v < DRAWDOWN_CEILING) {
            params.push(("max_drawdown", max_drawdown.to_string()));
        }
        if let Some(market_cap) = self.market_cap {
            params.push(("market_cap", market_cap.as_str().to_string()));
        }
        if let Some(min_volume) = self.min_volume.filter(|v| *v > 0.0) {
            params.push(("min_volume", min_volume.to_string()));
        }
        if let Some(sort_by) = self.sort_by.as_ref().filter(|s| !s.is_empty()) {
            params.push(("sort_by", sort_by.clone()));
            params.push(("sort_order", self.sort_order.unwrap_or_default().as_str().to_string()));
        }

        params
    }
}
