//! Weighted fitness score over sparse financial metrics.
//!
//! Four criteria (EBITDA average, YoY growth average, annual revenue and
//! leverage) are each classified to `1.0`, `0.5` or `0.0` and combined as a
//! weighted average. Only criteria with data take part in the average, so a
//! company is judged on what is known about it; the result is scaled to
//! `[0, 10]` and mapped to a color class.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::models::{Company, ScoreColor, ScoringInputs};
use crate::record_store::Record;

pub const EBITDA_WEIGHT: f64 = 0.35;
pub const YOY_GROWTH_WEIGHT: f64 = 0.30;
pub const REVENUE_WEIGHT: f64 = 0.20;
pub const LEVERAGE_WEIGHT: f64 = 0.15;

/// Weights in hundredths. Sums are taken in these units so that profiles
/// landing exactly on a color threshold are not pushed below it by rounding.
const EBITDA_POINTS: u32 = 35;
const YOY_GROWTH_POINTS: u32 = 30;
const REVENUE_POINTS: u32 = 20;
const LEVERAGE_POINTS: u32 = 15;

/// Largest difference at which two final scores are considered equal.
pub const SCORE_TOLERANCE: f64 = 1e-9;

/// EBITDA average (%) bounds of the middle band, both inclusive.
pub const EBITDA_BAND: (f64, f64) = (5.0, 13.0);
/// YoY growth average (%) bounds of the middle band, both inclusive.
pub const YOY_GROWTH_BAND: (f64, f64) = (1.0, 16.0);
/// Annual revenue bounds of the middle band, both inclusive.
pub const REVENUE_BAND: (f64, f64) = (50_000_000.0, 100_000_000.0);
/// Leverage (%) bounds of the middle band, both inclusive. Lower is better.
pub const LEVERAGE_BAND: (f64, f64) = (50.0, 100.0);

pub const GREEN_THRESHOLD: f64 = 7.5;
pub const ORANGE_THRESHOLD: f64 = 5.0;

/// Headline result of scoring a company.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub final_score: f64,
    pub score_color: ScoreColor,
}

impl Score {
    /// True when both scores agree up to [`SCORE_TOLERANCE`] and share a color.
    pub fn matches(&self, other: &Score) -> bool {
        self.score_color == other.score_color
            && (self.final_score - other.final_score).abs() <= SCORE_TOLERANCE
    }

    /// Writes `final_score` and `score_color` into a store record.
    pub fn write_into(&self, record: &mut Record) {
        record.insert("final_score".to_string(), json!(self.final_score));
        record.insert("score_color".to_string(), json!(self.score_color));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    EbitdaAverage,
    YoyGrowthAverage,
    AnnualRevenue,
    Leverage,
}

impl Criterion {
    pub const ALL: [Criterion; 4] = [
        Criterion::EbitdaAverage,
        Criterion::YoyGrowthAverage,
        Criterion::AnnualRevenue,
        Criterion::Leverage,
    ];

    pub fn weight(&self) -> f64 {
        match self {
            Criterion::EbitdaAverage => EBITDA_WEIGHT,
            Criterion::YoyGrowthAverage => YOY_GROWTH_WEIGHT,
            Criterion::AnnualRevenue => REVENUE_WEIGHT,
            Criterion::Leverage => LEVERAGE_WEIGHT,
        }
    }

    fn points(&self) -> u32 {
        match self {
            Criterion::EbitdaAverage => EBITDA_POINTS,
            Criterion::YoyGrowthAverage => YOY_GROWTH_POINTS,
            Criterion::AnnualRevenue => REVENUE_POINTS,
            Criterion::Leverage => LEVERAGE_POINTS,
        }
    }

    /// The value this criterion is judged on, if any data is present.
    fn observed(&self, inputs: &ScoringInputs) -> Option<f64> {
        match self {
            Criterion::EbitdaAverage => average(&inputs.ebitda()),
            Criterion::YoyGrowthAverage => average(&inputs.yoy_growth()),
            Criterion::AnnualRevenue => finite(inputs.annual_revenue_2024),
            Criterion::Leverage => finite(inputs.leverage),
        }
    }

    /// Classifies an observed value into half points: `2`, `1` or `0`.
    fn classify(&self, value: f64) -> u32 {
        match self {
            Criterion::EbitdaAverage => higher_is_better(value, EBITDA_BAND),
            Criterion::YoyGrowthAverage => higher_is_better(value, YOY_GROWTH_BAND),
            Criterion::AnnualRevenue => higher_is_better(value, REVENUE_BAND),
            Criterion::Leverage => lower_is_better(value, LEVERAGE_BAND),
        }
    }
}

/// Outcome of one criterion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CriterionResult {
    pub criterion: Criterion,
    pub weight: f64,
    /// Observed value (an average for the EBITDA and growth criteria).
    pub observed: Option<f64>,
    /// `1.0`, `0.5` or `0.0`; `None` when the criterion had no data.
    pub score: Option<f64>,
}

impl CriterionResult {
    pub fn contributed(&self) -> bool {
        self.score.is_some()
    }
}

/// Full explanation of a score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub criteria: Vec<CriterionResult>,
    /// Sum of weights of the criteria that had data.
    pub weight_used: f64,
    /// Sum of `score × weight` over the criteria that had data.
    pub weighted_sum: f64,
    pub final_score: f64,
    pub score_color: ScoreColor,
}

impl ScoreBreakdown {
    pub fn score(&self) -> Score {
        Score {
            final_score: self.final_score,
            score_color: self.score_color,
        }
    }
}

/// Stateless scoring engine.
pub struct ScoringEngine;

impl ScoringEngine {
    /// Scores a company snapshot. Stored score fields are ignored.
    pub fn score(company: &Company) -> Score {
        Self::score_inputs(&company.metrics)
    }

    pub fn score_inputs(inputs: &ScoringInputs) -> Score {
        Self::breakdown(inputs).score()
    }

    /// Scores the inputs and reports how each criterion contributed.
    pub fn breakdown(inputs: &ScoringInputs) -> ScoreBreakdown {
        let mut half_points_sum = 0u32;
        let mut points_used = 0u32;

        let criteria: Vec<CriterionResult> = Criterion::ALL
            .iter()
            .map(|criterion| {
                let observed = criterion.observed(inputs);
                let half_points = observed.map(|v| criterion.classify(v));
                if let Some(half_points) = half_points {
                    half_points_sum += half_points * criterion.points();
                    points_used += criterion.points();
                }
                CriterionResult {
                    criterion: *criterion,
                    weight: criterion.weight(),
                    observed,
                    score: half_points.map(|h| f64::from(h) / 2.0),
                }
            })
            .collect();

        // half_points_sum / (2 × points_used) × 10, with a single rounding step.
        let final_score = if points_used > 0 {
            (f64::from(half_points_sum * 5) / f64::from(points_used)).clamp(0.0, 10.0)
        } else {
            0.0
        };
        let weight_used = f64::from(points_used) / 100.0;
        let weighted_sum = f64::from(half_points_sum) / 200.0;

        ScoreBreakdown {
            criteria,
            weight_used,
            weighted_sum,
            final_score,
            score_color: color_for(final_score),
        }
    }
}

/// Maps a final score to its color class.
pub fn color_for(final_score: f64) -> ScoreColor {
    if final_score >= GREEN_THRESHOLD {
        ScoreColor::Green
    } else if final_score >= ORANGE_THRESHOLD {
        ScoreColor::Orange
    } else {
        ScoreColor::Red
    }
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

/// Mean of the present, finite values.
fn average(values: &[Option<f64>]) -> Option<f64> {
    let present: Vec<f64> = values.iter().filter_map(|v| finite(*v)).collect();
    if present.is_empty() {
        return None;
    }
    Some(present.iter().sum::<f64>() / present.len() as f64)
}

fn higher_is_better(value: f64, (low, high): (f64, f64)) -> u32 {
    if value > high {
        2
    } else if value >= low {
        1
    } else {
        0
    }
}

fn lower_is_better(value: f64, (low, high): (f64, f64)) -> u32 {
    if value < low {
        2
    } else if value <= high {
        1
    } else {
        0
    }
}
