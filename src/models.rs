use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

use crate::errors::AppError;
use crate::record_store::Record;
use crate::scoring::Score;

/// Names of the eight numeric inputs that feed the scoring engine.
pub const SCORING_FIELDS: [&str; 8] = [
    "ebitda_2023",
    "ebitda_2024",
    "ebitda_2025",
    "yoy_growth_21_22",
    "yoy_growth_22_23",
    "yoy_growth_23_24",
    "annual_revenue_2024",
    "leverage",
];

// ============ Domain Models ============

/// Categorical classification of a final score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreColor {
    Green,
    Orange,
    #[default]
    Red,
}

impl ScoreColor {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreColor::Green => "green",
            ScoreColor::Orange => "orange",
            ScoreColor::Red => "red",
        }
    }
}

impl fmt::Display for ScoreColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The optional financial metrics of a company.
///
/// Any subset may be absent. Percentages are expressed as plain numbers
/// (`13.5` means 13.5%).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScoringInputs {
    /// EBITDA margin for 2023 (%).
    #[serde(default)]
    pub ebitda_2023: Option<f64>,
    /// EBITDA margin for 2024 (%).
    #[serde(default)]
    pub ebitda_2024: Option<f64>,
    /// EBITDA margin for 2025 (%).
    #[serde(default)]
    pub ebitda_2025: Option<f64>,
    /// Year-over-year revenue growth 2021 → 2022 (%).
    #[serde(default)]
    pub yoy_growth_21_22: Option<f64>,
    /// Year-over-year revenue growth 2022 → 2023 (%).
    #[serde(default)]
    pub yoy_growth_22_23: Option<f64>,
    /// Year-over-year revenue growth 2023 → 2024 (%).
    #[serde(default)]
    pub yoy_growth_23_24: Option<f64>,
    /// Annual revenue for 2024, in currency units.
    #[serde(default)]
    pub annual_revenue_2024: Option<f64>,
    /// Debt/equity ratio (%).
    #[serde(default)]
    pub leverage: Option<f64>,
}

impl ScoringInputs {
    pub fn ebitda(&self) -> [Option<f64>; 3] {
        [self.ebitda_2023, self.ebitda_2024, self.ebitda_2025]
    }

    pub fn yoy_growth(&self) -> [Option<f64>; 3] {
        [
            self.yoy_growth_21_22,
            self.yoy_growth_22_23,
            self.yoy_growth_23_24,
        ]
    }

    /// Value of a scoring field by its wire name.
    pub fn get(&self, field: &str) -> Option<f64> {
        match field {
            "ebitda_2023" => self.ebitda_2023,
            "ebitda_2024" => self.ebitda_2024,
            "ebitda_2025" => self.ebitda_2025,
            "yoy_growth_21_22" => self.yoy_growth_21_22,
            "yoy_growth_22_23" => self.yoy_growth_22_23,
            "yoy_growth_23_24" => self.yoy_growth_23_24,
            "annual_revenue_2024" => self.annual_revenue_2024,
            "leverage" => self.leverage,
            _ => None,
        }
    }

    /// True when no metric is present at all.
    pub fn is_empty(&self) -> bool {
        SCORING_FIELDS.iter().all(|f| self.get(f).is_none())
    }
}

/// An investment candidate tracked through the evaluation pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    /// Identifier assigned by the record store.
    pub id: Uuid,
    /// Legal or trade name.
    pub name: String,
    /// Industry sector.
    pub sector: String,
    /// CNPJ tax identifier, stored as given.
    pub cnpj: String,
    /// Financial metrics feeding the score.
    #[serde(flatten)]
    pub metrics: ScoringInputs,
    /// Derived weighted score in `[0, 10]`.
    #[serde(default)]
    pub final_score: f64,
    /// Derived color class of `final_score`.
    #[serde(default)]
    pub score_color: ScoreColor,
    /// Timestamp of creation, when the store reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Timestamp of last update, when the store reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Company {
    /// Decodes a record returned by the store.
    pub fn from_record(record: Record) -> Result<Self, AppError> {
        Ok(serde_json::from_value(Value::Object(record))?)
    }

    pub fn score(&self) -> Score {
        Score {
            final_score: self.final_score,
            score_color: self.score_color,
        }
    }

    /// Returns a copy with the fields of `record` laid over this company.
    ///
    /// Fields missing from `record` keep their current value.
    pub fn merged_with(&self, record: &Record) -> Result<Self, AppError> {
        let mut current = match serde_json::to_value(self)? {
            Value::Object(map) => map,
            _ => return Err(AppError::InternalError("Company is not an object".into())),
        };
        for (key, value) in record {
            current.insert(key.clone(), value.clone());
        }
        Company::from_record(current)
    }
}

// ============ Input Models ============

/// Payload for creating a company.
///
/// Carries no identity and no derived score fields; those are assigned by the
/// store and the scoring engine respectively.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NewCompany {
    pub name: String,
    pub sector: String,
    pub cnpj: String,
    #[serde(flatten)]
    pub metrics: ScoringInputs,
}

impl NewCompany {
    /// Builds the record sent to the store: input fields plus computed score.
    pub fn to_record(&self, score: &Score) -> Result<Record, AppError> {
        let mut record = match serde_json::to_value(self)? {
            Value::Object(map) => map,
            _ => return Err(AppError::InternalError("Company input is not an object".into())),
        };
        score.write_into(&mut record);
        Ok(record)
    }
}

/// Partial update of a company.
///
/// Metric fields are tri-state: absent leaves the value untouched, `null`
/// clears it and a number sets it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CompanyPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cnpj: Option<String>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub ebitda_2023: Option<Option<f64>>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub ebitda_2024: Option<Option<f64>>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub ebitda_2025: Option<Option<f64>>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub yoy_growth_21_22: Option<Option<f64>>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub yoy_growth_22_23: Option<Option<f64>>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub yoy_growth_23_24: Option<Option<f64>>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub annual_revenue_2024: Option<Option<f64>>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub leverage: Option<Option<f64>>,
}

impl CompanyPatch {
    /// The scoring fields this patch touches, with their new values.
    pub fn scoring_fields(&self) -> Vec<(&'static str, Option<f64>)> {
        [
            ("ebitda_2023", self.ebitda_2023),
            ("ebitda_2024", self.ebitda_2024),
            ("ebitda_2025", self.ebitda_2025),
            ("yoy_growth_21_22", self.yoy_growth_21_22),
            ("yoy_growth_22_23", self.yoy_growth_22_23),
            ("yoy_growth_23_24", self.yoy_growth_23_24),
            ("annual_revenue_2024", self.annual_revenue_2024),
            ("leverage", self.leverage),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.map(|v| (name, v)))
        .collect()
    }

    /// True if the patch sets at least one scoring field to a value different
    /// from the one in `current`.
    pub fn changes_scoring_inputs(&self, current: &ScoringInputs) -> bool {
        self.scoring_fields()
            .into_iter()
            .any(|(name, value)| current.get(name) != value)
    }

    pub fn is_empty(&self) -> bool {
        *self == CompanyPatch::default()
    }

    /// Applies the patch to a working copy.
    pub fn apply_to(&self, company: &mut Company) {
        if let Some(name) = &self.name {
            company.name = name.clone();
        }
        if let Some(sector) = &self.sector {
            company.sector = sector.clone();
        }
        if let Some(cnpj) = &self.cnpj {
            company.cnpj = cnpj.clone();
        }

        let m = &mut company.metrics;
        let slots = [
            (&mut m.ebitda_2023, self.ebitda_2023),
            (&mut m.ebitda_2024, self.ebitda_2024),
            (&mut m.ebitda_2025, self.ebitda_2025),
            (&mut m.yoy_growth_21_22, self.yoy_growth_21_22),
            (&mut m.yoy_growth_22_23, self.yoy_growth_22_23),
            (&mut m.yoy_growth_23_24, self.yoy_growth_23_24),
            (&mut m.annual_revenue_2024, self.annual_revenue_2024),
            (&mut m.leverage, self.leverage),
        ];
        for (slot, value) in slots {
            if let Some(value) = value {
                *slot = value;
            }
        }
    }

    /// Builds the record sent to the store: patched fields plus score fields.
    pub fn to_record(&self, score: &Score) -> Result<Record, AppError> {
        let mut record = match serde_json::to_value(self)? {
            Value::Object(map) => map,
            _ => return Err(AppError::InternalError("Patch is not an object".into())),
        };
        score.write_into(&mut record);
        Ok(record)
    }
}

/// Keeps `null` distinct from a missing field.
fn double_option<'de, D>(deserializer: D) -> Result<Option<Option<f64>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<f64>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_company() -> Company {
        Company {
            id: Uuid::new_v4(),
            name: "Acme Ltda".to_string(),
            sector: "Agro".to_string(),
            cnpj: "12.345.678/0001-90".to_string(),
            metrics: ScoringInputs {
                ebitda_2024: Some(10.0),
                leverage: Some(40.0),
                ..Default::default()
            },
            final_score: 7.0,
            score_color: ScoreColor::Orange,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_patch_distinguishes_null_from_missing() {
        let patch: CompanyPatch =
            serde_json::from_value(json!({"ebitda_2024": null, "name": "New"})).unwrap();

        assert_eq!(patch.ebitda_2024, Some(None));
        assert_eq!(patch.ebitda_2023, None);
        assert_eq!(patch.name.as_deref(), Some("New"));
    }

    #[test]
    fn test_patch_ignores_derived_fields() {
        let patch: CompanyPatch =
            serde_json::from_value(json!({"final_score": 10.0, "score_color": "green"})).unwrap();
        assert!(patch.is_empty());
    }

    #[test]
    fn test_changes_scoring_inputs_requires_different_value() {
        let company = sample_company();

        let same = CompanyPatch {
            ebitda_2024: Some(Some(10.0)),
            name: Some("Renamed".to_string()),
            ..Default::default()
        };
        assert!(!same.changes_scoring_inputs(&company.metrics));

        let cleared = CompanyPatch {
            leverage: Some(None),
            ..Default::default()
        };
        assert!(cleared.changes_scoring_inputs(&company.metrics));

        let set = CompanyPatch {
            ebitda_2023: Some(Some(3.0)),
            ..Default::default()
        };
        assert!(set.changes_scoring_inputs(&company.metrics));
    }

    #[test]
    fn test_apply_to_sets_and_clears() {
        let mut company = sample_company();
        let patch = CompanyPatch {
            sector: Some("Energia".to_string()),
            leverage: Some(None),
            annual_revenue_2024: Some(Some(75_000_000.0)),
            ..Default::default()
        };
        patch.apply_to(&mut company);

        assert_eq!(company.sector, "Energia");
        assert_eq!(company.metrics.leverage, None);
        assert_eq!(company.metrics.annual_revenue_2024, Some(75_000_000.0));
        assert_eq!(company.metrics.ebitda_2024, Some(10.0));
    }

    #[test]
    fn test_patch_record_serializes_clear_as_null() {
        let patch = CompanyPatch {
            leverage: Some(None),
            ..Default::default()
        };
        let record = patch
            .to_record(&Score {
                final_score: 0.0,
                score_color: ScoreColor::Red,
            })
            .unwrap();

        assert_eq!(record.get("leverage"), Some(&Value::Null));
        assert!(!record.contains_key("ebitda_2023"));
        assert_eq!(record.get("score_color"), Some(&json!("red")));
    }

    #[test]
    fn test_company_decodes_integer_metrics() {
        let id = Uuid::new_v4();
        let record = json!({
            "id": id,
            "name": "Beta SA",
            "sector": "Saúde",
            "cnpj": "98765432000110",
            "annual_revenue_2024": 120000000,
            "final_score": 10,
            "score_color": "green",
            "created_at": "2024-05-01T12:00:00Z"
        });
        let Value::Object(record) = record else {
            unreachable!()
        };
        let company = Company::from_record(record).unwrap();

        assert_eq!(company.id, id);
        assert_eq!(company.metrics.annual_revenue_2024, Some(120_000_000.0));
        assert_eq!(company.metrics.leverage, None);
        assert_eq!(company.score_color, ScoreColor::Green);
        assert!(company.created_at.is_some());
    }

    #[test]
    fn test_merged_with_overlays_fields() {
        let company = sample_company();
        let mut response = Record::new();
        response.insert("name".to_string(), json!("Acme Holding"));
        response.insert("updated_at".to_string(), json!("2025-01-02T03:04:05Z"));

        let merged = company.merged_with(&response).unwrap();
        assert_eq!(merged.name, "Acme Holding");
        assert_eq!(merged.metrics, company.metrics);
        assert!(merged.updated_at.is_some());
    }
}
