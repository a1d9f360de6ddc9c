//! Input checks applied at the HTTP boundary.
//!
//! The store and the scoring engine accept any strings; these rules exist so
//! that forms get a useful 400 instead of persisting obviously broken input.

use regex::Regex;

use crate::errors::AppError;
use crate::models::{CompanyPatch, NewCompany};

/// Normalizes a CNPJ to its 14 digits.
///
/// Accepts either bare digits or the usual `00.000.000/0000-00` mask.
pub fn normalize_cnpj(raw: &str) -> Result<String, AppError> {
    let cnpj_regex = Regex::new(r"^\d{2}\.?\d{3}\.?\d{3}/?\d{4}-?\d{2}$")
        .map_err(|e| AppError::InternalError(format!("Invalid CNPJ pattern: {}", e)))?;

    let trimmed = raw.trim();
    if !cnpj_regex.is_match(trimmed) {
        return Err(AppError::BadRequest(format!(
            "CNPJ must have 14 digits, optionally formatted as 00.000.000/0000-00 (got '{}')",
            trimmed
        )));
    }

    Ok(trimmed.chars().filter(|c| c.is_ascii_digit()).collect())
}

fn require_text(field: &str, value: &str) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest(format!("{} cannot be empty", field)));
    }
    Ok(trimmed.to_string())
}

/// Validates a creation payload and returns its normalized form.
pub fn validate_new_company(mut input: NewCompany) -> Result<NewCompany, AppError> {
    input.name = require_text("name", &input.name)?;
    input.sector = require_text("sector", &input.sector)?;
    input.cnpj = normalize_cnpj(&input.cnpj)?;
    Ok(input)
}

/// Validates the text fields a patch touches and returns its normalized form.
pub fn validate_patch(mut patch: CompanyPatch) -> Result<CompanyPatch, AppError> {
    if let Some(name) = patch.name.take() {
        patch.name = Some(require_text("name", &name)?);
    }
    if let Some(sector) = patch.sector.take() {
        patch.sector = Some(require_text("sector", &sector)?);
    }
    if let Some(cnpj) = patch.cnpj.take() {
        patch.cnpj = Some(normalize_cnpj(&cnpj)?);
    }
    Ok(patch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_cnpj_accepts_masked_and_bare() {
        assert_eq!(
            normalize_cnpj("12.345.678/0001-90").unwrap(),
            "12345678000190"
        );
        assert_eq!(normalize_cnpj(" 12345678000190 ").unwrap(), "12345678000190");
    }

    #[test]
    fn test_normalize_cnpj_rejects_wrong_length() {
        assert!(normalize_cnpj("1234567800019").is_err());
        assert!(normalize_cnpj("123456780001900").is_err());
        assert!(normalize_cnpj("12.345.678/0001-9X").is_err());
        assert!(normalize_cnpj("").is_err());
    }

    #[test]
    fn test_validate_new_company_trims_text() {
        let input = NewCompany {
            name: "  Acme  ".to_string(),
            sector: "Agro".to_string(),
            cnpj: "12.345.678/0001-90".to_string(),
            ..Default::default()
        };
        let input = validate_new_company(input).unwrap();
        assert_eq!(input.name, "Acme");
        assert_eq!(input.cnpj, "12345678000190");
    }

    #[test]
    fn test_validate_new_company_rejects_blank_sector() {
        let input = NewCompany {
            name: "Acme".to_string(),
            sector: "   ".to_string(),
            cnpj: "12345678000190".to_string(),
            ..Default::default()
        };
        let err = validate_new_company(input).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn test_validate_patch_leaves_untouched_fields() {
        let patch = CompanyPatch {
            leverage: Some(Some(30.0)),
            ..Default::default()
        };
        assert_eq!(validate_patch(patch.clone()).unwrap(), patch);

        let bad = CompanyPatch {
            name: Some(String::new()),
            ..Default::default()
        };
        assert!(validate_patch(bad).is_err());
    }
}
