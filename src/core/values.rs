use crate::domain::model::{FieldKind, FieldSpec, FieldValue};
use crate::utils::error::{FormError, Result};
use chrono::NaiveDate;
use serde_json::Value;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parses a raw JSON value submitted for `field`.
///
/// `Ok(None)` means the value should be cleared: `null` or an empty string
/// on an optional field. Required fields reject both; clearing them is only
/// possible through an explicit delete.
pub fn parse_field_value(field: &FieldSpec, raw: &Value) -> Result<Option<FieldValue>> {
    let blank = match raw {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    };
    if blank {
        if field.required {
            return Err(FormError::invalid_field(&field.id, "this field is required"));
        }
        return Ok(None);
    }

    let value = match &field.kind {
        FieldKind::Text { max_len } => {
            let text = expect_str(field, raw)?.trim();
            let len = text.chars().count();
            if len > *max_len {
                return Err(FormError::invalid_field(
                    &field.id,
                    format!("at most {} characters allowed, got {}", max_len, len),
                ));
            }
            FieldValue::Text(text.to_string())
        }
        FieldKind::Date => {
            let text = expect_str(field, raw)?.trim();
            let date = NaiveDate::parse_from_str(text, DATE_FORMAT).map_err(|_| {
                FormError::invalid_field(&field.id, "expected a date in YYYY-MM-DD format")
            })?;
            if date < NaiveDate::from_ymd_opt(1900, 1, 1).unwrap_or(NaiveDate::MIN) {
                return Err(FormError::invalid_field(&field.id, "date is before 1900"));
            }
            FieldValue::Date(date)
        }
        FieldKind::Number { min, max } => {
            let number = match raw {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().replace(',', "").parse::<f64>().ok(),
                _ => None,
            }
            .filter(|n| n.is_finite())
            .ok_or_else(|| FormError::invalid_field(&field.id, "expected a number"))?;

            if let Some(min) = min {
                if number < *min {
                    return Err(FormError::invalid_field(&field.id, format!("must be at least {}", min)));
                }
            }
            if let Some(max) = max {
                if number > *max {
                    return Err(FormError::invalid_field(&field.id, format!("must be at most {}", max)));
                }
            }
            FieldValue::Number(number)
        }
        FieldKind::Email => {
            let text = expect_str(field, raw)?.trim();
            if !is_email(text) {
                return Err(FormError::invalid_field(&field.id, "expected an email address"));
            }
            FieldValue::Text(text.to_string())
        }
        FieldKind::Phone => {
            let text = expect_str(field, raw)?.trim();
            if !is_phone(text) {
                return Err(FormError::invalid_field(
                    &field.id,
                    "expected a telephone number with 7 to 15 digits",
                ));
            }
            FieldValue::Text(text.to_string())
        }
        FieldKind::Checkbox => {
            let checked = match raw {
                Value::Bool(b) => *b,
                Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                    "true" | "on" | "yes" | "1" => true,
                    "false" | "off" | "no" | "0" => false,
                    _ => return Err(FormError::invalid_field(&field.id, "expected true or false")),
                },
                _ => return Err(FormError::invalid_field(&field.id, "expected true or false")),
            };
            FieldValue::Bool(checked)
        }
        FieldKind::Choice { options } => {
            let text = expect_str(field, raw)?.trim();
            let option = options
                .iter()
                .find(|o| o.id == text)
                .or_else(|| options.iter().find(|o| o.label.eq_ignore_ascii_case(text)))
                .ok_or_else(|| {
                    FormError::invalid_field(
                        &field.id,
                        format!(
                            "unknown option '{}', expected one of: {}",
                            text,
                            options.iter().map(|o| o.id.as_str()).collect::<Vec<_>>().join(", ")
                        ),
                    )
                })?;
            FieldValue::Choice(option.id.clone())
        }
    };

    Ok(Some(value))
}

fn expect_str<'a>(field: &FieldSpec, raw: &'a Value) -> Result<&'a str> {
    raw.as_str()
        .ok_or_else(|| FormError::invalid_field(&field.id, "expected a string"))
}

fn is_email(text: &str) -> bool {
    if text.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = text.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2
        && labels.iter().all(|l| !l.is_empty())
        && labels.last().is_some_and(|tld| tld.len() >= 2)
}

fn is_phone(text: &str) -> bool {
    let allowed = text
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '+' | '-' | '(' | ')' | '.'));
    let digits = text.chars().filter(char::is_ascii_digit).count();
    allowed && (7..=15).contains(&digits)
}

/// English text for a stored value, as printed on the exported form.
pub fn render_value(field: &FieldSpec, value: &FieldValue) -> String {
    match value {
        FieldValue::Text(text) => text.clone(),
        FieldValue::Bool(true) => "Yes".to_string(),
        FieldValue::Bool(false) => "No".to_string(),
        FieldValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
        FieldValue::Number(n) => format!("{}", n),
        FieldValue::Choice(id) => field
            .kind
            .option(id)
            .map(|o| o.label.clone())
            .unwrap_or_else(|| id.clone()),
        FieldValue::Date(date) => date.format(DATE_FORMAT).to_string(),
    }
}

/// Whether a value satisfies a required field.
pub fn is_filled(value: Option<&FieldValue>) -> bool {
    match value {
        None => false,
        Some(FieldValue::Bool(checked)) => *checked,
        Some(FieldValue::Text(text)) => !text.trim().is_empty(),
        Some(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::pr_card_form;
    use serde_json::json;

    fn field(id: &str) -> FieldSpec {
        pr_card_form().field(id).unwrap().clone()
    }

    #[test]
    fn test_text_trimmed_and_limited() {
        let f = field("family_name");
        assert_eq!(
            parse_field_value(&f, &json!("  Tremblay ")).unwrap(),
            Some(FieldValue::Text("Tremblay".to_string()))
        );
        assert!(parse_field_value(&f, &json!("x".repeat(61))).is_err());
        assert!(parse_field_value(&f, &json!(12)).is_err());
    }

    #[test]
    fn test_empty_string_required_vs_optional() {
        assert!(parse_field_value(&field("family_name"), &json!("  ")).is_err());
        assert_eq!(parse_field_value(&field("place_of_birth"), &json!("")).unwrap(), None);
        assert_eq!(parse_field_value(&field("place_of_birth"), &Value::Null).unwrap(), None);
    }

    #[test]
    fn test_null_rejected_on_required_field() {
        assert!(matches!(
            parse_field_value(&field("family_name"), &Value::Null),
            Err(FormError::InvalidFieldValue { .. })
        ));
    }

    #[test]
    fn test_dates() {
        let f = field("date_of_birth");
        assert_eq!(
            parse_field_value(&f, &json!("1990-02-28")).unwrap(),
            Some(FieldValue::Date(NaiveDate::from_ymd_opt(1990, 2, 28).unwrap()))
        );
        assert!(parse_field_value(&f, &json!("1990-02-30")).is_err());
        assert!(parse_field_value(&f, &json!("28/02/1990")).is_err());
        assert!(parse_field_value(&f, &json!("1850-01-01")).is_err());
    }

    #[test]
    fn test_number_range_and_string_input() {
        let f = field("days_in_canada");
        assert_eq!(
            parse_field_value(&f, &json!(800)).unwrap(),
            Some(FieldValue::Number(800.0))
        );
        assert_eq!(
            parse_field_value(&f, &json!("1,200")).unwrap(),
            Some(FieldValue::Number(1200.0))
        );
        assert!(parse_field_value(&f, &json!(2000)).is_err());
        assert!(parse_field_value(&f, &json!("many")).is_err());
    }

    #[test]
    fn test_email_and_phone() {
        let email = field("email");
        assert!(parse_field_value(&email, &json!("ana@example.ca")).is_ok());
        assert!(parse_field_value(&email, &json!("ana@example")).is_err());
        assert!(parse_field_value(&email, &json!("ana @example.ca")).is_err());
        assert!(parse_field_value(&email, &json!("a@b@c.ca")).is_err());

        let phone = field("phone");
        assert!(parse_field_value(&phone, &json!("+1 (514) 555-0199")).is_ok());
        assert!(parse_field_value(&phone, &json!("555-01")).is_err());
        assert!(parse_field_value(&phone, &json!("call me")).is_err());
    }

    #[test]
    fn test_choice_by_id_or_label() {
        let f = field("marital_status");
        assert_eq!(
            parse_field_value(&f, &json!("common_law")).unwrap(),
            Some(FieldValue::Choice("common_law".to_string()))
        );
        assert_eq!(
            parse_field_value(&f, &json!("common-law")).unwrap(),
            Some(FieldValue::Choice("common_law".to_string()))
        );
        assert!(parse_field_value(&f, &json!("engaged")).is_err());
    }

    #[test]
    fn test_checkbox() {
        let f = field("declaration");
        assert_eq!(parse_field_value(&f, &json!(true)).unwrap(), Some(FieldValue::Bool(true)));
        assert_eq!(parse_field_value(&f, &json!("on")).unwrap(), Some(FieldValue::Bool(true)));
        assert!(parse_field_value(&f, &json!("maybe")).is_err());
    }

    #[test]
    fn test_render_value() {
        let marital = field("marital_status");
        assert_eq!(
            render_value(&marital, &FieldValue::Choice("common_law".to_string())),
            "Common-law"
        );
        let days = field("days_in_canada");
        assert_eq!(render_value(&days, &FieldValue::Number(731.0)), "731");
        assert_eq!(render_value(&field("height_cm"), &FieldValue::Number(170.5)), "170.5");
        assert_eq!(render_value(&field("declaration"), &FieldValue::Bool(true)), "Yes");
    }

    #[test]
    fn test_is_filled() {
        assert!(!is_filled(None));
        assert!(!is_filled(Some(&FieldValue::Bool(false))));
        assert!(is_filled(Some(&FieldValue::Bool(true))));
        assert!(is_filled(Some(&FieldValue::Number(0.0))));
    }
}
