//! Per-cell annotations: comments, protection, data validation, and
//! conditional formats.
//!
//! ## Matching rules
//!
//! - **List validation**: case-sensitive, exact match against the display text.
//! - **Number / text-length bounds**: inclusive on both ends.
//! - **Pattern validation**: the regex must match somewhere in the text. A
//!   pattern that fails to compile rejects every value with an explicit
//!   message instead of panicking.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cell::CellValue;
use crate::coord::CellRange;
use crate::style::StylePatch;

// ============================================================================
// Comments and protection
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Comment {
    pub fn new(text: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self { text: text.into(), created_at: at, updated_at: at }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Protection {
    /// Formatting may still be changed on a protected cell.
    #[serde(default)]
    pub allow_formatting: bool,
    pub protected_at: DateTime<Utc>,
}

// ============================================================================
// Data validation
// ============================================================================

/// A validation rule attached to one cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRule {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    #[serde(flatten)]
    pub kind: ValidationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

/// What a validation rule checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ValidationKind {
    /// Value must be numeric and within the optional bounds.
    Number {
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
    },
    /// Value must be one of the listed options.
    List { options: Vec<String> },
    /// Character count must be within the optional bounds.
    TextLength {
        #[serde(default)]
        min: Option<usize>,
        #[serde(default)]
        max: Option<usize>,
    },
    /// Value text must match a regular expression.
    Pattern { pattern: String },
}

/// Result of checking a value against a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub valid: bool,
    pub message: String,
}

impl Verdict {
    pub fn ok() -> Self {
        Self { valid: true, message: String::new() }
    }

    fn reject(message: impl Into<String>) -> Self {
        Self { valid: false, message: message.into() }
    }
}

impl ValidationRule {
    pub fn new(kind: ValidationKind, at: DateTime<Utc>) -> Self {
        Self { id: Uuid::new_v4(), kind, error_message: None, created_at: at }
    }

    pub fn with_error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    /// Check a candidate value.
    pub fn validate(&self, value: &CellValue) -> Verdict {
        match &self.kind {
            ValidationKind::Number { min, max } => {
                let Some(n) = value.as_number() else {
                    return Verdict::reject("Enter a number");
                };
                if let Some(min) = min {
                    if n < *min {
                        return Verdict::reject(format!("Enter a value of at least {min}"));
                    }
                }
                if let Some(max) = max {
                    if n > *max {
                        return Verdict::reject(format!("Enter a value of at most {max}"));
                    }
                }
                Verdict::ok()
            }
            ValidationKind::List { options } => {
                let text = value.display();
                if options.iter().any(|o| *o == text) {
                    Verdict::ok()
                } else {
                    Verdict::reject("Choose a value from the list")
                }
            }
            ValidationKind::TextLength { min, max } => {
                let len = value.display().chars().count();
                if let Some(min) = min {
                    if len < *min {
                        return Verdict::reject(format!("Enter at least {min} characters"));
                    }
                }
                if let Some(max) = max {
                    if len > *max {
                        return Verdict::reject(format!("Enter at most {max} characters"));
                    }
                }
                Verdict::ok()
            }
            ValidationKind::Pattern { pattern } => match Regex::new(pattern) {
                Ok(re) if re.is_match(&value.display()) => Verdict::ok(),
                Ok(_) => Verdict::reject(
                    self.error_message.clone().unwrap_or_else(|| "Invalid input".to_string()),
                ),
                Err(e) => Verdict::reject(format!("Validation pattern is invalid: {e}")),
            },
        }
    }
}

// ============================================================================
// Conditional formats
// ============================================================================

/// Condition evaluated against a cell value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Condition {
    GreaterThan { value: f64 },
    LessThan { value: f64 },
    /// Inclusive on both ends.
    Between { min: f64, max: f64 },
    /// Display text equality, case-sensitive.
    EqualTo { value: String },
    /// Case-insensitive substring.
    Contains { value: String },
    Empty,
    NotEmpty,
}

impl Condition {
    pub fn matches(&self, value: &CellValue) -> bool {
        match self {
            Condition::GreaterThan { value: v } => value.as_number().is_some_and(|n| n > *v),
            Condition::LessThan { value: v } => value.as_number().is_some_and(|n| n < *v),
            Condition::Between { min, max } => {
                value.as_number().is_some_and(|n| n >= *min && n <= *max)
            }
            Condition::EqualTo { value: v } => !value.is_blank() && value.display() == *v,
            Condition::Contains { value: v } => {
                !v.is_empty() && value.display().to_lowercase().contains(&v.to_lowercase())
            }
            Condition::Empty => value.is_blank(),
            Condition::NotEmpty => !value.is_blank(),
        }
    }
}

/// A style override applied to cells of a range that satisfy a condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionalFormat {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub range: CellRange,
    pub condition: Condition,
    #[serde(default)]
    pub style: StylePatch,
}

impl ConditionalFormat {
    pub fn new(range: CellRange, condition: Condition, style: StylePatch) -> Self {
        Self { id: Uuid::new_v4(), range, condition, style }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(kind: ValidationKind) -> ValidationRule {
        ValidationRule::new(kind, Utc::now())
    }

    #[test]
    fn test_number_bounds_inclusive() {
        let r = rule(ValidationKind::Number { min: Some(1.0), max: Some(10.0) });
        assert!(r.validate(&CellValue::Number(1.0)).valid);
        assert!(r.validate(&CellValue::Number(10.0)).valid);
        assert!(r.validate(&CellValue::from("5")).valid);
        assert!(!r.validate(&CellValue::Number(10.5)).valid);
        let v = r.validate(&CellValue::from("ten"));
        assert!(!v.valid);
        assert_eq!(v.message, "Enter a number");
    }

    #[test]
    fn test_list_is_case_sensitive() {
        let r = rule(ValidationKind::List { options: vec!["Yes".into(), "No".into()] });
        assert!(r.validate(&CellValue::from("Yes")).valid);
        assert!(!r.validate(&CellValue::from("yes")).valid);
    }

    #[test]
    fn test_text_length_counts_chars() {
        let r = rule(ValidationKind::TextLength { min: None, max: Some(3) });
        assert!(r.validate(&CellValue::from("日本語")).valid);
        assert!(!r.validate(&CellValue::from("abcd")).valid);
    }

    #[test]
    fn test_pattern_rule() {
        let r = rule(ValidationKind::Pattern { pattern: r"^\d{3}-\d{4}$".into() })
            .with_error_message("Use NNN-NNNN");
        assert!(r.validate(&CellValue::from("123-4567")).valid);
        assert_eq!(r.validate(&CellValue::from("1234567")).message, "Use NNN-NNNN");

        let broken = rule(ValidationKind::Pattern { pattern: "(".into() });
        assert!(!broken.validate(&CellValue::from("x")).valid);
    }

    #[test]
    fn test_rule_wire_shape() {
        let r = rule(ValidationKind::Number { min: Some(0.0), max: None });
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["type"], "number");
        assert_eq!(json["min"], 0.0);
        let back: ValidationRule = serde_json::from_value(json).unwrap();
        assert_eq!(back, r);
    }

    #[test]
    fn test_conditions() {
        assert!(Condition::GreaterThan { value: 5.0 }.matches(&CellValue::Number(6.0)));
        assert!(!Condition::GreaterThan { value: 5.0 }.matches(&CellValue::from("abc")));
        assert!(Condition::Between { min: 1.0, max: 2.0 }.matches(&CellValue::Number(2.0)));
        assert!(Condition::Contains { value: "ERR".into() }.matches(&CellValue::from("an error")));
        assert!(Condition::Empty.matches(&CellValue::Null));
        assert!(Condition::NotEmpty.matches(&CellValue::Number(0.0)));
        assert!(Condition::EqualTo { value: "3".into() }.matches(&CellValue::Number(3.0)));
    }
}
