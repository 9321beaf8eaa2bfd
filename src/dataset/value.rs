/// Cell values and logical column types
///
/// Cells arrive either already typed or as raw text. Every comparison, scan and
/// statistic goes through `coerce_to`, so a raw "1200" and a typed 1200.0 behave
/// the same once the column is known to be numeric.
use chrono::{NaiveDate, NaiveDateTime};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Logical type of a column or literal
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeTag {
    Numeric,
    Date,
    Boolean,
    Text,
}

impl TypeTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeTag::Numeric => "numeric",
            TypeTag::Date => "date",
            TypeTag::Boolean => "boolean",
            TypeTag::Text => "text",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "numeric" => Some(TypeTag::Numeric),
            "date" => Some(TypeTag::Date),
            "boolean" => Some(TypeTag::Boolean),
            "text" => Some(TypeTag::Text),
            _ => None,
        }
    }

    /// Inference candidates, highest priority first
    pub fn inference_order() -> [TypeTag; 3] {
        [TypeTag::Numeric, TypeTag::Date, TypeTag::Boolean]
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single spreadsheet cell
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum CellValue {
    Number(f64),
    Text(String),
    Bool(bool),
    Date(NaiveDate),
    Null,
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d %B %Y", "%B %d %Y", "%b %d %Y"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// Parse a number the way spreadsheet users type it ("1,200", "$35.50")
pub fn parse_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix('$').unwrap_or(trimmed);
    if trimmed.is_empty() {
        return None;
    }
    let cleaned = if trimmed.contains(',') {
        strip_thousands_separators(trimmed)?
    } else {
        trimmed.to_string()
    };
    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() => Some(v),
        _ => None,
    }
}

/// "1,234,567.5" -> "1234567.5". Commas are only accepted between
/// three-digit groups of the integer part; "1,2,3" or "12,34" is not a number.
fn strip_thousands_separators(text: &str) -> Option<String> {
    let (sign, unsigned) = match text.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", text),
    };
    let (integer, fraction) = match unsigned.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (unsigned, None),
    };
    if fraction.map_or(false, |f| f.contains(',')) {
        return None;
    }
    let mut groups = integer.split(',');
    let first = groups.next()?;
    if first.is_empty() || first.len() > 3 || !first.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let mut digits = first.to_string();
    for group in groups {
        if group.len() != 3 || !group.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.push_str(group);
    }
    Some(match fraction {
        Some(f) => format!("{}{}.{}", sign, digits, f),
        None => format!("{}{}", sign, digits),
    })
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
                .map(|dt| dt.date())
        })
}

pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "yes" => Some(true),
        "false" | "no" => Some(false),
        _ => None,
    }
}

impl CellValue {
    /// Build a cell from raw loader text; blank strings become Null
    pub fn from_raw(raw: &str) -> Self {
        if raw.trim().is_empty() {
            CellValue::Null
        } else {
            CellValue::Text(raw.to_string())
        }
    }

    /// Null or a blank text cell
    pub fn is_null(&self) -> bool {
        match self {
            CellValue::Null => true,
            CellValue::Text(s) => s.trim().is_empty(),
            CellValue::Number(v) => v.is_nan(),
            _ => false,
        }
    }

    /// True when the cell parses as `tag`. Null cells never match.
    pub fn matches_type(&self, tag: TypeTag) -> bool {
        self.coerce_to(tag).is_some()
    }

    /// Convert to `tag`, or None when the cell is null or cannot represent it
    pub fn coerce_to(&self, tag: TypeTag) -> Option<CellValue> {
        if self.is_null() {
            return None;
        }
        match (self, tag) {
            (CellValue::Number(v), TypeTag::Numeric) => Some(CellValue::Number(*v)),
            (CellValue::Date(d), TypeTag::Date) => Some(CellValue::Date(*d)),
            (CellValue::Bool(b), TypeTag::Boolean) => Some(CellValue::Bool(*b)),
            (CellValue::Text(s), TypeTag::Numeric) => parse_number(s).map(CellValue::Number),
            (CellValue::Text(s), TypeTag::Date) => parse_date(s).map(CellValue::Date),
            (CellValue::Text(s), TypeTag::Boolean) => parse_bool(s).map(CellValue::Bool),
            (_, TypeTag::Text) => Some(CellValue::Text(self.to_string())),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self.coerce_to(TypeTag::Numeric) {
            Some(CellValue::Number(v)) => Some(v),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self.coerce_to(TypeTag::Date) {
            Some(CellValue::Date(d)) => Some(d),
            _ => None,
        }
    }

    /// Type carried by an already-typed value; raw text reports Text
    pub fn type_tag(&self) -> Option<TypeTag> {
        match self {
            CellValue::Number(_) => Some(TypeTag::Numeric),
            CellValue::Text(_) => Some(TypeTag::Text),
            CellValue::Bool(_) => Some(TypeTag::Boolean),
            CellValue::Date(_) => Some(TypeTag::Date),
            CellValue::Null => None,
        }
    }

    /// Ordering between two values of the same coerced type.
    /// Text compares case-insensitively; mixed variants are unordered.
    pub fn compare(&self, other: &CellValue) -> Option<Ordering> {
        match (self, other) {
            (CellValue::Number(a), CellValue::Number(b)) => a.partial_cmp(b),
            (CellValue::Date(a), CellValue::Date(b)) => Some(a.cmp(b)),
            (CellValue::Bool(a), CellValue::Bool(b)) => Some(a.cmp(b)),
            (CellValue::Text(a), CellValue::Text(b)) => Some(a.to_lowercase().cmp(&b.to_lowercase())),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Number(v) => write!(f, "{}", v),
            CellValue::Text(v) => write!(f, "{}", v),
            CellValue::Bool(v) => write!(f, "{}", v),
            CellValue::Date(v) => write!(f, "{}", v.format("%Y-%m-%d")),
            CellValue::Null => write!(f, ""),
        }
    }
}

impl std::hash::Hash for CellValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match self {
            CellValue::Number(v) => {
                0u8.hash(state);
                OrderedFloat(*v).hash(state);
            }
            CellValue::Text(v) => {
                1u8.hash(state);
                v.hash(state);
            }
            CellValue::Bool(v) => {
                2u8.hash(state);
                v.hash(state);
            }
            CellValue::Date(v) => {
                3u8.hash(state);
                v.hash(state);
            }
            CellValue::Null => {
                4u8.hash(state);
            }
        }
    }
}

// Floats compare through OrderedFloat so Eq stays lawful for NaN
impl PartialEq for CellValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (CellValue::Number(a), CellValue::Number(b)) => OrderedFloat(*a) == OrderedFloat(*b),
            (CellValue::Text(a), CellValue::Text(b)) => a == b,
            (CellValue::Bool(a), CellValue::Bool(b)) => a == b,
            (CellValue::Date(a), CellValue::Date(b)) => a == b,
            (CellValue::Null, CellValue::Null) => true,
            _ => false,
        }
    }
}

impl Eq for CellValue {}

impl From<f64> for CellValue {
    fn from(v: f64) -> Self {
        CellValue::Number(v)
    }
}

impl From<i64> for CellValue {
    fn from(v: i64) -> Self {
        CellValue::Number(v as f64)
    }
}

impl From<&str> for CellValue {
    fn from(v: &str) -> Self {
        CellValue::Text(v.to_string())
    }
}

impl From<bool> for CellValue {
    fn from(v: bool) -> Self {
        CellValue::Bool(v)
    }
}

impl From<NaiveDate> for CellValue {
    fn from(v: NaiveDate) -> Self {
        CellValue::Date(v)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(CellValue::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number_accepts_spreadsheet_formats() {
        assert_eq!(parse_number("1,200"), Some(1200.0));
        assert_eq!(parse_number(" $35.5 "), Some(35.5));
        assert_eq!(parse_number("-4"), Some(-4.0));
        assert_eq!(parse_number("NaN"), None);
        assert_eq!(parse_number("west"), None);
    }

    #[test]
    fn test_commas_only_between_thousands() {
        assert_eq!(parse_number("1,234,567.25"), Some(1_234_567.25));
        assert_eq!(parse_number("-12,000"), Some(-12_000.0));
        assert_eq!(parse_number("$1,500"), Some(1500.0));
        assert_eq!(parse_number("1,2,3"), None);
        assert_eq!(parse_number("12,34"), None);
        assert_eq!(parse_number("1234,567"), None);
        assert_eq!(parse_number(",100"), None);
        assert_eq!(parse_number("1.5,000"), None);
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        assert_eq!(parse_date("2024-03-15"), Some(expected));
        assert_eq!(parse_date("2024/03/15"), Some(expected));
        assert_eq!(parse_date("03/15/2024"), Some(expected));
        assert_eq!(parse_date("2024-03-15 10:30:00"), Some(expected));
        assert_eq!(parse_date("march 15 2024"), Some(expected));
        assert_eq!(parse_date("soon"), None);
    }

    #[test]
    fn test_bool_keywords_case_insensitive() {
        assert_eq!(parse_bool("YES"), Some(true));
        assert_eq!(parse_bool("False"), Some(false));
        assert_eq!(parse_bool("1"), None);
    }

    #[test]
    fn test_blank_text_is_null() {
        assert!(CellValue::from_raw("   ").is_null());
        assert!(CellValue::Text(String::new()).is_null());
        assert!(CellValue::Number(f64::NAN).is_null());
        assert!(!CellValue::from_raw("0").is_null());
    }

    #[test]
    fn test_coerce_raw_text() {
        let cell = CellValue::from_raw("1200");
        assert_eq!(cell.coerce_to(TypeTag::Numeric), Some(CellValue::Number(1200.0)));
        assert_eq!(cell.coerce_to(TypeTag::Boolean), None);
        assert_eq!(CellValue::Null.coerce_to(TypeTag::Text), None);
        assert_eq!(
            CellValue::Number(3.0).coerce_to(TypeTag::Text),
            Some(CellValue::Text("3".to_string()))
        );
    }

    #[test]
    fn test_text_compare_ignores_case() {
        let a = CellValue::from("West");
        let b = CellValue::from("west");
        assert_eq!(a.compare(&b), Some(Ordering::Equal));
        assert_eq!(CellValue::Number(1.0).compare(&CellValue::from("1")), None);
    }
}
