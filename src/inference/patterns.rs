//! Value-shape detection for textual sample values

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::{DataType, TypePattern};

/// Detected shape of a single string value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValueFormat {
    /// UUID/GUID
    Uuid,
    /// ISO 8601 date-time (YYYY-MM-DDTHH:MM:SS)
    DateTime,
    /// ISO 8601 date (YYYY-MM-DD)
    Date,
    /// Time (HH:MM:SS)
    Time,
    Email,
    /// http(s)/ftp/file URL
    Url,
    Ipv4,
    Ipv6,
    /// Semantic version
    Semver,
    /// Phone number (E.164 or NANP style)
    Phone,
    /// Number followed by `%`
    Percentage,
    /// Amount prefixed with a currency symbol
    CurrencyAmount,
    /// ISO 3166-1 alpha-2 country code
    CountryCode,
    /// ISO 4217 currency code
    CurrencyCode,
    /// Embedded JSON object or array
    Json,
    Integer,
    Float,
    Boolean,
    Base64,
    Hostname,
    /// No specific format detected
    None,
}

impl ValueFormat {
    /// Type pattern signalled by this format
    pub fn pattern(&self) -> Option<TypePattern> {
        match self {
            ValueFormat::Uuid => Some(TypePattern::Uuid),
            ValueFormat::DateTime => Some(TypePattern::Datetime),
            ValueFormat::Date => Some(TypePattern::Date),
            ValueFormat::Time => Some(TypePattern::Time),
            ValueFormat::Email => Some(TypePattern::Email),
            ValueFormat::Url => Some(TypePattern::Url),
            ValueFormat::Ipv4 | ValueFormat::Ipv6 => Some(TypePattern::IpAddress),
            ValueFormat::Phone => Some(TypePattern::Phone),
            ValueFormat::Percentage => Some(TypePattern::Percentage),
            ValueFormat::CurrencyAmount | ValueFormat::CurrencyCode => Some(TypePattern::Currency),
            ValueFormat::CountryCode => Some(TypePattern::CountryCode),
            ValueFormat::Json => Some(TypePattern::Json),
            _ => None,
        }
    }

    /// Primary type a value of this format naturally has
    pub fn data_type(&self) -> DataType {
        match self {
            ValueFormat::Uuid => DataType::Uuid,
            ValueFormat::DateTime => DataType::DateTime,
            ValueFormat::Date => DataType::Date,
            ValueFormat::Integer => DataType::Integer,
            ValueFormat::Float => DataType::Float,
            ValueFormat::Boolean => DataType::Boolean,
            _ => DataType::String,
        }
    }

    /// Map a JSON Schema / OpenAPI `format` keyword
    pub fn from_format_keyword(keyword: &str) -> Option<ValueFormat> {
        match keyword.to_ascii_lowercase().as_str() {
            "uuid" | "guid" => Some(ValueFormat::Uuid),
            "date-time" | "datetime" | "timestamp" => Some(ValueFormat::DateTime),
            "date" => Some(ValueFormat::Date),
            "time" => Some(ValueFormat::Time),
            "email" | "idn-email" => Some(ValueFormat::Email),
            "uri" | "url" | "iri" | "uri-reference" => Some(ValueFormat::Url),
            "ipv4" => Some(ValueFormat::Ipv4),
            "ipv6" => Some(ValueFormat::Ipv6),
            "hostname" | "idn-hostname" => Some(ValueFormat::Hostname),
            "phone" => Some(ValueFormat::Phone),
            "byte" | "binary" | "base64" => Some(ValueFormat::Base64),
            "int32" | "int64" | "integer" => Some(ValueFormat::Integer),
            "float" | "double" | "decimal" => Some(ValueFormat::Float),
            _ => None,
        }
    }
}

impl std::fmt::Display for ValueFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ValueFormat::Uuid => "uuid",
            ValueFormat::DateTime => "date-time",
            ValueFormat::Date => "date",
            ValueFormat::Time => "time",
            ValueFormat::Email => "email",
            ValueFormat::Url => "url",
            ValueFormat::Ipv4 => "ipv4",
            ValueFormat::Ipv6 => "ipv6",
            ValueFormat::Semver => "semver",
            ValueFormat::Phone => "phone",
            ValueFormat::Percentage => "percentage",
            ValueFormat::CurrencyAmount => "currency-amount",
            ValueFormat::CountryCode => "country-code",
            ValueFormat::CurrencyCode => "currency-code",
            ValueFormat::Json => "json",
            ValueFormat::Integer => "integer",
            ValueFormat::Float => "float",
            ValueFormat::Boolean => "boolean",
            ValueFormat::Base64 => "base64",
            ValueFormat::Hostname => "hostname",
            ValueFormat::None => "none",
        };
        f.write_str(name)
    }
}

static DATE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());

static DATETIME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}(:\d{2}(\.\d+)?)?(Z|[+-]\d{2}:?\d{2})?$").unwrap()
});

static TIME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{2}:\d{2}:\d{2}(\.\d+)?$").unwrap());

static EMAIL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap());

static UUID_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .unwrap()
});

static URL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(https?|ftp|file)://[^\s/$.?#].[^\s]*$").unwrap());

static IPV4_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^((25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\.){3}(25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)$",
    )
    .unwrap()
});

static IPV6_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([0-9a-fA-F]{1,4}:){7}[0-9a-fA-F]{1,4}$|^::$|^([0-9a-fA-F]{1,4}:){1,7}:$|^([0-9a-fA-F]{1,4}:){1,6}(:[0-9a-fA-F]{1,4}){1,6}$")
        .unwrap()
});

static HOSTNAME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([a-zA-Z0-9]|[a-zA-Z0-9][a-zA-Z0-9\-]*[a-zA-Z0-9])(\.([a-zA-Z0-9]|[a-zA-Z0-9][a-zA-Z0-9\-]*[a-zA-Z0-9]))*$").unwrap()
});

static E164_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+[1-9]\d{7,14}$").unwrap());

static NANP_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\+1[ -])?\(?\d{3}\)?[ .-]\d{3}[ .-]\d{4}$").unwrap());

static BASE64_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9+/]+=*$").unwrap());

static COUNTRY_CODE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]{2}$").unwrap());

static CURRENCY_CODE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]{3}$").unwrap());

static CURRENCY_AMOUNT_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?[$€£¥]\s?\d{1,3}(,?\d{3})*(\.\d+)?$").unwrap());

static PERCENTAGE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?\d+(\.\d+)?\s?%$").unwrap());

static INTEGER_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[+-]?\d+$").unwrap());

static FLOAT_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?(\d+\.\d*|\.\d+|\d+)([eE][+-]?\d+)?$").unwrap());

static SEMVER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(0|[1-9]\d*)\.(0|[1-9]\d*)\.(0|[1-9]\d*)(-[a-zA-Z0-9]+(\.[a-zA-Z0-9]+)*)?(\+[a-zA-Z0-9]+(\.[a-zA-Z0-9]+)*)?$").unwrap()
});

/// Whether a string is a real calendar date in `YYYY-MM-DD` form
pub fn is_date(value: &str) -> bool {
    DATE_REGEX.is_match(value) && NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
}

/// Whether a string is an ISO 8601 date-time with valid components
pub fn is_datetime(value: &str) -> bool {
    if !DATETIME_REGEX.is_match(value) {
        return false;
    }
    if DateTime::parse_from_rfc3339(value).is_ok() {
        return true;
    }
    let normalized = value.replacen(' ', "T", 1);
    let trimmed = normalized.trim_end_matches('Z');
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"]
        .iter()
        .any(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).is_ok())
        || DateTime::parse_from_str(&normalized, "%Y-%m-%dT%H:%M:%S%z").is_ok()
}

pub fn is_time(value: &str) -> bool {
    TIME_REGEX.is_match(value) && NaiveTime::parse_from_str(value, "%H:%M:%S%.f").is_ok()
}

pub fn is_uuid(value: &str) -> bool {
    UUID_REGEX.is_match(value)
}

pub fn is_boolean(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "true" | "false" | "yes" | "no"
    )
}

/// Parse boolean text accepted by [`is_boolean`]
pub fn parse_boolean(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" => Some(true),
        "false" | "no" => Some(false),
        _ => None,
    }
}

pub fn is_integer(value: &str) -> bool {
    INTEGER_REGEX.is_match(value)
}

pub fn is_float(value: &str) -> bool {
    FLOAT_REGEX.is_match(value) && value.parse::<f64>().is_ok()
}

/// Detect the format of a string value
///
/// Returns the most specific format that matches the value.
/// Checks are ordered from most specific to least specific.
pub fn detect_value_format(value: &str) -> ValueFormat {
    let value = value.trim();
    if value.is_empty() {
        return ValueFormat::None;
    }

    if is_uuid(value) {
        return ValueFormat::Uuid;
    }
    // DateTime before Date (more specific)
    if is_datetime(value) {
        return ValueFormat::DateTime;
    }
    if is_date(value) {
        return ValueFormat::Date;
    }
    if is_time(value) {
        return ValueFormat::Time;
    }
    if EMAIL_REGEX.is_match(value) {
        return ValueFormat::Email;
    }
    if URL_REGEX.is_match(value) {
        return ValueFormat::Url;
    }
    if IPV4_REGEX.is_match(value) {
        return ValueFormat::Ipv4;
    }
    if IPV6_REGEX.is_match(value) {
        return ValueFormat::Ipv6;
    }
    if SEMVER_REGEX.is_match(value) {
        return ValueFormat::Semver;
    }
    if E164_REGEX.is_match(value) || NANP_REGEX.is_match(value) {
        return ValueFormat::Phone;
    }
    if is_boolean(value) {
        return ValueFormat::Boolean;
    }
    if is_integer(value) {
        return ValueFormat::Integer;
    }
    if is_float(value) {
        return ValueFormat::Float;
    }
    if PERCENTAGE_REGEX.is_match(value) {
        return ValueFormat::Percentage;
    }
    if CURRENCY_AMOUNT_REGEX.is_match(value) {
        return ValueFormat::CurrencyAmount;
    }
    // Country code (must be uppercase letters only)
    if COUNTRY_CODE_REGEX.is_match(value) {
        return ValueFormat::CountryCode;
    }
    if CURRENCY_CODE_REGEX.is_match(value) {
        return ValueFormat::CurrencyCode;
    }
    if (value.starts_with('{') && value.ends_with('}'))
        || (value.starts_with('[') && value.ends_with(']'))
    {
        if serde_json::from_str::<serde_json::Value>(value).is_ok() {
            return ValueFormat::Json;
        }
    }
    // Base64 (only if long enough and valid pattern)
    if value.len() >= 16 && value.len() % 4 == 0 && BASE64_REGEX.is_match(value) {
        return ValueFormat::Base64;
    }
    // Hostname (check after URL since URLs contain hostnames)
    if HOSTNAME_REGEX.is_match(value) && value.contains('.') {
        return ValueFormat::Hostname;
    }

    ValueFormat::None
}

/// Fraction of values that match a format
pub fn format_confidence(values: &[&str], format: ValueFormat) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    let matches = values
        .iter()
        .filter(|v| detect_value_format(v) == format)
        .count();

    matches as f64 / values.len() as f64
}
