//! Enhanced type information produced by the inference engine

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::confidence::TypeConfidence;
use super::schema::DataType;

/// Value-shape signal detected independently of the primary type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TypePattern {
    Id,
    Uuid,
    Email,
    Url,
    IpAddress,
    Date,
    Datetime,
    Time,
    Phone,
    Currency,
    Percentage,
    CountryCode,
    Enum,
    Json,
}

impl TypePattern {
    pub fn as_str(&self) -> &'static str {
        match self {
            TypePattern::Id => "ID",
            TypePattern::Uuid => "UUID",
            TypePattern::Email => "EMAIL",
            TypePattern::Url => "URL",
            TypePattern::IpAddress => "IP_ADDRESS",
            TypePattern::Date => "DATE",
            TypePattern::Datetime => "DATETIME",
            TypePattern::Time => "TIME",
            TypePattern::Phone => "PHONE",
            TypePattern::Currency => "CURRENCY",
            TypePattern::Percentage => "PERCENTAGE",
            TypePattern::CountryCode => "COUNTRY_CODE",
            TypePattern::Enum => "ENUM",
            TypePattern::Json => "JSON",
        }
    }
}

impl fmt::Display for TypePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A competing type hypothesis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeAlternative {
    pub data_type: DataType,
    pub confidence: f64,
    #[serde(default)]
    pub reasons: Vec<String>,
}

/// Inferred type of a field, possibly nested for arrays and objects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancedTypeInfo {
    pub primary_type: DataType,
    #[serde(default)]
    pub secondary_types: Vec<DataType>,
    #[serde(default)]
    pub patterns: Vec<TypePattern>,
    pub confidence: TypeConfidence,
    #[serde(default)]
    pub possible_alternatives: Vec<TypeAlternative>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_type: Option<Box<EnhancedTypeInfo>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_type: Option<Box<EnhancedTypeInfo>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<Box<EnhancedTypeInfo>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, EnhancedTypeInfo>,
    #[serde(default)]
    pub is_nullable: bool,
    #[serde(default)]
    pub is_heterogeneous: bool,
}

impl EnhancedTypeInfo {
    pub fn new(primary_type: DataType) -> Self {
        Self {
            primary_type,
            secondary_types: Vec::new(),
            patterns: Vec::new(),
            confidence: TypeConfidence::default(),
            possible_alternatives: Vec::new(),
            item_type: None,
            key_type: None,
            value_type: None,
            properties: BTreeMap::new(),
            is_nullable: false,
            is_heterogeneous: false,
        }
    }

    pub fn has_pattern(&self, pattern: TypePattern) -> bool {
        self.patterns.contains(&pattern)
    }

    /// Add a pattern tag; returns false when it was already present
    pub fn add_pattern(&mut self, pattern: TypePattern) -> bool {
        if self.has_pattern(pattern) {
            return false;
        }
        self.patterns.push(pattern);
        true
    }

    pub fn add_secondary_type(&mut self, data_type: DataType) {
        if data_type != self.primary_type && !self.secondary_types.contains(&data_type) {
            self.secondary_types.push(data_type);
        }
    }

    /// Replace the primary type, keeping the previous one as a secondary type
    pub fn promote(&mut self, data_type: DataType) {
        if data_type == self.primary_type {
            return;
        }
        let previous = self.primary_type;
        self.primary_type = data_type;
        self.secondary_types.retain(|t| *t != data_type);
        if !matches!(previous, DataType::Unknown | DataType::Null) {
            self.add_secondary_type(previous);
        }
        self.possible_alternatives.retain(|a| a.data_type != data_type);
    }

    pub fn alternative(&self, data_type: DataType) -> Option<&TypeAlternative> {
        self.possible_alternatives
            .iter()
            .find(|a| a.data_type == data_type)
    }

    /// Depth of the nested type tree (1 for a leaf)
    pub fn depth(&self) -> usize {
        let children = self
            .item_type
            .iter()
            .chain(self.key_type.iter())
            .chain(self.value_type.iter())
            .map(|t| t.depth())
            .chain(self.properties.values().map(EnhancedTypeInfo::depth))
            .max()
            .unwrap_or(0);
        1 + children
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_promote_moves_previous_type() {
        let mut info = EnhancedTypeInfo::new(DataType::String);
        info.promote(DataType::Date);
        assert_eq!(info.primary_type, DataType::Date);
        assert_eq!(info.secondary_types, vec![DataType::String]);
    }

    #[test]
    fn test_pattern_serialization() {
        let json = serde_json::to_string(&TypePattern::IpAddress).unwrap();
        assert_eq!(json, "\"IP_ADDRESS\"");
    }

    #[test]
    fn test_depth() {
        let mut info = EnhancedTypeInfo::new(DataType::Array);
        let mut item = EnhancedTypeInfo::new(DataType::Object);
        item.properties
            .insert("a".into(), EnhancedTypeInfo::new(DataType::String));
        info.item_type = Some(Box::new(item));
        assert_eq!(info.depth(), 3);
    }
}
