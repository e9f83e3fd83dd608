//! Dimension references.
//!
//! Rules name the dimension their items come from. The five taxonomy
//! dimensions are closed variants; anything else refers to a custom
//! dimension registered on the [`WildcardRuleEngine`](crate::WildcardRuleEngine).

use serde::{Deserialize, Serialize};
use std::fmt;

/// A named, ordered collection of substitution values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DataSource {
    Regions,
    Prefectures,
    Cities,
    Services,
    Roles,
    /// A custom dimension, looked up by name at expansion time.
    Named(String),
}

impl DataSource {
    /// The taxonomy dimensions derived from a [`HierarchyModel`](crate::HierarchyModel).
    pub const STANDARD: [DataSource; 5] = [
        DataSource::Regions,
        DataSource::Prefectures,
        DataSource::Cities,
        DataSource::Services,
        DataSource::Roles,
    ];

    /// Parse a dimension name. Standard names are matched case-insensitively.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "regions" => DataSource::Regions,
            "prefectures" => DataSource::Prefectures,
            "cities" => DataSource::Cities,
            "services" => DataSource::Services,
            "roles" => DataSource::Roles,
            _ => DataSource::Named(name.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            DataSource::Regions => "regions",
            DataSource::Prefectures => "prefectures",
            DataSource::Cities => "cities",
            DataSource::Services => "services",
            DataSource::Roles => "roles",
            DataSource::Named(name) => name,
        }
    }

    pub fn is_standard(&self) -> bool {
        !matches!(self, DataSource::Named(_))
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for DataSource {
    fn from(name: String) -> Self {
        DataSource::parse(&name)
    }
}

impl From<&str> for DataSource {
    fn from(name: &str) -> Self {
        DataSource::parse(name)
    }
}

impl From<DataSource> for String {
    fn from(source: DataSource) -> Self {
        source.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_standard_names() {
        assert_eq!(DataSource::parse("prefectures"), DataSource::Prefectures);
        assert_eq!(DataSource::parse(" Roles "), DataSource::Roles);
    }

    #[test]
    fn test_parse_custom_name() {
        let source = DataSource::parse("tiers");
        assert_eq!(source, DataSource::Named("tiers".to_string()));
        assert!(!source.is_standard());
        assert_eq!(source.to_string(), "tiers");
    }

    #[test]
    fn test_serde_as_plain_string() {
        let json = serde_json::to_string(&DataSource::Cities).unwrap();
        assert_eq!(json, "\"cities\"");
        let parsed: DataSource = serde_json::from_str("\"datacenters\"").unwrap();
        assert_eq!(parsed, DataSource::Named("datacenters".to_string()));
    }
}
