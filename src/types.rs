use crate::error::LcAuditError;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Opaque 8-bit sRGB color. Alpha is resolved away before a value of this type exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_css(self) -> String {
        format!("rgb({}, {}, {})", self.r, self.g, self.b)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConformanceLevel {
    #[default]
    Bronze,
    Silver,
    Gold,
}

impl ConformanceLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            ConformanceLevel::Bronze => "bronze",
            ConformanceLevel::Silver => "silver",
            ConformanceLevel::Gold => "gold",
        }
    }
}

impl fmt::Display for ConformanceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConformanceLevel {
    type Err = LcAuditError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "bronze" => Ok(ConformanceLevel::Bronze),
            "silver" => Ok(ConformanceLevel::Silver),
            "gold" => Ok(ConformanceLevel::Gold),
            other => Err(LcAuditError::InvalidConfiguration(format!(
                "unknown conformance level {other:?} (expected bronze, silver or gold)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum UseCase {
    #[default]
    Body,
    Fluent,
    SubFluent,
    NonFluent,
}

impl UseCase {
    pub fn as_str(self) -> &'static str {
        match self {
            UseCase::Body => "body",
            UseCase::Fluent => "fluent",
            UseCase::SubFluent => "sub-fluent",
            UseCase::NonFluent => "non-fluent",
        }
    }

    // Lenient reading used for per-element data attributes: "Sub Fluent", "logo",
    // "incidental", "spot-text" and similar author spellings all map somewhere.
    pub fn normalize(value: Option<&str>, fallback: UseCase) -> UseCase {
        let Some(value) = value else {
            return fallback;
        };
        let normalized = value
            .trim()
            .to_ascii_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("-");
        if normalized.is_empty() {
            return fallback;
        }
        if normalized.contains("body") {
            return UseCase::Body;
        }
        if normalized.contains("sub") || normalized.contains("logo") {
            return UseCase::SubFluent;
        }
        if normalized.contains("non")
            || normalized.contains("incidental")
            || normalized.contains("spot")
        {
            return UseCase::NonFluent;
        }
        if normalized.contains("fluent") {
            return UseCase::Fluent;
        }
        fallback
    }
}

impl fmt::Display for UseCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UseCase {
    type Err = LcAuditError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value
            .trim()
            .to_ascii_lowercase()
            .replace([' ', '_'], "-");
        match normalized.as_str() {
            "body" => Ok(UseCase::Body),
            "fluent" => Ok(UseCase::Fluent),
            "sub-fluent" | "subfluent" => Ok(UseCase::SubFluent),
            "non-fluent" | "nonfluent" => Ok(UseCase::NonFluent),
            other => Err(LcAuditError::InvalidConfiguration(format!(
                "unknown use case {other:?} (expected body, fluent, sub-fluent or non-fluent)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Minor,
    Moderate,
    Serious,
    Critical,
}

impl Impact {
    pub fn as_str(self) -> &'static str {
        match self {
            Impact::Minor => "minor",
            Impact::Moderate => "moderate",
            Impact::Serious => "serious",
            Impact::Critical => "critical",
        }
    }
}

impl fmt::Display for Impact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleId {
    ApcaContrast,
    NonTextContrast,
}

impl RuleId {
    pub fn as_str(self) -> &'static str {
        match self {
            RuleId::ApcaContrast => lcaudit_rule_contract::APCA_CONTRAST_ID,
            RuleId::NonTextContrast => lcaudit_rule_contract::NON_TEXT_CONTRAST_ID,
        }
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn use_case_normalization_accepts_author_spellings() {
        assert_eq!(UseCase::normalize(Some("Body Text"), UseCase::Fluent), UseCase::Body);
        assert_eq!(UseCase::normalize(Some("logo"), UseCase::Body), UseCase::SubFluent);
        assert_eq!(UseCase::normalize(Some("sub fluent"), UseCase::Body), UseCase::SubFluent);
        assert_eq!(UseCase::normalize(Some("spot"), UseCase::Body), UseCase::NonFluent);
        assert_eq!(UseCase::normalize(Some("non-fluent"), UseCase::Body), UseCase::NonFluent);
        assert_eq!(UseCase::normalize(Some("fluent"), UseCase::Body), UseCase::Fluent);
        assert_eq!(UseCase::normalize(Some("banner"), UseCase::Fluent), UseCase::Fluent);
        assert_eq!(UseCase::normalize(None, UseCase::SubFluent), UseCase::SubFluent);
    }

    #[test]
    fn strict_parsing_rejects_unknown_values() {
        assert_eq!("Gold".parse::<ConformanceLevel>().ok(), Some(ConformanceLevel::Gold));
        assert!("platinum".parse::<ConformanceLevel>().is_err());
        assert_eq!("sub_fluent".parse::<UseCase>().ok(), Some(UseCase::SubFluent));
        assert!("logo".parse::<UseCase>().is_err());
    }

    #[test]
    fn impact_orders_by_severity() {
        assert!(Impact::Critical > Impact::Serious);
        assert!(Impact::Moderate > Impact::Minor);
        assert_eq!(
            [Impact::Minor, Impact::Critical, Impact::Moderate].iter().max(),
            Some(&Impact::Critical)
        );
    }
}
