use crate::error::LcAuditError;
use crate::types::{ConformanceLevel, UseCase};

pub const ENV_LEVEL: &str = "LCAUDIT_LEVEL";
pub const ENV_USE_CASE: &str = "LCAUDIT_USE_CASE";
pub const ENV_ICON_SELECTORS: &str = "LCAUDIT_ICON_SELECTORS";
pub const ENV_EXCLUDE: &str = "LCAUDIT_EXCLUDE";
pub const ENV_DEBUG_LOG: &str = "LCAUDIT_DEBUG_LOG";
pub const ENV_PERF_LOG: &str = "LCAUDIT_PERF_LOG";

/// Policy inputs for one check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApcaOptions {
    pub level: ConformanceLevel,
    /// Applies to every element without its own `data-apca-usecase`.
    pub use_case: UseCase,
    /// Extra icon selectors. Elements matching one of these skip the icon heuristics.
    pub icon_selectors: Vec<String>,
}

impl ApcaOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(mut self, level: ConformanceLevel) -> Self {
        self.level = level;
        self
    }

    pub fn use_case(mut self, use_case: UseCase) -> Self {
        self.use_case = use_case;
        self
    }

    pub fn icon_selectors<I, S>(mut self, selectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.icon_selectors = normalize_selectors(selectors);
        self
    }

    /// Comma-separated form, as accepted from env and the Python binding.
    pub fn icon_selector_list(mut self, value: &str) -> Self {
        self.icon_selectors = normalize_selector_list(value);
        self
    }

    /// Applies `LCAUDIT_LEVEL`, `LCAUDIT_USE_CASE` and `LCAUDIT_ICON_SELECTORS` read
    /// through `lookup`.
    pub(crate) fn with_overrides_from(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, LcAuditError> {
        let read = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        if let Some(level) = read(ENV_LEVEL) {
            self.level = level.parse()?;
        }
        if let Some(use_case) = read(ENV_USE_CASE) {
            self.use_case = use_case.parse()?;
        }
        if let Some(selectors) = read(ENV_ICON_SELECTORS) {
            self = self.icon_selector_list(&selectors);
        }
        Ok(self)
    }
}

/// Trims entries and drops empty ones.
pub fn normalize_selectors<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    values
        .into_iter()
        .map(|value| value.as_ref().trim().to_string())
        .filter(|value| !value.is_empty())
        .collect()
}

/// Splits a comma-separated selector string. Commas inside functional pseudo-classes are
/// not special-cased; pass a list when that matters.
pub fn normalize_selector_list(value: &str) -> Vec<String> {
    normalize_selectors(value.split(','))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_are_bronze_body_without_selectors() {
        let options = ApcaOptions::default();
        assert_eq!(options.level, ConformanceLevel::Bronze);
        assert_eq!(options.use_case, UseCase::Body);
        assert!(options.icon_selectors.is_empty());
    }

    #[test]
    fn selector_lists_are_trimmed() {
        assert_eq!(
            normalize_selector_list(" .logo svg, ,[data-glyph] "),
            vec![".logo svg".to_string(), "[data-glyph]".to_string()]
        );
        let options = ApcaOptions::new().icon_selectors(["  .a ", ""]);
        assert_eq!(options.icon_selectors, vec![".a".to_string()]);
        let listed = ApcaOptions::new().icon_selector_list(".a, .b svg,");
        assert_eq!(listed.icon_selectors, vec![".a".to_string(), ".b svg".to_string()]);
    }

    #[test]
    fn overrides_replace_configured_values() {
        let options = ApcaOptions::new()
            .with_overrides_from(env(&[
                (ENV_LEVEL, "silver"),
                (ENV_USE_CASE, " fluent "),
                (ENV_ICON_SELECTORS, ".brand, .glyph"),
            ]))
            .expect("valid overrides");
        assert_eq!(options.level, ConformanceLevel::Silver);
        assert_eq!(options.use_case, UseCase::Fluent);
        assert_eq!(options.icon_selectors.len(), 2);
    }

    #[test]
    fn blank_overrides_are_ignored_and_bad_ones_rejected() {
        let kept = ApcaOptions::new()
            .level(ConformanceLevel::Gold)
            .with_overrides_from(env(&[(ENV_LEVEL, "  ")]))
            .expect("blank is ignored");
        assert_eq!(kept.level, ConformanceLevel::Gold);

        let err = ApcaOptions::new()
            .with_overrides_from(env(&[(ENV_LEVEL, "platinum")]))
            .expect_err("unknown level");
        assert!(matches!(err, LcAuditError::InvalidConfiguration(_)));
    }
}
