use crate::apca::{ApcaPrimitives, LOOKUP_NON_CONTENT_ONLY, LOOKUP_PROHIBITED};
use crate::types::{ConformanceLevel, UseCase};

/// Lc steps searched, in ascending order, when deriving a base threshold from the font
/// lookup.
pub const APCA_LC_STEPS: [f64; 23] = [
    15.0, 20.0, 25.0, 30.0, 35.0, 40.0, 45.0, 50.0, 55.0, 60.0, 65.0, 70.0, 75.0, 80.0, 85.0,
    90.0, 95.0, 100.0, 105.0, 110.0, 115.0, 120.0, 125.0,
];

/// Ceiling applied to large body/fluent text.
pub const APCA_MAX_CONTRAST_LC: f64 = 90.0;

pub(crate) const LOOKUP_TABLE_NOTE: &str =
    "Font size/weight is below the minimums in the APCA lookup table for this use case.";

/// Bounds an element's measured contrast and size are judged against.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ThresholdResult {
    /// Minimum |Lc|; `None` when no lookup step qualifies or no rule applies.
    pub threshold: Option<f64>,
    /// Recommended |Lc| (bronze body text only). Informational.
    pub preferred: Option<f64>,
    /// Minimum font size in px (silver/gold only).
    pub min_font_size: Option<f64>,
    /// Maximum |Lc| for large text.
    pub max_contrast: Option<f64>,
    /// Why `threshold` is absent.
    pub note: Option<String>,
    /// No rule applies: the element must not be reported at all.
    pub skip: bool,
}

/// Clamps to 100..=900 and rounds to the nearest hundred; non-finite weights count as 400.
pub fn weight_bucket(weight: f64) -> u16 {
    let weight = if weight.is_finite() { weight } else { 400.0 };
    ((weight.clamp(100.0, 900.0) / 100.0).round() * 100.0) as u16
}

fn bronze_threshold(use_case: UseCase, font_size: f64) -> Option<(f64, Option<f64>)> {
    match use_case {
        UseCase::Body => Some((75.0, Some(90.0))),
        UseCase::Fluent => {
            if font_size > 32.0 {
                Some((45.0, None))
            } else if font_size >= 16.0 {
                Some((60.0, None))
            } else {
                Some((75.0, None))
            }
        }
        UseCase::SubFluent | UseCase::NonFluent => None,
    }
}

/// Minimum px for the level/use-case pair. Bronze and non-fluent have none.
pub fn min_font_size(level: ConformanceLevel, use_case: UseCase) -> Option<f64> {
    let gold = level == ConformanceLevel::Gold;
    match (level, use_case) {
        (ConformanceLevel::Bronze, _) | (_, UseCase::NonFluent) => None,
        (_, UseCase::SubFluent) => Some(if gold { 12.0 } else { 10.0 }),
        (_, UseCase::Body | UseCase::Fluent) => Some(if gold { 16.0 } else { 14.0 }),
    }
}

/// Contrast ceiling for large text. Bronze only caps heavy fluent text over 32px;
/// silver and gold cap body and fluent text over 36px.
pub fn max_contrast(
    level: ConformanceLevel,
    use_case: UseCase,
    font_size: f64,
    font_weight: f64,
) -> Option<f64> {
    let applies = match level {
        ConformanceLevel::Bronze => {
            use_case == UseCase::Fluent && font_size > 32.0 && font_weight >= 700.0
        }
        ConformanceLevel::Silver | ConformanceLevel::Gold => {
            matches!(use_case, UseCase::Body | UseCase::Fluent) && font_size > 36.0
        }
    };
    applies.then_some(APCA_MAX_CONTRAST_LC)
}

/// Lowest lookup step whose row allows `font_size` at this weight.
fn base_threshold_from_lookup(
    primitives: &dyn ApcaPrimitives,
    font_size: f64,
    font_weight: f64,
    allow_non_content: bool,
) -> Option<f64> {
    let column = (weight_bucket(font_weight) / 100) as usize;
    APCA_LC_STEPS.iter().copied().find(|step| {
        let required = primitives.font_lookup(*step)[column];
        if !required.is_finite() || required == LOOKUP_PROHIBITED {
            return false;
        }
        if required == LOOKUP_NON_CONTENT_ONLY {
            return allow_non_content;
        }
        font_size >= required
    })
}

/// Minimum, preferred and maximum contrast for one element.
pub fn apca_threshold(
    primitives: &dyn ApcaPrimitives,
    level: ConformanceLevel,
    use_case: UseCase,
    font_size: f64,
    font_weight: f64,
) -> ThresholdResult {
    if level == ConformanceLevel::Bronze {
        let Some((threshold, preferred)) = bronze_threshold(use_case, font_size) else {
            return ThresholdResult {
                skip: true,
                ..ThresholdResult::default()
            };
        };
        return ThresholdResult {
            threshold: Some(threshold),
            preferred,
            max_contrast: max_contrast(level, use_case, font_size, font_weight),
            ..ThresholdResult::default()
        };
    }

    let min_font_size = min_font_size(level, use_case);
    let allow_non_content = use_case == UseCase::NonFluent;
    let Some(base) = base_threshold_from_lookup(primitives, font_size, font_weight, allow_non_content)
    else {
        return ThresholdResult {
            min_font_size,
            note: Some(LOOKUP_TABLE_NOTE.to_string()),
            ..ThresholdResult::default()
        };
    };

    let silver = level == ConformanceLevel::Silver;
    let mut threshold = base;
    match use_case {
        UseCase::SubFluent => {
            threshold = (threshold - 15.0).max(if silver { 40.0 } else { 45.0 });
        }
        UseCase::NonFluent => {
            threshold = (threshold - if silver { 30.0 } else { 20.0 }).max(30.0);
        }
        UseCase::Body if !silver && threshold < 75.0 => threshold += 15.0,
        _ => {}
    }

    ThresholdResult {
        threshold: Some(threshold),
        min_font_size,
        max_contrast: max_contrast(level, use_case, font_size, font_weight),
        ..ThresholdResult::default()
    }
}
