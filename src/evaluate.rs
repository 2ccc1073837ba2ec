use crate::apca::{ApcaPrimitives, lc_between, wcag_contrast_ratio};
use crate::color::{effective_background, parse_color};
use crate::debug::DebugLogger;
use crate::error::LcAuditError;
use crate::html::{
    CompiledSelector, attr, class_list, closest_matches, compile_selectors, has_attr,
    has_direct_text, has_readable_text, has_text_element_descendant, is_aria_hidden,
    is_svg_element, is_text_tag, matches_any, selector_path,
};
use crate::options::ApcaOptions;
use crate::perf::PerfLogger;
use crate::style::{StyleSource, describe};
use crate::svg::{mask_image, resolve_foreground_candidates};
use crate::threshold::{ThresholdResult, apca_threshold};
use crate::types::{ConformanceLevel, Impact, Rgb, RuleId, UseCase};
use kuchiki::NodeRef;
use serde::Serialize;
use std::collections::HashSet;
use std::rc::Rc;

/// Built-in icon selectors, searched in this order.
pub(crate) const ICON_SELECTOR_LIST: [&str; 6] = [
    "svg",
    ".iconify",
    ".iconify-color",
    "[data-icon]",
    "[class*=\"icon-\"]",
    "[class*=\"icon_\"]",
];

/// WCAG 2.1 SC 1.4.11 minimum ratio for graphical objects.
pub const NON_TEXT_MIN_CONTRAST: f64 = 3.0;
/// Inline SVG larger than this is treated as an illustration, not an icon.
pub(crate) const MAX_ICON_DIMENSION: f64 = 128.0;
const DEFAULT_ICON_SIZE: f64 = 16.0;

const USE_CASE_ATTRIBUTES: [&str; 3] =
    ["data-apca-usecase", "data-apca-use-case", "data-apca-usage"];

const REASON_UNPARSEABLE_COLORS: &str = "icon colors could not be parsed";
const REASON_UNPARSEABLE_BACKGROUND: &str = "background color could not be parsed";

/// What a failing APCA check measured.
#[derive(Debug, Clone, PartialEq)]
pub enum Subject {
    Text {
        foreground: String,
    },
    Icon {
        /// The color that produced the lowest contrast.
        foreground: String,
        /// Every distinct paint color found on the icon.
        foregrounds: Vec<String>,
        /// Colors that parsed and were scored.
        color_count: usize,
        /// Highest |Lc| across the colors, used for the ceiling.
        peak_contrast: f64,
    },
}

#[derive(Debug, Clone)]
pub struct ApcaViolation {
    pub element: NodeRef,
    pub subject: Subject,
    pub background: String,
    /// |Lc|; the minimum across colors for icons.
    pub contrast: f64,
    /// Font size for text, rendered size for icons (px).
    pub font_size: f64,
    pub font_weight: f64,
    pub level: ConformanceLevel,
    pub use_case: UseCase,
    pub bounds: ThresholdResult,
    pub messages: Vec<String>,
}

impl ApcaViolation {
    pub fn is_icon(&self) -> bool {
        matches!(self.subject, Subject::Icon { .. })
    }

    pub fn color_count(&self) -> usize {
        match &self.subject {
            Subject::Text { .. } => 1,
            Subject::Icon { color_count, .. } => *color_count,
        }
    }

    pub fn peak_contrast(&self) -> f64 {
        match &self.subject {
            Subject::Text { .. } => self.contrast,
            Subject::Icon { peak_contrast, .. } => *peak_contrast,
        }
    }

    pub fn impact(&self) -> Impact {
        apca_impact(
            self.contrast,
            self.peak_contrast(),
            self.bounds.threshold,
            self.bounds.max_contrast,
        )
    }
}

#[derive(Debug, Clone)]
pub struct NonTextViolation {
    pub element: NodeRef,
    pub foregrounds: Vec<String>,
    pub background: String,
    /// Lowest WCAG ratio across the icon's colors.
    pub ratio: f64,
    pub color_count: usize,
}

impl NonTextViolation {
    pub fn impact(&self) -> Impact {
        non_text_impact(self.ratio)
    }

    pub fn message(&self) -> String {
        format!(
            "Non-text contrast ratio of {:.2}:1 is below the minimum {}:1 required for icons{}.",
            self.ratio,
            NON_TEXT_MIN_CONTRAST,
            color_suffix(self.color_count)
        )
    }
}

/// A check that could not be completed for one element and one rule.
#[derive(Debug, Clone)]
pub struct IncompleteRecord {
    pub element: NodeRef,
    pub reason: String,
    pub rule: RuleId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineWarning {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

/// Everything one run found, before conversion to results.
#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    pub violations: Vec<ApcaViolation>,
    pub non_text: Vec<NonTextViolation>,
    pub incompletes: Vec<IncompleteRecord>,
    /// Icons that passed the candidate filters, whether or not they failed.
    pub icon_targets: usize,
    pub text_elements: usize,
    pub warnings: Vec<EngineWarning>,
}

/// Optional sinks for one run.
#[derive(Clone, Copy, Default)]
pub(crate) struct Diagnostics<'a> {
    pub debug: Option<&'a DebugLogger>,
    pub perf: Option<&'a PerfLogger>,
    pub run_id: Option<usize>,
}

/// Severity from how far the measured |Lc| misses its bound. Serious when there is
/// neither a threshold nor a ceiling (the size alone is below every minimum).
pub fn apca_impact(
    contrast: f64,
    peak_contrast: f64,
    threshold: Option<f64>,
    max_contrast: Option<f64>,
) -> Impact {
    if threshold.is_none() && max_contrast.is_none() {
        return Impact::Serious;
    }
    let gap = match max_contrast {
        Some(max) if peak_contrast > max => peak_contrast - max,
        _ => threshold.unwrap_or(0.0) - contrast,
    };
    if gap > 30.0 {
        Impact::Critical
    } else if gap > 20.0 {
        Impact::Serious
    } else if gap > 10.0 {
        Impact::Moderate
    } else {
        Impact::Minor
    }
}

pub fn non_text_impact(ratio: f64) -> Impact {
    if ratio < 1.5 {
        Impact::Critical
    } else if ratio < 2.0 {
        Impact::Serious
    } else if ratio < 2.5 {
        Impact::Moderate
    } else {
        Impact::Minor
    }
}

fn color_suffix(color_count: usize) -> String {
    if color_count > 1 {
        format!(" (min across {color_count} icon colors)")
    } else {
        String::new()
    }
}

#[derive(Clone, Copy)]
enum Target {
    Text,
    Icon,
}

impl Target {
    fn label(self) -> &'static str {
        match self {
            Target::Text => "text",
            Target::Icon => "icon",
        }
    }

    fn size_label(self) -> &'static str {
        match self {
            Target::Text => "Font size",
            Target::Icon => "Icon size",
        }
    }
}

struct Measured {
    target: Target,
    level: ConformanceLevel,
    use_case: UseCase,
    contrast: f64,
    peak_contrast: f64,
    size: f64,
    color_count: usize,
}

fn apca_messages(bounds: &ThresholdResult, m: &Measured) -> Vec<String> {
    let label = m.target.label();
    let mut messages = Vec::new();
    match bounds.threshold {
        None => {
            if let Some(note) = &bounds.note {
                messages.push(note.clone());
            }
        }
        Some(threshold) => {
            if m.contrast < threshold {
                messages.push(format!(
                    "APCA contrast of {:.1} Lc is below the minimum of {} Lc for {} {} {}{}.",
                    m.contrast,
                    threshold,
                    m.level,
                    m.use_case,
                    label,
                    color_suffix(m.color_count)
                ));
            }
            if let Some(max) = bounds.max_contrast.filter(|max| m.peak_contrast > *max) {
                messages.push(format!(
                    "APCA contrast of {:.1} Lc exceeds the maximum of {} Lc for {} {} {} at {:.1}px.",
                    m.peak_contrast, max, m.level, m.use_case, label, m.size
                ));
            }
        }
    }
    if let Some(min) = bounds.min_font_size.filter(|min| m.size < *min) {
        messages.push(format!(
            "{} {:.1}px is below the minimum {}px for {} {} {}.",
            m.target.size_label(),
            m.size,
            min,
            m.level,
            m.use_case,
            label
        ));
    }
    messages
}

/// `parseFloat`-style read of the number a computed value starts with.
pub(crate) fn leading_number(value: &str) -> Option<f64> {
    let value = value.trim_start();
    let end = value
        .find(|c: char| !(c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E')))
        .unwrap_or(value.len());
    let prefix = &value[..end];
    (1..=prefix.len())
        .rev()
        .find_map(|len| prefix[..len].parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

fn use_case_for(element: &NodeRef, fallback: UseCase) -> UseCase {
    let value = USE_CASE_ATTRIBUTES.iter().find_map(|name| attr(element, name));
    UseCase::normalize(value.as_deref(), fallback)
}

fn hides_subtree(node: &NodeRef, styles: &dyn StyleSource) -> bool {
    let display_none = styles
        .computed(node, "display")
        .is_some_and(|d| d.trim().eq_ignore_ascii_case("none"));
    let transparent = styles
        .computed(node, "opacity")
        .and_then(|o| leading_number(&o))
        .is_some_and(|o| o <= 0.0);
    display_none || transparent
}

/// Not rendered: `visibility: hidden` on the element (it inherits), or `display: none` /
/// `opacity: 0` on the element or any ancestor.
pub fn is_visible(element: &NodeRef, styles: &dyn StyleSource) -> bool {
    let hidden = styles.computed(element, "visibility").is_some_and(|v| {
        let v = v.trim();
        v.eq_ignore_ascii_case("hidden") || v.eq_ignore_ascii_case("collapse")
    });
    !hidden
        && !element
            .inclusive_ancestors()
            .filter(|node| node.as_element().is_some())
            .any(|node| hides_subtree(&node, styles))
}

fn size_candidate(value: Option<String>) -> Option<f64> {
    value
        .and_then(|v| leading_number(&v))
        .filter(|v| v.is_finite() && *v > 0.0)
}

/// Largest of the rendered box, CSS width/height and font size; 16px when none is known.
pub(crate) fn icon_size(element: &NodeRef, styles: &dyn StyleSource) -> f64 {
    let rect = styles
        .box_size(element)
        .map(|(w, h)| w.max(h))
        .filter(|v| v.is_finite() && *v > 0.0);
    [
        rect,
        size_candidate(styles.computed(element, "width")),
        size_candidate(styles.computed(element, "height")),
        size_candidate(styles.computed(element, "font-size")),
    ]
    .into_iter()
    .flatten()
    .reduce(f64::max)
    .unwrap_or(DEFAULT_ICON_SIZE)
}

pub(crate) fn is_icon_candidate(element: &NodeRef, styles: &dyn StyleSource) -> bool {
    let classes = class_list(element);
    if classes.iter().any(|c| c == "iconify" || c == "iconify-color") {
        return true;
    }
    if has_attr(element, "data-icon") {
        return true;
    }
    let class_attr = attr(element, "class").unwrap_or_default().to_ascii_lowercase();
    if class_attr.contains("icon-") || class_attr.contains("icon_") {
        return true;
    }
    if is_svg_element(element) && icon_size(element, styles) <= MAX_ICON_DIMENSION {
        return true;
    }
    if mask_image(element, styles).is_some() {
        return true;
    }
    let mentions_svg = |property: &str| {
        styles
            .computed(element, property)
            .is_some_and(|value| value.contains("svg"))
    };
    mentions_svg("background-image") || mentions_svg("--svg")
}

fn node_key(node: &NodeRef) -> usize {
    Rc::as_ptr(&node.0) as usize
}

#[derive(Default)]
struct IconOutcome {
    incomplete: Option<String>,
    /// The APCA threshold has no verdict for this icon; only the non-text rule applies.
    apca_skipped: bool,
    apca: Option<ApcaViolation>,
    non_text: Option<NonTextViolation>,
}

struct Evaluator<'a> {
    styles: &'a dyn StyleSource,
    primitives: &'a dyn ApcaPrimitives,
    options: &'a ApcaOptions,
    exclude: Vec<CompiledSelector>,
    diagnostics: Diagnostics<'a>,
    out: Evaluation,
}

impl<'a> Evaluator<'a> {
    fn warn(&mut self, message: String, target: Option<String>) {
        if let Some(debug) = self.diagnostics.debug {
            debug.warning(&message, target.as_deref());
        }
        self.out.warnings.push(EngineWarning { message, target });
    }

    fn warn_element(&mut self, err: LcAuditError, element: &NodeRef) {
        self.warn(err.to_string(), Some(selector_path(element)));
    }

    fn is_excluded(&self, element: &NodeRef) -> bool {
        closest_matches(element, &self.exclude)
    }

    fn font_size(&self, element: &NodeRef) -> Result<f64, LcAuditError> {
        let raw = self.styles.computed(element, "font-size").unwrap_or_default();
        leading_number(&raw)
            .filter(|px| *px >= 0.0)
            .ok_or(LcAuditError::InvalidStyleValue {
                property: "font-size".to_string(),
                value: raw,
            })
    }

    fn font_weight(&self, element: &NodeRef) -> f64 {
        self.styles
            .computed(element, "font-weight")
            .and_then(|w| leading_number(&w))
            .map(f64::trunc)
            .filter(|w| *w != 0.0)
            .unwrap_or(400.0)
    }

    fn apca_magnitude(&self, foreground: Rgb, background: Rgb) -> Result<f64, LcAuditError> {
        let lc = lc_between(self.primitives, foreground, background).abs();
        if lc.is_finite() {
            Ok(lc)
        } else {
            Err(LcAuditError::NonFiniteContrast(format!(
                "{} on {}",
                foreground.to_css(),
                background.to_css()
            )))
        }
    }

    fn log_violation(&self, violation: &ApcaViolation) {
        if let Some(debug) = self.diagnostics.debug {
            let target = selector_path(&violation.element);
            let style = describe(self.styles, &violation.element);
            let contrast = format!("{:.1}", violation.contrast);
            debug.log_event(
                "apca.violation",
                &[
                    ("target", target.as_str()),
                    ("style", style.as_str()),
                    ("contrast", contrast.as_str()),
                ],
            );
        }
    }

    fn text_pass(&mut self, root: &NodeRef) {
        for element in root.descendants().filter(is_text_tag) {
            if self.is_excluded(&element)
                || is_aria_hidden(&element)
                || !is_visible(&element, self.styles)
                || !has_readable_text(&element)
            {
                continue;
            }
            // Wrappers are reported at the nested element that carries the text.
            if !has_direct_text(&element) && has_text_element_descendant(&element) {
                continue;
            }
            self.out.text_elements += 1;
            match self.evaluate_text(&element) {
                Ok(Some(violation)) => {
                    self.log_violation(&violation);
                    self.out.violations.push(violation);
                }
                Ok(None) => {}
                Err(err) => self.warn_element(err, &element),
            }
        }
    }

    fn evaluate_text(&self, element: &NodeRef) -> Result<Option<ApcaViolation>, LcAuditError> {
        let foreground = self.styles.computed(element, "color").unwrap_or_default();
        let background = effective_background(element, self.styles, false);
        let (Some(fg), Some(bg)) = (parse_color(&foreground), parse_color(&background)) else {
            return Ok(None);
        };
        let font_size = self.font_size(element)?;
        let font_weight = self.font_weight(element);
        let contrast = self.apca_magnitude(fg, bg)?;
        let level = self.options.level;
        let use_case = use_case_for(element, self.options.use_case);
        let bounds = apca_threshold(self.primitives, level, use_case, font_size, font_weight);
        if bounds.skip {
            return Ok(None);
        }
        let messages = apca_messages(
            &bounds,
            &Measured {
                target: Target::Text,
                level,
                use_case,
                contrast,
                peak_contrast: contrast,
                size: font_size,
                color_count: 1,
            },
        );
        if messages.is_empty() {
            return Ok(None);
        }
        Ok(Some(ApcaViolation {
            element: element.clone(),
            subject: Subject::Text { foreground },
            background,
            contrast,
            font_size,
            font_weight,
            level,
            use_case,
            bounds,
            messages,
        }))
    }

    fn gather_icons(&mut self, root: &NodeRef, custom: &[CompiledSelector]) -> Vec<NodeRef> {
        let (builtin, _) = compile_selectors(&ICON_SELECTOR_LIST.map(String::from));
        let mut seen = HashSet::new();
        let mut icons = Vec::new();
        for selector in builtin.iter().chain(custom.iter()) {
            for node in root.descendants() {
                if matches_any(&node, std::slice::from_ref(selector)) && seen.insert(node_key(&node))
                {
                    icons.push(node);
                }
            }
        }
        icons
    }

    fn icon_pass(&mut self, root: &NodeRef) {
        let (custom, invalid) = compile_selectors(&self.options.icon_selectors);
        for selector in invalid {
            self.warn(format!("invalid icon selector ignored: {selector}"), None);
        }
        for element in self.gather_icons(root, &custom) {
            if self.is_excluded(&element) || !is_visible(&element, self.styles) {
                continue;
            }
            if !matches_any(&element, &custom) && !is_icon_candidate(&element, self.styles) {
                continue;
            }
            self.out.icon_targets += 1;
            match self.evaluate_icon(&element) {
                Ok(outcome) => {
                    if let Some(reason) = outcome.incomplete {
                        let rules: &[RuleId] = if outcome.apca_skipped {
                            &[RuleId::NonTextContrast]
                        } else {
                            &[RuleId::ApcaContrast, RuleId::NonTextContrast]
                        };
                        for &rule in rules {
                            self.out.incompletes.push(IncompleteRecord {
                                element: element.clone(),
                                reason: reason.clone(),
                                rule,
                            });
                        }
                    }
                    if let Some(violation) = outcome.apca {
                        self.log_violation(&violation);
                        self.out.violations.push(violation);
                    }
                    if let Some(violation) = outcome.non_text {
                        self.out.non_text.push(violation);
                    }
                }
                Err(err) => self.warn_element(err, &element),
            }
        }
    }

    fn evaluate_icon(&self, element: &NodeRef) -> Result<IconOutcome, LcAuditError> {
        let mut outcome = IconOutcome::default();
        let size = icon_size(element, self.styles);
        let weight = self.font_weight(element);
        let level = self.options.level;
        let use_case = use_case_for(element, self.options.use_case);
        let bounds = apca_threshold(self.primitives, level, use_case, size, weight);
        outcome.apca_skipped = bounds.skip;

        let is_mask = mask_image(element, self.styles).is_some();
        let mut paint = resolve_foreground_candidates(element, self.styles);
        let parsed: Vec<(String, Rgb)> = paint
            .colors
            .iter()
            .filter_map(|color| parse_color(color).map(|rgb| (color.clone(), rgb)))
            .collect();
        if parsed.len() < paint.colors.len() {
            paint.unresolved.push(REASON_UNPARSEABLE_COLORS.to_string());
        }

        let background = effective_background(element, self.styles, is_mask);
        let bg = parse_color(&background);
        if bg.is_none() {
            paint.unresolved.push(REASON_UNPARSEABLE_BACKGROUND.to_string());
        }

        if !paint.unresolved.is_empty() {
            let mut reasons: Vec<&str> = Vec::new();
            for reason in &paint.unresolved {
                if !reasons.contains(&reason.as_str()) {
                    reasons.push(reason);
                }
            }
            outcome.incomplete = Some(format!(
                "Warning: Unable to compute icon contrast because {}.",
                reasons.join("; ")
            ));
        }

        let Some(bg) = bg else {
            return Ok(outcome);
        };
        if parsed.is_empty() {
            return Ok(outcome);
        }

        let contrasts = parsed
            .iter()
            .map(|(_, rgb)| self.apca_magnitude(*rgb, bg))
            .collect::<Result<Vec<f64>, _>>()?;
        let (worst, contrast) = contrasts
            .iter()
            .copied()
            .enumerate()
            .fold((0, f64::INFINITY), |best, (idx, value)| {
                if value < best.1 { (idx, value) } else { best }
            });
        let peak_contrast = contrasts.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        if !bounds.skip {
            let messages = apca_messages(
                &bounds,
                &Measured {
                    target: Target::Icon,
                    level,
                    use_case,
                    contrast,
                    peak_contrast,
                    size,
                    color_count: parsed.len(),
                },
            );
            if !messages.is_empty() {
                outcome.apca = Some(ApcaViolation {
                    element: element.clone(),
                    subject: Subject::Icon {
                        foreground: parsed[worst].0.clone(),
                        foregrounds: paint.colors.clone(),
                        color_count: parsed.len(),
                        peak_contrast,
                    },
                    background: background.clone(),
                    contrast,
                    font_size: size,
                    font_weight: weight,
                    level,
                    use_case,
                    bounds,
                    messages,
                });
            }
        }

        let ratio = parsed
            .iter()
            .map(|(_, rgb)| wcag_contrast_ratio(*rgb, bg))
            .fold(f64::INFINITY, f64::min);
        if ratio < NON_TEXT_MIN_CONTRAST {
            outcome.non_text = Some(NonTextViolation {
                element: element.clone(),
                foregrounds: paint.colors,
                background,
                ratio,
                color_count: parsed.len(),
            });
        }
        Ok(outcome)
    }
}

/// Runs the text and icon passes over the descendants of `root`.
///
/// Never fails: invalid selectors and per-element calculation errors become warnings and
/// the traversal continues.
pub(crate) fn evaluate(
    root: &NodeRef,
    styles: &dyn StyleSource,
    primitives: &dyn ApcaPrimitives,
    options: &ApcaOptions,
    exclude: &[String],
    diagnostics: Diagnostics<'_>,
) -> Evaluation {
    let (exclude, invalid_exclude) = compile_selectors(exclude);
    let mut evaluator = Evaluator {
        styles,
        primitives,
        options,
        exclude,
        diagnostics,
        out: Evaluation::default(),
    };
    for selector in invalid_exclude {
        evaluator.warn(format!("invalid exclude selector ignored: {selector}"), None);
    }

    let run_id = diagnostics.run_id;
    match diagnostics.perf {
        Some(perf) => {
            perf.time("check.text", run_id, || evaluator.text_pass(root));
            perf.time("check.icons", run_id, || evaluator.icon_pass(root));
        }
        None => {
            evaluator.text_pass(root);
            evaluator.icon_pass(root);
        }
    }

    let out = evaluator.out;
    if let Some(perf) = diagnostics.perf {
        perf.log_counts(
            "check",
            run_id,
            &[
                ("text_elements", out.text_elements as u64),
                ("icon_targets", out.icon_targets as u64),
                ("apca_violations", out.violations.len() as u64),
                ("non_text_violations", out.non_text.len() as u64),
                ("incompletes", out.incompletes.len() as u64),
                ("warnings", out.warnings.len() as u64),
            ],
        );
    }
    if let Some(debug) = diagnostics.debug {
        debug.increment("check.text_elements", out.text_elements as u64);
        debug.increment("check.icon_targets", out.icon_targets as u64);
        debug.increment("check.apca_violations", out.violations.len() as u64);
        debug.increment("check.incompletes", out.incompletes.len() as u64);
        debug.emit_summary("check");
    }
    out
}
