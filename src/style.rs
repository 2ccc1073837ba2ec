use crate::color::{TRANSPARENT, canonical_color};
use crate::debug::DebugLogger;
use crate::html::{attr, is_svg_element, tag_name};
use kuchiki::{NodeRef, Selectors, Specificity};
use lightningcss::properties::Property;
use lightningcss::rules::{CssRule, CssRuleList};
use lightningcss::stylesheet::{ParserOptions, PrinterOptions, StyleAttribute, StyleSheet};
use lightningcss::traits::ToCss;
use std::collections::HashMap;
use std::rc::Rc;

/// Read access to the styles an element is rendered with.
///
/// Values use computed-style serialization: colors as `rgb(r, g, b)` / `rgba(r, g, b, a)`,
/// lengths in `px`, weights as integers. Unknown elements or properties yield `None`.
pub trait StyleSource {
    fn computed(&self, element: &NodeRef, property: &str) -> Option<String>;

    /// Rendered box `(width, height)` in px, when known.
    fn box_size(&self, _element: &NodeRef) -> Option<(f64, f64)> {
        None
    }
}

const DEFAULT_FONT_PX: f64 = 16.0;
const MAX_VAR_DEPTH: usize = 16;

const SHORTHANDS: [&str; 3] = ["background", "font", "mask"];
const SVG_PRESENTATION_ATTRIBUTES: [&str; 6] =
    ["fill", "stroke", "color", "opacity", "visibility", "display"];

fn default_ua_css() -> &'static str {
    r#"
    html, body, div, p, section, article, header, footer, aside, nav, main, blockquote,
    h1, h2, h3, h4, h5, h6, ul, ol, dl, dt, dd, form, fieldset, figure, figcaption,
    pre, hr, address, details, summary { display: block; }
    head, script, style, title, meta, link, template, noscript, base { display: none; }
    [hidden] { display: none; }
    li { display: list-item; }
    table { display: table; }
    tr { display: table-row; }
    td, th { display: table-cell; }
    svg, img, button, input, textarea, select { display: inline-block; }
    h1 { font-size: 2em; font-weight: bold; }
    h2 { font-size: 1.5em; font-weight: bold; }
    h3 { font-size: 1.17em; font-weight: bold; }
    h4 { font-size: 1em; font-weight: bold; }
    h5 { font-size: 0.83em; font-weight: bold; }
    h6 { font-size: 0.67em; font-weight: bold; }
    b, strong, th { font-weight: bold; }
    small { font-size: smaller; }
    button, input, textarea, select { font-size: 13.3333px; }
    "#
}

#[derive(Debug, Clone)]
struct Declaration {
    name: String,
    value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Origin {
    UserAgent,
    Presentation,
    Author,
    Inline,
    AuthorImportant,
    InlineImportant,
}

struct RuleEntry {
    selectors: Selectors,
    user_agent: bool,
    order: usize,
    normal: Vec<Declaration>,
    important: Vec<Declaration>,
}

#[derive(Debug, Clone, Default)]
struct ComputedStyle {
    values: HashMap<String, String>,
    customs: HashMap<String, String>,
    font_px: f64,
    weight: f64,
}

/// Computed styles for every element of a parsed document, resolved once up front from
/// a user-agent sheet, `<style>` blocks, SVG presentation attributes and inline styles.
pub struct StyleSnapshot {
    styles: HashMap<usize, ComputedStyle>,
    root_font_px: f64,
    // Keeps every node alive so pointer keys stay unique.
    _document: NodeRef,
}

fn node_key(node: &NodeRef) -> usize {
    Rc::as_ptr(&node.0) as usize
}

impl StyleSnapshot {
    pub fn from_document(document: &NodeRef) -> Self {
        Self::build(document, "", None)
    }

    /// Like [`StyleSnapshot::from_document`], with `extra_css` applied after the
    /// document's own `<style>` blocks.
    pub fn with_css(document: &NodeRef, extra_css: &str) -> Self {
        Self::build(document, extra_css, None)
    }

    pub(crate) fn build(document: &NodeRef, extra_css: &str, debug: Option<&DebugLogger>) -> Self {
        let top = document
            .inclusive_ancestors()
            .last()
            .unwrap_or_else(|| document.clone());

        let mut rules = Vec::new();
        let mut order = 0usize;
        collect_sheet(default_ua_css(), true, &mut rules, &mut order, debug);
        if let Ok(blocks) = top.select("style") {
            for block in blocks {
                let media = attr(block.as_node(), "media").unwrap_or_default();
                if !media_applies(&media) {
                    continue;
                }
                let css = block.as_node().text_contents();
                collect_sheet(&css, false, &mut rules, &mut order, debug);
            }
        }
        if !extra_css.trim().is_empty() {
            collect_sheet(extra_css, false, &mut rules, &mut order, debug);
        }
        if let Some(logger) = debug {
            logger.increment("css.rules", rules.len() as u64);
        }

        let mut snapshot = Self {
            styles: HashMap::new(),
            root_font_px: DEFAULT_FONT_PX,
            _document: top.clone(),
        };
        snapshot.compute_node(&top, None, &rules, debug);
        snapshot
    }

    fn compute_node(
        &mut self,
        node: &NodeRef,
        parent: Option<&ComputedStyle>,
        rules: &[RuleEntry],
        debug: Option<&DebugLogger>,
    ) {
        if node.as_element().is_none() {
            for child in node.children() {
                self.compute_node(&child, parent, rules, debug);
            }
            return;
        }
        let style = self.compute_element(node, parent, rules, debug);
        if parent.is_none() {
            self.root_font_px = style.font_px;
        }
        for child in node.children() {
            self.compute_node(&child, Some(&style), rules, debug);
        }
        self.styles.insert(node_key(node), style);
    }

    fn compute_element(
        &self,
        node: &NodeRef,
        parent: Option<&ComputedStyle>,
        rules: &[RuleEntry],
        debug: Option<&DebugLogger>,
    ) -> ComputedStyle {
        let declarations = cascade(node, rules, debug);

        let mut customs = parent.map(|p| p.customs.clone()).unwrap_or_default();
        for decl in declarations.iter().filter(|d| d.name.starts_with("--")) {
            let value = substitute_vars(&decl.value, &customs, 0);
            customs.insert(decl.name.clone(), value);
        }

        let mut specified: HashMap<String, String> = HashMap::new();
        for decl in declarations.iter().filter(|d| !d.name.starts_with("--")) {
            let value = substitute_vars(&decl.value, &customs, 0);
            if SHORTHANDS.contains(&decl.name.as_str()) {
                for longhand in expand_shorthand(&decl.name, &value) {
                    specified.insert(longhand.name, longhand.value);
                }
            } else {
                specified.insert(decl.name.clone(), value);
            }
        }

        let root_px = if parent.is_none() {
            DEFAULT_FONT_PX
        } else {
            self.root_font_px
        };
        resolve_computed(&specified, customs, parent, root_px)
    }

    fn style(&self, element: &NodeRef) -> Option<&ComputedStyle> {
        self.styles.get(&node_key(element))
    }
}

impl StyleSource for StyleSnapshot {
    fn computed(&self, element: &NodeRef, property: &str) -> Option<String> {
        let style = self.style(element)?;
        let property = property.trim();
        let key = if property.starts_with("--") {
            property.to_string()
        } else {
            property.to_ascii_lowercase()
        };
        if key.starts_with("--") {
            return style.customs.get(&key).cloned();
        }
        if let Some(value) = style.values.get(&key) {
            return Some(value.clone());
        }
        let aliased = match key.as_str() {
            "-webkit-mask-image" => style.values.get("mask-image"),
            "mask-image" => style.values.get("-webkit-mask-image"),
            _ => None,
        };
        if let Some(value) = aliased {
            return Some(value.clone());
        }
        initial_value(&key).map(|v| v.to_string())
    }

    fn box_size(&self, element: &NodeRef) -> Option<(f64, f64)> {
        let style = self.style(element)?;
        let dimension = |name: &str| {
            style
                .values
                .get(name)
                .and_then(|v| px_value(v))
                .or_else(|| {
                    attr(element, name).and_then(|raw| {
                        let raw = raw.trim();
                        raw.parse::<f64>().ok().or_else(|| {
                            parse_length_px(raw, style.font_px, self.root_font_px, None)
                        })
                    })
                })
                .filter(|v| v.is_finite() && *v >= 0.0)
        };
        match (dimension("width"), dimension("height")) {
            (None, None) => None,
            (width, height) => Some((width.unwrap_or(0.0), height.unwrap_or(0.0))),
        }
    }
}

fn initial_value(property: &str) -> Option<&'static str> {
    Some(match property {
        "background-color" => TRANSPARENT,
        "background-image" | "mask-image" | "-webkit-mask-image" => "none",
        "display" => "inline",
        "opacity" => "1",
        "visibility" => "visible",
        "fill" => "rgb(0, 0, 0)",
        "stroke" => "none",
        "width" | "height" => "auto",
        _ => return None,
    })
}

fn media_applies(media: &str) -> bool {
    let lower = media.trim().to_ascii_lowercase();
    if lower.is_empty() {
        return true;
    }
    !(lower.contains("print") && !lower.contains("screen") && !lower.contains("all"))
}

fn collect_sheet(
    css: &str,
    user_agent: bool,
    rules: &mut Vec<RuleEntry>,
    order: &mut usize,
    debug: Option<&DebugLogger>,
) {
    let options = ParserOptions {
        error_recovery: true,
        ..ParserOptions::default()
    };
    match StyleSheet::parse(css, options) {
        Ok(sheet) => append_rule_list(&sheet.rules, user_agent, rules, order, debug),
        Err(err) => {
            if let Some(logger) = debug {
                logger.increment("css.sheet_unparsed", 1);
                logger.log_event("css.sheet_error", &[("error", &err.to_string())]);
            }
        }
    }
}

fn append_rule_list(
    list: &CssRuleList,
    user_agent: bool,
    rules: &mut Vec<RuleEntry>,
    order: &mut usize,
    debug: Option<&DebugLogger>,
) {
    for rule in &list.0 {
        match rule {
            CssRule::Style(style) => {
                let selector_text = style
                    .selectors
                    .to_css_string(PrinterOptions::default())
                    .unwrap_or_default();
                let Ok(selectors) = Selectors::compile(&selector_text) else {
                    if let Some(logger) = debug {
                        logger.increment("css.selector_unsupported", 1);
                        logger.log_event("css.selector_unsupported", &[("selector", selector_text.as_str())]);
                    }
                    continue;
                };
                let normal = declarations_from(&style.declarations.declarations);
                let important = declarations_from(&style.declarations.important_declarations);
                if !normal.is_empty() || !important.is_empty() {
                    rules.push(RuleEntry {
                        selectors,
                        user_agent,
                        order: *order,
                        normal,
                        important,
                    });
                }
                *order += 1;
            }
            CssRule::Media(media) => {
                let query = media
                    .query
                    .to_css_string(PrinterOptions::default())
                    .unwrap_or_default();
                if media_applies(&query) {
                    append_rule_list(&media.rules, user_agent, rules, order, debug);
                } else if let Some(logger) = debug {
                    logger.increment("css.media_skipped", 1);
                }
            }
            CssRule::Supports(supports) => {
                append_rule_list(&supports.rules, user_agent, rules, order, debug);
            }
            _ => {}
        }
    }
}

fn declarations_from(props: &[Property]) -> Vec<Declaration> {
    let mut out = Vec::new();
    for property in props {
        push_property(property, &mut out);
    }
    out
}

fn push_declaration(out: &mut Vec<Declaration>, name: &str, value: String) {
    let value = value.trim().to_string();
    if value.is_empty() {
        return;
    }
    let name = if name.starts_with("--") {
        name.to_string()
    } else {
        name.to_ascii_lowercase()
    };
    out.push(Declaration { name, value });
}

// Typed shorthands are split into the longhands the audit reads; everything else is kept
// under its property name as serialized CSS.
fn push_property(property: &Property, out: &mut Vec<Declaration>) {
    match property {
        Property::Background(backgrounds) => {
            if let Some(last) = backgrounds.last() {
                if let Ok(color) = last.color.to_css_string(PrinterOptions::default()) {
                    push_declaration(out, "background-color", color);
                }
            }
            let images: Vec<String> = backgrounds
                .iter()
                .filter_map(|bg| bg.image.to_css_string(PrinterOptions::default()).ok())
                .collect();
            if !images.is_empty() {
                push_declaration(out, "background-image", images.join(", "));
            }
        }
        Property::Font(font) => {
            if let Ok(size) = font.size.to_css_string(PrinterOptions::default()) {
                push_declaration(out, "font-size", size);
            }
            if let Ok(weight) = font.weight.to_css_string(PrinterOptions::default()) {
                push_declaration(out, "font-weight", weight);
            }
        }
        Property::Mask(masks, _) => {
            let images: Vec<String> = masks
                .iter()
                .filter_map(|mask| mask.image.to_css_string(PrinterOptions::default()).ok())
                .collect();
            if !images.is_empty() {
                push_declaration(out, "mask-image", images.join(", "));
            }
        }
        _ => {
            let id = property.property_id();
            if let Ok(value) = property.value_to_css_string(PrinterOptions::default()) {
                push_declaration(out, id.name(), value);
            }
        }
    }
}

// Shorthands whose value only became known after var() substitution.
fn expand_shorthand(name: &str, value: &str) -> Vec<Declaration> {
    let source = format!("{name}: {value}");
    let options = ParserOptions {
        error_recovery: true,
        ..ParserOptions::default()
    };
    match StyleAttribute::parse(&source, options) {
        Ok(parsed) => {
            let out = declarations_from(&parsed.declarations.declarations);
            if out.is_empty() {
                vec![Declaration {
                    name: name.to_string(),
                    value: value.to_string(),
                }]
            } else {
                out
            }
        }
        Err(_) => vec![Declaration {
            name: name.to_string(),
            value: value.to_string(),
        }],
    }
}

fn parse_inline(style: &str) -> (Vec<Declaration>, Vec<Declaration>) {
    let options = ParserOptions {
        error_recovery: true,
        ..ParserOptions::default()
    };
    match StyleAttribute::parse(style, options) {
        Ok(parsed) => (
            declarations_from(&parsed.declarations.declarations),
            declarations_from(&parsed.declarations.important_declarations),
        ),
        Err(_) => (Vec::new(), Vec::new()),
    }
}

/// Declarations that apply to `node`, lowest priority first.
fn cascade(node: &NodeRef, rules: &[RuleEntry], debug: Option<&DebugLogger>) -> Vec<Declaration> {
    let Some(element) = node.clone().into_element_ref() else {
        return Vec::new();
    };

    let mut matched: Vec<(Origin, Option<Specificity>, usize, &[Declaration])> = Vec::new();
    for rule in rules {
        let specificity = rule
            .selectors
            .0
            .iter()
            .filter(|selector| selector.matches(&element))
            .map(|selector| selector.specificity())
            .max();
        let Some(specificity) = specificity else {
            continue;
        };
        if rule.user_agent {
            matched.push((Origin::UserAgent, Some(specificity), rule.order, &rule.normal[..]));
            continue;
        }
        matched.push((Origin::Author, Some(specificity), rule.order, &rule.normal[..]));
        matched.push((Origin::AuthorImportant, Some(specificity), rule.order, &rule.important[..]));
    }

    let presentation: Vec<Declaration> = if is_svg_element(node) {
        SVG_PRESENTATION_ATTRIBUTES
            .iter()
            .filter_map(|name| {
                attr(node, name)
                    .filter(|value| !value.trim().is_empty())
                    .map(|value| Declaration {
                        name: name.to_string(),
                        value: value.trim().to_string(),
                    })
            })
            .collect()
    } else {
        Vec::new()
    };
    if !presentation.is_empty() {
        matched.push((Origin::Presentation, None, 0, presentation.as_slice()));
    }

    let (inline, inline_important) = match attr(node, "style") {
        Some(style) if !style.trim().is_empty() => {
            if let Some(logger) = debug {
                logger.increment("css.inline_styles", 1);
            }
            parse_inline(&style)
        }
        _ => (Vec::new(), Vec::new()),
    };
    matched.push((Origin::Inline, None, 0, inline.as_slice()));
    matched.push((Origin::InlineImportant, None, 0, inline_important.as_slice()));

    matched.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));
    matched
        .into_iter()
        .flat_map(|(_, _, _, decls)| decls.iter().cloned())
        .collect()
}

/// Replaces `var(--name[, fallback])` with custom property values. References with no
/// value and no fallback stay in the text as written.
fn substitute_vars(value: &str, customs: &HashMap<String, String>, depth: usize) -> String {
    if depth > MAX_VAR_DEPTH || !value.contains("var(") {
        return value.to_string();
    }
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(start) = rest.find("var(") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 4..];
        let Some(close) = matching_paren(after) else {
            out.push_str(&rest[start..]);
            return out;
        };
        let inner = &after[..close];
        let (name, fallback) = match split_top_level_comma(inner) {
            Some((name, fallback)) => (name.trim(), Some(fallback.trim())),
            None => (inner.trim(), None),
        };
        match (customs.get(name), fallback) {
            (Some(found), _) => out.push_str(&substitute_vars(found, customs, depth + 1)),
            (None, Some(fallback)) => out.push_str(&substitute_vars(fallback, customs, depth + 1)),
            (None, None) => out.push_str(&rest[start..start + 4 + close + 1]),
        }
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    out
}

fn matching_paren(input: &str) -> Option<usize> {
    let mut depth = 1usize;
    for (idx, ch) in input.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(idx);
                }
            }
            _ => {}
        }
    }
    None
}

fn split_top_level_comma(input: &str) -> Option<(&str, &str)> {
    let mut depth = 0usize;
    for (idx, ch) in input.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => return Some((&input[..idx], &input[idx + 1..])),
            _ => {}
        }
    }
    None
}

enum Specified<'a> {
    Inherit,
    Initial,
    Value(&'a str),
}

fn classify<'a>(value: Option<&'a String>, inherited: bool) -> Specified<'a> {
    let Some(value) = value.map(|v| v.trim()) else {
        return if inherited {
            Specified::Inherit
        } else {
            Specified::Initial
        };
    };
    match value.to_ascii_lowercase().as_str() {
        "inherit" => Specified::Inherit,
        "initial" | "revert" | "revert-layer" => Specified::Initial,
        "unset" if inherited => Specified::Inherit,
        "unset" => Specified::Initial,
        _ => Specified::Value(value),
    }
}

fn format_px(px: f64) -> String {
    let rounded = (px * 10_000.0).round() / 10_000.0;
    format!("{rounded}px")
}

fn px_value(value: &str) -> Option<f64> {
    value.trim().strip_suffix("px")?.trim().parse::<f64>().ok()
}

/// Absolute length in px. Relative units resolve against `em_px` / `root_px`;
/// percentages need a basis.
fn parse_length_px(value: &str, em_px: f64, root_px: f64, percent_basis: Option<f64>) -> Option<f64> {
    let value = value.trim().to_ascii_lowercase();
    if value == "0" {
        return Some(0.0);
    }
    if let Some(pct) = value.strip_suffix('%') {
        return Some(percent_basis? * pct.trim().parse::<f64>().ok()? / 100.0);
    }
    const UNITS: [(&str, f64); 10] = [
        ("rem", 0.0),
        ("px", 1.0),
        ("pt", 96.0 / 72.0),
        ("pc", 16.0),
        ("in", 96.0),
        ("cm", 96.0 / 2.54),
        ("mm", 96.0 / 25.4),
        ("em", 0.0),
        ("ex", 0.0),
        ("ch", 0.0),
    ];
    for (unit, factor) in UNITS {
        let Some(number) = value.strip_suffix(unit) else {
            continue;
        };
        let number = number.trim().parse::<f64>().ok()?;
        return Some(match unit {
            "rem" => number * root_px,
            "em" => number * em_px,
            "ex" | "ch" => number * em_px * 0.5,
            _ => number * factor,
        });
    }
    None
}

fn parse_font_size_px(value: &str, parent_px: f64, root_px: f64) -> Option<f64> {
    let lower = value.trim().to_ascii_lowercase();
    let keyword = match lower.as_str() {
        "xx-small" => Some(9.0),
        "x-small" => Some(10.0),
        "small" => Some(13.0),
        "medium" => Some(16.0),
        "large" => Some(18.0),
        "x-large" => Some(24.0),
        "xx-large" => Some(32.0),
        "xxx-large" => Some(48.0),
        "smaller" => Some(parent_px / 1.2),
        "larger" => Some(parent_px * 1.2),
        _ => None,
    };
    keyword
        .or_else(|| parse_length_px(&lower, parent_px, root_px, Some(parent_px)))
        .filter(|px| px.is_finite() && *px >= 0.0)
}

fn parse_font_weight(value: &str, parent: f64) -> Option<f64> {
    match value.trim().to_ascii_lowercase().as_str() {
        "normal" => Some(400.0),
        "bold" => Some(700.0),
        "bolder" => Some(if parent < 350.0 {
            400.0
        } else if parent < 550.0 {
            700.0
        } else {
            900.0_f64.max(parent)
        }),
        "lighter" => Some(if parent < 550.0 {
            100.0_f64.min(parent)
        } else if parent < 750.0 {
            400.0
        } else {
            700.0
        }),
        other => other
            .parse::<f64>()
            .ok()
            .filter(|w| w.is_finite())
            .map(|w| w.clamp(1.0, 1000.0)),
    }
}

fn resolve_color_value(value: &str, current_color: &str) -> String {
    if value.eq_ignore_ascii_case("currentcolor") {
        return current_color.to_string();
    }
    canonical_color(value).unwrap_or_else(|| value.to_string())
}

fn resolve_computed(
    specified: &HashMap<String, String>,
    customs: HashMap<String, String>,
    parent: Option<&ComputedStyle>,
    root_px: f64,
) -> ComputedStyle {
    let inherited = |name: &str| parent.and_then(|p| p.values.get(name)).cloned();
    let parent_px = parent.map(|p| p.font_px).unwrap_or(DEFAULT_FONT_PX);
    let parent_weight = parent.map(|p| p.weight).unwrap_or(400.0);
    let black = "rgb(0, 0, 0)".to_string();

    let mut values: HashMap<String, String> = HashMap::new();
    for (name, value) in specified {
        values.insert(name.clone(), value.clone());
    }

    let parent_color = inherited("color").unwrap_or_else(|| black.clone());
    let color = match classify(specified.get("color"), true) {
        Specified::Inherit => parent_color,
        Specified::Initial => black.clone(),
        Specified::Value(v) => resolve_color_value(v, &parent_color),
    };
    values.insert("color".to_string(), color.clone());

    let font_px = match classify(specified.get("font-size"), true) {
        Specified::Inherit => parent_px,
        Specified::Initial => DEFAULT_FONT_PX,
        Specified::Value(v) => parse_font_size_px(v, parent_px, root_px).unwrap_or(parent_px),
    };
    values.insert("font-size".to_string(), format_px(font_px));

    let weight = match classify(specified.get("font-weight"), true) {
        Specified::Inherit => parent_weight,
        Specified::Initial => 400.0,
        Specified::Value(v) => parse_font_weight(v, parent_weight).unwrap_or(parent_weight),
    };
    values.insert("font-weight".to_string(), format!("{}", weight.round()));

    let background = match classify(specified.get("background-color"), false) {
        Specified::Inherit => inherited("background-color").unwrap_or_else(|| TRANSPARENT.to_string()),
        Specified::Initial => TRANSPARENT.to_string(),
        Specified::Value(v) if v.eq_ignore_ascii_case("none") => TRANSPARENT.to_string(),
        Specified::Value(v) => resolve_color_value(v, &color),
    };
    values.insert("background-color".to_string(), background);

    for (name, initial) in [("fill", black.as_str()), ("stroke", "none")] {
        let value = match classify(specified.get(name), true) {
            Specified::Inherit => inherited(name).unwrap_or_else(|| initial.to_string()),
            Specified::Initial => initial.to_string(),
            Specified::Value(v) if v.eq_ignore_ascii_case("none") => "none".to_string(),
            Specified::Value(v) if v.to_ascii_lowercase().starts_with("url(") => v.to_string(),
            Specified::Value(v) => resolve_color_value(v, &color),
        };
        values.insert(name.to_string(), value);
    }

    let visibility = match classify(specified.get("visibility"), true) {
        Specified::Inherit => inherited("visibility").unwrap_or_else(|| "visible".to_string()),
        Specified::Initial => "visible".to_string(),
        Specified::Value(v) => v.to_ascii_lowercase(),
    };
    values.insert("visibility".to_string(), visibility);

    for name in ["display", "opacity", "background-image", "mask-image", "width", "height"] {
        let initial = initial_value(name).unwrap_or("none");
        let value = match classify(specified.get(name), false) {
            Specified::Inherit => inherited(name).unwrap_or_else(|| initial.to_string()),
            Specified::Initial => initial.to_string(),
            Specified::Value(v) if name == "width" || name == "height" => {
                parse_length_px(v, font_px, root_px, None)
                    .map(format_px)
                    .unwrap_or_else(|| v.to_string())
            }
            Specified::Value(v) if name == "display" => v.to_ascii_lowercase(),
            Specified::Value(v) => v.to_string(),
        };
        values.insert(name.to_string(), value);
    }

    ComputedStyle {
        values,
        customs,
        font_px,
        weight,
    }
}

/// Tag of the element plus the computed values this crate reads; used in debug output.
pub(crate) fn describe(styles: &dyn StyleSource, element: &NodeRef) -> String {
    let tag = tag_name(element).unwrap_or_default();
    let read = |name: &str| styles.computed(element, name).unwrap_or_default();
    format!(
        "{tag} color={} background={} font-size={} font-weight={}",
        read("color"),
        read("background-color"),
        read("font-size"),
        read("font-weight")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html::parse_document;

    fn snapshot(html: &str) -> (NodeRef, StyleSnapshot) {
        let doc = parse_document(html);
        let styles = StyleSnapshot::from_document(&doc);
        (doc, styles)
    }

    fn computed(doc: &NodeRef, styles: &StyleSnapshot, selector: &str, property: &str) -> String {
        let node = doc.select_first(selector).expect("selector matches");
        styles
            .computed(node.as_node(), property)
            .unwrap_or_default()
    }

    #[test]
    fn specificity_and_order_decide_the_winner() {
        let (doc, styles) = snapshot(
            r#"<html><head><style>
                p.note { color: blue; }
                p { color: red; }
                #lead { color: #00ff00; }
            </style></head><body><p class="note" id="lead">a</p><p class="note" id="b">b</p></body></html>"#,
        );
        assert_eq!(computed(&doc, &styles, "#lead", "color"), "rgb(0, 255, 0)");
        assert_eq!(computed(&doc, &styles, "#b", "color"), "rgb(0, 0, 255)");
    }

    #[test]
    fn important_beats_inline_and_inline_beats_rules() {
        let (doc, styles) = snapshot(
            r#"<html><head><style>
                .a { color: red !important; }
                .b { color: red; }
            </style></head><body>
                <p class="a" style="color: blue">a</p>
                <p class="b" style="color: blue">b</p>
            </body></html>"#,
        );
        assert_eq!(computed(&doc, &styles, ".a", "color"), "rgb(255, 0, 0)");
        assert_eq!(computed(&doc, &styles, ".b", "color"), "rgb(0, 0, 255)");
    }

    #[test]
    fn color_and_font_inherit_but_background_does_not() {
        let (doc, styles) = snapshot(
            r#"<html><body><div style="color: #333; background-color: #eee; font-size: 20px; font-weight: bold"><span>x</span></div></body></html>"#,
        );
        assert_eq!(computed(&doc, &styles, "span", "color"), "rgb(51, 51, 51)");
        assert_eq!(computed(&doc, &styles, "span", "font-size"), "20px");
        assert_eq!(computed(&doc, &styles, "span", "font-weight"), "700");
        assert_eq!(computed(&doc, &styles, "span", "background-color"), TRANSPARENT);
        assert_eq!(computed(&doc, &styles, "div", "background-color"), "rgb(238, 238, 238)");
    }

    #[test]
    fn relative_font_sizes_resolve_to_px() {
        let (doc, styles) = snapshot(
            r#"<html style="font-size: 10px"><body><div style="font-size: 2em"><p style="font-size: 1.5rem">a</p><small>b</small></div><h1>c</h1></body></html>"#,
        );
        assert_eq!(computed(&doc, &styles, "div", "font-size"), "20px");
        assert_eq!(computed(&doc, &styles, "p", "font-size"), "15px");
        assert_eq!(computed(&doc, &styles, "small", "font-size"), "16.6667px");
        assert_eq!(computed(&doc, &styles, "h1", "font-size"), "20px");
        assert_eq!(computed(&doc, &styles, "h1", "font-weight"), "700");
    }

    #[test]
    fn custom_properties_substitute_with_fallbacks() {
        let (doc, styles) = snapshot(
            r#"<html><head><style>
                :root { --brand: #112233; }
                .a { color: var(--brand); }
                .b { color: var(--missing, #445566); }
                .c { color: var(--missing); }
            </style></head><body><p class="a">a</p><p class="b">b</p><p class="c">c</p></body></html>"#,
        );
        assert_eq!(computed(&doc, &styles, ".a", "color"), "rgb(17, 34, 51)");
        assert_eq!(computed(&doc, &styles, ".b", "color"), "rgb(68, 85, 102)");
        assert!(computed(&doc, &styles, ".c", "color").contains("var(--missing)"));
        let brand = computed(&doc, &styles, ".a", "--brand");
        assert_eq!(crate::color::parse_color(&brand), Some(crate::types::Rgb::new(17, 34, 51)));
    }

    #[test]
    fn background_shorthand_sets_color_and_image() {
        let (doc, styles) = snapshot(
            r#"<html><head><style>
                .icon { background: #fff url("data:image/svg+xml,%3Csvg%3E%3C/svg%3E") no-repeat; }
            </style></head><body><i class="icon"></i></body></html>"#,
        );
        assert_eq!(computed(&doc, &styles, ".icon", "background-color"), "rgb(255, 255, 255)");
        assert!(computed(&doc, &styles, ".icon", "background-image").contains("data:image/svg+xml"));
    }

    #[test]
    fn currentcolor_resolves_against_element_color() {
        let (doc, styles) = snapshot(
            r#"<html><body><div style="color: red; background-color: currentColor">x</div><svg style="color: #00f"><path fill="currentColor" d="M0 0"/></svg></body></html>"#,
        );
        assert_eq!(computed(&doc, &styles, "div", "background-color"), "rgb(255, 0, 0)");
        assert_eq!(computed(&doc, &styles, "path", "fill"), "rgb(0, 0, 255)");
        assert_eq!(computed(&doc, &styles, "path", "stroke"), "none");
    }

    #[test]
    fn presentation_attributes_lose_to_css() {
        let (doc, styles) = snapshot(
            r##"<html><head><style>.tinted { fill: #0f0; }</style></head><body>
                <svg><path class="tinted" fill="#f00" d="M0 0"/><circle fill="#f00" r="1"/></svg>
            </body></html>"##,
        );
        assert_eq!(computed(&doc, &styles, "path", "fill"), "rgb(0, 255, 0)");
        assert_eq!(computed(&doc, &styles, "circle", "fill"), "rgb(255, 0, 0)");
    }

    #[test]
    fn print_only_media_is_ignored() {
        let (doc, styles) = snapshot(
            r#"<html><head><style>
                @media print { p { color: red; } }
                @media screen { p { font-size: 20px; } }
            </style><style media="print">p { display: none; }</style></head><body><p>x</p></body></html>"#,
        );
        assert_eq!(computed(&doc, &styles, "p", "color"), "rgb(0, 0, 0)");
        assert_eq!(computed(&doc, &styles, "p", "font-size"), "20px");
        assert_eq!(computed(&doc, &styles, "p", "display"), "block");
    }

    #[test]
    fn box_size_prefers_css_then_attributes() {
        let (doc, styles) = snapshot(
            r#"<html><body>
                <svg id="a" width="24" height="20"></svg>
                <svg id="b" width="24" height="24" style="width: 2em; height: 1em"></svg>
                <span id="c">x</span>
            </body></html>"#,
        );
        let a = doc.select_first("#a").expect("a");
        let b = doc.select_first("#b").expect("b");
        let c = doc.select_first("#c").expect("c");
        assert_eq!(styles.box_size(a.as_node()), Some((24.0, 20.0)));
        assert_eq!(styles.box_size(b.as_node()), Some((32.0, 16.0)));
        assert_eq!(styles.box_size(c.as_node()), None);
    }

    #[test]
    fn extra_css_applies_after_document_styles() {
        let doc = parse_document(
            r#"<html><head><style>p { color: red; }</style></head><body><p>x</p></body></html>"#,
        );
        let styles = StyleSnapshot::with_css(&doc, "p { color: #00f; }");
        let p = doc.select_first("p").expect("p");
        assert_eq!(styles.computed(p.as_node(), "color").as_deref(), Some("rgb(0, 0, 255)"));
        assert!(describe(&styles, p.as_node()).starts_with("p color=rgb(0, 0, 255)"));
    }
}
