use crate::html::{document_element, is_tag, parent_element};
use crate::style::StyleSource;
use crate::types::Rgb;
use kuchiki::NodeRef;
use lightningcss::traits::Parse;
use lightningcss::values::color::{CssColor, SRGB};

pub(crate) const DEFAULT_BACKGROUND: &str = "rgb(255, 255, 255)";
pub(crate) const TRANSPARENT: &str = "rgba(0, 0, 0, 0)";

/// Parses a CSS color string into an opaque 8-bit color.
///
/// Fully transparent colors yield `None`; partial alpha is ignored and the raw channels
/// are kept, so a faint color is never averaged toward another one.
pub fn parse_color(value: &str) -> Option<Rgb> {
    parse_color_with_alpha(value).and_then(|(rgb, alpha)| (alpha > 0.0).then_some(rgb))
}

/// Color plus alpha in `0.0..=1.0`. Used where transparency must be told apart from
/// "unparseable".
pub(crate) fn parse_color_with_alpha(value: &str) -> Option<(Rgb, f32)> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Some(parsed) = parse_rgb_function(value) {
        return Some(parsed);
    }
    let color = CssColor::parse_string(value).ok()?;
    css_color_to_rgb(&color)
}

// Fast path for the comma form every computed style serializes to.
fn parse_rgb_function(value: &str) -> Option<(Rgb, f32)> {
    let lower = value.to_ascii_lowercase();
    let inner = lower
        .strip_prefix("rgba(")
        .or_else(|| lower.strip_prefix("rgb("))?
        .strip_suffix(')')?;
    let parts: Vec<&str> = inner.split(',').map(|p| p.trim()).collect();
    if parts.len() != 3 && parts.len() != 4 {
        return None;
    }
    let mut channels = [0u8; 3];
    for (slot, part) in channels.iter_mut().zip(parts.iter()) {
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        *slot = part.parse::<u16>().ok()?.min(255) as u8;
    }
    let alpha = match parts.get(3) {
        Some(raw) => parse_alpha(raw)?,
        None => 1.0,
    };
    Some((Rgb::new(channels[0], channels[1], channels[2]), alpha))
}

fn parse_alpha(raw: &str) -> Option<f32> {
    if let Some(pct) = raw.strip_suffix('%') {
        return pct.trim().parse::<f32>().ok().map(|v| (v / 100.0).clamp(0.0, 1.0));
    }
    raw.parse::<f32>().ok().map(|v| v.clamp(0.0, 1.0))
}

fn css_color_to_rgb(color: &CssColor) -> Option<(Rgb, f32)> {
    if matches!(color, CssColor::CurrentColor) {
        return None;
    }
    let srgb = SRGB::try_from(color).ok()?;
    let channel = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    let alpha = if srgb.alpha.is_finite() {
        srgb.alpha.clamp(0.0, 1.0)
    } else {
        1.0
    };
    Some((Rgb::new(channel(srgb.r), channel(srgb.g), channel(srgb.b)), alpha))
}

/// Serializes a color the way computed styles do: `rgb(r, g, b)` when opaque,
/// `rgba(r, g, b, a)` otherwise.
pub(crate) fn format_computed_color(rgb: Rgb, alpha: f32) -> String {
    if alpha >= 1.0 {
        return rgb.to_css();
    }
    let alpha = (alpha * 1000.0).round() / 1000.0;
    format!("rgba({}, {}, {}, {})", rgb.r, rgb.g, rgb.b, alpha)
}

/// Canonical computed form of a color value, or `None` when it does not parse.
pub(crate) fn canonical_color(value: &str) -> Option<String> {
    parse_color_with_alpha(value).map(|(rgb, alpha)| format_computed_color(rgb, alpha))
}

/// Paint values that never contribute ink.
pub(crate) fn is_transparent_color_value(value: &str) -> bool {
    let lower = value.trim().to_ascii_lowercase();
    if lower.is_empty() || lower == "none" || lower == "transparent" {
        return true;
    }
    matches!(parse_color_with_alpha(&lower), Some((_, alpha)) if alpha <= 0.0)
}

pub(crate) fn colors_equal(a: &str, b: &str) -> bool {
    match (parse_color(a), parse_color(b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Background the element is painted on: the first non-transparent `background-color`
/// walking up from the element (or its parent with `ignore_self`) to `<body>`, then the
/// document element, then white.
pub fn effective_background(
    element: &NodeRef,
    styles: &dyn StyleSource,
    ignore_self: bool,
) -> String {
    let mut current = if ignore_self {
        parent_element(element)
    } else {
        Some(element.clone())
    };
    while let Some(node) = current {
        if let Some(background) = styles.computed(&node, "background-color") {
            if !is_transparent_color_value(&background) {
                return background;
            }
        }
        if is_tag(&node, "body") {
            break;
        }
        current = parent_element(&node);
    }
    if let Some(root) = document_element(element) {
        if let Some(background) = styles.computed(&root, "background-color") {
            if !is_transparent_color_value(&background) {
                return background;
            }
        }
    }
    DEFAULT_BACKGROUND.to_string()
}
