use crate::color::{colors_equal, effective_background, is_transparent_color_value, parse_color};
use crate::html::{attr, is_svg_element, tag_name};
use crate::style::StyleSource;
use base64::Engine;
use kuchiki::NodeRef;

/// Elements that carry paint inside an icon.
pub(crate) const SVG_SHAPE_TAGS: [&str; 9] = [
    "path", "circle", "rect", "line", "polyline", "polygon", "ellipse", "text", "use",
];

pub(crate) const REASON_UNRESOLVED_VARIABLES: &str = "uses unresolved CSS variables";
pub(crate) const REASON_UNREADABLE_SVG: &str = "contains unreadable SVG data";
pub(crate) const REASON_NOT_INLINE_SVG: &str = "does not reference inline SVG data";
pub(crate) const REASON_MASK_UNRESOLVED: &str = "mask color is not resolved";
pub(crate) const REASON_MISSING_ROOT: &str = "SVG markup missing root element";
pub(crate) const REASON_MALFORMED_MARKUP: &str = "SVG markup could not be parsed";

/// Paint found on an icon: color strings to evaluate, and paint references that could
/// not be turned into a color.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaintCandidates {
    pub colors: Vec<String>,
    pub unresolved: Vec<String>,
}

impl PaintCandidates {
    fn extend(&mut self, other: PaintCandidates) {
        self.colors.extend(other.colors);
        self.unresolved.extend(other.unresolved);
    }

    /// Trims, drops empties and removes duplicate colors, keeping first-seen order.
    pub fn dedup_colors(&mut self) {
        let mut seen: Vec<String> = Vec::new();
        for color in self.colors.drain(..) {
            let color = color.trim().to_string();
            if !color.is_empty() && !seen.contains(&color) {
                seen.push(color);
            }
        }
        self.colors = seen;
    }
}

/// Classifies one `fill`/`stroke` value.
pub fn parse_paint_value(value: Option<&str>, fallback_color: Option<&str>) -> PaintCandidates {
    let mut out = PaintCandidates::default();
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return out;
    };
    if is_transparent_color_value(value) {
        return out;
    }
    let lower = value.to_ascii_lowercase();
    if lower == "currentcolor" {
        match fallback_color.map(str::trim).filter(|c| !c.is_empty()) {
            Some(color) => out.colors.push(color.to_string()),
            None => out.unresolved.push("currentColor".to_string()),
        }
        return out;
    }
    if lower.starts_with("url(")
        || lower.starts_with("var(")
        || lower == "inherit"
        || lower == "context-fill"
        || lower == "context-stroke"
    {
        out.unresolved.push(value.to_string());
        return out;
    }
    out.colors.push(value.to_string());
    out
}

/// Last `property: value` declaration in an inline `style` attribute.
pub(crate) fn paint_from_style_attr(style: &str, property: &str) -> Option<String> {
    let mut found = None;
    for decl in style.split(';') {
        let Some((key, value)) = decl.split_once(':') else {
            continue;
        };
        if key.trim().eq_ignore_ascii_case(property) {
            let value = value.trim().trim_end_matches("!important").trim();
            if !value.is_empty() {
                found = Some(value.to_string());
            }
        }
    }
    found
}

/// Paint of an SVG that is part of the document. Shapes are read in order: explicit
/// attribute, inline style, then computed style when `styles` is given.
pub fn paint_from_live_svg(
    svg: &NodeRef,
    fallback_color: Option<&str>,
    styles: Option<&dyn StyleSource>,
) -> PaintCandidates {
    let shapes: Vec<NodeRef> = svg
        .descendants()
        .filter(|node| {
            tag_name(node)
                .map(|tag| SVG_SHAPE_TAGS.contains(&tag.as_str()))
                .unwrap_or(false)
        })
        .collect();
    let targets = if shapes.is_empty() {
        vec![svg.clone()]
    } else {
        shapes
    };

    let mut out = PaintCandidates::default();
    for shape in &targets {
        for property in ["fill", "stroke"] {
            let mut value = attr(shape, property).filter(|v| !v.trim().is_empty());
            if value.is_none() {
                value = attr(shape, "style").and_then(|style| paint_from_style_attr(&style, property));
            }
            if value.is_none() {
                if let Some(styles) = styles {
                    value = styles
                        .computed(shape, property)
                        .filter(|v| !matches!(v.trim(), "none" | "transparent"));
                }
            }
            out.extend(parse_paint_value(value.as_deref(), fallback_color));
        }
    }
    out
}

/// Paint of detached SVG markup (a data URI). There is no computed style here, so only
/// attributes and inline styles count.
pub fn paint_from_svg_markup(markup: &str, fallback_color: Option<&str>) -> PaintCandidates {
    let mut out = PaintCandidates::default();
    let markup = markup.trim_start_matches('\u{feff}');
    let doc = match roxmltree::Document::parse(markup) {
        Ok(doc) => doc,
        Err(_) => {
            out.unresolved.push(REASON_MALFORMED_MARKUP.to_string());
            return out;
        }
    };
    let Some(svg) = doc
        .descendants()
        .find(|node| node.is_element() && node.tag_name().name().eq_ignore_ascii_case("svg"))
    else {
        out.unresolved.push(REASON_MISSING_ROOT.to_string());
        return out;
    };

    let shapes: Vec<roxmltree::Node<'_, '_>> = svg
        .descendants()
        .filter(|node| node.is_element() && SVG_SHAPE_TAGS.contains(&node.tag_name().name()))
        .collect();
    let targets = if shapes.is_empty() { vec![svg] } else { shapes };

    for shape in targets {
        for property in ["fill", "stroke"] {
            let value = shape
                .attribute(property)
                .filter(|v| !v.trim().is_empty())
                .map(str::to_string)
                .or_else(|| {
                    shape
                        .attribute("style")
                        .and_then(|style| paint_from_style_attr(style, property))
                });
            out.extend(parse_paint_value(value.as_deref(), fallback_color));
        }
    }
    out
}

fn strip_quotes(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2
        && ((bytes[0] == b'"' && bytes[bytes.len() - 1] == b'"')
            || (bytes[0] == b'\'' && bytes[bytes.len() - 1] == b'\''))
    {
        return &value[1..value.len() - 1];
    }
    value
}

/// Targets of every `url(...)` in a CSS value, unquoted.
pub fn extract_css_urls(value: &str) -> Vec<String> {
    let mut urls = Vec::new();
    let lower = value.to_ascii_lowercase();
    let mut offset = 0usize;
    while let Some(found) = lower[offset..].find("url(") {
        let start = offset + found + 4;
        let Some(len) = value[start..].find(')') else {
            break;
        };
        let inner = value[start..start + len].trim();
        if !inner.is_empty() {
            urls.push(strip_quotes(inner).to_string());
        }
        offset = start + len + 1;
    }
    urls
}

/// Decodes a `data:image/svg+xml` URI (base64 or percent-encoded) to markup.
pub fn decode_svg_data_uri(uri: &str) -> Option<String> {
    let (header, payload) = uri.trim().split_once(',')?;
    let header = header.to_ascii_lowercase();
    let params = header.strip_prefix("data:image/svg+xml")?;
    let bytes = if params.split(';').any(|param| param.trim() == "base64") {
        let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
        base64::engine::general_purpose::STANDARD
            .decode(compact.as_bytes())
            .ok()?
    } else {
        decode_percent_encoded_bytes(payload)?
    };
    let markup = String::from_utf8(bytes).ok()?;
    Some(markup.trim_start_matches('\u{feff}').to_string())
}

fn decode_percent_encoded_bytes(input: &str) -> Option<Vec<u8>> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0usize;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                if i + 2 >= bytes.len() {
                    return None;
                }
                let hi = hex_nibble(bytes[i + 1])?;
                let lo = hex_nibble(bytes[i + 2])?;
                out.push((hi << 4) | lo);
                i += 3;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    Some(out)
}

fn hex_nibble(ch: u8) -> Option<u8> {
    match ch {
        b'0'..=b'9' => Some(ch - b'0'),
        b'a'..=b'f' => Some(ch - b'a' + 10),
        b'A'..=b'F' => Some(ch - b'A' + 10),
        _ => None,
    }
}

/// Outcome of looking for SVG markup behind a `background-image` / `mask-image` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SvgSource {
    /// No image at all.
    None,
    Markup(String),
    Unresolved(&'static str),
}

/// Resolves a CSS image value to inline SVG markup. `var(--svg)` is substituted with
/// `svg_var` when it is set; any other remaining `var()` is unresolved.
pub fn svg_markup_from_css_value(value: &str, svg_var: Option<&str>) -> SvgSource {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("none") {
        return SvgSource::None;
    }
    let mut resolved = value.to_string();
    if resolved.contains("var(") {
        if let Some(svg_var) = svg_var.map(str::trim).filter(|v| !v.is_empty()) {
            resolved = resolved.replace("var(--svg)", svg_var);
        }
    }
    if resolved.contains("var(") {
        return SvgSource::Unresolved(REASON_UNRESOLVED_VARIABLES);
    }

    let urls = extract_css_urls(&resolved);
    let candidates = if urls.is_empty() { vec![resolved] } else { urls };
    for candidate in candidates {
        if candidate.to_ascii_lowercase().starts_with("data:image/svg+xml") {
            return match decode_svg_data_uri(&candidate) {
                Some(markup) if !markup.trim().is_empty() => SvgSource::Markup(markup),
                _ => SvgSource::Unresolved(REASON_UNREADABLE_SVG),
            };
        }
    }
    SvgSource::Unresolved(REASON_NOT_INLINE_SVG)
}

pub(crate) fn mask_image(element: &NodeRef, styles: &dyn StyleSource) -> Option<String> {
    ["mask-image", "-webkit-mask-image"]
        .iter()
        .filter_map(|name| styles.computed(element, name))
        .find(|value| {
            let value = value.trim();
            !value.is_empty() && !value.eq_ignore_ascii_case("none")
        })
}

/// Foreground colors an icon is drawn with.
///
/// Inline SVG reads its shapes; a mask-painted element is drawn in its own background
/// color (or text color); other elements are searched for SVG behind their background or
/// mask image.
pub fn resolve_foreground_candidates(element: &NodeRef, styles: &dyn StyleSource) -> PaintCandidates {
    let fallback = styles.computed(element, "color");
    let fallback = fallback.as_deref();

    let mut out = if is_svg_element(element) {
        paint_from_live_svg(element, fallback, Some(styles))
    } else if mask_image(element, styles).is_some() {
        let mut out = PaintCandidates::default();
        let own = styles.computed(element, "background-color").unwrap_or_default();
        let behind = effective_background(element, styles, true);
        let distinct = parse_color(&own).is_some()
            && (parse_color(&behind).is_none() || !colors_equal(&own, &behind));
        if !is_transparent_color_value(&own) && distinct {
            out.colors.push(own);
        } else if let Some(color) = fallback.filter(|c| !is_transparent_color_value(c)) {
            out.colors.push(color.to_string());
        } else {
            out.unresolved.push(REASON_MASK_UNRESOLVED.to_string());
        }
        out
    } else {
        let background_image = styles
            .computed(element, "background-image")
            .filter(|v| !v.trim().is_empty() && !v.trim().eq_ignore_ascii_case("none"));
        let source = background_image
            .or_else(|| mask_image(element, styles))
            .unwrap_or_default();
        let svg_var = styles.computed(element, "--svg");
        match svg_markup_from_css_value(&source, svg_var.as_deref()) {
            SvgSource::Markup(markup) => paint_from_svg_markup(&markup, fallback),
            SvgSource::Unresolved(reason) => PaintCandidates {
                colors: Vec::new(),
                unresolved: vec![reason.to_string()],
            },
            SvgSource::None => PaintCandidates::default(),
        }
    };
    out.dedup_colors();
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html::parse_document;
    use crate::style::StyleSnapshot;

    #[test]
    fn paint_values_are_classified() {
        assert_eq!(parse_paint_value(Some("#123"), None).colors, vec!["#123".to_string()]);
        assert_eq!(parse_paint_value(Some("none"), None), PaintCandidates::default());
        assert_eq!(parse_paint_value(Some("rgba(0, 0, 0, 0)"), None), PaintCandidates::default());
        assert_eq!(
            parse_paint_value(Some("currentColor"), Some("rgb(1, 2, 3)")).colors,
            vec!["rgb(1, 2, 3)".to_string()]
        );
        assert_eq!(
            parse_paint_value(Some("currentcolor"), None).unresolved,
            vec!["currentColor".to_string()]
        );
        assert_eq!(
            parse_paint_value(Some("url(#gradient)"), None).unresolved,
            vec!["url(#gradient)".to_string()]
        );
        assert_eq!(
            parse_paint_value(Some("context-stroke"), None).unresolved,
            vec!["context-stroke".to_string()]
        );
        assert_eq!(parse_paint_value(None, None), PaintCandidates::default());
    }

    #[test]
    fn style_attr_paint_reads_the_named_property_only() {
        let style = "stroke-width: 2; fill: #abc; stroke:#def";
        assert_eq!(paint_from_style_attr(style, "fill").as_deref(), Some("#abc"));
        assert_eq!(paint_from_style_attr(style, "stroke").as_deref(), Some("#def"));
        assert_eq!(paint_from_style_attr("color: red", "fill"), None);
    }

    #[test]
    fn live_svg_collects_fill_and_stroke_per_shape() {
        let doc = parse_document(
            r##"<html><body><svg style="color: #0000ff">
                <path fill="#ff0000" d="M0 0"/>
                <circle style="fill: currentColor" stroke="#00ff00" r="2"/>
            </svg></body></html>"##,
        );
        let styles = StyleSnapshot::from_document(&doc);
        let svg = doc.select_first("svg").expect("svg");
        let paint = paint_from_live_svg(svg.as_node(), Some("rgb(0, 0, 255)"), Some(&styles));
        assert_eq!(
            paint.colors,
            vec!["#ff0000".to_string(), "rgb(0, 0, 255)".to_string(), "#00ff00".to_string()]
        );
        assert!(paint.unresolved.is_empty());
    }

    #[test]
    fn live_svg_without_paint_falls_back_to_computed_fill() {
        let doc = parse_document(r#"<html><body><svg><rect width="4" height="4"/></svg></body></html>"#);
        let styles = StyleSnapshot::from_document(&doc);
        let svg = doc.select_first("svg").expect("svg");
        let paint = paint_from_live_svg(svg.as_node(), None, Some(&styles));
        assert_eq!(paint.colors, vec!["rgb(0, 0, 0)".to_string()]);
    }

    #[test]
    fn gradient_fill_is_unresolved() {
        let doc = parse_document(
            r##"<html><body><svg><defs><linearGradient id="gradient"><stop offset="0" stop-color="#000"/></linearGradient></defs><path fill="url(#gradient)" d="M0 0"/></svg></body></html>"##,
        );
        let styles = StyleSnapshot::from_document(&doc);
        let svg = doc.select_first("svg").expect("svg");
        let paint = resolve_foreground_candidates(svg.as_node(), &styles);
        assert!(paint.colors.is_empty());
        assert_eq!(paint.unresolved, vec!["url(#gradient)".to_string()]);
    }

    #[test]
    fn detached_markup_uses_attributes_and_inline_styles_only() {
        let markup = r##"<svg xmlns="http://www.w3.org/2000/svg"><path fill="#111" d="M0 0"/><rect style="stroke: currentColor"/></svg>"##;
        let paint = paint_from_svg_markup(markup, Some("rgb(9, 9, 9)"));
        assert_eq!(paint.colors, vec!["#111".to_string(), "rgb(9, 9, 9)".to_string()]);

        let broken = paint_from_svg_markup("<svg><path></svg>", None);
        assert_eq!(broken.unresolved, vec![REASON_MALFORMED_MARKUP.to_string()]);

        let no_root = paint_from_svg_markup(r#"<g xmlns="http://www.w3.org/2000/svg"/>"#, None);
        assert_eq!(no_root.unresolved, vec![REASON_MISSING_ROOT.to_string()]);
    }

    #[test]
    fn data_uris_decode_from_base64_and_percent_encoding() {
        let encoded = base64::engine::general_purpose::STANDARD.encode("<svg/>");
        assert_eq!(
            decode_svg_data_uri(&format!("data:image/svg+xml;base64,{encoded}")).as_deref(),
            Some("<svg/>")
        );
        assert_eq!(
            decode_svg_data_uri("data:image/svg+xml;charset=utf-8,%3Csvg%2F%3E").as_deref(),
            Some("<svg/>")
        );
        assert_eq!(decode_svg_data_uri("data:image/svg+xml,%ZZ"), None);
        assert_eq!(decode_svg_data_uri("data:image/png;base64,AAAA"), None);
    }

    #[test]
    fn css_urls_are_extracted_and_unquoted() {
        assert_eq!(
            extract_css_urls(r#"url("a.svg"), URL('b.svg'), url(c.svg)"#),
            vec!["a.svg".to_string(), "b.svg".to_string(), "c.svg".to_string()]
        );
        assert!(extract_css_urls("none").is_empty());
    }

    #[test]
    fn css_values_resolve_to_markup_or_a_reason() {
        assert_eq!(svg_markup_from_css_value("none", None), SvgSource::None);
        assert_eq!(
            svg_markup_from_css_value("url(icon.svg)", None),
            SvgSource::Unresolved(REASON_NOT_INLINE_SVG)
        );
        assert_eq!(
            svg_markup_from_css_value("var(--svg)", None),
            SvgSource::Unresolved(REASON_UNRESOLVED_VARIABLES)
        );
        assert_eq!(
            svg_markup_from_css_value(
                "var(--svg)",
                Some(r#"url("data:image/svg+xml,%3Csvg%2F%3E")"#)
            ),
            SvgSource::Markup("<svg/>".to_string())
        );
        assert_eq!(
            svg_markup_from_css_value("url(data:image/svg+xml;base64,***)", None),
            SvgSource::Unresolved(REASON_UNREADABLE_SVG)
        );
    }

    #[test]
    fn mask_painted_element_uses_its_own_background_color() {
        let doc = parse_document(
            r#"<html><body style="background-color: #fff"><span class="icon-check" style="background-color: #0a0; mask-image: url(check.svg)"></span></body></html>"#,
        );
        let styles = StyleSnapshot::from_document(&doc);
        let span = doc.select_first("span").expect("span");
        let paint = resolve_foreground_candidates(span.as_node(), &styles);
        assert_eq!(paint.colors, vec!["rgb(0, 170, 0)".to_string()]);
    }

    #[test]
    fn mask_matching_ambient_background_falls_back_to_text_color() {
        let doc = parse_document(
            r#"<html><body style="background-color: #fff"><span style="color: #333; background-color: #fff; mask-image: url(x.svg)"></span></body></html>"#,
        );
        let styles = StyleSnapshot::from_document(&doc);
        let span = doc.select_first("span").expect("span");
        let paint = resolve_foreground_candidates(span.as_node(), &styles);
        assert_eq!(paint.colors, vec!["rgb(51, 51, 51)".to_string()]);
    }

    #[test]
    fn background_image_svg_is_parsed_with_text_color_fallback() {
        let doc = parse_document(
            r#"<html><body><i class="icon-home" style="color: #222; background-image: url('data:image/svg+xml,%3Csvg xmlns=%22http://www.w3.org/2000/svg%22%3E%3Cpath fill=%22currentColor%22/%3E%3C/svg%3E')"></i></body></html>"#,
        );
        let styles = StyleSnapshot::from_document(&doc);
        let icon = doc.select_first("i").expect("i");
        let paint = resolve_foreground_candidates(icon.as_node(), &styles);
        assert_eq!(paint.colors, vec!["rgb(34, 34, 34)".to_string()]);
        assert!(paint.unresolved.is_empty());
    }

    #[test]
    fn duplicate_colors_are_removed() {
        let mut paint = PaintCandidates {
            colors: vec![" #000".to_string(), "#000".to_string(), "".to_string(), "#fff".to_string()],
            unresolved: Vec::new(),
        };
        paint.dedup_colors();
        assert_eq!(paint.colors, vec!["#000".to_string(), "#fff".to_string()]);
    }
}
