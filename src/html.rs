use kuchiki::traits::TendrilSink;
use kuchiki::{NodeData, NodeRef, Selectors};

pub(crate) const SVG_NAMESPACE: &str = "http://www.w3.org/2000/svg";

/// Elements whose text is scanned by the APCA text pass.
pub(crate) const TEXT_ELEMENT_TAGS: [&str; 17] = [
    "p", "span", "div", "h1", "h2", "h3", "h4", "h5", "h6", "a", "button", "label", "td", "th",
    "li", "input", "textarea",
];

pub fn parse_document(html: &str) -> NodeRef {
    kuchiki::parse_html().one(html)
}

pub(crate) fn tag_name(node: &NodeRef) -> Option<String> {
    node.as_element()
        .map(|element| element.name.local.as_ref().to_ascii_lowercase())
}

pub(crate) fn is_tag(node: &NodeRef, tag: &str) -> bool {
    node.as_element()
        .map(|element| element.name.local.as_ref().eq_ignore_ascii_case(tag))
        .unwrap_or(false)
}

pub(crate) fn is_svg_element(node: &NodeRef) -> bool {
    node.as_element()
        .map(|element| {
            let ns: &str = element.name.ns.as_ref();
            ns == SVG_NAMESPACE
        })
        .unwrap_or(false)
}

pub(crate) fn attr(node: &NodeRef, name: &str) -> Option<String> {
    let element = node.as_element()?;
    let attrs = element.attributes.borrow();
    attrs.get(name).map(|value| value.to_string())
}

pub(crate) fn has_attr(node: &NodeRef, name: &str) -> bool {
    node.as_element()
        .map(|element| element.attributes.borrow().contains(name))
        .unwrap_or(false)
}

pub(crate) fn class_list(node: &NodeRef) -> Vec<String> {
    attr(node, "class")
        .map(|class| class.split_whitespace().map(|c| c.to_string()).collect())
        .unwrap_or_default()
}

pub(crate) fn parent_element(node: &NodeRef) -> Option<NodeRef> {
    node.parent().filter(|parent| parent.as_element().is_some())
}

pub(crate) fn element_children(node: &NodeRef) -> impl Iterator<Item = NodeRef> {
    node.children().filter(|child| child.as_element().is_some())
}

/// Topmost `<html>` element above (or at) `node`, when the node lives in a full document.
pub(crate) fn document_element(node: &NodeRef) -> Option<NodeRef> {
    node.inclusive_ancestors()
        .filter(|ancestor| ancestor.as_element().is_some())
        .last()
        .filter(|top| is_tag(top, "html"))
}

/// Where a check starts: `<body>` for whole documents, the element itself otherwise.
pub(crate) fn scan_root(node: &NodeRef) -> NodeRef {
    if matches!(node.data(), NodeData::Document(_)) {
        if let Ok(body) = node.select_first("body") {
            return body.as_node().clone();
        }
        if let Some(html) = element_children(node).next() {
            return html;
        }
    }
    node.clone()
}

pub(crate) fn text_content(node: &NodeRef) -> String {
    let mut out = String::new();
    collect_text(node, &mut out);
    out
}

fn collect_text(node: &NodeRef, out: &mut String) {
    match node.data() {
        NodeData::Text(text) => out.push_str(&text.borrow()),
        NodeData::Element(element) => {
            let tag = element.name.local.as_ref();
            if tag.eq_ignore_ascii_case("script") || tag.eq_ignore_ascii_case("style") {
                return;
            }
            for child in node.children() {
                collect_text(&child, out);
            }
        }
        _ => {}
    }
}

pub(crate) fn has_readable_text(node: &NodeRef) -> bool {
    !text_content(node).trim().is_empty()
}

pub(crate) fn has_direct_text(node: &NodeRef) -> bool {
    node.children().any(|child| match child.data() {
        NodeData::Text(text) => !text.borrow().trim().is_empty(),
        _ => false,
    })
}

pub(crate) fn is_text_tag(node: &NodeRef) -> bool {
    tag_name(node)
        .map(|tag| TEXT_ELEMENT_TAGS.contains(&tag.as_str()))
        .unwrap_or(false)
}

pub(crate) fn has_text_element_descendant(node: &NodeRef) -> bool {
    node.descendants().any(|descendant| is_text_tag(&descendant))
}

pub(crate) fn is_aria_hidden(node: &NodeRef) -> bool {
    node.inclusive_ancestors().any(|ancestor| {
        attr(&ancestor, "aria-hidden")
            .map(|value| value.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    })
}

pub(crate) fn outer_html(node: &NodeRef) -> String {
    node.to_string()
}

/// Human-readable location of `node`: `#id` when present, otherwise a
/// `tag.class:nth-child(n)` chain stopping below `<body>`. Diagnostic only; it is not
/// guaranteed to be unique and must not be used to re-select nodes.
pub fn selector_path(node: &NodeRef) -> String {
    if let Some(id) = attr(node, "id").filter(|id| !id.trim().is_empty()) {
        return format!("#{}", id.trim());
    }

    let mut path: Vec<String> = Vec::new();
    let mut current = Some(node.clone()).filter(|n| n.as_element().is_some());
    while let Some(element) = current {
        if is_tag(&element, "body") {
            break;
        }
        let mut segment = tag_name(&element).unwrap_or_default();
        if let Some(first) = class_list(&element).first() {
            segment.push('.');
            segment.push_str(first);
        }
        let parent = parent_element(&element);
        if let Some(parent) = &parent {
            let index = element_children(parent)
                .position(|child| child == element)
                .map(|idx| idx + 1)
                .unwrap_or(1);
            segment.push_str(&format!(":nth-child({index})"));
        }
        path.insert(0, segment);
        current = parent;
    }
    path.join(" > ")
}

pub(crate) struct CompiledSelector {
    pub selectors: Selectors,
}

/// Compiles each selector independently; invalid ones are returned by text so callers
/// can warn about them and keep going.
pub(crate) fn compile_selectors(sources: &[String]) -> (Vec<CompiledSelector>, Vec<String>) {
    let mut compiled = Vec::new();
    let mut invalid = Vec::new();
    for source in sources {
        let trimmed = source.trim();
        if trimmed.is_empty() {
            continue;
        }
        match Selectors::compile(trimmed) {
            Ok(selectors) => compiled.push(CompiledSelector { selectors }),
            Err(()) => invalid.push(trimmed.to_string()),
        }
    }
    (compiled, invalid)
}

pub(crate) fn matches_any(node: &NodeRef, selectors: &[CompiledSelector]) -> bool {
    let Some(element) = node.clone().into_element_ref() else {
        return false;
    };
    selectors
        .iter()
        .any(|compiled| compiled.selectors.matches(&element))
}

/// `Element.closest()` over a selector list.
pub(crate) fn closest_matches(node: &NodeRef, selectors: &[CompiledSelector]) -> bool {
    if selectors.is_empty() {
        return false;
    }
    node.inclusive_ancestors()
        .any(|ancestor| matches_any(&ancestor, selectors))
}
