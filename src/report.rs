use crate::error::LcAuditError;
use crate::evaluate::{
    ApcaViolation, EngineWarning, Evaluation, IncompleteRecord, NON_TEXT_MIN_CONTRAST,
    NonTextViolation, Subject,
};
use crate::html::{outer_html, selector_path};
use crate::types::{Impact, RuleId};
use kuchiki::NodeRef;
use lcaudit_rule_contract::{RULES_V1, RuleDef, RuleVariant};
use serde::Serialize;
use serde_json::{Value, json};

const FAILURE_SUMMARY_PREFIX: &str = "Fix any of the following:\n  ";

/// One check on one node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    pub id: String,
    pub impact: Option<Impact>,
    pub message: String,
    pub data: Value,
    pub related_nodes: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeResult {
    pub html: String,
    /// Diagnostic selector path; not guaranteed unique.
    pub target: Vec<String>,
    pub any: Vec<CheckResult>,
    pub all: Vec<CheckResult>,
    pub none: Vec<CheckResult>,
    pub impact: Option<Impact>,
    pub failure_summary: String,
}

/// Accessibility-engine result shape, so output merges with other automated rules.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AxeResult {
    pub id: String,
    /// Worst node impact; `None` exactly when `nodes` is empty.
    pub impact: Option<Impact>,
    pub tags: Vec<String>,
    pub description: String,
    pub help: String,
    pub help_url: String,
    pub nodes: Vec<NodeResult>,
}

/// Output of one check: the APCA result is always present, the others only when they
/// apply.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContrastCheckResults {
    pub apca: AxeResult,
    /// Present when at least one icon was evaluated, even with no violations.
    pub non_text: Option<AxeResult>,
    pub apca_incomplete: Option<AxeResult>,
    pub non_text_incomplete: Option<AxeResult>,
    pub warnings: Vec<EngineWarning>,
    pub contract_fingerprint: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReportJson<'a> {
    results: Vec<&'a AxeResult>,
    warnings: &'a [EngineWarning],
    contract_fingerprint: &'a str,
}

impl ContrastCheckResults {
    /// Present results in order: APCA, non-text, APCA incomplete, non-text incomplete.
    pub fn results(&self) -> Vec<&AxeResult> {
        let mut out = vec![&self.apca];
        out.extend(self.non_text.as_ref());
        out.extend(self.apca_incomplete.as_ref());
        out.extend(self.non_text_incomplete.as_ref());
        out
    }

    pub fn violation_count(&self) -> usize {
        self.apca.nodes.len() + self.non_text.as_ref().map_or(0, |r| r.nodes.len())
    }

    pub fn to_json(&self) -> Result<String, LcAuditError> {
        Ok(serde_json::to_string(&ReportJson {
            results: self.results(),
            warnings: &self.warnings,
            contract_fingerprint: &self.contract_fingerprint,
        })?)
    }
}

fn definition(rule: RuleId, variant: RuleVariant) -> &'static RuleDef {
    let index = match (rule, variant) {
        (RuleId::ApcaContrast, RuleVariant::Violations) => 0,
        (RuleId::NonTextContrast, RuleVariant::Violations) => 1,
        (RuleId::ApcaContrast, RuleVariant::Incomplete) => 2,
        (RuleId::NonTextContrast, RuleVariant::Incomplete) => 3,
    };
    &RULES_V1[index]
}

fn axe_result(rule: RuleId, variant: RuleVariant, nodes: Vec<NodeResult>) -> AxeResult {
    let def = definition(rule, variant);
    AxeResult {
        id: def.id.to_string(),
        impact: nodes.iter().filter_map(|node| node.impact).max(),
        tags: def.tags.iter().map(|tag| tag.to_string()).collect(),
        description: def.description.to_string(),
        help: def.help.to_string(),
        help_url: def.help_url.to_string(),
        nodes,
    }
}

fn node_result(
    element: &NodeRef,
    rule: RuleId,
    impact: Impact,
    messages: &[String],
    data: Value,
) -> NodeResult {
    let any = messages
        .iter()
        .map(|message| CheckResult {
            id: rule.as_str().to_string(),
            impact: Some(impact),
            message: message.clone(),
            data: data.clone(),
            related_nodes: Vec::new(),
        })
        .collect();
    NodeResult {
        html: outer_html(element),
        target: vec![selector_path(element)],
        any,
        all: Vec::new(),
        none: Vec::new(),
        impact: Some(impact),
        failure_summary: format!("{FAILURE_SUMMARY_PREFIX}{}", messages.join("\n  ")),
    }
}

fn apca_data(violation: &ApcaViolation) -> Value {
    let bounds = &violation.bounds;
    let mut data = json!({
        "kind": if violation.is_icon() { "icon" } else { "text" },
        "background": violation.background,
        "contrast": violation.contrast,
        "threshold": bounds.threshold,
        "preferred": bounds.preferred,
        "maxContrast": bounds.max_contrast,
        "minFontSize": bounds.min_font_size,
        "fontSize": violation.font_size,
        "fontWeight": violation.font_weight,
        "level": violation.level.as_str(),
        "useCase": violation.use_case.as_str(),
        "colorCount": violation.color_count(),
    });
    match &violation.subject {
        Subject::Text { foreground } => {
            data["foreground"] = json!(foreground);
        }
        Subject::Icon {
            foreground,
            foregrounds,
            peak_contrast,
            ..
        } => {
            data["foreground"] = json!(foreground);
            data["foregrounds"] = json!(foregrounds);
            data["peakContrast"] = json!(peak_contrast);
        }
    }
    data
}

fn apca_node(violation: &ApcaViolation) -> NodeResult {
    node_result(
        &violation.element,
        RuleId::ApcaContrast,
        violation.impact(),
        &violation.messages,
        apca_data(violation),
    )
}

fn non_text_node(violation: &NonTextViolation) -> NodeResult {
    let data = json!({
        "foregrounds": violation.foregrounds,
        "background": violation.background,
        "contrastRatio": violation.ratio,
        "minContrast": NON_TEXT_MIN_CONTRAST,
        "colorCount": violation.color_count,
    });
    node_result(
        &violation.element,
        RuleId::NonTextContrast,
        violation.impact(),
        &[violation.message()],
        data,
    )
}

fn incomplete_node(record: &IncompleteRecord) -> NodeResult {
    node_result(
        &record.element,
        record.rule,
        Impact::Minor,
        std::slice::from_ref(&record.reason),
        Value::Null,
    )
}

fn incomplete_result(incompletes: &[IncompleteRecord], rule: RuleId) -> Option<AxeResult> {
    let nodes: Vec<NodeResult> = incompletes
        .iter()
        .filter(|record| record.rule == rule)
        .map(incomplete_node)
        .collect();
    (!nodes.is_empty()).then(|| axe_result(rule, RuleVariant::Incomplete, nodes))
}

/// Converts one run's findings into result objects.
pub(crate) fn assemble(evaluation: Evaluation) -> ContrastCheckResults {
    let apca_nodes = evaluation.violations.iter().map(apca_node).collect();
    let non_text = (evaluation.icon_targets > 0).then(|| {
        axe_result(
            RuleId::NonTextContrast,
            RuleVariant::Violations,
            evaluation.non_text.iter().map(non_text_node).collect(),
        )
    });
    ContrastCheckResults {
        apca: axe_result(RuleId::ApcaContrast, RuleVariant::Violations, apca_nodes),
        non_text,
        apca_incomplete: incomplete_result(&evaluation.incompletes, RuleId::ApcaContrast),
        non_text_incomplete: incomplete_result(&evaluation.incompletes, RuleId::NonTextContrast),
        warnings: evaluation.warnings,
        contract_fingerprint: lcaudit_rule_contract::contract_fingerprint(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apca::ApcaW3;
    use crate::evaluate::{Diagnostics, evaluate};
    use crate::html::{parse_document, scan_root};
    use crate::options::ApcaOptions;
    use crate::style::StyleSnapshot;

    fn check(html: &str) -> ContrastCheckResults {
        let doc = parse_document(html);
        let styles = StyleSnapshot::from_document(&doc);
        assemble(evaluate(
            &scan_root(&doc),
            &styles,
            ApcaW3::load().as_ref(),
            &ApcaOptions::default(),
            &[],
            Diagnostics::default(),
        ))
    }

    #[test]
    fn definitions_line_up_with_rule_ids() {
        for rule in [RuleId::ApcaContrast, RuleId::NonTextContrast] {
            for variant in [RuleVariant::Violations, RuleVariant::Incomplete] {
                let def = definition(rule, variant);
                assert_eq!(def.id, rule.as_str());
                assert_eq!(def.variant, variant);
            }
        }
    }

    #[test]
    fn clean_page_has_only_an_empty_apca_result() {
        let results = check(r#"<html><body><p style="color: #000">Fine</p></body></html>"#);
        assert!(results.apca.nodes.is_empty());
        assert_eq!(results.apca.impact, None);
        assert!(results.non_text.is_none());
        assert!(results.apca_incomplete.is_none());
        assert!(results.non_text_incomplete.is_none());
        assert_eq!(results.results().len(), 1);
        assert_eq!(results.violation_count(), 0);
    }

    #[test]
    fn text_violation_node_shape() {
        let results = check(
            r#"<html><body><main><p class="lede note" style="color: rgb(170,170,170)">Faint</p></main></body></html>"#,
        );
        assert_eq!(results.apca.impact, Some(Impact::Serious));
        let node = &results.apca.nodes[0];
        assert_eq!(node.target, vec!["main:nth-child(1) > p.lede:nth-child(1)".to_string()]);
        assert!(node.html.starts_with("<p class=\"lede note\""));
        assert!(node.failure_summary.starts_with("Fix any of the following:\n  APCA contrast of"));
        assert_eq!(node.any.len(), 1);
        assert_eq!(node.any[0].id, "apca-contrast");
        assert_eq!(node.any[0].data["kind"], "text");
        assert_eq!(node.any[0].data["threshold"], 75.0);
        assert_eq!(node.any[0].data["preferred"], 90.0);
        assert_eq!(node.any[0].data["foreground"], "rgb(170, 170, 170)");
        assert!(node.all.is_empty() && node.none.is_empty());
    }

    #[test]
    fn icons_without_failures_still_produce_a_non_text_result() {
        let results = check(
            r##"<html><body><svg width="16" height="16"><path fill="#000" d="M0 0"/></svg></body></html>"##,
        );
        let non_text = results.non_text.as_ref().expect("non-text result");
        assert!(non_text.nodes.is_empty());
        assert_eq!(non_text.impact, None);
        assert_eq!(non_text.help_url, lcaudit_rule_contract::RULES_V1[1].help_url);
    }

    #[test]
    fn incomplete_results_appear_per_rule_with_minor_impact() {
        let results = check(
            r##"<html><body><svg id="logo" width="24" height="24"><path fill="url(#g)" d="M0 0"/></svg></body></html>"##,
        );
        let apca = results.apca_incomplete.as_ref().expect("apca incomplete");
        let non_text = results.non_text_incomplete.as_ref().expect("non-text incomplete");
        assert_eq!(apca.impact, Some(Impact::Minor));
        assert_eq!(apca.description, "APCA contrast checks could not be completed for some icons");
        assert_eq!(apca.nodes.len(), 1);
        assert_eq!(non_text.nodes.len(), 1);
        assert_eq!(non_text.nodes[0].target, vec!["#logo".to_string()]);
        assert_eq!(non_text.nodes[0].any[0].id, "non-text-contrast");
        assert_eq!(results.results().len(), 4);
    }

    #[test]
    fn json_uses_camel_case_keys() {
        let results = check(
            r##"<html><body><p style="color: #bbb">x</p><svg width="24" height="24"><path fill="#fff" d="M0 0"/></svg></body></html>"##,
        );
        let json: Value = serde_json::from_str(&results.to_json().expect("json")).expect("parse");
        let list = json["results"].as_array().expect("results array");
        assert_eq!(list.len(), 2);
        assert_eq!(list[1]["id"], "non-text-contrast");
        assert_eq!(list[1]["impact"], "critical");
        let node = &list[0]["nodes"][0];
        assert!(node.get("failureSummary").is_some());
        assert!(node["any"][0].get("relatedNodes").is_some());
        assert!(list[0].get("helpUrl").is_some());
        assert_eq!(
            json["contractFingerprint"],
            lcaudit_rule_contract::contract_fingerprint()
        );
    }
}
