use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use std::sync::OnceLock;

pub const CONTRACT_ID: &str = "lcaudit.rule_contract";
pub const CONTRACT_VERSION: &str = "1";

pub const APCA_CONTRAST_ID: &str = "apca-contrast";
pub const NON_TEXT_CONTRAST_ID: &str = "non-text-contrast";

const APCA_HELP_URL: &str = "https://git.apcacontrast.com/";
const NON_TEXT_HELP_URL: &str = "https://www.w3.org/WAI/WCAG21/Understanding/non-text-contrast.html";

const APCA_TAGS: [&str; 4] = ["wcag3", "wcag30", "apca", "contrast"];
const NON_TEXT_TAGS: [&str; 5] = ["wcag2aa", "wcag21aa", "wcag1411", "contrast", "non-text"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleVariant {
    Violations,
    Incomplete,
}

impl RuleVariant {
    pub fn as_str(self) -> &'static str {
        match self {
            RuleVariant::Violations => "violations",
            RuleVariant::Incomplete => "incomplete",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleDef {
    pub id: &'static str,
    pub variant: RuleVariant,
    pub tags: &'static [&'static str],
    pub description: &'static str,
    pub help: &'static str,
    pub help_url: &'static str,
}

pub const RULES_V1: [RuleDef; 4] = [
    RuleDef {
        id: APCA_CONTRAST_ID,
        variant: RuleVariant::Violations,
        tags: &APCA_TAGS,
        description: "Ensures text and iconography have sufficient contrast using APCA (WCAG 3.0 method)",
        help: "Elements must have sufficient color contrast using APCA",
        help_url: APCA_HELP_URL,
    },
    RuleDef {
        id: NON_TEXT_CONTRAST_ID,
        variant: RuleVariant::Violations,
        tags: &NON_TEXT_TAGS,
        description: "Ensures icons and graphical objects meet WCAG 2.1 non-text contrast thresholds",
        help: "Icons and UI components must have sufficient contrast against adjacent colors",
        help_url: NON_TEXT_HELP_URL,
    },
    RuleDef {
        id: APCA_CONTRAST_ID,
        variant: RuleVariant::Incomplete,
        tags: &APCA_TAGS,
        description: "APCA contrast checks could not be completed for some icons",
        help: "Some icons use fills that cannot be resolved automatically",
        help_url: APCA_HELP_URL,
    },
    RuleDef {
        id: NON_TEXT_CONTRAST_ID,
        variant: RuleVariant::Incomplete,
        tags: &NON_TEXT_TAGS,
        description: "Non-text contrast checks could not be completed for some icons",
        help: "Some icons use fills that cannot be resolved automatically",
        help_url: NON_TEXT_HELP_URL,
    },
];

#[derive(Debug, Clone)]
pub struct RuleContractMetadata {
    pub contract_id: &'static str,
    pub contract_version: &'static str,
    pub contract_fingerprint_sha256: String,
    pub rule_count: usize,
}

pub fn rule_def(id: &str, variant: RuleVariant) -> Option<&'static RuleDef> {
    RULES_V1
        .iter()
        .find(|rule| rule.id == id && rule.variant == variant)
}

fn rule_to_json(rule: &RuleDef) -> Value {
    json!({
        "id": rule.id,
        "variant": rule.variant.as_str(),
        "tags": rule.tags,
        "description": rule.description,
        "help": rule.help,
        "helpUrl": rule.help_url,
    })
}

static CONTRACT_JSON_VALUE: OnceLock<Value> = OnceLock::new();
static CONTRACT_FINGERPRINT: OnceLock<String> = OnceLock::new();

// Canonical rendering: serde_json keeps object keys sorted (no preserve_order feature),
// so the serialized text is stable across builds.
pub fn contract_json() -> &'static Value {
    CONTRACT_JSON_VALUE.get_or_init(|| {
        json!({
            "contract_id": CONTRACT_ID,
            "contract_version": CONTRACT_VERSION,
            "rules": RULES_V1.iter().map(rule_to_json).collect::<Vec<_>>(),
        })
    })
}

fn hex_sha256(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        use std::fmt::Write;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

pub fn contract_fingerprint() -> String {
    CONTRACT_FINGERPRINT
        .get_or_init(|| hex_sha256(contract_json().to_string().as_bytes()))
        .clone()
}

pub fn metadata() -> RuleContractMetadata {
    RuleContractMetadata {
        contract_id: CONTRACT_ID,
        contract_version: CONTRACT_VERSION,
        contract_fingerprint_sha256: contract_fingerprint(),
        rule_count: RULES_V1.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_rule_has_both_variants() {
        for id in [APCA_CONTRAST_ID, NON_TEXT_CONTRAST_ID] {
            assert!(rule_def(id, RuleVariant::Violations).is_some(), "{id} violations");
            assert!(rule_def(id, RuleVariant::Incomplete).is_some(), "{id} incomplete");
        }
        assert!(rule_def("color-contrast", RuleVariant::Violations).is_none());
    }

    #[test]
    fn variants_share_tags_and_help_url() {
        let violations = rule_def(APCA_CONTRAST_ID, RuleVariant::Violations).expect("apca");
        let incomplete = rule_def(APCA_CONTRAST_ID, RuleVariant::Incomplete).expect("apca incomplete");
        assert_eq!(violations.tags, incomplete.tags);
        assert_eq!(violations.help_url, incomplete.help_url);
        assert_ne!(violations.description, incomplete.description);
    }

    #[test]
    fn fingerprint_is_stable_hex() {
        let first = contract_fingerprint();
        let second = metadata().contract_fingerprint_sha256;
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn contract_json_lists_all_rules() {
        let rules = contract_json()["rules"].as_array().expect("rules array");
        assert_eq!(rules.len(), RULES_V1.len());
        assert_eq!(rules[1]["helpUrl"], NON_TEXT_HELP_URL);
    }
}
