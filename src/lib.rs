mod apca;
mod color;
mod debug;
mod error;
mod evaluate;
mod html;
mod options;
mod perf;
#[cfg(feature = "python")]
mod python;
mod report;
mod style;
mod svg;
mod threshold;
mod types;

pub use apca::{
    ApcaPrimitives, ApcaW3, FontLookupRow, LOOKUP_NON_CONTENT_ONLY, LOOKUP_PROHIBITED,
    lc_between, wcag_contrast_ratio,
};
pub use color::{effective_background, parse_color};
pub use error::LcAuditError;
pub use evaluate::{
    ApcaViolation, EngineWarning, IncompleteRecord, NON_TEXT_MIN_CONTRAST, NonTextViolation,
    Subject, apca_impact, is_visible, non_text_impact,
};
pub use html::{parse_document, selector_path};
pub use options::{ApcaOptions, normalize_selector_list, normalize_selectors};
pub use report::{AxeResult, CheckResult, ContrastCheckResults, NodeResult};
pub use style::{StyleSnapshot, StyleSource};
pub use svg::{
    PaintCandidates, SvgSource, decode_svg_data_uri, extract_css_urls, paint_from_live_svg,
    paint_from_svg_markup, parse_paint_value, resolve_foreground_candidates,
    svg_markup_from_css_value,
};
pub use threshold::{
    APCA_LC_STEPS, APCA_MAX_CONTRAST_LC, ThresholdResult, apca_threshold, max_contrast,
    min_font_size, weight_bucket,
};
pub use types::{ConformanceLevel, Impact, Rgb, RuleId, UseCase};

use debug::DebugLogger;
use evaluate::Diagnostics;
use kuchiki::NodeRef;
use perf::PerfLogger;
use std::path::PathBuf;
use std::sync::Arc;

/// SHA-256 of the rule metadata every result is built from.
pub fn contract_fingerprint() -> String {
    lcaudit_rule_contract::contract_fingerprint()
}

/// Checks the descendants of `root` (or of `<body>` when `root` is a document).
///
/// Never fails. Invalid selectors and per-element calculation errors are returned as
/// warnings alongside whatever results could be produced.
pub fn run_apca_check(
    root: &NodeRef,
    styles: &dyn StyleSource,
    primitives: &dyn ApcaPrimitives,
    options: &ApcaOptions,
    exclude: &[String],
) -> ContrastCheckResults {
    let root = html::scan_root(root);
    report::assemble(evaluate::evaluate(
        &root,
        styles,
        primitives,
        options,
        exclude,
        Diagnostics::default(),
    ))
}

pub struct LcAudit {
    options: ApcaOptions,
    exclude: Vec<String>,
    extra_css: String,
    primitives: Arc<dyn ApcaPrimitives>,
    debug: Option<Arc<DebugLogger>>,
    perf: Option<Arc<PerfLogger>>,
}

#[derive(Clone, Default)]
pub struct LcAuditBuilder {
    options: ApcaOptions,
    exclude: Vec<String>,
    extra_css: String,
    primitives: Option<Arc<dyn ApcaPrimitives>>,
    strict_selectors: bool,
    debug_path: Option<PathBuf>,
    perf_path: Option<PathBuf>,
}

impl LcAudit {
    pub fn builder() -> LcAuditBuilder {
        LcAuditBuilder::new()
    }

    pub fn options(&self) -> &ApcaOptions {
        &self.options
    }

    fn diagnostics(&self, run_id: Option<usize>) -> Diagnostics<'_> {
        Diagnostics {
            debug: self.debug.as_deref(),
            perf: self.perf.as_deref(),
            run_id,
        }
    }

    fn check_root(
        &self,
        root: &NodeRef,
        styles: &dyn StyleSource,
        run_id: Option<usize>,
    ) -> ContrastCheckResults {
        let root = html::scan_root(root);
        let evaluation = evaluate::evaluate(
            &root,
            styles,
            self.primitives.as_ref(),
            &self.options,
            &self.exclude,
            self.diagnostics(run_id),
        );
        let results = report::assemble(evaluation);
        if let Some(debug) = &self.debug {
            debug.flush();
        }
        if let Some(perf) = &self.perf {
            perf.flush();
        }
        results
    }

    /// Checks an already-parsed tree whose styles come from the caller (a browser
    /// snapshot, a layout engine, or a [`StyleSnapshot`]).
    pub fn check_document(&self, root: &NodeRef, styles: &dyn StyleSource) -> ContrastCheckResults {
        self.check_root(root, styles, None)
    }

    /// Parses `html`, resolves its styles with the configured extra CSS, and checks it.
    pub fn check_html(&self, html: &str) -> ContrastCheckResults {
        self.check_html_at(None, html)
    }

    fn timed<T>(&self, name: &str, run_id: Option<usize>, f: impl FnOnce() -> T) -> T {
        match &self.perf {
            Some(perf) => perf.time(name, run_id, f),
            None => f(),
        }
    }

    fn check_html_at(&self, run_id: Option<usize>, html: &str) -> ContrastCheckResults {
        let document = self.timed("check.parse", run_id, || parse_document(html));
        let styles = self.timed("check.style", run_id, || {
            StyleSnapshot::build(&document, &self.extra_css, self.debug.as_deref())
        });
        self.check_root(&document, &styles, run_id)
    }

    // Each document is parsed and checked on its own worker; results come back in input
    // order.
    pub fn check_html_batch_parallel(&self, html_list: &[String]) -> Vec<ContrastCheckResults> {
        use rayon::prelude::*;

        let mut results: Vec<(usize, ContrastCheckResults)> = html_list
            .par_iter()
            .enumerate()
            .map(|(idx, html)| (idx, self.check_html_at(Some(idx), html)))
            .collect();
        results.sort_by_key(|(idx, _)| *idx);
        results.into_iter().map(|(_, res)| res).collect()
    }
}

impl LcAuditBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn options(mut self, options: ApcaOptions) -> Self {
        self.options = options;
        self
    }

    pub fn level(mut self, level: ConformanceLevel) -> Self {
        self.options.level = level;
        self
    }

    pub fn use_case(mut self, use_case: UseCase) -> Self {
        self.options.use_case = use_case;
        self
    }

    pub fn icon_selector(mut self, selector: impl Into<String>) -> Self {
        self.options
            .icon_selectors
            .extend(normalize_selectors([selector.into()]));
        self
    }

    pub fn icon_selectors<I, S>(mut self, selectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.options.icon_selectors.extend(normalize_selectors(selectors));
        self
    }

    /// Elements inside a match (`closest()`) are not checked.
    pub fn exclude_selector(mut self, selector: impl Into<String>) -> Self {
        self.exclude.extend(normalize_selectors([selector.into()]));
        self
    }

    pub fn exclude_selectors<I, S>(mut self, selectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.exclude.extend(normalize_selectors(selectors));
        self
    }

    /// CSS applied after the document's own `<style>` blocks. Repeated calls append.
    pub fn extra_css(mut self, css: impl AsRef<str>) -> Self {
        if !self.extra_css.is_empty() {
            self.extra_css.push('\n');
        }
        self.extra_css.push_str(css.as_ref());
        self
    }

    /// Replaces the bundled APCA math.
    pub fn primitives(mut self, primitives: Arc<dyn ApcaPrimitives>) -> Self {
        self.primitives = Some(primitives);
        self
    }

    /// Reject invalid icon/exclude selectors at build time instead of warning per run.
    pub fn strict_selectors(mut self, enabled: bool) -> Self {
        self.strict_selectors = enabled;
        self
    }

    pub fn debug_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.debug_path = Some(path.into());
        self
    }

    pub fn perf_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.perf_path = Some(path.into());
        self
    }

    /// Applies the `LCAUDIT_*` environment overrides.
    pub fn from_env(self) -> Result<Self, LcAuditError> {
        self.from_env_with(|name| std::env::var(name).ok())
    }

    fn from_env_with(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, LcAuditError> {
        self.options = self.options.with_overrides_from(&lookup)?;
        let read = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        if let Some(exclude) = read(options::ENV_EXCLUDE) {
            self.exclude = normalize_selector_list(&exclude);
        }
        if let Some(path) = read(options::ENV_DEBUG_LOG) {
            self.debug_path = Some(PathBuf::from(path));
        }
        if let Some(path) = read(options::ENV_PERF_LOG) {
            self.perf_path = Some(PathBuf::from(path));
        }
        Ok(self)
    }

    pub fn build(self) -> Result<LcAudit, LcAuditError> {
        if self.strict_selectors {
            let mut invalid = html::compile_selectors(&self.options.icon_selectors).1;
            invalid.extend(html::compile_selectors(&self.exclude).1);
            if !invalid.is_empty() {
                return Err(LcAuditError::InvalidSelector(invalid.join(", ")));
            }
        }
        let debug = if let Some(path) = self.debug_path {
            Some(Arc::new(DebugLogger::new(path)?))
        } else {
            None
        };
        let perf = if let Some(path) = self.perf_path {
            Some(Arc::new(PerfLogger::new(path)?))
        } else {
            None
        };
        let primitives: Arc<dyn ApcaPrimitives> = match self.primitives {
            Some(primitives) => primitives,
            None => ApcaW3::load(),
        };
        Ok(LcAudit {
            options: self.options,
            exclude: self.exclude,
            extra_css: self.extra_css,
            primitives,
            debug,
            perf,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn audit(level: ConformanceLevel) -> LcAudit {
        LcAudit::builder().level(level).build().expect("audit")
    }

    fn messages(results: &ContrastCheckResults) -> Vec<String> {
        results
            .apca
            .nodes
            .iter()
            .flat_map(|node| node.any.iter().map(|check| check.message.clone()))
            .collect()
    }

    #[test]
    fn black_on_white_has_no_violations() {
        let results = audit(ConformanceLevel::Bronze)
            .check_html(r#"<body style="background: rgb(255,255,255)"><p style="color: rgb(0,0,0)">Hello</p></body>"#);
        assert!(results.apca.nodes.is_empty());
        assert_eq!(results.apca.impact, None);
    }

    #[test]
    fn light_gray_text_fails_bronze() {
        let results = audit(ConformanceLevel::Bronze)
            .check_html(r#"<p style="color: rgb(170,170,170)">Hello</p>"#);
        assert_eq!(results.apca.nodes.len(), 1);
        assert_eq!(results.apca.id, "apca-contrast");
        assert!(messages(&results)[0].contains("below the minimum of 75 Lc"));
    }

    #[test]
    fn gold_small_text_mentions_font_size_floor() {
        let results = audit(ConformanceLevel::Gold)
            .check_html(r#"<p style="color: rgb(170,170,170); font-size: 12px">Hello</p>"#);
        assert!(messages(&results).iter().any(|m| m.contains("minimum 16px")));
    }

    #[test]
    fn silver_large_text_exceeds_ceiling() {
        let results = audit(ConformanceLevel::Silver)
            .check_html(r#"<h1 style="color: #000; font-size: 40px; font-weight: 400">Title</h1>"#);
        assert!(messages(&results).iter().any(|m| m.contains("exceeds the maximum")));
    }

    #[test]
    fn results_are_reproducible() {
        let html = r#"<div><p style="color: #767676">One</p><span style="color: #8a8a8a">Two</span></div>"#;
        let audit = audit(ConformanceLevel::Silver);
        let first = audit.check_html(html);
        let second = audit.check_html(html);
        assert_eq!(first, second);
    }

    #[test]
    fn extra_css_participates_in_the_cascade() {
        let html = r#"<p class="muted">Quiet</p>"#;
        let plain = audit(ConformanceLevel::Bronze).check_html(html);
        assert!(plain.apca.nodes.is_empty());
        let styled = LcAudit::builder()
            .extra_css(".muted { color: #bbb }")
            .build()
            .expect("audit")
            .check_html(html);
        assert_eq!(styled.apca.nodes.len(), 1);
    }

    #[test]
    fn element_root_checks_only_its_descendants() {
        let doc = parse_document(
            r#"<html><body><p style="color: #ccc">outside</p><section id="panel"><p style="color: #ccc">inside</p></section></body></html>"#,
        );
        let styles = StyleSnapshot::from_document(&doc);
        let panel = doc.select_first("#panel").expect("panel");
        let results = run_apca_check(
            panel.as_node(),
            &styles,
            ApcaW3::load().as_ref(),
            &ApcaOptions::default(),
            &[],
        );
        assert_eq!(results.apca.nodes.len(), 1);
        assert!(results.apca.nodes[0].html.contains("inside"));
        assert_eq!(
            results.contract_fingerprint,
            lcaudit_rule_contract::contract_fingerprint()
        );
    }

    #[test]
    fn batch_results_keep_input_order() {
        let pages = vec![
            r#"<p style="color: #000">ok</p>"#.to_string(),
            r#"<p style="color: #bbb">bad</p><p style="color: #ccc">worse</p>"#.to_string(),
            r#"<p style="color: #bbb">bad</p>"#.to_string(),
        ];
        let results = audit(ConformanceLevel::Bronze)
            .check_html_batch_parallel(&pages);
        let counts: Vec<usize> = results.iter().map(|r| r.apca.nodes.len()).collect();
        assert_eq!(counts, vec![0, 2, 1]);
    }

    #[test]
    fn strict_selectors_fail_the_build() {
        let err = LcAudit::builder()
            .exclude_selector("div[[")
            .strict_selectors(true)
            .build()
            .err()
            .expect("invalid selector rejected");
        assert!(matches!(err, LcAuditError::InvalidSelector(ref s) if s.contains("div[[")));

        let lenient = LcAudit::builder()
            .exclude_selector("div[[")
            .build()
            .expect("lenient build")
            .check_html("<p>x</p>");
        assert_eq!(lenient.warnings.len(), 1);
    }

    #[test]
    fn env_overrides_configure_the_builder() {
        let env: HashMap<&str, &str> = HashMap::from([
            (options::ENV_LEVEL, "gold"),
            (options::ENV_EXCLUDE, ".ads, nav"),
        ]);
        let builder = LcAudit::builder()
            .from_env_with(|name| env.get(name).map(|v| v.to_string()))
            .expect("env");
        let audit = builder.build().expect("audit");
        assert_eq!(audit.options().level, ConformanceLevel::Gold);
        assert_eq!(audit.exclude, vec![".ads".to_string(), "nav".to_string()]);
    }

    #[test]
    fn debug_and_perf_logs_are_written() {
        let dir = std::env::temp_dir();
        let stamp = std::process::id();
        let debug_path = dir.join(format!("lcaudit_lib_debug_{stamp}.jsonl"));
        let perf_path = dir.join(format!("lcaudit_lib_perf_{stamp}.jsonl"));
        {
            let audit = LcAudit::builder()
                .icon_selector("[[broken")
                .debug_log(&debug_path)
                .perf_log(&perf_path)
                .build()
                .expect("audit");
            let results = audit
                .check_html(r#"<p style="color: #ccc">x</p>"#);
            assert_eq!(results.warnings.len(), 1);
        }
        let debug = std::fs::read_to_string(&debug_path).expect("debug log");
        assert!(debug.contains("\"engine.warning\""));
        assert!(debug.contains("\"apca.violation\""));
        assert!(debug.contains("\"debug.summary\""));
        let perf = std::fs::read_to_string(&perf_path).expect("perf log");
        assert!(perf.contains("\"check.text\""));
        assert!(perf.contains("\"perf.counts\""));
        let _ = std::fs::remove_file(&debug_path);
        let _ = std::fs::remove_file(&perf_path);
        let _ = std::fs::remove_file(dir.join(format!("lcaudit_lib_perf_{stamp}_hot.log")));
    }
}
