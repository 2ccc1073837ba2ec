use crate::{ConformanceLevel, LcAudit, LcAuditBuilder, LcAuditError, UseCase};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::{PyList, PyModule};

#[pyclass]
struct Auditor {
    audit: LcAudit,
    builder: LcAuditBuilder,
}

fn configure(
    level: &str,
    use_case: &str,
    icon_selectors: Option<Vec<String>>,
    exclude: Option<Vec<String>>,
    css: Option<String>,
) -> PyResult<LcAuditBuilder> {
    let level: ConformanceLevel = level.parse().map_err(to_py_err)?;
    let use_case: UseCase = use_case.parse().map_err(to_py_err)?;
    let mut builder = LcAudit::builder().level(level).use_case(use_case);
    if let Some(selectors) = icon_selectors {
        builder = builder.icon_selectors(selectors);
    }
    if let Some(selectors) = exclude {
        builder = builder.exclude_selectors(selectors);
    }
    if let Some(css) = css {
        builder = builder.extra_css(css);
    }
    Ok(builder)
}

#[pymethods]
impl Auditor {
    #[new]
    #[pyo3(signature = (
        level="bronze",
        use_case="body",
        icon_selectors=None,
        exclude=None,
        css=None,
        strict_selectors=false,
        debug_log=None,
        perf_log=None
    ))]
    #[allow(clippy::too_many_arguments)]
    fn new(
        level: &str,
        use_case: &str,
        icon_selectors: Option<Vec<String>>,
        exclude: Option<Vec<String>>,
        css: Option<String>,
        strict_selectors: bool,
        debug_log: Option<String>,
        perf_log: Option<String>,
    ) -> PyResult<Self> {
        let mut builder = configure(level, use_case, icon_selectors, exclude, css)?
            .strict_selectors(strict_selectors);
        if let Some(path) = debug_log {
            builder = builder.debug_log(path);
        }
        if let Some(path) = perf_log {
            builder = builder.perf_log(path);
        }
        let audit = builder.clone().build().map_err(to_py_err)?;
        Ok(Self { audit, builder })
    }

    /// Appends CSS applied after the document's own stylesheets.
    fn add_css(&mut self, css: &str) -> PyResult<()> {
        self.builder = self.builder.clone().extra_css(css);
        self.audit = self.builder.clone().build().map_err(to_py_err)?;
        Ok(())
    }

    fn check_html(&self, py: Python<'_>, html: &str) -> PyResult<String> {
        let results = py.allow_threads(|| self.audit.check_html(html));
        results.to_json().map_err(to_py_err)
    }

    fn check_html_batch(&self, py: Python<'_>, html_list: Vec<String>) -> PyResult<PyObject> {
        let batch = py.allow_threads(|| self.audit.check_html_batch_parallel(&html_list));
        let out = PyList::empty_bound(py);
        for results in batch {
            out.append(results.to_json().map_err(to_py_err)?)?;
        }
        Ok(out.to_object(py))
    }

    fn violation_count(&self, py: Python<'_>, html: &str) -> usize {
        py.allow_threads(|| self.audit.check_html(html).violation_count())
    }
}

#[pyfunction]
#[pyo3(signature = (html, css=None, level="bronze", use_case="body", icon_selectors=None, exclude=None))]
fn check_html(
    py: Python<'_>,
    html: &str,
    css: Option<String>,
    level: &str,
    use_case: &str,
    icon_selectors: Option<Vec<String>>,
    exclude: Option<Vec<String>>,
) -> PyResult<String> {
    let audit = configure(level, use_case, icon_selectors, exclude, css)?
        .build()
        .map_err(to_py_err)?;
    let results = py.allow_threads(|| audit.check_html(html));
    results.to_json().map_err(to_py_err)
}

#[pyfunction]
fn contract_fingerprint() -> String {
    crate::contract_fingerprint()
}

#[pymodule]
fn lcaudit(_py: Python<'_>, module: &Bound<'_, PyModule>) -> PyResult<()> {
    module.add_class::<Auditor>()?;
    module.add_function(wrap_pyfunction!(check_html, module)?)?;
    module.add_function(wrap_pyfunction!(contract_fingerprint, module)?)?;
    Ok(())
}

fn to_py_err(err: LcAuditError) -> PyErr {
    PyValueError::new_err(err.to_string())
}
