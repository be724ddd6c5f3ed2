//! Static pre-execution policy used by the in-memory executor.
//!
//! A cut-down version of the sandbox's import and call screening, good
//! enough to produce realistic violation lists in tests.

use regex::Regex;
use std::collections::BTreeMap;

const PYTHON_BANNED_MODULES: &[&str] = &[
    "os",
    "subprocess",
    "socket",
    "requests",
    "urllib",
    "http",
    "importlib",
    "multiprocessing",
    "threading",
    "pickle",
    "ctypes",
];

#[derive(Debug, Clone)]
pub struct StaticPolicy {
    extension: String,
    banned_modules: Vec<String>,
    import_re: Regex,
    call_rules: Vec<(Regex, String)>,
}

impl StaticPolicy {
    /// Python sandbox rules: banned imports, dynamic execution, file I/O
    #[must_use]
    pub fn python_sandbox() -> Self {
        let rules = [
            (r"\b(?:eval|exec|compile)\s*\(", "dynamic code execution"),
            (r"\bopen\s*\(", "file I/O is restricted in the sandbox"),
            (
                r"__(?:import|builtins|globals|subclasses)__",
                "dangerous dunder access",
            ),
        ];
        Self {
            extension: ".py".to_string(),
            banned_modules: PYTHON_BANNED_MODULES.iter().map(|m| (*m).to_string()).collect(),
            import_re: Regex::new(r"(?m)^\s*(?:from|import)\s+([A-Za-z_][A-Za-z0-9_]*)")
                .expect("static import pattern"),
            call_rules: rules
                .iter()
                .map(|(re, msg)| (Regex::new(re).expect("static call pattern"), (*msg).to_string()))
                .collect(),
        }
    }

    /// Violations in one file, unprefixed
    #[must_use]
    pub fn check_source(&self, content: &str) -> Vec<String> {
        let mut violations = Vec::new();
        for caps in self.import_re.captures_iter(content) {
            let module = &caps[1];
            if self.banned_modules.iter().any(|m| m == module) {
                let msg = format!("forbidden import: {module}");
                if !violations.contains(&msg) {
                    violations.push(msg);
                }
            }
        }
        for (re, msg) in &self.call_rules {
            if re.is_match(content) {
                violations.push(msg.clone());
            }
        }
        violations
    }

    /// Violations across a file map, prefixed with the file path.
    ///
    /// Files without the source extension are skipped.
    #[must_use]
    pub fn check(&self, files: &BTreeMap<String, String>) -> Vec<String> {
        files
            .iter()
            .filter(|(path, _)| path.ends_with(&self.extension))
            .flat_map(|(path, content)| {
                self.check_source(content)
                    .into_iter()
                    .map(move |v| format!("{path}: {v}"))
            })
            .collect()
    }
}

impl Default for StaticPolicy {
    fn default() -> Self {
        Self::python_sandbox()
    }
}
