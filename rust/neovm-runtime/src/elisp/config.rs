//! Evaluator settings that embedders choose at startup.

use std::path::PathBuf;

/// Initial values for the evaluator ceilings and loader settings.
///
/// The ceilings stay adjustable afterwards through the Lisp variables
/// `max-specpdl-size` and `max-lisp-eval-depth`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EvaluatorConfig {
    pub max_specpdl_size: i64,
    pub max_lisp_eval_depth: i64,
    /// Evaluate top-level forms with lexical scoping.
    pub lexical_binding: bool,
    /// Directories searched by `load` and `require`, in order.
    pub load_path: Vec<PathBuf>,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            max_specpdl_size: 1300,
            max_lisp_eval_depth: 600,
            lexical_binding: false,
            load_path: Vec::new(),
        }
    }
}

impl EvaluatorConfig {
    /// Defaults overridden by `NEOVM_MAX_SPECPDL_SIZE`,
    /// `NEOVM_MAX_LISP_EVAL_DEPTH`, `NEOVM_LEXICAL_BINDING` and
    /// `NEOVM_LOAD_PATH` (a platform path list). Unparsable values are
    /// logged and ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(n) = parse_int(&lookup, "NEOVM_MAX_SPECPDL_SIZE") {
            config.max_specpdl_size = n;
        }
        if let Some(n) = parse_int(&lookup, "NEOVM_MAX_LISP_EVAL_DEPTH") {
            config.max_lisp_eval_depth = n;
        }
        if let Some(raw) = lookup("NEOVM_LEXICAL_BINDING") {
            match raw.trim() {
                "1" | "t" | "true" | "yes" => config.lexical_binding = true,
                "0" | "nil" | "false" | "no" | "" => config.lexical_binding = false,
                other => tracing::warn!(value = other, "ignoring NEOVM_LEXICAL_BINDING"),
            }
        }
        if let Some(raw) = lookup("NEOVM_LOAD_PATH") {
            config.load_path = std::env::split_paths(&raw)
                .filter(|p| !p.as_os_str().is_empty())
                .collect();
        }
        config
    }
}

fn parse_int<F>(lookup: &F, key: &str) -> Option<i64>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<i64>() {
        Ok(n) if n > 0 => Some(n),
        _ => {
            tracing::warn!(key, value = %raw, "ignoring non-positive or malformed setting");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_without_environment() {
        let config = EvaluatorConfig::from_lookup(lookup_from(&[]));
        assert_eq!(config, EvaluatorConfig::default());
        assert_eq!(config.max_specpdl_size, 1300);
        assert_eq!(config.max_lisp_eval_depth, 600);
    }

    #[test]
    fn environment_overrides_are_parsed() {
        let config = EvaluatorConfig::from_lookup(lookup_from(&[
            ("NEOVM_MAX_SPECPDL_SIZE", "2000"),
            ("NEOVM_MAX_LISP_EVAL_DEPTH", " 800 "),
            ("NEOVM_LEXICAL_BINDING", "t"),
        ]));
        assert_eq!(config.max_specpdl_size, 2000);
        assert_eq!(config.max_lisp_eval_depth, 800);
        assert!(config.lexical_binding);
    }

    #[test]
    fn malformed_values_keep_defaults() {
        let config = EvaluatorConfig::from_lookup(lookup_from(&[
            ("NEOVM_MAX_SPECPDL_SIZE", "lots"),
            ("NEOVM_MAX_LISP_EVAL_DEPTH", "-5"),
            ("NEOVM_LEXICAL_BINDING", "maybe"),
        ]));
        assert_eq!(config, EvaluatorConfig::default());
    }

    #[test]
    fn load_path_splits_on_platform_separator() {
        let joined = std::env::join_paths(["/a/lisp", "/b/lisp"]).expect("join");
        let joined = joined.to_string_lossy().into_owned();
        let config =
            EvaluatorConfig::from_lookup(lookup_from(&[("NEOVM_LOAD_PATH", joined.as_str())]));
        assert_eq!(
            config.load_path,
            vec![PathBuf::from("/a/lisp"), PathBuf::from("/b/lisp")]
        );
    }
}
