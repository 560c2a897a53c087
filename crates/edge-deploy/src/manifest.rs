//! Function manifest
//!
//! Single source of truth for the set of edge functions. Packaging,
//! registration and probing all iterate the same list, so the three steps
//! cannot drift out of sync.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

/// One edge function known to the deployment tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionSpec {
    /// Function name, as it appears in URLs and directory names
    pub name: String,

    /// Slug registered alongside the name (currently always equal to it)
    pub slug: String,

    /// Sample request body POSTed during smoke testing
    pub smoke_payload: Value,
}

impl FunctionSpec {
    fn new(name: &str, smoke_payload: Value) -> Self {
        Self {
            name: name.to_string(),
            slug: name.to_string(),
            smoke_payload,
        }
    }

    /// Path of the function's entry point under the project root
    pub fn source_path(&self, project_root: &Path) -> PathBuf {
        project_root
            .join("supabase")
            .join("functions")
            .join(&self.name)
            .join("index.ts")
    }
}

/// The functions this project deploys, with their smoke-test payloads.
pub fn default_manifest() -> Vec<FunctionSpec> {
    vec![
        FunctionSpec::new(
            "market-data",
            json!({ "action": "quote", "symbol": "AAPL" }),
        ),
        FunctionSpec::new(
            "trading-signals",
            json!({
                "symbol": "AAPL",
                "strategy": "jesse_livermore",
                "timeframe": "D",
            }),
        ),
        FunctionSpec::new(
            "portfolio-management",
            json!({
                "action": "calculate_performance",
                "portfolioId": "test-portfolio-id",
            }),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_default_manifest_names() {
        let manifest = default_manifest();
        let names: Vec<&str> = manifest.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["market-data", "trading-signals", "portfolio-management"]
        );

        let unique: HashSet<&str> = names.iter().copied().collect();
        assert_eq!(unique.len(), manifest.len());
    }

    #[test]
    fn test_slug_matches_name() {
        for func in default_manifest() {
            assert_eq!(func.name, func.slug);
        }
    }

    #[test]
    fn test_smoke_payloads_are_objects() {
        for func in default_manifest() {
            assert!(func.smoke_payload.is_object(), "{} payload", func.name);
        }
    }

    #[test]
    fn test_source_path() {
        let func = &default_manifest()[0];
        assert_eq!(
            func.source_path(Path::new("/srv/app")),
            PathBuf::from("/srv/app/supabase/functions/market-data/index.ts")
        );
    }
}
