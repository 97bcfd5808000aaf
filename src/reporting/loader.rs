//! Readers for the result files the uploader consumes

use crate::models::{AllureResult, StoryTestResult, ValidationReport};
use crate::{Context, Result};
use serde::de::DeserializeOwned;
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

const ALLURE_RESULT_SUFFIX: &str = "-result.json";

fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {what}: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Invalid {what}: {}", path.display()))
}

pub fn load_story_results(path: &Path) -> Result<StoryTestResult> {
    read_json(path, "story test results")
}

pub fn load_validation_report(path: &Path) -> Result<ValidationReport> {
    read_json(path, "validation report")
}

/// Every `*-result.json` under `dir`, ordered by start time
///
/// Files that are not Allure results are skipped with a warning.
pub fn load_allure_results(dir: &Path) -> Result<Vec<AllureResult>> {
    if !dir.is_dir() {
        anyhow::bail!("Allure results directory not found: {}", dir.display());
    }

    let mut results = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to scan {}", dir.display()))?;
        let is_result = entry.file_type().is_file()
            && entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.ends_with(ALLURE_RESULT_SUFFIX));
        if !is_result {
            continue;
        }

        match read_json::<AllureResult>(entry.path(), "allure result") {
            Ok(result) => results.push(result),
            Err(e) => warn!(path = %entry.path().display(), error = %format!("{e:#}"), "skipping allure file"),
        }
    }

    results.sort_by_key(|r| r.start);
    debug!(dir = %dir.display(), count = results.len(), "allure results loaded");
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_allure_results_filters_and_sorts() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("nested");
        std::fs::create_dir(&nested).unwrap();

        std::fs::write(
            dir.path().join("b-result.json"),
            r#"{"uuid":"b","name":"second","status":"passed","start":20,"stop":30}"#,
        )
        .unwrap();
        std::fs::write(
            nested.join("a-result.json"),
            r#"{"uuid":"a","name":"first","status":"broken","start":10,"stop":15}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("c-container.json"), "{}").unwrap();
        std::fs::write(dir.path().join("d-result.json"), "not json").unwrap();

        let results = load_allure_results(dir.path()).unwrap();
        let names: Vec<_> = results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[test]
    fn test_missing_directory_is_error() {
        let dir = TempDir::new().unwrap();
        assert!(load_allure_results(&dir.path().join("missing")).is_err());
    }

    #[test]
    fn test_invalid_story_results_has_context() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("results.json");
        std::fs::write(&path, r#"{"id":"x"}"#).unwrap();

        let err = load_story_results(&path).unwrap_err();
        assert!(format!("{err:#}").contains("Invalid story test results"));
    }
}
