//! Hierarchical story test results
//!
//! Epic -> Story -> Acceptance Criterion -> Test, as produced by the story
//! test runner. Read-only input for the story uploader.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Outcome of a single test case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
    Skipped,
}

impl TestStatus {
    pub fn name(&self) -> &'static str {
        match self {
            TestStatus::Passed => "passed",
            TestStatus::Failed => "failed",
            TestStatus::Skipped => "skipped",
        }
    }
}

/// Epic the result belongs to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpicInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub name: String,
    pub status: TestStatus,
    /// Duration in milliseconds
    #[serde(default)]
    pub duration: u64,
    #[serde(default)]
    pub assertions: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcceptanceCriterion {
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tests: Vec<TestCase>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryTest {
    pub story_id: String,
    pub title: String,
    #[serde(default)]
    pub epic: String,
    #[serde(default)]
    pub services: Vec<String>,
    #[serde(default)]
    pub acceptance_criteria: Vec<AcceptanceCriterion>,
}

impl StoryTest {
    /// All tests of the story, flattened across criteria in declared order
    pub fn tests(&self) -> impl Iterator<Item = &TestCase> {
        self.acceptance_criteria.iter().flat_map(|ac| ac.tests.iter())
    }
}

/// Per-story counters as reported by the runner
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoryStats {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Runner-reported summary; informational only
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TestSummary {
    pub total_tests: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub total_duration: u64,
    pub tests_by_story: BTreeMap<String, StoryStats>,
    pub tests_by_acceptance_criteria: usize,
}

/// Complete hierarchical result for one epic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryTestResult {
    pub id: String,
    pub title: String,
    /// Run start, milliseconds since the Unix epoch
    pub timestamp: i64,
    pub epic: EpicInfo,
    #[serde(default)]
    pub stories: Vec<StoryTest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<TestSummary>,
}

impl StoryTestResult {
    /// Every test in traversal order (story, criterion, test)
    pub fn all_tests(&self) -> impl Iterator<Item = &TestCase> {
        self.stories.iter().flat_map(StoryTest::tests)
    }

    pub fn criteria_count(&self) -> usize {
        self.stories.iter().map(|s| s.acceptance_criteria.len()).sum()
    }

    /// Count outcomes from the tree itself rather than the runner summary
    pub fn tally(&self) -> StoryStats {
        self.all_tests().fold(StoryStats::default(), |mut acc, test| {
            acc.total += 1;
            match test.status {
                TestStatus::Passed => acc.passed += 1,
                TestStatus::Failed => acc.failed += 1,
                TestStatus::Skipped => acc.skipped += 1,
            }
            acc
        })
    }
}
