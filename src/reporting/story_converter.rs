//! Story test result shapes
//!
//! Builds the launch, the nested suites (epic, story, acceptance criterion)
//! and the per-test items and logs for a `StoryTestResult`.

use crate::models::{
    AcceptanceCriterion, Attribute, ItemType, LaunchMode, LogLevel, ReportLog, ReportStatus,
    StartLaunchRequest, StartTestItemRequest, StoryTest, StoryTestResult, TestCase, TestStatus,
};

/// Rollup over a set of tests
///
/// `failed` if any failed; else `skipped` if all are skipped (including an
/// empty set); else `passed`.
pub fn calculate_suite_status<'a>(tests: impl IntoIterator<Item = &'a TestCase>) -> TestStatus {
    let mut all_skipped = true;
    for test in tests {
        match test.status {
            TestStatus::Failed => return TestStatus::Failed,
            TestStatus::Passed => all_skipped = false,
            TestStatus::Skipped => {}
        }
    }

    if all_skipped {
        TestStatus::Skipped
    } else {
        TestStatus::Passed
    }
}

pub fn report_status(status: TestStatus) -> ReportStatus {
    match status {
        TestStatus::Passed => ReportStatus::Passed,
        TestStatus::Failed => ReportStatus::Failed,
        TestStatus::Skipped => ReportStatus::Skipped,
    }
}

pub fn launch_request(result: &StoryTestResult) -> StartLaunchRequest {
    StartLaunchRequest {
        name: result.title.clone(),
        description: Some(format!("{}: {}", result.epic.name, result.epic.description)),
        start_time: result.timestamp,
        attributes: vec![
            Attribute::new("epic", result.epic.id.as_str()),
            Attribute::new("type", "story-test"),
            Attribute::new("totalTests", result.tally().total.to_string()),
        ],
        mode: Some(LaunchMode::Default),
    }
}

pub fn epic_suite(result: &StoryTestResult, launch_id: &str) -> StartTestItemRequest {
    suite_request(
        result.epic.name.clone(),
        result.epic.description.clone(),
        result.timestamp,
        launch_id,
        None,
        vec![
            Attribute::new("epicId", result.epic.id.as_str()),
            Attribute::new("storyCount", result.stories.len().to_string()),
        ],
    )
}

pub fn story_suite(
    story: &StoryTest,
    launch_id: &str,
    parent_id: &str,
    start_time: i64,
) -> StartTestItemRequest {
    let criteria = story.acceptance_criteria.len().to_string();

    let mut attributes = vec![
        Attribute::new("storyId", story.story_id.as_str()),
        Attribute::new("epic", story.epic.as_str()),
    ];
    attributes.extend(
        story
            .services
            .iter()
            .map(|service| Attribute::new("service", service.as_str())),
    );
    attributes.push(Attribute::new("criteria", criteria.as_str()));
    attributes.push(Attribute::new("type", "story"));

    suite_request(
        format!("{}: {}", story.story_id, story.title),
        format!(
            "**Epic:** {}\n\n**Services Involved:** {}\n\n**Acceptance Criteria:** {}",
            story.epic,
            story.services.join(", "),
            criteria
        ),
        start_time,
        launch_id,
        Some(parent_id),
        attributes,
    )
}

pub fn criterion_suite(
    criterion: &AcceptanceCriterion,
    launch_id: &str,
    parent_id: &str,
    start_time: i64,
) -> StartTestItemRequest {
    suite_request(
        format!("{}: {}", criterion.id, criterion.description),
        format!("**Tests:** {}", criterion.tests.len()),
        start_time,
        launch_id,
        Some(parent_id),
        vec![
            Attribute::new("criterionId", criterion.id.as_str()),
            Attribute::new("type", "acceptance-criterion"),
            Attribute::new("tests", criterion.tests.len().to_string()),
        ],
    )
}

pub fn test_item(
    test: &TestCase,
    launch_id: &str,
    parent_id: &str,
    start_time: i64,
) -> StartTestItemRequest {
    let description = if let Some(error) = &test.error {
        format!("❌ **Error:** {error}")
    } else if let Some(reason) = &test.skip_reason {
        format!("⏭️ **Skipped:** {reason}")
    } else {
        format!(
            "✓ Test executed successfully with {} assertions",
            test.assertions
        )
    };

    StartTestItemRequest {
        name: test.name.replace('_', " "),
        description: Some(description),
        item_type: ItemType::Step,
        start_time,
        launch_uuid: launch_id.to_string(),
        parent_uuid: Some(parent_id.to_string()),
        attributes: vec![
            Attribute::new("assertions", test.assertions.to_string()),
            Attribute::new("duration", format!("{}ms", test.duration)),
            Attribute::new("status", test.status.name()),
            Attribute::new("type", "test"),
        ],
        code_ref: None,
        parameters: Vec::new(),
        unique_id: None,
        has_stats: None,
    }
}

/// Error and skip logs first, then the assertion count
pub fn test_logs(test: &TestCase, item_id: &str, time: i64) -> Vec<ReportLog> {
    let log = |message: String, level| ReportLog {
        item_uuid: item_id.to_string(),
        time,
        message,
        level,
    };

    let mut logs = Vec::new();
    if let Some(error) = &test.error {
        logs.push(log(format!("❌ Test Failed: {error}"), LogLevel::Error));
    }
    if let Some(reason) = &test.skip_reason {
        logs.push(log(format!("⏭️  Test Skipped: {reason}"), LogLevel::Warn));
    }
    logs.push(log(
        format!("✓ Assertions executed: {}", test.assertions),
        LogLevel::Info,
    ));
    logs
}

fn suite_request(
    name: String,
    description: String,
    start_time: i64,
    launch_id: &str,
    parent_id: Option<&str>,
    attributes: Vec<Attribute>,
) -> StartTestItemRequest {
    StartTestItemRequest {
        name,
        description: Some(description),
        item_type: ItemType::Suite,
        start_time,
        launch_uuid: launch_id.to_string(),
        parent_uuid: parent_id.map(str::to_string),
        attributes,
        code_ref: None,
        parameters: Vec::new(),
        unique_id: None,
        has_stats: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn case(name: &str, status: TestStatus) -> TestCase {
        TestCase {
            name: name.to_string(),
            status,
            duration: 25,
            assertions: 3,
            error: None,
            skip_reason: None,
        }
    }

    #[test]
    fn test_rollup_rules() {
        use TestStatus::*;
        fn rollup(statuses: &[TestStatus]) -> TestStatus {
            let tests: Vec<_> = statuses.iter().map(|&s| case("t", s)).collect();
            calculate_suite_status(&tests)
        }

        assert_eq!(rollup(&[]), Skipped);
        assert_eq!(rollup(&[Skipped, Skipped]), Skipped);
        assert_eq!(rollup(&[Passed, Skipped]), Passed);
        assert_eq!(rollup(&[Passed, Failed, Skipped]), Failed);
    }

    #[test]
    fn test_rollup_is_monotonic() {
        use TestStatus::*;
        let sets: [&[TestStatus]; 4] = [&[], &[Skipped], &[Passed, Skipped], &[Passed]];
        for set in sets {
            let mut tests: Vec<_> = set.iter().map(|&s| case("t", s)).collect();
            tests.push(case("extra", Failed));
            assert_eq!(calculate_suite_status(&tests), Failed, "{set:?}");
        }

        let mut skipped = vec![case("a", Skipped), case("b", Skipped)];
        skipped.push(case("c", Passed));
        assert_eq!(calculate_suite_status(&skipped), Passed);
    }

    #[test]
    fn test_item_name_and_description() {
        let mut test = case("rejects_bad_notional", TestStatus::Failed);
        test.error = Some("expected 400".into());

        let item = test_item(&test, "launch", "ac", 1000);
        assert_eq!(item.name, "rejects bad notional");
        assert_eq!(item.item_type, ItemType::Step);
        assert_eq!(item.description.as_deref(), Some("❌ **Error:** expected 400"));
        assert!(item.attributes.contains(&Attribute::new("duration", "25ms")));
        assert!(item.attributes.contains(&Attribute::new("status", "failed")));
    }

    #[test]
    fn test_logs_order() {
        let mut test = case("t", TestStatus::Skipped);
        test.error = Some("boom".into());
        test.skip_reason = Some("env down".into());

        let logs = test_logs(&test, "item", 5);
        let levels: Vec<_> = logs.iter().map(|l| l.level).collect();
        assert_eq!(levels, vec![LogLevel::Error, LogLevel::Warn, LogLevel::Info]);
        assert_eq!(logs[2].message, "✓ Assertions executed: 3");
    }

    #[test]
    fn test_story_suite_attributes() {
        let story = StoryTest {
            story_id: "story_3_1".into(),
            title: "Create trade".into(),
            epic: "epic_03".into(),
            services: vec!["backend".into(), "gateway".into()],
            acceptance_criteria: Vec::new(),
        };
        let suite = story_suite(&story, "launch", "epic", 0);
        assert_eq!(suite.name, "story_3_1: Create trade");
        let keys: Vec<_> = suite.attributes.iter().filter_map(|a| a.key.as_deref()).collect();
        assert_eq!(keys, vec!["storyId", "epic", "service", "service", "criteria", "type"]);
    }
}
