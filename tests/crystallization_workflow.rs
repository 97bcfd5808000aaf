//! Integration tests for the crystallization workflow
//!
//! Exercises the registry end to end on real files:
//! - register, review, crystallize and lock
//! - precondition failures leaving records untouched
//! - persistence across registry instances
//! - content changes on locked and crystallized tests

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use test_evidence::crystallization::{CrystallizationRegistry, DEFAULT_REGISTRY_FILE};
use test_evidence::error::{CrystallizationError, UnmetCondition};
use test_evidence::models::{
    CodeQualityMetrics, CrystallizationConfig, CrystallizationStatus, OperationType,
    ReviewDecision, TestFramework, TestType, ValidationResult,
};

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    fn registry_path(&self) -> PathBuf {
        self.dir.path().join(DEFAULT_REGISTRY_FILE)
    }

    /// Write a test file and return its path as registry key
    fn write_test(&self, name: &str, content: &str) -> String {
        let path = self.dir.path().join(name);
        fs::write(&path, content).unwrap();
        path.to_string_lossy().into_owned()
    }

    async fn open(&self, config: CrystallizationConfig) -> CrystallizationRegistry {
        CrystallizationRegistry::open(config, self.registry_path())
            .await
            .unwrap()
    }
}

/// No validation gate and no score floor
fn without_validation() -> CrystallizationConfig {
    CrystallizationConfig {
        require_validation: false,
        min_quality_score: 0.0,
        ..Default::default()
    }
}

fn valid_result(file: &str) -> ValidationResult {
    ValidationResult {
        file_path: file.to_string(),
        framework: TestFramework::Playwright,
        test_type: TestType::Flow,
        valid: true,
        issues: Vec::new(),
        metrics: CodeQualityMetrics {
            test_case_count: 3,
            assertion_count: 9,
            assertions_per_test: 3.0,
            has_setup: true,
            has_teardown: true,
            ..Default::default()
        },
        timestamp: chrono::Utc::now(),
        duration: 40,
    }
}

fn registry_json(path: &Path) -> serde_json::Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

#[tokio::test]
async fn test_register_review_crystallize() {
    let ws = Workspace::new();
    let file = ws.write_test("file.spec.ts", "test('stores trade', () => {});");
    let mut registry = ws.open(without_validation()).await;

    let test = registry.register_test(&file, "S-1").await.unwrap();
    assert_eq!(test.status, CrystallizationStatus::Generated);
    assert!(test.content_hash.starts_with("sha256:"));

    let op = registry
        .review(&file, "alice", ReviewDecision::Approve, Some("looks good"))
        .await
        .unwrap();
    assert!(op.success);
    assert_eq!(op.new_status, CrystallizationStatus::Approved);

    let op = registry.crystallize(&file, "alice").await.unwrap();
    assert!(op.success, "{}", op.message);

    let test = registry.get_test(&file).unwrap();
    assert_eq!(test.status, CrystallizationStatus::Crystallized);
    assert_eq!(test.version, 1);
    assert!(test.history.is_empty());
    assert!(test.locked);
    assert!(test.crystallized_at.is_some());
}

#[tokio::test]
async fn test_crystallize_with_attached_validation() {
    let ws = Workspace::new();
    let file = ws.write_test("flow.spec.ts", "test('checkout', async () => {});");
    let mut registry = ws.open(CrystallizationConfig::default()).await;

    registry.register_test(&file, "S-2").await.unwrap();
    let result = valid_result(&file);
    let score = result.metrics.quality_score();
    let op = registry
        .attach_validation(&file, result, score, "validator")
        .await
        .unwrap();
    assert!(op.success);

    registry
        .review(&file, "bob", ReviewDecision::Approve, None)
        .await
        .unwrap();
    let op = registry.crystallize(&file, "bob").await.unwrap();
    assert!(op.success, "{}", op.message);

    let test = registry.get_test(&file).unwrap();
    assert_eq!(test.framework, TestFramework::Playwright);
    assert_eq!(test.test_type, TestType::Flow);
    assert_eq!(test.review.quality_score, 100.0);
    assert_eq!(registry.tests_by_framework(TestFramework::Playwright).len(), 1);
}

#[tokio::test]
async fn test_missing_validation_blocks_crystallization() {
    let ws = Workspace::new();
    let file = ws.write_test("unvalidated.spec.ts", "test('x', () => {});");
    let mut registry = ws.open(CrystallizationConfig::default()).await;

    registry.register_test(&file, "S-3").await.unwrap();
    registry
        .review(&file, "carol", ReviewDecision::Approve, None)
        .await
        .unwrap();

    let op = registry.crystallize(&file, "carol").await.unwrap();
    assert!(!op.success);
    assert_eq!(op.previous_status, CrystallizationStatus::Approved);
    assert_eq!(op.new_status, CrystallizationStatus::Approved);
    assert_eq!(
        op.failure,
        Some(CrystallizationError::Precondition {
            condition: UnmetCondition::MissingValidation
        })
    );

    // the record is untouched, the failed attempt is still audited
    let test = registry.get_test(&file).unwrap();
    assert_eq!(test.status, CrystallizationStatus::Approved);
    assert!(!test.locked);
    let last = registry.operations().last().unwrap();
    assert_eq!(last.op_type, OperationType::Crystallize);
    assert!(!last.success);
}

#[tokio::test]
async fn test_recrystallize_locked_unchanged_is_noop() {
    let ws = Workspace::new();
    let file = ws.write_test("stable.spec.ts", "test('stable', () => {});");
    let mut registry = ws.open(without_validation()).await;

    registry.register_test(&file, "S-4").await.unwrap();
    registry
        .review(&file, "dave", ReviewDecision::Approve, None)
        .await
        .unwrap();
    registry.crystallize(&file, "dave").await.unwrap();
    let before = registry.get_test(&file).unwrap().clone();
    assert!(before.locked);

    let op = registry.crystallize(&file, "dave").await.unwrap();
    assert!(op.success);
    assert_eq!(op.previous_status, CrystallizationStatus::Crystallized);
    assert_eq!(op.new_status, CrystallizationStatus::Crystallized);

    let after = registry.get_test(&file).unwrap();
    assert_eq!(after.version, before.version);
    assert_eq!(after.content_hash, before.content_hash);
}

#[tokio::test]
async fn test_locked_test_rejects_content_change() {
    let ws = Workspace::new();
    let file = ws.write_test("locked.spec.ts", "test('v1', () => {});");
    let mut registry = ws.open(without_validation()).await;

    registry.register_test(&file, "S-5").await.unwrap();
    registry
        .review(&file, "erin", ReviewDecision::Approve, None)
        .await
        .unwrap();
    registry.crystallize(&file, "erin").await.unwrap();
    let original_hash = registry.get_test(&file).unwrap().content_hash.clone();

    fs::write(&file, "test('v2', () => { expect(1).toBe(1); });").unwrap();

    let op = registry.refresh_content(&file, "erin").await.unwrap();
    assert!(!op.success);
    assert!(matches!(op.failure, Some(CrystallizationError::Locked { .. })));
    assert_eq!(registry.get_test(&file).unwrap().content_hash, original_hash);

    // unlocking alone does not make the edit crystallizable
    registry.unlock(&file, "erin", Some("hotfix")).await.unwrap();
    let op = registry.crystallize(&file, "erin").await.unwrap();
    assert!(!op.success);
    assert_eq!(
        op.failure,
        Some(CrystallizationError::Precondition {
            condition: UnmetCondition::ContentChanged
        })
    );
    let test = registry.get_test(&file).unwrap();
    assert_eq!(test.status, CrystallizationStatus::Crystallized);
    assert_eq!(test.version, 1);
    assert_eq!(test.content_hash, original_hash);
    assert!(!test.locked);

    // refreshing records the edit and sends it back to review
    let op = registry.refresh_content(&file, "erin").await.unwrap();
    assert!(op.success);
    assert_eq!(op.new_status, CrystallizationStatus::UnderReview);

    registry
        .review(&file, "erin", ReviewDecision::Approve, Some("hotfix reviewed"))
        .await
        .unwrap();
    let op = registry.crystallize(&file, "erin").await.unwrap();
    assert!(op.success, "{}", op.message);

    let test = registry.get_test(&file).unwrap();
    assert_eq!(test.status, CrystallizationStatus::Crystallized);
    assert_eq!(test.version, 2);
    assert_eq!(test.history.len(), 1);
    assert_eq!(test.history[0].content_hash, original_hash);
    assert_ne!(test.content_hash, original_hash);
    assert!(test.locked);
}

#[tokio::test]
async fn test_edited_test_requires_revalidation() {
    let ws = Workspace::new();
    let file = ws.write_test("revalidate.spec.ts", "test('v1', () => {});");
    let mut registry = ws.open(CrystallizationConfig::default()).await;

    registry.register_test(&file, "S-5").await.unwrap();
    let result = valid_result(&file);
    let score = result.metrics.quality_score();
    registry
        .attach_validation(&file, result, score, "validator")
        .await
        .unwrap();
    registry
        .review(&file, "erin", ReviewDecision::Approve, None)
        .await
        .unwrap();
    registry.crystallize(&file, "erin").await.unwrap();
    registry.unlock(&file, "erin", None).await.unwrap();

    fs::write(&file, "test('v2', () => {});").unwrap();
    registry.refresh_content(&file, "erin").await.unwrap();
    registry
        .review(&file, "erin", ReviewDecision::Approve, None)
        .await
        .unwrap();

    // the old validation no longer counts
    let op = registry.crystallize(&file, "erin").await.unwrap();
    assert!(!op.success);
    assert_eq!(
        op.failure,
        Some(CrystallizationError::Precondition {
            condition: UnmetCondition::MissingValidation
        })
    );

    let result = valid_result(&file);
    let score = result.metrics.quality_score();
    registry
        .attach_validation(&file, result, score, "validator")
        .await
        .unwrap();
    let op = registry.crystallize(&file, "erin").await.unwrap();
    assert!(op.success, "{}", op.message);
    assert_eq!(registry.get_test(&file).unwrap().version, 2);
}

#[tokio::test]
async fn test_lock_requires_crystallized() {
    let ws = Workspace::new();
    let file = ws.write_test("early.spec.ts", "test('early', () => {});");
    let mut registry = ws.open(without_validation()).await;
    registry.register_test(&file, "S-6").await.unwrap();

    let op = registry.lock(&file, "frank", None).await.unwrap();
    assert!(!op.success);
    assert!(!registry.get_test(&file).unwrap().locked);
}

#[tokio::test]
async fn test_registry_survives_reopen() {
    let ws = Workspace::new();
    let first = ws.write_test("a.spec.ts", "test('a', () => {});");
    let second = ws.write_test("b.spec.ts", "test('b', () => {});");

    {
        let mut registry = ws.open(without_validation()).await;
        registry.register_test(&first, "S-7").await.unwrap();
        registry.register_test(&second, "S-7").await.unwrap();
        registry
            .review(&first, "gina", ReviewDecision::RequestChanges, Some("add assertions"))
            .await
            .unwrap();
    }

    let json = registry_json(&ws.registry_path());
    assert_eq!(json["version"], "1.0.0");
    assert!(json["indices"]["byStory"]["S-7"].is_array());
    assert!(!ws.registry_path().with_extension("json.tmp").exists());

    let registry = ws.open(without_validation()).await;
    assert_eq!(registry.tests().count(), 2);
    assert_eq!(registry.operations().len(), 3);
    assert_eq!(registry.tests_by_story("S-7").len(), 2);

    let reviewed = registry.get_test(&first).unwrap();
    assert_eq!(reviewed.status, CrystallizationStatus::NeedsChanges);
    let latest = reviewed.review.latest().unwrap();
    assert_eq!(latest.name, "gina");
    assert_eq!(latest.comments.as_deref(), Some("add assertions"));

    let stats = registry.stats();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.needing_changes, 1);
}

#[tokio::test]
async fn test_reopen_preserves_history_and_operations() {
    let ws = Workspace::new();
    let file = ws.write_test("versioned.spec.ts", "test('v1', () => {});");

    let (before, operations) = {
        let mut registry = ws.open(without_validation()).await;
        registry.register_test(&file, "S-7").await.unwrap();
        registry
            .review(&file, "ivan", ReviewDecision::Approve, Some("first pass"))
            .await
            .unwrap();
        registry.crystallize(&file, "ivan").await.unwrap();
        registry.unlock(&file, "ivan", Some("extend coverage")).await.unwrap();

        fs::write(&file, "test('v2', () => { expect(2).toBe(2); });").unwrap();
        registry.refresh_content(&file, "ivan").await.unwrap();
        registry
            .review(&file, "judy", ReviewDecision::Approve, None)
            .await
            .unwrap();
        let op = registry.crystallize(&file, "judy").await.unwrap();
        assert!(op.success, "{}", op.message);

        // a failed attempt is persisted too
        registry.lock(&file, "judy", None).await.unwrap();
        let op = registry.start_review(&file, "judy").await.unwrap();
        assert!(!op.success);

        (
            registry.get_test(&file).unwrap().clone(),
            registry.operations().to_vec(),
        )
    };
    assert_eq!(before.status, CrystallizationStatus::Crystallized);
    assert!(before.locked);
    assert_eq!(before.version, 2);
    assert_eq!(before.history.len(), 1);
    assert_eq!(before.review.reviewers().len(), 2);

    let reopened = ws.open(without_validation()).await;
    assert_eq!(reopened.get_test(&file), Some(&before));
    assert_eq!(reopened.operations(), operations.as_slice());
}

#[tokio::test]
async fn test_duplicate_registration_is_rejected() {
    let ws = Workspace::new();
    let file = ws.write_test("dup.spec.ts", "test('dup', () => {});");
    let mut registry = ws.open(without_validation()).await;

    registry.register_test(&file, "S-8").await.unwrap();
    let err = registry.register_test(&file, "S-8").await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<CrystallizationError>(),
        Some(CrystallizationError::DuplicateRegistration { .. })
    ));
}

#[tokio::test]
async fn test_corrupt_registry_fails_to_load() {
    let ws = Workspace::new();
    fs::write(ws.registry_path(), "{ not json").unwrap();

    let result = CrystallizationRegistry::open(CrystallizationConfig::default(), ws.registry_path()).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_explicit_review_start_and_manual_lock() {
    let ws = Workspace::new();
    let file = ws.write_test("manual.spec.ts", "test('manual', () => {});");
    let config = CrystallizationConfig {
        lock_after_crystallization: false,
        ..without_validation()
    };
    let mut registry = ws.open(config).await;
    registry.register_test(&file, "S-9").await.unwrap();

    let op = registry.start_review(&file, "hana").await.unwrap();
    assert!(op.success);
    assert_eq!(op.new_status, CrystallizationStatus::UnderReview);

    // starting again while under review changes nothing
    let op = registry.start_review(&file, "hana").await.unwrap();
    assert!(op.success);
    assert_eq!(op.previous_status, op.new_status);

    registry
        .review(&file, "hana", ReviewDecision::Approve, None)
        .await
        .unwrap();
    registry.crystallize(&file, "hana").await.unwrap();
    assert!(!registry.get_test(&file).unwrap().locked);

    let op = registry.lock(&file, "hana", Some("release 1.2")).await.unwrap();
    assert!(op.success);
    let test = registry.get_test(&file).unwrap();
    assert!(test.locked);
    assert_eq!(test.lock_reason.as_deref(), Some("release 1.2"));

    let ops: Vec<OperationType> = registry
        .operations_for(&file)
        .iter()
        .map(|op| op.op_type)
        .collect();
    assert_eq!(
        ops,
        vec![
            OperationType::Register,
            OperationType::StartReview,
            OperationType::StartReview,
            OperationType::Review,
            OperationType::Crystallize,
            OperationType::Lock,
        ]
    );
}
