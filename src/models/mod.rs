pub mod allure;
pub mod crystallization;
pub mod reporting;
pub mod story_result;
pub mod validation;

pub use allure::{
    AllureAttachment, AllureLabel, AllureParameter, AllureResult, AllureStatus,
    AllureStatusDetails, AllureStep,
};
pub use crystallization::{
    BulkCrystallizationOptions, BulkCrystallizationResult, CrystallizationConfig,
    CrystallizationOperation, CrystallizationReport, CrystallizationStats, CrystallizationStatus,
    CrystallizedTest, CrystallizedTestVersion, OperationType, ReviewDecision, ReviewMetadata,
    Reviewer,
};
pub use reporting::{
    Attribute, FinishLaunchRequest, FinishLaunchResponse, FinishTestItemRequest,
    FinishTestItemResponse, ItemType, LaunchMode, LogLevel, Parameter, ReportItem, ReportLog,
    ReportStatus, SaveLogRequest, SaveLogResponse, StartLaunchRequest, StartLaunchResponse,
    StartTestItemRequest, StartTestItemResponse, UploadResult, UploadStats,
};
pub use story_result::{
    AcceptanceCriterion, EpicInfo, StoryStats, StoryTest, StoryTestResult, TestCase, TestStatus,
    TestSummary,
};
pub use validation::{
    CodeQualityMetrics, IssuesBySeverity, QualityAssessment, QualityBreakdown, QualityGrade,
    TestFramework, TestType, ValidationIssue, ValidationReport, ValidationResult,
    ValidationRuleType, ValidationSeverity, ValidationSummary,
};
