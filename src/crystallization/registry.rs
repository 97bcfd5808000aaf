//! CrystallizationRegistry - registry file CRUD and lifecycle operations
//!
//! The registry is the only component that mutates `CrystallizedTest`
//! records. Each operation clones the record, applies the transition to the
//! clone, appends the operation to the audit log and persists the whole
//! document; the in-memory state is only replaced once the write succeeded.

use super::state_machine::{
    check_crystallize_preconditions, reopened_status, review_entry, review_outcome,
    validate_transition,
};
use super::stats::compute_stats;
use crate::error::{CrystallizationError, ExternalClientError, UnmetCondition};
use crate::models::{
    BulkCrystallizationOptions, BulkCrystallizationResult, CrystallizationConfig,
    CrystallizationOperation, CrystallizationReport, CrystallizationStats, CrystallizationStatus,
    CrystallizedTest, CrystallizedTestVersion, OperationType, ReviewDecision, Reviewer,
    TestFramework, TestType, ValidationResult,
};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Default registry file name, relative to the working directory
pub const DEFAULT_REGISTRY_FILE: &str = ".crystallization-registry.json";

const REGISTRY_FORMAT_VERSION: &str = "1.0.0";

/// Author recorded on versions superseded by a re-registration
const REGISTRATION_AUTHOR: &str = "registry";

/// Content hash used for change detection
pub fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("sha256:{:x}", hasher.finalize())
}

async fn read_content_hash(file_path: &str) -> std::result::Result<String, ExternalClientError> {
    let content = tokio::fs::read_to_string(file_path)
        .await
        .map_err(|e| ExternalClientError::io(file_path, e))?;
    Ok(hash_content(&content))
}

/// Lookup indices derived from the canonical records
///
/// Never stored as a source of truth: rebuilt from the records whenever
/// they are asked for or written out.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryIndices {
    pub by_status: BTreeMap<CrystallizationStatus, Vec<String>>,
    pub by_story: BTreeMap<String, Vec<String>>,
    pub by_framework: BTreeMap<TestFramework, Vec<String>>,
    pub by_type: BTreeMap<TestType, Vec<String>>,
}

impl RegistryIndices {
    pub fn build<'a>(tests: impl IntoIterator<Item = &'a CrystallizedTest>) -> Self {
        let mut indices = Self::default();
        for test in tests {
            let path = test.file_path.clone();
            indices
                .by_status
                .entry(test.status)
                .or_default()
                .push(path.clone());
            indices
                .by_story
                .entry(test.story_id.clone())
                .or_default()
                .push(path.clone());
            indices
                .by_framework
                .entry(test.framework)
                .or_default()
                .push(path.clone());
            indices.by_type.entry(test.test_type).or_default().push(path);
        }
        indices
    }
}

/// Registry file as read back; indices in the file are ignored
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegistryDocument {
    id: String,
    #[serde(default)]
    version: String,
    last_updated: DateTime<Utc>,
    #[serde(default)]
    tests: BTreeMap<String, CrystallizedTest>,
    #[serde(default)]
    operations: Vec<CrystallizationOperation>,
}

/// Registry file as written
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RegistryDocumentRef<'a> {
    id: &'a str,
    version: &'a str,
    last_updated: DateTime<Utc>,
    tests: &'a BTreeMap<String, CrystallizedTest>,
    indices: RegistryIndices,
    operations: &'a [CrystallizationOperation],
}

/// Persistent store of crystallized tests plus the operation log
pub struct CrystallizationRegistry {
    config: CrystallizationConfig,
    path: PathBuf,
    id: String,
    last_updated: DateTime<Utc>,
    tests: BTreeMap<String, CrystallizedTest>,
    operations: Vec<CrystallizationOperation>,
}

impl CrystallizationRegistry {
    /// Create an empty registry backed by `path`; call `initialize` to load it
    pub fn new(config: CrystallizationConfig, path: impl Into<PathBuf>) -> Self {
        Self {
            config,
            path: path.into(),
            id: Uuid::new_v4().to_string(),
            last_updated: Utc::now(),
            tests: BTreeMap::new(),
            operations: Vec::new(),
        }
    }

    /// Create and load in one step
    pub async fn open(config: CrystallizationConfig, path: impl Into<PathBuf>) -> Result<Self> {
        let mut registry = Self::new(config, path);
        registry.initialize().await?;
        Ok(registry)
    }

    /// Load the backing file; a missing file leaves the registry empty
    pub async fn initialize(&mut self) -> Result<()> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no registry file yet, starting empty");
                return Ok(());
            }
            Err(e) => return Err(ExternalClientError::io(&self.path, e).into()),
        };

        let document: RegistryDocument = serde_json::from_str(&content)
            .map_err(|e| ExternalClientError::json(&self.path, e))?;

        if !document.version.is_empty() && document.version != REGISTRY_FORMAT_VERSION {
            warn!(
                found = %document.version,
                expected = REGISTRY_FORMAT_VERSION,
                "registry format version differs"
            );
        }

        self.id = document.id;
        self.last_updated = document.last_updated;
        self.tests = document.tests;
        self.operations = document.operations;

        info!(
            path = %self.path.display(),
            tests = self.tests.len(),
            operations = self.operations.len(),
            "registry loaded"
        );
        Ok(())
    }

    /// Write the full registry document (temp file + rename)
    pub async fn save(&mut self) -> std::result::Result<(), ExternalClientError> {
        self.last_updated = Utc::now();

        let document = RegistryDocumentRef {
            id: &self.id,
            version: REGISTRY_FORMAT_VERSION,
            last_updated: self.last_updated,
            tests: &self.tests,
            indices: RegistryIndices::build(self.tests.values()),
            operations: &self.operations,
        };
        let content = serde_json::to_string_pretty(&document)
            .map_err(|e| ExternalClientError::json(&self.path, e))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ExternalClientError::io(parent, e))?;
        }

        let temp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, content)
            .await
            .map_err(|e| ExternalClientError::io(&temp_path, e))?;
        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| ExternalClientError::io(&self.path, e))?;

        debug!(path = %self.path.display(), "registry saved");
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &CrystallizationConfig {
        &self.config
    }

    // =========================================================================
    // Lifecycle operations
    // =========================================================================

    /// Register a generated test in `generated` status
    ///
    /// Fails with `DuplicateRegistration` while an active record with the
    /// same content exists. A changed file replaces the record and carries
    /// its version lineage forward.
    pub async fn register_test(&mut self, file_path: &str, story_id: &str) -> Result<CrystallizedTest> {
        let content_hash = read_content_hash(file_path).await?;
        let now = Utc::now();
        let mut test = CrystallizedTest::new(file_path, story_id, content_hash.clone(), now);
        let mut previous_status = CrystallizationStatus::Generated;

        if let Some(existing) = self.tests.get(file_path) {
            if existing.is_active() && existing.content_hash == content_hash {
                warn!(path = file_path, "duplicate registration rejected");
                return Err(CrystallizationError::DuplicateRegistration {
                    path: file_path.to_string(),
                }
                .into());
            }

            previous_status = existing.status;
            test.version = existing.version;
            test.history = existing.history.clone();
            test.content_hash = existing.content_hash.clone();
            test.locked = existing.locked;
            test.review.quality_score = existing.review.quality_score;
            self.apply_content_change(&mut test, content_hash, REGISTRATION_AUTHOR, now)?;
            test.locked = false;
            test.review.quality_score = 0.0;
        }

        let op = CrystallizationOperation::succeeded(
            OperationType::Register,
            file_path,
            REGISTRATION_AUTHOR,
            previous_status,
            CrystallizationStatus::Generated,
            format!("Test registered for story {story_id} at version {}", test.version),
        );
        info!(path = file_path, story = story_id, version = test.version, "test registered");

        self.commit(test.clone(), op).await?;
        Ok(test)
    }

    /// Move a `generated` or `needs-changes` test into review
    pub async fn start_review(&mut self, file_path: &str, actor: &str) -> Result<CrystallizationOperation> {
        let mut test = self.require(file_path)?.clone();
        let previous = test.status;

        let entry = match review_entry(previous) {
            Ok(entry) => entry,
            Err(error) => {
                return self
                    .reject(OperationType::StartReview, file_path, actor, previous, error)
                    .await
            }
        };

        if entry == previous {
            let op = CrystallizationOperation::succeeded(
                OperationType::StartReview,
                file_path,
                actor,
                previous,
                previous,
                "Review already in progress",
            );
            return self.commit(test, op).await;
        }

        let now = Utc::now();
        let hash = read_content_hash(file_path).await?;
        if let Err(error) = self.apply_content_change(&mut test, hash, actor, now) {
            return self
                .reject(OperationType::StartReview, file_path, actor, previous, error)
                .await;
        }

        test.status = entry;
        test.review.last_modified_at = now;

        let op = CrystallizationOperation::succeeded(
            OperationType::StartReview,
            file_path,
            actor,
            previous,
            entry,
            "Review started",
        );
        info!(path = file_path, from = %previous, to = %entry, "review started");
        self.commit(test, op).await
    }

    /// Record a review decision and transition accordingly
    pub async fn review(
        &mut self,
        file_path: &str,
        reviewer: &str,
        decision: ReviewDecision,
        comments: Option<&str>,
    ) -> Result<CrystallizationOperation> {
        let mut test = self.require(file_path)?.clone();
        let previous = test.status;

        let target = match review_outcome(previous, decision) {
            Ok(target) => target,
            Err(error) => {
                return self
                    .reject(OperationType::Review, file_path, reviewer, previous, error)
                    .await
            }
        };

        let now = Utc::now();
        let hash = read_content_hash(file_path).await?;
        if let Err(error) = self.apply_content_change(&mut test, hash, reviewer, now) {
            return self
                .reject(OperationType::Review, file_path, reviewer, previous, error)
                .await;
        }

        test.review.append_reviewer(Reviewer {
            timestamp: now,
            ..Reviewer::new(reviewer, decision, comments.map(str::to_string))
        });
        test.status = target;

        let auto_crystallize = decision == ReviewDecision::Approve
            && self
                .config
                .auto_crystallize_threshold
                .is_some_and(|threshold| test.review.quality_score >= threshold);

        let op = CrystallizationOperation::succeeded(
            OperationType::Review,
            file_path,
            reviewer,
            previous,
            target,
            format!("Test reviewed: {}", decision.name()),
        );
        info!(
            path = file_path,
            reviewer,
            decision = decision.name(),
            from = %previous,
            to = %target,
            "review recorded"
        );
        let op = self.commit(test, op).await?;

        if auto_crystallize {
            let auto = self.crystallize(file_path, reviewer).await?;
            debug!(path = file_path, success = auto.success, "auto-crystallization attempted");
        }

        Ok(op)
    }

    /// Attach a validation snapshot and its quality score
    pub async fn attach_validation(
        &mut self,
        file_path: &str,
        result: ValidationResult,
        quality_score: f64,
        actor: &str,
    ) -> Result<CrystallizationOperation> {
        let mut test = self.require(file_path)?.clone();
        let status = test.status;

        let blocked = if !test.is_active() {
            Some(CrystallizationError::Deprecated {
                path: file_path.to_string(),
            })
        } else if test.locked {
            Some(CrystallizationError::Locked {
                path: file_path.to_string(),
            })
        } else {
            None
        };
        if let Some(error) = blocked {
            return self
                .reject(OperationType::AttachValidation, file_path, actor, status, error)
                .await;
        }

        if result.file_path != file_path {
            warn!(
                path = file_path,
                validated = %result.file_path,
                "validation result was produced for a different path"
            );
            let error = CrystallizationError::ValidationPathMismatch {
                path: file_path.to_string(),
                validated: result.file_path,
            };
            return self
                .reject(OperationType::AttachValidation, file_path, actor, status, error)
                .await;
        }

        let now = Utc::now();
        let hash = read_content_hash(file_path).await?;
        if let Err(error) = self.apply_content_change(&mut test, hash, actor, now) {
            return self
                .reject(OperationType::AttachValidation, file_path, actor, status, error)
                .await;
        }

        let verdict = if result.valid { "valid" } else { "invalid" };
        test.framework = result.framework;
        test.test_type = result.test_type;
        test.last_validated_at = Some(now);
        test.review.quality_score = quality_score;
        test.review.validation_result = Some(result);
        test.review.last_modified_at = now;

        let op = CrystallizationOperation::succeeded(
            OperationType::AttachValidation,
            file_path,
            actor,
            status,
            test.status,
            format!("Validation attached: {verdict}, quality score {quality_score:.1}"),
        );
        self.commit(test, op).await
    }

    /// Crystallize an approved test
    ///
    /// Repeating it on a crystallized test whose content is unchanged is a
    /// successful no-op. Content edited since the review is never accepted
    /// here; `refresh_content` sends such a test back to review.
    pub async fn crystallize(&mut self, file_path: &str, actor: &str) -> Result<CrystallizationOperation> {
        let mut test = self.require(file_path)?.clone();
        let previous = test.status;

        if previous == CrystallizationStatus::Crystallized {
            let hash = read_content_hash(file_path).await?;
            if hash != test.content_hash {
                let error = self.content_changed_error(&test);
                warn!(path = file_path, "crystallized test was edited; refusing to crystallize");
                return self
                    .reject(OperationType::Crystallize, file_path, actor, previous, error)
                    .await;
            }
            let op = CrystallizationOperation::succeeded(
                OperationType::Crystallize,
                file_path,
                actor,
                previous,
                previous,
                "Test already crystallized",
            );
            return self.commit(test, op).await;
        }

        if let Err(condition) = check_crystallize_preconditions(&test, &self.config) {
            warn!(path = file_path, %condition, "crystallization precondition failed");
            return self
                .reject(OperationType::Crystallize, file_path, actor, previous, condition.into())
                .await;
        }

        if let Err(error) = validate_transition(previous, CrystallizationStatus::Crystallized) {
            return self
                .reject(OperationType::Crystallize, file_path, actor, previous, error)
                .await;
        }

        let hash = read_content_hash(file_path).await?;
        if hash != test.content_hash {
            warn!(path = file_path, "approved test was edited; refusing to crystallize");
            return self
                .reject(
                    OperationType::Crystallize,
                    file_path,
                    actor,
                    previous,
                    UnmetCondition::ContentChanged.into(),
                )
                .await;
        }

        let now = Utc::now();
        test.status = CrystallizationStatus::Crystallized;
        test.crystallized_at = Some(now);
        test.review.last_modified_at = now;
        self.lock_if_configured(&mut test);

        let op = CrystallizationOperation::succeeded(
            OperationType::Crystallize,
            file_path,
            actor,
            previous,
            CrystallizationStatus::Crystallized,
            "Test crystallized successfully",
        );
        info!(path = file_path, actor, locked = test.locked, "test crystallized");
        self.commit(test, op).await
    }

    /// Lock a crystallized test at its current content
    pub async fn lock(
        &mut self,
        file_path: &str,
        actor: &str,
        reason: Option<&str>,
    ) -> Result<CrystallizationOperation> {
        let mut test = self.require(file_path)?.clone();
        let status = test.status;

        if status != CrystallizationStatus::Crystallized {
            let error = UnmetCondition::NotCrystallized { status }.into();
            return self
                .reject(OperationType::Lock, file_path, actor, status, error)
                .await;
        }

        if test.locked {
            let op = CrystallizationOperation::succeeded(
                OperationType::Lock,
                file_path,
                actor,
                status,
                status,
                "Test already locked",
            );
            return self.commit(test, op).await;
        }

        let hash = read_content_hash(file_path).await?;
        if hash != test.content_hash {
            return self
                .reject(
                    OperationType::Lock,
                    file_path,
                    actor,
                    status,
                    UnmetCondition::ContentChanged.into(),
                )
                .await;
        }

        test.locked = true;
        test.lock_reason = Some(
            reason
                .map(str::to_string)
                .unwrap_or_else(|| format!("Locked by {actor}")),
        );

        let op = CrystallizationOperation::succeeded(
            OperationType::Lock,
            file_path,
            actor,
            status,
            status,
            format!("Test locked at version {}", test.version),
        );
        self.commit(test, op).await
    }

    /// Clear the lock; the status is not changed
    pub async fn unlock(
        &mut self,
        file_path: &str,
        actor: &str,
        reason: Option<&str>,
    ) -> Result<CrystallizationOperation> {
        let mut test = self.require(file_path)?.clone();
        let status = test.status;

        let message = if test.locked {
            test.locked = false;
            test.lock_reason = None;
            match reason {
                Some(reason) => format!("Test unlocked: {reason}"),
                None => "Test unlocked".to_string(),
            }
        } else {
            "Test was not locked".to_string()
        };

        let op = CrystallizationOperation::succeeded(
            OperationType::Unlock,
            file_path,
            actor,
            status,
            status,
            message,
        );
        info!(path = file_path, actor, "test unlocked");
        self.commit(test, op).await
    }

    /// Mark a test deprecated; repeating it is a no-op
    pub async fn deprecate(
        &mut self,
        file_path: &str,
        actor: &str,
        reason: Option<&str>,
    ) -> Result<CrystallizationOperation> {
        let mut test = self.require(file_path)?.clone();
        let previous = test.status;

        if previous == CrystallizationStatus::Deprecated {
            let op = CrystallizationOperation::succeeded(
                OperationType::Deprecate,
                file_path,
                actor,
                previous,
                previous,
                "Test already deprecated",
            );
            return self.commit(test, op).await;
        }

        if let Err(error) = validate_transition(previous, CrystallizationStatus::Deprecated) {
            return self
                .reject(OperationType::Deprecate, file_path, actor, previous, error)
                .await;
        }

        test.status = CrystallizationStatus::Deprecated;
        test.review.last_modified_at = Utc::now();
        if let Some(reason) = reason {
            test.review.notes = Some(reason.to_string());
        }

        let op = CrystallizationOperation::succeeded(
            OperationType::Deprecate,
            file_path,
            actor,
            previous,
            CrystallizationStatus::Deprecated,
            reason.map_or_else(|| "Test deprecated".to_string(), |r| format!("Test deprecated: {r}")),
        );
        info!(path = file_path, actor, from = %previous, "test deprecated");
        self.commit(test, op).await
    }

    /// Re-hash the file and record a new version if it changed
    ///
    /// An approved or crystallized test whose content changed goes back to
    /// `under-review` with its validation cleared.
    pub async fn refresh_content(&mut self, file_path: &str, actor: &str) -> Result<CrystallizationOperation> {
        let mut test = self.require(file_path)?.clone();
        let status = test.status;

        let hash = read_content_hash(file_path).await?;
        let changed = match self.apply_content_change(&mut test, hash, actor, Utc::now()) {
            Ok(changed) => changed,
            Err(error) => {
                return self
                    .reject(OperationType::RefreshContent, file_path, actor, status, error)
                    .await
            }
        };

        let message = match (changed, test.status != status) {
            (false, _) => "Content unchanged".to_string(),
            (true, false) => format!("Content updated to version {}", test.version),
            (true, true) => format!(
                "Content updated to version {}; review required before crystallization",
                test.version
            ),
        };
        let op = CrystallizationOperation::succeeded(
            OperationType::RefreshContent,
            file_path,
            actor,
            status,
            test.status,
            message,
        );
        self.commit(test, op).await
    }

    /// Review and crystallize many files; one file's failure never stops the pass
    pub async fn bulk_crystallize(
        &mut self,
        options: &BulkCrystallizationOptions,
    ) -> BulkCrystallizationResult {
        let mut result = BulkCrystallizationResult::default();

        for file in &options.files {
            result.total += 1;

            let outcome = if options.dry_run {
                self.preview(file, options).map_err(anyhow::Error::from)
            } else {
                self.review_then_crystallize(file, options).await
            };

            match outcome {
                Ok(op) => {
                    if !op.success {
                        result.failed += 1;
                    } else if op.new_status == CrystallizationStatus::Crystallized {
                        result.succeeded += 1;
                    } else {
                        result.skipped += 1;
                    }
                    result.results.insert(file.clone(), op);
                }
                Err(error) => {
                    result.failed += 1;
                    result.errors.insert(file.clone(), format!("{error:#}"));
                }
            }
        }

        info!(
            total = result.total,
            succeeded = result.succeeded,
            failed = result.failed,
            skipped = result.skipped,
            dry_run = options.dry_run,
            "bulk crystallization finished"
        );
        result
    }

    async fn review_then_crystallize(
        &mut self,
        file: &str,
        options: &BulkCrystallizationOptions,
    ) -> Result<CrystallizationOperation> {
        let review = self
            .review(file, &options.reviewer, options.decision, options.comments.as_deref())
            .await?;

        let approved = self
            .get_test(file)
            .is_some_and(|t| t.status == CrystallizationStatus::Approved);
        let already_crystallized = self
            .get_test(file)
            .is_some_and(|t| t.status == CrystallizationStatus::Crystallized);

        if !review.success || !(approved || already_crystallized) {
            return Ok(review);
        }
        self.crystallize(file, &options.reviewer).await
    }

    /// Evaluate review + crystallize on a copy of the record
    fn preview(
        &self,
        file: &str,
        options: &BulkCrystallizationOptions,
    ) -> std::result::Result<CrystallizationOperation, CrystallizationError> {
        let mut test = self.require(file)?.clone();
        let previous = test.status;

        match review_outcome(previous, options.decision) {
            Ok(target) => {
                test.review.append_reviewer(Reviewer::new(
                    options.reviewer.as_str(),
                    options.decision,
                    options.comments.clone(),
                ));
                test.status = target;
            }
            Err(error) => {
                return Ok(CrystallizationOperation::failed(
                    OperationType::Review,
                    file,
                    options.reviewer.as_str(),
                    previous,
                    error,
                ))
            }
        }

        if test.status != CrystallizationStatus::Approved {
            return Ok(CrystallizationOperation::succeeded(
                OperationType::Review,
                file,
                options.reviewer.as_str(),
                previous,
                test.status,
                "Dry run: review only",
            ));
        }

        Ok(match check_crystallize_preconditions(&test, &self.config) {
            Ok(()) => CrystallizationOperation::succeeded(
                OperationType::Crystallize,
                file,
                options.reviewer.as_str(),
                previous,
                CrystallizationStatus::Crystallized,
                "Dry run: would crystallize",
            ),
            Err(condition) => CrystallizationOperation::failed(
                OperationType::Crystallize,
                file,
                options.reviewer.as_str(),
                previous,
                condition.into(),
            ),
        })
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn get_test(&self, file_path: &str) -> Option<&CrystallizedTest> {
        self.tests.get(file_path)
    }

    pub fn tests(&self) -> impl Iterator<Item = &CrystallizedTest> {
        self.tests.values()
    }

    pub fn tests_by_status(&self, status: CrystallizationStatus) -> Vec<&CrystallizedTest> {
        self.tests().filter(|t| t.status == status).collect()
    }

    pub fn tests_by_story(&self, story_id: &str) -> Vec<&CrystallizedTest> {
        self.tests().filter(|t| t.story_id == story_id).collect()
    }

    pub fn tests_by_framework(&self, framework: TestFramework) -> Vec<&CrystallizedTest> {
        self.tests().filter(|t| t.framework == framework).collect()
    }

    pub fn tests_by_type(&self, test_type: TestType) -> Vec<&CrystallizedTest> {
        self.tests().filter(|t| t.test_type == test_type).collect()
    }

    pub fn indices(&self) -> RegistryIndices {
        RegistryIndices::build(self.tests.values())
    }

    /// The append-only operation log, oldest first
    pub fn operations(&self) -> &[CrystallizationOperation] {
        &self.operations
    }

    pub fn operations_for(&self, file_path: &str) -> Vec<&CrystallizationOperation> {
        self.operations
            .iter()
            .filter(|op| op.file_path == file_path)
            .collect()
    }

    pub fn stats(&self) -> CrystallizationStats {
        self.stats_at(Utc::now())
    }

    pub fn stats_at(&self, now: DateTime<Utc>) -> CrystallizationStats {
        compute_stats(self.tests.values(), now)
    }

    /// Summary with the `recent` most recent operations, newest first
    pub fn report(&self, recent: usize) -> CrystallizationReport {
        let stats = self.stats();
        let tests_by_status = self.indices().by_status;
        let recent_operations = self.operations.iter().rev().take(recent).cloned().collect();

        let mut recommendations = Vec::new();
        let waiting = stats.count(CrystallizationStatus::Generated);
        if waiting > 0 {
            recommendations.push(format!("{waiting} test(s) are waiting for a first review"));
        }
        if stats.needing_changes > 0 {
            recommendations.push(format!(
                "{} test(s) need changes before they can be re-reviewed",
                stats.needing_changes
            ));
        }
        let approved = stats.count(CrystallizationStatus::Approved);
        if approved > 0 {
            recommendations.push(format!("{approved} approved test(s) are ready to crystallize"));
        }
        let unlocked = self
            .tests_by_status(CrystallizationStatus::Crystallized)
            .iter()
            .filter(|t| !t.locked)
            .count();
        if unlocked > 0 {
            recommendations.push(format!("{unlocked} crystallized test(s) are currently unlocked"));
        }
        if stats.total > 0 && stats.average_quality_score < self.config.min_quality_score {
            recommendations.push(format!(
                "Average quality score {:.1} is below the crystallization threshold {:.1}",
                stats.average_quality_score, self.config.min_quality_score
            ));
        }

        CrystallizationReport {
            generated_at: Utc::now(),
            stats,
            tests_by_status,
            recent_operations,
            recommendations,
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn require(&self, file_path: &str) -> std::result::Result<&CrystallizedTest, CrystallizationError> {
        self.tests
            .get(file_path)
            .ok_or_else(|| CrystallizationError::NotFound {
                path: file_path.to_string(),
            })
    }

    fn lock_if_configured(&self, test: &mut CrystallizedTest) {
        if self.config.lock_after_crystallization {
            test.locked = true;
            test.lock_reason = Some("Automatically locked after crystallization".to_string());
        } else {
            test.locked = false;
            test.lock_reason = None;
        }
    }

    /// Why an edited crystallized test cannot be crystallized again
    fn content_changed_error(&self, test: &CrystallizedTest) -> CrystallizationError {
        if test.locked {
            CrystallizationError::Locked {
                path: test.file_path.clone(),
            }
        } else {
            UnmetCondition::ContentChanged.into()
        }
    }

    /// Archive the current version when the file content changed
    ///
    /// Returns whether the hash changed. Locked records reject any change;
    /// approved and crystallized records are reopened for review.
    fn apply_content_change(
        &self,
        test: &mut CrystallizedTest,
        new_hash: String,
        author: &str,
        now: DateTime<Utc>,
    ) -> std::result::Result<bool, CrystallizationError> {
        if test.content_hash == new_hash {
            return Ok(false);
        }
        if test.locked {
            return Err(CrystallizationError::Locked {
                path: test.file_path.clone(),
            });
        }

        let previous_hash = std::mem::replace(&mut test.content_hash, new_hash);
        if self.config.enable_versioning {
            test.history.push(CrystallizedTestVersion {
                version: test.version,
                content_hash: previous_hash,
                timestamp: now,
                author: author.to_string(),
                change_description: Some(format!("Superseded by version {}", test.version + 1)),
                quality_score: test.review.quality_score,
            });
            if test.history.len() > self.config.max_versions {
                let excess = test.history.len() - self.config.max_versions;
                test.history.drain(..excess);
            }
        }
        test.version += 1;
        test.review.last_modified_at = now;

        if let Some(reopened) = reopened_status(test.status) {
            info!(
                path = %test.file_path,
                from = %test.status,
                to = %reopened,
                "reviewed content changed, review reopened"
            );
            test.status = reopened;
            test.lock_reason = None;
            test.last_validated_at = None;
            test.review.validation_result = None;
            test.review.quality_score = 0.0;
        }

        debug!(path = %test.file_path, version = test.version, "content change archived");
        Ok(true)
    }

    /// Replace the record, log the operation and persist; undone if the write fails
    async fn commit(
        &mut self,
        test: CrystallizedTest,
        op: CrystallizationOperation,
    ) -> Result<CrystallizationOperation> {
        let key = test.file_path.clone();
        let previous = self.tests.insert(key.clone(), test);
        self.operations.push(op.clone());

        if let Err(error) = self.save().await {
            self.operations.pop();
            match previous {
                Some(previous) => {
                    self.tests.insert(key, previous);
                }
                None => {
                    self.tests.remove(&key);
                }
            }
            return Err(error.into());
        }

        Ok(op)
    }

    /// Log a rejected operation; the record itself is left untouched
    async fn reject(
        &mut self,
        op_type: OperationType,
        file_path: &str,
        actor: &str,
        status: CrystallizationStatus,
        error: CrystallizationError,
    ) -> Result<CrystallizationOperation> {
        debug!(path = file_path, op = op_type.name(), %error, "operation rejected");
        let op = CrystallizationOperation::failed(op_type, file_path, actor, status, error);
        self.operations.push(op.clone());

        if let Err(error) = self.save().await {
            self.operations.pop();
            return Err(error.into());
        }
        Ok(op)
    }
}
