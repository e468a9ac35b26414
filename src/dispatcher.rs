use std::collections::HashMap;
use std::sync::Arc;

use futures::{StreamExt, stream};
use log::{error, info};

use crate::accounts::AccountInfoStore;
use crate::error::{Error, Result};
use crate::file_store::FileStore;
use crate::ingest::scale_to_byte_limit;
use crate::models::{
    Account, CommonOptions, DefaultOptions, FilePostData, FileKind, FileRecord, FileSubmission,
    PostData, PostResponse, PostedFile, Submission, SubmissionPart, UploadedFile,
};
use crate::transform;
use crate::validator::SubmissionValidator;
use crate::websites::{Website, WebsiteRegistry};

/// Exactly one of these per destination, no matter what happened there.
#[derive(Debug, Clone)]
pub enum DispatchOutcome {
    Posted(PostResponse),
    Skipped {
        reason: String,
    },
    Failed {
        message: String,
        additional_info: Option<serde_json::Value>,
    },
}

impl DispatchOutcome {
    pub fn is_posted(&self) -> bool {
        matches!(self, Self::Posted(_))
    }

    fn from_error(error: Error) -> Self {
        match error {
            Error::Post(failure) => Self::Failed {
                message: failure.message,
                additional_info: failure.body.map(serde_json::Value::String),
            },
            other => Self::Failed {
                message: other.to_string(),
                additional_info: None,
            },
        }
    }
}

/// Posts one submission to every configured destination. Destinations with
/// open problems are skipped before any I/O; the rest run concurrently up
/// to the fan-out limit, and one destination's failure never touches
/// another's.
#[derive(Clone)]
pub struct PostDispatcher<S: FileStore> {
    registry: Arc<WebsiteRegistry>,
    store: S,
    validator: SubmissionValidator,
    fanout: usize,
}

impl<S: FileStore> PostDispatcher<S> {
    pub fn new(
        registry: Arc<WebsiteRegistry>,
        store: S,
        info: AccountInfoStore,
        fanout: usize,
    ) -> Self {
        Self {
            validator: SubmissionValidator::new(registry.clone(), info),
            registry,
            store,
            fanout: fanout.max(1),
        }
    }

    pub async fn post_all(
        &self,
        submission: &FileSubmission,
        parts: &[SubmissionPart],
        defaults: &DefaultOptions,
        accounts: &[Account],
    ) -> HashMap<String, DispatchOutcome> {
        info!(
            "dispatching submission {} to {} destinations",
            submission.id,
            parts.len()
        );
        let results: HashMap<String, DispatchOutcome> = stream::iter(parts)
            .map(|part| async move {
                let outcome = self
                    .dispatch_one(submission, part, defaults, accounts)
                    .await;
                (part.account_id.clone(), outcome)
            })
            .buffer_unordered(self.fanout)
            .collect()
            .await;

        let posted = results.values().filter(|o| o.is_posted()).count();
        info!(
            "submission {}: {posted}/{} destinations posted",
            submission.id,
            results.len()
        );
        results
    }

    async fn dispatch_one(
        &self,
        submission: &FileSubmission,
        part: &SubmissionPart,
        defaults: &DefaultOptions,
        accounts: &[Account],
    ) -> DispatchOutcome {
        let findings = self.validator.validate_one(submission, part, defaults);
        if !findings.is_postable() {
            info!(
                "skipping {} for {}: {}",
                submission.id,
                part.account_id,
                findings.problems.join("; ")
            );
            return DispatchOutcome::Skipped {
                reason: findings.problems.join("; "),
            };
        }

        let site = match self.registry.resolve(&part.website) {
            Ok(site) => site,
            Err(e) => return DispatchOutcome::from_error(e),
        };

        let data = match self
            .assemble(submission, part, defaults, accounts, site.as_ref())
            .await
        {
            Ok(data) => data,
            Err(e) => {
                error!(
                    "could not assemble post data of {} for {}: {e}",
                    submission.id, part.account_id
                );
                return DispatchOutcome::from_error(e);
            }
        };

        match site.post_file_submission(&data).await {
            Ok(response) => {
                info!(
                    "posted {} to {} as {}",
                    submission.id,
                    part.website,
                    response.source.as_deref().unwrap_or("(no source)")
                );
                DispatchOutcome::Posted(response)
            }
            Err(e) => {
                error!(
                    "posting {} to {} failed for {}: {e}",
                    submission.id, part.website, part.account_id
                );
                DispatchOutcome::from_error(e)
            }
        }
    }

    /// Load every buffer this destination will receive, auto-scale what the
    /// platform limit requires, and run the adapter's description pipeline.
    async fn assemble(
        &self,
        submission: &FileSubmission,
        part: &SubmissionPart,
        defaults: &DefaultOptions,
        accounts: &[Account],
        site: &dyn Website,
    ) -> Result<FilePostData> {
        let account = accounts
            .iter()
            .find(|a| a.id == part.account_id)
            .ok_or_else(|| Error::Other(format!("no account configured with id {}", part.account_id)))?;
        let common: CommonOptions = part.options();
        let max_size = site.scaling_options(&submission.primary).max_size;

        let primary = self
            .load(&submission.primary, common.auto_scale(), max_size)
            .await?;
        let fallback = match &submission.fallback {
            Some(record) => Some(self.load(record, false, max_size).await?),
            None => None,
        };
        let thumbnail = match &submission.thumbnail {
            Some(record) => Some(self.load(record, false, max_size).await?),
            None => None,
        };
        let mut additional = Vec::new();
        for record in &submission.additional {
            if record.is_ignored_for(&part.account_id) {
                continue;
            }
            additional.push(self.load(record, common.auto_scale(), max_size).await?);
        }

        Ok(FilePostData {
            submission_id: submission.id.clone(),
            account_id: part.account_id.clone(),
            title: defaults.resolve_title(&common, &submission.title),
            description: site.build_description(&defaults.resolve_description(&common)),
            tags: site.format_tags(&defaults.resolve_tags(&common)),
            primary,
            fallback,
            thumbnail,
            additional,
            options: part.data.clone(),
            account_data: account.data.clone(),
        })
    }

    async fn load(
        &self,
        record: &FileRecord,
        auto_scale: bool,
        max_size: u64,
    ) -> Result<PostedFile> {
        let buffer = self.store.read(&record.location).await?;
        let mut file = PostedFile::from_record(record, buffer);

        if auto_scale
            && file.size() > max_size
            && record.kind == FileKind::Image
            && transform::supports_mime(&record.mime_type)
        {
            let original_size = file.size();
            let scaled = scale_to_byte_limit(
                UploadedFile::new(file.name.clone(), file.mime_type.clone(), file.buffer.clone()),
                max_size,
            )
            .await?;
            info!(
                "scaled {} from {original_size} to {} bytes for a {max_size} byte limit",
                record.name,
                scaled.size()
            );
            file.buffer = scaled.buffer;
            file.mime_type = scaled.mime_type;
        }
        Ok(file)
    }

    pub async fn post_all_notifications(
        &self,
        submission: &Submission,
        parts: &[SubmissionPart],
        defaults: &DefaultOptions,
        accounts: &[Account],
    ) -> HashMap<String, DispatchOutcome> {
        stream::iter(parts)
            .map(|part| async move {
                let outcome = self
                    .dispatch_one_notification(submission, part, defaults, accounts)
                    .await;
                (part.account_id.clone(), outcome)
            })
            .buffer_unordered(self.fanout)
            .collect()
            .await
    }

    async fn dispatch_one_notification(
        &self,
        submission: &Submission,
        part: &SubmissionPart,
        defaults: &DefaultOptions,
        accounts: &[Account],
    ) -> DispatchOutcome {
        let site = match self.registry.resolve(&part.website) {
            Ok(site) => site,
            Err(e) => return DispatchOutcome::from_error(e),
        };
        let findings = site.validate_notification_submission(submission, part, defaults);
        if !findings.is_postable() {
            return DispatchOutcome::Skipped {
                reason: findings.problems.join("; "),
            };
        }
        let Some(account) = accounts.iter().find(|a| a.id == part.account_id) else {
            return DispatchOutcome::Failed {
                message: format!("no account configured with id {}", part.account_id),
                additional_info: None,
            };
        };

        let common: CommonOptions = part.options();
        let data = PostData {
            submission_id: submission.id.clone(),
            account_id: part.account_id.clone(),
            title: defaults.resolve_title(&common, &submission.title),
            description: site.build_description(&defaults.resolve_description(&common)),
            tags: site.format_tags(&defaults.resolve_tags(&common)),
            options: part.data.clone(),
            account_data: account.data.clone(),
        };

        match site.post_notification_submission(&data).await {
            Ok(response) => DispatchOutcome::Posted(response),
            Err(e) => {
                error!(
                    "notification {} to {} failed for {}: {e}",
                    submission.id, part.website, part.account_id
                );
                DispatchOutcome::from_error(e)
            }
        }
    }
}
