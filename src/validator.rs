use std::collections::HashMap;
use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::accounts::{AccountInfo, AccountInfoStore};
use crate::models::{DefaultOptions, FileSubmission, Submission, SubmissionPart};
use crate::websites::WebsiteRegistry;

/// Findings for one destination. Problems block posting there; warnings are
/// shown but never block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationParts {
    pub problems: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationParts {
    pub fn problem(&mut self, message: impl Into<String>) {
        self.problems.push(message.into());
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn is_postable(&self) -> bool {
        self.problems.is_empty()
    }

    pub fn merge(&mut self, other: ValidationParts) {
        self.problems.extend(other.problems);
        self.warnings.extend(other.warnings);
    }
}

/// Runs each destination's adapter validation. Destinations are fully
/// independent and nothing here touches the network; adapters uphold that
/// as part of their contract.
#[derive(Clone)]
pub struct SubmissionValidator {
    registry: Arc<WebsiteRegistry>,
    info: AccountInfoStore,
}

impl SubmissionValidator {
    pub fn new(registry: Arc<WebsiteRegistry>, info: AccountInfoStore) -> Self {
        Self { registry, info }
    }

    pub fn validate_all(
        &self,
        submission: &FileSubmission,
        parts: &[SubmissionPart],
        defaults: &DefaultOptions,
    ) -> HashMap<String, ValidationParts> {
        parts
            .iter()
            .map(|part| {
                let findings = self.validate_one(submission, part, defaults);
                debug!(
                    "validated {} for {}: {} problems, {} warnings",
                    submission.id,
                    part.account_id,
                    findings.problems.len(),
                    findings.warnings.len()
                );
                (part.account_id.clone(), findings)
            })
            .collect()
    }

    pub fn validate_one(
        &self,
        submission: &FileSubmission,
        part: &SubmissionPart,
        defaults: &DefaultOptions,
    ) -> ValidationParts {
        let Some(site) = self.registry.get(&part.website) else {
            return unknown_website(&part.website);
        };
        let info = match self.info.get(&part.account_id) {
            Ok(info) => info,
            Err(_) => AccountInfo::default(),
        };
        site.validate_file_submission(submission, part, defaults, &info)
    }

    pub fn validate_all_notifications(
        &self,
        submission: &Submission,
        parts: &[SubmissionPart],
        defaults: &DefaultOptions,
    ) -> HashMap<String, ValidationParts> {
        parts
            .iter()
            .map(|part| {
                let findings = match self.registry.get(&part.website) {
                    Some(site) => {
                        site.validate_notification_submission(submission, part, defaults)
                    }
                    None => unknown_website(&part.website),
                };
                (part.account_id.clone(), findings)
            })
            .collect()
    }
}

fn unknown_website(key: &str) -> ValidationParts {
    let mut findings = ValidationParts::default();
    findings.problem(format!("No adapter registered for website: {key}"));
    findings
}
