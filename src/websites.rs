pub mod aryion;
pub mod discord;
pub mod folder_tree;
pub mod registry;

pub use aryion::Aryion;
pub use discord::Discord;
pub use registry::WebsiteRegistry;

use async_trait::async_trait;

use crate::accounts::AccountInfo;
use crate::description;
use crate::error::{Error, Result};
use crate::models::{
    Account, DefaultOptions, FilePostData, FileKind, FileRecord, FileSubmission, LoginResponse,
    PostData, PostResponse, ScalingOptions, Submission, SubmissionPart,
};
use crate::transform;
use crate::utils;
use crate::validator::ValidationParts;

/// One platform integration. Implementations are stateless: everything
/// account-scoped comes in through the parameters and goes back out through
/// the returned values.
///
/// Validation methods are pure by contract — no I/O, no errors, every
/// finding becomes a problem or a warning.
#[async_trait]
pub trait Website: Send + Sync {
    /// Registry key of this platform.
    fn name(&self) -> &'static str;

    fn base_url(&self) -> &str;

    /// Accepted file extensions; an empty slice accepts everything.
    fn accepted_files(&self) -> &[&str] {
        &[]
    }

    fn accepts_additional_files(&self) -> bool {
        false
    }

    fn scaling_options(&self, file: &FileRecord) -> ScalingOptions;

    /// Read-only probe of the account's login state. A successful probe may
    /// bring refreshed platform-side info (username, folder tree) along;
    /// failure to gather that info must not fail the login itself.
    async fn check_login(&self, account: &Account) -> Result<(LoginResponse, AccountInfo)>;

    fn validate_file_submission(
        &self,
        submission: &FileSubmission,
        part: &SubmissionPart,
        defaults: &DefaultOptions,
        info: &AccountInfo,
    ) -> ValidationParts;

    fn validate_notification_submission(
        &self,
        _submission: &Submission,
        _part: &SubmissionPart,
        _defaults: &DefaultOptions,
    ) -> ValidationParts {
        ValidationParts::default()
    }

    async fn post_file_submission(&self, data: &FilePostData) -> Result<PostResponse>;

    async fn post_notification_submission(&self, _data: &PostData) -> Result<PostResponse> {
        Err(Error::NotSupported(self.name()))
    }

    /// Platform-specific markup rewrites applied before any parsing.
    fn preparse_description(&self, text: &str) -> String {
        text.to_string()
    }

    fn default_description_parser(&self, text: &str) -> String {
        description::plaintext(text)
    }

    /// Platform-specific parse stage; the default is just the default
    /// parser. Overrides normally run the default parser first and refine
    /// its output.
    fn parse_description(&self, text: &str) -> String {
        self.default_description_parser(text)
    }

    /// Fixed description pipeline: preparse, then the parse stage.
    fn build_description(&self, text: &str) -> String {
        let preparsed = self.preparse_description(text);
        self.parse_description(&preparsed)
    }

    fn format_tags(&self, tags: &[String]) -> Vec<String> {
        let mut formatted: Vec<String> = Vec::new();
        for tag in tags {
            let tag = tag.trim();
            if !tag.is_empty() && !formatted.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
                formatted.push(tag.to_string());
            }
        }
        formatted
    }

    fn supports_file(&self, file_name: &str) -> bool {
        supports_extension(file_name, self.accepted_files())
    }
}

pub fn supports_extension(file_name: &str, accepted: &[&str]) -> bool {
    if accepted.is_empty() {
        return true;
    }
    match utils::file_extension(file_name) {
        Some(ext) => accepted.iter().any(|a| a.eq_ignore_ascii_case(&ext)),
        None => false,
    }
}

/// Shared size check: an oversized file is only a warning when auto-scaling
/// is on and the engine can actually rescale it; otherwise it blocks.
pub fn validate_file_size(
    findings: &mut ValidationParts,
    site: &str,
    file: &FileRecord,
    max_size: u64,
    auto_scale: bool,
) {
    if file.size <= max_size {
        return;
    }
    let max_mb = max_size / (1024 * 1024);
    if auto_scale && file.kind == FileKind::Image && transform::supports_mime(&file.mime_type) {
        findings.warn(format!("{} will be scaled down to {max_mb}MB", file.name));
    } else {
        findings.problem(format!("{site} limits {} to {max_mb}MB", file.mime_type));
    }
}
