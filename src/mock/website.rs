use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::accounts::AccountInfo;
use crate::error::{Error, PostFailure, Result};
use crate::models::{
    Account, CommonOptions, DefaultOptions, FilePostData, FileRecord, FileSubmission,
    LoginResponse, PostData, PostResponse, ScalingOptions, SubmissionPart,
};
use crate::validator::ValidationParts;
use crate::websites::{Website, validate_file_size};

#[derive(Debug, Clone, Default)]
enum LoginScript {
    #[default]
    LoggedOut,
    LoggedIn(String),
    Fails,
}

/// Scripted [`Website`] double. Validation problems, post failures and
/// login outcomes are configured per account; every post call is recorded
/// for later inspection.
#[derive(Debug, Default)]
pub struct MockWebsite {
    name: &'static str,
    max_size: u64,
    login: LoginScript,
    problems: HashMap<String, Vec<String>>,
    warnings: Vec<String>,
    failing_posts: HashSet<String>,
    supports_notifications: bool,
    posted: Mutex<Vec<FilePostData>>,
    notified: Mutex<Vec<PostData>>,
}

impl MockWebsite {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            max_size: 100 * 1024 * 1024,
            ..Default::default()
        }
    }

    pub fn with_max_size(mut self, max_size: u64) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn logged_in_as(mut self, username: &str) -> Self {
        self.login = LoginScript::LoggedIn(username.to_string());
        self
    }

    pub fn failing_login(mut self) -> Self {
        self.login = LoginScript::Fails;
        self
    }

    pub fn problem_for(mut self, account_id: &str, message: &str) -> Self {
        self.problems
            .entry(account_id.to_string())
            .or_default()
            .push(message.to_string());
        self
    }

    pub fn warn_always(mut self, message: &str) -> Self {
        self.warnings.push(message.to_string());
        self
    }

    pub fn failing_post_for(mut self, account_id: &str) -> Self {
        self.failing_posts.insert(account_id.to_string());
        self
    }

    pub fn supporting_notifications(mut self) -> Self {
        self.supports_notifications = true;
        self
    }

    pub fn posted(&self) -> Vec<FilePostData> {
        self.posted.lock().unwrap().clone()
    }

    pub fn posted_accounts(&self) -> Vec<String> {
        self.posted()
            .into_iter()
            .map(|data| data.account_id)
            .collect()
    }

    pub fn notified(&self) -> Vec<PostData> {
        self.notified.lock().unwrap().clone()
    }
}

#[async_trait]
impl Website for MockWebsite {
    fn name(&self) -> &'static str {
        self.name
    }

    fn base_url(&self) -> &str {
        "https://mock.example"
    }

    fn accepts_additional_files(&self) -> bool {
        true
    }

    fn scaling_options(&self, _file: &FileRecord) -> ScalingOptions {
        ScalingOptions {
            max_size: self.max_size,
        }
    }

    async fn check_login(&self, _account: &Account) -> Result<(LoginResponse, AccountInfo)> {
        match &self.login {
            LoginScript::Fails => Err(Error::Other("scripted login failure".into())),
            LoginScript::LoggedOut => Ok((LoginResponse::logged_out(), AccountInfo::default())),
            LoginScript::LoggedIn(username) => Ok((
                LoginResponse::logged_in(username.clone()),
                AccountInfo {
                    username: Some(username.clone()),
                    folders: Vec::new(),
                },
            )),
        }
    }

    fn validate_file_submission(
        &self,
        submission: &FileSubmission,
        part: &SubmissionPart,
        _defaults: &DefaultOptions,
        _info: &AccountInfo,
    ) -> ValidationParts {
        let mut findings = ValidationParts::default();
        if let Some(problems) = self.problems.get(&part.account_id) {
            for problem in problems {
                findings.problem(problem.clone());
            }
        }
        for warning in &self.warnings {
            findings.warn(warning.clone());
        }
        let options: CommonOptions = part.options();
        validate_file_size(
            &mut findings,
            self.name,
            &submission.primary,
            self.max_size,
            options.auto_scale(),
        );
        findings
    }

    async fn post_file_submission(&self, data: &FilePostData) -> Result<PostResponse> {
        self.posted.lock().unwrap().push(data.clone());
        if self.failing_posts.contains(&data.account_id) {
            return Err(Error::Post(PostFailure::new("scripted post failure")));
        }
        Ok(PostResponse::with_source(format!(
            "https://mock.example/{}",
            data.submission_id
        )))
    }

    async fn post_notification_submission(&self, data: &PostData) -> Result<PostResponse> {
        self.notified.lock().unwrap().push(data.clone());
        if !self.supports_notifications {
            return Err(Error::NotSupported(self.name));
        }
        if self.failing_posts.contains(&data.account_id) {
            return Err(Error::Post(PostFailure::new("scripted post failure")));
        }
        Ok(PostResponse::new())
    }
}
