use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{Website, validate_file_size};
use crate::accounts::AccountInfo;
use crate::description;
use crate::error::{Error, PostFailure, Result};
use crate::http::{FormPart, HttpTransport, PostBody};
use crate::models::{
    Account, CommonOptions, DefaultOptions, FilePostData, FileRecord, FileSubmission,
    LoginResponse, PostData, PostResponse, ScalingOptions, SubmissionPart,
};
use crate::utils;
use crate::validator::ValidationParts;

const MAX_SIZE_MB: u64 = 8;
const MAX_DESCRIPTION_CHARS: usize = 2000;

/// Discord credential bag: a webhook URL plus a display name, stored by the
/// host in the account's data field.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct DiscordCredentials {
    name: String,
    webhook: String,
}

/// Webhook-based Discord adapter. There is no real login; an account is
/// "logged in" as soon as a webhook is configured, and posting is a webhook
/// execute with the files attached.
pub struct Discord<T: HttpTransport> {
    http: T,
}

impl<T: HttpTransport> Discord<T> {
    pub fn new(http: T) -> Self {
        Self { http }
    }

    fn trimmed_content(description: &str) -> String {
        description.chars().take(MAX_DESCRIPTION_CHARS).collect()
    }

    fn webhook_of(account_data: &serde_json::Value) -> Result<DiscordCredentials> {
        let creds: DiscordCredentials = crate::models::parse_options(account_data);
        if creds.webhook.is_empty() {
            return Err(Error::Post(PostFailure::new(
                "no webhook configured for this discord account",
            )));
        }
        Ok(creds)
    }

    fn translate_response(response: crate::http::HttpResponse) -> Result<PostResponse> {
        if !response.is_success() {
            return Err(Error::Post(PostFailure::with_body(
                format!("discord webhook returned status {}", response.status),
                response.text(),
            )));
        }
        // With wait=true the webhook echoes the created message; its id is
        // the closest thing to a source discord offers.
        match response.json::<serde_json::Value>() {
            Ok(message) => {
                let id = message.get("id").cloned().unwrap_or(serde_json::Value::Null);
                Ok(PostResponse::new().info(json!({ "messageId": id })))
            }
            Err(_) => Ok(PostResponse::new()),
        }
    }
}

#[async_trait]
impl<T: HttpTransport> Website for Discord<T> {
    fn name(&self) -> &'static str {
        "discord"
    }

    fn base_url(&self) -> &str {
        ""
    }

    fn accepts_additional_files(&self) -> bool {
        true
    }

    fn scaling_options(&self, _file: &FileRecord) -> ScalingOptions {
        ScalingOptions {
            max_size: utils::mb_to_bytes(MAX_SIZE_MB),
        }
    }

    async fn check_login(&self, account: &Account) -> Result<(LoginResponse, AccountInfo)> {
        let creds: DiscordCredentials = account.data_as();
        if creds.webhook.is_empty() {
            return Ok((LoginResponse::logged_out(), AccountInfo::default()));
        }
        let username = if creds.name.is_empty() {
            account.alias.clone()
        } else {
            creds.name
        };
        let info = AccountInfo {
            username: Some(username.clone()),
            folders: Vec::new(),
        };
        Ok((LoginResponse::logged_in(username), info))
    }

    fn validate_file_submission(
        &self,
        submission: &FileSubmission,
        part: &SubmissionPart,
        defaults: &DefaultOptions,
        _info: &AccountInfo,
    ) -> ValidationParts {
        let mut findings = ValidationParts::default();
        let options: CommonOptions = part.options();
        let max_size = utils::mb_to_bytes(MAX_SIZE_MB);

        let files = std::iter::once(&submission.primary).chain(
            submission
                .additional
                .iter()
                .filter(|f| !f.is_ignored_for(&part.account_id)),
        );
        for file in files {
            validate_file_size(
                &mut findings,
                "Discord",
                file,
                max_size,
                options.auto_scale(),
            );
        }

        let parsed = self.default_description_parser(&defaults.resolve_description(&options));
        if parsed.chars().count() > MAX_DESCRIPTION_CHARS {
            findings.warn("Max description length allowed is 2,000 characters.");
        }

        findings
    }

    async fn post_file_submission(&self, data: &FilePostData) -> Result<PostResponse> {
        let creds = Self::webhook_of(&data.account_data)?;
        let payload = json!({ "content": Self::trimmed_content(&data.description) });

        let mut parts = vec![FormPart::text("payload_json", serde_json::to_string(&payload)?)];
        let files = std::iter::once(&data.primary).chain(data.additional.iter());
        for (i, file) in files.enumerate() {
            parts.push(FormPart::file(
                format!("files[{i}]"),
                file.name.clone(),
                file.mime_type.clone(),
                file.buffer.clone(),
            ));
        }

        let url = format!("{}?wait=true", creds.webhook);
        let response = self
            .http
            .post(&url, &data.account_id, PostBody::Multipart(parts))
            .await?;
        Self::translate_response(response)
    }

    async fn post_notification_submission(&self, data: &PostData) -> Result<PostResponse> {
        let creds = Self::webhook_of(&data.account_data)?;
        let body = json!({ "content": Self::trimmed_content(&data.description) });

        let url = format!("{}?wait=true", creds.webhook);
        let response = self
            .http
            .post(&url, &data.account_id, PostBody::Json(body))
            .await?;
        Self::translate_response(response)
    }

    fn preparse_description(&self, text: &str) -> String {
        text.replace("<b>", "**")
            .replace("</b>", "**")
            .replace("<strong>", "**")
            .replace("</strong>", "**")
            .replace("<i>", "*")
            .replace("</i>", "*")
            .replace("<em>", "*")
            .replace("</em>", "*")
    }

    /// Bare links get wrapped in angle brackets so discord does not unfurl
    /// an embed for every one of them.
    fn parse_description(&self, text: &str) -> String {
        description::bracket_links(&self.default_description_parser(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::ReqwestTransport;
    use crate::models::{FileKind, PostedFile};
    use bytes::Bytes;

    fn discord() -> Discord<ReqwestTransport> {
        Discord::new(ReqwestTransport::new())
    }

    fn record(name: &str, mime: &str, size: u64) -> FileRecord {
        FileRecord {
            location: format!("subs/{name}"),
            preview: None,
            name: name.to_string(),
            mime_type: mime.to_string(),
            size,
            kind: FileKind::from_mime(mime, name),
            ignored_accounts: Vec::new(),
        }
    }

    fn submission_with_primary(primary: FileRecord) -> FileSubmission {
        FileSubmission {
            id: "sub1".into(),
            title: "piece".into(),
            primary,
            fallback: None,
            thumbnail: None,
            additional: Vec::new(),
        }
    }

    fn post_data(webhook: &str, description: &str) -> FilePostData {
        FilePostData {
            submission_id: "sub1".into(),
            account_id: "acc-1".into(),
            title: "piece".into(),
            description: description.into(),
            tags: Vec::new(),
            primary: PostedFile {
                name: "art.png".into(),
                mime_type: "image/png".into(),
                buffer: Bytes::from_static(b"png!"),
                kind: FileKind::Image,
            },
            fallback: None,
            thumbnail: None,
            additional: Vec::new(),
            options: serde_json::Value::Null,
            account_data: json!({ "name": "hook", "webhook": webhook }),
        }
    }

    #[tokio::test]
    async fn test_login_reads_webhook_without_network() {
        let account = Account::new("acc-1", "discord", "main")
            .with_data(json!({ "name": "My Server", "webhook": "https://example/hook" }));
        let (login, info) = discord().check_login(&account).await.unwrap();

        assert!(login.logged_in);
        assert_eq!(login.username.as_deref(), Some("My Server"));
        assert_eq!(info.username.as_deref(), Some("My Server"));
    }

    #[tokio::test]
    async fn test_login_without_webhook_is_logged_out() {
        let account = Account::new("acc-1", "discord", "main");
        let (login, _) = discord().check_login(&account).await.unwrap();
        assert!(!login.logged_in);
    }

    #[test]
    fn test_oversized_image_warns_with_autoscale() {
        let submission = submission_with_primary(record("big.png", "image/png", 9 * 1024 * 1024));
        let part = SubmissionPart::new("acc-1", "discord");

        let findings = discord().validate_file_submission(
            &submission,
            &part,
            &DefaultOptions::default(),
            &AccountInfo::default(),
        );
        assert!(findings.problems.is_empty());
        assert_eq!(findings.warnings.len(), 1);
    }

    #[test]
    fn test_ignored_additional_file_not_validated() {
        let mut submission =
            submission_with_primary(record("ok.png", "image/png", 1024));
        let mut huge = record("huge.mp4", "video/mp4", 50 * 1024 * 1024);
        huge.ignored_accounts = vec!["acc-1".into()];
        submission.additional.push(huge);
        let part = SubmissionPart::new("acc-1", "discord");

        let findings = discord().validate_file_submission(
            &submission,
            &part,
            &DefaultOptions::default(),
            &AccountInfo::default(),
        );
        assert!(findings.is_postable());
        assert!(findings.warnings.is_empty());
    }

    #[test]
    fn test_long_description_warns() {
        let submission = submission_with_primary(record("ok.png", "image/png", 1024));
        let part = SubmissionPart::new("acc-1", "discord");
        let defaults = DefaultOptions {
            description: Some("x".repeat(2500)),
            ..DefaultOptions::default()
        };

        let findings = discord().validate_file_submission(
            &submission,
            &part,
            &defaults,
            &AccountInfo::default(),
        );
        assert_eq!(findings.warnings.len(), 1);
    }

    #[test]
    fn test_description_pipeline_markdown_and_links() {
        let site = discord();
        let built = site.build_description(
            "<b>Big news</b> at https://example.com/page today",
        );
        assert_eq!(built, "**Big news** at <https://example.com/page> today");
    }

    #[tokio::test]
    async fn test_post_file_submission_reports_message_id() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/webhooks/1/tok")
            .match_query(mockito::Matcher::UrlEncoded("wait".into(), "true".into()))
            .with_status(200)
            .with_body(r#"{"id":"112233"}"#)
            .create_async()
            .await;

        let data = post_data(&format!("{}/api/webhooks/1/tok", server.url()), "hello");
        let response = discord().post_file_submission(&data).await.unwrap();

        mock.assert_async().await;
        assert!(response.source.is_none());
        assert_eq!(
            response.additional_info,
            Some(json!({ "messageId": "112233" }))
        );
    }

    #[tokio::test]
    async fn test_failed_webhook_becomes_post_failure_with_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/webhooks/1/tok")
            .match_query(mockito::Matcher::Any)
            .with_status(400)
            .with_body(r#"{"message":"Invalid Webhook Token"}"#)
            .create_async()
            .await;

        let data = post_data(&format!("{}/api/webhooks/1/tok", server.url()), "hello");
        let err = discord().post_file_submission(&data).await.unwrap_err();

        match err {
            Error::Post(failure) => {
                assert!(failure.message.contains("400"));
                assert!(failure.body.unwrap().contains("Invalid Webhook Token"));
            }
            other => panic!("expected post failure, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_notification_posts_json_content() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/webhooks/1/tok")
            .match_query(mockito::Matcher::Any)
            .match_header("content-type", "application/json")
            .with_status(200)
            .with_body(r#"{"id":"5"}"#)
            .create_async()
            .await;

        let data = PostData {
            submission_id: "sub1".into(),
            account_id: "acc-1".into(),
            title: "news".into(),
            description: "just text".into(),
            tags: Vec::new(),
            options: serde_json::Value::Null,
            account_data: json!({ "webhook": format!("{}/api/webhooks/1/tok", server.url()) }),
        };
        discord().post_notification_submission(&data).await.unwrap();
        mock.assert_async().await;
    }
}
