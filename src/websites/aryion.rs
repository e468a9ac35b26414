use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use super::folder_tree::{TreeElement, collect_folders, folder_id_exists};
use super::{Website, validate_file_size};
use crate::accounts::AccountInfo;
use crate::description;
use crate::error::{Error, PostFailure, Result};
use crate::http::{FormPart, HttpTransport, PostBody};
use crate::models::{
    Account, CommonOptions, DefaultOptions, FilePostData, FileKind, FileRecord, FileSubmission,
    LoginResponse, PostResponse, ScalingOptions, SubmissionPart,
};
use crate::utils;
use crate::validator::ValidationParts;

const BASE_URL: &str = "https://aryion.com";
const MAX_SIZE_MB: u64 = 20;
const TITLE_LIMIT: usize = 50;

const ACCEPTED_FILES: &[&str] = &[
    "jpg", "jpeg", "gif", "png", "doc", "docx", "xls", "xlsx", "swf", "vsd", "txt", "rtf", "avi",
    "mpg", "mpeg", "flv", "mp4",
];

static USER_LINK_EXPR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"class=["'][^"']*user-link[^"']*["'][^>]*>([^<]*)<"#).unwrap());
static TREE_TOKEN_EXPR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<ul[^>]*>|</ul>|<span[^>]*data-tid=["']([^"']+)["'][^>]*>([^<]*)</span>"#)
        .unwrap()
});

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct AryionOptions {
    folder: Option<String>,
    required_tag: Option<String>,
    view_permissions: Option<String>,
    comment_permissions: Option<String>,
    tag_permissions: Option<String>,
    scraps: bool,
}

pub struct Aryion<T: HttpTransport> {
    http: T,
    base_url: String,
}

impl<T: HttpTransport> Aryion<T> {
    pub fn new(http: T) -> Self {
        Self {
            http,
            base_url: BASE_URL.to_string(),
        }
    }

    /// Point the adapter at a different host, for tests against a local
    /// server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// The itemaction endpoint answers with JSON wrapped in a textarea;
    /// anything else is kept verbatim as the failure diagnostic.
    fn translate_post_body(&self, body: &str) -> Result<PostResponse> {
        let stripped = body.replace("<textarea>", "").replace("</textarea>", "");
        match serde_json::from_str::<serde_json::Value>(stripped.trim()) {
            Ok(parsed) => {
                if parsed.get("id").is_some_and(|id| !id.is_null()) {
                    let url = parsed.get("url").and_then(|u| u.as_str()).unwrap_or_default();
                    Ok(PostResponse::with_source(format!("{}{url}", self.base_url)))
                } else {
                    Err(Error::Post(PostFailure::with_body(
                        "aryion did not return an item id",
                        body,
                    )))
                }
            }
            Err(e) => Err(Error::Post(PostFailure::with_body(
                format!("unparseable aryion response: {e}"),
                body,
            ))),
        }
    }
}

/// Reduce the treeview page's nested list markup to [`TreeElement`]s. The
/// page interleaves `<span data-tid=..>` leaf markers with `<ul>` child
/// containers; a stack tracks the nesting.
fn parse_tree_elements(html: &str) -> Vec<TreeElement> {
    let mut stack: Vec<Vec<TreeElement>> = vec![Vec::new()];
    for caps in TREE_TOKEN_EXPR.captures_iter(html) {
        let token = &caps[0];
        if token.starts_with("<ul") {
            stack.push(Vec::new());
        } else if token == "</ul>" {
            if stack.len() > 1 {
                let children = stack.pop().unwrap_or_default();
                if let Some(level) = stack.last_mut() {
                    attach(level, children);
                }
            }
        } else if let (Some(value), Some(label)) = (caps.get(1), caps.get(2))
            && let Some(level) = stack.last_mut()
        {
            level.push(TreeElement::leaf(value.as_str(), label.as_str().trim()));
        }
    }
    // Unbalanced markup: fold whatever is still open into its parent.
    while stack.len() > 1 {
        let children = stack.pop().unwrap_or_default();
        if let Some(level) = stack.last_mut() {
            attach(level, children);
        }
    }
    stack.pop().unwrap_or_default()
}

fn attach(level: &mut Vec<TreeElement>, children: Vec<TreeElement>) {
    match level.last_mut() {
        Some(parent) => parent.children.extend(children),
        None => level.push(TreeElement::default().with_children(children)),
    }
}

#[async_trait]
impl<T: HttpTransport> Website for Aryion<T> {
    fn name(&self) -> &'static str {
        "aryion"
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn accepted_files(&self) -> &[&str] {
        ACCEPTED_FILES
    }

    fn scaling_options(&self, _file: &FileRecord) -> ScalingOptions {
        ScalingOptions {
            max_size: utils::mb_to_bytes(MAX_SIZE_MB),
        }
    }

    async fn check_login(&self, account: &Account) -> Result<(LoginResponse, AccountInfo)> {
        let url = format!("{}/g4/treeview.php", self.base_url);
        let response = self.http.get(&url, &account.id).await?;
        let body = response.text();

        if !body.contains("user-link") {
            return Ok((LoginResponse::logged_out(), AccountInfo::default()));
        }

        let username = USER_LINK_EXPR
            .captures(&body)
            .map(|caps| caps[1].trim().to_string());
        // The same page carries the folder tree; a parse coming up empty
        // degrades the cache, not the login.
        let folders = collect_folders(&parse_tree_elements(&body));
        let info = AccountInfo {
            username: username.clone(),
            folders,
        };
        Ok((
            LoginResponse {
                logged_in: true,
                username,
            },
            info,
        ))
    }

    fn validate_file_submission(
        &self,
        submission: &FileSubmission,
        part: &SubmissionPart,
        defaults: &DefaultOptions,
        info: &AccountInfo,
    ) -> ValidationParts {
        let mut findings = ValidationParts::default();
        let common: CommonOptions = part.options();
        let options: AryionOptions = part.options();

        let title = defaults.resolve_title(&common, &submission.title);
        if title.chars().count() > TITLE_LIMIT {
            let truncated: String = title.chars().take(TITLE_LIMIT).collect();
            findings.warn(format!(
                "Title will be truncated to {TITLE_LIMIT} characters ({truncated})"
            ));
        }

        match options.folder.as_deref() {
            None | Some("") => findings.problem("No folder selected."),
            Some(folder) => {
                if !folder_id_exists(&info.folders, folder) {
                    findings.problem(format!("Folder ({folder}) not found."));
                }
            }
        }

        if options.required_tag.is_none() {
            findings.problem("No required tag selected.");
        }

        if !self.supports_file(&submission.primary.name) {
            if submission.primary.kind == FileKind::Text {
                if submission.fallback.is_some() {
                    findings.warn("The fallback text will be used.");
                } else {
                    findings.problem(format!(
                        "Does not support file format: ({}) {}.",
                        submission.primary.name, submission.primary.mime_type
                    ));
                    findings.problem("A fallback file is required.");
                }
            } else {
                findings.problem(format!(
                    "Does not support file format: ({}) {}.",
                    submission.primary.name, submission.primary.mime_type
                ));
            }
        }

        validate_file_size(
            &mut findings,
            "Aryion",
            &submission.primary,
            utils::mb_to_bytes(MAX_SIZE_MB),
            common.auto_scale(),
        );

        findings
    }

    async fn post_file_submission(&self, data: &FilePostData) -> Result<PostResponse> {
        let options: AryionOptions = data.options();

        let mut file = &data.primary;
        if data.primary.kind == FileKind::Text && !self.supports_file(&data.primary.name) {
            file = data.fallback.as_ref().ok_or_else(|| {
                Error::Post(PostFailure::new(
                    "primary text file is unsupported and no fallback exists",
                ))
            })?;
        }

        let tags = self
            .format_tags(&data.tags)
            .into_iter()
            .filter(|t| !t.eq_ignore_ascii_case("vore") && !t.eq_ignore_ascii_case("non-vore"))
            .collect::<Vec<_>>()
            .join("\n");
        let required_tag = if options.required_tag.as_deref() == Some("1") {
            "Non-Vore"
        } else {
            ""
        };

        let mut parts = vec![
            FormPart::text("action", "new-item"),
            FormPart::text("parentid", options.folder.unwrap_or_default()),
            FormPart::text("MAX_FILE_SIZE", "78643200"),
            FormPart::text("title", data.title.clone()),
            FormPart::file("file", file.name.clone(), file.mime_type.clone(), file.buffer.clone()),
            FormPart::text("desc", data.description.clone()),
            FormPart::text("tags", tags),
            FormPart::text("reqtag[]", required_tag),
            FormPart::text("view_perm", options.view_permissions.unwrap_or_default()),
            FormPart::text("comment_perm", options.comment_permissions.unwrap_or_default()),
            FormPart::text("tag_perm", options.tag_permissions.unwrap_or_default()),
            FormPart::text("scrap", if options.scraps { "on" } else { "" }),
        ];
        if let Some(thumb) = &data.thumbnail {
            parts.push(FormPart::file(
                "thumb",
                thumb.name.clone(),
                thumb.mime_type.clone(),
                thumb.buffer.clone(),
            ));
        }

        let url = format!("{}/g4/itemaction.php", self.base_url);
        let response = self
            .http
            .post(&url, &data.account_id, PostBody::Multipart(parts))
            .await?;
        if !response.is_success() {
            return Err(Error::Post(PostFailure::with_body(
                format!("aryion returned status {}", response.status),
                response.text(),
            )));
        }
        self.translate_post_body(&response.text())
    }

    fn preparse_description(&self, text: &str) -> String {
        description::expand_username_shortcuts(text, "ar", ":icon$1:")
    }
}
