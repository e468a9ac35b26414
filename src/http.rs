use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use log::debug;
use reqwest::multipart;
use serde::de::DeserializeOwned;

use crate::error::Result;

const USER_AGENT: &str = concat!("crosspost/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// One field of a multipart form: either a plain text value or a file
/// carrying its own name and mime type.
#[derive(Debug, Clone)]
pub enum FormPart {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        mime_type: String,
        buffer: Bytes,
    },
}

impl FormPart {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Text {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn file(
        name: impl Into<String>,
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        buffer: Bytes,
    ) -> Self {
        Self::File {
            name: name.into(),
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            buffer,
        }
    }
}

#[derive(Debug, Clone)]
pub enum PostBody {
    Multipart(Vec<FormPart>),
    UrlEncoded(Vec<(String, String)>),
    Json(serde_json::Value),
}

/// Network boundary used by website adapters. Requests are made on behalf
/// of an account so the transport can keep sessions apart.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, url: &str, account_id: &str) -> Result<HttpResponse>;
    async fn post(&self, url: &str, account_id: &str, body: PostBody) -> Result<HttpResponse>;
}

/// Production transport. Each account id gets its own lazily-built
/// `reqwest::Client` with a private cookie jar, so two accounts on the same
/// platform never share a session.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    clients: Arc<Mutex<HashMap<String, reqwest::Client>>>,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn client_for(&self, account_id: &str) -> Result<reqwest::Client> {
        let mut clients = self.clients.lock()?;
        if let Some(client) = clients.get(account_id) {
            return Ok(client.clone());
        }
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .user_agent(USER_AGENT)
            .build()?;
        clients.insert(account_id.to_string(), client.clone());
        debug!("built http client for account {account_id}");
        Ok(client)
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str, account_id: &str) -> Result<HttpResponse> {
        let response = self.client_for(account_id)?.get(url).send().await?;
        Ok(HttpResponse {
            status: response.status().as_u16(),
            body: response.bytes().await?,
        })
    }

    async fn post(&self, url: &str, account_id: &str, body: PostBody) -> Result<HttpResponse> {
        let client = self.client_for(account_id)?;
        let request = match body {
            PostBody::Multipart(parts) => {
                let mut form = multipart::Form::new();
                for part in parts {
                    form = match part {
                        FormPart::Text { name, value } => form.text(name, value),
                        FormPart::File {
                            name,
                            file_name,
                            mime_type,
                            buffer,
                        } => form.part(
                            name,
                            multipart::Part::bytes(buffer.to_vec())
                                .file_name(file_name)
                                .mime_str(&mime_type)?,
                        ),
                    };
                }
                client.post(url).multipart(form)
            }
            PostBody::UrlEncoded(fields) => client.post(url).form(&fields),
            PostBody::Json(value) => client.post(url).json(&value),
        };

        let response = request.send().await?;
        Ok(HttpResponse {
            status: response.status().as_u16(),
            body: response.bytes().await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_get_returns_status_and_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/page")
            .with_status(200)
            .with_body("hello")
            .create_async()
            .await;

        let transport = ReqwestTransport::new();
        let response = transport
            .get(&format!("{}/page", server.url()), "acc-1")
            .await
            .unwrap();

        mock.assert_async().await;
        assert!(response.is_success());
        assert_eq!(response.text(), "hello");
    }

    #[tokio::test]
    async fn test_urlencoded_post() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/submit")
            .match_header("content-type", "application/x-www-form-urlencoded")
            .match_body("action=new-item&title=hi")
            .with_status(200)
            .create_async()
            .await;

        let transport = ReqwestTransport::new();
        let body = PostBody::UrlEncoded(vec![
            ("action".into(), "new-item".into()),
            ("title".into(), "hi".into()),
        ]);
        let response = transport
            .post(&format!("{}/submit", server.url()), "acc-1", body)
            .await
            .unwrap();

        mock.assert_async().await;
        assert!(response.is_success());
    }

    #[tokio::test]
    async fn test_multipart_post_with_file() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/upload")
            .match_header(
                "content-type",
                mockito::Matcher::Regex("multipart/form-data.*".into()),
            )
            .with_status(200)
            .with_body(r#"{"ok":true}"#)
            .create_async()
            .await;

        let transport = ReqwestTransport::new();
        let body = PostBody::Multipart(vec![
            FormPart::text("title", "art"),
            FormPart::file("file", "art.png", "image/png", Bytes::from_static(b"png!")),
        ]);
        let response = transport
            .post(&format!("{}/upload", server.url()), "acc-1", body)
            .await
            .unwrap();

        mock.assert_async().await;
        let parsed: serde_json::Value = response.json().unwrap();
        assert_eq!(parsed, json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_clients_are_cached_per_account() {
        let transport = ReqwestTransport::new();
        transport.client_for("acc-1").unwrap();
        transport.client_for("acc-1").unwrap();
        transport.client_for("acc-2").unwrap();
        assert_eq!(transport.clients.lock().unwrap().len(), 2);
    }
}
