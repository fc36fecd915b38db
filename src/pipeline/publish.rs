//! Publishing to a DEV.to-compatible blogging API.
//!
//! One request per publish, no retries: a failed publish must be reported,
//! never silently repeated (a retried `POST` can create duplicate articles).

use crate::config::PublishSettings;
use crate::error::ScholarError;
use crate::pipeline::blog::normalise_tag;
use crate::provider::BlogPublisher;
use crate::records::{BlogRecord, PublishMode, PublishReceipt};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

/// DEV.to accepts at most four tags per article.
pub const MAX_DEVTO_TAGS: usize = 4;

/// `POST {base_url}/articles` client.
#[derive(Debug, Clone)]
pub struct DevToPublisher {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct ArticleEnvelope<'a> {
    article: Article<'a>,
}

#[derive(Debug, Serialize)]
struct Article<'a> {
    title: &'a str,
    body_markdown: &'a str,
    published: bool,
    tags: Vec<String>,
    description: &'a str,
}

#[derive(Debug, Deserialize)]
struct ArticleResponse {
    id: serde_json::Value,
    url: Option<String>,
    #[serde(default)]
    published: Option<bool>,
}

/// Summary of an article already on the platform.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ArticleSummary {
    pub id: u64,
    pub title: String,
    pub url: Option<String>,
    #[serde(default)]
    pub published: bool,
}

impl DevToPublisher {
    /// Build a publisher; fails with `PublisherNotConfigured` without an API key.
    pub fn new(settings: &PublishSettings, timeout_secs: u64) -> Result<Self, ScholarError> {
        let api_key = settings
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ScholarError::PublisherNotConfigured {
                hint: "set DEVTO_API_KEY or pass --devto-api-key".into(),
            })?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ScholarError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// The caller's most recent published articles.
    pub async fn my_articles(&self, per_page: u32) -> Result<Vec<ArticleSummary>, ScholarError> {
        let response = self
            .client
            .get(format!("{}/articles/me/published", self.base_url))
            .query(&[("per_page", per_page)])
            .header("api-key", &self.api_key)
            .send()
            .await
            .map_err(network_error)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status.as_u16(), &body));
        }
        response
            .json()
            .await
            .map_err(|e| ScholarError::PublishFailed {
                detail: format!("unreadable response: {e}"),
            })
    }
}

/// At most four normalised tags, in the record's order.
pub fn devto_tags(blog: &BlogRecord) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in blog.tags.iter().map(|t| normalise_tag(t)) {
        if !tag.is_empty() && !tags.contains(&tag) {
            tags.push(tag);
        }
        if tags.len() == MAX_DEVTO_TAGS {
            break;
        }
    }
    tags
}

#[async_trait]
impl BlogPublisher for DevToPublisher {
    async fn publish(&self, blog: &BlogRecord, mode: PublishMode) -> Result<PublishReceipt, ScholarError> {
        let envelope = ArticleEnvelope {
            article: Article {
                title: &blog.title,
                body_markdown: &blog.markdown,
                published: mode == PublishMode::Live,
                tags: devto_tags(blog),
                description: &blog.description,
            },
        };

        let response = self
            .client
            .post(format!("{}/articles", self.base_url))
            .header("api-key", &self.api_key)
            .json(&envelope)
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = status_error(status.as_u16(), &body);
            warn!("{}", err);
            return Err(err);
        }

        let parsed: ArticleResponse = response
            .json()
            .await
            .map_err(|e| ScholarError::PublishFailed {
                detail: format!("unreadable response: {e}"),
            })?;
        let id = match parsed.id {
            serde_json::Value::String(s) => s,
            serde_json::Value::Null => {
                return Err(ScholarError::PublishFailed {
                    detail: "response has no article id".into(),
                })
            }
            other => other.to_string(),
        };
        let receipt = PublishReceipt {
            id,
            url: parsed.url,
            published: parsed.published.unwrap_or(mode == PublishMode::Live),
        };
        info!(
            "Published article {} ({}){}",
            receipt.id,
            if receipt.published { "live" } else { "draft" },
            receipt
                .url
                .as_deref()
                .map(|u| format!(": {u}"))
                .unwrap_or_default()
        );
        Ok(receipt)
    }
}

fn network_error(e: reqwest::Error) -> ScholarError {
    ScholarError::PublishFailed {
        detail: if e.is_timeout() {
            format!("request timed out: {e}")
        } else {
            e.to_string()
        },
    }
}

fn status_error(status: u16, body: &str) -> ScholarError {
    let detail: String = body.chars().take(300).collect();
    let detail = detail.trim().to_string();
    match status {
        401 | 403 => ScholarError::PublishAuth { status, detail },
        400..=499 => ScholarError::PublishRejected { status, detail },
        _ => ScholarError::PublishFailed {
            detail: format!("HTTP {status}: {detail}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::BlogSection;
    use mockito::Matcher;
    use std::collections::BTreeSet;

    fn blog() -> BlogRecord {
        BlogRecord {
            title: "Attention Is All You Need".into(),
            sections: vec![BlogSection {
                name: "introduction".into(),
                text: "Hi".into(),
            }],
            tags: BTreeSet::from(
                ["ai", "nlp", "research", "science", "transformers"].map(String::from),
            ),
            reading_time_minutes: 3,
            description: "Attention explained.".into(),
            markdown: "# Attention Is All You Need\n\nHi\n".into(),
        }
    }

    fn publisher(url: String) -> DevToPublisher {
        DevToPublisher::new(
            &PublishSettings {
                base_url: url,
                api_key: Some("devto-key".into()),
            },
            5,
        )
        .unwrap()
    }

    #[test]
    fn requires_api_key() {
        let err = DevToPublisher::new(&PublishSettings::default(), 5).unwrap_err();
        assert!(matches!(err, ScholarError::PublisherNotConfigured { .. }));
    }

    #[test]
    fn at_most_four_tags() {
        assert_eq!(devto_tags(&blog()), vec!["ai", "nlp", "research", "science"]);
    }

    #[tokio::test]
    async fn draft_publish_sends_article() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/articles")
            .match_header("api-key", "devto-key")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "article": {
                    "title": "Attention Is All You Need",
                    "published": false,
                    "tags": ["ai", "nlp", "research", "science"],
                    "description": "Attention explained."
                }
            })))
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id": 1234, "url": "https://dev.to/me/attention-1234", "published": false}"#)
            .create_async()
            .await;

        let receipt = publisher(server.url())
            .publish(&blog(), PublishMode::Draft)
            .await
            .unwrap();
        assert_eq!(receipt.id, "1234");
        assert_eq!(receipt.url.as_deref(), Some("https://dev.to/me/attention-1234"));
        assert!(!receipt.published);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn unauthorized_is_auth_error_and_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/articles")
            .with_status(401)
            .with_body(r#"{"error":"unauthorized","status":401}"#)
            .expect(1)
            .create_async()
            .await;

        let err = publisher(server.url())
            .publish(&blog(), PublishMode::Live)
            .await
            .unwrap_err();
        assert!(matches!(err, ScholarError::PublishAuth { status: 401, .. }));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn validation_error_is_rejection() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/articles")
            .with_status(422)
            .with_body(r#"{"error":"Title can't be blank"}"#)
            .create_async()
            .await;

        let err = publisher(server.url())
            .publish(&blog(), PublishMode::Draft)
            .await
            .unwrap_err();
        assert!(matches!(err, ScholarError::PublishRejected { status: 422, .. }));
        assert!(err.to_string().contains("blank"));
    }

    #[tokio::test]
    async fn server_error_is_failure() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/articles")
            .with_status(503)
            .expect(1)
            .create_async()
            .await;

        let err = publisher(server.url())
            .publish(&blog(), PublishMode::Draft)
            .await
            .unwrap_err();
        assert!(matches!(err, ScholarError::PublishFailed { .. }));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn lists_published_articles() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/articles/me/published")
            .match_query(Matcher::UrlEncoded("per_page".into(), "2".into()))
            .with_status(200)
            .with_body(r#"[{"id": 1, "title": "One", "url": "https://dev.to/1", "published": true}]"#)
            .create_async()
            .await;

        let articles = publisher(server.url()).my_articles(2).await.unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].title, "One");
    }
}
