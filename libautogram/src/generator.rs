//! Content generation
//!
//! Produces a caption and slide images for a topic: captions from an
//! OpenAI-compatible chat completions endpoint, images from a
//! text-to-image inference endpoint, with the rendered bytes uploaded to
//! object storage so the publish protocol can reference them by public URL.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::{GenerationConfig, StorageConfig};
use crate::error::{GenerationError, Result};
use crate::types::GeneratedContent;

/// Produces ready-to-publish content for a topic.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Generate a caption and `slide_count` image URLs for the topic.
    ///
    /// A caption failure degrades to a templated fallback rather than
    /// failing the post; an image failure is fatal for the attempt since a
    /// post without images cannot be published.
    async fn generate(&self, topic: &str, slide_count: i64) -> Result<GeneratedContent>;
}

/// Uploads rendered image bytes and returns a public URL.
#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn upload(&self, bytes: &[u8], name: &str) -> Result<String>;
}

/// Caption used when the caption service is down or returns garbage.
pub fn fallback_caption(topic: &str) -> String {
    format!(
        "✨ {} ✨\n\nDouble tap if you agree! Share your thoughts in the comments below. 👇\n\n#daily #inspiration #content",
        topic
    )
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

/// Object storage client (Supabase-style REST API).
pub struct HttpImageStore {
    client: reqwest::Client,
    config: StorageConfig,
}

impl HttpImageStore {
    pub fn new(config: StorageConfig, timeout: std::time::Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GenerationError::Upload(format!("HTTP client init failed: {}", e)))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl ImageStore for HttpImageStore {
    async fn upload(&self, bytes: &[u8], name: &str) -> Result<String> {
        let base = self.config.api_base.trim_end_matches('/');
        let url = format!("{}/object/{}/{}", base, self.config.bucket, name);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .header(reqwest::header::CONTENT_TYPE, "image/png")
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|e| GenerationError::Upload(format!("upload request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(GenerationError::Upload(format!(
                "storage returned {} for {}",
                response.status(),
                name
            ))
            .into());
        }

        Ok(format!(
            "{}/object/public/{}/{}",
            base, self.config.bucket, name
        ))
    }
}

/// Generator backed by remote caption and image inference services.
pub struct HttpGenerator<S: ImageStore> {
    client: reqwest::Client,
    config: GenerationConfig,
    store: S,
}

impl<S: ImageStore> HttpGenerator<S> {
    pub fn new(
        config: GenerationConfig,
        store: S,
        timeout: std::time::Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GenerationError::Caption(format!("HTTP client init failed: {}", e)))?;
        Ok(Self {
            client,
            config,
            store,
        })
    }

    async fn generate_caption(&self, topic: &str) -> Result<String> {
        let base = self.config.caption_api_base.trim_end_matches('/');
        let url = format!("{}/chat/completions", base);

        let body = json!({
            "model": self.config.caption_model,
            "messages": [
                {
                    "role": "system",
                    "content": "You write engaging Instagram captions. Reply with the caption text only: no preamble, no quotes. Include a short call to action and 3-5 relevant hashtags."
                },
                {
                    "role": "user",
                    "content": format!("Write an Instagram caption about: {}", topic)
                }
            ]
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.caption_api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError::Caption(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(
                GenerationError::Caption(format!("upstream returned {}", response.status())).into(),
            );
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Caption(format!("malformed response: {}", e)))?;

        let caption = completion
            .choices
            .first()
            .map(|c| c.message.content.trim().to_string())
            .unwrap_or_default();

        if caption.is_empty() {
            return Err(GenerationError::Caption("empty completion".to_string()).into());
        }
        Ok(caption)
    }

    async fn generate_image(&self, prompt: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .post(&self.config.image_api_base)
            .bearer_auth(&self.config.image_api_key)
            .json(&json!({ "inputs": prompt }))
            .send()
            .await
            .map_err(|e| GenerationError::Image(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(
                GenerationError::Image(format!("upstream returned {}", response.status())).into(),
            );
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| GenerationError::Image(format!("failed reading body: {}", e)))?;

        if bytes.is_empty() {
            return Err(GenerationError::Image("empty image body".to_string()).into());
        }
        Ok(bytes.to_vec())
    }
}

/// Prompt for slide `index` of `total`. The last slide of a multi-image
/// post is a closing call-to-action card.
fn slide_prompt(topic: &str, index: i64, total: i64) -> String {
    if total > 1 && index == total - 1 {
        format!(
            "Minimalist Instagram closing slide about {}, bold text inviting followers to like and share, clean background, high quality",
            topic
        )
    } else if total > 1 {
        format!(
            "Instagram carousel slide {} of {} about {}, vibrant, visually striking, high quality, no text",
            index + 1,
            total,
            topic
        )
    } else {
        format!(
            "Instagram photo about {}, vibrant, visually striking, high quality, no text",
            topic
        )
    }
}

#[async_trait]
impl<S: ImageStore> ContentGenerator for HttpGenerator<S> {
    async fn generate(&self, topic: &str, slide_count: i64) -> Result<GeneratedContent> {
        let caption = match self.generate_caption(topic).await {
            Ok(caption) => caption,
            Err(e) => {
                warn!(topic, error = %e, "caption generation failed; using fallback");
                fallback_caption(topic)
            }
        };

        let slide_count = slide_count.max(1);
        let mut image_urls = Vec::with_capacity(slide_count as usize);
        for index in 0..slide_count {
            let prompt = slide_prompt(topic, index, slide_count);
            let bytes = self.generate_image(&prompt).await?;
            let name = format!("{}.png", Uuid::new_v4());
            let url = self.store.upload(&bytes, &name).await?;
            debug!(topic, slide = index + 1, url = %url, "generated slide");
            image_urls.push(url);
        }

        Ok(GeneratedContent {
            caption,
            image_urls,
        })
    }
}

/// Scriptable generator for tests.
#[derive(Clone, Default)]
pub struct MockGenerator {
    inner: std::sync::Arc<std::sync::Mutex<MockGeneratorInner>>,
}

#[derive(Default)]
struct MockGeneratorInner {
    outcomes: std::collections::VecDeque<std::result::Result<GeneratedContent, GenerationError>>,
    calls: Vec<(String, i64)>,
}

impl MockGenerator {
    pub fn succeeding() -> Self {
        Self::default()
    }

    pub fn push_outcome(
        &self,
        outcome: std::result::Result<GeneratedContent, GenerationError>,
    ) {
        self.inner.lock().unwrap().outcomes.push_back(outcome);
    }

    /// (topic, slide_count) per generate call.
    pub fn calls(&self) -> Vec<(String, i64)> {
        self.inner.lock().unwrap().calls.clone()
    }
}

#[async_trait]
impl ContentGenerator for MockGenerator {
    async fn generate(&self, topic: &str, slide_count: i64) -> Result<GeneratedContent> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push((topic.to_string(), slide_count));

        match inner.outcomes.pop_front() {
            Some(Ok(content)) => Ok(content),
            Some(Err(e)) => Err(e.into()),
            None => Ok(GeneratedContent {
                caption: format!("Generated caption about {}", topic),
                image_urls: (0..slide_count.max(1))
                    .map(|i| format!("https://cdn.example.com/{}-{}.png", topic.replace(' ', "-"), i))
                    .collect(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_caption_mentions_topic() {
        let caption = fallback_caption("cold brew coffee");
        assert!(caption.contains("cold brew coffee"));
        assert!(caption.contains('#'));
    }

    #[test]
    fn test_slide_prompts() {
        let single = slide_prompt("street food", 0, 1);
        assert!(single.contains("street food"));
        assert!(!single.contains("slide"));

        let middle = slide_prompt("street food", 1, 4);
        assert!(middle.contains("slide 2 of 4"));

        // Last slide of a carousel is the call-to-action card
        let last = slide_prompt("street food", 3, 4);
        assert!(last.contains("closing slide"));
    }

    #[test]
    fn test_chat_completion_parsing() {
        let body = r#"{
            "id": "cmpl-1",
            "choices": [
                {"index": 0, "message": {"role": "assistant", "content": "Great caption! #topic"}}
            ]
        }"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.choices[0].message.content, "Great caption! #topic");
    }

    #[tokio::test]
    async fn test_mock_generator_default_output() {
        let generator = MockGenerator::succeeding();
        let content = generator.generate("city lights", 3).await.unwrap();

        assert!(content.caption.contains("city lights"));
        assert_eq!(content.image_urls.len(), 3);
        assert_eq!(generator.calls(), vec![("city lights".to_string(), 3)]);
    }

    #[tokio::test]
    async fn test_mock_generator_scripted_failure() {
        let generator = MockGenerator::succeeding();
        generator.push_outcome(Err(GenerationError::Image("quota exceeded".to_string())));

        let result = generator.generate("t", 1).await;
        assert!(result.is_err());
    }
}
