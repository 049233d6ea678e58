//! Audio and image files for deck entries.
//!
//! Both services are optional extras: a fatal error (bad key, exhausted
//! quota) stops the run, anything else just leaves the card without media.

use crate::config::Config;
use crate::error::{Service, ServiceError};
use crate::retry::{with_retry_if, RetryConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Name of the media directory inside the output directory.
pub const MEDIA_DIR: &str = "media";

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    speed: f32,
    response_format: &'a str,
}

#[derive(Debug, Deserialize)]
struct ImageSearchResponse {
    #[serde(default)]
    hits: Vec<ImageHit>,
}

#[derive(Debug, Deserialize)]
struct ImageHit {
    #[serde(rename = "webformatURL")]
    webformat_url: String,
}

/// Text-to-speech settings.
#[derive(Debug, Clone)]
pub struct SpeechSettings {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    pub voice: String,
    pub speed: f32,
}

/// Image search settings.
#[derive(Debug, Clone)]
pub struct ImageSettings {
    pub api_url: String,
    pub api_key: String,
}

pub struct MediaGenerator {
    http: reqwest::Client,
    media_dir: PathBuf,
    speech: Option<SpeechSettings>,
    images: Option<ImageSettings>,
    retry: RetryConfig,
}

impl MediaGenerator {
    pub fn new(http: reqwest::Client, output_dir: &Path) -> Self {
        Self {
            http,
            media_dir: output_dir.join(MEDIA_DIR),
            speech: None,
            images: None,
            retry: RetryConfig::media_call(),
        }
    }

    /// Generator configured from the environment; images only with a Pixabay key.
    pub fn from_config(
        http: reqwest::Client,
        output_dir: &Path,
        config: &Config,
        audio: bool,
        images: bool,
    ) -> Self {
        let mut generator = Self::new(http, output_dir);
        if audio {
            generator = generator.with_speech(SpeechSettings {
                api_url: config.openai_tts_url.clone(),
                api_key: config.openai_api_key.clone(),
                model: config.tts_model.clone(),
                voice: config.tts_voice.clone(),
                speed: config.tts_speed,
            });
        }
        match (&config.pixabay_api_key, images) {
            (Some(key), true) => {
                generator = generator.with_images(ImageSettings {
                    api_url: config.pixabay_api_url.clone(),
                    api_key: key.clone(),
                });
            }
            (None, true) => info!("PIXABAY_API_KEY not set, skipping images"),
            _ => {}
        }
        generator
    }

    pub fn with_speech(mut self, settings: SpeechSettings) -> Self {
        self.speech = Some(settings);
        self
    }

    pub fn with_images(mut self, settings: ImageSettings) -> Self {
        self.images = Some(settings);
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn media_dir(&self) -> &Path {
        &self.media_dir
    }

    /// Speak `sentences` into `<media>/<slug>.mp3`.
    ///
    /// Returns the file name, or `None` when speech is disabled or failed.
    pub async fn audio(&self, slug: &str, sentences: &[String]) -> Result<Option<String>, ServiceError> {
        let Some(settings) = &self.speech else {
            return Ok(None);
        };
        let text = sentences
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if text.is_empty() {
            return Ok(None);
        }

        let file_name = format!("{}.mp3", slug);
        let result = with_retry_if(
            &self.retry,
            &format!("speech for '{}'", slug),
            || self.synthesize(settings, &text),
            ServiceError::is_retryable,
        )
        .await;

        self.store(result, &file_name).await
    }

    /// Download an image for `query` into `<media>/<slug>.jpg`.
    pub async fn image(&self, slug: &str, query: &str) -> Result<Option<String>, ServiceError> {
        let Some(settings) = &self.images else {
            return Ok(None);
        };

        let file_name = format!("{}.jpg", slug);
        let result = with_retry_if(
            &self.retry,
            &format!("image for '{}'", query),
            || self.fetch_image(settings, query),
            ServiceError::is_retryable,
        )
        .await;

        let bytes = match result {
            Ok(Some(bytes)) => Ok(bytes),
            Ok(None) => {
                warn!("No image found for '{}'", query);
                return Ok(None);
            }
            Err(e) => Err(e),
        };
        self.store(bytes, &file_name).await
    }

    async fn synthesize(&self, settings: &SpeechSettings, text: &str) -> Result<Vec<u8>, ServiceError> {
        let request = SpeechRequest {
            model: &settings.model,
            input: text,
            voice: &settings.voice,
            speed: settings.speed,
            response_format: "mp3",
        };

        let response = self
            .http
            .post(&settings.api_url)
            .header("Authorization", format!("Bearer {}", settings.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| ServiceError::network(Service::TextToSpeech, e))?;

        read_bytes(Service::TextToSpeech, response).await
    }

    async fn fetch_image(
        &self,
        settings: &ImageSettings,
        query: &str,
    ) -> Result<Option<Vec<u8>>, ServiceError> {
        let response = self
            .http
            .get(&settings.api_url)
            .query(&[
                ("key", settings.api_key.as_str()),
                ("q", query),
                ("image_type", "photo"),
                ("safesearch", "true"),
                ("per_page", "3"),
            ])
            .send()
            .await
            .map_err(|e| ServiceError::network(Service::ImageSearch, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::from_status(Service::ImageSearch, status.as_u16(), body));
        }

        let search: ImageSearchResponse = response.json().await.map_err(|e| {
            ServiceError::invalid(Service::ImageSearch, format!("malformed search results: {}", e))
        })?;
        let Some(hit) = search.hits.into_iter().next() else {
            return Ok(None);
        };

        debug!("Downloading {}", hit.webformat_url);
        let response = self
            .http
            .get(&hit.webformat_url)
            .send()
            .await
            .map_err(|e| ServiceError::network(Service::ImageSearch, e))?;
        read_bytes(Service::ImageSearch, response).await.map(Some)
    }

    /// Write downloaded bytes, or decide what a failed download means.
    async fn store(
        &self,
        result: Result<Vec<u8>, ServiceError>,
        file_name: &str,
    ) -> Result<Option<String>, ServiceError> {
        let bytes = match result {
            Ok(bytes) => bytes,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!("Skipping {}: {}", file_name, e);
                return Ok(None);
            }
        };

        let path = self.media_dir.join(file_name);
        let written = async {
            tokio::fs::create_dir_all(&self.media_dir).await?;
            tokio::fs::write(&path, &bytes).await
        }
        .await;

        match written {
            Ok(()) => {
                debug!("Wrote {} ({} bytes)", path.display(), bytes.len());
                Ok(Some(file_name.to_string()))
            }
            Err(e) => {
                warn!("Could not write {}: {}", path.display(), e);
                Ok(None)
            }
        }
    }
}

async fn read_bytes(service: Service, response: reqwest::Response) -> Result<Vec<u8>, ServiceError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ServiceError::from_status(service, status.as_u16(), body));
    }
    let bytes = response
        .bytes()
        .await
        .map_err(|e| ServiceError::network(service, e))?;
    if bytes.is_empty() {
        return Err(ServiceError::invalid(service, "empty body"));
    }
    Ok(bytes.to_vec())
}

/// File-name-safe form of a word, keeping non-Latin letters.
pub fn slugify(word: &str) -> String {
    let slug: String = word
        .trim()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect::<String>()
        .split('_')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_");
    if slug.is_empty() {
        "card".to_string()
    } else {
        slug.to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::{
        matchers::{body_partial_json, header, method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    fn generator(server: &MockServer, dir: &Path) -> MediaGenerator {
        MediaGenerator::new(reqwest::Client::new(), dir)
            .with_speech(SpeechSettings {
                api_url: format!("{}/v1/audio/speech", server.uri()),
                api_key: "tts-key".to_string(),
                model: "tts-1".to_string(),
                voice: "alloy".to_string(),
                speed: 0.9,
            })
            .with_images(ImageSettings {
                api_url: format!("{}/api/", server.uri()),
                api_key: "px-key".to_string(),
            })
            .with_retry(RetryConfig::new(3, Duration::from_millis(1)))
    }

    // ==================== Slug Tests ====================

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Hund"), "hund");
        assert_eq!(slugify("  l'homme "), "l_homme");
        assert_eq!(slugify("كتاب"), "كتاب");
        assert_eq!(slugify("?!"), "card");
    }

    // ==================== Speech Tests ====================

    #[tokio::test]
    async fn test_audio_written_to_media_dir() {
        let mock_server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        Mock::given(method("POST"))
            .and(path("/v1/audio/speech"))
            .and(header("Authorization", "Bearer tts-key"))
            .and(body_partial_json(serde_json::json!({
                "model": "tts-1",
                "input": "Der Hund bellt. Ein Hund.",
                "voice": "alloy",
                "response_format": "mp3"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3]))
            .expect(1)
            .mount(&mock_server)
            .await;

        let media = generator(&mock_server, dir.path());
        let sentences = vec!["Der Hund bellt.".to_string(), "Ein Hund.".to_string()];
        let file = media.audio("hund", &sentences).await.unwrap();

        assert_eq!(file.as_deref(), Some("hund.mp3"));
        let bytes = std::fs::read(dir.path().join("media/hund.mp3")).unwrap();
        assert_eq!(bytes, vec![1u8, 2, 3]);
    }

    #[tokio::test]
    async fn test_audio_server_error_is_skipped() {
        let mock_server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&mock_server)
            .await;

        let media = generator(&mock_server, dir.path());
        let file = media.audio("hund", &["Hund".to_string()]).await.unwrap();
        assert!(file.is_none());
    }

    #[tokio::test]
    async fn test_audio_quota_error_is_fatal() {
        let mock_server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("You exceeded your current quota"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let media = generator(&mock_server, dir.path());
        let err = media.audio("hund", &["Hund".to_string()]).await.unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(err.service(), Service::TextToSpeech);
    }

    #[tokio::test]
    async fn test_audio_disabled_or_empty() {
        let dir = tempfile::tempdir().unwrap();
        let media = MediaGenerator::new(reqwest::Client::new(), dir.path());
        assert!(media.audio("x", &["Hund".to_string()]).await.unwrap().is_none());

        let mock_server = MockServer::start().await;
        let media = generator(&mock_server, dir.path());
        assert!(media.audio("x", &[" ".to_string()]).await.unwrap().is_none());
    }

    // ==================== Image Tests ====================

    #[tokio::test]
    async fn test_image_downloads_first_hit() {
        let mock_server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        Mock::given(method("GET"))
            .and(path("/api/"))
            .and(query_param("key", "px-key"))
            .and(query_param("q", "Hund"))
            .and(query_param("image_type", "photo"))
            .and(query_param("safesearch", "true"))
            .and(query_param("per_page", "3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "total": 2,
                "hits": [
                    {"webformatURL": format!("{}/img/1.jpg", mock_server.uri())},
                    {"webformatURL": format!("{}/img/2.jpg", mock_server.uri())}
                ]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/img/1.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xFFu8, 0xD8]))
            .expect(1)
            .mount(&mock_server)
            .await;

        let media = generator(&mock_server, dir.path());
        let file = media.image("hund", "Hund").await.unwrap();
        assert_eq!(file.as_deref(), Some("hund.jpg"));
        assert!(dir.path().join("media/hund.jpg").exists());
    }

    #[tokio::test]
    async fn test_image_no_hits() {
        let mock_server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"total": 0, "hits": []})))
            .mount(&mock_server)
            .await;

        let media = generator(&mock_server, dir.path());
        assert!(media.image("zzz", "zzz").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_image_bad_key_is_fatal() {
        let mock_server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403).set_body_string("[ERROR 400] \"key\" is invalid"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let media = generator(&mock_server, dir.path());
        let err = media.image("hund", "Hund").await.unwrap_err();
        assert!(err.is_fatal());
    }
}
