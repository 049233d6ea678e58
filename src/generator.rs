//! Example-sentence generation for words that come without sentences.

use crate::analysis::parser::extract_json;
use crate::error::{Service, ServiceError};
use crate::language::{Complexity, Language};
use crate::llm::CompletionClient;
use crate::retry::{with_retry_if, RetryConfig};
use serde::Deserialize;
use tracing::{debug, warn};

/// Meaning, pronunciation and example sentences for one word.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GeneratedContent {
    #[serde(default)]
    pub meaning: String,
    #[serde(default)]
    pub ipa: String,
    #[serde(default)]
    pub sentences: Vec<String>,
}

pub struct ContentGenerator<'a, C: CompletionClient> {
    client: &'a C,
    language: Language,
    native_language: String,
    retry: RetryConfig,
}

impl<'a, C: CompletionClient> ContentGenerator<'a, C> {
    pub fn new(client: &'a C, language: Language, native_language: impl Into<String>) -> Self {
        Self {
            client,
            language,
            native_language: native_language.into(),
            retry: RetryConfig::api_call(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn system_prompt(&self) -> String {
        format!(
            "You are a {} teacher who writes natural example sentences for flashcards. Respond with JSON only.",
            self.language.name()
        )
    }

    fn prompt(&self, word: &str, complexity: Complexity, count: usize) -> String {
        format!(
            r#"Write {count} different {language} example sentences using the word "{word}" for a {complexity} learner whose native language is {native}.

Return JSON in this format:
{{"meaning": "<meaning of the word in {native}>", "ipa": "<IPA pronunciation of the word>", "sentences": ["<sentence 1>", "..."]}}

Rules:
- Each sentence must contain "{word}" exactly as written.
- Use vocabulary suited to a {complexity} learner.
- Write the sentences in {language} script only, without translations."#,
            count = count,
            language = self.language.name(),
            word = word,
            complexity = complexity,
            native = self.native_language,
        )
    }

    /// Ask the model for `count` example sentences for `word`.
    ///
    /// Fatal service errors propagate. Any other failure gives empty content.
    pub async fn generate(
        &self,
        word: &str,
        complexity: Complexity,
        count: usize,
    ) -> Result<GeneratedContent, ServiceError> {
        let system = self.system_prompt();
        let prompt = self.prompt(word, complexity, count);
        let operation = format!("generate sentences for '{}'", word);

        let raw = with_retry_if(
            &self.retry,
            &operation,
            || self.client.complete(&system, &prompt),
            ServiceError::is_retryable,
        )
        .await;

        let raw = match raw {
            Ok(raw) => raw,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!("Could not generate sentences for '{}': {}", word, e);
                return Ok(GeneratedContent::default());
            }
        };

        match parse_content(&raw, count) {
            Ok(content) => {
                debug!(
                    "Generated {} sentence(s) for '{}'",
                    content.sentences.len(),
                    word
                );
                Ok(content)
            }
            Err(e) => {
                warn!("Unusable generated content for '{}': {}", word, e);
                Ok(GeneratedContent::default())
            }
        }
    }
}

/// Pull `GeneratedContent` out of raw model text, keeping at most `count`
/// non-empty sentences.
fn parse_content(raw: &str, count: usize) -> Result<GeneratedContent, ServiceError> {
    let value = extract_json(raw).map_err(|e| ServiceError::invalid(Service::Llm, e.to_string()))?;
    let mut content: GeneratedContent = serde_json::from_value(value)
        .map_err(|e| ServiceError::invalid(Service::Llm, e.to_string()))?;

    content.meaning = content.meaning.trim().to_string();
    content.ipa = content.ipa.trim().trim_matches('/').to_string();
    content.sentences = content
        .sentences
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .take(count)
        .collect();
    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::OpenAiClient;
    use std::time::Duration;
    use wiremock::{
        matchers::{body_string_contains, method},
        Mock, MockServer, ResponseTemplate,
    };

    fn create_openai_response(content: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "chatcmpl-123",
            "object": "chat.completion",
            "created": 1705312200,
            "model": "gpt-4o-mini",
            "choices": [
                {
                    "index": 0,
                    "message": {"role": "assistant", "content": content},
                    "finish_reason": "stop"
                }
            ]
        })
    }

    fn client(server: &MockServer) -> OpenAiClient {
        OpenAiClient::new(
            reqwest::Client::new(),
            format!("{}/v1/chat/completions", server.uri()),
            "test-key",
            "gpt-4o-mini",
            4000,
        )
    }

    fn fast_retry() -> RetryConfig {
        RetryConfig::new(3, Duration::from_millis(1))
    }

    // ==================== Parsing Tests ====================

    #[test]
    fn test_parse_content_in_fence() {
        let raw = "```json\n{\"meaning\": \"dog\", \"ipa\": \"/hʊnt/\", \"sentences\": [\"Der Hund bellt.\", \" \", \"Ein Hund schläft.\", \"Extra Hund.\"]}\n```";
        let content = parse_content(raw, 2).unwrap();
        assert_eq!(content.meaning, "dog");
        assert_eq!(content.ipa, "hʊnt");
        assert_eq!(content.sentences, vec!["Der Hund bellt.", "Ein Hund schläft."]);
    }

    #[test]
    fn test_parse_content_missing_fields_default() {
        let content = parse_content(r#"{"sentences": ["Hola."]}"#, 3).unwrap();
        assert!(content.meaning.is_empty());
        assert_eq!(content.sentences.len(), 1);
    }

    #[test]
    fn test_parse_content_without_json_is_error() {
        assert!(parse_content("no json", 3).is_err());
    }

    #[test]
    fn test_prompt_names_word_and_count() {
        let client = OpenAiClient::new(reqwest::Client::new(), "http://x", "k", "m", 10);
        let generator = ContentGenerator::new(&client, Language::Spanish, "English");
        let prompt = generator.prompt("gato", Complexity::Beginner, 3);
        assert!(prompt.contains("Write 3 different Spanish example sentences"));
        assert!(prompt.contains("\"gato\""));
        assert!(prompt.contains("beginner"));
    }

    // ==================== Wiremock Tests ====================

    #[tokio::test]
    async fn test_generate_success() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("gato"))
            .respond_with(ResponseTemplate::new(200).set_body_json(create_openai_response(
                r#"{"meaning": "cat", "ipa": "ˈɡato", "sentences": ["El gato duerme.", "Tengo un gato."]}"#,
            )))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = client(&mock_server);
        let content = ContentGenerator::new(&client, Language::Spanish, "English")
            .with_retry(fast_retry())
            .generate("gato", Complexity::Beginner, 3)
            .await
            .unwrap();
        assert_eq!(content.meaning, "cat");
        assert_eq!(content.sentences.len(), 2);
    }

    #[tokio::test]
    async fn test_generate_retries_server_errors() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(3)
            .mount(&mock_server)
            .await;

        let client = client(&mock_server);
        let content = ContentGenerator::new(&client, Language::Spanish, "English")
            .with_retry(fast_retry())
            .generate("gato", Complexity::Beginner, 3)
            .await
            .unwrap();
        assert!(content.sentences.is_empty());
    }

    #[tokio::test]
    async fn test_generate_fatal_error_propagates() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Incorrect API key"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = client(&mock_server);
        let err = ContentGenerator::new(&client, Language::Spanish, "English")
            .with_retry(fast_retry())
            .generate("gato", Complexity::Beginner, 3)
            .await
            .unwrap_err();
        assert!(err.is_fatal());
    }
}
