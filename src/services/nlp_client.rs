// NLP Service Client
// Calls the NLP sidecar service (sentence splitter, parser, lemmatizer, tagger, translator)

use crate::services::nlp::{
    CapabilityError, Lemmatizer, ParsedDoc, PosTagger, SentenceTokenizer, SyntacticParser,
    Translator,
};
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::{Duration, Instant};
use tracing::debug;

pub const DEFAULT_NLP_URL: &str = "http://127.0.0.1:8788";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const NLP_URL_ENV: &str = "MTDETECT_NLP_URL";

#[derive(Debug, Serialize)]
struct TextRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LemmatizeRequest<'a> {
    texts: &'a [String],
    batch_size: usize,
}

#[derive(Debug, Serialize)]
struct TagRequest<'a> {
    words: &'a [String],
}

#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    text: &'a str,
    source: &'a str,
    target: &'a str,
}

#[derive(Debug, Deserialize)]
struct SentencesResponse {
    sentences: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct LemmatizeResponse {
    lemmas: Vec<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct TagResponse {
    tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
}

/// Blocking client for the NLP service. One instance backs every text capability.
pub struct NlpServiceClient {
    client: Client,
    base_url: String,
}

impl Default for NlpServiceClient {
    fn default() -> Self {
        let base_url = env::var(NLP_URL_ENV).unwrap_or_else(|_| DEFAULT_NLP_URL.to_string());
        Self::new(&base_url, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }
}

impl NlpServiceClient {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let client = Client::builder().timeout(timeout).build().unwrap_or_default();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn is_available(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self.client.get(&url).send() {
            Ok(resp) => resp
                .json::<HealthResponse>()
                .map(|h| h.status == "ok")
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    fn post<Req, Resp>(&self, path: &str, request: &Req) -> Result<Resp, CapabilityError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let start = Instant::now();

        let response = self.client.post(&url).json(request).send()?;
        let status = response.status();
        debug!(
            "[nlp] POST {} -> {} in {}ms",
            path,
            status.as_u16(),
            start.elapsed().as_millis()
        );

        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(CapabilityError::Service {
                status: status.as_u16(),
                message: body,
            });
        }

        response
            .json()
            .map_err(|e| CapabilityError::Json(e.to_string()))
    }
}

impl SentenceTokenizer for NlpServiceClient {
    fn sentences(&self, text: &str) -> Result<Vec<String>, CapabilityError> {
        let resp: SentencesResponse = self.post("/sentences", &TextRequest { text })?;
        Ok(resp.sentences)
    }
}

impl SyntacticParser for NlpServiceClient {
    fn parse(&self, text: &str) -> Result<ParsedDoc, CapabilityError> {
        let doc: ParsedDoc = self.post("/parse", &TextRequest { text })?;
        if let Some(bad) = doc.tokens.iter().find(|t| t.head >= doc.tokens.len()) {
            return Err(CapabilityError::MalformedParse(format!(
                "head index {} out of range for token '{}'",
                bad.head, bad.text
            )));
        }
        Ok(doc)
    }
}

impl Lemmatizer for NlpServiceClient {
    fn lemmatize(&self, text: &str) -> Result<Vec<String>, CapabilityError> {
        let texts = [text.to_string()];
        self.lemmatize_batch(&texts, 1)?
            .into_iter()
            .next()
            .ok_or(CapabilityError::MissingContent)
    }

    fn lemmatize_batch(
        &self,
        texts: &[String],
        batch_size: usize,
    ) -> Result<Vec<Vec<String>>, CapabilityError> {
        let resp: LemmatizeResponse = self.post(
            "/lemmatize",
            &LemmatizeRequest {
                texts,
                batch_size: batch_size.max(1),
            },
        )?;
        if resp.lemmas.len() != texts.len() {
            return Err(CapabilityError::Json(format!(
                "expected {} lemma lists, got {}",
                texts.len(),
                resp.lemmas.len()
            )));
        }
        Ok(resp.lemmas)
    }
}

impl PosTagger for NlpServiceClient {
    fn tag(&self, words: &[String]) -> Result<Vec<String>, CapabilityError> {
        let resp: TagResponse = self.post("/tag", &TagRequest { words })?;
        if resp.tags.len() != words.len() {
            return Err(CapabilityError::Json(format!(
                "expected {} tags, got {}",
                words.len(),
                resp.tags.len()
            )));
        }
        Ok(resp.tags)
    }
}

impl Translator for NlpServiceClient {
    fn translate(&self, text: &str, source: &str, target: &str) -> Result<String, CapabilityError> {
        let resp: TranslateResponse = self.post(
            "/translate",
            &TranslateRequest {
                text,
                source,
                target,
            },
        )?;
        resp.text.ok_or(CapabilityError::MissingContent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::closed_port_url;

    #[test]
    fn test_client_creation_trims_slash() {
        let client = NlpServiceClient::new("http://localhost:9000/", Duration::from_secs(5));
        assert_eq!(client.base_url(), "http://localhost:9000");
    }

    #[test]
    fn test_unreachable_service_reports_connect_error() {
        let client = NlpServiceClient::new(&closed_port_url(), Duration::from_secs(2));
        assert!(!client.is_available());
        let err = client.sentences("One. Two.").unwrap_err();
        assert!(matches!(err, CapabilityError::Http(_)));
    }

    #[test]
    fn test_request_shapes() {
        let texts = vec!["a b".to_string()];
        let body = serde_json::to_value(LemmatizeRequest {
            texts: &texts,
            batch_size: 20,
        })
        .unwrap();
        assert_eq!(body["batchSize"], 20);
        let body = serde_json::to_value(TranslateRequest {
            text: "hi",
            source: "en",
            target: "de",
        })
        .unwrap();
        assert_eq!(body["target"], "de");
    }
}
