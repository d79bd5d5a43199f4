//! Translation client with caching

use moka::future::Cache;
use reqwest::Client;
use tracing::{debug, error, info, instrument, warn};

use crate::settings::Settings;
use crate::types::*;

/// Shown in place of a translation the provider refused
pub const PROVIDER_FAILURE: &str = "翻译失败，请重试";
/// Shown when the provider could not be reached or answered garbage
pub const NETWORK_FAILURE: &str = "网络错误，请检查连接";

const CACHE_CAPACITY: u64 = 1_000;

/// Translation provider. Never fails: problems come back as a fixed
/// human-readable message in place of the translation.
#[allow(async_fn_in_trait)]
pub trait Translator {
    async fn translate(&self, text: &str, from: Language, to: Language) -> String;
}

/// Message displayed for a failed translation
pub fn failure_message(error: &TranslateError) -> &'static str {
    if error.is_transport() {
        NETWORK_FAILURE
    } else {
        PROVIDER_FAILURE
    }
}

/// Extract the translated text from a provider response body
pub fn decode_response(body: &str) -> Result<String, TranslateError> {
    let raw: RawTranslation = serde_json::from_str(body)?;
    let status = raw.status();

    match (status, raw.response_data) {
        (Some(200), Some(RawTranslationData {
            translated_text: Some(text),
        })) => Ok(text),
        _ => Err(TranslateError::Provider(status)),
    }
}

/// MyMemory client with built-in caching
pub struct TranslateClient {
    http: Client,
    endpoint: String,
    cache: Cache<(String, Language, Language), String>,
}

impl TranslateClient {
    pub fn new(settings: &Settings) -> Result<Self, TranslateError> {
        let http = Client::builder()
            .timeout(settings.request_timeout())
            .connect_timeout(settings.connect_timeout())
            .user_agent(concat!("trilingo/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let cache = Cache::builder()
            .max_capacity(CACHE_CAPACITY)
            .time_to_live(settings.cache_ttl())
            .build();

        Ok(Self {
            http,
            endpoint: settings.translate_endpoint.clone(),
            cache,
        })
    }

    /// Translate, reporting failures as errors
    #[instrument(skip(self, text), fields(chars = text.chars().count()))]
    pub async fn try_translate(
        &self,
        text: &str,
        from: Language,
        to: Language,
    ) -> Result<String, TranslateError> {
        let key = (text.to_string(), from, to);
        if let Some(cached) = self.cache.get(&key).await {
            debug!("Cache hit for translation");
            return Ok(cached);
        }

        let url = format!(
            "{}?q={}&langpair={}|{}",
            self.endpoint,
            urlencoding::encode(text),
            from.code(),
            to.code()
        );
        info!(from = %from, to = %to, "Requesting translation");

        let body = self.http.get(&url).send().await?.text().await?;
        let translated = decode_response(&body)?;

        self.cache.insert(key, translated.clone()).await;
        Ok(translated)
    }

    pub fn clear_cache(&self) {
        self.cache.invalidate_all();
        info!("Translation cache cleared");
    }
}

impl Translator for TranslateClient {
    async fn translate(&self, text: &str, from: Language, to: Language) -> String {
        match self.try_translate(text, from, to).await {
            Ok(translated) => translated,
            Err(e) => {
                if e.is_transport() {
                    error!(error = %e, from = %from, to = %to, "Translation request failed");
                } else {
                    warn!(error = %e, from = %from, to = %to, "Provider rejected translation");
                }
                failure_message(&e).to_string()
            }
        }
    }
}

/// Translate `text` into every other language concurrently, in display order
pub async fn translate_all<T: Translator>(
    translator: &T,
    text: &str,
    source: Language,
) -> Vec<(Language, String)> {
    let targets: Vec<Language> = source.targets().collect();
    let futures = targets
        .iter()
        .map(|&to| translator.translate(text, source, to));

    let results = futures::future::join_all(futures).await;
    targets.into_iter().zip(results).collect()
}
