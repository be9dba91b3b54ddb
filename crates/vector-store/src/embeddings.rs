use crate::error::{Result, VectorStoreError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_OPENAI_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_STUB_DIMENSION: usize = 384;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const MAX_BATCH_SIZE: usize = 256;

/// Identity of the embedding model that produced an index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingFingerprint {
    pub provider: String,
    pub model: String,
}

impl std::fmt::Display for EmbeddingFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.provider, self.model)
    }
}

/// Anything that turns text into fixed-width vectors.
///
/// Implementations must return one vector per input text, in input order, and every vector
/// from one provider must have the same length.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn fingerprint(&self) -> EmbeddingFingerprint;
}

/// Which embedding backend to use, resolved from the environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmbeddingConfig {
    /// OpenAI embeddings API (or a proxy at `OPENAI_BASE_URL`)
    OpenAi {
        model: String,
        api_key: String,
        base_url: String,
    },
    /// OpenWebUI gateway exposing an OpenAI-compatible `/embeddings` route
    OpenWebUi {
        model: String,
        api_key: Option<String>,
        base_url: String,
    },
    /// Deterministic hash embedder for offline use and tests
    Stub { dimension: usize },
}

impl EmbeddingConfig {
    /// Read `EMBEDDING_PROVIDER` and the provider-specific variables from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`EmbeddingConfig::from_env`] with a custom variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let provider = get("EMBEDDING_PROVIDER")
            .unwrap_or_else(|| "openai".to_string())
            .to_ascii_lowercase();

        match provider.as_str() {
            "openai" => {
                let api_key = get("OPENAI_API_KEY").ok_or_else(|| {
                    VectorStoreError::config("OPENAI_API_KEY must be set for the openai provider")
                })?;
                Ok(Self::OpenAi {
                    model: get("EMBEDDING_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
                    api_key,
                    base_url: get("OPENAI_BASE_URL")
                        .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
                })
            }
            "openwebui" => {
                let base_url = get("OPENWEBUI_BASE_URL").ok_or_else(|| {
                    VectorStoreError::config("OPENWEBUI_BASE_URL must be set for the openwebui provider")
                })?;
                let model = get("EMBEDDING_MODEL").ok_or_else(|| {
                    VectorStoreError::config("EMBEDDING_MODEL must be set for the openwebui provider")
                })?;
                Ok(Self::OpenWebUi {
                    model,
                    api_key: get("OPENWEBUI_API_KEY"),
                    base_url,
                })
            }
            "stub" => {
                let dimension = match get("EMBEDDING_DIMENSION") {
                    Some(raw) => raw.parse::<usize>().map_err(|e| {
                        VectorStoreError::config(format!("Invalid EMBEDDING_DIMENSION {raw:?}: {e}"))
                    })?,
                    None => DEFAULT_STUB_DIMENSION,
                };
                if dimension == 0 {
                    return Err(VectorStoreError::config("EMBEDDING_DIMENSION must be > 0"));
                }
                Ok(Self::Stub { dimension })
            }
            other => Err(VectorStoreError::config(format!(
                "Unsupported embedding provider '{other}' (expected openai, openwebui or stub)"
            ))),
        }
    }

    /// Build the provider this configuration describes
    pub fn build(&self) -> Result<Arc<dyn EmbeddingProvider>> {
        let provider: Arc<dyn EmbeddingProvider> = match self {
            Self::OpenAi {
                model,
                api_key,
                base_url,
            } => Arc::new(OpenAiEmbedder::new(
                "openai",
                base_url,
                model,
                Some(api_key.clone()),
            )?),
            Self::OpenWebUi {
                model,
                api_key,
                base_url,
            } => Arc::new(OpenAiEmbedder::new(
                "openwebui",
                &openwebui_api_base(base_url),
                model,
                api_key.clone(),
            )?),
            Self::Stub { dimension } => Arc::new(StubEmbedder::new(*dimension)),
        };
        log::debug!("Embedding provider: {}", provider.fingerprint());
        Ok(provider)
    }
}

/// OpenWebUI serves the OpenAI-compatible routes under `/api`
fn openwebui_api_base(base_url: &str) -> String {
    let trimmed = base_url.trim_end_matches('/');
    if trimmed.ends_with("/api") || trimmed.ends_with("/v1") {
        trimmed.to_string()
    } else {
        format!("{trimmed}/api")
    }
}

/// Client for any OpenAI-compatible `POST {base}/embeddings` endpoint
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    provider: String,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

impl OpenAiEmbedder {
    pub fn new(
        provider: &str,
        base_url: &str,
        model: &str,
        api_key: Option<String>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| VectorStoreError::config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            provider: provider.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.base_url);
        let mut request = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&EmbeddingsRequest {
                model: &self.model,
                input: texts,
            });

        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| VectorStoreError::embedding(format!("Request to {url} failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(VectorStoreError::embedding(format!(
                "{} embeddings API returned {status}: {body}",
                self.provider
            )));
        }

        let parsed: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|e| VectorStoreError::embedding(format!("Invalid embeddings response: {e}")))?;

        if parsed.data.len() != texts.len() {
            return Err(VectorStoreError::embedding(format!(
                "Embeddings API returned {} vectors for {} inputs",
                parsed.data.len(),
                texts.len()
            )));
        }

        let mut items = parsed.data;
        if items.iter().all(|item| item.index.is_some()) {
            items.sort_by_key(|item| item.index);
        }
        Ok(items.into_iter().map(|item| item.embedding).collect())
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| VectorStoreError::embedding("Empty embeddings response"))
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(MAX_BATCH_SIZE) {
            vectors.extend(self.embed_batch(batch).await?);
        }
        log::debug!("Embedded {} texts via {}", texts.len(), self.provider);
        Ok(vectors)
    }

    fn fingerprint(&self) -> EmbeddingFingerprint {
        EmbeddingFingerprint {
            provider: self.provider.clone(),
            model: self.model.clone(),
        }
    }
}

/// Deterministic, offline embedder: the same text always maps to the same unit vector
#[derive(Debug)]
pub struct StubEmbedder {
    dimension: usize,
    embedded: AtomicUsize,
}

impl StubEmbedder {
    #[must_use]
    pub const fn new(dimension: usize) -> Self {
        Self {
            dimension,
            embedded: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    /// Total number of texts embedded so far (queries included)
    pub fn embedded_count(&self) -> usize {
        self.embedded.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl EmbeddingProvider for StubEmbedder {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embedded.fetch_add(1, Ordering::Relaxed);
        Ok(stub_embed(text, self.dimension))
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.embedded.fetch_add(texts.len(), Ordering::Relaxed);
        Ok(texts
            .iter()
            .map(|text| stub_embed(text, self.dimension))
            .collect())
    }

    fn fingerprint(&self) -> EmbeddingFingerprint {
        EmbeddingFingerprint {
            provider: "stub".to_string(),
            model: format!("stub-{}", self.dimension),
        }
    }
}

fn normalize(vec: &mut [f32]) {
    let norm = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return;
    }
    for value in vec {
        *value /= norm;
    }
}

fn stub_embed(text: &str, dimension: usize) -> Vec<f32> {
    let mut state =
        fnv1a_64(text.as_bytes()) ^ (dimension as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    let mut vec = Vec::with_capacity(dimension);
    for _ in 0..dimension {
        let bits = splitmix64(&mut state);
        let high = (bits >> 32) as u32;
        let mantissa = high >> 9;
        let unit = f32::from_bits(0x3f80_0000 | mantissa) - 1.0;
        vec.push(unit.mul_add(2.0, -1.0));
    }
    normalize(&mut vec);
    vec
}

fn fnv1a_64(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

const fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
