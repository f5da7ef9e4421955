//! External provider ports.
//!
//! | Port | Concern |
//! |------|---------|
//! | `EmbeddingProvider` | Text embedding generation |
//! | `HttpTransport` | The actual HTTP transfer |
//! | `CookieProfileSource` | Authentication cookie profiles from disk |

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entities::HttpMethod;
use crate::error::Result;
use crate::value_objects::Embedding;

/// Text-to-vector provider.
///
/// Implementations must return fixed-dimension vectors and map blank input
/// to the zero vector.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        let embeddings = self.embed_batch(&[text.to_owned()]).await?;
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| crate::error::Error::embedding("No embedding returned"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>>;

    fn dimensions(&self) -> usize;

    fn provider_name(&self) -> &str;

    async fn health_check(&self) -> Result<()> {
        self.embed("health check").await?;
        Ok(())
    }
}

/// Effective request handed to the transport, after defaulting, cookie
/// merging and auth-header assembly.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub query_params: HashMap<String, String>,
    pub cookies: HashMap<String, String>,
    pub body: Option<Vec<u8>>,
    pub follow_redirects: bool,
    pub max_redirects: usize,
    pub timeout_ms: u64,
    pub verify_tls: bool,
    pub proxy_url: Option<String>,
}

/// Classification of a failed transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferFailureKind {
    Timeout,
    Transport,
}

/// A transfer failure with no usable response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferFailure {
    pub kind: TransferFailureKind,
    pub message: String,
}

/// What came back from the wire.
///
/// Transfer failures are data, not errors: the envelope still reaches the
/// logging pipeline so the attempt is persisted.
#[derive(Debug, Clone)]
pub struct TransferOutcome {
    pub status: Option<u16>,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    /// URL after redirects; equals the request URL when none were followed
    pub final_url: String,
    pub elapsed_ms: u64,
    pub failure: Option<TransferFailure>,
}

/// Port performing the actual HTTP transfer.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Execute the transfer. `Err` is reserved for infrastructure-level
    /// problems (e.g. an unparseable proxy URL); wire failures come back as
    /// [`TransferOutcome::failure`].
    async fn execute(&self, request: &TransferRequest) -> Result<TransferOutcome>;
}

/// A named bundle of authentication cookies loaded from disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CookieProfile {
    pub name: String,
    pub cookies: HashMap<String, String>,
    /// When the backing file was last read
    pub last_updated: DateTime<Utc>,
    pub description: Option<String>,
    pub metadata: HashMap<String, Value>,
}

/// Declared profile metadata, without the cookie values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CookieProfileInfo {
    pub name: String,
    pub description: Option<String>,
    pub cache_ttl_secs: u64,
    pub metadata: HashMap<String, Value>,
}

/// Port supplying cookie profiles to the executor and the resource surface.
#[async_trait]
pub trait CookieProfileSource: Send + Sync {
    async fn get(&self, name: &str) -> Result<CookieProfile>;

    /// The declared set from the configuration file, re-read on demand.
    async fn list(&self) -> Result<Vec<CookieProfileInfo>>;
}
