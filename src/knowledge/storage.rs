// vector store protocol (pinecone REST data plane):
//
// POST {host}/vectors/upsert  {"vectors": [{"id", "values"}]}            -> {"upsertedCount"}
// POST {host}/query           {"vector", "topK", "includeMetadata", ...} -> {"matches": [{"id", "score"}]}
//
// the data-plane host of an index comes from the controller:
// GET {controller}/indexes/{name} -> {"host"}

use super::matching::{rank, MatchResult};
use crate::config::PineconeConfig;
use crate::embedding::GaitEmbedding;
use crate::error::{GaitError, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Instant;

const SERVICE: &str = "pinecone";
const API_VERSION: &str = "2024-07";

#[allow(async_fn_in_trait)]
pub trait VectorStore {
    /// Writes every `(id, vector)` pair, returning how many the store accepted.
    async fn upsert(&self, vectors: &[(String, GaitEmbedding)]) -> Result<usize>;

    /// Returns up to `top_k` matches, best first.
    async fn query(
        &self,
        vector: &GaitEmbedding,
        top_k: usize,
        include_metadata: bool,
    ) -> Result<Vec<MatchResult>>;
}

#[derive(Clone)]
pub struct PineconeIndex {
    pub name: String,
    host: String,
    api_key: String,
    client: Client,
}

#[derive(Serialize)]
struct UpsertVector<'a> {
    id: &'a str,
    values: &'a [f32],
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    vectors: Vec<UpsertVector<'a>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    include_values: bool,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<MatchResult>,
}

#[derive(Deserialize)]
struct DescribeIndexResponse {
    host: String,
}

impl PineconeIndex {
    /// Opens the configured index, asking the controller for its host when
    /// none is configured.
    pub async fn connect(config: &PineconeConfig) -> Result<Self> {
        let client = Client::new();
        let host = match &config.host {
            Some(host) => host.clone(),
            None => describe_index(&client, config).await?,
        };
        info!("pinecone index {} at {}", config.index, host);
        Ok(Self::with_client(client, &config.index, host, &config.api_key))
    }

    pub fn with_host(name: &str, host: impl Into<String>, api_key: &str) -> Self {
        Self::with_client(Client::new(), name, host, api_key)
    }

    fn with_client(client: Client, name: &str, host: impl Into<String>, api_key: &str) -> Self {
        let host = host.into();
        let host = if host.starts_with("http://") || host.starts_with("https://") {
            host
        } else {
            format!("https://{}", host)
        };
        PineconeIndex {
            name: name.to_string(),
            host: host.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client,
        }
    }

    async fn post<T: Serialize, R: DeserializeOwned>(&self, path: &str, body: &T) -> Result<R> {
        let url = format!("{}{}", self.host, path);
        let request = self
            .client
            .post(&url)
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .json(body);
        send(request, &url).await
    }
}

impl VectorStore for PineconeIndex {
    async fn upsert(&self, vectors: &[(String, GaitEmbedding)]) -> Result<usize> {
        let start = Instant::now();
        let request = UpsertRequest {
            vectors: vectors
                .iter()
                .map(|(id, vector)| UpsertVector {
                    id,
                    values: vector.as_slice(),
                })
                .collect(),
        };
        let response: UpsertResponse = self.post("/vectors/upsert", &request).await?;
        let elapsed = start.elapsed().as_secs_f64();
        info!(
            "upsert {} vectors into {} spends {}s",
            response.upserted_count, self.name, elapsed
        );
        Ok(response.upserted_count)
    }

    async fn query(
        &self,
        vector: &GaitEmbedding,
        top_k: usize,
        include_metadata: bool,
    ) -> Result<Vec<MatchResult>> {
        let start = Instant::now();
        let request = QueryRequest {
            vector: vector.as_slice(),
            top_k,
            include_metadata,
            include_values: false,
        };
        let response: QueryResponse = self.post("/query", &request).await?;
        let mut matches = response.matches;
        rank(&mut matches);
        let elapsed = start.elapsed().as_secs_f64();
        info!(
            "query {} top_k {} returns {} matches, spends {}s",
            self.name,
            top_k,
            matches.len(),
            elapsed
        );
        debug!("matches: {:?}", matches);
        Ok(matches)
    }
}

async fn describe_index(client: &Client, config: &PineconeConfig) -> Result<String> {
    let url = format!(
        "{}/indexes/{}",
        config.controller_url.trim_end_matches('/'),
        config.index
    );
    let request = client
        .get(&url)
        .header("Api-Key", &config.api_key)
        .header("X-Pinecone-API-Version", API_VERSION);
    let described: DescribeIndexResponse = send(request, &url).await?;
    Ok(described.host)
}

async fn send<R: DeserializeOwned>(request: reqwest::RequestBuilder, url: &str) -> Result<R> {
    let response = request
        .send()
        .await
        .map_err(|e| GaitError::external(SERVICE, format!("{}: {}", url, e)))?;
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| GaitError::external(SERVICE, format!("{}: {}", url, e)))?;
    if !status.is_success() {
        return Err(GaitError::external(
            SERVICE,
            format!("{} returned {}: {}", url, status, body),
        ));
    }
    serde_json::from_str(&body).map_err(|e| {
        GaitError::external(SERVICE, format!("{} returned malformed body: {}", url, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{embed, GaitMetrics};
    use httpmock::prelude::*;
    use serde_json::json;

    fn sample() -> GaitEmbedding {
        embed(&GaitMetrics {
            cadence: 250.0,
            heel_strike: 1.0,
            vertical_oscillation: 20.0,
        })
        .unwrap()
    }

    fn index(server: &MockServer) -> PineconeIndex {
        PineconeIndex::with_host("runners-index", server.base_url(), "test-key")
    }

    #[test]
    fn bare_host_gets_https() {
        let index = PineconeIndex::with_host("i", "runners-abc.svc.pinecone.io/", "k");
        assert_eq!(index.host, "https://runners-abc.svc.pinecone.io");
    }

    #[tokio::test]
    async fn upsert_sends_ids_and_values() {
        let server = MockServer::start();
        let vector = sample();
        let m = server.mock(|when, then| {
            when.method(POST)
                .path("/vectors/upsert")
                .header("Api-Key", "test-key")
                .body_contains(r#"{"id":"Cheetah","values":["#)
                .body_contains(r#"{"id":"Horse","values":["#);
            then.status(200).json_body(json!({"upsertedCount": 2}));
        });
        let count = index(&server)
            .upsert(&[
                ("Cheetah".to_string(), vector),
                ("Horse".to_string(), vector),
            ])
            .await
            .unwrap();
        m.assert();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn query_ranks_matches() {
        let server = MockServer::start();
        let m = server.mock(|when, then| {
            when.method(POST)
                .path("/query")
                .json_body_partial(r#"{"topK": 5, "includeMetadata": true}"#);
            then.status(200).json_body(json!({
                "matches": [
                    {"id": "Horse", "score": 0.41, "metadata": {}},
                    {"id": "Cheetah", "score": 0.97}
                ],
                "namespace": ""
            }));
        });
        let matches = index(&server).query(&sample(), 5, true).await.unwrap();
        m.assert();
        assert_eq!(matches[0].id, "Cheetah");
        assert_eq!(matches[1].id, "Horse");
    }

    #[tokio::test]
    async fn query_without_matches_is_empty() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/query");
            then.status(200).json_body(json!({"namespace": ""}));
        });
        let matches = index(&server).query(&sample(), 5, true).await.unwrap();
        assert!(matches.is_empty());
    }

    #[tokio::test]
    async fn http_error_is_external_service_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/query");
            then.status(401).body("bad key");
        });
        let err = index(&server).query(&sample(), 5, true).await.unwrap_err();
        match err {
            GaitError::ExternalService { service, message } => {
                assert_eq!(service, "pinecone");
                assert!(message.contains("401"), "{}", message);
                assert!(message.contains("bad key"), "{}", message);
            }
            other => panic!("unexpected error variant {:?}", other),
        }
    }

    #[tokio::test]
    async fn malformed_body_is_external_service_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/vectors/upsert");
            then.status(200).body("not json");
        });
        let err = index(&server)
            .upsert(&[("a".to_string(), sample())])
            .await
            .unwrap_err();
        assert!(matches!(err, GaitError::ExternalService { .. }));
    }

    #[tokio::test]
    async fn match_without_score_is_external_service_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/query");
            then.status(200)
                .json_body(json!({"matches": [{"id": "Cheetah"}], "namespace": ""}));
        });
        let err = index(&server).query(&sample(), 5, true).await.unwrap_err();
        match err {
            GaitError::ExternalService { service, message } => {
                assert_eq!(service, "pinecone");
                assert!(message.contains("malformed"), "{}", message);
            }
            other => panic!("unexpected error variant {:?}", other),
        }
    }

    #[tokio::test]
    async fn connect_resolves_host_from_controller() {
        let server = MockServer::start();
        let m = server.mock(|when, then| {
            when.method(GET)
                .path("/indexes/runners-index")
                .header("Api-Key", "test-key");
            then.status(200)
                .json_body(json!({"name": "runners-index", "host": "runners-xyz.svc.pinecone.io"}));
        });
        let config = PineconeConfig {
            api_key: "test-key".to_string(),
            index: "runners-index".to_string(),
            host: None,
            controller_url: server.base_url(),
        };
        let index = PineconeIndex::connect(&config).await.unwrap();
        m.assert();
        assert_eq!(index.host, "https://runners-xyz.svc.pinecone.io");
    }
}
