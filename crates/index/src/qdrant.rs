//! Qdrant REST backend.
//!
//! One collection holds every embedding model as a named vector. A point
//! carries exactly one named vector, and its id is a UUIDv5 derived from
//! `"{model}:{context_id}"`, so re-upserting the same context under the same
//! model overwrites instead of duplicating.
//!
//! The collection is created lazily on first use.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::time::Duration;
use tof_core::context::ContextPayload;
use tof_core::error::IndexError;
use tof_core::index::{IndexFilter, IndexPoint, ScoredPayload, SearchQuery, SemanticIndex};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};
use uuid::Uuid;

const POINT_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2a7e_4b0d_5c39_9e8a_71d4_03b2_f6c5);

/// A [`SemanticIndex`] backed by a Qdrant server.
pub struct QdrantIndex {
    base_url: String,
    collection: String,
    api_key: Option<String>,
    /// Named vector sizes, keyed by embedding model.
    vectors: BTreeMap<String, usize>,
    client: reqwest::Client,
    ready: OnceCell<()>,
}

impl QdrantIndex {
    pub fn new(
        base_url: impl Into<String>,
        collection: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            collection: collection.into(),
            api_key,
            vectors: BTreeMap::new(),
            client,
            ready: OnceCell::new(),
        }
    }

    /// Declare a named vector for an embedding model.
    pub fn with_vector(mut self, model: impl Into<String>, dimensions: usize) -> Self {
        self.vectors.insert(model.into(), dimensions);
        self
    }

    /// Stable point id for a context under one embedding model.
    pub fn point_id(model: &str, context_id: &str) -> Uuid {
        Uuid::new_v5(&POINT_NAMESPACE, format!("{model}:{context_id}").as_bytes())
    }

    fn url(&self, suffix: &str) -> String {
        format!("{}/collections/{}{}", self.base_url, self.collection, suffix)
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.api_key {
            Some(key) => builder.header("api-key", key),
            None => builder,
        }
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, IndexError> {
        let response = builder.send().await.map_err(map_transport_error)?;
        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let body = response.text().await.unwrap_or_default();
            warn!(status, body = %body, "Qdrant returned error");
            return Err(IndexError::Request {
                status_code: status,
                message: body,
            });
        }
        Ok(response)
    }

    async fn ensure_collection(&self) -> Result<(), IndexError> {
        self.ready
            .get_or_try_init(|| async {
                let url = self.url("");
                let response = self
                    .request(reqwest::Method::GET, &url)
                    .send()
                    .await
                    .map_err(map_transport_error)?;

                if response.status().as_u16() == 404 {
                    let vectors: serde_json::Map<String, Value> = self
                        .vectors
                        .iter()
                        .map(|(name, size)| (name.clone(), json!({"size": size, "distance": "Cosine"})))
                        .collect();
                    let models = vectors.len();
                    self.send(
                        self.request(reqwest::Method::PUT, &url)
                            .json(&json!({ "vectors": vectors })),
                    )
                    .await?;
                    info!(collection = %self.collection, models, "Created Qdrant collection");
                } else if !response.status().is_success() {
                    let status = response.status().as_u16();
                    let body = response.text().await.unwrap_or_default();
                    return Err(IndexError::Request {
                        status_code: status,
                        message: body,
                    });
                }
                Ok(())
            })
            .await
            .map(|_| ())
    }
}

fn map_transport_error(e: reqwest::Error) -> IndexError {
    if e.is_timeout() {
        IndexError::Timeout(e.to_string())
    } else {
        IndexError::Unavailable(e.to_string())
    }
}

/// Translate a filter into Qdrant's `must` clause syntax.
fn filter_json(filter: &IndexFilter) -> Value {
    let mut must = Vec::new();
    push_conditions(filter, &mut must);
    json!({ "must": must })
}

fn push_conditions(filter: &IndexFilter, must: &mut Vec<Value>) {
    let condition = match filter {
        IndexFilter::ContextId(id) => json!({"key": "context_id", "match": {"value": id}}),
        IndexFilter::ContextType(t) => json!({"key": "context_type", "match": {"value": t.as_str()}}),
        IndexFilter::AnyTag(tags) => json!({"key": "tags", "match": {"any": tags}}),
        IndexFilter::ParentId(parent) => json!({"key": "parent_id", "match": {"value": parent}}),
        IndexFilter::Model(model) => json!({"key": "embedding_model", "match": {"value": model}}),
        IndexFilter::All(filters) => {
            for inner in filters {
                push_conditions(inner, must);
            }
            return;
        }
    };
    must.push(condition);
}

fn decode_payload(raw: Option<Value>) -> Result<ContextPayload, IndexError> {
    let raw = raw.ok_or_else(|| IndexError::InvalidPayload("point has no payload".into()))?;
    serde_json::from_value(raw).map_err(|e| IndexError::InvalidPayload(e.to_string()))
}

#[derive(Deserialize)]
struct SearchResponse {
    result: Vec<ScoredPoint>,
}

#[derive(Deserialize)]
struct ScoredPoint {
    score: f32,
    payload: Option<Value>,
}

#[derive(Deserialize)]
struct ScrollResponse {
    result: ScrollResult,
}

#[derive(Deserialize)]
struct ScrollResult {
    points: Vec<RecordPoint>,
}

#[derive(Deserialize)]
struct RecordPoint {
    payload: Option<Value>,
}

#[async_trait]
impl SemanticIndex for QdrantIndex {
    fn name(&self) -> &str {
        "qdrant"
    }

    async fn upsert(&self, point: IndexPoint) -> Result<(), IndexError> {
        if let Some(&expected) = self.vectors.get(&point.model)
            && expected != point.vector.len()
        {
            return Err(IndexError::DimensionMismatch {
                expected,
                actual: point.vector.len(),
            });
        }
        self.ensure_collection().await?;

        let payload =
            serde_json::to_value(&point.payload).map_err(|e| IndexError::InvalidPayload(e.to_string()))?;
        let mut vector = serde_json::Map::new();
        vector.insert(point.model.clone(), json!(point.vector));
        let body = json!({
            "points": [{
                "id": Self::point_id(&point.model, &point.id).to_string(),
                "vector": vector,
                "payload": payload,
            }]
        });

        debug!(context_id = %point.id, model = %point.model, "Upserting point");
        self.send(
            self.request(reqwest::Method::PUT, &self.url("/points?wait=true"))
                .json(&body),
        )
        .await?;
        Ok(())
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<ScoredPayload>, IndexError> {
        self.ensure_collection().await?;

        let mut body = json!({
            "vector": { "name": query.model, "vector": query.vector },
            "limit": query.limit,
            "score_threshold": query.score_threshold,
            "with_payload": true,
        });
        if let Some(filter) = &query.filter {
            body["filter"] = filter_json(filter);
        }

        let response = self
            .send(
                self.request(reqwest::Method::POST, &self.url("/points/search"))
                    .json(&body),
            )
            .await?;
        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| IndexError::InvalidPayload(format!("Failed to parse search response: {e}")))?;

        parsed
            .result
            .into_iter()
            .map(|p| {
                Ok(ScoredPayload {
                    payload: decode_payload(p.payload)?,
                    score: p.score,
                })
            })
            .collect()
    }

    async fn scroll(&self, filter: &IndexFilter, limit: usize) -> Result<Vec<ContextPayload>, IndexError> {
        self.ensure_collection().await?;

        let body = json!({
            "filter": filter_json(filter),
            "limit": limit,
            "with_payload": true,
            "with_vector": false,
        });
        let response = self
            .send(
                self.request(reqwest::Method::POST, &self.url("/points/scroll"))
                    .json(&body),
            )
            .await?;
        let parsed: ScrollResponse = response
            .json()
            .await
            .map_err(|e| IndexError::InvalidPayload(format!("Failed to parse scroll response: {e}")))?;

        parsed
            .result
            .points
            .into_iter()
            .map(|p| decode_payload(p.payload))
            .collect()
    }

    async fn health_check(&self) -> Result<bool, IndexError> {
        let url = format!("{}/healthz", self.base_url);
        let response = self
            .request(reqwest::Method::GET, &url)
            .send()
            .await
            .map_err(map_transport_error)?;
        Ok(response.status().is_success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tof_core::context::{Context, ContextType};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn payload(id: &str) -> ContextPayload {
        let data = serde_json::json!({"test_name": "login", "expected_result": "ok"});
        Context::new(
            id,
            data.as_object().cloned().unwrap(),
            ContextType::Test,
            vec!["auth".to_string()],
            None,
        )
        .to_payload("test-context")
    }

    fn index(server: &MockServer) -> QdrantIndex {
        QdrantIndex::new(server.uri(), "contexts", None, Duration::from_secs(5))
            .with_vector("test-context", 2)
    }

    async fn mount_existing_collection(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/collections/contexts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": {}, "status": "ok"})))
            .mount(server)
            .await;
    }

    #[test]
    fn point_ids_are_stable_and_model_scoped() {
        let a = QdrantIndex::point_id("test-context", "t1");
        assert_eq!(a, QdrantIndex::point_id("test-context", "t1"));
        assert_ne!(a, QdrantIndex::point_id("general-context", "t1"));
    }

    #[test]
    fn filter_translation() {
        let f = filter_json(&IndexFilter::AnyTag(vec!["a".into(), "b".into()]));
        assert_eq!(f["must"][0]["key"], "tags");
        assert_eq!(f["must"][0]["match"]["any"][1], "b");

        let f = filter_json(&IndexFilter::ContextType(ContextType::Feeling));
        assert_eq!(f["must"][0]["match"]["value"], "FEELING");

        let f = filter_json(&IndexFilter::All(vec![
            IndexFilter::ContextId("t1".into()),
            IndexFilter::Model("test-context".into()),
        ]));
        assert_eq!(f["must"].as_array().unwrap().len(), 2);
        assert_eq!(f["must"][1]["key"], "embedding_model");
        assert_eq!(f["must"][1]["match"]["value"], "test-context");
    }

    #[tokio::test]
    async fn creates_missing_collection_with_named_vectors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/collections/contexts"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/collections/contexts"))
            .and(body_partial_json(json!({
                "vectors": {"test-context": {"size": 2, "distance": "Cosine"}}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": true})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/collections/contexts/points"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": {}})))
            .expect(2)
            .mount(&server)
            .await;

        let idx = index(&server);
        let point = IndexPoint {
            id: "t1".into(),
            model: "test-context".into(),
            vector: vec![1.0, 0.0],
            payload: payload("t1"),
        };
        idx.upsert(point.clone()).await.unwrap();
        idx.upsert(point).await.unwrap();
    }

    #[tokio::test]
    async fn search_decodes_payloads() {
        let server = MockServer::start().await;
        mount_existing_collection(&server).await;
        let stored = serde_json::to_value(payload("t1")).unwrap();
        Mock::given(method("POST"))
            .and(path("/collections/contexts/points/search"))
            .and(body_partial_json(json!({
                "vector": {"name": "test-context"},
                "limit": 3,
                "with_payload": true
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": [{"id": "x", "version": 1, "score": 0.93, "payload": stored}],
                "status": "ok"
            })))
            .mount(&server)
            .await;

        let hits = index(&server)
            .search(&SearchQuery {
                model: "test-context".into(),
                vector: vec![1.0, 0.0],
                limit: 3,
                score_threshold: 0.8,
                filter: None,
            })
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].payload.context_id, "t1");
        assert!((hits[0].score - 0.93).abs() < 1e-6);
    }

    #[tokio::test]
    async fn scroll_sends_filter() {
        let server = MockServer::start().await;
        mount_existing_collection(&server).await;
        let stored = serde_json::to_value(payload("t1")).unwrap();
        Mock::given(method("POST"))
            .and(path("/collections/contexts/points/scroll"))
            .and(body_partial_json(json!({
                "filter": {"must": [{"key": "context_id", "match": {"value": "t1"}}]},
                "limit": 1
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": {"points": [{"id": "x", "payload": stored}], "next_page_offset": null}
            })))
            .mount(&server)
            .await;

        let found = index(&server)
            .scroll(&IndexFilter::ContextId("t1".into()), 1)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].data["test_name"], "login");
    }

    #[tokio::test]
    async fn server_errors_are_retryable() {
        let server = MockServer::start().await;
        mount_existing_collection(&server).await;
        Mock::given(method("POST"))
            .and(path("/collections/contexts/points/scroll"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let err = index(&server)
            .scroll(&IndexFilter::ContextId("t1".into()), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::Request { status_code: 503, .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn rejects_wrong_dimensions_locally() {
        let server = MockServer::start().await;
        let err = index(&server)
            .upsert(IndexPoint {
                id: "t1".into(),
                model: "test-context".into(),
                vector: vec![1.0, 0.0, 0.0],
                payload: payload("t1"),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::DimensionMismatch { expected: 2, actual: 3 }));
    }

    #[tokio::test]
    async fn sends_api_key_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/healthz"))
            .and(header("api-key", "secret"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let idx = QdrantIndex::new(server.uri(), "contexts", Some("secret".into()), Duration::from_secs(5));
        assert!(idx.health_check().await.unwrap());
    }

    #[tokio::test]
    async fn unreachable_server_is_unavailable() {
        let idx = QdrantIndex::new("http://127.0.0.1:1", "contexts", None, Duration::from_secs(1));
        let err = idx
            .scroll(&IndexFilter::ContextId("t1".into()), 1)
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }
}
