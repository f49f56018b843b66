use std::time::Instant;

use georef::search::{SearchBackend, SearchQuery, SearchResponse};
use itertools::Itertools;
use once_cell::sync::OnceCell;
use reqwest::{Client, header::CONTENT_TYPE};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::{
    runtime::{Handle, Runtime, RuntimeFlavor},
    task,
};
use tracing::{debug, info, instrument, warn};

use crate::{
    config::ElasticConfig,
    dsl::search_body,
    error::{ElasticError, Result},
    source::parse_document,
};

#[derive(Debug, Deserialize)]
struct MultiSearchResponse {
    responses: Vec<ItemResponse>,
}

#[derive(Debug, Deserialize)]
struct ItemResponse {
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    hits: Option<Hits>,
}

#[derive(Debug, Deserialize)]
struct Hits {
    total: Total,
    #[serde(default)]
    hits: Vec<Hit>,
}

/// Hit count, a plain number before Elasticsearch 7.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Total {
    Count(usize),
    Object { value: usize },
}

impl Total {
    const fn value(&self) -> usize {
        match self {
            Self::Count(value) | Self::Object { value } => *value,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(default, rename = "_source")]
    source: Value,
}

/// [`SearchBackend`] running every round as one or more `_msearch` requests.
///
/// The blocking [`SearchBackend::multi_search`] drives the async client on a private runtime
/// created on first use. Called from a multi-threaded tokio runtime it blocks in place on that
/// runtime instead. A current-thread runtime cannot be blocked, so there it fails with
/// [`ElasticError::BlockingInAsyncContext`] and callers use
/// [`ElasticBackend::multi_search_async`].
pub struct ElasticBackend {
    client: Client,
    config: ElasticConfig,
    runtime: OnceCell<Runtime>,
}

impl ElasticBackend {
    pub fn new(config: ElasticConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        info!(
            url = %config.base_url,
            multisearch_max_len = config.multisearch_max_len,
            "Elasticsearch backend ready"
        );
        Ok(Self {
            client,
            config,
            runtime: OnceCell::new(),
        })
    }

    pub const fn config(&self) -> &ElasticConfig {
        &self.config
    }

    /// Runs `queries`, sending at most `multisearch_max_len` of them per request.
    ///
    /// Responses come back in query order. An error in any item fails the whole call.
    #[instrument(name = "Elasticsearch Multi Search", level = "debug", skip_all, fields(queries = queries.len()))]
    pub async fn multi_search_async(&self, queries: &[&SearchQuery]) -> Result<Vec<SearchResponse>> {
        let mut responses = Vec::with_capacity(queries.len());
        let chunk_len = self.config.multisearch_max_len.max(1);

        for (chunk_index, chunk) in queries.chunks(chunk_len).enumerate() {
            let t_start = Instant::now();
            let body = msearch_body(chunk, &self.config)?;

            let response = self
                .client
                .post(self.config.msearch_url())
                .header(CONTENT_TYPE, "application/x-ndjson")
                .body(body)
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                warn!(status = status.as_u16(), "Multi-search request rejected");
                return Err(ElasticError::Status {
                    status: status.as_u16(),
                    body,
                });
            }

            let payload: MultiSearchResponse = response.json().await?;
            responses.extend(read_responses(chunk, payload, chunk_index * chunk_len)?);

            debug!(
                chunk = chunk_index,
                searches = chunk.len(),
                elapsed_ms = t_start.elapsed().as_millis(),
                "Multi-search chunk complete"
            );
        }
        Ok(responses)
    }

    fn runtime(&self) -> Result<&Runtime> {
        self.runtime.get_or_try_init(|| {
            tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(ElasticError::Runtime)
        })
    }
}

impl SearchBackend for ElasticBackend {
    fn multi_search(&self, queries: &[&SearchQuery]) -> georef::search::Result<Vec<SearchResponse>> {
        let responses = match Handle::try_current() {
            // Inside a multi-threaded runtime the worker can block in place on that runtime.
            Ok(handle) => match handle.runtime_flavor() {
                RuntimeFlavor::MultiThread => task::block_in_place(|| {
                    handle.block_on(self.multi_search_async(queries))
                }),
                _ => Err(ElasticError::BlockingInAsyncContext),
            },
            Err(_) => self.runtime()?.block_on(self.multi_search_async(queries)),
        };
        Ok(responses?)
    }

    fn name(&self) -> &str {
        "elasticsearch"
    }
}

/// NDJSON body of `_msearch`: a header line naming the index, then the search, per query.
pub fn msearch_body(queries: &[&SearchQuery], config: &ElasticConfig) -> Result<String> {
    let lines = queries
        .iter()
        .map(|query| -> Result<String> {
            let header = json!({ "index": config.indices.get(query.index) });
            Ok(format!(
                "{}\n{}",
                serde_json::to_string(&header)?,
                serde_json::to_string(&search_body(query, config))?
            ))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(format!("{}\n", lines.iter().join("\n")))
}

fn read_responses(
    queries: &[&SearchQuery],
    payload: MultiSearchResponse,
    first_position: usize,
) -> Result<Vec<SearchResponse>> {
    if payload.responses.len() != queries.len() {
        return Err(ElasticError::MalformedResponse(format!(
            "expected {} responses, got {}",
            queries.len(),
            payload.responses.len()
        )));
    }

    queries
        .iter()
        .zip(payload.responses)
        .enumerate()
        .map(|(i, (query, item))| {
            let position = first_position + i;
            if let Some(error) = item.error {
                return Err(ElasticError::ItemFailed {
                    position,
                    reason: error.to_string(),
                });
            }
            let hits = item.hits.ok_or_else(|| {
                ElasticError::MalformedResponse(format!("response {position} has no hits"))
            })?;
            let documents = hits
                .hits
                .into_iter()
                .map(|hit| parse_document(query.index, hit.source))
                .collect::<serde_json::Result<Vec<_>>>()?;
            Ok(SearchResponse::new(documents, hits.total.value(), query.offset))
        })
        .collect()
}
