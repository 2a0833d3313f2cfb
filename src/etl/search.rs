use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

/// Product search parameters.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub query: String,
    pub category: Option<String>,
}

/// Attribute of a listed product.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductAttribute {
    pub name: String,
    #[serde(default)]
    pub value_name: Option<String>,
}

/// Product listing as returned by the site search endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Product {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub thumbnail_id: Option<String>,
    #[serde(default)]
    pub attributes: Vec<ProductAttribute>,
}

/// Body of a successful site search.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub results: Vec<Product>,
}

/// What a search request produced, for auditing and transformation.
#[derive(Debug)]
pub struct SearchOutcome {
    pub url: String,
    pub status: u16,
    /// Parsed body, present only on status 200
    pub response: Option<SearchResponse>,
}

/// HTTP client for the marketplace site search.
///
/// Authenticates with a Bearer token.
pub struct SearchClient {
    http_client: Client,
    base_url: String,
    site_id: String,
}

impl SearchClient {
    pub fn new(base_url: String, site_id: String, timeout: Duration) -> Result<Self> {
        let http_client = Client::builder()
            .user_agent("meli-etl/0.1")
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            site_id,
        })
    }

    pub fn search_url(&self, query: &SearchQuery) -> String {
        let mut url = format!(
            "{}/sites/{}/search?q={}",
            self.base_url,
            urlencoding::encode(&self.site_id),
            urlencoding::encode(&query.query)
        );
        if let Some(category) = &query.category {
            url.push_str("&category=");
            url.push_str(&urlencoding::encode(category));
        }
        url
    }

    /// Runs one search. A non-200 status is not an error; it is reported in
    /// the outcome with no parsed body.
    pub async fn search(&self, access_token: &str, query: &SearchQuery) -> Result<SearchOutcome> {
        let url = self.search_url(query);
        let response = self
            .http_client
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await
            .context("Failed to send search request")?;

        let status = response.status().as_u16();
        let parsed = if status == 200 {
            Some(
                response
                    .json::<SearchResponse>()
                    .await
                    .context("Failed to parse search response")?,
            )
        } else {
            None
        };

        Ok(SearchOutcome {
            url,
            status,
            response: parsed,
        })
    }
}
