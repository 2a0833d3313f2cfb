//! Product ETL run: authenticate, search, audit, flatten.

mod search;
mod transform;

pub use search::{Product, ProductAttribute, SearchClient, SearchOutcome, SearchQuery, SearchResponse};
pub use transform::{transform, ProductTable, BASE_COLUMNS};

use crate::auth::CredentialLifecycleManager;
use crate::config::{ConfigSource, Settings};
use crate::credentials::SqliteStore;
use crate::error::Result;
use crate::oauth::HttpExecutor;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// One end-to-end ETL run against the marketplace.
pub struct EtlClient {
    manager: CredentialLifecycleManager,
    store: Arc<SqliteStore>,
    search: SearchClient,
    query: Option<SearchQuery>,
}

impl EtlClient {
    pub fn new(
        manager: CredentialLifecycleManager,
        store: Arc<SqliteStore>,
        search: SearchClient,
        query: Option<SearchQuery>,
    ) -> Self {
        Self {
            manager,
            store,
            search,
            query,
        }
    }

    /// Wires the record store, token executor, lifecycle manager and search
    /// client from configuration.
    pub fn from_settings(config: Arc<dyn ConfigSource>, settings: &Settings) -> Result<Self> {
        let timeout = Duration::from_secs(settings.http_timeout_secs);
        let store = Arc::new(SqliteStore::open(&settings.database_path)?);
        let executor = Arc::new(HttpExecutor::new(timeout)?);
        let manager =
            CredentialLifecycleManager::from_config(config, settings, store.clone(), executor)?;
        let search = SearchClient::new(
            settings.api_base_url.clone(),
            settings.site_id.clone(),
            timeout,
        )?;
        let query = settings.search_query.clone().map(|query| SearchQuery {
            query,
            category: settings.search_category.clone(),
        });

        Ok(Self::new(manager, store, search, query))
    }

    /// Resolves a credential, then searches and flattens the results.
    ///
    /// # Returns
    /// * `Ok(Some(table))` - Search succeeded
    /// * `Ok(None)` - No query configured, or the search was not successful
    /// * `Err` - Credential resolution, transport, or storage failure
    pub async fn run(&self) -> Result<Option<ProductTable>> {
        let resolution = self.manager.resolve().await?;
        info!(
            credential_id = resolution.credential_id,
            new_credential = resolution.issued_new_credential(),
            "Credential resolved"
        );

        let Some(query) = &self.query else {
            warn!("SEARCH_QUERY not configured, skipping product search");
            return Ok(None);
        };

        info!(query = %query.query, category = ?query.category, "Searching products");
        let outcome = self.search.search(&resolution.access_token, query).await?;

        let logged = self
            .store
            .log_request(&outcome.url, Some(resolution.credential_id), outcome.status)?;
        info!(request_id = logged.id, status = outcome.status, "Search request logged");

        match outcome.response {
            Some(response) => {
                let table = transform(&response);
                info!(
                    rows = table.len(),
                    columns = table.columns().len(),
                    "Search results transformed"
                );
                Ok(Some(table))
            }
            None => {
                warn!(status = outcome.status, "Search request was not successful");
                Ok(None)
            }
        }
    }
}
