//! Shared application state threaded through every Axum handler.

use std::sync::Arc;

use sightline_core::entities::SqliteStore;
use sightline_core::generation::openai::{OpenAiClient, OpenAiConfig};
use sightline_core::realtime::RealtimeClient;
use sightline_core::services::{ChatRouter, DescriptionService, UploadService};
use sightline_core::views::ViewRevisions;
use sightline_core::CoreError;

use crate::config::Config;

pub type Describer = DescriptionService<SqliteStore, OpenAiClient>;
pub type Uploader = UploadService<SqliteStore, OpenAiClient>;
pub type Chat = ChatRouter<SqliteStore, OpenAiClient>;

/// Global application state.
///
/// Wrapped in an `Arc` and injected into every handler via
/// `axum::extract::State`. Every field is itself cheap to clone.
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<SqliteStore>,
    pub views: Arc<ViewRevisions>,
    pub describer: Arc<Describer>,
    pub uploader: Uploader,
    pub chat: Chat,
    pub realtime: RealtimeClient,
}

impl AppState {
    /// Wire the services on top of an already opened store.
    pub fn with_store(config: Config, store: SqliteStore) -> Result<Self, CoreError> {
        let store = Arc::new(store);
        let views = Arc::new(ViewRevisions::new());

        let generator = Arc::new(OpenAiClient::new(OpenAiConfig {
            api_key: config.openai_api_key.clone(),
            base_url: config.openai_base_url.clone(),
            model: config.model.clone(),
            timeout: config.upstream_timeout,
        })?);

        let describer = Arc::new(DescriptionService::new(
            Arc::clone(&store),
            Arc::clone(&generator),
            Arc::clone(&views),
            config.upload_dir.clone(),
            config.max_tokens,
        ));
        let uploader = UploadService::new(
            Arc::clone(&store),
            Arc::clone(&describer),
            Arc::clone(&views),
            config.upload_dir.clone(),
        );
        let chat = ChatRouter::new(
            Arc::clone(&store),
            generator,
            Arc::clone(&views),
            config.max_tokens,
        );
        let realtime = RealtimeClient::new(config.realtime_url.clone(), config.upstream_timeout)?;

        Ok(Self {
            config: Arc::new(config),
            store,
            views,
            describer,
            uploader,
            chat,
            realtime,
        })
    }
}
