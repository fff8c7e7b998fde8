pub mod active_context;
pub mod capture_message;
pub mod search_context;

use active_context::ActiveContextParams;
use capture_message::CaptureMessageParams;
use chrono::Utc;
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{tool, tool_handler, tool_router, ServerHandler};
use search_context::SearchContextParams;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::EvnaConfig;
use crate::context::active::{format_context, ActiveContextStream};
use crate::context::fusion::{format_results, FusionConfig, FusionRetriever, SearchRequest};
use crate::context::session::ClientAwareSession;
use crate::context::types::{parse_timestamp, ClientType, Role};
use crate::store::{DataStore, HistoricalSearch};

/// The evna MCP tool handler. Holds the pipeline components and exposes them
/// via the `#[tool_router]` macro.
#[derive(Clone)]
pub struct EvnaTools {
    tool_router: ToolRouter<Self>,
    active: Arc<ActiveContextStream>,
    retriever: Arc<FusionRetriever>,
    session: Arc<Mutex<ClientAwareSession>>,
    config: Arc<EvnaConfig>,
}

#[tool_router]
impl EvnaTools {
    pub fn new(
        store: Arc<dyn DataStore>,
        historical: Arc<dyn HistoricalSearch>,
        config: Arc<EvnaConfig>,
    ) -> Self {
        let active = Arc::new(ActiveContextStream::new(store));
        let retriever = FusionRetriever::new(
            Arc::clone(&active),
            historical,
            FusionConfig::from(&config.retrieval),
        );
        let session =
            ClientAwareSession::new(Arc::clone(&active), config.retrieval.cross_client_tail);
        Self {
            tool_router: Self::tool_router(),
            active,
            retriever: Arc::new(retriever),
            session: Arc::new(Mutex::new(session)),
            config,
        }
    }

    /// Capture one message into the active context stream.
    #[tool(description = "Capture a conversation message into active context. Inline key::value annotations (project::, meeting::, ctx::) are extracted as metadata.")]
    async fn capture_message(
        &self,
        Parameters(params): Parameters<CaptureMessageParams>,
    ) -> Result<String, String> {
        let role: Role = params.role.parse()?;
        if params.content.trim().is_empty() {
            return Err("content must not be empty".into());
        }
        let requested = params
            .client_type
            .as_deref()
            .map(str::parse::<ClientType>)
            .transpose()?;

        let client = {
            let mut session = self.session.lock().await;
            if let Some(client) = requested {
                session.set_session(&params.conversation_id, client);
            }
            requested.or_else(|| {
                session
                    .session()
                    .filter(|s| s.conversation_id == params.conversation_id)
                    .map(|s| s.client_type)
            })
        };

        tracing::info!(
            conversation = %params.conversation_id,
            role = %role,
            content_len = params.content.len(),
            client = ?client,
            "capture_message called"
        );

        let message = self
            .active
            .capture_message(
                &params.conversation_id,
                role,
                &params.content,
                Utc::now(),
                client,
            )
            .await
            .map_err(|e| e.to_string())?;

        serde_json::to_string(&message).map_err(|e| format!("serialization failed: {e}"))
    }

    /// Recent messages from the active stream, filtered by client policy.
    #[tool(description = "Get recent active context as markdown, newest first. On the first message of a turn all clients are included; later calls see only the bound client.")]
    async fn active_context(
        &self,
        Parameters(params): Parameters<ActiveContextParams>,
    ) -> Result<String, String> {
        let limit = self.config.retrieval.clamp_limit(params.limit);
        let is_first = params.is_first_message.unwrap_or(true);
        tracing::info!(
            limit,
            project = ?params.project,
            is_first,
            "active_context called"
        );

        let messages = self
            .session
            .lock()
            .await
            .get_client_aware_context(is_first, params.project.as_deref(), limit)
            .await
            .map_err(|e| e.to_string())?;

        Ok(format_context(&messages))
    }

    /// Fused search over recent and historical context.
    #[tool(description = "Search recent active context and the historical archive together. Recent matches are listed first and marked; duplicates across the two are removed.")]
    async fn search_context(
        &self,
        Parameters(params): Parameters<SearchContextParams>,
    ) -> Result<String, String> {
        if params.query.trim().is_empty() {
            return Err("query must not be empty".into());
        }
        if let Some(threshold) = params.threshold {
            if !(0.0..=1.0).contains(&threshold) {
                return Err("threshold must be between 0.0 and 1.0".into());
            }
        }
        let since = params.since.as_deref().map(parse_timestamp).transpose()?;

        let request = SearchRequest {
            query: params.query,
            limit: self.config.retrieval.clamp_limit(params.limit),
            project: params.project,
            since,
            threshold: params.threshold,
        };
        tracing::info!(
            query = %request.query,
            limit = request.limit,
            project = ?request.project,
            "search_context called"
        );

        let results = self
            .retriever
            .search(&request)
            .await
            .map_err(|e| e.to_string())?;
        tracing::info!(results = results.len(), "search_context complete");

        Ok(format_results(&results))
    }
}

#[tool_handler]
impl ServerHandler for EvnaTools {
    fn get_info(&self) -> rmcp::model::ServerInfo {
        rmcp::model::ServerInfo {
            instructions: Some(
                "evna keeps working memory across conversations. Use capture_message to \
                 record turns, active_context for what happened recently, and \
                 search_context to search recent and archived history."
                    .into(),
            ),
            capabilities: rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}
