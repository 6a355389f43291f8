use std::sync::Arc;

use crate::capability::Serialized;
use crate::core::config::{AppPaths, ConfigService, Settings};
use crate::execution::{CodeExecutor, LocalProcessExecutor};
use crate::graph::NodeContext;
use crate::llm::{LlmProvider, OpenAiCompatProvider};
use crate::rag::{
    DocumentIngestor, DocumentStore, EmbeddingRetriever, Retriever, SqliteDocumentStore,
    TextSplitter,
};
use crate::tutor::CodeTutor;

pub mod error;

use error::InitializationError;

/// The external capabilities the server is assembled from. Real providers in
/// [`AppState::initialize`], fakes in tests.
pub struct Capabilities {
    pub llm: Arc<dyn LlmProvider>,
    pub embedder: Arc<dyn LlmProvider>,
    pub documents: Arc<dyn DocumentStore>,
    pub executor: Arc<dyn CodeExecutor>,
}

/// Global application state shared across all routes and socket tasks.
#[derive(Clone)]
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub settings: Arc<Settings>,
    pub llm: Arc<dyn LlmProvider>,
    pub documents: Arc<dyn DocumentStore>,
    pub executor: Arc<dyn CodeExecutor>,
    pub ingestor: Arc<DocumentIngestor>,
    pub tutor: CodeTutor,
}

impl AppState {
    /// Loads configuration, opens the document store and connects the
    /// providers named in the settings.
    ///
    /// Takes the paths so the caller can install logging first.
    pub async fn initialize(paths: Arc<AppPaths>) -> Result<Arc<Self>, InitializationError> {
        let config = ConfigService::new(paths.clone());
        let settings = config
            .load_settings()
            .map_err(|e| InitializationError::Config(e.into()))?;

        let documents = SqliteDocumentStore::open(paths.documents_db_path.clone())
            .await
            .map_err(|e| InitializationError::Documents(e.into()))?;

        let llm = OpenAiCompatProvider::new(
            "llm",
            &settings.llm.base_url,
            settings.llm.model.clone(),
            settings.llm.api_key.clone(),
            settings.llm.request_timeout(),
        )
        .map_err(|e| InitializationError::Llm(e.into()))?;

        let embedder = OpenAiCompatProvider::new(
            "embedding",
            &settings.embedding.base_url,
            settings.embedding.model.clone(),
            settings.embedding.api_key.clone(),
            settings.llm.request_timeout(),
        )
        .map_err(|e| InitializationError::Llm(e.into()))?;

        let executor = LocalProcessExecutor::new(settings.execution.clone());

        Self::assemble(
            paths,
            settings,
            Capabilities {
                llm: Arc::new(llm),
                embedder: Arc::new(embedder),
                documents: Arc::new(documents),
                executor: Arc::new(executor),
            },
        )
    }

    /// Wires capabilities into the tutor pipeline and the ingestor.
    pub fn assemble(
        paths: Arc<AppPaths>,
        settings: Settings,
        capabilities: Capabilities,
    ) -> Result<Arc<Self>, InitializationError> {
        let Capabilities {
            llm,
            embedder,
            documents,
            executor,
        } = capabilities;

        if settings.llm.api_key.is_none() {
            tracing::warn!("No LLM API key configured; set GROQ_API_KEY or llm.api_key");
        }

        let retriever = EmbeddingRetriever::new(embedder.clone(), documents.clone());
        let (llm, retriever): (Arc<dyn LlmProvider>, Arc<dyn Retriever>) =
            if settings.llm.serialize_calls {
                (
                    Arc::new(Serialized::new(llm)),
                    Arc::new(Serialized::new(retriever)),
                )
            } else {
                (llm, Arc::new(retriever))
            };

        let ctx = NodeContext::new(llm.clone(), retriever)
            .with_llm_settings(settings.llm.clone())
            .with_stage_timeout(settings.pipeline.stage_timeout());
        let tutor = CodeTutor::new(ctx).map_err(|e| InitializationError::Graph(e.into()))?;

        let ingestor = Arc::new(DocumentIngestor::new(
            paths.upload_dir.clone(),
            settings.uploads.max_file_size,
            TextSplitter::from_settings(&settings.rag),
            embedder,
            documents.clone(),
        ));

        Ok(Arc::new(AppState {
            paths,
            settings: Arc::new(settings),
            llm,
            documents,
            executor,
            ingestor,
            tutor,
        }))
    }
}
