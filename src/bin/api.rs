use conversation_backend::{
    api::{start_server, ApiState},
    provider::OpenAiProvider,
    query::QueryPipeline,
    redaction::{HttpRedaction, NoopRedaction, RedactionService},
    storage::{InMemoryStorage, PostgresStorage, StorageClient},
    store::{ConversationStore, MessageStore},
    tokenizer::{HeuristicTokenizer, DEFAULT_MODEL},
    transcript::{ConversationMutator, TranscriptAssembler},
};
use std::sync::Arc;
use tracing::{info, warn};

fn build_storage() -> Arc<dyn StorageClient> {
    let database_url = std::env::var("POSTGRES_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .ok();

    if let Some(url) = database_url {
        match PostgresStorage::connect_lazy(&url) {
            Ok(storage) => {
                info!("Document storage backend: postgres");
                return Arc::new(storage);
            }
            Err(error) => {
                warn!(
                    "Failed to initialize postgres storage, falling back to in-memory: {}",
                    error
                );
            }
        }
    }

    info!("Document storage backend: in-memory");
    Arc::new(InMemoryStorage::new())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    let api_key = std::env::var("OPENAI_API_KEY").unwrap_or_else(|_| {
        eprintln!("OPENAI_API_KEY not set; query requests will fail until it is");
        String::new()
    });
    let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

    let port: u16 = std::env::var("PORT")
        .or_else(|_| std::env::var("API_PORT"))
        .unwrap_or_else(|_| "8080".to_string())
        .parse()?;

    info!("Conversation Backend - API Server");
    info!("Port: {}", port);

    // Create components; the storage handle is built once here and
    // injected everywhere.
    let storage = build_storage();
    let messages = Arc::new(MessageStore::new(storage.clone()));
    let conversations = Arc::new(ConversationStore::new(storage, messages.clone()));
    let assembler = Arc::new(TranscriptAssembler::new(
        conversations.clone(),
        messages.clone(),
    ));
    let mutator = Arc::new(ConversationMutator::new(
        conversations.clone(),
        assembler.clone(),
    ));

    let redaction: Arc<dyn RedactionService> = match std::env::var("REDACTION_URL") {
        Ok(url) => {
            info!("PII redaction endpoint: {}", url);
            Arc::new(HttpRedaction::new(url))
        }
        Err(_) => {
            warn!("REDACTION_URL not set; storing text unredacted");
            Arc::new(NoopRedaction)
        }
    };

    let provider = match std::env::var("OPENAI_BASE_URL") {
        Ok(base_url) => OpenAiProvider::with_base_url(api_key, model.clone(), base_url),
        Err(_) => OpenAiProvider::new(api_key, model.clone()),
    };

    let pipeline = Arc::new(QueryPipeline::new(
        messages,
        mutator,
        redaction,
        Arc::new(HeuristicTokenizer::new()),
        Arc::new(provider),
        model,
    ));

    let state = ApiState {
        conversations,
        assembler,
        pipeline,
    };

    info!("Components initialized, starting API server");

    start_server(state, port).await?;

    Ok(())
}
