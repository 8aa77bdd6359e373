use crate::ai::AiClient;
use crate::storage::DbPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub ai: Option<Arc<AiClient>>,
}

impl AppState {
    pub fn new(db: DbPool, ai: Option<AiClient>) -> Self {
        Self {
            db,
            ai: ai.map(Arc::new),
        }
    }
}
