//! SurrealDB implementation for whoasked data storage.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use surrealdb::{
    Surreal,
    engine::any::{self, Any},
    opt::auth::Root,
};
use tracing::{info, instrument};

use crate::base::{
    config::Config,
    types::{MentionRecord, Res, Void},
};

use super::{DbClient, GenericDbClient};

/// Table holding one row per participant.
const HISTORY_TABLE: &str = "history";

// Extra methods on `DbClient` applied by the surreal implementation.

impl DbClient {
    /// Connects to the SurrealDB endpoint named in the configuration.
    pub async fn surreal(config: &Config) -> Res<Self> {
        let client = SurrealDbClient::new(&config.db_endpoint, config.db_username.as_deref(), config.db_password.as_deref()).await?;
        Ok(Self::new(Arc::new(client)))
    }

    /// Creates an in-memory database, mostly useful for tests.
    pub async fn surreal_memory() -> Res<Self> {
        let client = SurrealDbClient::new("mem://", None, None).await?;
        Ok(Self::new(Arc::new(client)))
    }
}

// Structs.

/// A participant's history as stored in the `history` table.
#[derive(Debug, Serialize, Deserialize)]
struct SurrealHistory {
    records: Vec<MentionRecord>,
}

/// SurrealDB client implementation.
#[derive(Clone)]
pub struct SurrealDbClient {
    db: Surreal<Any>,
}

impl SurrealDbClient {
    /// Connect, authenticate if credentials are given, and select the namespace.
    #[instrument(name = "SurrealDbClient::new", skip(username, password))]
    pub async fn new(endpoint: &str, username: Option<&str>, password: Option<&str>) -> Res<Self> {
        let db = any::connect(endpoint).await?;

        if let (Some(username), Some(password)) = (username, password) {
            db.signin(Root { username, password }).await?;
        }

        db.use_ns("whoasked").use_db("bot").await?;

        info!("Database initialized successfully.");

        Ok(Self { db })
    }
}

#[async_trait]
impl GenericDbClient for SurrealDbClient {
    #[instrument(skip(self))]
    async fn load_history(&self, target_id: &str) -> Res<Vec<MentionRecord>> {
        let history: Option<SurrealHistory> = self.db.select((HISTORY_TABLE, target_id)).await?;

        Ok(history.map(|h| h.records).unwrap_or_default())
    }

    #[instrument(skip(self, records))]
    async fn store_history(&self, target_id: &str, records: Vec<MentionRecord>) -> Void {
        if records.is_empty() {
            let _: Option<SurrealHistory> = self.db.delete((HISTORY_TABLE, target_id)).await?;
        } else {
            let _: Option<SurrealHistory> = self.db.upsert((HISTORY_TABLE, target_id)).content(SurrealHistory { records }).await?;
        }

        Ok(())
    }
}

// Tests.

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::base::types::MentionKind;

    fn record(target: &str, source: &str) -> MentionRecord {
        MentionRecord {
            target_id: target.to_string(),
            source_id: source.to_string(),
            source_name: source.to_string(),
            group_id: "C1".to_string(),
            timestamp: Utc::now(),
            kind: MentionKind::Mention,
            content_snippet: "hi".to_string(),
            quoted_snippet: None,
        }
    }

    #[tokio::test]
    async fn stores_and_loads_histories() {
        let client = SurrealDbClient::new("mem://", None, None).await.unwrap();

        assert!(client.load_history("UA").await.unwrap().is_empty());

        let records = vec![record("UA", "UB"), record("UA", "UC")];
        client.store_history("UA", records.clone()).await.unwrap();

        assert_eq!(client.load_history("UA").await.unwrap(), records);
        assert!(client.load_history("UB").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_history_removes_the_row() {
        let client = SurrealDbClient::new("mem://", None, None).await.unwrap();

        client.store_history("UA", vec![record("UA", "UB")]).await.unwrap();
        client.store_history("UA", Vec::new()).await.unwrap();

        assert!(client.load_history("UA").await.unwrap().is_empty());
    }
}
