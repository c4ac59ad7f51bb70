//! MongoDB database wrapper.

use mongodb::bson::{Document, doc};
use mongodb::options::{ClientOptions, IndexOptions};
use mongodb::{Client, Collection, IndexModel};
use tracing::{debug, info};

/// Database wrapper for MongoDB operations.
///
/// The driver keeps its own connection pool and reconnects on demand, so one
/// instance is opened at startup and shared through `Arc` until shutdown.
#[derive(Debug, Clone)]
pub struct Database {
    client: Client,
    db: mongodb::Database,
}

impl Database {
    /// Connect to MongoDB with the given URI and database name.
    ///
    /// # Errors
    /// Returns error if connection or index creation fails.
    pub async fn connect(uri: &str, db_name: &str) -> anyhow::Result<Self> {
        let options = ClientOptions::parse(uri).await?;
        let client = Client::with_options(options)?;

        // Ping the database to verify connection
        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await?;

        info!("Successfully connected to MongoDB");

        let db = client.database(db_name);
        let database = Self { client, db };
        database.ensure_indexes().await?;

        Ok(database)
    }

    /// Create the indexes the repositories rely on (idempotent).
    async fn ensure_indexes(&self) -> anyhow::Result<()> {
        let specs: [(&str, Document, bool); 7] = [
            ("users", doc! { "user_id": 1 }, true),
            ("users", doc! { "referral_code": 1 }, true),
            ("users", doc! { "referer_id": 1 }, false),
            ("users", doc! { "bonus_points": -1 }, false),
            ("messages", doc! { "campaign_id": 1, "user_id": 1 }, true),
            ("chat_boosts", doc! { "user_id": 1, "chat_id": 1 }, true),
            ("subscriptions", doc! { "user_id": 1, "channel_id": 1 }, true),
        ];

        for (collection, keys, unique) in specs {
            let model = IndexModel::builder()
                .keys(keys)
                .options(IndexOptions::builder().unique(unique).build())
                .build();
            self.collection::<Document>(collection)
                .create_index(model)
                .await?;
            debug!("Ensured index on {}", collection);
        }

        info!("Database indexes ensured");
        Ok(())
    }

    /// Get a typed collection from the database.
    pub fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        self.db.collection(name)
    }

    /// Close pooled connections. Call once, at process exit.
    pub async fn shutdown(&self) {
        self.client.clone().shutdown().await;
        info!("Database connections closed");
    }
}
