use anyhow::Result;
use redis::{AsyncCommands, Client};

/// Cache-invalidation collaborator. Rendered pages are cached under
/// `page:<logical path>` keys; mutating services drop the affected keys
/// after every write. Invalidation is fire-and-forget: a failure is
/// logged and never propagated to the caller.
#[derive(Clone)]
pub struct RedisCache {
    client: Client,
}

impl RedisCache {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url)?;
        let mut conn = client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(Self { client })
    }

    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(())
    }

    pub async fn invalidate_pages(&self, paths: &[String]) {
        if paths.is_empty() {
            return;
        }
        let keys: Vec<String> = paths.iter().map(|path| format!("page:{}", path)).collect();
        let result: Result<()> = async {
            let mut conn = self.client.get_multiplexed_async_connection().await?;
            conn.del::<_, ()>(keys).await?;
            Ok(())
        }
        .await;

        if let Err(err) = result {
            tracing::warn!(error = ?err, paths = ?paths, "cache invalidation failed");
        }
    }
}
