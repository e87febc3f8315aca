use async_trait::async_trait;
use log::debug;
use reqwest::Client;

use castgate_auth::Session;
use castgate_postgrest::PostgrestClient;

use super::{Profile, ProfileStore, ProfileUpdate};
use crate::error::{Error, Result};

/// Profile store backed by a PostgREST table.
#[derive(Clone)]
pub struct PostgrestProfileStore {
    url: String,
    key: String,
    table: String,
    columns: String,
    http_client: Client,
}

impl PostgrestProfileStore {
    pub fn new(url: &str, key: &str, table: &str, columns: &str, http_client: Client) -> Self {
        Self {
            url: url.to_string(),
            key: key.to_string(),
            table: table.to_string(),
            columns: columns.to_string(),
            http_client,
        }
    }

    fn query(&self, session: &Session) -> Result<PostgrestClient> {
        let client = PostgrestClient::new(&self.url, &self.key, &self.table, self.http_client.clone())
            .with_auth(&session.access_token)?
            .eq("id", session.user_id());
        Ok(client)
    }
}

#[async_trait]
impl ProfileStore for PostgrestProfileStore {
    async fn fetch_profile(&self, session: &Session) -> Result<Option<Profile>> {
        let profile = self
            .query(session)?
            .select(&self.columns)
            .maybe_single::<Profile>()
            .await?;
        debug!(
            "Profile lookup for {}: {}",
            session.user_id(),
            if profile.is_some() { "found" } else { "absent" }
        );
        Ok(profile)
    }

    async fn update_profile(
        &self,
        session: &Session,
        update: &ProfileUpdate,
    ) -> Result<Option<Profile>> {
        if update.is_empty() {
            return Err(Error::validation("nothing to update"));
        }

        let body = self.query(session)?.update(update).await?;

        // `return=representation` yields the updated rows; an empty body or
        // array means row level security hid the row from us.
        let row = match body {
            serde_json::Value::Array(rows) => match rows.into_iter().next() {
                Some(row) => row,
                None => return Ok(None),
            },
            row @ serde_json::Value::Object(_) => row,
            _ => return Ok(None),
        };

        let profile = serde_json::from_value::<Profile>(row)
            .map_err(|e| Error::profile(format!("unreadable profile row: {}", e)))?;
        Ok(Some(profile))
    }
}
