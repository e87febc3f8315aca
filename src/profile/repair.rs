use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use serde::Deserialize;

use castgate_auth::Session;

use super::{Profile, ProfileRepair};
use crate::error::{Error, Result};
use crate::fetch::Fetch;

/// What the repair action reported.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RepairOutcome {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub profile: Option<Profile>,
    /// The row exists but was not returned.
    #[serde(default, deserialize_with = "null_false")]
    pub exists: bool,
}

fn null_false<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

impl RepairOutcome {
    pub fn created(profile: Profile) -> Self {
        Self {
            profile: Some(profile),
            exists: true,
            ..Default::default()
        }
    }

    pub fn exists_without_profile() -> Self {
        Self {
            exists: true,
            ..Default::default()
        }
    }

    pub fn failed(message: &str) -> Self {
        Self {
            error: Some(message.to_string()),
            ..Default::default()
        }
    }
}

/// Calls the ensure-profile endpoint with the user's own token.
#[derive(Clone)]
pub struct HttpProfileRepair {
    endpoint: String,
    key: String,
    http_client: Client,
}

impl HttpProfileRepair {
    pub fn new(base_url: &str, repair_path: &str, key: &str, http_client: Client) -> Self {
        Self {
            endpoint: format!(
                "{}/{}",
                base_url.trim_end_matches('/'),
                repair_path.trim_start_matches('/')
            ),
            key: key.to_string(),
            http_client,
        }
    }
}

#[async_trait]
impl ProfileRepair for HttpProfileRepair {
    async fn ensure_profile(&self, session: &Session) -> Result<RepairOutcome> {
        debug!("Requesting profile repair for {}", session.user_id());

        let response = Fetch::post(&self.http_client, &self.endpoint)
            .header("apikey", &self.key)
            .bearer_auth(&session.access_token)
            .json(&serde_json::json!({ "user_id": session.user_id() }))?
            .execute_raw()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        // Failures usually still carry `{ "error": ... }`.
        match serde_json::from_str::<RepairOutcome>(&text) {
            Ok(outcome) => {
                if !status.is_success() && outcome.error.is_none() {
                    warn!("Profile repair returned {} without an error message", status);
                    return Ok(RepairOutcome::failed(&format!("repair failed with status {}", status)));
                }
                Ok(outcome)
            }
            Err(_) if !status.is_success() => Err(Error::repair(format!(
                "repair failed with status {}: {}",
                status, text
            ))),
            Err(e) => Err(Error::repair(format!("unreadable repair response: {}", e))),
        }
    }
}
