use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{ReportError, ReportResult};

pub const DEFAULT_FOLLOW_UP_THRESHOLD_HOURS: i64 = 48;
pub const DEFAULT_STALE_INFO_DAYS: i64 = 7;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlookTokens {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

fn default_follow_up_threshold_hours() -> i64 {
    DEFAULT_FOLLOW_UP_THRESHOLD_HOURS
}

fn default_stale_info_days() -> i64 {
    DEFAULT_STALE_INFO_DAYS
}

fn default_created_at() -> String {
    Utc::now().to_rfc3339()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub email: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default)]
    pub org_id: Option<String>,
    #[serde(default)]
    pub outlook_connected: bool,
    #[serde(default)]
    pub outlook_tokens: OutlookTokens,
    #[serde(default = "default_follow_up_threshold_hours")]
    pub follow_up_threshold_hours: i64,
    #[serde(default = "default_stale_info_days")]
    pub stale_info_days: i64,
    #[serde(default = "default_created_at")]
    pub created_at: String,
}

impl UserProfile {
    /// Thresholds from the profile file, with negative values clamped to zero
    pub fn policy(&self) -> UserPolicy {
        UserPolicy {
            identity: self.email.clone(),
            follow_up_threshold_hours: self.follow_up_threshold_hours.max(0),
            stale_info_days: self.stale_info_days.max(0),
        }
    }

    pub fn delegated_access_token(&self) -> Option<&str> {
        self.outlook_tokens
            .access_token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
    }
}

/// Per-user thresholds the classifier reads. Read-only during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserPolicy {
    pub identity: String,
    pub follow_up_threshold_hours: i64,
    pub stale_info_days: i64,
}

impl UserPolicy {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            follow_up_threshold_hours: DEFAULT_FOLLOW_UP_THRESHOLD_HOURS,
            stale_info_days: DEFAULT_STALE_INFO_DAYS,
        }
    }
}

/// Read-only lookup of user profiles, owned outside the report core
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get(&self, user_id: &str) -> ReportResult<Option<UserProfile>>;

    /// Connected profiles in store order
    async fn connected_users(&self) -> ReportResult<Vec<UserProfile>>;
}

/// Profiles kept in a JSON object keyed by user id. The file is re-read on
/// every lookup; nothing is cached between runs.
pub struct JsonProfileStore {
    path: PathBuf,
}

impl JsonProfileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn load_all(&self) -> ReportResult<IndexMap<String, UserProfile>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(IndexMap::new()),
            Err(e) => {
                return Err(ReportError::DataUnavailable(format!(
                    "could not read profiles at {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };
        if raw.trim().is_empty() {
            return Ok(IndexMap::new());
        }
        serde_json::from_str(&raw).map_err(|e| {
            ReportError::DataUnavailable(format!(
                "profiles at {} are invalid: {}",
                self.path.display(),
                e
            ))
        })
    }
}

#[async_trait]
impl ProfileStore for JsonProfileStore {
    async fn get(&self, user_id: &str) -> ReportResult<Option<UserProfile>> {
        Ok(self.load_all().await?.shift_remove(user_id))
    }

    async fn connected_users(&self) -> ReportResult<Vec<UserProfile>> {
        Ok(self
            .load_all()
            .await?
            .into_values()
            .filter(|p| p.outlook_connected)
            .collect())
    }
}

/// Pick the profile a report runs for.
///
/// An explicit user id must exist and be Outlook-connected. Without one, the
/// connected profile matching `default_email` wins, then the first connected profile.
pub async fn resolve_profile(
    store: &dyn ProfileStore,
    user_id: Option<&str>,
    default_email: Option<&str>,
) -> ReportResult<UserProfile> {
    if let Some(user_id) = user_id {
        let profile = store.get(user_id).await?.ok_or_else(|| {
            ReportError::DataUnavailable(format!("No user profile found for user_id={user_id}"))
        })?;
        if !profile.outlook_connected {
            return Err(ReportError::DataUnavailable(format!(
                "User {user_id} exists but is not Outlook-connected"
            )));
        }
        return Ok(profile);
    }

    let users = store.connected_users().await?;
    let preferred = default_email
        .map(|e| e.trim())
        .filter(|e| !e.is_empty())
        .and_then(|email| {
            users
                .iter()
                .find(|u| u.email.trim().eq_ignore_ascii_case(email))
                .cloned()
        });

    preferred.or_else(|| users.into_iter().next()).ok_or_else(|| {
        ReportError::DataUnavailable(
            "No Outlook-connected users found. Connect an account first.".to_string(),
        )
    })
}
