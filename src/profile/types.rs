//! Profile records and the onboarding form

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

/// Marketplace role of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Talent,
    Client,
    Admin,
}

impl FromStr for UserRole {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "talent" => Ok(Self::Talent),
            "client" => Ok(Self::Client),
            "admin" => Ok(Self::Admin),
            _ => Err(()),
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Talent => "talent",
            Self::Client => "client",
            Self::Admin => "admin",
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    #[default]
    Unassigned,
    Talent,
    Client,
}

impl AccountType {
    pub const ALL: [AccountType; 3] = [
        AccountType::Unassigned,
        AccountType::Talent,
        AccountType::Client,
    ];
}

impl FromStr for AccountType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unassigned" => Ok(Self::Unassigned),
            "talent" => Ok(Self::Talent),
            "client" => Ok(Self::Client),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    #[default]
    None,
    Trialing,
    Active,
    PastDue,
    Canceled,
    Unpaid,
}

impl FromStr for SubscriptionStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "" => Ok(Self::None),
            "trialing" => Ok(Self::Trialing),
            "active" => Ok(Self::Active),
            "past_due" => Ok(Self::PastDue),
            "canceled" | "cancelled" => Ok(Self::Canceled),
            "unpaid" => Ok(Self::Unpaid),
            _ => Err(()),
        }
    }
}

impl SubscriptionStatus {
    pub fn is_entitled(self) -> bool {
        matches!(self, Self::Trialing | Self::Active)
    }
}

// Nullable columns come back as JSON null; unknown enum strings are treated
// the same way instead of failing the whole row.

fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr + Default,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| s.parse().ok()).unwrap_or_default())
}

fn lenient_role<'de, D>(deserializer: D) -> Result<Option<UserRole>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| s.parse().ok()))
}

fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.filter(|s| !s.trim().is_empty()))
}

fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// One row of the profiles table, keyed by the auth subject id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    #[serde(default, deserialize_with = "lenient_role")]
    pub role: Option<UserRole>,
    #[serde(default, deserialize_with = "lenient")]
    pub account_type: AccountType,
    #[serde(default, deserialize_with = "null_default")]
    pub display_name: String,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub avatar_url: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub subscription_status: SubscriptionStatus,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub subscription_plan: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub subscription_current_period_end: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub first_name: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub location: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub company_name: Option<String>,
}

impl Profile {
    /// A fresh row as the repair action creates it.
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            role: None,
            account_type: AccountType::Unassigned,
            display_name: String::new(),
            avatar_url: None,
            subscription_status: SubscriptionStatus::None,
            subscription_plan: None,
            subscription_current_period_end: None,
            first_name: None,
            last_name: None,
            location: None,
            company_name: None,
        }
    }

    /// Fields still missing before the role's dashboard can be used.
    pub fn missing_onboarding_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        match self.role {
            Some(UserRole::Talent) => {
                if self.first_name.is_none() {
                    missing.push("first_name");
                }
                if self.last_name.is_none() {
                    missing.push("last_name");
                }
                if self.location.is_none() {
                    missing.push("location");
                }
            }
            Some(UserRole::Client) => {
                if self.company_name.is_none() {
                    missing.push("company_name");
                }
            }
            Some(UserRole::Admin) | None => {}
        }
        missing
    }

    pub fn is_onboarding_complete(&self) -> bool {
        self.missing_onboarding_fields().is_empty()
    }
}

/// Columns written by the onboarding form. Unset fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl ProfileUpdate {
    /// Trims every field and drops the blank ones.
    pub fn normalized(self) -> Self {
        fn clean(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }
        Self {
            first_name: clean(self.first_name),
            last_name: clean(self.last_name),
            location: clean(self.location),
            company_name: clean(self.company_name),
            display_name: clean(self.display_name),
        }
    }

    /// Required fields for `role` that this update leaves blank on `current`.
    pub fn missing_for(&self, current: &Profile) -> Vec<&'static str> {
        let mut merged = current.clone();
        self.apply_to(&mut merged);
        merged.missing_onboarding_fields()
    }

    pub fn apply_to(&self, profile: &mut Profile) {
        if let Some(v) = &self.first_name {
            profile.first_name = Some(v.clone());
        }
        if let Some(v) = &self.last_name {
            profile.last_name = Some(v.clone());
        }
        if let Some(v) = &self.location {
            profile.location = Some(v.clone());
        }
        if let Some(v) = &self.company_name {
            profile.company_name = Some(v.clone());
        }
        if let Some(v) = &self.display_name {
            profile.display_name = v.clone();
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
