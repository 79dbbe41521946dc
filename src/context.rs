use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;

use crate::errors::{EvalError, Result};

/// The key-value input a feature is evaluated against.
///
/// Well-known fields are typed; anything else sent at the top level lands in
/// `extra`, and nested custom fields live in `properties`. Constraints and
/// stickiness look fields up through [`Context::resolve`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Context {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

fn borrowed(value: &Option<String>) -> Option<Cow<'_, str>> {
    value.as_deref().map(Cow::Borrowed)
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_remote_address(mut self, address: impl Into<String>) -> Self {
        self.remote_address = Some(address.into());
        self
    }

    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = Some(app_name.into());
        self
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    pub fn with_current_time(mut self, time: DateTime<Utc>) -> Self {
        self.current_time = Some(time);
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Look a field up: top-level first, then `properties`. Empty values count
    /// as absent.
    pub fn resolve(&self, field: &str) -> Option<Cow<'_, str>> {
        self.top_level(field)
            .filter(|v| !v.is_empty())
            .or_else(|| {
                self.properties
                    .get(field)
                    .filter(|v| !v.is_empty())
                    .map(|v| Cow::Borrowed(v.as_str()))
            })
    }

    fn top_level(&self, field: &str) -> Option<Cow<'_, str>> {
        match field {
            "userId" => borrowed(&self.user_id),
            "sessionId" => borrowed(&self.session_id),
            "remoteAddress" => borrowed(&self.remote_address),
            "environment" => borrowed(&self.environment),
            "appName" => borrowed(&self.app_name),
            "currentTime" => self.current_time.map(|t| Cow::Owned(t.to_rfc3339())),
            other => self.extra.get(other).map(|v| Cow::Borrowed(v.as_str())),
        }
    }

    /// Assign a top-level field by its wire name. `currentTime` must be RFC 3339.
    pub fn set(&mut self, field: &str, value: impl Into<String>) -> Result<()> {
        let value = value.into();
        match field {
            "userId" => self.user_id = Some(value),
            "sessionId" => self.session_id = Some(value),
            "remoteAddress" => self.remote_address = Some(value),
            "environment" => self.environment = Some(value),
            "appName" => self.app_name = Some(value),
            "currentTime" => {
                let parsed = DateTime::parse_from_rfc3339(&value).map_err(|e| {
                    EvalError::BadData(format!("currentTime '{value}' is not a valid date: {e}"))
                })?;
                self.current_time = Some(parsed.with_timezone(&Utc));
            }
            "properties" => {
                return Err(EvalError::BadData(
                    "properties must be set one key at a time".into(),
                ))
            }
            other => {
                self.extra.insert(other.to_string(), value);
            }
        }
        Ok(())
    }

    /// All string-valued top-level fields, by wire name. `currentTime` and
    /// `properties` are not included.
    pub fn string_fields(&self) -> Vec<(String, String)> {
        let named = [
            ("userId", &self.user_id),
            ("sessionId", &self.session_id),
            ("remoteAddress", &self.remote_address),
            ("environment", &self.environment),
            ("appName", &self.app_name),
        ];
        named
            .into_iter()
            .filter_map(|(k, v)| v.as_ref().map(|v| (k.to_string(), v.clone())))
            .chain(self.extra.iter().map(|(k, v)| (k.clone(), v.clone())))
            .collect()
    }
}
