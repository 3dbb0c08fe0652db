//! Contains the data models for API requests and responses.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

use crate::model::ListSummary;

/// Response of `GET /api/main`: the lists, or the error that prevented reading them.
#[derive(Serialize, Debug)]
pub struct MainInfoResponse {
    #[serde(rename = "userName")]
    pub user_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lists: Option<Vec<ListSummary>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Optional `list` query parameter; blank selects the default list.
#[derive(Deserialize, Debug, Default)]
pub struct ListParam {
    #[serde(default)]
    pub list: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct NewListParams {
    pub name: String,
}

#[derive(Deserialize, Debug)]
pub struct NewTaskParams {
    pub name: String,
    #[serde(default)]
    pub list: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct DoneParams {
    #[serde(deserialize_with = "lenient_bool")]
    pub done: bool,
    #[serde(default)]
    pub list: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct DeleteTaskParams {
    pub id: String,
    #[serde(default)]
    pub list: Option<String>,
}

/// Body of `PUT /api/lists/{id}`.
#[derive(Deserialize, Debug)]
pub struct RenameListRequest {
    #[serde(default)]
    pub name: Option<String>,
}

/// Body of `PUT /api/tasks/{id}`.
#[derive(Deserialize, Debug)]
pub struct UpdateTaskRequest {
    #[serde(default)]
    pub list: Option<String>,
    #[serde(default)]
    pub task: Option<String>,
}

/// Form posted to the login and registration endpoints.
#[derive(Deserialize)]
pub struct CredentialsForm {
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
}

/// Accepts `true/false`, `on/off`, `yes/no` and `1/0`, case-insensitively.
fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Ok(true),
        "false" | "off" | "no" | "0" => Ok(false),
        _ => Err(de::Error::invalid_value(
            de::Unexpected::Str(&raw),
            &"a boolean (true/false, on/off, yes/no, 1/0)",
        )),
    }
}

/// Represents a token request.
#[derive(Deserialize)]
pub struct AuthRequest {
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
}

/// Represents a token response.
#[derive(Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Query;
    use axum::http::Uri;

    fn done_of(query: &str) -> Option<bool> {
        let uri: Uri = format!("/api/tasks/done/t1?{query}").parse().unwrap();
        Query::<DoneParams>::try_from_uri(&uri)
            .ok()
            .map(|Query(params)| params.done)
    }

    #[test]
    fn done_accepts_common_boolean_spellings() {
        for raw in ["true", "TRUE", "on", "yes", "1"] {
            assert_eq!(done_of(&format!("done={raw}")), Some(true), "{raw}");
        }
        for raw in ["false", "Off", "no", "0"] {
            assert_eq!(done_of(&format!("done={raw}&list=work")), Some(false), "{raw}");
        }
        assert_eq!(done_of("done=maybe"), None);
        assert_eq!(done_of("list=work"), None);
    }
}
