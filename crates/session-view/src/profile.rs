use serde::{Deserialize, Serialize};

/// Profile returned by `/api/me`.
///
/// The gateway passes the resource API's JSON through untouched, so only the
/// fields used for display are typed; everything else lands in `extra`.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_principal_name: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Profile {
    /// Name for the greeting: display name, else mail, else principal name.
    /// Blank values are skipped.
    pub fn display_name(&self) -> Option<&str> {
        [&self.display_name, &self.mail, &self.user_principal_name]
            .into_iter()
            .filter_map(|v| v.as_deref())
            .map(str::trim)
            .find(|v| !v.is_empty())
    }
}
