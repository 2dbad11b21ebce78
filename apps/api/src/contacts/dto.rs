use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct CreateContactRequest {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NoteRequest {
    pub contact_id: i64,
    pub content: String,
}

/// Update payload. `name`/`email`/`phone` are the explicit columns; `fields`
/// accepts arbitrary extra keys which are forwarded to the CRM but ignored by
/// the local store.
#[derive(Debug, Deserialize)]
pub struct UpdateContactRequest {
    pub contact_id: i64,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

/// Uniform outcome for the mutating contact operations. `crm_synced` states
/// explicitly whether the CRM mirror write landed; the message only narrates.
#[derive(Debug, Serialize)]
pub struct ContactOutcome {
    pub success: bool,
    pub message: String,
    pub contact_id: Option<i64>,
    pub external_id: Option<i64>,
    pub crm_synced: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub correlation_id: String,
}

/// Which store produced a search hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchSource {
    Pipedrive,
    Local,
}

#[derive(Debug, Serialize)]
pub struct SearchOutcome {
    pub success: bool,
    pub message: String,
    pub contact_id: Option<i64>,
    pub external_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub source: SearchSource,
    pub correlation_id: String,
}
