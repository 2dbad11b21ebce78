/// CRM client, the single point of entry for all Pipedrive calls.
///
/// ARCHITECTURAL RULE: No other module may call the Pipedrive API directly.
/// All CRM interactions MUST go through this module.
///
/// Without a configured API token the client runs in mock mode: every
/// operation short-circuits with deterministic fake data and no network
/// call. Mock mode is a degraded operating mode, never a failure.
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, warn};

/// Outbound calls are bounded so a saga can never block on Pipedrive.
const REQUEST_TIMEOUT_SECS: u64 = 10;
/// Mock ids live in 1..=100_000 so they are visibly fake yet well-formed.
const MOCK_ID_RANGE: u64 = 100_000;

#[derive(Debug, Error)]
pub enum CrmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("CRM returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("CRM rejected the request: {0}")]
    Api(String),
}

/// A person record as Pipedrive reports it back to us.
#[derive(Debug, Clone)]
pub struct ExternalPerson {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// A note attached to a Pipedrive person. Notes have no local persistence;
/// this value exists only as the result of a CRM write.
#[derive(Debug, Clone)]
pub struct ExternalNote {
    pub id: i64,
    pub person_id: i64,
    pub content: String,
}

/// Every Pipedrive response is wrapped in this envelope. `success: false` is
/// an application-level failure even on HTTP 200.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    data: Option<T>,
    error: Option<String>,
}

impl<T> Envelope<T> {
    fn into_data(self) -> Result<T, CrmError> {
        if !self.success {
            return Err(CrmError::Api(
                self.error.unwrap_or_else(|| "unknown CRM error".to_string()),
            ));
        }
        self.data
            .ok_or_else(|| CrmError::Api("CRM response missing data".to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct CreatedRecord {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct SearchData {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    item: SearchPerson,
}

/// Search results report emails and phones as lists of `{value}` objects.
#[derive(Debug, Deserialize)]
struct SearchPerson {
    id: i64,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Vec<ValueField>,
    #[serde(default)]
    phone: Vec<ValueField>,
}

#[derive(Debug, Deserialize)]
struct ValueField {
    value: String,
}

impl SearchPerson {
    fn into_person(self) -> ExternalPerson {
        ExternalPerson {
            id: self.id,
            name: self.name.unwrap_or_default(),
            email: self.email.into_iter().next().map(|e| e.value),
            phone: self.phone.into_iter().next().map(|p| p.value),
        }
    }
}

/// The CRM gateway seam. `AppState` carries this as `Arc<dyn CrmGateway>` so
/// the reconciler can be exercised against scripted CRM behavior.
#[async_trait]
pub trait CrmGateway: Send + Sync {
    async fn create_person(
        &self,
        name: &str,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<ExternalPerson, CrmError>;

    /// Advisory lookup: degrades to `None` on any failure.
    async fn find_by_email(&self, email: &str) -> Option<ExternalPerson>;

    /// Advisory lookup: first search hit, `None` on any failure.
    async fn find_by_name(&self, name: &str) -> Option<ExternalPerson>;

    async fn add_note(&self, external_id: i64, content: &str) -> Result<ExternalNote, CrmError>;

    async fn update_person(
        &self,
        external_id: i64,
        fields: &Map<String, Value>,
    ) -> Result<ExternalPerson, CrmError>;

    /// True when no credential is configured and results are fabricated.
    fn is_mock(&self) -> bool;
}

/// Reduces a seed string to a stable fake id. Reproducible across runs and
/// platforms, unlike a language-default hasher.
pub fn mock_external_id(seed: &str) -> i64 {
    let digest = Sha256::digest(seed.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(prefix) % MOCK_ID_RANGE) as i64 + 1
}

/// The Pipedrive-backed implementation of `CrmGateway`.
#[derive(Clone)]
pub struct PipedriveClient {
    client: Client,
    base_url: String,
    api_token: Option<String>,
}

impl PipedriveClient {
    pub fn new(base_url: String, api_token: Option<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .expect("Failed to build HTTP client"),
            base_url,
            api_token,
        }
    }

    async fn search(&self, term: &str) -> Result<Vec<SearchItem>, CrmError> {
        let token = self.api_token.as_deref().unwrap_or_default();
        let response = self
            .client
            .get(format!("{}/persons/search", self.base_url))
            .query(&[("term", term), ("api_token", token)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CrmError::Status {
                status: status.as_u16(),
                message: body,
            });
        }

        let envelope: Envelope<SearchData> = response.json().await?;
        Ok(envelope.into_data()?.items)
    }

    async fn post_envelope<T: serde::de::DeserializeOwned>(
        &self,
        url: String,
        payload: &Value,
    ) -> Result<T, CrmError> {
        let response = self.client.post(url).json(payload).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CrmError::Status {
                status: status.as_u16(),
                message: body,
            });
        }

        let envelope: Envelope<T> = response.json().await?;
        envelope.into_data()
    }
}

#[async_trait]
impl CrmGateway for PipedriveClient {
    async fn create_person(
        &self,
        name: &str,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<ExternalPerson, CrmError> {
        let Some(token) = self.api_token.as_deref() else {
            warn!("[mock] creating person '{name}' without CRM credentials");
            return Ok(ExternalPerson {
                id: mock_external_id(name),
                name: name.to_string(),
                email: email.map(String::from),
                phone: phone.map(String::from),
            });
        };

        let mut payload = json!({ "name": name, "api_token": token });
        if let Some(email) = email {
            payload["email"] = json!(email);
        }
        if let Some(phone) = phone {
            payload["phone"] = json!(phone);
        }

        let created: CreatedRecord = self
            .post_envelope(format!("{}/persons", self.base_url), &payload)
            .await?;

        debug!("Created Pipedrive person {}", created.id);

        Ok(ExternalPerson {
            id: created.id,
            name: name.to_string(),
            email: email.map(String::from),
            phone: phone.map(String::from),
        })
    }

    async fn find_by_email(&self, email: &str) -> Option<ExternalPerson> {
        if self.is_mock() {
            warn!("[mock] searching person by email '{email}'");
            return None;
        }

        match self.search(email).await {
            Ok(items) => items
                .into_iter()
                .map(|item| item.item)
                .find(|person| person.email.iter().any(|e| e.value == email))
                .map(SearchPerson::into_person),
            Err(e) => {
                warn!("CRM email lookup failed, treating as not found: {e}");
                None
            }
        }
    }

    async fn find_by_name(&self, name: &str) -> Option<ExternalPerson> {
        if self.is_mock() {
            warn!("[mock] searching person by name '{name}'");
            return None;
        }

        match self.search(name).await {
            Ok(items) => items
                .into_iter()
                .next()
                .map(|item| item.item.into_person()),
            Err(e) => {
                warn!("CRM name lookup failed, treating as not found: {e}");
                None
            }
        }
    }

    async fn add_note(&self, external_id: i64, content: &str) -> Result<ExternalNote, CrmError> {
        let Some(token) = self.api_token.as_deref() else {
            warn!("[mock] adding note to person {external_id} without CRM credentials");
            return Ok(ExternalNote {
                id: mock_external_id(content),
                person_id: external_id,
                content: content.to_string(),
            });
        };

        let payload = json!({
            "content": content,
            "person_id": external_id,
            "api_token": token,
        });

        let created: CreatedRecord = self
            .post_envelope(format!("{}/notes", self.base_url), &payload)
            .await?;

        debug!("Created Pipedrive note {} on person {external_id}", created.id);

        Ok(ExternalNote {
            id: created.id,
            person_id: external_id,
            content: content.to_string(),
        })
    }

    async fn update_person(
        &self,
        external_id: i64,
        fields: &Map<String, Value>,
    ) -> Result<ExternalPerson, CrmError> {
        let Some(token) = self.api_token.as_deref() else {
            warn!("[mock] updating person {external_id} without CRM credentials");
            return Ok(person_from_fields(external_id, fields));
        };

        let mut payload = fields.clone();
        payload.insert("api_token".to_string(), json!(token));

        let response = self
            .client
            .put(format!("{}/persons/{external_id}", self.base_url))
            .json(&Value::Object(payload))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CrmError::Status {
                status: status.as_u16(),
                message: body,
            });
        }

        let envelope: Envelope<CreatedRecord> = response.json().await?;
        let updated = envelope.into_data()?;

        debug!("Updated Pipedrive person {}", updated.id);

        Ok(person_from_fields(updated.id, fields))
    }

    fn is_mock(&self) -> bool {
        self.api_token.is_none()
    }
}

fn person_from_fields(id: i64, fields: &Map<String, Value>) -> ExternalPerson {
    let field_str = |key: &str| fields.get(key).and_then(Value::as_str).map(String::from);
    ExternalPerson {
        id,
        name: field_str("name").unwrap_or_default(),
        email: field_str("email"),
        phone: field_str("phone"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mock_client() -> PipedriveClient {
        PipedriveClient::new("https://api.pipedrive.com/v1".to_string(), None)
    }

    #[test]
    fn test_mock_id_is_deterministic() {
        assert_eq!(mock_external_id("Ana Ruiz"), mock_external_id("Ana Ruiz"));
        assert_ne!(mock_external_id("Ana Ruiz"), mock_external_id("Bob Stone"));
    }

    #[test]
    fn test_mock_id_is_bounded_and_positive() {
        for seed in ["", "a", "Ana Ruiz", "ana@x.com", "long seed with spaces"] {
            let id = mock_external_id(seed);
            assert!(id >= 1, "id for {seed:?} must be positive");
            assert!(id <= MOCK_ID_RANGE as i64, "id for {seed:?} must be bounded");
        }
    }

    #[tokio::test]
    async fn test_mock_create_person_returns_stable_fake() {
        let crm = mock_client();
        assert!(crm.is_mock());

        let first = crm
            .create_person("Ana Ruiz", Some("ana@x.com"), None)
            .await
            .unwrap();
        let second = crm
            .create_person("Ana Ruiz", Some("ana@x.com"), None)
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.name, "Ana Ruiz");
        assert_eq!(first.email.as_deref(), Some("ana@x.com"));
    }

    #[tokio::test]
    async fn test_mock_searches_return_none() {
        let crm = mock_client();
        assert!(crm.find_by_email("ana@x.com").await.is_none());
        assert!(crm.find_by_name("Ana Ruiz").await.is_none());
    }

    #[tokio::test]
    async fn test_mock_note_and_update_succeed() {
        let crm = mock_client();

        let note = crm.add_note(42, "Interested in the premium plan").await.unwrap();
        assert_eq!(note.person_id, 42);
        assert_eq!(note.content, "Interested in the premium plan");

        let mut fields = Map::new();
        fields.insert("phone".to_string(), json!("+1 555 0100"));
        let person = crm.update_person(42, &fields).await.unwrap();
        assert_eq!(person.id, 42);
        assert_eq!(person.phone.as_deref(), Some("+1 555 0100"));
    }

    #[test]
    fn test_envelope_success_false_is_api_error() {
        let envelope: Envelope<CreatedRecord> =
            serde_json::from_str(r#"{"success": false, "error": "token revoked"}"#).unwrap();
        match envelope.into_data() {
            Err(CrmError::Api(msg)) => assert_eq!(msg, "token revoked"),
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn test_envelope_success_unwraps_data() {
        let envelope: Envelope<CreatedRecord> =
            serde_json::from_str(r#"{"success": true, "data": {"id": 991}}"#).unwrap();
        assert_eq!(envelope.into_data().unwrap().id, 991);
    }

    #[test]
    fn test_search_person_email_list_parsing() {
        let data: SearchData = serde_json::from_str(
            r#"{
                "items": [
                    {"item": {"id": 5, "name": "Ana Ruiz",
                              "email": [{"value": "ana@x.com"}, {"value": "ana@work.com"}],
                              "phone": [{"value": "+57 300 123 4567"}]}}
                ]
            }"#,
        )
        .unwrap();

        let person = data
            .items
            .into_iter()
            .map(|item| item.item)
            .find(|p| p.email.iter().any(|e| e.value == "ana@work.com"))
            .map(SearchPerson::into_person)
            .expect("exact email value should match");

        assert_eq!(person.id, 5);
        assert_eq!(person.name, "Ana Ruiz");
        assert_eq!(person.phone.as_deref(), Some("+57 300 123 4567"));
    }

    #[test]
    fn test_search_person_tolerates_missing_fields() {
        let data: SearchData = serde_json::from_str(r#"{"items": [{"item": {"id": 9}}]}"#).unwrap();
        let person = data.items.into_iter().next().unwrap().item.into_person();
        assert_eq!(person.id, 9);
        assert!(person.email.is_none());
        assert!(person.phone.is_none());
    }
}
