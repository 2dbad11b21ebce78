/// Contact reconciler: every public operation here is a short-lived saga
/// with at most two legs: the CRM leg and the local leg.
///
/// Ordering policy: the CRM leg runs first; the local leg always runs and is
/// never rolled back because the CRM leg failed. The local store is the
/// system of record for existence and search, so it must never be left
/// without a row merely because Pipedrive is degraded. The only always-fatal
/// path is the local commit in `create_contact`.
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::contacts::dto::{
    ContactOutcome, CreateContactRequest, NoteRequest, SearchOutcome, SearchSource,
    UpdateContactRequest,
};
use crate::contacts::store::ContactStore;
use crate::crm::CrmGateway;
use crate::errors::AppError;
use crate::models::contact::ContactPatch;

/// Outcome of one CRM leg. The reconciler inspects this value explicitly
/// instead of catching errors mid-flow; a `Failed` leg is logged and the
/// saga continues to the local leg.
#[derive(Debug)]
enum CrmLeg<T> {
    /// The CRM accepted the write.
    Synced(T),
    /// No credential configured; the client fabricated the result. Treated
    /// as success toward the caller, but mock ids are never persisted.
    Mock(T),
    /// The CRM call failed; carries the reason for the log trail.
    Failed(String),
    /// The contact has no CRM link, so no call was attempted.
    Skipped,
}

impl<T> CrmLeg<T> {
    fn synced(&self) -> bool {
        matches!(self, CrmLeg::Synced(_))
    }
}

fn person_url(external_id: i64) -> String {
    format!("https://app.pipedrive.com/person/{external_id}")
}

/// Local-leg failures after the CRM leg already ran surface as bad-gateway,
/// except unique violations which keep their conflict shape.
fn fatal_local(err: AppError) -> AppError {
    match err {
        AppError::Database(e) => AppError::Gateway(e.to_string()),
        other => other,
    }
}

/// Creates a contact locally and mirrors it into the CRM.
///
/// The duplicate pre-check is racy by design; the store's unique index is
/// the backstop and its violation still reads as a conflict.
pub async fn create_contact(
    store: &dyn ContactStore,
    crm: &dyn CrmGateway,
    req: &CreateContactRequest,
    correlation_id: &str,
) -> Result<ContactOutcome, AppError> {
    let name = req.name.trim();
    if name.chars().count() < 2 {
        return Err(AppError::Validation(
            "Name must be at least 2 characters".to_string(),
        ));
    }

    if let Some(email) = req.email.as_deref() {
        if let Some(existing) = store.get_by_email(email).await? {
            warn!("[{correlation_id}] Duplicate email {email} (contact {})", existing.id);
            return Err(AppError::Conflict(format!(
                "A contact with email {email} already exists. ID: {}",
                existing.id
            )));
        }
    }

    let crm_leg = match crm
        .create_person(name, req.email.as_deref(), req.phone.as_deref())
        .await
    {
        Ok(person) if crm.is_mock() => CrmLeg::Mock(person),
        Ok(person) => CrmLeg::Synced(person),
        Err(e) => {
            warn!("[{correlation_id}] CRM create failed, continuing local-only: {e}");
            CrmLeg::Failed(e.to_string())
        }
    };

    let external_id = match &crm_leg {
        CrmLeg::Synced(person) => Some(person.id),
        _ => None,
    };

    let contact = store
        .create(name, req.email.as_deref(), req.phone.as_deref(), external_id)
        .await
        .map_err(fatal_local)?;

    let message = match &crm_leg {
        CrmLeg::Synced(person) => format!(
            "Contact '{name}' created and synced to CRM (person {})",
            person.id
        ),
        CrmLeg::Mock(_) => format!("Contact '{name}' created (CRM in mock mode, stored locally only)"),
        CrmLeg::Failed(reason) => {
            format!("Contact '{name}' created locally only; CRM sync failed: {reason}")
        }
        CrmLeg::Skipped => format!("Contact '{name}' created locally only"),
    };

    info!("[{correlation_id}] Contact created: ID={}", contact.id);

    Ok(ContactOutcome {
        success: true,
        message,
        contact_id: Some(contact.id),
        external_id: contact.external_id,
        crm_synced: crm_leg.synced(),
        name: Some(contact.name),
        email: contact.email,
        phone: contact.phone,
        url: contact.external_id.map(person_url),
        correlation_id: correlation_id.to_string(),
    })
}

/// Adds a note to a contact. Notes live only in the CRM: without a CRM link
/// (or when the CRM write fails) the operation still succeeds with a
/// "local only" qualifier and the content is dropped.
pub async fn add_note(
    store: &dyn ContactStore,
    crm: &dyn CrmGateway,
    req: &NoteRequest,
    correlation_id: &str,
) -> Result<ContactOutcome, AppError> {
    let content = req.content.trim();
    if content.is_empty() {
        return Err(AppError::Validation(
            "Note content must not be empty".to_string(),
        ));
    }

    let contact = store
        .get_by_id(req.contact_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Contact {} not found", req.contact_id)))?;

    let crm_leg = match contact.external_id {
        None => CrmLeg::Skipped,
        Some(external_id) => match crm.add_note(external_id, content).await {
            Ok(note) if crm.is_mock() => CrmLeg::Mock(note),
            Ok(note) => CrmLeg::Synced(note),
            Err(e) => {
                warn!("[{correlation_id}] CRM note failed for contact {}: {e}", contact.id);
                CrmLeg::Failed(e.to_string())
            }
        },
    };

    let message = match &crm_leg {
        CrmLeg::Synced(note) => format!(
            "Note added to contact {} and synced to CRM (note {})",
            contact.id, note.id
        ),
        CrmLeg::Mock(_) => format!(
            "Note accepted for contact {} (CRM in mock mode, local only)",
            contact.id
        ),
        CrmLeg::Failed(reason) => format!(
            "Note accepted for contact {} (local only, CRM sync failed: {reason})",
            contact.id
        ),
        CrmLeg::Skipped => format!(
            "Note accepted for contact {} (local only, no CRM link)",
            contact.id
        ),
    };

    info!("[{correlation_id}] Note processed for contact {}", contact.id);

    Ok(ContactOutcome {
        success: true,
        message,
        contact_id: Some(contact.id),
        external_id: contact.external_id,
        crm_synced: crm_leg.synced(),
        name: Some(contact.name),
        email: contact.email,
        phone: contact.phone,
        url: contact.external_id.map(person_url),
        correlation_id: correlation_id.to_string(),
    })
}

/// Updates a contact. The CRM leg (when linked) runs first and its failure
/// is swallowed; the local leg always runs and its post-update row is the
/// authoritative response payload.
pub async fn update_contact(
    store: &dyn ContactStore,
    crm: &dyn CrmGateway,
    req: &UpdateContactRequest,
    correlation_id: &str,
) -> Result<ContactOutcome, AppError> {
    // Explicit columns win over the free-form map.
    let mut fields = req.fields.clone();
    if let Some(name) = &req.name {
        fields.insert("name".to_string(), Value::String(name.clone()));
    }
    if let Some(email) = &req.email {
        fields.insert("email".to_string(), Value::String(email.clone()));
    }
    if let Some(phone) = &req.phone {
        fields.insert("phone".to_string(), Value::String(phone.clone()));
    }

    if fields.is_empty() {
        return Err(AppError::Validation(
            "At least one field to update is required".to_string(),
        ));
    }

    let contact = store
        .get_by_id(req.contact_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Contact {} not found", req.contact_id)))?;

    let crm_leg = match contact.external_id {
        None => CrmLeg::Skipped,
        Some(external_id) => match crm.update_person(external_id, &fields).await {
            Ok(person) if crm.is_mock() => CrmLeg::Mock(person),
            Ok(person) => CrmLeg::Synced(person),
            Err(e) => {
                warn!("[{correlation_id}] CRM update failed for contact {}: {e}", contact.id);
                CrmLeg::Failed(e.to_string())
            }
        },
    };

    // Unknown keys are forwarded to the CRM above but ignored locally.
    let patch = ContactPatch {
        name: field_string(&fields, "name"),
        email: field_string(&fields, "email"),
        phone: field_string(&fields, "phone"),
        external_id: None,
    };

    let updated = store
        .update(contact.id, &patch)
        .await
        .map_err(fatal_local)?
        .ok_or_else(|| AppError::Gateway(format!("Contact {} vanished during update", contact.id)))?;

    let message = match &crm_leg {
        CrmLeg::Synced(_) => format!("Contact {} updated and synced to CRM", updated.id),
        CrmLeg::Mock(_) => format!("Contact {} updated (CRM in mock mode)", updated.id),
        CrmLeg::Failed(reason) => {
            format!("Contact {} updated locally; CRM sync failed: {reason}", updated.id)
        }
        CrmLeg::Skipped => format!("Contact {} updated locally (no CRM link)", updated.id),
    };

    info!("[{correlation_id}] Contact updated: ID={}", updated.id);

    Ok(ContactOutcome {
        success: true,
        message,
        contact_id: Some(updated.id),
        external_id: updated.external_id,
        crm_synced: crm_leg.synced(),
        name: Some(updated.name),
        email: updated.email,
        phone: updated.phone,
        url: updated.external_id.map(person_url),
        correlation_id: correlation_id.to_string(),
    })
}

fn field_string(fields: &Map<String, Value>, key: &str) -> Option<String> {
    fields.get(key).and_then(Value::as_str).map(String::from)
}

/// Searches for a contact: CRM by exact email, CRM by name, then the local
/// store by email, name substring, and phone. First hit wins; each result is
/// tagged with its origin.
pub async fn search_contact(
    store: &dyn ContactStore,
    crm: &dyn CrmGateway,
    query: &str,
    correlation_id: &str,
) -> Result<SearchOutcome, AppError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(AppError::Validation(
            "Search query must not be empty".to_string(),
        ));
    }

    let crm_hit = match crm.find_by_email(query).await {
        Some(person) => Some(person),
        None => crm.find_by_name(query).await,
    };

    if let Some(person) = crm_hit {
        // Cross-reference the local store; fall back to the external id
        // itself when no local row is linked yet.
        let local = store.get_by_external_id(person.id).await?;
        let (contact_id, name, email, phone) = match local {
            Some(row) => (row.id, row.name, row.email, row.phone),
            None => (person.id, person.name, person.email, person.phone),
        };

        info!("[{correlation_id}] Search '{query}' matched CRM person {}", person.id);

        return Ok(SearchOutcome {
            success: true,
            message: format!("Found '{name}' in Pipedrive"),
            contact_id: Some(contact_id),
            external_id: Some(person.id),
            name: Some(name),
            email,
            phone,
            source: SearchSource::Pipedrive,
            correlation_id: correlation_id.to_string(),
        });
    }

    let local = match store.get_by_email(query).await? {
        Some(row) => Some(row),
        None => match store.get_by_name(query).await? {
            Some(row) => Some(row),
            None => store.get_by_phone(query).await?,
        },
    };

    match local {
        Some(row) => {
            info!("[{correlation_id}] Search '{query}' matched local contact {}", row.id);
            Ok(SearchOutcome {
                success: true,
                message: format!("Found '{}' in local store", row.name),
                contact_id: Some(row.id),
                external_id: row.external_id,
                name: Some(row.name),
                email: row.email,
                phone: row.phone,
                source: SearchSource::Local,
                correlation_id: correlation_id.to_string(),
            })
        }
        None => Err(AppError::NotFound(format!("No contact matched '{query}'"))),
    }
}
