// Registration records and their storage encodings

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Internal indirection scheme for receipts held in the key-value store.
///
/// A summary record never stores the blob's physical location; it stores
/// this token, which readers rewrite to the fetch route. The blob can move
/// without touching any record.
pub const RECEIPT_INDIRECTION_PREFIX: &str = "kv://receipt/";

/// Build the indirection token stored in `receiptUrl` after an upload.
pub fn receipt_indirection_token(id: &str) -> String {
    format!("{}{}", RECEIPT_INDIRECTION_PREFIX, id)
}

/// Payment review state, driven exclusively by explicit admin action.
///
/// All three states are mutually reachable (approved can go back to
/// pending); none is terminal. Initial state is always `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Approved => "approved",
            PaymentStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "approved" => Ok(PaymentStatus::Approved),
            "rejected" => Ok(PaymentStatus::Rejected),
            _ => Err(()),
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Shirt sizes offered on the registration form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShirtSize {
    PP,
    P,
    M,
    G,
    GG,
    XG,
}

impl ShirtSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShirtSize::PP => "PP",
            ShirtSize::P => "P",
            ShirtSize::M => "M",
            ShirtSize::G => "G",
            ShirtSize::GG => "GG",
            ShirtSize::XG => "XG",
        }
    }
}

impl FromStr for ShirtSize {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PP" => Ok(ShirtSize::PP),
            "P" => Ok(ShirtSize::P),
            "M" => Ok(ShirtSize::M),
            "G" => Ok(ShirtSize::G),
            "GG" => Ok(ShirtSize::GG),
            "XG" => Ok(ShirtSize::XG),
            _ => Err(()),
        }
    }
}

/// Summary record: the canonical view for admin operations.
///
/// Stored as a hash at `camp:reg:{id}`; a lossy projection of the full
/// registration. `wants_shirt` keeps the literal `"true"`/`"false"` string
/// encoding the dashboard filters on; any other stored value reads as
/// `"false"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub id: String,
    pub name: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub church: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    pub wants_shirt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shirt_size: Option<ShirtSize>,
    pub payment_status: PaymentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt_url: Option<String>,
    pub created_at: String,
}

impl Registration {
    /// Project the admin summary out of a freshly submitted registration.
    pub fn summary_of(full: &FullRegistration) -> Self {
        Registration {
            id: full.id.clone(),
            name: full.form.nome_acampante.clone(),
            phone: full.form.celular_responsavel_legal.clone(),
            age: none_if_empty(&full.form.idade_acampante),
            church: None, // not collected on the current form
            city: none_if_empty(&full.form.cidade_responsavel),
            wants_shirt: (if full.form.quero_camisa { "true" } else { "false" }).to_string(),
            shirt_size: if full.form.quero_camisa {
                full.form
                    .tamanho_camisa
                    .as_deref()
                    .and_then(|s| ShirtSize::from_str(s).ok())
            } else {
                None
            },
            payment_status: PaymentStatus::Pending,
            receipt_url: None,
            created_at: full.data_inscricao.clone(),
        }
    }

    /// Decode a record from its stored hash fields.
    ///
    /// Returns `None` when the hash is missing or empty (no such record).
    /// Tolerant of partial or legacy data: unknown statuses read as
    /// pending, a `wantsShirt` value other than `"true"` reads as
    /// `"false"`, unknown shirt sizes are dropped.
    pub fn from_hash(id: &str, fields: &HashMap<String, String>) -> Option<Self> {
        if fields.is_empty() {
            return None;
        }

        let wants_shirt = match fields.get("wantsShirt").map(String::as_str) {
            Some("true") => "true",
            _ => "false",
        };

        Some(Registration {
            id: id.to_string(),
            name: fields.get("name").cloned().unwrap_or_default(),
            phone: fields.get("phone").cloned().unwrap_or_default(),
            age: fields.get("age").and_then(|v| none_if_empty(v)),
            church: fields.get("church").and_then(|v| none_if_empty(v)),
            city: fields.get("city").and_then(|v| none_if_empty(v)),
            wants_shirt: wants_shirt.to_string(),
            shirt_size: fields
                .get("shirtSize")
                .and_then(|s| ShirtSize::from_str(s).ok()),
            payment_status: fields
                .get("paymentStatus")
                .and_then(|s| PaymentStatus::from_str(s).ok())
                .unwrap_or_default(),
            receipt_url: fields.get("receiptUrl").and_then(|v| none_if_empty(v)),
            created_at: fields.get("createdAt").cloned().unwrap_or_default(),
        })
    }

    /// Encode the record as hash fields for storage.
    ///
    /// Absent optional fields are written as empty strings so the stored
    /// field set is uniform across records.
    pub fn to_hash(&self) -> Vec<(&'static str, String)> {
        vec![
            ("name", self.name.clone()),
            ("phone", self.phone.clone()),
            ("age", self.age.clone().unwrap_or_default()),
            ("church", self.church.clone().unwrap_or_default()),
            ("city", self.city.clone().unwrap_or_default()),
            ("wantsShirt", self.wants_shirt.clone()),
            (
                "shirtSize",
                self.shirt_size.map(|s| s.as_str().to_string()).unwrap_or_default(),
            ),
            ("paymentStatus", self.payment_status.as_str().to_string()),
            ("receiptUrl", self.receipt_url.clone().unwrap_or_default()),
            ("createdAt", self.created_at.clone()),
        ]
    }

    /// Creation time as epoch milliseconds, used as the index score and
    /// the listing sort key. Unparseable timestamps sort last (0).
    pub fn created_at_millis(&self) -> i64 {
        DateTime::parse_from_rfc3339(&self.created_at)
            .map(|dt| dt.timestamp_millis())
            .unwrap_or(0)
    }

    /// Rewrite an internal `kv://receipt/{id}` reference into the fetch
    /// route a client can actually request. External URLs pass through.
    pub fn resolve_receipt_indirection(&mut self) {
        if let Some(url) = &self.receipt_url {
            if url.starts_with(RECEIPT_INDIRECTION_PREFIX) {
                self.receipt_url = Some(format!("/api/receipt/{}", self.id));
            }
        }
    }
}

fn none_if_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// The registration form payload as submitted by the client.
///
/// Nothing here is enforced at the storage layer; the front-end validates
/// required fields and the server stores what it receives. Money fields
/// are deliberately absent: the server computes them (see `pricing`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRegistration {
    // Responsible party
    #[serde(default)]
    pub nome_responsavel: String,
    #[serde(default)]
    pub sobrenome_responsavel: String,
    #[serde(default)]
    pub cpf_responsavel: String,
    #[serde(default)]
    pub data_nascimento_responsavel: String,
    #[serde(default)]
    pub genero_responsavel: String,
    #[serde(default)]
    pub cep_responsavel: String,
    #[serde(default)]
    pub numero_responsavel: String,
    #[serde(default)]
    pub cidade_responsavel: String,
    #[serde(default)]
    pub estado_responsavel: String,
    #[serde(default)]
    pub celular_responsavel: String,
    #[serde(default)]
    pub email_responsavel: String,

    // Camper
    #[serde(default)]
    pub nome_acampante: String,
    #[serde(default)]
    pub genero_acampante: String,
    #[serde(default)]
    pub idade_acampante: String,
    #[serde(default)]
    pub data_nascimento_acampante: String,
    #[serde(default)]
    pub nome_responsavel_legal: String,
    #[serde(default)]
    pub celular_responsavel_legal: String,
    #[serde(default)]
    pub observacoes: String,

    // Second camper (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nome_segundo_acampante: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genero_segundo_acampante: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idade_segundo_acampante: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_nascimento_segundo_acampante: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nome_responsavel_legal_segundo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub celular_responsavel_legal_segundo: Option<String>,

    // Shirt
    #[serde(default)]
    pub quero_camisa: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tamanho_camisa: Option<String>,
}

/// Full record: the submitted form plus server-assigned metadata and
/// computed money fields. Written once at submission, never mutated,
/// retained for a bounded period. System of record for the payment page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullRegistration {
    #[serde(flatten)]
    pub form: SubmitRegistration,

    pub valor_inscricao: u32,
    pub valor_camisa: u32,
    pub valor_total: u32,

    pub data_inscricao: String,
    pub id: String,
}

/// Mint a fresh registration id: `INS-{epoch_ms}-{9 alphanumeric}`.
///
/// The millisecond prefix plus random suffix makes collisions across the
/// lifetime of the system vanishingly unlikely; each submission gets a
/// fresh id (re-submission under an old id is not a supported flow).
pub fn new_registration_id(now: DateTime<Utc>) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(char::from)
        .collect::<String>()
        .to_lowercase();
    format!("INS-{}-{}", now.timestamp_millis(), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash_with(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_from_hash_empty_is_none() {
        assert!(Registration::from_hash("INS-1", &HashMap::new()).is_none());
    }

    #[test]
    fn test_from_hash_normalizes_wants_shirt() {
        let reg = Registration::from_hash(
            "INS-1",
            &hash_with(&[("name", "Ana"), ("wantsShirt", "yes")]),
        )
        .unwrap();
        assert_eq!(reg.wants_shirt, "false");

        let reg = Registration::from_hash(
            "INS-1",
            &hash_with(&[("name", "Ana"), ("wantsShirt", "true")]),
        )
        .unwrap();
        assert_eq!(reg.wants_shirt, "true");
    }

    #[test]
    fn test_from_hash_unknown_status_reads_pending() {
        let reg = Registration::from_hash(
            "INS-1",
            &hash_with(&[("name", "Ana"), ("paymentStatus", "refunded")]),
        )
        .unwrap();
        assert_eq!(reg.payment_status, PaymentStatus::Pending);
    }

    #[test]
    fn test_hash_roundtrip() {
        let reg = Registration {
            id: "INS-1700000000000-abc123def".to_string(),
            name: "João".to_string(),
            phone: "(11) 99999-0000".to_string(),
            age: Some("15".to_string()),
            church: None,
            city: Some("Campinas".to_string()),
            wants_shirt: "true".to_string(),
            shirt_size: Some(ShirtSize::M),
            payment_status: PaymentStatus::Approved,
            receipt_url: Some("kv://receipt/INS-1700000000000-abc123def".to_string()),
            created_at: "2025-12-20T10:00:00.000Z".to_string(),
        };

        let fields: HashMap<String, String> = reg
            .to_hash()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        let decoded = Registration::from_hash(&reg.id, &fields).unwrap();

        assert_eq!(decoded.name, reg.name);
        assert_eq!(decoded.shirt_size, Some(ShirtSize::M));
        assert_eq!(decoded.payment_status, PaymentStatus::Approved);
        assert_eq!(decoded.receipt_url, reg.receipt_url);
        assert_eq!(decoded.created_at, reg.created_at);
    }

    #[test]
    fn test_resolve_receipt_indirection() {
        let mut reg = Registration::from_hash(
            "INS-9",
            &hash_with(&[("name", "Ana"), ("receiptUrl", "kv://receipt/INS-9")]),
        )
        .unwrap();
        reg.resolve_receipt_indirection();
        assert_eq!(reg.receipt_url.as_deref(), Some("/api/receipt/INS-9"));

        // External URLs pass through untouched
        let mut reg = Registration::from_hash(
            "INS-9",
            &hash_with(&[("name", "Ana"), ("receiptUrl", "https://cdn.example/r.png")]),
        )
        .unwrap();
        reg.resolve_receipt_indirection();
        assert_eq!(reg.receipt_url.as_deref(), Some("https://cdn.example/r.png"));
    }

    #[test]
    fn test_created_at_millis() {
        let reg = Registration::from_hash(
            "INS-1",
            &hash_with(&[("name", "Ana"), ("createdAt", "2025-12-20T10:00:00.000Z")]),
        )
        .unwrap();
        assert_eq!(reg.created_at_millis(), 1766224800000);

        let reg = Registration::from_hash(
            "INS-1",
            &hash_with(&[("name", "Ana"), ("createdAt", "not-a-date")]),
        )
        .unwrap();
        assert_eq!(reg.created_at_millis(), 0);
    }

    #[test]
    fn test_registration_id_format() {
        let id = new_registration_id(Utc::now());
        assert!(id.starts_with("INS-"));
        let parts: Vec<&str> = id.splitn(3, '-').collect();
        assert_eq!(parts.len(), 3);
        assert!(parts[1].chars().all(|c| c.is_ascii_digit()));
        assert_eq!(parts[2].len(), 9);
    }

    #[test]
    fn test_summary_projection_shirt_fields() {
        let form = SubmitRegistration {
            nome_acampante: "Maria".to_string(),
            celular_responsavel_legal: "(11) 98888-7777".to_string(),
            cidade_responsavel: "São Paulo".to_string(),
            quero_camisa: true,
            tamanho_camisa: Some("GG".to_string()),
            ..Default::default()
        };
        let full = FullRegistration {
            form,
            valor_inscricao: 150,
            valor_camisa: 40,
            valor_total: 190,
            data_inscricao: "2025-12-20T10:00:00.000Z".to_string(),
            id: "INS-1-abcdefghi".to_string(),
        };

        let summary = Registration::summary_of(&full);
        assert_eq!(summary.name, "Maria");
        assert_eq!(summary.wants_shirt, "true");
        assert_eq!(summary.shirt_size, Some(ShirtSize::GG));
        assert_eq!(summary.payment_status, PaymentStatus::Pending);
        assert!(summary.receipt_url.is_none());
        assert_eq!(summary.created_at, full.data_inscricao);
    }

    #[test]
    fn test_full_record_wire_format_is_flat() {
        let full = FullRegistration {
            form: SubmitRegistration {
                nome_acampante: "Maria".to_string(),
                quero_camisa: false,
                ..Default::default()
            },
            valor_inscricao: 150,
            valor_camisa: 0,
            valor_total: 150,
            data_inscricao: "2025-12-20T10:00:00.000Z".to_string(),
            id: "INS-1-abcdefghi".to_string(),
        };

        let value = serde_json::to_value(&full).unwrap();
        // Flattened: form fields sit beside metadata at the top level
        assert_eq!(value["nomeAcampante"], "Maria");
        assert_eq!(value["queroCamisa"], false);
        assert_eq!(value["valorTotal"], 150);
        assert_eq!(value["id"], "INS-1-abcdefghi");
    }
}
