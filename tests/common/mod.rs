// Common test utilities and helpers for all test modules

use camp_registration::api::{
    AppState, FullRecordStore, ReceiptStore, RegistrationStore,
};
use camp_registration::auth::AdminGate;
use camp_registration::config::Config;
use camp_registration::core::errors::AppError;
use camp_registration::core::models::{FullRegistration, PaymentStatus, Registration};
use camp_registration::core::receipt::ReceiptBlob;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub const TEST_ADMIN_KEY: &str = "test-admin-key";

/// Mock RegistrationStore backed by an in-memory map with failure toggles
pub struct MockRegistrationStore {
    pub records: Mutex<HashMap<String, Registration>>,
    pub index: Mutex<Vec<String>>,
    pub create_should_fail: bool,
    pub get_should_fail: bool,
    pub list_should_fail: bool,
    pub update_should_fail: bool,
    pub set_receipt_ref_should_fail: bool,
    pub ping_should_fail: bool,
}

impl Default for MockRegistrationStore {
    fn default() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            index: Mutex::new(Vec::new()),
            create_should_fail: false,
            get_should_fail: false,
            list_should_fail: false,
            update_should_fail: false,
            set_receipt_ref_should_fail: false,
            ping_should_fail: false,
        }
    }
}

impl MockRegistrationStore {
    /// Seed a record directly, bypassing the create path.
    pub fn seed(&self, registration: Registration) {
        self.index.lock().unwrap().push(registration.id.clone());
        self.records
            .lock()
            .unwrap()
            .insert(registration.id.clone(), registration);
    }
}

#[async_trait::async_trait]
impl RegistrationStore for MockRegistrationStore {
    async fn create(&self, registration: &Registration) -> Result<(), AppError> {
        if self.create_should_fail {
            return Err(AppError::Storage("Redis connection failed".to_string()));
        }
        self.index.lock().unwrap().push(registration.id.clone());
        self.records
            .lock()
            .unwrap()
            .insert(registration.id.clone(), registration.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Registration>, AppError> {
        if self.get_should_fail {
            return Err(AppError::Storage("Redis connection failed".to_string()));
        }
        Ok(self.records.lock().unwrap().get(id).cloned().map(|mut reg| {
            reg.resolve_receipt_indirection();
            reg
        }))
    }

    async fn list_all(&self) -> Result<Vec<Registration>, AppError> {
        if self.list_should_fail {
            return Err(AppError::Storage("Redis connection failed".to_string()));
        }
        let records = self.records.lock().unwrap();
        let mut registrations: Vec<Registration> = self
            .index
            .lock()
            .unwrap()
            .iter()
            .filter_map(|id| records.get(id).cloned())
            .map(|mut reg| {
                reg.resolve_receipt_indirection();
                reg
            })
            .collect();
        registrations.sort_by_key(|reg| std::cmp::Reverse(reg.created_at_millis()));
        Ok(registrations)
    }

    async fn update_status(&self, id: &str, status: PaymentStatus) -> bool {
        if self.update_should_fail {
            return false;
        }
        if let Some(reg) = self.records.lock().unwrap().get_mut(id) {
            reg.payment_status = status;
        }
        true
    }

    async fn set_receipt_ref(&self, id: &str, receipt_url: &str) -> Result<(), AppError> {
        if self.set_receipt_ref_should_fail {
            return Err(AppError::Storage("Redis connection failed".to_string()));
        }
        if let Some(reg) = self.records.lock().unwrap().get_mut(id) {
            reg.receipt_url = Some(receipt_url.to_string());
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), AppError> {
        if self.ping_should_fail {
            return Err(AppError::Storage("Redis connection failed".to_string()));
        }
        Ok(())
    }
}

/// Mock FullRecordStore implementation
pub struct MockFullRecordStore {
    pub records: Mutex<HashMap<String, FullRegistration>>,
    pub put_should_fail: bool,
    pub get_should_fail: bool,
}

impl Default for MockFullRecordStore {
    fn default() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            put_should_fail: false,
            get_should_fail: false,
        }
    }
}

impl MockFullRecordStore {
    pub fn seed(&self, record: FullRegistration) {
        self.records
            .lock()
            .unwrap()
            .insert(record.id.clone(), record);
    }
}

#[async_trait::async_trait]
impl FullRecordStore for MockFullRecordStore {
    async fn put(&self, record: &FullRegistration) -> Result<(), AppError> {
        if self.put_should_fail {
            return Err(AppError::Storage("Redis connection failed".to_string()));
        }
        self.records
            .lock()
            .unwrap()
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<FullRegistration>, AppError> {
        if self.get_should_fail {
            return Err(AppError::Storage("Redis connection failed".to_string()));
        }
        Ok(self.records.lock().unwrap().get(id).cloned())
    }
}

/// Mock ReceiptStore implementation
pub struct MockReceiptStore {
    pub blobs: Mutex<HashMap<String, ReceiptBlob>>,
    pub put_should_fail: bool,
    pub get_should_fail: bool,
}

impl Default for MockReceiptStore {
    fn default() -> Self {
        Self {
            blobs: Mutex::new(HashMap::new()),
            put_should_fail: false,
            get_should_fail: false,
        }
    }
}

#[async_trait::async_trait]
impl ReceiptStore for MockReceiptStore {
    async fn put(&self, id: &str, blob: &ReceiptBlob) -> Result<(), AppError> {
        if self.put_should_fail {
            return Err(AppError::Storage("Redis connection failed".to_string()));
        }
        self.blobs.lock().unwrap().insert(id.to_string(), blob.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<ReceiptBlob>, AppError> {
        if self.get_should_fail {
            return Err(AppError::Storage("Redis connection failed".to_string()));
        }
        Ok(self.blobs.lock().unwrap().get(id).cloned())
    }
}

/// Create a test AppState with the given mocks and admin secret
pub fn create_test_app_state(
    registrations: Arc<MockRegistrationStore>,
    full_records: Arc<MockFullRecordStore>,
    receipts: Arc<MockReceiptStore>,
    admin_key: Option<&str>,
) -> AppState {
    AppState {
        registrations,
        full_records,
        receipts,
        admin_gate: Arc::new(AdminGate::new(admin_key.map(|k| k.to_string()))),
        config: Arc::new(Config::test_config()),
    }
}

/// AppState with default mocks and the standard test admin key
pub fn default_test_app_state() -> (
    Arc<MockRegistrationStore>,
    Arc<MockFullRecordStore>,
    Arc<MockReceiptStore>,
    AppState,
) {
    let registrations = Arc::new(MockRegistrationStore::default());
    let full_records = Arc::new(MockFullRecordStore::default());
    let receipts = Arc::new(MockReceiptStore::default());
    let state = create_test_app_state(
        registrations.clone(),
        full_records.clone(),
        receipts.clone(),
        Some(TEST_ADMIN_KEY),
    );
    (registrations, full_records, receipts, state)
}

/// Create a test summary record
pub fn sample_registration(id: &str, name: &str, created_at: &str) -> Registration {
    Registration {
        id: id.to_string(),
        name: name.to_string(),
        phone: "(11) 99999-0000".to_string(),
        age: Some("15".to_string()),
        church: None,
        city: Some("Campinas".to_string()),
        wants_shirt: "false".to_string(),
        shirt_size: None,
        payment_status: PaymentStatus::Pending,
        receipt_url: None,
        created_at: created_at.to_string(),
    }
}

/// Create a test full record
pub fn sample_full_registration(id: &str, name: &str) -> FullRegistration {
    use camp_registration::core::models::SubmitRegistration;

    FullRegistration {
        form: SubmitRegistration {
            nome_acampante: name.to_string(),
            celular_responsavel_legal: "(11) 99999-0000".to_string(),
            cidade_responsavel: "Campinas".to_string(),
            idade_acampante: "15".to_string(),
            quero_camisa: false,
            ..Default::default()
        },
        valor_inscricao: 150,
        valor_camisa: 0,
        valor_total: 150,
        data_inscricao: "2025-12-20T10:00:00.000Z".to_string(),
        id: id.to_string(),
    }
}

/// Minimal submission payload, the shape the registration form posts
pub fn sample_submission_json(name: &str, wants_shirt: bool) -> serde_json::Value {
    serde_json::json!({
        "nomeResponsavel": "Carlos",
        "sobrenomeResponsavel": "Silva",
        "cpfResponsavel": "123.456.789-00",
        "dataNascimentoResponsavel": "1980-03-05",
        "generoResponsavel": "M",
        "cepResponsavel": "13000-000",
        "numeroResponsavel": "42",
        "cidadeResponsavel": "Campinas",
        "estadoResponsavel": "SP",
        "celularResponsavel": "(11) 98888-0000",
        "emailResponsavel": "carlos@example.com",
        "nomeAcampante": name,
        "generoAcampante": "F",
        "idadeAcampante": "15",
        "dataNascimentoAcampante": "2010-07-01",
        "nomeResponsavelLegal": "Carlos Silva",
        "celularResponsavelLegal": "(11) 99999-0000",
        "observacoes": "",
        "queroCamisa": wants_shirt,
        "tamanhoCamisa": if wants_shirt { serde_json::json!("M") } else { serde_json::Value::Null },
    })
}

/// Build a multipart/form-data body for the receipt upload endpoint.
/// Returns the content-type header value and the body bytes.
pub fn multipart_receipt_body(
    inscricao_id: &str,
    filename: &str,
    content_type: &str,
    bytes: &[u8],
) -> (String, Vec<u8>) {
    let boundary = "test-boundary-7MA4YWxkTrZu0gW";
    let mut body = Vec::new();

    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(
        b"Content-Disposition: form-data; name=\"inscricaoId\"\r\n\r\n",
    );
    body.extend_from_slice(inscricao_id.as_bytes());
    body.extend_from_slice(b"\r\n");

    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"comprovante\"; filename=\"{}\"\r\n",
            filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(bytes);
    body.extend_from_slice(b"\r\n");

    body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());

    (
        format!("multipart/form-data; boundary={}", boundary),
        body,
    )
}
