//! PII pre-screening gate
//!
//! Questions are screened with the Azure Language `PiiEntityRecognition`
//! API before they reach the orchestrator. Only banking-relevant categories
//! at or above the confidence threshold block a question, so company names
//! like "NVIDIA" or "IMF" pass. The gate fails open: a timeout or service
//! error lets the question through and is only logged.

use crate::config::PiiConfig;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

/// Categories that block a question
pub const BANKING_PII_CATEGORIES: &[&str] = &[
    "Person",
    "PersonType",
    "PhoneNumber",
    "Email",
    "Address",
    "USBankAccountNumber",
    "CreditCardNumber",
    "USSocialSecurityNumber",
    "USDriversLicenseNumber",
    "USPassportNumber",
    "USIndividualTaxpayerIdentification",
    "InternationalBankingAccountNumber",
    "SWIFTCode",
    "IPAddress",
];

const API_VERSION: &str = "2023-04-01";

/// Verdict for one piece of text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PiiCheck {
    pub blocked: bool,
    /// Distinct blocking categories in order of first detection
    pub categories: Vec<String>,
    /// Why the gate failed open, if it did
    pub error: Option<String>,
}

impl PiiCheck {
    pub fn clear() -> Self {
        Self::default()
    }

    fn failed_open(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Caller-facing warning naming what was detected
    pub fn warning(&self) -> String {
        format_warning(&self.categories)
    }
}

#[async_trait]
pub trait PiiGate: Send + Sync {
    async fn check(&self, text: &str) -> PiiCheck;
}

/// Gate that lets everything through (screening disabled)
pub struct NoopGate;

#[async_trait]
impl PiiGate for NoopGate {
    async fn check(&self, _text: &str) -> PiiCheck {
        PiiCheck::clear()
    }
}

/// Azure Language (or PII container) client
pub struct HttpPiiGate {
    endpoint: String,
    confidence_threshold: f64,
    timeout: Duration,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct AnalyzeResponse {
    kind: String,
    results: AnalyzeResults,
}

#[derive(Debug, Deserialize)]
struct AnalyzeResults {
    #[serde(default)]
    documents: Vec<AnalyzedDocument>,
}

#[derive(Debug, Deserialize)]
struct AnalyzedDocument {
    #[serde(default)]
    entities: Vec<PiiEntity>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PiiEntity {
    category: String,
    confidence_score: f64,
}

impl HttpPiiGate {
    pub fn new(endpoint: impl Into<String>, confidence_threshold: f64, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            confidence_threshold,
            timeout,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &PiiConfig) -> Self {
        Self::new(
            &config.endpoint,
            config.confidence_threshold,
            Duration::from_millis(config.timeout_ms),
        )
    }

    async fn analyze(&self, text: &str) -> Result<Vec<PiiEntity>, String> {
        let url = format!(
            "{}/language/:analyze-text?api-version={}",
            self.endpoint, API_VERSION
        );
        let body = json!({
            "kind": "PiiEntityRecognition",
            "analysisInput": {
                "documents": [{"id": "1", "language": "en", "text": text}]
            },
            "parameters": {"modelVersion": "latest"}
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("PII service unavailable: {}", e))?;

        if !response.status().is_success() {
            return Err(format!("PII check failed: {}", response.status()));
        }

        let parsed: AnalyzeResponse = response
            .json()
            .await
            .map_err(|e| format!("Unexpected PII response: {}", e))?;
        if parsed.kind != "PiiEntityRecognitionResults" {
            return Err(format!("Unexpected PII response kind: {}", parsed.kind));
        }

        Ok(parsed
            .results
            .documents
            .into_iter()
            .next()
            .map(|doc| doc.entities)
            .unwrap_or_default())
    }
}

#[async_trait]
impl PiiGate for HttpPiiGate {
    async fn check(&self, text: &str) -> PiiCheck {
        if text.trim().is_empty() {
            return PiiCheck::clear();
        }

        let entities = match tokio::time::timeout(self.timeout, self.analyze(text)).await {
            Ok(Ok(entities)) => entities,
            Ok(Err(e)) => {
                tracing::warn!("PII gate failing open: {}", e);
                return PiiCheck::failed_open(e);
            }
            Err(_) => {
                tracing::warn!("PII gate timed out, failing open");
                return PiiCheck::failed_open("PII check timed out");
            }
        };

        let mut categories: Vec<String> = Vec::new();
        for entity in entities {
            if entity.confidence_score >= self.confidence_threshold
                && BANKING_PII_CATEGORIES.contains(&entity.category.as_str())
                && !categories.contains(&entity.category)
            {
                categories.push(entity.category);
            }
        }

        if !categories.is_empty() {
            tracing::info!(?categories, "Question blocked by PII gate");
        }
        PiiCheck {
            blocked: !categories.is_empty(),
            categories,
            error: None,
        }
    }
}

fn display_name(category: &str) -> String {
    match category {
        "Person" => "personal name",
        "PersonType" => "personal",
        "PhoneNumber" => "phone number",
        "Email" => "email address",
        "Address" => "address",
        "USBankAccountNumber" => "bank account number",
        "CreditCardNumber" => "credit card",
        "USSocialSecurityNumber" => "Social Security Number",
        "USDriversLicenseNumber" => "driver's license",
        "USPassportNumber" => "passport number",
        "USIndividualTaxpayerIdentification" => "tax ID",
        "InternationalBankingAccountNumber" => "IBAN",
        "SWIFTCode" => "SWIFT code",
        "IPAddress" => "IP address",
        other => return other.to_lowercase(),
    }
    .to_string()
}

/// "Your message contains a, b and c information which cannot be processed for security reasons."
pub fn format_warning(categories: &[String]) -> String {
    let mut names: Vec<String> = Vec::new();
    for category in categories {
        let name = display_name(category);
        if !names.contains(&name) {
            names.push(name);
        }
    }

    match names.as_slice() {
        [] => "Your message contains sensitive information that cannot be processed.".to_string(),
        [only] => format!(
            "Your message contains {} information which cannot be processed for security reasons.",
            only
        ),
        [rest @ .., last] => format!(
            "Your message contains {} and {} information which cannot be processed for security reasons.",
            rest.join(", "),
            last
        ),
    }
}
