//! Automation trigger DTOs

use serde::{Deserialize, Deserializer, Serialize};

/// Request body of `POST /run-automation`
///
/// Fields are optional at the type level so that a missing field is reported
/// as a validation error rather than a deserialization failure. Values may be
/// sent as JSON strings or numbers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunAutomation {
    #[serde(default, deserialize_with = "string_or_number")]
    pub client_id: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub frequency: Option<String>,
    #[serde(
        default,
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub batch_id: Option<String>,
}

impl RunAutomation {
    pub fn new(client_id: impl Into<String>, frequency: impl Into<String>) -> Self {
        Self {
            client_id: Some(client_id.into()),
            frequency: Some(frequency.into()),
            batch_id: None,
        }
    }

    pub fn with_batch(mut self, batch_id: impl Into<String>) -> Self {
        self.batch_id = Some(batch_id.into());
        self
    }
}

/// Successful response of `POST /run-automation`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunAutomationResponse {
    pub status: String,
    pub deployment_name: String,
    /// Empty when the pod could not be resolved after the settle delay
    pub pod_name: String,
    pub pod_ip: String,
    /// VNC port inside the container
    pub vnc_port: u16,
    pub vnc_node_port: u16,
    pub web_node_port: u16,
}

/// Outcome of one request issued by a fan-out trigger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FanOutResult {
    pub payload: RunAutomation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<RunAutomationResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Str(s)) => Some(s),
        Some(Raw::Int(n)) => Some(n.to_string()),
        Some(Raw::Float(n)) => Some(n.to_string()),
        None => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_strings_and_numbers() {
        let req: RunAutomation =
            serde_json::from_str(r#"{"client_id": 9, "frequency": "15", "batch_id": 1}"#).unwrap();

        assert_eq!(req.client_id.as_deref(), Some("9"));
        assert_eq!(req.frequency.as_deref(), Some("15"));
        assert_eq!(req.batch_id.as_deref(), Some("1"));
    }

    #[test]
    fn test_missing_fields_are_none() {
        let req: RunAutomation = serde_json::from_str(r#"{"client_id": "9"}"#).unwrap();
        assert_eq!(req.frequency, None);
        assert_eq!(req.batch_id, None);

        let req: RunAutomation = serde_json::from_str(r#"{"frequency": null}"#).unwrap();
        assert_eq!(req, RunAutomation::default());
    }

    #[test]
    fn test_builder_serializes_without_batch() {
        let json = serde_json::to_value(RunAutomation::new("9", "15")).unwrap();
        assert_eq!(json, serde_json::json!({"client_id": "9", "frequency": "15"}));

        let json = serde_json::to_value(RunAutomation::new("9", "15").with_batch("1")).unwrap();
        assert_eq!(json["batch_id"], "1");
    }
}
