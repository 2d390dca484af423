//! Client for the recognition API and local editing of its results.
//!
//! The API accepts a Base64 image plus a document-type hint and returns
//! detected fields with labels, values, confidences and bounding boxes.
//! There is no retry or backoff; failures come back as one translated
//! message for the UI to toast.

use crate::error::WorkspaceError;
use crate::types::{BoundingBox, DocumentStatus, OcrField, OcrResult};
use reqwest::blocking::Client;
use serde_json::{json, Value};
use std::time::Duration;

/// Document-type hints the recognition API understands.
pub const DOCUMENT_TYPES: &[&str] = &["invoice", "receipt", "contract", "form", "other"];

fn load_env() {
    let _ = dotenvy::dotenv();
}

pub struct OcrClient {
    endpoint: String,
    token: Option<String>,
    client: Client,
}

/// Raw recognition output, not yet attached to a document.
#[derive(Debug, Clone)]
pub struct Recognition {
    pub fields: Vec<OcrField>,
    pub overall_confidence: f64,
}

impl Recognition {
    /// Attach the recognition to a document as a completed result.
    pub fn into_result(self, document_id: &str) -> OcrResult {
        OcrResult {
            document_id: document_id.to_string(),
            overall_confidence: self.overall_confidence,
            fields: self.fields,
            processed_at: chrono::Utc::now(),
            status: DocumentStatus::Completed,
        }
    }
}

impl OcrClient {
    pub fn new(endpoint: impl Into<String>, token: Option<String>) -> Result<Self, WorkspaceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| WorkspaceError::Recognition(e.to_string()))?;
        Ok(OcrClient {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            token,
            client,
        })
    }

    pub fn from_env() -> Result<Self, WorkspaceError> {
        load_env();
        let endpoint =
            std::env::var("OCR_API_URL").map_err(|_| WorkspaceError::MissingConfig("OCR_API_URL"))?;
        let token = std::env::var("OCR_API_TOKEN").ok().filter(|t| !t.trim().is_empty());
        OcrClient::new(endpoint, token)
    }

    /// "configured" / "not_configured" for the settings screen.
    pub fn status() -> &'static str {
        load_env();
        match std::env::var("OCR_API_URL") {
            Ok(url) if !url.trim().is_empty() => "configured",
            _ => "not_configured",
        }
    }

    /// Run recognition over a Base64 image (a `data:` URL prefix is
    /// accepted and stripped). The payload is validated before anything
    /// goes on the wire.
    pub fn recognize(
        &self,
        image_base64: &str,
        document_type: &str,
        provider_id: Option<i64>,
    ) -> Result<Recognition, WorkspaceError> {
        let image = prepare_image_payload(image_base64)?;
        validate_document_type(document_type)?;

        let mut body = json!({
            "image_base64": image,
            "document_type": document_type,
        });
        if let Some(provider_id) = provider_id {
            body["provider_id"] = json!(provider_id);
        }

        let mut request = self
            .client
            .post(format!("{}/api/services/ocr/process", self.endpoint))
            .json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                WorkspaceError::Connection
            } else {
                WorkspaceError::Recognition("Network error.".to_string())
            }
        })?;

        let status = response.status();
        let payload: Value = response
            .json()
            .map_err(|e| WorkspaceError::Recognition(format!("Invalid JSON: {}", e)))?;
        if !status.is_success() || payload.get("success").and_then(|s| s.as_bool()) != Some(true) {
            let message = payload
                .get("error")
                .and_then(|e| e.as_str())
                .unwrap_or("Unknown error");
            return Err(WorkspaceError::Recognition(message.to_string()));
        }
        let data = payload
            .get("data")
            .ok_or_else(|| WorkspaceError::Recognition("No data in response".to_string()))?;
        let recognition = parse_recognition(data)?;
        validate_recognition(&recognition)?;
        Ok(recognition)
    }
}

/// Strip a `data:` URL prefix and check the payload decodes as Base64.
pub fn prepare_image_payload(image: &str) -> Result<String, WorkspaceError> {
    let trimmed = image.trim();
    if trimmed.is_empty() {
        return Err(WorkspaceError::validation("An image is required."));
    }
    let raw = if trimmed.starts_with("data:") {
        trimmed
            .split_once(',')
            .map(|(_, data)| data)
            .ok_or_else(|| WorkspaceError::validation("Malformed data URL."))?
    } else {
        trimmed
    };
    use base64::Engine;
    base64::engine::general_purpose::STANDARD
        .decode(raw)
        .map_err(|e| WorkspaceError::validation(format!("Invalid base64 image: {}", e)))?;
    Ok(raw.to_string())
}

pub fn validate_document_type(document_type: &str) -> Result<(), WorkspaceError> {
    if DOCUMENT_TYPES.contains(&document_type) {
        Ok(())
    } else {
        Err(WorkspaceError::validation(format!(
            "document_type must be one of: {}.",
            DOCUMENT_TYPES.join(", ")
        )))
    }
}

fn parse_bounding_box(value: Option<&Value>) -> BoundingBox {
    let get = |key: &str| {
        value
            .and_then(|b| b.get(key))
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0)
    };
    BoundingBox {
        x: get("x"),
        y: get("y"),
        width: get("width"),
        height: get("height"),
    }
}

/// Parse the `data` object of a recognition response. Field ids missing
/// from the payload are backfilled as `field-N` (1-based); a missing
/// overall confidence becomes the mean of the field confidences.
pub fn parse_recognition(data: &Value) -> Result<Recognition, WorkspaceError> {
    let raw_fields = data
        .get("fields")
        .and_then(|f| f.as_array())
        .ok_or_else(|| WorkspaceError::Recognition("No fields in response".to_string()))?;

    let mut fields = Vec::with_capacity(raw_fields.len());
    for (index, raw) in raw_fields.iter().enumerate() {
        let id = raw
            .get("id")
            .and_then(|v| v.as_str())
            .map(String::from)
            .unwrap_or_else(|| format!("field-{}", index + 1));
        let label = raw
            .get("label")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();
        let value = raw
            .get("value")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();
        let confidence = raw.get("confidence").and_then(|v| v.as_f64()).unwrap_or(0.0);
        let kind = raw
            .get("type")
            .and_then(|v| v.as_str())
            .and_then(|s| serde_json::from_value(json!(s)).ok());
        fields.push(OcrField {
            id,
            label,
            value,
            confidence,
            bounding_box: parse_bounding_box(raw.get("boundingBox")),
            is_edited: false,
            kind,
        });
    }

    let overall_confidence = match data.get("overallConfidence").and_then(|v| v.as_f64()) {
        Some(value) => value,
        None if fields.is_empty() => 0.0,
        None => fields.iter().map(|f| f.confidence).sum::<f64>() / fields.len() as f64,
    };

    Ok(Recognition {
        fields,
        overall_confidence,
    })
}

/// Reject results with out-of-range confidences or negative box geometry.
pub fn validate_recognition(recognition: &Recognition) -> Result<(), WorkspaceError> {
    if !(0.0..=1.0).contains(&recognition.overall_confidence) {
        return Err(WorkspaceError::Recognition(format!(
            "Overall confidence out of range: {}",
            recognition.overall_confidence
        )));
    }
    for field in &recognition.fields {
        if !(0.0..=1.0).contains(&field.confidence) {
            return Err(WorkspaceError::Recognition(format!(
                "Field {} confidence out of range: {}",
                field.id, field.confidence
            )));
        }
        let b = &field.bounding_box;
        if b.x < 0.0 || b.y < 0.0 || b.width < 0.0 || b.height < 0.0 {
            return Err(WorkspaceError::Recognition(format!(
                "Field {} has a negative bounding box component",
                field.id
            )));
        }
    }
    Ok(())
}

/// Local editing session over a recognition result. Value changes stay in
/// the editor until the caller persists the finished result; nothing is
/// autosaved.
#[derive(Debug, Clone)]
pub struct ResultEditor {
    result: OcrResult,
    dirty: bool,
}

impl ResultEditor {
    pub fn new(result: OcrResult) -> Self {
        ResultEditor {
            result,
            dirty: false,
        }
    }

    /// Change a field's value. Marks the field edited only when the value
    /// actually differs. Returns false for an unknown field id.
    pub fn edit_field(&mut self, field_id: &str, value: &str) -> bool {
        let Some(field) = self.result.fields.iter_mut().find(|f| f.id == field_id) else {
            return false;
        };
        if field.value != value {
            field.value = value.to_string();
            field.is_edited = true;
            self.dirty = true;
        }
        true
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn result(&self) -> &OcrResult {
        &self.result
    }

    /// Overlay rectangles for rendering over an image displayed at
    /// `displayed` size, given its `natural` pixel size.
    pub fn overlay_boxes(
        &self,
        natural: (f64, f64),
        displayed: (f64, f64),
    ) -> Vec<(String, BoundingBox)> {
        self.result
            .fields
            .iter()
            .map(|f| (f.id.clone(), f.bounding_box.scaled(natural, displayed)))
            .collect()
    }

    /// Finish the session, handing back the (possibly edited) result.
    pub fn into_result(self) -> OcrResult {
        self.result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_data(overall: Option<f64>) -> Value {
        let mut data = json!({
            "fields": [
                {
                    "label": "Invoice Number",
                    "value": "INV-123456",
                    "confidence": 0.95,
                    "boundingBox": {"x": 450.0, "y": 150.0, "width": 150.0, "height": 25.0}
                },
                {
                    "id": "field-total",
                    "label": "Total",
                    "value": "1280.00",
                    "confidence": 0.85,
                    "type": "number",
                    "boundingBox": {"x": 450.0, "y": 300.0, "width": 90.0, "height": 20.0}
                }
            ]
        });
        if let Some(overall) = overall {
            data["overallConfidence"] = json!(overall);
        }
        data
    }

    #[test]
    fn missing_field_ids_are_backfilled() {
        let recognition = parse_recognition(&sample_data(Some(0.9))).unwrap();
        assert_eq!(recognition.fields[0].id, "field-1");
        assert_eq!(recognition.fields[1].id, "field-total");
        assert_eq!(recognition.fields[1].kind, Some(crate::types::FieldKind::Number));
    }

    #[test]
    fn missing_overall_confidence_is_the_mean() {
        let recognition = parse_recognition(&sample_data(None)).unwrap();
        assert!((recognition.overall_confidence - 0.9).abs() < 1e-9);
        let empty = parse_recognition(&json!({"fields": []})).unwrap();
        assert_eq!(empty.overall_confidence, 0.0);
    }

    #[test]
    fn response_without_fields_is_an_error() {
        assert!(parse_recognition(&json!({})).is_err());
    }

    #[test]
    fn out_of_range_confidence_is_rejected() {
        let mut recognition = parse_recognition(&sample_data(Some(0.9))).unwrap();
        recognition.fields[0].confidence = 1.5;
        assert!(validate_recognition(&recognition).is_err());
        let mut negative = parse_recognition(&sample_data(Some(0.9))).unwrap();
        negative.fields[1].bounding_box.x = -4.0;
        assert!(validate_recognition(&negative).is_err());
    }

    #[test]
    fn data_url_prefix_is_stripped_and_payload_checked() {
        assert_eq!(
            prepare_image_payload("data:image/png;base64,aGVsbG8=").unwrap(),
            "aGVsbG8="
        );
        assert_eq!(prepare_image_payload("aGVsbG8=").unwrap(), "aGVsbG8=");
        assert!(prepare_image_payload("").is_err());
        assert!(prepare_image_payload("data:image/png;base64,!!!").is_err());
    }

    #[test]
    fn unknown_document_type_is_rejected() {
        assert!(validate_document_type("invoice").is_ok());
        assert!(validate_document_type("spreadsheet").is_err());
    }

    #[test]
    fn edits_stay_local_and_mark_fields() {
        let recognition = parse_recognition(&sample_data(Some(0.9))).unwrap();
        let mut editor = ResultEditor::new(recognition.into_result("doc-1"));
        assert!(!editor.is_dirty());
        assert!(editor.edit_field("field-1", "INV-999999"));
        assert!(editor.is_dirty());
        assert!(!editor.edit_field("missing", "x"));

        let result = editor.into_result();
        let edited = &result.fields[0];
        assert_eq!(edited.value, "INV-999999");
        assert!(edited.is_edited);
        assert!(!result.fields[1].is_edited);
    }

    #[test]
    fn editing_to_the_same_value_is_a_no_op() {
        let recognition = parse_recognition(&sample_data(Some(0.9))).unwrap();
        let mut editor = ResultEditor::new(recognition.into_result("doc-1"));
        assert!(editor.edit_field("field-total", "1280.00"));
        assert!(!editor.is_dirty());
    }

    #[test]
    fn overlay_boxes_scale_to_display_size() {
        let recognition = parse_recognition(&sample_data(Some(0.9))).unwrap();
        let editor = ResultEditor::new(recognition.into_result("doc-1"));
        let boxes = editor.overlay_boxes((900.0, 600.0), (450.0, 300.0));
        assert_eq!(boxes[0].1.x, 225.0);
        assert_eq!(boxes[0].1.height, 12.5);
    }
}
