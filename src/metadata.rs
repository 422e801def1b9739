use serde::Deserialize;
use serde_json::Value;

use crate::error::AoiError;
use crate::literal;
use crate::records::MetadataRecord;
use crate::time::validate_event_time;

/// The subset of `additional_metadata` that is carried into the met record.
#[derive(Debug, Default, Deserialize)]
struct AdditionalMetadata {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    eventtime: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    event_metadata: Option<Value>,
}

/// Folds the context's `additional_metadata` into `met`.
///
/// Absent, null and empty-string input leave `met` untouched. Text is decoded
/// with the loose literal grammar and must describe a mapping.
pub fn merge_additional_metadata(
    raw: Option<&Value>,
    mut met: MetadataRecord,
) -> Result<MetadataRecord, AoiError> {
    let decoded = match raw {
        None | Some(Value::Null) => return Ok(met),
        Some(Value::String(text)) if text.is_empty() => return Ok(met),
        Some(Value::String(text)) => {
            literal::parse(text).map_err(|err| AoiError::MetadataParse(err.to_string()))?
        }
        Some(other) => other.clone(),
    };
    if !decoded.is_object() {
        return Err(AoiError::MetadataParse(format!(
            "expected a mapping, found {decoded}"
        )));
    }
    let additional: AdditionalMetadata =
        serde_json::from_value(decoded).map_err(|err| AoiError::MetadataParse(err.to_string()))?;

    if let Some(username) = additional.username {
        met.username = Some(username);
    }
    if let Some(eventtime) = additional.eventtime {
        if let Some(eventtime) = validate_event_time(&eventtime)? {
            met.eventtime = Some(eventtime);
        }
    }
    if let Some(image_url) = additional.image_url {
        met.image_url = Some(image_url);
    }
    if let Some(event_metadata) = additional.event_metadata {
        met.event_metadata = Some(event_metadata);
    }
    Ok(met)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    #[test]
    fn empty_inputs_are_noops() {
        let met = MetadataRecord {
            username: Some("keep".to_string()),
            ..MetadataRecord::default()
        };
        for raw in [None, Some(json!(null)), Some(json!(""))] {
            let merged = merge_additional_metadata(raw.as_ref(), met.clone()).unwrap();
            assert_eq!(merged, met);
        }
    }

    #[test]
    fn username_key_is_copied() {
        let raw = json!({"username": "analyst", "user": "ignored"});
        let met = merge_additional_metadata(Some(&raw), MetadataRecord::default()).unwrap();
        assert_eq!(met.username.as_deref(), Some("analyst"));
    }

    #[test]
    fn python_literal_text() {
        let raw = json!("{'eventtime': '2021-03-01 10:00', 'event_metadata': {'label': 'AOI_x', 'mag': 6.1}}");
        let met = merge_additional_metadata(Some(&raw), MetadataRecord::default()).unwrap();
        assert_eq!(met.eventtime.as_deref(), Some("2021-03-01T10:00:00Z"));
        assert_eq!(met.event_metadata, Some(json!({"label": "AOI_x", "mag": 6.1})));
    }

    #[test]
    fn empty_eventtime_keeps_existing() {
        let met = MetadataRecord {
            eventtime: Some("2020-01-01T00:00:00Z".to_string()),
            ..MetadataRecord::default()
        };
        let raw = json!({"eventtime": ""});
        let merged = merge_additional_metadata(Some(&raw), met).unwrap();
        assert_eq!(merged.eventtime.as_deref(), Some("2020-01-01T00:00:00Z"));
    }

    #[test]
    fn undecodable_text_fails() {
        let raw = json!("{not metadata");
        assert_matches!(
            merge_additional_metadata(Some(&raw), MetadataRecord::default()),
            Err(AoiError::MetadataParse(_))
        );
        let raw = json!("[1, 2]");
        assert_matches!(
            merge_additional_metadata(Some(&raw), MetadataRecord::default()),
            Err(AoiError::MetadataParse(_))
        );
    }

    #[test]
    fn bad_eventtime_is_fatal() {
        let raw = json!({"eventtime": "yesterday-ish"});
        assert_matches!(
            merge_additional_metadata(Some(&raw), MetadataRecord::default()),
            Err(AoiError::TimeParse(_))
        );
    }
}
