use geojson::Geometry;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::emails::parse_emails;
use crate::error::AoiError;

/// Job input describing the AOI to create.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Context {
    #[serde(rename = "type")]
    pub aoi_type: String,
    pub name: String,
    pub account: String,
    pub geojson_polygon: Value,
    pub starttime: String,
    pub endtime: String,
    #[serde(default)]
    pub emails: Option<EmailInput>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub eventtime: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub additional_metadata: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Context {
    pub fn from_value(value: Value) -> Result<Self, AoiError> {
        serde_json::from_value(value).map_err(|err| AoiError::ContextParse(err.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum EmailInput {
    List(Vec<String>),
    Text(String),
}

/// Dataset record, also used to read the dataset template. Template fields
/// that the builder overwrites may hold placeholders such as `null` or `{}`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct DatasetRecord {
    #[serde(default, deserialize_with = "placeholder_string")]
    pub label: String,
    #[serde(default, rename = "type", deserialize_with = "placeholder_string")]
    pub aoi_type: String,
    #[serde(default, deserialize_with = "placeholder_string")]
    pub account: String,
    #[serde(
        default,
        deserialize_with = "placeholder_geometry",
        skip_serializing_if = "Option::is_none"
    )]
    pub location: Option<Geometry>,
    #[serde(default, deserialize_with = "placeholder_string")]
    pub starttime: String,
    #[serde(default, deserialize_with = "placeholder_string")]
    pub endtime: String,
    #[serde(default, deserialize_with = "email_list")]
    pub emails: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct MetadataRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eventtime: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_metadata: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tiles: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MetadataRecord {
    /// `event_metadata.label`, when the event carries its own product label.
    pub fn event_label(&self) -> Option<&str> {
        self.event_metadata.as_ref()?.get("label")?.as_str()
    }
}

/// Identifiers of the job run, used by the failure notification.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JobInfo {
    #[serde(default = "unknown")]
    pub job_id: String,
    #[serde(default = "unknown")]
    pub task_id: String,
}

impl Default for JobInfo {
    fn default() -> Self {
        Self {
            job_id: unknown(),
            task_id: unknown(),
        }
    }
}

fn unknown() -> String {
    "unknown".to_string()
}

fn placeholder_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => text,
        _ => String::new(),
    })
}

fn placeholder_geometry<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Geometry>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Accepts a list of addresses or comma-separated text.
fn email_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let input = match Value::deserialize(deserializer)? {
        Value::String(text) => EmailInput::Text(text),
        Value::Array(items) => EmailInput::List(
            items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(email) => Some(email),
                    _ => None,
                })
                .collect(),
        ),
        _ => return Ok(Vec::new()),
    };
    Ok(parse_emails(&input))
}
