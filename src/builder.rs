use tracing::debug;

use crate::emails::{merge_emails, parse_emails};
use crate::error::AoiError;
use crate::geometry::validate_geojson;
use crate::label::{generate_label, validate_type};
use crate::metadata::merge_additional_metadata;
use crate::records::{Context, DatasetRecord, MetadataRecord};
use crate::time::{validate_event_time, validate_time};

/// Fills the dataset template from the context.
pub fn build_dataset(context: &Context, mut ds: DatasetRecord) -> Result<DatasetRecord, AoiError> {
    let aoi_type = validate_type(&context.aoi_type);
    let label = generate_label(&context.name, &aoi_type);
    let location = validate_geojson(&context.geojson_polygon)?;
    let starttime = validate_time(&context.starttime)?;
    let endtime = validate_time(&context.endtime)?;
    let additional = context
        .emails
        .as_ref()
        .map(parse_emails)
        .unwrap_or_default();
    let emails = merge_emails(&ds.emails, &additional);
    debug!(%label, recipients = emails.len(), "dataset fields validated");

    ds.label = label;
    ds.aoi_type = aoi_type;
    ds.account = context.account.clone();
    ds.location = Some(location);
    ds.starttime = starttime;
    ds.endtime = endtime;
    ds.emails = emails;
    Ok(ds)
}

/// Fills the metadata template from the context; `additional_metadata` is
/// applied last and wins over top-level fields.
pub fn build_metadata(
    context: &Context,
    mut met: MetadataRecord,
) -> Result<MetadataRecord, AoiError> {
    if let Some(username) = &context.username {
        met.username = Some(username.clone());
    }
    if let Some(eventtime) = validate_event_time(context.eventtime.as_deref().unwrap_or(""))? {
        met.eventtime = Some(eventtime);
    }
    if let Some(image_url) = &context.image_url {
        met.image_url = Some(image_url.clone());
    }
    merge_additional_metadata(context.additional_metadata.as_ref(), met)
}
