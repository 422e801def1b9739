use geo::{Coord, Intersects, Line, LineString, Polygon};
use geojson::Geometry;
use serde_json::Value;

use crate::error::AoiError;
use crate::literal;

/// Normalizes the context's `geojson_polygon` into a GeoJSON Polygon geometry.
///
/// The input may be a full geometry (anything carrying `coordinates`, whose
/// first ring is used), a bare ring of positions, or either of those encoded
/// as text. The emitted ring is always closed.
pub fn validate_geojson(input: &Value) -> Result<Geometry, AoiError> {
    let decoded;
    let input = match input {
        Value::String(text) => {
            decoded = literal::parse(text).map_err(|err| {
                AoiError::GeometryParse(format!("unable to parse input geojson string {text}: {err}"))
            })?;
            &decoded
        }
        other => other,
    };

    let ring = match input.get("coordinates") {
        Some(coordinates) => coordinates
            .get(0)
            .ok_or_else(|| AoiError::GeometryParse(format!("missing exterior ring: {input}")))?,
        None => input,
    };

    let polygon = build_polygon(ring)?;
    Ok(to_geojson(&polygon))
}

pub fn build_polygon(ring: &Value) -> Result<Polygon<f64>, AoiError> {
    let positions = ring
        .as_array()
        .ok_or_else(|| AoiError::GeometryParse(format!("ring is not a list of positions: {ring}")))?;
    let coords = positions
        .iter()
        .map(parse_position)
        .collect::<Result<Vec<_>, _>>()?;

    let polygon = Polygon::new(LineString::new(coords), Vec::new());
    let exterior = polygon.exterior();
    if exterior.0.len() < 4 {
        return Err(AoiError::GeometryParse(format!(
            "polygon ring needs at least 4 positions once closed, found {}",
            exterior.0.len()
        )));
    }
    if ring_self_intersects(exterior) {
        return Err(AoiError::GeometryParse(format!(
            "polygon ring intersects itself: {ring}"
        )));
    }
    Ok(polygon)
}

fn parse_position(position: &Value) -> Result<Coord<f64>, AoiError> {
    let invalid = || AoiError::GeometryParse(format!("invalid position: {position}"));
    let values = position.as_array().ok_or_else(invalid)?;
    if !(2..=3).contains(&values.len()) {
        return Err(invalid());
    }
    let x = values[0].as_f64().filter(|x| x.is_finite()).ok_or_else(invalid)?;
    let y = values[1].as_f64().filter(|y| y.is_finite()).ok_or_else(invalid)?;
    Ok(Coord { x, y })
}

fn ring_self_intersects(ring: &LineString<f64>) -> bool {
    let mut coords: Vec<Coord<f64>> = Vec::with_capacity(ring.0.len());
    for coord in &ring.0 {
        if coords.last() != Some(coord) {
            coords.push(*coord);
        }
    }
    let segments: Vec<Line<f64>> = coords
        .windows(2)
        .map(|pair| Line::new(pair[0], pair[1]))
        .collect();
    if segments.len() < 3 {
        return true;
    }

    let count = segments.len();
    for i in 0..count {
        for j in (i + 1)..count {
            let adjacent = j == i + 1 || (i == 0 && j == count - 1);
            if adjacent {
                if collinear_overlap(&segments[i], &segments[j]) {
                    return true;
                }
                continue;
            }
            if segments[i].intersects(&segments[j]) {
                return true;
            }
        }
    }
    false
}

// Adjacent segments share an endpoint; they only conflict when they fold back
// onto each other.
fn collinear_overlap(a: &Line<f64>, b: &Line<f64>) -> bool {
    let da = a.delta();
    let db = b.delta();
    let cross = da.x * db.y - da.y * db.x;
    let dot = da.x * db.x + da.y * db.y;
    cross == 0.0 && dot < 0.0
}

fn to_geojson(polygon: &Polygon<f64>) -> Geometry {
    let ring = polygon
        .exterior()
        .coords()
        .map(|coord| vec![coord.x, coord.y])
        .collect();
    Geometry::new(geojson::Value::Polygon(vec![ring]))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    fn square() -> Value {
        json!([[0, 0], [0, 1], [1, 1], [1, 0], [0, 0]])
    }

    #[test]
    fn bare_ring_becomes_polygon() {
        let geometry = validate_geojson(&square()).unwrap();
        assert_eq!(
            serde_json::to_value(&geometry).unwrap(),
            json!({
                "type": "Polygon",
                "coordinates": [[[0.0, 0.0], [0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]]]
            })
        );
    }

    #[test]
    fn open_ring_is_closed() {
        let geometry = validate_geojson(&json!([[0, 0], [0, 1], [1, 1], [1, 0]])).unwrap();
        assert_eq!(geometry, validate_geojson(&square()).unwrap());
    }

    #[test]
    fn textual_python_literal() {
        let text = Value::String("((0, 0), (0, 1), (1, 1), (1, 0))".to_string());
        assert_eq!(
            validate_geojson(&text).unwrap(),
            validate_geojson(&square()).unwrap()
        );
    }

    #[test]
    fn bowtie_is_rejected() {
        let bowtie = json!([[0, 0], [1, 1], [1, 0], [0, 1], [0, 0]]);
        assert_matches!(validate_geojson(&bowtie), Err(AoiError::GeometryParse(_)));
    }

    #[test]
    fn spike_is_rejected() {
        let spike = json!([[0, 0], [2, 0], [1, 0], [1, 1], [0, 0]]);
        assert_matches!(validate_geojson(&spike), Err(AoiError::GeometryParse(_)));
    }

    #[test]
    fn too_few_points() {
        let line = json!([[0, 0], [1, 1]]);
        assert_matches!(validate_geojson(&line), Err(AoiError::GeometryParse(_)));
    }

    #[test]
    fn non_numeric_positions() {
        let ring = json!([[0, 0], ["a", 1], [1, 1], [0, 0]]);
        assert_matches!(validate_geojson(&ring), Err(AoiError::GeometryParse(_)));
        assert_matches!(validate_geojson(&json!(42)), Err(AoiError::GeometryParse(_)));
    }

    #[test]
    fn third_dimension_is_dropped() {
        let ring = json!([[0, 0, 5], [0, 1, 5], [1, 1, 5], [0, 0, 5]]);
        let geometry = serde_json::to_value(validate_geojson(&ring).unwrap()).unwrap();
        assert_eq!(geometry["coordinates"][0][1], json!([0.0, 1.0]));
    }
}
