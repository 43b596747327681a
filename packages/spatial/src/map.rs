//! Self-contained Leaflet map of incidents and cluster centroids.
//!
//! The page loads Leaflet from a CDN and embeds its marker data as `GeoJSON`
//! feature collections, so the output is a single HTML file.

use std::path::Path;

use crime_risk_crime_models::IncidentRecord;
use serde_json::{Value, json};

use crate::{Cluster, GeoPoint};

/// Map view and marker limits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapOptions {
    pub center: GeoPoint,
    pub zoom: u8,
    /// Incidents drawn, taken in source order.
    pub max_incidents: usize,
}

impl Default for MapOptions {
    fn default() -> Self {
        Self {
            center: GeoPoint::new(41.8781, -87.6298),
            zoom: 11,
            max_incidents: 1000,
        }
    }
}

fn point_feature(point: GeoPoint, properties: &Value) -> Value {
    json!({
        "type": "Feature",
        "geometry": {
            "type": "Point",
            "coordinates": [point.longitude, point.latitude]
        },
        "properties": properties
    })
}

/// Incident markers: the first `max_incidents` records with coordinates.
#[must_use]
pub fn incident_features(records: &[IncidentRecord], max_incidents: usize) -> Value {
    let features: Vec<Value> = records
        .iter()
        .filter_map(|record| {
            record.coordinates().map(|(lat, lon)| {
                point_feature(
                    GeoPoint::new(lat, lon),
                    &json!({
                        "primaryType": record.primary_type.as_deref().unwrap_or("UNKNOWN"),
                        "location": record.location_description.as_deref().unwrap_or("UNKNOWN"),
                    }),
                )
            })
        })
        .take(max_incidents)
        .collect();
    json!({ "type": "FeatureCollection", "features": features })
}

/// Centroid markers, one per cluster.
#[must_use]
pub fn cluster_features(clusters: &[Cluster]) -> Value {
    let features: Vec<Value> = clusters
        .iter()
        .map(|cluster| {
            point_feature(
                cluster.centroid,
                &json!({ "clusterId": cluster.id, "size": cluster.size }),
            )
        })
        .collect();
    json!({ "type": "FeatureCollection", "features": features })
}

/// Serializes JSON for inline `<script>` use.
fn script_json(value: &Value) -> String {
    value.to_string().replace("</", "<\\/")
}

/// Renders the full HTML page.
#[must_use]
pub fn render_map_html(records: &[IncidentRecord], clusters: &[Cluster], options: MapOptions) -> String {
    let incidents = script_json(&incident_features(records, options.max_incidents));
    let centroids = script_json(&cluster_features(clusters));
    let center = script_json(&json!([options.center.latitude, options.center.longitude]));
    let zoom = options.zoom;

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>Crime map</title>
<meta name="viewport" content="width=device-width, initial-scale=1">
<link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css">
<script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"></script>
<style>html, body, #map {{ height: 100%; margin: 0; }}</style>
</head>
<body>
<div id="map"></div>
<script>
const incidents = {incidents};
const centroids = {centroids};
function esc(text) {{
  const div = document.createElement("div");
  div.textContent = String(text);
  return div.innerHTML;
}}
const map = L.map("map").setView({center}, {zoom});
L.tileLayer("https://{{s}}.tile.openstreetmap.org/{{z}}/{{x}}/{{y}}.png", {{
  attribution: "&copy; OpenStreetMap contributors"
}}).addTo(map);
for (const f of incidents.features) {{
  const [lon, lat] = f.geometry.coordinates;
  L.circleMarker([lat, lon], {{ radius: 2, color: "red", fillOpacity: 0.7 }})
    .bindPopup(esc(f.properties.primaryType) + " - " + esc(f.properties.location))
    .addTo(map);
}}
for (const f of centroids.features) {{
  const [lon, lat] = f.geometry.coordinates;
  L.circleMarker([lat, lon], {{ radius: 10, color: "blue", fillOpacity: 0.5 }})
    .bindPopup("Cluster " + f.properties.clusterId + ": " + f.properties.size + " points")
    .addTo(map);
}}
</script>
</body>
</html>
"#
    )
}

/// Writes the map page to `path`, replacing any existing file.
///
/// # Errors
///
/// Returns the I/O error if the file cannot be written.
pub fn write_map(
    path: &Path,
    records: &[IncidentRecord],
    clusters: &[Cluster],
    options: MapOptions,
) -> std::io::Result<()> {
    std::fs::write(path, render_map_html(records, clusters, options))?;
    log::info!("Wrote map to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn record(lat: Option<f64>, primary_type: &str) -> IncidentRecord {
        IncidentRecord {
            occurred_at: NaiveDate::from_ymd_opt(2024, 5, 1)
                .unwrap()
                .and_hms_opt(1, 0, 0)
                .unwrap(),
            primary_type: Some(primary_type.to_string()),
            location_description: Some("STREET".to_string()),
            arrest: false,
            latitude: lat,
            longitude: Some(-87.6),
        }
    }

    #[test]
    fn caps_markers_and_skips_missing_coordinates() {
        let records = vec![
            record(None, "THEFT"),
            record(Some(41.8), "BATTERY"),
            record(Some(41.9), "THEFT"),
            record(Some(42.0), "ASSAULT"),
        ];
        let features = incident_features(&records, 2);
        let features = features["features"].as_array().unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(features[0]["properties"]["primaryType"], "BATTERY");
        assert_eq!(features[0]["geometry"]["coordinates"][1], 41.8);
    }

    #[test]
    fn page_contains_view_and_centroids() {
        let clusters = vec![Cluster {
            id: 0,
            centroid: GeoPoint::new(41.88, -87.63),
            size: 12,
        }];
        let html = render_map_html(&[record(Some(41.8), "THEFT")], &clusters, MapOptions::default());
        assert!(html.contains("setView([41.8781,-87.6298], 11)"));
        assert!(html.contains("\"clusterId\":0"));
        assert!(html.contains("\"size\":12"));
        assert!(html.contains("leaflet.js"));
    }

    #[test]
    fn script_breakout_is_escaped() {
        let html = render_map_html(
            &[record(Some(41.8), "</script><b>")],
            &[],
            MapOptions::default(),
        );
        assert!(!html.contains("</script><b>"));
    }
}
