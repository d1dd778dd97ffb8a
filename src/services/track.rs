// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Breadcrumb trail geometry: distance, GeoJSON and encoded polyline.

use crate::models::BreadcrumbPoint;
use geo::{Coord, Distance, Haversine, LineString, Point};

/// Total haversine length of a breadcrumb trail, in kilometers.
///
/// Consecutive samples are summed as-is; GPS jitter is not filtered.
pub fn distance_km(points: &[BreadcrumbPoint]) -> f64 {
    let meters: f64 = points
        .windows(2)
        .map(|pair| {
            Haversine.distance(
                Point::new(pair[0].lng, pair[0].lat),
                Point::new(pair[1].lng, pair[1].lat),
            )
        })
        .sum();
    meters / 1000.0
}

/// Breadcrumbs as a line string (x = lng, y = lat).
pub fn to_line_string(points: &[BreadcrumbPoint]) -> LineString<f64> {
    points
        .iter()
        .map(|p| Coord { x: p.lng, y: p.lat })
        .collect::<Vec<_>>()
        .into()
}

/// Encode the trail as a precision-5 polyline (the common map-SDK format).
pub fn encode_polyline(points: &[BreadcrumbPoint]) -> Result<String, TrackError> {
    polyline::encode_coordinates(to_line_string(points), 5)
        .map_err(|e| TrackError::Polyline(e.to_string()))
}

/// GeoJSON feature with a LineString geometry and per-point timestamps.
pub fn to_geojson(hike_id: &str, points: &[BreadcrumbPoint]) -> geojson::Feature {
    let coordinates: Vec<Vec<f64>> = points.iter().map(|p| vec![p.lng, p.lat]).collect();
    let timestamps: Vec<i64> = points.iter().map(|p| p.ts).collect();

    let mut properties = serde_json::Map::new();
    properties.insert("hike_id".to_string(), hike_id.into());
    properties.insert("timestamps".to_string(), timestamps.into());

    geojson::Feature {
        bbox: None,
        geometry: Some(geojson::Geometry::new(geojson::Value::LineString(
            coordinates,
        ))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

/// Errors from track encoding.
#[derive(Debug, thiserror::Error)]
pub enum TrackError {
    #[error("Failed to encode polyline: {0}")]
    Polyline(String),
}
