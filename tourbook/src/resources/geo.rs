//! Great-circle geometry over tour start locations
//!
//! Locations are GeoJSON points, so coordinates are `[longitude, latitude]`
//! in degrees. Path parameters use the opposite `lat,lng` order.

use serde::Serialize;
use serde_json::Value;

use crate::handlers::ApiError;
use crate::query::ID_FIELD;
use crate::repository::{lookup, Document};

/// Sphere radius used for radius searches
const EARTH_RADIUS_MI: f64 = 3958.8;
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Sphere radius used for distance reports, in metres
const EARTH_RADIUS_M: f64 = 6_378_100.0;

const METRES_TO_MI: f64 = 0.000621371;
const METRES_TO_KM: f64 = 0.001;

pub const COORDINATES_PATH: &str = "startLocation.coordinates";

/// Distance unit from the `{unit}` path segment; anything but `mi` is km
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Miles,
    Kilometres,
}

impl Unit {
    pub fn parse(raw: &str) -> Self {
        if raw == "mi" {
            Self::Miles
        } else {
            Self::Kilometres
        }
    }

    fn earth_radius(self) -> f64 {
        match self {
            Self::Miles => EARTH_RADIUS_MI,
            Self::Kilometres => EARTH_RADIUS_KM,
        }
    }

    fn per_metre(self) -> f64 {
        match self {
            Self::Miles => METRES_TO_MI,
            Self::Kilometres => METRES_TO_KM,
        }
    }
}

/// A point on the sphere, in degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub lat: f64,
    pub lng: f64,
}

impl Point {
    /// Parse the `lat,lng` path segment
    pub fn parse(latlng: &str) -> Result<Self, ApiError> {
        let invalid =
            || ApiError::bad_request("Please provide the latitude and longitude in the format lat,lng");

        let (lat, lng) = latlng.split_once(',').ok_or_else(invalid)?;
        let lat = lat.trim().parse::<f64>().map_err(|_| invalid())?;
        let lng = lng.trim().parse::<f64>().map_err(|_| invalid())?;
        if !lat.is_finite() || !lng.is_finite() {
            return Err(invalid());
        }
        Ok(Self { lat, lng })
    }

    /// GeoJSON `[lng, lat]` pair
    fn from_coordinates(value: &Value) -> Option<Self> {
        match value.as_array()?.as_slice() {
            [lng, lat, ..] => Some(Self {
                lat: lat.as_f64()?,
                lng: lng.as_f64()?,
            }),
            _ => None,
        }
    }

    /// Central angle to `other`, in radians (haversine)
    pub fn angle_to(&self, other: &Point) -> f64 {
        let (lat1, lat2) = (self.lat.to_radians(), other.lat.to_radians());
        let d_lat = lat2 - lat1;
        let d_lng = (other.lng - self.lng).to_radians();

        let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
        2.0 * h.sqrt().min(1.0).asin()
    }
}

/// Start point of a tour, if it has a usable one
pub fn start_point(tour: &Document) -> Option<Point> {
    lookup(tour, COORDINATES_PATH).and_then(Point::from_coordinates)
}

/// Tours starting within `distance` units of `center`
pub fn within_radius(tours: Vec<Document>, center: Point, distance: f64, unit: Unit) -> Vec<Document> {
    let radius = distance / unit.earth_radius();
    tours
        .into_iter()
        .filter(|tour| start_point(tour).is_some_and(|start| center.angle_to(&start) <= radius))
        .collect()
}

/// One row of a distance report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TourDistance {
    #[serde(rename = "_id")]
    pub id: Value,
    pub name: Value,
    pub distance: f64,
}

/// Distance from `origin` to every tour with a start point, nearest first
pub fn distances_from(tours: &[Document], origin: Point, unit: Unit) -> Vec<TourDistance> {
    let mut rows = tours
        .iter()
        .filter_map(|tour| {
            let start = start_point(tour)?;
            Some(TourDistance {
                id: tour.get(ID_FIELD).cloned().unwrap_or(Value::Null),
                name: tour.get("name").cloned().unwrap_or(Value::Null),
                distance: origin.angle_to(&start) * EARTH_RADIUS_M * unit.per_metre(),
            })
        })
        .collect::<Vec<_>>();
    rows.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tour(id: &str, lng: f64, lat: f64) -> Document {
        json!({
            "_id": id,
            "name": format!("Tour {id}"),
            "startLocation": {"type": "Point", "coordinates": [lng, lat]}
        })
        .as_object()
        .cloned()
        .unwrap()
    }

    // Los Angeles, Miami and Las Vegas
    fn tours() -> Vec<Document> {
        vec![
            tour("miami", -80.185942, 25.774772),
            tour("vegas", -115.172652, 36.110904),
            tour("la", -118.243683, 34.052235),
        ]
    }

    const LA: Point = Point {
        lat: 34.052235,
        lng: -118.243683,
    };

    #[test]
    fn test_parse_point() {
        assert_eq!(Point::parse("34.1,-118.2").unwrap(), Point { lat: 34.1, lng: -118.2 });
        for bad in ["34.1", "34.1,", ",-118.2", "north,west", ""] {
            let err = Point::parse(bad).unwrap_err();
            assert_eq!(err.message, "Please provide the latitude and longitude in the format lat,lng");
        }
    }

    #[test]
    fn test_unit() {
        assert_eq!(Unit::parse("mi"), Unit::Miles);
        assert_eq!(Unit::parse("km"), Unit::Kilometres);
        assert_eq!(Unit::parse("furlongs"), Unit::Kilometres);
    }

    #[test]
    fn test_angle_to() {
        assert_eq!(LA.angle_to(&LA), 0.0);
        // LA to Las Vegas is about 368 km
        let km = LA.angle_to(&Point { lat: 36.110904, lng: -115.172652 }) * EARTH_RADIUS_KM;
        assert!((km - 368.0).abs() < 5.0, "{km}");
    }

    #[test]
    fn test_within_radius() {
        let ids = |found: Vec<Document>| -> Vec<String> {
            found.iter().map(|t| t["_id"].as_str().unwrap().to_string()).collect()
        };
        assert_eq!(ids(within_radius(tours(), LA, 10.0, Unit::Miles)), vec!["la"]);
        assert_eq!(ids(within_radius(tours(), LA, 400.0, Unit::Kilometres)), vec!["vegas", "la"]);
        assert_eq!(ids(within_radius(tours(), LA, 400.0, Unit::Miles)), vec!["vegas", "la"]);
        assert_eq!(within_radius(tours(), LA, 3000.0, Unit::Miles).len(), 3);
    }

    #[test]
    fn test_distances_from() {
        let mut all = tours();
        all.push(json!({"_id": "nowhere", "name": "No Start"}).as_object().cloned().unwrap());

        let rows = distances_from(&all, LA, Unit::Kilometres);
        let ids: Vec<_> = rows.iter().map(|r| r.id.as_str().unwrap()).collect();
        assert_eq!(ids, vec!["la", "vegas", "miami"]);
        assert_eq!(rows[0].distance, 0.0);

        let miles = distances_from(&all, LA, Unit::Miles);
        let ratio = miles[1].distance / rows[1].distance;
        assert!((ratio - 0.621371).abs() < 1e-9);
    }
}
