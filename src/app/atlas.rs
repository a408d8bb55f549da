use serde::Serialize;
use uuid::Uuid;

use crate::domain::resource::Resource;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct City {
    pub name: &'static str,
    #[serde(flatten)]
    pub position: LatLng,
}

pub const MAP_CENTER: LatLng = LatLng {
    lat: 41.6086,
    lng: 21.7453,
};
pub const MAP_ZOOM: u8 = 8;

const MARKER_TAGS: usize = 3;

macro_rules! cities {
    ($($name:literal => ($lat:literal, $lng:literal)),+ $(,)?) => {
        &[$(City { name: $name, position: LatLng { lat: $lat, lng: $lng } }),+]
    };
}

pub const CITIES: &[City] = cities! {
    "Skopje" => (41.9981, 21.4254),
    "Bitola" => (41.0297, 21.3292),
    "Tetovo" => (42.0102, 20.9715),
    "Stip" => (41.7455, 22.1958),
    "Prilep" => (41.3464, 21.5542),
    "Ohrid" => (41.1172, 20.8016),
    "Kumanovo" => (42.1322, 21.7144),
    "Veles" => (41.7165, 21.7723),
    "Strumica" => (41.4378, 22.6427),
    "Kocani" => (41.9169, 22.4083),
    "Gostivar" => (41.8025, 20.9089),
    "Kavadarci" => (41.4331, 22.0119),
    "Gevgelija" => (41.1392, 22.5025),
    "Struga" => (41.1778, 20.6783),
    "Radovish" => (41.6383, 22.4647),
    "Debar" => (41.5250, 20.5272),
    "Probistip" => (42.0006, 22.1767),
    "Sveti Nikole" => (41.8650, 21.9422),
};

/// Exact, case-sensitive lookup by city name.
pub fn locate(name: &str) -> Option<LatLng> {
    CITIES
        .iter()
        .find(|city| city.name == name)
        .map(|city| city.position)
}

#[derive(Debug, Clone, Serialize)]
pub struct Marker {
    pub resource_id: Uuid,
    pub title: String,
    pub author_name: String,
    pub tags: Vec<String>,
    pub location: String,
    #[serde(flatten)]
    pub position: LatLng,
}

#[derive(Debug, Clone, Serialize)]
pub struct MapView {
    pub center: LatLng,
    pub zoom: u8,
    pub markers: Vec<Marker>,
}

/// One marker per resource with a known city; everything else is left off
/// the map.
pub fn markers(resources: &[Resource]) -> Vec<Marker> {
    resources
        .iter()
        .filter_map(|resource| {
            let location = resource.location.as_deref()?;
            let position = locate(location)?;
            Some(Marker {
                resource_id: resource.id,
                title: resource.title.clone(),
                author_name: resource.author_name.clone(),
                tags: resource.tags.iter().take(MARKER_TAGS).cloned().collect(),
                location: location.to_string(),
                position,
            })
        })
        .collect()
}

pub fn map_view(resources: &[Resource]) -> MapView {
    MapView {
        center: MAP_CENTER,
        zoom: MAP_ZOOM,
        markers: markers(resources),
    }
}
