//! Definition dictionaries produced by the external def-file parser.
//!
//! Only the shapes matter here; the parser itself is an external
//! collaborator. Dictionaries whose contents are passed through to the
//! emitted bundle untouched are kept as raw JSON values.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Default)]
pub struct DefCatalog {
    pub road_looks: HashMap<String, Value>,
    pub prefab_descriptions: HashMap<String, PrefabDescription>,
    pub cities: HashMap<String, CityDef>,
    pub countries: HashMap<String, CountryDef>,
    pub ferries: HashMap<String, FerryDef>,
    pub companies: HashMap<String, CompanyDef>,
    pub model_descriptions: HashMap<String, Value>,
    pub vegetation: HashSet<String>,
    /// Cutscene item UID to viewpoint label token
    pub viewpoints: HashMap<u64, String>,
    pub mileage_targets: HashMap<String, MileageTarget>,
    pub achievements: HashMap<String, Value>,
    pub routes: HashMap<String, Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CityDef {
    pub token: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_localized: Option<String>,
    pub country_token: String,
    pub population: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountryDef {
    pub token: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_localized: Option<String>,
    pub code: String,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FerryDef {
    pub token: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_localized: Option<String>,
    pub connections: Vec<FerryConnectionDef>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FerryConnectionDef {
    /// Token of the ferry port on the far side
    pub target_token: String,
    pub price: u64,
    pub time: u64,
    pub distance: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub intermediate_points: Vec<[f64; 2]>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyDef {
    pub token: String,
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub city_tokens: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MileageTarget {
    pub token: String,
    pub editor_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    /// Fallback position source when x/y are absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_uid: Option<u64>,
    pub distance_offset: f64,
}

/// Authored prefab geometry in prefab-local space.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrefabDescription {
    pub token: String,
    pub nodes: Vec<PrefabNode>,
    pub spawn_points: Vec<SpawnPoint>,
    pub trigger_points: Vec<TriggerPoint>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrefabNode {
    pub x: f64,
    pub y: f64,
    pub rotation: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpawnPoint {
    pub x: f64,
    pub y: f64,
    pub kind: SpawnPointKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SpawnPointKind {
    GasStation,
    ServiceStation,
    WeighStation,
    TruckDealer,
    Buy,
    Recruitment,
    CompanyPos,
    TrailerPos,
    Unknown,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerPoint {
    pub x: f64,
    pub y: f64,
    pub action: String,
}
