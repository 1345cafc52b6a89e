//! The emitted map data bundle.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

use crate::defs::{CompanyDef, CountryDef, MileageTarget, PrefabDescription};
use crate::items::Item;

/// Complete output of one extraction run.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapBundle {
    pub map: String,
    pub map_data: MapData,
    /// Icon name to encoded raster blob
    pub icons: HashMap<String, Vec<u8>>,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapData {
    /// Positions of every node referenced by an emitted item, as rounded
    /// `[x, y, z]` triples
    pub nodes: Vec<[i64; 3]>,
    /// Positions contributing to the elevation model
    pub elevation: Vec<[i64; 3]>,
    pub roads: Vec<Item>,
    pub ferries: Vec<FerryOut>,
    pub prefabs: Vec<Item>,
    pub companies: Vec<CompanyOut>,
    pub models: Vec<Item>,
    pub map_areas: Vec<Item>,
    pub pois: Vec<Poi>,
    /// Non-terrain dividers that took part in road-split detection
    pub dividers: Vec<Item>,
    pub triggers: Vec<Item>,
    pub trajectories: Vec<Item>,
    pub cutscenes: Vec<Item>,
    pub countries: Vec<CountryDef>,
    pub cities: Vec<CityOut>,
    pub company_defs: Vec<CompanyDef>,
    pub road_looks: HashMap<String, Value>,
    pub prefab_descriptions: HashMap<String, PrefabDescription>,
    pub model_descriptions: HashMap<String, Value>,
    pub achievements: HashMap<String, Value>,
    pub routes: HashMap<String, Value>,
    pub mileage_targets: HashMap<String, MileageTarget>,
}

/// A definition city combined with its placed sector areas.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CityOut {
    pub token: String,
    pub name: String,
    pub country_token: String,
    pub population: u64,
    pub x: f64,
    pub y: f64,
    pub areas: Vec<Item>,
}

/// A definition ferry with its endpoints resolved to map space.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FerryOut {
    pub token: String,
    pub name: String,
    pub train: bool,
    pub x: f64,
    pub y: f64,
    pub connections: Vec<FerryConnectionOut>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FerryConnectionOut {
    pub token: String,
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub price: u64,
    pub time: u64,
    pub distance: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub intermediate_points: Vec<[f64; 2]>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyOut {
    pub token: String,
    pub name: String,
    pub city_token: String,
    pub x: f64,
    pub y: f64,
}

/// A renderable or queryable point extracted from the sector items.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Poi {
    /// Gas stations, services, dealers, parking and the like
    #[serde(rename_all = "camelCase")]
    Facility {
        x: f64,
        y: f64,
        icon: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        from_item_type: Option<String>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        item_node_uids: Vec<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        dlc_guard: Option<u8>,
    },
    /// A road overlay icon (route shields and the like)
    #[serde(rename_all = "camelCase")]
    Road {
        x: f64,
        y: f64,
        icon: String,
        dlc_guard: u8,
        node_uid: u64,
    },
    #[serde(rename_all = "camelCase")]
    Landmark {
        x: f64,
        y: f64,
        icon: String,
        label: String,
        dlc_guard: u8,
    },
    #[serde(rename_all = "camelCase")]
    Company {
        x: f64,
        y: f64,
        icon: String,
        label: String,
    },
    #[serde(rename_all = "camelCase")]
    Ferry {
        x: f64,
        y: f64,
        icon: String,
        label: String,
    },
    #[serde(rename_all = "camelCase")]
    Train {
        x: f64,
        y: f64,
        icon: String,
        label: String,
    },
    #[serde(rename_all = "camelCase")]
    Viewpoint {
        x: f64,
        y: f64,
        icon: String,
        label: String,
    },
}
