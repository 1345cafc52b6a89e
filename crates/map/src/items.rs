//! World item and node catalog.
//!
//! These are the shapes produced by the external sector parser; the
//! assembly pass only consumes them. Every item carries a 64-bit UID and,
//! after aggregation, the coordinates of the sector it was read from.

use serde::Serialize;

/// A world-space anchor point. `x`/`y` span the ground plane, `z` is the
/// elevation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub uid: u64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Heading in radians
    pub rotation: f64,
    pub forward_item_uid: u64,
    pub backward_item_uid: u64,
    #[serde(skip)]
    pub sector_x: i32,
    #[serde(skip)]
    pub sector_y: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Item {
    pub uid: u64,
    pub sector_x: i32,
    pub sector_y: i32,
    #[serde(flatten)]
    pub kind: ItemKind,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ItemKind {
    City(CityItem),
    Road(RoadItem),
    Prefab(PrefabItem),
    MapArea(MapAreaItem),
    MapOverlay(MapOverlayItem),
    Ferry(FerryItem),
    Company(CompanyItem),
    Cutscene(CutsceneItem),
    Trigger(TriggerItem),
    Model(ModelItem),
    Terrain(TerrainItem),
    Building(BuildingItem),
    Curve(CurveItem),
    Trajectory(TrajectoryItem),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CityItem {
    pub token: String,
    pub node_uid: u64,
    pub width: f64,
    pub height: f64,
    /// Hidden areas extend a city without naming it on the map; every city
    /// needs at least one non-hidden "location" area.
    pub hidden: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoadItem {
    pub road_look_token: String,
    pub start_node_uid: u64,
    pub end_node_uid: u64,
    pub length: f64,
    pub dlc_guard: u8,
    /// Set during assembly when a terrain divider visually splits the road
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maybe_divided: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrefabItem {
    pub token: String,
    pub node_uids: Vec<u64>,
    /// Index into the prefab description's node list that the first placed
    /// node corresponds to
    pub origin_node_index: u32,
    pub dlc_guard: u8,
    pub hidden: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapAreaItem {
    pub node_uids: Vec<u64>,
    pub color: u32,
    pub draw_over: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum OverlayKind {
    Road,
    Parking,
    Landmark,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapOverlayItem {
    pub token: String,
    pub node_uid: u64,
    pub overlay_kind: OverlayKind,
    pub dlc_guard: u8,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FerryItem {
    pub token: String,
    pub node_uid: u64,
    pub train: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyItem {
    pub token: String,
    pub city_token: String,
    pub prefab_uid: u64,
    pub node_uid: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CutsceneItem {
    pub flags: u32,
    pub tags: Vec<String>,
    pub node_uid: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerItem {
    pub node_uids: Vec<u64>,
    pub actions: Vec<String>,
    pub dlc_guard: u8,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelItem {
    pub token: String,
    pub node_uid: u64,
    pub scale: [f64; 3],
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TerrainItem {
    pub start_node_uid: u64,
    pub end_node_uid: u64,
    pub length: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildingItem {
    pub scheme: String,
    pub start_node_uid: u64,
    pub end_node_uid: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurveItem {
    pub model_token: String,
    pub start_node_uid: u64,
    pub end_node_uid: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrajectoryItem {
    pub node_uids: Vec<u64>,
    pub checkpoints: Vec<String>,
}
