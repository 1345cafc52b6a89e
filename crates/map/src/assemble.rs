//! The map assembly pass.
//!
//! Consumes the aggregated sector data together with the definition
//! dictionaries, the icon map and the locale bundle, and emits the unified
//! map data structure: reference-checked items, classified points of
//! interest, augmented cities and ferries, road-split flags and the
//! referenced/elevation node arrays.

use std::collections::{HashMap, HashSet};

use glam::DVec2;
use tracing::{debug, info, warn};

use crate::bundle::{
    CityOut, CompanyOut, FerryConnectionOut, FerryOut, MapBundle, MapData, Poi,
};
use crate::defs::{DefCatalog, PrefabDescription, SpawnPointKind};
use crate::items::{
    CompanyItem, FerryItem, Item, ItemKind, Node, OverlayKind, PrefabItem,
};
use crate::locale::{localized_name, LocaleTable};
use crate::sectors::{default_map_name, SectorBundle};

pub const HUD_PARKING_ACTION: &str = "hud_parking";

pub struct AssembleOptions {
    /// Building schemes that act as road dividers. Chosen empirically and
    /// known to drift between game updates, hence configurable.
    pub divider_building_schemes: HashSet<String>,
    /// Curve model tokens that act as road dividers
    pub divider_curve_models: HashSet<String>,
    /// Endpoint distance (map units) under which a divider counts as
    /// splitting a road
    pub divider_distance: f64,
}

impl Default for AssembleOptions {
    fn default() -> Self {
        Self {
            divider_building_schemes: ["scheme20"].map(String::from).into(),
            divider_curve_models: ["0i03a", "0i03b"].map(String::from).into(),
            divider_distance: 2.0,
        }
    }
}

struct Ctx<'a> {
    defs: &'a DefCatalog,
    icons: &'a HashMap<String, Vec<u8>>,
    locale: &'a LocaleTable,
    options: &'a AssembleOptions,
    nodes: HashMap<u64, &'a Node>,
}

#[derive(Default)]
struct Buckets<'a> {
    referenced: HashSet<u64>,
    elevation: HashSet<u64>,
    city_areas: HashMap<String, Vec<&'a Item>>,
    prefabs_by_uid: HashMap<u64, (&'a Item, &'a PrefabItem)>,
    poiful: Vec<&'a Item>,
    ferry_items: HashMap<String, (&'a Item, &'a FerryItem)>,
}

pub fn assemble(
    bundle: &SectorBundle,
    defs: &DefCatalog,
    icons: HashMap<String, Vec<u8>>,
    locale: &LocaleTable,
    options: &AssembleOptions,
) -> MapBundle {
    let mut out = MapData::default();

    // Stage A: flatten the per-sector maps into global UID indices. Items
    // are walked in UID order so the output is reproducible.
    let mut nodes: HashMap<u64, &Node> = HashMap::new();
    let mut items: HashMap<u64, &Item> = HashMap::new();
    for sector in bundle.sectors.values() {
        for (uid, node) in &sector.nodes_by_uid {
            nodes.insert(*uid, node);
        }
        for (uid, item) in &sector.items_by_uid {
            items.insert(*uid, item);
        }
    }
    let mut ordered: Vec<&Item> = items.values().copied().collect();
    ordered.sort_by_key(|i| i.uid);
    info!("{} items, {} nodes", ordered.len(), nodes.len());

    let ctx = Ctx {
        defs,
        icons: &icons,
        locale,
        options,
        nodes,
    };

    let mut buckets = bucket_items(&ctx, &ordered, &mut out);
    extract_pois(&ctx, &buckets, &mut out);
    augment_cities(&ctx, &buckets, &mut out);
    augment_ferries(&ctx, &buckets, &mut out);
    detect_road_splits(&ctx, bundle, &mut buckets, &mut out);
    augment_mileage_targets(&ctx, &mut out);
    fill_definitions(ctx.defs, ctx.locale, &mut out);

    // Stage H: materialize the node arrays; UIDs without a backing node are
    // dropped.
    out.nodes = resolve_nodes(&ctx.nodes, &buckets.referenced);
    out.elevation = resolve_nodes(&ctx.nodes, &buckets.elevation);

    MapBundle {
        map: bundle.map.clone(),
        map_data: out,
        icons,
    }
}

/// Definitions-only mode: no sector data, no icons, just the dictionaries.
pub fn only_defs(defs: &DefCatalog, locale: &LocaleTable, game_id: &str) -> MapBundle {
    let mut out = MapData::default();
    fill_definitions(defs, locale, &mut out);
    MapBundle {
        map: default_map_name(game_id).to_string(),
        map_data: out,
        icons: HashMap::new(),
    }
}

/// Stage B: per-type reference bookkeeping and bucketing. The item type set
/// is closed; this match is total by construction.
fn bucket_items<'a>(ctx: &Ctx<'a>, ordered: &[&'a Item], out: &mut MapData) -> Buckets<'a> {
    let mut b = Buckets::default();

    for &item in ordered {
        match &item.kind {
            ItemKind::City(c) => {
                if !ctx.defs.cities.contains_key(&c.token) {
                    warn!("City item {:#x} has unknown token '{}'", item.uid, c.token);
                }
                b.city_areas.entry(c.token.clone()).or_default().push(item);
            }
            ItemKind::Road(r) => {
                if !ctx.defs.road_looks.contains_key(&r.road_look_token) {
                    warn!(
                        "Road item {:#x} has unknown road look '{}'",
                        item.uid, r.road_look_token
                    );
                }
                b.referenced.extend([r.start_node_uid, r.end_node_uid]);
                b.elevation.extend([r.start_node_uid, r.end_node_uid]);
            }
            ItemKind::Prefab(p) => {
                if !ctx.defs.prefab_descriptions.contains_key(&p.token) {
                    warn!("Prefab item {:#x} has unknown token '{}'", item.uid, p.token);
                }
                b.referenced.extend(p.node_uids.iter().copied());
                b.elevation.extend(p.node_uids.iter().copied());
                b.prefabs_by_uid.insert(item.uid, (item, p));
                b.poiful.push(item);
                out.prefabs.push(item.clone());
            }
            ItemKind::MapArea(a) => {
                b.referenced.extend(a.node_uids.iter().copied());
                b.elevation.extend(a.node_uids.iter().copied());
                out.map_areas.push(item.clone());
            }
            ItemKind::MapOverlay(o) => {
                b.referenced.insert(o.node_uid);
                b.poiful.push(item);
            }
            ItemKind::Ferry(f) => {
                if ctx.defs.ferries.contains_key(&f.token) {
                    b.referenced.insert(f.node_uid);
                    b.ferry_items.insert(f.token.clone(), (item, f));
                    b.poiful.push(item);
                } else {
                    warn!("Ferry item {:#x} has unknown token '{}'", item.uid, f.token);
                }
            }
            ItemKind::Company(c) => {
                if !ctx.defs.cities.contains_key(&c.city_token) {
                    warn!(
                        "Company item {:#x} has unknown city '{}'",
                        item.uid, c.city_token
                    );
                }
                b.referenced.insert(c.node_uid);
                b.poiful.push(item);
            }
            ItemKind::Cutscene(c) => {
                b.referenced.insert(c.node_uid);
                b.poiful.push(item);
                out.cutscenes.push(item.clone());
            }
            ItemKind::Trigger(t) => {
                b.referenced.extend(t.node_uids.iter().copied());
                b.poiful.push(item);
                out.triggers.push(item.clone());
            }
            ItemKind::Model(m) => {
                if ctx.defs.model_descriptions.contains_key(&m.token) {
                    b.referenced.insert(m.node_uid);
                    out.models.push(item.clone());
                }
                if ctx.defs.vegetation.contains(&m.token) {
                    b.elevation.insert(m.node_uid);
                }
            }
            ItemKind::Terrain(t) => {
                b.elevation.extend([t.start_node_uid, t.end_node_uid]);
            }
            ItemKind::Building(bl) => {
                b.elevation.extend([bl.start_node_uid, bl.end_node_uid]);
            }
            ItemKind::Curve(c) => {
                b.elevation.extend([c.start_node_uid, c.end_node_uid]);
            }
            ItemKind::Trajectory(t) => {
                b.referenced.extend(t.node_uids.iter().copied());
                out.trajectories.push(item.clone());
            }
        }
    }

    b
}

/// Stage C: point-of-interest extraction over the poiful items.
fn extract_pois(ctx: &Ctx<'_>, buckets: &Buckets<'_>, out: &mut MapData) {
    let mut no_poi_companies: Vec<&str> = Vec::new();
    let mut fallback_poi_companies: Vec<&str> = Vec::new();

    for &item in &buckets.poiful {
        match &item.kind {
            ItemKind::Prefab(p) => prefab_pois(ctx, p, out),
            ItemKind::MapOverlay(o) => {
                let Some(pos) = node_pos(&ctx.nodes, o.node_uid) else {
                    warn!("Overlay item {:#x} references missing node", item.uid);
                    continue;
                };
                match o.overlay_kind {
                    OverlayKind::Road => {
                        if o.token.is_empty() {
                            continue;
                        }
                        if !ctx.icons.contains_key(&o.token) {
                            warn!("Overlay token '{}' has no icon", o.token);
                        }
                        out.pois.push(Poi::Road {
                            x: pos.x,
                            y: pos.y,
                            icon: o.token.clone(),
                            dlc_guard: o.dlc_guard,
                            node_uid: o.node_uid,
                        });
                    }
                    OverlayKind::Parking => {
                        out.pois.push(Poi::Facility {
                            x: pos.x,
                            y: pos.y,
                            icon: "parking_ico".to_string(),
                            from_item_type: Some("mapOverlay".to_string()),
                            item_node_uids: vec![o.node_uid],
                            dlc_guard: Some(o.dlc_guard),
                        });
                    }
                    OverlayKind::Landmark => {
                        let key = format!("landmark_{}", o.token);
                        let label = match ctx.locale.get(&key) {
                            Some(label) => label.clone(),
                            None => {
                                warn!("Missing locale entry '{key}'");
                                String::new()
                            }
                        };
                        out.pois.push(Poi::Landmark {
                            x: pos.x,
                            y: pos.y,
                            icon: "photo_sight_captured".to_string(),
                            label,
                            dlc_guard: o.dlc_guard,
                        });
                    }
                }
            }
            ItemKind::Company(c) => company_poi(
                ctx,
                item,
                c,
                buckets,
                &mut no_poi_companies,
                &mut fallback_poi_companies,
                out,
            ),
            ItemKind::Ferry(f) => {
                let Some(pos) = node_pos(&ctx.nodes, f.node_uid) else {
                    warn!("Ferry item {:#x} references missing node", item.uid);
                    continue;
                };
                // Known token; stage B filtered the rest out.
                let def = &ctx.defs.ferries[&f.token];
                let label = localized_name(&def.name, def.name_localized.as_deref(), ctx.locale);
                out.pois.push(if f.train {
                    Poi::Train {
                        x: pos.x,
                        y: pos.y,
                        icon: "train_ico".to_string(),
                        label,
                    }
                } else {
                    Poi::Ferry {
                        x: pos.x,
                        y: pos.y,
                        icon: "port_overlay".to_string(),
                        label,
                    }
                });
            }
            ItemKind::Cutscene(c) => {
                // Only the viewpoint flavor of cutscenes qualifies.
                if c.flags & 0xFF != 0 {
                    continue;
                }
                let Some(token) = ctx.defs.viewpoints.get(&item.uid) else {
                    warn!("Viewpoint cutscene {:#x} has no label token", item.uid);
                    continue;
                };
                let Some(pos) = node_pos(&ctx.nodes, c.node_uid) else {
                    warn!("Cutscene item {:#x} references missing node", item.uid);
                    continue;
                };
                let label = match ctx.locale.get(token) {
                    Some(label) => label.clone(),
                    None => {
                        warn!("Missing locale entry '{token}'");
                        String::new()
                    }
                };
                out.pois.push(Poi::Viewpoint {
                    x: pos.x,
                    y: pos.y,
                    icon: "viewpoint".to_string(),
                    label,
                });
            }
            ItemKind::Trigger(t) => {
                if !t.actions.iter().any(|a| a == HUD_PARKING_ACTION) {
                    continue;
                }
                let Some(first) = t.node_uids.first() else {
                    continue;
                };
                let Some(pos) = node_pos(&ctx.nodes, *first) else {
                    warn!("Trigger item {:#x} references missing node", item.uid);
                    continue;
                };
                out.pois.push(Poi::Facility {
                    x: pos.x,
                    y: pos.y,
                    icon: "parking_ico".to_string(),
                    from_item_type: Some("trigger".to_string()),
                    item_node_uids: t.node_uids.clone(),
                    dlc_guard: Some(t.dlc_guard),
                });
            }
            _ => unreachable!("item kind cannot be poiful"),
        }
    }

    if !no_poi_companies.is_empty() {
        debug!("{} company tokens without icons: {no_poi_companies:?}", no_poi_companies.len());
    }
    if !fallback_poi_companies.is_empty() {
        debug!(
            "{} companies used their node position: {fallback_poi_companies:?}",
            fallback_poi_companies.len()
        );
    }
}

fn prefab_pois(ctx: &Ctx<'_>, p: &PrefabItem, out: &mut MapData) {
    let Some(desc) = ctx.defs.prefab_descriptions.get(&p.token) else {
        return; // already warned during bucketing
    };
    for sp in &desc.spawn_points {
        let Some(icon) = facility_icon(sp.kind) else {
            continue;
        };
        let Some(pos) = to_map_position(&ctx.nodes, p, desc, DVec2::new(sp.x, sp.y)) else {
            warn!("Cannot project spawn point of prefab '{}'", p.token);
            continue;
        };
        out.pois.push(Poi::Facility {
            x: pos.x,
            y: pos.y,
            icon: icon.to_string(),
            from_item_type: None,
            item_node_uids: Vec::new(),
            dlc_guard: None,
        });
    }
    for tp in &desc.trigger_points {
        if tp.action != HUD_PARKING_ACTION {
            continue;
        }
        let Some(pos) = to_map_position(&ctx.nodes, p, desc, DVec2::new(tp.x, tp.y)) else {
            warn!("Cannot project trigger point of prefab '{}'", p.token);
            continue;
        };
        out.pois.push(Poi::Facility {
            x: pos.x,
            y: pos.y,
            icon: "parking_ico".to_string(),
            from_item_type: Some("prefab".to_string()),
            item_node_uids: p.node_uids.clone(),
            dlc_guard: Some(p.dlc_guard),
        });
    }
}

#[allow(clippy::too_many_arguments)]
fn company_poi<'a>(
    ctx: &Ctx<'_>,
    item: &Item,
    c: &'a CompanyItem,
    buckets: &Buckets<'_>,
    no_poi_companies: &mut Vec<&'a str>,
    fallback_poi_companies: &mut Vec<&'a str>,
    out: &mut MapData,
) {
    let Some(&(_, prefab)) = buckets.prefabs_by_uid.get(&c.prefab_uid) else {
        warn!(
            "Company item {:#x} references unknown prefab {:#x}",
            item.uid, c.prefab_uid
        );
        return;
    };

    let has_icon = ctx.icons.contains_key(&c.token);
    if !has_icon {
        no_poi_companies.push(&c.token);
    }

    let desc = ctx.defs.prefab_descriptions.get(&prefab.token);
    let projected = desc.and_then(|d| {
        let sp = d
            .spawn_points
            .iter()
            .find(|s| s.kind == SpawnPointKind::CompanyPos)?;
        to_map_position(&ctx.nodes, prefab, d, DVec2::new(sp.x, sp.y))
    });
    let pos = match projected {
        Some(pos) => pos,
        None => {
            let Some(pos) = node_pos(&ctx.nodes, c.node_uid) else {
                warn!("Company item {:#x} references missing node", item.uid);
                return;
            };
            fallback_poi_companies.push(&c.token);
            pos
        }
    };

    let name = match ctx.defs.companies.get(&c.token) {
        Some(def) => def.name.clone(),
        None => {
            warn!("Unknown company token '{}'", c.token);
            c.token.clone()
        }
    };

    if has_icon {
        out.pois.push(Poi::Company {
            x: pos.x,
            y: pos.y,
            icon: c.token.clone(),
            label: name.clone(),
        });
    }
    out.companies.push(CompanyOut {
        token: c.token.clone(),
        name,
        city_token: c.city_token.clone(),
        x: pos.x,
        y: pos.y,
    });
}

/// Stage D: combine definition cities with their placed areas. A city
/// without a non-hidden "location" area is dropped with a warning.
fn augment_cities(ctx: &Ctx<'_>, buckets: &Buckets<'_>, out: &mut MapData) {
    let mut tokens: Vec<&String> = ctx.defs.cities.keys().collect();
    tokens.sort();
    for token in tokens {
        let def = &ctx.defs.cities[token];
        let Some(areas) = buckets.city_areas.get(token) else {
            warn!("City '{token}' has no sector areas");
            continue;
        };
        let location = areas.iter().find(|a| match &a.kind {
            ItemKind::City(c) => !c.hidden,
            _ => false,
        });
        let Some(location) = location else {
            warn!("City '{token}' has no visible location area");
            continue;
        };
        let ItemKind::City(lc) = &location.kind else {
            unreachable!()
        };
        let Some(pos) = node_pos(&ctx.nodes, lc.node_uid) else {
            warn!("City '{token}' location references missing node");
            continue;
        };
        out.cities.push(CityOut {
            token: token.clone(),
            name: localized_name(&def.name, def.name_localized.as_deref(), ctx.locale),
            country_token: def.country_token.clone(),
            population: def.population,
            x: pos.x,
            y: pos.y,
            areas: areas.iter().map(|a| (*a).clone()).collect(),
        });
    }
}

/// Stage E: resolve ferry connection endpoints through the placed ferry
/// items.
fn augment_ferries(ctx: &Ctx<'_>, buckets: &Buckets<'_>, out: &mut MapData) {
    let mut tokens: Vec<&String> = ctx.defs.ferries.keys().collect();
    tokens.sort();
    for token in tokens {
        let def = &ctx.defs.ferries[token];
        let Some((item, f)) = buckets.ferry_items.get(token) else {
            debug!("Ferry '{token}' is not placed in any sector");
            continue;
        };
        let Some(pos) = node_pos(&ctx.nodes, f.node_uid) else {
            warn!("Ferry item {:#x} references missing node", item.uid);
            continue;
        };

        let mut connections = Vec::new();
        for conn in &def.connections {
            let Some((_, other)) = buckets.ferry_items.get(&conn.target_token) else {
                warn!(
                    "Ferry '{token}' connection to unplaced '{}'",
                    conn.target_token
                );
                continue;
            };
            let Some(other_pos) = node_pos(&ctx.nodes, other.node_uid) else {
                warn!("Ferry '{}' references missing node", conn.target_token);
                continue;
            };
            let name = match ctx.defs.ferries.get(&conn.target_token) {
                Some(d) => localized_name(&d.name, d.name_localized.as_deref(), ctx.locale),
                None => conn.target_token.clone(),
            };
            connections.push(FerryConnectionOut {
                token: conn.target_token.clone(),
                name,
                x: other_pos.x,
                y: other_pos.y,
                price: conn.price,
                time: conn.time,
                distance: conn.distance,
                intermediate_points: conn.intermediate_points.clone(),
            });
        }

        out.ferries.push(FerryOut {
            token: token.clone(),
            name: localized_name(&def.name, def.name_localized.as_deref(), ctx.locale),
            train: f.train,
            x: pos.x,
            y: pos.y,
            connections,
        });
    }
}

/// Stage F: flag roads that a terrain divider visually splits. Dividers are
/// terrains plus the configured building schemes and curve models; a road
/// counts as split when some same-sector divider's endpoints sit within the
/// threshold of the road's endpoints, in either orientation.
fn detect_road_splits(
    ctx: &Ctx<'_>,
    bundle: &SectorBundle,
    buckets: &mut Buckets<'_>,
    out: &mut MapData,
) {
    let mut sector_keys: Vec<&(i32, i32)> = bundle.sectors.keys().collect();
    sector_keys.sort();

    for key in sector_keys {
        let sector = &bundle.sectors[key];
        let mut roads: Vec<&Item> = Vec::new();
        // (item, endpoint uids, is_terrain)
        let mut dividers: Vec<(&Item, u64, u64, bool)> = Vec::new();

        for item in sector.items_by_uid.values() {
            match &item.kind {
                ItemKind::Road(_) => roads.push(item),
                ItemKind::Terrain(t) => {
                    dividers.push((item, t.start_node_uid, t.end_node_uid, true))
                }
                ItemKind::Building(b)
                    if ctx.options.divider_building_schemes.contains(&b.scheme) =>
                {
                    dividers.push((item, b.start_node_uid, b.end_node_uid, false))
                }
                ItemKind::Curve(c)
                    if ctx.options.divider_curve_models.contains(&c.model_token) =>
                {
                    dividers.push((item, c.start_node_uid, c.end_node_uid, false))
                }
                _ => {}
            }
        }

        roads.sort_by_key(|i| i.uid);
        for road in roads {
            let ItemKind::Road(r) = &road.kind else {
                unreachable!()
            };
            let ends = endpoints(&ctx.nodes, r.start_node_uid, r.end_node_uid);
            let divided = ends.is_some_and(|road_ends| {
                dividers.iter().any(|(_, s, e, _)| {
                    endpoints(&ctx.nodes, *s, *e).is_some_and(|div_ends| {
                        within(road_ends, div_ends, ctx.options.divider_distance)
                    })
                })
            });
            let mut emitted = road.clone();
            if let ItemKind::Road(r) = &mut emitted.kind {
                r.maybe_divided = Some(divided);
            }
            out.roads.push(emitted);
        }

        dividers.sort_by_key(|(i, ..)| i.uid);
        for (item, start, end, is_terrain) in dividers {
            if !is_terrain {
                buckets.referenced.extend([start, end]);
                out.dividers.push(item.clone());
            }
        }
    }
}

/// Stage G: mileage targets without explicit coordinates take their node's
/// position, rounded to two decimals.
fn augment_mileage_targets(ctx: &Ctx<'_>, out: &mut MapData) {
    let mut targets = ctx.defs.mileage_targets.clone();
    for target in targets.values_mut() {
        if target.x.is_some() || target.y.is_some() {
            continue;
        }
        let Some(uid) = target.node_uid else {
            continue;
        };
        match ctx.nodes.get(&uid) {
            Some(node) => {
                target.x = Some(round2(node.x));
                target.y = Some(round2(node.y));
            }
            None => warn!(
                "Mileage target '{}' references missing node {uid:#x}",
                target.token
            ),
        }
    }
    out.mileage_targets = targets;
}

/// Definition dictionaries passed through to the bundle, display names
/// resolved.
fn fill_definitions(defs: &DefCatalog, locale: &LocaleTable, out: &mut MapData) {
    let mut countries: Vec<_> = defs.countries.values().cloned().collect();
    countries.sort_by(|a, b| a.token.cmp(&b.token));
    for c in &mut countries {
        c.name = localized_name(&c.name, c.name_localized.take().as_deref(), locale);
    }
    out.countries = countries;

    let mut company_defs: Vec<_> = defs.companies.values().cloned().collect();
    company_defs.sort_by(|a, b| a.token.cmp(&b.token));
    out.company_defs = company_defs;

    out.road_looks = defs.road_looks.clone();
    out.prefab_descriptions = defs.prefab_descriptions.clone();
    out.model_descriptions = defs.model_descriptions.clone();
    out.achievements = defs.achievements.clone();
    out.routes = defs.routes.clone();
    if out.mileage_targets.is_empty() {
        out.mileage_targets = defs.mileage_targets.clone();
    }
}

/// Project a prefab-local point into map space through the prefab's placed
/// origin node.
pub fn to_map_position(
    nodes: &HashMap<u64, &Node>,
    prefab: &PrefabItem,
    desc: &PrefabDescription,
    point: DVec2,
) -> Option<DVec2> {
    let map_node = nodes.get(prefab.node_uids.first()?)?;
    let origin = desc.nodes.get(prefab.origin_node_index as usize)?;
    let rotation = map_node.rotation - origin.rotation;
    let local = point - DVec2::new(origin.x, origin.y);
    Some(DVec2::new(map_node.x, map_node.y) + DVec2::from_angle(rotation).rotate(local))
}

fn facility_icon(kind: SpawnPointKind) -> Option<&'static str> {
    Some(match kind {
        SpawnPointKind::GasStation => "gas_ico",
        SpawnPointKind::ServiceStation => "service_ico",
        SpawnPointKind::WeighStation => "weigh_station_ico",
        SpawnPointKind::TruckDealer => "dealer_ico",
        SpawnPointKind::Buy => "garage_large_ico",
        SpawnPointKind::Recruitment => "recruitment_ico",
        _ => return None,
    })
}

fn node_pos(nodes: &HashMap<u64, &Node>, uid: u64) -> Option<DVec2> {
    nodes.get(&uid).map(|n| DVec2::new(n.x, n.y))
}

fn endpoints(nodes: &HashMap<u64, &Node>, start: u64, end: u64) -> Option<(DVec2, DVec2)> {
    Some((node_pos(nodes, start)?, node_pos(nodes, end)?))
}

fn within(a: (DVec2, DVec2), b: (DVec2, DVec2), distance: f64) -> bool {
    (a.0.distance(b.0) <= distance && a.1.distance(b.1) <= distance)
        || (a.0.distance(b.1) <= distance && a.1.distance(b.0) <= distance)
}

fn resolve_nodes(nodes: &HashMap<u64, &Node>, uids: &HashSet<u64>) -> Vec<[i64; 3]> {
    let mut ordered: Vec<&u64> = uids.iter().collect();
    ordered.sort();
    let mut dropped = 0usize;
    let resolved = ordered
        .into_iter()
        .filter_map(|uid| match nodes.get(uid) {
            Some(n) => Some([n.x.round() as i64, n.y.round() as i64, n.z.round() as i64]),
            None => {
                dropped += 1;
                None
            }
        })
        .collect();
    if dropped > 0 {
        debug!("{dropped} referenced node UIDs have no backing node");
    }
    resolved
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
