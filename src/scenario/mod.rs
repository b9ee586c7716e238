//! Scenario requests and their resolution against the reference network.
//!
//! A [`ScenarioRequest`] is what a user writes: any subset of node lists, mode lists,
//! coefficient overrides, scalar overrides and event flags. [`ScenarioRequest::resolve`]
//! turns it into a [`Scenario`] where every table is complete for the selected nodes
//! and modes, events have been folded into the per-layer mode sets and cost
//! multipliers, and the inventory statistics have been computed.
//!
//! ```rust
//! use supplynet::network::{Layer, Mode};
//! use supplynet::scenario::{Events, ScenarioRequest};
//!
//! let request = ScenarioRequest {
//!     events: Events {
//!         suez_canal: true,
//!         ..Events::default()
//!     },
//!     ..ScenarioRequest::default()
//! };
//! let scenario = request.resolve().unwrap();
//! assert_eq!(scenario.modes(Layer::PlantToCrossdock), &[Mode::Air]);
//! ```

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    error::Error,
    fmt, fs,
    path::Path,
};

use itertools::Itertools;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::network::defaults::{self, CATALOG, Catalog};
use crate::network::{DistanceMatrix, Layer, Mode, Symbol};

pub mod stats;

/// Errors raised while resolving a request
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A selected node or mode has no value in a table that references it
    MissingCoefficient { table: &'static str, key: String },
    /// A pair of selected nodes has no distance
    MissingDistance {
        layer: Layer,
        origin: Symbol,
        destination: Symbol,
    },
    /// A numeric parameter is outside its valid range
    InvalidParameter {
        name: String,
        value: f64,
        expected: &'static str,
    },
    /// A node appears twice in the same set
    DuplicateNode { role: &'static str, node: Symbol },
    /// An override names a node that is neither in the catalog nor requested
    UnknownNode { table: &'static str, node: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingCoefficient { table, key } => {
                write!(f, "No value for \"{}\" in table {}", key, table)
            }
            ConfigError::MissingDistance {
                layer,
                origin,
                destination,
            } => write!(
                f,
                "No {} distance from \"{}\" to \"{}\"",
                layer, origin, destination
            ),
            ConfigError::InvalidParameter {
                name,
                value,
                expected,
            } => write!(f, "Invalid {} = {}: expected {}", name, value, expected),
            ConfigError::DuplicateNode { role, node } => {
                write!(f, "{} \"{}\" is listed more than once", role, node)
            }
            ConfigError::UnknownNode { table, node } => {
                write!(f, "Table {} names unknown node \"{}\"", table, node)
            }
        }
    }
}

impl Error for ConfigError {}

/// Scenario events that reshape the network or its costs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Events {
    /// Sea transport between plants and crossdocks is unavailable
    pub suez_canal: bool,
    /// Transport and last-mile costs are multiplied by `oil_price_multiplier`
    pub oil_crisis: bool,
    /// Air transport is unavailable everywhere
    pub volcano: bool,
    /// Sourcing costs are multiplied by `tariff_rate`
    pub trade_war: bool,
    pub tariff_rate: f64,
    pub oil_price_multiplier: f64,
}

impl Default for Events {
    fn default() -> Self {
        Self {
            suez_canal: false,
            oil_crisis: false,
            volcano: false,
            trade_war: false,
            tariff_rate: 1.0,
            oil_price_multiplier: defaults::OIL_CRISIS_MULTIPLIER,
        }
    }
}

/// A transport mode made unavailable on one layer, or on every layer when `layer` is
/// absent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModeBlackout {
    #[serde(default)]
    pub layer: Option<Layer>,
    pub mode: Mode,
}

/// Single distance override
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DistanceOverride {
    pub layer: Layer,
    pub origin: String,
    pub destination: String,
    pub km: f64,
}

/// A partially specified scenario.
///
/// Every field is optional; anything left out falls back to the reference network.
/// Override tables merge key by key over the reference tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScenarioRequest {
    pub name: Option<String>,

    pub plants: Option<Vec<String>>,
    pub crossdocks: Option<Vec<String>>,
    pub new_locations: Option<Vec<String>>,
    pub dcs: Option<Vec<String>>,
    pub retailers: Option<Vec<String>>,
    /// Modes of the crossdock/new location → DC and DC → retailer layers
    pub modes: Option<Vec<Mode>>,
    /// Modes of the plant → crossdock layer, by default the reference layer-1 modes
    /// that are also in `modes`
    pub layer1_modes: Option<Vec<Mode>>,

    /// Open/close decisions for new locations, true by default
    pub use_new_locations: Option<bool>,
    /// Replace exact demand with demand plus a penalised shortfall
    pub allow_unmet_demand: Option<bool>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub demand: BTreeMap<String, f64>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub sourcing_cost: BTreeMap<String, f64>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub plant_co2_kg: BTreeMap<String, f64>,
    /// Plants are uncapacitated unless listed here
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub plant_capacity: BTreeMap<String, f64>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub crossdock_handling: BTreeMap<String, f64>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub dc_capacity: BTreeMap<String, f64>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub dc_handling: BTreeMap<String, f64>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub new_location_capacity: BTreeMap<String, f64>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub new_location_opening_cost: BTreeMap<String, f64>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub new_location_operating_cost: BTreeMap<String, f64>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub new_location_co2_kg: BTreeMap<String, f64>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub transport_rate: BTreeMap<Mode, f64>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub emission_factor: BTreeMap<Mode, f64>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub speed: BTreeMap<Mode, f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub distances: Vec<DistanceOverride>,

    pub product_weight_kg: Option<f64>,
    pub co2_price_per_ton: Option<f64>,
    pub co2_price_per_ton_new: Option<f64>,
    pub co2_baseline_tons: Option<f64>,
    pub co2_reduction_target: Option<f64>,
    pub lastmile_unit_cost: Option<f64>,
    pub lastmile_co2_kg: Option<f64>,
    pub shortage_penalty: Option<f64>,
    pub holding_cost: Option<f64>,
    pub service_level: Option<f64>,
    pub average_distance_km: Option<f64>,
    /// Overrides the sample standard deviation of the resolved demand
    pub demand_std: Option<f64>,
    /// Multiplies every resolved demand
    pub demand_scale: Option<f64>,
    pub unmet_demand_penalty: Option<f64>,

    pub events: Events,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub blocked_modes: Vec<ModeBlackout>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Plant {
    pub id: Symbol,
    pub sourcing_cost: f64,
    pub co2_kg_per_unit: f64,
    pub capacity: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Crossdock {
    pub id: Symbol,
    pub handling_cost: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewLocation {
    pub id: Symbol,
    pub capacity: f64,
    pub opening_cost: f64,
    pub operating_cost: f64,
    pub co2_kg_per_unit: f64,
}

impl NewLocation {
    /// Cost incurred once the location is opened
    pub fn fixed_cost(&self) -> f64 {
        self.opening_cost + self.operating_cost
    }

    /// Production cost per unit shipped, a fixed budget spread over the capacity
    pub fn unit_production_cost(&self) -> f64 {
        if self.capacity > 0.0 {
            defaults::NEW_LOCATION_PRODUCTION_BUDGET / self.capacity
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DistributionCenter {
    pub id: Symbol,
    pub capacity: f64,
    pub handling_cost: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Retailer {
    pub id: Symbol,
    pub demand: f64,
}

/// Per-mode coefficients after resolution
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModeParameters {
    /// €/kg·km
    pub transport_rate: f64,
    /// t CO₂ per t·km
    pub emission_factor: f64,
    pub lead_time_days: f64,
    pub holding_cost: f64,
    /// Safety-stock cost of the mode over the whole demand, €
    pub safety_stock: f64,
}

impl ModeParameters {
    /// Pipeline holding cost plus the per-unit share of the safety stock
    pub fn inventory_cost_per_unit(&self, total_demand: f64) -> f64 {
        let pipeline = self.lead_time_days * self.holding_cost;
        if total_demand > 0.0 {
            pipeline + self.safety_stock / total_demand
        } else {
            pipeline
        }
    }
}

/// A flow lane: origin, destination, mode and its length
#[derive(Debug, Clone, PartialEq)]
pub struct Lane {
    pub origin: Symbol,
    pub destination: Symbol,
    pub mode: Mode,
    pub distance_km: f64,
}

/// A fully resolved scenario, ready for model assembly
#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: String,
    pub plants: Vec<Plant>,
    pub crossdocks: Vec<Crossdock>,
    pub new_locations: Vec<NewLocation>,
    pub dcs: Vec<DistributionCenter>,
    pub retailers: Vec<Retailer>,

    pub layer_modes: BTreeMap<Layer, Vec<Mode>>,
    pub mode_parameters: BTreeMap<Mode, ModeParameters>,
    pub distances: BTreeMap<Layer, DistanceMatrix>,

    pub product_weight_kg: f64,
    pub co2_price_per_ton: f64,
    pub co2_price_per_ton_new: f64,
    pub co2_baseline_tons: f64,
    pub co2_reduction_target: f64,
    pub lastmile_unit_cost: f64,
    pub lastmile_co2_kg: f64,
    /// Applied to transport and last-mile costs
    pub transport_cost_multiplier: f64,
    /// Applied to sourcing costs
    pub sourcing_cost_multiplier: f64,
    pub allow_unmet_demand: bool,
    pub unmet_demand_penalty: f64,
    pub events: Events,
}

impl Scenario {
    pub fn modes(&self, layer: Layer) -> &[Mode] {
        self.layer_modes
            .get(&layer)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Maximum total emissions allowed, tonnes CO₂
    pub fn emission_cap(&self) -> f64 {
        self.co2_baseline_tons * (1.0 - self.co2_reduction_target)
    }

    pub fn total_demand(&self) -> f64 {
        self.retailers.iter().map(|r| r.demand).sum()
    }

    pub fn origins(&self, layer: Layer) -> Vec<Symbol> {
        match layer {
            Layer::PlantToCrossdock => self.plants.iter().map(|n| n.id.clone()).collect(),
            Layer::CrossdockToDc => self.crossdocks.iter().map(|n| n.id.clone()).collect(),
            Layer::NewLocationToDc => self.new_locations.iter().map(|n| n.id.clone()).collect(),
            Layer::DcToRetailer => self.dcs.iter().map(|n| n.id.clone()).collect(),
        }
    }

    pub fn destinations(&self, layer: Layer) -> Vec<Symbol> {
        match layer {
            Layer::PlantToCrossdock => self.crossdocks.iter().map(|n| n.id.clone()).collect(),
            Layer::CrossdockToDc | Layer::NewLocationToDc => {
                self.dcs.iter().map(|n| n.id.clone()).collect()
            }
            Layer::DcToRetailer => self.retailers.iter().map(|n| n.id.clone()).collect(),
        }
    }

    /// Every (origin, destination, mode) lane of a layer, origin-major
    pub fn lanes(&self, layer: Layer) -> Vec<Lane> {
        let Some(matrix) = self.distances.get(&layer) else {
            return Vec::new();
        };
        let destinations = self.destinations(layer);
        self.origins(layer)
            .into_iter()
            .cartesian_product(destinations)
            .cartesian_product(self.modes(layer).iter().copied())
            .filter_map(|((origin, destination), mode)| {
                let distance_km = matrix.get(&origin, &destination)?;
                Some(Lane {
                    origin,
                    destination,
                    mode,
                    distance_km,
                })
            })
            .collect()
    }
}

fn check_range(
    name: &str,
    value: f64,
    valid: impl Fn(f64) -> bool,
    expected: &'static str,
) -> Result<f64, ConfigError> {
    if valid(value) {
        Ok(value)
    } else {
        Err(ConfigError::InvalidParameter {
            name: name.to_string(),
            value,
            expected,
        })
    }
}

fn non_negative(name: &str, value: f64) -> Result<f64, ConfigError> {
    check_range(name, value, |v| v >= 0.0 && v.is_finite(), "a finite value >= 0")
}

fn positive(name: &str, value: f64) -> Result<f64, ConfigError> {
    check_range(name, value, |v| v > 0.0 && v.is_finite(), "a finite value > 0")
}

fn select_nodes(
    role: &'static str,
    requested: Option<&Vec<String>>,
    reference: &[Symbol],
) -> Result<Vec<Symbol>, ConfigError> {
    let nodes: Vec<Symbol> = match requested {
        Some(names) => names.iter().map(|name| Symbol::from(name.as_str())).collect(),
        None => reference.to_vec(),
    };

    let mut seen = HashSet::new();
    for node in &nodes {
        if !seen.insert(node.clone()) {
            return Err(ConfigError::DuplicateNode {
                role,
                node: node.clone(),
            });
        }
    }
    Ok(nodes)
}

/// Catalog nodes of a role together with the requested ones
fn known_nodes(requested: Option<&Vec<String>>, reference: &[Symbol]) -> HashSet<Symbol> {
    reference
        .iter()
        .cloned()
        .chain(
            requested
                .into_iter()
                .flatten()
                .map(|name| Symbol::from(name.as_str())),
        )
        .collect()
}

fn check_known<'a>(
    table: &'static str,
    names: impl IntoIterator<Item = &'a String>,
    known: &HashSet<Symbol>,
) -> Result<(), ConfigError> {
    match names
        .into_iter()
        .find(|name| !known.contains(&Symbol::from(name.as_str())))
    {
        Some(name) => Err(ConfigError::UnknownNode {
            table,
            node: name.clone(),
        }),
        None => Ok(()),
    }
}

fn lookup(
    table: &'static str,
    node: &Symbol,
    overrides: &BTreeMap<String, f64>,
    reference: &HashMap<Symbol, f64>,
) -> Result<f64, ConfigError> {
    overrides
        .get(&**node)
        .or_else(|| reference.get(node))
        .copied()
        .ok_or_else(|| ConfigError::MissingCoefficient {
            table,
            key: node.to_string(),
        })
}

fn lookup_mode(
    table: &'static str,
    mode: Mode,
    overrides: &BTreeMap<Mode, f64>,
    reference: &BTreeMap<Mode, f64>,
) -> Result<f64, ConfigError> {
    overrides
        .get(&mode)
        .or_else(|| reference.get(&mode))
        .copied()
        .ok_or_else(|| ConfigError::MissingCoefficient {
            table,
            key: mode.to_string(),
        })
}

impl ScenarioRequest {
    /// Read a request from a JSON file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// A request spelling out the reference network, used as a starting point for
    /// hand-written scenarios
    pub fn reference() -> Self {
        let names = |nodes: &[Symbol]| Some(nodes.iter().map(|n| n.to_string()).collect());
        Self {
            name: Some("reference".to_string()),
            plants: names(&CATALOG.plants),
            crossdocks: names(&CATALOG.crossdocks),
            new_locations: names(&CATALOG.new_locations),
            dcs: names(&CATALOG.dcs),
            retailers: names(&CATALOG.retailers),
            modes: Some(CATALOG.modes.clone()),
            layer1_modes: Some(CATALOG.layer1_modes.clone()),
            use_new_locations: Some(true),
            allow_unmet_demand: Some(false),
            product_weight_kg: Some(defaults::PRODUCT_WEIGHT_KG),
            co2_price_per_ton: Some(defaults::CO2_PRICE_PER_TON),
            co2_price_per_ton_new: Some(defaults::CO2_PRICE_PER_TON_NEW),
            co2_baseline_tons: Some(defaults::CO2_BASELINE_TONS),
            co2_reduction_target: Some(defaults::CO2_REDUCTION_TARGET),
            lastmile_unit_cost: Some(defaults::LASTMILE_UNIT_COST),
            lastmile_co2_kg: Some(defaults::LASTMILE_CO2_KG),
            shortage_penalty: Some(defaults::SHORTAGE_PENALTY),
            holding_cost: Some(defaults::HOLDING_COST),
            service_level: Some(defaults::SERVICE_LEVEL),
            average_distance_km: Some(defaults::AVERAGE_DISTANCE_KM),
            ..Self::default()
        }
    }

    pub fn with_co2_reduction_target(&self, target: f64) -> Self {
        Self {
            co2_reduction_target: Some(target),
            ..self.clone()
        }
    }

    pub fn with_unmet_demand(&self) -> Self {
        Self {
            allow_unmet_demand: Some(true),
            ..self.clone()
        }
    }

    pub fn allows_unmet_demand(&self) -> bool {
        self.allow_unmet_demand.unwrap_or(false)
    }

    /// Resolve against the reference network
    pub fn resolve(&self) -> Result<Scenario, ConfigError> {
        self.resolve_against(&CATALOG)
    }

    /// Reject override keys and distance endpoints that name no known node
    fn check_override_keys(&self, catalog: &Catalog) -> Result<(), ConfigError> {
        let plants = known_nodes(self.plants.as_ref(), &catalog.plants);
        let crossdocks = known_nodes(self.crossdocks.as_ref(), &catalog.crossdocks);
        let new_locations = known_nodes(self.new_locations.as_ref(), &catalog.new_locations);
        let dcs = known_nodes(self.dcs.as_ref(), &catalog.dcs);
        let retailers = known_nodes(self.retailers.as_ref(), &catalog.retailers);

        let tables = [
            ("demand", &self.demand, &retailers),
            ("sourcing_cost", &self.sourcing_cost, &plants),
            ("plant_co2_kg", &self.plant_co2_kg, &plants),
            ("plant_capacity", &self.plant_capacity, &plants),
            ("crossdock_handling", &self.crossdock_handling, &crossdocks),
            ("dc_capacity", &self.dc_capacity, &dcs),
            ("dc_handling", &self.dc_handling, &dcs),
            ("new_location_capacity", &self.new_location_capacity, &new_locations),
            ("new_location_opening_cost", &self.new_location_opening_cost, &new_locations),
            ("new_location_operating_cost", &self.new_location_operating_cost, &new_locations),
            ("new_location_co2_kg", &self.new_location_co2_kg, &new_locations),
        ];
        for (table, overrides, known) in tables {
            check_known(table, overrides.keys(), known)?;
        }

        for entry in &self.distances {
            let (origins, destinations) = match entry.layer {
                Layer::PlantToCrossdock => (&plants, &crossdocks),
                Layer::CrossdockToDc => (&crossdocks, &dcs),
                Layer::NewLocationToDc => (&new_locations, &dcs),
                Layer::DcToRetailer => (&dcs, &retailers),
            };
            check_known("distances", [&entry.origin], origins)?;
            check_known("distances", [&entry.destination], destinations)?;
        }
        Ok(())
    }

    /// Resolve against an arbitrary catalog
    pub fn resolve_against(&self, catalog: &Catalog) -> Result<Scenario, ConfigError> {
        let name = self.name.clone().unwrap_or_else(|| "scenario".to_string());
        self.check_override_keys(catalog)?;

        let plant_ids = select_nodes("Plant", self.plants.as_ref(), &catalog.plants)?;
        let crossdock_ids =
            select_nodes("Crossdock", self.crossdocks.as_ref(), &catalog.crossdocks)?;
        let new_location_ids = if self.use_new_locations.unwrap_or(true) {
            select_nodes(
                "New location",
                self.new_locations.as_ref(),
                &catalog.new_locations,
            )?
        } else {
            Vec::new()
        };
        let dc_ids = select_nodes("DC", self.dcs.as_ref(), &catalog.dcs)?;
        let retailer_ids = select_nodes("Retailer", self.retailers.as_ref(), &catalog.retailers)?;

        let demand_scale = non_negative("demand_scale", self.demand_scale.unwrap_or(1.0))?;

        let plants = plant_ids
            .iter()
            .map(|id| -> Result<Plant, ConfigError> {
                Ok(Plant {
                    id: id.clone(),
                    sourcing_cost: non_negative(
                        "sourcing_cost",
                        lookup("sourcing_cost", id, &self.sourcing_cost, &catalog.sourcing_cost)?,
                    )?,
                    co2_kg_per_unit: non_negative(
                        "plant_co2_kg",
                        lookup("plant_co2_kg", id, &self.plant_co2_kg, &catalog.plant_co2_kg)?,
                    )?,
                    capacity: self
                        .plant_capacity
                        .get(&**id)
                        .map(|&capacity| non_negative("plant_capacity", capacity))
                        .transpose()?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let crossdocks = crossdock_ids
            .iter()
            .map(|id| -> Result<Crossdock, ConfigError> {
                Ok(Crossdock {
                    id: id.clone(),
                    handling_cost: non_negative(
                        "crossdock_handling",
                        lookup("crossdock_handling", id, &self.crossdock_handling, &catalog.crossdock_handling)?,
                    )?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let new_locations = new_location_ids
            .iter()
            .map(|id| -> Result<NewLocation, ConfigError> {
                Ok(NewLocation {
                    id: id.clone(),
                    capacity: non_negative(
                        "new_location_capacity",
                        lookup(
                            "new_location_capacity",
                            id,
                            &self.new_location_capacity,
                            &catalog.new_location_capacity,
                        )?,
                    )?,
                    opening_cost: non_negative(
                        "new_location_opening_cost",
                        lookup("new_location_opening_cost", id, &self.new_location_opening_cost, &catalog.new_location_opening_cost)?,
                    )?,
                    operating_cost: non_negative(
                        "new_location_operating_cost",
                        lookup("new_location_operating_cost", id, &self.new_location_operating_cost, &catalog.new_location_operating_cost)?,
                    )?,
                    co2_kg_per_unit: non_negative(
                        "new_location_co2_kg",
                        lookup(
                            "new_location_co2_kg",
                            id,
                            &self.new_location_co2_kg,
                            &catalog.new_location_co2_kg,
                        )?,
                    )?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let dcs = dc_ids
            .iter()
            .map(|id| -> Result<DistributionCenter, ConfigError> {
                Ok(DistributionCenter {
                    id: id.clone(),
                    capacity: non_negative(
                        "dc_capacity",
                        lookup("dc_capacity", id, &self.dc_capacity, &catalog.dc_capacity)?,
                    )?,
                    handling_cost: non_negative(
                        "dc_handling",
                        lookup("dc_handling", id, &self.dc_handling, &catalog.dc_handling)?,
                    )?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let retailers = retailer_ids
            .iter()
            .map(|id| -> Result<Retailer, ConfigError> {
                let demand = non_negative(
                    "demand",
                    lookup("demand", id, &self.demand, &catalog.demand)?,
                )?;
                Ok(Retailer {
                    id: id.clone(),
                    demand: demand * demand_scale,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let layer_modes = self.resolve_layer_modes(catalog);

        let mut distances = BTreeMap::new();
        for layer in Layer::ALL {
            let origins = match layer {
                Layer::PlantToCrossdock => &plant_ids,
                Layer::CrossdockToDc => &crossdock_ids,
                Layer::NewLocationToDc => &new_location_ids,
                Layer::DcToRetailer => &dc_ids,
            };
            let destinations = match layer {
                Layer::PlantToCrossdock => &crossdock_ids,
                Layer::CrossdockToDc | Layer::NewLocationToDc => &dc_ids,
                Layer::DcToRetailer => &retailer_ids,
            };

            let mut matrix = catalog.distances.get(&layer).cloned().unwrap_or_default();
            for entry in self.distances.iter().filter(|entry| entry.layer == layer) {
                matrix.insert(
                    Symbol::from(entry.origin.as_str()),
                    Symbol::from(entry.destination.as_str()),
                    non_negative("distance", entry.km)?,
                );
            }
            let matrix = matrix.restricted_to(origins, destinations).map_err(
                |(origin, destination)| ConfigError::MissingDistance {
                    layer,
                    origin,
                    destination,
                },
            )?;
            distances.insert(layer, matrix);
        }

        let product_weight_kg = positive(
            "product_weight_kg",
            self.product_weight_kg.unwrap_or(defaults::PRODUCT_WEIGHT_KG),
        )?;
        let co2_reduction_target = check_range(
            "co2_reduction_target",
            self.co2_reduction_target
                .unwrap_or(defaults::CO2_REDUCTION_TARGET),
            |v| (0.0..=1.0).contains(&v),
            "a value in [0, 1]",
        )?;
        let service_level = check_range(
            "service_level",
            self.service_level.unwrap_or(defaults::SERVICE_LEVEL),
            |v| v > 0.0 && v < 1.0,
            "a value in (0, 1)",
        )?;
        let holding_cost =
            non_negative("holding_cost", self.holding_cost.unwrap_or(defaults::HOLDING_COST))?;
        let shortage_penalty = non_negative(
            "shortage_penalty",
            self.shortage_penalty.unwrap_or(defaults::SHORTAGE_PENALTY),
        )?;
        let average_distance_km = non_negative(
            "average_distance_km",
            self.average_distance_km
                .unwrap_or(defaults::AVERAGE_DISTANCE_KM),
        )?;
        let tariff_rate = non_negative("tariff_rate", self.events.tariff_rate)?;
        let oil_price_multiplier =
            non_negative("oil_price_multiplier", self.events.oil_price_multiplier)?;

        let demand_std = match self.demand_std {
            Some(std) => non_negative("demand_std", std)?,
            None => {
                let values: Vec<f64> = retailers.iter().map(|r| r.demand).collect();
                stats::sample_std(&values)
            }
        };

        let mut mode_parameters = BTreeMap::new();
        for mode in layer_modes.values().flatten().copied().unique() {
            let speed = positive(
                "speed",
                lookup_mode("speed", mode, &self.speed, &catalog.speed)?,
            )?;
            let lead_time_days = stats::lead_time_days(mode, average_distance_km, speed);
            mode_parameters.insert(
                mode,
                ModeParameters {
                    transport_rate: non_negative(
                        "transport_rate",
                        lookup_mode(
                            "transport_rate",
                            mode,
                            &self.transport_rate,
                            &catalog.transport_rate,
                        )?,
                    )?,
                    emission_factor: non_negative(
                        "emission_factor",
                        lookup_mode(
                            "emission_factor",
                            mode,
                            &self.emission_factor,
                            &catalog.emission_factor,
                        )?,
                    )?,
                    lead_time_days,
                    holding_cost,
                    safety_stock: stats::safety_stock(
                        lead_time_days,
                        demand_std,
                        shortage_penalty,
                        holding_cost,
                        service_level,
                    ),
                },
            );
        }

        let transport_cost_multiplier = if self.events.oil_crisis {
            oil_price_multiplier
        } else {
            1.0
        };
        let sourcing_cost_multiplier = if self.events.trade_war {
            tariff_rate
        } else {
            1.0
        };

        let scenario = Scenario {
            name,
            plants,
            crossdocks,
            new_locations,
            dcs,
            retailers,
            layer_modes,
            mode_parameters,
            distances,
            product_weight_kg,
            co2_price_per_ton: non_negative(
                "co2_price_per_ton",
                self.co2_price_per_ton
                    .unwrap_or(defaults::CO2_PRICE_PER_TON),
            )?,
            co2_price_per_ton_new: non_negative(
                "co2_price_per_ton_new",
                self.co2_price_per_ton_new
                    .unwrap_or(defaults::CO2_PRICE_PER_TON_NEW),
            )?,
            co2_baseline_tons: non_negative(
                "co2_baseline_tons",
                self.co2_baseline_tons
                    .unwrap_or(defaults::CO2_BASELINE_TONS),
            )?,
            co2_reduction_target,
            lastmile_unit_cost: non_negative(
                "lastmile_unit_cost",
                self.lastmile_unit_cost
                    .unwrap_or(defaults::LASTMILE_UNIT_COST),
            )?,
            lastmile_co2_kg: non_negative(
                "lastmile_co2_kg",
                self.lastmile_co2_kg.unwrap_or(defaults::LASTMILE_CO2_KG),
            )?,
            transport_cost_multiplier,
            sourcing_cost_multiplier,
            allow_unmet_demand: self.allows_unmet_demand(),
            unmet_demand_penalty: non_negative(
                "unmet_demand_penalty",
                self.unmet_demand_penalty
                    .unwrap_or(defaults::UNMET_DEMAND_PENALTY),
            )?,
            events: self.events.clone(),
        };

        info!(
            "resolved scenario '{}': {} plants, {} crossdocks, {} new locations, {} DCs, {} retailers, demand {}",
            scenario.name,
            scenario.plants.len(),
            scenario.crossdocks.len(),
            scenario.new_locations.len(),
            scenario.dcs.len(),
            scenario.retailers.len(),
            scenario.total_demand()
        );
        for (layer, modes) in &scenario.layer_modes {
            debug!("{} modes: [{}]", layer, modes.iter().join(", "));
        }

        Ok(scenario)
    }

    /// Mode set of every layer with all event and explicit blackouts applied
    fn resolve_layer_modes(&self, catalog: &Catalog) -> BTreeMap<Layer, Vec<Mode>> {
        let modes: Vec<Mode> = self
            .modes
            .clone()
            .unwrap_or_else(|| catalog.modes.clone())
            .into_iter()
            .unique()
            .collect();
        let layer1_modes: Vec<Mode> = match &self.layer1_modes {
            Some(requested) => requested.iter().copied().unique().collect(),
            None => catalog
                .layer1_modes
                .iter()
                .copied()
                .filter(|mode| modes.contains(mode))
                .collect(),
        };

        let mut blackouts = self.blocked_modes.clone();
        if self.events.suez_canal {
            blackouts.push(ModeBlackout {
                layer: Some(Layer::PlantToCrossdock),
                mode: Mode::Sea,
            });
        }
        if self.events.volcano {
            blackouts.push(ModeBlackout {
                layer: None,
                mode: Mode::Air,
            });
        }

        Layer::ALL
            .into_iter()
            .map(|layer| {
                let candidates = match layer {
                    Layer::PlantToCrossdock => &layer1_modes,
                    _ => &modes,
                };
                let allowed = candidates
                    .iter()
                    .copied()
                    .filter(|&mode| {
                        !blackouts.iter().any(|blackout| {
                            blackout.mode == mode && blackout.layer.is_none_or(|l| l == layer)
                        })
                    })
                    .collect();
                (layer, allowed)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= 1e-9 * expected.abs().max(1.0),
            "{} != {}",
            actual,
            expected
        );
    }

    #[test]
    fn test_default_request_resolves_reference_network() {
        let scenario = ScenarioRequest::default().resolve().unwrap();

        assert_eq!(scenario.plants.len(), 2);
        assert_eq!(scenario.crossdocks.len(), 3);
        assert_eq!(scenario.new_locations.len(), 5);
        assert_eq!(scenario.dcs.len(), 4);
        assert_eq!(scenario.retailers.len(), 7);
        assert_eq!(scenario.total_demand(), 111_000.0);
        assert_eq!(scenario.modes(Layer::PlantToCrossdock), &[Mode::Air, Mode::Sea]);
        assert_eq!(scenario.modes(Layer::DcToRetailer), &Mode::ALL);
        assert_close(scenario.emission_cap(), 791.21183344807);
        assert_eq!(scenario.lanes(Layer::PlantToCrossdock).len(), 2 * 3 * 2);
        assert_eq!(scenario.lanes(Layer::NewLocationToDc).len(), 5 * 4 * 3);
        assert_eq!(scenario.transport_cost_multiplier, 1.0);
        assert!(!scenario.allow_unmet_demand);
    }

    #[test]
    fn test_mode_parameters_follow_reference_tables() {
        let scenario = ScenarioRequest::default().resolve().unwrap();
        let sea = scenario.mode_parameters[&Mode::Sea];

        assert_eq!(sea.transport_rate, 0.0013);
        assert_eq!(sea.emission_factor, 0.000027);
        assert_close(sea.lead_time_days, 48.0);
        assert!((sea.safety_stock - 12055.4037653689).abs() < 0.01);
        assert_close(
            sea.inventory_cost_per_unit(111_000.0),
            48.0 * 0.85 + sea.safety_stock / 111_000.0,
        );
    }

    #[test]
    fn test_overrides_merge_over_reference_tables() {
        let mut request = ScenarioRequest::default();
        request.dc_capacity.insert("PED".to_string(), 1000.0);
        request.transport_rate.insert(Mode::Road, 0.01);
        request.distances.push(DistanceOverride {
            layer: Layer::DcToRetailer,
            origin: "PED".to_string(),
            destination: "FLUXC".to_string(),
            km: 42.0,
        });

        let scenario = request.resolve().unwrap();
        let ped = scenario.dcs.iter().find(|dc| dc.id == Symbol::from("PED")).unwrap();
        let rix = scenario.dcs.iter().find(|dc| dc.id == Symbol::from("RIX")).unwrap();
        assert_eq!(ped.capacity, 1000.0);
        assert_eq!(rix.capacity, 75000.0);
        assert_eq!(scenario.mode_parameters[&Mode::Road].transport_rate, 0.01);
        assert_eq!(scenario.mode_parameters[&Mode::Air].transport_rate, 0.0105);
        assert_eq!(
            scenario.distances[&Layer::DcToRetailer].get(&Symbol::from("PED"), &Symbol::from("FLUXC")),
            Some(42.0)
        );
    }

    #[test]
    fn test_unknown_node_is_a_missing_coefficient() {
        let request = ScenarioRequest {
            dcs: Some(vec!["PED".to_string(), "MUC".to_string()]),
            ..ScenarioRequest::default()
        };
        assert_eq!(
            request.resolve().unwrap_err(),
            ConfigError::MissingCoefficient {
                table: "dc_capacity",
                key: "MUC".to_string(),
            }
        );
    }

    #[test]
    fn test_new_node_needs_distances() {
        let mut request = ScenarioRequest {
            dcs: Some(vec!["PED".to_string(), "MUC".to_string()]),
            use_new_locations: Some(false),
            ..ScenarioRequest::default()
        };
        request.dc_capacity.insert("MUC".to_string(), 5000.0);
        request.dc_handling.insert("MUC".to_string(), 5.0);

        match request.resolve() {
            Err(ConfigError::MissingDistance {
                layer,
                origin,
                destination,
            }) => {
                assert_eq!(layer, Layer::CrossdockToDc);
                assert_eq!(origin, Symbol::from("ATVIE"));
                assert_eq!(destination, Symbol::from("MUC"));
            }
            other => panic!("expected a missing distance, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_parameters_are_rejected() {
        let target = ScenarioRequest::default().with_co2_reduction_target(1.5);
        assert!(matches!(
            target.resolve(),
            Err(ConfigError::InvalidParameter { ref name, .. }) if name == "co2_reduction_target"
        ));

        let service = ScenarioRequest {
            service_level: Some(1.0),
            ..ScenarioRequest::default()
        };
        assert!(matches!(
            service.resolve(),
            Err(ConfigError::InvalidParameter { ref name, .. }) if name == "service_level"
        ));

        let mut speed = ScenarioRequest::default();
        speed.speed.insert(Mode::Sea, 0.0);
        assert!(matches!(
            speed.resolve(),
            Err(ConfigError::InvalidParameter { ref name, .. }) if name == "speed"
        ));

        let mut demand = ScenarioRequest::default();
        demand.demand.insert("FLUXC".to_string(), -1.0);
        assert!(demand.resolve().is_err());
    }

    #[test]
    fn test_cost_overrides_must_be_non_negative() {
        let tables: [(&str, fn(&mut ScenarioRequest) -> &mut BTreeMap<String, f64>, &str); 5] = [
            ("sourcing_cost", |r| &mut r.sourcing_cost, "TW"),
            ("crossdock_handling", |r| &mut r.crossdock_handling, "ATVIE"),
            ("dc_handling", |r| &mut r.dc_handling, "PED"),
            ("new_location_opening_cost", |r| &mut r.new_location_opening_cost, "HUDTG"),
            ("new_location_operating_cost", |r| &mut r.new_location_operating_cost, "HUDTG"),
        ];

        for (table, overrides, node) in tables {
            let mut request = ScenarioRequest::default();
            overrides(&mut request).insert(node.to_string(), -1000.0);
            assert_eq!(
                request.resolve().unwrap_err(),
                ConfigError::InvalidParameter {
                    name: table.to_string(),
                    value: -1000.0,
                    expected: "a finite value >= 0",
                },
                "{}",
                table
            );
        }
    }

    #[test]
    fn test_overrides_naming_unknown_nodes_are_rejected() {
        let mut capacity = ScenarioRequest::default();
        capacity.dc_capacity.insert("PDE".to_string(), 1.0);
        assert_eq!(
            capacity.resolve().unwrap_err(),
            ConfigError::UnknownNode {
                table: "dc_capacity",
                node: "PDE".to_string(),
            }
        );

        // a retailer is not a valid DC
        let mut handling = ScenarioRequest::default();
        handling.dc_handling.insert("FLUXC".to_string(), 1.0);
        assert!(matches!(
            handling.resolve(),
            Err(ConfigError::UnknownNode { table: "dc_handling", .. })
        ));

        let mut distance = ScenarioRequest::default();
        distance.distances.push(DistanceOverride {
            layer: Layer::DcToRetailer,
            origin: "PDE".to_string(),
            destination: "FLUXC".to_string(),
            km: 1.0,
        });
        assert_eq!(
            distance.resolve().unwrap_err(),
            ConfigError::UnknownNode {
                table: "distances",
                node: "PDE".to_string(),
            }
        );

        let mut destination = ScenarioRequest::default();
        destination.distances.push(DistanceOverride {
            layer: Layer::PlantToCrossdock,
            origin: "TW".to_string(),
            destination: "PED".to_string(),
            km: 1.0,
        });
        assert!(matches!(
            destination.resolve(),
            Err(ConfigError::UnknownNode { table: "distances", ref node }) if node == "PED"
        ));
    }

    #[test]
    fn test_overrides_for_known_nodes_are_accepted() {
        // deselected catalog nodes and requested new nodes may carry overrides
        let mut request = ScenarioRequest {
            use_new_locations: Some(false),
            plants: Some(vec!["TW".to_string()]),
            ..ScenarioRequest::default()
        };
        request.new_location_capacity.insert("HUDTG".to_string(), 1.0);
        request.sourcing_cost.insert("SHA".to_string(), 1.0);
        let scenario = request.resolve().unwrap();
        assert!(scenario.new_locations.is_empty());
        assert_eq!(scenario.plants.len(), 1);

        let mut distance = ScenarioRequest {
            retailers: Some(vec!["FLUXC".to_string(), "NEWRT".to_string()]),
            ..ScenarioRequest::default()
        };
        distance.demand.insert("NEWRT".to_string(), 10.0);
        distance.distances.push(DistanceOverride {
            layer: Layer::DcToRetailer,
            origin: "PED".to_string(),
            destination: "NEWRT".to_string(),
            km: 100.0,
        });
        // the new retailer is known, so resolution gets as far as the missing distances
        assert!(matches!(
            distance.resolve(),
            Err(ConfigError::MissingDistance { ref destination, .. }) if destination == &Symbol::from("NEWRT")
        ));
    }

    #[test]
    fn test_duplicate_nodes_are_rejected() {
        let request = ScenarioRequest {
            plants: Some(vec!["TW".to_string(), "TW".to_string()]),
            ..ScenarioRequest::default()
        };
        assert_eq!(
            request.resolve().unwrap_err(),
            ConfigError::DuplicateNode {
                role: "Plant",
                node: Symbol::from("TW"),
            }
        );
    }

    #[test]
    fn test_events_fold_into_mode_sets_and_multipliers() {
        let request = ScenarioRequest {
            events: Events {
                suez_canal: true,
                volcano: true,
                oil_crisis: true,
                trade_war: true,
                tariff_rate: 1.25,
                ..Events::default()
            },
            ..ScenarioRequest::default()
        };
        let scenario = request.resolve().unwrap();

        assert!(scenario.modes(Layer::PlantToCrossdock).is_empty());
        assert_eq!(scenario.modes(Layer::CrossdockToDc), &[Mode::Sea, Mode::Road]);
        assert_eq!(scenario.modes(Layer::DcToRetailer), &[Mode::Sea, Mode::Road]);
        assert!(!scenario.mode_parameters.contains_key(&Mode::Air));
        assert!(scenario.lanes(Layer::PlantToCrossdock).is_empty());
        assert_eq!(scenario.transport_cost_multiplier, 1.3);
        assert_eq!(scenario.sourcing_cost_multiplier, 1.25);
    }

    #[test]
    fn test_explicit_blackouts() {
        let request = ScenarioRequest {
            blocked_modes: vec![
                ModeBlackout {
                    layer: Some(Layer::DcToRetailer),
                    mode: Mode::Road,
                },
                ModeBlackout {
                    layer: None,
                    mode: Mode::Sea,
                },
            ],
            ..ScenarioRequest::default()
        };
        let scenario = request.resolve().unwrap();

        assert_eq!(scenario.modes(Layer::PlantToCrossdock), &[Mode::Air]);
        assert_eq!(scenario.modes(Layer::CrossdockToDc), &[Mode::Air, Mode::Road]);
        assert_eq!(scenario.modes(Layer::DcToRetailer), &[Mode::Air]);
    }

    #[test]
    fn test_layer1_modes_default_to_selected_modes() {
        let request = ScenarioRequest {
            modes: Some(vec![Mode::Sea, Mode::Road]),
            ..ScenarioRequest::default()
        };
        let scenario = request.resolve().unwrap();
        assert_eq!(scenario.modes(Layer::PlantToCrossdock), &[Mode::Sea]);

        let request = ScenarioRequest {
            modes: Some(vec![Mode::Road]),
            layer1_modes: Some(vec![Mode::Air]),
            ..ScenarioRequest::default()
        };
        let scenario = request.resolve().unwrap();
        assert_eq!(scenario.modes(Layer::PlantToCrossdock), &[Mode::Air]);
        assert!(scenario.mode_parameters.contains_key(&Mode::Air));
    }

    #[test]
    fn test_without_new_locations() {
        let request = ScenarioRequest {
            use_new_locations: Some(false),
            ..ScenarioRequest::default()
        };
        let scenario = request.resolve().unwrap();
        assert!(scenario.new_locations.is_empty());
        assert!(scenario.lanes(Layer::NewLocationToDc).is_empty());
    }

    #[test]
    fn test_demand_scale_and_std() {
        let request = ScenarioRequest {
            demand_scale: Some(2.0),
            ..ScenarioRequest::default()
        };
        let scaled = request.resolve().unwrap();
        let reference = ScenarioRequest::default().resolve().unwrap();

        assert_eq!(scaled.total_demand(), 222_000.0);
        let ratio = scaled.mode_parameters[&Mode::Air].safety_stock
            / reference.mode_parameters[&Mode::Air].safety_stock;
        assert!((ratio - 2.0).abs() < 1e-9);

        let fixed_std = ScenarioRequest {
            demand_std: Some(0.0),
            ..ScenarioRequest::default()
        };
        let scenario = fixed_std.resolve().unwrap();
        assert_eq!(scenario.mode_parameters[&Mode::Road].safety_stock, 0.0);
    }

    #[test]
    fn test_request_json_round_trip_through_reference() {
        let reference = ScenarioRequest::reference();
        let json = serde_json::to_string_pretty(&reference).unwrap();
        let parsed: ScenarioRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.plants, reference.plants);
        assert_eq!(parsed.layer1_modes, reference.layer1_modes);
        assert_eq!(parsed.events, reference.events);
        assert_eq!(parsed.resolve().unwrap().retailers.len(), 7);

        let partial: ScenarioRequest = serde_json::from_str(
            r#"{"co2_reduction_target": 0.3, "events": {"volcano": true}, "dc_capacity": {"PED": 100}}"#,
        )
        .unwrap();
        assert_eq!(partial.co2_reduction_target, Some(0.3));
        assert!(partial.events.volcano);
        assert_eq!(partial.events.tariff_rate, 1.0);
        assert_eq!(partial.dc_capacity["PED"], 100.0);

        assert!(serde_json::from_str::<ScenarioRequest>(r#"{"co2_target": 0.3}"#).is_err());
    }

    #[test]
    fn test_config_error_display() {
        let error = ConfigError::MissingDistance {
            layer: Layer::NewLocationToDc,
            origin: Symbol::from("HUDTG"),
            destination: Symbol::from("MUC"),
        };
        assert_eq!(error.to_string(), "No L2 new distance from \"HUDTG\" to \"MUC\"");

        let error = ConfigError::UnknownNode {
            table: "dc_capacity",
            node: "PDE".to_string(),
        };
        assert_eq!(error.to_string(), "Table dc_capacity names unknown node \"PDE\"");
    }
}
