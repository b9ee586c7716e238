//! Built-in reference network.
//!
//! Every scenario starts from this catalog: node lists, facility tables, mode
//! coefficients and the four distance matrices. A request only names what it changes.

use std::collections::{BTreeMap, HashMap};

use lazy_static::*;

use super::{DistanceMatrix, Layer, Mode, Symbol};

pub const PRODUCT_WEIGHT_KG: f64 = 2.58;
/// €/t CO₂ charged on plant production emissions
pub const CO2_PRICE_PER_TON: f64 = 37.50;
/// €/t CO₂ charged on new-location production emissions
pub const CO2_PRICE_PER_TON_NEW: f64 = 60.00;
/// Emissions of the reference network, tonnes CO₂
pub const CO2_BASELINE_TONS: f64 = 1582.42366689614;
pub const CO2_REDUCTION_TARGET: f64 = 0.5;
pub const LASTMILE_UNIT_COST: f64 = 6.25;
pub const LASTMILE_CO2_KG: f64 = 2.68;
/// Shortage cost `p` of the newsvendor safety-stock term, €/unit
pub const SHORTAGE_PENALTY: f64 = 1.7;
pub const HOLDING_COST: f64 = 0.85;
pub const SERVICE_LEVEL: f64 = 0.9;
pub const AVERAGE_DISTANCE_KM: f64 = 9600.0;
/// Sea routes are this much longer than the average great-circle distance
pub const SEA_DETOUR_FACTOR: f64 = 1.2;
pub const OIL_CRISIS_MULTIPLIER: f64 = 1.3;
pub const UNMET_DEMAND_PENALTY: f64 = 1e8;
/// Production cost of a new location is this budget spread over its capacity
pub const NEW_LOCATION_PRODUCTION_BUDGET: f64 = 100_000.0;

/// Reference data every scenario is resolved against
#[derive(Debug, Clone)]
pub struct Catalog {
    pub plants: Vec<Symbol>,
    pub crossdocks: Vec<Symbol>,
    pub new_locations: Vec<Symbol>,
    pub dcs: Vec<Symbol>,
    pub retailers: Vec<Symbol>,
    pub modes: Vec<Mode>,
    /// Modes usable between plants and crossdocks
    pub layer1_modes: Vec<Mode>,

    pub demand: HashMap<Symbol, f64>,
    pub sourcing_cost: HashMap<Symbol, f64>,
    pub plant_co2_kg: HashMap<Symbol, f64>,
    pub crossdock_handling: HashMap<Symbol, f64>,
    pub dc_capacity: HashMap<Symbol, f64>,
    pub dc_handling: HashMap<Symbol, f64>,
    pub new_location_capacity: HashMap<Symbol, f64>,
    pub new_location_opening_cost: HashMap<Symbol, f64>,
    pub new_location_operating_cost: HashMap<Symbol, f64>,
    pub new_location_co2_kg: HashMap<Symbol, f64>,

    /// €/kg·km
    pub transport_rate: BTreeMap<Mode, f64>,
    /// t CO₂ per t·km
    pub emission_factor: BTreeMap<Mode, f64>,
    /// km/h
    pub speed: BTreeMap<Mode, f64>,

    pub distances: BTreeMap<Layer, DistanceMatrix>,
}

fn symbols(names: &[&str]) -> Vec<Symbol> {
    names.iter().map(|&name| Symbol::from(name)).collect()
}

fn table(entries: &[(&str, f64)]) -> HashMap<Symbol, f64> {
    entries
        .iter()
        .map(|&(name, value)| (Symbol::from(name), value))
        .collect()
}

const PLANTS: [&str; 2] = ["TW", "SHA"];
const CROSSDOCKS: [&str; 3] = ["ATVIE", "PLGDN", "FRCDG"];
const NEW_LOCATIONS: [&str; 5] = ["HUDTG", "CZMCT", "IEILG", "FIMPF", "PLZCA"];
const DCS: [&str; 4] = ["PED", "FR6216", "RIX", "GMZ"];
const RETAILERS: [&str; 7] = ["FLUXC", "ALKFM", "KSJER", "GXEQH", "OAHLE", "ISNQE", "NAAVF"];

fn reference_catalog() -> Catalog {
    let mut distances = BTreeMap::new();
    distances.insert(
        Layer::PlantToCrossdock,
        DistanceMatrix::from_rows(
            &PLANTS,
            &CROSSDOCKS,
            &[
                &[8997.94617146616, 8558.96520835034, 9812.38584027454],
                &[8468.71339377354, 7993.62774285959, 9240.26233801075],
            ],
        ),
    );
    distances.insert(
        Layer::CrossdockToDc,
        DistanceMatrix::from_rows(
            &CROSSDOCKS,
            &DCS,
            &[
                &[220.423995674989, 1019.43140587827, 1098.71652257982, 1262.62587924823],
                &[519.161031102087, 1154.87176862626, 440.338211856603, 1855.94939751482],
                &[962.668288266132, 149.819604703365, 1675.455462176, 2091.1437090641],
            ],
        ),
    );
    distances.insert(
        Layer::NewLocationToDc,
        DistanceMatrix::from_rows(
            &NEW_LOCATIONS,
            &DCS,
            &[
                &[367.762425639798, 1216.10262027458, 1098.57245368619, 1120.13248546123],
                &[98.034644813461, 818.765381327031, 987.72775809091, 1529.9990581232],
                &[1558.60889112091, 714.077816812742, 1949.83469918776, 2854.35402610261],
                &[1265.72892702748, 1758.18103997611, 367.698822815676, 2461.59771450036],
                &[437.686419974076, 1271.77800922148, 554.373376462774, 1592.14058614186],
            ],
        ),
    );
    distances.insert(
        Layer::DcToRetailer,
        DistanceMatrix::from_rows(
            &DCS,
            &RETAILERS,
            &[
                &[
                    1184.65051865833,
                    933.730015948432,
                    557.144058480586,
                    769.757089072695,
                    2147.98445345001,
                    2315.79621115423,
                    1590.07662902924,
                ],
                &[
                    311.994969562194,
                    172.326685809878,
                    622.433010022067,
                    1497.40239816531,
                    1387.73696467636,
                    1585.6370207201,
                    1984.31926933368,
                ],
                &[
                    1702.34810062205,
                    1664.62283033352,
                    942.985120680279,
                    222.318687415142,
                    2939.50970842422,
                    3128.54724287652,
                    713.715034612432,
                ],
                &[
                    2452.23922908608,
                    2048.41487682505,
                    2022.91355628344,
                    1874.11994156457,
                    2774.73634842816,
                    2848.65086298747,
                    2806.05576441898,
                ],
            ],
        ),
    );

    Catalog {
        plants: symbols(&PLANTS),
        crossdocks: symbols(&CROSSDOCKS),
        new_locations: symbols(&NEW_LOCATIONS),
        dcs: symbols(&DCS),
        retailers: symbols(&RETAILERS),
        modes: Mode::ALL.to_vec(),
        layer1_modes: vec![Mode::Air, Mode::Sea],

        demand: table(&[
            ("FLUXC", 17000.0),
            ("ALKFM", 9000.0),
            ("KSJER", 13000.0),
            ("GXEQH", 19000.0),
            ("OAHLE", 15000.0),
            ("ISNQE", 20000.0),
            ("NAAVF", 18000.0),
        ]),
        sourcing_cost: table(&[("TW", 3.343692308), ("SHA", 3.423384615)]),
        plant_co2_kg: table(&[("TW", 6.3), ("SHA", 9.8)]),
        crossdock_handling: table(&[
            ("ATVIE", 6.533884615),
            ("PLGDN", 4.302269231),
            ("FRCDG", 5.675923077),
        ]),
        dc_capacity: table(&[
            ("PED", 45000.0),
            ("FR6216", 150000.0),
            ("RIX", 75000.0),
            ("GMZ", 100000.0),
        ]),
        dc_handling: table(&[
            ("PED", 4.768269231),
            ("FR6216", 5.675923077),
            ("RIX", 4.426038462),
            ("GMZ", 7.0865),
        ]),
        new_location_capacity: table(&[
            ("HUDTG", 37000.0),
            ("CZMCT", 45500.0),
            ("IEILG", 46000.0),
            ("FIMPF", 35000.0),
            ("PLZCA", 16500.0),
        ]),
        new_location_opening_cost: table(&[
            ("HUDTG", 7.4e6),
            ("CZMCT", 9.1e6),
            ("IEILG", 9.2e6),
            ("FIMPF", 7.0e6),
            ("PLZCA", 3.3e6),
        ]),
        new_location_operating_cost: table(&[
            ("HUDTG", 250000.0),
            ("CZMCT", 305000.0),
            ("IEILG", 450000.0),
            ("FIMPF", 420000.0),
            ("PLZCA", 412500.0),
        ]),
        new_location_co2_kg: table(&[
            ("HUDTG", 3.2),
            ("CZMCT", 2.8),
            ("IEILG", 4.6),
            ("FIMPF", 5.8),
            ("PLZCA", 6.2),
        ]),

        transport_rate: [(Mode::Air, 0.0105), (Mode::Sea, 0.0013), (Mode::Road, 0.0054)]
            .into_iter()
            .collect(),
        emission_factor: [
            (Mode::Air, 0.000971),
            (Mode::Sea, 0.000027),
            (Mode::Road, 0.000076),
        ]
        .into_iter()
        .collect(),
        speed: [(Mode::Air, 800.0), (Mode::Sea, 10.0), (Mode::Road, 40.0)]
            .into_iter()
            .collect(),

        distances,
    }
}

lazy_static! {
    /// The reference network
    pub static ref CATALOG: Catalog = reference_catalog();
}
