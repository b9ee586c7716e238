//! Vocabulary of the supply network: node identifiers, transport modes, layers and
//! distance matrices.
//!
//! A network has four echelons joined by four flow layers:
//!
//! ```text
//! Plant --L1--> Crossdock --L2--> DC --L3--> Retailer
//!                   NewLocation --L2 new--^
//! ```

use std::{collections::HashMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use string_cache::DefaultAtom;

pub mod defaults;

/// Interned node identifier
pub type Symbol = DefaultAtom;

/// Transport mode of a flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Air,
    Sea,
    Road,
}

impl Mode {
    pub const ALL: [Mode; 3] = [Mode::Air, Mode::Sea, Mode::Road];

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Air => "air",
            Mode::Sea => "sea",
            Mode::Road => "road",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "air" => Ok(Mode::Air),
            "sea" => Ok(Mode::Sea),
            "road" => Ok(Mode::Road),
            _ => Err(format!("unknown transport mode '{}'", s)),
        }
    }
}

/// One of the four flow layers of the network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    PlantToCrossdock,
    CrossdockToDc,
    NewLocationToDc,
    DcToRetailer,
}

impl Layer {
    pub const ALL: [Layer; 4] = [
        Layer::PlantToCrossdock,
        Layer::CrossdockToDc,
        Layer::NewLocationToDc,
        Layer::DcToRetailer,
    ];

    /// Prefix of the flow variable names of this layer, e.g. `f2_2[HUDTG,PED,road]`
    pub fn variable_prefix(self) -> &'static str {
        match self {
            Layer::PlantToCrossdock => "f1",
            Layer::CrossdockToDc => "f2",
            Layer::NewLocationToDc => "f2_2",
            Layer::DcToRetailer => "f3",
        }
    }

    /// Short label used in reports and KPI names
    pub fn label(self) -> &'static str {
        match self {
            Layer::PlantToCrossdock => "L1",
            Layer::CrossdockToDc => "L2",
            Layer::NewLocationToDc => "L2 new",
            Layer::DcToRetailer => "L3",
        }
    }

    /// Label safe to use inside a KPI or CSV column name
    pub fn key(self) -> &'static str {
        match self {
            Layer::PlantToCrossdock => "L1",
            Layer::CrossdockToDc => "L2",
            Layer::NewLocationToDc => "L2_new",
            Layer::DcToRetailer => "L3",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Layer::PlantToCrossdock => "Plant -> Crossdock",
            Layer::CrossdockToDc => "Crossdock -> DC",
            Layer::NewLocationToDc => "New location -> DC",
            Layer::DcToRetailer => "DC -> Retailer",
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Kilometres between the origins and destinations of a layer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DistanceMatrix {
    entries: HashMap<(Symbol, Symbol), f64>,
}

impl DistanceMatrix {
    /// Build a matrix from row-major data, one row per origin
    pub fn from_rows(origins: &[&str], destinations: &[&str], rows: &[&[f64]]) -> Self {
        let mut matrix = Self::default();
        for (origin, row) in origins.iter().zip(rows) {
            for (destination, &km) in destinations.iter().zip(row.iter()) {
                matrix.insert(Symbol::from(*origin), Symbol::from(*destination), km);
            }
        }
        matrix
    }

    pub fn get(&self, origin: &Symbol, destination: &Symbol) -> Option<f64> {
        self.entries
            .get(&(origin.clone(), destination.clone()))
            .copied()
    }

    pub fn insert(&mut self, origin: Symbol, destination: Symbol, km: f64) {
        self.entries.insert((origin, destination), km);
    }

    /// Restrict the matrix to the given origins and destinations.
    ///
    /// Returns the first uncovered pair as the error.
    pub fn restricted_to(
        &self,
        origins: &[Symbol],
        destinations: &[Symbol],
    ) -> Result<Self, (Symbol, Symbol)> {
        let mut restricted = Self::default();
        for origin in origins {
            for destination in destinations {
                let km = self
                    .get(origin, destination)
                    .ok_or_else(|| (origin.clone(), destination.clone()))?;
                restricted.insert(origin.clone(), destination.clone(), km);
            }
        }
        Ok(restricted)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
