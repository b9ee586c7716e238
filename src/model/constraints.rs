//! Structural constraints of the network-design model.
//!
//! Constraint names follow the pattern `Family[node]` so they can be looked up in
//! tests and read in solver logs.

use std::collections::BTreeMap;

use crate::constraint;
use crate::lp_solver::*;
use crate::network::{Layer, Symbol};
use crate::scenario::Scenario;

use super::{ExpressionSet, LayerFlows};

fn outbound<Brand>(
    flows: &BTreeMap<Layer, LayerFlows<Brand>>,
    layer: Layer,
    node: &Symbol,
) -> LinearExpression<Brand> {
    flows
        .get(&layer)
        .map(|f| f.outbound(node))
        .unwrap_or_default()
}

fn inbound<Brand>(
    flows: &BTreeMap<Layer, LayerFlows<Brand>>,
    layer: Layer,
    node: &Symbol,
) -> LinearExpression<Brand> {
    flows
        .get(&layer)
        .map(|f| f.inbound(node))
        .unwrap_or_default()
}

/// Deliveries to each retailer equal its demand, less the shortfall when one is
/// permitted
pub fn add_demand_constraints<Brand>(
    builder: &mut LPModelBuilder<Brand>,
    scenario: &Scenario,
    flows: &BTreeMap<Layer, LayerFlows<Brand>>,
    unmet: &[(Symbol, VariableId<Brand>)],
) {
    for retailer in &scenario.retailers {
        let mut delivered = inbound(flows, Layer::DcToRetailer, &retailer.id);
        if let Some((_, shortfall)) = unmet.iter().find(|(id, _)| id == &retailer.id) {
            delivered = delivered + *shortfall;
        }
        builder.add_constraint(constraint!(
            format!("Demand[{}]", retailer.id),
            (delivered) == retailer.demand
        ));
    }
}

/// Inbound equals outbound at every crossdock and DC
pub fn add_conservation_constraints<Brand>(
    builder: &mut LPModelBuilder<Brand>,
    scenario: &Scenario,
    flows: &BTreeMap<Layer, LayerFlows<Brand>>,
) {
    for crossdock in &scenario.crossdocks {
        let received = inbound(flows, Layer::PlantToCrossdock, &crossdock.id);
        let shipped = outbound(flows, Layer::CrossdockToDc, &crossdock.id);
        if !received.has_terms() && !shipped.has_terms() {
            continue;
        }
        builder.add_constraint(constraint!(
            format!("CrossdockBalance[{}]", crossdock.id),
            (received - shipped) == 0.0
        ));
    }

    for dc in &scenario.dcs {
        let received = inbound(flows, Layer::CrossdockToDc, &dc.id)
            + inbound(flows, Layer::NewLocationToDc, &dc.id);
        let shipped = outbound(flows, Layer::DcToRetailer, &dc.id);
        if !received.has_terms() && !shipped.has_terms() {
            continue;
        }
        builder.add_constraint(constraint!(
            format!("DCBalance[{}]", dc.id),
            (received - shipped) == 0.0
        ));
    }
}

/// Outbound flow never exceeds capacity; new locations only ship once opened
pub fn add_capacity_constraints<Brand>(
    builder: &mut LPModelBuilder<Brand>,
    scenario: &Scenario,
    flows: &BTreeMap<Layer, LayerFlows<Brand>>,
    open: &[(Symbol, VariableId<Brand>)],
) {
    for dc in &scenario.dcs {
        let shipped = outbound(flows, Layer::DcToRetailer, &dc.id);
        if shipped.has_terms() {
            builder.add_constraint(constraint!(
                format!("DCCapacity[{}]", dc.id),
                (shipped) <= dc.capacity
            ));
        }
    }

    for location in &scenario.new_locations {
        let Some((_, opened)) = open.iter().find(|(id, _)| id == &location.id) else {
            continue;
        };
        let shipped = outbound(flows, Layer::NewLocationToDc, &location.id);
        builder.add_constraint(constraint!(
            format!("NewFacilityCapacity[{}]", location.id),
            (shipped - location.capacity * *opened) <= 0.0
        ));
    }

    for plant in &scenario.plants {
        let Some(capacity) = plant.capacity else {
            continue;
        };
        let shipped = outbound(flows, Layer::PlantToCrossdock, &plant.id);
        if shipped.has_terms() {
            builder.add_constraint(constraint!(
                format!("PlantCapacity[{}]", plant.id),
                (shipped) <= capacity
            ));
        }
    }
}

/// Total emissions stay below the reduced baseline
pub fn add_emission_cap<Brand>(
    builder: &mut LPModelBuilder<Brand>,
    scenario: &Scenario,
    expressions: &ExpressionSet<Brand>,
) {
    builder.add_constraint(constraint!(
        "CO2ReductionTarget",
        (expressions.total_emissions()) <= scenario.emission_cap()
    ));
}
