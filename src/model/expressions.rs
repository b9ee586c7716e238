//! Cost and emission expressions.
//!
//! Every category is kept as its own linear expression, broken down by layer and
//! mode where it is flow-driven, so the same objects serve as objective terms,
//! constraint left-hand sides and, after the solve, KPI formulas.
//!
//! Units: costs in €, emissions in tonnes CO₂. Per-unit production factors are
//! given in kg and scaled by 1/1000 here.

use std::collections::BTreeMap;

use crate::lp_solver::*;
use crate::network::{Layer, Mode, Symbol};
use crate::scenario::Scenario;

use super::LayerFlows;

/// Flow-driven expressions of one layer, per mode
#[derive(Debug, Clone)]
pub struct LayerExpressions<Brand> {
    pub transport_cost: BTreeMap<Mode, LinearExpression<Brand>>,
    pub inventory_cost: BTreeMap<Mode, LinearExpression<Brand>>,
    pub transport_co2: BTreeMap<Mode, LinearExpression<Brand>>,
}

impl<Brand> LayerExpressions<Brand> {
    fn build(scenario: &Scenario, layer: Layer, flows: &LayerFlows<Brand>) -> Self {
        let mut expressions = LayerExpressions {
            transport_cost: BTreeMap::new(),
            inventory_cost: BTreeMap::new(),
            transport_co2: BTreeMap::new(),
        };
        for &mode in scenario.modes(layer) {
            expressions.transport_cost.entry(mode).or_default();
            expressions.inventory_cost.entry(mode).or_default();
            expressions.transport_co2.entry(mode).or_default();
        }

        let total_demand = scenario.total_demand();
        let weight_kg = scenario.product_weight_kg;
        let weight_t = weight_kg / 1000.0;

        for flow in flows.flows() {
            let lane = &flow.lane;
            let Some(parameters) = scenario.mode_parameters.get(&lane.mode) else {
                continue;
            };

            let transport = parameters.transport_rate
                * lane.distance_km
                * weight_kg
                * scenario.transport_cost_multiplier;
            let co2 = parameters.emission_factor * lane.distance_km * weight_t;
            let inventory = parameters.inventory_cost_per_unit(total_demand);

            expressions
                .transport_cost
                .entry(lane.mode)
                .or_default()
                .add_term(transport, flow.variable);
            expressions
                .transport_co2
                .entry(lane.mode)
                .or_default()
                .add_term(co2, flow.variable);
            expressions
                .inventory_cost
                .entry(lane.mode)
                .or_default()
                .add_term(inventory, flow.variable);
        }

        expressions
    }

    pub fn transport_total(&self) -> LinearExpression<Brand> {
        self.transport_cost.values().sum()
    }

    pub fn inventory_total(&self) -> LinearExpression<Brand> {
        self.inventory_cost.values().sum()
    }

    pub fn co2_total(&self) -> LinearExpression<Brand> {
        self.transport_co2.values().sum()
    }
}

/// Every cost and emission expression of a model
#[derive(Debug, Clone)]
pub struct ExpressionSet<Brand> {
    pub layers: BTreeMap<Layer, LayerExpressions<Brand>>,

    pub sourcing_cost: LinearExpression<Brand>,
    pub crossdock_handling_cost: LinearExpression<Brand>,
    pub dc_handling_cost: LinearExpression<Brand>,
    pub lastmile_cost: LinearExpression<Brand>,
    /// CO₂ charge on plant production
    pub co2_manufacturing_cost: LinearExpression<Brand>,
    /// CO₂ charge on new-location production
    pub co2_new_location_cost: LinearExpression<Brand>,
    pub new_location_fixed_cost: LinearExpression<Brand>,
    pub new_location_production_cost: LinearExpression<Brand>,
    pub unmet_demand_penalty: LinearExpression<Brand>,

    pub plant_production_co2: LinearExpression<Brand>,
    pub new_location_production_co2: LinearExpression<Brand>,
    pub lastmile_co2: LinearExpression<Brand>,
}

impl<Brand> ExpressionSet<Brand> {
    pub fn build(
        scenario: &Scenario,
        flows: &BTreeMap<Layer, LayerFlows<Brand>>,
        open: &[(Symbol, VariableId<Brand>)],
        unmet: &[(Symbol, VariableId<Brand>)],
    ) -> Self {
        let absent = LayerFlows::Absent;
        let flows_of = |layer: Layer| flows.get(&layer).unwrap_or(&absent);

        let layers = Layer::ALL
            .into_iter()
            .map(|layer| (layer, LayerExpressions::build(scenario, layer, flows_of(layer))))
            .collect();

        let mut sourcing_cost = LinearExpression::zero();
        let mut co2_manufacturing_cost = LinearExpression::zero();
        let mut plant_production_co2 = LinearExpression::zero();
        for plant in &scenario.plants {
            let out = flows_of(Layer::PlantToCrossdock).outbound(&plant.id);
            sourcing_cost +=
                out.clone() * (plant.sourcing_cost * scenario.sourcing_cost_multiplier);
            co2_manufacturing_cost +=
                out.clone() * (scenario.co2_price_per_ton / 1000.0 * plant.co2_kg_per_unit);
            plant_production_co2 += out * (plant.co2_kg_per_unit / 1000.0);
        }

        let crossdock_handling_cost: LinearExpression<Brand> = scenario
            .crossdocks
            .iter()
            .map(|crossdock| {
                flows_of(Layer::CrossdockToDc).outbound(&crossdock.id) * crossdock.handling_cost
            })
            .sum();

        let dc_handling_cost: LinearExpression<Brand> = scenario
            .dcs
            .iter()
            .map(|dc| flows_of(Layer::DcToRetailer).outbound(&dc.id) * dc.handling_cost)
            .sum();

        let mut co2_new_location_cost = LinearExpression::zero();
        let mut new_location_fixed_cost = LinearExpression::zero();
        let mut new_location_production_cost = LinearExpression::zero();
        let mut new_location_production_co2 = LinearExpression::zero();
        for location in &scenario.new_locations {
            let out = flows_of(Layer::NewLocationToDc).outbound(&location.id);
            co2_new_location_cost += out.clone()
                * (scenario.co2_price_per_ton_new / 1000.0 * location.co2_kg_per_unit);
            new_location_production_cost += out.clone() * location.unit_production_cost();
            new_location_production_co2 += out * (location.co2_kg_per_unit / 1000.0);

            if let Some((_, open_var)) = open.iter().find(|(id, _)| id == &location.id) {
                new_location_fixed_cost.add_term(location.fixed_cost(), *open_var);
            }
        }

        let delivered = flows_of(Layer::DcToRetailer).total();
        let lastmile_cost =
            delivered.clone() * (scenario.lastmile_unit_cost * scenario.transport_cost_multiplier);
        let lastmile_co2 = delivered * (scenario.lastmile_co2_kg / 1000.0);

        let unmet_demand_penalty =
            LinearExpression::sum_of(unmet.iter().map(|(_, v)| *v)) * scenario.unmet_demand_penalty;

        ExpressionSet {
            layers,
            sourcing_cost,
            crossdock_handling_cost,
            dc_handling_cost,
            lastmile_cost,
            co2_manufacturing_cost,
            co2_new_location_cost,
            new_location_fixed_cost,
            new_location_production_cost,
            unmet_demand_penalty,
            plant_production_co2,
            new_location_production_co2,
            lastmile_co2,
        }
    }

    pub fn transport_cost(&self, layer: Layer) -> LinearExpression<Brand> {
        self.layers
            .get(&layer)
            .map(LayerExpressions::transport_total)
            .unwrap_or_default()
    }

    pub fn inventory_cost(&self, layer: Layer) -> LinearExpression<Brand> {
        self.layers
            .get(&layer)
            .map(LayerExpressions::inventory_total)
            .unwrap_or_default()
    }

    /// Transport emissions of every layer, grouped by mode
    pub fn transport_co2_by_mode(&self) -> BTreeMap<Mode, LinearExpression<Brand>> {
        let mut by_mode: BTreeMap<Mode, LinearExpression<Brand>> = BTreeMap::new();
        for expressions in self.layers.values() {
            for (mode, co2) in &expressions.transport_co2 {
                *by_mode.entry(*mode).or_default() += co2.clone();
            }
        }
        by_mode
    }

    pub fn production_co2(&self) -> LinearExpression<Brand> {
        self.plant_production_co2.clone() + self.new_location_production_co2.clone()
    }

    /// Production, transport and last-mile emissions, tonnes CO₂
    pub fn total_emissions(&self) -> LinearExpression<Brand> {
        let transport: LinearExpression<Brand> =
            self.layers.values().map(LayerExpressions::co2_total).sum();
        self.production_co2() + transport + self.lastmile_co2.clone()
    }

    /// Every cost except the shortfall penalty
    pub fn economic_cost(&self) -> LinearExpression<Brand> {
        let transport: LinearExpression<Brand> =
            self.layers.values().map(LayerExpressions::transport_total).sum();
        let inventory: LinearExpression<Brand> =
            self.layers.values().map(LayerExpressions::inventory_total).sum();

        [
            transport,
            inventory,
            self.sourcing_cost.clone(),
            self.crossdock_handling_cost.clone(),
            self.dc_handling_cost.clone(),
            self.lastmile_cost.clone(),
            self.co2_manufacturing_cost.clone(),
            self.co2_new_location_cost.clone(),
            self.new_location_fixed_cost.clone(),
            self.new_location_production_cost.clone(),
        ]
        .into_iter()
        .sum()
    }

    /// The minimised objective, economic cost plus the shortfall penalty
    pub fn objective(&self) -> LinearExpression<Brand> {
        self.economic_cost() + self.unmet_demand_penalty.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lp_model_builder;
    use crate::model::NetworkModel;
    use crate::scenario::{Events, ScenarioRequest};

    fn coefficient_sum<Brand>(expression: &LinearExpression<Brand>) -> f64 {
        expression.terms.iter().map(|term| term.coefficient).sum()
    }

    #[test]
    fn test_each_flow_counted_once_per_category() {
        let scenario = ScenarioRequest::default().resolve().unwrap();
        let model = NetworkModel::assemble(&scenario, lp_model_builder!());
        let flow_count: usize = model.flows.values().map(|f| f.flows().len()).sum();

        let transport: usize = model
            .expressions
            .layers
            .values()
            .map(|l| l.transport_total().terms.len())
            .sum();
        let inventory: usize = model
            .expressions
            .layers
            .values()
            .map(|l| l.inventory_total().terms.len())
            .sum();
        let co2: usize = model
            .expressions
            .transport_co2_by_mode()
            .values()
            .map(|e| e.terms.len())
            .sum();

        assert_eq!(transport, flow_count);
        assert_eq!(inventory, flow_count);
        assert_eq!(co2, flow_count);
    }

    #[test]
    fn test_transport_coefficients() {
        let scenario = ScenarioRequest::default().resolve().unwrap();
        let model = NetworkModel::assemble(&scenario, lp_model_builder!());
        let l1 = &model.expressions.layers[&Layer::PlantToCrossdock];

        // f1[TW,ATVIE,air] is the first variable of the layer
        let air_cost = &l1.transport_cost[&Mode::Air].terms[0];
        let expected = 0.0105 * 8997.94617146616 * 2.58;
        assert!((air_cost.coefficient - expected).abs() < 1e-9);

        let air_co2 = &l1.transport_co2[&Mode::Air].terms[0];
        let expected = 0.000971 * 8997.94617146616 * 2.58 / 1000.0;
        assert!((air_co2.coefficient - expected).abs() < 1e-12);
    }

    #[test]
    fn test_oil_crisis_and_trade_war_scale_coefficients() {
        let reference = ScenarioRequest::default().resolve().unwrap();
        let shocked = ScenarioRequest {
            events: Events {
                oil_crisis: true,
                trade_war: true,
                tariff_rate: 2.0,
                ..Events::default()
            },
            ..ScenarioRequest::default()
        }
        .resolve()
        .unwrap();

        let base = NetworkModel::assemble(&reference, lp_model_builder!());
        let shock = NetworkModel::assemble(&shocked, lp_model_builder!());

        let ratio = |a: &LinearExpression<_>, b: &LinearExpression<_>| {
            coefficient_sum(b) / coefficient_sum(a)
        };
        assert!(
            (ratio(
                &base.expressions.transport_cost(Layer::DcToRetailer),
                &shock.expressions.transport_cost(Layer::DcToRetailer)
            ) - 1.3)
                .abs()
                < 1e-12
        );
        assert!(
            (coefficient_sum(&shock.expressions.lastmile_cost)
                / coefficient_sum(&base.expressions.lastmile_cost)
                - 1.3)
                .abs()
                < 1e-12
        );
        assert!(
            (coefficient_sum(&shock.expressions.sourcing_cost)
                / coefficient_sum(&base.expressions.sourcing_cost)
                - 2.0)
                .abs()
                < 1e-12
        );
        // emissions do not depend on prices
        assert_eq!(
            coefficient_sum(&base.expressions.total_emissions()),
            coefficient_sum(&shock.expressions.total_emissions())
        );
    }

    #[test]
    fn test_new_location_terms() {
        let scenario = ScenarioRequest::default().resolve().unwrap();
        let model = NetworkModel::assemble(&scenario, lp_model_builder!());
        let expressions = &model.expressions;

        assert_eq!(expressions.new_location_fixed_cost.terms.len(), 5);
        assert_eq!(
            coefficient_sum(&expressions.new_location_fixed_cost),
            7_650_000.0 + 9_405_000.0 + 9_650_000.0 + 7_420_000.0 + 3_712_500.0
        );

        let hudtg_unit = 100_000.0 / 37_000.0;
        let first = &expressions.new_location_production_cost.terms[0];
        assert!((first.coefficient - hudtg_unit).abs() < 1e-12);
        assert!(!expressions.unmet_demand_penalty.has_terms());
    }

    #[test]
    fn test_penalty_with_slack() {
        let scenario = ScenarioRequest::default()
            .with_unmet_demand()
            .resolve()
            .unwrap();
        let model = NetworkModel::assemble(&scenario, lp_model_builder!());

        let penalty = &model.expressions.unmet_demand_penalty;
        assert_eq!(penalty.terms.len(), 7);
        assert!(penalty.terms.iter().all(|t| t.coefficient == 1e8));
        assert_eq!(
            model.expressions.objective().terms.len(),
            model.expressions.economic_cost().terms.len() + 7
        );
    }
}
