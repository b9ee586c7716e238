//! MILP formulation of a resolved scenario.
//!
//! [`NetworkModel::assemble`] creates the decision variables (flows, open binaries,
//! shortfall slacks), builds every cost and emission expression, adds the
//! constraints and sets the objective. The returned model keeps the variable
//! handles and expressions so results can be read back after the solve.

use std::collections::BTreeMap;

use log::debug;

use crate::lp_solver::*;
use crate::network::{Layer, Symbol};
use crate::scenario::{Lane, Scenario};

pub mod constraints;
pub mod expressions;

pub use expressions::{ExpressionSet, LayerExpressions};

/// A flow variable together with the lane it moves goods on
#[derive(Debug, Clone)]
pub struct Flow<Brand> {
    pub lane: Lane,
    pub variable: VariableId<Brand>,
}

/// Flow variables of one layer.
///
/// A layer whose origin, destination or mode set is empty is `Absent`: it owns no
/// variables and contributes nothing to any expression.
#[derive(Debug, Clone)]
pub enum LayerFlows<Brand> {
    Present(Vec<Flow<Brand>>),
    Absent,
}

impl<Brand> LayerFlows<Brand> {
    fn generate(builder: &mut LPModelBuilder<Brand>, scenario: &Scenario, layer: Layer) -> Self {
        let lanes = scenario.lanes(layer);
        if lanes.is_empty() {
            debug!("layer {} is absent", layer);
            return LayerFlows::Absent;
        }

        let flows = lanes
            .into_iter()
            .map(|lane| {
                let name = format!(
                    "{}[{},{},{}]",
                    layer.variable_prefix(),
                    lane.origin,
                    lane.destination,
                    lane.mode
                );
                let variable =
                    builder.add_variable(name, VariableType::Continuous, 0.0, f64::INFINITY);
                Flow { lane, variable }
            })
            .collect();
        LayerFlows::Present(flows)
    }

    pub fn flows(&self) -> &[Flow<Brand>] {
        match self {
            LayerFlows::Present(flows) => flows,
            LayerFlows::Absent => &[],
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, LayerFlows::Present(_))
    }

    /// Sum of the flows leaving `node`
    pub fn outbound(&self, node: &Symbol) -> LinearExpression<Brand> {
        LinearExpression::sum_of(
            self.flows()
                .iter()
                .filter(|flow| &flow.lane.origin == node)
                .map(|flow| flow.variable),
        )
    }

    /// Sum of the flows reaching `node`
    pub fn inbound(&self, node: &Symbol) -> LinearExpression<Brand> {
        LinearExpression::sum_of(
            self.flows()
                .iter()
                .filter(|flow| &flow.lane.destination == node)
                .map(|flow| flow.variable),
        )
    }

    /// Sum of every flow of the layer
    pub fn total(&self) -> LinearExpression<Brand> {
        LinearExpression::sum_of(self.flows().iter().map(|flow| flow.variable))
    }
}

/// An assembled network-design model, ready to be solved
pub struct NetworkModel<Brand> {
    pub builder: LPModelBuilder<Brand>,
    pub flows: BTreeMap<Layer, LayerFlows<Brand>>,
    /// `y[n]`, one binary per new location
    pub open: Vec<(Symbol, VariableId<Brand>)>,
    /// `v[r]`, one shortfall per retailer; empty when demand must be met exactly
    pub unmet: Vec<(Symbol, VariableId<Brand>)>,
    pub expressions: ExpressionSet<Brand>,
}

impl<Brand> NetworkModel<Brand> {
    /// Build the complete formulation of `scenario` into `builder`
    pub fn assemble(scenario: &Scenario, mut builder: LPModelBuilder<Brand>) -> Self {
        let flows: BTreeMap<Layer, LayerFlows<Brand>> = Layer::ALL
            .into_iter()
            .map(|layer| (layer, LayerFlows::generate(&mut builder, scenario, layer)))
            .collect();

        let open: Vec<_> = scenario
            .new_locations
            .iter()
            .map(|location| {
                let name = format!("y[{}]", location.id);
                let variable = builder.add_variable(name, VariableType::Binary, 0.0, 1.0);
                (location.id.clone(), variable)
            })
            .collect();

        let unmet: Vec<_> = if scenario.allow_unmet_demand {
            scenario
                .retailers
                .iter()
                .map(|retailer| {
                    let name = format!("v[{}]", retailer.id);
                    let variable =
                        builder.add_variable(name, VariableType::Continuous, 0.0, f64::INFINITY);
                    (retailer.id.clone(), variable)
                })
                .collect()
        } else {
            Vec::new()
        };

        let expressions = ExpressionSet::build(scenario, &flows, &open, &unmet);

        constraints::add_demand_constraints(&mut builder, scenario, &flows, &unmet);
        constraints::add_conservation_constraints(&mut builder, scenario, &flows);
        constraints::add_capacity_constraints(&mut builder, scenario, &flows, &open);
        constraints::add_emission_cap(&mut builder, scenario, &expressions);

        builder.set_objective(expressions.objective(), OptimizationSense::Minimize);

        debug!(
            "assembled '{}': {} variables, {} constraints",
            scenario.name,
            builder.num_variables(),
            builder.num_constraints()
        );

        NetworkModel {
            builder,
            flows,
            open,
            unmet,
            expressions,
        }
    }

    pub fn layer(&self, layer: Layer) -> &LayerFlows<Brand> {
        &self.flows[&layer]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lp_model_builder;
    use crate::network::Mode;
    use crate::scenario::{Events, ScenarioRequest};

    #[test]
    fn test_reference_variable_universe() {
        let scenario = ScenarioRequest::default().resolve().unwrap();
        let model = NetworkModel::assemble(&scenario, lp_model_builder!());

        assert_eq!(model.layer(Layer::PlantToCrossdock).flows().len(), 12);
        assert_eq!(model.layer(Layer::CrossdockToDc).flows().len(), 36);
        assert_eq!(model.layer(Layer::NewLocationToDc).flows().len(), 60);
        assert_eq!(model.layer(Layer::DcToRetailer).flows().len(), 84);
        assert_eq!(model.open.len(), 5);
        assert!(model.unmet.is_empty());
        assert_eq!(model.builder.num_variables(), 12 + 36 + 60 + 84 + 5);

        let first = &model.layer(Layer::PlantToCrossdock).flows()[0];
        assert_eq!(model.builder.variable_name(first.variable), Some("f1[TW,ATVIE,air]"));
        assert_eq!(
            model.builder.variable_type(model.open[0].1),
            Some(VariableType::Binary)
        );
    }

    #[test]
    fn test_slack_variables_only_when_permitted() {
        let scenario = ScenarioRequest::default()
            .with_unmet_demand()
            .resolve()
            .unwrap();
        let model = NetworkModel::assemble(&scenario, lp_model_builder!());

        assert_eq!(model.unmet.len(), 7);
        assert_eq!(model.builder.variable_name(model.unmet[0].1), Some("v[FLUXC]"));
    }

    #[test]
    fn test_blocked_modes_create_no_variables() {
        let request = ScenarioRequest {
            events: Events {
                volcano: true,
                ..Events::default()
            },
            ..ScenarioRequest::default()
        };
        let scenario = request.resolve().unwrap();
        let model = NetworkModel::assemble(&scenario, lp_model_builder!());

        for layer in Layer::ALL {
            assert!(
                model
                    .layer(layer)
                    .flows()
                    .iter()
                    .all(|flow| flow.lane.mode != Mode::Air)
            );
        }
        assert_eq!(model.layer(Layer::PlantToCrossdock).flows().len(), 6);
    }

    #[test]
    fn test_absent_layers() {
        let request = ScenarioRequest {
            layer1_modes: Some(Vec::new()),
            use_new_locations: Some(false),
            ..ScenarioRequest::default()
        };
        let scenario = request.resolve().unwrap();
        let model = NetworkModel::assemble(&scenario, lp_model_builder!());

        assert!(!model.layer(Layer::PlantToCrossdock).is_present());
        assert!(!model.layer(Layer::NewLocationToDc).is_present());
        assert!(model.layer(Layer::CrossdockToDc).is_present());
        assert!(!model.expressions.layers[&Layer::PlantToCrossdock].transport_total().has_terms());
        assert!(model.open.is_empty());
    }

    #[test]
    fn test_inbound_and_outbound_sums() {
        let scenario = ScenarioRequest::default().resolve().unwrap();
        let model = NetworkModel::assemble(&scenario, lp_model_builder!());
        let l3 = model.layer(Layer::DcToRetailer);

        assert_eq!(l3.outbound(&Symbol::from("PED")).terms.len(), 7 * 3);
        assert_eq!(l3.inbound(&Symbol::from("FLUXC")).terms.len(), 4 * 3);
        assert_eq!(l3.total().terms.len(), 84);
        assert!(!LayerFlows::<()>::Absent.total().has_terms());
    }
}
