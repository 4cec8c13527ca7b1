use burn::config::Config;
use burn::module::Module;
use burn::tensor::activation;
use burn::tensor::{backend::Backend, Tensor};

use super::gate::{GateWeights, GateWeightsConfig};
use crate::modules::affine::{Affine, AffineConfig};

#[derive(Clone, Debug)]
pub struct RecurrentState<B: Backend> {
    pub hidden: Tensor<B, 2>, // [N, d_hidden_state]
    pub cell: Tensor<B, 2>,   // [N, d_point]
}

/// Widens the hidden state beyond a trajectory point. `initial` lifts the
/// first true position, `step` lifts every new hidden state.
#[derive(Module, Debug)]
pub struct HiddenProjection<B: Backend> {
    initial: Affine<B>,
    step: Affine<B>,
}

#[derive(Module, Debug)]
pub struct TrajectoryCell<B: Backend> {
    gates: GateWeights<B>,
    projection: Option<HiddenProjection<B>>,
}

impl<B: Backend> TrajectoryCell<B> {
    pub fn init_state(&self, initial: Tensor<B, 2>) -> RecurrentState<B> {
        let hidden = match &self.projection {
            Some(proj) => activation::relu(proj.initial.forward(initial.clone())),
            None => initial.clone(),
        };

        RecurrentState {
            hidden,
            cell: initial,
        }
    }

    /// Advances the state by one step and returns it together with the
    /// predicted position for the step.
    pub fn step(
        &self,
        state: RecurrentState<B>,
        position: Tensor<B, 2>, // [N, d_point]
        weather: Tensor<B, 2>,  // [N, d_weather]
    ) -> (RecurrentState<B>, Tensor<B, 2>) {
        let features = Tensor::cat(vec![state.hidden, position, weather], 1);
        let gates = self.gates.forward(features);

        let cell = gates.forget * state.cell + gates.input * gates.candidate;
        let hidden = gates.output * cell.clone().tanh();

        let next_hidden = match &self.projection {
            Some(proj) => activation::relu(proj.step.forward(hidden.clone())),
            None => hidden.clone(),
        };

        (
            RecurrentState {
                hidden: next_hidden,
                cell,
            },
            hidden,
        )
    }

    #[cfg(test)]
    pub(crate) fn with_gates(self, gates: GateWeights<B>) -> Self {
        TrajectoryCell { gates, ..self }
    }
}

#[derive(Config, Debug)]
pub struct TrajectoryCellConfig {
    #[config(default = 2)]
    pub d_point: usize,

    #[config(default = 4)]
    pub d_weather: usize,

    #[config(default = "None")]
    pub d_projection: Option<usize>,

    #[config(default = 0.1)]
    pub init_std: f64,
}

impl TrajectoryCellConfig {
    pub fn d_hidden_state(&self) -> usize {
        self.d_projection.unwrap_or(self.d_point)
    }

    /// Width of the concatenated `[hidden, position, weather]` gate input.
    pub fn d_gate_input(&self) -> usize {
        self.d_hidden_state() + self.d_point + self.d_weather
    }

    pub fn init<B: Backend>(&self) -> TrajectoryCell<B> {
        let gates = GateWeightsConfig::new(self.d_gate_input(), self.d_point)
            .with_init_std(self.init_std)
            .init();

        let projection = self.d_projection.map(|d_projection| {
            let config = AffineConfig::new(self.d_point, d_projection).with_init_std(self.init_std);
            HiddenProjection {
                initial: config.init(),
                step: config.init(),
            }
        });

        TrajectoryCell { gates, projection }
    }
}
