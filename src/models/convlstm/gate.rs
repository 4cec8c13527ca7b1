use burn::config::Config;
use burn::module::Module;
use burn::tensor::activation;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use crate::modules::affine::{Affine, AffineConfig};

/// The four affine maps of the recurrent update. Created once per model and
/// borrowed by every step of every sequence.
#[derive(Module, Debug)]
pub struct GateWeights<B: Backend> {
    forget: Affine<B>,
    input: Affine<B>,
    candidate: Affine<B>,
    output: Affine<B>,
}

#[derive(Clone, Debug)]
pub struct GateActivations<B: Backend> {
    pub forget: Tensor<B, 2>,
    pub input: Tensor<B, 2>,
    pub candidate: Tensor<B, 2>,
    pub output: Tensor<B, 2>,
}

impl<B: Backend> GateWeights<B> {
    pub fn new(
        forget: Affine<B>,
        input: Affine<B>,
        candidate: Affine<B>,
        output: Affine<B>,
    ) -> Self {
        GateWeights {
            forget,
            input,
            candidate,
            output,
        }
    }

    pub fn forward(&self, features: Tensor<B, 2>) -> GateActivations<B> {
        let forget = activation::sigmoid(self.forget.forward(features.clone()));
        let input = activation::sigmoid(self.input.forward(features.clone()));
        let output = activation::sigmoid(self.output.forward(features.clone()));
        let candidate = self.candidate.forward(features).tanh();

        GateActivations {
            forget,
            input,
            candidate,
            output,
        }
    }

    /// `[d_input, d_output]` shared by all four gates
    pub fn dims(&self) -> [usize; 2] {
        self.forget.dims()
    }
}

#[derive(Config, Debug)]
pub struct GateWeightsConfig {
    pub d_input: usize,
    pub d_output: usize,

    #[config(default = 0.1)]
    pub init_std: f64,
}

impl GateWeightsConfig {
    pub fn init<B: Backend>(&self) -> GateWeights<B> {
        let affine = AffineConfig::new(self.d_input, self.d_output).with_init_std(self.init_std);

        GateWeights {
            forget: affine.init(),
            input: affine.init(),
            candidate: affine.init(),
            output: affine.init(),
        }
    }
}
