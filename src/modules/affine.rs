use burn::config::Config;
use burn::module::{Module, Param};
use burn::tensor::{backend::Backend, Data, Distribution, Shape, Tensor};

/// `x W + b` with the weight stored as `[d_input, d_output]`.
#[derive(Module, Debug)]
pub struct Affine<B: Backend> {
    weight: Param<Tensor<B, 2>>,
    bias: Param<Tensor<B, 1>>,
}

impl<B: Backend> Affine<B> {
    pub fn from_tensors(weight: Tensor<B, 2>, bias: Tensor<B, 1>) -> Self {
        Affine {
            weight: Param::from(weight),
            bias: Param::from(bias),
        }
    }

    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let bias: Tensor<B, 2> = self.bias.val().unsqueeze();
        x.matmul(self.weight.val()) + bias
    }

    pub fn dims(&self) -> [usize; 2] {
        self.weight.val().dims()
    }
}

#[derive(Config, Debug)]
pub struct AffineConfig {
    pub d_input: usize,
    pub d_output: usize,

    #[config(default = 0.1)]
    pub init_std: f64,
}

/// Normal samples with every value beyond two standard deviations drawn again.
pub fn truncated_normal<B: Backend, const D: usize>(shape: [usize; D], std: f64) -> Tensor<B, D> {
    let bound = (2.0 * std) as f32;
    let sample = |n: usize| -> Vec<f32> {
        Tensor::<B, 1>::random([n], Distribution::Normal(0.0, std))
            .into_data()
            .convert::<f32>()
            .value
    };

    let mut values = sample(shape.iter().product());
    loop {
        let outside: Vec<usize> = values
            .iter()
            .enumerate()
            .filter(|(_, v)| v.abs() > bound)
            .map(|(idx, _)| idx)
            .collect();
        if outside.is_empty() {
            break;
        }
        for (idx, value) in outside.iter().zip(sample(outside.len())) {
            values[*idx] = value;
        }
    }

    Tensor::from_data(Data::new(values, Shape::new(shape)).convert())
}

impl AffineConfig {
    pub fn init<B: Backend>(&self) -> Affine<B> {
        Affine::from_tensors(
            truncated_normal([self.d_input, self.d_output], self.init_std),
            truncated_normal([self.d_output], self.init_std),
        )
    }
}
