use crate::data::batchitem::TrajectoryBatch;
use crate::errors;
use crate::utils::sequence_loss;
use burn::config::Config;
use burn::module::Module;
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::{backend::Backend, Tensor};
use burn::train::{RegressionOutput, TrainOutput, TrainStep, ValidStep};

use super::cell::{TrajectoryCell, TrajectoryCellConfig};
use super::encoder::{WeatherEncoder, WeatherEncoderConfig};

#[derive(Module, Debug)]
pub struct TrajectoryModel<B: Backend> {
    encoder: WeatherEncoder<B>,
    cell: TrajectoryCell<B>,
}

impl<B: Backend> TrajectoryModel<B> {
    /// Unrolls the cell over the flight plan. Step 0 of the result is `initial`,
    /// step `t + 1` is predicted from the flight plan point and weather cube at `t`.
    pub fn forward(
        &self,
        flight_plan: Tensor<B, 3>, // [N, T, 2]
        weather: Tensor<B, 4>,     // [N, T - 1, S, S]
        initial: Tensor<B, 2>,     // [N, 2]
    ) -> Tensor<B, 3> {
        let [batch, steps, d_point] = flight_plan.dims();
        let [_, _, height, width] = weather.dims();

        let mut state = self.cell.init_state(initial.clone());
        let mut predictions: Vec<Tensor<B, 3>> = vec![initial.unsqueeze_dim(1)];

        for t in 0..steps.saturating_sub(1) {
            let cube: Tensor<B, 3> = weather
                .clone()
                .slice([0..batch, t..t + 1, 0..height, 0..width])
                .squeeze(1);
            let position: Tensor<B, 2> = flight_plan
                .clone()
                .slice([0..batch, t..t + 1, 0..d_point])
                .squeeze(1);

            let features = self.encoder.forward(cube);
            let (next, prediction) = self.cell.step(state, position, features);

            predictions.push(prediction.unsqueeze_dim(1));
            state = next;
        }

        Tensor::cat(predictions, 1)
    }

    pub fn predict(&self, batch: &TrajectoryBatch<B>) -> Tensor<B, 3> {
        self.forward(
            batch.flight_plan.clone(),
            batch.weather.clone(),
            batch.initial_position(),
        )
    }

    pub fn forward_regression(&self, batch: TrajectoryBatch<B>) -> RegressionOutput<B> {
        let targets = batch.trajectory.clone();
        let pred = self.predict(&batch);
        let loss = sequence_loss(pred.clone(), targets.clone());

        let [n, t, d] = pred.dims();
        RegressionOutput::new(loss, pred.reshape([n, t * d]), targets.reshape([n, t * d]))
    }
}

impl<B: AutodiffBackend> TrainStep<TrajectoryBatch<B>, RegressionOutput<B>> for TrajectoryModel<B> {
    fn step(&self, batch: TrajectoryBatch<B>) -> TrainOutput<RegressionOutput<B>> {
        let item = self.forward_regression(batch);
        TrainOutput::new(self, item.loss.backward(), item)
    }
}

impl<B: Backend> ValidStep<TrajectoryBatch<B>, RegressionOutput<B>> for TrajectoryModel<B> {
    fn step(&self, batch: TrajectoryBatch<B>) -> RegressionOutput<B> {
        self.forward_regression(batch)
    }
}

#[derive(Config, Debug)]
pub struct TrajectoryModelConfig {
    pub encoder: WeatherEncoderConfig,

    #[config(default = 2)]
    pub d_point: usize,

    /// Hidden state width of the projected variant, `None` keeps it at `d_point`.
    #[config(default = "None")]
    pub d_projection: Option<usize>,

    #[config(default = 0.1)]
    pub init_std: f64,
}

impl TrajectoryModelConfig {
    pub fn cell(&self) -> TrajectoryCellConfig {
        TrajectoryCellConfig::new()
            .with_d_point(self.d_point)
            .with_d_weather(self.encoder.d_output)
            .with_d_projection(self.d_projection)
            .with_init_std(self.init_std)
    }

    pub fn init<B: Backend>(&self) -> errors::Result<TrajectoryModel<B>> {
        Ok(TrajectoryModel {
            encoder: self.encoder.init()?,
            cell: self.cell().init(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::convlstm::gate::GateWeights;
    use crate::modules::affine::Affine;
    use burn::backend::{Autodiff, NdArray};
    use burn::module::{ModuleMapper, ParamId};
    use burn::tensor::{Data, Shape};

    type TestBackend = NdArray<f32>;

    // rows for [h0, h1, x0, x1, w0, w1, w2, w3]
    type GateRows = ([[f32; 2]; 8], [f32; 2]);

    const FORGET: GateRows = (
        [
            [0.1, 0.2],
            [0.3, -0.1],
            [0.5, 0.0],
            [0.0, 0.4],
            [0.2, -0.1],
            [-0.3, 0.1],
            [0.1, 0.1],
            [0.0, -0.2],
        ],
        [0.1, -0.2],
    );
    const INPUT: GateRows = (
        [
            [-0.2, 0.1],
            [0.4, 0.3],
            [0.0, -0.5],
            [0.2, 0.2],
            [0.1, 0.3],
            [0.0, -0.2],
            [-0.1, 0.2],
            [0.3, 0.0],
        ],
        [0.0, 0.3],
    );
    const CANDIDATE: GateRows = (
        [
            [0.6, -0.3],
            [0.1, 0.2],
            [-0.4, 0.5],
            [0.3, 0.1],
            [-0.5, 0.2],
            [0.2, 0.4],
            [0.3, -0.3],
            [-0.1, 0.1],
        ],
        [-0.1, 0.05],
    );
    const OUTPUT: GateRows = (
        [
            [0.2, 0.2],
            [-0.1, 0.4],
            [0.3, 0.3],
            [0.5, -0.2],
            [0.1, 0.0],
            [0.2, -0.1],
            [-0.2, 0.3],
            [0.4, 0.1],
        ],
        [0.2, 0.1],
    );

    const PARAM: f32 = 0.2;

    /// Sets every parameter of a module to the same value.
    struct ConstantParams(f32);

    impl<B: Backend> ModuleMapper<B> for ConstantParams {
        fn map_float<const D: usize>(
            &mut self,
            _id: &ParamId,
            tensor: Tensor<B, D>,
        ) -> Tensor<B, D> {
            tensor.mul_scalar(0.0).add_scalar(self.0)
        }
    }

    fn affine((rows, bias): GateRows) -> Affine<TestBackend> {
        let values: Vec<f32> = rows.iter().flatten().copied().collect();
        let weight = Tensor::from_data(Data::new(values, Shape::new([8, 2])));
        Affine::from_tensors(weight, Tensor::from_floats(bias))
    }

    fn sigmoid(x: f32) -> f32 {
        1.0 / (1.0 + (-x).exp())
    }

    fn gate((rows, bias): GateRows, z: [f32; 8]) -> [f32; 2] {
        let mut out = bias;
        for (k, row) in rows.iter().enumerate() {
            out[0] += z[k] * row[0];
            out[1] += z[k] * row[1];
        }
        out
    }

    fn reference(plan: &[[f32; 2]], initial: [f32; 2], weather: &[[f32; 4]]) -> Vec<[f32; 2]> {
        let mut h = initial;
        let mut c = initial;
        let mut out = vec![initial];

        for (x, w) in plan[..plan.len() - 1].iter().zip(weather) {
            let z = [h[0], h[1], x[0], x[1], w[0], w[1], w[2], w[3]];
            let f = gate(FORGET, z);
            let i = gate(INPUT, z);
            let c_hat = gate(CANDIDATE, z);
            let o = gate(OUTPUT, z);
            for k in 0..2 {
                c[k] = sigmoid(f[k]) * c[k] + sigmoid(i[k]) * c_hat[k].tanh();
                h[k] = sigmoid(o[k]) * c[k].tanh();
            }
            out.push(h);
        }
        out
    }

    fn small_config() -> TrajectoryModelConfig {
        TrajectoryModelConfig::new(
            WeatherEncoderConfig::new(4)
                .with_conv1_kernel(2)
                .with_conv2_kernel(1),
        )
    }

    type Sequences = [[[f32; 2]; 5]; 2];

    fn weather_value(n: usize, t: usize, r: usize, c: usize) -> f32 {
        ((((n * 4 + t) * 4 + r) * 4 + c) % 7) as f32 / 7.0
    }

    fn batch<B: Backend>(plan: &Sequences, truth: &Sequences) -> TrajectoryBatch<B> {
        let flatten =
            |t: &Sequences| -> Vec<f32> { t.iter().flatten().flatten().copied().collect() };
        let weather: Vec<f32> = (0..2 * 4 * 16)
            .map(|v| weather_value(v / 64, v / 16 % 4, v / 4 % 4, v % 4))
            .collect();

        TrajectoryBatch {
            names: vec!["a".into(), "b".into()],
            flight_plan: Tensor::from_data(
                Data::new(flatten(plan), Shape::new([2, 5, 2])).convert(),
            ),
            trajectory: Tensor::from_data(
                Data::new(flatten(truth), Shape::new([2, 5, 2])).convert(),
            ),
            weather: Tensor::from_data(
                Data::new(weather, Shape::new([2, 4, 4, 4])).convert(),
            ),
        }
    }

    const PLAN: Sequences = [
        [[0.60, 0.80], [0.58, 0.70], [0.55, 0.60], [0.52, 0.50], [0.48, 0.40]],
        [[0.30, 0.20], [0.35, 0.30], [0.40, 0.40], [0.45, 0.50], [0.50, 0.60]],
    ];
    const TRUTH: Sequences = [
        [[0.61, 0.79], [0.57, 0.71], [0.56, 0.62], [0.50, 0.49], [0.47, 0.41]],
        [[0.31, 0.21], [0.34, 0.29], [0.42, 0.41], [0.44, 0.52], [0.51, 0.58]],
    ];

    /// Encoder output with every parameter at `PARAM`. Only the top left 2x2 patch
    /// of a 4x4 cube reaches the single output of the second convolution.
    fn encoded(n: usize, t: usize) -> f32 {
        let patch: f32 = [(0, 0), (0, 1), (1, 0), (1, 1)]
            .iter()
            .map(|(r, c)| weather_value(n, t, *r, *c))
            .sum();
        let conv1 = PARAM * patch + PARAM;
        let conv2 = PARAM * 2.0 * conv1 + PARAM;
        let fc1 = PARAM * 4.0 * conv2 + PARAM;
        PARAM * 16.0 * fc1 + PARAM
    }

    #[test]
    fn forward_matches_hand_computation() {
        let config = small_config();
        let gates = GateWeights::new(
            affine(FORGET),
            affine(INPUT),
            affine(CANDIDATE),
            affine(OUTPUT),
        );
        let model = TrajectoryModel {
            encoder: config
                .encoder
                .init::<TestBackend>()
                .unwrap()
                .map(&mut ConstantParams(PARAM)),
            cell: config.cell().init().with_gates(gates),
        };

        let batch = batch::<TestBackend>(&PLAN, &TRUTH);

        let weather: Vec<Vec<[f32; 4]>> = (0..2)
            .map(|n| {
                (0..4)
                    .map(|t| {
                        let cube: Tensor<TestBackend, 3> = batch
                            .weather
                            .clone()
                            .slice([n..n + 1, t..t + 1, 0..4, 0..4])
                            .reshape([1, 4, 4]);
                        let w = model.encoder.forward(cube).into_data().value;
                        for v in &w {
                            assert!((v - encoded(n, t)).abs() < 1e-5, "n={n} t={t}: {w:?}");
                        }
                        [w[0], w[1], w[2], w[3]]
                    })
                    .collect()
            })
            .collect();
        // every step sees its own cube
        assert!((weather[0][0][0] - weather[0][1][0]).abs() > 1e-2);

        let output = model.forward_regression(batch);

        let predicted = output.output.into_data().value;
        let mut loss = 0.0;
        for n in 0..2 {
            let expected = reference(&PLAN[n], TRUTH[n][0], &weather[n]);
            for t in 0..5 {
                for k in 0..2 {
                    let got = predicted[n * 10 + t * 2 + k];
                    let want = expected[t][k];
                    assert!((got - want).abs() < 1e-5, "n={n} t={t} k={k}: {got} != {want}");
                }
                let d0 = expected[t][0] - TRUTH[n][t][0];
                let d1 = expected[t][1] - TRUTH[n][t][1];
                loss += (d0 * d0 + d1 * d1).sqrt();
            }
        }
        loss /= 10.0;

        let got = output.loss.into_scalar();
        assert!((got - loss).abs() < 1e-5, "{got} != {loss}");
    }

    #[test]
    fn first_prediction_is_true_initial_position() {
        let model = small_config().with_d_projection(Some(6)).init::<TestBackend>().unwrap();
        let batch = batch::<TestBackend>(&PLAN, &TRUTH);

        let predicted = model.predict(&batch);
        assert_eq!(predicted.dims(), [2, 5, 2]);

        let first: Vec<f32> = predicted.slice([0..2, 0..1, 0..2]).into_data().value;
        assert_eq!(
            first,
            vec![TRUTH[0][0][0], TRUTH[0][0][1], TRUTH[1][0][0], TRUTH[1][0][1]]
        );
    }

    #[test]
    fn inference_is_deterministic() {
        let model = small_config().init::<TestBackend>().unwrap();
        let batch = batch::<TestBackend>(&PLAN, &TRUTH);

        let first = model.predict(&batch).into_data().value;
        let second = model.predict(&batch).into_data().value;
        assert_eq!(first, second);
    }

    #[test]
    fn train_step_produces_finite_loss() {
        type TrainBackend = Autodiff<TestBackend>;

        let model = small_config().init::<TrainBackend>().unwrap();
        let output = TrainStep::step(&model, batch::<TrainBackend>(&PLAN, &TRUTH));

        assert!(output.item.loss.into_scalar().is_finite());
    }

    #[test]
    fn too_small_cube_fails_init() {
        let config = TrajectoryModelConfig::new(WeatherEncoderConfig::new(4));
        assert!(config.init::<TestBackend>().is_err());
    }
}
