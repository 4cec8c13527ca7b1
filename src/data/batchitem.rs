use burn::tensor::{backend::Backend, Tensor};

#[derive(Clone, Debug)]
pub struct TrajectoryBatch<B: Backend> {
    pub names: Vec<String>,
    pub flight_plan: Tensor<B, 3>, // [N, T, 2]
    pub trajectory: Tensor<B, 3>,  // [N, T, 2]
    pub weather: Tensor<B, 4>,     // [N, T - 1, S, S]
}

impl<B: Backend> TrajectoryBatch<B> {
    /// True first position of every trajectory, `[N, 2]`.
    pub fn initial_position(&self) -> Tensor<B, 2> {
        let [batch, _, d_point] = self.trajectory.dims();
        self.trajectory
            .clone()
            .slice([0..batch, 0..1, 0..d_point])
            .squeeze(1)
    }
}
