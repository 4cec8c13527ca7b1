use burn::tensor::{backend::Backend, Data, Shape, Tensor};

use crate::data::Trajectory;

/// Euclidean distance between predicted and true points, `[N, T, 2]` -> `[N, T]`.
pub fn point_distance<B: Backend>(y_pred: Tensor<B, 3>, y_true: Tensor<B, 3>) -> Tensor<B, 2> {
    let diff = y_pred - y_true;
    (diff.clone() * diff).sum_dim(2).sqrt().squeeze(2)
}

/// Mean point distance over all steps of all trajectories.
pub fn sequence_loss<B: Backend>(y_pred: Tensor<B, 3>, y_true: Tensor<B, 3>) -> Tensor<B, 1> {
    point_distance(y_pred, y_true).mean()
}

pub fn trajectories_to_tensor<B: Backend>(trajectories: &[Trajectory]) -> Tensor<B, 3> {
    let batch = trajectories.len();
    let steps = trajectories.first().map(|t| t.len()).unwrap_or(0);

    let values: Vec<f32> = trajectories
        .iter()
        .flat_map(|t| t.iter().flat_map(|p| p.iter().copied()))
        .collect();

    let data = Data::new(values, Shape::new([batch, steps, 2]));
    Tensor::from_data(data.convert())
}

pub fn tensor_to_trajectories<B: Backend>(tensor: Tensor<B, 3>) -> Vec<Trajectory> {
    let [_, steps, d_point] = tensor.dims();
    let values: Vec<f32> = tensor.into_data().convert().value;

    values
        .chunks(steps * d_point)
        .map(|t| t.chunks(d_point).map(|p| [p[0], p[1]]).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn loss_is_mean_euclidean_distance() {
        let y_pred = Tensor::<TestBackend, 3>::from_floats([
            [[0.0, 0.0], [3.0, 4.0]],
            [[1.0, 1.0], [1.0, 1.0]],
        ]);
        let y_true = Tensor::<TestBackend, 3>::from_floats([
            [[0.0, 0.0], [0.0, 0.0]],
            [[1.0, 1.0], [1.0, 3.0]],
        ]);

        let loss = sequence_loss(y_pred, y_true).into_scalar();
        assert!((loss - 7.0 / 4.0).abs() < 1e-6);
    }

    #[test]
    fn trajectories_keep_point_order() {
        let trajectories = vec![vec![[0.1, 0.2], [0.3, 0.4]], vec![[0.5, 0.6], [0.7, 0.8]]];
        let tensor = trajectories_to_tensor::<TestBackend>(&trajectories);

        assert_eq!(tensor.dims(), [2, 2, 2]);
        assert_eq!(tensor_to_trajectories(tensor), trajectories);
    }
}
