use burn::config::Config;
use burn::module::Module;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::{Linear, LinearConfig, PaddingConfig2d};
use burn::tensor::activation;
use burn::tensor::{backend::Backend, Tensor};

use crate::errors::{self, config_error};

/// Reduces one weather cube per sequence to a small feature vector.
#[derive(Module, Debug)]
pub struct WeatherEncoder<B: Backend> {
    conv1: Conv2d<B>,
    conv2: Conv2d<B>,
    fc1: Linear<B>,
    fc2: Linear<B>,
}

impl<B: Backend> WeatherEncoder<B> {
    /// `cubes` is `[N, S, S]`, the result `[N, d_output]`
    pub fn forward(&self, cubes: Tensor<B, 3>) -> Tensor<B, 2> {
        let [batch, height, width] = cubes.dims();
        let x: Tensor<B, 4> = cubes.reshape([batch, 1, height, width]);

        let x = activation::relu(self.conv1.forward(x));
        let x = activation::relu(self.conv2.forward(x));

        let [batch, channels, height, width] = x.dims();
        let x: Tensor<B, 2> = x.reshape([batch, channels * height * width]);

        let x = activation::relu(self.fc1.forward(x));
        activation::relu(self.fc2.forward(x))
    }
}

#[derive(Config, Debug)]
pub struct WeatherEncoderConfig {
    pub cube_size: usize,

    #[config(default = 2)]
    pub conv1_channels: usize,

    #[config(default = 6)]
    pub conv1_kernel: usize,

    #[config(default = 4)]
    pub conv2_channels: usize,

    #[config(default = 3)]
    pub conv2_kernel: usize,

    #[config(default = 2)]
    pub stride: usize,

    #[config(default = 16)]
    pub d_hidden: usize,

    #[config(default = 4)]
    pub d_output: usize,
}

fn valid_conv_size(size: usize, kernel: usize, stride: usize) -> Option<usize> {
    if stride == 0 || kernel == 0 || size < kernel {
        None
    } else {
        Some((size - kernel) / stride + 1)
    }
}

impl WeatherEncoderConfig {
    /// Number of values the second convolution hands to the dense layers.
    pub fn flat_size(&self) -> errors::Result<usize> {
        let size = valid_conv_size(self.cube_size, self.conv1_kernel, self.stride)
            .and_then(|size| valid_conv_size(size, self.conv2_kernel, self.stride))
            .ok_or_else(|| {
                config_error!(
                    "weather cube {0}x{0} too small for kernels {1}/{2} with stride {3}",
                    self.cube_size,
                    self.conv1_kernel,
                    self.conv2_kernel,
                    self.stride
                )
            })?;

        Ok(size * size * self.conv2_channels)
    }

    pub fn init<B: Backend>(&self) -> errors::Result<WeatherEncoder<B>> {
        let flat_size = self.flat_size()?;
        let stride = [self.stride, self.stride];

        let conv1 = Conv2dConfig::new([1, self.conv1_channels], [self.conv1_kernel; 2])
            .with_stride(stride)
            .with_padding(PaddingConfig2d::Valid)
            .init();
        let conv2 = Conv2dConfig::new(
            [self.conv1_channels, self.conv2_channels],
            [self.conv2_kernel; 2],
        )
        .with_stride(stride)
        .with_padding(PaddingConfig2d::Valid)
        .init();

        Ok(WeatherEncoder {
            conv1,
            conv2,
            fc1: LinearConfig::new(flat_size, self.d_hidden).init(),
            fc2: LinearConfig::new(self.d_hidden, self.d_output).init(),
        })
    }
}
