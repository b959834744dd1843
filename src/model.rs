//! Spectrogram-image CNN.
//!
//! ```text
//! [B, 1, H, W]
//!   conv 7×7 → 32   tanh  maxpool 2
//!   conv 5×5 → 64   tanh  maxpool 2
//!   conv 5×5 → 256  tanh  maxpool 2 (pad 1)
//!   flatten → linear 512 (Xavier) → relu → dropout 0.5 → linear 2 (Xavier)
//! [B, 2] logits
//! ```
//!
//! At the default 242 × 82 grid the last feature map is 31 × 11.
use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        Dropout, DropoutConfig, Initializer, Linear, LinearConfig, PaddingConfig2d, Relu,
    },
    prelude::*,
    tensor::activation::tanh,
};

/// Output channels of the three convolution blocks.
pub const CONV_CHANNELS: [usize; 3] = [32, 64, 256];

#[derive(Config, Debug)]
pub struct EegCnnConfig {
    /// Input image height (2 × retained frequency bins).
    #[config(default = 242)]
    pub height: usize,
    /// Input image width (2 × retained time frames).
    #[config(default = 82)]
    pub width: usize,
    #[config(default = 2)]
    pub num_classes: usize,
    #[config(default = 512)]
    pub hidden: usize,
    #[config(default = 0.5)]
    pub dropout: f64,
}

impl EegCnnConfig {
    /// Spatial size of the last pooled feature map.
    pub fn pooled_dims(&self) -> (usize, usize) {
        // k2 s2: n → n/2;  k2 s2 p1: n → n/2 + 1
        let f = |n: usize| (n / 2 / 2) / 2 + 1;
        (f(self.height), f(self.width))
    }

    /// Input width of the first linear layer.
    pub fn flattened_len(&self) -> usize {
        let (h, w) = self.pooled_dims();
        CONV_CHANNELS[2] * h * w
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> EegCnn<B> {
        let xavier = Initializer::XavierUniform { gain: 1.0 };
        let [c1, c2, c3] = CONV_CHANNELS;
        EegCnn {
            conv1: Conv2dConfig::new([1, c1], [7, 7])
                .with_padding(PaddingConfig2d::Explicit(3, 3))
                .init(device),
            conv2: Conv2dConfig::new([c1, c2], [5, 5])
                .with_padding(PaddingConfig2d::Explicit(2, 2))
                .init(device),
            conv3: Conv2dConfig::new([c2, c3], [5, 5])
                .with_padding(PaddingConfig2d::Explicit(2, 2))
                .init(device),
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            pool_last: MaxPool2dConfig::new([2, 2])
                .with_strides([2, 2])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(),
            fc1: LinearConfig::new(self.flattened_len(), self.hidden)
                .with_initializer(xavier.clone())
                .init(device),
            fc2: LinearConfig::new(self.hidden, self.num_classes)
                .with_initializer(xavier)
                .init(device),
            dropout: DropoutConfig::new(self.dropout).init(),
            activation: Relu::new(),
        }
    }
}

#[derive(Module, Debug)]
pub struct EegCnn<B: Backend> {
    conv1: Conv2d<B>,
    conv2: Conv2d<B>,
    conv3: Conv2d<B>,
    pool: MaxPool2d,
    pool_last: MaxPool2d,
    fc1: Linear<B>,
    fc2: Linear<B>,
    dropout: Dropout,
    activation: Relu,
}

impl<B: Backend> EegCnn<B> {
    /// `images`: [B, 1, H, W] → logits [B, num_classes]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.pool.forward(tanh(self.conv1.forward(images)));
        let x = self.pool.forward(tanh(self.conv2.forward(x)));
        let x = self.pool_last.forward(tanh(self.conv3.forward(x)));
        let x = x.flatten::<2>(1, 3);
        let x = self.dropout.forward(self.activation.forward(self.fc1.forward(x)));
        self.fc2.forward(x)
    }
}
