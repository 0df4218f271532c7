use crate::model::ModelConfig;
use burn::nn::loss::BinaryCrossEntropyLossConfig;
use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::activation::{relu, sigmoid};

/// Feed-forward binary classifier for dive detection
#[derive(Module, Debug)]
pub struct DiveClassifier<B: Backend> {
    fc1: Linear<B>,
    fc2: Linear<B>,
    /// Output layer (single logit)
    output: Linear<B>,
    dropout: Dropout,
}

impl<B: Backend> DiveClassifier<B> {
    /// Forward pass, returns logits of shape `[batch_size, 1]`
    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self.fc1.forward(input);
        let x = relu(x);
        let x = self.dropout.forward(x);

        let x = self.fc2.forward(x);
        let x = relu(x);
        let x = self.dropout.forward(x);

        self.output.forward(x)
    }

    /// Mean binary cross-entropy of the logits against `targets`
    pub fn loss(&self, input: Tensor<B, 2>, targets: Tensor<B, 1, Int>) -> Tensor<B, 1> {
        let logits = self.forward(input).squeeze::<1>(1);

        BinaryCrossEntropyLossConfig::new()
            .with_logits(true)
            .init(&logits.device())
            .forward(logits, targets)
    }

    /// Probability of the positive class, shape `[batch_size]`
    pub fn predict_proba(&self, input: Tensor<B, 2>) -> Tensor<B, 1> {
        sigmoid(self.forward(input)).squeeze::<1>(1)
    }
}

/// Initialize the classifier from configuration
pub fn init_model<B: Backend>(config: &ModelConfig, device: &B::Device) -> DiveClassifier<B> {
    let fc1 = LinearConfig::new(config.input_size, config.hidden_size_1)
        .with_bias(true)
        .init(device);

    let fc2 = LinearConfig::new(config.hidden_size_1, config.hidden_size_2)
        .with_bias(true)
        .init(device);

    let output = LinearConfig::new(config.hidden_size_2, 1)
        .with_bias(true)
        .init(device);

    let dropout = DropoutConfig::new(config.dropout).init();

    DiveClassifier {
        fc1,
        fc2,
        output,
        dropout,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_model_forward() {
        let device = <TestBackend as Backend>::Device::default();
        let config = ModelConfig::new(6);
        let model = init_model::<TestBackend>(&config, &device);

        let input = Tensor::<TestBackend, 2>::zeros([3, 6], &device);
        let output = model.forward(input);

        assert_eq!(output.dims(), [3, 1]);
    }

    #[test]
    fn test_predict_proba_in_unit_interval() {
        let device = <TestBackend as Backend>::Device::default();
        let model = init_model::<TestBackend>(&ModelConfig::new(4), &device);

        let input = Tensor::<TestBackend, 2>::ones([5, 4], &device);
        let probs: Vec<f32> = model
            .predict_proba(input)
            .into_data()
            .convert::<f32>()
            .to_vec()
            .unwrap();

        assert_eq!(probs.len(), 5);
        assert!(probs.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn test_loss_is_positive_scalar() {
        let device = <TestBackend as Backend>::Device::default();
        let model = init_model::<TestBackend>(&ModelConfig::new(3), &device);

        let input = Tensor::<TestBackend, 2>::ones([4, 3], &device);
        let targets = Tensor::<TestBackend, 1, Int>::from_data(
            TensorData::new(vec![1i64, 0, 1, 0], [4]),
            &device,
        );
        let loss = model.loss(input, targets);

        assert_eq!(loss.dims(), [1]);
        assert!(loss.into_scalar() > 0.0);
    }
}
