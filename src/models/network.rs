//! Sequence encoder plus two-unit head.

use super::config::{Architecture, NetworkConfig};
use crate::error::{ForecastError, Result};
use crate::nn::{Dense, Gru, Lstm, Module, ParamMut, SequenceLayer, TemporalConv};
use ndarray::{Array2, Array3, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// One encoder layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequenceBlock {
    Lstm(Lstm),
    Gru(Gru),
    Tcn(TemporalConv),
}

impl SequenceBlock {
    fn layer(&mut self) -> &mut dyn SequenceLayer {
        match self {
            SequenceBlock::Lstm(l) => l,
            SequenceBlock::Gru(l) => l,
            SequenceBlock::Tcn(l) => l,
        }
    }

    fn architecture(&self) -> Architecture {
        match self {
            SequenceBlock::Lstm(_) => Architecture::Lstm,
            SequenceBlock::Gru(_) => Architecture::Gru,
            SequenceBlock::Tcn(_) => Architecture::Tcn,
        }
    }

    /// Layer shapes plus `(input, output)` width.
    fn widths(&self) -> Result<(usize, usize)> {
        match self {
            SequenceBlock::Lstm(l) => l.check_shapes().map(|_| (l.input_size(), l.output_size())),
            SequenceBlock::Gru(l) => l.check_shapes().map(|_| (l.input_size(), l.output_size())),
            SequenceBlock::Tcn(l) => l.check_shapes().map(|_| (l.input_size(), l.output_size())),
        }
    }
}

impl Module for SequenceBlock {
    fn params(&mut self) -> Vec<ParamMut<'_>> {
        match self {
            SequenceBlock::Lstm(l) => l.params(),
            SequenceBlock::Gru(l) => l.params(),
            SequenceBlock::Tcn(l) => l.params(),
        }
    }
}

/// Maps a batch of windows `(n, lookback, features)` to raw outputs `(n, 2)`.
///
/// The head reads the encoder state at the last time step. What the two
/// outputs mean is decided by the training objective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntervalNetwork {
    config: NetworkConfig,
    input_size: usize,
    blocks: Vec<SequenceBlock>,
    head: Dense,
    #[serde(skip)]
    steps: usize,
}

impl IntervalNetwork {
    pub fn new(config: &NetworkConfig, input_size: usize) -> Result<Self> {
        config.validate()?;
        if input_size == 0 {
            return Err(ForecastError::InvalidParameter(
                "input_size must be positive".to_string(),
            ));
        }

        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut width = input_size;
        let mut blocks = Vec::with_capacity(config.num_layers);
        for layer in 0..config.num_layers {
            let block = match config.architecture {
                Architecture::Lstm => {
                    SequenceBlock::Lstm(Lstm::new(width, config.hidden_size, &mut rng))
                }
                Architecture::Gru => SequenceBlock::Gru(Gru::new(width, config.hidden_size, &mut rng)),
                Architecture::Tcn => SequenceBlock::Tcn(TemporalConv::new(
                    width,
                    config.hidden_size,
                    config.kernel_size,
                    1 << layer,
                    &mut rng,
                )?),
            };
            blocks.push(block);
            width = config.hidden_size;
        }

        Ok(Self {
            config: config.clone(),
            input_size,
            blocks,
            head: Dense::new(width, 2, &mut rng),
            steps: 0,
        })
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    /// Verify that the weights match the configuration and chain from
    /// `input_size` through every block into the two-unit head.
    pub fn check_shapes(&self) -> Result<()> {
        let config = &self.config;
        if self.blocks.len() != config.num_layers {
            return Err(ForecastError::Parse(format!(
                "network has {} blocks, configuration says {}",
                self.blocks.len(),
                config.num_layers
            )));
        }

        let mut width = self.input_size;
        for (index, block) in self.blocks.iter().enumerate() {
            if block.architecture() != config.architecture {
                return Err(ForecastError::Parse(format!(
                    "block {index} is {}, configuration says {}",
                    block.architecture().name(),
                    config.architecture.name()
                )));
            }
            if let SequenceBlock::Tcn(conv) = block {
                if conv.kernel_size() != config.kernel_size || conv.dilation() != 1 << index {
                    return Err(ForecastError::Parse(format!(
                        "block {index} has kernel {} and dilation {}",
                        conv.kernel_size(),
                        conv.dilation()
                    )));
                }
            }
            let (input, output) = block.widths()?;
            if input != width || output != config.hidden_size {
                return Err(ForecastError::Parse(format!(
                    "block {index} maps {input} -> {output}, expected {width} -> {}",
                    config.hidden_size
                )));
            }
            width = output;
        }

        self.head.check_shapes()?;
        if self.head.input_size() != width || self.head.output_size() != 2 {
            return Err(ForecastError::Parse(format!(
                "head maps {} -> {}, expected {width} -> 2",
                self.head.input_size(),
                self.head.output_size()
            )));
        }
        Ok(())
    }

    pub fn forward(&mut self, inputs: &Array3<f64>) -> Result<Array2<f64>> {
        let (_, steps, features) = inputs.dim();
        if features != self.input_size {
            return Err(ForecastError::DimensionMismatch {
                expected: self.input_size,
                got: features,
            });
        }
        if steps == 0 {
            return Err(ForecastError::InsufficientData { needed: 1, got: 0 });
        }

        let mut sequence: Vec<Array2<f64>> = inputs
            .axis_iter(Axis(1))
            .map(|step| step.to_owned())
            .collect();
        for block in &mut self.blocks {
            sequence = block.layer().forward(&sequence)?;
        }
        self.steps = steps;

        let last = sequence
            .last()
            .ok_or_else(|| ForecastError::ComputationError("encoder produced no output".into()))?;
        Ok(self.head.forward(last))
    }

    /// Back-propagate the gradient of the loss with respect to the outputs of
    /// the last [`forward`](Self::forward) call.
    pub fn backward(&mut self, d_outputs: &Array2<f64>) -> Result<()> {
        if self.steps == 0 {
            return Err(ForecastError::ComputationError(
                "backward called before forward".to_string(),
            ));
        }
        let d_last = self.head.backward(d_outputs)?;
        let mut grads = vec![Array2::zeros(d_last.raw_dim()); self.steps];
        grads[self.steps - 1] = d_last;

        for block in self.blocks.iter_mut().rev() {
            grads = block.layer().backward(&grads)?;
        }
        Ok(())
    }
}

impl Module for IntervalNetwork {
    fn params(&mut self) -> Vec<ParamMut<'_>> {
        let mut params: Vec<ParamMut<'_>> =
            self.blocks.iter_mut().flat_map(|b| b.params()).collect();
        params.extend(self.head.params());
        params
    }
}
