//! Network configuration.

use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};

/// Sequence encoder used in front of the two-unit head.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Architecture {
    #[default]
    Lstm,
    Gru,
    /// Stack of causal dilated convolutions.
    Tcn,
}

impl Architecture {
    pub fn name(&self) -> &'static str {
        match self {
            Architecture::Lstm => "LSTM",
            Architecture::Gru => "GRU",
            Architecture::Tcn => "TCN",
        }
    }
}

/// Shape of an [`IntervalNetwork`](super::IntervalNetwork).
///
/// # Example
///
/// ```
/// use tubecast::models::{Architecture, NetworkConfig};
///
/// let config = NetworkConfig::default()
///     .with_architecture(Architecture::Gru)
///     .with_hidden_size(16)
///     .with_num_layers(2);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub architecture: Architecture,
    /// Units per recurrent layer or channels per convolution block
    pub hidden_size: usize,
    pub num_layers: usize,
    /// Convolution kernel width (TCN only)
    pub kernel_size: usize,
    /// Seed for weight initialization
    pub seed: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            architecture: Architecture::Lstm,
            hidden_size: 32,
            num_layers: 1,
            kernel_size: 3,
            seed: 42,
        }
    }
}

impl NetworkConfig {
    pub fn new(architecture: Architecture) -> Self {
        Self {
            architecture,
            ..Default::default()
        }
    }

    pub fn with_architecture(mut self, architecture: Architecture) -> Self {
        self.architecture = architecture;
        self
    }

    pub fn with_hidden_size(mut self, hidden_size: usize) -> Self {
        self.hidden_size = hidden_size;
        self
    }

    pub fn with_num_layers(mut self, num_layers: usize) -> Self {
        self.num_layers = num_layers;
        self
    }

    pub fn with_kernel_size(mut self, kernel_size: usize) -> Self {
        self.kernel_size = kernel_size;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.hidden_size == 0 {
            return Err(ForecastError::InvalidParameter(
                "hidden_size must be positive".to_string(),
            ));
        }
        if self.num_layers == 0 {
            return Err(ForecastError::InvalidParameter(
                "num_layers must be positive".to_string(),
            ));
        }
        if self.architecture == Architecture::Tcn && self.kernel_size == 0 {
            return Err(ForecastError::InvalidParameter(
                "kernel_size must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Steps of history visible to the last output of a TCN stack.
    pub fn receptive_field(&self) -> Option<usize> {
        (self.architecture == Architecture::Tcn).then(|| {
            let dilations: usize = (0..self.num_layers).map(|l| 1usize << l).sum();
            1 + (self.kernel_size.saturating_sub(1)) * dilations
        })
    }
}
