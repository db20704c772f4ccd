//! Training loop, early stopping and checkpoints.

mod checkpoint;
mod trainer;

pub use checkpoint::{load_checkpoint, save_checkpoint, ModelCheckpoint};
pub use trainer::{Trainer, TrainerConfig, TrainingHistory};
