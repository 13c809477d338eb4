//! Anatomical plausibility checks for generated human-figure images, and a
//! bounded regenerate-until-valid loop around an image generation backend.

pub mod backend;
pub mod checker;
pub mod checks;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod fusionbrain;
pub mod gate;
pub mod point;
pub mod pose;
pub mod provider;
pub mod repair;
pub mod retry;
pub mod store;

pub use checker::{CheckReport, PhotoChecker};
pub use error::Error;
pub use evaluator::{Evaluation, PoseEvaluator};
pub use retry::{RetryController, RunOutcome};
