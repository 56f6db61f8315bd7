pub mod handler;
pub mod service;
pub mod workflow;

pub use service::{PredictionCache, PredictionQuery, PredictionService, ServedPrediction};
pub use workflow::{HttpWorkflow, PredictionResult, PredictionWorkflow, WorkflowError};
