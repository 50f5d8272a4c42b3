// Feature assembly: turns the independently scraped source tables into one
// flat frame per run (training or inference).

pub mod align;
pub mod catalog;
pub mod context;
pub mod frame;
pub mod injury;
pub mod labels;
pub mod matrix;
pub mod merge;
pub mod pipeline;

pub use frame::{Frame, FrameRow};
pub use matrix::FeatureMatrix;
pub use pipeline::PipelineInputs;
