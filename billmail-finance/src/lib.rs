//! billmail-finance: category rules, structured extraction and the bill pipeline

pub mod answer;
pub mod category_rules;
pub mod extractor;
pub mod mock;
pub mod pipeline;
pub mod prompt;
pub mod recorder;

pub use answer::parse_answer;
pub use category_rules::{CategoryMapping, CategoryRule, load_mapping, resolve};
pub use extractor::Extractor;
pub use pipeline::{ItemOutcome, Pipeline, RunSummary};
pub use prompt::{TaskSpecBuilder, build_task_spec};
pub use recorder::RunRecorder;
