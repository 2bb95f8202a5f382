//! Lesson plan pipeline: configuration, curriculum retrieval, schema-constrained
//! generation and the planner that sequences them.

pub mod bootstrap;
pub mod config;
pub mod context;
pub mod error;
pub mod generator;
pub mod plan;
pub mod planner;
pub mod request;
pub mod retriever;
pub mod schema;
pub mod secret;

pub use config::Config;
pub use context::{PipelineContext, PipelineSettings};
pub use error::{ErrorKind, PipelineError, SchemaValidationError, Violation};
pub use generator::{Generator, PromptFields};
pub use plan::LessonPlan;
pub use planner::{Planner, PlannerState};
pub use request::LessonPlanRequest;
pub use retriever::{RetrievedContext, RetrieverTool};
pub use schema::SchemaDescription;
pub use secret::Secret;
