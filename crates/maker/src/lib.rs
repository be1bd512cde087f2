//! # Code-generation metadata
//!
//! Declarative models describing an application for code generation:
//! structs, services and their step pipelines, plus per-language target
//! settings. The models are plain serde data; generators consume them
//! through an [`Application`] registry that guarantees unique names.
//!
//! - [`model`]: the application registry and its struct/service/step models
//! - [`golang`]: Go target settings (module, version, package layout)

pub mod golang;
pub mod model;

pub use golang::LanguageGolangModel;
pub use model::{
    Application, FieldModel, ModelError, ServiceModel, StepModel, StructModel,
};
