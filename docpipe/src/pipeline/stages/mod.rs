//! Pipeline stages.
//!
//! Each stage is driven by its own [`StageRunner`](super::runner::StageRunner)
//! and handles one step of a request:
//!
//! 1. **Fetch** - Retrieve raw content for the request key
//! 2. **Transform** - Convert the content into the caller's result

mod fetch;
mod transform;

pub(crate) use fetch::FetchStage;
pub(crate) use transform::TransformStage;
