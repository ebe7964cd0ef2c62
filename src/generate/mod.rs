mod orchestrator;
mod teil;

pub use orchestrator::{GenerationReport, Orchestrator};
pub use teil::{GeneratedTeil, TeilGenerator};
