//! Request orchestration: compiles an edit request, walks the key pool in
//! rotation order, performs one remote attempt per key, and settles the pool
//! state from the classified outcomes.

pub mod adapter;
pub mod gemini;
pub mod orchestrator;
pub mod outcome;
pub mod request;

pub use adapter::{AttemptPayload, EchoAdapter, PayloadPart, RemoteAdapter};
pub use gemini::GeminiAdapter;
pub use orchestrator::Orchestrator;
pub use outcome::{AttemptOutcome, GenerationFailure, GenerationSuccess, ProbeOutcome};
pub use request::{GenerationRequest, ImageBlob};
