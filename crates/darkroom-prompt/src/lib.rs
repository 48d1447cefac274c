//! Compiles an edit request (mode, settings, instruction) into the final
//! instruction text and the ordered list of image attachments to send.
//!
//! Everything in this crate is pure: no I/O, no clocks, no state.

pub mod compile;
pub mod instruction;
pub mod settings;

pub use compile::{Attachment, CompiledPrompt, compile};
pub use instruction::{Instruction, Workflow};
pub use settings::{
    BackgroundProcessing, CompositeSettings, CreativeSettings, ModeSettings, PortraitSettings,
    RestoreSettings, WorkMode,
};
