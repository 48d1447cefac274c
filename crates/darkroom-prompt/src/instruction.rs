use serde::{Deserialize, Serialize};

/// What the user typed into the instruction box. The same input field doubles
/// as a workflow selector: a handful of registered sentinel strings pick a
/// fixed one-click workflow instead of being read as prose, so the sentinel
/// check has to happen before anything treats the value as free text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Instruction {
    FreeText(String),
    Workflow(Workflow),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Workflow {
    InstantRemaster,
    StudioSwap,
    FullBody,
}

impl Instruction {
    /// Resolves raw instruction input, mapping the registered workflow
    /// sentinels to their tagged form.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "INSTANT_STUDIO_REMASTER" => Self::Workflow(Workflow::InstantRemaster),
            "STUDIO_SWAP" => Self::Workflow(Workflow::StudioSwap),
            "FULL_BODY_GENERATION" => Self::Workflow(Workflow::FullBody),
            text => Self::FreeText(text.to_owned()),
        }
    }

    pub fn as_free_text(&self) -> Option<&str> {
        match self {
            Self::FreeText(text) => Some(text.as_str()),
            Self::Workflow(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels_resolve_to_workflows() {
        assert_eq!(
            Instruction::parse("INSTANT_STUDIO_REMASTER"),
            Instruction::Workflow(Workflow::InstantRemaster)
        );
        assert_eq!(
            Instruction::parse("STUDIO_SWAP"),
            Instruction::Workflow(Workflow::StudioSwap)
        );
        assert_eq!(
            Instruction::parse("FULL_BODY_GENERATION"),
            Instruction::Workflow(Workflow::FullBody)
        );
    }

    #[test]
    fn anything_else_is_free_text() {
        assert_eq!(
            Instruction::parse("make the sky bluer"),
            Instruction::FreeText("make the sky bluer".into())
        );
        // Near-misses must not trigger a workflow.
        assert_eq!(
            Instruction::parse("studio_swap"),
            Instruction::FreeText("studio_swap".into())
        );
    }
}
