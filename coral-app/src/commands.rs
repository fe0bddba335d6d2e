//! Slash-command surface.

use coral_discord::CommandSpec;

pub const ASK: &str = "ask";
pub const CONVERSE: &str = "converse";
pub const PROMPT_OPTION: &str = "prompt";

/// The full command set, registered as one overwrite at startup.
pub fn definitions() -> Vec<CommandSpec> {
    vec![
        CommandSpec::new(ASK, "Ask a one-off question")
            .with_required_string(PROMPT_OPTION, "What to ask"),
        CommandSpec::new(CONVERSE, "Start a conversation in a new thread")
            .with_required_string(PROMPT_OPTION, "Opening message for the conversation"),
    ]
}
