use std::path::PathBuf;

use async_trait::async_trait;

use crate::{
    codec::{FlowId, StepId},
    flows::{FlowError, FlowHandler, Reply, Turn},
    keyboard,
    messages::Msg,
};

/// Map a reserved slash command to its command step.
///
/// Accepts `/cmd`, `/cmd@botname` and trailing arguments.
pub fn parse(text: &str) -> Option<StepId> {
    let word = text.split_whitespace().next()?;
    let name = word.strip_prefix('/')?;
    let name = name.split('@').next().unwrap_or(name);
    match name.to_lowercase().as_str() {
        "start" => Some(StepId::Start),
        "help" => Some(StepId::Help),
        "debt" => Some(StepId::Manual),
        _ => None,
    }
}

/// Top-level commands. Always ends whatever flow the user was in.
pub struct CommandFlow {
    welcome_media: PathBuf,
}

impl CommandFlow {
    pub fn new(welcome_media: PathBuf) -> Self {
        Self { welcome_media }
    }
}

#[async_trait]
impl FlowHandler for CommandFlow {
    fn flow(&self) -> FlowId {
        FlowId::Command
    }

    async fn handle(&self, turn: &mut Turn) -> Result<Reply, FlowError> {
        turn.clear();
        let entry = keyboard::main_menu_entry();
        match turn.step {
            StepId::Start => Ok(Reply::new(Msg::Welcome, &[])
                .with_keyboard(entry)
                .with_media(self.welcome_media.clone())),
            StepId::Help => Ok(Reply::new(Msg::Help, &[]).with_keyboard(entry)),
            StepId::Manual => Ok(Reply::new(Msg::Manual, &[]).with_keyboard(entry)),
            step => Err(FlowError::UnknownStep {
                flow: FlowId::Command,
                step,
            }),
        }
    }
}
