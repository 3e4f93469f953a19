use async_trait::async_trait;

use crate::{
    codec::{FlowId, StepId},
    flows::{FlowError, FlowHandler, Reply, Turn},
    keyboard,
    messages::Msg,
};

/// Hub listing the available modules.
pub struct MainMenuFlow;

#[async_trait]
impl FlowHandler for MainMenuFlow {
    fn flow(&self) -> FlowId {
        FlowId::MainMenu
    }

    async fn handle(&self, turn: &mut Turn) -> Result<Reply, FlowError> {
        match turn.step {
            StepId::Start => {
                turn.clear();
                Ok(Reply::new(Msg::MainMenu, &[]).with_keyboard(keyboard::main_menu()))
            }
            step => Err(FlowError::UnknownStep {
                flow: FlowId::MainMenu,
                step,
            }),
        }
    }
}
