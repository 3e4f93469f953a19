//! Flow handlers and the dispatcher that routes events to them.
//!
//! Every event is reduced to `(owner flow, step, payload)` before a handler
//! sees it: callbacks carry it in their token, commands are mapped to command
//! tokens, and free text inherits the owner and step of the user's session.
//! Handlers stage session changes on the [`Turn`]; the dispatcher applies
//! them only after the handler succeeded.

use std::{path::PathBuf, sync::Arc};

use async_trait::async_trait;

use crate::{
    codec::{FlowId, StepId},
    domain::{DebtId, UserId},
    errors::Error,
    events::{Event, EventKind},
    messages::{self, Msg},
    messaging::types::InlineKeyboard,
    session::{Session, SessionStore},
};

pub mod command;
pub mod date;
pub mod debt;
pub mod dispatcher;
pub mod main_menu;

#[cfg(test)]
mod tests;

pub use dispatcher::Dispatcher;

/// Per-turn failure. Every variant ends the user's current flow.
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error("no active session")]
    SessionLost,

    #[error("malformed callback token")]
    MalformedToken,

    #[error("debt {debt} does not belong to user {user:?}")]
    OwnershipViolation { debt: DebtId, user: UserId },

    #[error("date picker session has no valid back/next route")]
    RedirectionCorrupt,

    #[error("{flow} has no step {step}")]
    UnknownStep { flow: FlowId, step: StepId },

    #[error("debt {0} not found")]
    NotFound(DebtId),

    #[error("collaborator failure: {0}")]
    Collaborator(Error),
}

impl From<Error> for FlowError {
    fn from(e: Error) -> Self {
        match e {
            Error::NotFound(id) => FlowError::NotFound(id),
            Error::MalformedToken(_) => FlowError::MalformedToken,
            other => FlowError::Collaborator(other),
        }
    }
}

impl FlowError {
    /// Deadline or shutdown hit a collaborator call mid-turn.
    pub fn is_interruption(&self) -> bool {
        matches!(self, FlowError::Collaborator(e) if e.is_interruption())
    }

    /// Shutdown cancelled the turn; nothing should be sent.
    pub fn is_shutdown(&self) -> bool {
        matches!(self, FlowError::Collaborator(Error::Cancelled))
    }

    pub fn reply(&self) -> Reply {
        let reply = match self {
            FlowError::SessionLost => Reply::new(Msg::SessionLost, &[]),
            FlowError::MalformedToken => Reply::new(Msg::MalformedToken, &[]),
            FlowError::OwnershipViolation { .. } => Reply::new(Msg::OwnershipViolation, &[]),
            FlowError::RedirectionCorrupt => Reply::new(Msg::RedirectionCorrupt, &[]),
            FlowError::UnknownStep { step, .. } => {
                Reply::new(Msg::UnknownStep, &[&step.to_string()])
            }
            FlowError::NotFound(_) => Reply::new(Msg::DebtNotFound, &[]),
            FlowError::Collaborator(_) => Reply::new(Msg::CollaboratorFailure, &[]),
        };
        reply.with_keyboard(crate::keyboard::recovery())
    }
}

/// Outbound reply produced by a turn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reply {
    pub msg: Msg,
    pub text: String,
    pub keyboard: Option<InlineKeyboard>,
    /// Photo to send with `text` as caption; falls back to text.
    pub media: Option<PathBuf>,
}

impl Reply {
    pub fn new(msg: Msg, args: &[&str]) -> Self {
        Self {
            msg,
            text: messages::render(msg, args),
            keyboard: None,
            media: None,
        }
    }

    /// Reply whose body was rendered elsewhere.
    pub fn raw(msg: Msg, text: String) -> Self {
        Self {
            msg,
            text,
            keyboard: None,
            media: None,
        }
    }

    pub fn with_keyboard(mut self, keyboard: InlineKeyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }

    pub fn with_media(mut self, media: PathBuf) -> Self {
        self.media = Some(media);
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) enum SessionChange {
    #[default]
    Keep,
    Set(Session),
    Clear,
}

/// One event being handled, plus the session it was routed with.
pub struct Turn {
    pub event: Event,
    pub step: StepId,
    pub payload: String,
    session: Option<Session>,
    change: SessionChange,
    closed: bool,
    sessions: Arc<dyn SessionStore>,
}

impl Turn {
    pub(crate) fn new(
        event: Event,
        step: StepId,
        payload: String,
        session: Option<Session>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            event,
            step,
            payload,
            session,
            change: SessionChange::Keep,
            closed: false,
            sessions,
        }
    }

    pub fn user(&self) -> UserId {
        self.event.user_id
    }

    pub fn is_message(&self) -> bool {
        self.event.kind == EventKind::Message
    }

    /// The session as loaded at the start of the turn.
    pub fn session(&self) -> Result<&Session, FlowError> {
        self.session.as_ref().ok_or(FlowError::SessionLost)
    }

    /// Replace the session once the turn succeeds.
    pub fn stage(&mut self, session: Session) {
        self.change = SessionChange::Set(session);
    }

    /// Drop the session once the turn succeeds.
    pub fn clear(&mut self) {
        self.change = SessionChange::Clear;
    }

    /// Delete the session right now and hand back its content.
    ///
    /// Terminal steps call this before touching the debt store, so a
    /// replayed terminal button finds no session and cannot commit twice.
    pub async fn close(&mut self) -> Result<Session, FlowError> {
        let session = self.session.take().ok_or(FlowError::SessionLost)?;
        if let Err(e) = self.sessions.delete(self.event.user_id).await {
            self.session = Some(session);
            return Err(e.into());
        }
        self.closed = true;
        self.change = SessionChange::Keep;
        Ok(session)
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub(crate) fn take_change(&mut self) -> SessionChange {
        std::mem::take(&mut self.change)
    }
}

/// One feature flow. Internally a step-keyed match over typed session state.
#[async_trait]
pub trait FlowHandler: Send + Sync {
    fn flow(&self) -> FlowId;

    async fn handle(&self, turn: &mut Turn) -> Result<Reply, FlowError>;
}
