use std::{collections::HashMap, path::PathBuf, sync::Arc};

use tracing::{debug, error, info, warn};

use crate::{
    codec::{CallbackToken, FlowId},
    domain::{ChatId, UserId},
    events::{Event, EventKind},
    flows::{
        command::{self, CommandFlow},
        date::DateFlow,
        debt::DebtFlow,
        main_menu::MainMenuFlow,
        FlowError, FlowHandler, Reply, SessionChange, Turn,
    },
    keyboard,
    messages::Msg,
    messaging::{port::MessagingPort, types::InlineKeyboard},
    ports::{Clock, DebtStore},
    session::{Session, SessionStore, UserLocks},
    Result,
};

/// Where an event goes before any handler runs.
enum Target {
    Ignore,
    Flow(CallbackToken),
    Reply(Reply),
}

/// Routes each event to the flow handler that owns it.
pub struct Dispatcher {
    handlers: HashMap<FlowId, Arc<dyn FlowHandler>>,
    sessions: Arc<dyn SessionStore>,
    messenger: Arc<dyn MessagingPort>,
    locks: UserLocks,
}

impl Dispatcher {
    pub fn new(sessions: Arc<dyn SessionStore>, messenger: Arc<dyn MessagingPort>) -> Self {
        Self {
            handlers: HashMap::new(),
            sessions,
            messenger,
            locks: UserLocks::default(),
        }
    }

    /// Dispatcher with the command, main menu, debt and date flows registered.
    pub fn with_default_flows(
        sessions: Arc<dyn SessionStore>,
        messenger: Arc<dyn MessagingPort>,
        store: Arc<dyn DebtStore>,
        clock: Arc<dyn Clock>,
        welcome_media: PathBuf,
    ) -> Self {
        let mut d = Self::new(sessions, messenger);
        d.register(Arc::new(CommandFlow::new(welcome_media)));
        d.register(Arc::new(MainMenuFlow));
        d.register(Arc::new(DebtFlow::new(store, clock.clone())));
        d.register(Arc::new(DateFlow::new(clock)));
        d
    }

    pub fn register(&mut self, handler: Arc<dyn FlowHandler>) {
        self.handlers.insert(handler.flow(), handler);
    }

    /// Handle one event end to end. Returns the catalog id of the reply sent,
    /// or `None` when nothing was sent.
    pub async fn dispatch(&self, event: Event) -> Result<Option<Msg>> {
        if let Some(cb) = event.callback_id.as_deref() {
            if let Err(e) = self.messenger.answer_callback(cb).await {
                warn!(user = event.user_id.0, "failed to answer callback: {e}");
            }
        }

        let _guard = self.locks.lock_user(event.user_id).await;
        let user = event.user_id;
        let chat = event.chat_id;

        let prior = match self.sessions.get(user).await {
            Ok(s) => s,
            Err(e) => return self.fail(user, chat, e.into()).await,
        };

        let token = match route(&event, prior.as_ref()) {
            Ok(Target::Ignore) => return Ok(None),
            Ok(Target::Reply(reply)) => {
                self.send(chat, &reply).await?;
                return Ok(Some(reply.msg));
            }
            Ok(Target::Flow(token)) => token,
            Err(e) => return self.fail(user, chat, e).await,
        };

        let Some(handler) = self.handlers.get(&token.owner).cloned() else {
            warn!(user = user.0, flow = %token.owner, "no handler registered");
            let reply = Reply::new(Msg::HandlerNotFound, &[&token.owner.to_string()])
                .with_keyboard(keyboard::recovery());
            self.send(chat, &reply).await?;
            return Ok(Some(reply.msg));
        };

        debug!(user = user.0, flow = %token.owner, step = %token.step, "routing event");

        let mut turn = Turn::new(
            event,
            token.step,
            token.payload,
            prior.clone(),
            self.sessions.clone(),
        );

        let outcome = handler.handle(&mut turn).await;
        let outcome = match outcome {
            Ok(reply) => self.apply(user, turn.take_change()).await.map(|_| reply),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(reply) => {
                self.send(chat, &reply).await?;
                Ok(Some(reply.msg))
            }
            Err(e) if e.is_interruption() => {
                self.restore(user, prior, turn.is_closed()).await;
                if e.is_shutdown() {
                    info!(user = user.0, flow = %token.owner, "turn cancelled: {e}");
                    return Ok(None);
                }
                warn!(user = user.0, flow = %token.owner, "turn timed out: {e}");
                let reply = e.reply();
                self.send(chat, &reply).await?;
                Ok(Some(reply.msg))
            }
            Err(e) => self.fail(user, chat, e).await,
        }
    }

    async fn apply(&self, user: UserId, change: SessionChange) -> std::result::Result<(), FlowError> {
        match change {
            SessionChange::Keep => Ok(()),
            SessionChange::Set(s) => Ok(self.sessions.set(user, s).await?),
            SessionChange::Clear => Ok(self.sessions.delete(user).await?),
        }
    }

    /// Put the session back exactly as it was loaded, unless a terminal step
    /// already closed it.
    async fn restore(&self, user: UserId, prior: Option<Session>, closed: bool) {
        if closed {
            return;
        }
        let res = match prior {
            Some(s) => self.sessions.set(user, s).await,
            None => self.sessions.delete(user).await,
        };
        if let Err(e) = res {
            warn!(user = user.0, "failed to restore session: {e}");
        }
    }

    /// Terminal failure: end the flow and tell the user.
    async fn fail(&self, user: UserId, chat: ChatId, err: FlowError) -> Result<Option<Msg>> {
        match &err {
            FlowError::Collaborator(e) => error!(user = user.0, "turn failed: {e}"),
            other => warn!(user = user.0, "turn rejected: {other}"),
        }
        if let Err(e) = self.sessions.delete(user).await {
            error!(user = user.0, "failed to drop session: {e}");
        }
        let reply = err.reply();
        self.send(chat, &reply).await?;
        Ok(Some(reply.msg))
    }

    async fn send(&self, chat: ChatId, reply: &Reply) -> Result<()> {
        let empty = InlineKeyboard::default();
        if let Some(media) = &reply.media {
            let kb = reply.keyboard.as_ref().unwrap_or(&empty);
            match self.messenger.send_media(chat, media, &reply.text, kb).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_interruption() => return Err(e),
                Err(e) => warn!(chat = chat.0, "media send failed, falling back to text: {e}"),
            }
        }
        match &reply.keyboard {
            Some(kb) => self.messenger.send_keyboard(chat, &reply.text, kb).await,
            None => self.messenger.send_text(chat, &reply.text).await,
        }
    }
}

fn route(event: &Event, session: Option<&Session>) -> std::result::Result<Target, FlowError> {
    match event.kind {
        EventKind::Unknown => Ok(Target::Reply(
            Reply::new(Msg::UnknownEvent, &[]).with_keyboard(keyboard::main_menu_entry()),
        )),
        EventKind::Callback => {
            let token = CallbackToken::decode(&event.text)?;
            if token.is_ignore() {
                return Ok(Target::Ignore);
            }
            Ok(Target::Flow(token))
        }
        EventKind::Message => {
            if let Some(step) = command::parse(&event.text) {
                return Ok(Target::Flow(CallbackToken::new(FlowId::Command, step, "")));
            }
            match session {
                Some(s) => Ok(Target::Flow(CallbackToken::new(
                    s.owner,
                    s.step,
                    event.text.clone(),
                ))),
                None => Ok(Target::Reply(
                    Reply::new(Msg::ButtonOnly, &[]).with_keyboard(keyboard::main_menu_entry()),
                )),
            }
        }
    }
}

