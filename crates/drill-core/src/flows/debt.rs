//! Debt CRUD flows: add, edit, pay, delete and list.
//!
//! Working copies live in the session; the store is written only by the
//! terminal steps (`AddFinish`, `EditFinish`, `DeleteFinish`, `PayFinish`),
//! each of which closes the session first.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    codec::{FlowId, StepId},
    domain::{Debt, DebtId, UserId},
    flows::{FlowError, FlowHandler, Reply, Turn},
    keyboard,
    listing::{self, format_money},
    messages::Msg,
    ports::{Clock, DebtStore},
    session::{DatePick, FlowState, Route, Session},
};

pub const MAX_DESCRIPTION_CHARS: usize = 1000;

const ADD_STEPS: &[StepId] = &[StepId::AddDescription, StepId::AddAmount];
const EDIT_STEPS: &[StepId] = &[StepId::EditMenu, StepId::EditDescription, StepId::EditAmount];

const fn debt_route(step: StepId) -> Route {
    Route::new(FlowId::Debt, step)
}

fn session(step: StepId, state: FlowState) -> Session {
    Session::new(FlowId::Debt, step, state)
}

pub struct DebtFlow {
    store: Arc<dyn DebtStore>,
    clock: Arc<dyn Clock>,
}

impl DebtFlow {
    pub fn new(store: Arc<dyn DebtStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    async fn on_text(&self, turn: &mut Turn) -> Result<Reply, FlowError> {
        let text = turn.payload.clone();
        match turn.step {
            StepId::AddDescription => {
                let mut debt = editing(turn, &[StepId::AddDescription])?;
                let description = match validate_description(&text) {
                    Ok(d) => d,
                    Err(reply) => return Ok(reply.with_keyboard(keyboard::cancel())),
                };
                debt.description = description;
                let reply = Reply::new(Msg::AskAmount, &[&debt.description.to_uppercase()])
                    .with_keyboard(keyboard::back_cancel(debt_route(StepId::AddDescription)));
                turn.stage(session(StepId::AddAmount, FlowState::Editing(debt)));
                Ok(reply)
            }
            StepId::AddAmount => {
                let mut debt = editing(turn, &[StepId::AddAmount])?;
                let back = debt_route(StepId::AddAmount);
                let Some(amount) = parse_amount(&text) else {
                    return Ok(Reply::new(Msg::AmountInvalid, &[])
                        .with_keyboard(keyboard::back_cancel(debt_route(StepId::AddDescription))));
                };
                debt.amount = amount;
                turn.stage(enter_date(debt, back, debt_route(StepId::AddFinish)));
                Ok(Reply::new(Msg::AskDate, &[&format_money(amount)])
                    .with_keyboard(keyboard::date_entry(back)))
            }
            StepId::EditDescription => {
                let mut debt = editing(turn, &[StepId::EditDescription])?;
                let description = match validate_description(&text) {
                    Ok(d) => d,
                    Err(reply) => return Ok(reply.with_keyboard(edit_back())),
                };
                debt.description = description;
                let reply = Reply::new(Msg::DescriptionUpdated, &[&debt.description.to_uppercase()])
                    .with_keyboard(keyboard::edit_menu());
                turn.stage(session(StepId::EditMenu, FlowState::Editing(debt)));
                Ok(reply)
            }
            StepId::EditAmount => {
                let mut debt = editing(turn, &[StepId::EditAmount])?;
                let Some(amount) = parse_amount(&text) else {
                    return Ok(Reply::new(Msg::AmountInvalid, &[]).with_keyboard(edit_back()));
                };
                debt.amount = amount;
                turn.stage(session(StepId::EditMenu, FlowState::Editing(debt)));
                Ok(Reply::new(Msg::AmountUpdated, &[&format_money(amount)])
                    .with_keyboard(keyboard::edit_menu()))
            }
            StepId::PayAmount => {
                let debt = editing(turn, &[StepId::PayAmount])?;
                let Some(payment) = parse_amount(&text) else {
                    return Ok(Reply::new(Msg::AmountInvalid, &[]).with_keyboard(keyboard::cancel()));
                };
                if payment > debt.amount {
                    return Ok(Reply::new(Msg::AmountTooLarge, &[&format_money(debt.amount)])
                        .with_keyboard(keyboard::cancel()));
                }
                let reply = Reply::new(
                    Msg::ConfirmPayment,
                    &[
                        &debt.description.to_uppercase(),
                        &format_money(debt.amount),
                        &format_money(payment),
                        &format_money(debt.amount - payment),
                    ],
                )
                .with_keyboard(keyboard::confirm(StepId::PayFinish));
                turn.stage(session(StepId::PayFinish, FlowState::Paying { debt, payment }));
                Ok(reply)
            }
            // Free text where a button is expected.
            _ => Ok(Reply::new(Msg::ButtonOnly, &[]).with_keyboard(keyboard::cancel())),
        }
    }

    async fn on_button(&self, turn: &mut Turn) -> Result<Reply, FlowError> {
        let today = self.clock.today();
        match turn.step {
            StepId::Start => {
                turn.clear();
                Ok(Reply::new(Msg::DebtMenu, &[]).with_keyboard(keyboard::debt_menu()))
            }
            StepId::List => {
                let debts = self.store.list_by_owner(turn.user()).await?;
                Ok(
                    Reply::raw(Msg::DebtList, listing::render_list(debts, today))
                        .with_keyboard(keyboard::debt_menu()),
                )
            }

            StepId::AddStart => {
                turn.stage(session(
                    StepId::AddDescription,
                    FlowState::Editing(Debt::draft(turn.user())),
                ));
                Ok(Reply::new(Msg::AskDescription, &[]).with_keyboard(keyboard::cancel()))
            }
            StepId::AddDescription => {
                let debt = editing(turn, ADD_STEPS)?;
                turn.stage(session(StepId::AddDescription, FlowState::Editing(debt)));
                Ok(Reply::new(Msg::AskDescription, &[]).with_keyboard(keyboard::cancel()))
            }
            StepId::AddAmount => {
                let debt = back_from_picker(turn, &[StepId::AddAmount], StepId::AddFinish)?;
                let reply = Reply::new(Msg::AskAmount, &[&debt.description.to_uppercase()])
                    .with_keyboard(keyboard::back_cancel(debt_route(StepId::AddDescription)));
                turn.stage(session(StepId::AddAmount, FlowState::Editing(debt)));
                Ok(reply)
            }
            StepId::AddFinish => {
                let Some(debt) = dated_debt(picking_for(turn, StepId::AddFinish)?) else {
                    return Ok(date_not_set(debt_route(StepId::AddAmount)));
                };
                turn.close().await?;
                ensure_owner(&debt, turn.user())?;
                let id = self.store.save(&debt).await?;
                tracing::info!(user = turn.user().0, debt = %id, "debt saved");
                Ok(Reply::new(
                    Msg::Saved,
                    &[
                        &debt.description.to_uppercase(),
                        &format_money(debt.amount),
                        &debt.due.map(listing::format_date).unwrap_or_default(),
                    ],
                )
                .with_keyboard(keyboard::debt_menu()))
            }

            StepId::EditStart => {
                self.begin_select(turn, StepId::EditStart, StepId::EditMenu, Msg::SelectForEdit)
                    .await
            }
            StepId::DeleteStart => {
                self.begin_select(
                    turn,
                    StepId::DeleteStart,
                    StepId::DeleteConfirm,
                    Msg::SelectForDelete,
                )
                .await
            }
            StepId::PayStart => {
                self.begin_select(turn, StepId::PayStart, StepId::EnterPayment, Msg::SelectForPay)
                    .await
            }
            StepId::Select => self.select(turn).await,

            StepId::EditMenu => {
                let debt = back_from_picker(turn, EDIT_STEPS, StepId::EditDate)?;
                let reply = edit_menu_reply(&debt, today);
                turn.stage(session(StepId::EditMenu, FlowState::Editing(debt)));
                Ok(reply)
            }
            StepId::EnterDescription => {
                let debt = editing(turn, EDIT_STEPS)?;
                turn.stage(session(StepId::EditDescription, FlowState::Editing(debt)));
                Ok(Reply::new(Msg::AskNewDescription, &[]).with_keyboard(edit_back()))
            }
            StepId::EnterAmount => {
                let debt = editing(turn, EDIT_STEPS)?;
                turn.stage(session(StepId::EditAmount, FlowState::Editing(debt)));
                Ok(Reply::new(Msg::AskNewAmount, &[]).with_keyboard(edit_back()))
            }
            StepId::EnterDate => {
                let debt = editing(turn, EDIT_STEPS)?;
                let back = debt_route(StepId::EditMenu);
                let reply = Reply::new(Msg::AskDate, &[&format_money(debt.amount)])
                    .with_keyboard(keyboard::date_entry(back));
                turn.stage(enter_date(debt, back, debt_route(StepId::EditDate)));
                Ok(reply)
            }
            StepId::EditDate => {
                let Some(debt) = dated_debt(picking_for(turn, StepId::EditDate)?) else {
                    return Ok(date_not_set(debt_route(StepId::EditMenu)));
                };
                let due = debt.due.map(listing::format_date).unwrap_or_default();
                turn.stage(session(StepId::EditMenu, FlowState::Editing(debt)));
                Ok(Reply::new(Msg::DateUpdated, &[&due]).with_keyboard(keyboard::edit_menu()))
            }
            StepId::EditFinish => {
                let debt = editing(turn, EDIT_STEPS)?;
                turn.close().await?;
                ensure_owner(&debt, turn.user())?;
                self.store.update(&debt).await?;
                tracing::info!(user = turn.user().0, debt = %debt.id, "debt updated");
                Ok(Reply::new(
                    Msg::EditFinished,
                    &[
                        &debt.description.to_uppercase(),
                        &format_money(debt.amount),
                        &listing::due_status(&debt, today),
                    ],
                )
                .with_keyboard(keyboard::debt_menu()))
            }

            StepId::DeleteConfirm => {
                let debt = editing(turn, &[StepId::DeleteConfirm])?;
                let reply = Reply::new(Msg::ConfirmDelete, &[&debt.description.to_uppercase()])
                    .with_keyboard(keyboard::confirm(StepId::DeleteFinish));
                turn.stage(session(StepId::DeleteConfirm, FlowState::Editing(debt)));
                Ok(reply)
            }
            StepId::DeleteFinish => {
                let debt = editing(turn, &[StepId::DeleteConfirm])?;
                turn.close().await?;
                ensure_owner(&debt, turn.user())?;
                self.store.delete(debt.id).await?;
                tracing::info!(user = turn.user().0, debt = %debt.id, "debt deleted");
                Ok(Reply::new(
                    Msg::Deleted,
                    &[&debt.description.to_uppercase(), &format_money(debt.amount)],
                )
                .with_keyboard(keyboard::debt_menu()))
            }

            StepId::EnterPayment => {
                let debt = editing(turn, &[StepId::EnterPayment, StepId::PayAmount])?;
                let reply = Reply::new(Msg::AskPayment, &[&format_money(debt.amount)])
                    .with_keyboard(keyboard::cancel());
                turn.stage(session(StepId::PayAmount, FlowState::Editing(debt)));
                Ok(reply)
            }
            StepId::PayFinish => {
                let (mut debt, payment) = match &at_step(turn, &[StepId::PayFinish])?.state {
                    FlowState::Paying { debt, payment } => (debt.clone(), *payment),
                    _ => return Err(FlowError::SessionLost),
                };
                turn.close().await?;
                ensure_owner(&debt, turn.user())?;
                debt.amount -= payment;
                let description = debt.description.to_uppercase();
                if debt.amount <= 0 {
                    self.store.delete(debt.id).await?;
                    tracing::info!(user = turn.user().0, debt = %debt.id, "debt paid off");
                    Ok(Reply::new(Msg::PaidOff, &[&description])
                        .with_keyboard(keyboard::debt_menu()))
                } else {
                    self.store.update(&debt).await?;
                    tracing::info!(user = turn.user().0, debt = %debt.id, payment, "payment recorded");
                    Ok(
                        Reply::new(Msg::PaidPartially, &[&description, &format_money(debt.amount)])
                            .with_keyboard(keyboard::debt_menu()),
                    )
                }
            }

            step => Err(FlowError::UnknownStep {
                flow: FlowId::Debt,
                step,
            }),
        }
    }

    /// Show the user's debts as buttons; the chosen one continues to `next`.
    async fn begin_select(
        &self,
        turn: &mut Turn,
        start: StepId,
        next: StepId,
        prompt: Msg,
    ) -> Result<Reply, FlowError> {
        let mut debts = self.store.list_by_owner(turn.user()).await?;
        if debts.is_empty() {
            turn.clear();
            return Ok(Reply::new(Msg::NoDebts, &[]).with_keyboard(keyboard::debt_menu()));
        }
        listing::sort_debts(&mut debts);
        turn.stage(session(
            StepId::Select,
            FlowState::Selecting {
                back: debt_route(start),
                next: debt_route(next),
            },
        ));
        Ok(Reply::new(prompt, &[]).with_keyboard(keyboard::select_list(&debts, self.clock.today())))
    }

    async fn select(&self, turn: &mut Turn) -> Result<Reply, FlowError> {
        let (back, next) = match &at_step(turn, &[StepId::Select])?.state {
            FlowState::Selecting { back, next } => (*back, *next),
            _ => return Err(FlowError::SessionLost),
        };
        let id = turn
            .payload
            .parse::<i64>()
            .map(DebtId)
            .map_err(|_| FlowError::MalformedToken)?;

        let debt = self.store.get(id).await?;
        ensure_owner(&debt, turn.user())?;

        let reply = Reply::new(
            Msg::Selected,
            &[
                &debt.description.to_uppercase(),
                &format_money(debt.amount),
                &listing::due_status(&debt, self.clock.today()),
            ],
        )
        .with_keyboard(keyboard::redirect(back, next));
        turn.stage(session(next.step, FlowState::Editing(debt)));
        Ok(reply)
    }
}

#[async_trait]
impl FlowHandler for DebtFlow {
    fn flow(&self) -> FlowId {
        FlowId::Debt
    }

    async fn handle(&self, turn: &mut Turn) -> Result<Reply, FlowError> {
        if turn.is_message() {
            self.on_text(turn).await
        } else {
            self.on_button(turn).await
        }
    }
}

/// The session, provided it sits on one of `steps` of this flow.
///
/// Buttons stay on old messages, so a token only acts on the session that
/// issued it; anything else is treated as a conversation that already ended.
fn at_step<'a>(turn: &'a Turn, steps: &[StepId]) -> Result<&'a Session, FlowError> {
    let s = turn.session()?;
    if s.owner == FlowId::Debt && steps.contains(&s.step) {
        Ok(s)
    } else {
        Err(FlowError::SessionLost)
    }
}

fn editing(turn: &Turn, steps: &[StepId]) -> Result<Debt, FlowError> {
    match &at_step(turn, steps)?.state {
        FlowState::Editing(debt) => Ok(debt.clone()),
        _ => Err(FlowError::SessionLost),
    }
}

/// The date picker that continues to `next` once a date is locked.
fn picking_for(turn: &Turn, next: StepId) -> Result<&DatePick, FlowError> {
    let s = turn.session()?;
    match &s.state {
        FlowState::PickingDate(pick) if s.owner == FlowId::Date && pick.next == debt_route(next) => {
            Ok(pick)
        }
        _ => Err(FlowError::SessionLost),
    }
}

/// Working copy for a step reachable both from `steps` and as the "back"
/// route of the date picker heading to `next`.
fn back_from_picker(turn: &Turn, steps: &[StepId], next: StepId) -> Result<Debt, FlowError> {
    if let Ok(pick) = picking_for(turn, next) {
        return Ok(pick.parent.clone());
    }
    editing(turn, steps)
}

/// The working copy with the date picker's result applied, if one was picked.
fn dated_debt(pick: &DatePick) -> Option<Debt> {
    let due = pick.picked.and_then(|p| p.complete())?;
    let mut debt = pick.parent.clone();
    debt.due = Some(due);
    Some(debt)
}

fn enter_date(parent: Debt, back: Route, next: Route) -> Session {
    Session::new(
        FlowId::Date,
        StepId::Year,
        FlowState::PickingDate(DatePick {
            back,
            next,
            parent,
            picked: None,
        }),
    )
}

fn ensure_owner(debt: &Debt, user: UserId) -> Result<(), FlowError> {
    if debt.owner != user {
        return Err(FlowError::OwnershipViolation {
            debt: debt.id,
            user,
        });
    }
    Ok(())
}

fn edit_back() -> crate::messaging::types::InlineKeyboard {
    keyboard::back_cancel(debt_route(StepId::EditMenu))
}

fn edit_menu_reply(debt: &Debt, today: chrono::NaiveDate) -> Reply {
    Reply::new(
        Msg::EditMenu,
        &[
            &debt.description.to_uppercase(),
            &format_money(debt.amount),
            &listing::due_status(debt, today),
        ],
    )
    .with_keyboard(keyboard::edit_menu())
}

fn date_not_set(back: Route) -> Reply {
    Reply::new(Msg::DateNotSet, &[]).with_keyboard(keyboard::date_entry(back))
}

fn validate_description(text: &str) -> Result<String, Reply> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(Reply::new(Msg::DescriptionEmpty, &[]));
    }
    let len = trimmed.chars().count();
    if len > MAX_DESCRIPTION_CHARS {
        return Err(Reply::new(Msg::DescriptionTooLong, &[&len.to_string()]));
    }
    Ok(trimmed.to_string())
}

/// Positive whole amount, or `None`.
fn parse_amount(text: &str) -> Option<i64> {
    text.trim().parse::<i64>().ok().filter(|a| *a > 0)
}
