//! Reusable date picker: year, then month, then day.
//!
//! Entered from a parent flow with `back`/`next` routes stored in
//! [`DatePick`]. The picker only writes the composed date into the session;
//! the parent's `next` step decides what to do with it.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};

use crate::{
    codec::{FlowId, StepId},
    flows::{FlowError, FlowHandler, Reply, Turn},
    keyboard,
    listing::format_date,
    messages::Msg,
    messaging::types::InlineKeyboard,
    ports::Clock,
    session::{DatePick, FlowState, PartialDate, Session},
};

pub struct DateFlow {
    clock: Arc<dyn Clock>,
}

impl DateFlow {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    fn year(&self, turn: &mut Turn, mut pick: DatePick) -> Reply {
        let today = self.clock.today();
        let kb = keyboard::years(today, pick.back);
        if turn.payload.is_empty() {
            turn.stage(picking(StepId::Year, pick));
            return Reply::new(Msg::PickYear, &[]).with_keyboard(kb);
        }

        let Ok(year) = turn.payload.parse::<i32>() else {
            return Reply::new(Msg::InvalidYear, &[]).with_keyboard(kb);
        };
        if year < today.year() {
            return Reply::new(
                Msg::DateInPast,
                &[&today.year().to_string(), &year.to_string()],
            )
            .with_keyboard(kb);
        }

        pick.picked = Some(PartialDate::Year(year));
        let reply = Reply::new(Msg::PickMonth, &[&year.to_string()])
            .with_keyboard(keyboard::months(pick.back));
        turn.stage(picking(StepId::Month, pick));
        reply
    }

    fn month(&self, turn: &mut Turn, mut pick: DatePick) -> Reply {
        let today = self.clock.today();
        let Some(year) = pick.picked.map(|p| p.year()) else {
            return self.restart(turn, pick);
        };
        let kb = keyboard::months(pick.back);
        if turn.payload.is_empty() {
            turn.stage(picking(StepId::Month, pick));
            return Reply::new(Msg::PickMonth, &[&year.to_string()]).with_keyboard(kb);
        }

        let month = match turn.payload.parse::<u32>() {
            Ok(m) if (1..=12).contains(&m) => m,
            _ => return Reply::new(Msg::InvalidMonth, &[]).with_keyboard(kb),
        };
        if year < today.year() || (year == today.year() && month < today.month()) {
            return Reply::new(
                Msg::DateInPast,
                &[
                    &month_year(today.year(), today.month()),
                    &month_year(year, month),
                ],
            )
            .with_keyboard(kb);
        }

        pick.picked = Some(PartialDate::Month { year, month });
        match keyboard::days(year, month, pick.back) {
            Some(days) => {
                turn.stage(picking(StepId::Day, pick));
                Reply::new(Msg::PickDay, &[&month_year(year, month)]).with_keyboard(days)
            }
            None => Reply::new(Msg::InvalidMonth, &[]).with_keyboard(kb),
        }
    }

    fn day(&self, turn: &mut Turn, mut pick: DatePick) -> Reply {
        let today = self.clock.today();
        let (year, month) = match pick.picked {
            Some(PartialDate::Month { year, month }) => (year, month),
            Some(PartialDate::Day(d)) => (d.year(), d.month()),
            Some(PartialDate::Year(year)) => {
                return Reply::new(Msg::PickMonth, &[&year.to_string()])
                    .with_keyboard(keyboard::months(pick.back));
            }
            None => return self.restart(turn, pick),
        };
        let Some(kb) = keyboard::days(year, month, pick.back) else {
            return self.restart(turn, pick);
        };
        if turn.payload.is_empty() {
            pick.picked = Some(PartialDate::Month { year, month });
            turn.stage(picking(StepId::Day, pick));
            return Reply::new(Msg::PickDay, &[&month_year(year, month)]).with_keyboard(kb);
        }

        let Some(date) = turn
            .payload
            .parse::<u32>()
            .ok()
            .and_then(|d| NaiveDate::from_ymd_opt(year, month, d))
        else {
            return Reply::new(Msg::InvalidDay, &[]).with_keyboard(kb);
        };
        if date < today {
            return Reply::new(Msg::DateInPast, &[&full_date(today), &full_date(date)])
                .with_keyboard(kb);
        }

        pick.picked = Some(PartialDate::Day(date));
        let reply = Reply::new(Msg::DatePicked, &[&format_date(date)])
            .with_keyboard(keyboard::date_redirect(pick.back, pick.next));
        turn.stage(picking(StepId::Day, pick));
        reply
    }

    /// Back to the year keyboard, dropping whatever was picked.
    fn restart(&self, turn: &mut Turn, mut pick: DatePick) -> Reply {
        let kb = keyboard::years(self.clock.today(), pick.back);
        pick.picked = None;
        turn.stage(picking(StepId::Year, pick));
        Reply::new(Msg::PickYear, &[]).with_keyboard(kb)
    }

    /// Keyboard for the step the picker is currently on.
    fn current_keyboard(&self, step: StepId, pick: &DatePick) -> InlineKeyboard {
        match (step, pick.picked) {
            (StepId::Day, Some(PartialDate::Day(_))) => {
                keyboard::date_redirect(pick.back, pick.next)
            }
            (StepId::Day, Some(PartialDate::Month { year, month })) => {
                keyboard::days(year, month, pick.back).unwrap_or_else(|| keyboard::months(pick.back))
            }
            (StepId::Month, Some(_)) | (StepId::Day, Some(_)) => keyboard::months(pick.back),
            _ => keyboard::years(self.clock.today(), pick.back),
        }
    }
}

#[async_trait]
impl FlowHandler for DateFlow {
    fn flow(&self) -> FlowId {
        FlowId::Date
    }

    async fn handle(&self, turn: &mut Turn) -> Result<Reply, FlowError> {
        let session = turn.session()?;
        let FlowState::PickingDate(pick) = &session.state else {
            return Err(FlowError::SessionLost);
        };
        if pick.back.is_ignore() || pick.next.is_ignore() {
            return Err(FlowError::RedirectionCorrupt);
        }
        let pick = pick.clone();

        if turn.is_message() {
            let kb = self.current_keyboard(session.step, &pick);
            return Ok(Reply::new(Msg::ButtonOnly, &[]).with_keyboard(kb));
        }

        match turn.step {
            StepId::Year => Ok(self.year(turn, pick)),
            StepId::Month => Ok(self.month(turn, pick)),
            StepId::Day => Ok(self.day(turn, pick)),
            step => Err(FlowError::UnknownStep {
                flow: FlowId::Date,
                step,
            }),
        }
    }
}

fn picking(step: StepId, pick: DatePick) -> Session {
    Session::new(FlowId::Date, step, FlowState::PickingDate(pick))
}

fn month_year(year: i32, month: u32) -> String {
    format!("{} {year}", keyboard::month_abbrev(month))
}

fn full_date(date: NaiveDate) -> String {
    format!(
        "{} {} {}",
        keyboard::month_abbrev(date.month()),
        date.day(),
        date.year()
    )
}
