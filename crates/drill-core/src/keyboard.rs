//! Pure keyboard builders.

use chrono::{Datelike, NaiveDate};

use crate::{
    codec::{CallbackToken, FlowId, StepId},
    domain::Debt,
    listing,
    messaging::types::{InlineButton, InlineKeyboard},
    session::Route,
};

pub const MAIN_MENU_ENTRY: &str = "🌀 DEPLOY COMMAND CENTER 🌀";
pub const MAIN_MENU: &str = "🌀 SPIRAL COMMAND CENTER 🌀";
pub const DEBT_HUB: &str = "🌀 DEBT DRILL HUB 🌀";

pub const ADD: &str = "🌀 CONTRACT PROTOCOL";
pub const EDIT: &str = "🌀 RECALIBRATE PROTOCOL";
pub const PAY: &str = "💥 BALANCE PROTOCOL";
pub const DELETE: &str = "💀 ANNIHILATE PROTOCOL";
pub const LIST: &str = "📜 REVIEW CONTRACT LOG";

pub const EDIT_DESCRIPTION: &str = "🌀 RE-SET CONTRACT NAME";
pub const EDIT_AMOUNT: &str = "💥 RE-SET SPIRAL POWER";
pub const EDIT_DATE: &str = "⏳ RE-SET TEMPORAL COORDINATES";
pub const EDIT_CONFIRM: &str = "🌀↵ DEPLOY MODIFIED CONTRACT";

pub const CONFIRM: &str = "🌀↵ LOCK DRILL";
pub const BACK: &str = "🌀↺ BACK DRILLING";
pub const CANCEL: &str = "🌀✗ DROP DRILLING";

pub const SELECT_DATE: &str = "⏳ SET D-DAY";
pub const REPICK_YEAR: &str = "🌀↻ RE-DRILL YEAR";
pub const REPICK_MONTH: &str = "🌀↻ RE-DRILL MONTH";
pub const REPICK_DAY: &str = "🌀↻ RE-DRILL DAY";
pub const LOCK_DATE: &str = "🌀↵ LOCK TEMPORAL DRILL";

const FILLER: &str = " ";
const WEEKDAYS: [&str; 7] = ["MON", "TUE", "WED", "THU", "FRI", "SAT", "SUN"];
const MONTHS: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];

/// Years offered by the year picker, starting with the current one.
pub const YEARS_AHEAD: i32 = 12;
const PER_ROW: usize = 4;
const WEEK_ROW_LEN: usize = 8;

fn button(
    label: impl Into<String>,
    flow: FlowId,
    step: StepId,
    payload: impl Into<String>,
) -> InlineButton {
    InlineButton::new(label, CallbackToken::new(flow, step, payload))
}

fn inert(label: impl Into<String>) -> InlineButton {
    InlineButton::new(label, CallbackToken::ignore())
}

fn route_button(label: &str, route: Route) -> InlineButton {
    InlineButton::new(label, route.token())
}

/// "Cancel" returns to the start of whichever flow `back` belongs to.
fn cancel_to(back: Route) -> InlineButton {
    button(CANCEL, back.flow, StepId::Start, "")
}

fn nav_rows(back: Route) -> Vec<Vec<InlineButton>> {
    vec![vec![route_button(BACK, back)], vec![cancel_to(back)]]
}

pub fn month_abbrev(month: u32) -> &'static str {
    MONTHS
        .get(month.wrapping_sub(1) as usize)
        .copied()
        .unwrap_or("???")
}

/// Single button leading into the main menu.
pub fn main_menu_entry() -> InlineKeyboard {
    InlineKeyboard::new(vec![vec![button(
        MAIN_MENU_ENTRY,
        FlowId::MainMenu,
        StepId::Start,
        "",
    )]])
}

pub fn main_menu() -> InlineKeyboard {
    InlineKeyboard::new(vec![vec![button(DEBT_HUB, FlowId::Debt, StepId::Start, "")]])
}

pub fn debt_menu() -> InlineKeyboard {
    InlineKeyboard::new(vec![
        vec![button(ADD, FlowId::Debt, StepId::AddStart, "")],
        vec![button(EDIT, FlowId::Debt, StepId::EditStart, "")],
        vec![button(PAY, FlowId::Debt, StepId::PayStart, "")],
        vec![button(DELETE, FlowId::Debt, StepId::DeleteStart, "")],
        vec![button(LIST, FlowId::Debt, StepId::List, "")],
        vec![button(MAIN_MENU, FlowId::MainMenu, StepId::Start, "")],
    ])
}

/// Attached to every error reply.
pub fn recovery() -> InlineKeyboard {
    InlineKeyboard::new(vec![
        vec![button(DEBT_HUB, FlowId::Debt, StepId::Start, "")],
        vec![button(MAIN_MENU, FlowId::MainMenu, StepId::Start, "")],
    ])
}

pub fn cancel() -> InlineKeyboard {
    InlineKeyboard::new(vec![vec![button(CANCEL, FlowId::Debt, StepId::Start, "")]])
}

pub fn back_cancel(back: Route) -> InlineKeyboard {
    InlineKeyboard::new(nav_rows(back))
}

pub fn edit_menu() -> InlineKeyboard {
    InlineKeyboard::new(vec![
        vec![button(EDIT_DESCRIPTION, FlowId::Debt, StepId::EnterDescription, "")],
        vec![button(EDIT_AMOUNT, FlowId::Debt, StepId::EnterAmount, "")],
        vec![button(EDIT_DATE, FlowId::Debt, StepId::EnterDate, "")],
        vec![button(EDIT_CONFIRM, FlowId::Debt, StepId::EditFinish, "")],
        vec![button(CANCEL, FlowId::Debt, StepId::Start, "")],
    ])
}

/// One button per debt, in the given order, then cancel.
pub fn select_list(debts: &[Debt], today: NaiveDate) -> InlineKeyboard {
    let mut kb = InlineKeyboard::default();
    for debt in debts {
        kb.push_row(vec![button(
            listing::select_label(debt, today),
            FlowId::Debt,
            StepId::Select,
            debt.id.to_string(),
        )]);
    }
    kb.push_row(vec![button(CANCEL, FlowId::Debt, StepId::Start, "")]);
    kb
}

/// Confirm continues to `step`; both buttons share a row.
pub fn confirm(step: StepId) -> InlineKeyboard {
    InlineKeyboard::new(vec![vec![
        button(CONFIRM, FlowId::Debt, step, ""),
        button(CANCEL, FlowId::Debt, StepId::Start, ""),
    ]])
}

/// Entry into the date picker.
pub fn date_entry(back: Route) -> InlineKeyboard {
    let mut kb = InlineKeyboard::new(vec![vec![button(
        SELECT_DATE,
        FlowId::Date,
        StepId::Year,
        "",
    )]]);
    kb.rows.extend(nav_rows(back));
    kb
}

/// After a selection: continue to `next`, or go back / cancel.
pub fn redirect(back: Route, next: Route) -> InlineKeyboard {
    let mut kb = InlineKeyboard::new(vec![vec![route_button(CONFIRM, next)]]);
    kb.rows.extend(nav_rows(back));
    kb
}

pub fn years(today: NaiveDate, back: Route) -> InlineKeyboard {
    let first = today.year();
    let buttons: Vec<InlineButton> = (first..first + YEARS_AHEAD)
        .map(|y| button(y.to_string(), FlowId::Date, StepId::Year, y.to_string()))
        .collect();

    let mut kb = InlineKeyboard::default();
    for chunk in buttons.chunks(PER_ROW) {
        kb.push_row(chunk.to_vec());
    }
    kb.rows.extend(nav_rows(back));
    kb
}

pub fn months(back: Route) -> InlineKeyboard {
    let buttons: Vec<InlineButton> = (1..=12u32)
        .map(|m| {
            button(
                format!("🌀 {}", month_abbrev(m)),
                FlowId::Date,
                StepId::Month,
                m.to_string(),
            )
        })
        .collect();

    let mut kb = InlineKeyboard::default();
    for chunk in buttons.chunks(PER_ROW) {
        kb.push_row(chunk.to_vec());
    }
    kb.push_row(vec![button(REPICK_YEAR, FlowId::Date, StepId::Year, "")]);
    kb.rows.extend(nav_rows(back));
    kb
}

/// Number of days in `month` of `year`, or `None` for an invalid month.
pub fn days_in_month(year: i32, month: u32) -> Option<u32> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next_first = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((next_first - first).num_days() as u32)
}

/// Calendar grid for one month.
///
/// Layout: a `MON YYYY` header, a weekday header, then week rows of eight
/// cells (ISO week label followed by Monday..Sunday). Padding cells, labels
/// and headers carry the ignore token.
pub fn days(year: i32, month: u32, back: Route) -> Option<InlineKeyboard> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let total = days_in_month(year, month)?;

    let mut kb = InlineKeyboard::default();
    kb.push_row(vec![inert(format!("{} {year}", month_abbrev(month)))]);

    let mut header = vec![inert(FILLER)];
    header.extend(WEEKDAYS.iter().map(|d| inert(*d)));
    kb.push_row(header);

    let week_label = |date: NaiveDate| inert(format!("{}W", date.iso_week().week()));

    let mut row = vec![week_label(first)];
    for _ in 0..first.weekday().num_days_from_monday() {
        row.push(inert(FILLER));
    }

    for day in 1..=total {
        row.push(button(
            day.to_string(),
            FlowId::Date,
            StepId::Day,
            day.to_string(),
        ));
        if row.len() == WEEK_ROW_LEN {
            kb.push_row(std::mem::take(&mut row));
            if let Some(next) = NaiveDate::from_ymd_opt(year, month, day + 1) {
                row.push(week_label(next));
            }
        }
    }
    if row.len() > 1 {
        while row.len() < WEEK_ROW_LEN {
            row.push(inert(FILLER));
        }
        kb.push_row(row);
    }

    kb.push_row(vec![button(REPICK_MONTH, FlowId::Date, StepId::Month, "")]);
    kb.rows.extend(nav_rows(back));
    Some(kb)
}

/// Shown once a full date is picked: lock it in and continue to `next`.
pub fn date_redirect(back: Route, next: Route) -> InlineKeyboard {
    let mut kb = InlineKeyboard::new(vec![
        vec![route_button(LOCK_DATE, next)],
        vec![button(REPICK_DAY, FlowId::Date, StepId::Day, "")],
    ]);
    kb.rows.extend(nav_rows(back));
    kb
}
