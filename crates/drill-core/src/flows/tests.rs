//! Conversation scenarios driven through the dispatcher.

use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use chrono::NaiveDate;
use tokio_util::sync::CancellationToken;

use crate::{
    codec::{CallbackToken, FlowId, StepId},
    deadline::{Deadline, DeadlineStore},
    domain::{ChatId, Debt, DebtId, UserId},
    events::{Event, EventKind},
    flows::{command::CommandFlow, debt::DebtFlow, main_menu::MainMenuFlow, Dispatcher},
    keyboard,
    messages::Msg,
    ports::{Clock, DebtStore, FixedClock},
    session::{DatePick, FlowState, MemorySessionStore, PartialDate, Route, Session, SessionStore},
    testing::{FakeMessenger, FlakyStore},
};

const ALICE: i64 = 1;
const BOB: i64 = 2;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

struct Harness {
    dispatcher: Dispatcher,
    sessions: Arc<MemorySessionStore>,
    store: Arc<FlakyStore>,
    messenger: Arc<FakeMessenger>,
    callbacks: AtomicUsize,
}

impl Harness {
    fn new() -> Self {
        Self::build(FakeMessenger::default(), None)
    }

    fn build(messenger: FakeMessenger, deadline: Option<Deadline>) -> Self {
        let sessions = Arc::new(MemorySessionStore::new());
        let store = Arc::new(FlakyStore::default());
        let messenger = Arc::new(messenger);
        let debts: Arc<dyn DebtStore> = match deadline {
            Some(d) => Arc::new(DeadlineStore::new(store.clone(), d)),
            None => store.clone(),
        };
        let clock: Arc<dyn Clock> = Arc::new(FixedClock(today()));
        let dispatcher = Dispatcher::with_default_flows(
            sessions.clone(),
            messenger.clone(),
            debts,
            clock,
            PathBuf::from("resources/static/welcome.jpg"),
        );
        Self {
            dispatcher,
            sessions,
            store,
            messenger,
            callbacks: AtomicUsize::new(0),
        }
    }

    async fn text(&self, user: i64, body: &str) -> Option<Msg> {
        self.dispatcher
            .dispatch(Event::message(ChatId(user), UserId(user), body))
            .await
            .unwrap()
    }

    async fn press_raw(&self, user: i64, data: &str) -> Option<Msg> {
        let id = self.callbacks.fetch_add(1, Ordering::SeqCst);
        self.dispatcher
            .dispatch(Event::callback(ChatId(user), UserId(user), format!("cb{id}"), data))
            .await
            .unwrap()
    }

    async fn press(&self, user: i64, flow: FlowId, step: StepId, payload: &str) -> Option<Msg> {
        let data = CallbackToken::new(flow, step, payload).encode().unwrap();
        self.press_raw(user, &data).await
    }

    /// Press the button on the last keyboard whose token matches.
    async fn press_shown(&self, user: i64, pred: impl Fn(&CallbackToken) -> bool) -> Option<Msg> {
        let kb = self.messenger.last().keyboard.expect("no keyboard shown");
        let data = kb.find(pred).expect("button not shown").callback_data().unwrap();
        self.press_raw(user, &data).await
    }

    async fn session(&self, user: i64) -> Option<Session> {
        self.sessions.get(UserId(user)).await.unwrap()
    }

    async fn seed(&self, owner: i64, description: &str, amount: i64, due: Option<NaiveDate>) -> DebtId {
        let debt = Debt {
            description: description.to_string(),
            amount,
            due,
            ..Debt::draft(UserId(owner))
        };
        self.store.inner.save(&debt).await.unwrap()
    }

    async fn debts(&self, owner: i64) -> Vec<Debt> {
        self.store.inner.list_by_owner(UserId(owner)).await.unwrap()
    }

    /// Walk the add flow up to the date picker.
    async fn add_until_date(&self, user: i64, description: &str, amount: &str) {
        self.press(user, FlowId::Debt, StepId::AddStart, "").await;
        self.text(user, description).await;
        assert_eq!(self.text(user, amount).await, Some(Msg::AskDate));
        assert_eq!(
            self.press(user, FlowId::Date, StepId::Year, "").await,
            Some(Msg::PickYear)
        );
    }
}

fn is_step(step: StepId) -> impl Fn(&CallbackToken) -> bool {
    move |t: &CallbackToken| t.step == step
}

#[tokio::test]
async fn adding_a_debt_end_to_end() {
    let h = Harness::new();

    assert_eq!(h.text(ALICE, "/start").await, Some(Msg::Welcome));
    assert_eq!(
        h.press_shown(ALICE, |t| t.owner == FlowId::MainMenu).await,
        Some(Msg::MainMenu)
    );
    assert_eq!(
        h.press_shown(ALICE, |t| t.owner == FlowId::Debt).await,
        Some(Msg::DebtMenu)
    );
    assert_eq!(
        h.press_shown(ALICE, is_step(StepId::AddStart)).await,
        Some(Msg::AskDescription)
    );
    assert_eq!(h.text(ALICE, "Books").await, Some(Msg::AskAmount));
    assert!(h.messenger.last().text.contains("BOOKS"));

    assert_eq!(h.text(ALICE, "-5").await, Some(Msg::AmountInvalid));
    assert_eq!(h.session(ALICE).await.unwrap().step, StepId::AddAmount);

    assert_eq!(h.text(ALICE, "500").await, Some(Msg::AskDate));
    let s = h.session(ALICE).await.unwrap();
    assert_eq!((s.owner, s.step), (FlowId::Date, StepId::Year));

    assert_eq!(
        h.press_shown(ALICE, is_step(StepId::Year)).await,
        Some(Msg::PickYear)
    );
    assert_eq!(
        h.press_shown(ALICE, |t| t.step == StepId::Year && t.payload == "2025")
            .await,
        Some(Msg::PickMonth)
    );
    assert_eq!(
        h.press_shown(ALICE, |t| t.step == StepId::Month && t.payload == "6")
            .await,
        Some(Msg::PickDay)
    );

    assert_eq!(
        h.press_shown(ALICE, |t| t.step == StepId::Day && t.payload == "3")
            .await,
        Some(Msg::DateInPast)
    );
    let sent = h.messenger.last().text;
    assert!(sent.contains("JUN 15 2025"), "{sent}");
    assert!(sent.contains("JUN 3 2025"), "{sent}");

    assert_eq!(
        h.press_shown(ALICE, |t| t.step == StepId::Day && t.payload == "20")
            .await,
        Some(Msg::DatePicked)
    );
    assert_eq!(
        h.press_shown(ALICE, is_step(StepId::AddFinish)).await,
        Some(Msg::Saved)
    );

    let debts = h.debts(ALICE).await;
    assert_eq!(debts.len(), 1);
    assert_eq!(debts[0].description, "Books");
    assert_eq!(debts[0].amount, 500);
    assert_eq!(debts[0].due, Some(date(2025, 6, 20)));
    assert_eq!(debts[0].owner, UserId(ALICE));
    assert!(h.session(ALICE).await.is_none());
    assert!(h.messenger.last().text.contains("20.06.2025"));
}

#[tokio::test]
async fn replayed_lock_button_does_not_save_twice() {
    let h = Harness::new();
    h.add_until_date(ALICE, "Books", "500").await;
    h.press(ALICE, FlowId::Date, StepId::Year, "2025").await;
    h.press(ALICE, FlowId::Date, StepId::Month, "7").await;
    h.press(ALICE, FlowId::Date, StepId::Day, "1").await;

    assert_eq!(
        h.press(ALICE, FlowId::Debt, StepId::AddFinish, "").await,
        Some(Msg::Saved)
    );
    assert_eq!(
        h.press(ALICE, FlowId::Debt, StepId::AddFinish, "").await,
        Some(Msg::SessionLost)
    );
    assert_eq!(h.debts(ALICE).await.len(), 1);
}

#[tokio::test]
async fn lock_without_a_date_asks_for_one() {
    let h = Harness::new();
    h.add_until_date(ALICE, "Books", "500").await;
    h.press(ALICE, FlowId::Date, StepId::Year, "2026").await;

    assert_eq!(
        h.press(ALICE, FlowId::Debt, StepId::AddFinish, "").await,
        Some(Msg::DateNotSet)
    );
    assert!(h.debts(ALICE).await.is_empty());
    assert!(h.session(ALICE).await.is_some());
}

#[tokio::test]
async fn past_year_and_month_are_rejected_without_moving_on() {
    let h = Harness::new();
    h.add_until_date(ALICE, "Books", "500").await;
    let before = h.session(ALICE).await;

    assert_eq!(
        h.press(ALICE, FlowId::Date, StepId::Year, "2024").await,
        Some(Msg::DateInPast)
    );
    assert_eq!(h.session(ALICE).await, before);

    h.press(ALICE, FlowId::Date, StepId::Year, "2025").await;
    let before = h.session(ALICE).await;
    assert_eq!(
        h.press(ALICE, FlowId::Date, StepId::Month, "5").await,
        Some(Msg::DateInPast)
    );
    assert!(h.messenger.last().text.contains("MAY 2025"));
    assert_eq!(h.session(ALICE).await, before);

    // The current month and today itself are still allowed.
    assert_eq!(
        h.press(ALICE, FlowId::Date, StepId::Month, "6").await,
        Some(Msg::PickDay)
    );
    assert_eq!(
        h.press(ALICE, FlowId::Date, StepId::Day, "15").await,
        Some(Msg::DatePicked)
    );
    match h.session(ALICE).await.unwrap().state {
        FlowState::PickingDate(pick) => {
            assert_eq!(pick.picked, Some(PartialDate::Day(today())))
        }
        other => panic!("unexpected state {other:?}"),
    }
}

#[tokio::test]
async fn invalid_day_reprompts() {
    let h = Harness::new();
    h.add_until_date(ALICE, "Books", "500").await;
    h.press(ALICE, FlowId::Date, StepId::Year, "2026").await;
    h.press(ALICE, FlowId::Date, StepId::Month, "2").await;

    assert_eq!(
        h.press(ALICE, FlowId::Date, StepId::Day, "30").await,
        Some(Msg::InvalidDay)
    );
    assert_eq!(h.session(ALICE).await.unwrap().step, StepId::Day);
}

#[tokio::test]
async fn typing_inside_the_date_picker_is_button_only() {
    let h = Harness::new();
    h.add_until_date(ALICE, "Books", "500").await;
    let before = h.session(ALICE).await;

    assert_eq!(h.text(ALICE, "2030-01-01").await, Some(Msg::ButtonOnly));
    assert_eq!(h.session(ALICE).await, before);
    assert!(h.messenger.last().keyboard.is_some());
}

#[tokio::test]
async fn date_picker_back_and_cancel_use_the_parent_routes() {
    let h = Harness::new();
    h.add_until_date(ALICE, "Books", "500").await;

    assert_eq!(
        h.press_shown(ALICE, |t| t.owner == FlowId::Debt && t.step == StepId::AddAmount)
            .await,
        Some(Msg::AskAmount)
    );
    assert_eq!(h.session(ALICE).await.unwrap().step, StepId::AddAmount);

    h.text(ALICE, "500").await;
    h.press(ALICE, FlowId::Date, StepId::Year, "").await;
    assert_eq!(
        h.press_shown(ALICE, |t| t.owner == FlowId::Debt && t.step == StepId::Start)
            .await,
        Some(Msg::DebtMenu)
    );
    assert!(h.session(ALICE).await.is_none());
}

#[tokio::test]
async fn foreign_debts_cannot_be_edited_deleted_or_paid() {
    let h = Harness::new();
    h.seed(ALICE, "Rent", 900, None).await;
    let foreign = h.seed(BOB, "Car", 5000, None).await;

    for start in [StepId::EditStart, StepId::DeleteStart, StepId::PayStart] {
        assert_eq!(
            h.press(ALICE, FlowId::Debt, start, "").await,
            Some(match start {
                StepId::EditStart => Msg::SelectForEdit,
                StepId::DeleteStart => Msg::SelectForDelete,
                _ => Msg::SelectForPay,
            })
        );
        assert_eq!(
            h.press(ALICE, FlowId::Debt, StepId::Select, &foreign.to_string())
                .await,
            Some(Msg::OwnershipViolation)
        );
        assert!(h.session(ALICE).await.is_none());
    }

    let bob = h.debts(BOB).await;
    assert_eq!(bob.len(), 1);
    assert_eq!(bob[0].amount, 5000);
}

#[tokio::test]
async fn select_lists_only_own_debts() {
    let h = Harness::new();
    h.seed(ALICE, "Rent", 900, Some(date(2025, 7, 1))).await;
    h.seed(BOB, "Car", 5000, None).await;

    h.press(ALICE, FlowId::Debt, StepId::EditStart, "").await;
    let kb = h.messenger.last().keyboard.unwrap();
    let picks: Vec<_> = kb
        .buttons()
        .filter(|b| b.token.step == StepId::Select)
        .collect();
    assert_eq!(picks.len(), 1);
    assert!(picks[0].label.contains("Rent"));
}

#[tokio::test]
async fn empty_selection_reports_no_debts() {
    let h = Harness::new();
    assert_eq!(
        h.press(ALICE, FlowId::Debt, StepId::PayStart, "").await,
        Some(Msg::NoDebts)
    );
    assert!(h.session(ALICE).await.is_none());
}

#[tokio::test]
async fn selecting_a_missing_debt_ends_the_flow() {
    let h = Harness::new();
    h.seed(ALICE, "Rent", 900, None).await;
    h.press(ALICE, FlowId::Debt, StepId::EditStart, "").await;

    assert_eq!(
        h.press(ALICE, FlowId::Debt, StepId::Select, "4242").await,
        Some(Msg::DebtNotFound)
    );
    assert!(h.session(ALICE).await.is_none());
}

#[tokio::test]
async fn editing_every_field() {
    let h = Harness::new();
    let id = h.seed(ALICE, "Rent", 900, Some(date(2025, 7, 1))).await;

    h.press(ALICE, FlowId::Debt, StepId::EditStart, "").await;
    assert_eq!(
        h.press_shown(ALICE, is_step(StepId::Select)).await,
        Some(Msg::Selected)
    );
    assert_eq!(
        h.press_shown(ALICE, is_step(StepId::EditMenu)).await,
        Some(Msg::EditMenu)
    );

    assert_eq!(
        h.press(ALICE, FlowId::Debt, StepId::EnterDescription, "").await,
        Some(Msg::AskNewDescription)
    );
    assert_eq!(h.text(ALICE, "   ").await, Some(Msg::DescriptionEmpty));
    assert_eq!(h.text(ALICE, "Flat rent").await, Some(Msg::DescriptionUpdated));

    assert_eq!(
        h.press(ALICE, FlowId::Debt, StepId::EnterAmount, "").await,
        Some(Msg::AskNewAmount)
    );
    assert_eq!(h.text(ALICE, "1250").await, Some(Msg::AmountUpdated));

    assert_eq!(
        h.press(ALICE, FlowId::Debt, StepId::EnterDate, "").await,
        Some(Msg::AskDate)
    );
    h.press(ALICE, FlowId::Date, StepId::Year, "").await;
    h.press(ALICE, FlowId::Date, StepId::Year, "2026").await;
    h.press(ALICE, FlowId::Date, StepId::Month, "1").await;
    assert_eq!(
        h.press(ALICE, FlowId::Date, StepId::Day, "10").await,
        Some(Msg::DatePicked)
    );
    assert_eq!(
        h.press_shown(ALICE, is_step(StepId::EditDate)).await,
        Some(Msg::DateUpdated)
    );
    let s = h.session(ALICE).await.unwrap();
    assert_eq!((s.owner, s.step), (FlowId::Debt, StepId::EditMenu));

    // Nothing is written until the edit is confirmed.
    assert_eq!(h.store.inner.get(id).await.unwrap().amount, 900);

    assert_eq!(
        h.press_shown(ALICE, is_step(StepId::EditFinish)).await,
        Some(Msg::EditFinished)
    );
    let saved = h.store.inner.get(id).await.unwrap();
    assert_eq!(saved.description, "Flat rent");
    assert_eq!(saved.amount, 1250);
    assert_eq!(saved.due, Some(date(2026, 1, 10)));
    assert!(h.session(ALICE).await.is_none());
}

#[tokio::test]
async fn deleting_a_debt() {
    let h = Harness::new();
    let id = h.seed(ALICE, "Rent", 900, None).await;

    h.press(ALICE, FlowId::Debt, StepId::DeleteStart, "").await;
    h.press(ALICE, FlowId::Debt, StepId::Select, &id.to_string()).await;
    assert_eq!(
        h.press_shown(ALICE, is_step(StepId::DeleteConfirm)).await,
        Some(Msg::ConfirmDelete)
    );
    assert_eq!(
        h.press_shown(ALICE, is_step(StepId::DeleteFinish)).await,
        Some(Msg::Deleted)
    );
    assert!(h.debts(ALICE).await.is_empty());

    assert_eq!(
        h.press(ALICE, FlowId::Debt, StepId::DeleteFinish, "").await,
        Some(Msg::SessionLost)
    );
}

#[tokio::test]
async fn partial_then_full_payment() {
    let h = Harness::new();
    let id = h.seed(ALICE, "Rent", 500, None).await;

    h.press(ALICE, FlowId::Debt, StepId::PayStart, "").await;
    h.press(ALICE, FlowId::Debt, StepId::Select, &id.to_string()).await;
    assert_eq!(
        h.press_shown(ALICE, is_step(StepId::EnterPayment)).await,
        Some(Msg::AskPayment)
    );
    assert_eq!(h.text(ALICE, "1000").await, Some(Msg::AmountTooLarge));
    assert_eq!(h.text(ALICE, "200").await, Some(Msg::ConfirmPayment));
    assert_eq!(
        h.press_shown(ALICE, is_step(StepId::PayFinish)).await,
        Some(Msg::PaidPartially)
    );
    assert_eq!(h.store.inner.get(id).await.unwrap().amount, 300);

    h.press(ALICE, FlowId::Debt, StepId::PayStart, "").await;
    h.press(ALICE, FlowId::Debt, StepId::Select, &id.to_string()).await;
    h.press(ALICE, FlowId::Debt, StepId::EnterPayment, "").await;
    h.text(ALICE, "300").await;
    assert_eq!(
        h.press(ALICE, FlowId::Debt, StepId::PayFinish, "").await,
        Some(Msg::PaidOff)
    );
    assert!(h.debts(ALICE).await.is_empty());
}

#[tokio::test]
async fn listing_shows_markers_and_total() {
    let h = Harness::new();
    h.seed(ALICE, "Old loan", 1500, Some(date(2025, 6, 1))).await;
    h.seed(ALICE, "Rent", 900, Some(date(2025, 7, 1))).await;
    h.seed(ALICE, "Friend", 100, None).await;

    assert_eq!(
        h.press(ALICE, FlowId::Debt, StepId::List, "").await,
        Some(Msg::DebtList)
    );
    let text = h.messenger.last().text;
    assert!(text.contains("OVERDUE BY 14 DAYS"), "{text}");
    assert!(text.contains("2.500"), "{text}");
    let old = text.find("OLD LOAN").unwrap();
    let rent = text.find("RENT").unwrap();
    let friend = text.find("FRIEND").unwrap();
    assert!(old < rent && rent < friend, "{text}");
    assert!(h.session(ALICE).await.is_none());
}

/// Edit `id` up to the edit menu.
async fn open_edit(h: &Harness, user: i64, id: DebtId) {
    h.press(user, FlowId::Debt, StepId::EditStart, "").await;
    h.press(user, FlowId::Debt, StepId::Select, &id.to_string()).await;
    assert_eq!(
        h.press(user, FlowId::Debt, StepId::EditMenu, "").await,
        Some(Msg::EditMenu)
    );
}

#[tokio::test]
async fn stale_delete_confirmation_cannot_delete_the_debt_being_edited() {
    let h = Harness::new();
    let car = h.seed(ALICE, "Car", 5000, None).await;
    let rent = h.seed(ALICE, "Rent", 900, None).await;

    h.press(ALICE, FlowId::Debt, StepId::DeleteStart, "").await;
    h.press(ALICE, FlowId::Debt, StepId::Select, &car.to_string()).await;
    assert_eq!(
        h.press(ALICE, FlowId::Debt, StepId::DeleteConfirm, "").await,
        Some(Msg::ConfirmDelete)
    );
    h.press(ALICE, FlowId::Debt, StepId::Start, "").await;

    open_edit(&h, ALICE, rent).await;
    assert_eq!(
        h.press(ALICE, FlowId::Debt, StepId::DeleteFinish, "").await,
        Some(Msg::SessionLost)
    );
    assert_eq!(h.debts(ALICE).await.len(), 2);
    assert_eq!(h.messenger.last().keyboard, Some(keyboard::recovery()));
}

#[tokio::test]
async fn stale_add_lock_cannot_save_a_copy_of_an_edited_debt() {
    let h = Harness::new();
    let rent = h.seed(ALICE, "Rent", 900, None).await;

    open_edit(&h, ALICE, rent).await;
    h.press(ALICE, FlowId::Debt, StepId::EnterDate, "").await;
    h.press(ALICE, FlowId::Date, StepId::Year, "").await;
    h.press(ALICE, FlowId::Date, StepId::Year, "2026").await;
    h.press(ALICE, FlowId::Date, StepId::Month, "1").await;
    assert_eq!(
        h.press(ALICE, FlowId::Date, StepId::Day, "10").await,
        Some(Msg::DatePicked)
    );

    assert_eq!(
        h.press(ALICE, FlowId::Debt, StepId::AddFinish, "").await,
        Some(Msg::SessionLost)
    );
    let debts = h.debts(ALICE).await;
    assert_eq!(debts.len(), 1);
    assert_eq!(debts[0].due, None);
}

#[tokio::test]
async fn stale_edit_date_cannot_finish_an_add() {
    let h = Harness::new();
    h.add_until_date(ALICE, "Books", "500").await;
    h.press(ALICE, FlowId::Date, StepId::Year, "2026").await;
    h.press(ALICE, FlowId::Date, StepId::Month, "1").await;
    h.press(ALICE, FlowId::Date, StepId::Day, "10").await;

    assert_eq!(
        h.press(ALICE, FlowId::Debt, StepId::EditDate, "").await,
        Some(Msg::SessionLost)
    );
    assert!(h.session(ALICE).await.is_none());
    assert!(h.debts(ALICE).await.is_empty());
}

#[tokio::test]
async fn stale_edit_finish_cannot_write_a_debt_awaiting_deletion() {
    let h = Harness::new();
    let rent = h.seed(ALICE, "Rent", 900, None).await;

    h.press(ALICE, FlowId::Debt, StepId::DeleteStart, "").await;
    h.press(ALICE, FlowId::Debt, StepId::Select, &rent.to_string()).await;
    h.press(ALICE, FlowId::Debt, StepId::DeleteConfirm, "").await;

    assert_eq!(
        h.press(ALICE, FlowId::Debt, StepId::EditFinish, "").await,
        Some(Msg::SessionLost)
    );
    assert!(h.session(ALICE).await.is_none());
    assert_eq!(h.debts(ALICE).await.len(), 1);
}

#[tokio::test]
async fn terminal_buttons_only_act_on_their_own_step() {
    let h = Harness::new();
    let rent = h.seed(ALICE, "Rent", 900, None).await;

    // Delete confirmation is not reachable straight from a selection.
    h.press(ALICE, FlowId::Debt, StepId::PayStart, "").await;
    h.press(ALICE, FlowId::Debt, StepId::Select, &rent.to_string()).await;
    assert_eq!(
        h.press(ALICE, FlowId::Debt, StepId::DeleteFinish, "").await,
        Some(Msg::SessionLost)
    );

    // A payment is confirmed only once the amount was entered.
    h.press(ALICE, FlowId::Debt, StepId::PayStart, "").await;
    h.press(ALICE, FlowId::Debt, StepId::Select, &rent.to_string()).await;
    h.press(ALICE, FlowId::Debt, StepId::EnterPayment, "").await;
    assert_eq!(
        h.press(ALICE, FlowId::Debt, StepId::PayFinish, "").await,
        Some(Msg::SessionLost)
    );

    // Editing a debt cannot jump into the payment prompt.
    open_edit(&h, ALICE, rent).await;
    assert_eq!(
        h.press(ALICE, FlowId::Debt, StepId::EnterPayment, "").await,
        Some(Msg::SessionLost)
    );

    let debts = h.debts(ALICE).await;
    assert_eq!(debts.len(), 1);
    assert_eq!(debts[0].amount, 900);
}

#[tokio::test]
async fn text_without_a_session_is_button_only() {
    let h = Harness::new();
    assert_eq!(h.text(ALICE, "hello").await, Some(Msg::ButtonOnly));
    assert_eq!(h.messenger.last().keyboard, Some(keyboard::main_menu_entry()));
    assert!(h.session(ALICE).await.is_none());
}

#[tokio::test]
async fn text_where_a_button_is_expected_is_button_only() {
    let h = Harness::new();
    let id = h.seed(ALICE, "Rent", 900, None).await;
    h.press(ALICE, FlowId::Debt, StepId::DeleteStart, "").await;
    h.press(ALICE, FlowId::Debt, StepId::Select, &id.to_string()).await;
    let before = h.session(ALICE).await;

    assert_eq!(h.text(ALICE, "yes").await, Some(Msg::ButtonOnly));
    assert_eq!(h.session(ALICE).await, before);
}

#[tokio::test]
async fn unknown_events_get_a_notice() {
    let h = Harness::new();
    let mut event = Event::message(ChatId(ALICE), UserId(ALICE), "");
    event.kind = EventKind::Unknown;
    assert_eq!(
        h.dispatcher.dispatch(event).await.unwrap(),
        Some(Msg::UnknownEvent)
    );
    assert_eq!(h.messenger.last().keyboard, Some(keyboard::main_menu_entry()));
}

#[tokio::test]
async fn malformed_callback_ends_the_flow() {
    let h = Harness::new();
    h.press(ALICE, FlowId::Debt, StepId::AddStart, "").await;

    assert_eq!(h.press_raw(ALICE, "not-a-token").await, Some(Msg::MalformedToken));
    assert!(h.session(ALICE).await.is_none());
    assert_eq!(h.messenger.last().keyboard, Some(keyboard::recovery()));
}

#[tokio::test]
async fn ignore_buttons_do_nothing_but_are_acknowledged() {
    let h = Harness::new();
    h.add_until_date(ALICE, "Books", "500").await;
    let before = h.session(ALICE).await;
    let sent = h.messenger.sent().len();
    let answered = h.messenger.answered().len();

    let ignore = CallbackToken::ignore().encode().unwrap();
    assert_eq!(h.press_raw(ALICE, &ignore).await, None);
    assert_eq!(h.messenger.sent().len(), sent);
    assert_eq!(h.messenger.answered().len(), answered + 1);
    assert_eq!(h.session(ALICE).await, before);
}

#[tokio::test]
async fn missing_handler_leaves_the_session_alone() {
    let sessions = Arc::new(MemorySessionStore::new());
    let messenger = Arc::new(FakeMessenger::default());
    let mut dispatcher = Dispatcher::new(sessions.clone(), messenger.clone());
    dispatcher.register(Arc::new(CommandFlow::new(PathBuf::from("missing.jpg"))));
    dispatcher.register(Arc::new(MainMenuFlow));
    dispatcher.register(Arc::new(DebtFlow::new(
        Arc::new(FlakyStore::default()),
        Arc::new(FixedClock(today())),
    )));

    let user = UserId(ALICE);
    let session = Session::new(
        FlowId::Date,
        StepId::Year,
        FlowState::PickingDate(DatePick {
            back: Route::new(FlowId::Debt, StepId::AddAmount),
            next: Route::new(FlowId::Debt, StepId::AddFinish),
            parent: Debt::draft(user),
            picked: None,
        }),
    );
    sessions.set(user, session.clone()).await.unwrap();

    let data = CallbackToken::new(FlowId::Date, StepId::Year, "2026")
        .encode()
        .unwrap();
    let res = dispatcher
        .dispatch(Event::callback(ChatId(ALICE), user, "cb", data))
        .await
        .unwrap();
    assert_eq!(res, Some(Msg::HandlerNotFound));
    assert_eq!(sessions.get(user).await.unwrap(), Some(session));
}

#[tokio::test]
async fn corrupt_redirection_ends_the_flow() {
    let h = Harness::new();
    let user = UserId(ALICE);
    h.sessions
        .set(
            user,
            Session::new(
                FlowId::Date,
                StepId::Year,
                FlowState::PickingDate(DatePick {
                    back: Route::new(FlowId::Ignore, StepId::Ignore),
                    next: Route::new(FlowId::Debt, StepId::AddFinish),
                    parent: Debt::draft(user),
                    picked: None,
                }),
            ),
        )
        .await
        .unwrap();

    assert_eq!(
        h.press(ALICE, FlowId::Date, StepId::Year, "2026").await,
        Some(Msg::RedirectionCorrupt)
    );
    assert!(h.session(ALICE).await.is_none());
}

#[tokio::test]
async fn commands_escape_any_flow() {
    let h = Harness::new();
    h.add_until_date(ALICE, "Books", "500").await;

    assert_eq!(h.text(ALICE, "/help").await, Some(Msg::Help));
    assert!(h.session(ALICE).await.is_none());

    h.press(ALICE, FlowId::Debt, StepId::AddStart, "").await;
    assert_eq!(h.text(ALICE, "/debt@drill_bot").await, Some(Msg::Manual));
    assert!(h.session(ALICE).await.is_none());
}

#[tokio::test]
async fn welcome_falls_back_to_text_without_media() {
    let h = Harness::build(FakeMessenger::without_media(), None);
    assert_eq!(h.text(ALICE, "/start").await, Some(Msg::Welcome));
    let sent = h.messenger.last();
    assert!(!sent.media);
    assert_eq!(sent.keyboard, Some(keyboard::main_menu_entry()));
}

#[tokio::test]
async fn welcome_is_sent_with_media_when_possible() {
    let h = Harness::new();
    h.text(ALICE, "/start").await;
    assert!(h.messenger.last().media);
}

#[tokio::test]
async fn store_failure_ends_the_flow_with_recovery() {
    let h = Harness::new();
    h.add_until_date(ALICE, "Books", "500").await;
    h.press(ALICE, FlowId::Date, StepId::Year, "2026").await;
    h.press(ALICE, FlowId::Date, StepId::Month, "3").await;
    h.press(ALICE, FlowId::Date, StepId::Day, "3").await;
    h.store.fail_writes(true);

    assert_eq!(
        h.press(ALICE, FlowId::Debt, StepId::AddFinish, "").await,
        Some(Msg::CollaboratorFailure)
    );
    assert!(h.session(ALICE).await.is_none());
    assert!(h.debts(ALICE).await.is_empty());
    assert_eq!(h.messenger.last().keyboard, Some(keyboard::recovery()));
}

#[tokio::test(start_paused = true)]
async fn timed_out_turn_restores_the_session_and_reports() {
    let deadline = Deadline::new(Duration::from_millis(50), CancellationToken::new());
    let h = Harness::build(FakeMessenger::default(), Some(deadline));
    h.seed(ALICE, "Rent", 900, None).await;
    h.press(ALICE, FlowId::Debt, StepId::AddStart, "").await;
    h.text(ALICE, "Books").await;
    let before = h.session(ALICE).await;

    h.store.hang(true);
    assert_eq!(
        h.press(ALICE, FlowId::Debt, StepId::EditStart, "").await,
        Some(Msg::CollaboratorFailure)
    );
    assert_eq!(h.session(ALICE).await, before);
    assert_eq!(h.messenger.last().keyboard, Some(keyboard::recovery()));

    // The restored session resumes where it stopped.
    h.store.hang(false);
    assert_eq!(h.text(ALICE, "500").await, Some(Msg::AskDate));
}

#[tokio::test(start_paused = true)]
async fn shutdown_restores_the_session_silently() {
    let cancel = CancellationToken::new();
    let deadline = Deadline::new(Duration::from_millis(50), cancel.clone());
    let h = Harness::build(FakeMessenger::default(), Some(deadline));
    h.seed(ALICE, "Rent", 900, None).await;
    h.press(ALICE, FlowId::Debt, StepId::AddStart, "").await;
    h.text(ALICE, "Books").await;
    let before = h.session(ALICE).await;
    let sent = h.messenger.sent().len();

    h.store.hang(true);
    cancel.cancel();
    assert_eq!(h.press(ALICE, FlowId::Debt, StepId::EditStart, "").await, None);
    assert_eq!(h.session(ALICE).await, before);
    assert_eq!(h.messenger.sent().len(), sent);
}

#[tokio::test(start_paused = true)]
async fn timed_out_terminal_step_stays_closed() {
    let deadline = Deadline::new(Duration::from_millis(50), CancellationToken::new());
    let h = Harness::build(FakeMessenger::default(), Some(deadline));
    h.add_until_date(ALICE, "Books", "500").await;
    h.press(ALICE, FlowId::Date, StepId::Year, "2026").await;
    h.press(ALICE, FlowId::Date, StepId::Month, "3").await;
    h.press(ALICE, FlowId::Date, StepId::Day, "3").await;

    h.store.hang(true);
    assert_eq!(
        h.press(ALICE, FlowId::Debt, StepId::AddFinish, "").await,
        Some(Msg::CollaboratorFailure)
    );
    assert!(h.session(ALICE).await.is_none());
    assert_eq!(h.messenger.last().keyboard, Some(keyboard::recovery()));

    h.store.hang(false);
    assert_eq!(
        h.press(ALICE, FlowId::Debt, StepId::AddFinish, "").await,
        Some(Msg::SessionLost)
    );
    assert!(h.debts(ALICE).await.is_empty());
}

#[tokio::test]
async fn users_do_not_share_sessions() {
    let h = Harness::new();
    h.press(ALICE, FlowId::Debt, StepId::AddStart, "").await;

    assert_eq!(h.text(BOB, "Books").await, Some(Msg::ButtonOnly));
    assert_eq!(h.text(ALICE, "Books").await, Some(Msg::AskAmount));
    assert!(h.session(BOB).await.is_none());
}
