//! Static message catalog.
//!
//! Every reply the bot sends is a [`Msg`] id plus positional arguments.
//! Templates use `{}` placeholders, filled in order by [`render`].

const RULE: &str = "─────────🌀─────────\n\n";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Msg {
    // Commands and menus
    Welcome,
    Help,
    Manual,
    MainMenu,
    DebtMenu,

    // Dispatcher
    ButtonOnly,
    UnknownEvent,
    HandlerNotFound,
    UnknownStep,

    // Flow errors
    SessionLost,
    MalformedToken,
    OwnershipViolation,
    RedirectionCorrupt,
    DebtNotFound,
    CollaboratorFailure,

    // Add
    AskDescription,
    AskAmount,
    AskDate,
    DateNotSet,
    DescriptionEmpty,
    DescriptionTooLong,
    AmountInvalid,
    AmountTooLarge,
    Saved,

    // Select
    SelectForEdit,
    SelectForDelete,
    SelectForPay,
    NoDebts,
    Selected,

    // Edit
    EditMenu,
    AskNewDescription,
    DescriptionUpdated,
    AskNewAmount,
    AmountUpdated,
    DateUpdated,
    EditFinished,

    // Delete
    ConfirmDelete,
    Deleted,

    // Pay
    AskPayment,
    ConfirmPayment,
    PaidOff,
    PaidPartially,

    DebtList,

    // Date picker
    PickYear,
    PickMonth,
    PickDay,
    DatePicked,
    DateInPast,
    InvalidYear,
    InvalidMonth,
    InvalidDay,
}

impl Msg {
    pub fn template(self) -> &'static str {
        match self {
            Msg::Welcome => concat!(
                "─────────🌀─────────\n\n",
                "🌀 SPIRAL CORE ONLINE\n\n",
                "🚀 ACTIVE MODULES:\n",
                "  🌀 DEBT DRILL HUB 🌀\n\n",
                "🌀 THE DRILL IS TURNING...\n\n",
                "─────────🌀─────────\n\n",
                "🔥 IF YOU BELIEVE YOU CAN, YOU CAN!\n",
                "─────────🌀─────────\n\n",
            ),
            Msg::Help => concat!(
                "─────────🌀─────────\n\n",
                "📡 /help: show this manual\n",
                "🌀 /start: boot the spiral core\n",
                "💥 /debt: debt module manual\n\n",
                "Everything else happens through the buttons.\n",
                "─────────🌀─────────\n\n",
            ),
            Msg::Manual => concat!(
                "─────────🌀─────────\n\n",
                "🌀 DEBT DRILL HUB MANUAL\n\n",
                "• 🌀 CONTRACT: add a debt (name, amount, due date)\n",
                "• 🌀 RECALIBRATE: edit name, amount or due date\n",
                "• 💥 BALANCE: record a payment\n",
                "• 💀 ANNIHILATE: delete a debt\n",
                "• 📜 REVIEW: list debts, overdue first\n\n",
                "⏳ Due dates are picked year, month, then day.\n",
                "Past dates are sealed: only future drilling.\n",
                "─────────🌀─────────\n\n",
            ),
            Msg::MainMenu => concat!(
                "─────────🌀─────────\n\n",
                "🌀 SPIRAL COMMAND CENTER\n\n",
                "DEPLOY TARGET HUB:\n",
                "─────────🌀─────────\n\n",
            ),
            Msg::DebtMenu => concat!(
                "─────────🌀─────────\n\n",
                "🌀 DEBT MODULE ONLINE\n\n",
                "💥 YOUR DEBTS ARE NOT LIMITS,\n",
                "THEY ARE TARGETS FOR YOUR DRILL!\n\n",
                "🌀 AWAITING DRILL ORDERS!\n",
                "─────────🌀─────────\n\n",
            ),

            Msg::ButtonOnly => "🚨 BUTTON-ONLY MODE!\n\n🌀 Use the buttons, or /start to begin.",
            Msg::UnknownEvent => "🚨 UNIDENTIFIED SIGNAL!\n\n💥 Only text and buttons are understood here.",
            Msg::HandlerNotFound => "🚨 NO DRILL PROTOCOL FOR {}!\n\n🌀 Try /start.",
            Msg::UnknownStep => "🚨 ABNORMAL DRILL SEQUENCE: {}\n\n🌀 Returning to safe mode...",

            Msg::SessionLost => "🚨 SPIRAL CONNECTION LOST!\n\n💥 This conversation has already ended.\n🌀 Start again from the menu.",
            Msg::MalformedToken => "🚨 CALLBACK SIGNAL CORRUPTED!\n\n🌀 Returning to safe mode...",
            Msg::OwnershipViolation => "🚨 DRILL COLLISION!\n\n💥 That contract belongs to another pilot.",
            Msg::RedirectionCorrupt => "🚨 THE SPIRAL HAS NO DIRECTION!\n\n💥 The date picker lost its way back.\n🌀 Aborting...",
            Msg::DebtNotFound => "🚨 CONTRACT NOT FOUND!\n\n💥 It may have been drilled out of reality already.",
            Msg::CollaboratorFailure => "🚨 SPIRAL CORE FAILURE!\n\n💥 Something went wrong on our side. Try again in a moment.",

            Msg::AskDescription => "🌀 NEW SPIRAL CONTRACT\n\n💥 Enter the contract name:",
            Msg::AskAmount => "🌀 CONTRACT NAME LOCKED: {}\n\n💥 Enter the spiral power (amount):",
            Msg::AskDate => "🌀 SPIRAL POWER LOCKED: {}₽\n\n⏳ Set the D-day:",
            Msg::DateNotSet => "🚨 TEMPORAL COORDINATES MISSING!\n\n⏳ Pick a date before locking.",
            Msg::DescriptionEmpty => "🚨 NAME FIELD EMPTY!\n\n🌀 Enter a non-empty name:",
            Msg::DescriptionTooLong => "🚨 NAME TOO LONG: {}/1000 characters.\n\n🌀 Enter a shorter name:",
            Msg::AmountInvalid => "🚨 INVALID SPIRAL POWER!\n\n💥 Only positive whole numbers pierce the heavens.\n🌀 Enter the amount again:",
            Msg::AmountTooLarge => "🚨 PAYMENT EXCEEDS THE DEBT!\n\n💥 Max: {}₽\n🌀 Enter the amount again:",
            Msg::Saved => "🌀 SPIRAL CONTRACT DEPLOYED!\n\n🌀 CONTRACT: {}\n💥 SPIRAL POWER: {}₽\n⏳ D-DAY: {}",

            Msg::SelectForEdit => "🌀 RECALIBRATE PROTOCOL\n\n💥 Select the contract to edit:",
            Msg::SelectForDelete => "💀 ANNIHILATE PROTOCOL\n\n💥 Select the contract to delete:",
            Msg::SelectForPay => "💥 BALANCE PROTOCOL\n\n💥 Select the contract to pay:",
            Msg::NoDebts => "─────────🌀─────────\n\n🌀 NO CONTRACTS. YOUR DEBTS ARE COSMIC DUST!\n\n─────────🌀─────────\n\n",
            Msg::Selected => "🌀 CONTRACT LOCKED!\n\n🌀 CONTRACT: {}\n💥 SPIRAL POWER: {}₽\n{}",

            Msg::EditMenu => "🌀 RECALIBRATE READY!\n\n🌀 CONTRACT: {}\n💥 SPIRAL POWER: {}₽\n{}\n\nChoose what to change:",
            Msg::AskNewDescription => "💥 Enter the new contract name:",
            Msg::DescriptionUpdated => "🌀 NAME RECALIBRATED TO: {}",
            Msg::AskNewAmount => "💥 Enter the new spiral power:",
            Msg::AmountUpdated => "🌀 SPIRAL POWER RECALIBRATED TO {}₽",
            Msg::DateUpdated => "⏳ D-DAY RECALIBRATED TO: {}",
            Msg::EditFinished => "🌀 RECALIBRATE COMPLETE!\n\n🌀 CONTRACT: {}\n💥 SPIRAL POWER: {}₽\n{}",

            Msg::ConfirmDelete => "☠️ ANNIHILATE {}?\n\n🚨 This cannot be undone.",
            Msg::Deleted => "💀 CONTRACT ERASED!\n\n🌀 CONTRACT: {}\n💥 SPIRAL POWER: {}₽",

            Msg::AskPayment => "💥 OUTSTANDING: {}₽\n\n🌀 Enter the payment amount:",
            Msg::ConfirmPayment => "🌀 BALANCE FINAL LOCK!\n\n🌀 CONTRACT: {}\n💥 BEFORE: {}₽\n🌀 PAYMENT: {}₽\n💥 AFTER: {}₽\n\n🌀 Confirm?",
            Msg::PaidOff => "💥 CONTRACT {} FULLY BALANCED AND ERASED!",
            Msg::PaidPartially => "🌀 IF THE DEBT IS THIS BIG, OUR DRILL MUST BE BIGGER!\n\n🌀 CONTRACT: {}\n💥 RESIDUAL POWER: {}₽",

            Msg::DebtList => "{}",

            Msg::PickYear => "🌀 YEAR DRILL ENGAGED!\n\n⏳ Select the year:",
            Msg::PickMonth => "🌀 YEAR {} LOCKED!\n\n⏳ Select the month:",
            Msg::PickDay => "🌀 {} LOCKED!\n\n⏳ Select the day:",
            Msg::DatePicked => "⏳ TEMPORAL COORDINATES LOCKED: {}\n\n🌀 Lock the drill to continue.",
            Msg::DateInPast => "🚨 PAST DRILLING FORBIDDEN!\n\n💥 NOW: {}\n💥 PICKED: {}\n\n🌀 Only future dates.",
            Msg::InvalidYear => "🚨 INVALID YEAR!\n\n🌀 Re-drilling year:",
            Msg::InvalidMonth => "🚨 INVALID MONTH!\n\n🌀 Re-drilling month:",
            Msg::InvalidDay => "🚨 INVALID DAY!\n\n🌀 Re-drilling day:",
        }
    }
}

/// Fill `msg`'s placeholders with `args`, in order. Missing args render empty;
/// extra args are ignored.
pub fn render(msg: Msg, args: &[&str]) -> String {
    let mut out = String::new();
    let mut args = args.iter();
    let mut pieces = msg.template().split("{}").peekable();
    while let Some(piece) = pieces.next() {
        out.push_str(piece);
        if pieces.peek().is_some() {
            out.push_str(args.next().copied().unwrap_or(""));
        }
    }
    out
}

/// Horizontal rule used to frame long messages.
pub fn rule() -> &'static str {
    RULE
}
