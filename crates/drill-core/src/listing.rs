use chrono::NaiveDate;

use crate::{
    domain::Debt,
    messages::{self, Msg},
};

/// `1234567` → `"1.234.567"`.
pub fn format_money(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if amount < 0 {
        out.push('-');
    }
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('.');
        }
        out.push(c);
    }
    out
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%d.%m.%Y").to_string()
}

/// Human due-date status relative to `today`.
pub fn due_status(debt: &Debt, today: NaiveDate) -> String {
    let Some(due) = debt.due else {
        return "🌌 D-DAY: UNLIMITED BATTLEFIELD".to_string();
    };
    let days = (due - today).num_days();
    if days < 0 {
        format!("🚨 OVERDUE BY {} DAYS", -days)
    } else {
        format!("⏳ D-DAY {}: {} DAYS REMAINING", format_date(due), days)
    }
}

/// Overdue first (most overdue first), then by ascending due date, undated
/// last. Ties keep id order.
pub fn sort_debts(debts: &mut [Debt]) {
    debts.sort_by_key(|d| (d.due.is_none(), d.due, d.id));
}

/// Full list message body.
pub fn render_list(mut debts: Vec<Debt>, today: NaiveDate) -> String {
    if debts.is_empty() {
        return messages::render(Msg::NoDebts, &[]);
    }
    sort_debts(&mut debts);

    let mut out = String::new();
    out.push_str(messages::rule());
    out.push_str("💢 YOUR CONTRACT LOG\n\n");
    out.push_str(messages::rule());

    let mut total: i64 = 0;
    for (i, debt) in debts.iter().enumerate() {
        total = total.saturating_add(debt.amount);
        let marker = if debt.is_overdue(today) {
            "☠️"
        } else if i % 2 == 0 {
            "🌀"
        } else {
            "💢"
        };
        out.push_str(&format!(
            "{marker} {}\n\t💥 SPIRAL POWER: {}₽\n\t{}\n\n",
            debt.description.to_uppercase(),
            format_money(debt.amount),
            due_status(debt, today),
        ));
    }

    out.push_str(messages::rule());
    out.push_str(&format!(
        "💥 TOTAL SPIRAL POWER REQUIRED: {}₽\n\n",
        format_money(total)
    ));
    out.push_str(messages::rule());
    out
}

/// Button label for a debt in a selection list.
pub fn select_label(debt: &Debt, today: NaiveDate) -> String {
    const MAX_DESC: usize = 24;
    let desc: String = if debt.description.chars().count() > MAX_DESC {
        let cut: String = debt.description.chars().take(MAX_DESC).collect();
        format!("{cut}...")
    } else {
        debt.description.clone()
    };
    let marker = if debt.is_overdue(today) { "☠️" } else { "🌀" };
    format!("{marker} {desc} {}₽", format_money(debt.amount))
}
