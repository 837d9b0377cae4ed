use crate::bot::callback_data::PayCallback;
use caramba_pay::models::{Amount, InvoiceId, PaymentMethod};
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

/// Purchasable options as `(label, price in rupees, context)`.
pub const PLANS: [(&str, i64, &str); 3] = [
    ("🌱 Grow", 69, "grow"),
    ("⭐ Prime", 199, "prime"),
    ("👑 Dominion", 389, "dominion"),
];

pub const CREDIT_PACKS: [i64; 3] = [100, 250, 500];

fn pay_button(label: String, major: i64, context: &str) -> Option<InlineKeyboardButton> {
    let amount = Amount::from_major(major).ok()?;
    let data = PayCallback::Pay {
        method: PaymentMethod::Upi,
        amount,
        context: context.to_string(),
    };
    Some(InlineKeyboardButton::callback(label, data.encode()))
}

/// Plans on top, credit packs below, three per row. The admin also gets a ₹1 test button.
pub fn make_amount_keyboard(is_admin: bool) -> InlineKeyboardMarkup {
    let mut grid: Vec<Vec<InlineKeyboardButton>> = PLANS
        .iter()
        .filter_map(|(label, price, ctx)| pay_button(format!("{} · ₹{}", label, price), *price, ctx))
        .map(|b| vec![b])
        .collect();

    let mut row = Vec::new();
    for (i, major) in CREDIT_PACKS.iter().enumerate() {
        if let Some(b) = pay_button(format!("₹{} credits", major), *major, "credits") {
            row.push(b);
        }
        if (i + 1) % 3 == 0 {
            grid.push(row);
            row = Vec::new();
        }
    }
    if !row.is_empty() {
        grid.push(row);
    }

    if is_admin {
        if let Some(b) = pay_button("🧪 Test ₹1".to_string(), 1, "test") {
            grid.push(vec![b]);
        }
    }

    InlineKeyboardMarkup::new(grid)
}

pub fn invoice_keyboard(id: &InvoiceId) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback(
            "✅ Verify Payment",
            PayCallback::Verify(id.clone()).encode(),
        )],
        vec![InlineKeyboardButton::callback(
            "❌ Cancel Request",
            PayCallback::Cancel(id.clone()).encode(),
        )],
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use teloxide::types::InlineKeyboardButtonKind;

    fn payloads(kb: &InlineKeyboardMarkup) -> Vec<String> {
        kb.inline_keyboard
            .iter()
            .flatten()
            .filter_map(|b| match &b.kind {
                InlineKeyboardButtonKind::CallbackData(data) => Some(data.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_amount_keyboard_decodes() {
        let data = payloads(&make_amount_keyboard(false));
        assert_eq!(data.len(), PLANS.len() + CREDIT_PACKS.len());
        assert!(data.iter().all(|d| PayCallback::decode(d).is_some()));
        assert!(data.contains(&"upay:upi:199:prime".to_string()));

        let admin = payloads(&make_amount_keyboard(true));
        assert!(admin.contains(&"upay:upi:1:test".to_string()));
    }

    #[test]
    fn test_invoice_keyboard() {
        let data = payloads(&invoice_keyboard(&InvoiceId::new("PAY_7")));
        assert_eq!(data, vec!["uver:PAY_7".to_string(), "ucan:PAY_7".to_string()]);
    }
}
