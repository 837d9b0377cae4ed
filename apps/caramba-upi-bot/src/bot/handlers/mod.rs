pub mod callback;
pub mod command;

use crate::services::notify_service::escape_html;
use caramba_pay::models::{Amount, InvoiceId};
use caramba_pay::PayError;
use chrono::{DateTime, Utc};

/// Short user-facing text for a failed invoice operation; fits a callback alert.
pub fn error_text(e: &PayError) -> String {
    match e {
        PayError::DuplicateActive {
            active: Some(id), ..
        } => format!(
            "You already have a pending payment ({}). Pay or cancel it first, see /pending.",
            id
        ),
        PayError::DuplicateActive { active: None, .. } => {
            "Your previous request is still being generated, please wait.".to_string()
        }
        PayError::GatewayUnreachable(_) => {
            "Payment gateway is not responding. Please try again in a minute.".to_string()
        }
        PayError::GatewayRejected(_) => {
            "Payment gateway refused the request. Please try again later.".to_string()
        }
        PayError::NotFound(_) => "This payment request is no longer tracked.".to_string(),
        PayError::CancelRejected { status, .. } => {
            format!("This request can no longer be cancelled (it is {}).", status)
        }
        PayError::Forbidden { .. } => "This payment request is not yours.".to_string(),
    }
}

pub fn invoice_caption(
    id: &InvoiceId,
    amount: Amount,
    pay_link: &str,
    expires_at: DateTime<Utc>,
) -> String {
    let minutes_left = (expires_at - Utc::now()).num_minutes().max(0);
    format!(
        "<b>📱 UPI Gateway</b>\n━━━━━━━━━━━━\n\
         <b>Amount:</b> ₹{}\n\
         <b>Ref-ID:</b> <code>{}</code>\n\
         <b>Expiry:</b> {} Minutes\n\
         ━━━━━━━━━━━━\n\
         <a href=\"{}\">Open in your UPI app</a> and press <b>Verify</b> after payment.",
        amount,
        escape_html(id.as_str()),
        minutes_left,
        escape_html(pay_link)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use caramba_pay::models::InvoiceStatus;
    use chrono::Duration;

    #[test]
    fn test_error_text_names_blocking_invoice() {
        let e = PayError::DuplicateActive {
            user_id: 1,
            active: Some(InvoiceId::new("PAY1")),
        };
        assert!(error_text(&e).contains("PAY1"));

        let e = PayError::CancelRejected {
            id: InvoiceId::new("PAY1"),
            status: InvoiceStatus::Settled,
        };
        assert!(error_text(&e).contains("settled"));
    }

    #[test]
    fn test_invoice_caption() {
        let text = invoice_caption(
            &InvoiceId::new("PAY42"),
            Amount::from_major(69).unwrap(),
            "upi://pay?pa=m@upi&am=69",
            Utc::now() + Duration::minutes(10) + Duration::seconds(5),
        );
        assert!(text.contains("₹69"));
        assert!(text.contains("<code>PAY42</code>"));
        assert!(text.contains("10 Minutes"));
        assert!(text.contains("upi://pay?pa=m@upi&amp;am=69"));
    }
}
