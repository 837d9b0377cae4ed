use anyhow::{Context, Result};
use async_trait::async_trait;
use caramba_pay::models::{
    Amount, Invoice, InvoiceId, InvoiceStatus, MessageRef, PaymentMethod, PaymentOutcome,
};
use caramba_pay::NotificationDispatcher;
use teloxide::prelude::*;
use teloxide::types::{MessageId, ParseMode};
use tracing::{info, warn};

/// Delivers admin alerts and payment outcomes over the Telegram Bot API.
#[derive(Clone)]
pub struct TelegramNotifier {
    bot: Bot,
    admin_chat: ChatId,
}

impl TelegramNotifier {
    pub fn new(bot: Bot, admin_id: i64) -> Self {
        Self {
            bot,
            admin_chat: ChatId(admin_id),
        }
    }
}

#[async_trait]
impl NotificationDispatcher for TelegramNotifier {
    async fn notify_admin(
        &self,
        user_id: i64,
        amount: Amount,
        method: PaymentMethod,
        invoice_id: &InvoiceId,
        context: &str,
    ) -> Result<MessageRef> {
        let sent = self
            .bot
            .send_message(
                self.admin_chat,
                admin_alert_text(user_id, amount, method, invoice_id, context),
            )
            .parse_mode(ParseMode::Html)
            .await
            .context("send admin alert")?;

        Ok(MessageRef {
            chat_id: self.admin_chat.0,
            message_id: sent.id.0,
        })
    }

    async fn notify_user(&self, user_id: i64, outcome: &PaymentOutcome) -> Result<()> {
        self.bot
            .send_message(ChatId(user_id), outcome_text(outcome))
            .parse_mode(ParseMode::Html)
            .await
            .with_context(|| format!("send outcome of {} to {}", outcome.invoice_id(), user_id))?;

        info!("Notified user {} about invoice {}", user_id, outcome.invoice_id());
        Ok(())
    }

    async fn close_messages(&self, invoice: &Invoice) -> Result<()> {
        if let Some(alert) = invoice.alert_ref {
            let text = format!(
                "{}\n\n{}",
                admin_alert_text(
                    invoice.user_id,
                    invoice.amount,
                    PaymentMethod::Upi,
                    &invoice.id,
                    &invoice.context,
                ),
                status_line(invoice.status)
            );
            // The admin may have deleted the alert already.
            if let Err(e) = self
                .bot
                .edit_message_text(ChatId(alert.chat_id), MessageId(alert.message_id), text)
                .parse_mode(ParseMode::Html)
                .await
            {
                warn!("Failed to update admin alert of invoice {}: {}", invoice.id, e);
            }
        }

        if let Some(prompt) = invoice.client_ref {
            close_prompt(&self.bot, prompt, invoice).await?;
        }
        Ok(())
    }
}

/// Replaces the payment prompt with its final state, dropping the buttons.
pub async fn close_prompt(bot: &Bot, prompt: MessageRef, invoice: &Invoice) -> Result<()> {
    bot.edit_message_text(
        ChatId(prompt.chat_id),
        MessageId(prompt.message_id),
        closed_prompt_text(invoice),
    )
    .parse_mode(ParseMode::Html)
    .await
    .with_context(|| format!("close payment prompt of {}", invoice.id))?;
    Ok(())
}

pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn admin_alert_text(
    user_id: i64,
    amount: Amount,
    method: PaymentMethod,
    invoice_id: &InvoiceId,
    context: &str,
) -> String {
    format!(
        "🔔 <b>New payment request</b>\n\n\
         👤 User: <code>{}</code>\n\
         💰 Amount: ₹{}\n\
         💳 Method: {}\n\
         🧾 Ref-ID: <code>{}</code>\n\
         📦 For: {}",
        user_id,
        amount,
        method.label(),
        escape_html(invoice_id.as_str()),
        escape_html(context)
    )
}

fn status_line(status: InvoiceStatus) -> &'static str {
    match status {
        InvoiceStatus::Settled => "✅ <b>Settled</b>",
        InvoiceStatus::Cancelled => "❌ <b>Cancelled</b>",
        InvoiceStatus::Expired => "⌛ <b>Expired</b>",
        InvoiceStatus::Failed => "⚠️ <b>Failed</b>",
        InvoiceStatus::Created | InvoiceStatus::AwaitingPayment => "⏳ <b>Awaiting payment</b>",
    }
}

fn closed_prompt_text(invoice: &Invoice) -> String {
    format!(
        "🧾 UPI payment of ₹{} for <b>{}</b>\nRef-ID: <code>{}</code>\n\n{}",
        invoice.amount,
        escape_html(&invoice.context),
        escape_html(invoice.id.as_str()),
        status_line(invoice.status)
    )
}

fn outcome_text(outcome: &PaymentOutcome) -> String {
    match outcome {
        PaymentOutcome::Settled {
            invoice_id,
            amount,
            context,
        } => format!(
            "✅ <b>Payment verified!</b>\n\n₹{} received for <b>{}</b>.\nRef-ID: <code>{}</code>",
            amount,
            escape_html(context),
            escape_html(invoice_id.as_str())
        ),
        PaymentOutcome::Cancelled { invoice_id } => format!(
            "❌ Payment request <code>{}</code> was cancelled.",
            escape_html(invoice_id.as_str())
        ),
        PaymentOutcome::Expired { invoice_id } => format!(
            "⌛ Payment request <code>{}</code> expired. You can start a new one with /topup.",
            escape_html(invoice_id.as_str())
        ),
        PaymentOutcome::Failed { invoice_id } => format!(
            "⚠️ The gateway no longer recognises payment <code>{}</code>. If you paid, contact support with this Ref-ID.",
            escape_html(invoice_id.as_str())
        ),
    }
}
