use crate::bot::callback_data::PayCallback;
use crate::bot::handlers::{error_text, invoice_caption};
use crate::bot::keyboards::invoice_keyboard;
use crate::services::notify_service::close_prompt;
use crate::AppState;
use caramba_pay::models::{Amount, InvoiceId, MessageRef, PaymentMethod};
use caramba_pay::{PayError, ReconcileOutcome};
use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, ParseMode};
use tracing::{error, info, warn};

pub async fn callback_handler(
    bot: Bot,
    q: CallbackQuery,
    state: AppState,
) -> Result<(), teloxide::RequestError> {
    info!("Received callback: {:?}", q.data);
    let callback_id = q.id.clone();
    let tg_id = q.from.id.0 as i64;

    let Some(cb) = q.data.as_deref().and_then(PayCallback::decode) else {
        let _ = bot.answer_callback_query(callback_id).await;
        return Ok(());
    };

    match cb {
        PayCallback::Pay {
            method,
            amount,
            context,
        } => {
            handle_pay(&bot, &q, &state, tg_id, method, amount, &context).await;
        }
        PayCallback::Verify(id) => {
            let result = state.receiver.verify(&id, tg_id).await;
            let answer = bot.answer_callback_query(callback_id);
            let _ = match verify_answer(&result) {
                Some((text, alert)) => answer.text(text).show_alert(alert).await,
                None => answer.await,
            };
            close_pressed_prompt(&bot, &q, &state, &id).await;
        }
        PayCallback::Cancel(id) => {
            let answer = bot.answer_callback_query(callback_id);
            let _ = match state.manager.cancel(&id, tg_id).await {
                Ok(_) => answer.await,
                Err(e) => answer.text(error_text(&e)).show_alert(true).await,
            };
            close_pressed_prompt(&bot, &q, &state, &id).await;
        }
    }

    Ok(())
}

/// Callback answer for a verify press. `None` is a silent acknowledgement:
/// the user already gets the outcome message and the prompt is closed.
fn verify_answer(result: &Result<ReconcileOutcome, PayError>) -> Option<(String, bool)> {
    let answer = match result {
        Ok(ReconcileOutcome::Settled) => return None,
        Ok(ReconcileOutcome::AlreadySettled) => "This payment was already credited.".to_string(),
        Ok(ReconcileOutcome::Pending) => {
            "Payment not confirmed yet! Wait a moment after paying and try again.".to_string()
        }
        Ok(ReconcileOutcome::Failed) => {
            "The gateway does not recognise this payment. Contact support if you paid.".to_string()
        }
        Ok(_) => "This request is no longer active.".to_string(),
        Err(e) => error_text(e),
    };
    Some((answer, true))
}

/// Closes the pressed message when the invoice has ended but the message is
/// not the prompt the lifecycle closes itself (e.g. a /pending copy).
async fn close_pressed_prompt(bot: &Bot, q: &CallbackQuery, state: &AppState, id: &InvoiceId) {
    let (Some(msg), Some(invoice)) = (&q.message, state.manager.get(id)) else {
        return;
    };
    if !invoice.status.is_terminal() {
        return;
    }
    let pressed = MessageRef {
        chat_id: msg.chat().id.0,
        message_id: msg.id().0,
    };
    if invoice.client_ref == Some(pressed) {
        return;
    }
    if let Err(e) = close_prompt(bot, pressed, &invoice).await {
        warn!("{:#}", e);
    }
}

async fn handle_pay(
    bot: &Bot,
    q: &CallbackQuery,
    state: &AppState,
    tg_id: i64,
    method: PaymentMethod,
    amount: Amount,
    context: &str,
) {
    let callback_id = q.id.clone();

    if context == "test" && tg_id != state.config.owner_id {
        let _ = bot
            .answer_callback_query(callback_id)
            .text("This option is not available.")
            .show_alert(true)
            .await;
        return;
    }

    // The gateway call can take seconds; stop the button spinner first.
    let _ = bot
        .answer_callback_query(callback_id)
        .text(format!("Generating {} invoice...", method.label()))
        .await;

    let chat_id = match &q.message {
        Some(msg) => msg.chat().id,
        None => ChatId(tg_id),
    };

    let created = match state.manager.create_invoice(tg_id, amount, context).await {
        Ok(created) => created,
        Err(e) => {
            info!("Invoice for user {} not created: {}", tg_id, e);
            let _ = bot
                .send_message(chat_id, format!("⚠️ {}", error_text(&e)))
                .await
                .map_err(|e| error!("Failed to report invoice error to {}: {}", tg_id, e));
            return;
        }
    };

    if let Some(msg) = &q.message {
        let _ = bot.delete_message(msg.chat().id, msg.id()).await;
    }

    let caption = invoice_caption(
        &created.invoice_id,
        created.amount,
        &created.pay_link,
        created.expires_at,
    );
    let sent = match bot
        .send_message(chat_id, caption)
        .parse_mode(ParseMode::Html)
        .reply_markup(invoice_keyboard(&created.invoice_id))
        .await
    {
        Ok(sent) => sent,
        Err(e) => {
            error!(
                "Failed to show invoice {} to user {}: {}",
                created.invoice_id, tg_id, e
            );
            return;
        }
    };

    let prompt = MessageRef {
        chat_id: sent.chat.id.0,
        message_id: sent.id.0,
    };
    if state
        .manager
        .attach_invoice_message(&created.invoice_id, prompt)
        .await
    {
        return;
    }
    // Ended while the prompt was being sent (webhook or sweep got there first).
    if let Some(invoice) = state.manager.get(&created.invoice_id) {
        if let Err(e) = close_prompt(bot, prompt, &invoice).await {
            warn!("{:#}", e);
        }
    }
}
