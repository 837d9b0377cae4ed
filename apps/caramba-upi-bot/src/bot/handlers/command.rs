use crate::bot::handlers::invoice_caption;
use crate::bot::keyboards::{invoice_keyboard, make_amount_keyboard};
use crate::AppState;
use caramba_pay::models::MessageRef;
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use tracing::{error, info};

pub async fn message_handler(
    bot: Bot,
    msg: Message,
    state: AppState,
) -> Result<(), teloxide::RequestError> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    info!("Received message: {:?}", text);
    let tg_id = msg.chat.id.0 as i64;

    // "/topup@SomeBot" in groups
    let command = text.split_whitespace().next().unwrap_or_default();
    let command = command.split('@').next().unwrap_or_default();

    match command {
        "/start" | "/topup" => {
            let is_admin = tg_id == state.config.owner_id;
            let _ = bot
                .send_message(
                    msg.chat.id,
                    "💳 <b>Top up with UPI</b>\n\nPick a plan or a credit pack. \
                     You will get a payment link valid for a few minutes.",
                )
                .parse_mode(ParseMode::Html)
                .reply_markup(make_amount_keyboard(is_admin))
                .await
                .map_err(|e| error!("Failed to send top-up menu: {}", e));
        }
        "/pending" => match state.manager.active_for_user(tg_id) {
            Some(invoice) => {
                let caption = invoice_caption(
                    &invoice.id,
                    invoice.amount,
                    &invoice.external_ref.pay_link,
                    invoice.expires_at,
                );
                match bot
                    .send_message(msg.chat.id, caption)
                    .parse_mode(ParseMode::Html)
                    .reply_markup(invoice_keyboard(&invoice.id))
                    .await
                {
                    // The newest copy is the one closed when the invoice ends.
                    Ok(sent) => {
                        let prompt = MessageRef {
                            chat_id: sent.chat.id.0,
                            message_id: sent.id.0,
                        };
                        state.manager.attach_invoice_message(&invoice.id, prompt).await;
                    }
                    Err(e) => error!("Failed to resend invoice {}: {}", invoice.id, e),
                }
            }
            None => {
                let _ = bot
                    .send_message(msg.chat.id, "You have no pending payments. Use /topup to start one.")
                    .await;
            }
        },
        _ => {}
    }

    Ok(())
}
