//! Inline button payloads.
//!
//! Telegram caps callback data at 64 bytes; every variant here stays well
//! below that for gateway ids of normal length.

use caramba_pay::models::{Amount, InvoiceId, PaymentMethod};

const PAY: &str = "upay:";
const VERIFY: &str = "uver:";
const CANCEL: &str = "ucan:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayCallback {
    Pay {
        method: PaymentMethod,
        amount: Amount,
        context: String,
    },
    Verify(InvoiceId),
    Cancel(InvoiceId),
}

impl PayCallback {
    pub fn encode(&self) -> String {
        match self {
            PayCallback::Pay {
                method,
                amount,
                context,
            } => format!("{}{}:{}:{}", PAY, method.as_str(), amount, context),
            PayCallback::Verify(id) => format!("{}{}", VERIFY, id),
            PayCallback::Cancel(id) => format!("{}{}", CANCEL, id),
        }
    }

    /// `None` for payloads that belong to other handlers or are malformed.
    pub fn decode(data: &str) -> Option<Self> {
        if let Some(rest) = data.strip_prefix(PAY) {
            let mut parts = rest.splitn(3, ':');
            let method = PaymentMethod::parse(parts.next()?)?;
            let amount = parts.next()?.parse().ok()?;
            let context = parts.next().filter(|c| !c.is_empty())?;
            return Some(PayCallback::Pay {
                method,
                amount,
                context: context.to_string(),
            });
        }
        if let Some(id) = data.strip_prefix(VERIFY).filter(|id| !id.is_empty()) {
            return Some(PayCallback::Verify(InvoiceId::new(id)));
        }
        if let Some(id) = data.strip_prefix(CANCEL).filter(|id| !id.is_empty()) {
            return Some(PayCallback::Cancel(InvoiceId::new(id)));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pay_payload() {
        let cb = PayCallback::Pay {
            method: PaymentMethod::Upi,
            amount: "99.50".parse().unwrap(),
            context: "extra_credits".into(),
        };
        assert_eq!(cb.encode(), "upay:upi:99.50:extra_credits");
        assert_eq!(PayCallback::decode("upay:upi:99.50:extra_credits"), Some(cb));
    }

    #[test]
    fn test_ids_keep_underscores_and_colons() {
        assert_eq!(
            PayCallback::decode("uver:PAY_12_ab"),
            Some(PayCallback::Verify(InvoiceId::new("PAY_12_ab")))
        );
        assert_eq!(
            PayCallback::decode("ucan:a:b"),
            Some(PayCallback::Cancel(InvoiceId::new("a:b")))
        );
    }

    #[test]
    fn test_rejects_malformed() {
        assert_eq!(PayCallback::decode("upay:card:69:grow"), None);
        assert_eq!(PayCallback::decode("upay:upi:-5:grow"), None);
        assert_eq!(PayCallback::decode("upay:upi:69:"), None);
        assert_eq!(PayCallback::decode("upay:upi:69"), None);
        assert_eq!(PayCallback::decode("uver:"), None);
        assert_eq!(PayCallback::decode("set_lang_en"), None);
    }
}
