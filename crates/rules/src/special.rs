use std::sync::OnceLock;

use abgleich_core::{BankTransaction, ExternalLink, MatchField};
use regex::Regex;

use crate::classify::extract_match_text;

// ── Fixed vendor patterns ────────────────────────────────────────────────────

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

re!(re_marketplace,
    r"(?i)\b(?:amazon|amzn(?:\s*mktp)?)\b");
re!(re_order_id,
    r"\b(\d{3}-\d{7}-\d{7})\b");
re!(re_processor,
    r"(?i)\bpaypal\b");

const ORDER_URL: &str = "https://www.amazon.de/gp/css/order-details?orderID=";
const ORDER_HISTORY_URL: &str = "https://www.amazon.de/gp/css/order-history";
const PROCESSOR_ACTIVITY_URL: &str = "https://www.paypal.com/myaccount/transactions";

/// Test the combined payee+memo text against the fixed marketplace and
/// payment-processor pattern families. Both checks run independently; a
/// transaction may produce zero, one, or two links. A marketplace hit with
/// an extractable order id links to that specific order, else to the
/// generic order history.
pub fn detect_special_links(tx: &BankTransaction) -> Vec<ExternalLink> {
    let text = extract_match_text(tx, MatchField::Combined);
    let mut links = Vec::new();

    if re_marketplace().is_match(&text) {
        match re_order_id().captures(&text).and_then(|c| c.get(1)) {
            Some(order_id) => links.push(ExternalLink {
                label: format!("Amazon order {}", order_id.as_str()),
                url: format!("{ORDER_URL}{}", order_id.as_str()),
            }),
            None => links.push(ExternalLink {
                label: "Amazon order history".to_string(),
                url: ORDER_HISTORY_URL.to_string(),
            }),
        }
    }

    if re_processor().is_match(&text) {
        links.push(ExternalLink {
            label: "PayPal activity".to_string(),
            url: PROCESSOR_ACTIVITY_URL.to_string(),
        });
    }

    links
}
