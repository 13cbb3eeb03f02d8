// src/parse.rs
//! Response parser: best-effort extraction of price, platform and deep link
//! from free-form text returned by the generation service.
//!
//! Everything here is pure and panic-free on arbitrary input. Absence is
//! always `None` — callers must never see a zero price or a placeholder
//! platform standing in for "not found".

use once_cell::sync::Lazy;
use regex::Regex;

/// Accepted price range in INR. Numbers outside this band are treated as
/// noise (dates, percentages, phone fragments) and discarded.
pub const PRICE_MIN: f64 = 10.0;
pub const PRICE_MAX: f64 = 1_000_000.0;

/// Known retailers, in priority order. The first one mentioned in a
/// response wins the platform slot.
pub const PLATFORMS: [&str; 14] = [
    "Flipkart",
    "Amazon",
    "Myntra",
    "Nykaa",
    "Ajio",
    "Blinkit",
    "Mamaearth",
    "Shopsy",
    "Snapdeal",
    "Paytm",
    "Meesho",
    "BigBasket",
    "Tata CLiQ",
    "Reliance Digital",
];

// Ordered most-specific-first. Each rule names its amount group `price` so
// the scan below stays uniform regardless of surrounding captures.
static PRICE_RULES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // ₹1,299.00 and friends
        r"₹\s*(?P<price>\d+(?:,\d{3})*(?:\.\d{2})?)",
        // "Flipkart: ₹999"
        r"(?i)(?:flipkart|amazon|myntra|nykaa|ajio|blinkit|mamaearth|shopsy)\s*:?\s*₹\s*(?P<price>\d+(?:,\d{3})*)",
        // "₹999 on Flipkart"
        r"(?i)₹\s*(?P<price>\d+(?:,\d{3})*)\s*(?:on|at)\s+(?:flipkart|amazon|myntra|nykaa|ajio|blinkit|mamaearth|shopsy)",
        r"(?i)lowest\s*price\s*₹\s*(?P<price>\d+(?:,\d{3})*)",
        r"(?i)best\s*price\s*₹\s*(?P<price>\d+(?:,\d{3})*)",
        r"(?i)rs\.?\s*(?P<price>\d+(?:,\d{3})*(?:\.\d{2})?)",
        r"(?i)inr\s*(?P<price>\d+(?:,\d{3})*(?:\.\d{2})?)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("price rule regex"))
    .collect()
});

// Fallback rule: bare 3-6 digit numbers, accepted only when the text talks
// about money at all (the regex crate has no lookahead, so the currency
// hint is a separate gate). The context classes keep comma-group fragments
// like the "099" in "1,099" from registering as their own price.
static BARE_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[^\d,.])(?P<price>\d{3,6})(?:[^\d,.]|$)").expect("bare number regex")
});
static CURRENCY_HINT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)rupees?|₹|price").expect("currency hint regex"));

// Retailer-scoped URL patterns, then a generic product-path catch-all.
static URL_RULES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)https?://(?:www\.)?flipkart\.com\S*",
        r"(?i)https?://dl\.flipkart\.com\S*",
        r"(?i)https?://(?:www\.)?amazon\.in\S*",
        r"(?i)https?://amzn\.to\S*",
        r"(?i)https?://(?:www\.)?myntra\.com\S*",
        r"(?i)https?://(?:www\.)?ajio\.com\S*",
        r"(?i)https?://(?:www\.)?nykaa\.com\S*",
        r"(?i)https?://(?:www\.)?mamaearth\.in\S*",
        r"(?i)https?://(?:www\.)?blinkit\.com\S*",
        r"(?i)https?://(?:www\.)?bigbasket\.com\S*",
        r"(?i)https?://(?:www\.)?grofers\.com\S*",
        r"(?i)https?://(?:www\.)?jiomart\.com\S*",
        r"(?i)https?://(?:www\.)?shopsy\.in\S*",
        r"(?i)https?://(?:www\.)?snapdeal\.com\S*",
        r"(?i)https?://(?:www\.)?paytmmall\.com\S*",
        r"(?i)https?://(?:www\.)?meesho\.com\S*",
        r"(?i)https?://(?:www\.)?tatacliq\.com\S*",
        r"(?i)https?://(?:www\.)?reliancedigital\.in\S*",
        r"(?i)https?://(?:www\.)?croma\.com\S*",
        r"(?i)https?://[a-z0-9.-]+\.[a-z]{2,}\S*(?:product|item|buy|shop|deal)\S*",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("url rule regex"))
    .collect()
});

/// Domains that are always accepted as e-commerce deep links.
const VALID_DOMAINS: [&str; 19] = [
    "flipkart.com",
    "dl.flipkart.com",
    "amazon.in",
    "amzn.to",
    "myntra.com",
    "ajio.com",
    "nykaa.com",
    "mamaearth.in",
    "blinkit.com",
    "bigbasket.com",
    "grofers.com",
    "jiomart.com",
    "shopsy.in",
    "snapdeal.com",
    "paytmmall.com",
    "meesho.com",
    "tatacliq.com",
    "reliancedigital.in",
    "croma.com",
];

static PRODUCTISH_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:product|item|buy|shop|deal)\b|/p-|/dp/").expect("path heuristic regex")
});
static URL_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^https?://[a-z0-9.-]+\.[a-z]{2,}/.+").expect("url shape regex"));

static TRACKING_PARAMS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)[?&](?:utm_[^&#\s]*|ref[^&#\s]*|tag[^&#\s]*|campaign[^&#\s]*|source[^&#\s]*|medium[^&#\s]*)",
        r"(?i)[?&](?:gclid[^&#\s]*|fbclid[^&#\s]*|msclkid[^&#\s]*)",
        r"(?i)[?&](?:pid[^&#\s]*|affid[^&#\s]*|pf_rd_[^&#\s]*)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("tracking param regex"))
    .collect()
});

/// Extract the lowest plausible price mentioned in `text`.
///
/// All rules run over the whole input and every candidate inside the
/// plausibility band competes; the minimum wins. This mirrors the product
/// goal ("find the lowest price"), not merely the first number seen.
pub fn extract_price(text: &str) -> Option<f64> {
    if text.trim().is_empty() {
        return None;
    }

    let mut lowest: Option<f64> = None;
    let mut consider = |raw: &str| {
        let cleaned = raw.replace(',', "");
        if let Ok(price) = cleaned.parse::<f64>() {
            if is_plausible_price(price) && lowest.map_or(true, |cur| price < cur) {
                lowest = Some(price);
            }
        }
    };

    for rule in PRICE_RULES.iter() {
        for caps in rule.captures_iter(text) {
            if let Some(m) = caps.name("price") {
                consider(m.as_str());
            }
        }
    }

    // Bare numbers only count when the text mentions money somewhere.
    if CURRENCY_HINT.is_match(text) {
        for caps in BARE_NUMBER.captures_iter(text) {
            if let Some(m) = caps.name("price") {
                consider(m.as_str());
            }
        }
    }

    lowest
}

pub fn is_plausible_price(price: f64) -> bool {
    (PRICE_MIN..=PRICE_MAX).contains(&price)
}

/// First known retailer mentioned in `text`, by priority order.
pub fn extract_platform(text: &str) -> Option<&'static str> {
    if text.trim().is_empty() {
        return None;
    }
    let lower = text.to_lowercase();
    PLATFORMS
        .iter()
        .find(|p| lower.contains(&p.to_lowercase()))
        .copied()
}

/// Extract the first valid e-commerce deep link from `text`, cleaned of
/// tracking parameters and trailing punctuation.
pub fn extract_deep_link(text: &str) -> Option<String> {
    if text.trim().is_empty() {
        return None;
    }

    for rule in URL_RULES.iter() {
        if let Some(m) = rule.find(text) {
            let url = trim_trailing_punct(m.as_str().trim());
            if is_valid_ecommerce_url(url) {
                return Some(clean_url(url));
            }
            tracing::debug!(url, "rejected non-ecommerce url candidate");
        }
    }
    None
}

/// A deep link is accepted when it points at a known retailer domain, or
/// failing that, has a generic URL shape with a product-looking path.
pub fn is_valid_ecommerce_url(url: &str) -> bool {
    if url.len() < 15 {
        return false;
    }
    let lower = url.to_lowercase();
    if VALID_DOMAINS.iter().any(|d| lower.contains(d)) {
        return true;
    }
    PRODUCTISH_PATH.is_match(&lower) && URL_SHAPE.is_match(&lower)
}

fn trim_trailing_punct(url: &str) -> &str {
    url.trim_end_matches(['.', ',', '!', '?', ';', ':', ')', ']'])
}

/// Strip tracking query parameters and re-normalize the separators left
/// behind by the removal.
pub fn clean_url(url: &str) -> String {
    let mut out = url.trim().to_string();
    for rule in TRACKING_PARAMS.iter() {
        out = rule.replace_all(&out, "").into_owned();
    }
    // A removed leading param can leave "?&rest", doubled "&&", or a
    // surviving parameter introduced by "&" with no "?" left in front.
    out = out.replace("?&", "?");
    while out.contains("&&") {
        out = out.replace("&&", "&");
    }
    if !out.contains('?') {
        if let Some(idx) = out.find('&') {
            out.replace_range(idx..idx + 1, "?");
        }
    }
    while out.ends_with('?') || out.ends_with('&') {
        out.pop();
    }
    out
}
