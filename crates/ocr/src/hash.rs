use flyerscan_core::Price;
use sha2::{Digest, Sha256};

use crate::normalize::normalize;

/// Compute SHA-256 of an in-memory byte slice.
pub fn sha256_bytes(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Encode a raw 32-byte hash as a lowercase hex string (64 chars).
pub fn to_hex(hash: &[u8; 32]) -> String {
    hash.iter().map(|b| format!("{b:02x}")).collect()
}

/// Stable key for a text unit. Whitespace and dash variants that the
/// normalizer folds away do not change the key.
pub fn unit_key(text: &str) -> String {
    to_hex(&sha256_bytes(normalize(text).as_bytes()))
}

/// Stable key for an offer: `store|name|price`, name case-folded and price
/// written as plain dollars (`2.99`, empty when there is none).
pub fn offer_key(store: &str, item_name: &str, price: Option<Price>) -> String {
    let name = item_name.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
    let price = price.map(|p| format!("{:.2}", p.round_cents().amount())).unwrap_or_default();
    let material = format!("{}|{}|{}", store.to_lowercase(), name, price);
    to_hex(&sha256_bytes(material.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_bytes_known_vector() {
        // SHA-256 of empty bytes is a known constant.
        assert_eq!(
            to_hex(&sha256_bytes(b"")),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn unit_key_ignores_layout_noise() {
        let a = unit_key("Canned Soup\n2/$5.00");
        let b = unit_key("  Canned\u{a0}Soup  \n\n\n2/$5.00\n");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, unit_key("Canned Soup\n2/$6.00"));
    }

    #[test]
    fn offer_key_folds_case_and_spacing() {
        let price = Price::from_cents(299);
        let a = offer_key("wegmans", "Boneless Chicken Breast", Some(price));
        let b = offer_key("Wegmans", "boneless  chicken breast", Some(price));
        assert_eq!(a, b);
        assert_ne!(a, offer_key("shaws", "Boneless Chicken Breast", Some(price)));
        assert_ne!(a, offer_key("wegmans", "Boneless Chicken Breast", None));
    }

    #[test]
    fn offer_key_uses_cent_precision() {
        let per_unit = Price::per_unit(Price::from_cents(500), 3).unwrap();
        assert_eq!(
            offer_key("aldi", "Canned Soup", Some(per_unit)),
            offer_key("aldi", "Canned Soup", Some(Price::from_cents(167)))
        );
    }
}
