//! Card number generation and masking

use rand::Rng;

const PAN_LENGTH: usize = 16;
const ISSUER_PREFIX: &str = "4";

/// Luhn check digit for a digit string that lacks one
fn luhn_check_digit(payload: &[u8]) -> u8 {
    let sum: u32 = payload
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            let d = d as u32;
            if i % 2 == 0 {
                let doubled = d * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                d
            }
        })
        .sum();
    ((10 - (sum % 10)) % 10) as u8
}

/// Whether `pan` is all digits and passes the Luhn check
pub(crate) fn is_luhn_valid(pan: &str) -> bool {
    let digits: Option<Vec<u8>> = pan
        .chars()
        .map(|c| c.to_digit(10).map(|d| d as u8))
        .collect();

    match digits {
        Some(digits) if digits.len() > 1 => {
            let (payload, check) = digits.split_at(digits.len() - 1);
            luhn_check_digit(payload) == check[0]
        }
        _ => false,
    }
}

/// Random 16 digit PAN with a valid check digit
pub fn generate_pan<R: Rng + ?Sized>(rng: &mut R) -> String {
    let mut digits: Vec<u8> = ISSUER_PREFIX
        .chars()
        .filter_map(|c| c.to_digit(10).map(|d| d as u8))
        .collect();

    while digits.len() < PAN_LENGTH - 1 {
        digits.push(rng.gen_range(0..10));
    }
    digits.push(luhn_check_digit(&digits));

    digits.iter().map(|d| char::from(b'0' + d)).collect()
}

/// `XXXX XXXX XXXX 1234`
pub fn mask_pan(pan: &str) -> String {
    let digits: String = pan.chars().filter(|c| c.is_ascii_digit()).collect();
    let start = digits.len().saturating_sub(4);
    format!("XXXX XXXX XXXX {}", &digits[start..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_luhn_numbers() {
        assert!(is_luhn_valid("4111111111111111"));
        assert!(is_luhn_valid("79927398713"));
        assert!(!is_luhn_valid("4111111111111112"));
        assert!(!is_luhn_valid("4111-1111"));
        assert!(!is_luhn_valid(""));
    }

    #[test]
    fn test_generated_pans_are_valid() {
        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            let pan = generate_pan(&mut rng);
            assert_eq!(pan.len(), 16);
            assert!(pan.starts_with('4'));
            assert!(is_luhn_valid(&pan), "{} fails Luhn", pan);
        }
    }

    #[test]
    fn test_mask_keeps_last_four() {
        assert_eq!(mask_pan("4111111111111234"), "XXXX XXXX XXXX 1234");
        assert_eq!(mask_pan("4111 1111 1111 9876"), "XXXX XXXX XXXX 9876");
    }
}
