//! Price display formatting.

/// Shown in place of a missing price.
pub const CONTACT_FOR_PRICE: &str = "Liên hệ";

/// Format a raw price as Vietnamese dong with `.` thousands separators.
///
/// Non-digits are stripped first; input with no digits at all is returned as is.
pub fn format_price(raw: &str) -> String {
    if raw.trim().is_empty() {
        return CONTACT_FOR_PRICE.to_string();
    }

    let all: Vec<char> = raw.chars().filter(char::is_ascii_digit).collect();
    if all.is_empty() {
        return raw.to_string();
    }
    let start = all.iter().position(|&c| c != '0').unwrap_or(all.len() - 1);
    let digits = &all[start..];

    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 2);
    for (i, c) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('.');
        }
        out.push(*c);
    }
    out.push('đ');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_price() {
        assert_eq!(format_price("150000"), "150.000đ");
        assert_eq!(format_price("1500000"), "1.500.000đ");
        assert_eq!(format_price("999"), "999đ");
        assert_eq!(format_price("150,000 VND"), "150.000đ");
        assert_eq!(format_price("0150000"), "150.000đ");
        assert_eq!(format_price("000"), "0đ");
    }

    #[test]
    fn test_format_price_without_digits() {
        assert_eq!(format_price(""), CONTACT_FOR_PRICE);
        assert_eq!(format_price("   "), CONTACT_FOR_PRICE);
        assert_eq!(format_price("Thỏa thuận"), "Thỏa thuận");
    }
}
