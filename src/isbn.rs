//! ISBN checksum validation for ISBN list imports.
//!
//! Hyphens and spaces are stripped before validation, so both
//! "978-0-441-01359-3" and "9780441013593" are accepted.

/// Strip the separators commonly found in hand-typed ISBNs
pub fn normalize(input: &str) -> String {
    input
        .trim()
        .chars()
        .filter(|c| *c != '-' && !c.is_whitespace())
        .collect()
}

/// Validate an ISBN-13 checksum (weights alternate 1 and 3, mod 10)
pub fn is_valid_isbn13(input: &str) -> bool {
    let isbn = normalize(input);
    if isbn.len() != 13 || !isbn.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let sum: u32 = isbn
        .bytes()
        .enumerate()
        .map(|(i, b)| {
            let digit = (b - b'0') as u32;
            if i % 2 == 0 {
                digit
            } else {
                digit * 3
            }
        })
        .sum();
    sum % 10 == 0
}

/// Validate an ISBN-10 checksum (descending weights 10..1, mod 11,
/// 'X' allowed as the final check digit)
pub fn is_valid_isbn10(input: &str) -> bool {
    let isbn = normalize(input);
    if isbn.len() != 10 {
        return false;
    }
    let mut sum: u32 = 0;
    for (i, b) in isbn.bytes().enumerate() {
        let digit = if b.is_ascii_digit() {
            (b - b'0') as u32
        } else if (b == b'X' || b == b'x') && i == 9 {
            10
        } else {
            return false;
        };
        sum += digit * (10 - i as u32);
    }
    sum % 11 == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_isbn13() {
        assert!(is_valid_isbn13("9780441013593"));
        assert!(is_valid_isbn13("978-0-441-01359-3"));
        assert!(is_valid_isbn13("9782841720538"));
    }

    #[test]
    fn invalid_isbn13() {
        assert!(!is_valid_isbn13("9780441013594")); // bad check digit
        assert!(!is_valid_isbn13("978044101359")); // too short
        assert!(!is_valid_isbn13("97804410135X3")); // non-digit
        assert!(!is_valid_isbn13(""));
    }

    #[test]
    fn valid_isbn10() {
        assert!(is_valid_isbn10("0441013597"));
        assert!(is_valid_isbn10("0-441-01359-7"));
        // 'X' check digit
        assert!(is_valid_isbn10("080442957X"));
        assert!(is_valid_isbn10("080442957x"));
    }

    #[test]
    fn invalid_isbn10() {
        assert!(!is_valid_isbn10("0441013598")); // bad check digit
        assert!(!is_valid_isbn10("044101359")); // too short
        assert!(!is_valid_isbn10("04410X3597")); // 'X' not in last position
        assert!(!is_valid_isbn10(""));
    }
}
