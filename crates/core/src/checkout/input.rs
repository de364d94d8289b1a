//! Keystroke-level input filters for the checkout forms.

/// Longest card number accepted, in digits.
pub const CARD_DIGITS: usize = 16;
const MAX_CVV_DIGITS: usize = 4;
const MAX_POSTAL_CODE_DIGITS: usize = 8;
const MAX_PHONE_WITH_PREFIX: usize = 15;
const MAX_PHONE_WITHOUT_PREFIX: usize = 11;

/// ASCII digits of `input`, in order.
#[must_use]
pub fn digits(input: &str) -> String {
    input.chars().filter(char::is_ascii_digit).collect()
}

/// Group card digits in blocks of four.
///
/// Input with more than 16 digits is refused and `previous` is kept.
#[must_use]
pub fn format_card_number(input: &str, previous: &str) -> String {
    let numbers = digits(input);
    if numbers.len() > CARD_DIGITS {
        return previous.to_owned();
    }

    let mut grouped = String::with_capacity(numbers.len() + numbers.len() / 4);
    for (i, ch) in numbers.chars().enumerate() {
        if i > 0 && i % 4 == 0 {
            grouped.push(' ');
        }
        grouped.push(ch);
    }
    grouped
}

/// Hide all but the last four digits (`**** **** **** 1111`).
#[must_use]
pub fn mask_card_number(card_number: &str) -> String {
    let numbers = digits(card_number);
    let last_four: String = numbers
        .chars()
        .skip(numbers.len().saturating_sub(4))
        .collect();
    format!("**** **** **** {last_four}")
}

/// Digits only, at most four.
#[must_use]
pub fn filter_cvv(input: &str) -> String {
    digits(input).chars().take(MAX_CVV_DIGITS).collect()
}

/// Digits only, at most eight.
#[must_use]
pub fn filter_postal_code(input: &str) -> String {
    digits(input).chars().take(MAX_POSTAL_CODE_DIGITS).collect()
}

/// Normalise a phone number as it is typed.
///
/// Non-digits are stripped except a single leading `+`. A leading `+` must be
/// followed by `country_prefix`; anything else is reset to the prefix.
///
/// ```
/// use cartflow_core::checkout::format_phone;
///
/// assert_eq!(format_phone("11 1234-5678", "+54"), "1112345678");
/// assert_eq!(format_phone("+54 9 11 1234-5678", "+54"), "+5491112345678");
/// assert_eq!(format_phone("+1 555", "+54"), "+54");
/// ```
#[must_use]
pub fn format_phone(input: &str, country_prefix: &str) -> String {
    let trimmed = input.trim_start();
    let numbers = digits(trimmed);

    if trimmed.starts_with('+') {
        let cleaned = format!("+{numbers}");
        let cleaned = if cleaned.len() > 1 && !cleaned.starts_with(country_prefix) {
            country_prefix.to_owned()
        } else {
            cleaned
        };
        cleaned.chars().take(MAX_PHONE_WITH_PREFIX).collect()
    } else {
        numbers.chars().take(MAX_PHONE_WITHOUT_PREFIX).collect()
    }
}
