//! UUID utilities

use uuid::Uuid;

/// Generate a new UUIDv4
pub fn generate() -> Uuid {
    Uuid::new_v4()
}

/// Generate a new record id: hyphenated lowercase UUIDv4 (36 characters)
pub fn generate_id() -> String {
    generate().hyphenated().to_string()
}

/// Check the fixed v4 layout: dashes at 9/14/19/24 (1-based), version nibble `4`,
/// variant nibble in `{8, 9, a, b}`, lowercase hex elsewhere
pub fn is_v4_shape(s: &str) -> bool {
    let bytes = s.as_bytes();
    if bytes.len() != 36 {
        return false;
    }
    bytes.iter().enumerate().all(|(i, &b)| match i {
        8 | 13 | 18 | 23 => b == b'-',
        14 => b == b'4',
        19 => matches!(b, b'8' | b'9' | b'a' | b'b'),
        _ => b.is_ascii_digit() || (b'a'..=b'f').contains(&b),
    })
}
