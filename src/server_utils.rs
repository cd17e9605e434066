use rand::Rng;

use crate::constants::{MAX_NAME_LEN, ROOM_CODE_ALPHABET, ROOM_CODE_LEN};

pub fn sanitize_name(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return "Player".to_string();
    }
    trimmed.chars().take(MAX_NAME_LEN).collect()
}

pub fn normalize_room_code(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

pub fn is_valid_room_code(code: &str) -> bool {
    code.len() == ROOM_CODE_LEN && code.bytes().all(|b| ROOM_CODE_ALPHABET.contains(&b))
}

pub fn generate_room_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..ROOM_CODE_LEN)
        .map(|_| char::from(ROOM_CODE_ALPHABET[rng.random_range(0..ROOM_CODE_ALPHABET.len())]))
        .collect()
}

/// Draws codes until one is not taken.
pub fn generate_unique_room_code<R: Rng + ?Sized>(
    rng: &mut R,
    is_taken: impl Fn(&str) -> bool,
) -> String {
    loop {
        let code = generate_room_code(rng);
        if !is_taken(&code) {
            return code;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn sanitize_name_applies_trim_empty_and_max_len() {
        assert_eq!(sanitize_name(""), "Player");
        assert_eq!(sanitize_name("   "), "Player");
        assert_eq!(sanitize_name(" Alice "), "Alice");
        assert_eq!(sanitize_name("12345678901234567890"), "1234567890123456");
    }

    #[test]
    fn room_codes_are_normalized_before_validation() {
        assert_eq!(normalize_room_code(" abcde "), "ABCDE");
        assert!(is_valid_room_code("ABCDE"));
        assert!(is_valid_room_code("XY234"));
        assert!(!is_valid_room_code("ABCD"));
        assert!(!is_valid_room_code("ABCDEF"));
        assert!(!is_valid_room_code("ABCD0"));
        assert!(!is_valid_room_code("abcde"));
    }

    #[test]
    fn generated_codes_are_valid() {
        let mut rng = StdRng::seed_from_u64(17);
        for _ in 0..200 {
            assert!(is_valid_room_code(&generate_room_code(&mut rng)));
        }
    }

    #[test]
    fn unique_code_skips_taken_codes() {
        let mut rng = StdRng::seed_from_u64(5);
        let attempts = Cell::new(0);
        let code = generate_unique_room_code(&mut rng, |_| {
            attempts.set(attempts.get() + 1);
            attempts.get() <= 3
        });
        assert_eq!(attempts.get(), 4);
        assert!(is_valid_room_code(&code));
    }
}
