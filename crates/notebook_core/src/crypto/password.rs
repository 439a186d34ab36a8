//! Password strength scoring.
//!
//! Scores length tiers and character classes, then penalizes well-known
//! weak passwords and runs of repeated characters.

use serde::Serialize;

pub const MIN_PASSWORD_CHARS: usize = 8;

const COMMON_WEAK_PASSWORDS: &[&str] = &[
    "password",
    "123456",
    "123456789",
    "qwerty",
    "abc123",
    "password123",
    "admin",
    "root",
    "user",
    "guest",
    "12345678",
    "1234567890",
    "qwerty123",
    "password1",
    "123123",
    "111111",
    "000000",
    "1qaz2wsx",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StrengthLevel {
    Weak,
    Fair,
    Good,
    Strong,
}

/// Strength verdict with human-readable improvement hints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PasswordStrength {
    pub level: StrengthLevel,
    pub suggestions: Vec<String>,
}

pub fn check_password_strength(password: &str) -> PasswordStrength {
    let length = password.chars().count();
    if length < MIN_PASSWORD_CHARS {
        return PasswordStrength {
            level: StrengthLevel::Weak,
            suggestions: vec![format!(
                "use at least {MIN_PASSWORD_CHARS} characters"
            )],
        };
    }

    let mut score: i32 = [8, 12, 16].iter().filter(|tier| length >= **tier).count() as i32;
    let mut suggestions = Vec::new();

    let has_lower = password.chars().any(|ch| ch.is_ascii_lowercase());
    let has_upper = password.chars().any(|ch| ch.is_ascii_uppercase());
    let has_digit = password.chars().any(|ch| ch.is_ascii_digit());
    let has_other = password.chars().any(|ch| !ch.is_ascii_alphanumeric());

    for (present, hint) in [
        (has_lower, "add lowercase letters"),
        (has_upper, "add uppercase letters"),
        (has_digit, "add digits"),
        (has_other, "add symbols such as !@#$%^&*"),
    ] {
        if present {
            score += 1;
        } else {
            suggestions.push(hint.to_string());
        }
    }

    let lowered = password.to_lowercase();
    if COMMON_WEAK_PASSWORDS.contains(&lowered.as_str()) {
        suggestions.push("avoid commonly used passwords".to_string());
        score -= 2;
    }
    if has_repeated_run(password, 3) {
        suggestions.push("avoid runs of repeated characters".to_string());
        score -= 1;
    }

    let all_classes = has_lower && has_upper && has_digit && has_other;
    let level = match score {
        s if s <= 2 => StrengthLevel::Weak,
        s if s <= 4 || !all_classes => StrengthLevel::Fair,
        s if s <= 6 => StrengthLevel::Good,
        _ => StrengthLevel::Strong,
    };

    PasswordStrength { level, suggestions }
}

fn has_repeated_run(value: &str, run: usize) -> bool {
    let mut previous = None;
    let mut count = 0;
    for ch in value.chars() {
        if Some(ch) == previous {
            count += 1;
        } else {
            previous = Some(ch);
            count = 1;
        }
        if count >= run {
            return true;
        }
    }
    false
}
