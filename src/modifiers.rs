//! Post-processing text transforms applied to fully expanded references.
//!
//! A modifier is applied by appending its name to a symbol key after a
//! period: `{animal.capitalize}`, `Hundreds of {animal.s}`. Modifiers are
//! applied in order, after the tag is fully expanded.

use rand::Rng;

use crate::utils::{GrammarError, Result};

/// The fixed set of built-in English modifiers, resolved by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    /// `capitalize` — uppercase the first character.
    Capitalize,
    /// `capitalizeAll` — uppercase every character.
    CapitalizeAll,
    /// `s` — naive English pluralization.
    Pluralize,
    /// `ed` — naive English past tense.
    PastTense,
    /// `a` — prefix with the indefinite article.
    Article,
    /// `optional(chance)` — keep the text with the given percentage chance
    /// (default 50), otherwise produce the empty string.
    Optional,
}

impl Modifier {
    /// Look up a modifier by its grammar-visible name.
    pub fn from_name(name: &str) -> Result<Modifier> {
        match name {
            "capitalize" => Ok(Modifier::Capitalize),
            "capitalizeAll" => Ok(Modifier::CapitalizeAll),
            "s" => Ok(Modifier::Pluralize),
            "ed" => Ok(Modifier::PastTense),
            "a" => Ok(Modifier::Article),
            "optional" => Ok(Modifier::Optional),
            _ => Err(GrammarError::ModifierNotFound(name.to_string())),
        }
    }

    /// Apply this modifier to `text`.
    ///
    /// The engine hands over non-empty text, except when an earlier
    /// modifier in the chain has already emptied it; empty input passes
    /// through unchanged.
    pub fn apply<R: Rng>(&self, rng: &mut R, text: &str, args: &[&str]) -> Result<String> {
        if text.is_empty() {
            return Ok(String::new());
        }

        match self {
            Modifier::Capitalize => Ok(capitalize(text)),
            Modifier::CapitalizeAll => Ok(text.to_uppercase()),
            Modifier::Pluralize => Ok(pluralize(text)),
            Modifier::PastTense => Ok(past_tense(text)),
            Modifier::Article => Ok(article(text)),
            Modifier::Optional => {
                let chance: u32 = match args.first() {
                    Some(arg) => arg.trim().parse().map_err(|_| {
                        GrammarError::Syntax(format!(
                            "invalid argument \"{}\" for modifier optional",
                            arg
                        ))
                    })?,
                    None => 50,
                };

                if rng.gen_range(0..100) < chance {
                    Ok(text.to_string())
                } else {
                    Ok(String::new())
                }
            }
        }
    }
}

fn is_vowel(c: char) -> bool {
    matches!(c, 'a' | 'e' | 'i' | 'o' | 'u' | 'A' | 'E' | 'I' | 'O' | 'U')
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn pluralize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next_back() {
        Some('s') | Some('h') | Some('x') => format!("{}es", text),
        Some('y') => match chars.next_back() {
            Some(prev) if !is_vowel(prev) => format!("{}ies", &text[..text.len() - 1]),
            _ => format!("{}s", text),
        },
        _ => format!("{}s", text),
    }
}

fn past_tense(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next_back() {
        Some('e') => format!("{}d", text),
        Some('y') => match chars.next_back() {
            Some(prev) if !is_vowel(prev) => format!("{}ied", &text[..text.len() - 1]),
            _ => format!("{}ed", text),
        },
        _ => format!("{}ed", text),
    }
}

fn article(text: &str) -> String {
    match text.chars().next() {
        Some(first) if is_vowel(first) => format!("an {}", text),
        _ => format!("a {}", text),
    }
}
