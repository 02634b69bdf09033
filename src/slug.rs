//! Filesystem-safe names derived from product titles.

use once_cell::sync::Lazy;
use regex::Regex;

static UNSAFE_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[\\/*?:"<>|]"#).unwrap());
static SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s,]+").unwrap());
static UNDERSCORES: Lazy<Regex> = Lazy::new(|| Regex::new(r"_+").unwrap());

/// Latin spelling of a Cyrillic letter, `None` for anything else.
fn latin(ch: char) -> Option<&'static str> {
    let mapped = match ch.to_lowercase().next().unwrap_or(ch) {
        'а' => "a",
        'б' => "b",
        'в' => "v",
        'г' => "g",
        'д' => "d",
        'е' | 'ё' => "e",
        'ж' => "zh",
        'з' => "z",
        'и' => "i",
        'й' => "y",
        'к' => "k",
        'л' => "l",
        'м' => "m",
        'н' => "n",
        'о' => "o",
        'п' => "p",
        'р' => "r",
        'с' => "s",
        'т' => "t",
        'у' => "u",
        'ф' => "f",
        'х' => "h",
        'ц' => "ts",
        'ч' => "ch",
        'ш' => "sh",
        'щ' => "sch",
        'ъ' | 'ь' => "",
        'ы' => "y",
        'э' => "e",
        'ю' => "yu",
        'я' => "ya",
        _ => return None,
    };
    Some(mapped)
}

pub fn transliterate(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match latin(ch) {
            Some(mapped) => out.push_str(mapped),
            None => out.push(ch),
        }
    }
    out
}

/// Turns arbitrary text into a lowercase, transliterated slug joined by
/// underscores. Never fails; applying it to its own output is a no-op.
pub fn slugify(text: &str) -> String {
    let latin = transliterate(text);
    let safe = UNSAFE_CHARS.replace_all(&latin, "");
    let joined = SEPARATORS.replace_all(&safe, "_");
    let single = UNDERSCORES.replace_all(&joined, "_");
    single.to_lowercase().trim_matches('_').to_string()
}
