//! Slug and text normalization helpers shared by the classifier and the assembler.

use unicode_normalization::UnicodeNormalization;

/// Resource-name slug: dots and any other non-word character become `-`.
pub fn slugify_name(name: &str) -> String {
    name.chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '_' || ch == '-' {
                ch
            } else {
                '-'
            }
        })
        .collect()
}

/// Lowercased ascii slug of a single word with diacritics folded and every
/// non-word character dropped (`Müller-Lüdenscheidt` -> `mullerludenscheidt`).
pub fn word_slug(word: &str) -> String {
    word.nfkd()
        .filter(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
        .collect::<String>()
        .to_lowercase()
}

/// Hyphen-joined slug of every whitespace-separated token
/// (`PLoS Comput Biol` -> `plos-comput-biol`).
pub fn journal_short_name(text: &str) -> String {
    text.split_whitespace()
        .map(|token| {
            token
                .chars()
                .filter(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
                .collect::<String>()
                .to_lowercase()
        })
        .filter(|token| !token.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Integer prefix of `text`, `None` when it does not start with a digit
/// (`"123-9"` -> 123, `"e1001"` -> None).
pub fn leading_int(text: &str) -> Option<i64> {
    let trimmed = text.trim();
    let (sign, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let end = digits
        .char_indices()
        .find(|(_, ch)| !ch.is_ascii_digit())
        .map(|(idx, _)| idx)
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().ok().map(|value| sign * value)
}

/// File stem as used for local resource names: everything before the last dot.
pub fn file_stem(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(idx) if idx > 0 => &file_name[..idx],
        _ => file_name,
    }
}

/// Lowercased extension without the dot.
pub fn extension(file_name: &str) -> Option<String> {
    match file_name.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < file_name.len() => {
            Some(file_name[idx + 1..].to_ascii_lowercase())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs() {
        assert_eq!(slugify_name("pone.0012345.g001"), "pone-0012345-g001");
        assert_eq!(slugify_name("Table S1 (xls)"), "Table-S1--xls-");
        assert_eq!(word_slug("Åström"), "astrom");
        assert_eq!(word_slug("O'Neil-Smith"), "oneilsmith");
        assert_eq!(journal_short_name("PLoS  Comput. Biol"), "plos-comput-biol");
        assert_eq!(journal_short_name("Nature & Science"), "nature-science");
    }

    #[test]
    fn integer_prefixes() {
        assert_eq!(leading_int("12"), Some(12));
        assert_eq!(leading_int(" 305-311"), Some(305));
        assert_eq!(leading_int("e1000960"), None);
        assert_eq!(leading_int(""), None);
    }

    #[test]
    fn stems_and_extensions() {
        assert_eq!(file_stem("pone.0012345.g001.tif"), "pone.0012345.g001");
        assert_eq!(file_stem("license"), "license");
        assert_eq!(extension("a.NXML").as_deref(), Some("nxml"));
        assert_eq!(extension("license"), None);
    }
}
