mod macros;

pub use macros::*;

/// Converts `string` into a URL-friendly slug.
///
/// Characters are transliterated to ASCII, lowercased, and every run of
/// characters that aren't alphanumeric or `_` becomes a single `-`. Leading
/// and trailing separators are dropped.
///
/// ```rust
/// use marksmith::util::slugify;
///
/// assert_eq!(slugify("Hello, World!"), "hello-world");
/// assert_eq!(slugify("Æúű--cool?"), "aeuu-cool");
/// ```
pub fn slugify(string: &str) -> String {
    let mut output = String::with_capacity(string.len());

    let mut need_dash = false;
    for ch in string.chars() {
        let ascii = deunicode::deunicode_char(ch)
            .filter(|s| !s.is_empty() && !ch.is_whitespace())
            .unwrap_or("-");

        for b in ascii.bytes() {
            if b.is_ascii_alphanumeric() || b == b'_' {
                if need_dash {
                    output.push('-');
                    need_dash = false;
                }

                output.push(b.to_ascii_lowercase() as char);
            } else {
                need_dash = !output.is_empty();
            }
        }
    }

    output
}

/// Returns the byte ranges of `needle` in `haystack` that sit on word
/// boundaries, that is, aren't directly preceded or followed by an
/// alphanumeric character.
pub fn word_matches<'h>(haystack: &'h str, needle: &'h str) -> impl Iterator<Item = usize> + 'h {
    let is_word = |c: Option<char>| c.is_some_and(|c| c.is_alphanumeric());
    memchr::memmem::find_iter(haystack.as_bytes(), needle.as_bytes())
        .filter(move |&i| {
            let before = haystack[..i].chars().next_back();
            let after = haystack[i + needle.len()..].chars().next();
            !is_word(before) && !is_word(after)
        })
}
