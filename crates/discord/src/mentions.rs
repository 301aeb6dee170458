/// Tokens that trigger platform-wide notifications when posted verbatim.
const MASS_MENTIONS: [&str; 2] = ["everyone", "here"];

/// Defuse `@everyone` and `@here` by inserting a zero-width space after the
/// `@`, so mirrored text cannot ping a whole channel. Other `@token`s are
/// left untouched, and occurrences are rewritten in place mid-sentence.
pub fn defuse_mass_mentions(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(at) = rest.find('@') {
        out.push_str(&rest[..=at]);
        rest = &rest[at + 1..];
        if MASS_MENTIONS
            .iter()
            .any(|token| rest.starts_with(token) && ends_token(rest, token.len()))
        {
            out.push('\u{200B}');
        }
    }
    out.push_str(rest);
    out
}

/// The mention only fires when the token is not part of a longer word.
fn ends_token(rest: &str, len: usize) -> bool {
    rest[len..]
        .chars()
        .next()
        .is_none_or(|c| !c.is_alphanumeric() && c != '_')
}
