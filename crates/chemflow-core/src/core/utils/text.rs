/// Turns an arbitrary label into something safe to use as a file or directory name.
///
/// Parentheses, square brackets and commas become underscores; any other
/// character that is not alphanumeric or one of `_ . + -` is dropped, and
/// trailing whitespace is trimmed.
pub fn sanitize_name(value: &str) -> String {
    value
        .chars()
        .filter_map(|c| match c {
            '(' | ')' | '[' | ']' | ',' => Some('_'),
            c if c.is_alphanumeric() || matches!(c, '_' | '.' | '+' | '-') => Some(c),
            _ => None,
        })
        .collect::<String>()
        .trim_end()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brackets_and_commas_become_underscores() {
        assert_eq!(sanitize_name("CH3OH(ads)[1,2]"), "CH3OH_ads__1_2_");
    }

    #[test]
    fn unsafe_characters_are_dropped() {
        assert_eq!(sanitize_name("my job/run #1 "), "myjobrun1");
        assert_eq!(sanitize_name("H2O+OH-.v2"), "H2O+OH-.v2");
    }
}
