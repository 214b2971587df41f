//! Leading-token extraction, grounded in `cmd_router.py`'s
//! `get_token_and_command` (`^(\d+)-.+$`).

/// If `cmd` starts with a run of ASCII digits immediately followed by a
/// `-` and at least one more character, splits off the digits as a
/// user-supplied token and returns the remainder (still including the
/// leading `-`). Otherwise returns `None` — the caller should mint a
/// fresh token and leave `cmd` untouched.
#[must_use]
pub(crate) fn split_leading_token(cmd: &str) -> Option<(String, String)> {
    let digits_end = cmd.find(|c: char| !c.is_ascii_digit()).unwrap_or(cmd.len());
    if digits_end == 0 {
        return None;
    }
    let rest = &cmd[digits_end..];
    if rest.len() < 2 || !rest.starts_with('-') {
        return None;
    }
    Some((cmd[..digits_end].to_owned(), rest.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_a_user_supplied_token() {
        let (token, command) = split_leading_token("123-break-insert main").unwrap();
        assert_eq!(token, "123");
        assert_eq!(command, "-break-insert main");
    }

    #[test]
    fn returns_none_without_leading_digits() {
        assert!(split_leading_token("-break-insert main").is_none());
    }

    #[test]
    fn returns_none_for_bare_digits_with_nothing_after_dash() {
        assert!(split_leading_token("123-").is_none());
        assert!(split_leading_token("123").is_none());
    }
}
