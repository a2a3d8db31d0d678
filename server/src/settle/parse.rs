//! `/settle [seconds] [@agent ...]` argument parsing.

/// Duration used when no valid seconds token is given.
pub const DEFAULT_SETTLE_SECS: u32 = 20;

/// Upper bound for a settle duration (5 minutes).
pub const MAX_SETTLE_SECS: u32 = 300;

/// Parsed settle arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettleRequest {
    pub seconds: u32,
    /// Usernames without the leading `@`. Empty means the whole channel.
    pub targets: Vec<String>,
}

/// Parse settle arguments.
///
/// - `@name` tokens are targets (duplicates ignored, case-insensitively)
/// - integers above 300 clamp to 300
/// - integers below 1 and any other token are ignored
/// - when several durations are given the last valid one wins
pub fn parse_settle_args(params: &[&str]) -> SettleRequest {
    let mut seconds = DEFAULT_SETTLE_SECS;
    let mut targets: Vec<String> = Vec::new();

    for param in params {
        if let Some(name) = param.strip_prefix('@') {
            if !name.is_empty() && !targets.iter().any(|t| t.eq_ignore_ascii_case(name)) {
                targets.push(name.to_string());
            }
            continue;
        }

        if let Some(parsed) = parse_seconds(param) {
            seconds = parsed;
        }
    }

    SettleRequest { seconds, targets }
}

fn parse_seconds(token: &str) -> Option<u32> {
    match token.parse::<i64>() {
        Ok(n) if n >= 1 => Some(n.min(i64::from(MAX_SETTLE_SECS)) as u32),
        Ok(_) => None,
        // All digits but too large for i64.
        Err(_) if !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit()) => {
            Some(MAX_SETTLE_SECS)
        }
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_args_settles_channel_for_default() {
        let req = parse_settle_args(&[]);
        assert_eq!(req.seconds, DEFAULT_SETTLE_SECS);
        assert!(req.targets.is_empty());
    }

    #[test]
    fn test_seconds_and_targets() {
        let req = parse_settle_args(&["30", "@telos", "@aurora"]);
        assert_eq!(req.seconds, 30);
        assert_eq!(req.targets, vec!["telos", "aurora"]);
    }

    #[test]
    fn test_targets_before_seconds() {
        let req = parse_settle_args(&["@telos", "45"]);
        assert_eq!(req.seconds, 45);
        assert_eq!(req.targets, vec!["telos"]);
    }

    #[test]
    fn test_large_duration_clamps_to_max() {
        assert_eq!(parse_settle_args(&["9999"]).seconds, 300);
        assert_eq!(parse_settle_args(&["300"]).seconds, 300);
        assert_eq!(
            parse_settle_args(&["99999999999999999999999"]).seconds,
            300
        );
    }

    #[test]
    fn test_non_positive_and_garbage_fall_back_to_default() {
        for token in ["-5", "0", "abc", "1.5", ""] {
            let req = parse_settle_args(&[token]);
            assert_eq!(req.seconds, DEFAULT_SETTLE_SECS, "token {token:?}");
            assert!(req.targets.is_empty(), "token {token:?} became a target");
        }
    }

    #[test]
    fn test_bare_at_and_duplicates_ignored() {
        let req = parse_settle_args(&["@", "@Telos", "@telos", "1"]);
        assert_eq!(req.seconds, 1);
        assert_eq!(req.targets, vec!["Telos"]);
    }
}
