//! Shared utility functions

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Render usernames as a comma-separated mention list.
///
/// # Examples
///
/// ```
/// use stick_server::util::join_mentions;
///
/// assert_eq!(join_mentions(&["telos".to_string()]), "@telos");
/// assert_eq!(join_mentions(&["a".to_string(), "@b".to_string()]), "@a, @b");
/// ```
pub fn join_mentions(usernames: &[String]) -> String {
    usernames
        .iter()
        .map(|u| format!("@{}", u.trim_start_matches('@')))
        .collect::<Vec<_>>()
        .join(", ")
}
