//! Text helpers: HTML escaping and command argument parsing.

/// Escape text for Telegram HTML parse mode.
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Parse `/set_bonus <referrer> <referee>` arguments.
///
/// Both values must be positive integers; anything else is rejected.
pub fn parse_bonus_args(input: &str) -> Option<(i64, i64)> {
    let mut parts = input.split_whitespace();
    let referrer = parts.next()?.parse::<i64>().ok()?;
    let referee = parts.next()?.parse::<i64>().ok()?;

    if parts.next().is_some() || referrer <= 0 || referee <= 0 {
        return None;
    }
    Some((referrer, referee))
}

/// Parse the page number of `admin_user_list:<page>` callback data.
pub fn parse_page(data: &str) -> Option<u64> {
    data.strip_prefix("admin_user_list:")?.parse().ok()
}

/// Points average with one decimal.
pub fn format_average(value: f64) -> String {
    format!("{:.1}", value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape("<b>Tom & Jerry</b>"), "&lt;b&gt;Tom &amp; Jerry&lt;/b&gt;");
    }

    #[test]
    fn test_parse_bonus_args() {
        assert_eq!(parse_bonus_args("300 100"), Some((300, 100)));
        assert_eq!(parse_bonus_args("  500   50 "), Some((500, 50)));
        assert_eq!(parse_bonus_args("300"), None);
        assert_eq!(parse_bonus_args("300 0"), None);
        assert_eq!(parse_bonus_args("-1 100"), None);
        assert_eq!(parse_bonus_args("300 100 5"), None);
        assert_eq!(parse_bonus_args("abc 100"), None);
    }

    #[test]
    fn test_parse_page() {
        assert_eq!(parse_page("admin_user_list:0"), Some(0));
        assert_eq!(parse_page("admin_user_list:12"), Some(12));
        assert_eq!(parse_page("admin_user_list:-1"), None);
        assert_eq!(parse_page("admin_analytics"), None);
    }

    #[test]
    fn test_format_average() {
        assert_eq!(format_average(0.0), "0.0");
        assert_eq!(format_average(1234.56), "1234.6");
    }
}
