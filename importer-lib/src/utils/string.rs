/// Normalize cell text: control characters become spaces, runs of whitespace
/// collapse to one space, and the ends are trimmed.
pub fn normalize_string(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<&str>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_string() {
        assert_eq!(normalize_string("  Иванов\tИван\n Иванович "), "Иванов Иван Иванович");
        assert_eq!(normalize_string("   "), "");
        assert_eq!(normalize_string("Ivanov"), "Ivanov");
    }
}
