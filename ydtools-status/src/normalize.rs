use crate::snapshot::StatusKind;

/// Placeholder for size and detail fields the daemon did not report.
pub const PLACEHOLDER: &str = "...";

/// Maps a raw daemon status onto [`StatusKind`].
///
/// `index` is transient: it keeps the previous status, except right after
/// startup where there is none yet and it counts as `busy`.
pub fn normalize(raw: &str, last: StatusKind) -> StatusKind {
    match raw {
        "" => StatusKind::None,
        "index" if last == StatusKind::Unknown => StatusKind::Busy,
        "index" => last,
        "no internet access" => StatusKind::NoNet,
        "busy" => StatusKind::Busy,
        "idle" => StatusKind::Idle,
        "paused" => StatusKind::Paused,
        _ => StatusKind::Error,
    }
}

/// `value`, or [`PLACEHOLDER`] when it is empty.
pub fn or_placeholder(value: &str) -> String {
    if value.is_empty() {
        PLACEHOLDER.to_owned()
    } else {
        value.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use StatusKind as K;

    #[rstest]
    #[case("", K::Idle, K::None)]
    #[case("", K::Unknown, K::None)]
    #[case("index", K::Unknown, K::Busy)]
    #[case("index", K::Idle, K::Idle)]
    #[case("index", K::Paused, K::Paused)]
    #[case("index", K::None, K::None)]
    #[case("no internet access", K::Idle, K::NoNet)]
    #[case("busy", K::Idle, K::Busy)]
    #[case("idle", K::Busy, K::Idle)]
    #[case("paused", K::Idle, K::Paused)]
    #[case("failed to connect to daemon process", K::Idle, K::Error)]
    #[case("error", K::Unknown, K::Error)]
    #[case("Idle", K::Unknown, K::Error)]
    fn normalizer_table(#[case] raw: &str, #[case] last: StatusKind, #[case] expected: StatusKind) {
        assert_eq!(normalize(raw, last), expected);
    }

    #[test]
    fn placeholder_fills_only_empty_values() {
        assert_eq!(or_placeholder(""), "...");
        assert_eq!(or_placeholder("0 B"), "0 B");
    }
}
