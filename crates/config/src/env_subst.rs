/// Replace `${VAR}` and `${VAR:-fallback}` placeholders using the process
/// environment.
pub fn substitute_env(input: &str) -> String {
    substitute_with(input, |name| std::env::var(name).ok())
}

/// Replace placeholders using `lookup`.
///
/// A variable that `lookup` cannot resolve takes its fallback when one is
/// given, and is otherwise left in place. An unterminated `${` is copied
/// through verbatim.
pub fn substitute_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };

        let body = &after[..end];
        let (name, fallback) = match body.split_once(":-") {
            Some((name, fallback)) => (name, Some(fallback)),
            None => (body, None),
        };

        match (name.is_empty(), lookup(name), fallback) {
            (false, Some(value), _) => out.push_str(&value),
            (false, None, Some(fallback)) => out.push_str(fallback),
            _ => {
                out.push_str("${");
                out.push_str(body);
                out.push('}');
            },
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(name: &str) -> Option<String> {
        (name == "DEVCTL_PORT").then(|| "9000".to_string())
    }

    #[test]
    fn substitutes_known_var() {
        assert_eq!(substitute_with("port = ${DEVCTL_PORT}", env), "port = 9000");
    }

    #[test]
    fn falls_back_to_default() {
        assert_eq!(
            substitute_with("bind = \"${DEVCTL_BIND:-127.0.0.1}\"", env),
            "bind = \"127.0.0.1\""
        );
        assert_eq!(substitute_with("${DEVCTL_PORT:-1}", env), "9000");
    }

    #[test]
    fn leaves_unknown_var() {
        assert_eq!(substitute_with("${DEVCTL_MISSING}", env), "${DEVCTL_MISSING}");
        assert_eq!(substitute_with("${}", env), "${}");
    }

    #[test]
    fn unterminated_placeholder_is_literal() {
        assert_eq!(substitute_with("a ${DEVCTL_PORT", env), "a ${DEVCTL_PORT");
    }
}
