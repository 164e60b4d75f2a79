//! Case conversions used wherever names cross the SQL/graph boundary.
//!
//! Raw SQL identifiers are snake_case, graph field names are camelCase, and
//! schema type names are PascalCase. Every lookup in the schema store and the
//! model registry normalizes through these helpers, so the conversions are
//! deliberately total: any input produces *some* name rather than an error.

/// Trims leading and trailing `_`, `-` and whitespace, collapses each
/// remaining separator run into an uppercased following character, then
/// lowercases the first character.
pub fn camel_case(s: &str) -> String {
    if s.is_empty() {
        return String::new();
    }

    let trimmed = s.trim_matches(|c: char| c == '_' || c == '-' || c.is_whitespace());
    let mut out = String::with_capacity(trimmed.len());
    let mut upper_next = false;
    for c in trimmed.chars() {
        if c == '_' || c == '-' || c.is_whitespace() {
            upper_next = true;
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }

    lower_first(&out)
}

/// `camel_case` with the first character uppercased; the form used for type
/// names ("PascalCase").
pub fn classify(s: &str) -> String {
    upper_first(&camel_case(s))
}

/// `camel_case`, then an underscore before each upper-to-lower transition,
/// lowercased. Already-snake-cased input is a fixed point.
pub fn snake_case(s: &str) -> String {
    if s.is_empty() {
        return String::new();
    }

    let camel = camel_case(s);
    let mut out = String::with_capacity(camel.len() + 4);
    let chars: Vec<char> = camel.chars().collect();
    for (i, c) in chars.iter().enumerate() {
        let followed_by_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
        if c.is_uppercase() && followed_by_lower {
            out.push('_');
        }
        out.extend(c.to_lowercase());
    }

    out.trim_matches('_').to_string()
}

/// Two names are similar when they agree under lowercased camelCase, e.g.
/// `WantedDes`, `wanted_des` and `wantedDes` all name the same attribute.
pub fn is_similar(s: &str, t: &str) -> bool {
    s == t || camel_case(s).to_lowercase() == camel_case(t).to_lowercase()
}

/// Joins a verb and a name into a single pascal-cased identifier, e.g.
/// `encap_case("get", "wanted_des") == "GetWantedDes"`.
pub fn encap_case(op: &str, s: &str) -> String {
    classify(&format!("{op} {s}"))
}

pub fn lower_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn upper_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camel_case_examples() {
        assert_eq!(camel_case("--camel_case  --"), "camelCase");
        assert_eq!(camel_case("    camel case   "), "camelCase");
        assert_eq!(camel_case(" -_ CAMELCa_se _-_ "), "cAMELCaSe");
        assert_eq!(camel_case("camel-case func  "), "camelCaseFunc");
        assert_eq!(camel_case("camel_case_func  "), "camelCaseFunc");
        assert_eq!(camel_case("wanted_job_detail"), "wantedJobDetail");
        assert_eq!(camel_case("WantedDes"), "wantedDes");
        assert_eq!(camel_case("i18n"), "i18n");
    }

    #[test]
    fn classify_examples() {
        assert_eq!(classify("  classify case "), "ClassifyCase");
        assert_eq!(classify("class-ify func  "), "ClassIfyFunc");
        assert_eq!(classify("class_ify_func  "), "ClassIfyFunc");
        assert_eq!(classify("wanted_job_detail"), "WantedJobDetail");
        assert_eq!(classify("i18n"), "I18n");
    }

    #[test]
    fn snake_case_examples() {
        assert_eq!(snake_case("  snake case "), "snake_case");
        assert_eq!(snake_case("--SnakeCase__"), "snake_case");
        assert_eq!(snake_case("--SNAKECase__"), "snake_case");
    }

    #[test]
    fn snake_case_round_trips_snake_cased_input() {
        for raw in ["wanted_job_detail", "user", "role_type", "created_at"] {
            assert_eq!(snake_case(&classify(raw)), raw);
        }
    }

    #[test]
    fn is_similar_examples() {
        assert!(is_similar("WantedDes", "wanted_des"));
        assert!(is_similar("wanted_des", "WantedDes"));
        assert!(is_similar("wantedDes", "wanted_des"));
        assert!(is_similar("wanted_des", "wantedDes"));
        assert!(is_similar("WANTED_DES", "wanted_des"));
        assert!(is_similar("---WANTED_des---", "wanted_des"));
    }

    #[test]
    fn encap_case_examples() {
        assert_eq!(encap_case("get", "wanted_des"), "GetWantedDes");
        assert_eq!(encap_case("set", "   wanted_des"), "SetWantedDes");
    }

    #[test]
    fn first_letter_helpers() {
        assert_eq!(lower_first("WantedDes"), "wantedDes");
        assert_eq!(lower_first("wantedDes"), "wantedDes");
        assert_eq!(upper_first("WantedDes"), "WantedDes");
        assert_eq!(upper_first("wantedDes"), "WantedDes");
    }
}
