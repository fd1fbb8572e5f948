/// Represents ways to locate an element on the portal's pages
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    /// CSS selector
    Css(String),
    /// XPath expression
    XPath(String),
    /// Element id attribute (may contain characters such as `:`)
    Id(String),
    /// Exact link text
    LinkText(String),
    /// Represents an invalid selector string, with a reason.
    Invalid(String),
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Selector::Css(s) => write!(f, "css:{s}"),
            Selector::XPath(s) => write!(f, "xpath:{s}"),
            Selector::Id(s) => write!(f, "id:{s}"),
            Selector::LinkText(s) => write!(f, "link:{s}"),
            Selector::Invalid(reason) => write!(f, "invalid:{reason}"),
        }
    }
}

impl From<&str> for Selector {
    fn from(s: &str) -> Self {
        let s = s.trim();
        if s.is_empty() {
            return Selector::Invalid("empty selector".to_string());
        }

        if let Some(value) = strip_prefix_ignore_case(s, "css:") {
            return non_empty(value, Selector::Css);
        }
        if let Some(value) = strip_prefix_ignore_case(s, "xpath:") {
            return non_empty(value, Selector::XPath);
        }
        if let Some(value) = strip_prefix_ignore_case(s, "id:") {
            return non_empty(value, Selector::Id);
        }
        if let Some(value) = strip_prefix_ignore_case(s, "link:") {
            return non_empty(value, Selector::LinkText);
        }
        match s {
            // `#F1:username` is an id, not a CSS pseudo-class
            _ if is_colon_id(s) => non_empty(&s[1..], Selector::Id),
            _ if s.starts_with("//") || s.starts_with("(//") => Selector::XPath(s.to_string()),
            _ => Selector::Css(s.to_string()),
        }
    }
}

impl From<String> for Selector {
    fn from(s: String) -> Self {
        Selector::from(s.as_str())
    }
}

impl From<&String> for Selector {
    fn from(s: &String) -> Self {
        Selector::from(s.as_str())
    }
}

/// `s` without the ASCII `prefix`, compared case-insensitively.
fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &s[prefix.len()..])
}

/// A lone `#id` whose id contains `:` (JSF-style), with no combinators or
/// other simple selectors around it.
fn is_colon_id(s: &str) -> bool {
    let Some(id) = s.strip_prefix('#') else {
        return false;
    };
    id.contains(':')
        && !id
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '.' | '[' | '>' | '+' | '~' | ',' | '#' | '('))
}

fn non_empty(value: &str, make: fn(String) -> Selector) -> Selector {
    let value = value.trim();
    if value.is_empty() {
        Selector::Invalid("selector prefix without a value".to_string())
    } else {
        make(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_prefixed_forms() {
        assert_eq!(
            Selector::from("id:F1:username"),
            Selector::Id("F1:username".to_string())
        );
        assert_eq!(
            Selector::from("xpath://div[@title='cgpf']"),
            Selector::XPath("//div[@title='cgpf']".to_string())
        );
        assert_eq!(
            Selector::from("link:Nuestra Parte"),
            Selector::LinkText("Nuestra Parte".to_string())
        );
    }

    #[test]
    fn unprefixed_strings_are_css() {
        assert_eq!(
            Selector::from("span.btn-consultar.c-2x"),
            Selector::Css("span.btn-consultar.c-2x".to_string())
        );
        assert_eq!(
            Selector::from("#buscadorInput"),
            Selector::Css("#buscadorInput".to_string())
        );
    }

    #[test]
    fn hash_with_colon_is_an_id() {
        assert_eq!(
            Selector::from("#F1:btnSiguiente"),
            Selector::Id("F1:btnSiguiente".to_string())
        );
    }

    #[test]
    fn compound_css_with_pseudo_class_stays_css() {
        assert_eq!(
            Selector::from("#resultadoBusqueda a:first-child"),
            Selector::Css("#resultadoBusqueda a:first-child".to_string())
        );
        assert!(matches!(Selector::from("#menu>li:hover"), Selector::Css(_)));
    }

    #[test]
    fn prefixes_ignore_ascii_case_only() {
        assert_eq!(
            Selector::from("XPath://td"),
            Selector::XPath("//td".to_string())
        );
        // KELVIN SIGN lowercases to `k` but is not the ASCII prefix
        assert_eq!(
            Selector::from("lin\u{212A}:x"),
            Selector::Css("lin\u{212A}:x".to_string())
        );
    }

    #[test]
    fn leading_double_slash_is_xpath() {
        assert!(matches!(Selector::from("//a[@class='x']"), Selector::XPath(_)));
    }

    #[test]
    fn empty_values_are_invalid() {
        assert!(matches!(Selector::from("css:"), Selector::Invalid(_)));
        assert!(matches!(Selector::from("   "), Selector::Invalid(_)));
    }
}
