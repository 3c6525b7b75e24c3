#![forbid(unsafe_code)]

//! Handler-name derivation.
//!
//! Observers declare handlers under conventional names:
//!
//! | Form            | Name                                              |
//! |-----------------|---------------------------------------------------|
//! | Generic         | `property_<property>_changed`                     |
//! | Type-qualified  | `property_<snake_case(type)>_<property>_changed`  |
//! | Alias-qualified | `property_<snake_case(alias)>_<property>_changed` |
//!
//! # Snake-case rule
//!
//! 1. Generic arguments are dropped (`Wrapper<T>` → `Wrapper`).
//! 2. Namespace qualifiers are dropped (`app::model::Counter` → `Counter`).
//! 3. The remaining segment must be `[A-Za-z0-9_]+`.
//! 4. An `_` is inserted before an uppercase letter when the previous
//!    character is lowercase or a digit, or when the previous character is
//!    uppercase and the next one is lowercase (end of an acronym).
//! 5. Everything is lowercased. Digits never start a word.
//!
//! | Input            | Output           |
//! |------------------|------------------|
//! | `TypeName`       | `type_name`      |
//! | `HTTPServer`     | `http_server`    |
//! | `Module::Inner`  | `inner`          |
//! | `Base64Encoder`  | `base64_encoder` |
//! | `Vector3D`       | `vector3_d`      |
//! | `main_window`    | `main_window`    |
//!
//! The conversion is idempotent on its own output.
//!
//! Steps 1 and 2 apply to type names only. An alias containing `<` or `::`
//! is rejected.

use std::fmt;

/// Which identifier failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierKind {
    /// A property name.
    Property,
    /// An observable type name.
    TypeName,
    /// A registration-time observable alias.
    Alias,
}

impl fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Property => f.write_str("property name"),
            Self::TypeName => f.write_str("type name"),
            Self::Alias => f.write_str("observable alias"),
        }
    }
}

/// Malformed identifier rejected at name derivation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameError {
    pub kind: IdentifierKind,
    pub value: String,
    pub reason: &'static str,
}

impl fmt::Display for NameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {} {:?}: {}", self.kind, self.value, self.reason)
    }
}

impl std::error::Error for NameError {}

fn reject(kind: IdentifierKind, value: &str, reason: &'static str) -> NameError {
    NameError {
        kind,
        value: value.to_string(),
        reason,
    }
}

fn check_charset(kind: IdentifierKind, original: &str, segment: &str) -> Result<(), NameError> {
    if segment.is_empty() {
        return Err(reject(kind, original, "empty identifier"));
    }
    if !segment
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_')
    {
        return Err(reject(
            kind,
            original,
            "only ASCII letters, digits and '_' are allowed",
        ));
    }
    Ok(())
}

/// Validate a property name. Property names are used verbatim in handler
/// names, so they are checked but never rewritten.
pub fn validate_property(name: &str) -> Result<&str, NameError> {
    check_charset(IdentifierKind::Property, name, name)?;
    Ok(name)
}

/// Last path segment of a (possibly qualified, possibly generic) type name.
///
/// `std::collections::HashMap<K, V>` → `HashMap`.
#[must_use]
pub fn short_type_name(name: &str) -> &str {
    let base = match name.find('<') {
        Some(idx) => &name[..idx],
        None => name,
    };
    match base.rfind("::") {
        Some(idx) => &base[idx + 2..],
        None => base,
    }
}

/// Convert an identifier to `lower_snake_case` using the rule in the module
/// docs.
pub fn snake_case(ident: &str) -> Result<String, NameError> {
    snake_case_as(IdentifierKind::TypeName, ident)
}

fn snake_case_as(kind: IdentifierKind, ident: &str) -> Result<String, NameError> {
    if ident.is_empty() {
        return Err(reject(kind, ident, "empty identifier"));
    }
    // Aliases are plain identifiers; only type names carry paths and generics.
    let segment = match kind {
        IdentifierKind::Alias => ident,
        _ => short_type_name(ident),
    };
    check_charset(kind, ident, segment)?;

    let chars: Vec<char> = segment.chars().collect();
    let mut out = String::with_capacity(segment.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next = chars.get(i + 1).copied();
            let after_word = prev.is_ascii_lowercase() || prev.is_ascii_digit();
            let ends_acronym =
                prev.is_ascii_uppercase() && next.is_some_and(|n| n.is_ascii_lowercase());
            if prev != '_' && (after_word || ends_acronym) {
                out.push('_');
            }
        }
        out.push(c.to_ascii_lowercase());
    }
    Ok(out)
}

/// Snake-cased alias. Unlike type names, aliases may not carry a `::` path
/// or generic arguments.
pub fn normalize_alias(alias: &str) -> Result<String, NameError> {
    snake_case_as(IdentifierKind::Alias, alias)
}

/// `property_<property>_changed`
pub fn generic_handler_name(property: &str) -> Result<String, NameError> {
    let property = validate_property(property)?;
    Ok(format!("property_{property}_changed"))
}

/// `property_<snake_case(type_name)>_<property>_changed`
pub fn type_handler_name(type_name: &str, property: &str) -> Result<String, NameError> {
    let property = validate_property(property)?;
    let scope = snake_case_as(IdentifierKind::TypeName, type_name)?;
    Ok(format!("property_{scope}_{property}_changed"))
}

/// `property_<snake_case(alias)>_<property>_changed`
pub fn alias_handler_name(alias: &str, property: &str) -> Result<String, NameError> {
    let property = validate_property(property)?;
    let scope = normalize_alias(alias)?;
    Ok(format!("property_{scope}_{property}_changed"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snake_case_table() {
        let cases = [
            ("TypeName", "type_name"),
            ("MyClass", "my_class"),
            ("Counter", "counter"),
            ("HTTPServer", "http_server"),
            ("XMLHttpRequest", "xml_http_request"),
            ("IOError", "io_error"),
            ("ABC", "abc"),
            ("Module::Inner", "inner"),
            ("app::model::MainWindow", "main_window"),
            ("Wrapper<app::Inner>", "wrapper"),
            ("Base64Encoder", "base64_encoder"),
            ("Html5Parser", "html5_parser"),
            ("MP3Player", "mp3_player"),
            ("Vector3D", "vector3_d"),
            ("Point3d", "point3d"),
            ("V2Config", "v2_config"),
            ("main_window", "main_window"),
            ("My_Class", "my_class"),
            ("camelCase", "camel_case"),
            ("x", "x"),
        ];
        for (input, expected) in cases {
            assert_eq!(snake_case(input).unwrap(), expected, "input {input:?}");
        }
    }

    #[test]
    fn snake_case_rejects_empty() {
        let err = snake_case("").unwrap_err();
        assert_eq!(err.kind, IdentifierKind::TypeName);
        assert_eq!(err.reason, "empty identifier");
    }

    #[test]
    fn snake_case_rejects_trailing_separator() {
        assert!(snake_case("module::").is_err());
    }

    #[test]
    fn snake_case_rejects_punctuation() {
        assert!(snake_case("My-Class").is_err());
        assert!(snake_case("my class").is_err());
        assert!(snake_case("&Counter").is_err());
    }

    #[test]
    fn short_type_name_strips_path_and_generics() {
        assert_eq!(short_type_name("a::b::C"), "C");
        assert_eq!(short_type_name("C"), "C");
        assert_eq!(
            short_type_name("std::collections::HashMap<k::K, v::V>"),
            "HashMap"
        );
    }

    #[test]
    fn generic_name() {
        assert_eq!(
            generic_handler_name("value").unwrap(),
            "property_value_changed"
        );
    }

    #[test]
    fn type_qualified_name() {
        assert_eq!(
            type_handler_name("demo::Counter", "value").unwrap(),
            "property_counter_value_changed"
        );
        assert_eq!(
            type_handler_name("HTTPServer", "port").unwrap(),
            "property_http_server_port_changed"
        );
    }

    #[test]
    fn alias_qualified_name() {
        assert_eq!(
            alias_handler_name("main_window", "title").unwrap(),
            "property_main_window_title_changed"
        );
    }

    #[test]
    fn empty_property_is_rejected() {
        let err = generic_handler_name("").unwrap_err();
        assert_eq!(err.kind, IdentifierKind::Property);
        assert!(type_handler_name("Counter", "").is_err());
        assert!(alias_handler_name("primary", "").is_err());
    }

    #[test]
    fn property_is_not_rewritten() {
        assert_eq!(
            generic_handler_name("isVisible").unwrap(),
            "property_isVisible_changed"
        );
    }

    #[test]
    fn empty_alias_is_rejected() {
        let err = alias_handler_name("", "title").unwrap_err();
        assert_eq!(err.kind, IdentifierKind::Alias);
    }

    #[test]
    fn malformed_alias_is_rejected_not_trimmed() {
        for alias in ["main<", "ui::main_window", "Wrapper<T>", "main window"] {
            let err = alias_handler_name(alias, "title").unwrap_err();
            assert_eq!(err.kind, IdentifierKind::Alias, "alias {alias:?}");
            assert_eq!(err.value, alias);
        }
    }

    #[test]
    fn alias_is_snake_cased() {
        assert_eq!(normalize_alias("MainWindow").unwrap(), "main_window");
        assert_eq!(
            alias_handler_name("MainWindow", "title").unwrap(),
            "property_main_window_title_changed"
        );
    }

    #[test]
    fn error_display_names_the_identifier() {
        let err = generic_handler_name("bad name").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("property name"));
        assert!(msg.contains("bad name"));
    }
}
