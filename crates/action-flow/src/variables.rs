//! `{{name}}` substitution from run bindings

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use replay_core_types::Action;
use std::collections::HashMap;

static TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_.\-]*)\s*\}\}").expect("token pattern is valid")
});

/// Replace every bound `{{name}}` in `text`; unknown tokens stay as written.
pub fn substitute(text: &str, bindings: &HashMap<String, String>) -> String {
    if !text.contains("{{") {
        return text.to_string();
    }
    TOKEN
        .replace_all(text, |caps: &Captures| match bindings.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Names referenced by `{{name}}` tokens in `text`
pub fn referenced_names(text: &str) -> Vec<String> {
    TOKEN
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Copy of `action` with url, text, file path, key, selector and locator
/// text substituted.
pub fn substitute_action(action: &Action, bindings: &HashMap<String, String>) -> Action {
    action.map_text(|value| substitute(value, bindings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use replay_core_types::Locator;

    fn bindings() -> HashMap<String, String> {
        HashMap::from([
            ("user".to_string(), "ada".to_string()),
            ("host".to_string(), "example.test".to_string()),
        ])
    }

    #[test]
    fn substitutes_known_and_keeps_unknown() {
        assert_eq!(
            substitute("hi {{user}}, {{ missing }} {{user}}", &bindings()),
            "hi ada, {{ missing }} ada"
        );
        assert_eq!(substitute("plain", &bindings()), "plain");
        assert_eq!(substitute("{{ user }}", &bindings()), "ada");
    }

    #[test]
    fn lists_referenced_names() {
        assert_eq!(
            referenced_names("{{a}} and {{ b.c }}"),
            vec!["a".to_string(), "b.c".to_string()]
        );
    }

    #[test]
    fn substitutes_every_text_field() {
        let action = Action::type_text(
            "login as {{user}}",
            "{{user}}",
            Locator::default().with_text("Hello {{user}}"),
        )
        .with_selector("#{{user}}");
        let mut action = action;
        action.params.url = Some("https://{{host}}/login".to_string());

        let substituted = substitute_action(&action, &bindings());
        assert_eq!(substituted.params.text.as_deref(), Some("ada"));
        assert_eq!(substituted.selector.as_deref(), Some("#ada"));
        assert_eq!(
            substituted.params.url.as_deref(),
            Some("https://example.test/login")
        );
        assert_eq!(
            substituted.locator.unwrap().text.as_deref(),
            Some("Hello ada")
        );
        assert_eq!(substituted.name, "login as {{user}}");
        assert_eq!(action.params.text.as_deref(), Some("{{user}}"));
    }
}
