// src/notify/mod.rs
pub mod telegram;

pub use telegram::TelegramBot;

/// `new_york` → `New York` (no underscore, title-case).
pub fn pretty(channel_key: &str) -> String {
    channel_key
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Assemble one digest message: header, summary lines (or a placeholder),
/// optional extras block (weather).
pub fn compose_digest(channel_key: &str, lines: &[String], extras: &str) -> String {
    let header = format!("**📰 {} Now**\n\n", pretty(channel_key));
    let body = if lines.is_empty() {
        "_No fresh headlines yet._".to_string()
    } else {
        lines.join("\n\n")
    };
    let mut text = header + &body;
    if !extras.is_empty() {
        text.push_str("\n\n");
        text.push_str(extras);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pretty_title_cases_underscored_keys() {
        assert_eq!(pretty("new_york"), "New York");
        assert_eq!(pretty("madrid"), "Madrid");
        assert_eq!(pretty("rio_de_janeiro"), "Rio De Janeiro");
    }

    #[test]
    fn digest_with_lines_and_extras() {
        let lines = vec!["🚇 Metro is back → t.ly/a".to_string(), "🎆 Fireworks tonight → t.ly/b".to_string()];
        let out = compose_digest("new_york", &lines, "------\n☀️ 21 °C, Clear sky\n-------");
        assert!(out.starts_with("**📰 New York Now**\n\n"));
        assert!(out.contains("🚇 Metro is back → t.ly/a\n\n🎆 Fireworks tonight → t.ly/b"));
        assert!(out.ends_with("-------"));
    }

    #[test]
    fn empty_digest_gets_placeholder() {
        let out = compose_digest("madrid", &[], "");
        assert_eq!(out, "**📰 Madrid Now**\n\n_No fresh headlines yet._");
    }
}
