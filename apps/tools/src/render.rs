//! Plain-text stand-in for a chat transport: turns pipeline output into lines
//! and extracts mentions from raw command arguments.

use std::collections::BTreeSet;

use shared::{
    display::{FieldKind, PresentationModel, ReactionTrigger, Zone},
    domain::UserId,
};

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ParsedArgs {
    pub mention_ids: Vec<UserId>,
    pub mentions_everyone: bool,
    /// Everything that is not a well-formed mention, in order.
    pub rest: Vec<String>,
}

/// `<@123>` and `<@!123>` are user mentions; `@everyone` and `@here` mark a
/// mass mention. Malformed mention tokens stay in `rest`.
pub fn parse_mentions(args: Vec<String>) -> ParsedArgs {
    let mut parsed = ParsedArgs::default();
    for arg in args {
        let token = arg.trim();
        if token == "@everyone" || token == "@here" {
            parsed.mentions_everyone = true;
            continue;
        }
        match mention_id(token) {
            Some(id) => {
                if !parsed.mention_ids.contains(&id) {
                    parsed.mention_ids.push(id);
                }
            }
            None => parsed.rest.push(arg),
        }
    }
    parsed
}

fn mention_id(token: &str) -> Option<UserId> {
    token
        .strip_prefix("<@")
        .and_then(|rest| rest.strip_suffix('>'))
        .map(|inner| inner.strip_prefix('!').unwrap_or(inner))
        .and_then(|inner| inner.parse::<i64>().ok())
        .map(UserId)
}

pub fn render_model(model: &PresentationModel, triggers: &BTreeSet<ReactionTrigger>) -> String {
    let mut lines = Vec::new();
    if model.stale {
        lines.push(format!(
            "!! last reading {} is stale",
            model.captured_at.format("%Y-%m-%d %H:%M UTC")
        ));
    }

    if model.short {
        let parts: Vec<&str> = model
            .fields
            .iter()
            .filter(|field| {
                matches!(
                    field.kind,
                    FieldKind::Mmol | FieldKind::Mgdl | FieldKind::Trend
                )
            })
            .map(|field| field.value.as_str())
            .collect();
        lines.push(parts.join(" | "));
    } else {
        if let Some(owner) = &model.owner_name {
            lines.push(format!("[{owner}]"));
        }
        if let Some(avatar) = &model.avatar {
            lines.push(format!("avatar: {avatar}"));
        }
        for field in &model.fields {
            lines.push(format!("{}: {}", field.label, field.value));
        }
        lines.push(format!(
            "zone: {} | captured {}",
            zone_name(model.zone),
            model.captured_at.format("%Y-%m-%d %H:%M UTC")
        ));
    }

    if !triggers.is_empty() {
        let emoji: Vec<&str> = triggers.iter().map(|t| t.emoji()).collect();
        lines.push(format!("reactions: {}", emoji.join(" ")));
    }
    lines.join("\n")
}

fn zone_name(zone: Zone) -> &'static str {
    match zone {
        Zone::Danger => "danger",
        Zone::Warn => "warn",
        Zone::Ok => "ok",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use shared::display::Field;

    fn model(short: bool, stale: bool) -> PresentationModel {
        PresentationModel {
            fields: vec![
                Field {
                    kind: FieldKind::Title,
                    label: "title".into(),
                    value: "Nightscout".into(),
                },
                Field {
                    kind: FieldKind::Mmol,
                    label: "mmol/L".into(),
                    value: "6.7 (+0.3)".into(),
                },
                Field {
                    kind: FieldKind::Mgdl,
                    label: "mg/dL".into(),
                    value: "120 (+5)".into(),
                },
            ],
            zone: Zone::Ok,
            stale,
            captured_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            avatar: None,
            simple: false,
            short,
            owner_name: Some("bob".into()),
        }
    }

    #[test]
    fn parses_user_and_everyone_mentions() {
        let args: Vec<String> = ["<@2>", "<@!3>", "<@2>", "@here", "bob", "<@x>"]
            .into_iter()
            .map(String::from)
            .collect();
        let parsed = parse_mentions(args);
        assert_eq!(parsed.mention_ids, vec![UserId(2), UserId(3)]);
        assert!(parsed.mentions_everyone);
        assert_eq!(parsed.rest, vec!["bob".to_string(), "<@x>".to_string()]);
    }

    #[test]
    fn malformed_mentions_are_kept_as_arguments() {
        let args = vec!["<@!>".to_string(), "<@12".to_string()];
        let parsed = parse_mentions(args.clone());
        assert!(parsed.mention_ids.is_empty());
        assert_eq!(parsed.rest, args);
    }

    #[test]
    fn short_mode_renders_one_line() {
        let text = render_model(&model(true, false), &BTreeSet::new());
        assert_eq!(text, "6.7 (+0.3) | 120 (+5)");
    }

    #[test]
    fn stale_banner_comes_first() {
        let triggers = BTreeSet::from([ReactionTrigger::OneHundred]);
        let text = render_model(&model(false, true), &triggers);
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("!! last reading"));
        assert_eq!(lines[1], "[bob]");
        assert!(lines.contains(&"mg/dL: 120 (+5)"));
        assert_eq!(lines.last().copied(), Some("reactions: 💯"));
    }
}
