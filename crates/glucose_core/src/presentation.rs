use std::{collections::BTreeSet, fmt::Display};

use chrono::{DateTime, Duration, Utc};
use shared::{
    display::{
        DisplayOption, DisplayOptions, Field, FieldKind, PresentationModel, ReactionTrigger, Zone,
    },
    domain::{ChannelKind, Identity},
    reading::{Reading, Thresholds},
};

pub const DEFAULT_STALE_AFTER_MINUTES: i64 = 15;

pub fn classify_zone(mgdl: i32, thresholds: &Thresholds) -> Zone {
    let value = f64::from(mgdl);
    if value >= thresholds.high() || value <= thresholds.low() {
        Zone::Danger
    } else if (thresholds.top() <= value && value < thresholds.high())
        || (thresholds.low() < value && value <= thresholds.bottom())
    {
        Zone::Warn
    } else {
        Zone::Ok
    }
}

/// Compares mmol values at the one decimal they are displayed with.
fn mmol_is(mmol: f64, tenths: i64) -> bool {
    (mmol * 10.0).round() as i64 == tenths
}

pub fn reaction_triggers(reading: &Reading) -> BTreeSet<ReactionTrigger> {
    let mut triggers = BTreeSet::new();
    if reading.glucose_mgdl == 69 || mmol_is(reading.glucose_mmol, 69) {
        triggers.insert(ReactionTrigger::SixtyNine);
    }
    if reading.glucose_mgdl == 100
        || mmol_is(reading.glucose_mmol, 55)
        || mmol_is(reading.glucose_mmol, 100)
    {
        triggers.insert(ReactionTrigger::OneHundred);
    }
    triggers
}

pub fn format_glucose(value: impl Display, delta: Option<impl Display>, negative: bool) -> String {
    match delta {
        None => value.to_string(),
        Some(delta) => {
            let sign = if negative { '-' } else { '+' };
            format!("{value} ({sign}{delta})")
        }
    }
}

pub fn is_stale(captured_at: DateTime<Utc>, now: DateTime<Utc>, stale_after: Duration) -> bool {
    now - captured_at > stale_after
}

/// Simple display always renders short; otherwise only text channels honour
/// the channel's short preference.
pub fn short_mode(
    options: &DisplayOptions,
    channel_kind: ChannelKind,
    prefers_short: bool,
) -> bool {
    options.contains(DisplayOption::Simple) || (channel_kind == ChannelKind::Text && prefers_short)
}

#[derive(Debug, Clone)]
pub struct PresentationBuilder {
    stale_after: Duration,
}

impl Default for PresentationBuilder {
    fn default() -> Self {
        Self::new(Duration::minutes(DEFAULT_STALE_AFTER_MINUTES))
    }
}

impl PresentationBuilder {
    pub fn new(stale_after: Duration) -> Self {
        Self { stale_after }
    }

    pub fn build(
        &self,
        reading: &Reading,
        options: &DisplayOptions,
        short: bool,
        owner: Option<&Identity>,
        now: DateTime<Utc>,
    ) -> (PresentationModel, BTreeSet<ReactionTrigger>) {
        let simple = options.contains(DisplayOption::Simple);
        let short = short || simple;
        let avatar = owner
            .and_then(|owner| owner.avatar_url.clone())
            .filter(|_| options.contains(DisplayOption::Avatar) && !short);

        let model = PresentationModel {
            fields: fields(reading, options),
            zone: classify_zone(reading.glucose_mgdl, &reading.thresholds),
            stale: is_stale(reading.captured_at, now, self.stale_after),
            captured_at: reading.captured_at,
            avatar,
            simple,
            short,
            owner_name: owner.map(|owner| owner.display_name.clone()),
        };
        (model, reaction_triggers(reading))
    }
}

fn fields(reading: &Reading, options: &DisplayOptions) -> Vec<Field> {
    let mut fields = Vec::with_capacity(6);
    let mut push = |kind, label: &str, value: String| {
        fields.push(Field {
            kind,
            label: label.to_string(),
            value,
        })
    };

    if options.contains(DisplayOption::Title) {
        push(FieldKind::Title, "title", reading.title.clone());
    }
    push(
        FieldKind::Mmol,
        "mmol/L",
        format_glucose(
            format!("{:.1}", reading.glucose_mmol),
            reading.delta.map(|d| format!("{:.1}", d.mmol)),
            reading.delta_is_negative,
        ),
    );
    push(
        FieldKind::Mgdl,
        "mg/dL",
        format_glucose(
            reading.glucose_mgdl,
            reading.delta.map(|d| d.mgdl),
            reading.delta_is_negative,
        ),
    );
    // code 0 has no arrow to show
    if options.contains(DisplayOption::Trend) && !reading.trend.arrow().is_empty() {
        push(FieldKind::Trend, "trend", reading.trend.arrow().to_string());
    }
    if options.contains(DisplayOption::Iob) && reading.insulin_on_board != 0.0 {
        push(
            FieldKind::InsulinOnBoard,
            "iob",
            format!("{:.2}U", reading.insulin_on_board),
        );
    }
    if options.contains(DisplayOption::Cob) && reading.carbs_on_board != 0 {
        push(
            FieldKind::CarbsOnBoard,
            "cob",
            format!("{}g", reading.carbs_on_board),
        );
    }
    fields
}
