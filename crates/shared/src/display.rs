use std::{collections::BTreeSet, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayOption {
    Title,
    Trend,
    Cob,
    Iob,
    Avatar,
    Simple,
}

impl DisplayOption {
    pub const ALL: [DisplayOption; 6] = [
        DisplayOption::Title,
        DisplayOption::Trend,
        DisplayOption::Cob,
        DisplayOption::Iob,
        DisplayOption::Avatar,
        DisplayOption::Simple,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DisplayOption::Title => "title",
            DisplayOption::Trend => "trend",
            DisplayOption::Cob => "cob",
            DisplayOption::Iob => "iob",
            DisplayOption::Avatar => "avatar",
            DisplayOption::Simple => "simple",
        }
    }
}

impl FromStr for DisplayOption {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        DisplayOption::ALL
            .into_iter()
            .find(|option| option.as_str().eq_ignore_ascii_case(raw.trim()))
            .ok_or_else(|| format!("unknown display option '{}'", raw.trim()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayOptions(BTreeSet<DisplayOption>);

impl Default for DisplayOptions {
    fn default() -> Self {
        DisplayOption::ALL
            .into_iter()
            .filter(|option| *option != DisplayOption::Simple)
            .collect()
    }
}

impl DisplayOptions {
    pub fn none() -> Self {
        Self(BTreeSet::new())
    }

    pub fn contains(&self, option: DisplayOption) -> bool {
        self.0.contains(&option)
    }

    pub fn with(mut self, option: DisplayOption) -> Self {
        self.0.insert(option);
        self
    }

    pub fn without(mut self, option: DisplayOption) -> Self {
        self.0.remove(&option);
        self
    }

    /// Parses a comma separated list such as `"title,trend,iob"`.
    pub fn parse_list(raw: &str) -> Result<Self, String> {
        raw.split(',')
            .filter(|part| !part.trim().is_empty())
            .map(DisplayOption::from_str)
            .collect()
    }
}

impl FromIterator<DisplayOption> for DisplayOptions {
    fn from_iter<T: IntoIterator<Item = DisplayOption>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for DisplayOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.0.iter().map(|option| option.as_str()).collect();
        f.write_str(&names.join(","))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Zone {
    Danger,
    Warn,
    Ok,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Title,
    Mmol,
    Mgdl,
    Trend,
    InsulinOnBoard,
    CarbsOnBoard,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub kind: FieldKind,
    pub label: String,
    pub value: String,
}

/// Fully populated view of one reading, handed to a rendering adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresentationModel {
    pub fields: Vec<Field>,
    pub zone: Zone,
    pub stale: bool,
    pub captured_at: DateTime<Utc>,
    pub avatar: Option<String>,
    pub simple: bool,
    pub short: bool,
    pub owner_name: Option<String>,
}

impl PresentationModel {
    pub fn field(&self, kind: FieldKind) -> Option<&Field> {
        self.fields.iter().find(|field| field.kind == kind)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactionTrigger {
    SixtyNine,
    OneHundred,
}

impl ReactionTrigger {
    pub fn emoji(self) -> &'static str {
        match self {
            ReactionTrigger::SixtyNine => "♋",
            ReactionTrigger::OneHundred => "💯",
        }
    }
}
