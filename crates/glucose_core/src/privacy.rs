use std::collections::BTreeMap;

use shared::domain::GuildId;

/// Whether an endpoint may be shown in `scope`. Self lookups always pass; for
/// anyone else only an explicit opt-in for the scope counts.
pub fn is_visible(visibility: &BTreeMap<GuildId, bool>, scope: GuildId, is_self: bool) -> bool {
    is_self || visibility.get(&scope).copied().unwrap_or(false)
}
