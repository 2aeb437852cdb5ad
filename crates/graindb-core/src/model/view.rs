use crate::model::relation::KeyMapEntry;
use serde::{Deserialize, Serialize};

///
/// ViewMember
/// One member entity of a view, addressed by alias.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ViewMember {
    pub alias: String,
    pub entity_name: String,
}

///
/// ViewLink
/// Join between two view members. The key map is in member-field terms:
/// `this_field` on `alias`, `rel_field` on `rel_alias`.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ViewLink {
    pub alias: String,
    pub rel_alias: String,
    /// Optional links render as LEFT OUTER JOIN.
    #[serde(default)]
    pub optional: bool,
    pub key_map: Vec<KeyMapEntry>,
}

///
/// ViewAlias
/// Mapping from a view field to the member field it projects.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ViewAlias {
    /// View field name.
    pub name: String,
    pub member_alias: String,
    /// Field name on the member entity.
    pub field: String,
}

///
/// ViewModel
/// Composition description for a view-backed entity: rows are computed by
/// joining member entities rather than stored directly.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ViewModel {
    pub members: Vec<ViewMember>,
    pub links: Vec<ViewLink>,
    pub aliases: Vec<ViewAlias>,
}

impl ViewModel {
    #[must_use]
    pub fn member(&self, alias: &str) -> Option<&ViewMember> {
        self.members.iter().find(|m| m.alias == alias)
    }

    /// Aliases projecting fields of one member.
    #[must_use]
    pub fn aliases_for(&self, member_alias: &str) -> Vec<&ViewAlias> {
        self.aliases
            .iter()
            .filter(|a| a.member_alias == member_alias)
            .collect()
    }
}
