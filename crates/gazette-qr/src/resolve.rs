//! Follow target resolution.
//!
//! A request names exactly one target among a person (`name`), an
//! organisation (`organisation`, a Wikidata identifier) and a function tag
//! (`function_tag`). The resolver picks the branch, validates the argument,
//! checks the gazette index when needed and settles on the label shown to
//! the user.

use serde::{Deserialize, Serialize};

use crate::error::FollowError;
use crate::normalize::normalize_for_url;
use crate::search::GazetteIndex;

/// The category of entity being followed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowType {
    /// A named person.
    Person,
    /// A function tag (e.g. `ambassadeur`).
    RoleTag,
    /// An organisation, by Wikidata identifier.
    Organisation,
}

impl FollowType {
    /// Query parameter carrying this follow type, inbound and in QR payloads.
    pub fn query_param(self) -> &'static str {
        match self {
            Self::Person => "name",
            Self::RoleTag => "function_tag",
            Self::Organisation => "organisation",
        }
    }
}

/// A resolved follow request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FollowTarget {
    /// Which branch resolved.
    pub follow_type: FollowType,
    /// The argument as supplied (trimmed); replayed into commands and URLs.
    pub raw_argument: String,
    /// Display-ready label.
    pub canonical_label: String,
}

/// Follow parameters as parsed from the query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FollowParams {
    /// Person name, first and last.
    #[serde(default)]
    pub name: Option<String>,
    /// Organisation Wikidata identifier.
    #[serde(default)]
    pub organisation: Option<String>,
    /// Function tag, optionally `tag=value`.
    #[serde(default)]
    pub function_tag: Option<String>,
    /// Check the target against the index. Organisations are always checked.
    #[serde(default)]
    pub verify: bool,
}

/// Resolve follow parameters into a [`FollowTarget`].
pub async fn resolve_follow<I: GazetteIndex>(
    index: &I,
    params: &FollowParams,
) -> Result<FollowTarget, FollowError> {
    let name = non_empty(params.name.as_deref());
    let organisation = non_empty(params.organisation.as_deref());
    let function_tag = non_empty(params.function_tag.as_deref());

    let supplied = [name, organisation, function_tag]
        .iter()
        .filter(|p| p.is_some())
        .count();
    if supplied > 1 {
        return Err(FollowError::ConflictingParameters);
    }

    if let Some(name) = name {
        resolve_person(index, name, params.verify).await
    } else if let Some(id) = organisation {
        resolve_organisation(index, id, params.verify).await
    } else if let Some(tag) = function_tag {
        resolve_role_tag(index, tag, params.verify).await
    } else {
        Err(FollowError::MissingParameter)
    }
}

async fn resolve_person<I: GazetteIndex>(
    index: &I,
    name: &str,
    verify: bool,
) -> Result<FollowTarget, FollowError> {
    if name.split_whitespace().count() < 2 {
        return Err(FollowError::InvalidNameFormat(name.to_string()));
    }

    let normalized = normalize_for_url(name);
    let canonical_label = if verify {
        // First match wins; homonyms are not disambiguated.
        index
            .search_by_person_name(&normalized)
            .await
            .into_iter()
            .next()
            .map(|item| item.label())
            .ok_or_else(|| FollowError::NotFound(format!("person '{normalized}'")))?
    } else {
        normalized
    };

    Ok(FollowTarget {
        follow_type: FollowType::Person,
        raw_argument: name.to_string(),
        canonical_label,
    })
}

async fn resolve_organisation<I: GazetteIndex>(
    index: &I,
    id: &str,
    verify: bool,
) -> Result<FollowTarget, FollowError> {
    let mut identities = index.resolve_organisation_names(id).await;
    let identity = match identities.len() {
        0 => return Err(FollowError::NotFound(format!("organisation '{id}'"))),
        1 => identities.remove(0),
        n => {
            return Err(FollowError::AmbiguousResult(format!(
                "{n} organisations match '{id}'"
            )));
        }
    };

    if verify && index.search_by_organisation(id).await.is_empty() {
        return Err(FollowError::NotFound(format!(
            "no publication for organisation '{id}'"
        )));
    }

    Ok(FollowTarget {
        follow_type: FollowType::Organisation,
        raw_argument: id.to_string(),
        canonical_label: identity.name,
    })
}

async fn resolve_role_tag<I: GazetteIndex>(
    index: &I,
    raw: &str,
    verify: bool,
) -> Result<FollowTarget, FollowError> {
    if verify {
        let (tag, value) = split_tag(raw);
        if index.search_by_tag(tag, value).await.is_empty() {
            return Err(FollowError::NotFound(format!("function tag '{raw}'")));
        }
    }

    Ok(FollowTarget {
        follow_type: FollowType::RoleTag,
        raw_argument: raw.to_string(),
        canonical_label: raw.to_string(),
    })
}

/// Split `tag=value` (value optionally quoted) into its parts.
fn split_tag(raw: &str) -> (&str, Option<&str>) {
    match raw.split_once('=') {
        Some((tag, value)) => {
            let value = value.trim().trim_matches('"');
            (tag.trim(), (!value.is_empty()).then_some(value))
        }
        None => (raw, None),
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
