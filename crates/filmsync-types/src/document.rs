//! Denormalized documents destined for the search indexes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// The closed set of destination indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexName {
    Movies,
    Genres,
    Persons,
}

impl IndexName {
    /// The index name as it appears in the search engine.
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexName::Movies => "movies",
            IndexName::Genres => "genres",
            IndexName::Persons => "persons",
        }
    }

    /// All destinations, in bootstrap order.
    pub fn all() -> [IndexName; 3] {
        [IndexName::Movies, IndexName::Genres, IndexName::Persons]
    }
}

impl fmt::Display for IndexName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for IndexName {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "movies" => Ok(IndexName::Movies),
            "genres" => Ok(IndexName::Genres),
            "persons" => Ok(IndexName::Persons),
            other => Err(ConfigError::UnknownIndex(other.to_string())),
        }
    }
}

/// An `{uuid, name}` pair nested inside an aggregate document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedRef {
    pub uuid: String,
    pub name: String,
}

impl NamedRef {
    pub fn new(uuid: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            name: name.into(),
        }
    }
}

/// Document shape for the `movies` index.
///
/// Nested lists hold unique entries only; the accessor methods below
/// enforce that so re-processing the same source row is a no-op.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilmDocument {
    pub uuid: String,
    pub imdb_rating: Option<f64>,
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub directors: Vec<NamedRef>,
    #[serde(default)]
    pub genre: Vec<NamedRef>,
    #[serde(default)]
    pub subscription: Vec<NamedRef>,
    #[serde(default)]
    pub actors: Vec<NamedRef>,
    #[serde(default)]
    pub writers: Vec<NamedRef>,
}

impl FilmDocument {
    /// Create a film document with empty nested lists.
    pub fn new(
        uuid: impl Into<String>,
        imdb_rating: Option<f64>,
        title: impl Into<String>,
        description: Option<String>,
    ) -> Self {
        Self {
            uuid: uuid.into(),
            imdb_rating,
            title: title.into(),
            description,
            directors: Vec::new(),
            genre: Vec::new(),
            subscription: Vec::new(),
            actors: Vec::new(),
            writers: Vec::new(),
        }
    }

    /// The nested list a role tag routes to. Unknown tags get `None`
    /// so rows with unexpected roles fall through silently.
    pub fn role_list_mut(&mut self, role: &str) -> Option<&mut Vec<NamedRef>> {
        match role {
            "director" => Some(&mut self.directors),
            "actor" => Some(&mut self.actors),
            "writer" => Some(&mut self.writers),
            _ => None,
        }
    }

    /// Add a participant to the list their role routes to, once.
    pub fn add_role_member(&mut self, role: &str, member: NamedRef) {
        if let Some(list) = self.role_list_mut(role) {
            push_unique(list, member);
        }
    }

    /// Add a genre reference, once.
    pub fn add_genre(&mut self, genre: NamedRef) {
        push_unique(&mut self.genre, genre);
    }

    /// Add a subscription tier reference, once.
    pub fn add_subscription(&mut self, tier: NamedRef) {
        push_unique(&mut self.subscription, tier);
    }
}

/// Document shape for the `genres` index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenreDocument {
    pub uuid: String,
    pub name: String,
    pub description: Option<String>,
}

impl GenreDocument {
    pub fn new(uuid: impl Into<String>, name: impl Into<String>, description: Option<String>) -> Self {
        Self {
            uuid: uuid.into(),
            name: name.into(),
            description,
        }
    }
}

/// Document shape for the `persons` index.
///
/// `role` keeps the first non-null role seen for the person and
/// `film_ids` accumulates every film they participated in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonDocument {
    pub uuid: String,
    pub full_name: String,
    pub role: Option<String>,
    #[serde(default)]
    pub film_ids: Vec<String>,
}

impl PersonDocument {
    pub fn new(uuid: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            full_name: full_name.into(),
            role: None,
            film_ids: Vec::new(),
        }
    }

    /// Record a role if none has been recorded yet.
    pub fn record_role(&mut self, role: &str) {
        if self.role.is_none() {
            self.role = Some(role.to_string());
        }
    }

    /// Add a film id, once.
    pub fn add_film_id(&mut self, film_id: impl Into<String>) {
        push_unique(&mut self.film_ids, film_id.into());
    }
}

/// A document routed to one of the destination indexes.
///
/// Serializes untagged: the sink sees the plain document body.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Document {
    Film(FilmDocument),
    Genre(GenreDocument),
    Person(PersonDocument),
}

impl Document {
    /// The document id, which doubles as the search-engine `_id`.
    pub fn id(&self) -> &str {
        match self {
            Document::Film(doc) => &doc.uuid,
            Document::Genre(doc) => &doc.uuid,
            Document::Person(doc) => &doc.uuid,
        }
    }

    /// The index this document belongs to.
    pub fn index(&self) -> IndexName {
        match self {
            Document::Film(_) => IndexName::Movies,
            Document::Genre(_) => IndexName::Genres,
            Document::Person(_) => IndexName::Persons,
        }
    }
}

fn push_unique<T: PartialEq>(list: &mut Vec<T>, value: T) {
    if !list.contains(&value) {
        list.push(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_name_round_trips_through_str() {
        for index in IndexName::all() {
            assert_eq!(index.as_str().parse::<IndexName>().unwrap(), index);
        }
    }

    #[test]
    fn test_unknown_index_is_rejected() {
        let err = "films".parse::<IndexName>().unwrap_err();
        assert!(err.to_string().contains("films"));
    }

    #[test]
    fn test_role_routing_targets_one_list() {
        let mut doc = FilmDocument::new("f1", Some(7.0), "Stalker", None);
        doc.add_role_member("actor", NamedRef::new("p1", "A. Kaidanovsky"));
        assert_eq!(doc.actors.len(), 1);
        assert!(doc.directors.is_empty());
        assert!(doc.writers.is_empty());
    }

    #[test]
    fn test_unknown_role_is_ignored() {
        let mut doc = FilmDocument::new("f1", None, "Stalker", None);
        doc.add_role_member("composer", NamedRef::new("p1", "E. Artemyev"));
        assert!(doc.actors.is_empty());
        assert!(doc.directors.is_empty());
        assert!(doc.writers.is_empty());
    }

    #[test]
    fn test_nested_lists_stay_unique() {
        let mut doc = FilmDocument::new("f1", None, "Stalker", None);
        doc.add_genre(NamedRef::new("g1", "Drama"));
        doc.add_genre(NamedRef::new("g1", "Drama"));
        doc.add_role_member("writer", NamedRef::new("p1", "B. Strugatsky"));
        doc.add_role_member("writer", NamedRef::new("p1", "B. Strugatsky"));
        assert_eq!(doc.genre.len(), 1);
        assert_eq!(doc.writers.len(), 1);
    }

    #[test]
    fn test_person_keeps_first_role() {
        let mut doc = PersonDocument::new("p1", "A. Tarkovsky");
        doc.record_role("director");
        doc.record_role("writer");
        assert_eq!(doc.role.as_deref(), Some("director"));
    }

    #[test]
    fn test_person_film_ids_stay_unique() {
        let mut doc = PersonDocument::new("p1", "A. Tarkovsky");
        doc.add_film_id("f1");
        doc.add_film_id("f1");
        doc.add_film_id("f2");
        assert_eq!(doc.film_ids, vec!["f1".to_string(), "f2".to_string()]);
    }

    #[test]
    fn test_document_serializes_without_variant_tag() {
        let doc = Document::Genre(GenreDocument::new("g1", "Drama", None));
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["uuid"], "g1");
        assert_eq!(json["name"], "Drama");
        assert!(json.get("Genre").is_none());
    }

    #[test]
    fn test_document_id_and_index() {
        let doc = Document::Person(PersonDocument::new("p9", "K. Shinkai"));
        assert_eq!(doc.id(), "p9");
        assert_eq!(doc.index(), IndexName::Persons);
    }
}
