//! Merging denormalized rows into id-keyed documents.
//!
//! The film query returns one row per film/participant/genre/
//! subscription combination, so a single film arrives as many rows.
//! Assembly groups rows by aggregate id and folds each row's joined
//! fields into the document's nested lists, deduplicating as it goes.
//! The whole pass is pure: same rows in, same documents out.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use filmsync_types::{
    Document, FilmDocument, GenreDocument, IndexName, NamedRef, PersonDocument, Row, RowError,
};

use crate::error::PipelineError;

/// Merge a batch of rows into documents for `index`, keyed by id.
///
/// Rows with an unexpected shape fail the whole batch; a `NULL` field
/// where a LEFT JOIN found nothing is normal data and just skipped.
pub fn assemble(
    index: IndexName,
    rows: &[Row],
) -> Result<BTreeMap<String, Document>, PipelineError> {
    let documents = match index {
        IndexName::Movies => assemble_films(rows)?,
        IndexName::Genres => assemble_genres(rows)?,
        IndexName::Persons => assemble_persons(rows)?,
    };
    Ok(documents)
}

fn assemble_films(rows: &[Row]) -> Result<BTreeMap<String, Document>, RowError> {
    let mut films: BTreeMap<String, FilmDocument> = BTreeMap::new();
    for row in rows {
        let id = row.get_str("fw_id")?;
        let film = match films.entry(id.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let rating = row.get_opt_f64("rating")?;
                let title = row.get_str("title")?;
                let description = row.get_opt_str("description")?.map(str::to_string);
                entry.insert(FilmDocument::new(id, rating, title, description))
            }
        };

        if let Some(genre) = named_ref(row, "genre_id", "genre_name")? {
            film.add_genre(genre);
        }
        if let Some(tier) = named_ref(row, "subscription_id", "subscription_name")? {
            film.add_subscription(tier);
        }
        if let Some(role) = row.get_opt_str("role")? {
            if !role.is_empty() {
                if let Some(member) = named_ref(row, "person_id", "full_name")? {
                    film.add_role_member(role, member);
                }
            }
        }
    }
    Ok(films
        .into_iter()
        .map(|(id, film)| (id, Document::Film(film)))
        .collect())
}

fn assemble_genres(rows: &[Row]) -> Result<BTreeMap<String, Document>, RowError> {
    let mut genres = BTreeMap::new();
    for row in rows {
        let id = row.get_str("id")?;
        let name = row.get_str("name")?;
        let description = row.get_opt_str("description")?.map(str::to_string);
        genres.insert(
            id.to_string(),
            Document::Genre(GenreDocument::new(id, name, description)),
        );
    }
    Ok(genres)
}

fn assemble_persons(rows: &[Row]) -> Result<BTreeMap<String, Document>, RowError> {
    let mut persons: BTreeMap<String, PersonDocument> = BTreeMap::new();
    for row in rows {
        let id = row.get_str("id")?;
        let person = match persons.entry(id.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let full_name = row.get_str("full_name")?;
                entry.insert(PersonDocument::new(id, full_name))
            }
        };

        if let Some(role) = row.get_opt_str("role")? {
            if !role.is_empty() {
                person.record_role(role);
            }
        }
        // NULL film id means the person has no participations yet.
        if let Some(film_id) = row.get_opt_str("film_work_id")? {
            person.add_film_id(film_id);
        }
    }
    Ok(persons
        .into_iter()
        .map(|(id, person)| (id, Document::Person(person)))
        .collect())
}

/// Build an `{uuid, name}` pair from two row fields. Both fields
/// `NULL` is a LEFT JOIN that matched nothing, yielding `None`.
fn named_ref(row: &Row, id_field: &str, name_field: &str) -> Result<Option<NamedRef>, RowError> {
    let id = row.get_opt_str(id_field)?;
    let name = row.get_opt_str(name_field)?;
    Ok(match (id, name) {
        (Some(id), Some(name)) => Some(NamedRef::new(id, name)),
        _ => None,
    })
}
