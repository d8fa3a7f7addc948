//! SQL templates for the change source, plus rendering helpers.
//!
//! Templates carry `{last_tracked}`, `{tracked_ids}` and `{film_ids}`
//! placeholders that are substituted at render time. Every paginated
//! query orders by `modified` and limits to [`PAGE_SIZE`] rows so the
//! watermark can advance page by page.

/// Rows fetched per page of changed ids.
pub const PAGE_SIZE: usize = 100;

/// Changed film works since the watermark.
pub const CHANGED_FILM_IDS: &str = "\
SELECT id, modified
FROM content.film_work
WHERE modified > '{last_tracked}'
ORDER BY modified
LIMIT 100;";

/// Changed genres since the watermark.
pub const CHANGED_GENRE_IDS: &str = "\
SELECT id, modified
FROM content.genre
WHERE modified > '{last_tracked}'
ORDER BY modified
LIMIT 100;";

/// Changed persons since the watermark.
pub const CHANGED_PERSON_IDS: &str = "\
SELECT id, modified
FROM content.person
WHERE modified > '{last_tracked}'
ORDER BY modified
LIMIT 100;";

/// Films affected by a page of changed persons.
pub const PERSON_FILM_IDS: &str = "\
SELECT DISTINCT fw.id, fw.modified
FROM content.film_work fw
JOIN content.person_film_work pfw ON pfw.film_work_id = fw.id
WHERE pfw.person_id IN ({tracked_ids}) AND fw.modified > '{last_tracked}'
ORDER BY fw.modified
LIMIT 100;";

/// Films affected by a page of changed genres.
pub const GENRE_FILM_IDS: &str = "\
SELECT DISTINCT fw.id, fw.modified
FROM content.film_work fw
JOIN content.genre_film_work gfw ON gfw.film_work_id = fw.id
WHERE gfw.genre_id IN ({tracked_ids}) AND fw.modified > '{last_tracked}'
ORDER BY fw.modified
LIMIT 100;";

/// Full film rows for a set of film ids, one row per
/// film/participant/genre/subscription combination.
pub const FILM_ROWS: &str = "\
SELECT DISTINCT
    fw.id AS fw_id,
    fw.title,
    fw.description,
    fw.rating,
    fw.type,
    fw.created,
    fw.modified,
    pfw.role,
    p.id AS person_id,
    p.full_name,
    g.id AS genre_id,
    g.name AS genre_name,
    s.id AS subscription_id,
    s.name AS subscription_name
FROM content.film_work fw
LEFT JOIN content.person_film_work pfw ON pfw.film_work_id = fw.id
LEFT JOIN content.person p ON p.id = pfw.person_id
LEFT JOIN content.genre_film_work gfw ON gfw.film_work_id = fw.id
LEFT JOIN content.genre g ON g.id = gfw.genre_id
LEFT JOIN content.subscription_film_work sfw ON sfw.film_work_id = fw.id
LEFT JOIN content.subscription s ON s.id = sfw.subscription_id
WHERE fw.id IN ({film_ids})
ORDER BY fw.id;";

/// Genre rows for the standalone genres index.
pub const GENRE_ROWS: &str = "\
SELECT id, name, description
FROM content.genre
WHERE id IN ({film_ids});";

/// Person rows for the standalone persons index, one row per
/// person/film participation.
pub const PERSON_ROWS: &str = "\
SELECT
    p.id,
    p.full_name,
    pfw.role,
    pfw.film_work_id
FROM content.person p
LEFT JOIN content.person_film_work pfw ON pfw.person_id = p.id
WHERE p.id IN ({film_ids})
ORDER BY p.id;";

/// Join ids into a quoted, comma-separated SQL literal list.
pub fn quote_ids(ids: &[String]) -> String {
    ids.iter()
        .map(|id| format!("'{id}'"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Render a changed-ids or cascade template against the watermark and,
/// for cascades, the quoted dependency id list.
pub fn render_changed_ids(template: &str, last_tracked: &str, tracked_ids: Option<&str>) -> String {
    let sql = template.replace("{last_tracked}", last_tracked);
    match tracked_ids {
        Some(ids) => sql.replace("{tracked_ids}", ids),
        None => sql,
    }
}

/// Render a data template against the quoted aggregate id list.
pub fn render_data(template: &str, film_ids: &str) -> String {
    template.replace("{film_ids}", film_ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ids_builds_sql_literal_list() {
        let ids = vec!["a".to_string(), "b".to_string()];
        assert_eq!(quote_ids(&ids), "'a','b'");
        assert_eq!(quote_ids(&[]), "");
    }

    #[test]
    fn test_render_changed_ids_substitutes_watermark() {
        let sql = render_changed_ids(CHANGED_GENRE_IDS, "2024-01-01 00:00:00.000000", None);
        assert!(sql.contains("modified > '2024-01-01 00:00:00.000000'"));
        assert!(!sql.contains("{last_tracked}"));
    }

    #[test]
    fn test_render_cascade_substitutes_both_placeholders() {
        let sql = render_changed_ids(PERSON_FILM_IDS, "2000-01-01", Some("'p1','p2'"));
        assert!(sql.contains("pfw.person_id IN ('p1','p2')"));
        assert!(sql.contains("fw.modified > '2000-01-01'"));
        assert!(!sql.contains('{'));
    }

    #[test]
    fn test_render_data_substitutes_film_ids() {
        let sql = render_data(FILM_ROWS, "'f1'");
        assert!(sql.contains("fw.id IN ('f1')"));
        assert!(!sql.contains("{film_ids}"));
    }

    #[test]
    fn test_genre_cascade_reads_film_work() {
        assert!(GENRE_FILM_IDS.contains("FROM content.film_work fw"));
        assert!(GENRE_FILM_IDS.contains("gfw.genre_id IN ({tracked_ids})"));
    }

    #[test]
    fn test_paginated_templates_carry_page_limit() {
        for template in [
            CHANGED_FILM_IDS,
            CHANGED_GENRE_IDS,
            CHANGED_PERSON_IDS,
            PERSON_FILM_IDS,
            GENRE_FILM_IDS,
        ] {
            assert!(template.contains("ORDER BY"));
            assert!(template.ends_with(&format!("LIMIT {PAGE_SIZE};")));
        }
    }
}
