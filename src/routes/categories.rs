use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;

use crate::db::models::{Category, Subcategory};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Serialize)]
struct CategoryWithSubs {
    #[serde(flatten)]
    category: Category,
    subcategories: Vec<Subcategory>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/categories", get(list_categories))
}

/// The static deal taxonomy, subcategories nested under their category.
async fn list_categories(State(state): State<AppState>) -> AppResult<Json<serde_json::Value>> {
    let conn = state.db.get()?;

    let categories = query_categories(&conn)?;
    let subcategories = query_subcategories(&conn)?;

    let nested: Vec<CategoryWithSubs> = categories
        .into_iter()
        .map(|category| {
            let subs = subcategories
                .iter()
                .filter(|s| s.category_id == category.id)
                .cloned()
                .collect();
            CategoryWithSubs {
                category,
                subcategories: subs,
            }
        })
        .collect();

    Ok(Json(json!({ "categories": nested })))
}

fn query_categories(conn: &rusqlite::Connection) -> Result<Vec<Category>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, slug, description, color, created_at
         FROM categories
         ORDER BY name",
    )?;

    let categories = stmt
        .query_map([], |row| {
            Ok(Category {
                id: row.get(0)?,
                name: row.get(1)?,
                slug: row.get(2)?,
                description: row.get(3)?,
                color: row.get(4)?,
                created_at: row.get(5)?,
            })
        })?
        .filter_map(|r| r.ok())
        .collect();

    Ok(categories)
}

fn query_subcategories(conn: &rusqlite::Connection) -> Result<Vec<Subcategory>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, slug, description, category_id, created_at
         FROM subcategories
         ORDER BY name",
    )?;

    let subcategories = stmt
        .query_map([], |row| {
            Ok(Subcategory {
                id: row.get(0)?,
                name: row.get(1)?,
                slug: row.get(2)?,
                description: row.get(3)?,
                category_id: row.get(4)?,
                created_at: row.get(5)?,
            })
        })?
        .filter_map(|r| r.ok())
        .collect();

    Ok(subcategories)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[test]
    fn categories_are_ordered_by_name() {
        let pool = db::test_pool();
        let conn = pool.get().unwrap();
        let categories = query_categories(&conn).unwrap();
        assert_eq!(categories.len(), 8);
        let names: Vec<&str> = categories.iter().map(|c| c.name.as_str()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[test]
    fn every_subcategory_belongs_to_a_seeded_category() {
        let pool = db::test_pool();
        let conn = pool.get().unwrap();
        let categories = query_categories(&conn).unwrap();
        let subcategories = query_subcategories(&conn).unwrap();
        assert_eq!(subcategories.len(), 39);
        for sub in &subcategories {
            assert!(categories.iter().any(|c| c.id == sub.category_id));
        }
    }
}
