use crate::{
    actions::labels::{list_recipe_labels, set_recipe_labels},
    error::QueryError,
    schema::{Id, LabelKind, Recipe, RecipeChanges, RecipeDraft, RecipeFilter, RecipeRow},
};

use sqlx::{PgConnection, Pool, Postgres};

/// Attaches tags and ingredients to already fetched rows, keeping row order.
async fn hydrate(conn: &mut PgConnection, rows: Vec<RecipeRow>) -> Result<Vec<Recipe>, QueryError> {
    if rows.is_empty() {
        return Ok(vec![]);
    }

    let ids: Vec<Id> = rows.iter().map(|row| row.id).collect();
    let mut tags = list_recipe_labels(&mut *conn, LabelKind::Tag, &ids).await?;
    let mut ingredients = list_recipe_labels(&mut *conn, LabelKind::Ingredient, &ids).await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let recipe_tags = tags.remove(&row.id).unwrap_or_default();
            let recipe_ingredients = ingredients.remove(&row.id).unwrap_or_default();
            Recipe::from_row(row, recipe_tags, recipe_ingredients)
        })
        .collect())
}

async fn fetch_recipe(
    conn: &mut PgConnection,
    user_id: Id,
    id: Id,
) -> Result<Option<Recipe>, QueryError> {
    let row: Option<RecipeRow> =
        sqlx::query_as("SELECT * FROM recipes WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .fetch_optional(&mut *conn)
            .await?;

    match row {
        Some(row) => Ok(hydrate(conn, vec![row]).await?.pop()),
        None => Ok(None),
    }
}

pub async fn list_recipes(
    pool: &Pool<Postgres>,
    user_id: Id,
    filter: &RecipeFilter,
) -> Result<Vec<Recipe>, QueryError> {
    let mut conn = pool.acquire().await?;

    let rows: Vec<RecipeRow> = sqlx::query_as(
        "
        SELECT r.*
        FROM recipes r
        WHERE r.user_id = $1
        AND (cardinality($2::bigint[]) = 0 OR EXISTS (
            SELECT 1 FROM recipe_tags rt WHERE rt.recipe_id = r.id AND rt.tag_id = ANY($2)
        ))
        AND (cardinality($3::bigint[]) = 0 OR EXISTS (
            SELECT 1 FROM recipe_ingredients ri WHERE ri.recipe_id = r.id AND ri.ingredient_id = ANY($3)
        ))
        ORDER BY r.id DESC
    ",
    )
    .bind(user_id)
    .bind(&filter.tags)
    .bind(&filter.ingredients)
    .fetch_all(&mut *conn)
    .await?;

    hydrate(&mut conn, rows).await
}

pub async fn get_recipe(
    pool: &Pool<Postgres>,
    user_id: Id,
    id: Id,
) -> Result<Option<Recipe>, QueryError> {
    let mut conn = pool.acquire().await?;
    fetch_recipe(&mut conn, user_id, id).await
}

pub async fn create_recipe(
    pool: &Pool<Postgres>,
    user_id: Id,
    draft: RecipeDraft,
) -> Result<Recipe, QueryError> {
    let mut tr = pool.begin().await?;

    let id: (Id,) = sqlx::query_as(
        "
        INSERT INTO recipes (user_id, title, time_minutes, price, description, link)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id
    ",
    )
    .bind(user_id)
    .bind(&draft.title)
    .bind(draft.time_minutes)
    .bind(draft.price)
    .bind(&draft.description)
    .bind(&draft.link)
    .fetch_one(&mut *tr)
    .await?;

    for kind in [LabelKind::Tag, LabelKind::Ingredient] {
        set_recipe_labels(&mut tr, kind, id.0, user_id, draft.labels(kind)).await?;
    }

    let recipe = fetch_recipe(&mut tr, user_id, id.0)
        .await?
        .ok_or(QueryError::Sqlx(sqlx::Error::RowNotFound))?;

    tr.commit().await?;
    Ok(recipe)
}

pub async fn update_recipe(
    pool: &Pool<Postgres>,
    user_id: Id,
    id: Id,
    changes: RecipeChanges,
) -> Result<Option<Recipe>, QueryError> {
    let mut tr = pool.begin().await?;

    let updated: Option<(Id,)> = sqlx::query_as(
        "
        UPDATE recipes SET
        title = COALESCE($3, title),
        time_minutes = COALESCE($4, time_minutes),
        price = COALESCE($5, price),
        description = COALESCE($6, description),
        link = COALESCE($7, link)
        WHERE id = $1 AND user_id = $2
        RETURNING id
    ",
    )
    .bind(id)
    .bind(user_id)
    .bind(&changes.title)
    .bind(changes.time_minutes)
    .bind(changes.price)
    .bind(&changes.description)
    .bind(&changes.link)
    .fetch_optional(&mut *tr)
    .await?;

    if updated.is_none() {
        return Ok(None);
    }

    for kind in [LabelKind::Tag, LabelKind::Ingredient] {
        if let Some(names) = changes.labels(kind) {
            set_recipe_labels(&mut tr, kind, id, user_id, names).await?;
        }
    }

    let recipe = fetch_recipe(&mut tr, user_id, id).await?;

    tr.commit().await?;
    Ok(recipe)
}

/// Returns the updated recipe along with the image it replaced.
pub async fn set_recipe_image(
    pool: &Pool<Postgres>,
    user_id: Id,
    id: Id,
    image: Option<String>,
) -> Result<Option<(Recipe, Option<String>)>, QueryError> {
    let mut tr = pool.begin().await?;

    let previous: Option<(Option<String>,)> =
        sqlx::query_as("SELECT image FROM recipes WHERE id = $1 AND user_id = $2 FOR UPDATE")
            .bind(id)
            .bind(user_id)
            .fetch_optional(&mut *tr)
            .await?;

    let Some((previous,)) = previous else {
        return Ok(None);
    };

    sqlx::query("UPDATE recipes SET image = $3 WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .bind(image)
        .execute(&mut *tr)
        .await?;

    let recipe = fetch_recipe(&mut tr, user_id, id).await?;

    tr.commit().await?;
    Ok(recipe.map(|recipe| (recipe, previous)))
}

/// Link rows cascade; shared labels stay.
pub async fn delete_recipe(pool: &Pool<Postgres>, user_id: Id, id: Id) -> Result<bool, QueryError> {
    let result = sqlx::query("DELETE FROM recipes WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
