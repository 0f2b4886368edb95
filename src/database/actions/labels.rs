use std::collections::HashMap;

use crate::{
    error::QueryError,
    schema::{Id, Label, LabelKind, LinkedLabel},
};

use sqlx::{PgConnection, Pool, Postgres};

pub async fn create_label(
    pool: &Pool<Postgres>,
    kind: LabelKind,
    user_id: Id,
    name: &str,
) -> Result<Label, QueryError> {
    let row: Label = sqlx::query_as(&format!(
        "INSERT INTO {} (user_id, name) VALUES ($1, $2) RETURNING id, user_id, name",
        kind.table()
    ))
    .bind(user_id)
    .bind(name)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

pub async fn list_labels(
    pool: &Pool<Postgres>,
    kind: LabelKind,
    user_id: Id,
    assigned_only: bool,
) -> Result<Vec<Label>, QueryError> {
    let table = kind.table();

    let query = if assigned_only {
        format!(
            "
            SELECT DISTINCT l.id, l.user_id, l.name
            FROM {table} l
            INNER JOIN {link} r ON r.{column} = l.id
            WHERE l.user_id = $1
            ORDER BY l.name COLLATE \"C\" DESC, l.id DESC
        ",
            link = kind.link_table(),
            column = kind.link_column()
        )
    } else {
        format!(
            "SELECT id, user_id, name FROM {table} WHERE user_id = $1 ORDER BY name COLLATE \"C\" DESC, id DESC"
        )
    };

    let rows: Vec<Label> = sqlx::query_as(&query)
        .bind(user_id)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

pub async fn get_label(
    pool: &Pool<Postgres>,
    kind: LabelKind,
    user_id: Id,
    id: Id,
) -> Result<Option<Label>, QueryError> {
    let row: Option<Label> = sqlx::query_as(&format!(
        "SELECT id, user_id, name FROM {} WHERE id = $1 AND user_id = $2",
        kind.table()
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

pub async fn rename_label(
    pool: &Pool<Postgres>,
    kind: LabelKind,
    user_id: Id,
    id: Id,
    name: &str,
) -> Result<Option<Label>, QueryError> {
    let row: Option<Label> = sqlx::query_as(&format!(
        "UPDATE {} SET name = $3 WHERE id = $1 AND user_id = $2 RETURNING id, user_id, name",
        kind.table()
    ))
    .bind(id)
    .bind(user_id)
    .bind(name)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Link rows go with the label; recipes stay.
pub async fn delete_label(
    pool: &Pool<Postgres>,
    kind: LabelKind,
    user_id: Id,
    id: Id,
) -> Result<bool, QueryError> {
    let mut tr = pool.begin().await?;

    let owned: Option<(Id,)> = sqlx::query_as(&format!(
        "SELECT id FROM {} WHERE id = $1 AND user_id = $2 FOR UPDATE",
        kind.table()
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(&mut *tr)
    .await?;

    if owned.is_none() {
        return Ok(false);
    }

    sqlx::query(&format!(
        "DELETE FROM {} WHERE {} = $1",
        kind.link_table(),
        kind.link_column()
    ))
    .bind(id)
    .execute(&mut *tr)
    .await?;

    sqlx::query(&format!("DELETE FROM {} WHERE id = $1", kind.table()))
        .bind(id)
        .execute(&mut *tr)
        .await?;

    tr.commit().await?;
    Ok(true)
}

/// Get-or-create by (owner, name). With duplicate names the oldest row wins.
pub async fn find_or_create_label(
    conn: &mut PgConnection,
    kind: LabelKind,
    user_id: Id,
    name: &str,
) -> Result<Id, QueryError> {
    let existing: Option<(Id,)> = sqlx::query_as(&format!(
        "SELECT id FROM {} WHERE user_id = $1 AND name = $2 ORDER BY id LIMIT 1",
        kind.table()
    ))
    .bind(user_id)
    .bind(name)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some((id,)) = existing {
        return Ok(id);
    }

    let created: (Id,) = sqlx::query_as(&format!(
        "INSERT INTO {} (user_id, name) VALUES ($1, $2) RETURNING id",
        kind.table()
    ))
    .bind(user_id)
    .bind(name)
    .fetch_one(&mut *conn)
    .await?;

    Ok(created.0)
}

/// Replaces the whole label set of a recipe.
pub async fn set_recipe_labels(
    conn: &mut PgConnection,
    kind: LabelKind,
    recipe_id: Id,
    user_id: Id,
    names: &[String],
) -> Result<(), QueryError> {
    let link = kind.link_table();
    let column = kind.link_column();

    sqlx::query(&format!("DELETE FROM {link} WHERE recipe_id = $1"))
        .bind(recipe_id)
        .execute(&mut *conn)
        .await?;

    for name in names {
        let label_id = find_or_create_label(&mut *conn, kind, user_id, name).await?;

        sqlx::query(&format!(
            "INSERT INTO {link} (recipe_id, {column}) VALUES ($1, $2) ON CONFLICT DO NOTHING"
        ))
        .bind(recipe_id)
        .bind(label_id)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Labels of every listed recipe, grouped by recipe id, each group ordered by label id.
pub async fn list_recipe_labels(
    conn: &mut PgConnection,
    kind: LabelKind,
    recipe_ids: &[Id],
) -> Result<HashMap<Id, Vec<Label>>, QueryError> {
    let rows: Vec<LinkedLabel> = sqlx::query_as(&format!(
        "
        SELECT r.recipe_id AS recipe_id, l.id AS id, l.user_id AS user_id, l.name AS name
        FROM {link} r
        INNER JOIN {table} l ON l.id = r.{column}
        WHERE r.recipe_id = ANY($1)
        ORDER BY l.id
    ",
        link = kind.link_table(),
        table = kind.table(),
        column = kind.link_column()
    ))
    .bind(recipe_ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut grouped: HashMap<Id, Vec<Label>> = HashMap::new();
    rows.into_iter().for_each(|row| {
        grouped.entry(row.recipe_id).or_default().push(row.into());
    });

    Ok(grouped)
}
