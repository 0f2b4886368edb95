use warp::{http::StatusCode, reply::Response, Filter, Rejection};

use super::{json_body, no_content, reply_json};
use crate::{
    context::{with_context, Context},
    error::{Error, ErrorKind},
    form::{LabelForm, LabelQuery, WriteMode},
    middleware::with_session,
    schema::{Id, LabelKind},
    session::SessionData,
};

/// Routes for one label kind: `/tags` or `/ingredients`. Labels are only
/// created through recipe writes, so there is no create route.
pub fn routes(
    ctx: Context,
    kind: LabelKind,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let base = warp::path(kind.path());
    let detail = base.and(warp::path::param::<Id>()).and(warp::path::end());

    let list = base
        .and(warp::path::end())
        .and(warp::get())
        .and(with_context(ctx.clone()))
        .and(with_session(ctx.clone()))
        .and(warp::query::<LabelQuery>())
        .and_then(move |ctx: Context, session: SessionData, query: LabelQuery| {
            list_labels(kind, ctx, session, query)
        });

    let retrieve = detail
        .and(warp::get())
        .and(with_context(ctx.clone()))
        .and(with_session(ctx.clone()))
        .and_then(move |id: Id, ctx: Context, session: SessionData| {
            retrieve_label(kind, id, ctx, session)
        });

    let partial_update = detail
        .and(warp::patch())
        .and(with_context(ctx.clone()))
        .and(with_session(ctx.clone()))
        .and(json_body::<LabelForm>())
        .and_then(
            move |id: Id, ctx: Context, session: SessionData, form: LabelForm| {
                update_label(kind, id, ctx, session, form, WriteMode::Partial)
            },
        );

    let update = detail
        .and(warp::put())
        .and(with_context(ctx.clone()))
        .and(with_session(ctx.clone()))
        .and(json_body::<LabelForm>())
        .and_then(
            move |id: Id, ctx: Context, session: SessionData, form: LabelForm| {
                update_label(kind, id, ctx, session, form, WriteMode::Full)
            },
        );

    let delete = detail
        .and(warp::delete())
        .and(with_context(ctx.clone()))
        .and(with_session(ctx))
        .and_then(move |id: Id, ctx: Context, session: SessionData| {
            delete_label(kind, id, ctx, session)
        });

    list.or(retrieve)
        .unify()
        .or(partial_update)
        .unify()
        .or(update)
        .unify()
        .or(delete)
        .unify()
}

fn not_found() -> Rejection {
    ErrorKind::NotFound.default().into()
}

async fn list_labels(
    kind: LabelKind,
    ctx: Context,
    session: SessionData,
    query: LabelQuery,
) -> Result<Response, Rejection> {
    let labels = ctx
        .store
        .list_labels(kind, session.user_id(), query.assigned_only()?)
        .await?;

    Ok(reply_json(&labels, StatusCode::OK))
}

async fn retrieve_label(
    kind: LabelKind,
    id: Id,
    ctx: Context,
    session: SessionData,
) -> Result<Response, Rejection> {
    let label = ctx
        .store
        .get_label(kind, session.user_id(), id)
        .await?
        .ok_or_else(not_found)?;

    Ok(reply_json(&label, StatusCode::OK))
}

async fn update_label(
    kind: LabelKind,
    id: Id,
    ctx: Context,
    session: SessionData,
    form: LabelForm,
    mode: WriteMode,
) -> Result<Response, Rejection> {
    let user_id = session.user_id();
    let name = form.validate(mode).map_err(Error::from)?;

    // an empty PATCH still has to find the row
    let label = match name {
        Some(name) => ctx.store.rename_label(kind, user_id, id, &name).await?,
        None => ctx.store.get_label(kind, user_id, id).await?,
    }
    .ok_or_else(not_found)?;

    log::debug!("User {user_id} updated {} {id}", kind.noun());
    Ok(reply_json(&label, StatusCode::OK))
}

async fn delete_label(
    kind: LabelKind,
    id: Id,
    ctx: Context,
    session: SessionData,
) -> Result<Response, Rejection> {
    if !ctx.store.delete_label(kind, session.user_id(), id).await? {
        return Err(not_found());
    }

    log::debug!("User {} deleted {} {id}", session.user_id(), kind.noun());
    Ok(no_content())
}
