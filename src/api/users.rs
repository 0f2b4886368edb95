use serde::Serialize;
use serde_json::json;
use warp::{http::StatusCode, reply::Response, Filter, Rejection};

use super::{json_body, no_content, reply_json};
use crate::{
    accounts,
    context::{with_context, Context},
    error::Error,
    form::{ProfileForm, SignupForm, TokenForm, WriteMode},
    middleware::with_session,
    schema::{User, UserRole},
    session::{issue_token, revoke_session, SessionData},
};

/// Public account fields; the password never leaves the server.
#[derive(Debug, Serialize)]
pub struct UserView<'a> {
    pub email: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
}

impl<'a> From<&'a User> for UserView<'a> {
    fn from(user: &'a User) -> Self {
        Self {
            email: &user.email,
            first_name: &user.first_name,
            last_name: &user.last_name,
        }
    }
}

pub fn routes(ctx: Context) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let create = warp::path!("users" / "create")
        .and(warp::post())
        .and(with_context(ctx.clone()))
        .and(json_body::<SignupForm>())
        .and_then(create_user);

    let login = warp::path!("users" / "token")
        .and(warp::post())
        .and(with_context(ctx.clone()))
        .and(json_body::<TokenForm>())
        .and_then(create_token);

    let logout = warp::path!("users" / "token")
        .and(warp::delete())
        .and(with_context(ctx.clone()))
        .and(with_session(ctx.clone()))
        .and_then(delete_token);

    let me = warp::path!("users" / "me");

    let retrieve = me
        .and(warp::get())
        .and(with_session(ctx.clone()))
        .and_then(retrieve_me);

    let partial_update = me
        .and(warp::patch())
        .and(with_context(ctx.clone()))
        .and(with_session(ctx.clone()))
        .and(json_body::<ProfileForm>())
        .and_then(|ctx: Context, session: SessionData, form: ProfileForm| {
            update_me(ctx, session, form, WriteMode::Partial)
        });

    let update = me
        .and(warp::put())
        .and(with_context(ctx.clone()))
        .and(with_session(ctx))
        .and(json_body::<ProfileForm>())
        .and_then(|ctx: Context, session: SessionData, form: ProfileForm| {
            update_me(ctx, session, form, WriteMode::Full)
        });

    create
        .or(login)
        .unify()
        .or(logout)
        .unify()
        .or(retrieve)
        .unify()
        .or(partial_update)
        .unify()
        .or(update)
        .unify()
}

async fn create_user(ctx: Context, form: SignupForm) -> Result<Response, Rejection> {
    let signup = form.validate().map_err(Error::from)?;
    let user = accounts::register(ctx.store.as_ref(), &ctx.hasher, signup, UserRole::User).await?;

    Ok(reply_json(&UserView::from(&user), StatusCode::CREATED))
}

async fn create_token(ctx: Context, form: TokenForm) -> Result<Response, Rejection> {
    let (email, password) = form.validate().map_err(Error::from)?;
    let user = accounts::authenticate(ctx.store.as_ref(), &ctx.hasher, &email, &password).await?;
    let token = issue_token(ctx.store.as_ref(), ctx.token_lifetime, &user).await?;

    Ok(reply_json(&json!({ "token": token }), StatusCode::OK))
}

async fn delete_token(ctx: Context, session: SessionData) -> Result<Response, Rejection> {
    revoke_session(ctx.store.as_ref(), &session).await?;
    Ok(no_content())
}

async fn retrieve_me(session: SessionData) -> Result<Response, Rejection> {
    Ok(reply_json(&UserView::from(&session.user), StatusCode::OK))
}

async fn update_me(
    ctx: Context,
    session: SessionData,
    form: ProfileForm,
    mode: WriteMode,
) -> Result<Response, Rejection> {
    let changes = form.validate(mode).map_err(Error::from)?;
    let user =
        accounts::update_profile(ctx.store.as_ref(), &ctx.hasher, &session.user, changes).await?;

    Ok(reply_json(&UserView::from(&user), StatusCode::OK))
}
