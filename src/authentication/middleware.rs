use warp::{reject::Rejection, Filter};

use super::session::{verify_session, SessionData};
use crate::context::{with_context, Context};

/// Resolves the `Authorization` header into the calling user, or rejects with 401.
pub fn with_session(
    ctx: Context,
) -> impl Filter<Extract = (SessionData,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization")
        .and(with_context(ctx))
        .and_then(|header: Option<String>, ctx: Context| async move {
            verify_session(ctx.store.as_ref(), ctx.token_lifetime, header.as_deref())
                .await
                .map_err(Rejection::from)
        })
}
