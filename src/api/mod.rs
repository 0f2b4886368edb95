use std::convert::Infallible;

use serde::{de::DeserializeOwned, Serialize};
use warp::{
    body::BodyDeserializeError,
    http::StatusCode,
    reject::{
        InvalidHeader, InvalidQuery, LengthRequired, MethodNotAllowed, MissingHeader,
        PayloadTooLarge, UnsupportedMediaType,
    },
    reply::Response,
    Filter, Rejection, Reply,
};

use crate::{
    constants::JSON_BODY_LIMIT,
    context::Context,
    error::{Error, ErrorKind},
    schema::LabelKind,
};

pub mod labels;
pub mod recipes;
pub mod users;

/// The whole HTTP surface, with rejections already turned into JSON replies.
pub fn routes(ctx: Context) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let media = warp::path("media")
        .and(warp::get())
        .and(warp::fs::dir(ctx.media.root().to_path_buf()));

    users::routes(ctx.clone())
        .or(recipes::routes(ctx.clone()))
        .or(labels::routes(ctx.clone(), LabelKind::Tag))
        .or(labels::routes(ctx, LabelKind::Ingredient))
        .or(media)
        .recover(handle_rejection)
        .with(warp::log("recipe_api::access"))
}

pub(crate) fn json_body<T>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone
where
    T: DeserializeOwned + Send,
{
    warp::body::content_length_limit(JSON_BODY_LIMIT).and(warp::body::json())
}

pub(crate) fn reply_json<T: Serialize>(value: &T, status: StatusCode) -> Response {
    warp::reply::with_status(warp::reply::json(value), status).into_response()
}

pub(crate) fn no_content() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

pub async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    let error = if let Some(e) = err.find::<Error>() {
        e.clone()
    } else if let Some(e) = err.find::<BodyDeserializeError>() {
        ErrorKind::InvalidRequest.new(&format!("JSON parse error - {e}"))
    } else if err.find::<PayloadTooLarge>().is_some() {
        ErrorKind::InvalidRequest.new("Request body is too large.")
    } else if err.find::<LengthRequired>().is_some() {
        ErrorKind::InvalidRequest.new("A Content-Length header is required.")
    } else if err.find::<UnsupportedMediaType>().is_some() {
        ErrorKind::InvalidRequest.new("Unsupported media type in request.")
    } else if let Some(e) = err.find::<InvalidQuery>() {
        ErrorKind::InvalidRequest.new(&e.to_string())
    } else if let Some(e) = err.find::<InvalidHeader>() {
        ErrorKind::InvalidRequest.new(&e.to_string())
    } else if let Some(e) = err.find::<MissingHeader>() {
        ErrorKind::InvalidRequest.new(&e.to_string())
    } else if err.find::<MethodNotAllowed>().is_some() {
        ErrorKind::MethodNotAllowed.default()
    } else if err.is_not_found() {
        ErrorKind::NotFound.default()
    } else {
        log::error!("Unhandled rejection: {err:?}");
        ErrorKind::InternalServerError.default()
    };

    Ok(error.into_response())
}
