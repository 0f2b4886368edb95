use bytes::BufMut;
use futures_util::TryStreamExt;
use rust_decimal::Decimal;
use serde::Serialize;
use warp::{http::StatusCode, multipart::FormData, reply::Response, Filter, Rejection};

use super::{json_body, no_content, reply_json};
use crate::{
    constants::IMAGE_UPLOAD_LIMIT,
    context::{with_context, Context},
    error::{Error, ErrorKind, FieldErrors},
    form::{RecipeForm, RecipeQuery, WriteMode},
    media::{image_extension, recipe_image_name, sniff_image_format, MediaStorage},
    middleware::with_session,
    schema::{Id, Label, Recipe, RecipeFilter},
    session::SessionData,
};

const INVALID_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";

#[derive(Debug, Serialize)]
pub struct RecipeView<'a> {
    pub id: Id,
    pub title: &'a str,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: &'a str,
    pub tags: &'a [Label],
    pub ingredients: &'a [Label],
}

impl<'a> From<&'a Recipe> for RecipeView<'a> {
    fn from(recipe: &'a Recipe) -> Self {
        Self {
            id: recipe.id,
            title: &recipe.title,
            time_minutes: recipe.time_minutes,
            price: recipe.price,
            link: &recipe.link,
            tags: &recipe.tags,
            ingredients: &recipe.ingredients,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RecipeDetailView<'a> {
    #[serde(flatten)]
    pub summary: RecipeView<'a>,
    pub description: &'a str,
    /// Public URL of the image.
    pub image: Option<String>,
}

impl<'a> RecipeDetailView<'a> {
    pub fn new(recipe: &'a Recipe, media: &MediaStorage) -> Self {
        Self {
            summary: recipe.into(),
            description: &recipe.description,
            image: recipe.image.as_deref().map(|name| media.url(name)),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RecipeImageView {
    pub id: Id,
    pub image: Option<String>,
}

pub fn routes(ctx: Context) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let list = warp::path!("recipes")
        .and(warp::get())
        .and(with_context(ctx.clone()))
        .and(with_session(ctx.clone()))
        .and(warp::query::<RecipeQuery>())
        .and_then(list_recipes);

    let create = warp::path!("recipes")
        .and(warp::post())
        .and(with_context(ctx.clone()))
        .and(with_session(ctx.clone()))
        .and(json_body::<RecipeForm>())
        .and_then(create_recipe);

    let detail = warp::path!("recipes" / Id);

    let retrieve = detail
        .and(warp::get())
        .and(with_context(ctx.clone()))
        .and(with_session(ctx.clone()))
        .and_then(retrieve_recipe);

    let partial_update = detail
        .and(warp::patch())
        .and(with_context(ctx.clone()))
        .and(with_session(ctx.clone()))
        .and(json_body::<RecipeForm>())
        .and_then(
            |id: Id, ctx: Context, session: SessionData, form: RecipeForm| {
                update_recipe(id, ctx, session, form, WriteMode::Partial)
            },
        );

    let update = detail
        .and(warp::put())
        .and(with_context(ctx.clone()))
        .and(with_session(ctx.clone()))
        .and(json_body::<RecipeForm>())
        .and_then(
            |id: Id, ctx: Context, session: SessionData, form: RecipeForm| {
                update_recipe(id, ctx, session, form, WriteMode::Full)
            },
        );

    let delete = detail
        .and(warp::delete())
        .and(with_context(ctx.clone()))
        .and(with_session(ctx.clone()))
        .and_then(delete_recipe);

    let upload = warp::path!("recipes" / Id / "upload-image")
        .and(warp::post())
        .and(with_context(ctx.clone()))
        .and(with_session(ctx))
        .and(warp::multipart::form().max_length(IMAGE_UPLOAD_LIMIT))
        .and_then(upload_image);

    list.or(create)
        .unify()
        .or(retrieve)
        .unify()
        .or(partial_update)
        .unify()
        .or(update)
        .unify()
        .or(delete)
        .unify()
        .or(upload)
        .unify()
}

fn not_found() -> Rejection {
    ErrorKind::NotFound.default().into()
}

async fn list_recipes(
    ctx: Context,
    session: SessionData,
    query: RecipeQuery,
) -> Result<Response, Rejection> {
    let filter = RecipeFilter::try_from(query)?;
    let recipes = ctx.store.list_recipes(session.user_id(), &filter).await?;

    let views: Vec<RecipeView> = recipes.iter().map(RecipeView::from).collect();
    Ok(reply_json(&views, StatusCode::OK))
}

async fn create_recipe(
    ctx: Context,
    session: SessionData,
    form: RecipeForm,
) -> Result<Response, Rejection> {
    let draft = form.into_draft().map_err(Error::from)?;
    let recipe = ctx.store.create_recipe(session.user_id(), draft).await?;

    log::debug!("User {} created recipe {}", session.user_id(), recipe.id);
    Ok(reply_json(
        &RecipeDetailView::new(&recipe, &ctx.media),
        StatusCode::CREATED,
    ))
}

async fn retrieve_recipe(id: Id, ctx: Context, session: SessionData) -> Result<Response, Rejection> {
    let recipe = ctx
        .store
        .get_recipe(session.user_id(), id)
        .await?
        .ok_or_else(not_found)?;

    Ok(reply_json(
        &RecipeDetailView::new(&recipe, &ctx.media),
        StatusCode::OK,
    ))
}

async fn update_recipe(
    id: Id,
    ctx: Context,
    session: SessionData,
    form: RecipeForm,
    mode: WriteMode,
) -> Result<Response, Rejection> {
    let changes = form.validate(mode).map_err(Error::from)?;
    let recipe = ctx
        .store
        .update_recipe(session.user_id(), id, changes)
        .await?
        .ok_or_else(not_found)?;

    Ok(reply_json(
        &RecipeDetailView::new(&recipe, &ctx.media),
        StatusCode::OK,
    ))
}

async fn delete_recipe(id: Id, ctx: Context, session: SessionData) -> Result<Response, Rejection> {
    if !ctx.store.delete_recipe(session.user_id(), id).await? {
        return Err(not_found());
    }

    Ok(no_content())
}

/// First multipart part named `image`, as (file name, content).
async fn read_image_part(form: FormData) -> Result<(String, Vec<u8>), Error> {
    let malformed = |e: warp::Error| ErrorKind::InvalidRequest.new(&format!("Malformed upload - {e}"));
    let mut form = std::pin::pin!(form);

    while let Some(part) = form.try_next().await.map_err(malformed)? {
        if part.name() != "image" {
            continue;
        }

        let filename = part.filename().unwrap_or_default().to_string();
        let content = part
            .stream()
            .try_fold(Vec::new(), |mut content, chunk| async move {
                content.put(chunk);
                Ok(content)
            })
            .await
            .map_err(malformed)?;

        return Ok((filename, content));
    }

    Err(FieldErrors::single("image", "No file was submitted.").into())
}

async fn upload_image(
    id: Id,
    ctx: Context,
    session: SessionData,
    form: FormData,
) -> Result<Response, Rejection> {
    let user_id = session.user_id();
    if ctx.store.get_recipe(user_id, id).await?.is_none() {
        return Err(not_found());
    }

    let (filename, content) = read_image_part(form).await?;

    if content.is_empty() {
        return Err(Error::from(FieldErrors::single("image", "The submitted file is empty.")).into());
    }

    let Some((extension, format)) = image_extension(&filename) else {
        return Err(Error::from(FieldErrors::single("image", INVALID_IMAGE)).into());
    };

    if sniff_image_format(&content) != Some(format) {
        return Err(Error::from(FieldErrors::single("image", INVALID_IMAGE)).into());
    }

    let name = recipe_image_name(&extension);
    ctx.media.save(&name, &content).await.map_err(|e| {
        log::error!("Could not store upload {name}: {e}");
        ErrorKind::InternalServerError.default()
    })?;

    let Some((recipe, previous)) = ctx
        .store
        .set_recipe_image(user_id, id, Some(name.clone()))
        .await?
    else {
        // deleted while uploading
        discard(&ctx.media, &name).await;
        return Err(not_found());
    };

    if let Some(previous) = previous.filter(|previous| *previous != name) {
        discard(&ctx.media, &previous).await;
    }

    log::debug!("User {user_id} uploaded image {name} for recipe {id}");
    Ok(reply_json(
        &RecipeImageView {
            id: recipe.id,
            image: recipe.image.as_deref().map(|image| ctx.media.url(image)),
        },
        StatusCode::OK,
    ))
}

async fn discard(media: &MediaStorage, name: &str) {
    if let Err(e) = media.delete(name).await {
        log::warn!("Could not remove media file {name}: {e}");
    }
}
