use std::{convert::Infallible, sync::Arc};

use warp::Filter;

use crate::{cryptography::Hasher, media::MediaStorage, session::TokenLifetime, store::Store};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct Context {
    pub store: Arc<dyn Store>,
    pub hasher: Hasher,
    pub media: MediaStorage,
    pub token_lifetime: TokenLifetime,
}

impl Context {
    pub fn new(store: Arc<dyn Store>, hasher: Hasher, media: MediaStorage) -> Self {
        Self {
            store,
            hasher,
            media,
            token_lifetime: TokenLifetime::default(),
        }
    }

    pub fn with_token_lifetime(mut self, token_lifetime: TokenLifetime) -> Self {
        self.token_lifetime = token_lifetime;
        self
    }
}

pub fn with_context(ctx: Context) -> impl Filter<Extract = (Context,), Error = Infallible> + Clone {
    warp::any().map(move || ctx.clone())
}
