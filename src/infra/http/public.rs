use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};

use crate::{
    application::{
        error::HttpError,
        feed::FeedService,
        pagination::Page,
    },
    domain::entities::{GroupRecord, PostRecord, UserRecord},
};

use super::middleware::{log_responses, set_request_context};

#[derive(Clone)]
pub struct HttpState {
    pub feed: Arc<FeedService>,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/group/{slug}/", get(group_posts))
        .route("/profile/{username}/", get(profile))
        .route("/_health", get(health))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PageQuery {
    page: Option<String>,
}

#[derive(Debug, Serialize)]
struct PageBody {
    number: u64,
    num_pages: u64,
    count: u64,
    has_next: bool,
    has_previous: bool,
    next_page_number: Option<u64>,
    previous_page_number: Option<u64>,
    start_index: u64,
    end_index: u64,
    posts: Vec<PostRecord>,
}

impl From<Page<PostRecord>> for PageBody {
    fn from(page: Page<PostRecord>) -> Self {
        Self {
            number: page.number(),
            num_pages: page.num_pages(),
            count: page.count(),
            has_next: page.has_next(),
            has_previous: page.has_previous(),
            next_page_number: page.next_page_number().ok(),
            previous_page_number: page.previous_page_number().ok(),
            start_index: page.start_index(),
            end_index: page.end_index(),
            posts: page.into_items(),
        }
    }
}

#[derive(Debug, Serialize)]
struct IndexBody {
    page: PageBody,
}

#[derive(Debug, Serialize)]
struct GroupBody {
    group: GroupRecord,
    page: PageBody,
}

#[derive(Debug, Serialize)]
struct ProfileBody {
    author: UserRecord,
    page: PageBody,
}

async fn index(
    State(state): State<HttpState>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, HttpError> {
    let view = state.feed.index(query.page.as_deref()).await?;
    Ok(Json(IndexBody {
        page: view.page.into(),
    }))
}

async fn group_posts(
    State(state): State<HttpState>,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, HttpError> {
    let view = state.feed.group(&slug, query.page.as_deref()).await?;
    Ok(Json(GroupBody {
        group: view.group,
        page: view.page.into(),
    }))
}

async fn profile(
    State(state): State<HttpState>,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, HttpError> {
    let view = state
        .feed
        .profile(&username, None, query.page.as_deref())
        .await?;
    Ok(Json(ProfileBody {
        author: view.author,
        page: view.page.into(),
    }))
}

async fn health() -> Response {
    StatusCode::NO_CONTENT.into_response()
}
