//! JSON endpoints consumed by the dashboard.

use std::sync::Arc;

use {
    axum::{
        Json,
        extract::State,
        http::StatusCode,
        response::{IntoResponse, Response},
    },
    serde::{Deserialize, Serialize},
    ustoz_channels::DashboardReplyError,
    ustoz_common::RequesterId,
    ustoz_routing::{QuestionView, RequesterView, RouterError},
};

use crate::state::GatewayState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyRequest {
    pub requester_id: RequesterId,
    pub text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MuteRequest {
    pub requester_id: RequesterId,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Outcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Error half of every endpoint: a status plus an [`Outcome`] body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<RouterError> for ApiError {
    fn from(e: RouterError) -> Self {
        tracing::error!(error = %e, "dashboard request failed");
        Self::internal("internal error")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Outcome {
            success: false,
            error: Some(self.message),
        };
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

fn ok() -> ApiResult<Outcome> {
    Ok(Json(Outcome {
        success: true,
        error: None,
    }))
}

pub async fn list_questions(State(state): State<Arc<GatewayState>>) -> ApiResult<Vec<QuestionView>> {
    Ok(Json(state.router.list_active_questions().await?))
}

pub async fn list_requesters(
    State(state): State<Arc<GatewayState>>,
) -> ApiResult<Vec<RequesterView>> {
    Ok(Json(state.router.list_active_requesters().await?))
}

pub async fn reply(
    State(state): State<Arc<GatewayState>>,
    Json(request): Json<ReplyRequest>,
) -> ApiResult<Outcome> {
    let text = request.text.trim();
    if text.is_empty() {
        return Err(ApiError::bad_request("reply text is empty"));
    }
    match state.relay.reply_from_dashboard(request.requester_id, text).await {
        Ok(()) => ok(),
        Err(DashboardReplyError::Muted(id)) => {
            Err(ApiError::bad_request(format!("requester {id} is muted")))
        },
        Err(DashboardReplyError::Delivery(e)) => {
            tracing::warn!(requester_id = %request.requester_id, error = %e, "dashboard reply not delivered");
            Err(ApiError::internal("message could not be delivered"))
        },
        Err(DashboardReplyError::Router(e)) => Err(e.into()),
    }
}

pub async fn mute(
    State(state): State<Arc<GatewayState>>,
    Json(request): Json<MuteRequest>,
) -> ApiResult<Outcome> {
    state.router.mute_requester(request.requester_id).await?;
    ok()
}
