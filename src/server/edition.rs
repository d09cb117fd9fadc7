//! `POST /api/edition/*` - one route per service operation
//!
//! Every response is an [`Outcome`]; only the allow-list gate answers with a
//! bare status.

use axum::{extract::State, Json};
use serde::Deserialize;

use crate::edition::{
    CheckedOut, Committed, DiffResult, LastCommits, PreparedEdition, PublishRequest, PublishType,
    Published, Synced,
};
use crate::error::Outcome;
use crate::git::{Credentials, Divergence};

use super::error::ApiErr;
use super::AppState;

/// Request body shared by every edition route; absent fields are empty
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EditionRequest {
    pub git_url: String,
    pub git_path: String,
    pub git_username: String,
    pub git_password: String,
    pub hash: String,
    pub session: String,
    pub commit_msg: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub pr_title: String,
    pub pr_body: String,
    pub target: String,
}

impl EditionRequest {
    fn credentials(&self) -> Credentials {
        Credentials::new(self.git_username.clone(), self.git_password.clone())
    }
}

type Reply<T> = Result<Json<Outcome<T>>, ApiErr>;

/// Disallowed repositories never reach the service
fn admit(state: &AppState, req: &EditionRequest) -> Result<(), ApiErr> {
    if state.service.is_allowed(&req.git_url) {
        Ok(())
    } else {
        Err(ApiErr::forbidden("Repository not allowed"))
    }
}

pub async fn checkout_edition(
    State(state): State<AppState>,
    Json(req): Json<EditionRequest>,
) -> Reply<Synced> {
    admit(&state, &req)?;
    let result = state
        .service
        .checkout_edition(&req.git_url, &req.git_path)
        .await;
    Ok(Json(result.into()))
}

pub async fn prepare_edition(
    State(state): State<AppState>,
    Json(req): Json<EditionRequest>,
) -> Reply<PreparedEdition> {
    admit(&state, &req)?;
    let result = state
        .service
        .prepare_edition(&req.git_url, &req.git_path)
        .await;
    Ok(Json(result.into()))
}

pub async fn history_edition(
    State(state): State<AppState>,
    Json(req): Json<EditionRequest>,
) -> Reply<Divergence> {
    admit(&state, &req)?;
    let result = state.service.history(&req.git_url, &req.git_path).await;
    Ok(Json(result.into()))
}

pub async fn checkout_hash_edition(
    State(state): State<AppState>,
    Json(req): Json<EditionRequest>,
) -> Reply<CheckedOut> {
    admit(&state, &req)?;
    let result = state.service.checkout_hash(&req.git_url, &req.hash).await;
    Ok(Json(result.into()))
}

pub async fn last_commits(
    State(state): State<AppState>,
    Json(req): Json<EditionRequest>,
) -> Reply<LastCommits> {
    admit(&state, &req)?;
    let result = state
        .service
        .last_commits(&req.git_url, &req.git_path)
        .await;
    Ok(Json(result.into()))
}

pub async fn commit_edition(
    State(state): State<AppState>,
    Json(req): Json<EditionRequest>,
) -> Reply<Committed> {
    admit(&state, &req)?;
    let result = state
        .service
        .commit_edition(
            &req.git_url,
            &req.git_path,
            &req.session,
            &req.commit_msg,
            &req.credentials(),
        )
        .await;
    Ok(Json(result.into()))
}

pub async fn publish_edition(
    State(state): State<AppState>,
    Json(req): Json<EditionRequest>,
) -> Reply<Published> {
    admit(&state, &req)?;
    let request = PublishRequest {
        kind: PublishType::from_label(&req.kind),
        title: req.pr_title.clone(),
        body: req.pr_body.clone(),
        credentials: req.credentials(),
    };
    let result = state
        .service
        .publish_edition(&req.git_url, &req.git_path, &request)
        .await;
    Ok(Json(result.into()))
}

pub async fn diff_edition(
    State(state): State<AppState>,
    Json(req): Json<EditionRequest>,
) -> Reply<DiffResult> {
    admit(&state, &req)?;
    let result = state
        .service
        .diff_edition(&req.git_url, &req.git_path, &req.hash, &req.target)
        .await;
    Ok(Json(result.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_field_names() {
        let req: EditionRequest = serde_json::from_value(serde_json::json!({
            "gitUrl": "https://gitlab.com/team/tasks.git",
            "gitPath": "tasks/algo",
            "gitUsername": "alice",
            "commitMsg": "Fix",
            "type": "mpr",
            "prTitle": "Title",
        }))
        .unwrap();

        assert_eq!(req.git_url, "https://gitlab.com/team/tasks.git");
        assert_eq!(req.git_path, "tasks/algo");
        assert_eq!(req.commit_msg, "Fix");
        assert_eq!(req.kind, "mpr");
        assert_eq!(req.pr_title, "Title");
        assert_eq!(req.session, "");
        assert_eq!(req.credentials(), Credentials::new("alice", ""));
    }
}
