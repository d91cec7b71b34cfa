//! The five wire operations of spec §6: `start_tally`, `submit_partial`,
//! `finalize`, `verify_result` and `publish_blockchain`, as `axum` JSON
//! routes nested under `/api/v1/elections/{election_id}`.

use axum::extract::Path;
use axum::routing::{get, post};
use axum::{Json, Router};
use tally_types::api::v1::{
    ElectionResultDto, PublishBlockchainResponse, SessionSnapshot, SubmitPartialRequest,
    VerifyResultResponse,
};
use tally_types::error::ErrorKind;
use tally_types::{ElectionId, SessionState};

use crate::TallyApiArgs;
use crate::api::errors::ApiError;
use crate::services::tally_engine::PartialDecryptionSubmission;

/// Builds the `/api/v1` router, with every handler closing over a clone
/// of `args`.
pub(crate) fn routes(args: TallyApiArgs) -> Router {
    Router::new()
        .route(
            "/elections/{election_id}/tally",
            post({
                let args = args.clone();
                move |path| start_tally(args.clone(), path)
            }),
        )
        .route(
            "/elections/{election_id}/tally/partials",
            post({
                let args = args.clone();
                move |path, body| submit_partial(args.clone(), path, body)
            }),
        )
        .route(
            "/elections/{election_id}/tally/finalize",
            post({
                let args = args.clone();
                move |path| finalize(args.clone(), path)
            }),
        )
        .route(
            "/elections/{election_id}/tally/verify",
            get({
                let args = args.clone();
                move |path| verify_result(args.clone(), path)
            }),
        )
        .route(
            "/elections/{election_id}/tally/publish",
            post(move |path| publish_blockchain(args.clone(), path)),
        )
}

fn snapshot_dto(session: crate::services::election_store::TallyingSessionRecord) -> SessionSnapshot {
    SessionSnapshot {
        election_id: session.election_id,
        state: session.state,
        required_trustees: session.required_trustees,
        completed_trustees: session.completed_trustees,
        started_at: session.started_at.to_rfc3339(),
        completed_at: session.completed_at.map(|t| t.to_rfc3339()),
        error_message: session.error_message,
    }
}

async fn start_tally(
    args: TallyApiArgs,
    Path(election_id): Path<ElectionId>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let session = args.engine.start_tally(election_id).await?;
    Ok(Json(snapshot_dto(session)))
}

async fn submit_partial(
    args: TallyApiArgs,
    Path(election_id): Path<ElectionId>,
    Json(request): Json<SubmitPartialRequest>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let candidate_count = request.partials.len();
    if request.proofs.len() != candidate_count {
        return Err(ErrorKind::Domain {
            message: "partials and proofs must have the same length".to_string(),
        }
        .into());
    }

    let mut ordered = request.partials.iter().collect::<Vec<_>>();
    ordered.sort_by_key(|p| p.candidate_position);
    for (expected, partial) in ordered.iter().enumerate() {
        if partial.candidate_position as usize != expected {
            return Err(ErrorKind::Domain {
                message: "partial candidate positions must be 0..M with no gaps".to_string(),
            }
            .into());
        }
    }

    let partials = ordered.iter().map(|p| p.decode()).collect();
    let proofs = request.proofs.iter().map(|p| p.decode()).collect();

    let session = args
        .engine
        .submit_partial(
            election_id,
            PartialDecryptionSubmission {
                trustee_index: request.trustee_index,
                partials,
                proofs,
            },
        )
        .await?;
    Ok(Json(snapshot_dto(session)))
}

async fn finalize(
    args: TallyApiArgs,
    Path(election_id): Path<ElectionId>,
) -> Result<Json<ElectionResultDto>, ApiError> {
    let result = args.engine.finalize(election_id).await?;
    Ok(Json(ElectionResultDto {
        election_id: result.election_id,
        tally: result.tally.into_iter().collect(),
        total_votes: result.total_votes,
        verification_hash: result.verification_hash,
        blockchain_tx_hash: result.blockchain_tx_hash,
    }))
}

async fn verify_result(
    args: TallyApiArgs,
    Path(election_id): Path<ElectionId>,
) -> Result<Json<VerifyResultResponse>, ApiError> {
    let (valid, recomputed_hash) = args.verifier.verify(election_id).await?;
    Ok(Json(VerifyResultResponse {
        valid,
        recomputed_hash,
    }))
}

async fn publish_blockchain(
    args: TallyApiArgs,
    Path(election_id): Path<ElectionId>,
) -> Result<Json<PublishBlockchainResponse>, ApiError> {
    let result = args
        .store
        .get_result(election_id)
        .await?
        .ok_or(ErrorKind::Domain {
            message: format!("no result recorded for election {election_id}"),
        })?;
    let session = args
        .store
        .get_session(election_id)
        .await?
        .ok_or(ErrorKind::Domain {
            message: format!("no tallying session for election {election_id}"),
        })?;
    if !matches!(session.state, SessionState::Completed) {
        return Err(ErrorKind::State {
            message: "cannot publish before the tallying session has completed".to_string(),
        }
        .into());
    }

    let tx_hash = args
        .blockchain
        .publish(election_id, &result.verification_hash)
        .await?;
    args.store
        .set_result_blockchain_tx(election_id, tx_hash.clone())
        .await?;
    Ok(Json(PublishBlockchainResponse { tx_hash }))
}
