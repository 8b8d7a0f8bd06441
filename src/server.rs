use std::net::SocketAddr;

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Local, Utc};
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;

use crate::billing;
use crate::db;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub cron_secret: Option<String>,
    pub webhook_secret: Option<String>,
}

pub async fn serve(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let app = Router::new()
        .route("/api/cron/update-student-memberships", get(run_membership_sweep))
        .route("/api/webhooks/checkout", post(handle_checkout_webhook))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

/// Shared-secret check for the scheduled trigger. A missing configured
/// secret rejects every caller.
fn bearer_authorized(header: Option<&str>, secret: Option<&str>) -> bool {
    match (header, secret) {
        (Some(value), Some(secret)) => value.trim() == format!("Bearer {secret}"),
        _ => false,
    }
}

async fn run_membership_sweep(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    if !bearer_authorized(auth, state.cron_secret.as_deref()) {
        return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
    }

    let today = Local::now().date_naive();
    match billing::sweep_overdue_memberships(&state.pool, today).await {
        Ok(updated) => Json(json!({ "updated": updated })).into_response(),
        Err(err) => {
            log::error!("membership sweep failed: {err:#}");
            (StatusCode::INTERNAL_SERVER_ERROR, "sweep failed").into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
struct CheckoutCompleted {
    customer_id: Option<String>,
    subscription_id: Option<String>,
    #[serde(default)]
    metadata: CheckoutMetadata,
    current_period_start: Option<i64>,
    current_period_end: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct CheckoutMetadata {
    user_id: Option<String>,
    gym_name: Option<String>,
    slug: Option<String>,
    timezone: Option<String>,
    plan_type: Option<String>,
}

fn period_timestamp(seconds: Option<i64>) -> Option<DateTime<Utc>> {
    seconds.and_then(|s| DateTime::from_timestamp(s, 0))
}

/// Consumes a completed-checkout event from the payment processor and
/// provisions the purchased academy. Idempotent per processor customer id;
/// malformed events are acknowledged so the processor stops retrying.
async fn handle_checkout_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(event): Json<CheckoutCompleted>,
) -> Response {
    let Some(expected) = state.webhook_secret.as_deref() else {
        return (StatusCode::SERVICE_UNAVAILABLE, "Webhook secret not configured").into_response();
    };

    let signature = headers
        .get("x-webhook-signature")
        .and_then(|value| value.to_str().ok());
    if signature != Some(expected) {
        return (StatusCode::BAD_REQUEST, "Invalid signature").into_response();
    }

    let (Some(customer_id), Some(subscription_id)) =
        (event.customer_id.clone(), event.subscription_id.clone())
    else {
        log::error!("checkout event missing processor ids");
        return (StatusCode::OK, "Missing processor ids").into_response();
    };

    let metadata = event.metadata;
    let (Some(user_id), Some(gym_name), Some(slug), Some(timezone), Some(plan_type)) = (
        metadata.user_id,
        metadata.gym_name,
        metadata.slug,
        metadata.timezone,
        metadata.plan_type,
    ) else {
        log::error!("checkout event for customer {customer_id} missing metadata");
        return (StatusCode::OK, "Missing metadata").into_response();
    };

    match db::subscription_exists_for_customer(&state.pool, &customer_id).await {
        Ok(true) => return (StatusCode::OK, "OK").into_response(),
        Ok(false) => {}
        Err(err) => {
            log::error!("subscription lookup failed for customer {customer_id}: {err:#}");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Lookup failed").into_response();
        }
    }

    let provisioned = db::ProvisionedAcademy {
        user_id,
        gym_name,
        slug,
        timezone,
        plan_type,
        customer_id: customer_id.clone(),
        subscription_id,
        current_period_start: period_timestamp(event.current_period_start),
        current_period_end: period_timestamp(event.current_period_end),
    };

    match db::provision_academy(&state.pool, &provisioned).await {
        Ok(gym_id) => {
            log::info!("provisioned academy {gym_id} for customer {customer_id}");
        }
        Err(err) => {
            log::error!("failed to provision academy for customer {customer_id}: {err:#}");
        }
    }

    (StatusCode::OK, "OK").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_check_requires_exact_match() {
        assert!(bearer_authorized(Some("Bearer s3cret"), Some("s3cret")));
        assert!(bearer_authorized(Some("  Bearer s3cret  "), Some("s3cret")));
        assert!(!bearer_authorized(Some("Bearer other"), Some("s3cret")));
        assert!(!bearer_authorized(Some("s3cret"), Some("s3cret")));
        assert!(!bearer_authorized(None, Some("s3cret")));
    }

    #[test]
    fn missing_secret_rejects_everyone() {
        assert!(!bearer_authorized(Some("Bearer anything"), None));
        assert!(!bearer_authorized(None, None));
    }

    #[test]
    fn period_timestamps_convert_from_unix_seconds() {
        let ts = period_timestamp(Some(1_700_000_000)).unwrap();
        assert_eq!(ts.timestamp(), 1_700_000_000);
        assert!(period_timestamp(None).is_none());
    }
}
