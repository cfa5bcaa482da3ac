use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Redirect;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use axum_extra::extract::PrivateCookieJar;
use serde::{Deserialize, Serialize};

use super::config::VaultConfig;
use super::cookies;
use super::error::RoutesError;
use super::state::VaultState;
use crate::audit::AuditSink;
use crate::auth::{Authenticator, Credential};
use crate::catalog::{DataField, FieldCategory};
use crate::flow::{AuthorizationFlow, FlowState};
use crate::negotiator::ConsentIntent;
use crate::types::{FieldId, ServiceId};

/// Create the vault's consent router.
///
/// Mounts, under the configured base path:
///
/// - `POST {base}/sessions` — begin an authorization session
/// - `POST {base}/authenticate` — submit a credential
/// - `GET  {base}/prompt` — enter the consent step, fetch the field catalog
/// - `PUT  {base}/selection` — toggle one field
/// - `POST {base}/decision` — submit the decision; redirects to the
///   relying party with the result payload
pub fn consent_routes<A, S>(config: VaultConfig, flow: AuthorizationFlow<A, S>) -> Router
where
    A: Authenticator,
    S: AuditSink,
{
    let base = config.settings.base_path.clone();
    let state = VaultState::new(Arc::new(flow), config.return_url, config.settings);

    Router::new()
        .route(&format!("{base}/sessions"), post(begin::<A, S>))
        .route(&format!("{base}/authenticate"), post(authenticate::<A, S>))
        .route(&format!("{base}/prompt"), get(prompt::<A, S>))
        .route(&format!("{base}/selection"), put(selection::<A, S>))
        .route(&format!("{base}/decision"), post(decision::<A, S>))
        .with_state(state)
}

// ── Begin ──────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BeginParams {
    service: Option<String>,
    service_name: Option<String>,
}

#[derive(Serialize)]
struct SessionStarted {
    session: String,
}

async fn begin<A: Authenticator, S: AuditSink>(
    State(state): State<VaultState<A, S>>,
    jar: PrivateCookieJar,
    Query(params): Query<BeginParams>,
) -> Result<(PrivateCookieJar, (StatusCode, Json<SessionStarted>)), RoutesError> {
    let service_id = ServiceId::new(
        params.service.unwrap_or_else(|| "unknown-service".into()),
    );
    let service_name = params
        .service_name
        .unwrap_or_else(|| "Banking Service".into());

    let session = state.flow.begin(service_id, service_name);
    let id = state.insert_session(session);

    let cookie = cookies::session_cookie(
        &state.settings.session_cookie_name,
        &id.to_string(),
        state.settings.session_ttl_minutes,
        state.settings.secure_cookies,
    );

    tracing::info!(session = %id, "authorization session started");

    Ok((
        jar.add(cookie),
        (
            StatusCode::CREATED,
            Json(SessionStarted {
                session: id.to_string(),
            }),
        ),
    ))
}

// ── Authenticate ───────────────────────────────────────────────────

async fn authenticate<A: Authenticator, S: AuditSink>(
    State(state): State<VaultState<A, S>>,
    jar: PrivateCookieJar,
    Json(credential): Json<Credential>,
) -> Result<StatusCode, RoutesError> {
    let id = cookies::get_session_id(&jar, &state.settings.session_cookie_name)
        .ok_or(RoutesError::NoSession)?;
    let mut session = state.take_session(id).ok_or(RoutesError::NoSession)?;

    // A session rejected earlier sits at Idle; re-arm it for this attempt.
    if session.state() == FlowState::Idle {
        if let Err(e) = state.flow.retry(&mut session) {
            state.put_session(id, session);
            return Err(e.into());
        }
    }

    let result = state.flow.authenticate(&mut session, credential).await;
    // A rejected session is back at Idle and retryable; keep it live.
    state.put_session(id, session);
    result?;

    Ok(StatusCode::NO_CONTENT)
}

// ── Consent prompt ─────────────────────────────────────────────────

#[derive(Serialize)]
struct CategoryGroup {
    id: &'static str,
    title: &'static str,
    fields: Vec<DataField>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConsentPrompt {
    service: String,
    reason: String,
    categories: Vec<CategoryGroup>,
}

async fn prompt<A: Authenticator, S: AuditSink>(
    State(state): State<VaultState<A, S>>,
    jar: PrivateCookieJar,
) -> Result<Json<ConsentPrompt>, RoutesError> {
    let id = cookies::get_session_id(&jar, &state.settings.session_cookie_name)
        .ok_or(RoutesError::NoSession)?;
    let mut session = state.take_session(id).ok_or(RoutesError::NoSession)?;

    let result = state.flow.request_consent(&mut session);
    let service = session.service_name().to_string();
    state.put_session(id, session);
    let reason = result?;

    let categories = FieldCategory::ALL
        .iter()
        .map(|&category| CategoryGroup {
            id: category.as_str(),
            title: category.title(),
            fields: state
                .flow
                .catalog()
                .fields_by_category(category)
                .cloned()
                .collect(),
        })
        .collect();

    Ok(Json(ConsentPrompt {
        service,
        reason,
        categories,
    }))
}

// ── Selection ──────────────────────────────────────────────────────

#[derive(Deserialize)]
struct SelectionChange {
    field: FieldId,
    included: bool,
}

#[derive(Serialize)]
struct SelectionState {
    selected: Vec<FieldId>,
    satisfied: bool,
}

async fn selection<A: Authenticator, S: AuditSink>(
    State(state): State<VaultState<A, S>>,
    jar: PrivateCookieJar,
    Json(change): Json<SelectionChange>,
) -> Result<Json<SelectionState>, RoutesError> {
    let id = cookies::get_session_id(&jar, &state.settings.session_cookie_name)
        .ok_or(RoutesError::NoSession)?;
    let mut session = state.take_session(id).ok_or(RoutesError::NoSession)?;

    let result = state
        .flow
        .toggle_field(&mut session, &change.field, change.included);
    let snapshot = SelectionState {
        selected: session.selection().iter().cloned().collect(),
        satisfied: session.is_satisfied(),
    };
    state.put_session(id, session);
    result?;

    Ok(Json(snapshot))
}

// ── Decision ───────────────────────────────────────────────────────

#[derive(Deserialize)]
struct DecisionBody {
    intent: ConsentIntent,
}

async fn decision<A: Authenticator, S: AuditSink>(
    State(state): State<VaultState<A, S>>,
    jar: PrivateCookieJar,
    Json(body): Json<DecisionBody>,
) -> Result<(PrivateCookieJar, Redirect), RoutesError> {
    let id = cookies::get_session_id(&jar, &state.settings.session_cookie_name)
        .ok_or(RoutesError::NoSession)?;
    let mut session = state.take_session(id).ok_or(RoutesError::NoSession)?;

    if let Err(e) = state.flow.decide(&mut session, body.intent) {
        state.put_session(id, session);
        return Err(e.into());
    }

    let payload = match state.flow.deliver(&mut session) {
        Ok(payload) => payload,
        Err(e) => {
            state.put_session(id, session);
            return Err(e.into());
        }
    };
    // Terminal: the session is discarded, not put back.

    let mut url = state.return_url.clone();
    payload.append_to(&mut url);

    tracing::info!(session = %id, consent = %payload.consent(), "authorization result delivered");

    let clear = cookies::clear_session_cookie(&state.settings.session_cookie_name);
    Ok((jar.remove(clear), Redirect::to(url.as_str())))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, header};
    use tower::ServiceExt;
    use url::Url;

    use super::*;
    use crate::audit::MemorySink;
    use crate::auth::AuthVerdict;
    use crate::catalog::FieldCatalog;
    use crate::payload::{ConsentVerdict, ReturnPayload};
    use crate::reasons::ReasonResolver;

    struct StaticAuth(AuthVerdict);

    impl Authenticator for StaticAuth {
        async fn authenticate(
            &self,
            _credential: &Credential,
        ) -> Result<AuthVerdict, Box<dyn std::error::Error + Send + Sync>> {
            Ok(self.0)
        }
    }

    fn app(verdict: AuthVerdict) -> Router {
        let flow = AuthorizationFlow::new(
            FieldCatalog::standard(),
            ReasonResolver::standard(),
            StaticAuth(verdict),
            MemorySink::new(),
        );
        let config = VaultConfig::new("https://bank.example.com/return".parse().unwrap())
            .with_secure_cookies(false);
        consent_routes(config, flow)
    }

    async fn send(app: &Router, request: Request<Body>) -> axum::response::Response {
        app.clone().oneshot(request).await.unwrap()
    }

    fn cookie_pair(response: &axum::response::Response) -> String {
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .expect("set-cookie header")
            .to_str()
            .unwrap();
        set_cookie
            .split(';')
            .next()
            .unwrap()
            .to_string()
    }

    fn json_post(uri: &str, cookie: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::COOKIE, cookie)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn begin_session(app: &Router) -> String {
        let response = send(
            app,
            Request::builder()
                .method("POST")
                .uri("/consent/sessions?service=personal-banking&serviceName=Personal%20Banking")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        cookie_pair(&response)
    }

    async fn authenticate_session(app: &Router, cookie: &str) {
        let response = send(
            app,
            json_post(
                "/consent/authenticate",
                cookie,
                r#"{"method":"password","email":"user@example.com","secret":"pw"}"#,
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    async fn enter_consent(app: &Router, cookie: &str) {
        let response = send(
            app,
            Request::builder()
                .uri("/consent/prompt")
                .header(header::COOKIE, cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    async fn toggle(app: &Router, cookie: &str, field: &str) {
        let response = send(
            app,
            Request::builder()
                .method("PUT")
                .uri("/consent/selection")
                .header(header::COOKIE, cookie)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(format!(
                    r#"{{"field":"{field}","included":true}}"#
                )))
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    async fn decide(app: &Router, cookie: &str, intent: &str) -> axum::response::Response {
        send(
            app,
            json_post(
                "/consent/decision",
                cookie,
                &format!(r#"{{"intent":"{intent}"}}"#),
            ),
        )
        .await
    }

    fn redirect_payload(response: &axum::response::Response) -> ReturnPayload {
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let location = response
            .headers()
            .get(header::LOCATION)
            .expect("location header")
            .to_str()
            .unwrap();
        let url: Url = location.parse().unwrap();
        assert_eq!(url.host_str(), Some("bank.example.com"));
        ReturnPayload::from_url(&url).unwrap()
    }

    #[tokio::test]
    async fn granted_walk_redirects_with_data() {
        let app = app(AuthVerdict::Accepted);
        let cookie = begin_session(&app).await;
        authenticate_session(&app, &cookie).await;
        enter_consent(&app, &cookie).await;
        toggle(&app, &cookie, "name").await;
        toggle(&app, &cookie, "email").await;

        let response = decide(&app, &cookie, "grant").await;
        let payload = redirect_payload(&response);

        assert_eq!(payload.consent(), ConsentVerdict::Success);
        assert_eq!(payload.service(), "Personal Banking");
        let data: Vec<_> = payload
            .data()
            .unwrap()
            .iter()
            .map(|f| f.as_str().to_string())
            .collect();
        assert_eq!(data, ["email", "name"]);

        // The session is gone after delivery.
        let response = decide(&app, &cookie, "grant").await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn insufficient_and_declined_redirects_carry_no_data() {
        let app = app(AuthVerdict::Accepted);

        let cookie = begin_session(&app).await;
        authenticate_session(&app, &cookie).await;
        enter_consent(&app, &cookie).await;
        toggle(&app, &cookie, "email").await;
        let payload = redirect_payload(&decide(&app, &cookie, "grant").await);
        assert_eq!(payload.consent(), ConsentVerdict::Insufficient);
        assert!(payload.data().is_none());

        let cookie = begin_session(&app).await;
        authenticate_session(&app, &cookie).await;
        enter_consent(&app, &cookie).await;
        let payload = redirect_payload(&decide(&app, &cookie, "decline").await);
        assert_eq!(payload.consent(), ConsentVerdict::Declined);
        assert!(payload.data().is_none());
    }

    #[tokio::test]
    async fn prompt_lists_catalog_and_reason() {
        let app = app(AuthVerdict::Accepted);
        let cookie = begin_session(&app).await;
        authenticate_session(&app, &cookie).await;

        let response = send(
            &app,
            Request::builder()
                .uri("/consent/prompt")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(json["service"], "Personal Banking");
        assert!(
            json["reason"]
                .as_str()
                .unwrap()
                .contains("GDPR Article 6(1)(a)")
        );
        assert_eq!(json["categories"].as_array().unwrap().len(), 4);
        assert_eq!(json["categories"][0]["id"], "basic");
        assert_eq!(json["categories"][0]["fields"][0]["id"], "name");
        assert_eq!(json["categories"][0]["fields"][0]["required"], true);
    }

    #[tokio::test]
    async fn missing_credential_input_is_bad_request() {
        let app = app(AuthVerdict::Accepted);
        let cookie = begin_session(&app).await;

        let response = send(
            &app,
            json_post(
                "/consent/authenticate",
                &cookie,
                r#"{"method":"password","email":"user@example.com","secret":""}"#,
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        // Still retryable with a complete credential.
        authenticate_session(&app, &cookie).await;
    }

    #[tokio::test]
    async fn rejected_credential_is_unauthorized_and_retryable() {
        let app = app(AuthVerdict::Rejected);
        let cookie = begin_session(&app).await;

        let response = send(
            &app,
            json_post(
                "/consent/authenticate",
                &cookie,
                r#"{"method":"password","email":"user@example.com","secret":"bad"}"#,
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        // The session survives rejection; a second attempt reaches the
        // authenticator again.
        let response = send(
            &app,
            json_post(
                "/consent/authenticate",
                &cookie,
                r#"{"method":"password","email":"user@example.com","secret":"bad"}"#,
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn requests_without_session_are_unauthorized() {
        let app = app(AuthVerdict::Accepted);

        let response = send(
            &app,
            Request::builder()
                .uri("/consent/prompt")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn consent_step_before_authentication_conflicts() {
        let app = app(AuthVerdict::Accepted);
        let cookie = begin_session(&app).await;

        let response = send(
            &app,
            Request::builder()
                .uri("/consent/prompt")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn unknown_field_toggle_is_bad_request() {
        let app = app(AuthVerdict::Accepted);
        let cookie = begin_session(&app).await;
        authenticate_session(&app, &cookie).await;
        enter_consent(&app, &cookie).await;

        let response = send(
            &app,
            Request::builder()
                .method("PUT")
                .uri("/consent/selection")
                .header(header::COOKIE, &cookie)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    r#"{"field":"not-a-real-field","included":true}"#,
                ))
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
