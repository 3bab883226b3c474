use std::ops::Deref;

use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{header, request::Parts, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json,
};
use axum_extra::extract::{
    cookie::{Cookie, SameSite},
    CookieJar,
};
use fretboard_collab::{Credentials, NewPlainUser, ProfileData, SessionData};

use crate::{
    errors::{ErrorBody, ServerError, ServerResult},
    schemas::{LoginSchema, RegisterSchema, ValidatedJson},
    serialized::{CurrentUser, LoginResult, ToSerialized},
    Router, ServerContext,
};

/// The cookie browsers keep the session token in
pub const SESSION_COOKIE: &str = "fretboard_session";

/// Wraps [SessionData] so [FromRequestParts] can be implemented for it
pub struct Session(pub SessionData);

/// A session whose user is on a paid plan.
/// Place it first in a handler so the plan is checked before the body is read.
pub struct PaidSession {
    pub session: SessionData,
    pub profile: ProfileData,
}

impl Deref for Session {
    type Target = SessionData;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Deref for PaidSession {
    type Target = SessionData;

    fn deref(&self) -> &Self::Target {
        &self.session
    }
}

/// Reads the token from the session cookie, falling back to a Bearer header
fn token_from_parts(parts: &Parts) -> Option<String> {
    let jar = CookieJar::from_headers(&parts.headers);

    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        return Some(cookie.value().to_string());
    }

    let header = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|x| x.to_str().ok())?;

    let (scheme, token) = header.split_once(' ')?;
    let token = token.trim();

    (scheme == "Bearer" && !token.is_empty()).then(|| token.to_string())
}

#[async_trait]
impl FromRequestParts<ServerContext> for Session {
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        context: &ServerContext,
    ) -> Result<Self, Self::Rejection> {
        let token = token_from_parts(parts).ok_or(ServerError::Unauthenticated)?;
        let session = context.collab.auth.session(&token).await?;

        Ok(Self(session))
    }
}

#[async_trait]
impl FromRequestParts<ServerContext> for PaidSession {
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        context: &ServerContext,
    ) -> Result<Self, Self::Rejection> {
        let Session(session) = Session::from_request_parts(parts, context).await?;
        let profile = context.collab.profiles.require_paid(session.user.id).await?;

        Ok(Self { session, profile })
    }
}

fn session_cookie(context: &ServerContext, token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .http_only(true)
        .path("/")
        .same_site(SameSite::Lax)
        .secure(context.config.server.secure_cookies)
        .max_age(time::Duration::days(7))
        .build()
}

#[utoipa::path(
    post,
    path = "/v1/auth/register",
    tag = "auth",
    request_body = RegisterSchema,
    responses(
        (status = 201, body = LoginResult),
        (status = 400, body = ErrorBody),
        (status = 409, body = ErrorBody, description = "The username is taken")
    )
)]
async fn register(
    State(context): State<ServerContext>,
    jar: CookieJar,
    ValidatedJson(body): ValidatedJson<RegisterSchema>,
) -> ServerResult<impl IntoResponse> {
    let session = context
        .collab
        .auth
        .register(NewPlainUser {
            username: body.username,
            password: body.password,
            display_name: body.display_name,
        })
        .await?;

    let jar = jar.add(session_cookie(&context, session.token.clone()));
    let result: LoginResult = session.to_serialized();

    Ok((StatusCode::CREATED, jar, Json(result)))
}

#[utoipa::path(
    post,
    path = "/v1/auth/login",
    tag = "auth",
    request_body = LoginSchema,
    responses(
        (status = 200, body = LoginResult),
        (status = 401, body = ErrorBody, description = "Username or password is wrong")
    )
)]
async fn login(
    State(context): State<ServerContext>,
    jar: CookieJar,
    ValidatedJson(body): ValidatedJson<LoginSchema>,
) -> ServerResult<impl IntoResponse> {
    let session = context
        .collab
        .auth
        .login(Credentials {
            username: body.username,
            password: body.password,
        })
        .await?;

    let jar = jar.add(session_cookie(&context, session.token.clone()));
    let result: LoginResult = session.to_serialized();

    Ok((jar, Json(result)))
}

#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    tag = "auth",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 204, description = "The session was deleted"),
        (status = 401, body = ErrorBody)
    )
)]
async fn logout(
    State(context): State<ServerContext>,
    session: Session,
    jar: CookieJar,
) -> ServerResult<impl IntoResponse> {
    context.collab.auth.logout(&session.token).await?;

    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));

    Ok((StatusCode::NO_CONTENT, jar))
}

#[utoipa::path(
    get,
    path = "/v1/auth/user",
    tag = "auth",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = CurrentUser),
        (status = 401, body = ErrorBody)
    )
)]
async fn user(
    State(context): State<ServerContext>,
    session: Session,
) -> ServerResult<Json<CurrentUser>> {
    let profile = context.collab.profiles.profile(session.user.id).await?;

    Ok(Json(CurrentUser::new(&profile)))
}

pub fn router() -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/user", get(user))
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts(header: (&str, &str)) -> Parts {
        let (parts, _) = Request::builder()
            .header(header.0, header.1)
            .body(())
            .unwrap()
            .into_parts();

        parts
    }

    #[test]
    fn reads_the_session_cookie_first() {
        let parts = parts(("cookie", "theme=dark; fretboard_session=abc123"));
        assert_eq!(token_from_parts(&parts).as_deref(), Some("abc123"));
    }

    #[test]
    fn falls_back_to_bearer_tokens() {
        let bearer = parts(("authorization", "Bearer xyz"));
        assert_eq!(token_from_parts(&bearer).as_deref(), Some("xyz"));

        let basic = parts(("authorization", "Basic xyz"));
        assert_eq!(token_from_parts(&basic), None);

        let empty = parts(("authorization", "Bearer "));
        assert_eq!(token_from_parts(&empty), None);
    }
}
