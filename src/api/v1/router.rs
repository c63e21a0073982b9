use super::error::*;
use super::handler;
use crate::application_port::SessionService;
use crate::domain::RateLimiter;
use crate::domain_model::*;
use crate::server::*;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use warp::{Filter, http, reject};

pub fn routes(
    server: Arc<Server>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let login = warp::post()
        .and(warp::path("auth"))
        .and(warp::path("login"))
        .and(warp::path::end())
        .and(with_rate_limit(server.rate_limiter.clone(), RouteClass::Login))
        .and(warp::body::json())
        .and(with(server.session_service.clone()))
        .and_then(handler::login);

    let mfa = warp::post()
        .and(warp::path("auth"))
        .and(warp::path("mfa"))
        .and(warp::path::end())
        .and(with_rate_limit(server.rate_limiter.clone(), RouteClass::Mfa))
        .and(warp::body::json())
        .and(with(server.session_service.clone()))
        .and_then(handler::complete_mfa);

    let refresh = warp::post()
        .and(warp::path("auth"))
        .and(warp::path("refresh-token"))
        .and(warp::path::end())
        .and(with_rate_limit(
            server.rate_limiter.clone(),
            RouteClass::Refresh,
        ))
        .and(warp::body::json())
        .and(with(server.session_service.clone()))
        .and_then(handler::refresh);

    let logout = warp::post()
        .and(warp::path("auth"))
        .and(warp::path("logout"))
        .and(warp::path::end())
        .and(warp::body::json())
        .and(with(server.session_service.clone()))
        .and_then(handler::logout);

    let session = warp::get()
        .and(warp::path("auth"))
        .and(warp::path("session"))
        .and(warp::path::end())
        .and(with_authorization(server.session_service.clone(), &[]))
        .and_then(handler::current_session);

    let revoke_sessions = warp::post()
        .and(warp::path("auth"))
        .and(warp::path("sessions"))
        .and(warp::path("revoke"))
        .and(warp::path::end())
        .and(with_authorization(
            server.session_service.clone(),
            &[Permission::ManageSessions],
        ))
        .and(warp::body::json())
        .and(with(server.session_service.clone()))
        .and_then(handler::revoke_sessions);

    login
        .or(mfa)
        .or(refresh)
        .or(logout)
        .or(session)
        .or(revoke_sessions)
}

fn with<ServiceType>(
    service: Arc<ServiceType>,
) -> impl Filter<Extract = (Arc<ServiceType>,), Error = Infallible> + Clone
where
    ServiceType: Send + Sync + ?Sized,
{
    warp::any().map(move || service.clone())
}

/// Authorization Gate as middleware: verify the bearer token and check the
/// route's required permissions before the handler runs.
fn with_authorization(
    session_service: Arc<dyn SessionService>,
    required: &'static [Permission],
) -> impl Filter<Extract = (SubjectContext,), Error = warp::Rejection> + Clone {
    warp::header::<String>(http::header::AUTHORIZATION.as_ref()).and_then(move |header: String| {
        let session_service = session_service.clone();
        async move {
            if let Some(token) = header.strip_prefix("Bearer ") {
                let context = session_service
                    .authorize(token, required)
                    .await
                    .map_err(ApiRejection::from)
                    .map_err(reject::custom)?;
                Ok(context)
            } else {
                Err(reject::custom(ApiRejection::from(
                    ApiErrorCode::TokenInvalid,
                )))
            }
        }
    })
}

fn with_rate_limit(
    limiter: Arc<RateLimiter>,
    route: RouteClass,
) -> impl Filter<Extract = (), Error = warp::Rejection> + Clone {
    warp::addr::remote()
        .and_then(move |addr: Option<SocketAddr>| {
            let limiter = limiter.clone();
            async move {
                let client = ClientKey::from_remote(addr);
                limiter
                    .check(&client, route)
                    .await
                    .map_err(ApiRejection::from)
                    .map_err(reject::custom)
            }
        })
        .untuple_one()
}
