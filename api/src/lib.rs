//! The aclforge API and shared objects
//!
//! aclforge compiles abstract network policies into device specific ACLs and
//! pushes them to targets through git, netmiko and proxmox-nft deployers.

#[macro_use]
extern crate serde_derive;

use std::net::{IpAddr, SocketAddr};

use axum::http::Method;
use tower_http::cors::CorsLayer;

pub mod compile;
pub mod conf;
pub mod models;
mod routes;
pub mod utils;

pub use conf::Conf;

/// Build the axum app
fn build_app(state: utils::AppState, conf: &Conf) -> axum::Router {
    use axum::http::header::{HeaderName, HeaderValue};
    use axum::{http::Request, response::Response};
    use routes::{
        basic, deployers, deployments, docs, dynamic_policies, networks, policies, policy_tests,
        revisions, services, targets, users,
    };
    use std::time::Duration;
    use tower_http::set_header::SetResponseHeaderLayer;
    use tower_http::trace::{DefaultMakeSpan, TraceLayer};
    use tracing::{event, Level, Span};

    // build an axum router
    let mut app = axum::Router::new();
    app = basic::mount(app);
    app = docs::mount(app);
    app = deployers::mount(app);
    app = deployments::mount(app);
    app = dynamic_policies::mount(app);
    app = networks::mount(app);
    app = policies::mount(app);
    app = policy_tests::mount(app);
    app = revisions::mount(app);
    app = services::mount(app);
    app = targets::mount(app);
    app = users::mount(app);
    // build cors middleware for our app
    let cors = if conf.aclforge.cors.insecure {
        CorsLayer::permissive()
    } else {
        // start building our cors settings and allow all methods we use
        let cors = CorsLayer::new().allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
        ]);
        // cast the domains we want to add to the correct type
        let origins = conf
            .aclforge
            .cors
            .domains
            .iter()
            .map(|domain| domain.parse())
            .collect::<Result<Vec<HeaderValue>, _>>()
            .expect("Failed to parse CORS domains");
        cors.allow_origin(origins)
    };
    // add middleware to our app
    app = app
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(|req: &Request<_>, span: &Span| {
                    // get our uri as a str
                    let url_and_query = match req.uri().path_and_query() {
                        Some(path_and_query) => path_and_query.as_str(),
                        None => req.uri().path(),
                    };
                    // get our base url as a str
                    let url = req.uri().path();
                    event!(
                        parent: span,
                        Level::INFO,
                        url = url,
                        uri = url_and_query,
                        msg = "Starting Request"
                    );
                })
                .on_response(|response: &Response, latency: Duration, span: &Span| {
                    // get our status code
                    let code = response.status();
                    // build our response event
                    event!(
                        parent: span,
                        Level::INFO,
                        code = code.as_u16(),
                        status = code.as_str(),
                        latency = latency.as_millis(),
                        msg = "Responding to Request"
                    );
                }),
        )
        .layer(cors)
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("aclforge-version"),
            HeaderValue::from_str(env!("CARGO_PKG_VERSION"))
                .expect("aclforge version is not a valid header value"),
        ));
    app.with_state(state)
}

/// Launches the aclforge api using axum
///
/// # Panics
///
/// Will panic if we cannot connect to redis or bind our listen address.
pub async fn axum(config: Conf) {
    // setup shared object
    let shared = utils::Shared::new(config.clone()).await;
    // get our log level
    let log_level = shared.config.aclforge.tracing.level;
    // log interface/port we are binding to
    info!(
        log_level,
        format!(
            "binding to {}:{}",
            &config.aclforge.interface, &config.aclforge.port
        ),
    );
    // build our app state
    let state = utils::AppState::new(shared);
    // build our app
    let app = build_app(state, &config);
    // parse our interface addr
    let bind_addr: IpAddr = config
        .aclforge
        .interface
        .parse()
        .expect("Failed to parse interface addr");
    // get the address and port to bind too
    let addr = SocketAddr::new(bind_addr, config.aclforge.port);
    // track how many bind attempts we have tried
    let mut attempts = 0;
    // bind and start handling requests
    loop {
        // try to bind the listener for our server
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .unwrap_or_else(|_| panic!("Failed to bind to {addr}"));
        // start handling requests
        match axum::serve(listener, app.clone()).await {
            Ok(()) => break,
            Err(error) => {
                error!(log_level, format!("Failed to bind server: {:#?}", error));
            }
        }
        // increment our attempt count
        attempts += 1;
        // check if we reached our attempt limit
        assert!(attempts <= 10, "Failed to bind server in 10 attempts");
        // sleep for 3 seconds between attempts
        tokio::time::sleep(std::time::Duration::from_secs(3)).await;
    }
}
