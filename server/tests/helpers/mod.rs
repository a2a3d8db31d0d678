//! Reusable test helpers for integration tests.
//!
//! Provides `TestApp`, which wires the full service over in-memory
//! backends, and utilities for sending commands and posts through it,
//! either directly or via the axum router with `tower::ServiceExt::oneshot`.
#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{self, Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use stick_server::api::{create_router, AppState};
use stick_server::commands::{CommandContext, CommandHandlers, CommandReply};
use stick_server::config::Config;
use stick_server::gate::{HookOutcome, InboundMessage, MessageGate, PhraseFilter};
use stick_server::permissions::{MemoryDirectory, PermissionResolver, UserRecord};
use stick_server::settle::SettleController;
use stick_server::stick::{ChannelState, ChannelStateStore, MemoryKv};

/// Channel every helper operates in.
pub const CHANNEL: &str = "town-square";

/// Team owning [`CHANNEL`].
pub const TEAM: &str = "team-1";

/// Seeded identities: `(id, username)`.
pub const ADMIN: (&str, &str) = ("u-admin", "boss");
pub const CHANNEL_ADMIN: (&str, &str) = ("u-chadmin", "moderator");
pub const ALICE: (&str, &str) = ("u-alice", "alice");
pub const BOB: (&str, &str) = ("u-bob", "bob");
pub const TELOS: (&str, &str) = ("u-telos", "telos");
pub const AURORA: (&str, &str) = ("u-aurora", "aurora");

/// The full service over in-memory backends.
pub struct TestApp {
    pub router: Router,
    pub store: ChannelStateStore,
    pub settle: SettleController,
    pub directory: Arc<MemoryDirectory>,
    pub gate: Arc<MessageGate>,
    pub commands: Arc<CommandHandlers>,
    pub config: Arc<Config>,
}

impl TestApp {
    /// Create a test app with the default test config.
    pub fn new() -> Self {
        Self::with_config(Config::default_for_test())
    }

    /// Create a test app with a custom config.
    ///
    /// `telos` and `aurora` are plain (non-bot) identities so that the
    /// settle tests see them subject to restrictions.
    pub fn with_config(config: Config) -> Self {
        let directory = Arc::new(seeded_directory());
        let store = ChannelStateStore::new(Arc::new(MemoryKv::new()));
        let resolver = PermissionResolver::new(directory.clone(), config.bypass);
        let settle = SettleController::new(store.clone());

        let gate = MessageGate::new(
            store.clone(),
            resolver.clone(),
            directory.clone(),
            PhraseFilter::new(&config.suppression_phrases),
            config.fault_policy,
        );
        let commands = CommandHandlers::new(store.clone(), settle.clone(), resolver, directory.clone());

        let state = AppState::new(gate, commands, config);
        let gate = Arc::clone(&state.gate);
        let commands = Arc::clone(&state.commands);
        let config = Arc::clone(&state.config);
        let router = create_router(state);

        Self {
            router,
            store,
            settle,
            directory,
            gate,
            commands,
            config,
        }
    }

    /// Run a command line as `user_id` in [`CHANNEL`].
    pub async fn run(&self, user_id: &str, command: &str) -> CommandReply {
        let ctx = CommandContext {
            channel_id: CHANNEL.to_string(),
            user_id: user_id.to_string(),
        };
        self.commands.execute(&ctx, command).await
    }

    /// Offer a post from `user_id` to the gate.
    pub async fn post(&self, user_id: &str, message: &str) -> HookOutcome {
        self.gate
            .message_will_be_posted(&InboundMessage {
                channel_id: CHANNEL.to_string(),
                user_id: user_id.to_string(),
                message: message.to_string(),
                post_type: String::new(),
            })
            .await
    }

    /// Current stored state of [`CHANNEL`].
    pub async fn state(&self) -> ChannelState {
        self.store.load(CHANNEL).await.expect("Failed to load state")
    }

    /// Build an HTTP request with the given method and URI.
    pub fn request(method: Method, uri: &str) -> http::request::Builder {
        Request::builder().method(method).uri(uri)
    }

    /// Send a request through the router via `tower::ServiceExt::oneshot`.
    pub async fn oneshot(&self, request: Request<Body>) -> Response<Body> {
        use tower::ServiceExt;

        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("oneshot request failed")
    }

    /// POST a JSON body and return the response.
    pub async fn post_json(&self, uri: &str, body: &Value) -> Response<Body> {
        let request = Self::request(Method::POST, uri)
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("Failed to build request");
        self.oneshot(request).await
    }
}

/// Directory with one team, one channel and the seeded identities.
fn seeded_directory() -> MemoryDirectory {
    let directory = MemoryDirectory::new();
    directory.add_channel(CHANNEL, TEAM);

    directory.add_user(UserRecord::new(ADMIN.0, ADMIN.1).with_roles("system_user system_admin"));
    for (id, username) in [CHANNEL_ADMIN, ALICE, BOB, TELOS, AURORA] {
        directory.add_user(UserRecord::new(id, username).with_roles("system_user"));
        directory.add_channel_member(CHANNEL, id, false);
        directory.add_team_member(TEAM, id, false);
    }
    directory.add_channel_member(CHANNEL, CHANNEL_ADMIN.0, true);

    directory
}

/// Read a response body as JSON.
pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("Response body is not JSON")
}
