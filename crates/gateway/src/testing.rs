use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use {
    async_trait::async_trait,
    axum::Router,
    secrecy::SecretString,
    tokio_util::sync::CancellationToken,
    ustoz_channels::{ChannelOutbound, DeliveryError, OutboundMessage, Relay},
    ustoz_common::{Content, RequesterId, ResponderId},
    ustoz_routing::{ManualClock, RouterSettings, SessionRouter},
    ustoz_sessions::MemoryStore,
    ustoz_vault::Codec,
};

use crate::{
    auth::{ResolvedAuth, resolve_auth},
    server::build_gateway_app,
    state::GatewayState,
};

pub const TOKEN: &str = "dashboard-token";
pub const STUDENT: i64 = 42;

#[derive(Default)]
pub struct RecordingOutbound {
    sent: Mutex<Vec<OutboundMessage>>,
    failing: Mutex<HashMap<i64, DeliveryError>>,
}

impl RecordingOutbound {
    pub fn fail_for(&self, error: DeliveryError) {
        self.failing
            .lock()
            .unwrap()
            .insert(error.recipient(), error);
    }

    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChannelOutbound for RecordingOutbound {
    async fn send(&self, message: &OutboundMessage) -> Result<(), DeliveryError> {
        if let Some(e) = self.failing.lock().unwrap().get(&message.to) {
            return Err(e.clone());
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

pub struct Fixture {
    pub relay: Arc<Relay>,
    pub outbound: Arc<RecordingOutbound>,
    pub state: Arc<GatewayState>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_auth(resolve_auth(Some(SecretString::new(TOKEN.into()))))
    }

    pub fn open() -> Self {
        Self::with_auth(ResolvedAuth::default())
    }

    fn with_auth(auth: ResolvedAuth) -> Self {
        let router = Arc::new(SessionRouter::new(
            Arc::new(MemoryStore::new()),
            Arc::new(Codec::from_key_bytes(&[9u8; 32]).unwrap()),
            [ResponderId(500)],
            RouterSettings::default(),
            Arc::new(ManualClock::new(1_700_000_000_000)),
        ));
        let outbound = Arc::new(RecordingOutbound::default());
        let relay = Arc::new(Relay::new(router, outbound.clone()));
        let state = GatewayState::new(Arc::clone(&relay), auth, CancellationToken::new());
        Self {
            relay,
            outbound,
            state,
        }
    }

    pub fn app(&self) -> Router {
        build_gateway_app(Arc::clone(&self.state))
    }

    /// Submit a question straight through the router, bypassing the transport.
    pub async fn ask(&self, requester: i64, text: &str) {
        let router = self.relay.router();
        let profile = router
            .touch_requester(RequesterId(requester), &format!("Talaba {requester}"), None)
            .await
            .unwrap();
        router.request_question_prompt(profile.id).await.unwrap();
        router
            .submit_question(&profile, Content::text(text))
            .await
            .unwrap();
    }
}
