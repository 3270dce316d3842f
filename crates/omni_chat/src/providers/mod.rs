use std::sync::Arc;
use std::time::Duration;

use omni_stream::{EnvConfig, TransportKind};
use omni_transport::{FrameTransport, TransportInitError};
use omni_transport_mock::{ScriptedTransport, MOCK_TRANSPORT_ID};
use omni_transport_ws::{WsTransport, WsTransportConfig, WS_TRANSPORT_ID};

const WS_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub fn transport_from_config(config: &EnvConfig) -> Result<Arc<dyn FrameTransport>, TransportInitError> {
    match config.transport {
        TransportKind::Mock => Ok(Arc::new(ScriptedTransport::default())),
        TransportKind::WebSocket => {
            let ws_config = WsTransportConfig::resolve(&config.api_url, config.ws_url.as_deref())?
                .with_connect_timeout(WS_CONNECT_TIMEOUT);
            Ok(Arc::new(WsTransport::new(ws_config)?))
        }
    }
}

pub fn transport_for_id(transport_id: &str, config: &EnvConfig) -> Result<Arc<dyn FrameTransport>, TransportInitError> {
    let kind = match transport_id {
        MOCK_TRANSPORT_ID => TransportKind::Mock,
        WS_TRANSPORT_ID => TransportKind::WebSocket,
        unknown => {
            return Err(TransportInitError::new(format!(
                "Unsupported transport '{unknown}'. Available transports: {WS_TRANSPORT_ID}, {MOCK_TRANSPORT_ID}"
            )))
        }
    };

    transport_from_config(&EnvConfig {
        transport: kind,
        ..config.clone()
    })
}
