pub mod audio;
pub mod bridge;
pub mod realtime;
pub mod registry;

pub use audio::{OutboundFramer, TranscodeError, TranscodeResult};
pub use bridge::{
    BridgeConfig, BridgeError, BridgeState, CallBridgeParams, CallBridgeSession, EndReason,
    MediaRoute, SessionEnd,
};
pub use realtime::{
    BaseRealtime, BoxedRealtime, OpenAIRealtime, RealtimeConfig, RealtimeError, RealtimeResult,
    create_realtime_provider, get_supported_realtime_providers,
};
pub use registry::{CallContext, CallRegistry, CallSummary};
