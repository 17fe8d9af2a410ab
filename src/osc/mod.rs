//! OSC transport for per-frame feature bundles.
//!
//! - `codec`: OSC 1.0 message/bundle encoding and decoding
//! - `bundle`: `FrameFeatureSet` <-> `/cell/{row}/{col}/{feature}` mapping and size checks
//! - `sender`: UDP fire-and-forget sender, one datagram per frame

mod bundle;
pub mod codec;
mod sender;

pub use bundle::{
    bundle_size_for, check_bundle_fits, decode_feature_set, encode_feature_set, FEATURES,
    MAX_UDP_PAYLOAD, MESSAGES_PER_CELL,
};
pub use codec::{OscArg, OscBundle, OscMessage, OscPacket};
pub use sender::{Endpoint, FeatureSender, FeatureSink, SenderStats};
