mod interface;
mod mock;

pub use interface::{DecoderEngine, MediaPlatform, MediaStream};
pub use mock::{ChannelDecoder, DecoderFeed, MockMediaPlatform, MockMediaStream, ScriptedDecoder};
