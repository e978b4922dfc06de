//! Voice adapters: ElevenLabs speech and ffmpeg transcoding.

pub mod elevenlabs;
pub mod transcoder;

pub use elevenlabs::ElevenLabsAdapter;
pub use transcoder::OpusTranscoder;
