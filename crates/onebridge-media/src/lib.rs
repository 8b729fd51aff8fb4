// Local media handling: hashing, type sniffing, file arrival and silk voice transcoding.

pub mod arrival;
pub mod checksum;
pub mod ffmpeg;
pub mod silk;
pub mod sniff;
pub mod transcoder;
pub mod wav;

mod error;

pub use arrival::{read_base64_when_ready, wait_for_file};
pub use checksum::hash_file;
pub use error::MediaError;
pub use ffmpeg::{AudioConverter, ConvertOptions, Ffmpeg};
pub use silk::{SilkCodec, SilkEncoded, SilkEncoderCli};
pub use sniff::{detect, detect_file, FileKind};
pub use transcoder::{DurationPolicy, SilkTranscoder, TranscodedAudio};
