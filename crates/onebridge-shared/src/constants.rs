/// First 7 bytes of a Tencent-flavoured silk v3 stream (`\x02#!SILK`).
pub const SILK_MAGIC: [u8; 7] = [0x02, b'#', b'!', b'S', b'I', b'L', b'K'];

/// Full silk v3 header following the optional Tencent prefix byte.
pub const SILK_V3_HEADER: &[u8] = b"#!SILK_V3";

/// Every silk frame carries 20 ms of audio.
pub const SILK_FRAME_MS: u64 = 20;

/// Sample rate of the intermediate waveform handed to the silk encoder.
pub const DEFAULT_SAMPLE_RATE: u32 = 24_000;

/// Assumed voice bitrate used for size-based duration estimates (3 KiB/s).
pub const DEFAULT_AUDIO_BYTES_PER_SEC: u64 = 3 * 1024;

/// Maximum disagreement (seconds) tolerated between codec-reported and
/// size-estimated duration before the estimate wins.
pub const DEFAULT_DURATION_TOLERANCE_SECS: u64 = 10;

/// How long to wait for a file handed off by the host platform (ms).
pub const DEFAULT_FILE_WAIT_MS: u64 = 3_000;

/// Poll interval while waiting for a file to appear (ms).
pub const FILE_WAIT_POLL_MS: u64 = 100;

/// User agent sent with every download unless the caller overrides headers.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/94.0.4606.71 Safari/537.36";
