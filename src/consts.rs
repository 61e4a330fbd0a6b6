/// Software version
pub const GATE_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const GATE_NAME: &str = "relay-gate";

/// Number of relay channels driven by the controller board.
pub const CHANNEL_COUNT: u8 = 4;

/// First byte of every command frame sent to the relay board.
pub const FRAME_HEADER: u8 = 0xA0;
pub const FRAME_LENGTH: usize = 4;

/// Last segment of every control topic: `<namespace>/<channel>/control`.
pub const CONTROL_SUFFIX: &str = "control";

pub const DEFAULT_BAUD_RATE: u32 = 115200;
pub const DEFAULT_RECONNECT_DELAY_SECS: u64 = 5;
pub const MQTT_KEEP_ALIVE_SECS: u64 = 5;
