/// A decoded/encodable SETTINGS frame payload.
///
/// Only the parameters this engine negotiates are represented; an unknown
/// parameter id is ignored on decode per RFC 7540 §6.5.2.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub header_table_size: Option<u32>,
    pub enable_push: Option<bool>,
    pub max_concurrent_streams: Option<u32>,
    pub initial_window_size: Option<u32>,
    pub max_frame_size: Option<u32>,
}

const HEADER_TABLE_SIZE: u16 = 0x1;
const ENABLE_PUSH: u16 = 0x2;
const MAX_CONCURRENT_STREAMS: u16 = 0x3;
const INITIAL_WINDOW_SIZE: u16 = 0x4;
const MAX_FRAME_SIZE: u16 = 0x5;

impl Settings {
    pub fn decode(payload: &[u8]) -> Settings {
        let mut settings = Settings::default();
        for chunk in payload.chunks_exact(6) {
            let id = u16::from_be_bytes([chunk[0], chunk[1]]);
            let value = u32::from_be_bytes([chunk[2], chunk[3], chunk[4], chunk[5]]);
            match id {
                HEADER_TABLE_SIZE => settings.header_table_size = Some(value),
                ENABLE_PUSH => settings.enable_push = Some(value != 0),
                MAX_CONCURRENT_STREAMS => settings.max_concurrent_streams = Some(value),
                INITIAL_WINDOW_SIZE => settings.initial_window_size = Some(value),
                MAX_FRAME_SIZE => settings.max_frame_size = Some(value),
                _ => {}
            }
        }
        settings
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        let mut push = |id: u16, value: u32| {
            out.extend_from_slice(&id.to_be_bytes());
            out.extend_from_slice(&value.to_be_bytes());
        };
        if let Some(v) = self.header_table_size {
            push(HEADER_TABLE_SIZE, v);
        }
        if let Some(v) = self.enable_push {
            push(ENABLE_PUSH, v as u32);
        }
        if let Some(v) = self.max_concurrent_streams {
            push(MAX_CONCURRENT_STREAMS, v);
        }
        if let Some(v) = self.initial_window_size {
            push(INITIAL_WINDOW_SIZE, v);
        }
        if let Some(v) = self.max_frame_size {
            push(MAX_FRAME_SIZE, v);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_max_concurrent_streams() {
        let settings = Settings {
            max_concurrent_streams: Some(100),
            ..Default::default()
        };
        let encoded = settings.encode();
        let decoded = Settings::decode(&encoded);
        assert_eq!(decoded.max_concurrent_streams, Some(100));
    }
}
