use super::{Pseudo, StreamId};

/// A decoded HEADERS (or PUSH_PROMISE header-block) frame: pseudo-headers plus
/// the regular header fields, in the order HPACK produced them.
#[derive(Debug, Clone)]
pub struct Headers {
    stream_id: StreamId,
    pseudo: Pseudo,
    fields: Vec<(String, String)>,
    end_stream: bool,
}

impl Headers {
    pub fn new(stream_id: StreamId, pseudo: Pseudo, fields: Vec<(String, String)>, end_stream: bool) -> Self {
        Headers {
            stream_id,
            pseudo,
            fields,
            end_stream,
        }
    }

    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    pub fn end_stream(&self) -> bool {
        self.end_stream
    }

    pub fn into_parts(self) -> (Pseudo, Vec<(String, String)>) {
        (self.pseudo, self.fields)
    }
}
