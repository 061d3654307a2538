use intake_core::TICKET_MARKER;

/// Visible portion of one absorbed chunk.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EchoOutput {
    pub visible: String,
    /// True exactly once, on the chunk where the marker surfaced.
    pub prepared: bool,
}

/// Incremental transcript echo that hides the machine-facing payload.
///
/// Everything up to the ticket marker is passed through as it streams; the
/// marker and the fenced payload after it are suppressed so the user sees a
/// "payload prepared" notice instead of raw JSON. Because the marker can
/// arrive split across chunks, a tail that could still become the marker is
/// held back until the next chunk settles it.
#[derive(Debug, Default)]
pub struct TranscriptEcho {
    suppressed: bool,
    held: String,
}

impl TranscriptEcho {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &str) -> EchoOutput {
        if self.suppressed {
            return EchoOutput::default();
        }

        self.held.push_str(chunk);
        if let Some(at) = self.held.find(TICKET_MARKER) {
            let visible = self.held[..at].to_string();
            self.held.clear();
            self.suppressed = true;
            return EchoOutput {
                visible,
                prepared: true,
            };
        }

        let keep = marker_prefix_suffix_len(&self.held);
        let visible = self.held.drain(..self.held.len() - keep).collect();
        EchoOutput {
            visible,
            prepared: false,
        }
    }

    /// Flushes any held-back tail once the stream has terminated.
    pub fn finish(&mut self) -> String {
        if self.suppressed {
            return String::new();
        }
        std::mem::take(&mut self.held)
    }
}

/// Length of the longest suffix of `text` that is a proper prefix of the
/// marker. The marker is ASCII, so byte indexing is safe here.
fn marker_prefix_suffix_len(text: &str) -> usize {
    let marker = TICKET_MARKER.as_bytes();
    let bytes = text.as_bytes();
    let max = (marker.len() - 1).min(bytes.len());

    (1..=max)
        .rev()
        .find(|len| marker.starts_with(&bytes[bytes.len() - len..]))
        .unwrap_or(0)
}
