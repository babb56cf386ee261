//! Incremental UTF-8 decoding of a chunked response body

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};

/// Stateful UTF-8 decoder.
///
/// Bytes of a multi-byte sequence that is cut off at the end of a chunk are
/// held back and prepended to the next chunk. Invalid sequences decode to
/// U+FFFD instead of failing the stream.
#[derive(Debug, Default)]
pub struct Utf8StreamDecoder {
    pending: Vec<u8>,
}

impl Utf8StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one chunk, returning all text that is complete so far.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        let mut input = std::mem::take(&mut self.pending);
        input.extend_from_slice(chunk);

        let mut out = String::with_capacity(input.len());
        let mut rest = input.as_slice();
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    // Safe: from_utf8 vouched for this prefix
                    out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        None => {
                            // Truncated sequence at the end: wait for more bytes
                            self.pending = after.to_vec();
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// Number of bytes held back waiting for the rest of a sequence
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Flush the decoder at end of stream.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            String::new()
        } else {
            self.pending.clear();
            char::REPLACEMENT_CHARACTER.to_string()
        }
    }
}

/// Adapt a stream of byte chunks into a stream of decoded text increments.
///
/// Empty increments are skipped. The first error ends the stream after being
/// yielded.
pub fn decode_text<S, E>(body: S) -> impl Stream<Item = Result<String, E>>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    struct State<S> {
        body: S,
        decoder: Utf8StreamDecoder,
        done: bool,
    }

    let state = State {
        body,
        decoder: Utf8StreamDecoder::new(),
        done: false,
    };

    stream::unfold(state, |mut state| async move {
        while !state.done {
            match state.body.next().await {
                Some(Ok(chunk)) => {
                    let text = state.decoder.decode(&chunk);
                    if !text.is_empty() {
                        return Some((Ok(text), state));
                    }
                }
                Some(Err(e)) => {
                    state.done = true;
                    return Some((Err(e), state));
                }
                None => {
                    state.done = true;
                    let tail = state.decoder.finish();
                    if !tail.is_empty() {
                        return Some((Ok(tail), state));
                    }
                }
            }
        }
        None
    })
}
