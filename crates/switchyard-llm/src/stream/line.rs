/// Reassembles newline-terminated lines from arbitrary byte chunks
///
/// Bytes are held until a `\n` arrives, so multi-byte UTF-8 sequences
/// split across chunks are never decoded half-way.
#[derive(Debug, Default)]
pub(super) struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Append `chunk` and return every line it completed, terminator included
    pub(super) fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        self.pending.extend_from_slice(chunk);

        let Some(last_newline) = self.pending.iter().rposition(|&b| b == b'\n') else {
            return Vec::new();
        };

        let rest = self.pending.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.pending, rest);

        complete
            .split_inclusive(|&b| b == b'\n')
            .map(<[u8]>::to_vec)
            .collect()
    }

    /// Take whatever remains after the final newline
    pub(super) fn take_remainder(&mut self) -> Option<Vec<u8>> {
        (!self.pending.is_empty()).then(|| std::mem::take(&mut self.pending))
    }
}

/// Line content without its `\n` or `\r\n` terminator
pub(super) fn trim_terminator(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_line_split_across_chunks() {
        let mut buffer = LineBuffer::default();
        assert!(buffer.push(b"data: {\"a\"").is_empty());
        let lines = buffer.push(b":1}\ndata: ");
        assert_eq!(lines, vec![b"data: {\"a\":1}\n".to_vec()]);
        assert_eq!(buffer.take_remainder(), Some(b"data: ".to_vec()));
        assert_eq!(buffer.take_remainder(), None);
    }

    #[test]
    fn holds_split_utf8_sequence() {
        let text = "data: héllo\n".as_bytes();
        let split = text.iter().position(|&b| b == 0xC3).unwrap() + 1;

        let mut buffer = LineBuffer::default();
        assert!(buffer.push(&text[..split]).is_empty());
        let lines = buffer.push(&text[split..]);

        assert_eq!(lines.len(), 1);
        assert_eq!(std::str::from_utf8(&lines[0]).unwrap(), "data: héllo\n");
    }

    #[test]
    fn emits_several_lines_from_one_chunk() {
        let mut buffer = LineBuffer::default();
        let lines = buffer.push(b"event: ping\r\ndata: {}\n\n");
        assert_eq!(lines.len(), 3);
        assert_eq!(trim_terminator(&lines[0]), b"event: ping");
        assert_eq!(trim_terminator(&lines[2]), b"");
    }
}
