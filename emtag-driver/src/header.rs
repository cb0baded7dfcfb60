//! Inbound command wire format
//!
//! Every inbound buffer starts with a fixed three-byte header: command code
//! and two argument bytes. The layout is a convention shared with the
//! host-side tooling; the core only locates the header and hands the rest of
//! the buffer to the protocol dispatcher.

/// Command header prefix of an inbound buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CommandHeader {
    pub command: u8,
    pub arg1: u8,
    pub arg2: u8,
}

impl CommandHeader {
    /// Encoded header length in bytes
    pub const LEN: usize = 3;

    /// Splits a received buffer into its header and payload.
    ///
    /// Returns `None` when the buffer is too short to carry a header.
    /// Payload validation beyond that belongs to the dispatch layer.
    pub fn parse(data: &[u8]) -> Option<(CommandHeader, &[u8])> {
        let (header, payload) = data.split_at_checked(Self::LEN)?;
        let header = CommandHeader {
            command: header[0],
            arg1: header[1],
            arg2: header[2],
        };
        Some((header, payload))
    }

    /// Writes the header prefix into an outbound buffer.
    ///
    /// Returns `None` when the buffer cannot hold the header.
    pub fn emit(self, buf: &mut [u8]) -> Option<usize> {
        let dst = buf.get_mut(..Self::LEN)?;
        dst[0] = self.command;
        dst[1] = self.arg1;
        dst[2] = self.arg2;
        Some(Self::LEN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let (header, payload) = CommandHeader::parse(&[0x21, 0x01, 0x00, 0xaa, 0xbb]).unwrap();
        assert_eq!(
            header,
            CommandHeader {
                command: 0x21,
                arg1: 0x01,
                arg2: 0x00,
            }
        );
        assert_eq!(payload, &[0xaa, 0xbb]);
    }

    #[test]
    fn test_parse_header_only() {
        let (_, payload) = CommandHeader::parse(&[0x21, 0x01, 0x00]).unwrap();
        assert!(payload.is_empty());
    }

    #[test]
    fn test_parse_short() {
        assert!(CommandHeader::parse(&[0x21, 0x01]).is_none());
        assert!(CommandHeader::parse(&[]).is_none());
    }

    #[test]
    fn test_emit() {
        let header = CommandHeader {
            command: 0x80,
            arg1: 0x02,
            arg2: 0x10,
        };
        let mut buf = [0u8; 8];
        assert_eq!(header.emit(&mut buf), Some(CommandHeader::LEN));
        assert_eq!(&buf[..3], &[0x80, 0x02, 0x10]);

        let mut short = [0u8; 2];
        assert!(header.emit(&mut short).is_none());
    }
}
