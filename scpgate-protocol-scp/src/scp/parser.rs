//! SCP header parser
//!
//! Parses the control lines that frame file and directory transfers.

use super::types::ScpHeader;

#[derive(Default, Clone, Copy)]
pub struct ScpParser;

impl ScpParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse one header line. `None` marks a line that is not a valid header.
    pub fn parse_header(&self, line: &[u8]) -> Option<ScpHeader> {
        let line = line.strip_suffix(b"\n").unwrap_or(line);

        match *line.first()? {
            1 => Some(ScpHeader::Warning(Self::message(&line[1..]))),
            2 => Some(ScpHeader::Error(Self::message(&line[1..]))),
            b'C' => {
                let (mode, size, name) = Self::parse_entry(&line[1..])?;
                Some(ScpHeader::File { mode, size, name })
            }
            b'D' => {
                let (mode, _, name) = Self::parse_entry(&line[1..])?;
                Some(ScpHeader::Directory { mode, name })
            }
            b'E' if line.len() == 1 => Some(ScpHeader::EndDirectory),
            b'T' => Some(ScpHeader::Times(
                String::from_utf8_lossy(&line[1..]).into_owned(),
            )),
            _ => None,
        }
    }

    /// Rewrites the size field of a `C` header to `0`, keeping mode and
    /// name byte-for-byte.
    pub fn suppress_file_size(&self, line: &[u8]) -> Option<Vec<u8>> {
        let size_start = line.iter().position(|b| *b == b' ')? + 1;
        let size_end = size_start + line[size_start..].iter().position(|b| *b == b' ')?;

        let mut rewritten = Vec::with_capacity(line.len());
        rewritten.extend_from_slice(&line[..size_start]);
        rewritten.push(b'0');
        rewritten.extend_from_slice(&line[size_end..]);
        Some(rewritten)
    }

    // <mode> <size> <name>, the name is taken as raw bytes
    fn parse_entry(data: &[u8]) -> Option<(u32, u64, Vec<u8>)> {
        let mut parts = data.splitn(3, |b| *b == b' ');

        let mode = u32::from_str_radix(std::str::from_utf8(parts.next()?).ok()?, 8).ok()?;
        let size = std::str::from_utf8(parts.next()?).ok()?.parse().ok()?;
        let name = parts.next()?.to_vec();

        Some((mode, size, name))
    }

    fn message(data: &[u8]) -> String {
        String::from_utf8_lossy(data).trim().to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_file_header() {
        let parser = ScpParser::new();

        assert_eq!(
            parser.parse_header(b"C0644 1234 test.txt\n"),
            Some(ScpHeader::File {
                mode: 0o644,
                size: 1234,
                name: b"test.txt".to_vec()
            })
        );
    }

    #[test]
    fn test_file_name_keeps_spaces() {
        let parser = ScpParser::new();

        assert_eq!(
            parser.parse_header(b"C0600 5 my report .txt\n"),
            Some(ScpHeader::File {
                mode: 0o600,
                size: 5,
                name: b"my report .txt".to_vec()
            })
        );
    }

    #[test]
    fn test_file_name_is_not_utf8() {
        let parser = ScpParser::new();

        assert_eq!(
            parser.parse_header(b"C0644 5000000 big\xff.bin\n"),
            Some(ScpHeader::File {
                mode: 0o644,
                size: 5_000_000,
                name: b"big\xff.bin".to_vec()
            })
        );
        assert_eq!(
            parser.suppress_file_size(b"C0644 5000000 big\xff.bin\n"),
            Some(b"C0644 0 big\xff.bin\n".to_vec())
        );
    }

    #[test]
    fn test_parse_dir_header() {
        let parser = ScpParser::new();

        assert_eq!(
            parser.parse_header(b"D0755 0 mydir\n"),
            Some(ScpHeader::Directory {
                mode: 0o755,
                name: b"mydir".to_vec()
            })
        );
        assert_eq!(
            parser.parse_header(b"E\n"),
            Some(ScpHeader::EndDirectory)
        );
    }

    #[test]
    fn test_parse_messages() {
        let parser = ScpParser::new();

        assert_eq!(
            parser.parse_header(b"\x01warning message\n"),
            Some(ScpHeader::Warning("warning message".into()))
        );
        assert_eq!(
            parser.parse_header(b"\x02scp: x: No such file or directory\n"),
            Some(ScpHeader::Error("scp: x: No such file or directory".into()))
        );
        assert_eq!(
            parser.parse_header(b"T1700000000 0 1700000000 0\n"),
            Some(ScpHeader::Times("1700000000 0 1700000000 0".into()))
        );
    }

    #[test]
    fn test_invalid_headers() {
        let parser = ScpParser::new();

        assert_eq!(parser.parse_header(b""), None);
        assert_eq!(parser.parse_header(b"C0644 big file.txt\n"), None);
        assert_eq!(parser.parse_header(b"C0644 12\n"), None);
        assert_eq!(parser.parse_header(b"C0999 1 x\n"), None);
        assert_eq!(parser.parse_header(b"Extra\n"), None);
        assert_eq!(parser.parse_header(b"hello\n"), None);
    }

    #[test]
    fn test_suppress_file_size() {
        let parser = ScpParser::new();

        assert_eq!(
            parser.suppress_file_size(b"C0644 5000000 big file.bin\n"),
            Some(b"C0644 0 big file.bin\n".to_vec())
        );
        assert_eq!(parser.suppress_file_size(b"C0644\n"), None);
    }
}
