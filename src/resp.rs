//! RESP2 protocol: value model, streaming parser, serializer, and command
//! extraction.
//!
//! The parser works over a [`BytesMut`] read buffer and consumes bytes only
//! once a complete frame is available, so callers can feed it arbitrarily
//! fragmented network reads and simply retry after the next read when it
//! reports an incomplete frame.

use bytes::{Buf, BytesMut};

/// Maximum declared bulk string length (512 MiB).
pub const MAX_BULK_STRING: i64 = 512 * 1024 * 1024;

/// Maximum declared array element count.
pub const MAX_ARRAY_SIZE: i64 = 1_000_000;

/// Nesting cap for arrays. The frame grammar allows arbitrary nesting but an
/// unbounded recursive parse would let `*1\r\n*1\r\n...` overflow the stack.
const MAX_NESTING_DEPTH: usize = 64;

/// Cap on a buffered inline line before we give up waiting for CRLF.
const MAX_INLINE_LINE: usize = 64 * 1024;

/// A RESP2 value.
#[derive(Debug, Clone, PartialEq)]
pub enum RespValue {
    /// +OK\r\n
    SimpleString(String),
    /// -ERR message\r\n
    Error(String),
    /// :1000\r\n
    Integer(i64),
    /// $6\r\nfoobar\r\n or $-1\r\n (null)
    BulkString(Option<Vec<u8>>),
    /// *2\r\n... or *-1\r\n (null)
    Array(Option<Vec<RespValue>>),
}

impl RespValue {
    pub fn ok() -> Self {
        RespValue::SimpleString("OK".to_string())
    }

    pub fn simple_string(s: impl Into<String>) -> Self {
        RespValue::SimpleString(s.into())
    }

    pub fn error(s: impl Into<String>) -> Self {
        RespValue::Error(s.into())
    }

    pub fn integer(n: i64) -> Self {
        RespValue::Integer(n)
    }

    pub fn bulk_string(data: impl Into<Vec<u8>>) -> Self {
        RespValue::BulkString(Some(data.into()))
    }

    pub fn null_bulk_string() -> Self {
        RespValue::BulkString(None)
    }

    pub fn array(items: Vec<RespValue>) -> Self {
        RespValue::Array(Some(items))
    }

    pub fn null_array() -> Self {
        RespValue::Array(None)
    }

    /// Serialize this value to its canonical RESP byte form.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.write_to(&mut buf);
        buf
    }

    /// Write canonical RESP bytes into the given buffer.
    pub fn write_to(&self, buf: &mut Vec<u8>) {
        match self {
            RespValue::SimpleString(s) => {
                buf.push(b'+');
                buf.extend_from_slice(s.as_bytes());
                buf.extend_from_slice(b"\r\n");
            }
            RespValue::Error(s) => {
                buf.push(b'-');
                buf.extend_from_slice(s.as_bytes());
                buf.extend_from_slice(b"\r\n");
            }
            RespValue::Integer(n) => {
                buf.push(b':');
                buf.extend_from_slice(n.to_string().as_bytes());
                buf.extend_from_slice(b"\r\n");
            }
            RespValue::BulkString(None) => {
                buf.extend_from_slice(b"$-1\r\n");
            }
            RespValue::BulkString(Some(data)) => {
                buf.push(b'$');
                buf.extend_from_slice(data.len().to_string().as_bytes());
                buf.extend_from_slice(b"\r\n");
                buf.extend_from_slice(data);
                buf.extend_from_slice(b"\r\n");
            }
            RespValue::Array(None) => {
                buf.extend_from_slice(b"*-1\r\n");
            }
            RespValue::Array(Some(items)) => {
                buf.push(b'*');
                buf.extend_from_slice(items.len().to_string().as_bytes());
                buf.extend_from_slice(b"\r\n");
                for item in items {
                    item.write_to(buf);
                }
            }
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RespError {
    #[error("unknown RESP type byte '{}'", *.0 as char)]
    UnknownType(u8),

    #[error("line must end with CRLF")]
    BadLineEnding,

    #[error("invalid integer")]
    InvalidInteger,

    #[error("integer out of range")]
    IntegerOverflow,

    #[error("invalid length {0}")]
    InvalidLength(i64),

    #[error("bulk string length {0} exceeds maximum")]
    BulkTooLarge(i64),

    #[error("array size {0} exceeds maximum")]
    ArrayTooLarge(i64),

    #[error("missing CRLF after bulk string payload")]
    MissingCrlf,

    #[error("nesting too deep")]
    NestingTooDeep,

    #[error("empty inline command")]
    EmptyInline,

    #[error("inline command too long")]
    InlineTooLong,

    #[error("null array cannot be a command")]
    NullCommand,

    #[error("command name must be a non-null bulk string")]
    BadCommandName,

    #[error("command arguments must be bulk strings")]
    BadCommandArg,
}

/// A parsed client command: upper-cased name plus raw argument byte strings.
/// Individual arguments may be null (a `$-1` element inside the request
/// array) and are surfaced as `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    name: String,
    args: Vec<Option<Vec<u8>>>,
}

impl Command {
    pub fn new(name: impl Into<String>, args: Vec<Option<Vec<u8>>>) -> Self {
        Command {
            name: name.into(),
            args,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[Option<Vec<u8>>] {
        &self.args
    }

    /// Argument bytes at `index`; null or missing arguments read as empty.
    pub fn arg(&self, index: usize) -> &[u8] {
        match self.args.get(index) {
            Some(Some(data)) => data,
            _ => &[],
        }
    }

    fn from_array(items: Vec<RespValue>) -> Result<Command, RespError> {
        if items.is_empty() {
            // An empty array is not a protocol error; the router rejects it
            // as an empty command.
            return Ok(Command::new(String::new(), Vec::new()));
        }

        let mut iter = items.into_iter();
        let name = match iter.next() {
            Some(RespValue::BulkString(Some(data))) => {
                String::from_utf8_lossy(&data).to_uppercase()
            }
            _ => return Err(RespError::BadCommandName),
        };

        let mut args = Vec::new();
        for item in iter {
            match item {
                RespValue::BulkString(data) => args.push(data),
                _ => return Err(RespError::BadCommandArg),
            }
        }
        Ok(Command::new(name, args))
    }
}

/// Streaming RESP parser.
///
/// `parse` and `parse_command` return `Ok(None)` when the buffer does not
/// yet hold a complete frame; no bytes are consumed in that case.
pub struct RespParser;

impl RespParser {
    /// Try to parse one complete RESP value from the buffer. On success the
    /// parsed bytes are consumed from `buf`.
    pub fn parse(buf: &mut BytesMut) -> Result<Option<RespValue>, RespError> {
        let mut cursor = Cursor::new(&buf[..]);
        match cursor.read_value(0)? {
            Some(value) => {
                let consumed = cursor.pos;
                buf.advance(consumed);
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Try to parse one client command. A leading `*` is parsed as a RESP
    /// array request; anything else falls back to the inline format: one
    /// CRLF-terminated line split on ASCII whitespace runs.
    pub fn parse_command(buf: &mut BytesMut) -> Result<Option<Command>, RespError> {
        if buf.is_empty() {
            return Ok(None);
        }

        if buf[0] == b'*' {
            let mut cursor = Cursor::new(&buf[..]);
            match cursor.read_value(0)? {
                Some(RespValue::Array(Some(items))) => {
                    let consumed = cursor.pos;
                    let command = Command::from_array(items)?;
                    buf.advance(consumed);
                    Ok(Some(command))
                }
                Some(RespValue::Array(None)) => Err(RespError::NullCommand),
                Some(_) => Err(RespError::BadCommandName),
                None => Ok(None),
            }
        } else {
            Self::parse_inline(buf)
        }
    }

    fn parse_inline(buf: &mut BytesMut) -> Result<Option<Command>, RespError> {
        let mut cursor = Cursor::new(&buf[..]);
        let line = match cursor.read_line()? {
            Some(line) => line,
            None => {
                if buf.len() > MAX_INLINE_LINE {
                    return Err(RespError::InlineTooLong);
                }
                return Ok(None);
            }
        };

        let mut tokens = line
            .split(|b: &u8| b.is_ascii_whitespace())
            .filter(|t| !t.is_empty());

        let name = match tokens.next() {
            Some(token) => String::from_utf8_lossy(token).to_uppercase(),
            None => return Err(RespError::EmptyInline),
        };
        let args: Vec<Option<Vec<u8>>> = tokens.map(|t| Some(t.to_vec())).collect();

        let consumed = cursor.pos;
        buf.advance(consumed);
        Ok(Some(Command::new(name, args)))
    }
}

/// Read-only view over the buffer; `pos` only commits back to the buffer
/// when a complete frame parses, so incomplete and error paths never need
/// to restore state.
struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Cursor { buf, pos: 0 }
    }

    /// Read one line up to a strict CRLF pair. Lone LF, a CR followed by
    /// anything but LF, and `\n\r` are protocol errors; a CR at the end of
    /// the buffer means the frame is still incomplete.
    fn read_line(&mut self) -> Result<Option<&'a [u8]>, RespError> {
        let start = self.pos;
        let mut i = start;
        while i < self.buf.len() {
            match self.buf[i] {
                b'\n' => return Err(RespError::BadLineEnding),
                b'\r' => {
                    if i + 1 >= self.buf.len() {
                        return Ok(None);
                    }
                    if self.buf[i + 1] != b'\n' {
                        return Err(RespError::BadLineEnding);
                    }
                    self.pos = i + 2;
                    return Ok(Some(&self.buf[start..i]));
                }
                _ => i += 1,
            }
        }
        Ok(None)
    }

    fn read_value(&mut self, depth: usize) -> Result<Option<RespValue>, RespError> {
        if depth > MAX_NESTING_DEPTH {
            return Err(RespError::NestingTooDeep);
        }
        let Some(&kind) = self.buf.get(self.pos) else {
            return Ok(None);
        };
        self.pos += 1;

        match kind {
            b'+' => match self.read_line()? {
                Some(line) => Ok(Some(RespValue::SimpleString(
                    String::from_utf8_lossy(line).into_owned(),
                ))),
                None => Ok(None),
            },
            b'-' => match self.read_line()? {
                Some(line) => Ok(Some(RespValue::Error(
                    String::from_utf8_lossy(line).into_owned(),
                ))),
                None => Ok(None),
            },
            b':' => match self.read_line()? {
                Some(line) => Ok(Some(RespValue::Integer(parse_i64(line)?))),
                None => Ok(None),
            },
            b'$' => self.read_bulk_string(),
            b'*' => self.read_array(depth),
            other => Err(RespError::UnknownType(other)),
        }
    }

    fn read_bulk_string(&mut self) -> Result<Option<RespValue>, RespError> {
        let Some(line) = self.read_line()? else {
            return Ok(None);
        };
        let declared = parse_i64(line)?;

        if declared == -1 {
            return Ok(Some(RespValue::BulkString(None)));
        }
        if declared < -1 {
            return Err(RespError::InvalidLength(declared));
        }
        if declared > MAX_BULK_STRING {
            return Err(RespError::BulkTooLarge(declared));
        }

        let len = declared as usize;
        if self.buf.len() - self.pos < len + 2 {
            return Ok(None);
        }
        if self.buf[self.pos + len] != b'\r' || self.buf[self.pos + len + 1] != b'\n' {
            return Err(RespError::MissingCrlf);
        }
        let data = self.buf[self.pos..self.pos + len].to_vec();
        self.pos += len + 2;
        Ok(Some(RespValue::BulkString(Some(data))))
    }

    fn read_array(&mut self, depth: usize) -> Result<Option<RespValue>, RespError> {
        let Some(line) = self.read_line()? else {
            return Ok(None);
        };
        let declared = parse_i64(line)?;

        if declared == -1 {
            return Ok(Some(RespValue::Array(None)));
        }
        if declared < -1 {
            return Err(RespError::InvalidLength(declared));
        }
        if declared > MAX_ARRAY_SIZE {
            return Err(RespError::ArrayTooLarge(declared));
        }

        let count = declared as usize;
        // Capacity is bounded independently of the declared count so a tiny
        // frame cannot trigger a huge allocation.
        let mut items = Vec::with_capacity(count.min(64));
        for _ in 0..count {
            match self.read_value(depth + 1)? {
                Some(item) => items.push(item),
                None => return Ok(None),
            }
        }
        Ok(Some(RespValue::Array(Some(items))))
    }
}

fn parse_i64(line: &[u8]) -> Result<i64, RespError> {
    if line.is_empty() {
        return Err(RespError::InvalidInteger);
    }
    let text = std::str::from_utf8(line).map_err(|_| RespError::InvalidInteger)?;
    text.parse::<i64>().map_err(|e| match e.kind() {
        std::num::IntErrorKind::PosOverflow | std::num::IntErrorKind::NegOverflow => {
            RespError::IntegerOverflow
        }
        _ => RespError::InvalidInteger,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_one(input: &[u8]) -> Result<Option<RespValue>, RespError> {
        let mut buf = BytesMut::from(input);
        RespParser::parse(&mut buf)
    }

    #[test]
    fn test_parse_simple_string() {
        let mut buf = BytesMut::from(&b"+OK\r\n"[..]);
        let result = RespParser::parse(&mut buf).unwrap().unwrap();
        assert_eq!(result, RespValue::SimpleString("OK".to_string()));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_parse_error() {
        let result = parse_one(b"-ERR unknown command\r\n").unwrap().unwrap();
        assert_eq!(result, RespValue::Error("ERR unknown command".to_string()));
    }

    #[test]
    fn test_parse_integer() {
        assert_eq!(
            parse_one(b":1000\r\n").unwrap().unwrap(),
            RespValue::Integer(1000)
        );
        assert_eq!(
            parse_one(b":-42\r\n").unwrap().unwrap(),
            RespValue::Integer(-42)
        );
        assert_eq!(
            parse_one(b":-9223372036854775808\r\n").unwrap().unwrap(),
            RespValue::Integer(i64::MIN)
        );
        assert_eq!(
            parse_one(b":9223372036854775807\r\n").unwrap().unwrap(),
            RespValue::Integer(i64::MAX)
        );
    }

    #[test]
    fn test_parse_integer_rejects_garbage() {
        assert_eq!(parse_one(b":\r\n"), Err(RespError::InvalidInteger));
        assert_eq!(parse_one(b":abc\r\n"), Err(RespError::InvalidInteger));
        assert_eq!(parse_one(b":12x\r\n"), Err(RespError::InvalidInteger));
        assert_eq!(
            parse_one(b":9223372036854775808\r\n"),
            Err(RespError::IntegerOverflow)
        );
        assert_eq!(
            parse_one(b":-9223372036854775809\r\n"),
            Err(RespError::IntegerOverflow)
        );
    }

    #[test]
    fn test_parse_bulk_string() {
        assert_eq!(
            parse_one(b"$6\r\nfoobar\r\n").unwrap().unwrap(),
            RespValue::BulkString(Some(b"foobar".to_vec()))
        );
    }

    #[test]
    fn test_parse_bulk_string_binary_safe() {
        let payload = b"a\r\nb\x00c";
        let mut frame = format!("${}\r\n", payload.len()).into_bytes();
        frame.extend_from_slice(payload);
        frame.extend_from_slice(b"\r\n");
        assert_eq!(
            parse_one(&frame).unwrap().unwrap(),
            RespValue::BulkString(Some(payload.to_vec()))
        );
    }

    #[test]
    fn test_parse_null_bulk_string() {
        assert_eq!(
            parse_one(b"$-1\r\n").unwrap().unwrap(),
            RespValue::BulkString(None)
        );
    }

    #[test]
    fn test_parse_empty_bulk_string() {
        assert_eq!(
            parse_one(b"$0\r\n\r\n").unwrap().unwrap(),
            RespValue::BulkString(Some(vec![]))
        );
    }

    #[test]
    fn test_bulk_length_limits() {
        assert_eq!(parse_one(b"$-2\r\n"), Err(RespError::InvalidLength(-2)));
        assert_eq!(
            parse_one(b"$536870913\r\n"),
            Err(RespError::BulkTooLarge(536870913))
        );
    }

    #[test]
    fn test_bulk_missing_trailing_crlf() {
        assert_eq!(parse_one(b"$3\r\nfooXY"), Err(RespError::MissingCrlf));
    }

    #[test]
    fn test_parse_array() {
        assert_eq!(
            parse_one(b"*2\r\n$3\r\nfoo\r\n$3\r\nbar\r\n").unwrap().unwrap(),
            RespValue::Array(Some(vec![
                RespValue::BulkString(Some(b"foo".to_vec())),
                RespValue::BulkString(Some(b"bar".to_vec())),
            ]))
        );
    }

    #[test]
    fn test_parse_null_array() {
        assert_eq!(
            parse_one(b"*-1\r\n").unwrap().unwrap(),
            RespValue::Array(None)
        );
    }

    #[test]
    fn test_parse_empty_array() {
        assert_eq!(
            parse_one(b"*0\r\n").unwrap().unwrap(),
            RespValue::Array(Some(vec![]))
        );
    }

    #[test]
    fn test_parse_nested_array() {
        assert_eq!(
            parse_one(b"*2\r\n*1\r\n:1\r\n*1\r\n:2\r\n").unwrap().unwrap(),
            RespValue::Array(Some(vec![
                RespValue::Array(Some(vec![RespValue::Integer(1)])),
                RespValue::Array(Some(vec![RespValue::Integer(2)])),
            ]))
        );
    }

    #[test]
    fn test_array_limits() {
        assert_eq!(parse_one(b"*-2\r\n"), Err(RespError::InvalidLength(-2)));
        assert_eq!(
            parse_one(b"*1000001\r\n"),
            Err(RespError::ArrayTooLarge(1000001))
        );
    }

    #[test]
    fn test_nesting_depth_capped() {
        let mut frame = Vec::new();
        for _ in 0..200 {
            frame.extend_from_slice(b"*1\r\n");
        }
        frame.extend_from_slice(b":1\r\n");
        assert_eq!(parse_one(&frame), Err(RespError::NestingTooDeep));
    }

    #[test]
    fn test_unknown_type_byte() {
        assert_eq!(parse_one(b"@foo\r\n"), Err(RespError::UnknownType(b'@')));
    }

    #[test]
    fn test_strict_crlf() {
        assert_eq!(parse_one(b"+OK\n"), Err(RespError::BadLineEnding));
        assert_eq!(parse_one(b"+OK\rX"), Err(RespError::BadLineEnding));
        assert_eq!(parse_one(b"+OK\n\r"), Err(RespError::BadLineEnding));
        assert_eq!(parse_one(b":1\nfoo"), Err(RespError::BadLineEnding));
    }

    #[test]
    fn test_incomplete_frames_consume_nothing() {
        for input in [
            &b""[..],
            b"+OK",
            b"+OK\r",
            b"$6\r\nfoo",
            b"*2\r\n$3\r\nfoo\r\n",
            b":12",
        ] {
            let mut buf = BytesMut::from(input);
            assert_eq!(RespParser::parse(&mut buf), Ok(None), "input {input:?}");
            assert_eq!(&buf[..], input);
        }
    }

    #[test]
    fn test_multiple_values_in_buffer() {
        let mut buf = BytesMut::from(&b"+OK\r\n+PONG\r\n"[..]);
        assert_eq!(
            RespParser::parse(&mut buf).unwrap().unwrap(),
            RespValue::SimpleString("OK".to_string())
        );
        assert_eq!(
            RespParser::parse(&mut buf).unwrap().unwrap(),
            RespValue::SimpleString("PONG".to_string())
        );
        assert!(buf.is_empty());
    }

    #[test]
    fn test_round_trip() {
        let values = vec![
            RespValue::SimpleString("OK".into()),
            RespValue::Error("ERR bad".into()),
            RespValue::Integer(0),
            RespValue::Integer(i64::MIN),
            RespValue::Integer(i64::MAX),
            RespValue::BulkString(None),
            RespValue::BulkString(Some(vec![])),
            RespValue::BulkString(Some(b"hello".to_vec())),
            RespValue::BulkString(Some({
                // 512 bytes of binary including CR, LF and NUL
                (0..512u32).map(|i| (i % 256) as u8).collect()
            })),
            RespValue::Array(None),
            RespValue::Array(Some(vec![])),
            RespValue::Array(Some(vec![
                RespValue::Integer(1),
                RespValue::BulkString(Some(b"x".to_vec())),
                RespValue::Array(Some(vec![RespValue::SimpleString("nested".into())])),
            ])),
        ];

        for value in values {
            let bytes = value.serialize();
            let mut buf = BytesMut::from(&bytes[..]);
            let reparsed = RespParser::parse(&mut buf).unwrap().unwrap();
            assert_eq!(reparsed, value);
            assert!(buf.is_empty());
            assert_eq!(reparsed.serialize(), bytes);
        }
    }

    #[test]
    fn test_chunked_delivery() {
        let stream = b"*3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n+OK\r\n:42\r\n$-1\r\n";
        for chunk in 1..=5 {
            let mut buf = BytesMut::new();
            let mut values = Vec::new();
            for piece in stream.chunks(chunk) {
                buf.extend_from_slice(piece);
                while let Some(value) = RespParser::parse(&mut buf).unwrap() {
                    values.push(value);
                }
            }
            assert_eq!(values.len(), 4, "chunk size {chunk}");
            assert_eq!(values[1], RespValue::SimpleString("OK".into()));
            assert_eq!(values[2], RespValue::Integer(42));
            assert_eq!(values[3], RespValue::BulkString(None));
        }
    }

    #[test]
    fn test_parse_command_array() {
        let mut buf = BytesMut::from(&b"*3\r\n$3\r\nset\r\n$3\r\nfoo\r\n$3\r\nbar\r\n"[..]);
        let cmd = RespParser::parse_command(&mut buf).unwrap().unwrap();
        assert_eq!(cmd.name(), "SET");
        assert_eq!(cmd.args().len(), 2);
        assert_eq!(cmd.arg(0), b"foo");
        assert_eq!(cmd.arg(1), b"bar");
        assert!(buf.is_empty());
    }

    #[test]
    fn test_parse_command_null_arg() {
        let mut buf = BytesMut::from(&b"*2\r\n$3\r\nGET\r\n$-1\r\n"[..]);
        let cmd = RespParser::parse_command(&mut buf).unwrap().unwrap();
        assert_eq!(cmd.args(), &[None]);
        assert_eq!(cmd.arg(0), b"");
    }

    #[test]
    fn test_parse_command_rejects_bad_shapes() {
        let mut buf = BytesMut::from(&b"*-1\r\n"[..]);
        assert_eq!(
            RespParser::parse_command(&mut buf),
            Err(RespError::NullCommand)
        );

        let mut buf = BytesMut::from(&b"*1\r\n:42\r\n"[..]);
        assert_eq!(
            RespParser::parse_command(&mut buf),
            Err(RespError::BadCommandName)
        );

        let mut buf = BytesMut::from(&b"*2\r\n$4\r\nPING\r\n:42\r\n"[..]);
        assert_eq!(
            RespParser::parse_command(&mut buf),
            Err(RespError::BadCommandArg)
        );
    }

    #[test]
    fn test_parse_command_empty_array() {
        let mut buf = BytesMut::from(&b"*0\r\n"[..]);
        let cmd = RespParser::parse_command(&mut buf).unwrap().unwrap();
        assert!(cmd.name().is_empty());
    }

    #[test]
    fn test_inline_command() {
        let mut buf = BytesMut::from(&b"ping\r\n"[..]);
        let cmd = RespParser::parse_command(&mut buf).unwrap().unwrap();
        assert_eq!(cmd.name(), "PING");
        assert!(cmd.args().is_empty());
    }

    #[test]
    fn test_inline_command_with_args() {
        let mut buf = BytesMut::from(&b"SET  key \t value\r\n"[..]);
        let cmd = RespParser::parse_command(&mut buf).unwrap().unwrap();
        assert_eq!(cmd.name(), "SET");
        assert_eq!(cmd.arg(0), b"key");
        assert_eq!(cmd.arg(1), b"value");
    }

    #[test]
    fn test_inline_command_blank_line() {
        let mut buf = BytesMut::from(&b"\r\n"[..]);
        assert_eq!(
            RespParser::parse_command(&mut buf),
            Err(RespError::EmptyInline)
        );

        let mut buf = BytesMut::from(&b"   \r\n"[..]);
        assert_eq!(
            RespParser::parse_command(&mut buf),
            Err(RespError::EmptyInline)
        );
    }

    #[test]
    fn test_inline_incomplete() {
        let mut buf = BytesMut::from(&b"PING"[..]);
        assert_eq!(RespParser::parse_command(&mut buf), Ok(None));
        assert_eq!(&buf[..], b"PING");
    }

    #[test]
    fn test_serialize_forms() {
        assert_eq!(RespValue::ok().serialize(), b"+OK\r\n");
        assert_eq!(RespValue::error("ERR bad").serialize(), b"-ERR bad\r\n");
        assert_eq!(RespValue::integer(42).serialize(), b":42\r\n");
        assert_eq!(RespValue::bulk_string(&b"hello"[..]).serialize(), b"$5\r\nhello\r\n");
        assert_eq!(RespValue::null_bulk_string().serialize(), b"$-1\r\n");
        assert_eq!(RespValue::null_array().serialize(), b"*-1\r\n");
        assert_eq!(
            RespValue::array(vec![
                RespValue::bulk_string(&b"foo"[..]),
                RespValue::integer(42)
            ])
            .serialize(),
            b"*2\r\n$3\r\nfoo\r\n:42\r\n"
        );
    }

    #[test]
    fn test_no_panic_on_adversarial_input() {
        let inputs: Vec<Vec<u8>> = vec![
            b"$99999999999999999999\r\n".to_vec(),
            b"*99999999999999999999\r\n".to_vec(),
            b"$536870913\r\nx".to_vec(),
            b"\x00\x01\x02".to_vec(),
            b"*3\r\n$1\r\na\r\n".to_vec(),
            vec![b'*'; 1024],
            b"$5\r\nab".to_vec(),
        ];
        for input in inputs {
            let mut buf = BytesMut::from(&input[..]);
            // any outcome is fine as long as we neither panic nor loop
            let _ = RespParser::parse(&mut buf);
            let mut buf = BytesMut::from(&input[..]);
            let _ = RespParser::parse_command(&mut buf);
        }
    }
}
