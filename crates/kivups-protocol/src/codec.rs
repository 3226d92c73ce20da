//! Codec trait and the text implementation for KIVUPS frames.
//!
//! A "codec" (coder/decoder) converts between [`Message`] values and the
//! raw bytes of one frame. It handles exactly one complete, terminated
//! frame at a time: cutting a TCP byte stream into frames is the job of
//! the connection layer above.
//!
//! The grammar has no escaping, so parsing is strict. Every quote and
//! bracket has to be where the grammar says it is, and anything left over
//! after the parameter block is an error:
//!
//! ```text
//! frame   = "KIVUPS" id(2) timestamp(26) "{" nickname "}" "{" params "}" "\n"
//! params  = [ param *( "," param ) ]
//! param   = '"' name '":"' ( scalar | list ) '"'
//! list    = "[" [ record *( ";" record ) ] "]"
//! record  = "{" [ field *( "," field ) ] "}"
//! field   = '"' name '":"' scalar '"'
//! ```

use crate::registry;
use crate::types::{
    COMMAND_ID_LEN, CommandId, Field, Message, Nickname, Param, ParamValue, Record,
    SIGNATURE, TERMINATOR, TIMESTAMP_LEN, Timestamp,
};
use crate::ProtocolError;

/// Characters that cannot appear inside an outbound value: they would
/// change how the frame splits.
const RESERVED: &[char] = &['"', '\n', '{', '}', '[', ']', ';', ','];

/// A codec that turns messages into frames and frames into messages.
///
/// `Send + Sync + 'static` so one codec can be shared by the foreground
/// exchange path and a background listener task.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a message into one terminated frame.
    ///
    /// # Errors
    /// Returns a [`ProtocolError`] if the message cannot be represented
    /// on the wire (reserved characters, unregistered parameters, ...).
    fn encode(&self, message: &Message) -> Result<Vec<u8>, ProtocolError>;

    /// Parses one terminated frame.
    ///
    /// # Errors
    /// Returns a [`ProtocolError`] if the frame is malformed, truncated,
    /// uses an unknown command or carries the wrong parameters.
    fn decode(&self, frame: &[u8]) -> Result<Message, ProtocolError>;
}

// ---------------------------------------------------------------------------
// TextCodec
// ---------------------------------------------------------------------------

/// The KIVUPS line codec.
///
/// ## Example
///
/// ```rust
/// use kivups_protocol::{Codec, CommandId, Message, Nickname, Param, TextCodec};
///
/// let codec = TextCodec;
/// let msg = Message::new(
///     CommandId::CLIENT_JOIN_GAME,
///     Nickname::parse("Alice123").unwrap(),
///     vec![Param::scalar("gameName", "G1")],
/// );
///
/// let bytes = codec.encode(&msg).unwrap();
/// assert!(bytes.starts_with(b"KIVUPS03"));
/// assert!(bytes.ends_with(b"{Alice123}{\"gameName\":\"G1\"}\n"));
///
/// assert_eq!(codec.decode(&bytes).unwrap(), msg);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct TextCodec;

impl Codec for TextCodec {
    fn encode(&self, message: &Message) -> Result<Vec<u8>, ProtocolError> {
        if message.signature != SIGNATURE {
            return Err(ProtocolError::InvalidMessage(format!(
                "signature must be {SIGNATURE:?}, got {:?}",
                message.signature
            )));
        }
        if message.command.0 > 99 {
            return Err(ProtocolError::InvalidMessage(format!(
                "command id {} does not fit {COMMAND_ID_LEN} digits",
                message.command.0
            )));
        }
        let command = registry::lookup(message.command)?;
        command.check_params(&message.params)?;

        let mut out = String::with_capacity(64);
        out.push_str(SIGNATURE);
        out.push_str(&message.command.to_string());
        out.push_str(message.timestamp.as_str());
        out.push('{');
        out.push_str(message.nickname.as_str());
        out.push('}');

        out.push('{');
        for (i, param) in message.params.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            push_name(&mut out, &param.name)?;
            out.push_str(":\"");
            match &param.value {
                ParamValue::Scalar(value) => push_value(&mut out, &param.name, value)?,
                ParamValue::List(records) => push_list(&mut out, records)?,
            }
            out.push('"');
        }
        out.push('}');
        out.push(TERMINATOR as char);

        Ok(out.into_bytes())
    }

    fn decode(&self, frame: &[u8]) -> Result<Message, ProtocolError> {
        let Some((&TERMINATOR, body)) = frame.split_last() else {
            return Err(ProtocolError::MissingTerminator);
        };
        if body.contains(&TERMINATOR) {
            return Err(ProtocolError::Malformed("embedded line terminator".into()));
        }
        if !body.is_ascii() {
            return Err(ProtocolError::Malformed("frame contains non-ASCII bytes".into()));
        }
        let text = std::str::from_utf8(body)
            .map_err(|e| ProtocolError::Malformed(e.to_string()))?;

        let mut scan = Scanner::new(text);

        // --- Header ---
        let signature = scan.take(SIGNATURE.len())?;
        if signature != SIGNATURE {
            return Err(ProtocolError::Malformed(format!(
                "bad signature {signature:?}"
            )));
        }

        let digits = scan.take(COMMAND_ID_LEN)?;
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ProtocolError::Malformed(format!(
                "command id {digits:?} is not numeric"
            )));
        }
        let command = digits
            .parse::<u8>()
            .map(CommandId)
            .map_err(|e| ProtocolError::Malformed(e.to_string()))?;
        let descriptor = registry::lookup(command)?;

        let timestamp = Timestamp::parse(scan.take(TIMESTAMP_LEN)?)?;

        scan.expect(b'{')?;
        let nickname = Nickname::parse(scan.take_until(b'}')?)?;
        scan.expect(b'}')?;

        // --- Parameters ---
        let params = scan.param_block()?;
        if !scan.at_end() {
            return Err(ProtocolError::Malformed(format!(
                "trailing bytes after parameter block: {:?}",
                scan.rest()
            )));
        }
        descriptor.check_params(&params)?;

        Ok(Message {
            signature: signature.to_string(),
            command,
            timestamp,
            nickname,
            params,
        })
    }
}

fn push_name(out: &mut String, name: &str) -> Result<(), ProtocolError> {
    check_name(name)?;
    out.push('"');
    out.push_str(name);
    out.push('"');
    Ok(())
}

fn push_value(out: &mut String, name: &str, value: &str) -> Result<(), ProtocolError> {
    if let Some(c) = value.chars().find(|c| RESERVED.contains(c) || !c.is_ascii()) {
        return Err(ProtocolError::InvalidMessage(format!(
            "value of {name:?} contains reserved character {c:?}"
        )));
    }
    out.push_str(value);
    Ok(())
}

fn push_list(out: &mut String, records: &[Record]) -> Result<(), ProtocolError> {
    out.push('[');
    for (i, record) in records.iter().enumerate() {
        if i > 0 {
            out.push(';');
        }
        out.push('{');
        for (j, field) in record.fields.iter().enumerate() {
            if j > 0 {
                out.push(',');
            }
            push_name(out, &field.name)?;
            out.push_str(":\"");
            push_value(out, &field.name, &field.value)?;
            out.push('"');
        }
        out.push('}');
    }
    out.push(']');
    Ok(())
}

fn check_name(name: &str) -> Result<(), ProtocolError> {
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
        return Err(ProtocolError::InvalidField {
            field: "parameter name".into(),
            reason: format!("{name:?} is not a valid name"),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Scanner
// ---------------------------------------------------------------------------

/// Cursor over an ASCII frame body.
///
/// Byte offsets are always valid char boundaries because the body was
/// checked to be ASCII before the scanner is built.
struct Scanner<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn peek(&self) -> Option<u8> {
        self.input.as_bytes().get(self.pos).copied()
    }

    fn take(&mut self, n: usize) -> Result<&'a str, ProtocolError> {
        if self.rest().len() < n {
            return Err(ProtocolError::Malformed(format!(
                "frame truncated at byte {}",
                self.pos
            )));
        }
        let taken = &self.input[self.pos..self.pos + n];
        self.pos += n;
        Ok(taken)
    }

    /// Consumes `byte` if it is next.
    fn eat(&mut self, byte: u8) -> bool {
        if self.peek() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, byte: u8) -> Result<(), ProtocolError> {
        match self.peek() {
            Some(found) if found == byte => {
                self.pos += 1;
                Ok(())
            }
            Some(found) => Err(ProtocolError::Malformed(format!(
                "expected '{}' at byte {}, found '{}'",
                byte as char, self.pos, found as char
            ))),
            None => Err(ProtocolError::Malformed(format!(
                "expected '{}' at byte {}, found end of frame",
                byte as char, self.pos
            ))),
        }
    }

    /// Returns everything up to (not including) the next `byte`.
    fn take_until(&mut self, byte: u8) -> Result<&'a str, ProtocolError> {
        let Some(offset) = self.rest().bytes().position(|b| b == byte) else {
            return Err(ProtocolError::Malformed(format!(
                "missing '{}' after byte {}",
                byte as char, self.pos
            )));
        };
        let taken = &self.input[self.pos..self.pos + offset];
        self.pos += offset;
        Ok(taken)
    }

    fn quoted(&mut self) -> Result<&'a str, ProtocolError> {
        self.expect(b'"')?;
        let inner = self.take_until(b'"')?;
        self.expect(b'"')?;
        Ok(inner)
    }

    fn name(&mut self) -> Result<String, ProtocolError> {
        let name = self.quoted()?;
        check_name(name)?;
        Ok(name.to_string())
    }

    fn param_block(&mut self) -> Result<Vec<Param>, ProtocolError> {
        self.expect(b'{')?;
        let mut params = Vec::new();
        if self.eat(b'}') {
            return Ok(params);
        }
        loop {
            params.push(self.param()?);
            if !self.eat(b',') {
                break;
            }
        }
        self.expect(b'}')?;
        Ok(params)
    }

    fn param(&mut self) -> Result<Param, ProtocolError> {
        let name = self.name()?;
        self.expect(b':')?;
        self.expect(b'"')?;
        let value = if self.peek() == Some(b'[') {
            ParamValue::List(self.list()?)
        } else {
            ParamValue::Scalar(self.take_until(b'"')?.to_string())
        };
        self.expect(b'"')?;
        Ok(Param { name, value })
    }

    fn list(&mut self) -> Result<Vec<Record>, ProtocolError> {
        self.expect(b'[')?;
        let mut records = Vec::new();
        if self.eat(b']') {
            return Ok(records);
        }
        loop {
            records.push(self.record()?);
            if !self.eat(b';') {
                break;
            }
        }
        self.expect(b']')?;
        Ok(records)
    }

    fn record(&mut self) -> Result<Record, ProtocolError> {
        self.expect(b'{')?;
        let mut fields = Vec::new();
        if self.eat(b'}') {
            return Ok(Record { fields });
        }
        loop {
            let name = self.name()?;
            self.expect(b':')?;
            let value = self.quoted()?.to_string();
            fields.push(Field { name, value });
            if !self.eat(b',') {
                break;
            }
        }
        self.expect(b'}')?;
        Ok(Record { fields })
    }
}
