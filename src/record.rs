//! Length-prefixed `tf.train.Example` records.
//!
//! Every record is an `i64` little-endian payload length followed by the
//! payload. The payload uses the protobuf wire layout of
//! `Example { Features features = 1 }`, `Features { map<string, Feature> feature = 1 }`,
//! `Feature { BytesList bytes_list = 1 }`, `BytesList { repeated bytes value = 1 }`
//! so TensorFlow readers consume the streams and shards unchanged.

use std::io::{self, Read, Write};
use tracing::warn;

use crate::constants::record::{
    BYTES_LIST_VALUE_FIELD, EXAMPLE_FEATURES_FIELD, FEATURE_BYTES_LIST_FIELD,
    FEATURE_FLOAT_LIST_FIELD, FEATURE_INT64_LIST_FIELD, FEATURES_MAP_FIELD, LENGTH_HEADER_BYTES,
    MAP_KEY_FIELD, MAP_VALUE_FIELD, WIRE_FIXED32, WIRE_FIXED64, WIRE_LEN, WIRE_VARINT,
};
use crate::errors::PipelineError;
use crate::types::FieldName;

/// One named feature holding a list of byte strings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Feature {
    /// Feature key (for example `article`).
    pub name: FieldName,
    /// Byte-string values in order.
    pub values: Vec<Vec<u8>>,
}

/// Ordered set of uniquely named byte-list features.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Example {
    features: Vec<Feature>,
}

impl Example {
    /// Empty example.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Example::insert`].
    pub fn with_values<N, I, V>(mut self, name: N, values: I) -> Self
    where
        N: Into<FieldName>,
        I: IntoIterator<Item = V>,
        V: Into<Vec<u8>>,
    {
        self.insert(name, values);
        self
    }

    /// Builder for a single UTF-8 value.
    pub fn with_text(self, name: impl Into<FieldName>, text: &str) -> Self {
        self.with_values(name, [text.as_bytes()])
    }

    /// Set `name` to `values`, replacing an existing feature in place.
    pub fn insert<N, I, V>(&mut self, name: N, values: I)
    where
        N: Into<FieldName>,
        I: IntoIterator<Item = V>,
        V: Into<Vec<u8>>,
    {
        let name = name.into();
        let values: Vec<Vec<u8>> = values.into_iter().map(Into::into).collect();
        match self.features.iter_mut().find(|feature| feature.name == name) {
            Some(existing) => existing.values = values,
            None => self.features.push(Feature { name, values }),
        }
    }

    /// Values stored under `name`.
    pub fn get(&self, name: &str) -> Option<&[Vec<u8>]> {
        self.features
            .iter()
            .find(|feature| feature.name == name)
            .map(|feature| feature.values.as_slice())
    }

    /// First value under `name` as UTF-8 text.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name)?
            .first()
            .and_then(|value| std::str::from_utf8(value).ok())
    }

    /// Features in insertion order.
    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    /// Number of features.
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// True when the example has no features.
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Serialize an example into `tf.train.Example` wire bytes (no length header).
pub fn encode_payload(example: &Example) -> Vec<u8> {
    let mut features = Vec::new();
    for feature in &example.features {
        let mut bytes_list = Vec::new();
        for value in &feature.values {
            put_len_field(&mut bytes_list, BYTES_LIST_VALUE_FIELD, value);
        }
        let mut feature_msg = Vec::with_capacity(bytes_list.len() + 6);
        put_len_field(&mut feature_msg, FEATURE_BYTES_LIST_FIELD, &bytes_list);

        let mut entry = Vec::with_capacity(feature.name.len() + feature_msg.len() + 12);
        put_len_field(&mut entry, MAP_KEY_FIELD, feature.name.as_bytes());
        put_len_field(&mut entry, MAP_VALUE_FIELD, &feature_msg);
        put_len_field(&mut features, FEATURES_MAP_FIELD, &entry);
    }
    let mut payload = Vec::with_capacity(features.len() + 6);
    put_len_field(&mut payload, EXAMPLE_FEATURES_FIELD, &features);
    payload
}

/// Parse `tf.train.Example` wire bytes. Unknown fields are skipped.
pub fn decode_payload(payload: &[u8]) -> Result<Example, PipelineError> {
    let mut example = Example::new();
    let mut fields = WireFields::new(payload);
    while let Some((field, value)) = fields.next_field()? {
        if let (EXAMPLE_FEATURES_FIELD, WireValue::Len(bytes)) = (field, value) {
            decode_features(bytes, &mut example)?;
        }
    }
    Ok(example)
}

fn decode_features(bytes: &[u8], example: &mut Example) -> Result<(), PipelineError> {
    let mut fields = WireFields::new(bytes);
    while let Some((field, value)) = fields.next_field()? {
        if let (FEATURES_MAP_FIELD, WireValue::Len(entry)) = (field, value) {
            let (name, values) = decode_map_entry(entry)?;
            example.insert(name, values);
        }
    }
    Ok(())
}

fn decode_map_entry(bytes: &[u8]) -> Result<(FieldName, Vec<Vec<u8>>), PipelineError> {
    let mut name = FieldName::new();
    let mut values = Vec::new();
    let mut fields = WireFields::new(bytes);
    while let Some((field, value)) = fields.next_field()? {
        match (field, value) {
            (MAP_KEY_FIELD, WireValue::Len(key)) => {
                name = std::str::from_utf8(key)
                    .map_err(|_| PipelineError::CorruptPayload("feature key is not UTF-8".into()))?
                    .to_string();
            }
            (MAP_VALUE_FIELD, WireValue::Len(feature)) => {
                values = decode_feature(feature)?;
            }
            _ => {}
        }
    }
    Ok((name, values))
}

fn decode_feature(bytes: &[u8]) -> Result<Vec<Vec<u8>>, PipelineError> {
    let mut values = Vec::new();
    let mut fields = WireFields::new(bytes);
    while let Some((field, value)) = fields.next_field()? {
        match (field, value) {
            (FEATURE_BYTES_LIST_FIELD, WireValue::Len(list)) => {
                values.clear();
                let mut items = WireFields::new(list);
                while let Some((item_field, item)) = items.next_field()? {
                    if let (BYTES_LIST_VALUE_FIELD, WireValue::Len(value)) = (item_field, item) {
                        values.push(value.to_vec());
                    }
                }
            }
            (FEATURE_FLOAT_LIST_FIELD | FEATURE_INT64_LIST_FIELD, _) => {
                return Err(PipelineError::CorruptPayload(
                    "only bytes_list features are supported".into(),
                ));
            }
            _ => {}
        }
    }
    Ok(values)
}

/// Full record bytes: length header plus payload.
pub fn encode(example: &Example) -> Vec<u8> {
    let payload = encode_payload(example);
    let mut out = Vec::with_capacity(LENGTH_HEADER_BYTES + payload.len());
    out.extend_from_slice(&length_header(payload.len()));
    out.extend_from_slice(&payload);
    out
}

/// Append one record to `writer`, returning the bytes written.
pub fn write_record<W: Write>(writer: &mut W, example: &Example) -> Result<usize, PipelineError> {
    let bytes = encode(example);
    writer.write_all(&bytes)?;
    Ok(bytes.len())
}

/// Read and decode the next record, returning it with the bytes consumed.
///
/// `Ok(None)` marks the end of the stream.
pub fn decode<R: Read>(reader: &mut R) -> Result<Option<(Example, usize)>, PipelineError> {
    match read_frame(reader)? {
        Some(frame) => {
            let example = frame.decode()?;
            Ok(Some((example, frame.encoded_len())))
        }
        None => Ok(None),
    }
}

/// A framed record kept as raw payload bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordFrame {
    payload: Vec<u8>,
}

impl RecordFrame {
    /// Wrap an already encoded payload.
    pub fn from_payload(payload: Vec<u8>) -> Self {
        Self { payload }
    }

    /// Raw payload bytes (without the length header).
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Header plus payload length.
    pub fn encoded_len(&self) -> usize {
        LENGTH_HEADER_BYTES + self.payload.len()
    }

    /// Write header and payload verbatim.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<usize> {
        writer.write_all(&length_header(self.payload.len()))?;
        writer.write_all(&self.payload)?;
        Ok(self.encoded_len())
    }

    /// Decode the payload into an [`Example`].
    pub fn decode(&self) -> Result<Example, PipelineError> {
        decode_payload(&self.payload)
    }
}

/// Read the next frame without decoding its payload.
///
/// Fewer than eight available header bytes is the end of the stream; a payload
/// shorter than its declared length is [`PipelineError::TruncatedRecord`].
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Option<RecordFrame>, PipelineError> {
    let mut header = [0u8; LENGTH_HEADER_BYTES];
    let got = read_up_to(reader, &mut header)?;
    if got < LENGTH_HEADER_BYTES {
        if got > 0 {
            warn!(bytes = got, "ignoring partial length header at end of stream");
        }
        return Ok(None);
    }
    let declared = i64::from_le_bytes(header);
    let expected = usize::try_from(declared).map_err(|_| {
        PipelineError::CorruptPayload(format!("negative record length {declared}"))
    })?;
    let mut payload = Vec::new();
    reader
        .by_ref()
        .take(expected as u64)
        .read_to_end(&mut payload)?;
    if payload.len() < expected {
        return Err(PipelineError::TruncatedRecord {
            expected,
            actual: payload.len(),
        });
    }
    Ok(Some(RecordFrame { payload }))
}

/// Iterator over the frames of a binary stream. Stops after the first error.
pub struct RecordReader<R> {
    inner: R,
    done: bool,
}

impl<R: Read> RecordReader<R> {
    /// Wrap a reader positioned at a record boundary.
    pub fn new(inner: R) -> Self {
        Self { inner, done: false }
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = Result<RecordFrame, PipelineError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match read_frame(&mut self.inner) {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

fn length_header(len: usize) -> [u8; LENGTH_HEADER_BYTES] {
    (len as i64).to_le_bytes()
}

fn read_up_to<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(filled)
}

fn put_varint(buf: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        buf.push((value as u8) | 0x80);
        value >>= 7;
    }
    buf.push(value as u8);
}

fn put_len_field(buf: &mut Vec<u8>, field: u32, bytes: &[u8]) {
    put_varint(buf, (u64::from(field) << 3) | u64::from(WIRE_LEN));
    put_varint(buf, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

enum WireValue<'a> {
    Varint,
    Fixed,
    Len(&'a [u8]),
}

struct WireFields<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireFields<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn next_field(&mut self) -> Result<Option<(u32, WireValue<'a>)>, PipelineError> {
        if self.pos >= self.buf.len() {
            return Ok(None);
        }
        let tag = self.varint()?;
        let field = u32::try_from(tag >> 3)
            .map_err(|_| PipelineError::CorruptPayload(format!("field number too large in tag {tag}")))?;
        let value = match (tag & 0x7) as u8 {
            WIRE_VARINT => {
                self.varint()?;
                WireValue::Varint
            }
            WIRE_FIXED64 => {
                self.take(8)?;
                WireValue::Fixed
            }
            WIRE_LEN => {
                let len = self.varint()?;
                let len = usize::try_from(len).map_err(|_| {
                    PipelineError::CorruptPayload(format!("length {len} does not fit in memory"))
                })?;
                WireValue::Len(self.take(len)?)
            }
            WIRE_FIXED32 => {
                self.take(4)?;
                WireValue::Fixed
            }
            other => {
                return Err(PipelineError::CorruptPayload(format!(
                    "unsupported wire type {other} for field {field}"
                )));
            }
        };
        Ok(Some((field, value)))
    }

    fn varint(&mut self) -> Result<u64, PipelineError> {
        let mut value = 0u64;
        for shift in (0..64).step_by(7) {
            let byte = *self
                .buf
                .get(self.pos)
                .ok_or_else(|| PipelineError::CorruptPayload("varint runs past end of payload".into()))?;
            self.pos += 1;
            value |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(PipelineError::CorruptPayload("varint longer than 10 bytes".into()))
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], PipelineError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.buf.len())
            .ok_or_else(|| {
                PipelineError::CorruptPayload(format!(
                    "field of {len} bytes runs past end of payload"
                ))
            })?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample() -> Example {
        Example::new()
            .with_text("article", "plant the tree .")
            .with_text("fact_descriptions", "")
            .with_text("abstract", "<s> dig a hole . </s>")
    }

    #[test]
    fn payload_matches_tf_example_wire_layout() {
        let payload = encode_payload(&Example::new().with_text("article", "a"));
        let mut expected = vec![0x0A, 0x12, 0x0A, 0x10, 0x0A, 0x07];
        expected.extend_from_slice(b"article");
        expected.extend_from_slice(&[0x12, 0x05, 0x0A, 0x03, 0x0A, 0x01, b'a']);
        assert_eq!(payload, expected);
    }

    #[test]
    fn long_values_use_multi_byte_varints() {
        let value = "x".repeat(200);
        let payload = encode_payload(&Example::new().with_text("k", &value));
        let decoded = decode_payload(&payload).unwrap();
        assert_eq!(decoded.text("k"), Some(value.as_str()));

        let mut buf = Vec::new();
        put_varint(&mut buf, 200);
        assert_eq!(buf, vec![0xC8, 0x01]);
    }

    #[test]
    fn decode_reports_fields_and_bytes_consumed() {
        let example = sample();
        let bytes = encode(&example);
        let mut cursor = Cursor::new(bytes.clone());
        let (decoded, consumed) = decode(&mut cursor).unwrap().unwrap();
        assert_eq!(decoded, example);
        assert_eq!(consumed, bytes.len());
        assert!(decode(&mut cursor).unwrap().is_none());
    }

    #[test]
    fn header_is_little_endian_payload_length() {
        let bytes = encode(&sample());
        let declared = i64::from_le_bytes(bytes[..8].try_into().unwrap());
        assert_eq!(declared as usize, bytes.len() - LENGTH_HEADER_BYTES);
    }

    #[test]
    fn multi_value_features_keep_order() {
        let example = Example::new().with_values("tokens", ["b", "a", "c"]);
        let decoded = decode_payload(&encode_payload(&example)).unwrap();
        assert_eq!(
            decoded.get("tokens").unwrap(),
            &[b"b".to_vec(), b"a".to_vec(), b"c".to_vec()]
        );
    }

    #[test]
    fn insert_replaces_existing_feature() {
        let mut example = Example::new().with_text("article", "old");
        example.insert("article", ["new"]);
        assert_eq!(example.len(), 1);
        assert_eq!(example.text("article"), Some("new"));
        assert!(example.get("missing").is_none());
    }

    #[test]
    fn empty_stream_is_end_of_stream() {
        let mut cursor = Cursor::new(Vec::<u8>::new());
        assert!(read_frame(&mut cursor).unwrap().is_none());
    }

    #[test]
    fn partial_header_is_end_of_stream() {
        let mut cursor = Cursor::new(vec![1u8, 2, 3]);
        assert!(read_frame(&mut cursor).unwrap().is_none());
    }

    #[test]
    fn short_payload_is_truncated_record() {
        let mut bytes = encode(&sample());
        let full = bytes.len() - LENGTH_HEADER_BYTES;
        bytes.truncate(bytes.len() - 5);
        let err = read_frame(&mut Cursor::new(bytes)).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::TruncatedRecord { expected, actual } if expected == full && actual == full - 5
        ));
    }

    #[test]
    fn negative_length_is_corrupt() {
        let bytes = (-4i64).to_le_bytes().to_vec();
        let err = read_frame(&mut Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, PipelineError::CorruptPayload(ref msg) if msg.contains("negative")));
    }

    #[test]
    fn unknown_fields_are_skipped() {
        let mut payload = encode_payload(&Example::new().with_text("article", "a"));
        // field 7 varint, field 9 fixed32
        payload.extend_from_slice(&[0x38, 0x96, 0x01, 0x4D, 1, 2, 3, 4]);
        let decoded = decode_payload(&payload).unwrap();
        assert_eq!(decoded.text("article"), Some("a"));
        assert_eq!(decoded.len(), 1);
    }

    #[test]
    fn non_bytes_features_are_rejected() {
        // map entry: key "x", value Feature { int64_list = 3: [] }
        let mut feature = Vec::new();
        put_len_field(&mut feature, FEATURE_INT64_LIST_FIELD, &[]);
        let mut entry = Vec::new();
        put_len_field(&mut entry, MAP_KEY_FIELD, b"x");
        put_len_field(&mut entry, MAP_VALUE_FIELD, &feature);
        let mut features = Vec::new();
        put_len_field(&mut features, FEATURES_MAP_FIELD, &entry);
        let mut payload = Vec::new();
        put_len_field(&mut payload, EXAMPLE_FEATURES_FIELD, &features);

        let err = decode_payload(&payload).unwrap_err();
        assert!(matches!(err, PipelineError::CorruptPayload(ref msg) if msg.contains("bytes_list")));
    }

    #[test]
    fn overrunning_length_is_corrupt() {
        let err = decode_payload(&[0x0A, 0x05, 0x01]).unwrap_err();
        assert!(matches!(err, PipelineError::CorruptPayload(_)));
        let err = decode_payload(&[0x0A, 0xFF]).unwrap_err();
        assert!(matches!(err, PipelineError::CorruptPayload(_)));
    }

    #[test]
    fn record_reader_yields_frames_in_order_and_stops_on_error() {
        let first = Example::new().with_text("article", "one");
        let second = Example::new().with_text("article", "two");
        let mut bytes = encode(&first);
        bytes.extend(encode(&second));
        bytes.extend_from_slice(&100i64.to_le_bytes());
        bytes.extend_from_slice(b"short");

        let mut reader = RecordReader::new(Cursor::new(bytes));
        assert_eq!(reader.next().unwrap().unwrap().decode().unwrap(), first);
        assert_eq!(reader.next().unwrap().unwrap().decode().unwrap(), second);
        assert!(matches!(
            reader.next(),
            Some(Err(PipelineError::TruncatedRecord { expected: 100, actual: 5 }))
        ));
        assert!(reader.next().is_none());
    }

    #[test]
    fn frames_rewrite_verbatim() {
        let bytes = encode(&sample());
        let frame = read_frame(&mut Cursor::new(bytes.clone())).unwrap().unwrap();
        let mut out = Vec::new();
        let written = frame.write_to(&mut out).unwrap();
        assert_eq!(written, bytes.len());
        assert_eq!(out, bytes);
        assert_eq!(RecordFrame::from_payload(frame.payload().to_vec()), frame);
    }
}
