//! Codec for the controller's XML payloads: `<entry>` list documents and the
//! `<xConnection>` creation request.

use quick_xml::events::{BytesText, Event};
use quick_xml::{Reader, Writer};
use tracing::error;

use crate::{ConnectionParams, ControllerError};

/// Decode the text of every `<entry>` element in the document.
///
/// A body that fails to parse yields an empty list; some controller endpoints
/// answer plain text instead of a document and those callers check the body
/// before decoding.
pub fn decode_entries(xml: &str) -> Vec<String> {
    let mut reader = Reader::from_str(xml);
    let mut entries = Vec::new();
    let mut in_entry = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == b"entry" => in_entry = true,
            Ok(Event::End(e)) if e.name().as_ref() == b"entry" => in_entry = false,
            Ok(Event::Text(text)) if in_entry => match text.unescape() {
                Ok(text) => entries.push(text.trim().to_owned()),
                Err(err) => {
                    error!(%err, "xml parse error");
                    return Vec::new();
                }
            },
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => {
                error!(%err, "xml parse error");
                return Vec::new();
            }
        }
    }

    entries
}

/// Encode the `<xConnection>` document the controller expects when creating
/// a cross-connection.
pub fn encode_xconnection(id: &str, params: &ConnectionParams) -> Result<String, ControllerError> {
    let mut writer = Writer::new(Vec::new());
    writer
        .create_element("xConnection")
        .write_inner_content(|w| -> Result<(), quick_xml::Error> {
            w.create_element("instanceID")
                .write_text_content(BytesText::new(id))?;
            w.create_element("srcEndPointId")
                .write_text_content(BytesText::new(&params.src_endpoint))?;
            w.create_element("srcLabelId")
                .write_text_content(BytesText::new(&params.src_label))?;
            w.create_element("dstEndPointId")
                .write_text_content(BytesText::new(&params.dst_endpoint))?;
            w.create_element("dstLabelId")
                .write_text_content(BytesText::new(&params.dst_label))?;
            Ok(())
        })
        .map_err(|err| ControllerError::MalformedPayload(err.to_string()))?;

    String::from_utf8(writer.into_inner())
        .map_err(|err| ControllerError::MalformedPayload(err.to_string()))
}
