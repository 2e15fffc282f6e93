//! Reader for the per-act XML envelopes shipped inside INLabs bundles.
//!
//! Each file holds a single act:
//!
//! ```text
//! <xml>
//!   <article id=".." idOficio=".." idMateria=".." artType=".." artCategory=".."
//!            pubName="DO1" editionNumber=".." numberPage=".." pubDate="14/09/2023"
//!            pdfPage="..">
//!     <body>
//!       <Identifica><![CDATA[...]]></Identifica>
//!       <Ementa />
//!       <Texto><![CDATA[<p>...</p>]]></Texto>
//!     </body>
//!   </article>
//! </xml>
//! ```

use std::path::{Path, PathBuf};

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::error::DocumentError;

/// Raw fields of one act, as found in its XML envelope.
///
/// Attribute values are required. Body elements are required to be present
/// but may be empty, in which case they are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawDocument {
    pub id: String,
    pub id_oficio: String,
    pub id_materia: String,
    pub art_type: String,
    pub art_category: String,
    pub pub_name: String,
    pub edition_number: String,
    pub number_page: String,
    pub pub_date: String,
    pub pdf_page: String,
    pub identifica: Option<String>,
    pub ementa: Option<String>,
    pub texto: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyField {
    Identifica,
    Ementa,
    Texto,
}

impl BodyField {
    fn from_name(name: &[u8]) -> Option<Self> {
        match name {
            b"Identifica" => Some(Self::Identifica),
            b"Ementa" => Some(Self::Ementa),
            b"Texto" => Some(Self::Texto),
            _ => None,
        }
    }
}

/// Collected state while walking the event stream.
#[derive(Default)]
struct Collector {
    attributes: Option<Vec<(String, String)>>,
    identifica: Option<Option<String>>,
    ementa: Option<Option<String>>,
    texto: Option<Option<String>>,
}

impl Collector {
    fn slot(&mut self, field: BodyField) -> &mut Option<Option<String>> {
        match field {
            BodyField::Identifica => &mut self.identifica,
            BodyField::Ementa => &mut self.ementa,
            BodyField::Texto => &mut self.texto,
        }
    }

    fn store(&mut self, field: BodyField, content: &str) {
        let trimmed = content.trim();
        let value = (!trimmed.is_empty()).then(|| trimmed.to_string());
        // First occurrence wins.
        let slot = self.slot(field);
        if slot.is_none() {
            *slot = Some(value);
        }
    }

    fn finish(self, origin: &str) -> Result<RawDocument, DocumentError> {
        let attributes = self
            .attributes
            .ok_or_else(|| DocumentError::missing(origin, "article"))?;
        let attr = |name: &'static str| -> Result<String, DocumentError> {
            attributes
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.clone())
                .ok_or_else(|| DocumentError::missing(origin, format!("article@{name}")))
        };

        Ok(RawDocument {
            id: attr("id")?,
            id_oficio: attr("idOficio")?,
            id_materia: attr("idMateria")?,
            art_type: attr("artType")?,
            art_category: attr("artCategory")?,
            pub_name: attr("pubName")?,
            edition_number: attr("editionNumber")?,
            number_page: attr("numberPage")?,
            pub_date: attr("pubDate")?,
            pdf_page: attr("pdfPage")?,
            identifica: self
                .identifica
                .ok_or_else(|| DocumentError::missing(origin, "body/Identifica"))?,
            ementa: self
                .ementa
                .ok_or_else(|| DocumentError::missing(origin, "body/Ementa"))?,
            texto: self
                .texto
                .ok_or_else(|| DocumentError::missing(origin, "body/Texto"))?,
        })
    }
}

/// Reads and parses an XML envelope from disk.
///
/// # Errors
///
/// Returns [`DocumentError::Io`] if the file cannot be read, and the errors of
/// [`parse_document`] otherwise.
pub fn read_document(path: &Path) -> Result<RawDocument, DocumentError> {
    let bytes = std::fs::read(path).map_err(|e| DocumentError::io(path, e))?;
    let text = String::from_utf8_lossy(&bytes);
    parse_document_from(&text, &path.display().to_string())
}

/// Parses an XML envelope held in memory.
///
/// # Errors
///
/// Returns [`DocumentError::Xml`] for malformed XML and
/// [`DocumentError::MissingField`] when a required attribute or body element
/// is absent.
pub fn parse_document(xml: &str) -> Result<RawDocument, DocumentError> {
    parse_document_from(xml, "<memory>")
}

fn parse_document_from(xml: &str, origin: &str) -> Result<RawDocument, DocumentError> {
    let xml = xml.strip_prefix('\u{feff}').unwrap_or(xml);
    let mut reader = Reader::from_str(xml);
    let mut collector = Collector::default();
    let mut current: Option<(BodyField, String)> = None;
    let mut buf = Vec::new();

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| DocumentError::xml(origin, e.to_string()))?;
        match event {
            Event::Start(e) => match e.name().as_ref() {
                b"article" if collector.attributes.is_none() => {
                    collector.attributes = Some(read_attributes(&e, origin)?);
                }
                name => {
                    if current.is_none()
                        && let Some(field) = BodyField::from_name(name)
                    {
                        current = Some((field, String::new()));
                    }
                }
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"article" if collector.attributes.is_none() => {
                    collector.attributes = Some(read_attributes(&e, origin)?);
                }
                name => {
                    if current.is_none()
                        && let Some(field) = BodyField::from_name(name)
                    {
                        collector.store(field, "");
                    }
                }
            },
            Event::Text(e) => {
                if let Some((_, content)) = current.as_mut() {
                    let text = e
                        .unescape()
                        .map(std::borrow::Cow::into_owned)
                        .unwrap_or_else(|_| String::from_utf8_lossy(&e).into_owned());
                    content.push_str(&text);
                }
            }
            Event::CData(e) => {
                if let Some((_, content)) = current.as_mut() {
                    content.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Event::End(e) => {
                let closes_current = current
                    .as_ref()
                    .is_some_and(|(field, _)| BodyField::from_name(e.name().as_ref()) == Some(*field));
                if closes_current && let Some((field, content)) = current.take() {
                    collector.store(field, &content);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    collector.finish(origin)
}

fn read_attributes(
    element: &BytesStart<'_>,
    origin: &str,
) -> Result<Vec<(String, String)>, DocumentError> {
    element
        .attributes()
        .map(|attr| {
            let attr = attr.map_err(|e| DocumentError::xml(origin, e.to_string()))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|e| DocumentError::xml(origin, e.to_string()))?
                .into_owned();
            Ok((key, value))
        })
        .collect()
}

/// Keeps only paths that look like XML envelopes, preserving order.
#[must_use]
pub fn xml_documents(paths: &[PathBuf]) -> Vec<PathBuf> {
    paths
        .iter()
        .filter(|path| {
            path.file_name()
                .is_some_and(|name| name.to_string_lossy().contains(".xml"))
        })
        .cloned()
        .collect()
}
