//! The normalized act record.

use std::fmt;
use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

use super::classifier::{TextClassification, classify};
use super::document::RawDocument;
use super::error::RecordError;

/// Format of the `pubDate` attribute.
pub const PUB_DATE_FORMAT: &str = "%d/%m/%Y";

/// Separator between the three source identifiers of the identity key.
pub const ACT_ID_SEPARATOR: char = '-';

#[allow(clippy::expect_used)]
static SECTION_DIGITS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]+").expect("invalid regex: section digits"));

/// Whether an act was published in the regular or a supplementary edition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EditionKind {
    /// Regular daily edition.
    #[serde(rename = "Ordinária")]
    Ordinary,
    /// Supplementary ("Extra") edition.
    #[serde(rename = "Extra")]
    Extra,
}

impl EditionKind {
    /// Derives the edition kind from a `pubName` such as `DO1` or `DO1E`.
    #[must_use]
    pub fn from_pub_name(pub_name: &str) -> Self {
        if pub_name.contains('E') {
            Self::Extra
        } else {
            Self::Ordinary
        }
    }

    /// Returns the label used in exported rows.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ordinary => "Ordinária",
            Self::Extra => "Extra",
        }
    }
}

impl fmt::Display for EditionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One gazette act, fully derived at construction and immutable afterwards.
///
/// Serialized field names are the export column names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    act_id: String,
    #[serde(rename = "tipo")]
    act_type: String,
    #[serde(rename = "titulo")]
    title: Option<String>,
    #[serde(rename = "orgao")]
    agency: String,
    #[serde(rename = "ementa")]
    summary: Option<String>,
    #[serde(rename = "texto_completo")]
    full_text: Option<String>,
    #[serde(rename = "secao")]
    section: u32,
    #[serde(rename = "edicao")]
    edition: String,
    #[serde(rename = "tipo_edicao")]
    edition_kind: EditionKind,
    #[serde(rename = "pagina")]
    page: String,
    #[serde(rename = "data_publicacao")]
    publication_date: NaiveDate,
    url: Option<String>,
    #[serde(rename = "url_versao_certificada")]
    certified_url: String,
    #[serde(rename = "data_captura")]
    captured_at: NaiveDateTime,
    #[serde(rename = "data_publicacao_particao")]
    publication_partition: Option<NaiveDate>,
    #[serde(rename = "texto_principal")]
    principal_text: Option<String>,
    #[serde(rename = "excerto")]
    excerpt: Option<String>,
    #[serde(rename = "assinatura")]
    signature: Option<String>,
    #[serde(rename = "cargo")]
    role: Option<String>,
}

impl Record {
    /// Builds a record, stamping it with the current local time.
    ///
    /// # Errors
    ///
    /// See [`Record::build_at`].
    pub fn build(raw: RawDocument) -> Result<Self, RecordError> {
        Self::build_at(raw, chrono::Local::now().naive_local())
    }

    /// Builds a record with an explicit capture timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::MissingSectionNumber`] when `pubName` has no
    /// digits and [`RecordError::InvalidPublicationDate`] when `pubDate` is
    /// not `dd/mm/yyyy`.
    pub fn build_at(raw: RawDocument, captured_at: NaiveDateTime) -> Result<Self, RecordError> {
        let act_id = format!(
            "{}{ACT_ID_SEPARATOR}{}{ACT_ID_SEPARATOR}{}",
            raw.id, raw.id_oficio, raw.id_materia
        );

        let section = section_number(&raw.pub_name, &act_id)?;
        let edition_kind = EditionKind::from_pub_name(&raw.pub_name);
        let publication_date = NaiveDate::parse_from_str(raw.pub_date.trim(), PUB_DATE_FORMAT)
            .map_err(|source| RecordError::InvalidPublicationDate {
                act_id: act_id.clone(),
                value: raw.pub_date.clone(),
                source,
            })?;

        let derived = raw
            .texto
            .as_deref()
            .filter(|body| !body.trim().is_empty())
            .map(classify)
            .unwrap_or_default();
        let TextClassification {
            principal_text,
            excerpt,
            signature,
            role,
        } = derived;

        Ok(Self {
            act_id,
            act_type: raw.art_type,
            title: raw.identifica,
            agency: raw.art_category,
            summary: raw.ementa,
            full_text: raw.texto,
            section,
            edition: raw.edition_number,
            edition_kind,
            page: raw.number_page,
            publication_date,
            url: None,
            certified_url: raw.pdf_page,
            captured_at,
            publication_partition: None,
            principal_text,
            excerpt,
            signature,
            role,
        })
    }

    /// Flat field mapping for tabular export, keyed by column name.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the record cannot be represented as
    /// JSON, which does not happen for well-formed records.
    pub fn to_fields(&self) -> Result<Map<String, Value>, serde_json::Error> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(serde::ser::Error::custom(format!(
                "record serialized to non-object value: {other}"
            ))),
        }
    }

    #[must_use]
    pub fn act_id(&self) -> &str {
        &self.act_id
    }

    #[must_use]
    pub fn act_type(&self) -> &str {
        &self.act_type
    }

    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    #[must_use]
    pub fn agency(&self) -> &str {
        &self.agency
    }

    #[must_use]
    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    #[must_use]
    pub fn full_text(&self) -> Option<&str> {
        self.full_text.as_deref()
    }

    #[must_use]
    pub fn section(&self) -> u32 {
        self.section
    }

    #[must_use]
    pub fn edition(&self) -> &str {
        &self.edition
    }

    #[must_use]
    pub fn edition_kind(&self) -> EditionKind {
        self.edition_kind
    }

    #[must_use]
    pub fn page(&self) -> &str {
        &self.page
    }

    #[must_use]
    pub fn publication_date(&self) -> NaiveDate {
        self.publication_date
    }

    /// Source URL; filled by downstream enrichment, never at construction.
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    #[must_use]
    pub fn certified_url(&self) -> &str {
        &self.certified_url
    }

    #[must_use]
    pub fn captured_at(&self) -> NaiveDateTime {
        self.captured_at
    }

    /// Partition date; filled by downstream enrichment, never at construction.
    #[must_use]
    pub fn publication_partition(&self) -> Option<NaiveDate> {
        self.publication_partition
    }

    #[must_use]
    pub fn principal_text(&self) -> Option<&str> {
        self.principal_text.as_deref()
    }

    #[must_use]
    pub fn excerpt(&self) -> Option<&str> {
        self.excerpt.as_deref()
    }

    #[must_use]
    pub fn signature(&self) -> Option<&str> {
        self.signature.as_deref()
    }

    #[must_use]
    pub fn role(&self) -> Option<&str> {
        self.role.as_deref()
    }
}

fn section_number(pub_name: &str, act_id: &str) -> Result<u32, RecordError> {
    let digits = SECTION_DIGITS_RE
        .find(pub_name)
        .ok_or_else(|| RecordError::MissingSectionNumber {
            act_id: act_id.to_string(),
            pub_name: pub_name.to_string(),
        })?
        .as_str();
    digits
        .parse()
        .map_err(|_| RecordError::InvalidSectionNumber {
            act_id: act_id.to_string(),
            digits: digits.to_string(),
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::extract::document::parse_document;
    use crate::extract::document::tests::SAMPLE_XML;

    fn raw(pub_name: &str, texto: Option<&str>) -> RawDocument {
        RawDocument {
            id: "100".to_string(),
            id_oficio: "200".to_string(),
            id_materia: "300".to_string(),
            art_type: "Portaria".to_string(),
            art_category: "Ministério da Economia".to_string(),
            pub_name: pub_name.to_string(),
            edition_number: "176".to_string(),
            number_page: "12".to_string(),
            pub_date: "14/09/2023".to_string(),
            pdf_page: "http://example.com/pdf".to_string(),
            identifica: Some("PORTARIA Nº 1".to_string()),
            ementa: None,
            texto: texto.map(str::to_string),
        }
    }

    fn captured() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 9, 15)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap()
    }

    #[test]
    fn test_identity_key_joins_three_ids() {
        let record = Record::build_at(raw("DO1", None), captured()).unwrap();
        assert_eq!(record.act_id(), "100-200-300");
    }

    #[test]
    fn test_section_three_ordinary() {
        let record = Record::build_at(raw("DO3", None), captured()).unwrap();
        assert_eq!(record.section(), 3);
        assert_eq!(record.edition_kind(), EditionKind::Ordinary);
    }

    #[test]
    fn test_section_one_extra() {
        let record = Record::build_at(raw("DO1E", None), captured()).unwrap();
        assert_eq!(record.section(), 1);
        assert_eq!(record.edition_kind(), EditionKind::Extra);
        assert_eq!(record.edition_kind().to_string(), "Extra");
    }

    #[test]
    fn test_section_two_label_is_ordinaria() {
        let record = Record::build_at(raw("DO2", None), captured()).unwrap();
        assert_eq!(record.edition_kind().as_str(), "Ordinária");
    }

    #[test]
    fn test_pub_name_without_digit_is_error() {
        let result = Record::build_at(raw("DOE", None), captured());
        assert!(matches!(
            result,
            Err(RecordError::MissingSectionNumber { ref pub_name, .. }) if pub_name == "DOE"
        ));
    }

    #[test]
    fn test_invalid_pub_date_is_error() {
        let mut document = raw("DO1", None);
        document.pub_date = "2023-09-14".to_string();
        let result = Record::build_at(document, captured());
        assert!(matches!(
            result,
            Err(RecordError::InvalidPublicationDate { .. })
        ));
    }

    #[test]
    fn test_publication_date_parsed_day_first() {
        let record = Record::build_at(raw("DO1", None), captured()).unwrap();
        assert_eq!(
            record.publication_date(),
            NaiveDate::from_ymd_opt(2023, 9, 14).unwrap()
        );
    }

    #[test]
    fn test_empty_body_leaves_derived_fields_none() {
        for texto in [None, Some(""), Some("   ")] {
            let record = Record::build_at(raw("DO1", texto), captured()).unwrap();
            assert_eq!(record.principal_text(), None);
            assert_eq!(record.excerpt(), None);
            assert_eq!(record.signature(), None);
            assert_eq!(record.role(), None);
        }
    }

    #[test]
    fn test_downstream_fields_start_empty() {
        let record = Record::build_at(raw("DO1", None), captured()).unwrap();
        assert_eq!(record.url(), None);
        assert_eq!(record.publication_partition(), None);
        assert_eq!(record.captured_at(), captured());
    }

    #[test]
    fn test_build_from_sample_document_derives_text() {
        let document = parse_document(SAMPLE_XML).unwrap();
        let record = Record::build_at(document, captured()).unwrap();
        assert_eq!(record.act_id(), "39826591-9877419-21034890");
        assert_eq!(record.section(), 2);
        assert_eq!(
            record.principal_text(),
            Some("A MINISTRA DE ESTADO DA SAÚDE resolve nomear FULANO DE TAL.")
        );
        assert_eq!(record.excerpt(), Some("resolve nomear fulano de tal."));
        assert_eq!(record.signature(), Some("NÍSIA TRINDADE LIMA"));
        assert_eq!(record.role(), Some("Ministra"));
        assert_eq!(record.summary(), None);
    }

    #[test]
    fn test_to_fields_round_trips_every_field() {
        let document = parse_document(SAMPLE_XML).unwrap();
        let record = Record::build_at(document, captured()).unwrap();
        let fields = record.to_fields().unwrap();

        let expected: Vec<(&str, Value)> = vec![
            ("act_id", Value::from(record.act_id())),
            ("tipo", Value::from(record.act_type())),
            ("titulo", serde_json::to_value(record.title()).unwrap()),
            ("orgao", Value::from(record.agency())),
            ("ementa", serde_json::to_value(record.summary()).unwrap()),
            ("texto_completo", serde_json::to_value(record.full_text()).unwrap()),
            ("secao", Value::from(record.section())),
            ("edicao", Value::from(record.edition())),
            ("tipo_edicao", Value::from(record.edition_kind().as_str())),
            ("pagina", Value::from(record.page())),
            ("data_publicacao", Value::from("2023-09-14")),
            ("url", Value::Null),
            ("url_versao_certificada", Value::from(record.certified_url())),
            ("data_captura", Value::from("2023-09-15T08:30:00")),
            ("data_publicacao_particao", Value::Null),
            ("texto_principal", serde_json::to_value(record.principal_text()).unwrap()),
            ("excerto", serde_json::to_value(record.excerpt()).unwrap()),
            ("assinatura", serde_json::to_value(record.signature()).unwrap()),
            ("cargo", serde_json::to_value(record.role()).unwrap()),
        ];

        assert_eq!(fields.len(), expected.len());
        for (key, value) in expected {
            assert_eq!(fields.get(key), Some(&value), "field {key} mismatch");
        }
    }
}
