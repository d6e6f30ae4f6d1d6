//! DOM extraction
//!
//! Reads the rendered document element's inner markup from a live session
//! and encodes it in the configured charset. No sanitization or parsing
//! happens here.

use crate::browser::{BrowserSession, WebDriverError};
use crate::ConfigError;
use encoding_rs::Encoding;
use thiserror::Error;

const DOCUMENT_TAG: &str = "html";
const INNER_HTML: &str = "innerHTML";

/// Errors raised while reading the rendered DOM
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Session not responsive: {0}")]
    Unresponsive(#[from] WebDriverError),

    #[error("Document element has no innerHTML")]
    MissingDocument,
}

/// Resolves a charset label to an encoder
///
/// Labels follow the WHATWG Encoding Standard (`UTF-8`, `ISO-8859-1`,
/// `Shift_JIS`, ...). Encodings that cannot be produced as output, such as
/// UTF-16, are rejected along with unknown labels.
pub fn resolve_encoding(label: &str) -> Result<&'static Encoding, ConfigError> {
    let encoding = Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| ConfigError::UnsupportedEncoding(label.to_string()))?;

    if encoding.output_encoding() != encoding {
        return Err(ConfigError::UnsupportedEncoding(format!(
            "{} cannot be used for output",
            label
        )));
    }

    Ok(encoding)
}

/// Encodes document text in `encoding`
///
/// Characters the charset cannot represent are written as numeric character
/// references, which keeps the output valid HTML.
pub fn encode_document(text: &str, encoding: &'static Encoding) -> Vec<u8> {
    let (bytes, _, _) = encoding.encode(text);
    bytes.into_owned()
}

/// Reads the rendered document from `session` and encodes it
pub async fn extract_dom<S: BrowserSession>(
    session: &S,
    encoding: &'static Encoding,
) -> Result<Vec<u8>, ExtractError> {
    let document = session.find_element_by_tag(DOCUMENT_TAG).await?;

    let markup = match session.element_property(&document, INNER_HTML).await? {
        Some(markup) => markup,
        None => session
            .element_attribute(&document, INNER_HTML)
            .await?
            .ok_or(ExtractError::MissingDocument)?,
    };

    Ok(encode_document(&markup, encoding))
}
