use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::common::{AuthError, AuthResult};

/// SAML attribute listing `role,principal` pairs for AWS
pub const ROLE_ATTRIBUTE_NAME: &str = "https://aws.amazon.com/SAML/Attributes/Role";

static PRINCIPAL_ARN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"arn:aws:iam:[^:]*:[0-9]+:saml-provider/[0-9a-zA-Z\-_.]+")
        .expect("principal ARN pattern is valid")
});

/// Role attribute values pulled out of a decoded SAML response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedAssertion {
    role_values: Vec<String>,
}

impl DecodedAssertion {
    /// Decode the base64 `SAMLResponse` and parse the XML inside it
    pub fn from_base64(saml_response: &str) -> AuthResult<Self> {
        let bytes = STANDARD
            .decode(saml_response.trim())
            .map_err(|e| AuthError::assertion_decode(format!("invalid base64: {}", e)))?;
        let xml = String::from_utf8(bytes)
            .map_err(|e| AuthError::assertion_decode(format!("invalid UTF-8: {}", e)))?;

        Self::parse(&xml)
    }

    pub fn parse(xml: &str) -> AuthResult<Self> {
        let document = roxmltree::Document::parse(xml)
            .map_err(|e| AuthError::assertion_decode(format!("invalid XML: {}", e)))?;

        let role_values = document
            .descendants()
            .filter(|node| {
                node.has_tag_name("Attribute") && node.attribute("Name") == Some(ROLE_ATTRIBUTE_NAME)
            })
            .flat_map(|attribute| attribute.children().filter(|c| c.has_tag_name("AttributeValue")))
            .map(|value| {
                value
                    .descendants()
                    .filter(|d| d.is_text())
                    .filter_map(|d| d.text())
                    .collect::<String>()
            })
            .collect();

        Ok(Self { role_values })
    }

    pub fn role_values(&self) -> &[String] {
        &self.role_values
    }

    /// Principal paired with the first role value that mentions `role_arn`
    pub fn principal_for(&self, role_arn: &str) -> Option<String> {
        self.role_values
            .iter()
            .find(|value| value.contains(role_arn))
            .and_then(|value| extract_principal_arn(value))
    }
}

pub fn extract_principal_arn(text: &str) -> Option<String> {
    PRINCIPAL_ARN.find(text).map(|m| m.as_str().to_string())
}
