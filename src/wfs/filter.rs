//! OGC Filter Encoding snippets and the WFS 1.1.0 GetFeature envelope.
//!
//! The element names and attribute ordering below address a third-party
//! WFS endpoint and are reproduced exactly; do not reorder attributes
//! or switch quote styles.

/// Escape text content for embedding in the request body.
fn xml_escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// One comparison clause of an `ogc:Filter`.
///
/// `is_equal` selects `ogc:PropertyIsEqualTo`; otherwise a
/// `ogc:PropertyIsLike` "contains" match is built with the literal
/// wrapped in the wildcard token. The wildcard/single-char/escape-char
/// tokens are carried as attributes on either element.
pub fn ogc_filter_snippet(
    is_equal: bool,
    wild_card: &str,
    single_char: &str,
    escape_char: &str,
    property_prefix: &str,
    property_name: &str,
    literal: &str,
) -> String {
    let operator = if is_equal {
        "PropertyIsEqualTo"
    } else {
        "PropertyIsLike"
    };
    let literal = if is_equal {
        xml_escape(literal)
    } else {
        format!("{wild_card}{}{wild_card}", xml_escape(literal))
    };
    format!(
        "<ogc:{operator} matchCase='false' wildCard='{wild_card}' singleChar='{single_char}' escapeChar='{escape_char}'>\
<ogc:PropertyName>{property_prefix}{property_name}</ogc:PropertyName>\
<ogc:Literal>{literal}</ogc:Literal>\
</ogc:{operator}>"
    )
}

/// Multi-value "is-in" clause: an `ogc:Or` of equality comparisons, one
/// per value. A single value collapses to the bare equality clause.
pub fn ogc_is_in_snippet(
    values: &[String],
    wild_card: &str,
    single_char: &str,
    escape_char: &str,
    property_prefix: &str,
    property_name: &str,
) -> String {
    let clauses: String = values
        .iter()
        .map(|value| {
            ogc_filter_snippet(
                true,
                wild_card,
                single_char,
                escape_char,
                property_prefix,
                property_name,
                value,
            )
        })
        .collect();
    if values.len() > 1 {
        format!("<ogc:Or>{clauses}</ogc:Or>")
    } else {
        clauses
    }
}

/// The WFS 1.1.0 `GetFeature` request body around a prepared filter.
///
/// Requested property names (plus the geometry property) are listed
/// explicitly so the response carries exactly the fields the adapter
/// normalizes.
pub fn wfs110_get_feature(
    type_name: &str,
    property_names: &[String],
    geometry_name: &str,
    filter: &str,
    max_features: usize,
) -> String {
    let mut properties: String = property_names
        .iter()
        .map(|name| format!("<wfs:PropertyName>{name}</wfs:PropertyName>"))
        .collect();
    if !geometry_name.is_empty() {
        properties.push_str(&format!("<wfs:PropertyName>{geometry_name}</wfs:PropertyName>"));
    }
    format!(
        "<?xml version='1.0' encoding='UTF-8'?>\
<wfs:GetFeature service='WFS' xmlns:wfs='http://www.opengis.net/wfs' xmlns:ogc='http://www.opengis.net/ogc' xmlns:gml='http://www.opengis.net/gml' traverseXlinkDepth='*' version='1.1.0' maxFeatures='{max_features}'>\
<wfs:Query typeName='{type_name}'>\
{properties}\
<ogc:Filter>{filter}</ogc:Filter>\
</wfs:Query>\
</wfs:GetFeature>"
    )
}

/// Validate the filter-character settings of a WFS backend definition.
///
/// Returns `true` when the configuration is unusable: no service url,
/// or any of the wildcard/single-char/escape-char tokens missing or not
/// exactly one character. An unusable configuration is logged exactly
/// once per check, listing every defect; the caller raises the user
/// alert and never sends the query.
pub fn config_has_errors(
    url: Option<&str>,
    wild_card: Option<&str>,
    single_char: Option<&str>,
    escape_char: Option<&str>,
) -> bool {
    let mut defects: Vec<String> = Vec::new();
    match url {
        None => defects.push("url is missing".into()),
        Some(u) if u.is_empty() => defects.push("url is empty".into()),
        Some(_) => {}
    }
    for (name, value) in [
        ("wildCard", wild_card),
        ("singleChar", single_char),
        ("escapeChar", escape_char),
    ] {
        match value {
            None => defects.push(format!("{name} is missing")),
            Some(token) if token.chars().count() != 1 => {
                defects.push(format!("{name} must be exactly one character"))
            }
            Some(_) => {}
        }
    }
    if defects.is_empty() {
        return false;
    }
    tracing::warn!(defects = %defects.join("; "), "unusable WFS filter configuration");
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_snippet_matches_endpoint_contract() {
        let snippet =
            ogc_filter_snippet(true, "%", "#", "!", "app:", "DS_USER_CODE", "X5555X");
        assert_eq!(
            snippet,
            "<ogc:PropertyIsEqualTo matchCase='false' wildCard='%' singleChar='#' escapeChar='!'>\
<ogc:PropertyName>app:DS_USER_CODE</ogc:PropertyName>\
<ogc:Literal>X5555X</ogc:Literal>\
</ogc:PropertyIsEqualTo>"
        );
    }

    #[test]
    fn like_snippet_wraps_literal_in_wildcards() {
        let snippet =
            ogc_filter_snippet(false, "%", "#", "!", "app:", "DS_USER_CODE", "X5555X");
        assert_eq!(
            snippet,
            "<ogc:PropertyIsLike matchCase='false' wildCard='%' singleChar='#' escapeChar='!'>\
<ogc:PropertyName>app:DS_USER_CODE</ogc:PropertyName>\
<ogc:Literal>%X5555X%</ogc:Literal>\
</ogc:PropertyIsLike>"
        );
    }

    #[test]
    fn literal_text_is_escaped() {
        let snippet = ogc_filter_snippet(true, "%", "#", "!", "", "name", "Park & Ride");
        assert!(snippet.contains("<ogc:Literal>Park &amp; Ride</ogc:Literal>"));
    }

    #[test]
    fn is_in_expands_to_or_of_equalities() {
        let snippet = ogc_is_in_snippet(
            &["7".to_string(), "9".to_string()],
            "%",
            "#",
            "!",
            "app:",
            "DISTRICT",
        );
        assert!(snippet.starts_with("<ogc:Or><ogc:PropertyIsEqualTo"));
        assert!(snippet.ends_with("</ogc:PropertyIsEqualTo></ogc:Or>"));
        assert_eq!(snippet.matches("<ogc:PropertyIsEqualTo").count(), 2);
        assert!(snippet.contains("<ogc:Literal>7</ogc:Literal>"));
        assert!(snippet.contains("<ogc:Literal>9</ogc:Literal>"));
    }

    #[test]
    fn single_value_is_in_collapses_to_equality() {
        let snippet =
            ogc_is_in_snippet(&["7".to_string()], "%", "#", "!", "app:", "DISTRICT");
        assert!(!snippet.contains("<ogc:Or>"));
        assert!(snippet.starts_with("<ogc:PropertyIsEqualTo"));
    }

    #[test]
    fn get_feature_envelope_shape() {
        let filter = ogc_filter_snippet(false, "*", "#", "!", "app:", "flaechenid", "42");
        let body = wfs110_get_feature(
            "app:bebauungsplaene",
            &["app:flaechenid".to_string()],
            "app:geom",
            &filter,
            20,
        );
        assert!(body.starts_with("<?xml version='1.0' encoding='UTF-8'?><wfs:GetFeature service='WFS' "));
        assert!(body.contains("version='1.1.0' maxFeatures='20'"));
        assert!(body.contains("<wfs:Query typeName='app:bebauungsplaene'>"));
        assert!(body.contains("<wfs:PropertyName>app:flaechenid</wfs:PropertyName>"));
        assert!(body.contains("<wfs:PropertyName>app:geom</wfs:PropertyName>"));
        assert!(body.contains("<ogc:Filter><ogc:PropertyIsLike "));
        assert!(body.ends_with("</wfs:Query></wfs:GetFeature>"));
    }

    #[test]
    fn valid_config_has_no_errors() {
        assert!(!config_has_errors(
            Some("https://wfs.example"),
            Some("%"),
            Some("#"),
            Some("!")
        ));
    }

    #[test]
    fn missing_url_is_an_error() {
        assert!(config_has_errors(None, Some("%"), Some("#"), Some("!")));
        assert!(config_has_errors(Some(""), Some("%"), Some("#"), Some("!")));
    }

    #[test]
    fn filter_tokens_must_be_single_characters() {
        assert!(config_has_errors(
            Some("https://wfs.example"),
            Some("%%"),
            Some("#"),
            Some("!")
        ));
        assert!(config_has_errors(
            Some("https://wfs.example"),
            Some("%"),
            Some(""),
            Some("!")
        ));
        assert!(config_has_errors(
            Some("https://wfs.example"),
            Some("%"),
            Some("#"),
            None
        ));
    }
}
