use crate::error::CvPdfError;
use kuchiki::NodeRef;
use kuchiki::traits::TendrilSink;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Translations {
    entries: BTreeMap<String, String>,
}

impl Translations {
    // Nested objects are flattened with dots: `{"nav": {"home": "Start"}}`
    // yields `nav.home`. Array items are addressed by index.
    pub fn from_json(json: &str) -> Result<Self, CvPdfError> {
        let value: serde_json::Value =
            serde_json::from_str(json).map_err(|err| CvPdfError::Locale(err.to_string()))?;
        if !value.is_object() {
            return Err(CvPdfError::Locale(
                "translation file must be a JSON object".to_string(),
            ));
        }
        let mut entries = BTreeMap::new();
        flatten("", &value, &mut entries);
        Ok(Self { entries })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn flatten(prefix: &str, value: &serde_json::Value, out: &mut BTreeMap<String, String>) {
    let join = |key: &str| {
        if prefix.is_empty() {
            key.to_string()
        } else {
            format!("{prefix}.{key}")
        }
    };
    match value {
        serde_json::Value::Object(map) => {
            for (key, child) in map {
                flatten(&join(key), child, out);
            }
        }
        serde_json::Value::Array(items) => {
            for (idx, child) in items.iter().enumerate() {
                flatten(&join(&idx.to_string()), child, out);
            }
        }
        serde_json::Value::String(s) => {
            out.insert(prefix.to_string(), s.clone());
        }
        serde_json::Value::Null => {}
        other => {
            out.insert(prefix.to_string(), other.to_string());
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalizeOptions {
    pub lang: String,
    pub theme: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Localized {
    pub html: String,
    pub substituted: usize,
    pub missing: Vec<String>,
}

pub fn localize_html(
    html: &str,
    translations: &Translations,
    options: &LocalizeOptions,
) -> Result<Localized, CvPdfError> {
    let document = kuchiki::parse_html().one(html);
    let mut substituted = 0usize;
    let mut missing = BTreeSet::new();

    let text_nodes: Vec<_> = document
        .select("[data-i18n]")
        .map_err(|_| CvPdfError::Locale("invalid i18n selector".to_string()))?
        .collect();
    for element in text_nodes {
        let key = element
            .attributes
            .borrow()
            .get("data-i18n")
            .map(|k| k.trim().to_string())
            .unwrap_or_default();
        if key.is_empty() {
            continue;
        }
        match translations.get(&key) {
            Some(value) => {
                replace_text(element.as_node(), value);
                substituted += 1;
            }
            None => {
                missing.insert(key);
            }
        }
    }

    let attr_nodes: Vec<_> = document
        .select("[data-i18n-attr]")
        .map_err(|_| CvPdfError::Locale("invalid i18n selector".to_string()))?
        .collect();
    for element in attr_nodes {
        let bindings = element
            .attributes
            .borrow()
            .get("data-i18n-attr")
            .map(str::to_string)
            .unwrap_or_default();
        for (attr, key) in parse_attr_bindings(&bindings) {
            match translations.get(key) {
                Some(value) => {
                    element
                        .attributes
                        .borrow_mut()
                        .insert(attr, value.to_string());
                    substituted += 1;
                }
                None => {
                    missing.insert(key.to_string());
                }
            }
        }
    }

    if let Ok(root) = document.select_first("html") {
        let mut attrs = root.attributes.borrow_mut();
        if !options.lang.trim().is_empty() {
            attrs.insert("lang", options.lang.trim().to_string());
        }
        if let Some(theme) = options.theme.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            attrs.insert("data-theme", theme.to_string());
        }
    }

    Ok(Localized {
        html: document.to_string(),
        substituted,
        missing: missing.into_iter().collect(),
    })
}

fn replace_text(node: &NodeRef, value: &str) {
    let children: Vec<NodeRef> = node.children().collect();
    for child in children {
        child.detach();
    }
    node.append(NodeRef::new_text(value));
}

fn parse_attr_bindings(bindings: &str) -> Vec<(&str, &str)> {
    bindings.split(';')
        .filter_map(|pair| {
            let (attr, key) = pair.split_once(':')?;
            let (attr, key) = (attr.trim(), key.trim());
            (!attr.is_empty() && !key.is_empty()).then_some((attr, key))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!doctype html><html lang="en"><head><title data-i18n="meta.title">CV</title></head>
<body>
<h1 data-i18n="hero.name">Jane Doe</h1>
<p data-i18n="hero.role">Engineer <b>here</b></p>
<a href="cv.pdf" data-i18n-attr="title:nav.download; aria-label:nav.missing">PDF</a>
<p data-i18n="hero.unknown">Keep me</p>
</body></html>"#;

    fn german() -> Translations {
        Translations::from_json(
            r#"{"meta": {"title": "Lebenslauf"},
                "hero": {"name": "Jane Doe", "role": "Ingenieurin & Entwicklerin"},
                "nav": {"download": "Herunterladen"},
                "years": 7}"#,
        )
        .unwrap()
    }

    #[test]
    fn flattens_nested_keys() {
        let tr = german();
        assert_eq!(tr.get("hero.role"), Some("Ingenieurin & Entwicklerin"));
        assert_eq!(tr.get("years"), Some("7"));
        assert_eq!(tr.len(), 5);
        let list = Translations::from_json(r#"{"skills": ["Rust", "Go"]}"#).unwrap();
        assert_eq!(list.get("skills.1"), Some("Go"));
        assert!(Translations::from_json("[1, 2]").is_err());
        assert!(Translations::from_json("{").is_err());
    }

    #[test]
    fn substitutes_text_and_attributes() {
        let options = LocalizeOptions {
            lang: "de".to_string(),
            theme: Some("dark".to_string()),
        };
        let out = localize_html(PAGE, &german(), &options).unwrap();
        assert!(out.html.contains("<title data-i18n=\"meta.title\">Lebenslauf</title>"));
        assert!(out.html.contains("Ingenieurin &amp; Entwicklerin</p>"));
        assert!(!out.html.contains("<b>here</b>"));
        assert!(out.html.contains("title=\"Herunterladen\""));
        assert!(out.html.contains("Keep me"));
        assert!(out.html.contains("lang=\"de\""));
        assert!(out.html.contains("data-theme=\"dark\""));
        assert_eq!(out.substituted, 4);
        assert_eq!(out.missing, vec!["hero.unknown", "nav.missing"]);
    }

    #[test]
    fn empty_options_leave_root_untouched() {
        let out = localize_html(PAGE, &Translations::default(), &LocalizeOptions::default())
            .unwrap();
        assert!(out.html.contains("lang=\"en\""));
        assert!(!out.html.contains("data-theme"));
        assert_eq!(out.substituted, 0);
        assert_eq!(out.missing.len(), 6);
    }

    #[test]
    fn attr_bindings_ignore_malformed_pairs() {
        assert_eq!(
            parse_attr_bindings("title:a; broken ;:b; alt : c"),
            vec![("title", "a"), ("alt", "c")]
        );
    }
}
