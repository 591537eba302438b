use super::{Template, TemplateError};

/// Templates compiled into the library, as `(name, text)` pairs sorted by name.
static BUNDLED: &[(&str, &str)] = &[
    ("neb.py", include_str!("../../../templates/neb.py")),
    ("relax.py", include_str!("../../../templates/relax.py")),
    ("single_point.py", include_str!("../../../templates/single_point.py")),
    ("vibration.py", include_str!("../../../templates/vibration.py")),
];

/// Names of all bundled templates.
pub fn list_templates() -> Vec<&'static str> {
    BUNDLED.iter().map(|(name, _)| *name).collect()
}

/// Returns the text of a bundled template.
///
/// # Errors
///
/// Returns [`TemplateError::UnknownTemplate`] listing the available names.
pub fn bundled_text(name: &str) -> Result<&'static str, TemplateError> {
    BUNDLED
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, text)| *text)
        .ok_or_else(|| TemplateError::UnknownTemplate {
            name: name.to_string(),
            available: list_templates().into_iter().map(String::from).collect(),
        })
}

pub fn bundled_template(name: &str) -> Result<Template, TemplateError> {
    bundled_text(name).map(Template::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_templates_are_listed_in_order() {
        assert_eq!(
            list_templates(),
            vec!["neb.py", "relax.py", "single_point.py", "vibration.py"]
        );
    }

    #[test]
    fn bundled_templates_parse_without_invalid_placeholders() {
        for name in list_templates() {
            let template = bundled_template(name).unwrap();
            let keys = template.keys();
            assert!(keys.invalid.is_empty(), "{name}: {:?}", keys.invalid);
            assert!(!template.named_keys().is_empty(), "{name}");
        }
    }

    #[test]
    fn relax_template_expects_the_structure_and_calculator_keys() {
        let keys = bundled_template("relax.py").unwrap().named_keys();
        for expected in ["atoms", "magmoms", "pw", "xc", "kpts", "fmax"] {
            assert!(keys.iter().any(|k| k == expected), "missing {expected}");
        }
    }

    #[test]
    fn unknown_template_lists_alternatives() {
        match bundled_template("nope.py") {
            Err(TemplateError::UnknownTemplate { name, available }) => {
                assert_eq!(name, "nope.py");
                assert_eq!(available.len(), 4);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
