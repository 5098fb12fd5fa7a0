#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use crate::diagnostic::{
        apply_severity_overrides, format_message, Diagnostic, DiagnosticKind, Severity,
        Suppression, SuppressionTimeline,
    };
    use crate::location::{LineIndex, Location};

    fn at(start: u32) -> Option<Location> {
        Some(Location {
            range: (start, start + 1),
            ..Location::default()
        })
    }

    fn keys(keys: &[&str]) -> Vec<String> {
        keys.iter().map(|key| key.to_string()).collect()
    }

    #[test]
    fn test_codes_are_unique() {
        let mut codes: Vec<&str> = DiagnosticKind::ALL.iter().map(|kind| kind.code()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), DiagnosticKind::ALL.len());
        assert_eq!(DiagnosticKind::ParserError.code(), "KO0014");
        assert_eq!(DiagnosticKind::BindingUnknown.name(), "binding-unknown");
    }

    #[test]
    fn test_positional_arguments() {
        assert_eq!(format_message("$0 and $1", &["a", "b"]), "a and b");
        let args: Vec<String> = (0..11).map(|i| format!("<{}>", i)).collect();
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        assert_eq!(format_message("$1 $10", &args), "<1> <10>");

        let diagnostic = Diagnostic::new(
            DiagnosticKind::BindingUnknown,
            "view.html",
            None,
            &["foreach"],
        );
        assert_eq!(diagnostic.message, "Type unknown for binding handler 'foreach'.");
        assert_eq!(diagnostic.severity, Severity::Error);
    }

    #[test]
    fn test_record_shape() {
        let index = LineIndex::new("<div>\n</div>");
        let diagnostic = Diagnostic::new(
            DiagnosticKind::UnbalancedStartEndTags,
            "view.html",
            Some(index.location(6, 12)),
            &[],
        );
        let json = serde_json::to_value(&diagnostic).unwrap();
        assert_eq!(json["code"], "KO0010");
        assert_eq!(json["name"], "unbalanced-start-end-tags");
        assert_eq!(json["severity"], "error");
        assert_eq!(json["filePath"], "view.html");
        assert_eq!(json["location"]["first_line"], 2);
        assert_eq!(json["location"]["first_column"], 0);
        assert_eq!(json["location"]["range"], serde_json::json!([6, 12]));

        let file_level = Diagnostic::new(DiagnosticKind::NoViewmodelReference, "v.html", None, &[]);
        let json = serde_json::to_value(&file_level).unwrap();
        assert!(json.get("location").is_none());
    }

    #[test]
    fn test_severity_overrides_by_code_or_name() {
        let diagnostics = vec![
            Diagnostic::new(DiagnosticKind::BindingUnknown, "a.html", None, &["x"]),
            Diagnostic::new(DiagnosticKind::UnknownScope, "a.html", None, &["foreach"]),
            Diagnostic::new(DiagnosticKind::NoViewmodelReference, "b.html", None, &[]),
            Diagnostic::from_oracle("a.html", 2339, "Property 'nmae' does not exist", Severity::Error, None),
        ];
        let mut overrides = HashMap::new();
        overrides.insert("KO0016".to_string(), Severity::Warning);
        overrides.insert("unknown-scope".to_string(), Severity::Off);
        overrides.insert("TS2339".to_string(), Severity::Warning);

        let result = apply_severity_overrides(diagnostics, &overrides);
        assert_eq!(result.len(), 3);
        assert_eq!(result[0].severity, Severity::Warning);
        assert_eq!(result[1].code, "KO0002");
        assert_eq!(result[1].severity, Severity::Error);
        assert_eq!(result[2].severity, Severity::Warning);
    }

    #[test]
    fn test_suppression_values_are_replaced_not_mutated() {
        let base = Suppression::new();
        let disabled = base.disable(&keys(&["KO0016"]));
        let unknown = Diagnostic::new(DiagnosticKind::BindingUnknown, "v.html", None, &["x"]);
        assert!(base.allows(&unknown));
        assert!(!disabled.allows(&unknown));

        let by_name = base.disable(&keys(&["binding-unknown"]));
        assert!(!by_name.allows(&unknown));
        assert!(by_name.enable(&keys(&["binding-unknown"])).allows(&unknown));
    }

    #[test]
    fn test_disable_all_with_exceptions() {
        let all = Suppression::new().disable(&[]);
        let unknown = Diagnostic::new(DiagnosticKind::BindingUnknown, "v.html", None, &["x"]);
        let scope = Diagnostic::new(DiagnosticKind::UnknownScope, "v.html", None, &["x"]);
        assert!(!all.allows(&unknown));

        let except = all.enable(&keys(&["KO0017"]));
        assert!(except.allows(&scope));
        assert!(!except.allows(&unknown));

        let again = except.disable(&keys(&["KO0017"]));
        assert!(!again.allows(&scope));
        assert!(again.enable(&[]).allows(&unknown));
    }

    #[test]
    fn test_timeline_is_linear_not_block_scoped() {
        // A directive placed inside an element keeps applying after that
        // element closes.
        let mut timeline = SuppressionTimeline::new();
        let disabled = Arc::new(Suppression::new().disable(&keys(&["KO0016"])));
        timeline.push(10, Arc::clone(&disabled));
        timeline.push(50, Arc::new(disabled.enable(&keys(&["KO0016"]))));

        let before = Diagnostic::new(DiagnosticKind::BindingUnknown, "v.html", at(5), &["x"]);
        let inside = Diagnostic::new(DiagnosticKind::BindingUnknown, "v.html", at(10), &["x"]);
        let after_element = Diagnostic::new(DiagnosticKind::BindingUnknown, "v.html", at(40), &["x"]);
        let re_enabled = Diagnostic::new(DiagnosticKind::BindingUnknown, "v.html", at(60), &["x"]);
        assert!(timeline.allows(&before));
        assert!(!timeline.allows(&inside));
        assert!(!timeline.allows(&after_element));
        assert!(timeline.allows(&re_enabled));

        let file_level = Diagnostic::new(DiagnosticKind::BindingUnknown, "v.html", None, &["x"]);
        assert!(timeline.allows(&file_level));
    }
}
