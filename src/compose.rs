//! Document composer: synthesizes the self-contained executable document.
//!
//! The output is plain markup concatenation of caller-supplied fragments.
//! Nothing is parsed, sanitized, or validated here; malformed fragments
//! produce a malformed document, which is a caller responsibility. What the
//! composer does guarantee is the bootstrap contract: the correlation
//! identifier and the conversion options are embedded verbatim, so every
//! message the isolated context later posts carries the identifier the
//! registry expects.

use crate::RenderOptions;

/// Marker introducing the embedded correlation identifier.
pub(crate) const ITER_MARKER: &str = "const RENDER_ITER = ";

/// Marker introducing the embedded conversion-options literal.
pub(crate) const CONF_MARKER: &str = "const RENDER_CONF = ";

/// Compose the executable document for one invocation.
///
/// Pure function of its inputs: the same identifier and options always
/// produce the same document, and no option is re-read afterwards.
pub(crate) fn compose(id: u64, options: &RenderOptions) -> String {
    let conf = serde_json::to_string(&options.convert_options())
        .unwrap_or_else(|_| "{}".to_string());

    let mut doc = String::new();
    doc.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    doc.push_str(&options.head_html);
    doc.push_str("\n<style>\n");
    doc.push_str(&layout_rules(options));
    if let Some(rule) = page_number_rule(&options.page_number_selector) {
        doc.push_str(&rule);
    }
    doc.push_str("</style>\n</head>\n<body>\n");

    doc.push_str("<div class=\"page-header\">");
    doc.push_str(&options.header_html);
    doc.push_str("</div>\n");

    // The footer lands in exactly one of two places: a running region that
    // repeats on every page, or a single placement after the body so the
    // pagination engine's own last-page rules apply.
    if !options.footer_on_last_page_only {
        doc.push_str("<div class=\"page-footer\">");
        doc.push_str(&options.footer_html);
        doc.push_str("</div>\n");
    }

    doc.push_str("<main class=\"page-content\">");
    doc.push_str(&options.body_html);
    doc.push_str("</main>\n");

    if options.footer_on_last_page_only {
        doc.push_str("<div class=\"last-page-footer\">");
        doc.push_str(&options.footer_html);
        doc.push_str("</div>\n");
    }

    doc.push_str("<script>\n");
    doc.push_str(ITER_MARKER);
    doc.push_str(&id.to_string());
    doc.push_str(";\n");
    doc.push_str(CONF_MARKER);
    doc.push_str(&conf);
    doc.push_str(";\n</script>\n</body>\n</html>\n");
    doc
}

/// Layout rule block: page size, margins reserved for the header and
/// footer regions, and the running-element bindings that make the header
/// (and, unless deferred to the last page, the footer) repeat.
fn layout_rules(options: &RenderOptions) -> String {
    let mut css = String::new();
    css.push_str(&format!(
        "@page {{\n  size: {};\n  margin: {}mm {}mm {}mm {}mm;\n}}\n",
        options.page_size.as_str(),
        options.header_height,
        options.margin_right,
        options.footer_height,
        options.margin_left,
    ));
    css.push_str(".page-header { position: running(page-header); }\n");
    css.push_str("@page { @top-center { content: element(page-header); } }\n");
    if !options.footer_on_last_page_only {
        css.push_str(".page-footer { position: running(page-footer); }\n");
        css.push_str("@page { @bottom-center { content: element(page-footer); } }\n");
    }
    css.push_str(&format!(
        ".page-content {{ padding-top: {}mm; }}\n",
        options.top_padding
    ));
    css
}

/// Page-numbering rule for the configured selector. An empty selector
/// means no numbering rule is emitted at all.
fn page_number_rule(selector: &str) -> Option<String> {
    if selector.is_empty() {
        return None;
    }
    Some(format!(
        "{}::after {{ content: counter(page); }}\n",
        selector
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::embedded_id;

    #[test]
    fn embeds_the_identifier_verbatim() {
        let doc = compose(42, &RenderOptions::default());
        assert!(doc.contains("const RENDER_ITER = 42;"));
        assert_eq!(embedded_id(&doc), Some(42));
    }

    #[test]
    fn composition_is_deterministic() {
        let options = RenderOptions {
            body_html: "<h1>X</h1>".to_string(),
            ..Default::default()
        };
        assert_eq!(compose(7, &options), compose(7, &options));
    }

    #[test]
    fn repeating_footer_is_the_default_placement() {
        let options = RenderOptions {
            footer_html: "<span>foot</span>".to_string(),
            ..Default::default()
        };
        let doc = compose(1, &options);
        assert_eq!(doc.matches("class=\"page-footer\"").count(), 1);
        assert_eq!(doc.matches("class=\"last-page-footer\"").count(), 0);
        assert!(doc.contains("@bottom-center"));
    }

    #[test]
    fn last_page_footer_excludes_the_repeating_region() {
        let options = RenderOptions {
            footer_html: "<span>foot</span>".to_string(),
            footer_on_last_page_only: true,
            ..Default::default()
        };
        let doc = compose(1, &options);
        assert_eq!(doc.matches("class=\"page-footer\"").count(), 0);
        assert_eq!(doc.matches("class=\"last-page-footer\"").count(), 1);
        assert!(!doc.contains("@bottom-center"));
    }

    #[test]
    fn empty_selector_emits_no_numbering_rule() {
        let doc = compose(1, &RenderOptions::default());
        assert!(!doc.contains("counter(page)"));
    }

    #[test]
    fn page_number_rule_targets_the_selector() {
        let options = RenderOptions {
            page_number_selector: ".page-no".to_string(),
            ..Default::default()
        };
        let doc = compose(1, &options);
        assert!(doc.contains(".page-no::after { content: counter(page); }"));
    }

    #[test]
    fn fragments_are_inserted_unmodified() {
        // Deliberately malformed markup goes through untouched; the
        // composer does not validate caller input.
        let options = RenderOptions {
            body_html: "<h1>unclosed".to_string(),
            head_html: "<link rel=\"stylesheet\" href=\"report.css\">".to_string(),
            header_html: "<em>Acme & Sons".to_string(),
            ..Default::default()
        };
        let doc = compose(1, &options);
        assert!(doc.contains("<h1>unclosed"));
        assert!(doc.contains("<link rel=\"stylesheet\" href=\"report.css\">"));
        assert!(doc.contains("<em>Acme & Sons"));
    }

    #[test]
    fn layout_rules_carry_the_margin_values() {
        let options = RenderOptions {
            margin_left: 12.0,
            margin_right: 8.0,
            header_height: 20.0,
            footer_height: 18.0,
            top_padding: 5.0,
            ..Default::default()
        };
        let doc = compose(1, &options);
        assert!(doc.contains("margin: 20mm 8mm 18mm 12mm"));
        assert!(doc.contains("padding-top: 5mm"));
        assert!(doc.contains("size: a4"));
    }
}
