use std::collections::HashMap;

use crate::models::Channel;

/// Flat map of placeholder name to substituted value
pub type TemplateVars = HashMap<String, String>;

pub const VAR_CUSTOMER_NAME: &str = "customerName";
pub const VAR_BUSINESS_NAME: &str = "businessName";
pub const VAR_REVIEW_LINK: &str = "reviewLink";
pub const VAR_LOCATION_NAME: &str = "locationName";

pub const DEFAULT_EMAIL_SUBJECT: &str = "How was your experience with {{businessName}}?";

pub const DEFAULT_EMAIL_CONTENT: &str = "<p>Hi {{customerName}},</p>\
<p>Thank you for choosing {{businessName}}! We would love to hear about your experience.</p>\
<p><a href=\"{{reviewLink}}\">Leave us a review</a></p>\
<p>It only takes a minute and helps us a lot.</p>\
<p>Thanks,<br>{{businessName}}</p>";

pub const DEFAULT_SMS_CONTENT: &str =
    "Hi {{customerName}}, thanks for choosing {{businessName}}! Would you leave us a quick review? {{reviewLink}}";

/// Built-in template used when the owner has none for a channel
pub fn fallback_template(channel: Channel) -> (Option<&'static str>, &'static str) {
    match channel {
        Channel::Email => (Some(DEFAULT_EMAIL_SUBJECT), DEFAULT_EMAIL_CONTENT),
        Channel::Sms => (None, DEFAULT_SMS_CONTENT),
    }
}

/// Builds the standard variable set for a review-request message
pub fn standard_vars(
    customer_name: &str,
    business_name: &str,
    review_link: &str,
    location_name: Option<&str>,
) -> TemplateVars {
    let mut vars = TemplateVars::new();
    vars.insert(VAR_CUSTOMER_NAME.to_string(), customer_name.to_string());
    vars.insert(VAR_BUSINESS_NAME.to_string(), business_name.to_string());
    vars.insert(VAR_REVIEW_LINK.to_string(), review_link.to_string());
    vars.insert(
        VAR_LOCATION_NAME.to_string(),
        location_name.unwrap_or(business_name).to_string(),
    );
    vars
}

/// One `{{...}}` occurrence in a template
enum Segment<'a> {
    Text(&'a str),
    Placeholder { raw: &'a str, name: &'a str },
}

/// Splits a template into literal text and placeholders.
/// An unterminated `{{` is literal text.
fn segments(template: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        if start > 0 {
            out.push(Segment::Text(&rest[..start]));
        }
        let after = &rest[start + 2..];

        let Some(end) = after.find("}}") else {
            out.push(Segment::Text(&rest[start..]));
            return out;
        };

        let inner = &after[..end];
        if inner.contains("{{") {
            // "{{ {{name}}": the outer braces are literal
            out.push(Segment::Text("{{"));
            rest = after;
            continue;
        }

        out.push(Segment::Placeholder {
            raw: &rest[start..start + 2 + end + 2],
            name: inner.trim(),
        });
        rest = &after[end + 2..];
    }

    if !rest.is_empty() {
        out.push(Segment::Text(rest));
    }
    out
}

/// Replaces every `{{name}}` found in `vars`. Unknown placeholders pass
/// through verbatim.
pub fn render(template: &str, vars: &TemplateVars) -> String {
    let mut rendered = String::with_capacity(template.len());

    for segment in segments(template) {
        match segment {
            Segment::Text(text) => rendered.push_str(text),
            Segment::Placeholder { raw, name } => match vars.get(name) {
                Some(value) => rendered.push_str(value),
                None => rendered.push_str(raw),
            },
        }
    }

    rendered
}

/// Names of placeholders `render` would leave untouched, in order of first use
pub fn unresolved_placeholders(template: &str, vars: &TemplateVars) -> Vec<String> {
    let mut missing: Vec<String> = Vec::new();

    for segment in segments(template) {
        if let Segment::Placeholder { name, .. } = segment {
            if !vars.contains_key(name) && !missing.iter().any(|m| m == name) {
                missing.push(name.to_string());
            }
        }
    }

    missing
}

/// Plain-text fallback for an HTML email body
pub fn strip_tags(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;

    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                text.push(' ');
            }
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }

    let decoded = html_escape::decode_html_entities(&text);
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> TemplateVars {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_render_replaces_all_occurrences() {
        let v = vars(&[("customerName", "Ana"), ("businessName", "Joe's Diner")]);
        let rendered = render(
            "Hi {{customerName}}, thanks for visiting {{businessName}}. Bye {{customerName}}!",
            &v,
        );

        assert_eq!(
            rendered,
            "Hi Ana, thanks for visiting Joe's Diner. Bye Ana!"
        );
    }

    #[test]
    fn test_render_tolerates_inner_whitespace() {
        let v = vars(&[("reviewLink", "https://example.com/r")]);
        assert_eq!(render("Go: {{ reviewLink }}", &v), "Go: https://example.com/r");
    }

    #[test]
    fn test_fully_resolved_template_has_no_braces_left() {
        let v = standard_vars("Ana", "Joe's Diner", "https://example.com/r", Some("Downtown"));

        for template in [DEFAULT_EMAIL_SUBJECT, DEFAULT_EMAIL_CONTENT, DEFAULT_SMS_CONTENT] {
            let rendered = render(template, &v);
            assert!(!rendered.contains("{{"), "left braces in: {}", rendered);
            assert!(unresolved_placeholders(template, &v).is_empty());
        }
    }

    #[test]
    fn test_unknown_placeholder_passes_through() {
        let v = vars(&[("customerName", "Ana")]);
        let template = "Hi {{customerName}}, your code is {{couponCode}} ({{ couponCode }})";

        assert_eq!(
            render(template, &v),
            "Hi Ana, your code is {{couponCode}} ({{ couponCode }})"
        );
        assert_eq!(unresolved_placeholders(template, &v), vec!["couponCode"]);
    }

    #[test]
    fn test_unterminated_and_nested_braces_are_literal() {
        let v = vars(&[("customerName", "Ana")]);

        assert_eq!(render("Hi {{customerName", &v), "Hi {{customerName");
        assert_eq!(render("x {{ {{customerName}}", &v), "x {{ Ana");
    }

    #[test]
    fn test_render_is_idempotent() {
        let v = vars(&[("customerName", "Ana")]);
        let once = render("Hi {{customerName}} {{other}}", &v);
        assert_eq!(render(&once, &v), once);
    }

    #[test]
    fn test_strip_tags_produces_plain_text() {
        let html = "<p>Hi Ana,</p><p><a href=\"https://x.test\">Leave us a review</a> &amp; thanks</p>";
        assert_eq!(strip_tags(html), "Hi Ana, Leave us a review & thanks");
    }

    #[test]
    fn test_location_name_defaults_to_business_name() {
        let v = standard_vars("Ana", "Joe's Diner", "https://example.com/r", None);
        assert_eq!(v.get(VAR_LOCATION_NAME).map(String::as_str), Some("Joe's Diner"));
    }
}
