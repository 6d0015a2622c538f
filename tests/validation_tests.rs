use serde_json::json;

use sistemplate_server::document::{GenerationRequest, PdfOptions};
use sistemplate_server::template::{DocumentType, Template};
use sistemplate_server::validation::required_fields::{find_missing_fields, is_field_present};
use sistemplate_server::validation::{DocumentValidator, RequiredFieldsValidator, ValidationError};

fn request(name: &str) -> GenerationRequest {
    GenerationRequest {
        template_name: name.to_string(),
        data: Some(json!({ "title": "x" })),
        ..Default::default()
    }
}

#[test]
fn test_template_name_rules() {
    assert!(DocumentValidator.validate(&request("simple-document_v2")).is_ok());

    let err = DocumentValidator.validate(&request("")).unwrap_err();
    assert_eq!(err.field, "templateName");
    assert_eq!(err.message, "Template name is required");

    let err = DocumentValidator.validate(&request("has spaces")).unwrap_err();
    assert_eq!(err.field, "templateName");

    let err = DocumentValidator.validate(&request(&"a".repeat(101))).unwrap_err();
    assert!(err.message.contains("100"));
}

#[test]
fn test_data_is_required() {
    let mut req = request("simple-document");
    req.data = None;
    assert_eq!(DocumentValidator.validate(&req).unwrap_err().field, "data");

    req.data = Some(serde_json::Value::Null);
    assert_eq!(DocumentValidator.validate(&req).unwrap_err().field, "data");

    req.data = Some(json!({}));
    assert!(DocumentValidator.validate(&req).is_ok());
}

#[test]
fn test_option_rules() {
    let with = |options: PdfOptions| GenerationRequest {
        options: Some(options),
        ..request("simple-document")
    };

    let err = DocumentValidator
        .validate(&with(PdfOptions {
            filename: Some("a/b.pdf".into()),
            ..Default::default()
        }))
        .unwrap_err();
    assert_eq!(err.field, "options.filename");
    assert!(err.suggestion.is_some());

    let err = DocumentValidator
        .validate(&with(PdfOptions {
            orientation: Some("diagonal".into()),
            ..Default::default()
        }))
        .unwrap_err();
    assert_eq!(err.field, "options.orientation");

    let err = DocumentValidator
        .validate(&with(PdfOptions {
            page_size: Some("B5".into()),
            ..Default::default()
        }))
        .unwrap_err();
    assert_eq!(err.field, "options.pageSize");

    assert!(DocumentValidator
        .validate(&with(PdfOptions {
            orientation: Some("LANDSCAPE".into()),
            page_size: Some("legal".into()),
            ..Default::default()
        }))
        .is_ok());
}

#[test]
fn test_validation_error_display() {
    let err = ValidationError::new("options.pageSize", "Invalid page size").with_suggestion("Use A4");
    assert_eq!(err.to_string(), "[options.pageSize] Invalid page size. Use A4");
}

#[test]
fn test_required_fields_with_nested_paths() {
    let template = Template::new("contract", DocumentType::Pdf, "<p>{{ client.name }}</p>")
        .with_required_fields(["client.name", "client.nif", "date"]);
    let data = json!({ "client": { "name": "Rui", "nif": null }, "date": "2024-01-01" });
    let data = data.as_object().unwrap();

    let err = RequiredFieldsValidator.validate(&template, data).unwrap_err();
    assert_eq!(err.missing_fields, vec!["client.nif".to_string()]);
    assert_eq!(
        err.to_string(),
        "missing required fields for template 'contract': client.nif"
    );

    assert!(is_field_present("client.name", data));
    assert!(!is_field_present("client.name.first", data));
    assert!(find_missing_fields(&[], data).is_empty());
}

#[test]
fn test_templates_without_required_fields_accept_anything() {
    let template = Template::new("free", DocumentType::Sms, "hi");
    let data = json!({});
    assert!(RequiredFieldsValidator
        .validate(&template, data.as_object().unwrap())
        .is_ok());
}
