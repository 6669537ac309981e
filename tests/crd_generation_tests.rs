//! CRD generation tests
//!
//! Verifies the generated CustomResourceDefinition that `crdgen` prints.

use installation_token_controller::crd::InstallationAccessToken;
use kube::core::CustomResourceExt;

#[test]
fn test_crd_identity() {
    let crd = InstallationAccessToken::crd();

    assert_eq!(
        crd.metadata.name.as_deref(),
        Some("installationaccesstokens.github.octopilot.io")
    );
    assert_eq!(crd.spec.group, "github.octopilot.io");
    assert_eq!(crd.spec.scope, "Namespaced");
    assert_eq!(crd.spec.names.kind, "InstallationAccessToken");
    assert_eq!(crd.spec.names.short_names, Some(vec!["iat".to_string()]));

    let version = &crd.spec.versions[0];
    assert_eq!(version.name, "v1alpha1");
    assert!(version
        .subresources
        .as_ref()
        .is_some_and(|s| s.status.is_some()));
}

#[test]
fn test_crd_printer_columns() {
    let crd = InstallationAccessToken::crd();
    let columns = crd.spec.versions[0]
        .additional_printer_columns
        .clone()
        .unwrap_or_default();
    let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();

    assert_eq!(
        names,
        vec![
            "App ID",
            "Installation ID",
            "Private Key Name",
            "Private Key Namespace",
            "Secret Name",
            "Secret Namespace",
            "Token Expires At",
            "Ready",
            "Token",
            "Secret",
            "Age",
        ]
    );
    let ready = columns.iter().find(|c| c.name == "Ready").unwrap();
    assert_eq!(
        ready.json_path,
        ".status.conditions[?(@.type==\"Ready\")].status"
    );
}

#[test]
fn test_crd_schema_requires_ids_and_keeps_template_open() {
    let crd = InstallationAccessToken::crd();
    let schema = serde_json::to_value(&crd.spec.versions[0].schema).unwrap();
    let spec = &schema["openAPIV3Schema"]["properties"]["spec"];

    let required: Vec<&str> = spec["required"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|v| v.as_str())
        .collect();
    assert!(required.contains(&"appId"));
    assert!(required.contains(&"installationId"));
    assert_eq!(
        spec["properties"]["template"]["x-kubernetes-preserve-unknown-fields"],
        serde_json::json!(true)
    );
}

#[test]
fn test_crd_serializes_to_yaml() {
    let yaml = serde_yaml::to_string(&InstallationAccessToken::crd()).unwrap();
    assert!(yaml.contains("kind: CustomResourceDefinition"));
    assert!(yaml.contains("installationaccesstokens.github.octopilot.io"));
}
