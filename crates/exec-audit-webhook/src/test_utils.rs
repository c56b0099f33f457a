use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use crate::admission_review::AdmissionReview;

pub(crate) fn build_admission_review(operation: &str, sub_resource: Option<&str>) -> AdmissionReview {
    let sub_resource = sub_resource
        .map(|s| format!(r#""subResource": "{s}","#))
        .unwrap_or_default();

    let input = format!(
        r#"
            {{
                "apiVersion": "admission.k8s.io/v1",
                "kind": "AdmissionReview",
                "request": {{
                    "uid": "705ab4f5-6393-11e8-b7cc-42010a800002",
                    "kind": {{"group":"","version":"v1","kind":"PodExecOptions"}},
                    "resource": {{"group":"","version":"v1","resource":"pods"}},
                    {sub_resource}
                    "name": "pod-a",
                    "namespace": "ns1",
                    "operation": "{operation}",
                    "userInfo": {{
                      "username": "alice",
                      "uid": "014fbff9a07c",
                      "groups": ["system:authenticated","developers"]
                    }},
                    "object": {{"apiVersion":"v1","kind":"PodExecOptions","command":["sh"]}},
                    "dryRun": false
                }}
            }}
        "#
    );

    serde_json::from_str(&input).expect("deserialization should work")
}

pub(crate) fn build_pod(
    namespace: &str,
    name: &str,
    annotations: Option<BTreeMap<String, String>>,
) -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: Some(name.to_owned()),
            namespace: Some(namespace.to_owned()),
            resource_version: Some("1".to_owned()),
            annotations,
            ..Default::default()
        },
        ..Default::default()
    }
}
