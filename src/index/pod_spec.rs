//! Where each workload kind keeps its pod spec

use crate::parser::YamlNode;

/// Kind → keys from the document root to the pod spec
const POD_SPEC_PATHS: &[(&str, &[&str])] = &[
    ("Pod", &["spec"]),
    ("Deployment", &["spec", "template", "spec"]),
    ("DaemonSet", &["spec", "template", "spec"]),
    ("StatefulSet", &["spec", "template", "spec"]),
    ("ReplicaSet", &["spec", "template", "spec"]),
    ("Job", &["spec", "template", "spec"]),
    ("CronJob", &["spec", "jobTemplate", "spec", "template", "spec"]),
];

/// Tried for kinds missing from the table (custom controllers)
const FALLBACK_POD_SPEC_PATH: &[&str] = &["spec", "template", "spec"];

/// Kinds known to embed a pod spec
pub fn is_workload_kind(kind: &str) -> bool {
    POD_SPEC_PATHS.iter().any(|(k, _)| *k == kind)
}

/// The pod spec mapping of a document root, if it has one
pub fn pod_spec<'a>(root: &'a YamlNode, kind: &str) -> Option<&'a YamlNode> {
    let path = POD_SPEC_PATHS
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, path)| *path)
        .unwrap_or(FALLBACK_POD_SPEC_PATH);
    root.get_path(path).filter(|node| node.is_mapping())
}

/// Containers and init containers of a pod spec
pub fn all_containers(pod_spec: &YamlNode) -> impl Iterator<Item = &YamlNode> {
    ["containers", "initContainers"]
        .into_iter()
        .filter_map(|key| pod_spec.get(key))
        .flat_map(|containers| containers.items())
        .filter(|container| container.is_mapping())
}

/// Entries of `volumes`
pub fn volumes(pod_spec: &YamlNode) -> &[YamlNode] {
    pod_spec.get("volumes").map(|v| v.items()).unwrap_or(&[])
}

/// The `volumes[]` entry named `name`
pub fn volume_by_name<'a>(pod_spec: &'a YamlNode, name: &str) -> Option<&'a YamlNode> {
    volumes(pod_spec)
        .iter()
        .find(|volume| volume.get_scalar("name").is_some_and(|n| n.value == name))
}
