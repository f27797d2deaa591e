//! Hierarchical key/value storage backing each settings tier.
//!
//! Keys are slash-separated paths such as `FileLocations/TempPath`; every
//! segment but the last names a group, the last names the value. Group nodes
//! are structural only and never resolve as values.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use tracing::debug;

use crate::document::Element;

use super::value::SettingValue;

#[derive(Clone, Debug, PartialEq)]
enum TreeNode {
    Value(SettingValue),
    Group(SettingsTree),
}

/// One tier's worth of settings, organized as nested groups.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SettingsTree {
    nodes: BTreeMap<String, TreeNode>,
}

/// Split a key into its group path and leaf name.
///
/// Empty keys and keys with empty segments carry no address and yield `None`.
fn split_key(key: &str) -> Option<(Vec<&str>, &str)> {
    let mut segments: Vec<&str> = key.split('/').collect();
    if segments.iter().any(|segment| segment.is_empty()) {
        return None;
    }
    let leaf = segments.pop()?;
    Some((segments, leaf))
}

impl SettingsTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    /// Look up the value stored at `key`, if any.
    ///
    /// A group node at the full path is not a value and resolves to `None`.
    pub fn get_path(&self, key: &str) -> Option<&SettingValue> {
        let (groups, leaf) = split_key(key)?;
        let mut current = self;
        for name in groups {
            match current.nodes.get(name) {
                Some(TreeNode::Group(child)) => current = child,
                _ => return None,
            }
        }
        match current.nodes.get(leaf) {
            Some(TreeNode::Value(value)) => Some(value),
            _ => None,
        }
    }

    /// Store `value` at `key`, creating intermediate groups as needed.
    ///
    /// Returns false when the key is malformed or an intermediate segment is
    /// already taken by a value; the tree is left unchanged in that case.
    pub fn set_path(&mut self, key: &str, value: SettingValue) -> bool {
        let Some((groups, leaf)) = split_key(key) else {
            return false;
        };
        let mut current = self;
        for name in groups {
            let node = current
                .nodes
                .entry(name.to_string())
                .or_insert_with(|| TreeNode::Group(SettingsTree::default()));
            match node {
                TreeNode::Group(child) => current = child,
                TreeNode::Value(_) => return false,
            }
        }
        current.nodes.insert(leaf.to_string(), TreeNode::Value(value));
        true
    }

    /// Remove the node at `key`, whether it is a value or a whole group.
    ///
    /// Returns true only when something was actually removed.
    pub fn remove_path(&mut self, key: &str) -> bool {
        let Some((groups, leaf)) = split_key(key) else {
            return false;
        };
        let mut current = self;
        for name in groups {
            match current.nodes.get_mut(name) {
                Some(TreeNode::Group(child)) => current = child,
                _ => return false,
            }
        }
        current.nodes.remove(leaf).is_some()
    }

    /// Fold `other` into this tree; incoming values win on conflicts and
    /// groups merge recursively.
    pub fn merge(&mut self, other: SettingsTree) {
        for (name, incoming) in other.nodes {
            match (self.nodes.entry(name), incoming) {
                (Entry::Occupied(mut slot), TreeNode::Group(child)) => {
                    if let TreeNode::Group(existing) = slot.get_mut() {
                        existing.merge(child);
                    } else {
                        slot.insert(TreeNode::Group(child));
                    }
                }
                (Entry::Occupied(mut slot), value) => {
                    slot.insert(value);
                }
                (Entry::Vacant(slot), incoming) => {
                    slot.insert(incoming);
                }
            }
        }
    }

    /// Render the tree as a `group` element named `group_name`.
    pub(crate) fn to_element(&self, group_name: &str) -> Element {
        let mut group = Element::new("group");
        group.set_attr("name", group_name);
        for (name, node) in &self.nodes {
            match node {
                TreeNode::Group(child) => group.children.push(child.to_element(name)),
                TreeNode::Value(value) => {
                    let mut attribute = Element::new("attribute");
                    attribute.set_attr("name", name);
                    attribute.set_attr("type", value.type_name());
                    if let Some(items) = value.list_items() {
                        for item in items {
                            let mut entry = Element::new("item");
                            entry.text = item.clone();
                            attribute.children.push(entry);
                        }
                    } else {
                        attribute.text = value.body_text();
                    }
                    group.children.push(attribute);
                }
            }
        }
        group
    }

    /// Rebuild a tree from a `group` element.
    ///
    /// Nodes missing their identifying attributes and scalar bodies that do
    /// not parse are skipped individually; the rest of the tree still loads.
    pub(crate) fn from_element(element: &Element) -> SettingsTree {
        let mut tree = SettingsTree::default();
        for child in &element.children {
            match child.name.as_str() {
                "group" => {
                    let Some(name) = child.attr("name") else {
                        debug!("Skipping settings group without a name attribute");
                        continue;
                    };
                    let nested = SettingsTree::from_element(child);
                    tree.nodes.insert(name.to_string(), TreeNode::Group(nested));
                }
                "attribute" => {
                    let (Some(name), Some(type_name)) = (child.attr("name"), child.attr("type"))
                    else {
                        debug!("Skipping settings attribute without name/type attributes");
                        continue;
                    };
                    let items = child
                        .children_named("item")
                        .map(|item| item.text.clone())
                        .collect();
                    match SettingValue::from_document(type_name, &child.text, items) {
                        Some(value) => {
                            tree.nodes.insert(name.to_string(), TreeNode::Value(value));
                        }
                        None => debug!(
                            "Skipping settings attribute {name:?}: body does not parse as {type_name}"
                        ),
                    }
                }
                other => debug!("Skipping unexpected settings element {other:?}"),
            }
        }
        tree
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stores_and_resolves_nested_paths() {
        let mut tree = SettingsTree::new();
        assert!(tree.set_path("FileLocations/TempPath", SettingValue::Text("/tmp".into())));
        assert_eq!(
            tree.get_path("FileLocations/TempPath"),
            Some(&SettingValue::Text("/tmp".into()))
        );
        assert_eq!(tree.get_path("FileLocations/Missing"), None);
        assert_eq!(tree.get_path("FileLocations"), None, "groups are not values");
    }

    #[test]
    fn rejects_malformed_keys() {
        let mut tree = SettingsTree::new();
        assert!(!tree.set_path("", SettingValue::Bool(true)));
        assert!(!tree.set_path("General//Threads", SettingValue::Int(2)));
        assert!(!tree.set_path("General/", SettingValue::Int(2)));
        assert!(tree.is_empty());
        assert_eq!(tree.get_path(""), None);
        assert!(!tree.remove_path("/General"));
    }

    #[test]
    fn refuses_to_tunnel_through_values() {
        let mut tree = SettingsTree::new();
        assert!(tree.set_path("General/Threads", SettingValue::Int(2)));
        assert!(!tree.set_path("General/Threads/Limit", SettingValue::Int(8)));
        assert_eq!(tree.get_path("General/Threads"), Some(&SettingValue::Int(2)));
    }

    #[test]
    fn removes_values_and_whole_groups() {
        let mut tree = SettingsTree::new();
        tree.set_path("FileLocations/TempPath", SettingValue::Text("/tmp".into()));
        tree.set_path("FileLocations/ImportPath", SettingValue::Text("/data".into()));
        assert!(tree.remove_path("FileLocations/TempPath"));
        assert!(!tree.remove_path("FileLocations/TempPath"));
        assert!(tree.remove_path("FileLocations"));
        assert!(tree.is_empty());
    }

    #[test]
    fn merge_overwrites_values_and_descends_groups() {
        let mut base = SettingsTree::new();
        base.set_path("General/Threads", SettingValue::Int(2));
        base.set_path("General/Name", SettingValue::Text("base".into()));

        let mut incoming = SettingsTree::new();
        incoming.set_path("General/Threads", SettingValue::Int(8));
        incoming.set_path("Display/Stretch", SettingValue::Text("linear".into()));

        base.merge(incoming);
        assert_eq!(base.get_path("General/Threads"), Some(&SettingValue::Int(8)));
        assert_eq!(
            base.get_path("General/Name"),
            Some(&SettingValue::Text("base".into()))
        );
        assert_eq!(
            base.get_path("Display/Stretch"),
            Some(&SettingValue::Text("linear".into()))
        );
    }

    #[test]
    fn merge_replaces_value_with_group() {
        let mut base = SettingsTree::new();
        base.set_path("General", SettingValue::Int(1));

        let mut incoming = SettingsTree::new();
        incoming.set_path("General/Threads", SettingValue::Int(8));

        base.merge(incoming);
        assert_eq!(base.get_path("General/Threads"), Some(&SettingValue::Int(8)));
    }

    #[test]
    fn round_trips_through_elements() {
        let mut tree = SettingsTree::new();
        tree.set_path("General/Threads", SettingValue::Int(4));
        tree.set_path("General/Verbose", SettingValue::Bool(false));
        tree.set_path(
            "FileLocations/TempPath",
            SettingValue::Path("/scratch".into()),
        );
        tree.set_path(
            "Display/Bands",
            SettingValue::TextList(vec!["red".into(), "green".into(), "blue".into()]),
        );
        tree.set_path(
            "Display/ColorMap",
            SettingValue::Opaque {
                type_name: "ColorMap".into(),
                body: "0 0 0 255".into(),
            },
        );

        let element = tree.to_element("settings");
        assert_eq!(element.attr("name"), Some("settings"));
        let restored = SettingsTree::from_element(&element);
        assert_eq!(restored, tree);
    }

    #[test]
    fn load_skips_broken_nodes_but_keeps_the_rest() {
        let mut element = Element::new("group");
        element.set_attr("name", "settings");

        let mut good = Element::new("attribute");
        good.set_attr("name", "Threads");
        good.set_attr("type", "int");
        good.text = "4".into();
        element.children.push(good);

        let mut unparseable = Element::new("attribute");
        unparseable.set_attr("name", "Broken");
        unparseable.set_attr("type", "int");
        unparseable.text = "four".into();
        element.children.push(unparseable);

        let mut untyped = Element::new("attribute");
        untyped.set_attr("name", "NoType");
        untyped.text = "x".into();
        element.children.push(untyped);

        let unnamed_group = Element::new("group");
        element.children.push(unnamed_group);

        let tree = SettingsTree::from_element(&element);
        assert_eq!(tree.get_path("Threads"), Some(&SettingValue::Int(4)));
        assert_eq!(tree.get_path("Broken"), None);
        assert_eq!(tree.get_path("NoType"), None);
    }

    #[test]
    fn foreign_values_keep_text_but_not_nested_markup() {
        let mut element = Element::new("group");
        element.set_attr("name", "settings");

        let mut foreign = Element::new("attribute");
        foreign.set_attr("name", "Calibration");
        foreign.set_attr("type", "GainTable");
        foreign.text = "linear".into();
        let mut nested = Element::new("band");
        nested.set_attr("index", "1");
        nested.text = "0.82".into();
        foreign.children.push(nested);
        element.children.push(foreign);

        let tree = SettingsTree::from_element(&element);
        assert_eq!(
            tree.get_path("Calibration"),
            Some(&SettingValue::Opaque {
                type_name: "GainTable".into(),
                body: "linear".into(),
            })
        );
    }
}
