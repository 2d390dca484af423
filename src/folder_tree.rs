//! Folder hierarchy helpers: flat list to tree, depth and cycle validation,
//! cascade ordering and path maintenance.
//!
//! The tree is rebuilt from the flat folder list on every use; there is no
//! incremental diffing. The two-level depth cap lives here so no caller can
//! bypass it.

use crate::error::WorkspaceError;
use crate::types::{OcrFolder, ALL_DOCS_SECTION};
use serde::Serialize;

/// Folders may be roots or direct children of a root, nothing deeper.
pub const MAX_FOLDER_DEPTH: usize = 1;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderTreeNode {
    pub folder: OcrFolder,
    pub children: Vec<FolderTreeNode>,
}

/// Build the nested tree rooted at `parent_id` (None for the top level).
/// Children keep the relative order of the input list.
pub fn build_folder_tree(folders: &[OcrFolder], parent_id: Option<&str>) -> Vec<FolderTreeNode> {
    folders
        .iter()
        .filter(|f| f.parent_id.as_deref() == parent_id)
        .map(|f| FolderTreeNode {
            folder: f.clone(),
            children: build_folder_tree(folders, Some(&f.id)),
        })
        .collect()
}

/// Total number of nodes in a built tree.
pub fn tree_len(nodes: &[FolderTreeNode]) -> usize {
    nodes
        .iter()
        .map(|n| 1 + tree_len(&n.children))
        .sum()
}

/// Deepest child level of a built tree, 0 for leaf roots.
pub fn tree_depth(nodes: &[FolderTreeNode]) -> usize {
    nodes
        .iter()
        .map(|n| {
            if n.children.is_empty() {
                0
            } else {
                1 + tree_depth(&n.children)
            }
        })
        .max()
        .unwrap_or(0)
}

/// Folders belonging to a menu section. Folders without an explicit section
/// land in the [`ALL_DOCS_SECTION`] bucket.
pub fn section_folders<'a>(folders: &'a [OcrFolder], section_id: &str) -> Vec<&'a OcrFolder> {
    folders
        .iter()
        .filter(|f| match f.menu_section.as_deref() {
            Some(section) => section == section_id,
            None => section_id == ALL_DOCS_SECTION,
        })
        .collect()
}

fn find<'a>(folders: &'a [OcrFolder], id: &str) -> Option<&'a OcrFolder> {
    folders.iter().find(|f| f.id == id)
}

/// Distance from the root, walking parent links. Dangling parents count as
/// roots so a corrupt link cannot loop forever.
pub fn folder_depth(folders: &[OcrFolder], id: &str) -> usize {
    let mut depth = 0;
    let mut current = find(folders, id).and_then(|f| f.parent_id.as_deref());
    while let Some(parent_id) = current {
        match find(folders, parent_id) {
            Some(parent) => {
                depth += 1;
                current = parent.parent_id.as_deref();
            }
            None => break,
        }
        if depth > folders.len() {
            break;
        }
    }
    depth
}

/// Levels of children below a folder, 0 for a leaf.
pub fn subtree_height(folders: &[OcrFolder], id: &str) -> usize {
    folders
        .iter()
        .filter(|f| f.parent_id.as_deref() == Some(id))
        .map(|child| 1 + subtree_height(folders, &child.id))
        .max()
        .unwrap_or(0)
}

/// True when `id` sits somewhere below `ancestor_id` (ancestor walk upward
/// from `id`).
pub fn is_descendant(folders: &[OcrFolder], ancestor_id: &str, id: &str) -> bool {
    let mut steps = 0;
    let mut current = find(folders, id).and_then(|f| f.parent_id.as_deref());
    while let Some(parent_id) = current {
        if parent_id == ancestor_id {
            return true;
        }
        current = find(folders, parent_id).and_then(|f| f.parent_id.as_deref());
        steps += 1;
        if steps > folders.len() {
            return false;
        }
    }
    false
}

/// Ids of every folder below `id`, pre-order (parents before children).
pub fn descendant_ids(folders: &[OcrFolder], id: &str) -> Vec<String> {
    let mut out = Vec::new();
    for child in folders.iter().filter(|f| f.parent_id.as_deref() == Some(id)) {
        out.push(child.id.clone());
        out.extend(descendant_ids(folders, &child.id));
    }
    out
}

/// Deletion order for a cascade: every child strictly before its parent,
/// the folder itself last. Deleting in this order never leaves a child
/// pointing at an already-removed parent.
pub fn deletion_order(folders: &[OcrFolder], id: &str) -> Vec<String> {
    let mut order = descendant_ids(folders, id);
    order.push(id.to_string());
    order.reverse();
    order
}

/// Validate that a new folder may be created under `parent_id`.
pub fn validate_new_parent(
    folders: &[OcrFolder],
    parent_id: Option<&str>,
) -> Result<(), WorkspaceError> {
    if let Some(parent_id) = parent_id {
        let parent = find(folders, parent_id)
            .ok_or_else(|| WorkspaceError::NotFound("Parent folder".to_string()))?;
        if folder_depth(folders, &parent.id) + 1 > MAX_FOLDER_DEPTH {
            return Err(WorkspaceError::validation(
                "Folders can only be nested one level deep.",
            ));
        }
    }
    Ok(())
}

/// Validate moving `folder_id` under `new_parent_id` (None moves it to the
/// top level): the target must exist, must not be the folder itself or one
/// of its descendants, and the resulting depth must stay within the cap.
pub fn validate_move(
    folders: &[OcrFolder],
    folder_id: &str,
    new_parent_id: Option<&str>,
) -> Result<(), WorkspaceError> {
    find(folders, folder_id).ok_or_else(|| WorkspaceError::NotFound("Folder".to_string()))?;

    let Some(target_id) = new_parent_id else {
        return Ok(());
    };
    if target_id == folder_id {
        return Err(WorkspaceError::validation(
            "A folder cannot be moved into itself.",
        ));
    }
    let target =
        find(folders, target_id).ok_or_else(|| WorkspaceError::NotFound("Target folder".to_string()))?;
    if is_descendant(folders, folder_id, target_id) {
        return Err(WorkspaceError::validation(
            "A folder cannot be moved into one of its own sub-folders.",
        ));
    }
    let new_depth = folder_depth(folders, &target.id) + 1 + subtree_height(folders, folder_id);
    if new_depth > MAX_FOLDER_DEPTH {
        return Err(WorkspaceError::validation(
            "Folders can only be nested one level deep.",
        ));
    }
    Ok(())
}

/// True when `name` is already taken by a sibling under the same parent and
/// menu section. `exclude_id` skips the folder being renamed.
pub fn name_in_use(
    folders: &[OcrFolder],
    parent_id: Option<&str>,
    menu_section: Option<&str>,
    name: &str,
    exclude_id: Option<&str>,
) -> bool {
    folders.iter().any(|f| {
        f.parent_id.as_deref() == parent_id
            && f.menu_section.as_deref() == menu_section
            && f.name.eq_ignore_ascii_case(name)
            && Some(f.id.as_str()) != exclude_id
    })
}

/// Materialized path for a folder under `parent_path` (None for roots).
pub fn folder_path(parent_path: Option<&str>, name: &str) -> String {
    match parent_path {
        Some(parent) => format!("{}/{}", parent, name),
        None => name.to_string(),
    }
}

/// Recompute the paths of a folder and its whole subtree, depth-first.
/// `new_name` overrides the folder's own name (for renames); `parent_path`
/// is the path of the new parent, None at the top level. Returns
/// `(folder_id, new_path)` pairs in the order they should be persisted
/// (parents before children, so readers never see a child path that
/// contradicts its parent).
pub fn recomputed_paths(
    folders: &[OcrFolder],
    folder_id: &str,
    new_name: Option<&str>,
    parent_path: Option<&str>,
) -> Vec<(String, String)> {
    let Some(folder) = find(folders, folder_id) else {
        return Vec::new();
    };
    let name = new_name.unwrap_or(&folder.name);
    let path = folder_path(parent_path, name);
    let mut out = vec![(folder_id.to_string(), path.clone())];
    for child in folders.iter().filter(|f| f.parent_id.as_deref() == Some(folder_id)) {
        out.extend(recomputed_paths(folders, &child.id, None, Some(&path)));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn folder(id: &str, name: &str, parent: Option<&str>, section: Option<&str>) -> OcrFolder {
        OcrFolder {
            id: id.to_string(),
            name: name.to_string(),
            description: None,
            color: None,
            parent_id: parent.map(String::from),
            menu_section: section.map(String::from),
            path: match parent {
                Some(p) => format!("{}/{}", p, name),
                None => name.to_string(),
            },
            document_count: 0,
            folder_count: 0,
            created_on: Utc::now(),
            modified_on: Utc::now(),
        }
    }

    fn sample() -> Vec<OcrFolder> {
        vec![
            folder("a", "Invoices", None, Some("finance")),
            folder("b", "2024", Some("a"), Some("finance")),
            folder("c", "2025", Some("a"), Some("finance")),
            folder("d", "Contracts", None, None),
        ]
    }

    #[test]
    fn tree_holds_every_folder_within_depth_cap() {
        let folders = sample();
        let tree = build_folder_tree(&folders, None);
        assert_eq!(tree_len(&tree), folders.len());
        assert!(tree_depth(&tree) <= MAX_FOLDER_DEPTH);
    }

    #[test]
    fn children_keep_input_order() {
        let folders = sample();
        let tree = build_folder_tree(&folders, None);
        let invoices = &tree[0];
        assert_eq!(invoices.folder.id, "a");
        let child_ids: Vec<&str> = invoices.children.iter().map(|n| n.folder.id.as_str()).collect();
        assert_eq!(child_ids, ["b", "c"]);
    }

    #[test]
    fn unsectioned_folders_fall_into_all_docs() {
        let folders = sample();
        let bucket = section_folders(&folders, ALL_DOCS_SECTION);
        assert_eq!(bucket.len(), 1);
        assert_eq!(bucket[0].id, "d");
        assert_eq!(section_folders(&folders, "finance").len(), 3);
    }

    #[test]
    fn move_into_self_or_descendant_is_rejected() {
        let folders = sample();
        assert!(validate_move(&folders, "a", Some("a")).is_err());
        assert!(validate_move(&folders, "a", Some("b")).is_err());
        assert!(validate_move(&folders, "b", Some("d")).is_ok());
    }

    #[test]
    fn move_that_would_exceed_depth_is_rejected() {
        let folders = sample();
        // "a" has children; under "d" its subtree would reach depth 2.
        assert!(validate_move(&folders, "a", Some("d")).is_err());
        // To the top level is always fine.
        assert!(validate_move(&folders, "b", None).is_ok());
    }

    #[test]
    fn new_folder_under_child_is_rejected() {
        let folders = sample();
        assert!(validate_new_parent(&folders, Some("b")).is_err());
        assert!(validate_new_parent(&folders, Some("d")).is_ok());
        assert!(validate_new_parent(&folders, None).is_ok());
    }

    #[test]
    fn deletion_order_removes_children_first() {
        let folders = sample();
        let order = deletion_order(&folders, "a");
        assert_eq!(order.len(), 3);
        let parent_pos = order.iter().position(|id| id == "a").unwrap();
        for child in ["b", "c"] {
            let child_pos = order.iter().position(|id| id == child).unwrap();
            assert!(child_pos < parent_pos, "{} deleted after parent", child);
        }
    }

    #[test]
    fn recomputed_paths_follow_the_new_parent() {
        let folders = sample();
        let updates = recomputed_paths(&folders, "a", None, Some("Archive"));
        assert_eq!(
            updates,
            vec![
                ("a".to_string(), "Archive/Invoices".to_string()),
                ("b".to_string(), "Archive/Invoices/2024".to_string()),
                ("c".to_string(), "Archive/Invoices/2025".to_string()),
            ]
        );
        let renamed = recomputed_paths(&folders, "a", Some("Billing"), None);
        assert_eq!(renamed[0].1, "Billing");
        assert_eq!(renamed[1].1, "Billing/2024");
    }

    #[test]
    fn duplicate_names_detected_per_parent_and_section() {
        let folders = sample();
        assert!(name_in_use(&folders, Some("a"), Some("finance"), "2024", None));
        assert!(name_in_use(&folders, Some("a"), Some("finance"), "2024", Some("c")));
        assert!(!name_in_use(&folders, Some("a"), Some("finance"), "2024", Some("b")));
        assert!(!name_in_use(&folders, None, Some("finance"), "2024", None));
    }
}
