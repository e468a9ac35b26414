use serde::{Deserialize, Serialize};

/// One destination folder on a platform with hierarchical galleries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    pub value: String,
    pub label: String,
    #[serde(default)]
    pub children: Vec<Folder>,
}

impl Folder {
    pub fn leaf(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
            children: Vec::new(),
        }
    }
}

/// Node of a platform's scraped folder UI tree, already reduced to the two
/// things the walk cares about: an optional leaf marker and nested children.
#[derive(Debug, Clone, Default)]
pub struct TreeElement {
    pub marker: Option<(String, String)>,
    pub children: Vec<TreeElement>,
}

impl TreeElement {
    pub fn leaf(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            marker: Some((value.into(), label.into())),
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<TreeElement>) -> Self {
        self.children = children;
        self
    }
}

/// Depth-first walk of a scraped tree: every marker becomes a folder, child
/// containers recurse under it, and marker-less wrapper nodes are spliced
/// into their parent level. Output order mirrors the source hierarchy.
pub fn collect_folders(elements: &[TreeElement]) -> Vec<Folder> {
    let mut folders = Vec::new();
    for element in elements {
        match &element.marker {
            Some((value, label)) => folders.push(Folder {
                value: value.clone(),
                label: label.clone(),
                children: collect_folders(&element.children),
            }),
            None => folders.extend(collect_folders(&element.children)),
        }
    }
    folders
}

pub fn folder_id_exists(folders: &[Folder], id: &str) -> bool {
    folders
        .iter()
        .any(|f| f.value == id || folder_id_exists(&f.children, id))
}

/// Depth-first flattening, parents before their children.
pub fn flatten(folders: &[Folder]) -> Vec<&Folder> {
    let mut flat = Vec::new();
    for folder in folders {
        flat.push(folder);
        flat.extend(flatten(&folder.children));
    }
    flat
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_level_tree() -> Vec<TreeElement> {
        vec![
            TreeElement::leaf("1", "Gallery").with_children(vec![
                TreeElement::leaf("2", "Sketches"),
                TreeElement::leaf("3", "Finished").with_children(vec![TreeElement::leaf(
                    "4",
                    "Commissions",
                )]),
            ]),
            TreeElement::leaf("5", "Scraps"),
        ]
    }

    #[test]
    fn test_collect_mirrors_hierarchy_depth_first() {
        let folders = collect_folders(&three_level_tree());

        assert_eq!(folders.len(), 2);
        assert_eq!(folders[0].label, "Gallery");
        assert_eq!(folders[0].children[0].label, "Sketches");
        assert_eq!(folders[0].children[1].label, "Finished");
        assert_eq!(folders[0].children[1].children[0].label, "Commissions");

        let order: Vec<&str> = flatten(&folders).iter().map(|f| f.value.as_str()).collect();
        assert_eq!(order, vec!["1", "2", "3", "4", "5"]);
    }

    #[test]
    fn test_markerless_wrappers_are_spliced() {
        let tree = vec![
            TreeElement::default().with_children(vec![
                TreeElement::leaf("a", "A"),
                TreeElement::leaf("b", "B"),
            ]),
        ];
        let folders = collect_folders(&tree);
        assert_eq!(folders, vec![Folder::leaf("a", "A"), Folder::leaf("b", "B")]);
    }

    #[test]
    fn test_folder_id_exists_searches_nested_levels() {
        let folders = collect_folders(&three_level_tree());
        assert!(folder_id_exists(&folders, "4"));
        assert!(folder_id_exists(&folders, "5"));
        assert!(!folder_id_exists(&folders, "9"));
    }
}
