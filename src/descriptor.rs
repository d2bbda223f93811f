//! Reading and patching the project's `.csproj` descriptor.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use xmltree::{Element, EmitterConfig, XMLNode};

pub const DESCRIPTOR_EXTENSION: &str = "csproj";
pub const PROPERTY_GROUP: &str = "PropertyGroup";
pub const PUBLISH_AOT: &str = "PublishAot";
pub const INVARIANT_GLOBALIZATION: &str = "InvariantGlobalization";

/// Project name is the basename of the project root.
pub fn project_name(root: &Path) -> String {
    root.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// `<root>/<name>.csproj`
pub fn descriptor_path(root: &Path) -> PathBuf {
    root.join(format!("{}.{}", project_name(root), DESCRIPTOR_EXTENSION))
}

pub fn load(path: &Path) -> Result<Element> {
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    Element::parse(BufReader::new(file)).with_context(|| format!("cannot parse {}", path.display()))
}

pub fn save(tree: &Element, path: &Path) -> Result<()> {
    let config = EmitterConfig::new()
        .perform_indent(true)
        .write_document_declaration(false);
    let file = File::create(path).with_context(|| format!("cannot write {}", path.display()))?;
    tree.write_with_config(file, config)
        .with_context(|| format!("cannot serialize {}", path.display()))
}

/// Set `PublishAot` and `InvariantGlobalization` in the first `PropertyGroup`.
///
/// Returns `false` when the descriptor has no `PropertyGroup`; the tree is
/// left untouched in that case.
pub fn patch_flags(tree: &mut Element, native: bool) -> bool {
    let value = if native { "true" } else { "false" };
    let Some(group) = tree.get_mut_child(PROPERTY_GROUP) else {
        return false;
    };

    for flag in [PUBLISH_AOT, INVARIANT_GLOBALIZATION] {
        match group.get_mut_child(flag) {
            Some(element) => element.children = vec![XMLNode::Text(value.to_string())],
            None => {
                let mut element = Element::new(flag);
                element.children.push(XMLNode::Text(value.to_string()));
                group.children.push(XMLNode::Element(element));
            }
        }
    }
    true
}

/// Load, patch and rewrite the descriptor in place.
///
/// `Ok(false)` means the file was rewritten but had no `PropertyGroup` to patch.
pub fn patch_file(path: &Path, native: bool) -> Result<bool> {
    let mut tree = load(path)?;
    let patched = patch_flags(&mut tree, native);
    save(&tree, path)?;
    Ok(patched)
}

/// Text of a flag inside the first `PropertyGroup`, if any.
pub fn flag_value(tree: &Element, flag: &str) -> Option<String> {
    tree.get_child(PROPERTY_GROUP)?
        .get_child(flag)?
        .get_text()
        .map(|text| text.into_owned())
}
