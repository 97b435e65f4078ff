//! Work item manifests: `<id> <path>` per line.

use anyhow::{bail, Context, Result};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// One unit of batch work. `path` is resolved against the endpoint set at
/// fetch time; it may also be a fully qualified URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub id: String,
    pub path: String,
}

/// Parses a manifest file. Blank lines and `#` comments are ignored;
/// everything else must be an identifier and a path separated by
/// whitespace. Identifiers must be unique, since they are what the ledgers
/// record.
pub fn load(path: &Path) -> Result<Vec<WorkItem>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading manifest {}", path.display()))?;

    let mut items = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split_whitespace();
        let id = fields.next().unwrap_or_default().to_string();
        let Some(item_path) = fields.next() else {
            bail!(
                "manifest {} line {}: expected `<id> <path>`, got `{}`",
                path.display(),
                idx + 1,
                line
            );
        };
        if fields.next().is_some() {
            bail!(
                "manifest {} line {}: trailing fields after the path",
                path.display(),
                idx + 1
            );
        }
        if !seen.insert(id.clone()) {
            bail!(
                "manifest {} line {}: duplicate id `{}`",
                path.display(),
                idx + 1,
                id
            );
        }
        items.push(WorkItem {
            id,
            path: item_path.to_string(),
        });
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn manifest(content: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn parses_items_skipping_comments_and_blanks() {
        let f = manifest(
            "# boundary extracts for the nightly run\n\
             \n\
             region-1  boundaries/1.json\n\
             region-2\tboundaries/2.json\n",
        );
        let items = load(f.path()).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, "region-1");
        assert_eq!(items[0].path, "boundaries/1.json");
        assert_eq!(items[1].id, "region-2");
    }

    #[test]
    fn empty_manifest_is_empty_work() {
        let f = manifest("# nothing yet\n");
        assert!(load(f.path()).unwrap().is_empty());
    }

    #[test]
    fn missing_path_is_rejected_with_line_number() {
        let f = manifest("region-1 boundaries/1.json\nregion-2\n");
        let err = load(f.path()).unwrap_err();
        assert!(err.to_string().contains("line 2"), "{err}");
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let f = manifest("a x.json\na y.json\n");
        let err = load(f.path()).unwrap_err();
        assert!(err.to_string().contains("duplicate id `a`"), "{err}");
    }

    #[test]
    fn trailing_fields_are_rejected() {
        let f = manifest("a x.json extra\n");
        assert!(load(f.path()).is_err());
    }
}
