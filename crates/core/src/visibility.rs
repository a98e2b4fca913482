use crate::paths::SOURCE_ROOT;
use crate::tables::MODULE_VISIBILITY_EXCEPTION;
use std::collections::HashMap;

const PUBLIC: &str = "//visibility:public";
const MODULES_PREFIX: &str = "mongo/db/modules/";

/// Memoized package visibility per emitted directory.
#[derive(Debug, Default)]
pub struct VisibilityPolicy {
    cache: HashMap<String, Vec<String>>,
}

impl VisibilityPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_dir(&mut self, dir: &str) -> &[String] {
        self.cache
            .entry(dir.to_string())
            .or_insert_with(|| visibility_for(dir))
    }
}

/// Module directories are only visible to their own module's subpackages.
pub fn visibility_for(dir: &str) -> Vec<String> {
    let module = dir
        .strip_prefix(MODULES_PREFIX)
        .and_then(|rest| rest.split('/').next())
        .filter(|m| !m.is_empty());

    let Some(module) = module else {
        return vec![PUBLIC.to_string()];
    };

    let mut out = vec![subpackages(module)];
    let (granting, sibling) = MODULE_VISIBILITY_EXCEPTION;
    if module == granting {
        out.push(subpackages(sibling));
    }
    out
}

fn subpackages(module: &str) -> String {
    format!("//{SOURCE_ROOT}/{MODULES_PREFIX}{module}:__subpackages__")
}
