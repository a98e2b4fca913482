use crate::paths::{
    header_ext, is_third_party, split_dir, LeftKind, AUTO_SUBDIR, NAMESPACE, SOURCE_ROOT,
};
use crate::tables::{is_excluded, remapped_label};
use std::collections::HashMap;

/// Name of the shared bundle target in the namespace root directory.
pub const FLAT_TARGET: &str = "idl_headers";
/// Well-known empty filegroup that keeps an otherwise empty `srcs` valid.
pub const PLACEHOLDER_LABEL: &str = "//bazel/auto_header:empty_auto_header";

/// How a right path maps into the label namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RightKind {
    Excluded,
    ProtoGenerated,
    ThirdParty,
    Remapped(&'static str),
    GeneratedHeader,
    IdlTemplate,
    Idl,
    Header(&'static str),
    GeneratedPseudo,
    Other,
}

impl RightKind {
    /// First match wins; the order mirrors how generated headers shadow
    /// the generic header rule.
    pub fn classify(path: &str) -> Self {
        if is_excluded(path) {
            return RightKind::Excluded;
        }
        // Covers `.grpc.pb.h` too.
        if path.ends_with(".pb.h") {
            return RightKind::ProtoGenerated;
        }
        if is_third_party(path) {
            return RightKind::ThirdParty;
        }
        if let Some(label) = remapped_label(path) {
            return RightKind::Remapped(label);
        }
        let name = split_dir(path).1;
        if name.ends_with("_gen.h") {
            return RightKind::GeneratedHeader;
        }
        if name.ends_with(".idl.tpl") {
            return RightKind::IdlTemplate;
        }
        if name.ends_with(".idl") {
            return RightKind::Idl;
        }
        if let Some(ext) = header_ext(name) {
            return RightKind::Header(ext);
        }
        if name.ends_with("_gen") {
            return RightKind::GeneratedPseudo;
        }
        RightKind::Other
    }

    pub fn is_suppressed(self) -> bool {
        matches!(
            self,
            RightKind::Excluded | RightKind::ProtoGenerated | RightKind::ThirdParty
        )
    }
}

/// `//src/<dir>/.auto_header`
pub fn auto_package(dir: &str) -> String {
    format!("//{SOURCE_ROOT}/{dir}/{AUTO_SUBDIR}")
}

pub fn auto_label(dir: &str, target: &str) -> String {
    format!("{}:{target}", auto_package(dir))
}

/// Label of a checked-in or generated file in its own package.
pub fn file_label(path: &str) -> String {
    let (dir, name) = split_dir(path);
    format!("//{SOURCE_ROOT}/{dir}:{name}")
}

pub fn flat_label() -> String {
    auto_label(NAMESPACE, FLAT_TARGET)
}

/// Label for a generated output file, honoring the remap table.
fn generated_file_label(path: &str) -> Option<String> {
    match RightKind::classify(path) {
        RightKind::Remapped(label) => Some(label.to_string()),
        kind if kind.is_suppressed() => None,
        _ => Some(file_label(path)),
    }
}

/// Per-run label builder; memoizes target-name sanitization.
#[derive(Debug, Default)]
pub struct Labeler {
    sanitized: HashMap<String, String>,
}

impl Labeler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts a target name to `[A-Za-z0-9_]`, never leading with a digit.
    pub fn sanitize(&mut self, raw: &str) -> String {
        if let Some(hit) = self.sanitized.get(raw) {
            return hit.clone();
        }
        let value = sanitize_name(raw);
        self.sanitized.insert(raw.to_string(), value.clone());
        value
    }

    /// Maps a right path to a label, or the empty string to drop the edge.
    pub fn label_for_right(&mut self, path: &str) -> String {
        let kind = RightKind::classify(path);
        let (dir, name) = split_dir(path);
        let target = match kind {
            RightKind::Excluded
            | RightKind::ProtoGenerated
            | RightKind::ThirdParty
            | RightKind::Other => return String::new(),
            RightKind::Remapped(label) => return label.to_string(),
            RightKind::GeneratedHeader => self.sanitize(strip(name, ".h")),
            RightKind::IdlTemplate => {
                self.sanitize(&format!("{}_gen", strip(name, ".idl.tpl")))
            }
            RightKind::Idl => self.sanitize(&format!("{}_gen", strip(name, ".idl"))),
            RightKind::Header(ext) => {
                self.sanitize(&format!("{}_{}", strip(name, ext), &ext[1..]))
            }
            RightKind::GeneratedPseudo => self.sanitize(name),
        };
        auto_label(dir, &target)
    }

    /// Target name of the filegroup a left file owns.
    pub fn target_name(&mut self, name: &str, kind: LeftKind) -> String {
        let stem = kind.stem(name);
        match kind {
            LeftKind::Idl | LeftKind::IdlTemplate => self.sanitize(&format!("{stem}_gen")),
            LeftKind::HeaderTemplate => self.sanitize(&format!("{stem}_h")),
            LeftKind::SourceTemplate => self.sanitize(&format!("{stem}_cpp")),
            LeftKind::Header(ext) | LeftKind::Source(ext) => {
                self.sanitize(&format!("{stem}_{}", &ext[1..]))
            }
            LeftKind::Generated => self.sanitize(name),
        }
    }

    /// Labels for the files a left file itself contributes to its filegroup.
    pub fn owning_labels(&self, dir: &str, name: &str, kind: LeftKind) -> Vec<String> {
        let stem = kind.stem(name);
        let generated = match kind {
            LeftKind::Source(_) | LeftKind::Header(_) => format!("{dir}/{name}"),
            LeftKind::Idl | LeftKind::IdlTemplate | LeftKind::Generated => {
                format!("{dir}/{stem}_gen.h")
            }
            LeftKind::HeaderTemplate => format!("{dir}/{stem}.h"),
            LeftKind::SourceTemplate => format!("{dir}/{stem}.cpp"),
        };
        generated_file_label(&generated).into_iter().collect()
    }

    /// Label a flattened node contributes to the shared bundle, if any.
    pub fn flat_node_label(&self, path: &str) -> Option<String> {
        let (dir, name) = split_dir(path);
        match RightKind::classify(path) {
            RightKind::Remapped(label) => Some(label.to_string()),
            RightKind::GeneratedHeader | RightKind::Header(_) => Some(file_label(path)),
            RightKind::IdlTemplate => {
                generated_file_label(&format!("{dir}/{}_gen.h", strip(name, ".idl.tpl")))
            }
            RightKind::Idl => {
                generated_file_label(&format!("{dir}/{}_gen.h", strip(name, ".idl")))
            }
            _ => None,
        }
    }
}

fn strip<'a>(name: &'a str, suffix: &str) -> &'a str {
    name.strip_suffix(suffix).unwrap_or(name)
}

pub fn sanitize_name(raw: &str) -> String {
    let mut out: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if out.is_empty() {
        return "_".to_string();
    }
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}
